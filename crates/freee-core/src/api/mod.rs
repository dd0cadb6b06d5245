mod client;
mod error;

pub use client::{
    json_body, ApiClient, RequestOptions, SharedSession, DOCUMENT_TIMEOUT, LIGHT_TIMEOUT,
};
pub use error::{ApiError, ApiResult};
