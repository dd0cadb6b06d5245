use reqwest::StatusCode;
use thiserror::Error;

use crate::auth::AuthError;

/// Errors returned by calls against the freee resource API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("invalid request URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("HTTP status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("expected a JSON response but got '{content_type}': {body}")]
    UnexpectedContentType { content_type: String, body: String },
    #[error("malformed JSON response ({source}): {body}")]
    Decode {
        #[source]
        source: serde_json::Error,
        body: String,
    },
    #[error("response field '{key}' has an unexpected shape")]
    UnexpectedShape { key: &'static str },
    #[error("document not found: {body}")]
    NotFound { body: String },
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Likely causes worth showing to a user for common rejections.
    pub fn hints(&self) -> &'static [&'static str] {
        match self.status().map(|s| s.as_u16()) {
            Some(400) => &[
                "request parameters were rejected",
                "the application may lack permission for this company",
            ],
            Some(403) => &[
                "the document feature may not be enabled for this company",
                "the application may lack the read permission for this API",
            ],
            Some(404) => &[
                "the endpoint may be wrong",
                "the API may not be available on this plan",
            ],
            _ if matches!(self, ApiError::UnexpectedContentType { .. }) => &[
                "an HTML error page usually means the endpoint is unavailable to this application",
                "check the application's permissions in the freee developer console",
            ],
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hints_follow_status() {
        let forbidden = ApiError::Status {
            status: StatusCode::FORBIDDEN,
            body: String::new(),
        };
        assert_eq!(forbidden.hints().len(), 2);
        let server_error = ApiError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: String::new(),
        };
        assert!(server_error.hints().is_empty());
    }

    #[test]
    fn html_response_has_hints() {
        let err = ApiError::UnexpectedContentType {
            content_type: "text/html".into(),
            body: "<html>".into(),
        };
        assert!(!err.hints().is_empty());
        assert_eq!(err.status(), None);
    }
}
