mod credential;
mod credential_store;
mod error;
mod interaction;
mod oauth;
mod session;
pub(crate) mod utils;

pub use credential::{CompanyId, Credential};
pub use credential_store::{CredentialStore, FileCredentialStore};
pub use error::AuthError;
pub use interaction::Interaction;
pub(crate) use oauth::USER_AGENT;
pub use oauth::{OAuthClient, OAuthConfig, OAuthEndpoints, OOB_REDIRECT_URI, TOKEN_TIMEOUT};
pub use session::{AuthSession, SessionState, PROBE_PATH, PROBE_TIMEOUT};
