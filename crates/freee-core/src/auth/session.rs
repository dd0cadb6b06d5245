use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};
use url::Url;

use super::oauth::USER_AGENT;
use super::utils::truncate_body;
use super::{AuthError, CompanyId, Credential, CredentialStore, Interaction, OAuthClient};

/// Protected endpoint used to check whether the stored access token still works.
pub const PROBE_PATH: &str = "/api/1/companies";
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

const CODE_PROMPT: &str = "Authorization code: ";

/// Where the session currently is in its credential lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Verifying,
    Refreshing,
    Authenticating,
    Valid,
    Fatal,
}

/// Owns the OAuth credential and drives it to a usable bearer token.
///
/// Token expiry is only discovered reactively, through a 401 from the probe or from a
/// regular request.
pub struct AuthSession {
    store: Box<dyn CredentialStore + Send + Sync>,
    profile: String,
    oauth: OAuthClient,
    http: Client,
    probe_url: Url,
    credential: Option<Credential>,
    state: SessionState,
}

impl AuthSession {
    pub fn new<S>(
        store: S,
        oauth: OAuthClient,
        api_base_url: &Url,
        profile: impl Into<String>,
    ) -> Result<Self, AuthError>
    where
        S: CredentialStore + Send + Sync + 'static,
    {
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            store: Box::new(store),
            profile: profile.into(),
            oauth,
            http,
            probe_url: api_base_url.join(PROBE_PATH)?,
            credential: None,
            state: SessionState::Unauthenticated,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn company_id(&self) -> Option<CompanyId> {
        self.credential.as_ref().and_then(|c| c.company_id)
    }

    /// Load the stored credential into memory without verifying it.
    pub fn load(&mut self) -> Result<Option<&Credential>, AuthError> {
        self.credential = self.store.load(&self.profile)?;
        Ok(self.credential.as_ref())
    }

    /// Access token of the loaded credential, without any verification.
    pub fn bearer_token(&self) -> Result<&str, AuthError> {
        self.credential
            .as_ref()
            .map(|c| c.access_token.as_str())
            .ok_or(AuthError::NotAuthenticated)
    }

    /// Load, verify, refresh or re-authorize until a working access token is available.
    ///
    /// Errors from the authorization-code branch leave the session `Fatal`.
    pub async fn ensure_valid(
        &mut self,
        interaction: &mut dyn Interaction,
    ) -> Result<String, AuthError> {
        if self.credential.is_none() {
            self.credential = self.load_stored();
        }
        let Some(access_token) = self.credential.as_ref().map(|c| c.access_token.clone()) else {
            return self.authenticate(interaction).await;
        };

        self.transition(SessionState::Verifying);
        let response = match self
            .http
            .get(self.probe_url.clone())
            .bearer_auth(&access_token)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                self.transition(SessionState::Unauthenticated);
                return Err(err.into());
            }
        };

        match response.status() {
            StatusCode::OK => {
                self.transition(SessionState::Valid);
                Ok(access_token)
            }
            StatusCode::UNAUTHORIZED => {
                info!("stored access token rejected; attempting refresh");
                match self.refresh().await {
                    Ok(token) => Ok(token),
                    Err(err) => {
                        warn!(error = %err, "token refresh failed; starting authorization");
                        self.authenticate(interaction).await
                    }
                }
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                self.transition(SessionState::Unauthenticated);
                Err(AuthError::Unverifiable {
                    status,
                    body: truncate_body(&body),
                })
            }
        }
    }

    /// Exchange the refresh token for a new token pair and persist it.
    ///
    /// The bound company survives the refresh. A failed write is logged; the new tokens
    /// stay in memory for the rest of the run.
    pub async fn refresh(&mut self) -> Result<String, AuthError> {
        let current = self.credential.clone().ok_or(AuthError::NotAuthenticated)?;
        self.transition(SessionState::Refreshing);

        let refreshed = match self.oauth.refresh(&current).await {
            Ok(refreshed) => refreshed,
            Err(err) => {
                self.transition(SessionState::Unauthenticated);
                return Err(err);
            }
        };

        if let Err(err) = self.store.save(&self.profile, &refreshed) {
            warn!(error = %err, "failed to persist refreshed credential");
        }
        let token = refreshed.access_token.clone();
        self.credential = Some(refreshed);
        self.transition(SessionState::Valid);
        info!("access token refreshed");
        Ok(token)
    }

    /// Forget the stored credential and run the authorization-code flow from scratch.
    pub async fn reauthenticate(
        &mut self,
        interaction: &mut dyn Interaction,
    ) -> Result<String, AuthError> {
        self.discard()?;
        self.authenticate(interaction).await
    }

    /// Delete the credential file and drop the in-memory credential.
    pub fn discard(&mut self) -> Result<(), AuthError> {
        self.store.delete(&self.profile)?;
        self.credential = None;
        self.transition(SessionState::Unauthenticated);
        info!(profile = %self.profile, "discarded stored credential");
        Ok(())
    }

    /// Persist `company_id` into the stored credential (read, merge, save).
    pub fn bind_company(&mut self, company_id: CompanyId) -> Result<(), AuthError> {
        let mut stored = match self.store.load(&self.profile)? {
            Some(stored) => stored,
            None => self.credential.clone().ok_or(AuthError::NotAuthenticated)?,
        };
        stored.company_id = Some(company_id);
        self.store.save(&self.profile, &stored)?;
        if let Some(credential) = self.credential.as_mut() {
            credential.company_id = Some(company_id);
        }
        Ok(())
    }

    async fn authenticate(&mut self, interaction: &mut dyn Interaction) -> Result<String, AuthError> {
        self.transition(SessionState::Authenticating);
        match self.authorize_with_code(interaction).await {
            Ok(token) => {
                self.transition(SessionState::Valid);
                Ok(token)
            }
            Err(err) => {
                self.transition(SessionState::Fatal);
                Err(err)
            }
        }
    }

    async fn authorize_with_code(
        &mut self,
        interaction: &mut dyn Interaction,
    ) -> Result<String, AuthError> {
        let url = self.oauth.authorization_url();
        if let Err(err) = interaction.open_url(&url) {
            warn!(error = %err, "unable to open the authorization URL");
        }

        let raw = interaction.prompt(CODE_PROMPT)?;
        let code = raw.trim();
        if code.is_empty() {
            return Err(AuthError::MissingAuthorizationCode);
        }

        let credential = self.oauth.exchange_code(code).await?;
        self.store.save(&self.profile, &credential)?;
        info!(company_id = ?credential.company_id, "authorization complete");
        let token = credential.access_token.clone();
        self.credential = Some(credential);
        Ok(token)
    }

    fn load_stored(&self) -> Option<Credential> {
        match self.store.load(&self.profile) {
            Ok(credential) => credential,
            Err(err) => {
                warn!(error = %err, "ignoring unreadable credential file");
                None
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = ?self.state, to = ?next, "session state");
        self.state = next;
    }
}
