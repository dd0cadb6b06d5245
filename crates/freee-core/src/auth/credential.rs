use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier of a freee company (tenant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyId(pub i64);

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted OAuth credential.
///
/// Any extra fields returned by the token endpoint (`expires_in`, `scope`, ...) are
/// kept verbatim in `extra` so the file mirrors the last token response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub company_id: Option<CompanyId>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            company_id: None,
            extra: Map::new(),
        }
    }

    pub fn with_company(mut self, company_id: CompanyId) -> Self {
        self.company_id = Some(company_id);
        self
    }

    /// Adopt a freshly refreshed credential, keeping the tenant bound to this one.
    pub fn merge_refreshed(&self, refreshed: Credential) -> Credential {
        Credential {
            company_id: self.company_id.or(refreshed.company_id),
            ..refreshed
        }
    }
}
