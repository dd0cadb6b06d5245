use std::env;
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use thiserror::Error;
use url::Url;

pub const DEFAULT_AUTHORIZE_URL: &str = "https://accounts.secure.freee.co.jp/public_api/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.secure.freee.co.jp/public_api/token";
pub const DEFAULT_API_BASE_URL: &str = "https://api.freee.co.jp";

const CLIENT_ID_KEYS: &[&str] = &["FREEE_CLIENT_ID", "CLIENT_ID"];
const CLIENT_SECRET_KEYS: &[&str] = &["FREEE_CLIENT_SECRET", "CLIENT_SECRET"];

/// Immutable process configuration, built once at startup and handed to the session
/// and API client.
#[derive(Debug, Clone)]
pub struct Settings {
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: Url,
    pub token_url: Url,
    pub api_base_url: Url,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first_present = |keys: &[&str]| {
            keys.iter()
                .filter_map(|key| lookup(key))
                .map(|value| value.trim().to_owned())
                .find(|value| !value.is_empty())
        };

        let client_id =
            first_present(CLIENT_ID_KEYS).ok_or(ConfigError::MissingSecret(CLIENT_ID_KEYS[0]))?;
        let client_secret = first_present(CLIENT_SECRET_KEYS)
            .ok_or(ConfigError::MissingSecret(CLIENT_SECRET_KEYS[0]))?;

        let url_setting = |key: &'static str, default: &str| -> Result<Url, ConfigError> {
            let raw = first_present(&[key]).unwrap_or_else(|| default.to_owned());
            Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl { key, source })
        };

        Ok(Self {
            client_id,
            client_secret,
            authorize_url: url_setting("FREEE_AUTHORIZE_URL", DEFAULT_AUTHORIZE_URL)?,
            token_url: url_setting("FREEE_TOKEN_URL", DEFAULT_TOKEN_URL)?,
            api_base_url: url_setting("FREEE_API_BASE_URL", DEFAULT_API_BASE_URL)?,
        })
    }
}

/// Application-specific configuration helpers.
#[derive(Debug, Clone)]
pub struct ConfigLocator {
    root: PathBuf,
}

impl ConfigLocator {
    /// Attempt to discover the persistent configuration directory, creating it if needed.
    pub fn new() -> Result<Self, ConfigError> {
        let dirs =
            ProjectDirs::from("jp", "freee", "freee-docs").ok_or(ConfigError::MissingProjectDirs)?;
        Self::with_root(dirs.config_dir())
    }

    /// Use an explicit directory instead of the platform default.
    pub fn with_root(root: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(ConfigError::CreateDir)?;
        set_user_only_permissions(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Path to the credentials file for the given profile.
    pub fn credentials_file(&self, profile: &str) -> PathBuf {
        self.root.join(format!("tokens-{profile}.json"))
    }
}

fn set_user_only_permissions(path: &Path) -> Result<(), ConfigError> {
    #[cfg(unix)]
    {
        let metadata = fs::metadata(path)?;
        let mut permissions = metadata.permissions();
        permissions.set_mode(0o700);
        fs::set_permissions(path, permissions)?;
        Ok(())
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}

/// Errors that can occur while assembling configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}; set it in the environment or a .env file")]
    MissingSecret(&'static str),
    #[error("invalid URL in {key}: {source}")]
    InvalidUrl {
        key: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("unable to determine configuration directory for freee-docs")]
    MissingProjectDirs,
    #[error("failed to create configuration directory: {0}")]
    CreateDir(#[source] std::io::Error),
    #[error("filesystem error: {0}")]
    Io(#[source] std::io::Error),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn credentials_file_appends_profile() {
        let temp_dir = TempDir::new().unwrap();
        let locator = ConfigLocator::with_root(temp_dir.path()).unwrap();
        let path = locator.credentials_file("default");
        assert!(path.ends_with("tokens-default.json"));
    }

    #[test]
    fn settings_use_defaults_for_endpoints() {
        let settings =
            Settings::from_lookup(lookup(&[("FREEE_CLIENT_ID", "id"), ("FREEE_CLIENT_SECRET", "s")]))
                .unwrap();
        assert_eq!(settings.client_id, "id");
        assert_eq!(settings.token_url.as_str(), DEFAULT_TOKEN_URL);
        assert_eq!(settings.api_base_url.host_str(), Some("api.freee.co.jp"));
    }

    #[test]
    fn settings_accept_legacy_keys() {
        let settings =
            Settings::from_lookup(lookup(&[("CLIENT_ID", "legacy"), ("CLIENT_SECRET", "secret")]))
                .unwrap();
        assert_eq!(settings.client_id, "legacy");
        assert_eq!(settings.client_secret, "secret");
    }

    #[test]
    fn missing_secret_is_reported() {
        let err = Settings::from_lookup(lookup(&[("FREEE_CLIENT_ID", "id")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSecret("FREEE_CLIENT_SECRET")));
    }

    #[test]
    fn blank_client_id_counts_as_missing() {
        let err = Settings::from_lookup(lookup(&[
            ("FREEE_CLIENT_ID", "  "),
            ("FREEE_CLIENT_SECRET", "s"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingSecret("FREEE_CLIENT_ID")));
    }

    #[test]
    fn invalid_override_url() {
        let err = Settings::from_lookup(lookup(&[
            ("FREEE_CLIENT_ID", "id"),
            ("FREEE_CLIENT_SECRET", "s"),
            ("FREEE_TOKEN_URL", "not a url"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidUrl {
                key: "FREEE_TOKEN_URL",
                ..
            }
        ));
    }
}
