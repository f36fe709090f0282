use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const PRODUCTION_API_URL: &str = "https://api.digikey.com";
pub const SANDBOX_API_URL: &str = "https://sandbox-api.digikey.com";
const DEFAULT_REDIRECT_PORT: u16 = 8139;

/// Errors raised while loading Digi-Key credentials
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to get home directory")]
    NoHomeDir,

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Missing Digi-Key {field}. Set `{key}` in {} or the {env} environment variable.", path.display())]
    Missing {
        field: &'static str,
        key: &'static str,
        env: &'static str,
        path: PathBuf,
    },
}

/// Contents of `config.toml`; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub sandbox: Option<bool>,
    pub locale_currency: Option<String>,
    pub locale_site: Option<String>,
    pub redirect_port: Option<u16>,
}

impl ConfigFile {
    /// Read `path`, treating a missing file as empty
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Resolved Digi-Key API settings
#[derive(Debug, Clone, PartialEq)]
pub struct DigikeyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub sandbox: bool,
    pub locale_currency: String,
    pub locale_site: String,
    pub redirect_port: u16,
    /// Holds `config.toml` and cached tokens
    pub storage_dir: PathBuf,
    pub api_base_url: String,
}

impl DigikeyConfig {
    /// Load from the storage directory and the process environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_env(|key| std::env::var(key).ok())
    }

    /// Load using `env` to look up environment variables
    pub fn from_env(env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let storage_dir = match env("DIGIKEY_STORAGE_PATH") {
            Some(dir) => PathBuf::from(dir),
            None => default_storage_dir()?,
        };
        let file = ConfigFile::load(&storage_dir.join("config.toml"))?;
        Self::resolve(file, env, storage_dir)
    }

    /// Layer environment overrides on top of the config file
    pub fn resolve(
        file: ConfigFile,
        env: impl Fn(&str) -> Option<String>,
        storage_dir: PathBuf,
    ) -> Result<Self, ConfigError> {
        let config_path = storage_dir.join("config.toml");
        let missing = |field, key, env| ConfigError::Missing {
            field,
            key,
            env,
            path: config_path.clone(),
        };

        let client_id = env("DIGIKEY_CLIENT_ID")
            .or(file.client_id)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| missing("client id", "client_id", "DIGIKEY_CLIENT_ID"))?;
        let client_secret = env("DIGIKEY_CLIENT_SECRET")
            .or(file.client_secret)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| missing("client secret", "client_secret", "DIGIKEY_CLIENT_SECRET"))?;

        let sandbox = env("DIGIKEY_CLIENT_SANDBOX")
            .map(|v| parse_flag(&v))
            .or(file.sandbox)
            .unwrap_or(false);

        let api_base_url = env("DIGIKEY_API_URL").unwrap_or_else(|| {
            if sandbox {
                SANDBOX_API_URL.to_string()
            } else {
                PRODUCTION_API_URL.to_string()
            }
        });

        Ok(Self {
            client_id,
            client_secret,
            sandbox,
            locale_currency: file.locale_currency.unwrap_or_else(|| "USD".to_string()),
            locale_site: file.locale_site.unwrap_or_else(|| "US".to_string()),
            redirect_port: file.redirect_port.unwrap_or(DEFAULT_REDIRECT_PORT),
            storage_dir,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn tokens_path(&self) -> PathBuf {
        self.storage_dir.join("tokens.toml")
    }
}

fn default_storage_dir() -> Result<PathBuf, ConfigError> {
    let home_dir = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home_dir.join(".bomcost"))
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_file() {
        let file = ConfigFile {
            client_id: Some("file-id".to_string()),
            client_secret: Some("file-secret".to_string()),
            sandbox: Some(false),
            ..Default::default()
        };
        let env = env_of(&[("DIGIKEY_CLIENT_ID", "env-id"), ("DIGIKEY_CLIENT_SANDBOX", "True")]);

        let config = DigikeyConfig::resolve(file, env, PathBuf::from("/tmp/bomcost")).unwrap();

        assert_eq!(config.client_id, "env-id");
        assert_eq!(config.client_secret, "file-secret");
        assert!(config.sandbox);
        assert_eq!(config.api_base_url, SANDBOX_API_URL);
        assert_eq!(config.locale_currency, "USD");
        assert_eq!(config.redirect_port, 8139);
    }

    #[test]
    fn test_api_url_override() {
        let env = env_of(&[
            ("DIGIKEY_CLIENT_ID", "id"),
            ("DIGIKEY_CLIENT_SECRET", "secret"),
            ("DIGIKEY_API_URL", "http://127.0.0.1:9000/"),
        ]);
        let config =
            DigikeyConfig::resolve(ConfigFile::default(), env, PathBuf::from("/tmp/x")).unwrap();
        assert_eq!(config.api_base_url, "http://127.0.0.1:9000");
    }

    #[test]
    fn test_missing_secret() {
        let env = env_of(&[("DIGIKEY_CLIENT_ID", "id")]);
        let err = DigikeyConfig::resolve(ConfigFile::default(), env, PathBuf::from("/cfg"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing { key: "client_secret", .. }));
        assert!(err.to_string().contains("DIGIKEY_CLIENT_SECRET"));
    }

    #[test]
    fn test_from_env_reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.toml"),
            "client_id = \"abc\"\nclient_secret = \"xyz\"\nlocale_currency = \"EUR\"\n",
        )
        .unwrap();
        let storage = dir.path().to_string_lossy().into_owned();

        let config =
            DigikeyConfig::from_env(env_of(&[("DIGIKEY_STORAGE_PATH", storage.as_str())])).unwrap();

        assert_eq!(config.client_id, "abc");
        assert_eq!(config.locale_currency, "EUR");
        assert_eq!(config.api_base_url, PRODUCTION_API_URL);
        assert_eq!(config.tokens_path(), dir.path().join("tokens.toml"));
    }

    #[test]
    fn test_invalid_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "client_id = [").unwrap();
        assert!(matches!(ConfigFile::load(&path), Err(ConfigError::Parse { .. })));
    }
}
