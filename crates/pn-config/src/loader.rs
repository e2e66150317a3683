//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "pn.toml",
    "./config/pn.toml",
    "/etc/pn/pn.toml",
];

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "PN_CONFIG";

/// Configuration loader
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found) with environment variable overrides
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        self.load_with(|key| env::var(key).ok())
    }

    /// Same as [`load`](Self::load) with a custom variable lookup.
    pub fn load_with<F>(&self, lookup: F) -> Result<AppConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match self.find_config_file(&lookup)? {
            Some(path) => {
                info!(?path, "Loading configuration from file");
                AppConfig::from_file(&path)?
            }
            None => {
                info!("No configuration file found, using defaults");
                AppConfig::default()
            }
        };

        apply_overrides(&mut config, &lookup);
        Ok(config)
    }

    /// Find the configuration file to use.
    ///
    /// An explicit path that does not exist is an error rather than a silent
    /// fallback to defaults.
    fn find_config_file<F>(&self, lookup: &F) -> Result<Option<PathBuf>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Ok(Some(path.clone()));
            }
            return Err(ConfigError::ValidationError(format!(
                "config file not found: {}",
                path.display()
            )));
        }

        if let Some(path) = lookup(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok(Some(path));
            }
            warn!(?path, "{} points to a missing file, ignoring", CONFIG_ENV);
        }

        Ok(CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists()))
    }
}

fn set_parsed<T, F>(lookup: &F, key: &str, target: &mut T)
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup(key) {
        match val.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(key, value = %val, "Ignoring unparsable environment override"),
        }
    }
}

fn set_string<F>(lookup: &F, key: &str, target: &mut String)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup(key) {
        *target = val;
    }
}

/// Apply `PN_*` overrides on top of file values
fn apply_overrides<F>(config: &mut AppConfig, lookup: &F)
where
    F: Fn(&str) -> Option<String>,
{
    // Core
    set_string(lookup, "PN_HOST", &mut config.core.host);
    set_parsed(lookup, "PN_PORT", &mut config.core.port);
    set_parsed(lookup, "PN_WORKERS", &mut config.core.workers);
    set_parsed(lookup, "PN_QUEUES", &mut config.core.queues);
    set_parsed(lookup, "PN_NOTIFICATION_MAX", &mut config.core.notification_max);
    set_parsed(lookup, "PN_PUSHER_MAX", &mut config.core.pusher_max);
    set_parsed(lookup, "PN_SHUTDOWN_TIMEOUT", &mut config.core.shutdown_timeout);

    // iOS
    set_parsed(lookup, "PN_IOS_ENABLED", &mut config.ios.enabled);
    set_parsed(lookup, "PN_IOS_SANDBOX", &mut config.ios.sandbox);
    set_string(lookup, "PN_IOS_PEM_CERT_PATH", &mut config.ios.pem_cert_path);
    set_string(lookup, "PN_IOS_PEM_KEY_PATH", &mut config.ios.pem_key_path);
    set_string(lookup, "PN_IOS_TOKEN_AUTH_KEY_PATH", &mut config.ios.token_auth_key_path);
    set_string(lookup, "PN_IOS_TOKEN_AUTH_KEY_ID", &mut config.ios.token_auth_key_id);
    set_string(lookup, "PN_IOS_TOKEN_AUTH_TEAM_ID", &mut config.ios.token_auth_team_id);
    set_string(lookup, "PN_IOS_TOPIC", &mut config.ios.topic);
    set_parsed(lookup, "PN_IOS_RETRY_MAX", &mut config.ios.retry_max);

    // Android
    set_parsed(lookup, "PN_ANDROID_ENABLED", &mut config.android.enabled);
    set_string(lookup, "PN_ANDROID_APIKEY", &mut config.android.apikey);
    set_parsed(lookup, "PN_ANDROID_RETRY_MAX", &mut config.android.retry_max);

    // FCM v1
    set_parsed(lookup, "PN_FCM_V1_ENABLED", &mut config.fcm_v1.enabled);
    set_string(lookup, "PN_FCM_V1_PROJECT_ID", &mut config.fcm_v1.project_id);
    set_string(lookup, "PN_FCM_V1_CREDENTIALS_FILE", &mut config.fcm_v1.credentials_file);
    set_string(lookup, "PN_FCM_V1_ACCESS_TOKEN", &mut config.fcm_v1.access_token);
    set_parsed(lookup, "PN_FCM_V1_RETRY_MAX", &mut config.fcm_v1.retry_max);

    // Log
    set_string(lookup, "PN_LOG_LEVEL", &mut config.log.level);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_load_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[core]\nport = 8080\nworkers = 2\n\n[android]\nenabled = true\napikey = \"k\"").unwrap();

        let config = ConfigLoader::with_path(file.path())
            .load_with(lookup_from(&[]))
            .unwrap();

        assert_eq!(config.core.port, 8080);
        assert_eq!(config.core.workers, 2);
        assert!(config.android.enabled);
        assert_eq!(config.android.apikey, "k");
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        let result = ConfigLoader::with_path("/definitely/not/here/pn.toml").load_with(lookup_from(&[]));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_env_path_lookup() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[core]\nqueues = 16").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let config = ConfigLoader::new()
            .load_with(lookup_from(&[(CONFIG_ENV, &path)]))
            .unwrap();

        assert_eq!(config.core.queues, 16);
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[core]\nport = 8080\npusher_max = 4").unwrap();

        let config = ConfigLoader::with_path(file.path())
            .load_with(lookup_from(&[
                ("PN_PORT", "9090"),
                ("PN_IOS_ENABLED", "true"),
                ("PN_ANDROID_APIKEY", "from-env"),
                ("PN_LOG_LEVEL", "debug"),
            ]))
            .unwrap();

        assert_eq!(config.core.port, 9090);
        assert_eq!(config.core.pusher_max, 4);
        assert!(config.ios.enabled);
        assert_eq!(config.android.apikey, "from-env");
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_unparsable_override_is_ignored() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[core]\nworkers = 3").unwrap();

        let config = ConfigLoader::with_path(file.path())
            .load_with(lookup_from(&[("PN_WORKERS", "many")]))
            .unwrap();

        assert_eq!(config.core.workers, 3);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[core\nport = ").unwrap();

        let result = ConfigLoader::with_path(file.path()).load_with(lookup_from(&[]));
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
