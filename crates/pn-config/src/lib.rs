//! Push Relay Configuration System
//!
//! TOML-based configuration with environment variable overrides. Every section
//! falls back to its defaults, so an empty file (or no file) is a valid config
//! with all platforms disabled.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

mod loader;

pub use loader::ConfigLoader;

/// Placeholder written over secrets by [`AppConfig::redacted`].
pub const REDACTED: &str = "...";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Root application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct AppConfig {
    pub core: CoreConfig,
    pub ios: IosConfig,
    pub android: AndroidConfig,
    pub fcm_v1: FcmV1Config,
    pub log: LogConfig,
}

/// Server and dispatch engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct CoreConfig {
    pub host: String,
    pub port: u16,
    /// Number of dispatch workers
    pub workers: usize,
    /// Dispatch queue capacity
    pub queues: usize,
    /// Maximum notifications per `/push` request
    pub notification_max: usize,
    /// Ceiling for detached dispatches; 0 disables them
    pub pusher_max: i64,
    /// Seconds allowed for in-flight HTTP requests on shutdown
    pub shutdown_timeout: u64,
    pub allows_empty_message: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 1056,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            queues: 512,
            notification_max: 100,
            pusher_max: 0,
            shutdown_timeout: 30,
            allows_empty_message: false,
        }
    }
}

/// APNs settings. Exactly one of certificate or provider token credentials
/// must be set when enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct IosConfig {
    pub enabled: bool,
    pub pem_cert_path: String,
    pub pem_key_path: String,
    pub pem_key_passphrase: String,
    pub token_auth_key_path: String,
    pub token_auth_key_id: String,
    pub token_auth_team_id: String,
    pub sandbox: bool,
    pub topic: String,
    pub apns_id: String,
    /// Overrides the sandbox/production host
    pub endpoint: String,
    pub timeout: u64,
    pub keepalive_timeout: u64,
    pub keepalive_conns: usize,
    pub retry_max: u32,
}

impl Default for IosConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            pem_cert_path: String::new(),
            pem_key_path: String::new(),
            pem_key_passphrase: String::new(),
            token_auth_key_path: String::new(),
            token_auth_key_id: String::new(),
            token_auth_team_id: String::new(),
            sandbox: true,
            topic: String::new(),
            apns_id: String::new(),
            endpoint: String::new(),
            timeout: 5,
            keepalive_timeout: 90,
            keepalive_conns: 8,
            retry_max: 1,
        }
    }
}

impl IosConfig {
    pub fn is_certificate_based(&self) -> bool {
        !self.pem_cert_path.is_empty() && !self.pem_key_path.is_empty()
    }

    pub fn is_token_based(&self) -> bool {
        !self.token_auth_key_path.is_empty()
            && !self.token_auth_key_id.is_empty()
            && !self.token_auth_team_id.is_empty()
    }
}

/// Legacy GCM/FCM HTTP settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct AndroidConfig {
    pub enabled: bool,
    pub apikey: String,
    /// Send through the FCM endpoint instead of the GCM one
    pub use_fcm: bool,
    /// Overrides the endpoint selected by `use_fcm`
    pub endpoint: String,
    pub timeout: u64,
    pub keepalive_timeout: u64,
    pub keepalive_conns: usize,
    pub retry_max: u32,
}

impl Default for AndroidConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            apikey: String::new(),
            use_fcm: true,
            endpoint: String::new(),
            timeout: 5,
            keepalive_timeout: 90,
            keepalive_conns: 4,
            retry_max: 1,
        }
    }
}

/// FCM HTTP v1 settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct FcmV1Config {
    pub enabled: bool,
    pub project_id: String,
    /// Service account JSON used to mint OAuth2 access tokens
    pub credentials_file: String,
    /// Static bearer token, used when no credentials file is set
    pub access_token: String,
    pub endpoint: String,
    pub timeout: u64,
    pub keepalive_timeout: u64,
    pub keepalive_conns: usize,
    pub retry_max: u32,
}

impl Default for FcmV1Config {
    fn default() -> Self {
        Self {
            enabled: false,
            project_id: String::new(),
            credentials_file: String::new(),
            access_token: String::new(),
            endpoint: "https://fcm.googleapis.com".to_string(),
            timeout: 5,
            keepalive_timeout: 90,
            keepalive_conns: 4,
            retry_max: 1,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

/// TCP keepalive probe interval for a given idle keepalive timeout (seconds).
///
/// Short timeouts are used as-is; longer ones probe at a third of the
/// timeout, clamped to 30..=90 seconds.
pub fn keepalive_interval(keepalive_timeout: u64) -> Duration {
    const MIN_INTERVAL: u64 = 30;
    const MAX_INTERVAL: u64 = 90;

    if keepalive_timeout <= MIN_INTERVAL {
        return Duration::from_secs(keepalive_timeout);
    }
    Duration::from_secs((keepalive_timeout / 3).clamp(MIN_INTERVAL, MAX_INTERVAL))
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration from the standard locations with environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load()
    }

    /// Check settings that would otherwise fail at the first push.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let core = &self.core;
        if core.workers == 0 {
            return Err(invalid("core.workers must be greater than 0"));
        }
        if core.queues == 0 {
            return Err(invalid("core.queues must be greater than 0"));
        }
        if core.notification_max == 0 {
            return Err(invalid("core.notification_max must be greater than 0"));
        }
        if core.pusher_max < 0 {
            return Err(invalid("core.pusher_max must not be negative"));
        }

        if self.ios.enabled {
            match (self.ios.is_certificate_based(), self.ios.is_token_based()) {
                (true, true) => {
                    return Err(invalid(
                        "ios: set either pem_cert_path/pem_key_path or token_auth_* settings, not both",
                    ))
                }
                (false, false) => {
                    return Err(invalid(
                        "ios: pem_cert_path/pem_key_path or token_auth_key_path/token_auth_key_id/token_auth_team_id are required",
                    ))
                }
                _ => {}
            }
            if self.ios.is_token_based() && self.ios.topic.is_empty() {
                return Err(invalid("ios: topic is required for token based authentication"));
            }
        }

        if self.android.enabled && self.android.apikey.is_empty() {
            return Err(invalid("android: apikey is required"));
        }

        if self.fcm_v1.enabled {
            if self.fcm_v1.project_id.is_empty() {
                return Err(invalid("fcm_v1: project_id is required"));
            }
            if self.fcm_v1.credentials_file.is_empty() && self.fcm_v1.access_token.is_empty() {
                return Err(invalid("fcm_v1: credentials_file or access_token is required"));
            }
        }

        Ok(())
    }

    /// Copy of the configuration safe to expose over HTTP.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        redact(&mut config.ios.pem_key_passphrase);
        redact(&mut config.android.apikey);
        redact(&mut config.fcm_v1.access_token);
        config
    }

    /// Generate an example TOML configuration
    pub fn example_toml() -> String {
        r#"# Push relay configuration
# PN_* environment variables override these settings

[core]
host = "0.0.0.0"
port = 1056
workers = 8
queues = 512
notification_max = 100
pusher_max = 0
shutdown_timeout = 30
allows_empty_message = false

[ios]
enabled = true
pem_cert_path = "cert.pem"
pem_key_path = "key.pem"
sandbox = true
topic = "com.example.app"
timeout = 5
keepalive_timeout = 90
keepalive_conns = 8
retry_max = 1

[android]
enabled = true
apikey = "server-key"
use_fcm = true
timeout = 5
retry_max = 1

[fcm_v1]
enabled = false
project_id = ""
credentials_file = ""

[log]
level = "info"
"#
        .to_string()
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}

fn redact(secret: &mut String) {
    if !secret.is_empty() {
        *secret = REDACTED.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.core.port, 1056);
        assert_eq!(config.core.queues, 512);
        assert_eq!(config.core.notification_max, 100);
        assert_eq!(config.core.pusher_max, 0);
        assert!(config.core.workers > 0);
        assert!(!config.ios.enabled);
        assert!(config.ios.sandbox);
        assert!(config.android.use_fcm);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_example_toml_parses() {
        let config = AppConfig::from_toml_str(&AppConfig::example_toml()).unwrap();
        assert_eq!(config.core.workers, 8);
        assert!(config.ios.is_certificate_based());
        assert!(!config.ios.is_token_based());
        assert_eq!(config.android.apikey, "server-key");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config = AppConfig::from_toml_str("[core]\nqueues = 8\n").unwrap();
        assert_eq!(config.core.queues, 8);
        assert_eq!(config.core.port, 1056);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_validate_rejects_missing_credentials() {
        let mut config = AppConfig::default();
        config.ios.enabled = true;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        let mut config = AppConfig::default();
        config.android.enabled = true;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.fcm_v1.enabled = true;
        config.fcm_v1.project_id = "demo".to_string();
        assert!(config.validate().is_err());
        config.fcm_v1.access_token = "token".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_both_ios_credentials() {
        let mut config = AppConfig::default();
        config.ios.enabled = true;
        config.ios.pem_cert_path = "cert.pem".to_string();
        config.ios.pem_key_path = "key.pem".to_string();
        config.ios.token_auth_key_path = "AuthKey.p8".to_string();
        config.ios.token_auth_key_id = "KEYID".to_string();
        config.ios.token_auth_team_id = "TEAMID".to_string();
        config.ios.topic = "com.example".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        let mut config = AppConfig::default();
        config.core.queues = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.core.pusher_max = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_redacted_masks_secrets_only_when_set() {
        let mut config = AppConfig::default();
        config.android.apikey = "secret".to_string();
        config.ios.topic = "com.example".to_string();

        let redacted = config.redacted();
        assert_eq!(redacted.android.apikey, REDACTED);
        assert_eq!(redacted.fcm_v1.access_token, "");
        assert_eq!(redacted.ios.topic, "com.example");
        assert_eq!(config.android.apikey, "secret");
    }

    #[test]
    fn test_keepalive_interval() {
        assert_eq!(keepalive_interval(10), Duration::from_secs(10));
        assert_eq!(keepalive_interval(60), Duration::from_secs(30));
        assert_eq!(keepalive_interval(150), Duration::from_secs(50));
        assert_eq!(keepalive_interval(600), Duration::from_secs(90));
    }
}
