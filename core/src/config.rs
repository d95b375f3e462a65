//! File-based client configuration.
//!
//! ```json
//! {
//!   "hostname": "https://crm.example.com",
//!   "proxy": "http://127.0.0.1:8888",
//!   "insecureSkipVerify": true,
//!   "timeoutSecs": 30,
//!   "retryCount": 2,
//!   "retryWaitMs": 500
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transport::TransportConfig;

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "CRM_CLIENT_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "testdata/config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Base URL of the CRM, e.g. `https://crm.example.com`.
    pub hostname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    #[serde(default)]
    pub insecure_skip_verify: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub retry_wait_ms: u64,
}

impl ClientConfig {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            proxy: None,
            insecure_skip_verify: false,
            timeout_secs: None,
            retry_count: 0,
            retry_wait_ms: 0,
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from the file named by `CRM_CLIENT_CONFIG`, falling back to
    /// `testdata/config.json`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::from_file(path)
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            insecure_skip_verify: self.insecure_skip_verify,
            proxy: self.proxy.clone().filter(|p| !p.is_empty()),
            timeout: self.timeout_secs.map(Duration::from_secs),
            retry_count: self.retry_count,
            retry_wait: Duration::from_millis(self.retry_wait_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg: ClientConfig = serde_json::from_str(r#"{"hostname":"http://crm.local"}"#).unwrap();
        assert_eq!(cfg, ClientConfig::new("http://crm.local"));
        assert_eq!(cfg.transport_config(), TransportConfig::default());
    }

    #[test]
    fn full_config_maps_to_transport() {
        let cfg: ClientConfig = serde_json::from_str(
            r#"{
                "hostname": "https://crm.example.com",
                "proxy": "http://127.0.0.1:8888",
                "insecureSkipVerify": true,
                "timeoutSecs": 30,
                "retryCount": 2,
                "retryWaitMs": 500
            }"#,
        )
        .unwrap();
        let transport = cfg.transport_config();
        assert!(transport.insecure_skip_verify);
        assert_eq!(transport.proxy.as_deref(), Some("http://127.0.0.1:8888"));
        assert_eq!(transport.timeout, Some(Duration::from_secs(30)));
        assert_eq!(transport.retry_count, 2);
        assert_eq!(transport.retry_wait, Duration::from_millis(500));
    }

    #[test]
    fn empty_proxy_is_ignored() {
        let mut cfg = ClientConfig::new("http://crm.local");
        cfg.proxy = Some(String::new());
        assert!(cfg.transport_config().proxy.is_none());
    }

    #[test]
    fn from_file_reads_json() {
        let path = std::env::temp_dir().join(format!("crm-config-{}.json", uuid::Uuid::new_v4()));
        fs::write(&path, r#"{"hostname":"http://crm.local","retryCount":1}"#).unwrap();
        let cfg = ClientConfig::from_file(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(cfg.hostname, "http://crm.local");
        assert_eq!(cfg.retry_count, 1);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = ClientConfig::from_file("/nonexistent/crm-config.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let path = std::env::temp_dir().join(format!("crm-config-{}.json", uuid::Uuid::new_v4()));
        fs::write(&path, "{not json").unwrap();
        let err = ClientConfig::from_file(&path).unwrap_err();
        fs::remove_file(&path).unwrap();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
