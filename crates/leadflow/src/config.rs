//! Server configuration.
//!
//! Values come from an optional JSON file (`LEADFLOW_CONFIG`) and are then
//! overridden by environment variables.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::secrets::FreeTierKeySources;

/// Free-credit quota tracked by clients.
pub const MAX_FREE_CREDITS: u32 = 10;

/// Environment variable naming the JSON config file.
pub const CONFIG_PATH_ENV_VAR: &str = "LEADFLOW_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind: String,
    /// Workflow runner webhook. Without it every submission fails upstream.
    pub webhook_url: Option<String>,
    /// Whole-request timeout for the trigger call.
    pub trigger_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    /// Jobs untouched for this long are evicted.
    pub job_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub free_tier: FreeTierKeySources,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            webhook_url: None,
            trigger_timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            job_ttl_secs: 24 * 60 * 60,
            sweep_interval_secs: 5 * 60,
            free_tier: FreeTierKeySources::default(),
        }
    }
}

impl ServerConfig {
    /// Loads the config file named by `LEADFLOW_CONFIG` (if any), applies
    /// environment overrides and validates the result.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => load_config(path.trim())?,
            _ => ServerConfig::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(bind) = lookup("LEADFLOW_BIND") {
            self.bind = bind.trim().to_string();
        }
        if let Some(url) = lookup("N8N_WEBHOOK_URL").or_else(|| lookup("NEXT_PUBLIC_N8N_WEBHOOK_URL"))
        {
            self.webhook_url = Some(url.trim().to_string());
        }
        if let Some(value) = lookup("LEADFLOW_TRIGGER_TIMEOUT_MS") {
            self.trigger_timeout_ms = parse_u64("LEADFLOW_TRIGGER_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = lookup("LEADFLOW_JOB_TTL_SECS") {
            self.job_ttl_secs = parse_u64("LEADFLOW_JOB_TTL_SECS", &value)?;
        }
        if let Some(value) = lookup("LEADFLOW_SWEEP_INTERVAL_SECS") {
            self.sweep_interval_secs = parse_u64("LEADFLOW_SWEEP_INTERVAL_SECS", &value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Validation {
                message: format!("bind address '{}' is not a socket address", self.bind),
            });
        }
        if let Some(url) = &self.webhook_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Validation {
                    message: format!("webhook URL '{}' must be http(s)", url),
                });
            }
        }
        for (name, value) in [
            ("triggerTimeoutMs", self.trigger_timeout_ms),
            ("connectTimeoutMs", self.connect_timeout_ms),
            ("jobTtlSecs", self.job_ttl_secs),
            ("sweepIntervalSecs", self.sweep_interval_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Validation {
                    message: format!("{} must be greater than zero", name),
                });
            }
        }
        Ok(())
    }

    pub fn trigger_timeout(&self) -> Duration {
        Duration::from_millis(self.trigger_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn job_ttl(&self) -> Duration {
        Duration::from_secs(self.job_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ServerConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<ServerConfig, ConfigError> {
    let config: ServerConfig = serde_json::from_str(content)?;
    Ok(config)
}

fn parse_u64(name: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidEnv {
            name: name.to_string(),
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::SecretSource;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ServerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.trigger_timeout(), Duration::from_secs(30));
        assert_eq!(config.job_ttl(), Duration::from_secs(86_400));
        assert!(config.webhook_url.is_none());
    }

    #[test]
    fn test_load_config_from_str_partial() {
        let config = load_config_from_str(
            r#"{
                "webhookUrl": "https://n8n.example.com/webhook/enrich",
                "jobTtlSecs": 600,
                "freeTier": {
                    "magicalApi": {"value": "m"},
                    "prospeo": {"file": "/run/secrets/prospeo"},
                    "reoon": {"env": "REOON_KEY"}
                }
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.webhook_url.as_deref(),
            Some("https://n8n.example.com/webhook/enrich")
        );
        assert_eq!(config.job_ttl_secs, 600);
        assert_eq!(config.bind, "127.0.0.1:3000");
        assert_eq!(config.free_tier.reoon, SecretSource::env("REOON_KEY"));
    }

    #[test]
    fn test_load_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"bind": "0.0.0.0:8080"}}"#).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.bind, "0.0.0.0:8080");
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("/nonexistent/leadflow.json");
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }

    #[test]
    fn test_load_config_invalid_json() {
        let result = load_config_from_str("{not json");
        assert!(matches!(result, Err(ConfigError::ParseJson(_))));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ServerConfig::default();
        config
            .apply_overrides(lookup(&[
                ("LEADFLOW_BIND", "0.0.0.0:9000"),
                ("NEXT_PUBLIC_N8N_WEBHOOK_URL", "https://fallback.example.com/hook"),
                ("LEADFLOW_TRIGGER_TIMEOUT_MS", "1500"),
                ("LEADFLOW_SWEEP_INTERVAL_SECS", " 30 "),
            ]))
            .unwrap();

        assert_eq!(config.bind, "0.0.0.0:9000");
        assert_eq!(
            config.webhook_url.as_deref(),
            Some("https://fallback.example.com/hook")
        );
        assert_eq!(config.trigger_timeout_ms, 1500);
        assert_eq!(config.sweep_interval_secs, 30);
    }

    #[test]
    fn test_primary_webhook_var_wins() {
        let mut config = ServerConfig::default();
        config
            .apply_overrides(lookup(&[
                ("N8N_WEBHOOK_URL", "https://primary.example.com/hook"),
                ("NEXT_PUBLIC_N8N_WEBHOOK_URL", "https://fallback.example.com/hook"),
            ]))
            .unwrap();
        assert_eq!(
            config.webhook_url.as_deref(),
            Some("https://primary.example.com/hook")
        );
    }

    #[test]
    fn test_invalid_env_number() {
        let mut config = ServerConfig::default();
        let result = config.apply_overrides(lookup(&[("LEADFLOW_JOB_TTL_SECS", "a day")]));
        assert!(matches!(result, Err(ConfigError::InvalidEnv { .. })));
    }

    #[test]
    fn test_validation_failures() {
        let config = ServerConfig {
            webhook_url: Some("ftp://runner".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            job_ttl_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            bind: "localhost".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
