//! Credentials for the downstream enrichment services.
//!
//! Callers on the paid tier send their own [`ApiKeys`]; free-tier requests get
//! the server-held keys instead. Server-held keys are resolved from one of
//! several sources in priority order:
//!
//! 1. **Direct value** - for quick local testing
//! 2. **File reference** - for the Docker secrets pattern (`/run/secrets/...`)
//! 3. **Env var reference** - for Kubernetes/production

use std::fs;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Error type for secret resolution failures.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need one of: direct value, file path, or env var name)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

/// Result type for secret resolution.
pub type Result<T> = std::result::Result<T, SecretError>;

/// Where a server-held secret comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretSource {
    /// Inline value. Takes priority over everything else.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// File whose trimmed contents are the secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Environment variable holding the secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
}

impl SecretSource {
    /// A source that only reads the named environment variable.
    pub fn env(name: &str) -> Self {
        Self {
            env: Some(name.to_string()),
            ..Default::default()
        }
    }

    /// Resolves the secret, trying value, then file, then env var.
    pub fn resolve(&self) -> Result<SecretString> {
        if let Some(value) = self.value.as_deref().filter(|v| !v.is_empty()) {
            return Ok(SecretString::from(value.to_string()));
        }

        if let Some(path) = self.file.as_deref().filter(|p| !p.is_empty()) {
            let expanded = expand_home(path);
            return fs::read_to_string(&expanded)
                .map(|content| SecretString::from(content.trim().to_string()))
                .map_err(|source| SecretError::FileReadError {
                    path: expanded,
                    source,
                });
        }

        if let Some(name) = self.env.as_deref().filter(|n| !n.is_empty()) {
            return match std::env::var(name) {
                // Env vars may carry trailing newlines
                Ok(value) => Ok(SecretString::from(value.trim())),
                Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                    name: name.to_string(),
                }),
                Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                    name: name.to_string(),
                }),
            };
        }

        Err(SecretError::NoSourceProvided)
    }

    /// Like [`resolve`](Self::resolve), but a missing source or unset env var
    /// yields `None` instead of an error.
    pub fn resolve_optional(&self) -> Result<Option<SecretString>> {
        match self.resolve() {
            Ok(secret) => Ok(Some(secret)),
            Err(SecretError::NoSourceProvided) | Err(SecretError::EnvVarNotSet { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Expands `~` and `~/path` to the user's home directory.
///
/// `~user/path` is not supported.
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

/// Credential bundle for the three downstream services, plus the optional
/// Apollo key used for search-URL scraping.
///
/// Values are only exposed when the bundle is serialized into the trigger
/// payload; `Debug` output is redacted.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeys {
    #[serde(serialize_with = "expose", deserialize_with = "conceal")]
    pub magical_api: SecretString,
    #[serde(serialize_with = "expose", deserialize_with = "conceal")]
    pub prospeo: SecretString,
    #[serde(serialize_with = "expose", deserialize_with = "conceal")]
    pub reoon: SecretString,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "expose_optional",
        deserialize_with = "conceal_optional"
    )]
    pub apollo: Option<SecretString>,
}

impl ApiKeys {
    pub fn new(magical_api: &str, prospeo: &str, reoon: &str) -> Self {
        Self {
            magical_api: SecretString::from(magical_api),
            prospeo: SecretString::from(prospeo),
            reoon: SecretString::from(reoon),
            apollo: None,
        }
    }

    /// Makes an independent copy of the bundle.
    pub fn duplicate(&self) -> Self {
        Self {
            magical_api: SecretString::from(self.magical_api.expose_secret()),
            prospeo: SecretString::from(self.prospeo.expose_secret()),
            reoon: SecretString::from(self.reoon.expose_secret()),
            apollo: self
                .apollo
                .as_ref()
                .map(|key| SecretString::from(key.expose_secret())),
        }
    }
}

/// Where the server-held free-tier keys come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeTierKeySources {
    pub magical_api: SecretSource,
    pub prospeo: SecretSource,
    pub reoon: SecretSource,
}

impl Default for FreeTierKeySources {
    fn default() -> Self {
        Self {
            magical_api: SecretSource::env("FREE_TIER_MAGICAL_API_KEY"),
            prospeo: SecretSource::env("FREE_TIER_PROSPEO_API_KEY"),
            reoon: SecretSource::env("FREE_TIER_REOON_API_KEY"),
        }
    }
}

impl FreeTierKeySources {
    /// Resolves all three keys. An unset key becomes an empty string and is
    /// logged; the runner then reports the failure through its callbacks.
    pub fn resolve(&self) -> Result<ApiKeys> {
        let resolve = |name: &str, source: &SecretSource| -> Result<SecretString> {
            match source.resolve_optional()? {
                Some(secret) => Ok(secret),
                None => {
                    log::warn!("Free-tier key '{}' is not configured", name);
                    Ok(SecretString::from(""))
                }
            }
        };

        Ok(ApiKeys {
            magical_api: resolve("magicalApi", &self.magical_api)?,
            prospeo: resolve("prospeo", &self.prospeo)?,
            reoon: resolve("reoon", &self.reoon)?,
            apollo: None,
        })
    }
}

fn expose<S: Serializer>(secret: &SecretString, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn expose_optional<S: Serializer>(
    secret: &Option<SecretString>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match secret {
        Some(secret) => serializer.serialize_some(secret.expose_secret()),
        None => serializer.serialize_none(),
    }
}

fn conceal<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

fn conceal_optional<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<SecretString>, D::Error> {
    Option::<String>::deserialize(deserializer).map(|s| s.map(SecretString::from))
}
