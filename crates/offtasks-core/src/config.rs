//! Config - 設定の読み込み
//!
//! バックエンドの場所、サインイン中のユーザー、リトライ上限を持つ。
//! TOML ファイル・`OFFTASKS_*` 環境変数のどちらか、または両方から読む
//! （環境変数が優先）。

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::schema::FallbackPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing config value: {0}")]
    Missing(&'static str),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OfftasksConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub backend_url: Option<String>,
    /// Public API key sent as `apikey`.
    pub anon_key: Option<String>,
    /// Access token of the signed-in user. Falls back to the anon key.
    pub access_token: Option<String>,
    /// Signed-in user. Absent means signed out.
    pub user_id: Option<String>,
    pub table: String,
    pub request_timeout_secs: u64,
    pub max_update_attempts: u32,
    pub max_create_attempts: u32,
}

impl Default for OfftasksConfig {
    fn default() -> Self {
        let policy = FallbackPolicy::default();
        Self {
            backend_url: None,
            anon_key: None,
            access_token: None,
            user_id: None,
            table: "tasks".to_string(),
            request_timeout_secs: 30,
            max_update_attempts: policy.max_update_attempts,
            max_create_attempts: policy.max_create_attempts,
        }
    }
}

impl OfftasksConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().merge_env()
    }

    /// Overrides fields from `OFFTASKS_*` environment variables.
    pub fn merge_env(self) -> Result<Self, ConfigError> {
        self.merge_from(|key| std::env::var(key).ok())
    }

    /// Same as [`merge_env`](Self::merge_env) with an injectable lookup.
    pub fn merge_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(v) = lookup("OFFTASKS_BACKEND_URL") {
            self.backend_url = Some(v);
        }
        if let Some(v) = lookup("OFFTASKS_ANON_KEY") {
            self.anon_key = Some(v);
        }
        if let Some(v) = lookup("OFFTASKS_ACCESS_TOKEN") {
            self.access_token = Some(v);
        }
        if let Some(v) = lookup("OFFTASKS_USER_ID") {
            self.user_id = Some(v);
        }
        if let Some(v) = lookup("OFFTASKS_TABLE") {
            self.table = v;
        }
        if let Some(v) = lookup("OFFTASKS_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_number("request_timeout_secs", &v)?;
        }
        if let Some(v) = lookup("OFFTASKS_MAX_UPDATE_ATTEMPTS") {
            self.max_update_attempts = parse_number("max_update_attempts", &v)?;
        }
        if let Some(v) = lookup("OFFTASKS_MAX_CREATE_ATTEMPTS") {
            self.max_create_attempts = parse_number("max_create_attempts", &v)?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_update_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "max_update_attempts",
                reason: "must be at least 1".into(),
            });
        }
        if self.max_create_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "max_create_attempts",
                reason: "must be at least 1".into(),
            });
        }
        if self.table.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "table",
                reason: "must not be empty".into(),
            });
        }
        if let Some(url) = &self.backend_url {
            Url::parse(url).map_err(|e| ConfigError::Invalid {
                field: "backend_url",
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Backend URL, required for the REST backend.
    pub fn backend_url(&self) -> Result<Url, ConfigError> {
        let raw = self
            .backend_url
            .as_deref()
            .ok_or(ConfigError::Missing("backend_url"))?;
        Url::parse(raw).map_err(|e| ConfigError::Invalid {
            field: "backend_url",
            reason: e.to_string(),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn fallback_policy(&self) -> FallbackPolicy {
        FallbackPolicy {
            max_update_attempts: self.max_update_attempts,
            max_create_attempts: self.max_create_attempts,
        }
    }
}

fn parse_number<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        field,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_the_fallback_policy() {
        let config = OfftasksConfig::default();

        assert_eq!(config.table, "tasks");
        assert_eq!(config.fallback_policy(), FallbackPolicy::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn toml_fills_missing_fields_with_defaults() {
        let config = OfftasksConfig::from_toml_str(
            r#"
            backend_url = "https://example.supabase.co"
            anon_key = "anon"
            max_update_attempts = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.max_update_attempts, 5);
        assert_eq!(config.max_create_attempts, 3);
        assert_eq!(config.backend_url().unwrap().host_str(), Some("example.supabase.co"));
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OFFTASKS_USER_ID", "user-9"),
            ("OFFTASKS_TABLE", "todos"),
            ("OFFTASKS_MAX_CREATE_ATTEMPTS", "2"),
        ]);
        let config = OfftasksConfig::from_toml_str("table = \"tasks\"")
            .unwrap()
            .merge_from(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.user_id.as_deref(), Some("user-9"));
        assert_eq!(config.table, "todos");
        assert_eq!(config.max_create_attempts, 2);
    }

    #[test]
    fn bad_values_are_reported_by_field() {
        let err = OfftasksConfig::default()
            .merge_from(|k| (k == "OFFTASKS_MAX_UPDATE_ATTEMPTS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "max_update_attempts", .. }));

        let zero = OfftasksConfig {
            max_update_attempts: 0,
            ..OfftasksConfig::default()
        };
        assert!(zero.validate().is_err());

        let bad_url = OfftasksConfig {
            backend_url: Some("not a url".into()),
            ..OfftasksConfig::default()
        };
        assert!(bad_url.validate().is_err());
        assert!(matches!(
            OfftasksConfig::default().backend_url(),
            Err(ConfigError::Missing("backend_url"))
        ));
    }
}
