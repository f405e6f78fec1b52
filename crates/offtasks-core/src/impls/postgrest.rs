//! PostgrestBackend - Supabase 互換の REST エンドポイント
//!
//! `/rest/v1/<table>` に対して select / insert / update / delete を投げる。
//! エラー本文は `{ message, code, details, hint }` の JSON。
//! message と details をつないだ文字列が BackendError の message になり、
//! schema shim はそれを部分一致で見る。
//!
//! realtime（websocket）はここでは扱わない。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::{ConfigError, OfftasksConfig};
use crate::domain::{BackendError, Task, TaskGroup, TaskId, UserId};
use crate::ports::{Row, TaskBackend};

#[derive(Debug, Clone)]
pub struct PostgrestBackend {
    http: Client,
    endpoint: Url,
    anon_key: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    code: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

impl PostgrestBackend {
    pub fn new(
        base_url: &Url,
        table: &str,
        anon_key: impl Into<String>,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let endpoint = table_endpoint(base_url, table)?;
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("offtasks/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::Invalid {
                field: "http client",
                reason: e.to_string(),
            })?;
        let anon_key = anon_key.into();
        let access_token = access_token.unwrap_or_else(|| anon_key.clone());

        Ok(Self {
            http,
            endpoint,
            anon_key,
            access_token,
        })
    }

    pub fn from_config(config: &OfftasksConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let base_url = config.backend_url()?;
        let anon_key = config
            .anon_key
            .clone()
            .ok_or(ConfigError::Missing("anon_key"))?;
        Self::new(
            &base_url,
            &config.table,
            anon_key,
            config.access_token.clone(),
            config.request_timeout(),
        )
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn request(&self, method: Method) -> RequestBuilder {
        self.http
            .request(method, self.endpoint.clone())
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.access_token)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let res = request.send().await.map_err(map_reqwest_error)?;
        if res.status().is_success() {
            return Ok(res);
        }
        let status = res.status().as_u16();
        match res.text().await {
            Ok(body) => Err(parse_error_body(status, &body)),
            Err(e) => Err(unreadable_body(status, &e)),
        }
    }
}

fn table_endpoint(base_url: &Url, table: &str) -> Result<Url, ConfigError> {
    let mut base = base_url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(&format!("rest/v1/{}", table.trim()))
        .map_err(|e| ConfigError::Invalid {
            field: "backend_url",
            reason: e.to_string(),
        })
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

/// Turns a PostgREST error response into a [`BackendError`].
///
/// Non-JSON bodies are kept verbatim so column names in them still match.
fn parse_error_body(status: u16, body: &str) -> BackendError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => {
            let mut message = parsed.message.unwrap_or_else(|| format!("http {status}"));
            for extra in [parsed.details, parsed.hint].into_iter().flatten() {
                if !extra.is_empty() {
                    message.push_str(" (");
                    message.push_str(&extra);
                    message.push(')');
                }
            }
            let err = BackendError::new(message).with_status(status);
            match parsed.code {
                Some(code) => err.with_code(code),
                None => err,
            }
        }
        Err(_) if body.trim().is_empty() => {
            BackendError::new(format!("http {status}")).with_status(status)
        }
        Err(_) => BackendError::new(body.trim()).with_status(status),
    }
}

fn unreadable_body(status: u16, err: &dyn std::fmt::Display) -> BackendError {
    BackendError::new(format!("http {status}; failed to read error body: {err}"))
        .with_status(status)
}

fn map_reqwest_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::new("request timed out")
    } else {
        BackendError::new(format!("network error: {e}"))
    }
}

#[async_trait]
impl TaskBackend for PostgrestBackend {
    async fn probe_column(&self, owner: &UserId, column: &str) -> Result<(), BackendError> {
        debug!(column, "probing column");
        let request = self.request(Method::GET).query(&[
            ("select", column.to_string()),
            ("user_id", eq(owner.as_str())),
            ("limit", "1".to_string()),
        ]);
        self.send(request).await?;
        Ok(())
    }

    async fn select_group(
        &self,
        owner: &UserId,
        group: TaskGroup,
    ) -> Result<Vec<Task>, BackendError> {
        let request = self.request(Method::GET).query(&[
            ("select", "*".to_string()),
            ("user_id", eq(owner.as_str())),
            ("group", eq(group.as_str())),
            ("order", "date.asc".to_string()),
        ]);
        let res = self.send(request).await?;
        res.json::<Vec<Task>>()
            .await
            .map_err(|e| BackendError::new(format!("failed to decode tasks: {e}")))
    }

    async fn insert(&self, row: Row) -> Result<(), BackendError> {
        let request = self
            .request(Method::POST)
            .header("Prefer", "return=minimal")
            .json(&[row]);
        self.send(request).await?;
        Ok(())
    }

    async fn update(&self, owner: &UserId, id: &TaskId, row: Row) -> Result<(), BackendError> {
        let request = self
            .request(Method::PATCH)
            .header("Prefer", "return=minimal")
            .query(&[("id", eq(id.as_str())), ("user_id", eq(owner.as_str()))])
            .json(&row);
        self.send(request).await?;
        Ok(())
    }

    async fn delete(&self, owner: &UserId, id: &TaskId) -> Result<(), BackendError> {
        let request = self
            .request(Method::DELETE)
            .query(&[("id", eq(id.as_str())), ("user_id", eq(owner.as_str()))]);
        self.send(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_is_built_under_rest_v1() {
        let base = Url::parse("https://abc.supabase.co").unwrap();
        assert_eq!(
            table_endpoint(&base, "tasks").unwrap().as_str(),
            "https://abc.supabase.co/rest/v1/tasks"
        );

        // パス付きのベース URL（プロキシ経由など）
        let proxied = Url::parse("https://example.com/supabase").unwrap();
        assert_eq!(
            table_endpoint(&proxied, "todos").unwrap().as_str(),
            "https://example.com/supabase/rest/v1/todos"
        );
    }

    #[test]
    fn postgrest_error_bodies_keep_the_column_name() {
        let body = r#"{"code":"PGRST204","details":null,"hint":null,"message":"Could not find the 'label' column of 'tasks' in the schema cache"}"#;

        let err = parse_error_body(400, body);

        assert!(err.mentions("label"));
        assert_eq!(err.code.as_deref(), Some("PGRST204"));
        assert_eq!(err.status, Some(400));
    }

    #[test]
    fn details_and_hint_are_appended() {
        let body = r#"{"code":"42703","details":"column tasks.isComplete does not exist","hint":"Perhaps you meant \"tasks.is_complete\".","message":"column does not exist"}"#;

        let err = parse_error_body(400, body);

        assert!(err.mentions("isComplete"));
        assert!(err.message.starts_with("column does not exist ("));
    }

    #[test]
    fn non_json_bodies_are_kept_verbatim() {
        assert_eq!(parse_error_body(502, "Bad Gateway\n").message, "Bad Gateway");
        assert_eq!(parse_error_body(500, "").message, "http 500");
    }

    #[test]
    fn unreadable_bodies_keep_status_and_cause() {
        let err = unreadable_body(400, &"connection reset");

        assert_eq!(err.status, Some(400));
        assert!(err.message.contains("connection reset"));
    }

    #[test]
    fn from_config_requires_url_and_key() {
        let missing_url = OfftasksConfig::default();
        assert!(matches!(
            PostgrestBackend::from_config(&missing_url),
            Err(ConfigError::Missing("backend_url"))
        ));

        let missing_key = OfftasksConfig {
            backend_url: Some("https://abc.supabase.co".into()),
            ..OfftasksConfig::default()
        };
        assert!(matches!(
            PostgrestBackend::from_config(&missing_key),
            Err(ConfigError::Missing("anon_key"))
        ));

        let ok = OfftasksConfig {
            backend_url: Some("https://abc.supabase.co".into()),
            anon_key: Some("anon".into()),
            ..OfftasksConfig::default()
        };
        let backend = PostgrestBackend::from_config(&ok).unwrap();
        assert_eq!(backend.endpoint().path(), "/rest/v1/tasks");
    }
}
