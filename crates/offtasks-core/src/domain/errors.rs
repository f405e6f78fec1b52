//! Errors - エラー型と分類
//!
//! バックエンドのエラーは構造化されたコードを当てにできないので、
//! メッセージ文字列の部分一致で「列が存在しない」を判定する。

use thiserror::Error;

/// An error reported by the hosted backend.
///
/// `message` is the plain text the backend returned. The schema shim matches
/// column names against it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
    pub code: Option<String>,
    pub status: Option<u16>,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            status: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Case-insensitive substring match of `column` in the message.
    pub fn mentions(&self, column: &str) -> bool {
        !column.is_empty()
            && self
                .message
                .to_ascii_lowercase()
                .contains(&column.to_ascii_lowercase())
    }

    pub fn is_auth(&self) -> bool {
        matches!(self.status, Some(401 | 403))
    }
}

/// ErrorKind はエラーの運用分類
///
/// - Schema: 列名の食い違い（wrapper が吸収しきれなかったもの）
/// - Auth: 認証エラー（自動リトライしない）
/// - Backend: ネットワーク・バリデーションなどその他のバックエンドエラー
/// - Session: サインインしていない
/// - Invalid: 呼び出し側の入力が不正
/// - Config: 設定の不備
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Schema,
    Auth,
    Backend,
    Session,
    Invalid,
    Config,
}

#[derive(Debug, Error)]
pub enum OfftasksError {
    #[error("not signed in")]
    NotSignedIn,

    #[error("invalid task: {0}")]
    InvalidTask(String),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl OfftasksError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OfftasksError::NotSignedIn => ErrorKind::Session,
            OfftasksError::InvalidTask(_) => ErrorKind::Invalid,
            OfftasksError::Backend(e) if e.is_auth() => ErrorKind::Auth,
            OfftasksError::Backend(e)
                if matches!(e.code.as_deref(), Some(UNDEFINED_COLUMN | UNDEFINED_COLUMN_PG)) =>
            {
                ErrorKind::Schema
            }
            OfftasksError::Backend(_) => ErrorKind::Backend,
            OfftasksError::Config(_) => ErrorKind::Config,
        }
    }
}

/// PostgREST code for "column not in the schema cache".
pub const UNDEFINED_COLUMN: &str = "PGRST204";
/// Postgres SQLSTATE for "column does not exist".
pub const UNDEFINED_COLUMN_PG: &str = "42703";
