//! TaskBackend port - ホスト型バックエンドの tasks テーブル
//!
//! バックエンドは行ストレージ・認証・realtime を提供する外部サービスで、
//! このクレートでは実装しない（impls に in-memory と REST のアダプタがある）。
//!
//! # 設計原則
//! - 書き込みは「物理列名 → 値」の JSON オブジェクト（Row）で渡す
//!   （どの列名で書くかは schema shim が決める）
//! - 読み込みは Task にデコードする（列名の揺れは TaskRow が吸収）
//! - エラーは BackendError。メッセージ文字列が shim の判定材料になる
//! - すべての操作は所有ユーザーでスコープされる

use async_trait::async_trait;

use crate::domain::{BackendError, Task, TaskGroup, TaskId, UserId};

/// 物理列名 → 値
pub type Row = serde_json::Map<String, serde_json::Value>;

#[async_trait]
pub trait TaskBackend: Send + Sync {
    /// `select <column> limit 1` をユーザーのスコープで実行する
    async fn probe_column(&self, owner: &UserId, column: &str) -> Result<(), BackendError>;

    /// 1 つの group の行をすべて取得
    async fn select_group(&self, owner: &UserId, group: TaskGroup)
    -> Result<Vec<Task>, BackendError>;

    async fn insert(&self, row: Row) -> Result<(), BackendError>;

    async fn update(&self, owner: &UserId, id: &TaskId, row: Row) -> Result<(), BackendError>;

    async fn delete(&self, owner: &UserId, id: &TaskId) -> Result<(), BackendError>;
}
