//! ColumnResolver - このバックエンドにはどの物理列があるか
//!
//! 論理列ごとに解決は 1 回だけ。resolver はアプリ（セッション）の開始時に作り、
//! そのセッションの間だけ生きる。

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::columns::{LogicalColumn, WriteColumns};
use crate::domain::{BackendError, UserId};
use crate::ports::TaskBackend;

#[derive(Debug, Default)]
pub struct ColumnResolver {
    completion: OnceCell<String>,
    label: OnceCell<String>,
}

impl ColumnResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves `column`, probing the backend only on first use.
    ///
    /// Concurrent first callers share a single probe sequence.
    pub async fn resolve(
        &self,
        backend: &dyn TaskBackend,
        owner: &UserId,
        column: LogicalColumn,
    ) -> Result<&str, BackendError> {
        let cell = self.cell(column);
        let name = cell
            .get_or_try_init(|| probe(backend, owner, column))
            .await?;
        Ok(name.as_str())
    }

    pub async fn resolve_all(
        &self,
        backend: &dyn TaskBackend,
        owner: &UserId,
    ) -> Result<WriteColumns, BackendError> {
        let completion = self
            .resolve(backend, owner, LogicalColumn::Completion)
            .await?
            .to_string();
        let label = self
            .resolve(backend, owner, LogicalColumn::Label)
            .await?
            .to_string();
        Ok(WriteColumns { completion, label })
    }

    /// The cached name, without probing.
    pub fn cached(&self, column: LogicalColumn) -> Option<&str> {
        self.cell(column).get().map(String::as_str)
    }

    fn cell(&self, column: LogicalColumn) -> &OnceCell<String> {
        match column {
            LogicalColumn::Completion => &self.completion,
            LogicalColumn::Label => &self.label,
        }
    }
}

async fn probe(
    backend: &dyn TaskBackend,
    owner: &UserId,
    column: LogicalColumn,
) -> Result<String, BackendError> {
    for candidate in column.candidates() {
        match backend.probe_column(owner, candidate).await {
            Ok(()) => {
                debug!(%column, candidate, "column resolved");
                return Ok((*candidate).to_string());
            }
            Err(err) if err.mentions(candidate) => {
                debug!(%column, candidate, error = %err, "candidate column missing");
            }
            Err(err) => return Err(err),
        }
    }

    let fallback = column.fallback();
    warn!(%column, fallback, "no candidate column confirmed, assuming fallback");
    Ok(fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{InMemoryBackend, SchemaVariant};
    use std::sync::Arc;

    fn owner() -> UserId {
        UserId::new("user-1")
    }

    #[tokio::test]
    async fn resolves_camel_case_first() {
        let backend = InMemoryBackend::new(SchemaVariant::camel_case());
        let resolver = ColumnResolver::new();

        let name = resolver
            .resolve(&backend, &owner(), LogicalColumn::Completion)
            .await
            .unwrap();

        assert_eq!(name, "isComplete");
        assert_eq!(backend.probed_columns().await, vec!["isComplete"]);
    }

    #[tokio::test]
    async fn falls_through_to_snake_case_and_caches() {
        let backend = InMemoryBackend::new(SchemaVariant::snake_case());
        let resolver = ColumnResolver::new();

        let first = resolver
            .resolve(&backend, &owner(), LogicalColumn::Completion)
            .await
            .unwrap()
            .to_string();
        let second = resolver
            .resolve(&backend, &owner(), LogicalColumn::Completion)
            .await
            .unwrap()
            .to_string();

        assert_eq!(first, "is_complete");
        assert_eq!(first, second);
        // 2 回目はキャッシュから
        assert_eq!(backend.probed_columns().await, vec!["isComplete", "is_complete"]);
        assert_eq!(resolver.cached(LogicalColumn::Completion), Some("is_complete"));
    }

    #[tokio::test]
    async fn label_resolves_to_category() {
        let backend = InMemoryBackend::new(SchemaVariant::snake_case());
        let resolver = ColumnResolver::new();

        let columns = resolver.resolve_all(&backend, &owner()).await.unwrap();

        assert_eq!(columns.label, "category");
    }

    #[tokio::test]
    async fn defaults_to_last_candidate_when_nothing_matches() {
        let backend = InMemoryBackend::new(SchemaVariant::legacy());
        let resolver = ColumnResolver::new();

        let name = resolver
            .resolve(&backend, &owner(), LogicalColumn::Label)
            .await
            .unwrap();

        assert_eq!(name, "category");
        assert_eq!(backend.probed_columns().await, vec!["label", "category"]);
    }

    #[tokio::test]
    async fn unrelated_errors_propagate_without_trying_further() {
        let backend = InMemoryBackend::new(SchemaVariant::snake_case());
        backend.fail_probes_with("JWT expired").await;
        let resolver = ColumnResolver::new();

        let err = resolver
            .resolve(&backend, &owner(), LogicalColumn::Completion)
            .await
            .unwrap_err();

        assert_eq!(err.message, "JWT expired");
        assert_eq!(backend.probed_columns().await, vec!["isComplete"]);
        // 失敗はキャッシュしない
        assert_eq!(resolver.cached(LogicalColumn::Completion), None);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_probe() {
        let backend = Arc::new(InMemoryBackend::new(SchemaVariant::snake_case()));
        let resolver = Arc::new(ColumnResolver::new());

        let calls = (0..8).map(|_| {
            let backend = Arc::clone(&backend);
            let resolver = Arc::clone(&resolver);
            tokio::spawn(async move {
                let owner = owner();
                resolver
                    .resolve(&*backend, &owner, LogicalColumn::Completion)
                    .await
                    .map(str::to_string)
            })
        });
        for call in futures::future::join_all(calls).await {
            assert_eq!(call.unwrap().unwrap(), "is_complete");
        }

        assert_eq!(backend.probed_columns().await.len(), 2);
    }
}
