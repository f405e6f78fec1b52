//! TaskMutator - 列名の揺れに耐える create/update/delete
//!
//! # フロー
//! 1. ColumnResolver で completion / label の物理列名を決める
//! 2. その列名で Row を組み立てて送る
//! 3. 失敗したら FallbackPolicy に聞いて、任意列を落とす（または改名する）
//! 4. 上限回数に達したら最後のエラーを返す
//!
//! 成功しても値は返さない。呼び出し側が取り直す。

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::domain::{BackendError, NewTask, OfftasksError, TaskId, TaskPatch, UserId, format_date};
use crate::ports::{Clock, Row, TaskBackend};
use crate::schema::{
    Adjustment, COMPLETED_AT, ColumnResolver, FallbackPolicy, LogicalColumn, WriteColumns,
};

enum WriteTarget<'a> {
    Insert,
    Update { owner: &'a UserId, id: &'a TaskId },
}

impl WriteTarget<'_> {
    fn name(&self) -> &'static str {
        match self {
            WriteTarget::Insert => "insert",
            WriteTarget::Update { .. } => "update",
        }
    }
}

pub struct TaskMutator {
    backend: Arc<dyn TaskBackend>,
    resolver: Arc<ColumnResolver>,
    clock: Arc<dyn Clock>,
    policy: FallbackPolicy,
}

impl TaskMutator {
    pub fn new(
        backend: Arc<dyn TaskBackend>,
        resolver: Arc<ColumnResolver>,
        clock: Arc<dyn Clock>,
        policy: FallbackPolicy,
    ) -> Self {
        Self {
            backend,
            resolver,
            clock,
            policy,
        }
    }

    /// Inserts a new open task owned by `owner`.
    pub async fn create(&self, owner: &UserId, task: NewTask) -> Result<(), OfftasksError> {
        let content = task.content.trim();
        if content.is_empty() {
            return Err(OfftasksError::InvalidTask("content must not be empty".into()));
        }

        let columns = self.resolver.resolve_all(self.backend.as_ref(), owner).await?;
        let date = task
            .date
            .unwrap_or_else(|| task.group.default_date(self.clock.today()));

        let mut row = Row::new();
        row.insert("content".into(), json!(content));
        row.insert(columns.completion.clone(), json!(false));
        row.insert("priority".into(), json!(task.priority.as_u8()));
        row.insert("group".into(), json!(task.group.as_str()));
        row.insert("date".into(), json!(format_date(date)));
        row.insert("user_id".into(), json!(owner.as_str()));
        if let Some(label) = task.label.filter(|l| !l.trim().is_empty()) {
            row.insert(columns.label.clone(), json!(label));
        }

        self.write_with_fallback(
            WriteTarget::Insert,
            row,
            &columns,
            self.policy.max_create_attempts,
        )
        .await
    }

    /// Applies a partial update. An empty patch sends nothing.
    pub async fn update(
        &self,
        owner: &UserId,
        id: &TaskId,
        patch: TaskPatch,
    ) -> Result<(), OfftasksError> {
        if patch.is_empty() {
            debug!(task_id = %id, "empty patch, nothing to write");
            return Ok(());
        }
        if let Some(content) = &patch.content
            && content.trim().is_empty()
        {
            return Err(OfftasksError::InvalidTask("content must not be empty".into()));
        }

        // 触らない列のために probe はしない
        let mut columns = WriteColumns::default();
        if patch.completed.is_some() {
            columns.completion = self
                .resolver
                .resolve(self.backend.as_ref(), owner, LogicalColumn::Completion)
                .await?
                .to_string();
        }
        if patch.label.is_some() {
            columns.label = self
                .resolver
                .resolve(self.backend.as_ref(), owner, LogicalColumn::Label)
                .await?
                .to_string();
        }

        let row = patch_row(patch, &columns);
        self.write_with_fallback(
            WriteTarget::Update { owner, id },
            row,
            &columns,
            self.policy.max_update_attempts,
        )
        .await
    }

    /// Hard delete. No retries.
    pub async fn delete(&self, owner: &UserId, id: &TaskId) -> Result<(), OfftasksError> {
        self.backend.delete(owner, id).await?;
        Ok(())
    }

    async fn write_with_fallback(
        &self,
        target: WriteTarget<'_>,
        mut row: Row,
        columns: &WriteColumns,
        max_attempts: u32,
    ) -> Result<(), OfftasksError> {
        let mut attempts = 0;
        let mut renamed = false;
        loop {
            attempts += 1;
            let err = match self.send(&target, row.clone()).await {
                Ok(()) => {
                    if attempts > 1 {
                        debug!(op = target.name(), attempts, "write succeeded after fallback");
                    }
                    return Ok(());
                }
                Err(err) => err,
            };

            if attempts >= max_attempts.max(1) {
                warn!(op = target.name(), attempts, error = %err, "giving up on write");
                return Err(err.into());
            }
            let Some(adjustment) = self.policy.adjustment_for(&err, &row, columns, renamed) else {
                return Err(err.into());
            };

            warn!(op = target.name(), attempts, %adjustment, error = %err, "retrying write");
            if matches!(adjustment, Adjustment::Rename { .. }) {
                renamed = true;
            }
            adjustment.apply(&mut row);

            if row.is_empty() {
                // 任意列だけの更新だった。書くものが残っていない
                debug!(op = target.name(), "payload empty after fallback");
                return Ok(());
            }
        }
    }

    async fn send(&self, target: &WriteTarget<'_>, row: Row) -> Result<(), BackendError> {
        match target {
            WriteTarget::Insert => self.backend.insert(row).await,
            WriteTarget::Update { owner, id } => self.backend.update(owner, id, row).await,
        }
    }
}

fn patch_row(patch: TaskPatch, columns: &WriteColumns) -> Row {
    let mut row = Row::new();
    if let Some(content) = patch.content {
        row.insert("content".into(), json!(content.trim()));
    }
    if let Some(completed) = patch.completed {
        row.insert(columns.completion.clone(), json!(completed));
    }
    if let Some(priority) = patch.priority {
        row.insert("priority".into(), json!(priority.as_u8()));
    }
    if let Some(group) = patch.group {
        row.insert("group".into(), json!(group.as_str()));
    }
    if let Some(date) = patch.date {
        row.insert("date".into(), json!(date));
    }
    if let Some(label) = patch.label {
        row.insert(columns.label.clone(), label.map(Value::from).unwrap_or(Value::Null));
    }
    if let Some(completed_at) = patch.completed_at {
        let value = completed_at
            .map(|at| Value::from(at.to_rfc3339()))
            .unwrap_or(Value::Null);
        row.insert(COMPLETED_AT.into(), value);
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Priority, TaskGroup};
    use crate::impls::{InMemoryBackend, SchemaVariant};
    use crate::ports::FixedClock;
    use chrono::NaiveDate;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn owner() -> UserId {
        UserId::new("user-1")
    }

    fn mutator(backend: &Arc<InMemoryBackend>) -> TaskMutator {
        TaskMutator::new(
            backend.clone(),
            Arc::new(ColumnResolver::new()),
            Arc::new(FixedClock::on(today())),
            FallbackPolicy::default(),
        )
    }

    #[tokio::test]
    async fn create_writes_label_under_category_column() {
        let backend = Arc::new(InMemoryBackend::new(SchemaVariant::snake_case()));
        let mutator = mutator(&backend);

        mutator
            .create(&owner(), NewTask::new("Ship it", TaskGroup::Today).with_label("Work"))
            .await
            .unwrap();

        let rows = backend.rows().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["category"], "Work");
        assert_eq!(rows[0]["is_complete"], false);
        assert!(!rows[0].contains_key("label"));
    }

    #[tokio::test]
    async fn create_stamps_default_date_and_owner() {
        let backend = Arc::new(InMemoryBackend::new(SchemaVariant::camel_case()));
        let mutator = mutator(&backend);

        mutator
            .create(
                &owner(),
                NewTask::new("  plan trip  ", TaskGroup::Tomorrow).with_priority(Priority::High),
            )
            .await
            .unwrap();

        let tasks = backend.tasks().await;
        assert_eq!(tasks[0].content, "plan trip");
        assert_eq!(tasks[0].date, "2026-10-17");
        assert_eq!(tasks[0].priority, Priority::High);
        assert_eq!(tasks[0].user_id, Some(owner()));
        assert!(!tasks[0].completed);
    }

    #[tokio::test]
    async fn create_rejects_blank_content_before_any_call() {
        let backend = Arc::new(InMemoryBackend::new(SchemaVariant::camel_case()));
        let mutator = mutator(&backend);

        let err = mutator
            .create(&owner(), NewTask::new("   ", TaskGroup::Today))
            .await
            .unwrap_err();

        assert!(matches!(err, OfftasksError::InvalidTask(_)));
        assert!(backend.probed_columns().await.is_empty());
        assert_eq!(backend.write_attempts().await, 0);
    }

    #[tokio::test]
    async fn create_drops_label_when_backend_has_no_label_column() {
        // legacy: label も category もない。probe は category にフォールバックする
        let backend = Arc::new(InMemoryBackend::new(SchemaVariant::legacy()));
        let mutator = mutator(&backend);

        mutator
            .create(&owner(), NewTask::new("x", TaskGroup::Today).with_label("Work"))
            .await
            .unwrap();

        assert_eq!(backend.write_attempts().await, 2);
        let tasks = backend.tasks().await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].label, None);
    }

    #[tokio::test]
    async fn update_retries_without_label_on_label_error() {
        let backend = Arc::new(InMemoryBackend::new(SchemaVariant::camel_case()));
        let mutator = mutator(&backend);
        let id = backend.seed_task(&owner(), "x", TaskGroup::Today, "2026-10-16").await;
        backend
            .reject_writes_mentioning("label", "Could not find the 'label' column of 'tasks'")
            .await;

        let patch = TaskPatch {
            label: Some(Some("Work".into())),
            priority: Some(Priority::Low),
            ..TaskPatch::default()
        };
        mutator.update(&owner(), &id, patch).await.unwrap();

        assert_eq!(backend.write_attempts().await, 2);
        let task = backend.task(&id).await.unwrap();
        assert_eq!(task.priority, Priority::Low);
        assert_eq!(task.label, None);
    }

    #[tokio::test]
    async fn update_strips_completed_at_when_column_missing() {
        let backend = Arc::new(InMemoryBackend::new(SchemaVariant::snake_case()));
        let mutator = mutator(&backend);
        let id = backend.seed_task(&owner(), "x", TaskGroup::Today, "2026-10-16").await;

        let at = FixedClock::on(today()).now();
        mutator
            .update(&owner(), &id, TaskPatch::completion(true, at))
            .await
            .unwrap();

        let task = backend.task(&id).await.unwrap();
        assert!(task.completed);
        assert_eq!(task.completed_at, None);
    }

    #[tokio::test]
    async fn update_gives_up_after_three_attempts() {
        let backend = Arc::new(InMemoryBackend::new(SchemaVariant::camel_case()));
        let mutator = mutator(&backend);
        let id = backend.seed_task(&owner(), "x", TaskGroup::Today, "2026-10-16").await;
        backend
            .fail_writes_with("label completed_at isComplete: everything is broken")
            .await;

        let patch = TaskPatch {
            label: Some(Some("Work".into())),
            ..TaskPatch::completion(true, FixedClock::on(today()).now())
        };
        let err = mutator.update(&owner(), &id, patch).await.unwrap_err();

        assert!(matches!(err, OfftasksError::Backend(_)));
        assert_eq!(backend.write_attempts().await, 3);
    }

    #[tokio::test]
    async fn create_gives_up_after_three_attempts() {
        let backend = Arc::new(InMemoryBackend::new(SchemaVariant::camel_case()));
        let mutator = mutator(&backend);
        backend
            .fail_writes_with("label isComplete: everything is broken")
            .await;

        let err = mutator
            .create(&owner(), NewTask::new("x", TaskGroup::Today).with_label("Work"))
            .await
            .unwrap_err();

        assert!(matches!(err, OfftasksError::Backend(ref e) if e.mentions("label")));
        assert_eq!(backend.write_attempts().await, 3);
        assert!(backend.rows().await.is_empty());
    }

    #[tokio::test]
    async fn create_cap_comes_from_the_policy() {
        let backend = Arc::new(InMemoryBackend::new(SchemaVariant::camel_case()));
        let mutator = TaskMutator::new(
            backend.clone(),
            Arc::new(ColumnResolver::new()),
            Arc::new(FixedClock::on(today())),
            FallbackPolicy {
                max_create_attempts: 1,
                ..FallbackPolicy::default()
            },
        );
        backend.fail_writes_with("label is not writable").await;

        let result = mutator
            .create(&owner(), NewTask::new("x", TaskGroup::Today).with_label("Work"))
            .await;

        assert!(result.is_err());
        assert_eq!(backend.write_attempts().await, 1);
    }

    #[tokio::test]
    async fn unrelated_write_errors_are_not_retried() {
        let backend = Arc::new(InMemoryBackend::new(SchemaVariant::camel_case()));
        let mutator = mutator(&backend);
        let id = backend.seed_task(&owner(), "x", TaskGroup::Today, "2026-10-16").await;
        backend.fail_writes_with("permission denied for table tasks").await;

        let err = mutator
            .update(&owner(), &id, TaskPatch::move_to(TaskGroup::Close))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "backend error: permission denied for table tasks");
        assert_eq!(backend.write_attempts().await, 1);
    }

    #[tokio::test]
    async fn update_only_probes_columns_it_writes() {
        let backend = Arc::new(InMemoryBackend::new(SchemaVariant::camel_case()));
        let mutator = mutator(&backend);
        let id = backend.seed_task(&owner(), "x", TaskGroup::Tomorrow, "2026-10-15").await;

        mutator
            .update(&owner(), &id, TaskPatch::move_to(TaskGroup::Today))
            .await
            .unwrap();

        assert!(backend.probed_columns().await.is_empty());
        assert_eq!(backend.task(&id).await.unwrap().group, TaskGroup::Today);
    }

    #[tokio::test]
    async fn label_only_update_is_dropped_silently() {
        let backend = Arc::new(InMemoryBackend::new(SchemaVariant::legacy()));
        let mutator = mutator(&backend);
        let id = backend.seed_task(&owner(), "x", TaskGroup::Today, "2026-10-16").await;

        let patch = TaskPatch {
            label: Some(Some("Home".into())),
            ..TaskPatch::default()
        };
        mutator.update(&owner(), &id, patch).await.unwrap();

        assert_eq!(backend.write_attempts().await, 1);
    }
}
