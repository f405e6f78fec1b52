//! InMemoryBackend - 開発・テスト用のバックエンド
//!
//! # 学習ポイント
//! - どの物理列が存在するかを SchemaVariant で切り替えられる
//! - 存在しない列への書き込みは PostgREST と同じ形のメッセージで失敗する
//! - 書き込みのたびに ChangeEvent を broadcast する
//! - 失敗の注入（probe / write / 特定行の update）

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::{Mutex, broadcast};

use crate::domain::{BackendError, ChangeEvent, Task, TaskGroup, TaskId, UserId};
use crate::domain::errors::{UNDEFINED_COLUMN, UNDEFINED_COLUMN_PG};
use crate::ports::{ChangeFeed, IdGenerator, Row, SystemClock, TaskBackend, UlidGenerator};
use crate::schema::COMPLETED_AT;

const TABLE: &str = "tasks";
const BASE_COLUMNS: [&str; 7] = ["id", "content", "priority", "group", "date", "user_id", "created_at"];

/// Which drifting columns a deployment has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaVariant {
    pub completion_column: String,
    pub label_column: Option<String>,
    pub has_completed_at: bool,
    /// Older spellings still present next to the live ones. Writes may
    /// target them, but nothing fills them in on its own.
    pub shadow_columns: Vec<String>,
}

impl SchemaVariant {
    /// `isComplete`, `label`, `completed_at`.
    pub fn camel_case() -> Self {
        Self {
            completion_column: "isComplete".into(),
            label_column: Some("label".into()),
            has_completed_at: true,
            shadow_columns: Vec::new(),
        }
    }

    /// `is_complete`, `category`, no `completed_at`.
    pub fn snake_case() -> Self {
        Self {
            completion_column: "is_complete".into(),
            label_column: Some("category".into()),
            has_completed_at: false,
            shadow_columns: Vec::new(),
        }
    }

    /// `is_complete` only; rows predate labels and timestamps.
    pub fn legacy() -> Self {
        Self {
            completion_column: "is_complete".into(),
            label_column: None,
            has_completed_at: false,
            shadow_columns: Vec::new(),
        }
    }

    /// A migrated table: camelCase columns plus the old `is_complete` and
    /// `category` left in place.
    pub fn dual() -> Self {
        Self {
            shadow_columns: vec!["is_complete".into(), "category".into()],
            ..Self::camel_case()
        }
    }

    fn columns(&self) -> HashSet<String> {
        let mut columns: HashSet<String> = BASE_COLUMNS.iter().map(|c| c.to_string()).collect();
        columns.insert(self.completion_column.clone());
        if let Some(label) = &self.label_column {
            columns.insert(label.clone());
        }
        if self.has_completed_at {
            columns.insert(COMPLETED_AT.to_string());
        }
        columns.extend(self.shadow_columns.iter().cloned());
        columns
    }
}

#[derive(Default)]
struct Faults {
    probe: Option<String>,
    write: Option<String>,
    /// (column, message): reject writes whose payload contains `column`.
    write_mentioning: Option<(String, String)>,
    update_rows: HashMap<TaskId, String>,
}

#[derive(Default)]
struct State {
    rows: Vec<Row>,
    probes: Vec<String>,
    write_attempts: usize,
    select_calls: usize,
    faults: Faults,
}

/// InMemoryBackend はテスト用のバックエンド
///
/// # 使用例
/// ```ignore
/// let backend = Arc::new(InMemoryBackend::new(SchemaVariant::snake_case()));
/// let id = backend.seed_task(&user, "call mom", TaskGroup::Tomorrow, "2026-10-15").await;
/// ```
pub struct InMemoryBackend {
    variant: SchemaVariant,
    columns: HashSet<String>,
    state: Mutex<State>,
    ids: Box<dyn IdGenerator>,
    events: broadcast::Sender<ChangeEvent>,
}

impl InMemoryBackend {
    pub fn new(variant: SchemaVariant) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            columns: variant.columns(),
            variant,
            state: Mutex::new(State::default()),
            ids: Box::new(UlidGenerator::new(SystemClock)),
            events,
        }
    }

    fn missing_column(column: &str) -> BackendError {
        BackendError::new(format!(
            "Could not find the '{column}' column of '{TABLE}' in the schema cache"
        ))
        .with_code(UNDEFINED_COLUMN)
        .with_status(400)
    }

    fn check_columns(&self, row: &Row) -> Result<(), BackendError> {
        // 順序を安定させる（Map は挿入順ではないことがある）
        let mut keys: Vec<&String> = row.keys().collect();
        keys.sort();
        match keys.into_iter().find(|k| !self.columns.contains(*k)) {
            Some(column) => Err(Self::missing_column(column)),
            None => Ok(()),
        }
    }

    fn emit(&self, event: ChangeEvent) {
        // 購読者がいなければ捨てる
        let _ = self.events.send(event);
    }

    /// Sends an update notification without touching data, as if another
    /// device wrote the row.
    pub fn notify_updated(&self, id: &TaskId) {
        self.emit(ChangeEvent::Updated(id.clone()));
    }

    /// Inserts an open task directly, bypassing faults and counters.
    pub async fn seed_task(
        &self,
        owner: &UserId,
        content: &str,
        group: TaskGroup,
        date: &str,
    ) -> TaskId {
        let id = self.ids.generate_task_id();
        let mut row = Row::new();
        row.insert("id".into(), json!(id.as_str()));
        row.insert("content".into(), json!(content));
        row.insert(self.variant.completion_column.clone(), json!(false));
        row.insert("priority".into(), json!(0));
        row.insert("group".into(), json!(group.as_str()));
        row.insert("date".into(), json!(date));
        row.insert("user_id".into(), json!(owner.as_str()));
        self.state.lock().await.rows.push(row);
        id
    }

    /// Flips the completion flag directly, bypassing faults and counters.
    pub async fn set_completed(&self, id: &TaskId, completed: bool) {
        let mut state = self.state.lock().await;
        if let Some(row) = state.rows.iter_mut().find(|r| row_id(r) == Some(id.as_str())) {
            row.insert(self.variant.completion_column.clone(), json!(completed));
        }
    }

    /// Writes one raw column value, bypassing faults and counters.
    pub async fn set_column(&self, id: &TaskId, column: &str, value: Value) {
        let mut state = self.state.lock().await;
        if let Some(row) = state.rows.iter_mut().find(|r| row_id(r) == Some(id.as_str())) {
            row.insert(column.to_string(), value);
        }
    }

    pub async fn rows(&self) -> Vec<Row> {
        self.state.lock().await.rows.clone()
    }

    pub async fn tasks(&self) -> Vec<Task> {
        let rows = self.rows().await;
        rows.into_iter()
            .filter_map(|r| decode(&self.columns, r).ok())
            .collect()
    }

    pub async fn task(&self, id: &TaskId) -> Option<Task> {
        self.tasks().await.into_iter().find(|t| &t.id == id)
    }

    /// Columns probed so far, in order.
    pub async fn probed_columns(&self) -> Vec<String> {
        self.state.lock().await.probes.clone()
    }

    /// Insert and update requests received so far.
    pub async fn write_attempts(&self) -> usize {
        self.state.lock().await.write_attempts
    }

    pub async fn select_calls(&self) -> usize {
        self.state.lock().await.select_calls
    }

    pub async fn fail_probes_with(&self, message: &str) {
        self.state.lock().await.faults.probe = Some(message.to_string());
    }

    /// Every insert and update fails with `message`.
    pub async fn fail_writes_with(&self, message: &str) {
        self.state.lock().await.faults.write = Some(message.to_string());
    }

    /// Writes whose payload contains `column` fail with `message`.
    pub async fn reject_writes_mentioning(&self, column: &str, message: &str) {
        self.state.lock().await.faults.write_mentioning =
            Some((column.to_string(), message.to_string()));
    }

    /// Updates to one row fail with `message`.
    pub async fn fail_updates_for(&self, id: &TaskId, message: &str) {
        self.state
            .lock()
            .await
            .faults
            .update_rows
            .insert(id.clone(), message.to_string());
    }

    fn write_fault(&self, faults: &Faults, row: &Row) -> Option<BackendError> {
        if let Some(message) = &faults.write {
            return Some(BackendError::new(message.clone()).with_status(400));
        }
        if let Some((column, message)) = &faults.write_mentioning
            && row.contains_key(column)
        {
            return Some(BackendError::new(message.clone()).with_status(400));
        }
        None
    }
}

fn row_id(row: &Row) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

fn row_owner(row: &Row) -> Option<&str> {
    row.get("user_id").and_then(Value::as_str)
}

/// `select=*` と同じく、行にない列は null で埋めてから読む
fn decode(columns: &HashSet<String>, mut row: Row) -> Result<Task, BackendError> {
    for column in columns {
        row.entry(column.clone()).or_insert(Value::Null);
    }
    serde_json::from_value(Value::Object(row))
        .map_err(|e| BackendError::new(format!("failed to decode task row: {e}")))
}

#[async_trait]
impl TaskBackend for InMemoryBackend {
    async fn probe_column(&self, _owner: &UserId, column: &str) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        state.probes.push(column.to_string());
        if let Some(message) = &state.faults.probe {
            return Err(BackendError::new(message.clone()).with_status(401));
        }
        if !self.columns.contains(column) {
            return Err(BackendError::new(format!(
                "column {TABLE}.{column} does not exist"
            ))
            .with_code(UNDEFINED_COLUMN_PG)
            .with_status(400));
        }
        Ok(())
    }

    async fn select_group(
        &self,
        owner: &UserId,
        group: TaskGroup,
    ) -> Result<Vec<Task>, BackendError> {
        let rows = {
            let mut state = self.state.lock().await;
            state.select_calls += 1;
            state
                .rows
                .iter()
                .filter(|r| row_owner(r) == Some(owner.as_str()))
                .filter(|r| r.get("group").and_then(Value::as_str) == Some(group.as_str()))
                .cloned()
                .collect::<Vec<_>>()
        };
        rows.into_iter().map(|r| decode(&self.columns, r)).collect()
    }

    async fn insert(&self, mut row: Row) -> Result<(), BackendError> {
        let id = {
            let mut state = self.state.lock().await;
            state.write_attempts += 1;
            if let Some(err) = self.write_fault(&state.faults, &row) {
                return Err(err);
            }
            self.check_columns(&row)?;

            let id = self.ids.generate_task_id();
            row.insert("id".into(), json!(id.as_str()));
            state.rows.push(row);
            id
        };
        self.emit(ChangeEvent::Inserted(id));
        Ok(())
    }

    async fn update(&self, owner: &UserId, id: &TaskId, row: Row) -> Result<(), BackendError> {
        let touched = {
            let mut state = self.state.lock().await;
            state.write_attempts += 1;
            if let Some(err) = self.write_fault(&state.faults, &row) {
                return Err(err);
            }
            if let Some(message) = state.faults.update_rows.get(id) {
                return Err(BackendError::new(message.clone()).with_status(409));
            }
            self.check_columns(&row)?;

            // PostgREST と同じく、該当行がなくてもエラーにはしない
            let target = state.rows.iter_mut().find(|r| {
                row_id(r) == Some(id.as_str()) && row_owner(r) == Some(owner.as_str())
            });
            match target {
                Some(existing) => {
                    existing.extend(row);
                    true
                }
                None => false,
            }
        };
        if touched {
            self.emit(ChangeEvent::Updated(id.clone()));
        }
        Ok(())
    }

    async fn delete(&self, owner: &UserId, id: &TaskId) -> Result<(), BackendError> {
        let removed = {
            let mut state = self.state.lock().await;
            let before = state.rows.len();
            state.rows.retain(|r| {
                !(row_id(r) == Some(id.as_str()) && row_owner(r) == Some(owner.as_str()))
            });
            state.rows.len() != before
        };
        if removed {
            self.emit(ChangeEvent::Deleted(id.clone()));
        }
        Ok(())
    }
}

impl ChangeFeed for InMemoryBackend {
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }
}
