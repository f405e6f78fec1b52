//! Task - タスク行と、その group / priority、書き込み側の入力
//!
//! # 設計原則
//! - 読み込みは TaskRow を経由する。揺れている列は綴りごとに受け、
//!   両方あれば prober と同じ順（camelCase / `label` が先）で採用する
//! - 書き込みは NewTask / TaskPatch。物理列名は schema shim が決める

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ids::{TaskId, UserId};

/// Wire format of [`Task::date`].
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Which board column a task lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskGroup {
    Today,
    Tomorrow,
    Upcoming,
    Close,
}

impl TaskGroup {
    pub const ALL: [TaskGroup; 4] = [
        TaskGroup::Today,
        TaskGroup::Tomorrow,
        TaskGroup::Upcoming,
        TaskGroup::Close,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskGroup::Today => "today",
            TaskGroup::Tomorrow => "tomorrow",
            TaskGroup::Upcoming => "upcoming",
            TaskGroup::Close => "close",
        }
    }

    /// Date stamped on a task created in this group when the caller gives none.
    pub fn default_date(&self, today: NaiveDate) -> NaiveDate {
        let offset = match self {
            TaskGroup::Today | TaskGroup::Close => 0,
            TaskGroup::Tomorrow => 1,
            TaskGroup::Upcoming => 2,
        };
        today.checked_add_days(Days::new(offset)).unwrap_or(today)
    }
}

impl fmt::Display for TaskGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(TaskGroup::Today),
            "tomorrow" => Ok(TaskGroup::Tomorrow),
            "upcoming" => Ok(TaskGroup::Upcoming),
            "close" | "closed" => Ok(TaskGroup::Close),
            other => Err(format!("unknown group: {other}")),
        }
    }
}

/// Priority 0..=3 ("None" through "High").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "u8")]
pub enum Priority {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_u8(&self) -> u8 {
        match self {
            Priority::None => 0,
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
        }
    }

    /// Out-of-range values coming back from storage are clamped.
    pub fn clamped(value: i64) -> Self {
        match value {
            i64::MIN..=0 => Priority::None,
            1 => Priority::Low,
            2 => Priority::Medium,
            _ => Priority::High,
        }
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> u8 {
        p.as_u8()
    }
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Priority::None),
            1 => Ok(Priority::Low),
            2 => Ok(Priority::Medium),
            3 => Ok(Priority::High),
            n => Err(format!("priority must be 0..=3, got {n}")),
        }
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<i64>::deserialize(deserializer)?;
        Ok(raw.map(Priority::clamped).unwrap_or_default())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::None => "none",
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        };
        f.write_str(name)
    }
}

/// A task row as read back from the backend.
///
/// Column names drifted across deployments, so every drifting field accepts
/// both spellings on decode. When a row carries both, the camelCase / `label`
/// spelling wins, in the same order the column prober tries them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TaskRow")]
pub struct Task {
    pub id: TaskId,
    pub content: String,
    #[serde(rename = "isComplete")]
    pub completed: bool,
    pub priority: Priority,
    pub group: TaskGroup,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

/// 受信した行そのもの。揺れている列は綴りごとに別フィールドで受ける
///
/// 外側の `Option` は「列が行にあるか」、内側は「値が null か」。
#[derive(Deserialize)]
struct TaskRow {
    id: TaskId,
    content: String,
    #[serde(rename = "isComplete", default, deserialize_with = "present")]
    is_complete_camel: Option<Option<bool>>,
    #[serde(rename = "is_complete", default, deserialize_with = "present")]
    is_complete_snake: Option<Option<bool>>,
    #[serde(default)]
    priority: Priority,
    group: TaskGroup,
    #[serde(default)]
    date: Option<String>,
    #[serde(default, deserialize_with = "present")]
    label: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    category: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    completed_at: Option<Option<DateTime<Utc>>>,
    #[serde(rename = "completedAt", default, deserialize_with = "present")]
    completed_at_camel: Option<Option<DateTime<Utc>>>,
    #[serde(default)]
    user_id: Option<UserId>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        // 列が存在する方を採用する。両方あれば先の候補
        let completed = row.is_complete_camel.or(row.is_complete_snake).flatten();
        let label = row.label.or(row.category).flatten();
        let completed_at = row.completed_at.or(row.completed_at_camel).flatten();
        Task {
            id: row.id,
            content: row.content,
            completed: completed.unwrap_or(false),
            priority: row.priority,
            group: row.group,
            date: row.date.unwrap_or_default(),
            label,
            completed_at,
            user_id: row.user_id,
        }
    }
}

impl Task {
    /// `date` parsed as a calendar date; `None` when the stored string is not `YYYY-MM-DD`.
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.date.trim(), DATE_FORMAT).ok()
    }

    /// Open task whose date is strictly before `today`.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.completed && self.parsed_date().is_some_and(|d| d < today)
    }

    pub fn is_on(&self, day: NaiveDate) -> bool {
        self.date.trim() == format_date(day)
    }
}

pub fn format_date(day: NaiveDate) -> String {
    day.format(DATE_FORMAT).to_string()
}

/// Creation payload. The owner comes from the session, not from here.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub content: String,
    pub group: TaskGroup,
    pub priority: Priority,
    pub label: Option<String>,
    /// Falls back to [`TaskGroup::default_date`].
    pub date: Option<NaiveDate>,
}

impl NewTask {
    pub fn new(content: impl Into<String>, group: TaskGroup) -> Self {
        Self {
            content: content.into(),
            group,
            priority: Priority::None,
            label: None,
            date: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
}

/// Partial update. `None` leaves the field alone.
///
/// `label` and `completed_at` are doubly optional: `Some(None)` clears the column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub content: Option<String>,
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
    pub group: Option<TaskGroup>,
    pub date: Option<String>,
    pub label: Option<Option<String>>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
}

impl TaskPatch {
    pub fn move_to(group: TaskGroup) -> Self {
        Self {
            group: Some(group),
            ..Self::default()
        }
    }

    /// Completion toggle; stamps or clears `completed_at` alongside.
    pub fn completion(completed: bool, at: DateTime<Utc>) -> Self {
        Self {
            completed: Some(completed),
            completed_at: Some(completed.then_some(at)),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
