//! Events - realtime change feed のイベント
//!
//! どの行が変わったかに関係なく、購読側はボード全体を取り直す。
//! id はログ用に持っているだけ。

use super::ids::TaskId;

/// ChangeEvent はタスクテーブルの行変更通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Inserted(TaskId),
    Updated(TaskId),
    Deleted(TaskId),
}

impl ChangeEvent {
    pub fn task_id(&self) -> &TaskId {
        match self {
            ChangeEvent::Inserted(id) | ChangeEvent::Updated(id) | ChangeEvent::Deleted(id) => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::Inserted(_) => "insert",
            ChangeEvent::Updated(_) => "update",
            ChangeEvent::Deleted(_) => "delete",
        }
    }
}
