//! AutoGrouper - 古くなった・完了したタスクを bucket 間で移す
//!
//! 「今日」は壁時計の日付。バックグラウンドジョブはないので、
//! クライアントが次にボードを読み込んだときにだけ直る。
//!
//! # 設計原則
//! - 計画は純粋関数（[`plan_moves`]）
//! - 適用は全件を同時に投げ、結果を 1 件ずつ記録する（部分的な失敗が見える）

use std::fmt;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use futures::future::join_all;
use tracing::{info, warn};

use super::mutator::TaskMutator;
use crate::domain::{BoardSnapshot, OfftasksError, TaskGroup, TaskId, TaskPatch, UserId};
use crate::ports::Clock;

/// Which rule produced a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupingRule {
    /// today + completed + date != today -> close
    StaleDoneToday,
    /// tomorrow + (date == yesterday or completed) -> today
    PromoteTomorrow,
    /// upcoming + completed -> close
    DoneUpcoming,
}

impl fmt::Display for GroupingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GroupingRule::StaleDoneToday => "stale_done_today",
            GroupingRule::PromoteTomorrow => "promote_tomorrow",
            GroupingRule::DoneUpcoming => "done_upcoming",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub task_id: TaskId,
    pub from: TaskGroup,
    pub to: TaskGroup,
    pub rule: GroupingRule,
}

/// Computes the moves one grouping pass must make over `snapshot`.
///
/// Tasks are judged by the bucket they were fetched in. Nothing ever leaves
/// `close`, and dates are left alone.
pub fn plan_moves(snapshot: &BoardSnapshot, today: NaiveDate) -> Vec<PlannedMove> {
    let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
    let mut moves = Vec::new();

    for task in &snapshot.today {
        if task.completed && !task.is_on(today) {
            moves.push(PlannedMove {
                task_id: task.id.clone(),
                from: TaskGroup::Today,
                to: TaskGroup::Close,
                rule: GroupingRule::StaleDoneToday,
            });
        }
    }
    for task in &snapshot.tomorrow {
        if task.completed || task.is_on(yesterday) {
            moves.push(PlannedMove {
                task_id: task.id.clone(),
                from: TaskGroup::Tomorrow,
                to: TaskGroup::Today,
                rule: GroupingRule::PromoteTomorrow,
            });
        }
    }
    for task in &snapshot.upcoming {
        if task.completed {
            moves.push(PlannedMove {
                task_id: task.id.clone(),
                from: TaskGroup::Upcoming,
                to: TaskGroup::Close,
                rule: GroupingRule::DoneUpcoming,
            });
        }
    }
    moves
}

#[derive(Debug)]
pub struct MoveOutcome {
    pub planned: PlannedMove,
    pub result: Result<(), OfftasksError>,
}

impl MoveOutcome {
    pub fn is_applied(&self) -> bool {
        self.result.is_ok()
    }
}

/// Result of one grouping pass.
#[derive(Debug, Default)]
pub struct GroupingReport {
    pub outcomes: Vec<MoveOutcome>,
}

impl GroupingReport {
    pub fn applied(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_applied()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &MoveOutcome> {
        self.outcomes.iter().filter(|o| !o.is_applied())
    }

    /// True iff at least one move reached the backend. The caller refetches
    /// once in that case, however many moves were batched.
    pub fn update_occurred(&self) -> bool {
        self.applied() > 0
    }
}

pub struct AutoGrouper {
    mutator: Arc<TaskMutator>,
    clock: Arc<dyn Clock>,
}

impl AutoGrouper {
    pub fn new(mutator: Arc<TaskMutator>, clock: Arc<dyn Clock>) -> Self {
        Self { mutator, clock }
    }

    pub fn plan(&self, snapshot: &BoardSnapshot) -> Vec<PlannedMove> {
        plan_moves(snapshot, self.clock.today())
    }

    /// Plans and applies one pass. Moves are independent; one failing does
    /// not stop the others.
    pub async fn run(&self, owner: &UserId, snapshot: &BoardSnapshot) -> GroupingReport {
        let moves = self.plan(snapshot);
        if moves.is_empty() {
            return GroupingReport::default();
        }

        let pending = moves.into_iter().map(|planned| async move {
            let result = self
                .mutator
                .update(owner, &planned.task_id, TaskPatch::move_to(planned.to))
                .await;
            MoveOutcome { planned, result }
        });
        let report = GroupingReport {
            outcomes: join_all(pending).await,
        };

        for outcome in report.failed() {
            if let Err(err) = &outcome.result {
                warn!(
                    task_id = %outcome.planned.task_id,
                    rule = %outcome.planned.rule,
                    error = %err,
                    "auto-grouping move failed"
                );
            }
        }
        info!(
            planned = report.outcomes.len(),
            applied = report.applied(),
            "auto-grouping pass finished"
        );
        report
    }
}
