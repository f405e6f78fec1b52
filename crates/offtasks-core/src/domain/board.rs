//! Board - 4 つの bucket の snapshot と、その上の純粋なビュー
//!
//! 並び替え・完了タスクの非表示・集計（BoardStats）はすべてここで行い、
//! バックエンドには問い合わせない。

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::task::{Priority, Task, TaskGroup};

/// One fetch of every bucket. The buckets may reflect slightly different
/// instants; nothing here compensates for that.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub today: Vec<Task>,
    pub tomorrow: Vec<Task>,
    pub upcoming: Vec<Task>,
    pub closed: Vec<Task>,
}

impl BoardSnapshot {
    pub fn bucket(&self, group: TaskGroup) -> &[Task] {
        match group {
            TaskGroup::Today => &self.today,
            TaskGroup::Tomorrow => &self.tomorrow,
            TaskGroup::Upcoming => &self.upcoming,
            TaskGroup::Close => &self.closed,
        }
    }

    pub fn bucket_mut(&mut self, group: TaskGroup) -> &mut Vec<Task> {
        match group {
            TaskGroup::Today => &mut self.today,
            TaskGroup::Tomorrow => &mut self.tomorrow,
            TaskGroup::Upcoming => &mut self.upcoming,
            TaskGroup::Close => &mut self.closed,
        }
    }

    /// Builds a snapshot by bucketing tasks on their own `group` field.
    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let mut snapshot = Self::default();
        for task in tasks {
            snapshot.bucket_mut(task.group).push(task);
        }
        snapshot
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        TaskGroup::ALL.into_iter().flat_map(|g| self.bucket(g).iter())
    }

    pub fn len(&self) -> usize {
        TaskGroup::ALL.iter().map(|g| self.bucket(*g).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorts every bucket with [`sort_for_display`].
    pub fn sorted(mut self) -> Self {
        for group in TaskGroup::ALL {
            sort_for_display(self.bucket_mut(group));
        }
        self
    }
}

/// Open tasks first, then higher priority, then earlier date.
///
/// Unparseable dates sort last within their priority.
pub fn sort_for_display(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        a.completed
            .cmp(&b.completed)
            .then_with(|| b.priority.cmp(&a.priority))
            .then_with(|| match (a.parsed_date(), b.parsed_date()) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
    });
}

/// The hide-completed toggle.
pub fn visible_tasks(tasks: &[Task], hide_completed: bool) -> Vec<&Task> {
    tasks
        .iter()
        .filter(|t| !(hide_completed && t.completed))
        .collect()
}

/// Aggregate counts over a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardStats {
    pub total: usize,
    pub completed: usize,
    pub overdue: usize,
    pub today: usize,
    pub tomorrow: usize,
    pub upcoming: usize,
    pub closed: usize,
    /// Indexed by priority value 0..=3.
    pub by_priority: [usize; 4],
}

impl BoardStats {
    pub fn collect(snapshot: &BoardSnapshot, today: NaiveDate) -> Self {
        let mut stats = BoardStats {
            today: snapshot.today.len(),
            tomorrow: snapshot.tomorrow.len(),
            upcoming: snapshot.upcoming.len(),
            closed: snapshot.closed.len(),
            ..Self::default()
        };
        for task in snapshot.iter() {
            stats.total += 1;
            if task.completed {
                stats.completed += 1;
            }
            if task.is_overdue(today) {
                stats.overdue += 1;
            }
            stats.by_priority[usize::from(task.priority.as_u8())] += 1;
        }
        stats
    }

    /// Share of completed tasks, 0.0 for an empty board.
    pub fn completion_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }

    pub fn count_for(&self, priority: Priority) -> usize {
        self.by_priority[usize::from(priority.as_u8())]
    }
}
