//! BoardService - クライアントが呼ぶ操作の表面
//!
//! どの操作もまずセッションを確認する。サインインしていなければ
//! ネットワークに出る前に [`OfftasksError::NotSignedIn`] を返す。
//! 書き込みは値を返さない。呼び出し側が取り直して結果を見る。

use std::sync::Arc;

use tracing::debug;

use super::grouping::{AutoGrouper, GroupingReport};
use super::mutator::TaskMutator;
use crate::domain::{
    BoardSnapshot, BoardStats, NewTask, OfftasksError, TaskGroup, TaskId, TaskPatch, UserId,
};
use crate::ports::{Clock, SessionSource, TaskBackend};

/// A loaded board plus the grouping pass that ran while loading it.
#[derive(Debug)]
pub struct BoardLoad {
    pub snapshot: BoardSnapshot,
    pub grouping: GroupingReport,
}

pub struct BoardService {
    backend: Arc<dyn TaskBackend>,
    session: Arc<dyn SessionSource>,
    clock: Arc<dyn Clock>,
    mutator: Arc<TaskMutator>,
    grouper: AutoGrouper,
}

impl BoardService {
    pub fn new(
        backend: Arc<dyn TaskBackend>,
        session: Arc<dyn SessionSource>,
        clock: Arc<dyn Clock>,
        mutator: Arc<TaskMutator>,
    ) -> Self {
        let grouper = AutoGrouper::new(Arc::clone(&mutator), Arc::clone(&clock));
        Self {
            backend,
            session,
            clock,
            mutator,
            grouper,
        }
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    fn owner(&self) -> Result<UserId, OfftasksError> {
        self.session.current_user().ok_or(OfftasksError::NotSignedIn)
    }

    /// Fetches the four buckets concurrently. No isolation across buckets.
    pub async fn fetch(&self) -> Result<BoardSnapshot, OfftasksError> {
        let owner = self.owner()?;
        self.fetch_for(&owner).await
    }

    async fn fetch_for(&self, owner: &UserId) -> Result<BoardSnapshot, OfftasksError> {
        let backend = self.backend.as_ref();
        let (today, tomorrow, upcoming, closed) = tokio::try_join!(
            backend.select_group(owner, TaskGroup::Today),
            backend.select_group(owner, TaskGroup::Tomorrow),
            backend.select_group(owner, TaskGroup::Upcoming),
            backend.select_group(owner, TaskGroup::Close),
        )?;
        Ok(BoardSnapshot {
            today,
            tomorrow,
            upcoming,
            closed,
        })
    }

    /// Fetch, run one grouping pass, and refetch once if anything moved.
    pub async fn load(&self) -> Result<BoardLoad, OfftasksError> {
        let owner = self.owner()?;
        let snapshot = self.fetch_for(&owner).await?;
        let grouping = self.grouper.run(&owner, &snapshot).await;

        let snapshot = if grouping.update_occurred() {
            debug!(applied = grouping.applied(), "tasks regrouped, refetching");
            self.fetch_for(&owner).await?
        } else {
            snapshot
        };
        Ok(BoardLoad { snapshot, grouping })
    }

    pub async fn create_task(&self, task: NewTask) -> Result<(), OfftasksError> {
        let owner = self.owner()?;
        self.mutator.create(&owner, task).await
    }

    pub async fn edit_task(&self, id: &TaskId, patch: TaskPatch) -> Result<(), OfftasksError> {
        let owner = self.owner()?;
        self.mutator.update(&owner, id, patch).await
    }

    /// Toggles completion and stamps (or clears) `completed_at`.
    pub async fn set_completed(&self, id: &TaskId, completed: bool) -> Result<(), OfftasksError> {
        let owner = self.owner()?;
        let patch = TaskPatch::completion(completed, self.clock.now());
        self.mutator.update(&owner, id, patch).await
    }

    /// Reopens a task. It stays in whatever group it was in.
    pub async fn restore(&self, id: &TaskId) -> Result<(), OfftasksError> {
        self.set_completed(id, false).await
    }

    pub async fn move_task(&self, id: &TaskId, group: TaskGroup) -> Result<(), OfftasksError> {
        let owner = self.owner()?;
        self.mutator.update(&owner, id, TaskPatch::move_to(group)).await
    }

    pub async fn delete_task(&self, id: &TaskId) -> Result<(), OfftasksError> {
        let owner = self.owner()?;
        self.mutator.delete(&owner, id).await
    }

    pub async fn stats(&self) -> Result<BoardStats, OfftasksError> {
        let load = self.load().await?;
        Ok(BoardStats::collect(&load.snapshot, self.clock.today()))
    }
}
