//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! # Fail-fast 設計
//! - backend と session は必須。足りなければ build() が BuildError を返す
//! - clock と policy は省略可能（SystemClock / FallbackPolicy::default()）
//! - ColumnResolver は build() のたびに新しく作る（セッション単位のキャッシュ）

use std::sync::Arc;

use super::board::BoardService;
use super::mutator::TaskMutator;
use super::sync_loop::SyncLoop;
use crate::ports::{ChangeFeed, Clock, SessionSource, SystemClock, TaskBackend};
use crate::schema::{ColumnResolver, FallbackPolicy};

/// AppBuilder はアプリケーションを構築
///
/// # 使用例
/// ```ignore
/// let app = AppBuilder::new()
///     .backend(backend.clone())
///     .session(Arc::new(StaticSession::signed_in(user)))
///     .change_feed(backend)
///     .build()?;
/// let load = app.board().load().await?;
/// ```
#[derive(Default)]
pub struct AppBuilder {
    backend: Option<Arc<dyn TaskBackend>>,
    session: Option<Arc<dyn SessionSource>>,
    clock: Option<Arc<dyn Clock>>,
    feed: Option<Arc<dyn ChangeFeed>>,
    policy: FallbackPolicy,
}

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("Missing components: {0:?}. These must be set before build().")]
    MissingComponents(Vec<&'static str>),

    #[error("Invalid fallback policy: attempt caps must be at least 1.")]
    InvalidPolicy,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backend(mut self, backend: Arc<dyn TaskBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn session(mut self, session: Arc<dyn SessionSource>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn change_feed(mut self, feed: Arc<dyn ChangeFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn policy(mut self, policy: FallbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> Result<App, BuildError> {
        let mut missing = Vec::new();
        if self.backend.is_none() {
            missing.push("backend");
        }
        if self.session.is_none() {
            missing.push("session");
        }
        let (Some(backend), Some(session)) = (self.backend, self.session) else {
            return Err(BuildError::MissingComponents(missing));
        };
        if self.policy.max_update_attempts == 0 || self.policy.max_create_attempts == 0 {
            return Err(BuildError::InvalidPolicy);
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let mutator = Arc::new(TaskMutator::new(
            Arc::clone(&backend),
            Arc::new(ColumnResolver::new()),
            Arc::clone(&clock),
            self.policy,
        ));
        let board = Arc::new(BoardService::new(backend, session, clock, mutator));

        Ok(App {
            board,
            feed: self.feed,
        })
    }
}

/// App は組み立て済みのサービス一式
pub struct App {
    board: Arc<BoardService>,
    feed: Option<Arc<dyn ChangeFeed>>,
}

impl App {
    pub fn board(&self) -> &Arc<BoardService> {
        &self.board
    }

    /// realtime を購読して SyncLoop を起動する。feed がなければ None
    pub fn spawn_sync(&self) -> Option<SyncLoop> {
        let feed = self.feed.as_ref()?;
        Some(SyncLoop::spawn(Arc::clone(&self.board), feed.as_ref()))
    }
}
