//! SyncLoop - realtime で起こされて、ボード全体を取り直すループ
//!
//! # フロー
//! 1. 起動時に 1 回 load（取得 → 自動振り分け → 必要なら取り直し）
//! 2. ChangeFeed のイベントを待つ
//! 3. どの行の変更でも load し直して、watch channel に最新の snapshot を流す
//!
//! 差分パッチはしない。個人用の少数行なので全件取り直しで足りる。

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::board::BoardService;
use crate::domain::{BoardSnapshot, ChangeEvent};
use crate::ports::ChangeFeed;

/// Sync loop handle.
/// - `request_shutdown()` でループが止まる
/// - `snapshots()` で最新の snapshot を購読できる
pub struct SyncLoop {
    shutdown_tx: watch::Sender<bool>,
    snapshot_rx: watch::Receiver<Option<BoardSnapshot>>,
    join: JoinHandle<()>,
}

impl SyncLoop {
    pub fn spawn(board: Arc<BoardService>, feed: &dyn ChangeFeed) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        // 初回 load より前に購読しておく（取りこぼし防止）
        let events = feed.subscribe();

        let join = tokio::spawn(async move {
            sync_loop(board, events, snapshot_tx, shutdown_rx).await;
        });

        Self {
            shutdown_tx,
            snapshot_rx,
            join,
        }
    }

    pub fn snapshots(&self) -> watch::Receiver<Option<BoardSnapshot>> {
        self.snapshot_rx.clone()
    }

    pub fn request_shutdown(&self) {
        // ignore send error: the loop may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
    }
}

async fn sync_loop(
    board: Arc<BoardService>,
    mut events: broadcast::Receiver<ChangeEvent>,
    snapshot_tx: watch::Sender<Option<BoardSnapshot>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    reload(&board, &snapshot_tx).await;

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            event = events.recv() => match event {
                Ok(event) => {
                    debug!(kind = event.kind(), task_id = %event.task_id(), "change received");
                    reload(&board, &snapshot_tx).await;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "change feed lagged");
                    reload(&board, &snapshot_tx).await;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

async fn reload(board: &BoardService, snapshot_tx: &watch::Sender<Option<BoardSnapshot>>) {
    match board.load().await {
        Ok(load) => {
            snapshot_tx.send_replace(Some(load.snapshot));
        }
        // 画面側はアラートを出す。ループは止めない
        Err(err) => warn!(error = %err, "reload after change failed"),
    }
}
