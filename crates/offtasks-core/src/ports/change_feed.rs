//! ChangeFeed port - realtime の行変更通知
//!
//! 通知は「取り直せ」の合図にすぎない（push で起こして pull する）。

use tokio::sync::broadcast;

use crate::domain::ChangeEvent;

pub trait ChangeFeed: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}
