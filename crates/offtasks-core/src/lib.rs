//! offtasks-core
//!
//! Core building blocks for the Offtasks task board.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, board, errors, events）
//! - **ports**: 抽象化レイヤー（TaskBackend, SessionSource, ChangeFeed, Clock, IdGenerator）
//! - **schema**: 列名の揺れの吸収（ColumnResolver, FallbackPolicy）
//! - **app**: アプリケーションロジック（builder, mutator, grouping, board, sync_loop）
//! - **impls**: 実装（InMemoryBackend, PostgrestBackend）
//! - **config**: 設定の読み込み（TOML + 環境変数）

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod schema;

pub use self::app::{App, AppBuilder, BoardLoad, BoardService, BuildError, SyncLoop};
pub use self::config::{ConfigError, OfftasksConfig};
pub use self::domain::{
    BackendError, BoardSnapshot, BoardStats, ErrorKind, NewTask, OfftasksError, Priority, Task,
    TaskGroup, TaskId, TaskPatch, UserId,
};
