//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait はホスト型バックエンド（行ストレージ・認証・realtime）と
//! 壁時計へのインターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - バックエンドが source of truth（正本）。クライアントは取り直すだけ
//! - 列名の揺れは ports の外（schema モジュール）で吸収する

pub mod change_feed;
pub mod clock;
pub mod id_generator;
pub mod session;
pub mod task_store;

pub use self::change_feed::ChangeFeed;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::session::{SessionSource, StaticSession};
pub use self::task_store::{Row, TaskBackend};
