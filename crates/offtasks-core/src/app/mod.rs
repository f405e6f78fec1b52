//! App - アプリケーション層
//!
//! このモジュールは、ports と schema shim を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **AppBuilder**: アプリケーションの構築とワイヤリング
//! - **TaskMutator**: 列名の揺れに耐える create/update/delete
//! - **AutoGrouper**: today/tomorrow/upcoming/close の自動振り分け
//! - **BoardService**: クライアントが呼ぶ操作の表面
//! - **SyncLoop**: realtime 通知ごとの全件取り直し

pub mod board;
pub mod builder;
pub mod grouping;
pub mod mutator;
pub mod sync_loop;

// 主要な型を再エクスポート
pub use self::board::{BoardLoad, BoardService};
pub use self::builder::{App, AppBuilder, BuildError};
pub use self::grouping::{
    AutoGrouper, GroupingReport, GroupingRule, MoveOutcome, PlannedMove, plan_moves,
};
pub use self::mutator::TaskMutator;
pub use self::sync_loop::SyncLoop;
