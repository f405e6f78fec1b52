//! Schema - 列名の揺れを吸収する互換レイヤー
//!
//! tasks テーブルの列名はデプロイごとに揺れている
//! （`isComplete`/`is_complete`、`label`/`category`、任意の `completed_at`）。
//! ColumnResolver はどの綴りが生きているかを調べ、FallbackPolicy は
//! 任意列のせいで拒否された書き込みを組み直す。
//!
//! # 設計原則
//! - どちらもバックエンドのエラーメッセージの部分一致で判定する
//! - 構造化されたエラーコードが使えるまではこのまま

pub mod columns;
pub mod fallback;
pub mod prober;

pub use self::columns::{COMPLETED_AT, LogicalColumn, WriteColumns};
pub use self::fallback::{Adjustment, FallbackPolicy};
pub use self::prober::ColumnResolver;
