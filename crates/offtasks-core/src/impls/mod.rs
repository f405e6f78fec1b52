//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryBackend**: 開発・テスト用のバックエンド（列名の揺れを SchemaVariant で再現）
//! - **PostgrestBackend**: ホスト型の REST バックエンド（reqwest）

pub mod inmem_store;
pub mod postgrest;

// 主要な型を再エクスポート
pub use self::inmem_store::{InMemoryBackend, SchemaVariant};
pub use self::postgrest::PostgrestBackend;
