//! Domain identifiers (strongly-typed, backend-assigned IDs).
//!
//! Task と User の ID はどちらもバックエンドが割り当てる不透明な値です。
//! デプロイによって uuid 文字列だったり bigint だったりするので、
//! wire 上では文字列・整数のどちらも受け付け、内部では文字列として保持します。
//!
//! ## Phantom Type パターン
//! `Id<T>` で共通実装を提供しつつ、`T` はマーカー型としてだけ使います。
//! TaskId と UserId を取り違えるとコンパイルエラーになります。

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;

/// IdMarker は各 ID 型のマーカー trait
pub trait IdMarker: Send + Sync + 'static {
    /// ログやエラーメッセージで使う種別名（例: "task", "user"）
    fn kind() -> &'static str;
}

/// ジェネリック ID 型
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id<T: IdMarker> {
    raw: String,
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

// derive だと T: Clone / T: Debug を要求してしまうので手で実装する
impl<T: IdMarker> Clone for Id<T> {
    fn clone(&self) -> Self {
        Self::new(self.raw.clone())
    }
}

impl<T: IdMarker> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", T::kind(), self.raw)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl<T: IdMarker> From<&str> for Id<T> {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl<T: IdMarker> From<String> for Id<T> {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl<T: IdMarker> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Int(i64),
    Uint(u64),
}

impl<'de, T: IdMarker> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = match RawId::deserialize(deserializer)? {
            RawId::Text(s) => s,
            RawId::Int(n) => n.to_string(),
            RawId::Uint(n) => n.to_string(),
        };
        Ok(Self::new(raw))
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Task のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {}

impl IdMarker for Task {
    fn kind() -> &'static str {
        "task"
    }
}

/// User のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum User {}

impl IdMarker for User {
    fn kind() -> &'static str {
        "user"
    }
}

/// Identifier of a task row. Assigned by storage, never reused.
pub type TaskId = Id<Task>;

/// Identifier of the owning user (auth subject).
pub type UserId = Id<User>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_accept_string_and_integer_on_the_wire() {
        let from_text: TaskId = serde_json::from_str("\"6b1f\"").unwrap();
        let from_int: TaskId = serde_json::from_str("42").unwrap();

        assert_eq!(from_text.as_str(), "6b1f");
        assert_eq!(from_int.as_str(), "42");

        // 出力は常に文字列
        assert_eq!(serde_json::to_string(&from_int).unwrap(), "\"42\"");
    }

    #[test]
    fn debug_carries_the_kind() {
        let task = TaskId::new("1");
        let user = UserId::new("1");

        assert_eq!(format!("{task:?}"), "task:1");
        assert_eq!(format!("{user:?}"), "user:1");
        assert_eq!(task.to_string(), "1");

        // let _: UserId = task; // <- does not compile
    }
}
