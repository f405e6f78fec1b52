//! SessionSource port - 認証セッション
//!
//! サインイン・サインアップ・パスワードリセットは外部の認証プロバイダに
//! 丸投げしている。ここでは「いま誰がサインインしているか」だけを見る。

use std::sync::{PoisonError, RwLock};

use crate::domain::UserId;

pub trait SessionSource: Send + Sync {
    fn current_user(&self) -> Option<UserId>;
}

/// StaticSession はセッション状態を外から差し替えられる実装
///
/// 認証プロバイダの session-changed イベントを受けたら `set` / `clear` を呼ぶ。
#[derive(Debug, Default)]
pub struct StaticSession {
    user: RwLock<Option<UserId>>,
}

impl StaticSession {
    pub fn signed_in(user: UserId) -> Self {
        Self {
            user: RwLock::new(Some(user)),
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn set(&self, user: UserId) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = Some(user);
    }

    pub fn clear(&self) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl SessionSource for StaticSession {
    fn current_user(&self) -> Option<UserId> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
