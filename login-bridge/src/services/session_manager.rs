//! 登录会话管理器
//!
//! 职责: 跟踪进行中的登录,使宿主进程可以从外部放弃它们
//! 策略: 同一登录ID再次注册时,旧会话自动取消

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// 一次登记
///
/// `generation` 区分同一 `login_id` 的先后登记,`release` 只移除自己那一次。
#[derive(Debug, Clone)]
pub struct Registration {
    pub token: CancellationToken,
    generation: u64,
}

/// 会话管理器
///
/// 只保存取消令牌,不持有会话本身;会话仍由登录调用独占。
pub struct SessionManager {
    /// 进行中的登录 (login_id -> 登记)
    active: Mutex<HashMap<Uuid, Registration>>,

    next_generation: AtomicU64,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    /// 登记一次登录,返回的登记携带取消令牌
    ///
    /// # 副作用
    /// - 同一 `login_id` 已存在时,旧令牌被取消
    pub async fn register(&self, login_id: Uuid) -> Registration {
        let registration = Registration {
            token: CancellationToken::new(),
            generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
        };
        let mut active = self.active.lock().await;

        if let Some(old) = active.insert(login_id, registration.clone()) {
            tracing::info!(login_id = %login_id, "Cancelling superseded login session");
            old.token.cancel();
        }

        registration
    }

    /// 登录结束后移除登记 (不触发取消)
    ///
    /// 该 `login_id` 已被更新的登记取代时保持不动。
    pub async fn release(&self, login_id: &Uuid, registration: &Registration) {
        let mut active = self.active.lock().await;

        if active
            .get(login_id)
            .is_some_and(|current| current.generation == registration.generation)
        {
            active.remove(login_id);
        } else {
            tracing::debug!(login_id = %login_id, "Release skipped for superseded registration");
        }
    }

    /// 取消指定登录
    ///
    /// 返回 `false` 表示该登录不存在或已结束。
    pub async fn cancel(&self, login_id: &Uuid) -> bool {
        match self.active.lock().await.remove(login_id) {
            Some(registration) => {
                registration.token.cancel();
                tracing::info!(login_id = %login_id, "Login session cancelled");
                true
            }
            None => false,
        }
    }

    /// 取消全部登录,返回被取消的数量
    pub async fn cancel_all(&self) -> usize {
        let mut active = self.active.lock().await;
        let count = active.len();

        for (_, registration) in active.drain() {
            registration.token.cancel();
        }

        if count > 0 {
            tracing::info!(count = %count, "All login sessions cancelled");
        }

        count
    }

    /// 进行中的登录数量
    pub async fn active_count(&self) -> usize {
        self.active.lock().await.len()
    }
}
