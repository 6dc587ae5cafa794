use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::models::{CookieMap, LoginError, PollState, StatusReport, TicketStatus};

/// 二维码有效期为 120 秒,等待时间不能超过它
pub const MAX_WAIT_TIMEOUT: Duration = Duration::from_millis(120_000);

/// 默认轮询间隔
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(1_000);

/// 签发后首轮轮询前的等待,让远端会话完成注册
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1_000);

/// 最小轮询间隔 (tokio 的 interval 不接受 0)
const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(1);

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 状态回调
pub type StateCallback<R> = Box<dyn Fn(&R) + Send + Sync>;

/// 第三方OAuth续接
///
/// 参数为跳转响应下发的cookies与成功时的状态报告,返回值即登录结果。
pub type OAuthContinuation =
    Box<dyn FnOnce(CookieMap, StatusReport) -> BoxFuture<'static, Result<String, LoginError>> + Send>;

/// 轮询时序配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// 轮询间隔
    pub check_interval: Duration,

    /// 最长等待时间 (上限 120 秒)
    pub wait_timeout: Duration,

    /// 首轮轮询前的等待
    pub settle_delay: Duration,

    /// 截止前多久发出提醒 (可选)
    pub reminder_lead: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL,
            wait_timeout: MAX_WAIT_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
            reminder_lead: None,
        }
    }
}

impl PollConfig {
    /// 实际生效的最长等待时间
    pub fn effective_wait_timeout(&self) -> Duration {
        self.wait_timeout.min(MAX_WAIT_TIMEOUT)
    }

    /// 实际生效的轮询间隔
    pub fn effective_interval(&self) -> Duration {
        self.check_interval.max(MIN_CHECK_INTERVAL)
    }

    /// 提醒相对计时器启动的偏移
    ///
    /// 提醒提前量不小于等待时间时不安排提醒。
    pub fn reminder_offset(&self) -> Option<Duration> {
        let lead = self.reminder_lead?;
        self.effective_wait_timeout()
            .checked_sub(lead)
            .filter(|offset| !offset.is_zero())
    }
}

/// 按语义状态分发的回调表
///
/// 每一项默认都是空操作。
pub struct StateCallbacks<R> {
    pub on_pending: StateCallback<R>,
    pub on_scanned: StateCallback<R>,
    pub on_success: StateCallback<R>,
    pub on_expired: StateCallback<R>,
    /// 用户拒绝,小程序流程中也用于"登录码已被使用"
    pub on_refused: StateCallback<R>,
    pub on_timeout: Box<dyn Fn() + Send + Sync>,
    /// 参数为距截止的剩余时间
    pub on_reminder: Box<dyn Fn(Duration) + Send + Sync>,
}

impl<R> Default for StateCallbacks<R> {
    fn default() -> Self {
        Self {
            on_pending: Box::new(|_| {}),
            on_scanned: Box::new(|_| {}),
            on_success: Box::new(|_| {}),
            on_expired: Box::new(|_| {}),
            on_refused: Box::new(|_| {}),
            on_timeout: Box::new(|| {}),
            on_reminder: Box::new(|_| {}),
        }
    }
}

impl<R> StateCallbacks<R> {
    /// 调用状态对应的回调
    ///
    /// 未知状态没有生命周期回调,直接以错误结束。
    pub fn dispatch(&self, state: &PollState, report: &R) {
        match state {
            PollState::Pending => (self.on_pending)(report),
            PollState::Scanned => (self.on_scanned)(report),
            PollState::Success => (self.on_success)(report),
            PollState::Expired => (self.on_expired)(report),
            PollState::Refused | PollState::Used => (self.on_refused)(report),
            PollState::Unrecognized(_) => {}
        }
    }
}

/// 网页扫码登录选项
///
/// # 示例
/// ```no_run
/// use std::time::Duration;
/// use qr_login_bridge::models::QrLoginOptions;
///
/// let options = QrLoginOptions::default()
///     .with_wait_timeout(Duration::from_secs(60))
///     .on_qrcode(|png| println!("二维码 {} 字节", png.len()))
///     .on_scanned(|_| println!("已扫码,请在手机上确认"));
/// ```
#[derive(Default)]
pub struct QrLoginOptions {
    pub poll: PollConfig,
    pub callbacks: StateCallbacks<StatusReport>,
    pub on_qrcode: Option<Box<dyn Fn(&[u8]) + Send + Sync>>,
    pub after_oauth2: Option<OAuthContinuation>,
}

impl QrLoginOptions {
    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.poll.wait_timeout = wait_timeout;
        self
    }

    pub fn with_check_interval(mut self, check_interval: Duration) -> Self {
        self.poll.check_interval = check_interval;
        self
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.poll.settle_delay = settle_delay;
        self
    }

    pub fn with_reminder_lead(mut self, lead: Duration) -> Self {
        self.poll.reminder_lead = Some(lead);
        self
    }

    pub fn on_qrcode(mut self, f: impl Fn(&[u8]) + Send + Sync + 'static) -> Self {
        self.on_qrcode = Some(Box::new(f));
        self
    }

    pub fn on_pending(mut self, f: impl Fn(&StatusReport) + Send + Sync + 'static) -> Self {
        self.callbacks.on_pending = Box::new(f);
        self
    }

    pub fn on_scanned(mut self, f: impl Fn(&StatusReport) + Send + Sync + 'static) -> Self {
        self.callbacks.on_scanned = Box::new(f);
        self
    }

    pub fn on_success(mut self, f: impl Fn(&StatusReport) + Send + Sync + 'static) -> Self {
        self.callbacks.on_success = Box::new(f);
        self
    }

    pub fn on_expired(mut self, f: impl Fn(&StatusReport) + Send + Sync + 'static) -> Self {
        self.callbacks.on_expired = Box::new(f);
        self
    }

    pub fn on_refused(mut self, f: impl Fn(&StatusReport) + Send + Sync + 'static) -> Self {
        self.callbacks.on_refused = Box::new(f);
        self
    }

    pub fn on_timeout(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.callbacks.on_timeout = Box::new(f);
        self
    }

    pub fn on_reminder(mut self, f: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.callbacks.on_reminder = Box::new(f);
        self
    }

    /// 设置第三方OAuth续接
    pub fn after_oauth2<F, Fut>(mut self, f: F) -> Self
    where
        F: FnOnce(CookieMap, StatusReport) -> Fut + Send + 'static,
        Fut: Future<Output = Result<String, LoginError>> + Send + 'static,
    {
        self.after_oauth2 = Some(Box::new(move |cookies, report| Box::pin(f(cookies, report))));
        self
    }
}

/// 小程序登录选项
///
/// 小程序流程没有"已扫码"状态;"登录码已被使用"走 `on_refused`。
#[derive(Default)]
pub struct MiniProgramLoginOptions {
    pub poll: PollConfig,
    pub callbacks: StateCallbacks<TicketStatus>,
    pub on_link: Option<Box<dyn Fn(&str) + Send + Sync>>,
}

impl MiniProgramLoginOptions {
    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.poll.wait_timeout = wait_timeout;
        self
    }

    pub fn with_check_interval(mut self, check_interval: Duration) -> Self {
        self.poll.check_interval = check_interval;
        self
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.poll.settle_delay = settle_delay;
        self
    }

    pub fn with_reminder_lead(mut self, lead: Duration) -> Self {
        self.poll.reminder_lead = Some(lead);
        self
    }

    /// 登录链接回调,链接需要在手机QQ中打开
    pub fn on_link(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_link = Some(Box::new(f));
        self
    }

    pub fn on_pending(mut self, f: impl Fn(&TicketStatus) + Send + Sync + 'static) -> Self {
        self.callbacks.on_pending = Box::new(f);
        self
    }

    pub fn on_success(mut self, f: impl Fn(&TicketStatus) + Send + Sync + 'static) -> Self {
        self.callbacks.on_success = Box::new(f);
        self
    }

    pub fn on_expired(mut self, f: impl Fn(&TicketStatus) + Send + Sync + 'static) -> Self {
        self.callbacks.on_expired = Box::new(f);
        self
    }

    pub fn on_refused(mut self, f: impl Fn(&TicketStatus) + Send + Sync + 'static) -> Self {
        self.callbacks.on_refused = Box::new(f);
        self
    }

    pub fn on_timeout(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.callbacks.on_timeout = Box::new(f);
        self
    }

    pub fn on_reminder(mut self, f: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.callbacks.on_reminder = Box::new(f);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_wait_timeout_is_capped() {
        let config = PollConfig {
            wait_timeout: Duration::from_secs(300),
            ..PollConfig::default()
        };
        assert_eq!(config.effective_wait_timeout(), MAX_WAIT_TIMEOUT);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = PollConfig {
            check_interval: Duration::ZERO,
            ..PollConfig::default()
        };
        assert_eq!(config.effective_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_reminder_offset() {
        let mut config = PollConfig {
            wait_timeout: Duration::from_secs(60),
            ..PollConfig::default()
        };
        assert_eq!(config.reminder_offset(), None);

        config.reminder_lead = Some(Duration::from_secs(15));
        assert_eq!(config.reminder_offset(), Some(Duration::from_secs(45)));

        config.reminder_lead = Some(Duration::from_secs(60));
        assert_eq!(config.reminder_offset(), None);
    }

    #[test]
    fn test_used_dispatches_to_refused() {
        let refused = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&refused);
        let options = MiniProgramLoginOptions::default()
            .on_refused(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        options
            .callbacks
            .dispatch(&PollState::Used, &TicketStatus::Used);
        options
            .callbacks
            .dispatch(&PollState::Unrecognized("Error".into()), &TicketStatus::Error);

        assert_eq!(refused.load(Ordering::SeqCst), 1);
    }
}
