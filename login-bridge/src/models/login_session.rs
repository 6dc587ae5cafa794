use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant, Interval, MissedTickBehavior, Sleep};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::PollConfig;

/// 轮询的语义状态
///
/// 两种登录流程各自的原始状态码都先归类到这里,再驱动会话状态机。
///
/// 状态转换流程:
/// ```text
/// Pending <-> Scanned ---> Success
///     |          |
///     +----------+---> Expired / Refused / Used / Unrecognized
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    /// 等待扫码
    Pending,

    /// 已扫码,等待确认
    Scanned,

    /// 登录成功
    Success,

    /// 二维码/登录码已过期
    Expired,

    /// 用户拒绝
    Refused,

    /// 登录码已被使用
    Used,

    /// 无法识别的上游状态
    Unrecognized(String),
}

impl PollState {
    /// 检查是否为终态
    ///
    /// 一旦进入终态,不应再进行状态轮询。
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollState::Pending | PollState::Scanned)
    }
}

/// 登录流程类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    /// ptlogin 网页扫码登录
    QrCode,

    /// 小程序开发者工具登录
    MiniProgram,
}

/// 一次观察的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// 非终态且与上一次不同,触发对应回调
    Notify(PollState),

    /// 与上一次相同,保持静默
    Unchanged,

    /// 进入终态,计时器已全部取消
    Terminal(PollState),

    /// 会话已终结,迟到的结果被丢弃
    Discarded,
}

/// 会话计时器三件套
///
/// 周期轮询、一次性截止、可选的一次性提醒。三者同生同灭。
struct SessionTimers {
    ticker: Interval,
    deadline: Pin<Box<Sleep>>,
    reminder: Option<Pin<Box<Sleep>>>,
}

/// 计时器事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerEvent {
    Tick,
    Deadline,
    Reminder,
    Cancelled,
    Disarmed,
}

/// 与截止时间赛跑的结果
///
/// `Reminder` 时请求仍在进行,调用方处理提醒后应继续等待同一个请求。
pub(crate) enum Raced<T> {
    Done(T),
    Deadline,
    Reminder,
    Cancelled,
    Disarmed,
}

/// 登录会话
///
/// 由一次登录调用独占,从签发到终态的完整生命周期都在这里:
/// - `token`: 网页流程的 qrsig 或小程序流程的登录码,签发后不可变
/// - `previous`: 上一次轮询的语义状态,用于边沿触发
/// - 计时器三件套,终态或外部取消时一并释放
///
/// 所有状态变化都经过 [`LoginSession::observe`] 与 [`LoginSession::finalize`],
/// 终态处理是幂等的。
pub struct LoginSession {
    /// 会话唯一ID (仅用于日志关联)
    pub session_id: Uuid,

    /// 流程类型
    pub flow: FlowKind,

    /// 创建时间
    pub created_at: DateTime<Utc>,

    token: String,
    previous: Option<PollState>,
    timers: Option<SessionTimers>,
    finalized: bool,
    polls: u32,
}

impl LoginSession {
    /// 创建新的登录会话
    pub fn new(flow: FlowKind, token: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            flow,
            created_at: Utc::now(),
            token: token.into(),
            previous: None,
            timers: None,
            finalized: false,
            polls: 0,
        }
    }

    /// qrsig 或登录码
    pub fn token(&self) -> &str {
        &self.token
    }

    /// 上一次轮询的语义状态
    pub fn previous_state(&self) -> Option<&PollState> {
        self.previous.as_ref()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn has_live_timers(&self) -> bool {
        self.timers.is_some()
    }

    /// 已发起的轮询次数
    pub fn poll_count(&self) -> u32 {
        self.polls
    }

    /// 获取会话持续时长(毫秒)
    pub fn duration_ms(&self) -> i64 {
        (Utc::now() - self.created_at).num_milliseconds()
    }

    /// 启动计时器三件套
    ///
    /// 会话已终结或计时器已存在时不做任何事,保证任何时刻最多一组计时器。
    pub fn arm_timers(&mut self, config: &PollConfig) {
        if self.finalized || self.timers.is_some() {
            return;
        }

        let now = Instant::now();
        let period = config.effective_interval();

        let mut ticker = time::interval_at(now + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let deadline = Box::pin(time::sleep_until(now + config.effective_wait_timeout()));
        let reminder = config
            .reminder_offset()
            .map(|offset| Box::pin(time::sleep_until(now + offset)));

        self.timers = Some(SessionTimers {
            ticker,
            deadline,
            reminder,
        });
    }

    /// 唯一的状态转换入口
    ///
    /// - 已终结: 丢弃 (迟到的结果)
    /// - 终态: 取消计时器并终结
    /// - 非终态且与上一次不同: 通知
    /// - 非终态且相同: 静默
    pub fn observe(&mut self, state: &PollState) -> Transition {
        if self.finalized {
            return Transition::Discarded;
        }

        if state.is_terminal() {
            self.finalize();
            self.previous = Some(state.clone());
            return Transition::Terminal(state.clone());
        }

        let changed = self.previous.as_ref() != Some(state);
        self.previous = Some(state.clone());

        if changed {
            Transition::Notify(state.clone())
        } else {
            Transition::Unchanged
        }
    }

    /// 终结会话并释放全部计时器
    ///
    /// 返回 `false` 表示会话此前已经终结。
    pub fn finalize(&mut self) -> bool {
        self.timers = None;
        if self.finalized {
            return false;
        }
        self.finalized = true;
        true
    }

    pub(crate) fn record_poll(&mut self) {
        self.polls += 1;
    }

    /// 等待下一个计时器事件
    ///
    /// 截止时间优先于同时到期的轮询。
    pub(crate) async fn next_event(&mut self, cancel: &CancellationToken) -> TimerEvent {
        let Some(SessionTimers {
            ticker,
            deadline,
            reminder,
        }) = self.timers.as_mut()
        else {
            return TimerEvent::Disarmed;
        };

        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => TimerEvent::Cancelled,
            _ = deadline.as_mut() => TimerEvent::Deadline,
            _ = fire_once(&mut *reminder) => TimerEvent::Reminder,
            _ = ticker.tick() => TimerEvent::Tick,
        };

        if event == TimerEvent::Reminder {
            *reminder = None;
        }

        event
    }

    /// 让一次轮询与截止时间赛跑
    ///
    /// 截止时间先到时,正在进行的请求被直接丢弃。
    /// 提醒在请求进行中到期时返回 `Raced::Reminder`,请求本身不受影响。
    pub(crate) async fn race<F: Future>(
        &mut self,
        cancel: &CancellationToken,
        fut: Pin<&mut F>,
    ) -> Raced<F::Output> {
        let Some(SessionTimers {
            deadline, reminder, ..
        }) = self.timers.as_mut()
        else {
            return Raced::Disarmed;
        };

        let raced = tokio::select! {
            biased;
            _ = cancel.cancelled() => Raced::Cancelled,
            _ = deadline.as_mut() => Raced::Deadline,
            _ = fire_once(&mut *reminder) => Raced::Reminder,
            output = fut => Raced::Done(output),
        };

        if matches!(raced, Raced::Reminder) {
            *reminder = None;
        }

        raced
    }
}

async fn fire_once(slot: &mut Option<Pin<Box<Sleep>>>) {
    match slot {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

impl std::fmt::Debug for LoginSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // token 属于登录凭证,不输出
        f.debug_struct("LoginSession")
            .field("session_id", &self.session_id)
            .field("flow", &self.flow)
            .field("previous", &self.previous)
            .field("finalized", &self.finalized)
            .field("live_timers", &self.timers.is_some())
            .field("polls", &self.polls)
            .finish()
    }
}

/// 计算提醒时刻相对截止时间的剩余量
pub(crate) fn remaining_after_reminder(config: &PollConfig) -> Duration {
    config
        .reminder_lead
        .unwrap_or_default()
        .min(config.effective_wait_timeout())
}
