//! 轮询引擎
//!
//! 两种登录流程共用的轮询/超时/取消机制:
//!
//! ```text
//! settle ──> arm timers ──┬─ tick ──> check ──> classify ──> observe
//!                         │                                    │
//!                         │         Notify: 边沿触发回调 <──────┤
//!                         │         Terminal: 回调 + 结束 <─────┘
//!                         ├─ deadline ──> on_timeout + Timeout
//!                         ├─ reminder ──> on_reminder (不影响状态,请求进行中也会触发)
//!                         └─ cancel ────> Cancelled
//! ```
//!
//! 轮询是串行的: 上一次请求返回之前不会开始下一次,
//! 错过的 tick 顺延而不是补发。截止时间与正在进行的请求赛跑,
//! 截止先到时请求被丢弃。

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::models::login_session::{remaining_after_reminder, Raced, TimerEvent};
use crate::models::{
    LoginError, LoginSession, NegativeOutcome, PollConfig, PollState, StateCallbacks, Transition,
};

/// 驱动一个会话直到终态
///
/// # 参数
/// - `session`: 刚签发的会话,由本次调用独占
/// - `config`: 轮询时序
/// - `callbacks`: 按语义状态分发的回调
/// - `cancel`: 外部取消令牌
/// - `check`: 单次状态查询
/// - `classify`: 原始结果 -> 语义状态
///
/// # 返回值
/// - `Ok(report)`: 成功时的状态报告,`on_success` 已调用
/// - `Err(LoginError::Negative)`: 过期/拒绝/已使用,对应回调已调用
/// - `Err(LoginError::Timeout)`: 截止时间到,`on_timeout` 已调用
/// - `Err(..)`: 传输错误、未知状态或被取消
pub async fn run_poll_loop<R, C, Fut, K>(
    session: &mut LoginSession,
    config: &PollConfig,
    callbacks: &StateCallbacks<R>,
    cancel: &CancellationToken,
    mut check: C,
    classify: K,
) -> Result<R, LoginError>
where
    C: FnMut() -> Fut,
    Fut: Future<Output = Result<R, LoginError>>,
    K: Fn(&R) -> PollState,
{
    if !config.settle_delay.is_zero() {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(session)),
            _ = tokio::time::sleep(config.settle_delay) => {}
        }
    }

    session.arm_timers(config);

    tracing::debug!(
        session_id = %session.session_id,
        flow = ?session.flow,
        interval_ms = %config.effective_interval().as_millis(),
        wait_timeout_ms = %config.effective_wait_timeout().as_millis(),
        "Poll loop started"
    );

    loop {
        match session.next_event(cancel).await {
            TimerEvent::Tick => {}
            TimerEvent::Reminder => {
                remind(session, config, callbacks);
                continue;
            }
            TimerEvent::Deadline => return Err(expire(session, config, callbacks)),
            TimerEvent::Cancelled | TimerEvent::Disarmed => return Err(cancelled(session)),
        }

        if session.is_finalized() {
            return Err(cancelled(session));
        }

        session.record_poll();

        let in_flight = check();
        tokio::pin!(in_flight);

        let report = loop {
            match session.race(cancel, in_flight.as_mut()).await {
                Raced::Done(Ok(report)) => break report,
                Raced::Done(Err(err)) => {
                    session.finalize();
                    tracing::error!(
                        session_id = %session.session_id,
                        flow = ?session.flow,
                        error = %err,
                        "Poll failed"
                    );
                    return Err(err);
                }
                Raced::Reminder => remind(session, config, callbacks),
                Raced::Deadline => return Err(expire(session, config, callbacks)),
                Raced::Cancelled | Raced::Disarmed => return Err(cancelled(session)),
            }
        };

        let state = classify(&report);

        match session.observe(&state) {
            Transition::Unchanged => {
                tracing::trace!(session_id = %session.session_id, state = ?state, "Status unchanged");
            }
            Transition::Notify(state) => {
                tracing::info!(
                    session_id = %session.session_id,
                    flow = ?session.flow,
                    state = ?state,
                    "Login status changed"
                );
                callbacks.dispatch(&state, &report);
            }
            Transition::Terminal(state) => {
                tracing::info!(
                    session_id = %session.session_id,
                    flow = ?session.flow,
                    state = ?state,
                    polls = %session.poll_count(),
                    duration_ms = %session.duration_ms(),
                    "Login reached terminal state"
                );
                callbacks.dispatch(&state, &report);
                return terminal_result(state, report);
            }
            Transition::Discarded => {
                tracing::debug!(session_id = %session.session_id, "Late poll result discarded");
                return Err(cancelled(session));
            }
        }
    }
}

/// 终态 -> 调用结果
fn terminal_result<R>(state: PollState, report: R) -> Result<R, LoginError> {
    match state {
        PollState::Success => Ok(report),
        PollState::Expired => Err(LoginError::Negative(NegativeOutcome::Expired)),
        PollState::Refused => Err(LoginError::Negative(NegativeOutcome::Refused)),
        PollState::Used => Err(LoginError::Negative(NegativeOutcome::Used)),
        PollState::Unrecognized(code) => Err(LoginError::UnrecognizedStatus { code }),
        other @ (PollState::Pending | PollState::Scanned) => Err(LoginError::UnrecognizedStatus {
            code: format!("{:?}", other),
        }),
    }
}

/// 提醒到期: 只通知,不改变会话状态
fn remind<R>(session: &LoginSession, config: &PollConfig, callbacks: &StateCallbacks<R>) {
    let remaining = remaining_after_reminder(config);
    tracing::info!(
        session_id = %session.session_id,
        remaining_ms = %remaining.as_millis(),
        "Login deadline approaching"
    );
    (callbacks.on_reminder)(remaining);
}

/// 截止时间到: 仅在首次终结时触发 on_timeout
fn expire<R>(
    session: &mut LoginSession,
    config: &PollConfig,
    callbacks: &StateCallbacks<R>,
) -> LoginError {
    let waited_ms = config.effective_wait_timeout().as_millis() as u64;

    if session.finalize() {
        tracing::warn!(
            session_id = %session.session_id,
            flow = ?session.flow,
            waited_ms = %waited_ms,
            polls = %session.poll_count(),
            "Login timed out"
        );
        (callbacks.on_timeout)();
    }

    LoginError::Timeout { waited_ms }
}

fn cancelled(session: &mut LoginSession) -> LoginError {
    if session.finalize() {
        tracing::info!(session_id = %session.session_id, flow = ?session.flow, "Login session cancelled");
    }
    LoginError::Cancelled
}
