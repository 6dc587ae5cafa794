//! 数据模型模块
//!
//! 包含所有核心数据结构:
//! - errors: 错误类型定义 (登录流程、命令行配置)
//! - app_identity: 扫码登录的应用身份与内置平台表
//! - cookie_map: 有序Cookie表 (Set-Cookie 解析与 Cookie 头序列化)
//! - status_report: 单次轮询结果与状态分类
//! - login_session: 登录会话 (状态机 + 计时器三件套)
//! - login_options: 轮询时序与生命周期回调
//!
//! # 设计原则
//!
//! 1. **存在即合理**: 每个字段都有明确目的,无冗余
//! 2. **错误处理**: 所有失败路径返回 Result,提供完整上下文
//! 3. **日志安全**: qrsig、票据、cookie 值不出现在 Debug 输出与日志中

pub mod app_identity;
pub mod cookie_map;
pub mod errors;
pub mod login_options;
pub mod login_session;
pub mod status_report;

// 重导出常用类型,简化外部引用
pub use app_identity::{AppIdentity, OAUTH2_LOGIN_JUMP, PLATFORMS};
pub use cookie_map::{transform_set_cookie, CookieMap};
pub use errors::{ConfigError, LoginError, NegativeOutcome};
pub use login_options::{
    MiniProgramLoginOptions, OAuthContinuation, PollConfig, QrLoginOptions, StateCallbacks,
    DEFAULT_CHECK_INTERVAL, DEFAULT_SETTLE_DELAY, MAX_WAIT_TIMEOUT,
};
pub use login_session::{FlowKind, LoginSession, PollState, Transition};
pub use status_report::{classify_ret, StatusReport, TicketStatus};
