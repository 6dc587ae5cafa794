use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 初始化日志系统
///
/// - JSON格式文件: 按天轮转,文件名 `qr-login.YYYY-MM-DD.log`
/// - 控制台: 人类可读格式,输出到 stderr (stdout 留给登录结果)
/// - non_blocking: 日志 I/O 不阻塞轮询
/// - 环境变量控制: RUST_LOG=debug 可调整日志级别
///
/// # 示例日志
/// ```json
/// {
///   "timestamp": "2025-10-05T10:30:45.123Z",
///   "level": "INFO",
///   "target": "qr_login_bridge::services::poll_engine",
///   "fields": {
///     "session_id": "6c1f...",
///     "state": "Scanned",
///     "message": "Login status changed"
///   }
/// }
/// ```
///
/// # 重要提示
/// 返回的guard必须被调用者保存,直到程序退出。
/// 如果guard被drop,文件写入器将被关闭。
pub fn init(log_dir: &Path) -> Result<WorkerGuard, io::Error> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("qr-login")
        .filename_suffix("log")
        .build(log_dir)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // 默认: INFO级别
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false);

    let console_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e))?;

    Ok(guard)
}

/// 日志宏辅助模块
///
/// 提供结构化日志的便捷宏
pub mod macros {
    /// 记录业务事件
    ///
    /// 使用示例:
    /// ```no_run
    /// use qr_login_bridge::log_event;
    /// log_event!("QrCodeWritten", path = "qrcode.png", bytes = 1024);
    /// ```
    #[macro_export]
    macro_rules! log_event {
        ($event_type:expr, $($field:tt = $value:expr),* $(,)?) => {
            tracing::info!(
                event_type = $event_type,
                $($field = $value),*
            );
        };
    }

    /// 记录错误事件
    ///
    /// 使用示例:
    /// ```no_run
    /// use qr_login_bridge::log_error;
    /// log_error!("LoginFailed", error = "timeout");
    /// ```
    #[macro_export]
    macro_rules! log_error {
        ($event_type:expr, $($field:tt = $value:expr),* $(,)?) => {
            tracing::error!(
                event_type = $event_type,
                $($field = $value),*
            );
        };
    }
}
