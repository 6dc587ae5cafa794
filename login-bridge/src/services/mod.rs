//! 服务层模块
//!
//! - `poll_engine`: 两种登录流程共用的轮询/超时/取消机制
//! - `qr_login`: ptlogin 网页扫码登录客户端
//! - `mini_program`: QQ小程序开发者工具登录客户端
//! - `session_manager`: 进行中登录的取消令牌登记
//! - `config_service`: 命令行工具的 .env 配置
//!
//! # 服务架构
//!
//! ```text
//! ┌───────────────────────────────────────┐
//! │          LoginServices (state)        │
//! │  ┌──────────────┐  ┌────────────────┐ │
//! │  │ QrLoginClient│  │MiniProgramClient│ │
//! │  └──────┬───────┘  └───────┬────────┘ │
//! │         └────────┬─────────┘          │
//! │           ┌──────▼──────┐             │
//! │           │ poll_engine │             │
//! │           └─────────────┘             │
//! │  SessionManager ── CancellationToken  │
//! └───────────────────────────────────────┘
//!          │                 │
//!          ▼                 ▼
//!   ssl.ptlogin2.qq.com   q.qq.com/ide
//! ```
//!
//! # 使用示例
//!
//! ```no_run
//! use qr_login_bridge::models::{AppIdentity, QrLoginOptions};
//! use qr_login_bridge::services::QrLoginClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = QrLoginClient::new()?;
//! let identity = AppIdentity::platform("qzone").ok_or("unknown platform")?;
//!
//! let options = QrLoginOptions::default()
//!     .on_qrcode(|png| {
//!         let _ = std::fs::write("qrcode.png", png);
//!     })
//!     .on_scanned(|_| println!("已扫码,请在手机上确认"));
//!
//! let cookies = client.qr_login(&identity, options).await?;
//! println!("{}", cookies);
//! # Ok(())
//! # }
//! ```

pub mod config_service;
pub mod mini_program;
pub mod poll_engine;
pub mod qr_login;
pub mod session_manager;

// 重导出常用类型,简化外部引用
pub use config_service::{BridgeConfig, ConfigService, LoginMode};
pub use mini_program::{DevtoolEndpoints, LoginCode, MiniProgramClient, MiniProgramLogin};
pub use poll_engine::run_poll_loop;
pub use qr_login::{PtloginEndpoints, QrIssuance, QrLoginClient, CHROME_UA, UA_IOS_QQ};
pub use session_manager::{Registration, SessionManager};
