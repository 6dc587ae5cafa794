//! QQ 扫码登录桥接
//!
//! - ptlogin 网页扫码登录: 签发二维码、轮询扫码状态、解析跳转得到站点 cookies
//! - QQ小程序开发者工具登录: 签发登录码、轮询票据、换取授权码
//!
//! 两种流程共用同一套会话状态机与计时器 (见 [`services::poll_engine`])。

pub mod models;
pub mod services;
pub mod state;
pub mod utils;

pub use state::LoginServices;
