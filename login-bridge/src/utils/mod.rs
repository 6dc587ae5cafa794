//! 工具模块
//!
//! - `logger`: 日志系统初始化与结构化日志宏
//! - `token_hash`: ptqrtoken / g_tk 计算

pub mod logger;
pub mod token_hash;

pub use token_hash::{g_tk, hash_a, hash_b};
