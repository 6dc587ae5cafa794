use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 登录流程相关错误
///
/// 覆盖扫码登录与小程序登录的完整失败分类。
/// 签发失败发生在任何计时器创建之前;其余错误都意味着会话已进入终态,
/// 所有计时器已随会话一并释放。
#[derive(Debug, Error, Serialize, Deserialize)]
#[serde(tag = "error", content = "details")]
pub enum LoginError {
    /// 无法获取二维码签名或登录码
    ///
    /// 同步返回,此时尚未启动轮询
    #[error("登录凭证签发失败: {0}")]
    Issuance(String),

    /// 网络请求失败
    ///
    /// 可能原因:
    /// - 轮询或换取授权码时连接中断
    /// - 服务端返回非2xx状态码
    /// - 响应体无法读取或解析
    #[error("网络请求失败: {0}")]
    Transport(String),

    /// 上游返回了未知状态码
    #[error("未知的登录状态: {code}")]
    UnrecognizedStatus { code: String },

    /// 在最长等待时间内未进入任何终态
    #[error("等待扫码超时 ({waited_ms}ms)")]
    Timeout { waited_ms: u64 },

    /// 二维码过期、用户拒绝或票据已被使用
    ///
    /// 属于正常的终态结局,对应的生命周期回调已先于错误返回触发
    #[error("登录未完成: {0}")]
    Negative(NegativeOutcome),

    /// 会话被外部取消
    #[error("登录会话已被取消")]
    Cancelled,

    /// 跳转到第三方OAuth但调用方未提供续接处理
    #[error("需要第三方授权续接,但未配置 after_oauth2: {location}")]
    OAuthContinuationMissing { location: String },
}

/// 非异常终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegativeOutcome {
    /// 二维码已失效
    Expired,

    /// 本次登录已被拒绝
    Refused,

    /// 票据已被使用
    Used,
}

impl std::fmt::Display for NegativeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NegativeOutcome::Expired => write!(f, "二维码已失效"),
            NegativeOutcome::Refused => write!(f, "本次登录已被拒绝"),
            NegativeOutcome::Used => write!(f, "登录票据已被使用"),
        }
    }
}

impl LoginError {
    /// 是否为超时
    pub fn is_timeout(&self) -> bool {
        matches!(self, LoginError::Timeout { .. })
    }

    /// 获取非异常终态 (如果是)
    pub fn negative_outcome(&self) -> Option<NegativeOutcome> {
        match self {
            LoginError::Negative(outcome) => Some(*outcome),
            _ => None,
        }
    }
}

/// 实现从reqwest::Error到LoginError的转换
impl From<reqwest::Error> for LoginError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LoginError::Transport("请求超时".to_string())
        } else if err.is_connect() {
            LoginError::Transport("无法连接到服务器".to_string())
        } else if let Some(status) = err.status() {
            LoginError::Transport(format!("HTTP错误 {}", status.as_u16()))
        } else {
            LoginError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LoginError {
    fn from(err: serde_json::Error) -> Self {
        LoginError::Transport(format!("响应数据解析失败: {}", err))
    }
}

/// 命令行配置相关错误
#[derive(Debug, Error, Serialize, Deserialize)]
#[serde(tag = "error", content = "details")]
pub enum ConfigError {
    /// 配置值格式错误
    #[error("配置项 {key} 的值无效: {value}")]
    InvalidValue { key: String, value: String },

    /// 平台名称不在内置登录表中
    #[error("未知的登录平台: {0}")]
    UnknownPlatform(String),

    /// 缺少必需配置
    #[error("缺少必需配置: {0}")]
    Missing(String),

    /// 文件读写失败
    #[error("IO错误: {0}")]
    IoError(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err.to_string())
    }
}
