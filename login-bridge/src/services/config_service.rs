use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::models::{AppIdentity, ConfigError, MAX_WAIT_TIMEOUT};

/// 登录方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMode {
    /// ptlogin 网页扫码
    Web,
    /// 小程序开发者工具
    Mini,
}

/// 命令行工具配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub mode: LoginMode,

    /// 内置平台名称 (仅网页扫码)
    pub platform: String,

    /// 小程序 appid (仅小程序登录)
    pub mini_appid: Option<String>,

    /// 最长等待时间,不超过 120 秒
    pub wait_timeout: Duration,

    pub check_interval: Duration,

    pub reminder_lead: Option<Duration>,

    /// 二维码图片写入位置
    pub qrcode_path: PathBuf,

    /// 日志目录
    pub log_dir: PathBuf,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            mode: LoginMode::Web,
            platform: "qzone".to_string(),
            mini_appid: None,
            wait_timeout: MAX_WAIT_TIMEOUT,
            check_interval: Duration::from_millis(1_000),
            reminder_lead: None,
            qrcode_path: PathBuf::from("qrcode.png"),
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl BridgeConfig {
    /// 平台对应的应用身份
    pub fn identity(&self) -> Result<AppIdentity, ConfigError> {
        AppIdentity::platform(&self.platform)
            .ok_or_else(|| ConfigError::UnknownPlatform(self.platform.clone()))
    }
}

/// 配置服务
///
/// 配置来源优先级: 进程环境变量 > .env 文件 > 默认值
pub struct ConfigService;

impl ConfigService {
    /// 获取 .env 文件路径
    ///
    /// 查找顺序:
    /// 1. 当前工作目录的 .env
    /// 2. 上层目录的 .env (在 login-bridge/ 内执行的情况)
    fn env_file_path() -> Result<Option<PathBuf>, ConfigError> {
        let cwd = env::current_dir()
            .map_err(|e| ConfigError::IoError(format!("无法获取当前目录: {}", e)))?;

        let env_path = cwd.join(".env");
        if env_path.exists() {
            return Ok(Some(env_path));
        }

        Ok(cwd
            .parent()
            .map(|parent| parent.join(".env"))
            .filter(|path| path.exists()))
    }

    /// 加载配置
    ///
    /// `.env` 不存在时直接使用环境变量与默认值(不报错)。
    /// 已存在的环境变量不会被 `.env` 覆盖。
    pub fn load() -> Result<BridgeConfig, ConfigError> {
        match Self::env_file_path()? {
            Some(path) => {
                dotenvy::from_path(&path).map_err(|e| {
                    ConfigError::IoError(format!("读取 {} 失败: {}", path.display(), e))
                })?;
                tracing::info!(path = %path.display(), "Loaded .env configuration");
            }
            None => tracing::debug!("No .env file found, using environment and defaults"),
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值来源解析配置
    ///
    /// # 错误
    /// - `InvalidValue`: 模式或毫秒数格式错误
    /// - `UnknownPlatform`: 平台不在内置表中
    /// - `Missing`: 小程序模式未提供 appid
    pub fn from_lookup<F>(lookup: F) -> Result<BridgeConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = BridgeConfig::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mode = match get("QR_LOGIN_MODE").as_deref() {
            None | Some("web") => LoginMode::Web,
            Some("mini") => LoginMode::Mini,
            Some(other) => return Err(invalid("QR_LOGIN_MODE", other)),
        };

        let platform = get("QR_LOGIN_PLATFORM").unwrap_or(defaults.platform);
        if AppIdentity::platform(&platform).is_none() {
            return Err(ConfigError::UnknownPlatform(platform));
        }

        let mini_appid = get("QR_LOGIN_MINI_APPID");
        if mode == LoginMode::Mini && mini_appid.is_none() {
            return Err(ConfigError::Missing("QR_LOGIN_MINI_APPID".to_string()));
        }

        let wait_timeout = parse_millis(&get, "QR_LOGIN_WAIT_TIMEOUT_MS")?
            .unwrap_or(defaults.wait_timeout)
            .min(MAX_WAIT_TIMEOUT);
        let check_interval =
            parse_millis(&get, "QR_LOGIN_CHECK_INTERVAL_MS")?.unwrap_or(defaults.check_interval);
        let reminder_lead = parse_millis(&get, "QR_LOGIN_REMINDER_LEAD_MS")?;

        let qrcode_path = get("QR_LOGIN_QRCODE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.qrcode_path);
        let log_dir = get("QR_LOGIN_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.log_dir);

        Ok(BridgeConfig {
            mode,
            platform,
            mini_appid,
            wait_timeout,
            check_interval,
            reminder_lead,
            qrcode_path,
            log_dir,
        })
    }
}

fn parse_millis<G>(get: &G, key: &str) -> Result<Option<Duration>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| invalid(key, &raw))
        })
        .transpose()
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}
