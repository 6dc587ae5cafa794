use std::sync::Arc;

use uuid::Uuid;

use crate::models::{AppIdentity, LoginError, MiniProgramLoginOptions, QrLoginOptions};
use crate::services::{MiniProgramClient, MiniProgramLogin, QrLoginClient, SessionManager};

/// 登录服务注册表
///
/// 宿主进程持有一个实例并按引用传递,没有进程级全局状态:
/// - qr_client: ptlogin 网页扫码
/// - mini_client: 小程序开发者工具登录
/// - session_manager: 进行中登录的取消登记
pub struct LoginServices {
    pub qr_client: Arc<QrLoginClient>,

    pub mini_client: Arc<MiniProgramClient>,

    pub session_manager: Arc<SessionManager>,
}

impl LoginServices {
    /// 初始化服务注册表
    ///
    /// # 错误处理
    /// HTTP客户端构建失败时返回 `LoginError::Transport`
    pub fn new() -> Result<Self, LoginError> {
        Ok(Self::with_clients(QrLoginClient::new()?, MiniProgramClient::new()?))
    }

    /// 使用已配置的客户端组装注册表
    pub fn with_clients(qr_client: QrLoginClient, mini_client: MiniProgramClient) -> Self {
        tracing::info!("LoginServices initialized");

        Self {
            qr_client: Arc::new(qr_client),
            mini_client: Arc::new(mini_client),
            session_manager: Arc::new(SessionManager::new()),
        }
    }

    /// 网页扫码登录,并在登录期间登记到会话管理器
    ///
    /// 其他任务可以通过 `session_manager.cancel(&login_id)` 放弃这次登录。
    pub async fn qr_login(
        &self,
        login_id: Uuid,
        identity: &AppIdentity,
        options: QrLoginOptions,
    ) -> Result<String, LoginError> {
        let registration = self.session_manager.register(login_id).await;
        let result = self
            .qr_client
            .qr_login_with_cancel(identity, options, registration.token.clone())
            .await;
        self.session_manager.release(&login_id, &registration).await;
        result
    }

    /// 小程序登录,并在登录期间登记到会话管理器
    pub async fn login_mini_program(
        &self,
        login_id: Uuid,
        appid: &str,
        options: MiniProgramLoginOptions,
    ) -> Result<MiniProgramLogin, LoginError> {
        let registration = self.session_manager.register(login_id).await;
        let result = self
            .mini_client
            .login_mini_program_with_cancel(appid, options, registration.token.clone())
            .await;
        self.session_manager.release(&login_id, &registration).await;
        result
    }
}
