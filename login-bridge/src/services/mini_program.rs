use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::models::status_report::loose_i64;
use crate::models::{
    FlowKind, LoginError, LoginSession, MiniProgramLoginOptions, TicketStatus,
};
use crate::services::poll_engine::run_poll_loop;

/// 登录码签发接口
pub const GET_LOGIN_CODE_URL: &str = "https://q.qq.com/ide/devtoolAuth/GetLoginCode";

/// 登录状态轮询接口
pub const SYNC_TICKET_URL: &str = "https://q.qq.com/ide/devtoolAuth/syncScanSateGetTicket";

/// 票据换取授权码接口
pub const IDE_LOGIN_URL: &str = "https://q.qq.com/ide/login";

/// 开发者工具客户端签名
pub const DEVTOOL_QUA: &str = "V1_HT5_QDT_0.70.2209190_x64_0_DEV_D";

/// 手机QQ中打开的登录链接
const LOGIN_LINK_PREFIX: &str = "https://h5.qzone.qq.com/qqq/code";

/// 开发者工具接口地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevtoolEndpoints {
    pub get_login_code: String,
    pub sync_ticket: String,
    pub ide_login: String,
}

impl Default for DevtoolEndpoints {
    fn default() -> Self {
        Self {
            get_login_code: GET_LOGIN_CODE_URL.to_string(),
            sync_ticket: SYNC_TICKET_URL.to_string(),
            ide_login: IDE_LOGIN_URL.to_string(),
        }
    }
}

/// 登录码签发结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginCode {
    pub code: String,
    /// 在手机QQ中打开即可确认登录
    pub url: String,
}

/// 小程序登录结果
///
/// `code` 为空表示票据换取授权码失败,调用方应视为登录失败。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiniProgramLogin {
    pub ticket: String,
    pub code: String,
}

/// QQ小程序开发者工具登录客户端
pub struct MiniProgramClient {
    http: reqwest::Client,
    endpoints: DevtoolEndpoints,
}

impl MiniProgramClient {
    pub fn new() -> Result<Self, LoginError> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            endpoints: DevtoolEndpoints::default(),
        })
    }

    /// 替换接口地址 (构建器模式)
    pub fn with_endpoints(mut self, endpoints: DevtoolEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// 小程序登录
    ///
    /// 签发登录码 -> `on_link` -> 轮询 -> 票据换取授权码。
    pub async fn login_mini_program(
        &self,
        appid: &str,
        options: MiniProgramLoginOptions,
    ) -> Result<MiniProgramLogin, LoginError> {
        self.login_mini_program_with_cancel(appid, options, CancellationToken::new())
            .await
    }

    /// 小程序登录 (可由外部取消)
    pub async fn login_mini_program_with_cancel(
        &self,
        appid: &str,
        options: MiniProgramLoginOptions,
        cancel: CancellationToken,
    ) -> Result<MiniProgramLogin, LoginError> {
        let login_code = self.request_login_code().await?;

        if let Some(on_link) = &options.on_link {
            on_link(&login_code.url);
        }

        let mut session = LoginSession::new(FlowKind::MiniProgram, login_code.code);
        let code = session.token().to_string();

        tracing::info!(
            session_id = %session.session_id,
            appid = %appid,
            "Mini program login session started"
        );

        let status = run_poll_loop(
            &mut session,
            &options.poll,
            &options.callbacks,
            &cancel,
            || self.query_ticket_status(&code),
            TicketStatus::classify,
        )
        .await?;

        let ticket = match status {
            TicketStatus::Ok { ticket } => ticket,
            other => {
                return Err(LoginError::UnrecognizedStatus {
                    code: format!("{:?}", other),
                })
            }
        };

        let code = self.exchange_ticket(&ticket, appid).await;

        if code.is_empty() {
            tracing::warn!(appid = %appid, "Ticket exchange returned no auth code");
        } else {
            tracing::info!(appid = %appid, "Mini program login completed");
        }

        Ok(MiniProgramLogin { ticket, code })
    }

    /// 签发登录码
    ///
    /// # 错误
    /// - `LoginError::Issuance`: 请求失败或顶层 code 非0
    pub async fn request_login_code(&self) -> Result<LoginCode, LoginError> {
        let body: Value = self
            .http
            .get(&self.endpoints.get_login_code)
            .header("qua", DEVTOOL_QUA)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| LoginError::Issuance(format!("登录码请求失败: {}", e)))?
            .json()
            .await
            .map_err(|e| LoginError::Issuance(format!("登录码响应解析失败: {}", e)))?;

        if loose_i64(&body["code"]) != Some(0) {
            tracing::error!(response = %body, "GetLoginCode rejected");
            return Err(LoginError::Issuance(format!(
                "登录码签发失败: code={}",
                body["code"]
            )));
        }

        let code = body["data"]["code"].as_str().unwrap_or_default().to_string();
        let url = format!("{}/{}?_proxy=1&from=ide", LOGIN_LINK_PREFIX, code);

        tracing::info!(url = %url, "Login code issued");

        Ok(LoginCode { code, url })
    }

    /// 查询一次登录状态
    ///
    /// - 网络失败或非2xx: `LoginError::Transport`
    /// - 响应体无法识别 (非JSON): `TicketStatus::Error`
    pub async fn query_ticket_status(&self, code: &str) -> Result<TicketStatus, LoginError> {
        let response = self
            .http
            .get(&self.endpoints.sync_ticket)
            .query(&[("code", code)])
            .header("qua", DEVTOOL_QUA)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = %status, "syncScanSateGetTicket returned non-2xx");
            return Err(LoginError::Transport(format!("HTTP错误 {}", status.as_u16())));
        }

        let text = response.text().await?;
        match serde_json::from_str::<Value>(&text) {
            Ok(body) => Ok(TicketStatus::from_response(&body)),
            Err(e) => {
                tracing::warn!(error = %e, "syncScanSateGetTicket response is not JSON");
                Ok(TicketStatus::Error)
            }
        }
    }

    /// 票据换取授权码
    ///
    /// 任何失败都返回空字符串。
    pub async fn exchange_ticket(&self, ticket: &str, appid: &str) -> String {
        let response = match self
            .http
            .post(&self.endpoints.ide_login)
            .header("qua", DEVTOOL_QUA)
            .header(ACCEPT, "application/json")
            .json(&json!({ "appid": appid, "ticket": ticket }))
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::warn!(status = %response.status(), "ide/login returned non-2xx");
                return String::new();
            }
            Err(e) => {
                tracing::error!(error = %e, "ide/login request failed");
                return String::new();
            }
        };

        match response.json::<Value>().await {
            Ok(body) => body["code"].as_str().unwrap_or_default().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "ide/login response is not JSON");
                String::new()
            }
        }
    }
}
