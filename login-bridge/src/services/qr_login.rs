use base64::{engine::general_purpose, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{COOKIE, LOCATION, REFERER, SET_COOKIE, USER_AGENT};
use reqwest::redirect::Policy;
use reqwest::Response;
use tokio_util::sync::CancellationToken;

use crate::models::{
    AppIdentity, CookieMap, FlowKind, LoginError, LoginSession, OAuthContinuation,
    QrLoginOptions, StatusReport,
};
use crate::services::poll_engine::run_poll_loop;
use crate::utils::token_hash::hash_a;

/// 二维码签发接口
pub const PTQRSHOW_URL: &str = "https://ssl.ptlogin2.qq.com/ptqrshow";

/// 扫码状态轮询接口
pub const PTQRLOGIN_URL: &str = "https://ssl.ptlogin2.qq.com/ptqrlogin";

/// 登录框页面 (用于构造 Referer)
pub const XLOGIN_URL: &str = "https://xui.ptlogin2.qq.com/cgi-bin/xlogin";

/// 桌面 Chrome User-Agent
pub const CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// iOS 手机QQ User-Agent
pub const UA_IOS_QQ: &str = "QQ/9.1.25.607 CFNetwork/1568.300.101 Darwin/24.2.0";

/// ptqrshow 固定参数: 加密等级、尺寸、倍率、DPI、协议版本
const QRSHOW_FIXED_PARAMS: [(&str, &str); 5] = [("e", "2"), ("l", "M"), ("s", "3"), ("d", "72"), ("v", "4")];

/// ptlogin 接口地址
///
/// 默认即线上地址,仅在测试中指向本地 Mock 服务。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtloginEndpoints {
    pub qrshow: String,
    pub qrlogin: String,
}

impl Default for PtloginEndpoints {
    fn default() -> Self {
        Self {
            qrshow: PTQRSHOW_URL.to_string(),
            qrlogin: PTQRLOGIN_URL.to_string(),
        }
    }
}

/// 二维码签发结果
#[derive(Clone)]
pub struct QrIssuance {
    /// 会话签名,后续每次轮询都要携带
    pub qrsig: String,

    /// 二维码图片 (PNG)
    pub qrcode: Vec<u8>,
}

impl QrIssuance {
    /// base64编码的二维码图片
    pub fn image_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.qrcode)
    }
}

impl std::fmt::Debug for QrIssuance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QrIssuance")
            .field("qrsig_present", &!self.qrsig.is_empty())
            .field("qrcode_bytes", &self.qrcode.len())
            .finish()
    }
}

/// ptlogin 网页扫码登录客户端
///
/// 职责:
/// - 签发二维码并提取 qrsig
/// - 轮询扫码状态
/// - 登录成功后解析 check_sig 跳转,得到站点 cookies
pub struct QrLoginClient {
    http: reqwest::Client,
    /// 不跟随跳转,用于直接读取 check_sig 的 Location 与 Set-Cookie
    no_redirect: reqwest::Client,
    endpoints: PtloginEndpoints,
}

impl QrLoginClient {
    /// 创建新的客户端
    pub fn new() -> Result<Self, LoginError> {
        let http = reqwest::Client::builder().build()?;
        let no_redirect = reqwest::Client::builder().redirect(Policy::none()).build()?;

        Ok(Self {
            http,
            no_redirect,
            endpoints: PtloginEndpoints::default(),
        })
    }

    /// 替换接口地址 (构建器模式)
    pub fn with_endpoints(mut self, endpoints: PtloginEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// 扫码登录
    ///
    /// 完整流程: 签发二维码 -> `on_qrcode` -> 轮询 -> 解析跳转。
    ///
    /// # 返回值
    /// - 直接登录: 序列化后的 cookie 字符串 (含 `p_uin`)
    /// - 第三方登录: `after_oauth2` 的返回值
    pub async fn qr_login(
        &self,
        identity: &AppIdentity,
        options: QrLoginOptions,
    ) -> Result<String, LoginError> {
        self.qr_login_with_cancel(identity, options, CancellationToken::new())
            .await
    }

    /// 扫码登录 (可由外部取消)
    pub async fn qr_login_with_cancel(
        &self,
        identity: &AppIdentity,
        options: QrLoginOptions,
        cancel: CancellationToken,
    ) -> Result<String, LoginError> {
        let QrLoginOptions {
            poll,
            callbacks,
            on_qrcode,
            after_oauth2,
        } = options;

        let issuance = self.request_qrsig(identity).await?;

        if let Some(on_qrcode) = &on_qrcode {
            on_qrcode(&issuance.qrcode);
        }

        let mut session = LoginSession::new(FlowKind::QrCode, issuance.qrsig);
        let qrsig = session.token().to_string();

        tracing::info!(
            session_id = %session.session_id,
            aid = %identity.aid,
            "QR login session started"
        );

        let report = run_poll_loop(
            &mut session,
            &poll,
            &callbacks,
            &cancel,
            || self.check_qr_login(identity, &qrsig),
            StatusReport::classify,
        )
        .await?;

        self.resolve_redirect(&report, after_oauth2).await
    }

    /// 签发二维码
    ///
    /// `qrsig` 从 `Set-Cookie` 中按 `qrsig=VALUE;` 提取。
    /// 缺失时返回空字符串而不是错误,随后的轮询会以未知状态失败。
    ///
    /// # 错误
    /// - `LoginError::Issuance`: 请求失败或服务端返回非2xx
    pub async fn request_qrsig(&self, identity: &AppIdentity) -> Result<QrIssuance, LoginError> {
        let nonce = rand::random::<f64>().to_string();
        let u1 = identity.login_target();

        let mut params: Vec<(&str, &str)> = vec![("appid", identity.aid.as_str())];
        params.extend(QRSHOW_FIXED_PARAMS);
        params.push(("t", nonce.as_str()));
        params.push(("daid", identity.daid.as_str()));
        if let Some(third_aid) = identity.pt_third_aid.as_deref() {
            params.push(("pt_3rd_aid", third_aid));
        }
        params.push(("u1", u1));

        let referer = xlogin_referer(&identity.aid, u1, &identity.daid);

        tracing::debug!(aid = %identity.aid, daid = %identity.daid, "Requesting QR code");

        let response = self
            .http
            .get(&self.endpoints.qrshow)
            .query(&params)
            .header(REFERER, referer)
            .header(USER_AGENT, CHROME_UA)
            .send()
            .await
            .and_then(Response::error_for_status)
            .map_err(|e| {
                tracing::error!(aid = %identity.aid, error = %e, "QR code request failed");
                LoginError::Issuance(format!("二维码请求失败: {}", e))
            })?;

        let qrsig = extract_qrsig(&joined_set_cookie(&response));

        let qrcode = response
            .bytes()
            .await
            .map_err(|e| LoginError::Issuance(format!("读取二维码数据失败: {}", e)))?
            .to_vec();

        if qrsig.is_empty() {
            tracing::warn!(aid = %identity.aid, "qrsig missing from Set-Cookie");
        }

        tracing::info!(
            aid = %identity.aid,
            qrcode_bytes = %qrcode.len(),
            "QR code issued"
        );

        Ok(QrIssuance { qrsig, qrcode })
    }

    /// 查询一次扫码状态
    ///
    /// # 错误
    /// - `LoginError::Transport`: 网络失败或非2xx
    pub async fn check_qr_login(
        &self,
        identity: &AppIdentity,
        qrsig: &str,
    ) -> Result<StatusReport, LoginError> {
        let token = hash_a(qrsig).to_string();

        let mut params: Vec<(&str, &str)> = vec![
            ("ptqrtoken", token.as_str()),
            ("from_ui", "1"),
            ("aid", identity.aid.as_str()),
            ("daid", identity.daid.as_str()),
        ];
        if let Some(third_aid) = identity.pt_third_aid.as_deref() {
            params.push(("pt_3rd_aid", third_aid));
        }
        params.push(("u1", identity.login_target()));

        let body = self
            .http
            .get(&self.endpoints.qrlogin)
            .query(&params)
            .header(COOKIE, format!("qrsig={}", qrsig))
            .header(
                REFERER,
                xlogin_referer(&identity.aid, &identity.redirect_uri, &identity.daid),
            )
            .header(USER_AGENT, CHROME_UA)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let report = StatusReport::parse(&body);
        tracing::trace!(aid = %identity.aid, ret = %report.ret, "ptqrlogin polled");

        Ok(report)
    }

    /// 解析登录成功后的 check_sig 跳转
    ///
    /// 不跟随跳转,直接读取 `Location` 与 `Set-Cookie`:
    /// - Location 指向 `oauth2.0`: 交给 `after_oauth2` 续接
    /// - 否则: `uin` 复制为 `p_uin`,序列化为 cookie 字符串
    pub async fn resolve_redirect(
        &self,
        report: &StatusReport,
        after_oauth2: Option<OAuthContinuation>,
    ) -> Result<String, LoginError> {
        let response = self
            .no_redirect
            .get(&report.jump_url)
            .header(USER_AGENT, CHROME_UA)
            .send()
            .await?;

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let mut cookies = CookieMap::parse_set_cookie(&joined_set_cookie(&response));

        if location.contains("oauth2.0") {
            tracing::info!(
                cookies = %cookies.sample_for_logging(),
                "Redirected to third-party OAuth"
            );
            return match after_oauth2 {
                Some(continuation) => continuation(cookies, report.clone()).await,
                None => Err(LoginError::OAuthContinuationMissing { location }),
            };
        }

        cookies.alias_primary_uin();

        tracing::info!(
            cookies_count = %cookies.len(),
            cookies = %cookies.sample_for_logging(),
            nickname = ?report.nickname,
            "QR login completed"
        );

        Ok(cookies.to_cookie_header())
    }
}

/// xlogin 登录框地址,作为 ptlogin 请求的 Referer
fn xlogin_referer(aid: &str, s_url: &str, daid: &str) -> String {
    format!(
        "{}?appid={}&style=20&s_url={}&maskOpacity=60&daid={}&target=self",
        XLOGIN_URL,
        aid,
        urlencoding::encode(s_url),
        daid
    )
}

/// 多条 Set-Cookie 以 ", " 拼接为一条,交给 CookieMap 解析
fn joined_set_cookie(response: &Response) -> String {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join(", ")
}

static QRSIG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"qrsig=(.*?);").expect("qrsig pattern is a valid literal"));

/// 按 `qrsig=VALUE;` 提取签名
fn extract_qrsig(set_cookie: &str) -> String {
    QRSIG_PATTERN
        .captures(set_cookie)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}
