use serde::{Deserialize, Serialize};

/// 第三方登录时 ptlogin 使用的统一跳转地址
pub const OAUTH2_LOGIN_JUMP: &str = "https://graph.qq.com/oauth2.0/login_jump";

/// 扫码登录的应用身份
///
/// 决定 ptlogin 为哪个站点签发二维码,以及登录成功后跳转到哪里。
/// 配置了 `pt_third_aid` 的应用走 QQ互联 OAuth 续接,
/// 否则直接跳转到 `redirect_uri` 并下发站点 cookies。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppIdentity {
    /// ptlogin 应用ID (appid / aid)
    pub aid: String,

    /// 域ID
    pub daid: String,

    /// 登录成功后的跳转地址
    pub redirect_uri: String,

    /// 站点登录页地址 (可选)
    pub referrer: Option<String>,

    /// 第三方应用ID (QQ互联)
    pub pt_third_aid: Option<String>,

    /// OAuth response_type
    pub response_type: Option<String>,

    /// OAuth openapi 标记
    pub openapi: Option<String>,
}

/// 内置平台名称
pub const PLATFORMS: &[&str] = &["vip", "qzone", "music", "wegame", "val"];

impl AppIdentity {
    /// 创建直接跳转型应用身份
    pub fn new(aid: impl Into<String>, daid: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            aid: aid.into(),
            daid: daid.into(),
            redirect_uri: redirect_uri.into(),
            referrer: None,
            pt_third_aid: None,
            response_type: None,
            openapi: None,
        }
    }

    /// 设置站点登录页 (构建器模式)
    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    /// 设置第三方OAuth参数 (构建器模式)
    pub fn with_third_party(
        mut self,
        pt_third_aid: impl Into<String>,
        response_type: impl Into<String>,
        openapi: impl Into<String>,
    ) -> Self {
        self.pt_third_aid = Some(pt_third_aid.into());
        self.response_type = Some(response_type.into());
        self.openapi = Some(openapi.into());
        self
    }

    /// 从内置登录表中按平台名称查找
    ///
    /// 支持: vip, qzone, music, wegame, val
    pub fn platform(name: &str) -> Option<Self> {
        let identity = match name {
            "vip" => Self::new("8000201", "18", "https://vip.qq.com/loginsuccess.html").with_referrer(
                "https://xui.ptlogin2.qq.com/cgi-bin/xlogin?appid=8000201&style=20&s_url=https%3A%2F%2Fvip.qq.com%2Floginsuccess.html&maskOpacity=60&daid=18&target=self",
            ),
            "qzone" => Self::new(
                "549000912",
                "5",
                "https://qzs.qzone.qq.com/qzone/v5/loginsucc.html?para=izone",
            )
            .with_referrer("https://qzone.qq.com/"),
            "music" => Self::new(
                "716027609",
                "383",
                "https://y.qq.com/portal/wx_redirect.html?login_type=1&surl=https%3A%2F%2Fy.qq.com%2F",
            )
            .with_third_party("100497308", "code", "1010_1030"),
            "wegame" => Self::new(
                "1600001063",
                "733",
                "https://www.wegame.com.cn/middle/login/third_callback.html",
            )
            .with_referrer("https://www.wegame.com.cn/"),
            "val" => Self::new(
                "716027609",
                "383",
                "https://val.qq.com/comm-htdocs/login/qc_redirect.html?parent_domain=https%3A%2F%2Fval.qq.com&isMiloSDK=1&isPc=1",
            )
            .with_third_party("102059301", "code", "1010_1030"),
            _ => return None,
        };

        Some(identity)
    }

    /// 是否走第三方OAuth续接
    pub fn is_third_party(&self) -> bool {
        self.pt_third_aid.is_some()
    }

    /// ptlogin 的 u1 参数
    pub fn login_target(&self) -> &str {
        if self.is_third_party() {
            OAUTH2_LOGIN_JUMP
        } else {
            &self.redirect_uri
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_builtin_platform_resolves() {
        for name in PLATFORMS {
            let identity = AppIdentity::platform(name);
            assert!(identity.is_some(), "platform {} missing", name);
        }
        assert!(AppIdentity::platform("unknown").is_none());
    }

    #[test]
    fn test_direct_platform_targets_redirect_uri() {
        let qzone = AppIdentity::platform("qzone").unwrap();
        assert!(!qzone.is_third_party());
        assert_eq!(qzone.aid, "549000912");
        assert_eq!(qzone.login_target(), qzone.redirect_uri);
    }

    #[test]
    fn test_third_party_platform_targets_oauth_jump() {
        let music = AppIdentity::platform("music").unwrap();
        assert!(music.is_third_party());
        assert_eq!(music.pt_third_aid.as_deref(), Some("100497308"));
        assert_eq!(music.login_target(), OAUTH2_LOGIN_JUMP);
    }
}
