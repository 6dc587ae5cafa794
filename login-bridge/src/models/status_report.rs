use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::PollState;

/// ptqrlogin 单次轮询结果
///
/// 每次轮询即时生成,交给分类器与回调后即丢弃,从不持久化。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// 状态码
    /// - 66: 二维码未失效
    /// - 67: 二维码认证中
    /// - 65: 二维码已失效
    /// - 68: 本次登录已被拒绝
    /// - 0: 登录成功
    pub ret: String,

    /// 扩展状态码
    pub extret: String,

    /// 登录成功后的 check_sig 跳转地址
    pub jump_url: String,

    /// 跳转标记
    pub redirect: String,

    /// 提示文案
    pub msg: String,

    /// 登录用户昵称 (仅成功时存在)
    pub nickname: Option<String>,
}

impl StatusReport {
    /// 解析 `ptuiCB(...)` 文本响应
    ///
    /// ```text
    /// ptuiCB('66','0','','0','二维码未失效。', '')
    /// ptuiCB('0','0','https://ptlogin2.qq.com/check_sig?...','0','登录成功！', 'Viki ')
    /// ```
    ///
    /// 去掉外层包装后按逗号切分,每个字段去除空白与首尾单引号。
    /// 缺失的字段视为空字符串;空的 `ret` 会在分类时落入未知状态。
    pub fn parse(body: &str) -> Self {
        let trimmed = body.trim().trim_end_matches(';');
        let inner = trimmed.strip_prefix("ptuiCB(").unwrap_or(trimmed);
        let inner = match inner.rfind(')') {
            Some(end) => &inner[..end],
            None => inner,
        };

        let mut fields = inner.split(',').map(unquote);
        let mut next = || fields.next().unwrap_or_default();

        let ret = next();
        let extret = next();
        let jump_url = next();
        let redirect = next();
        let msg = next();
        let nickname = Some(next()).filter(|n| !n.is_empty());

        Self {
            ret,
            extret,
            jump_url,
            redirect,
            msg,
            nickname,
        }
    }

    /// 网页扫码登录的状态分类
    pub fn classify(&self) -> PollState {
        classify_ret(&self.ret)
    }
}

fn unquote(field: &str) -> String {
    let field = field.trim();
    field
        .strip_prefix('\'')
        .and_then(|f| f.strip_suffix('\''))
        .unwrap_or(field)
        .to_string()
}

/// ret 码 -> 语义状态
///
/// | ret | 状态 | 终态 |
/// |-----|------|------|
/// | 66 | Pending | 否 |
/// | 67 | Scanned | 否 |
/// | 65 | Expired | 是 |
/// | 68 | Refused | 是 |
/// | 0  | Success | 是 |
/// | 其他 | Unrecognized | 是 (失败) |
pub fn classify_ret(ret: &str) -> PollState {
    match ret {
        "66" => PollState::Pending,
        "67" => PollState::Scanned,
        "65" => PollState::Expired,
        "68" => PollState::Refused,
        "0" => PollState::Success,
        other => PollState::Unrecognized(other.to_string()),
    }
}

/// 小程序开发者工具登录状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum TicketStatus {
    /// 等待扫码确认
    Wait,

    /// 已确认,携带换取授权码用的票据
    #[serde(rename = "OK")]
    Ok { ticket: String },

    /// 登录码已过期
    Expired,

    /// 登录码已被使用
    Used,

    /// 响应体无法识别 (非JSON或未知 code)
    Error,
}

/// 登录码已被使用时返回的顶层错误码
pub const TICKET_USED_CODE: i64 = -10003;

impl TicketStatus {
    /// 解析 syncScanSateGetTicket 响应
    ///
    /// ```text
    /// OK:   { "code": 0, "data": { "code": "xxx", "ticket": "xxx", "ok": 1, "uin": "xxx" } }
    /// Wait: { "code": 0, "data": { "code": "xxx" } }
    /// Used: { "code": "-10003", "message": "process fail" }
    /// ```
    pub fn from_response(body: &Value) -> Self {
        match loose_i64(&body["code"]) {
            Some(0) => {
                let data = &body["data"];
                if loose_i64(&data["ok"]) != Some(1) {
                    return TicketStatus::Wait;
                }
                let ticket = data["ticket"].as_str().unwrap_or_default().to_string();
                TicketStatus::Ok { ticket }
            }
            Some(TICKET_USED_CODE) => TicketStatus::Used,
            _ => TicketStatus::Error,
        }
    }

    /// 小程序登录的状态分类
    pub fn classify(&self) -> PollState {
        match self {
            TicketStatus::Wait => PollState::Pending,
            TicketStatus::Ok { .. } => PollState::Success,
            TicketStatus::Expired => PollState::Expired,
            TicketStatus::Used => PollState::Used,
            TicketStatus::Error => PollState::Unrecognized("Error".to_string()),
        }
    }
}

/// 数字或数字字符串均可
pub(crate) fn loose_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
