//! 测试公共模块
//!
//! 基于 mockito 的上游接口模拟与回调计数工具。
//! 每个契约测试文件都独立启动自己的 Mock 服务,互不干扰。

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use qr_login_bridge::models::{MiniProgramLoginOptions, QrLoginOptions};
use qr_login_bridge::services::{
    DevtoolEndpoints, MiniProgramClient, PtloginEndpoints, QrLoginClient,
};

/// 测试用的最小PNG文件头
pub const PNG_STUB: &[u8] = &[0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a];

/// 测试用的 qrsig
pub const QRSIG: &str = "tTsbbFSd3Ydq-vqeOI*zM5*zcxBCkxXf1eJUnbNkDjTm34E0Q6r1pIIqA8A8dwJX";

/// 回调调用计数器
#[derive(Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);

impl Calls {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// 按请求顺序依次返回响应体,最后一个响应体重复使用
pub fn sequenced(bodies: Vec<String>) -> impl Fn(&mockito::Request) -> Vec<u8> + Send + Sync + 'static {
    let next = AtomicUsize::new(0);
    move |_| {
        let index = next.fetch_add(1, Ordering::SeqCst).min(bodies.len() - 1);
        bodies[index].clone().into_bytes()
    }
}

/// ptqrlogin 的 `ptuiCB(...)` 响应
pub fn ptui(ret: &str, jump_url: &str, msg: &str, nickname: &str) -> String {
    format!(
        "ptuiCB('{}','0','{}','0','{}', '{}')",
        ret, jump_url, msg, nickname
    )
}

pub fn ptlogin_endpoints(server: &mockito::Server) -> PtloginEndpoints {
    PtloginEndpoints {
        qrshow: format!("{}/ptqrshow", server.url()),
        qrlogin: format!("{}/ptqrlogin", server.url()),
    }
}

pub fn qr_client(server: &mockito::Server) -> QrLoginClient {
    QrLoginClient::new()
        .expect("HTTP客户端构建失败")
        .with_endpoints(ptlogin_endpoints(server))
}

pub fn mini_client(server: &mockito::Server) -> MiniProgramClient {
    MiniProgramClient::new()
        .expect("HTTP客户端构建失败")
        .with_endpoints(DevtoolEndpoints {
            get_login_code: format!("{}/ide/devtoolAuth/GetLoginCode", server.url()),
            sync_ticket: format!("{}/ide/devtoolAuth/syncScanSateGetTicket", server.url()),
            ide_login: format!("{}/ide/login", server.url()),
        })
}

/// 快速时序: 无首轮等待,20ms 轮询,2 秒截止
pub fn fast_qr_options() -> QrLoginOptions {
    QrLoginOptions::default()
        .with_settle_delay(Duration::ZERO)
        .with_check_interval(Duration::from_millis(20))
        .with_wait_timeout(Duration::from_secs(2))
}

pub fn fast_mini_options() -> MiniProgramLoginOptions {
    MiniProgramLoginOptions::default()
        .with_settle_delay(Duration::ZERO)
        .with_check_interval(Duration::from_millis(20))
        .with_wait_timeout(Duration::from_secs(2))
}
