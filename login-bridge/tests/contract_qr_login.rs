//! 网页扫码登录契约测试
//!
//! 使用 mockito 模拟 ptqrshow / ptqrlogin / check_sig 三个接口,验证:
//! - 成功场景: 66 -> 67 -> 0 的完整流程与回调次数
//! - 第三方场景: Location 指向 oauth2.0 时交给 after_oauth2 续接
//! - 失败场景: 签发失败、未知状态、过期、超时、传输错误、外部取消

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{fast_qr_options, ptui, qr_client, sequenced, Calls, PNG_STUB, QRSIG};
use mockito::Matcher;
use qr_login_bridge::models::{AppIdentity, LoginError, NegativeOutcome};
use qr_login_bridge::utils::hash_a;
use qr_login_bridge::LoginServices;
use qr_login_bridge::services::MiniProgramClient;
use uuid::Uuid;

async fn mock_qrshow(server: &mut mockito::Server) -> mockito::Mock {
    server
        .mock("GET", "/ptqrshow")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "image/png")
        .with_header(
            "set-cookie",
            &format!("qrsig={}; Path=/; Domain=ptlogin2.qq.com; Secure;", QRSIG),
        )
        .with_body(PNG_STUB)
        .create_async()
        .await
}

#[tokio::test]
async fn test_direct_login_full_flow() {
    let mut server = mockito::Server::new_async().await;
    let jump_url = format!("{}/check_sig", server.url());

    let qrshow = mock_qrshow(&mut server).await;

    let ptqrlogin = server
        .mock("GET", "/ptqrlogin")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("ptqrtoken".into(), hash_a(QRSIG).to_string()),
            Matcher::UrlEncoded("from_ui".into(), "1".into()),
        ]))
        .match_header("cookie", format!("qrsig={}", QRSIG).as_str())
        .with_status(200)
        .with_body_from_request(sequenced(vec![
            ptui("66", "", "二维码未失效。", ""),
            ptui("66", "", "二维码未失效。", ""),
            ptui("67", "", "二维码认证中。", ""),
            ptui("0", &jump_url, "登录成功！", "Viki"),
        ]))
        .expect(4)
        .create_async()
        .await;

    let check_sig = server
        .mock("GET", "/check_sig")
        .match_query(Matcher::Any)
        .with_status(302)
        .with_header("location", "https://user.qzone.qq.com/10001")
        .with_header("set-cookie", "uin=o0010001; Path=/; Domain=qq.com")
        .with_header("set-cookie", "skey=@abcDEF; Path=/; Domain=qq.com")
        .create_async()
        .await;

    let pending = Calls::default();
    let scanned = Calls::default();
    let success = Calls::default();
    let qrcode = Arc::new(Mutex::new(Vec::new()));

    let options = {
        let (pending, scanned, success, qrcode) =
            (pending.clone(), scanned.clone(), success.clone(), Arc::clone(&qrcode));
        fast_qr_options()
            .on_qrcode(move |png| qrcode.lock().unwrap().extend_from_slice(png))
            .on_pending(move |_| pending.hit())
            .on_scanned(move |_| scanned.hit())
            .on_success(move |report| {
                assert_eq!(report.nickname.as_deref(), Some("Viki"));
                success.hit()
            })
    };

    let identity = AppIdentity::new("549000912", "5", "https://qzs.qzone.qq.com/qzone/v5/loginsucc.html");
    let cookies = qr_client(&server)
        .qr_login(&identity, options)
        .await
        .expect("登录应成功");

    assert_eq!(cookies, "uin=o0010001; skey=@abcDEF; p_uin=o0010001");

    // 边沿触发: 两次 66 只通知一次
    assert_eq!(pending.count(), 1);
    assert_eq!(scanned.count(), 1);
    assert_eq!(success.count(), 1);
    assert_eq!(qrcode.lock().unwrap().as_slice(), PNG_STUB);

    qrshow.assert_async().await;
    ptqrlogin.assert_async().await;
    check_sig.assert_async().await;
}

#[tokio::test]
async fn test_third_party_login_uses_continuation() {
    let mut server = mockito::Server::new_async().await;
    let jump_url = format!("{}/check_sig", server.url());

    let qrshow = server
        .mock("GET", "/ptqrshow")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("pt_3rd_aid".into(), "100497308".into()),
            Matcher::UrlEncoded("u1".into(), "https://graph.qq.com/oauth2.0/login_jump".into()),
        ]))
        .with_status(200)
        .with_header("set-cookie", &format!("qrsig={}; Path=/;", QRSIG))
        .with_body(PNG_STUB)
        .create_async()
        .await;

    server
        .mock("GET", "/ptqrlogin")
        .match_query(Matcher::UrlEncoded("pt_3rd_aid".into(), "100497308".into()))
        .with_status(200)
        .with_body(ptui("0", &jump_url, "登录成功！", "Viki"))
        .create_async()
        .await;

    server
        .mock("GET", "/check_sig")
        .match_query(Matcher::Any)
        .with_status(302)
        .with_header("location", "https://graph.qq.com/oauth2.0/show?which=Login&display=pc")
        .with_header("set-cookie", "p_skey=pskey-1; Path=/; Domain=graph.qq.com")
        .create_async()
        .await;

    let options = fast_qr_options().after_oauth2(|cookies, report| async move {
        assert_eq!(report.ret, "0");
        Ok::<_, LoginError>(format!("continued:{}", cookies.get("p_skey").unwrap_or_default()))
    });

    let identity = AppIdentity::new("716027609", "383", "https://example.com/oauth/callback")
        .with_third_party("100497308", "code", "1010_1030");
    let result = qr_client(&server).qr_login(&identity, options).await.unwrap();

    assert_eq!(result, "continued:pskey-1");
    qrshow.assert_async().await;
}

#[tokio::test]
async fn test_third_party_without_continuation_fails() {
    let mut server = mockito::Server::new_async().await;
    let jump_url = format!("{}/check_sig", server.url());

    mock_qrshow(&mut server).await;
    server
        .mock("GET", "/ptqrlogin")
        .match_query(Matcher::Any)
        .with_body(ptui("0", &jump_url, "登录成功！", ""))
        .create_async()
        .await;
    server
        .mock("GET", "/check_sig")
        .match_query(Matcher::Any)
        .with_status(302)
        .with_header("location", "https://graph.qq.com/oauth2.0/show?which=Login")
        .create_async()
        .await;

    let identity = AppIdentity::platform("music").unwrap();
    let err = qr_client(&server)
        .qr_login(&identity, fast_qr_options())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LoginError::OAuthContinuationMissing { ref location } if location.contains("oauth2.0")
    ));
}

#[tokio::test]
async fn test_unrecognized_status_stops_after_one_poll() {
    let mut server = mockito::Server::new_async().await;

    mock_qrshow(&mut server).await;
    let ptqrlogin = server
        .mock("GET", "/ptqrlogin")
        .match_query(Matcher::Any)
        .with_body(ptui("99", "", "系统繁忙", ""))
        .expect(1)
        .create_async()
        .await;

    let identity = AppIdentity::platform("qzone").unwrap();
    let err = qr_client(&server)
        .qr_login(&identity, fast_qr_options())
        .await
        .unwrap_err();

    assert!(matches!(err, LoginError::UnrecognizedStatus { ref code } if code == "99"));

    // 终态之后不再轮询
    tokio::time::sleep(Duration::from_millis(100)).await;
    ptqrlogin.assert_async().await;
}

#[tokio::test]
async fn test_expired_invokes_callback_and_returns_negative() {
    let mut server = mockito::Server::new_async().await;

    mock_qrshow(&mut server).await;
    server
        .mock("GET", "/ptqrlogin")
        .match_query(Matcher::Any)
        .with_body_from_request(sequenced(vec![
            ptui("66", "", "二维码未失效。", ""),
            ptui("65", "", "二维码已失效。", ""),
        ]))
        .create_async()
        .await;

    let expired = Calls::default();
    let timeout = Calls::default();
    let options = {
        let (expired, timeout) = (expired.clone(), timeout.clone());
        fast_qr_options()
            .on_expired(move |_| expired.hit())
            .on_timeout(move || timeout.hit())
    };

    let identity = AppIdentity::platform("vip").unwrap();
    let err = qr_client(&server).qr_login(&identity, options).await.unwrap_err();

    assert_eq!(err.negative_outcome(), Some(NegativeOutcome::Expired));
    assert_eq!(expired.count(), 1);
    assert_eq!(timeout.count(), 0);
}

#[tokio::test]
async fn test_missing_qrsig_is_not_fatal() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("GET", "/ptqrshow")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(PNG_STUB)
        .create_async()
        .await;

    // 空签名的 token 为 0
    let ptqrlogin = server
        .mock("GET", "/ptqrlogin")
        .match_query(Matcher::UrlEncoded("ptqrtoken".into(), "0".into()))
        .match_header("cookie", "qrsig=")
        .with_body(ptui("68", "", "本次登录已被拒绝", ""))
        .expect(1)
        .create_async()
        .await;

    let refused = Calls::default();
    let options = {
        let refused = refused.clone();
        fast_qr_options().on_refused(move |_| refused.hit())
    };

    let identity = AppIdentity::platform("music").unwrap();
    let err = qr_client(&server).qr_login(&identity, options).await.unwrap_err();

    assert_eq!(err.negative_outcome(), Some(NegativeOutcome::Refused));
    assert_eq!(refused.count(), 1);
    ptqrlogin.assert_async().await;
}

#[tokio::test]
async fn test_timeout_when_never_scanned() {
    let mut server = mockito::Server::new_async().await;

    mock_qrshow(&mut server).await;
    server
        .mock("GET", "/ptqrlogin")
        .match_query(Matcher::Any)
        .with_body(ptui("66", "", "二维码未失效。", ""))
        .create_async()
        .await;

    let pending = Calls::default();
    let timeout = Calls::default();
    let options = {
        let (pending, timeout) = (pending.clone(), timeout.clone());
        fast_qr_options()
            .with_wait_timeout(Duration::from_millis(200))
            .on_pending(move |_| pending.hit())
            .on_timeout(move || timeout.hit())
    };

    let identity = AppIdentity::platform("qzone").unwrap();
    let err = qr_client(&server).qr_login(&identity, options).await.unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(pending.count(), 1);
    assert_eq!(timeout.count(), 1);
}

#[tokio::test]
async fn test_issuance_failure_starts_no_polling() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("GET", "/ptqrshow")
        .match_query(Matcher::Any)
        .with_status(500)
        .create_async()
        .await;
    let ptqrlogin = server
        .mock("GET", "/ptqrlogin")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let identity = AppIdentity::platform("qzone").unwrap();
    let err = qr_client(&server)
        .qr_login(&identity, fast_qr_options())
        .await
        .unwrap_err();

    assert!(matches!(err, LoginError::Issuance(_)));
    ptqrlogin.assert_async().await;
}

#[tokio::test]
async fn test_poll_transport_error() {
    let mut server = mockito::Server::new_async().await;

    mock_qrshow(&mut server).await;
    server
        .mock("GET", "/ptqrlogin")
        .match_query(Matcher::Any)
        .with_status(502)
        .create_async()
        .await;

    let identity = AppIdentity::platform("qzone").unwrap();
    let err = qr_client(&server)
        .qr_login(&identity, fast_qr_options())
        .await
        .unwrap_err();

    assert!(matches!(err, LoginError::Transport(ref msg) if msg.contains("502")));
}

#[tokio::test]
async fn test_session_manager_cancels_running_login() {
    let mut server = mockito::Server::new_async().await;

    mock_qrshow(&mut server).await;
    server
        .mock("GET", "/ptqrlogin")
        .match_query(Matcher::Any)
        .with_body(ptui("66", "", "二维码未失效。", ""))
        .create_async()
        .await;

    let services = LoginServices::with_clients(qr_client(&server), MiniProgramClient::new().unwrap());
    let login_id = Uuid::new_v4();
    let identity = AppIdentity::platform("qzone").unwrap();

    let (result, cancelled) = tokio::join!(
        services.qr_login(login_id, &identity, fast_qr_options()),
        async {
            tokio::time::sleep(Duration::from_millis(150)).await;
            assert_eq!(services.session_manager.active_count().await, 1);
            services.session_manager.cancel(&login_id).await
        }
    );

    assert!(cancelled);
    assert!(matches!(result, Err(LoginError::Cancelled)));
    assert_eq!(services.session_manager.active_count().await, 0);
}
