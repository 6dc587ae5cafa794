use std::process::ExitCode;
use std::sync::Arc;

use qr_login_bridge::models::{LoginError, MiniProgramLoginOptions, QrLoginOptions};
use qr_login_bridge::services::{BridgeConfig, ConfigService, LoginMode};
use qr_login_bridge::utils::logger;
use qr_login_bridge::{log_error, log_event, LoginServices};
use tracing::field::display;
use uuid::Uuid;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log_error!("LoginFailed", error = display(&e));
            eprintln!("登录失败: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigService::load()?;

    // guard 必须保存到退出
    let _guard = logger::init(&config.log_dir)?;

    let services = LoginServices::new()?;
    let login_id = Uuid::new_v4();

    // Ctrl-C 放弃正在进行的登录
    let manager = Arc::clone(&services.session_manager);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            manager.cancel_all().await;
        }
    });

    match config.mode {
        LoginMode::Web => run_web(&services, login_id, &config).await,
        LoginMode::Mini => run_mini(&services, login_id, &config).await,
    }
}

async fn run_web(
    services: &LoginServices,
    login_id: Uuid,
    config: &BridgeConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let identity = config.identity()?;
    let qrcode_path = config.qrcode_path.clone();

    let mut options = QrLoginOptions::default()
        .with_wait_timeout(config.wait_timeout)
        .with_check_interval(config.check_interval)
        .on_qrcode(move |png| {
            let preview_len = base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                png,
            )
            .len();
            match std::fs::write(&qrcode_path, png) {
                Ok(()) => {
                    log_event!(
                        "QrCodeWritten",
                        path = display(qrcode_path.display()),
                        base64_len = preview_len
                    );
                    eprintln!("请使用手机QQ扫描二维码: {}", qrcode_path.display());
                }
                Err(e) => log_error!("QrCodeWriteFailed", error = display(e)),
            }
        })
        .on_pending(|report| eprintln!("{}", report.msg))
        .on_scanned(|_| eprintln!("已扫码,请在手机上确认登录"))
        .on_expired(|_| eprintln!("二维码已过期"))
        .on_refused(|_| eprintln!("登录已被拒绝"))
        .on_timeout(|| eprintln!("等待扫码超时"))
        .on_reminder(|remaining| eprintln!("二维码将在 {} 秒后失效", remaining.as_secs()))
        // 第三方站点的 OAuth 续接因站点而异,这里只输出 ptlogin 下发的 cookies
        .after_oauth2(|cookies, _report| async move {
            log_event!("OAuthRedirect", cookies_count = cookies.len());
            Ok::<_, LoginError>(cookies.to_cookie_header())
        });

    if let Some(lead) = config.reminder_lead {
        options = options.with_reminder_lead(lead);
    }

    let cookies = services.qr_login(login_id, &identity, options).await?;

    log_event!("LoginSucceeded", platform = config.platform.as_str());
    println!("{}", cookies);

    Ok(())
}

async fn run_mini(
    services: &LoginServices,
    login_id: Uuid,
    config: &BridgeConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let appid = config
        .mini_appid
        .as_deref()
        .ok_or("QR_LOGIN_MINI_APPID is required for mini mode")?;

    let mut options = MiniProgramLoginOptions::default()
        .with_wait_timeout(config.wait_timeout)
        .with_check_interval(config.check_interval)
        .on_link(|url| eprintln!("请在手机QQ中打开: {}", url))
        .on_pending(|_| eprintln!("等待确认"))
        .on_refused(|_| eprintln!("登录码已被使用"))
        .on_timeout(|| eprintln!("等待确认超时"))
        .on_reminder(|remaining| eprintln!("登录码将在 {} 秒后失效", remaining.as_secs()));

    if let Some(lead) = config.reminder_lead {
        options = options.with_reminder_lead(lead);
    }

    let result = services
        .login_mini_program(login_id, appid, options)
        .await?;

    if result.code.is_empty() {
        return Err("票据换取授权码失败".into());
    }

    log_event!("LoginSucceeded", appid = appid);
    println!("{}", serde_json::to_string(&result)?);

    Ok(())
}
