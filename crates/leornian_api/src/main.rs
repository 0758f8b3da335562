//! Server entry point.
//!
//! Settings come from `LEOR_*` environment variables; see
//! `leornian_core::config`.

use leornian_api::{create_router, AppState};
use leornian_core::captcha::HttpCaptchaTransport;
use leornian_core::db::open_db;
use leornian_core::mail::LogMailer;
use leornian_core::{init_logging, Settings};
use log::{error, info};
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=server_exit module=api status=error error={message}");
            eprintln!("leornian-server: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let settings = Settings::from_env().map_err(|err| err.to_string())?;
    init_logging(&settings.log_level, &settings.log_dir).map_err(|err| err.to_string())?;

    // Apply pending migrations before serving.
    drop(open_db(&settings.db_path).map_err(|err| err.to_string())?);

    // The blocking HTTP client must be built outside the async runtime.
    let captcha = Arc::new(HttpCaptchaTransport::new().map_err(|err| err.to_string())?);
    let bind_addr = settings.bind_addr;
    let state = Arc::new(AppState {
        settings,
        mailer: Arc::new(LogMailer),
        captcha: captcha.clone(),
    });

    let runtime = tokio::runtime::Runtime::new().map_err(|err| err.to_string())?;
    let served = runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(bind_addr)
            .await
            .map_err(|err| format!("cannot bind {bind_addr}: {err}"))?;
        info!("event=server_start module=api status=ok bind_addr={bind_addr}");
        axum::serve(listener, create_router(state))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|err| err.to_string())
    });
    drop(runtime);
    drop(captcha);
    served
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("event=server_shutdown module=api status=error error={err}");
    }
    info!("event=server_shutdown module=api status=ok");
}
