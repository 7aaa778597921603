//! Bot entry point: load the token, then hand over to the supervisor.

use std::process::ExitCode;

use tracing::error;
use tracing_subscriber::EnvFilter;

use ffr_bot::config::{BotConfig, Credential};

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    // Respects RUST_LOG, defaults to info.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cfg = BotConfig::default();
    let credential = match Credential::load(&cfg.token_path) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "cannot start without a token");
            return ExitCode::FAILURE;
        }
    };

    ffr_bot::run(cfg, credential).await;
    ExitCode::SUCCESS
}
