/// ICU Sentinel - ICU patient-monitoring backend
///
/// Staff and admin accounts, a patient portal reached by one-time codes,
/// and patient reports whose files are kept in step with their records.

mod account;
mod ai;
mod api;
mod auth;
mod cache;
mod config;
mod context;
mod db;
mod error;
mod file_store;
mod mailer;
mod metrics;
mod otp;
mod patient;
mod rate_limit;
mod report;
mod server;
mod token;
mod vital;

use config::ServerConfig;
use context::AppContext;
use error::IcuResult;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> IcuResult<()> {
    // Configuration loads .env, which may carry RUST_LOG
    let config = ServerConfig::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.logging.level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();

    let ctx = AppContext::new(config).await?;

    server::serve(ctx).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
    ICU Sentinel v{}
    patient monitoring backend
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
