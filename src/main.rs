use std::path::PathBuf;

use anyhow::Context;
use rumble_lib::settings::Settings;
use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUMBLE_LOG_JSON switches to one JSON object per line for log shippers.
    if std::env::var_os("RUMBLE_LOG_JSON").is_some() {
        tracing_subscriber::fmt().json().with_env_filter(env_filter()).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter()).init();
    }

    let settings_path = std::env::var("RUMBLE_SETTINGS")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("rumble.json"));
    let settings = Settings::load_or_default(&settings_path)?;
    let token = std::env::var("BOT_TOKEN").context("BOT_TOKEN is not set")?;

    tracing::info!("rumble v{} starting", env!("CARGO_PKG_VERSION"));
    rumble_lib::run(settings, token).await
}
