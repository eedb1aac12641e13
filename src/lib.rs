pub mod announce;
pub mod bot;
pub mod collector;
pub mod commands;
pub mod engine;
pub mod gate;
pub mod gateway;
pub mod ledger;
pub mod roster;
pub mod session;
pub mod settings;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;

use bot::Bot;
use ledger::{FileLedger, PointStore};
use settings::Settings;

/// Opens the ledger and serves the gateway until the process is stopped.
pub async fn run(settings: Settings, token: String) -> Result<()> {
    let ledger = FileLedger::open(&settings.ledger_path)?;
    tracing::info!(
        "[Ledger] Loaded {} balances from {}",
        ledger.rank().len(),
        ledger.path().display()
    );

    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
    let bot = Bot::new(&settings, Arc::new(ledger), outbox_tx);
    gateway::run_gateway(&settings.gateway_url, &token, &bot, outbox_rx).await
}
