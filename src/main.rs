//! Simple Ledger service bootstrap
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────┐    ┌──────────┐
//! │  Config  │───▶│ Logging  │───▶│ PgPool   │───▶│  Schema  │
//! │  (YAML)  │    │(tracing) │    │  (sqlx)  │    │ + health │
//! └──────────┘    └──────────┘    └──────────┘    └──────────┘
//! ```
//!
//! The request-serving layer lives outside this crate; it builds a
//! `TransferEngine` over the `PgLedger` handle created here.

use anyhow::Context;

use simple_ledger::config::AppConfig;
use simple_ledger::db::{Database, schema};
use simple_ledger::transfer::TransferEngine;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let app_config = AppConfig::load(&env)?;
    let _log_guard = simple_ledger::logging::init_logging(&app_config);

    tracing::info!(env = %env, "Starting simple ledger");

    let url = app_config
        .postgres_url
        .as_deref()
        .context("postgres_url is not configured (set it in the config file or DATABASE_URL)")?;

    let db = Database::connect(url, &app_config.database)
        .await
        .context("Failed to connect to PostgreSQL")?;
    schema::init_schema(db.pool())
        .await
        .context("Failed to initialize schema")?;
    db.health_check().await.context("Health check failed")?;

    let engine = TransferEngine::from_config(db.ledger(), &app_config.transfer);
    tracing::info!(
        timeout_ms = engine.timeout().as_millis() as u64,
        "Ledger ready"
    );

    Ok(())
}
