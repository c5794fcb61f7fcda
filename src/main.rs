use donation_board::{
    Dashboard, RawTable,
    config::{dashboard as dashboard_config, database},
    errors::Result,
};
use dotenvy::dotenv;
use std::{path::Path, time::Duration};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load the dashboard configuration
    let config = dashboard_config::load_default_config()
        .inspect_err(|e| error!("Failed to load dashboard configuration: {}", e))?;
    info!(dashboard = %config.dashboard.id, "Loaded dashboard configuration");

    // 4. Open the change-state store
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to open state store: {}", e))?;
    database::create_tables(&db).await?;
    info!("State store ready");

    // 5. Run refresh cycles
    let sources = config.sources;
    let mut board = Dashboard::new(config.dashboard, db);

    if sources.refresh_interval_secs == 0 {
        run_cycle(&mut board, &sources.targets_path, &sources.donations_path).await;
        return Ok(());
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(sources.refresh_interval_secs));
    loop {
        ticker.tick().await;
        run_cycle(&mut board, &sources.targets_path, &sources.donations_path).await;
    }
}

/// Reads both tables and prints the resulting snapshot as one JSON line.
/// When a cycle fails the last good snapshot is printed again.
async fn run_cycle(board: &mut Dashboard, targets_path: &Path, donations_path: &Path) {
    let tables = read_table(targets_path).and_then(|t| Ok((t, read_table(donations_path)?)));

    let outcome = match tables {
        Ok((targets, donations)) => board.refresh(&targets, &donations).await,
        Err(e) => Err(e),
    };

    if let Err(e) = &outcome {
        warn!("Refresh failed, showing last good snapshot: {}", e);
    }

    let Some(snapshot) = board.last_snapshot() else {
        return;
    };
    match snapshot.to_json() {
        Ok(json) => println!("{json}"),
        Err(e) => error!("Failed to serialize snapshot: {}", e),
    }
}

fn read_table(path: &Path) -> Result<RawTable> {
    let contents = std::fs::read_to_string(path)?;
    RawTable::from_json(&contents)
}
