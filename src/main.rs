use grocery_sniper::config::{AppConfig, load_config};
use grocery_sniper::refresh::{RefreshService, RefreshWorker};
use grocery_sniper::scraper::{SourceAggregator, build_registry};
use grocery_sniper::storage::SqliteCatalog;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Set panic hook to log details about any panic
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("😱 Panic occurred: {:?}", panic_info);
    }));

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config: Arc<AppConfig> = match load_config(&config_path) {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            error!("Config load error ({}): {}", config_path, e);
            return;
        }
    };
    info!(
        "Loaded {} sources and {} shopping lists from {}",
        config.sources.len(),
        config.shopping_lists.len(),
        config_path
    );

    let catalog = match SqliteCatalog::new(&config.database_path) {
        Ok(c) => Arc::new(Mutex::new(c)),
        Err(e) => {
            error!("Failed to initialize storage: {:?}", e);
            return;
        }
    };

    let timeout = Duration::from_millis(config.source_timeout_ms);
    let registry = build_registry(&config.sources, timeout);
    let aggregator = SourceAggregator::new(&registry, None, timeout);
    for (name, status) in aggregator.get_status() {
        match status.error {
            None => info!("Source '{}' ready", name),
            Some(e) => warn!("Source '{}' unavailable: {}", name, e),
        }
    }

    let service = Arc::new(RefreshService::new(&config, Arc::new(aggregator), catalog));
    let worker = RefreshWorker::spawn(
        service,
        config.shopping_lists.clone(),
        Duration::from_secs(config.check_interval_seconds),
    );

    info!("🚀 GrocerySniper started! Press Ctrl+C to stop.");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down...");
    worker.stop().await;
}
