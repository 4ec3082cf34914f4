use std::sync::Arc;

use axum::{ Router, routing::{ get, post } };
use custody_engine::{ AppError, Config, Result };
use custody_engine::scanner::DepositScanner;
use migration::MigratorTrait;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{ layer::SubscriberExt, util::SubscriberInitExt };

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber
        ::registry()
        .with(
            tracing_subscriber::EnvFilter
                ::try_from_default_env()
                .unwrap_or_else(|_| "custody_engine=debug,tower_http=debug".into())
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    tracing::info!(chains = ?config.scanned_chains(), "Starting custody engine");

    let db = sea_orm::Database::connect(&config.database_url).await.map_err(AppError::Database)?;

    tracing::info!("Database connected successfully");

    migration::Migrator::up(&db, None).await.map_err(AppError::Database)?;

    tracing::info!("Migrations completed successfully");

    let mut registry = custody_engine::registry::ChainRegistry::builtin();
    for scan_config in config.scan_configs.values() {
        if let Some(interval) = scan_config.poll_interval {
            registry.set_poll_interval(scan_config.chain, interval);
        }
    }
    let registry = Arc::new(registry);

    // Repositories
    let addresses = Arc::new(custody_engine::db::WalletAddressRepository::new(db.clone()));
    let deposits = Arc::new(custody_engine::db::DepositRepository::new(db.clone()));
    let withdrawals = Arc::new(custody_engine::db::WithdrawalRepository::new(db.clone()));
    let codes = Arc::new(custody_engine::db::CodeRepository::new(db.clone()));
    let watermarks = Arc::new(custody_engine::db::WatermarkRepository::new(db.clone()));

    // Services
    let prices = Arc::new(custody_engine::services::PriceService::new());
    let ledger_service = Arc::new(
        custody_engine::services::LedgerService::new(db.clone(), prices.clone())
    );

    let notifier: Arc<dyn custody_engine::services::Notifier> = Arc::new(
        custody_engine::services::TracingNotifier
    );
    let broadcaster: Arc<dyn custody_engine::services::Broadcaster> = Arc::new(
        custody_engine::services::HttpBroadcaster::new(&config.signer_url)
    );

    let deposit_service = Arc::new(
        custody_engine::services::DepositService::new(
            db.clone(),
            addresses.clone(),
            deposits.clone(),
            ledger_service.clone(),
            registry.clone(),
            notifier.clone()
        )
    );

    let withdrawal_service = Arc::new(
        custody_engine::services::WithdrawalService::new(
            db.clone(),
            withdrawals.clone(),
            codes.clone(),
            ledger_service.clone(),
            registry.clone(),
            notifier.clone(),
            broadcaster
        )
    );

    // One scanner per configured chain endpoint.
    let mut scanners: Vec<Arc<dyn DepositScanner>> = Vec::new();
    for scan_config in config.scan_configs.values() {
        let chain = scan_config.chain;

        if chain.is_evm() {
            let spec = registry.chain(chain)?.clone();
            let scanner = custody_engine::chains::evm::EvmScanner::new(
                &scan_config.endpoint,
                spec,
                config.scan_lookback_blocks,
                config.scan_max_block_range
            )?;
            scanners.push(Arc::new(scanner));
        } else if chain.is_utxo() {
            scanners.push(
                Arc::new(custody_engine::chains::bitcoin::BitcoinScanner::new(&scan_config.endpoint))
            );
        } else {
            tracing::warn!(chain = %chain, "No scanner implementation for this chain, endpoint ignored");
        }
    }

    // Background workers
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let scheduler = Arc::new(
        custody_engine::scheduler::Scheduler::new(
            addresses,
            watermarks,
            withdrawals.clone(),
            deposit_service,
            withdrawal_service.clone(),
            registry,
            scanners
        )
    );
    let worker_handles = scheduler.spawn(shutdown_rx);

    let app_state = custody_engine::api::AppState::new(
        ledger_service,
        withdrawal_service,
        deposits,
        withdrawals
    );

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/users/{id}/balances", get(custody_engine::api::balance::get_balances))
        .route("/api/users/{id}/deposits", get(custody_engine::api::deposit::list_deposits))
        .route("/api/users/{id}/withdrawals", get(custody_engine::api::withdrawal::list_withdrawals))
        .route("/api/withdrawals", post(custody_engine::api::withdrawal::request_withdrawal))
        .route("/api/withdrawals/{id}", get(custody_engine::api::withdrawal::get_withdrawal))
        .route("/api/withdrawals/{id}/verify", post(custody_engine::api::withdrawal::verify_withdrawal))
        .route("/api/withdrawals/{id}/cancel", post(custody_engine::api::withdrawal::cancel_withdrawal))
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server_host, config.server_port);
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener
        ::bind(&addr).await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    axum
        ::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        }).await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    // Stop the workers after the server has drained; in-flight ticks run
    // to completion.
    let _ = shutdown_tx.send(true);
    for handle in worker_handles {
        let _ = handle.await;
    }

    tracing::info!("Custody engine stopped");

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}
