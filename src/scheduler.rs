use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::db::{ WalletAddressRepository, WatermarkRepository, WithdrawalRepository };
use crate::enums::{ Chain, WithdrawalStatus };
use crate::registry::ChainRegistry;
use crate::scanner::DepositScanner;
use crate::services::{ DepositService, WithdrawalService };

const WITHDRAWAL_TICK: Duration = Duration::from_secs(15);

/// Background workers: one scan loop per configured chain, plus a shared
/// withdrawal loop that broadcasts verified withdrawals and tracks their
/// confirmations. All loops stop on the shutdown signal, finishing any
/// tick already in progress.
pub struct Scheduler {
    addresses: Arc<WalletAddressRepository>,
    watermarks: Arc<WatermarkRepository>,
    withdrawals: Arc<WithdrawalRepository>,
    deposit_service: Arc<DepositService>,
    withdrawal_service: Arc<WithdrawalService>,
    registry: Arc<ChainRegistry>,
    scanners: HashMap<Chain, Arc<dyn DepositScanner>>,
}

impl Scheduler {
    pub fn new(
        addresses: Arc<WalletAddressRepository>,
        watermarks: Arc<WatermarkRepository>,
        withdrawals: Arc<WithdrawalRepository>,
        deposit_service: Arc<DepositService>,
        withdrawal_service: Arc<WithdrawalService>,
        registry: Arc<ChainRegistry>,
        scanners: Vec<Arc<dyn DepositScanner>>
    ) -> Self {
        Self {
            addresses,
            watermarks,
            withdrawals,
            deposit_service,
            withdrawal_service,
            registry,
            scanners: scanners
                .into_iter()
                .map(|s| (s.chain(), s))
                .collect(),
        }
    }

    /// Spawn every worker. The returned handles complete once `shutdown`
    /// flips to true.
    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        for (&chain, scanner) in &self.scanners {
            let interval = self.registry
                .chain(chain)
                .map(|spec| spec.poll_interval)
                .unwrap_or(Duration::from_secs(30));

            handles.push(
                tokio::spawn(
                    Self::scan_loop(
                        Arc::clone(&self),
                        Arc::clone(scanner),
                        interval,
                        shutdown.clone()
                    )
                )
            );
        }

        handles.push(tokio::spawn(Self::withdrawal_loop(Arc::clone(&self), shutdown)));

        handles
    }

    async fn scan_loop(
        self: Arc<Self>,
        scanner: Arc<dyn DepositScanner>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>
    ) {
        let chain = scanner.chain();
        tracing::info!(chain = %chain, interval = ?interval, "Deposit scan worker started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.scan_tick(scanner.as_ref()).await {
                        tracing::warn!(chain = %chain, error = %e, "Scan tick failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!(chain = %chain, "Deposit scan worker stopping");
                        return;
                    }
                }
            }
        }
    }

    /// One poll cycle for one chain. The watermark only advances after
    /// every candidate from this cycle has been ingested; a crash between
    /// the two re-observes the same events, which deduplication absorbs.
    async fn scan_tick(&self, scanner: &dyn DepositScanner) -> crate::error::Result<()> {
        let chain = scanner.chain();

        let addresses = self.addresses.addresses_for_chain(chain.as_str()).await?;
        if addresses.is_empty() {
            return Ok(());
        }

        let from_height = self.watermarks.get(chain).await?;
        let outcome = scanner.scan(&addresses, from_height).await?;

        let mut ingest_failures = 0usize;
        for candidate in &outcome.candidates {
            if let Err(e) = self.deposit_service.ingest(candidate).await {
                ingest_failures += 1;
                tracing::error!(
                    chain = %chain,
                    tx_hash = %candidate.tx_hash,
                    event_index = candidate.event_index,
                    error = %e,
                    "Failed to ingest deposit candidate"
                );
            }
        }

        if ingest_failures == 0 {
            if let Some(height) = outcome.scanned_to {
                self.watermarks.advance(chain, height).await?;
            }
        } else {
            tracing::warn!(
                chain = %chain,
                failures = ingest_failures,
                "Watermark held back, candidates will be rescanned"
            );
        }

        // Deposits past the watermark still gather confirmations as the
        // tip moves.
        match scanner.tip_height().await {
            Ok(tip) => {
                self.deposit_service.refresh_chain(chain, tip).await?;
            }
            Err(e) => {
                tracing::warn!(chain = %chain, error = %e, "Tip height unavailable, confirmations not refreshed");
            }
        }

        Ok(())
    }

    async fn withdrawal_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(interval = ?WITHDRAWAL_TICK, "Withdrawal worker started");

        let mut ticker = tokio::time::interval(WITHDRAWAL_TICK);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.withdrawal_tick().await {
                        tracing::warn!(error = %e, "Withdrawal tick failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("Withdrawal worker stopping");
                        return;
                    }
                }
            }
        }
    }

    /// Broadcast everything verified, then poll confirmations for every
    /// withdrawal already on-chain.
    async fn withdrawal_tick(&self) -> crate::error::Result<()> {
        self.withdrawal_service.process_verified().await?;

        let awaiting = self.withdrawals.find_by_status(
            WithdrawalStatus::AwaitingConfirmation
        ).await?;

        for record in awaiting {
            let chain = match Chain::from_str(&record.chain) {
                Ok(chain) => chain,
                Err(e) => {
                    tracing::error!(withdrawal = %record.id, error = %e, "Unknown chain on withdrawal");
                    continue;
                }
            };

            let Some(scanner) = self.scanners.get(&chain) else {
                // No data source configured for this chain on this
                // instance; another instance owns it.
                continue;
            };

            let Some(tx_hash) = record.tx_hash.as_deref() else {
                tracing::error!(withdrawal = %record.id, "Awaiting confirmation without a tx hash");
                continue;
            };

            match scanner.tx_confirmations(tx_hash).await {
                Ok(Some(confirmations)) => {
                    if
                        let Err(e) = self.withdrawal_service.record_confirmations(
                            record.id,
                            confirmations
                        ).await
                    {
                        tracing::warn!(
                            withdrawal = %record.id,
                            error = %e,
                            "Failed to record confirmations"
                        );
                    }
                }
                Ok(None) => {
                    // Still in the mempool; check again next tick.
                }
                Err(e) => {
                    tracing::warn!(
                        withdrawal = %record.id,
                        tx_hash = %tx_hash,
                        error = %e,
                        "Confirmation lookup failed"
                    );
                }
            }
        }

        Ok(())
    }
}
