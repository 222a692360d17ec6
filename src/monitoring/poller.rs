//! Background polling engine
//!
//! Drives the whole detection loop: every cycle it pulls fresh
//! transactions for each tracked wallet through the rate-limited client,
//! feeds them to the evaluator and forwards emitted signals to the
//! consumer channel. One engine per process; it owns the roster state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::allium::AlliumClient;
use crate::config::PollerConfig;
use crate::models::{Signal, TrackedWallet, WalletSnapshot};

use super::SignalEvaluator;

/// Shared engine counters, readable from the HTTP handlers while the
/// engine task owns the mutable roster state.
#[derive(Debug, Default)]
pub struct PollerHandle {
    running: AtomicBool,
    poll_count: AtomicU64,
    signal_count: AtomicU64,
    wallets: RwLock<Vec<WalletSnapshot>>,
}

impl PollerHandle {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn poll_count(&self) -> u64 {
        self.poll_count.load(Ordering::Relaxed)
    }

    pub fn signal_count(&self) -> u64 {
        self.signal_count.load(Ordering::Relaxed)
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            running: self.is_running(),
            poll_count: self.poll_count(),
            signal_count: self.signal_count(),
            wallets: self.wallets.read().clone(),
        }
    }

    fn publish_wallets(&self, wallets: &[TrackedWallet]) {
        let snapshots: Vec<WalletSnapshot> = wallets.iter().map(WalletSnapshot::from).collect();
        *self.wallets.write() = snapshots;
    }
}

/// Point-in-time engine view for the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub running: bool,
    pub poll_count: u64,
    pub signal_count: u64,
    pub wallets: Vec<WalletSnapshot>,
}

/// Owns the roster and evaluator; runs as a single background task
pub struct PollingEngine {
    wallets: Vec<TrackedWallet>,
    evaluator: SignalEvaluator,
    client: Arc<AlliumClient>,
    signal_tx: mpsc::Sender<Signal>,
    handle: Arc<PollerHandle>,
    chain: String,
    interval: Duration,
    first_delay: Duration,
}

impl PollingEngine {
    pub fn new(
        wallets: Vec<TrackedWallet>,
        evaluator: SignalEvaluator,
        client: Arc<AlliumClient>,
        config: &PollerConfig,
        signal_tx: mpsc::Sender<Signal>,
    ) -> Self {
        let handle = Arc::new(PollerHandle::default());
        handle.publish_wallets(&wallets);
        Self {
            wallets,
            evaluator,
            client,
            signal_tx,
            handle,
            chain: config.chain.clone(),
            interval: Duration::from_secs(config.interval_secs),
            first_delay: Duration::from_secs(config.first_delay_secs),
        }
    }

    pub fn handle(&self) -> Arc<PollerHandle> {
        Arc::clone(&self.handle)
    }

    /// Seed the evaluator from each wallet's recent history so the first
    /// real cycle only reports genuinely new interactions.
    ///
    /// Per-wallet failures are logged and skipped; an unwarmed wallet
    /// just over-reports on its first cycle.
    pub async fn warm_up(&mut self) {
        tracing::info!(wallets = self.wallets.len(), "Warming up contract history");

        for index in 0..self.wallets.len() {
            let address = self.wallets[index].address.clone();
            let label = self.wallets[index].label.clone();

            match self.client.get_wallet_transactions(&self.chain, &address).await {
                Ok(transactions) => {
                    let seeded = self
                        .evaluator
                        .warm_up(&mut self.wallets[index], &transactions);
                    tracing::info!(
                        wallet = %label,
                        transactions = seeded,
                        known_contracts = self.wallets[index].known_contracts.len(),
                        "Wallet warmed up"
                    );
                }
                Err(e) => {
                    tracing::warn!(wallet = %label, error = %e, "Warm-up failed, skipping wallet");
                }
            }
        }

        self.handle.publish_wallets(&self.wallets);
        tracing::info!(
            global_contracts = self.evaluator.global_seen_count(),
            "Warm-up complete"
        );
    }

    /// Run the polling loop until cancelled. Consumes the engine; state
    /// stays observable through the handle.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(
            chain = %self.chain,
            interval_secs = self.interval.as_secs(),
            first_delay_secs = self.first_delay.as_secs(),
            wallets = self.wallets.len(),
            "Starting polling engine"
        );

        self.handle.running.store(true, Ordering::Relaxed);

        let start = tokio::time::Instant::now() + self.first_delay;
        let mut interval = tokio::time::interval_at(start, self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Polling engine shutting down");
                    break;
                }
                _ = interval.tick() => {
                    self.poll_cycle(&cancel).await;
                }
            }
        }

        self.handle.running.store(false, Ordering::Relaxed);
        tracing::info!(
            poll_cycles = self.handle.poll_count(),
            signals = self.handle.signal_count(),
            "Polling engine stopped"
        );
    }

    async fn poll_cycle(&mut self, cancel: &CancellationToken) {
        let cycle = self.handle.poll_count.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(cycle, wallets = self.wallets.len(), "Poll cycle started");

        for index in 0..self.wallets.len() {
            // A cancel mid-cycle stops before the next wallet; the
            // in-flight request is left to finish on its own
            if cancel.is_cancelled() {
                break;
            }

            let address = self.wallets[index].address.clone();
            let label = self.wallets[index].label.clone();

            let transactions = match self.client.get_wallet_transactions(&self.chain, &address).await {
                Ok(transactions) => transactions,
                Err(e) if e.is_rate_limit_related() => {
                    tracing::debug!(wallet = %label, error = %e, "Poll deferred by rate limiting");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(wallet = %label, error = %e, "Poll failed for wallet");
                    continue;
                }
            };

            if transactions.is_empty() {
                continue;
            }

            let signals = self.evaluator.evaluate(&mut self.wallets, index, &transactions);
            for signal in signals {
                self.handle.signal_count.fetch_add(1, Ordering::Relaxed);
                if self.signal_tx.send(signal).await.is_err() {
                    tracing::warn!("Signal consumer dropped, discarding signal");
                }
            }
        }

        self.handle.publish_wallets(&self.wallets);
        tracing::debug!(
            cycle,
            signals_total = self.handle.signal_count(),
            "Poll cycle finished"
        );
    }
}
