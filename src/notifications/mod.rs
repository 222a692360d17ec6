//! Notification service for Sonar Watcher
//!
//! Provides push notifications via Telegram for watcher events:
//! - New contract interaction detected (first movers escalate)
//! - Watcher started / stopped
//! - Provider requests dropped after retry exhaustion

pub mod telegram;

pub use telegram::TelegramNotifier;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Alert level for notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    /// Critical alerts (first-mover signals), bypass rate limiting
    Critical,
    /// Important alerts (regular signals, provider degradation)
    Important,
    /// Informational alerts (lifecycle events)
    Info,
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            AlertLevel::Critical => "CRITICAL",
            AlertLevel::Important => "IMPORTANT",
            AlertLevel::Info => "INFO",
        })
    }
}

/// Notification event types
#[derive(Debug, Clone)]
pub enum NotificationEvent {
    /// A tracked whale touched a contract for the first time
    SignalDetected {
        whale: String,
        persona: String,
        contract: String,
        score: u8,
        first_mover: bool,
        neighbors: u32,
    },
    /// Watcher came up and started polling
    WatcherStarted { wallets: usize, chain: String },
    /// Watcher shut down
    WatcherStopped { poll_cycles: u64, signals: u64 },
    /// A provider request was dropped after exhausting retries
    ProviderDegraded { label: String, retries: u32 },
}

impl NotificationEvent {
    /// Get the alert level for this event
    pub fn level(&self) -> AlertLevel {
        match self {
            NotificationEvent::SignalDetected { first_mover, .. } => {
                if *first_mover {
                    AlertLevel::Critical
                } else {
                    AlertLevel::Important
                }
            }
            NotificationEvent::ProviderDegraded { .. } => AlertLevel::Important,
            NotificationEvent::WatcherStarted { .. } => AlertLevel::Info,
            NotificationEvent::WatcherStopped { .. } => AlertLevel::Info,
        }
    }

    /// Format the event as a notification message
    pub fn format_message(&self) -> String {
        match self {
            NotificationEvent::SignalDetected {
                whale,
                persona,
                contract,
                score,
                first_mover,
                neighbors,
            } => {
                let flames = "🔥".repeat(*score as usize);
                let mover = if *first_mover { " ⚡ FIRST MOVER" } else { "" };
                let social = if *neighbors > 0 {
                    format!(" | {} tracked wallets already there", neighbors)
                } else {
                    String::new()
                };
                format!(
                    "🎯 {} ({}) → {}{}\n{}{}",
                    whale, persona, contract, mover, flames, social
                )
            }
            NotificationEvent::WatcherStarted { wallets, chain } => {
                format!("👁 Watching {} wallets on {}", wallets, chain)
            }
            NotificationEvent::WatcherStopped { poll_cycles, signals } => {
                format!(
                    "🛑 Watcher stopped after {} cycles | {} signals",
                    poll_cycles, signals
                )
            }
            NotificationEvent::ProviderDegraded { label, retries } => {
                format!("⚠️ Allium request '{}' dropped after {} retries", label, retries)
            }
        }
    }
}

/// Notification service trait
#[async_trait::async_trait]
pub trait NotificationService: Send + Sync {
    /// Send a notification
    async fn notify(&self, event: NotificationEvent) -> anyhow::Result<()>;

    /// Check if the service is enabled
    fn is_enabled(&self) -> bool;
}

/// Composite notifier that can send to multiple services
pub struct CompositeNotifier {
    services: Vec<Arc<dyn NotificationService>>,
}

impl CompositeNotifier {
    /// Create a new composite notifier
    pub fn new() -> Self {
        Self {
            services: Vec::new(),
        }
    }

    /// Add a notification service
    pub fn add_service(&mut self, service: Arc<dyn NotificationService>) {
        self.services.push(service);
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    /// Send notification to all enabled services. Returns the number of
    /// deliveries that failed.
    pub async fn notify(&self, event: NotificationEvent) -> usize {
        let mut failures = 0;
        for service in self.services.iter().filter(|s| s.is_enabled()) {
            if let Err(err) = service.notify(event.clone()).await {
                failures += 1;
                tracing::error!(error = %err, level = %event.level(), "Alert delivery failed");
            }
        }
        failures
    }
}

impl Default for CompositeNotifier {
    fn default() -> Self {
        Self::new()
    }
}
