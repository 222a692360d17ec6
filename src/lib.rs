//! Sonar Watcher Library
//!
//! Whale wallet signal detection for Base, backed by the Allium API.
//! This library exposes core modules for testing and the helper binaries.

pub mod allium;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod monitoring;
pub mod notifications;
pub mod roster;

// Re-export commonly used types for tests
pub use allium::{AlliumClient, Priority, QueueStats, RequestQueue};
pub use config::{AlliumConfig, AppConfig, PollerConfig, QueueConfig};
pub use db::DbPool;
pub use error::{AppError, AppResult};
pub use models::{Signal, SignalKind, TrackedWallet, Transaction, Vertical};
pub use monitoring::{PollerHandle, PollingEngine, SignalEvaluator};
pub use notifications::{CompositeNotifier, NotificationEvent};
pub use roster::{load_roster, ProtocolDirectory, SocialDirectory};
