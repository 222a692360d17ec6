//! Allium data-provider subsystem
//!
//! One rate-limited queue fronts every outbound call; the client builds
//! typed requests on top of it; templates hold the canned Explorer SQL.

pub mod client;
pub mod queue;
pub mod templates;

pub use client::AlliumClient;
pub use queue::{Priority, QueueStats, RequestQueue};
