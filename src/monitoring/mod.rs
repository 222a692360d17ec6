//! Wallet monitoring - signal evaluation and the background polling engine
//!
//! The evaluator is pure state-machine logic; the poller wraps it with
//! scheduling, the Allium client and a signal channel to the consumer.

pub mod evaluator;
pub mod poller;

pub use evaluator::SignalEvaluator;
pub use poller::{EngineStatus, PollerHandle, PollingEngine};
