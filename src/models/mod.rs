//! Domain models for Sonar Watcher

mod signal;
mod transaction;
mod wallet;

pub use signal::*;
pub use transaction::*;
pub use wallet::*;
