//! HTTP handlers for Sonar Watcher

mod api;
mod health;

pub use api::*;
pub use health::*;
