/// Allium API constants (shared across the client, queue and bins)
///
/// These values mirror the provider's published limits for the developer
/// plan. When Allium changes plan limits, update the queue defaults here
/// and the corresponding `[queue]` config defaults together.
pub mod allium {
    /// Base URL for all Allium REST endpoints
    pub const BASE_URL: &str = "https://api.allium.so";
    /// Minimum start-to-start spacing between dispatched requests (ms)
    pub const MIN_INTERVAL_MS: u64 = 1_100;
    /// Retries granted to a request that keeps hitting HTTP 429
    pub const MAX_RETRIES: u32 = 3;
    /// Backoff unit; attempt n sleeps `2^n * BACKOFF_BASE_MS`
    pub const BACKOFF_BASE_MS: u64 = 1_000;
    /// Seconds between Explorer query-run status polls
    pub const SQL_POLL_INTERVAL_SECS: u64 = 3;
    /// Status polls before a query run is declared timed out
    pub const SQL_MAX_POLL_ATTEMPTS: u32 = 30;
}

/// Polling engine cadence
pub mod polling {
    /// Chain identifier passed to every wallet endpoint
    pub const CHAIN: &str = "base";
    /// Seconds between poll cycles
    pub const TX_POLL_INTERVAL_SECS: u64 = 60;
    /// Delay before the first cycle after start
    pub const FIRST_POLL_DELAY_SECS: u64 = 5;
}

/// Actionability score thresholds (30-day USD volume, strict greater-than)
pub mod scoring {
    pub const TIER_5_VOLUME: f64 = 5_000_000_000.0;
    pub const TIER_4_VOLUME: f64 = 1_000_000_000.0;
    pub const TIER_3_VOLUME: f64 = 500_000_000.0;
    pub const TIER_2_VOLUME: f64 = 100_000_000.0;
}

/// Persona assigned to wallets with no social directory entry
pub const DEFAULT_PERSONA: &str = "Active Whale";
