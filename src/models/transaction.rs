//! Wire models for Allium developer API responses

use serde::{Deserialize, Serialize};

/// A single wallet transaction as returned by the provider.
///
/// Batches arrive newest-first. `to_address` is absent (or empty) for
/// contract creations; `destination` normalizes both cases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: String,
    #[serde(default)]
    pub from_address: String,
    #[serde(default)]
    pub to_address: Option<String>,
    /// Native value as a decimal string (the provider uses strings to
    /// avoid precision loss on wei amounts)
    #[serde(default)]
    pub value: String,
    /// ISO-8601 block timestamp, passed through untouched
    #[serde(default)]
    pub block_timestamp: String,
    #[serde(default)]
    pub block_number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_transfers: Option<Vec<TokenTransfer>>,
}

impl Transaction {
    /// Destination address, treating an empty string like a missing one.
    pub fn destination(&self) -> Option<&str> {
        match self.to_address.as_deref() {
            Some("") | None => None,
            Some(addr) => Some(addr),
        }
    }
}

/// ERC-20 movement attached to a transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenTransfer {
    #[serde(default)]
    pub token_address: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub usd_amount: f64,
}

/// Wallet balance snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletBalance {
    #[serde(default)]
    pub chain: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub tokens: Vec<BalanceToken>,
}

/// One token row inside a balance snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceToken {
    #[serde(default)]
    pub token_address: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub usd_value: f64,
}

/// Spot price for a token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPrice {
    #[serde(default)]
    pub chain: String,
    #[serde(default)]
    pub token_address: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}
