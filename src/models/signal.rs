//! Signal models - emitted first-interaction events

use super::Vertical;
use serde::{Deserialize, Serialize};

/// Signal kinds the evaluator can emit
///
/// Only first interactions exist today; the enum keeps the wire field
/// stable for consumers if more kinds appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalKind {
    #[serde(rename = "NEW_CONTRACT")]
    NewContract,
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::NewContract => write!(f, "NEW_CONTRACT"),
        }
    }
}

/// Supporting detail attached to every signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalContext {
    pub wallet_label: String,
    /// Protocol label when the target contract is in the directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_protocol: Option<String>,
    /// Symbols of tokens moved by the transaction, unfiltered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_involved: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method_name: Option<String>,
}

/// A first-interaction event for one tracked wallet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// Process-local sequential id, `sig-{n}`
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SignalKind,
    /// Tracked wallet address, as curated in the roster
    pub wallet: String,
    pub vertical: Vertical,
    pub transaction_hash: String,
    /// Target contract in the case the chain reported it
    pub target_contract: String,
    /// Block timestamp string, passed through from the transaction
    pub timestamp: String,
    /// 1-5, from the wallet's 30-day volume
    pub actionability_score: u8,
    /// True when no tracked wallet had touched the contract before
    pub is_first_mover: bool,
    /// Protocol label if identified, else the wallet's vertical
    pub vertical_tag: String,
    /// Other tracked wallets already using the contract
    pub common_neighbors: u32,
    /// Social display name for the wallet, when the roster has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Roster persona, falls back to a generic one
    pub persona: String,
    pub context: SignalContext,
}

impl Signal {
    /// Validate the signal shape before persistence or delivery
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("Signal id cannot be empty".to_string());
        }
        if !self.wallet.starts_with("0x") || self.wallet.len() != 42 {
            return Err("Invalid wallet address".to_string());
        }
        if self.transaction_hash.is_empty() {
            return Err("Transaction hash cannot be empty".to_string());
        }
        if self.target_contract.is_empty() {
            return Err("Target contract cannot be empty".to_string());
        }
        if !(1..=5).contains(&self.actionability_score) {
            return Err("Actionability score must be 1-5".to_string());
        }
        Ok(())
    }
}
