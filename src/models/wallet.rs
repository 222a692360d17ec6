//! Tracked wallet models - the whale roster

use crate::constants::scoring;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Market vertical a whale is curated under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vertical {
    #[serde(rename = "DeFi")]
    DeFi,
    #[serde(rename = "AI")]
    Ai,
    #[serde(rename = "SocialFi")]
    SocialFi,
    /// Uncurated wallets added at runtime through the watchlist API
    #[serde(rename = "Watchlist")]
    Watchlist,
}

impl Vertical {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vertical::DeFi => "DeFi",
            Vertical::Ai => "AI",
            Vertical::SocialFi => "SocialFi",
            Vertical::Watchlist => "Watchlist",
        }
    }
}

impl std::fmt::Display for Vertical {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A whale wallet under watch
///
/// Deserialized from the roster JSON; the seen-contract set and cursor
/// are runtime state and never come from the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedWallet {
    pub address: String,
    pub vertical: Vertical,
    pub label: String,
    /// 30-day USD volume from the discovery queries; drives scoring
    #[serde(default)]
    pub volume_30d_usd: Option<f64>,
    /// Social display name (ENS/basename style), when known
    #[serde(default)]
    pub name: Option<String>,
    /// One-line persona from roster curation
    #[serde(default)]
    pub persona: Option<String>,
    /// Lowercased contract addresses this wallet has been seen using
    #[serde(skip)]
    pub known_contracts: HashSet<String>,
    /// Hash of the newest transaction already evaluated
    #[serde(skip)]
    pub last_seen_tx_hash: Option<String>,
}

impl TrackedWallet {
    /// Score 1-5 from 30-day volume; thresholds are strict greater-than.
    pub fn actionability_score(&self) -> u8 {
        let volume = self.volume_30d_usd.unwrap_or(0.0);
        if volume > scoring::TIER_5_VOLUME {
            5
        } else if volume > scoring::TIER_4_VOLUME {
            4
        } else if volume > scoring::TIER_3_VOLUME {
            3
        } else if volume > scoring::TIER_2_VOLUME {
            2
        } else {
            1
        }
    }

    /// Membership test against the lowercased seen-contract set.
    pub fn knows_contract(&self, contract_lower: &str) -> bool {
        self.known_contracts.contains(contract_lower)
    }
}

/// Point-in-time wallet view for the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct WalletSnapshot {
    pub label: String,
    pub vertical: Vertical,
    pub address: String,
    pub known_contracts: usize,
}

impl From<&TrackedWallet> for WalletSnapshot {
    fn from(wallet: &TrackedWallet) -> Self {
        Self {
            label: wallet.label.clone(),
            vertical: wallet.vertical,
            address: wallet.address.clone(),
            known_contracts: wallet.known_contracts.len(),
        }
    }
}
