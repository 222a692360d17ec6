//! Roster loading - tracked wallets, protocol directory, social identity
//!
//! The roster JSON is curated by hand from the discovery queries; the
//! contracts JSON maps vertical projects to their deployed addresses.
//! Both load once at startup. Addresses are lowercased on the way in so
//! every later membership check is case-insensitive.

use crate::constants::DEFAULT_PERSONA;
use crate::error::{AppError, AppResult};
use crate::models::TrackedWallet;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Load and validate the tracked wallet roster.
///
/// A missing file is fatal: the service has nothing to watch without it.
pub fn load_roster(path: &Path) -> AppResult<Vec<TrackedWallet>> {
    if !path.exists() {
        return Err(AppError::Validation(format!(
            "Wallets file not found: {}. Run the discovery queries first (discover_whales).",
            path.display()
        )));
    }

    let raw = std::fs::read_to_string(path)?;
    let mut wallets: Vec<TrackedWallet> = serde_json::from_str(&raw)
        .map_err(|e| AppError::Validation(format!("Invalid roster JSON: {}", e)))?;

    for wallet in &mut wallets {
        wallet.address = wallet.address.to_lowercase();
    }

    validate_roster(&wallets)?;

    tracing::info!(
        count = wallets.len(),
        path = %path.display(),
        "Roster loaded"
    );
    Ok(wallets)
}

/// Reject empty rosters, malformed addresses and duplicates.
pub fn validate_roster(wallets: &[TrackedWallet]) -> AppResult<()> {
    if wallets.is_empty() {
        return Err(AppError::Validation(
            "Roster contains no wallets".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for wallet in wallets {
        if !wallet.address.starts_with("0x") || wallet.address.len() != 42 {
            return Err(AppError::Validation(format!(
                "Invalid wallet address in roster: {}",
                wallet.address
            )));
        }
        if !seen.insert(wallet.address.as_str()) {
            return Err(AppError::Validation(format!(
                "Duplicate wallet address in roster: {}",
                wallet.address
            )));
        }
        if wallet.label.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "Wallet {} has an empty label",
                wallet.address
            )));
        }
    }
    Ok(())
}

/// Fold watchlist addresses into the roster as uncurated wallets.
///
/// Addresses already on the roster are left alone. Returns how many
/// wallets were added.
pub fn merge_watchlist(wallets: &mut Vec<TrackedWallet>, addresses: &[String]) -> usize {
    use crate::models::Vertical;

    let known: HashSet<String> = wallets.iter().map(|w| w.address.clone()).collect();
    let mut added = 0;
    for address in addresses {
        let address = address.to_lowercase();
        if known.contains(&address) {
            continue;
        }
        added += 1;
        wallets.push(TrackedWallet {
            address,
            vertical: Vertical::Watchlist,
            label: format!("Watchlist #{}", added),
            volume_30d_usd: None,
            name: None,
            persona: None,
            known_contracts: HashSet::new(),
            last_seen_tx_hash: None,
        });
    }
    if added > 0 {
        tracing::info!(added, "Watchlist wallets merged into roster");
    }
    added
}

// =============================================================================
// PROTOCOL DIRECTORY
// =============================================================================

#[derive(Debug, Deserialize)]
struct ContractsFile {
    verticals: HashMap<String, VerticalEntry>,
}

#[derive(Debug, Deserialize)]
struct VerticalEntry {
    projects: HashMap<String, ProjectEntry>,
}

#[derive(Debug, Deserialize)]
struct ProjectEntry {
    label: String,
    #[serde(default)]
    router: Option<String>,
    #[serde(default)]
    core: Option<String>,
    #[serde(default)]
    token_address: Option<String>,
    #[serde(default)]
    contracts: Option<HashMap<String, String>>,
}

/// Flattened contract address -> protocol label lookup
#[derive(Debug, Clone, Default)]
pub struct ProtocolDirectory {
    entries: HashMap<String, String>,
}

impl ProtocolDirectory {
    /// Build the directory from the contracts JSON.
    ///
    /// A missing file only degrades labeling, so it is a warn-and-empty
    /// rather than a startup failure.
    pub fn from_file(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Contracts file not found, protocol labels disabled"
            );
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let parsed: ContractsFile = serde_json::from_str(&raw)
            .map_err(|e| AppError::Validation(format!("Invalid contracts JSON: {}", e)))?;

        let mut entries = HashMap::new();
        for vertical in parsed.verticals.values() {
            for project in vertical.projects.values() {
                let mut insert = |addr: &Option<String>| {
                    if let Some(addr) = addr {
                        entries.insert(addr.to_lowercase(), project.label.clone());
                    }
                };
                insert(&project.router);
                insert(&project.core);
                insert(&project.token_address);
                if let Some(contracts) = &project.contracts {
                    for addr in contracts.values() {
                        entries.insert(addr.to_lowercase(), project.label.clone());
                    }
                }
            }
        }

        tracing::info!(
            contracts = entries.len(),
            path = %path.display(),
            "Protocol directory loaded"
        );
        Ok(Self { entries })
    }

    /// Protocol label for a contract address, case-insensitive.
    pub fn identify(&self, address: &str) -> Option<&str> {
        self.entries.get(&address.to_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// SOCIAL DIRECTORY
// =============================================================================

/// Social identity attached to emitted signals
#[derive(Debug, Clone)]
pub struct SocialProfile {
    pub name: Option<String>,
    pub persona: String,
}

/// Wallet address -> curated social identity
#[derive(Debug, Clone, Default)]
pub struct SocialDirectory {
    entries: HashMap<String, SocialProfile>,
}

impl SocialDirectory {
    /// Derive the directory from roster entries that carry name/persona.
    pub fn from_roster(wallets: &[TrackedWallet]) -> Self {
        let mut entries = HashMap::new();
        for wallet in wallets {
            if wallet.name.is_none() && wallet.persona.is_none() {
                continue;
            }
            entries.insert(
                wallet.address.to_lowercase(),
                SocialProfile {
                    name: wallet.name.clone(),
                    persona: wallet
                        .persona
                        .clone()
                        .unwrap_or_else(|| DEFAULT_PERSONA.to_string()),
                },
            );
        }
        Self { entries }
    }

    /// Identity for a wallet; unknown wallets get the generic persona.
    pub fn lookup(&self, address: &str) -> SocialProfile {
        self.entries
            .get(&address.to_lowercase())
            .cloned()
            .unwrap_or(SocialProfile {
                name: None,
                persona: DEFAULT_PERSONA.to_string(),
            })
    }
}
