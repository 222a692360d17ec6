//! Signal evaluator - first-interaction detection core
//!
//! Pure in-memory: per-wallet seen-contract sets live on the wallets
//! themselves, the cross-wallet set and the signal log live here. No
//! I/O, so the whole detection path is unit-testable without a provider.

use crate::models::{Signal, SignalContext, SignalKind, TrackedWallet, Transaction};
use crate::roster::{ProtocolDirectory, SocialDirectory};
use std::collections::HashSet;

/// Evaluates transaction batches into NEW_CONTRACT signals
pub struct SignalEvaluator {
    protocols: ProtocolDirectory,
    social: SocialDirectory,
    /// Contracts any tracked wallet has touched, lowercased
    global_seen: HashSet<String>,
    signal_seq: u64,
    signal_log: Vec<Signal>,
}

impl SignalEvaluator {
    pub fn new(protocols: ProtocolDirectory, social: SocialDirectory) -> Self {
        Self {
            protocols,
            social,
            global_seen: HashSet::new(),
            signal_seq: 0,
            signal_log: Vec::new(),
        }
    }

    /// Evaluate a newest-first transaction batch for the wallet at
    /// `index`, emitting one signal per genuinely new contract.
    ///
    /// Stops at the wallet's cursor, then advances the cursor to the
    /// newest hash so the next poll starts where this one ended. The
    /// full roster is passed in for the common-neighbors count.
    pub fn evaluate(
        &mut self,
        wallets: &mut [TrackedWallet],
        index: usize,
        transactions: &[Transaction],
    ) -> Vec<Signal> {
        let mut signals = Vec::new();

        for tx in transactions {
            // Everything from the cursor down was already evaluated
            if let Some(cursor) = &wallets[index].last_seen_tx_hash {
                if tx.hash == *cursor {
                    break;
                }
            }
            // Contract creations have no destination
            let Some(to_address) = tx.destination() else {
                continue;
            };
            let to_lower = to_address.to_lowercase();

            if wallets[index].knows_contract(&to_lower) {
                continue;
            }

            // Counted over the rest of the roster, so inserting into
            // this wallet's set below cannot shift it
            let common_neighbors = wallets
                .iter()
                .enumerate()
                .filter(|(i, w)| *i != index && w.knows_contract(&to_lower))
                .count() as u32;

            let wallet = &mut wallets[index];
            wallet.known_contracts.insert(to_lower.clone());

            let is_first_mover = !self.global_seen.contains(&to_lower);
            self.global_seen.insert(to_lower);

            let social = self.social.lookup(&wallet.address);
            let protocol = self.protocols.identify(to_address).map(str::to_string);

            self.signal_seq += 1;
            let signal = Signal {
                id: format!("sig-{}", self.signal_seq),
                kind: SignalKind::NewContract,
                wallet: wallet.address.clone(),
                vertical: wallet.vertical,
                transaction_hash: tx.hash.clone(),
                target_contract: to_address.to_string(),
                timestamp: tx.block_timestamp.clone(),
                actionability_score: wallet.actionability_score(),
                is_first_mover,
                vertical_tag: protocol
                    .clone()
                    .unwrap_or_else(|| wallet.vertical.as_str().to_string()),
                common_neighbors,
                display_name: social.name,
                persona: social.persona,
                context: SignalContext {
                    wallet_label: wallet.label.clone(),
                    contract_protocol: protocol,
                    tokens_involved: tx
                        .token_transfers
                        .as_ref()
                        .map(|transfers| transfers.iter().map(|t| t.symbol.clone()).collect()),
                    method_name: tx.method_name.clone(),
                },
            };

            tracing::info!(
                id = %signal.id,
                wallet = %signal.context.wallet_label,
                contract = %signal.target_contract,
                protocol = signal.context.contract_protocol.as_deref().unwrap_or("unknown"),
                first_mover = signal.is_first_mover,
                score = signal.actionability_score,
                neighbors = signal.common_neighbors,
                "New contract interaction"
            );

            self.signal_log.push(signal.clone());
            signals.push(signal);
        }

        // Cursor moves to the newest hash even when the loop broke early
        if let Some(newest) = transactions.first() {
            wallets[index].last_seen_tx_hash = Some(newest.hash.clone());
        }

        signals
    }

    /// Seed the seen-contract sets from history without emitting.
    ///
    /// Counts every transaction with a destination, not unique
    /// contracts, so the return value mirrors how much history backed
    /// the warm-up.
    pub fn warm_up(&mut self, wallet: &mut TrackedWallet, transactions: &[Transaction]) -> usize {
        let mut count = 0;
        for tx in transactions {
            if let Some(to_address) = tx.destination() {
                let to_lower = to_address.to_lowercase();
                wallet.known_contracts.insert(to_lower.clone());
                self.global_seen.insert(to_lower);
                count += 1;
            }
        }
        if let Some(newest) = transactions.first() {
            wallet.last_seen_tx_hash = Some(newest.hash.clone());
        }
        count
    }

    /// Signals emitted since startup.
    pub fn signals_emitted(&self) -> u64 {
        self.signal_seq
    }

    /// Full in-memory log, oldest first.
    pub fn signal_log(&self) -> &[Signal] {
        &self.signal_log
    }

    /// Distinct contracts seen across the whole roster.
    pub fn global_seen_count(&self) -> usize {
        self.global_seen.len()
    }
}
