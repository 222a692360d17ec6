//! Canned Explorer SQL for whale discovery and audience building
//!
//! Table names confirmed against the Allium schema:
//! - base.dex.trades (SENDER_ADDRESS, USD_AMOUNT, PROTOCOL, ...)
//! - base.assets.erc20_token_transfers (FROM_ADDRESS, TO_ADDRESS, USD_AMOUNT, ...)
//! - base.raw.transactions (FROM_ADDRESS, TO_ADDRESS, HASH, ...)

use crate::models::Vertical;

/// Top 3 wallets by DEX volume on Aerodrome and Uniswap V3 over 30 days,
/// dust trades under $10k excluded.
pub const DEFI_WHALE_SQL: &str = r#"
SELECT
    sender_address                         AS wallet_address,
    COUNT(DISTINCT transaction_hash)       AS tx_count,
    SUM(usd_amount)                        AS total_volume_usd,
    COUNT(DISTINCT liquidity_pool_address)  AS unique_pools,
    ARRAY_AGG(DISTINCT protocol)           AS protocols_used,
    MAX(block_timestamp)                   AS last_active
FROM base.dex.trades
WHERE block_timestamp >= CURRENT_TIMESTAMP - INTERVAL '30 DAY'
  AND usd_amount > 10000
  AND protocol IN ('aerodrome', 'uniswap_v3')
GROUP BY sender_address
HAVING SUM(usd_amount) > 500000
ORDER BY total_volume_usd DESC
LIMIT 3
"#;

/// Top 3 accumulators of AI-vertical tokens (VIRTUAL, OLAS) by 30-day
/// USD inflow.
pub const AI_WHALE_SQL: &str = r#"
WITH ai_token_inflows AS (
    SELECT
        to_address                          AS wallet_address,
        token_address,
        token_symbol,
        SUM(amount)                         AS total_received,
        SUM(usd_amount)                     AS total_received_usd,
        COUNT(*)                            AS transfer_count,
        MAX(block_timestamp)                AS last_inflow
    FROM base.assets.erc20_token_transfers
    WHERE block_timestamp >= CURRENT_TIMESTAMP - INTERVAL '30 DAY'
      AND LOWER(token_address) IN (
          '0x0b3e328455c4059eeb9e3f84b5543f74e24e7e1b',
          '0x54330d28ca3357f294334bdc454a032e7f353416'
      )
      AND usd_amount > 0
    GROUP BY to_address, token_address, token_symbol
)
SELECT
    wallet_address,
    ARRAY_AGG(DISTINCT token_symbol)   AS ai_tokens_held,
    SUM(total_received_usd)            AS total_usd_accumulated,
    SUM(transfer_count)                AS total_transfers,
    COUNT(DISTINCT token_address)      AS token_diversity,
    MAX(last_inflow)                   AS last_active
FROM ai_token_inflows
GROUP BY wallet_address
HAVING SUM(total_received_usd) > 100000
ORDER BY total_usd_accumulated DESC
LIMIT 3
"#;

/// Wallets that touched a target contract in the last 7 days, joined to
/// their 30-day ERC-20 volume. Top 50 by volume, floor $10k.
pub fn lookalike_audience_sql(target_contract: &str) -> String {
    // The address lands inside a string literal; strip quote characters
    // so a malformed input cannot escape it
    let target: String = target_contract
        .chars()
        .filter(|c| *c != '\'' && *c != '"')
        .collect();
    format!(
        r#"
WITH contract_interactors AS (
    SELECT DISTINCT from_address as wallet_address
    FROM base.raw.transactions
    WHERE LOWER(to_address) = LOWER('{target}')
      AND block_timestamp >= CURRENT_TIMESTAMP - INTERVAL '7 DAY'
),
wallet_volume AS (
    SELECT
        from_address as wallet_address,
        SUM(usd_amount) as total_volume_usd
    FROM base.assets.erc20_token_transfers
    WHERE block_timestamp >= CURRENT_TIMESTAMP - INTERVAL '30 DAY'
    GROUP BY from_address
)
SELECT
    ci.wallet_address,
    wv.total_volume_usd
FROM contract_interactors ci
JOIN wallet_volume wv ON ci.wallet_address = wv.wallet_address
WHERE wv.total_volume_usd > 10000
ORDER BY wv.total_volume_usd DESC
LIMIT 50
"#
    )
}

/// A discovery query with the vertical its candidates belong to
pub struct DiscoveryTemplate {
    pub vertical: Vertical,
    pub description: &'static str,
    pub sql: &'static str,
}

/// The curated discovery set, one template per scouted vertical.
pub fn discovery_templates() -> [DiscoveryTemplate; 2] {
    [
        DiscoveryTemplate {
            vertical: Vertical::DeFi,
            description: "Top 3 LP/trading whales on Aerodrome & Uniswap V3 (>$500k 30d volume)",
            sql: DEFI_WHALE_SQL,
        },
        DiscoveryTemplate {
            vertical: Vertical::Ai,
            description: "Top 3 AI token accumulators (VIRTUAL & OLAS, >$100k 30d inflow)",
            sql: AI_WHALE_SQL,
        },
    ]
}
