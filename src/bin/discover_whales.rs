//! Run the canned discovery SQL against the Allium Explorer and print
//! roster candidates as JSON, ready to curate into the tracked wallets
//! file. Usage: cargo run --bin discover_whales

use serde::Serialize;
use serde_json::Value;
use sonar_watcher::allium::templates::discovery_templates;
use sonar_watcher::allium::{AlliumClient, RequestQueue};
use sonar_watcher::config::AppConfig;
use sonar_watcher::models::Vertical;
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct RosterCandidate {
    address: String,
    vertical: Vertical,
    label: String,
    volume_30d_usd: Option<f64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays pure JSON
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();
    let config = AppConfig::load()?;

    if config.allium.api_key.is_empty() {
        eprintln!("ERROR: No Allium API key configured");
        std::process::exit(1);
    }
    if config.allium.query_id.is_empty() {
        eprintln!("ERROR: No Explorer query ID configured (needed for SQL runs)");
        std::process::exit(1);
    }

    let queue = RequestQueue::new(config.queue.clone());
    let client = Arc::new(AlliumClient::new(&config.allium, queue));

    let mut candidates = Vec::new();
    for template in discovery_templates() {
        eprintln!("=== {} discovery ===", template.vertical);
        eprintln!("{}", template.description);

        let rows = match client.run_query(template.sql).await {
            Ok(rows) => rows,
            Err(e) => {
                eprintln!("ERROR: {} discovery query failed: {}", template.vertical, e);
                std::process::exit(1);
            }
        };

        for (index, row) in rows.iter().enumerate() {
            let Some(address) = row.get("wallet_address").and_then(Value::as_str) else {
                continue;
            };
            let volume = row
                .get("total_volume_usd")
                .or_else(|| row.get("total_usd_accumulated"))
                .and_then(Value::as_f64);

            candidates.push(RosterCandidate {
                address: address.to_lowercase(),
                vertical: template.vertical,
                label: format!("{} Whale #{}", template.vertical, index + 1),
                volume_30d_usd: volume,
            });
        }
        eprintln!("Found {} candidates", rows.len());
    }

    println!("{}", serde_json::to_string_pretty(&candidates)?);
    eprintln!(
        "Done: {} candidates. Review and merge into the tracked wallets file.",
        candidates.len()
    );

    Ok(())
}
