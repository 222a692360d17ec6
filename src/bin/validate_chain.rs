//! Verify that the target chain is supported on every Allium realtime
//! endpoint the watcher depends on. Run this before first deployment.
//! Usage: cargo run --bin validate_chain [--chain base] [--base-url URL]

use std::collections::HashMap;

const REQUIRED_ENDPOINTS: [&str; 8] = [
    "/api/v1/developer/wallet/balances",
    "/api/v1/developer/wallet/transactions",
    "/api/v1/developer/wallet/balances/history",
    "/api/v1/developer/prices",
    "/api/v1/developer/prices/history",
    "/api/v1/developer/prices/at-timestamp",
    "/api/v1/developer/tokens",
    "/api/v1/developer/tokens/search",
];

const OPTIONAL_ENDPOINTS: [&str; 1] = ["/api/v1/developer/wallet/pnl"];

fn parse_args() -> (String, String) {
    let args: Vec<String> = std::env::args().collect();
    let mut chain = "base".to_string();
    let mut base_url = "https://api.allium.so".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--chain" => {
                if i + 1 < args.len() {
                    chain = args[i + 1].clone();
                    i += 2;
                } else {
                    eprintln!("ERROR: --chain requires a value");
                    std::process::exit(1);
                }
            }
            "--base-url" => {
                if i + 1 < args.len() {
                    base_url = args[i + 1].clone();
                    i += 2;
                } else {
                    eprintln!("ERROR: --base-url requires a value");
                    std::process::exit(1);
                }
            }
            "--help" | "-h" => {
                println!("Usage: validate_chain [--chain NAME] [--base-url URL]");
                println!("  --chain NAME    Chain to validate (default: base)");
                println!("  --base-url URL  Allium API base URL (default: https://api.allium.so)");
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                std::process::exit(1);
            }
        }
    }

    (chain, base_url)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let (chain, base_url) = parse_args();

    println!("=== Allium Chain Support Check ===");
    println!("Chain: {}", chain);
    println!();

    // The support matrix is public, no API key needed
    let url = format!(
        "{}/api/v1/supported-chains/realtime-apis/simple",
        base_url.trim_end_matches('/')
    );
    let response = reqwest::get(&url).await?;
    if !response.status().is_success() {
        eprintln!(
            "ERROR: Failed to fetch supported chains: {}",
            response.status()
        );
        std::process::exit(1);
    }

    let support: HashMap<String, Vec<String>> = response.json().await?;
    let mut all_passed = true;

    println!("Required endpoints:");
    for endpoint in REQUIRED_ENDPOINTS {
        let supported = endpoint_supports(&support, endpoint, &chain);
        println!("  {} {}", if supported { "✓" } else { "✗" }, endpoint);
        if !supported {
            all_passed = false;
        }
    }

    println!();
    println!("Optional endpoints:");
    for endpoint in OPTIONAL_ENDPOINTS {
        let supported = endpoint_supports(&support, endpoint, &chain);
        if supported {
            println!("  ✓ {}", endpoint);
        } else {
            println!("  ! {} (not supported, derived metrics disabled)", endpoint);
        }
    }

    println!();
    if all_passed {
        println!("✓ All required endpoints support {}", chain);
        Ok(())
    } else {
        eprintln!("ERROR: Some required endpoints do NOT support {}", chain);
        std::process::exit(1);
    }
}

fn endpoint_supports(support: &HashMap<String, Vec<String>>, endpoint: &str, chain: &str) -> bool {
    support
        .get(endpoint)
        .map(|chains| chains.iter().any(|c| c == chain))
        .unwrap_or(false)
}
