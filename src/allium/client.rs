//! Typed client for the Allium developer API
//!
//! Pure I/O adapter: builds requests, funnels them through the shared
//! queue with an endpoint-specific priority, and unwraps the provider's
//! response envelopes. Holds no caches and no detection state.

use crate::allium::queue::{Priority, QueueStats, RequestQueue};
use crate::config::AlliumConfig;
use crate::error::{AppError, AppResult};
use crate::models::{TokenPrice, Transaction, WalletBalance};
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

/// Allium API client
pub struct AlliumClient {
    api_key: String,
    query_id: String,
    client: Client,
    base_url: String,
    queue: Arc<RequestQueue>,
    sql_poll_interval: Duration,
    sql_max_poll_attempts: u32,
}

impl AlliumClient {
    pub fn new(config: &AlliumConfig, queue: Arc<RequestQueue>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            api_key: config.api_key.clone(),
            query_id: config.query_id.clone(),
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            queue,
            sql_poll_interval: Duration::from_millis(config.sql_poll_interval_ms),
            sql_max_poll_attempts: config.sql_max_poll_attempts,
        }
    }

    /// Queue counters, surfaced on the status endpoint.
    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// Recent transactions for a wallet, newest first.
    pub async fn get_wallet_transactions(
        &self,
        chain: &str,
        address: &str,
    ) -> AppResult<Vec<Transaction>> {
        let label = format!("tx:{}", address_prefix(address));
        let body = json!([{ "chain": chain, "address": address }]);
        let value = self
            .queue_post(
                Priority::Medium,
                label,
                "/api/v1/developer/wallet/transactions",
                body,
            )
            .await?;
        Ok(parse_rows(value, "transaction"))
    }

    /// Current balance snapshot for a wallet.
    pub async fn get_wallet_balances(
        &self,
        chain: &str,
        address: &str,
    ) -> AppResult<Vec<WalletBalance>> {
        let label = format!("bal:{}", address_prefix(address));
        let body = json!([{ "chain": chain, "address": address }]);
        let value = self
            .queue_post(
                Priority::Low,
                label,
                "/api/v1/developer/wallet/balances",
                body,
            )
            .await?;
        Ok(parse_rows(value, "balance"))
    }

    /// Spot prices for a batch of tokens.
    pub async fn get_token_prices(
        &self,
        chain: &str,
        token_addresses: &[String],
    ) -> AppResult<Vec<TokenPrice>> {
        let label = format!("price:{}", token_addresses.len());
        let body = Value::Array(
            token_addresses
                .iter()
                .map(|addr| json!({ "chain": chain, "token_address": addr }))
                .collect(),
        );
        let value = self
            .queue_post(Priority::High, label, "/api/v1/developer/prices", body)
            .await?;
        Ok(parse_rows(value, "price"))
    }

    /// Historical price for one token at a point in time.
    ///
    /// Unlike the batch endpoints this one takes a single object body.
    pub async fn get_price_at(
        &self,
        chain: &str,
        token_address: &str,
        timestamp: &str,
    ) -> AppResult<Option<TokenPrice>> {
        let label = format!("price-at:{}", address_prefix(token_address));
        let body = json!({
            "chain": chain,
            "token_address": token_address,
            "timestamp": timestamp,
        });
        let value = self
            .queue_post(
                Priority::High,
                label,
                "/api/v1/developer/prices/at-timestamp",
                body,
            )
            .await?;
        Ok(parse_rows(value, "price").into_iter().next())
    }

    /// Run ad-hoc SQL through the saved Explorer query slot.
    ///
    /// Three-leg flow: start the run, poll its status until terminal,
    /// fetch results. All legs are CRITICAL so discovery cannot starve
    /// behind routine polling.
    pub async fn run_query(&self, sql: &str) -> AppResult<Vec<Value>> {
        if self.query_id.is_empty() {
            return Err(AppError::Validation(
                "Allium query_id is not configured".to_string(),
            ));
        }

        let start_path = format!("/api/v1/explorer/queries/{}/run-async", self.query_id);
        let body = json!({ "parameters": { "sql_query": sql } });
        let started = self
            .queue_post(Priority::Critical, "sql:start".to_string(), &start_path, body)
            .await?;
        let run_id = started
            .get("run_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::Internal("run-async response missing run_id".to_string())
            })?;

        tracing::debug!(run_id = %run_id, "Explorer query run started");

        // The provider needs a beat before the first status check
        let mut attempts: u32 = 0;
        let status = loop {
            sleep(self.sql_poll_interval).await;
            let status_path = format!("/api/v1/explorer/query-runs/{}/status", run_id);
            let raw = self
                .queue_get_text(
                    Priority::Critical,
                    format!("sql:poll:{}", attempts),
                    &status_path,
                )
                .await?;
            // Status body is a bare quoted string
            let status = raw.as_str().unwrap_or_default().replace('"', "");
            attempts += 1;
            if attempts % 3 == 0 {
                tracing::info!(
                    run_id = %run_id,
                    status = %status,
                    elapsed_secs = self.elapsed_secs(attempts),
                    "Query still running"
                );
            }
            let running = matches!(status.as_str(), "created" | "queued" | "running");
            if !running || attempts >= self.sql_max_poll_attempts {
                break status;
            }
        };

        if status != "success" {
            return Err(AppError::QueryRun {
                run_id,
                status,
                elapsed_secs: self.elapsed_secs(attempts),
            });
        }

        let results_path = format!("/api/v1/explorer/query-runs/{}/results?f=json", run_id);
        let value = self
            .queue_get_json(Priority::Critical, "sql:results".to_string(), &results_path)
            .await?;
        Ok(unwrap_data(value))
    }

    fn elapsed_secs(&self, attempts: u32) -> u64 {
        attempts as u64 * self.sql_poll_interval.as_millis() as u64 / 1_000
    }

    async fn queue_post(
        &self,
        priority: Priority,
        label: String,
        path: &str,
        body: Value,
    ) -> AppResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        self.queue
            .submit(priority, label, move || {
                post_json(client.clone(), url.clone(), api_key.clone(), body.clone())
            })
            .await
    }

    async fn queue_get_json(
        &self,
        priority: Priority,
        label: String,
        path: &str,
    ) -> AppResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        self.queue
            .submit(priority, label, move || {
                get_json(client.clone(), url.clone(), api_key.clone())
            })
            .await
    }

    async fn queue_get_text(
        &self,
        priority: Priority,
        label: String,
        path: &str,
    ) -> AppResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        self.queue
            .submit(priority, label, move || {
                get_text(client.clone(), url.clone(), api_key.clone())
            })
            .await
    }
}

async fn post_json(client: Client, url: String, api_key: String, body: Value) -> AppResult<Value> {
    let response = client
        .post(&url)
        .header("X-API-KEY", &api_key)
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;
    read_json(response).await
}

async fn get_json(client: Client, url: String, api_key: String) -> AppResult<Value> {
    let response = client.get(&url).header("X-API-KEY", &api_key).send().await?;
    read_json(response).await
}

/// GET returning the raw body wrapped as a JSON string; used for the
/// status endpoint whose body is not guaranteed to parse as JSON.
async fn get_text(client: Client, url: String, api_key: String) -> AppResult<Value> {
    let response = client.get(&url).header("X-API-KEY", &api_key).send().await?;
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(AppError::Provider {
            status: status.as_u16(),
            body,
        });
    }
    Ok(Value::String(body))
}

async fn read_json(response: reqwest::Response) -> AppResult<Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::Provider {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json::<Value>().await?)
}

/// Unwrap `{items: [...]}` envelopes; bare arrays pass through,
/// anything else is empty.
fn unwrap_items(value: Value) -> Vec<Value> {
    match value {
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        Value::Array(items) => items,
        _ => Vec::new(),
    }
}

/// Unwrap `{data, sql, meta}` result envelopes the same way.
fn unwrap_data(value: Value) -> Vec<Value> {
    match value {
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(rows)) => rows,
            _ => Vec::new(),
        },
        Value::Array(rows) => rows,
        _ => Vec::new(),
    }
}

fn parse_rows<T: serde::de::DeserializeOwned>(value: Value, what: &'static str) -> Vec<T> {
    unwrap_items(value)
        .into_iter()
        .filter_map(|row| match serde_json::from_value::<T>(row) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                tracing::warn!(kind = what, error = %err, "Skipping malformed provider row");
                None
            }
        })
        .collect()
}

fn address_prefix(address: &str) -> &str {
    address.get(..8).unwrap_or(address)
}
