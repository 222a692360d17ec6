//! Telegram alert delivery.
//!
//! Pushes formatted alerts to a chat through the Bot API. Repeat alerts
//! for the same subject are suppressed inside a configurable window so a
//! contract going viral does not flood the channel.

use super::{AlertLevel, NotificationEvent, NotificationService};
use crate::config::TelegramConfig;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

const BOT_API: &str = "https://api.telegram.org";

/// Tracks when each alert subject last went out.
struct Throttle {
    window: Duration,
    sent_at: Mutex<HashMap<String, Instant>>,
}

impl Throttle {
    fn new(window_secs: u64) -> Self {
        Self {
            window: Duration::from_secs(window_secs),
            sent_at: Mutex::new(HashMap::new()),
        }
    }

    /// True when the subject is outside its suppression window.
    fn is_open(&self, subject: &str) -> bool {
        self.sent_at
            .lock()
            .get(subject)
            .map_or(true, |at| at.elapsed() >= self.window)
    }

    fn record(&self, subject: &str) {
        self.sent_at
            .lock()
            .insert(subject.to_string(), Instant::now());
    }
}

/// Suppression subject for an event. Signals collapse per contract so a
/// burst of whales piling into one deploy alerts once per window, while
/// lifecycle events each hold their own slot.
fn throttle_subject(event: &NotificationEvent) -> String {
    match event {
        NotificationEvent::SignalDetected { contract, .. } => format!("signal:{}", contract),
        NotificationEvent::WatcherStarted { .. } => "watcher_started".to_string(),
        NotificationEvent::WatcherStopped { .. } => "watcher_stopped".to_string(),
        NotificationEvent::ProviderDegraded { label, .. } => {
            format!("provider_degraded:{}", label)
        }
    }
}

/// Alert sink backed by the Telegram Bot API.
pub struct TelegramNotifier {
    http: reqwest::Client,
    bot_token: String,
    chat_id: String,
    dashboard_url: String,
    enabled: bool,
    throttle: Throttle,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
            dashboard_url: config.dashboard_url.clone(),
            enabled: config.enabled,
            throttle: Throttle::new(config.rate_limit_seconds),
        }
    }

    /// Build from config, None when disabled or the credentials are incomplete.
    pub fn from_config(config: &TelegramConfig) -> Option<Self> {
        if !config.enabled || config.bot_token.is_empty() || config.chat_id.is_empty() {
            return None;
        }
        Some(Self::new(config))
    }

    async fn push(&self, text: &str) -> anyhow::Result<()> {
        let url = format!("{}/bot{}/sendMessage", BOT_API, self.bot_token);
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("Telegram API returned {}: {}", status, detail);
        }
        Ok(())
    }

    /// Prefix with a severity banner and close with the dashboard link.
    fn render(&self, level: AlertLevel, body: &str) -> String {
        let banner = match level {
            AlertLevel::Critical => "🔴 <b>CRITICAL</b>",
            AlertLevel::Important => "🟡 <b>IMPORTANT</b>",
            AlertLevel::Info => "🔵 <b>INFO</b>",
        };

        let mut text = format!("{}\n\n{}", banner, body);
        if !self.dashboard_url.is_empty() {
            text.push_str("\n\n");
            text.push_str(&self.dashboard_url);
        }
        text
    }
}

#[async_trait::async_trait]
impl NotificationService for TelegramNotifier {
    async fn notify(&self, event: NotificationEvent) -> anyhow::Result<()> {
        if !self.enabled {
            return Ok(());
        }

        // Critical alerts always go out; everything else respects the window.
        let level = event.level();
        let subject = throttle_subject(&event);
        if level != AlertLevel::Critical && !self.throttle.is_open(&subject) {
            tracing::debug!(subject = %subject, "Alert suppressed inside throttle window");
            return Ok(());
        }

        let text = self.render(level, &event.format_message());
        self.push(&text).await?;
        self.throttle.record(&subject);

        tracing::info!(level = %level, subject = %subject, "Sent Telegram alert");
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled && !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }
}
