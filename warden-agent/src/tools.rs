//! Tool capability surface consumed by agents.
//!
//! Every capability call returns a uniform [`ToolResult`]: a success flag,
//! an optional payload, an optional error string, and optional metadata.
//! Callers treat `success: false` as a recoverable value, never as an
//! exception; escalation to a hard error is an explicit caller choice via
//! [`ToolResult::into_result`].
//!
//! The concrete providers behind these capabilities (LLM APIs, calendars,
//! wallets, web research, external databases) live outside this crate;
//! [`StubToolkit`] stands in for them in tests and demos.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use warden_common::{Error, Result};

/// Uniform result shape for every capability call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult<T> {
    /// Whether the call succeeded.
    pub success: bool,
    /// Payload, present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error description, present on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Provider-specific extras.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl<T> ToolResult<T> {
    /// Successful result.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata: HashMap::new(),
        }
    }

    /// Failed result.
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            metadata: HashMap::new(),
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Whether the call succeeded and carries data.
    pub fn is_ok(&self) -> bool {
        self.success && self.data.is_some()
    }

    /// Escalate a failed call into a hard [`Error::Tool`], or unwrap the
    /// payload. `context` names the capability for the error message.
    pub fn into_result(self, context: &str) -> Result<T> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(Error::Tool(format!(
                "{context}: {}",
                self.error.unwrap_or_else(|| "no data returned".to_string())
            ))),
        }
    }
}

/// Options for text generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextOptions {
    /// Model override.
    pub model: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
}

/// A free block in a calendar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Calendar event booking request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Delivery channel for notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyChannel {
    Email,
    Slack,
    Telegram,
    Push,
}

/// Notification message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub body: String,
}

/// Token swap request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapRequest {
    pub from: String,
    pub to: String,
    pub amount: f64,
}

/// One web search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Thumbnail generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailSpec {
    pub text: String,
    pub style: String,
}

/// The set of external operations an agent may invoke to perform its work.
#[async_trait]
pub trait Toolkit: Send + Sync {
    /// Generate text from a prompt.
    async fn generate_text(&self, prompt: &str, options: TextOptions) -> ToolResult<String>;

    /// Generate structured data from a prompt and a JSON schema.
    async fn generate_json(
        &self,
        prompt: &str,
        schema: serde_json::Value,
    ) -> ToolResult<serde_json::Value>;

    /// Free calendar slots of at least `min_minutes` on the given day.
    async fn availability(&self, date: DateTime<Utc>, min_minutes: u32) -> ToolResult<Vec<TimeSlot>>;

    /// Book a calendar event; returns the event identifier.
    async fn book_event(&self, event: CalendarEvent) -> ToolResult<String>;

    /// Deliver a notification to a named channel.
    async fn notify(&self, channel: NotifyChannel, message: Notification) -> ToolResult<bool>;

    /// Wallet balance lookup.
    async fn wallet_balance(&self, address: &str) -> ToolResult<f64>;

    /// Execute a token swap; returns the transaction identifier.
    async fn execute_swap(&self, swap: SwapRequest) -> ToolResult<String>;

    /// Fetch a page's content.
    async fn scrape_web(&self, url: &str) -> ToolResult<String>;

    /// Search the web.
    async fn search_web(&self, query: &str) -> ToolResult<Vec<SearchHit>>;

    /// Generate a thumbnail; returns its location.
    async fn generate_thumbnail(&self, spec: ThumbnailSpec) -> ToolResult<String>;

    /// Draft a long-form description for a piece of content.
    async fn draft_description(&self, title: &str, content: &str) -> ToolResult<String>;

    /// Save a record to a named external database; returns the record id.
    async fn save_record(&self, database: &str, record: serde_json::Value) -> ToolResult<String>;

    /// Query a named external database.
    async fn query_records(
        &self,
        database: &str,
        filter: serde_json::Value,
    ) -> ToolResult<Vec<serde_json::Value>>;
}

/// Canned-response toolkit for demos and tests. Records can be seeded per
/// database name; everything else returns deterministic stub data.
#[derive(Default)]
pub struct StubToolkit {
    records: Mutex<HashMap<String, Vec<serde_json::Value>>>,
}

impl StubToolkit {
    /// Create an empty stub toolkit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the rows returned by [`Toolkit::query_records`] for a database.
    pub fn seed_records(&self, database: impl Into<String>, rows: Vec<serde_json::Value>) {
        self.records
            .lock()
            .expect("records lock poisoned")
            .insert(database.into(), rows);
    }
}

#[async_trait]
impl Toolkit for StubToolkit {
    async fn generate_text(&self, prompt: &str, _options: TextOptions) -> ToolResult<String> {
        let preview: String = prompt.chars().take(50).collect();
        ToolResult::ok(format!("[stub] Generated text for: {preview}..."))
    }

    async fn generate_json(
        &self,
        prompt: &str,
        _schema: serde_json::Value,
    ) -> ToolResult<serde_json::Value> {
        let preview: String = prompt.chars().take(50).collect();
        ToolResult::ok(serde_json::json!({ "stub": true, "prompt": preview }))
    }

    async fn availability(
        &self,
        date: DateTime<Utc>,
        min_minutes: u32,
    ) -> ToolResult<Vec<TimeSlot>> {
        let morning = date.date_naive().and_hms_opt(9, 0, 0).map(|t| t.and_utc());
        let afternoon = date.date_naive().and_hms_opt(14, 0, 0).map(|t| t.and_utc());
        let slots: Vec<TimeSlot> = [morning, afternoon]
            .into_iter()
            .flatten()
            .map(|start| TimeSlot {
                start,
                end: start + Duration::hours(2),
            })
            .collect();
        let total = slots.len().to_string();
        ToolResult::ok(slots)
            .with_metadata("min_minutes", min_minutes.to_string())
            .with_metadata("total_slots", total)
    }

    async fn book_event(&self, _event: CalendarEvent) -> ToolResult<String> {
        ToolResult::ok(format!("evt_{}", &uuid::Uuid::new_v4().to_string()[..8]))
    }

    async fn notify(&self, _channel: NotifyChannel, _message: Notification) -> ToolResult<bool> {
        ToolResult::ok(true)
    }

    async fn wallet_balance(&self, _address: &str) -> ToolResult<f64> {
        ToolResult::ok(42.0)
    }

    async fn execute_swap(&self, _swap: SwapRequest) -> ToolResult<String> {
        ToolResult::ok(format!("tx_{}", &uuid::Uuid::new_v4().to_string()[..8]))
    }

    async fn scrape_web(&self, url: &str) -> ToolResult<String> {
        ToolResult::ok(format!("[stub] contents of {url}"))
    }

    async fn search_web(&self, query: &str) -> ToolResult<Vec<SearchHit>> {
        ToolResult::ok(vec![SearchHit {
            title: format!("[stub] result for {query}"),
            url: "https://example.com".to_string(),
            snippet: "stub snippet".to_string(),
        }])
    }

    async fn generate_thumbnail(&self, _spec: ThumbnailSpec) -> ToolResult<String> {
        ToolResult::ok("https://example.com/thumbnail.png".to_string())
    }

    async fn draft_description(&self, title: &str, _content: &str) -> ToolResult<String> {
        ToolResult::ok(format!("[stub] description for {title}"))
    }

    async fn save_record(&self, database: &str, _record: serde_json::Value) -> ToolResult<String> {
        ToolResult::ok(format!("{database}/{}", &uuid::Uuid::new_v4().to_string()[..8]))
    }

    async fn query_records(
        &self,
        database: &str,
        _filter: serde_json::Value,
    ) -> ToolResult<Vec<serde_json::Value>> {
        let records = self.records.lock().expect("records lock poisoned");
        ToolResult::ok(records.get(database).cloned().unwrap_or_default())
    }
}
