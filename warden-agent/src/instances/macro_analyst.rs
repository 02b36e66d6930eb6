//! Macro Analyst reference agent.
//!
//! Watches the M2 money-supply series and, when the quarter-over-quarter
//! change crosses a threshold, proposes a content-production action: draft a
//! video script, book a filming slot, generate a thumbnail, file the package,
//! and notify the channel.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

use warden_common::{Error, Result};

use crate::agent::{Agent, AgentCore};
use crate::tools::{CalendarEvent, Notification, NotifyChannel, TextOptions, ThumbnailSpec, Toolkit};
use crate::types::{
    AgentAction, AgentConfig, AgentDecision, AgentDomain, AgentState, AutonomyTier, StateUpdate,
};

/// Database name the M2 series is read from.
pub const M2_SERIES: &str = "macro.m2";

/// Quarter-over-quarter change (percent) that triggers a decision.
const CHANGE_THRESHOLD_PCT: f64 = 3.0;

/// Minimum confidence required before an action is proposed.
const MIN_ACTION_CONFIDENCE: u8 = 70;

/// Samples per quarter in the series (weekly data).
const QUARTER_OFFSET: usize = 13;

/// Autonomous agent monitoring M2 liquidity.
pub struct MacroAnalystAgent {
    core: AgentCore,
    toolkit: Arc<dyn Toolkit>,
}

impl MacroAnalystAgent {
    /// Create the agent with its standard configuration.
    pub fn new(toolkit: Arc<dyn Toolkit>) -> Self {
        let config = AgentConfig {
            id: "macro-analyst".to_string(),
            name: "Macro Analyst".to_string(),
            description: "Monitors M2 liquidity and generates content when significant changes occur"
                .to_string(),
            domain: AgentDomain::Macro,
            capabilities: vec![
                "Monitor M2 money supply".to_string(),
                "Detect liquidity trends".to_string(),
                "Generate video scripts".to_string(),
                "Book filming slots".to_string(),
                "Create thumbnails".to_string(),
            ],
            autonomy: AutonomyTier::Execute,
            enabled: true,
            schedule: "0 */6 * * *".to_string(), // Every 6 hours
        };
        Self {
            core: AgentCore::new(config),
            toolkit,
        }
    }

    /// Read the series and extract (value, date) pairs, dropping rows that
    /// don't parse.
    async fn fetch_series(&self) -> Vec<(String, f64)> {
        let result = self
            .toolkit
            .query_records(M2_SERIES, serde_json::json!({}))
            .await;

        if !result.success {
            tracing::warn!(
                agent_id = %self.core.config().id,
                error = result.error.as_deref().unwrap_or("unknown"),
                "M2 series lookup failed"
            );
            return Vec::new();
        }

        result
            .data
            .unwrap_or_default()
            .into_iter()
            .filter_map(|row| {
                let date = row.get("date")?.as_str()?.to_string();
                let value = row.get("value")?.as_f64()?;
                Some((date, value))
            })
            .collect()
    }

    async fn draft_script(&self, title: &str, change_pct: f64, direction: &str) -> Result<String> {
        let prompt = format!(
            "You are a macro content strategist. Draft a video script for \"{title}\".\n\
             Context: M2 money supply changed by {change_pct:.2}% over the past quarter, \
             a {direction} in global liquidity that historically precedes market repricing \
             in 3-6 months.\n\
             Structure: hook, thesis, data proof, implications, call to action.\n\
             Length: 8-10 minutes (~1500 words)."
        );
        self.toolkit
            .generate_text(&prompt, TextOptions::default())
            .await
            .into_result("generate_text")
    }

    async fn book_filming_slot(&self, title: &str, urgency: &str) -> Result<String> {
        let slots = self
            .toolkit
            .availability(Utc::now(), 120)
            .await
            .into_result("availability")?;

        let slot = slots
            .into_iter()
            .next()
            .ok_or_else(|| Error::Execution("no available filming slots".to_string()))?;

        self.toolkit
            .book_event(CalendarEvent {
                title: format!("FILM: {title}"),
                start: slot.start,
                end: slot.end,
                description: Some(format!("Urgency: {urgency}. Auto-scheduled by Macro Analyst.")),
            })
            .await
            .into_result("book_event")
    }

    fn payload_str<'a>(action: &'a AgentAction, key: &str) -> Result<&'a str> {
        action
            .payload
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Execution(format!("action payload missing '{key}'")))
    }
}

#[async_trait]
impl Agent for MacroAnalystAgent {
    fn config(&self) -> &AgentConfig {
        self.core.config()
    }

    async fn monitor(&self) -> Result<Option<AgentDecision>> {
        tracing::debug!(agent_id = %self.core.config().id, "Starting M2 monitoring cycle");

        let series = self.fetch_series().await;
        if series.len() < 2 {
            tracing::debug!(agent_id = %self.core.config().id, "Not enough M2 data");
            return Ok(None);
        }

        let (latest_date, latest) = series[series.len() - 1].clone();
        let previous_idx = series.len().saturating_sub(QUARTER_OFFSET);
        let (_, previous) = series[previous_idx.min(series.len() - 2)].clone();

        if previous == 0.0 {
            return Ok(None);
        }

        let change_pct = (latest - previous) / previous * 100.0;
        tracing::debug!(
            agent_id = %self.core.config().id,
            change_pct = format!("{change_pct:.2}"),
            "M2 quarter-over-quarter change"
        );

        if change_pct.abs() < CHANGE_THRESHOLD_PCT {
            return Ok(None);
        }

        let direction = if change_pct > 0.0 {
            "expansion"
        } else {
            "contraction"
        };
        let confidence = (60.0 + change_pct.abs() * 5.0).min(95.0) as u8;

        let mut data_points = HashMap::new();
        data_points.insert("current_m2".to_string(), serde_json::json!(latest));
        data_points.insert("previous_m2".to_string(), serde_json::json!(previous));
        data_points.insert("change_pct".to_string(), serde_json::json!(change_pct));
        data_points.insert("direction".to_string(), serde_json::json!(direction));
        data_points.insert("date".to_string(), serde_json::json!(latest_date));

        Ok(Some(self.core.new_decision(
            format!("M2 {direction} detected"),
            format!(
                "M2 money supply changed by {change_pct:.2}% over the past quarter. \
                 This {direction} historically precedes crypto market movements in 3-6 months."
            ),
            confidence,
            data_points,
        )))
    }

    async fn analyze(&self, decision: &AgentDecision) -> Result<Option<AgentAction>> {
        if decision.confidence < MIN_ACTION_CONFIDENCE {
            tracing::debug!(
                agent_id = %self.core.config().id,
                confidence = decision.confidence,
                "Confidence too low, skipping action"
            );
            return Ok(None);
        }

        let direction = decision
            .data_points
            .get("direction")
            .and_then(|v| v.as_str())
            .unwrap_or("expansion");
        let change_pct = decision
            .data_points
            .get("change_pct")
            .and_then(|v| v.as_f64())
            .unwrap_or_default();

        let video_title = if direction == "expansion" {
            "The Liquidity Wave is Here: Why Crypto Will Reprice"
        } else {
            "Liquidity Drying Up: What This Means for Crypto"
        };
        let urgency = if decision.confidence > 85 { "high" } else { "medium" };

        let mut payload = HashMap::new();
        payload.insert("video_title".to_string(), serde_json::json!(video_title));
        payload.insert("m2_change".to_string(), serde_json::json!(change_pct));
        payload.insert("direction".to_string(), serde_json::json!(direction));
        payload.insert("urgency".to_string(), serde_json::json!(urgency));

        Ok(Some(self.core.new_action(
            decision,
            "generate_video_content",
            format!("Generate and schedule video about M2 {direction}"),
            payload,
            false, // tier is execute; no approval needed
        )))
    }

    async fn execute(&self, action: &AgentAction) -> Result<serde_json::Value> {
        let title = Self::payload_str(action, "video_title")?;
        let direction = Self::payload_str(action, "direction")?;
        let urgency = Self::payload_str(action, "urgency")?;
        let change_pct = action
            .payload
            .get("m2_change")
            .and_then(|v| v.as_f64())
            .unwrap_or_default();

        let script = self.draft_script(title, change_pct, direction).await?;
        let slot = self.book_filming_slot(title, urgency).await?;
        let thumbnail = self
            .toolkit
            .generate_thumbnail(ThumbnailSpec {
                text: title.to_string(),
                style: "bold, yellow gradient, charts, professional".to_string(),
            })
            .await
            .into_result("generate_thumbnail")?;

        let page_id = self
            .toolkit
            .save_record(
                "video-ideas",
                serde_json::json!({
                    "title": title,
                    "status": "Ready to Film",
                    "urgency": urgency,
                    "script": script,
                    "thumbnail": thumbnail,
                    "scheduled_event": slot,
                }),
            )
            .await
            .into_result("save_record")?;

        // Delivery failure shouldn't undo the work above.
        let notified = self
            .toolkit
            .notify(
                NotifyChannel::Slack,
                Notification {
                    subject: Some(format!("{} urgency: new video ready", urgency.to_uppercase())),
                    body: format!(
                        "M2 liquidity {direction} detected ({change_pct:.2}%).\n\
                         Video: \"{title}\"\n\
                         Script ready, slot booked, thumbnail generated."
                    ),
                },
            )
            .await;
        if !notified.success {
            tracing::warn!(
                agent_id = %self.core.config().id,
                error = notified.error.as_deref().unwrap_or("unknown"),
                "Notification delivery failed"
            );
        }

        Ok(serde_json::json!({
            "video_title": title,
            "script_generated": true,
            "slot_booked": slot,
            "thumbnail": thumbnail,
            "page_id": page_id,
        }))
    }

    fn state(&self) -> AgentState {
        self.core.snapshot()
    }

    fn apply_update(&self, update: StateUpdate) {
        self.core.apply(update);
    }
}
