//! Cron schedule parsing for per-agent monitoring triggers.
//!
//! Agent configs carry standard 5-field crontab expressions; the `cron`
//! crate wants a seconds field, so 5-field input is normalized by prefixing
//! `0`. Native 6- and 7-field expressions pass through unchanged.

use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;

use warden_common::{Error, Result};

/// A parsed, validated monitoring schedule.
#[derive(Debug, Clone)]
pub struct MonitorSchedule {
    expression: String,
    schedule: Schedule,
}

impl MonitorSchedule {
    /// Parse a crontab-like expression.
    pub fn parse(expression: &str) -> Result<Self> {
        let normalized = normalize_expression(expression)?;
        let schedule = Schedule::from_str(&normalized).map_err(|e| Error::InvalidSchedule {
            expression: expression.to_string(),
            detail: e.to_string(),
        })?;

        Ok(Self {
            expression: expression.to_string(),
            schedule,
        })
    }

    /// The original expression as configured.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Next occurrence strictly after `from`, if any.
    pub fn next_after(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&from).next()
    }
}

/// Normalize a cron expression to the crate's 6-field format.
fn normalize_expression(expression: &str) -> Result<String> {
    let expression = expression.trim();
    let field_count = expression.split_whitespace().count();

    match field_count {
        // Standard crontab syntax: minute hour day month weekday
        5 => Ok(format!("0 {expression}")),
        // Crate-native syntax includes seconds (+ optional year)
        6 | 7 => Ok(expression.to_string()),
        _ => Err(Error::InvalidSchedule {
            expression: expression.to_string(),
            detail: format!("expected 5, 6, or 7 fields, got {field_count}"),
        }),
    }
}
