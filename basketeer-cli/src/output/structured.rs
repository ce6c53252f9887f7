//! JSON and YAML output.

use std::time::Duration;

use anyhow::Result;
use basketeer_core::{BasketSummary, ResolvedItem, ResolvedVenue, Warnings};
use basketeer_fetch::{AttemptOutcome, SourceAttempt};
use chrono::{DateTime, Utc};
use serde::Serialize;

// ============================================================================
// Output Types
// ============================================================================

/// A venue's menu.
#[derive(Debug, Serialize)]
pub struct MenuOutput {
    pub venue: String,
    pub from_categories: bool,
    pub items: Vec<ResolvedItem>,
    #[serde(skip_serializing_if = "Warnings::is_empty")]
    pub warnings: Warnings,
}

/// A resolved item or venue with its source trail.
#[derive(Debug, Serialize)]
pub struct ResolvedOutput<T> {
    #[serde(flatten)]
    pub value: T,
    pub complete: bool,
    pub sources: Vec<SourceOutput>,
    #[serde(skip_serializing_if = "Warnings::is_empty")]
    pub warnings: Warnings,
}

/// Item output.
pub type ItemOutput = ResolvedOutput<ResolvedItem>;

/// Venue output.
pub type VenueOutput = ResolvedOutput<ResolvedVenue>;

/// One source attempt.
#[derive(Debug, Clone, Serialize)]
pub struct SourceOutput {
    pub source: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl From<&SourceAttempt> for SourceOutput {
    fn from(attempt: &SourceAttempt) -> Self {
        let (status, fields, error) = match &attempt.outcome {
            AttemptOutcome::Found(fields) => ("found", fields.clone(), None),
            AttemptOutcome::Empty => ("empty", Vec::new(), None),
            AttemptOutcome::Failed(e) => ("failed", Vec::new(), Some(e.clone())),
        };
        Self {
            source: attempt.source_id.clone(),
            status,
            fields,
            error,
            elapsed_ms: millis(attempt.duration),
        }
    }
}

/// Basket list.
#[derive(Debug, Serialize)]
pub struct BasketsOutput {
    pub baskets: Vec<BasketSummary>,
}

/// Result of a basket removal.
#[derive(Debug, Serialize)]
pub struct RemovedOutput {
    pub removed: BasketSummary,
}

/// Credential status.
#[derive(Debug, Serialize)]
pub struct AuthStatusOutput {
    pub authenticated: bool,
    pub token_source: &'static str,
    pub bearer_token: bool,
    pub refresh_token: bool,
    pub cookies: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub expired: bool,
    pub store: String,
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Structured Formatter
// ============================================================================

/// Serializes output as JSON or YAML.
pub struct StructuredFormatter {
    pretty: bool,
}

impl StructuredFormatter {
    /// Creates a formatter; `pretty` only affects JSON.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value as JSON.
    pub fn json<T: Serialize>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }

    /// Formats any serializable value as YAML.
    pub fn yaml<T: Serialize>(&self, data: &T) -> Result<String> {
        Ok(serde_yaml::to_string(data)?.trim_end().to_string())
    }
}
