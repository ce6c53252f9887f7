//! Fallback cascade over ordered payload sources.
//!
//! Sources are tried strictly in order. Each one that yields a payload is
//! merged into the running result, filling only fields that are still
//! missing. The cascade stops once the merged payload is complete.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use basketeer_core::{Payload, Warnings};
use tracing::{debug, info, instrument, warn};

use crate::auth::AuthContext;
use crate::context::FetchContext;
use crate::error::FetchError;

// ============================================================================
// Candidate Source
// ============================================================================

/// State shared by every source of one cascade run.
#[derive(Debug, Default)]
pub struct CascadeState {
    /// Page tokens already followed in this run.
    pub seen_page_tokens: HashSet<String>,
    /// Warnings raised by sources that still produced a result.
    pub warnings: Warnings,
}

/// One place the cascade can look for an entity.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Short identifier used in logs and warnings.
    fn id(&self) -> &str;

    /// Produces this source's view of the entity.
    ///
    /// `Ok(None)` means the source answered but knows nothing about the
    /// entity. Errors mean the source itself was unavailable.
    async fn candidate(
        &self,
        ctx: &FetchContext,
        auth: &AuthContext,
        state: &mut CascadeState,
    ) -> Result<Option<Payload>, FetchError>;
}

// ============================================================================
// Attempts
// ============================================================================

/// What one source contributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// A payload was found; lists the fields it filled.
    Found(Vec<String>),
    /// The source answered without data for the entity.
    Empty,
    /// The source failed.
    Failed(String),
}

/// Record of a single source attempt.
#[derive(Debug, Clone)]
pub struct SourceAttempt {
    /// The source that was attempted.
    pub source_id: String,
    /// What happened.
    pub outcome: AttemptOutcome,
    /// How long the attempt took.
    pub duration: Duration,
}

/// The outcome of a cascade run.
#[derive(Debug, Clone)]
pub struct CascadeOutcome {
    /// Merged payload of every source that answered.
    pub merged: Payload,
    /// Attempts in source order.
    pub attempts: Vec<SourceAttempt>,
    /// Whether the merged payload satisfied the completeness check.
    pub complete: bool,
    /// Source-unavailable and source-internal warnings.
    pub warnings: Warnings,
}

impl CascadeOutcome {
    /// Ids of the sources that contributed at least one field.
    pub fn contributing_sources(&self) -> Vec<&str> {
        self.attempts
            .iter()
            .filter(|a| matches!(&a.outcome, AttemptOutcome::Found(filled) if !filled.is_empty()))
            .map(|a| a.source_id.as_str())
            .collect()
    }
}

// ============================================================================
// Fallback Cascade
// ============================================================================

/// Ordered sources plus the checks that decide when to stop.
pub struct FallbackCascade {
    sources: Vec<Box<dyn CandidateSource>>,
    is_complete: fn(&Payload) -> bool,
    has_signal: fn(&Payload) -> bool,
}

impl FallbackCascade {
    /// Creates a cascade.
    ///
    /// `is_complete` ends the run early. `has_signal` decides whether the
    /// final merged payload identifies the entity at all.
    pub fn new(
        sources: Vec<Box<dyn CandidateSource>>,
        is_complete: fn(&Payload) -> bool,
        has_signal: fn(&Payload) -> bool,
    ) -> Self {
        Self {
            sources,
            is_complete,
            has_signal,
        }
    }

    /// Returns the number of sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns true if the cascade has no sources.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Runs the sources in order and merges what they return.
    ///
    /// Returns [`FetchError::NotFound`] when nothing identifying was found.
    /// If that happens while a source was rejected with 401, the 401 is
    /// returned instead so a caller can refresh and retry.
    #[instrument(skip(self, ctx, auth), fields(sources = self.sources.len()))]
    pub async fn resolve(
        &self,
        ctx: &FetchContext,
        auth: &AuthContext,
        what: &str,
    ) -> Result<CascadeOutcome, FetchError> {
        let mut state = CascadeState::default();
        let mut merged = Payload::new();
        let mut attempts = Vec::with_capacity(self.sources.len());
        let mut warnings = Warnings::new();
        let mut unauthorized = None;
        let mut complete = false;

        for source in &self.sources {
            if ctx.cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            let source_id = source.id();
            let started = Instant::now();
            debug!(source = %source_id, "Trying source");

            let outcome = match source.candidate(ctx, auth, &mut state).await {
                Ok(Some(candidate)) => {
                    let filled = merged.merge_missing(&candidate);
                    debug!(source = %source_id, ?filled, "Source answered");
                    AttemptOutcome::Found(filled)
                }
                Ok(None) => AttemptOutcome::Empty,
                Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
                Err(e) => {
                    warn!(source = %source_id, error = %e, "Source unavailable");
                    warnings.push(format!("{source_id} unavailable: {e}"));
                    let message = e.to_string();
                    if e.is_unauthorized() && unauthorized.is_none() {
                        unauthorized = Some(e);
                    }
                    AttemptOutcome::Failed(message)
                }
            };

            attempts.push(SourceAttempt {
                source_id: source_id.to_string(),
                outcome,
                duration: started.elapsed(),
            });

            if (self.is_complete)(&merged) {
                complete = true;
                break;
            }
        }

        if !(self.has_signal)(&merged) {
            if let Some(e) = unauthorized {
                return Err(e);
            }
            return Err(FetchError::NotFound(what.to_string()));
        }

        warnings.extend(state.warnings);
        info!(complete, attempts = attempts.len(), "Cascade finished");
        Ok(CascadeOutcome {
            merged,
            attempts,
            complete,
            warnings,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
