use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::filter::FilterRule;

/// One job listing as returned by the listings source. Immutable within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Posting {
    pub id: String,
    pub title: String,
    pub description: String,
    pub budget: Option<Budget>,
    pub payment_verified: bool,
    pub posted_at: Option<DateTime<Utc>>,
    pub skills: Vec<String>,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub minimum: f64,
    pub currency: String,
}

/// Durable record of a posting that has already been processed. At most one
/// record exists per posting id; the first writer wins on `first_seen_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeenRecord {
    pub posting_id: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_notified_at: Option<DateTime<Utc>>,
}

impl SeenRecord {
    pub fn new(posting_id: &str, first_seen_at: DateTime<Utc>) -> Self {
        Self {
            posting_id: posting_id.to_string(),
            first_seen_at,
            last_notified_at: None,
        }
    }

    pub fn notified(posting_id: &str, at: DateTime<Utc>) -> Self {
        Self {
            posting_id: posting_id.to_string(),
            first_seen_at: at,
            last_notified_at: Some(at),
        }
    }
}

/// Relevance judgment for one posting. Per-run and per-posting; never cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResult {
    pub score: u8,
    pub rationale: String,
}

/// Proposal text produced only for postings at or above the score threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftResult {
    pub proposal: String,
}

/// Stage at which a posting's pipeline failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    DedupCheck,
    Scoring,
    Drafting,
    Delivery,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::DedupCheck => "dedup check",
            Stage::Scoring => "scoring",
            Stage::Drafting => "drafting",
            Stage::Delivery => "delivery",
        };
        write!(f, "{}", name)
    }
}

/// Terminal state of one posting within a run. Transitions are strictly
/// forward; a posting reaches exactly one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum PostingStatus {
    SkippedSeen,
    FilteredOut(FilterRule),
    BelowThreshold(u8),
    NotifiedAndPersisted(u8),
    /// Notified, but the seen write failed. Accepted as a rare
    /// duplicate-notification risk on the next run.
    FailedPersisted { score: u8, error: String },
    /// Failed at or before delivery. The posting was never marked seen, so
    /// the next scheduled run retries it from scratch.
    Failed { stage: Stage, error: String },
}

#[derive(Debug, Clone)]
pub struct PostingOutcome {
    pub posting_id: String,
    pub status: PostingStatus,
}

/// Counters for one pipeline run, logged when the run finishes.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub fetched: usize,
    pub skipped_seen: usize,
    pub filtered_out: usize,
    pub scored: usize,
    pub below_threshold: usize,
    pub drafted: usize,
    pub notified: usize,
    pub failed: usize,
    pub failures: Vec<String>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            fetched: 0,
            skipped_seen: 0,
            filtered_out: 0,
            scored: 0,
            below_threshold: 0,
            drafted: 0,
            notified: 0,
            failed: 0,
            failures: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: &PostingOutcome) {
        match &outcome.status {
            PostingStatus::SkippedSeen => self.skipped_seen += 1,
            PostingStatus::FilteredOut(_) => self.filtered_out += 1,
            PostingStatus::BelowThreshold(_) => {
                self.scored += 1;
                self.below_threshold += 1;
            }
            PostingStatus::NotifiedAndPersisted(_) => {
                self.scored += 1;
                self.drafted += 1;
                self.notified += 1;
            }
            PostingStatus::FailedPersisted { error, .. } => {
                self.scored += 1;
                self.drafted += 1;
                self.notified += 1;
                self.failed += 1;
                self.failures.push(format!(
                    "{}: notified but seen write failed: {}",
                    outcome.posting_id, error
                ));
            }
            PostingStatus::Failed { stage, error } => {
                // A failure past a stage still counts the stages it cleared.
                match stage {
                    Stage::Drafting => self.scored += 1,
                    Stage::Delivery => {
                        self.scored += 1;
                        self.drafted += 1;
                    }
                    Stage::DedupCheck | Stage::Scoring => {}
                }
                self.failed += 1;
                self.failures.push(format!(
                    "{}: failed at {}: {}",
                    outcome.posting_id, stage, error
                ));
            }
        }
    }
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScoutError {
    #[error("listings source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("seen store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("inference service unavailable: {0}")]
    InferenceUnavailable(String),

    #[error("invalid score response: {0}")]
    InvalidScoreResponse(String),

    #[error("empty draft response")]
    EmptyDraftResponse,

    #[error("notification delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ScoutError {
    /// Transient transport failures are worth retrying with backoff;
    /// validation failures are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ScoutError::SourceUnavailable(_)
                | ScoutError::StoreUnavailable(_)
                | ScoutError::InferenceUnavailable(_)
                | ScoutError::DeliveryFailed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ScoutError>;
