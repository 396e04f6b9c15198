use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use job_scout::assess::{Drafter, Scorer};
use job_scout::filter::FilterConfig;
use job_scout::listings::{ListingSource, QueryProfile};
use job_scout::llm_adapter::MockInferenceClient;
use job_scout::notifier::Notifier;
use job_scout::pipeline::{PipelineConfig, ScoutPipeline};
use job_scout::seen_store::{MemorySeenStore, SeenStore};
use job_scout::types::{
    Budget, DraftResult, Posting, Result, RunSummary, ScoreResult, ScoutError, SeenRecord,
};

pub const SCORE_MODEL: &str = "score-model";
pub const DRAFT_MODEL: &str = "draft-model";

pub fn posting(id: &str, budget: Option<f64>, payment_verified: bool) -> Posting {
    Posting {
        id: id.to_string(),
        title: format!("Rust automation work ({})", id),
        description: "Build an automation pipeline in Rust".to_string(),
        budget: budget.map(|minimum| Budget {
            minimum,
            currency: "USD".to_string(),
        }),
        payment_verified,
        posted_at: Some(Utc::now()),
        skills: vec!["rust".to_string()],
        url: format!("https://example.com/projects/{}", id),
    }
}

/// Pipeline wired with the standard test filter (keyword "rust", minimum
/// budget 50, payment verification required) and sequential processing so
/// scripted inference responses are consumed in posting order.
pub fn build_pipeline(
    source: Arc<dyn ListingSource>,
    seen: Arc<dyn SeenStore>,
    llm: Arc<MockInferenceClient>,
    notifier: Arc<dyn Notifier>,
    score_threshold: u8,
) -> ScoutPipeline {
    let profile = "Rust backend and automation developer".to_string();
    let scorer = Scorer::new(llm.clone(), SCORE_MODEL.to_string(), profile.clone());
    let drafter = Drafter::new(llm, DRAFT_MODEL.to_string(), profile);
    ScoutPipeline::new(
        source,
        seen,
        scorer,
        drafter,
        notifier,
        PipelineConfig {
            filter: FilterConfig {
                keywords: vec!["rust".to_string()],
                min_budget: 50.0,
                require_payment_verified: true,
            },
            score_threshold,
            concurrency: 1,
            fetch_limit: 100,
        },
    )
}

pub struct StaticSource {
    postings: Vec<Posting>,
}

impl StaticSource {
    pub fn new(postings: Vec<Posting>) -> Self {
        Self { postings }
    }
}

#[async_trait]
impl ListingSource for StaticSource {
    async fn fetch_candidates(&self, _query: &QueryProfile) -> Result<Vec<Posting>> {
        Ok(self.postings.clone())
    }
}

pub struct FailingSource;

#[async_trait]
impl ListingSource for FailingSource {
    async fn fetch_candidates(&self, _query: &QueryProfile) -> Result<Vec<Posting>> {
        Err(ScoutError::SourceUnavailable(
            "connection refused".to_string(),
        ))
    }
}

/// Notifier that records deliveries and can be told to reject specific
/// posting ids with a delivery failure.
#[derive(Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<String>>,
    summaries: Mutex<Vec<RunSummary>>,
    fail_ids: HashSet<String>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(ids: &[&str]) -> Self {
        Self {
            fail_ids: ids.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn delivered_ids(&self) -> Vec<String> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn summary_count(&self) -> usize {
        self.summaries.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        posting: &Posting,
        _score: &ScoreResult,
        _draft: &DraftResult,
    ) -> Result<()> {
        if self.fail_ids.contains(&posting.id) {
            return Err(ScoutError::DeliveryFailed(
                "channel rejected message".to_string(),
            ));
        }
        self.delivered.lock().unwrap().push(posting.id.clone());
        Ok(())
    }

    async fn notify_summary(&self, summary: &RunSummary) -> Result<()> {
        self.summaries.lock().unwrap().push(summary.clone());
        Ok(())
    }
}

/// Store whose reads fail for the configured posting ids; writes pass
/// through to an in-memory store.
pub struct FlakySeenStore {
    inner: MemorySeenStore,
    fail_reads_for: HashSet<String>,
}

impl FlakySeenStore {
    pub fn failing_reads_for(ids: &[&str]) -> Self {
        Self {
            inner: MemorySeenStore::new(),
            fail_reads_for: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub async fn contains(&self, posting_id: &str) -> bool {
        self.inner.get(posting_id).await.is_some()
    }
}

#[async_trait]
impl SeenStore for FlakySeenStore {
    async fn has_seen(&self, posting_id: &str) -> Result<bool> {
        if self.fail_reads_for.contains(posting_id) {
            return Err(ScoutError::StoreUnavailable("timeout".to_string()));
        }
        self.inner.has_seen(posting_id).await
    }

    async fn mark_seen(&self, record: &SeenRecord) -> Result<bool> {
        self.inner.mark_seen(record).await
    }
}
