use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::assess::{Drafter, Scorer};
use crate::filter::{self, FilterConfig};
use crate::listings::{ListingSource, QueryProfile};
use crate::notifier::Notifier;
use crate::seen_store::SeenStore;
use crate::types::{
    Posting, PostingOutcome, PostingStatus, Result, RunSummary, ScoutError, SeenRecord, Stage,
};

/// Orchestrator settings for one run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub filter: FilterConfig,
    pub score_threshold: u8,
    pub concurrency: usize,
    pub fetch_limit: usize,
}

/// Drives one end-to-end run: fetch, dedup, filter, score, threshold-gate,
/// draft, notify, persist-seen. The orchestrator is the only component with
/// cross-posting state (the batch and the run summary).
pub struct ScoutPipeline {
    source: Arc<dyn ListingSource>,
    seen: Arc<dyn SeenStore>,
    scorer: Scorer,
    drafter: Drafter,
    notifier: Arc<dyn Notifier>,
    config: PipelineConfig,
}

impl ScoutPipeline {
    pub fn new(
        source: Arc<dyn ListingSource>,
        seen: Arc<dyn SeenStore>,
        scorer: Scorer,
        drafter: Drafter,
        notifier: Arc<dyn Notifier>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            source,
            seen,
            scorer,
            drafter,
            notifier,
            config,
        }
    }

    /// Run the pipeline over one fetched batch. Only a listings-fetch
    /// failure aborts the run; every other failure terminates a single
    /// posting's pipeline and leaves its siblings untouched.
    pub async fn run(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::new();
        let query = QueryProfile {
            keywords: self.config.filter.keywords.clone(),
            limit: self.config.fetch_limit,
        };

        let postings = self.source.fetch_candidates(&query).await?;
        summary.fetched = postings.len();
        info!(
            "run {} started with {} candidate postings",
            summary.run_id, summary.fetched
        );

        let outcomes: Vec<PostingOutcome> = stream::iter(postings)
            .map(|posting| self.process(posting))
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        for outcome in &outcomes {
            summary.record(outcome);
        }

        if summary.notified == 0 {
            // Nothing shortlisted; push the summary instead so a quiet run
            // is distinguishable from a dead one.
            if let Err(err) = self.notifier.notify_summary(&summary).await {
                warn!("run summary delivery failed: {}", err);
            }
        }

        info!(
            "run {} finished: fetched={} skipped_seen={} filtered_out={} scored={} below_threshold={} drafted={} notified={} failed={}",
            summary.run_id,
            summary.fetched,
            summary.skipped_seen,
            summary.filtered_out,
            summary.scored,
            summary.below_threshold,
            summary.drafted,
            summary.notified,
            summary.failed,
        );
        Ok(summary)
    }

    /// Per-posting state machine. Transitions are strictly forward, and a
    /// seen record is written only after a notification acknowledgment or a
    /// deliberate filter-stage rejection, never before.
    async fn process(&self, posting: Posting) -> PostingOutcome {
        let id = posting.id.clone();

        match self.seen.has_seen(&id).await {
            Ok(true) => {
                return PostingOutcome {
                    posting_id: id,
                    status: PostingStatus::SkippedSeen,
                }
            }
            Ok(false) => {}
            Err(err) => return fail(id, Stage::DedupCheck, err),
        }

        let filter_result = filter::evaluate(&posting, &self.config.filter);
        if let Some(rule) = filter_result.failed_rule {
            // A deliberate rejection: record it so the posting is never
            // fetched and evaluated again. Best-effort; if the write fails
            // the posting is merely re-filtered next run, at no AI cost.
            let record = SeenRecord::new(&id, Utc::now());
            if let Err(err) = self.seen.mark_seen(&record).await {
                warn!("could not mark filtered posting {} seen: {}", id, err);
            }
            return PostingOutcome {
                posting_id: id,
                status: PostingStatus::FilteredOut(rule),
            };
        }

        let score = match self.scorer.score(&posting).await {
            Ok(score) => score,
            Err(err) => return fail(id, Stage::Scoring, err),
        };

        if score.score < self.config.score_threshold {
            // Not a skip decision, so no seen record is written; a later
            // run may rescore the posting from scratch.
            return PostingOutcome {
                posting_id: id,
                status: PostingStatus::BelowThreshold(score.score),
            };
        }

        let draft = match self.drafter.draft(&posting).await {
            Ok(draft) => draft,
            Err(err) => return fail(id, Stage::Drafting, err),
        };

        if let Err(err) = self.notifier.notify(&posting, &score, &draft).await {
            // Not marked seen: the next run re-evaluates the posting rather
            // than dropping it silently.
            return fail(id, Stage::Delivery, err);
        }

        let record = SeenRecord::notified(&id, Utc::now());
        match self.seen.mark_seen(&record).await {
            Ok(_) => PostingOutcome {
                posting_id: id,
                status: PostingStatus::NotifiedAndPersisted(score.score),
            },
            Err(err) => {
                error!("posting {} notified but seen write failed: {}", id, err);
                PostingOutcome {
                    posting_id: id,
                    status: PostingStatus::FailedPersisted {
                        score: score.score,
                        error: err.to_string(),
                    },
                }
            }
        }
    }
}

fn fail(posting_id: String, stage: Stage, err: ScoutError) -> PostingOutcome {
    warn!("posting {} failed at {}: {}", posting_id, stage, err);
    PostingOutcome {
        posting_id,
        status: PostingStatus::Failed {
            stage,
            error: err.to_string(),
        },
    }
}
