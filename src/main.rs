use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

use job_scout::assess::{Drafter, Scorer};
use job_scout::config::Config;
use job_scout::listings::FreelancerClient;
use job_scout::llm_adapter::AnthropicClient;
use job_scout::notifier::TelegramNotifier;
use job_scout::pipeline::{PipelineConfig, ScoutPipeline};
use job_scout::retry::RetryPolicy;
use job_scout::seen_store::PgSeenStore;

/// Fetch, filter, score, and notify on new job postings, once, then exit.
/// Scheduling is the host environment's concern.
#[derive(Parser, Debug)]
#[command(name = "job-scout", about = "One-shot job posting scout")]
struct Args {
    /// Environment file loaded before configuration is read.
    #[arg(long)]
    env_file: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    match &args.env_file {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("could not load env file {}", path.display()))?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    let retry = RetryPolicy {
        max_retries: config.max_retries,
        initial_delay: config.retry_delay,
    };

    let store = PgSeenStore::connect(&config.database_url, retry.clone()).await?;
    store.setup_schema().await?;

    let source = FreelancerClient::new(
        config.listings.clone(),
        config.request_timeout,
        retry.clone(),
    );
    let llm = Arc::new(AnthropicClient::new(
        config.inference.clone(),
        config.request_timeout,
        retry.clone(),
    ));
    let scorer = Scorer::new(
        llm.clone(),
        config.inference.score_model.clone(),
        config.profile.clone(),
    );
    let drafter = Drafter::new(
        llm,
        config.inference.draft_model.clone(),
        config.profile.clone(),
    );
    let notifier = TelegramNotifier::new(config.telegram.clone(), config.request_timeout, retry);

    let pipeline = ScoutPipeline::new(
        Arc::new(source),
        Arc::new(store),
        scorer,
        drafter,
        Arc::new(notifier),
        PipelineConfig {
            filter: config.filter.clone(),
            score_threshold: config.score_threshold,
            concurrency: config.concurrency,
            fetch_limit: config.listings.page_limit * config.listings.max_pages,
        },
    );

    match tokio::time::timeout(config.run_deadline, pipeline.run()).await {
        Ok(Ok(summary)) => {
            info!(
                "run complete: fetched={} skipped_seen={} filtered_out={} scored={} drafted={} notified={} failed={}",
                summary.fetched,
                summary.skipped_seen,
                summary.filtered_out,
                summary.scored,
                summary.drafted,
                summary.notified,
                summary.failed,
            );
            for failure in &summary.failures {
                warn!("{}", failure);
            }
            Ok(())
        }
        Ok(Err(err)) => {
            error!("run aborted: {}", err);
            Err(err.into())
        }
        Err(_) => {
            // In-flight postings were never marked seen, so abandoning them
            // at the deadline loses nothing; the next run picks them up.
            error!("run deadline exceeded after {:?}", config.run_deadline);
            Err(anyhow::anyhow!("run deadline exceeded"))
        }
    }
}
