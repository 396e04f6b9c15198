use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::filter::FilterConfig;
use crate::types::{Result, ScoutError};

#[derive(Debug, Clone)]
pub struct ListingsConfig {
    pub api_url: String,
    pub access_token: String,
    /// Base of the public project links embedded in alerts.
    pub project_url: String,
    pub page_limit: usize,
    pub max_pages: usize,
}

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub api_url: String,
    pub api_key: String,
    pub score_model: String,
    pub draft_model: String,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub api_url: String,
    pub bot_token: String,
    pub chat_id: String,
}

/// Full run configuration, read from the environment once per invocation.
#[derive(Debug, Clone)]
pub struct Config {
    pub filter: FilterConfig,
    pub profile: String,
    pub score_threshold: u8,
    pub database_url: String,
    pub listings: ListingsConfig,
    pub inference: InferenceConfig,
    pub telegram: TelegramConfig,
    pub concurrency: usize,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub run_deadline: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let keywords: Vec<String> = required("JOB_KEYWORDS")?
            .split(',')
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        if keywords.is_empty() {
            return Err(ScoutError::Config(
                "JOB_KEYWORDS must list at least one keyword".to_string(),
            ));
        }

        let min_budget: f64 = parsed("MIN_BUDGET", required("MIN_BUDGET")?)?;
        let score_threshold: u8 = parsed("AI_SCORE_THRESHOLD", optional("AI_SCORE_THRESHOLD", "70"))?;
        if score_threshold > 100 {
            return Err(ScoutError::Config(
                "AI_SCORE_THRESHOLD must be between 0 and 100".to_string(),
            ));
        }

        let require_payment_verified =
            optional("REQUIRE_PAYMENT_VERIFIED", "true").to_lowercase() == "true";

        let listings = ListingsConfig {
            api_url: base_url("LISTINGS_API_URL", "https://www.freelancer.com/api")?,
            access_token: required("LISTINGS_ACCESS_TOKEN")?,
            project_url: base_url("LISTINGS_PROJECT_URL", "https://www.freelancer.com/projects")?,
            page_limit: parsed("LISTINGS_PAGE_LIMIT", optional("LISTINGS_PAGE_LIMIT", "50"))?,
            max_pages: parsed("LISTINGS_MAX_PAGES", optional("LISTINGS_MAX_PAGES", "5"))?,
        };

        let inference = InferenceConfig {
            api_url: base_url("ANTHROPIC_API_URL", "https://api.anthropic.com")?,
            api_key: required("ANTHROPIC_API_KEY")?,
            score_model: optional("SCORE_MODEL", "claude-3-haiku-20240307"),
            draft_model: optional("DRAFT_MODEL", "claude-3-5-sonnet-20240620"),
        };

        let telegram = TelegramConfig {
            api_url: base_url("TELEGRAM_API_URL", "https://api.telegram.org")?,
            bot_token: required("TELEGRAM_BOT_TOKEN")?,
            chat_id: required("TELEGRAM_CHAT_ID")?,
        };

        Ok(Self {
            filter: FilterConfig {
                keywords,
                min_budget,
                require_payment_verified,
            },
            profile: required("PROFILE_SUMMARY")?,
            score_threshold,
            database_url: required("DATABASE_URL")?,
            listings,
            inference,
            telegram,
            concurrency: parsed("WORKER_CONCURRENCY", optional("WORKER_CONCURRENCY", "4"))?,
            request_timeout: Duration::from_secs(parsed(
                "REQUEST_TIMEOUT_SECS",
                optional("REQUEST_TIMEOUT_SECS", "30"),
            )?),
            max_retries: parsed("MAX_RETRIES", optional("MAX_RETRIES", "3"))?,
            retry_delay: Duration::from_secs(parsed(
                "RETRY_DELAY_SECS",
                optional("RETRY_DELAY_SECS", "2"),
            )?),
            run_deadline: Duration::from_secs(parsed(
                "RUN_DEADLINE_SECS",
                optional("RUN_DEADLINE_SECS", "300"),
            )?),
        })
    }
}

fn required(name: &str) -> Result<String> {
    env::var(name)
        .map_err(|_| ScoutError::Config(format!("missing required environment variable {}", name)))
}

fn optional(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed<T>(name: &str, raw: String) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| ScoutError::Config(format!("invalid {}: {}", name, e)))
}

/// Base URLs are validated up front and stored without a trailing slash.
fn base_url(name: &str, default: &str) -> Result<String> {
    let raw = optional(name, default);
    let checked =
        Url::parse(&raw).map_err(|e| ScoutError::Config(format!("invalid {}: {}", name, e)))?;
    if !matches!(checked.scheme(), "http" | "https") {
        return Err(ScoutError::Config(format!(
            "invalid {}: expected an http(s) URL",
            name
        )));
    }
    Ok(raw.trim_end_matches('/').to_string())
}
