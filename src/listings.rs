use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::ListingsConfig;
use crate::retry::{with_retries, RetryPolicy};
use crate::types::{Budget, Posting, Result, ScoutError};

/// Keyword terms and result-count limit for one remote query.
#[derive(Debug, Clone)]
pub struct QueryProfile {
    pub keywords: Vec<String>,
    pub limit: usize,
}

/// Read-only boundary to the external listings source. Source ordering is
/// preserved; later gating decisions implicitly favor earlier postings.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch_candidates(&self, query: &QueryProfile) -> Result<Vec<Posting>>;
}

/// Client for a Freelancer-style marketplace API. Issues GET requests only.
pub struct FreelancerClient {
    client: Client,
    config: ListingsConfig,
    retry: RetryPolicy,
}

impl FreelancerClient {
    pub fn new(config: ListingsConfig, timeout: Duration, retry: RetryPolicy) -> Self {
        let client = Client::builder()
            .user_agent("job-scout/0.1")
            .timeout(timeout)
            .gzip(true)
            .build()
            .expect("failed to create HTTP client");
        Self {
            client,
            config,
            retry,
        }
    }

    async fn fetch_page(
        &self,
        query: &QueryProfile,
        offset: usize,
        limit: usize,
    ) -> Result<serde_json::Value> {
        let url = format!("{}/projects/0.1/projects/active", self.config.api_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.access_token)
            .header("Accept", "application/json")
            .query(&[
                ("query", query.keywords.join(" ")),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ])
            .send()
            .await
            .map_err(|e| ScoutError::SourceUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScoutError::SourceUnavailable(format!(
                "HTTP {} from listings source",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ScoutError::SourceUnavailable(e.to_string()))
    }
}

#[async_trait]
impl ListingSource for FreelancerClient {
    async fn fetch_candidates(&self, query: &QueryProfile) -> Result<Vec<Posting>> {
        let mut postings = Vec::new();

        for page in 0..self.config.max_pages {
            if postings.len() >= query.limit {
                break;
            }
            let offset = page * self.config.page_limit;
            let page_limit = self.config.page_limit.min(query.limit - postings.len());

            let body = with_retries(&self.retry, "listings fetch", || {
                self.fetch_page(query, offset, page_limit)
            })
            .await?;

            let page_postings = parse_projects(&body, &self.config.project_url)?;
            if page_postings.is_empty() {
                break;
            }
            debug!(
                "fetched {} postings at offset {}",
                page_postings.len(),
                offset
            );
            postings.extend(page_postings);
        }

        postings.truncate(query.limit);
        info!("listings query returned {} candidate postings", postings.len());
        Ok(postings)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    result: Option<PageResult>,
}

#[derive(Debug, Deserialize)]
struct PageResult {
    #[serde(default)]
    projects: Vec<RawProject>,
}

#[derive(Debug, Deserialize)]
struct RawProject {
    id: i64,
    #[serde(default)]
    title: String,
    description: Option<String>,
    preview_description: Option<String>,
    budget: Option<RawBudget>,
    currency: Option<RawCurrency>,
    owner: Option<RawOwner>,
    submitdate: Option<i64>,
    #[serde(default)]
    jobs: Vec<RawJob>,
}

#[derive(Debug, Deserialize)]
struct RawBudget {
    minimum: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawCurrency {
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawOwner {
    #[serde(default)]
    payment_verified: bool,
}

#[derive(Debug, Deserialize)]
struct RawJob {
    name: Option<String>,
}

/// Map one page of the `{"result": {"projects": [...]}}` envelope into
/// postings, in source order. A malformed payload counts against the source.
pub fn parse_projects(body: &serde_json::Value, project_url_base: &str) -> Result<Vec<Posting>> {
    let envelope: Envelope = serde_json::from_value(body.clone())
        .map_err(|e| ScoutError::SourceUnavailable(format!("malformed listings payload: {}", e)))?;
    let projects = envelope.result.map(|r| r.projects).unwrap_or_default();

    let postings = projects
        .into_iter()
        .map(|raw| {
            let currency = raw
                .currency
                .and_then(|c| c.code)
                .unwrap_or_else(|| "USD".to_string());
            let budget = raw
                .budget
                .and_then(|b| b.minimum)
                .map(|minimum| Budget { minimum, currency });

            Posting {
                id: raw.id.to_string(),
                url: format!("{}/{}", project_url_base.trim_end_matches('/'), raw.id),
                title: raw.title,
                description: raw
                    .description
                    .or(raw.preview_description)
                    .unwrap_or_default(),
                budget,
                payment_verified: raw.owner.map(|o| o.payment_verified).unwrap_or(false),
                posted_at: raw
                    .submitdate
                    .and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
                skills: raw.jobs.into_iter().filter_map(|j| j.name).collect(),
            }
        })
        .collect();

    Ok(postings)
}
