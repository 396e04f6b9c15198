use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::info;

use crate::config::TelegramConfig;
use crate::retry::{with_retries, RetryPolicy};
use crate::types::{DraftResult, Posting, Result, RunSummary, ScoreResult, ScoutError};

const DRAFT_EXCERPT_MAX: usize = 900;

/// Outbound alert channel. At most one alert per qualifying posting per run;
/// a failed delivery must leave the posting unseen so it is retried later.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        posting: &Posting,
        score: &ScoreResult,
        draft: &DraftResult,
    ) -> Result<()>;

    /// Delivered when a run shortlists nothing, so silence is still a signal.
    async fn notify_summary(&self, summary: &RunSummary) -> Result<()>;
}

/// Notifier over the Telegram Bot API.
pub struct TelegramNotifier {
    client: Client,
    config: TelegramConfig,
    retry: RetryPolicy,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig, timeout: Duration, retry: RetryPolicy) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to create HTTP client");
        Self {
            client,
            config,
            retry,
        }
    }

    async fn send_message(&self, text: &str) -> Result<()> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.config.api_url, self.config.bot_token
        );
        let payload = json!({
            "chat_id": self.config.chat_id,
            "text": text,
            "disable_web_page_preview": true
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ScoutError::DeliveryFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScoutError::DeliveryFailed(format!(
                "HTTP {} from notification channel",
                status
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(
        &self,
        posting: &Posting,
        score: &ScoreResult,
        draft: &DraftResult,
    ) -> Result<()> {
        let message = format_alert(posting, score, draft);
        let message = message.as_str();
        with_retries(&self.retry, "alert delivery", || self.send_message(message)).await?;
        info!("delivered alert for posting {}", posting.id);
        Ok(())
    }

    async fn notify_summary(&self, summary: &RunSummary) -> Result<()> {
        let message = format_run_summary(summary);
        let message = message.as_str();
        with_retries(&self.retry, "summary delivery", || self.send_message(message)).await
    }
}

/// Render one posting alert: title, score, posted time, verification flag,
/// rationale, a bounded draft excerpt, and the posting link.
pub fn format_alert(posting: &Posting, score: &ScoreResult, draft: &DraftResult) -> String {
    let posted = posting
        .posted_at
        .map(|t| t.format("%d %b %Y, %H:%M UTC").to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    format!(
        "⭐ High-Match Job ({score}/100)\n\n\
         📌 {title}\n\
         🕒 Posted: {posted}\n\
         💳 Payment Verified: {verified}\n\n\
         💡 {rationale}\n\n\
         📝 Proposal Draft:\n{draft}\n\n\
         🔗 {url}",
        score = score.score,
        title = posting.title,
        posted = posted,
        verified = if posting.payment_verified { "Yes" } else { "No" },
        rationale = score.rationale,
        draft = excerpt(&draft.proposal, DRAFT_EXCERPT_MAX),
        url = posting.url,
    )
}

pub fn format_run_summary(summary: &RunSummary) -> String {
    format!(
        "📊 Run Summary\n\n\
         Fetched: {}\n\
         Skipped (seen): {}\n\
         Filtered out: {}\n\
         Scored: {}\n\
         Notified: {}\n\
         Failed: {}\n\n\
         No high-match jobs found this run.",
        summary.fetched,
        summary.skipped_seen,
        summary.filtered_out,
        summary.scored,
        summary.notified,
        summary.failed,
    )
}

/// Truncate at a word boundary so the channel's message cap is never hit.
fn excerpt(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let truncated = &text[..end];
    match truncated.rfind(char::is_whitespace) {
        Some(cut) if cut > 0 => format!("{}…", truncated[..cut].trim_end()),
        _ => format!("{}…", truncated),
    }
}
