use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::Posting;

/// Deterministic admission settings for one run.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub keywords: Vec<String>,
    pub min_budget: f64,
    pub require_payment_verified: bool,
}

/// The admission rules, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterRule {
    Keyword,
    Budget,
    PaymentVerified,
}

impl fmt::Display for FilterRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterRule::Keyword => "keyword",
            FilterRule::Budget => "budget",
            FilterRule::PaymentVerified => "payment-verified",
        };
        write!(f, "{}", name)
    }
}

/// Pass/fail plus the first rule that failed. Ephemeral, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterResult {
    pub passed: bool,
    pub failed_rule: Option<FilterRule>,
}

impl FilterResult {
    fn pass() -> Self {
        Self {
            passed: true,
            failed_rule: None,
        }
    }

    fn fail(rule: FilterRule) -> Self {
        Self {
            passed: false,
            failed_rule: Some(rule),
        }
    }
}

/// Evaluate the ordered rule chain over one posting. Rules short-circuit,
/// so the failing reason is always singular and deterministic. This runs
/// before any inference call is made.
pub fn evaluate(posting: &Posting, config: &FilterConfig) -> FilterResult {
    if !matches_keywords(posting, &config.keywords) {
        return FilterResult::fail(FilterRule::Keyword);
    }

    // A posting with no stated budget fails the rule rather than passing it.
    match posting.budget.as_ref() {
        Some(budget) if budget.minimum >= config.min_budget => {}
        _ => return FilterResult::fail(FilterRule::Budget),
    }

    if config.require_payment_verified && !posting.payment_verified {
        return FilterResult::fail(FilterRule::PaymentVerified);
    }

    FilterResult::pass()
}

fn matches_keywords(posting: &Posting, keywords: &[String]) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let haystack = format!(
        "{} {} {}",
        posting.title,
        posting.description,
        posting.skills.join(" ")
    )
    .to_lowercase();
    keywords
        .iter()
        .any(|keyword| haystack.contains(&keyword.to_lowercase()))
}
