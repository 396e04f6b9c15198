use std::sync::Arc;

use crate::llm_adapter::InferenceClient;
use crate::types::{DraftResult, Posting, Result, ScoreResult, ScoutError};

const SCORE_MAX_TOKENS: u32 = 300;
const DRAFT_MAX_TOKENS: u32 = 700;

/// Rates one admitted posting against the operator profile on the cheaper
/// scoring model. Judgments are per-run and never cached.
pub struct Scorer {
    llm: Arc<dyn InferenceClient>,
    model: String,
    profile: String,
}

impl Scorer {
    pub fn new(llm: Arc<dyn InferenceClient>, model: String, profile: String) -> Self {
        Self {
            llm,
            model,
            profile,
        }
    }

    pub async fn score(&self, posting: &Posting) -> Result<ScoreResult> {
        let prompt = score_prompt(posting, &self.profile);
        let text = self.llm.complete(&self.model, &prompt, SCORE_MAX_TOKENS).await?;
        parse_score_response(&text)
    }
}

/// Writes a proposal draft on the higher-quality drafting model. Only
/// invoked for postings at or above the score threshold.
pub struct Drafter {
    llm: Arc<dyn InferenceClient>,
    model: String,
    profile: String,
}

impl Drafter {
    pub fn new(llm: Arc<dyn InferenceClient>, model: String, profile: String) -> Self {
        Self {
            llm,
            model,
            profile,
        }
    }

    pub async fn draft(&self, posting: &Posting) -> Result<DraftResult> {
        let prompt = draft_prompt(posting, &self.profile);
        let text = self.llm.complete(&self.model, &prompt, DRAFT_MAX_TOKENS).await?;
        let proposal = text.trim();
        if proposal.is_empty() {
            return Err(ScoutError::EmptyDraftResponse);
        }
        Ok(DraftResult {
            proposal: proposal.to_string(),
        })
    }
}

fn score_prompt(posting: &Posting, profile: &str) -> String {
    let budget = posting
        .budget
        .as_ref()
        .map(|b| format!("{} {}", b.minimum, b.currency))
        .unwrap_or_else(|| "not stated".to_string());
    format!(
        "You are evaluating a freelance job posting for relevance.\n\n\
         My background:\n{profile}\n\n\
         Job:\n\
         Title: {title}\n\
         Description: {description}\n\
         Budget: {budget}\n\
         Skills: {skills}\n\n\
         Rate the match from 0 to 100.\n\
         Return JSON only: {{\"score\": <integer 0-100>, \"reason\": \"<short explanation>\"}}",
        profile = profile,
        title = posting.title,
        description = posting.description,
        budget = budget,
        skills = posting.skills.join(", "),
    )
}

fn draft_prompt(posting: &Posting, profile: &str) -> String {
    format!(
        "Write a concise, professional freelance proposal.\n\n\
         Job:\n\
         Title: {title}\n\
         Description: {description}\n\n\
         My background:\n{profile}\n\n\
         Rules:\n\
         - 5-7 sentences\n\
         - Mention the client's problem\n\
         - Explain the approach\n\
         - End with a simple next step",
        title = posting.title,
        description = posting.description,
        profile = profile,
    )
}

/// Parse the model's reply into a validated score. The reply is accepted
/// with code fences or surrounding prose, but the score itself must be an
/// integer in [0, 100]; anything else is rejected rather than clamped.
pub fn parse_score_response(text: &str) -> Result<ScoreResult> {
    let json = extract_json_object(text).ok_or_else(|| {
        ScoutError::InvalidScoreResponse("no JSON object in reply".to_string())
    })?;
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| ScoutError::InvalidScoreResponse(format!("unparseable reply: {}", e)))?;

    let score = match &value["score"] {
        serde_json::Value::Number(n) => integer_score(n)?,
        serde_json::Value::Null => {
            return Err(ScoutError::InvalidScoreResponse(
                "reply has no score field".to_string(),
            ))
        }
        other => {
            return Err(ScoutError::InvalidScoreResponse(format!(
                "score field is {}, not a number",
                other
            )))
        }
    };

    let rationale = value["reason"].as_str().unwrap_or("").trim().to_string();
    Ok(ScoreResult { score, rationale })
}

fn integer_score(n: &serde_json::Number) -> Result<u8> {
    let as_int = n
        .as_i64()
        .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64));
    match as_int {
        Some(v) if (0..=100).contains(&v) => Ok(v as u8),
        Some(v) => Err(ScoutError::InvalidScoreResponse(format!(
            "score {} outside 0-100",
            v
        ))),
        None => Err(ScoutError::InvalidScoreResponse(format!(
            "score {} is not an integer",
            n
        ))),
    }
}

fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}
