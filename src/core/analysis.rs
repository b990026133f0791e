//! # Utterance Analysis
//!
//! Builds the self-assessment prompt for the user's last utterance and turns
//! the model's free-form answer into a validated [`AnalysisResult`].
//!
//! Models often wrap the requested JSON in commentary, so extraction looks
//! for the first balanced `{...}` span rather than parsing the whole text.
//! Anything short of a complete, in-range score is rejected as a whole;
//! callers fall back to [`Score::DEFAULT`].

use std::fmt;

use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;

use crate::inference::{AnalysisResult, ConversationTurn, Correction, Score};

const ANALYSIS_DIRECTIVE: &str =
    "You are an expert British English teacher. Respond only in valid JSON format.";

/// Why an analysis completion could not be used.
#[derive(Debug, PartialEq)]
pub enum AnalysisError {
    /// No balanced `{...}` span in the text.
    NoJsonObject,
    /// A span was found but is not valid JSON.
    InvalidJson(String),
    /// The object has no `score` member.
    MissingScore,
    /// `score` is present but incomplete, non-integer or out of range.
    InvalidScore(String),
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::NoJsonObject => write!(f, "no JSON object in analysis output"),
            AnalysisError::InvalidJson(msg) => write!(f, "invalid analysis JSON: {msg}"),
            AnalysisError::MissingScore => write!(f, "analysis JSON has no score"),
            AnalysisError::InvalidScore(msg) => write!(f, "invalid score: {msg}"),
        }
    }
}

impl std::error::Error for AnalysisError {}

/// Turns for the analysis call: a fixed teacher directive plus the
/// instruction template with `utterance` embedded.
pub fn analysis_turns(utterance: &str) -> Vec<ConversationTurn> {
    vec![
        ConversationTurn::system(ANALYSIS_DIRECTIVE),
        ConversationTurn::user(analysis_prompt(utterance)),
    ]
}

fn analysis_prompt(utterance: &str) -> String {
    format!(
        r#"Analyze this English sentence: "{utterance}"

Rules:
- If the sentence is CORRECT, set "corrected" to the same as "original" and "explanation" to empty string ""
- Only provide corrections if there are actual mistakes
- Keep explanations brief (one sentence max)

Respond in JSON format:
{{
  "correction": {{
    "original": "original text",
    "corrected": "corrected text or same as original if perfect",
    "explanation": "brief explanation or empty string if perfect"
  }},
  "score": {{
    "pronunciation": 85,
    "fluency": 80,
    "accuracy": 90,
    "overall": 85
  }}
}}"#
    )
}

/// Returns the first balanced `{...}` span in `text`.
///
/// Starts at the first `{` and counts depth until it returns to zero.
/// Braces inside string literals don't count. Returns `None` if that first
/// object never closes.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

#[derive(Deserialize, Debug)]
struct RawAnalysis {
    #[serde(default)]
    correction: Value,
    #[serde(default)]
    score: Value,
}

/// Parses an analysis completion into a validated result.
pub fn parse_analysis(raw: &str) -> Result<AnalysisResult, AnalysisError> {
    let span = extract_json_object(raw).ok_or(AnalysisError::NoJsonObject)?;
    let analysis: RawAnalysis =
        serde_json::from_str(span).map_err(|e| AnalysisError::InvalidJson(e.to_string()))?;

    let score = parse_score(analysis.score)?;
    let correction = parse_correction(analysis.correction);

    Ok(AnalysisResult { correction, score })
}

fn parse_score(value: Value) -> Result<Score, AnalysisError> {
    if value.is_null() {
        return Err(AnalysisError::MissingScore);
    }
    let score: Score =
        serde_json::from_value(value).map_err(|e| AnalysisError::InvalidScore(e.to_string()))?;
    if let Some(field) = score.out_of_range_field() {
        return Err(AnalysisError::InvalidScore(format!(
            "{field} is above {}",
            Score::MAX
        )));
    }
    Ok(score)
}

/// A missing or null correction means none was offered. A malformed one is
/// dropped without invalidating the score.
fn parse_correction(value: Value) -> Option<Correction> {
    if value.is_null() {
        return None;
    }
    match serde_json::from_value(value) {
        Ok(correction) => Some(correction),
        Err(e) => {
            warn!("Dropping malformed correction from analysis: {}", e);
            None
        }
    }
}

/// Parses an analysis completion, falling back to the default result on any failure.
pub fn analyze_or_default(raw: &str) -> AnalysisResult {
    match parse_analysis(raw) {
        Ok(result) => {
            debug!(
                "Analysis validated (actionable correction: {}): {:?}",
                result.actionable_correction().is_some(),
                result
            );
            result
        }
        Err(e) => {
            warn!("Malformed analysis, using default score: {}", e);
            debug!("Unparseable analysis output: {}", raw);
            AnalysisResult::defaulted()
        }
    }
}
