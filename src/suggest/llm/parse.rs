//! Decoding of free-form review responses
//!
//! Models are asked for a JSON object but often wrap it in prose or code
//! fences, or break it slightly. Decoding never fails: it either reads the
//! object ([`DecodeOutcome::Decoded`]) or wraps the raw text in a
//! placeholder result ([`DecodeOutcome::Fallback`]).

use crate::suggest::SuggestionResult;
use serde::Deserialize;
use tracing::{debug, warn};

pub const NO_IMPROVED_CODE: &str = "No improved code provided";
pub const NOT_ANALYZED: &str = "Not analyzed";
pub const NO_EXPLANATION: &str = "No explanation provided";
pub const UNPARSED_IMPROVED_CODE: &str = "Unable to parse improved code from response";
pub const MANUAL_REVIEW_HINT: &str = "Review the response manually for suggestions";

/// Result of decoding a model response
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    /// A JSON object was found and read; missing fields were defaulted
    Decoded(SuggestionResult),
    /// No usable object; the raw response is carried as the explanation
    Fallback(SuggestionResult),
}

impl DecodeOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self, DecodeOutcome::Fallback(_))
    }

    pub fn into_result(self) -> SuggestionResult {
        match self {
            DecodeOutcome::Decoded(result) | DecodeOutcome::Fallback(result) => result,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestionJson {
    improved_code: Option<String>,
    time_complexity: Option<String>,
    space_complexity: Option<String>,
    explanation: Option<String>,
    suggestions: Option<Vec<String>>,
}

impl SuggestionJson {
    fn into_result(self) -> SuggestionResult {
        SuggestionResult {
            improved_code: or_default(self.improved_code, NO_IMPROVED_CODE),
            time_complexity: or_default(self.time_complexity, NOT_ANALYZED),
            space_complexity: or_default(self.space_complexity, NOT_ANALYZED),
            explanation: or_default(self.explanation, NO_EXPLANATION),
            suggestions: self.suggestions.unwrap_or_default(),
        }
    }
}

fn or_default(value: Option<String>, default: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => default.to_string(),
    }
}

/// Placeholder result wrapping an unparseable response
pub fn fallback_result(response: &str) -> SuggestionResult {
    SuggestionResult {
        improved_code: UNPARSED_IMPROVED_CODE.to_string(),
        time_complexity: NOT_ANALYZED.to_string(),
        space_complexity: NOT_ANALYZED.to_string(),
        explanation: response.to_string(),
        suggestions: vec![MANUAL_REVIEW_HINT.to_string()],
    }
}

/// Extract a JSON fragment between matching delimiters.
///
/// Greedy: from the first `open` to the last `close`.
fn extract_json_fragment(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if start <= end {
        Some(&text[start..=end])
    } else {
        None
    }
}

/// Try to fix common JSON issues from LLM responses
fn fix_json_issues(json: &str) -> String {
    let mut fixed = json.to_string();

    // Remove trailing commas before ] or }
    fixed = fixed.replace(",]", "]");
    fixed = fixed.replace(",}", "}");

    // Smart quotes to regular quotes
    fixed = fixed.replace('\u{201C}', "\"");
    fixed = fixed.replace('\u{201D}', "\"");
    fixed = fixed.replace('\u{2018}', "'");
    fixed = fixed.replace('\u{2019}', "'");

    fixed
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Decode a model response into a suggestion result
pub fn decode_suggestion(response: &str) -> DecodeOutcome {
    let Some(fragment) = extract_json_fragment(response, '{', '}') else {
        debug!("response contains no JSON object; using fallback");
        return DecodeOutcome::Fallback(fallback_result(response));
    };

    let parsed = match serde_json::from_str::<SuggestionJson>(fragment) {
        Ok(parsed) => Ok(parsed),
        Err(strict_err) => {
            serde_json::from_str::<SuggestionJson>(&fix_json_issues(fragment)).map_err(|_| strict_err)
        }
    };

    match parsed {
        Ok(parsed) => DecodeOutcome::Decoded(parsed.into_result()),
        Err(e) => {
            warn!(error = %e, "failed to parse review response as JSON; using fallback");
            DecodeOutcome::Fallback(fallback_result(response))
        }
    }
}
