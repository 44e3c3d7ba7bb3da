//! Extracting the JSON payload from generative-service text.

use serde::de::DeserializeOwned;

use crate::domain::PipelineError;

/// Trim the response and drop a surrounding Markdown code fence
/// (```` ```json ```` or a bare ```` ``` ````), if any.
pub fn strip_fences(raw: &str) -> &str {
    let text = raw.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Strip fences and parse; failures keep the cleaned content for diagnosis.
pub fn parse_json<T: DeserializeOwned>(what: &'static str, raw: &str) -> Result<T, PipelineError> {
    let cleaned = strip_fences(raw);
    serde_json::from_str(cleaned).map_err(|e| PipelineError::MalformedResponse {
        what,
        reason: e.to_string(),
        content: cleaned.to_string(),
    })
}
