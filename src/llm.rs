//! Natural-language sequence editing via a blocking HTTP call to an LLM
//! vendor, following the request/response shape of a voice-dictation
//! correction client: a small blocking client, a JSON body, and permissive
//! response parsing.

use crate::model::{Sequence, REQUIRED_SEQUENCE_KEYS};
use log::{debug, warn};
use std::fmt;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const SCHEMA_PREAMBLE: &str = r#"You are editing a musical sequence represented as JSON with this schema:
{"name": string, "bpm": int, "time_sig_num": int, "time_sig_den": int, "key": string,
 "notes": [{"pitch": string, "duration": number, "beat": number,
            "note_type": "whole"|"half"|"quarter"|"eighth"|"sixteenth",
            "instrument": 0|1, "sample_bank": string|null}]}
Respond with the complete updated sequence as a single JSON object matching this schema,
optionally wrapped in a ```json fenced block. Do not include any other commentary."#;

#[derive(Debug)]
pub enum LlmError {
    NotConfigured,
    Timeout,
    Transport(String),
    EmptyResponse,
    MalformedJson(String),
    MissingKeys(Vec<&'static str>),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::NotConfigured => write!(f, "no LLM API key configured"),
            LlmError::Timeout => write!(f, "LLM request timed out"),
            LlmError::Transport(e) => write!(f, "LLM transport error: {e}"),
            LlmError::EmptyResponse => write!(f, "LLM returned an empty response"),
            LlmError::MalformedJson(e) => write!(f, "LLM response was not valid JSON: {e}"),
            LlmError::MissingKeys(keys) => {
                write!(f, "LLM response missing required keys: {}", keys.join(", "))
            }
        }
    }
}

impl std::error::Error for LlmError {}

/// An inclusive note-index range an instruction is scoped to.
#[derive(Debug, Clone, Copy)]
pub struct EditRange {
    pub start: usize,
    pub end: usize,
}

pub struct GeminiClient {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Result<Self, LlmError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;
        Ok(Self { client, api_key, model })
    }

    fn endpoint(&self) -> String {
        format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        )
    }

    fn build_prompt(current: &Sequence, instruction: &str, range: Option<EditRange>) -> String {
        let current_json = serde_json::to_string(current).unwrap_or_default();
        let range_clause = match range {
            Some(r) => format!(
                "\nYou may only change notes at indices {}..={} (inclusive); every other note must be returned byte-for-byte unchanged and the total note count must not change.",
                r.start, r.end
            ),
            None => String::new(),
        };
        format!(
            "{SCHEMA_PREAMBLE}\n\nCurrent sequence:\n{current_json}\n\nInstruction: {instruction}{range_clause}"
        )
    }

    /// Calls the LLM and parses its response into a candidate [`Sequence`].
    /// Does not enforce range equality against the pre-state — that is the
    /// caller's responsibility once it has both states in hand.
    pub fn edit_sequence(
        &self,
        current: &Sequence,
        instruction: &str,
        range: Option<EditRange>,
    ) -> Result<Sequence, LlmError> {
        let prompt = Self::build_prompt(current, instruction, range);
        let body = serde_json::json!({
            "contents": [{"parts": [{"text": prompt}]}]
        });

        let resp = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Transport(e.to_string())
                }
            })?;

        let raw: serde_json::Value = resp.json().map_err(|e| LlmError::Transport(e.to_string()))?;
        let text = raw["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .unwrap_or("")
            .to_string();

        Self::parse_response(&text)
    }

    /// Extracts a JSON object from either a bare object or a ```json fenced
    /// block, then validates the schema's required keys.
    fn parse_response(text: &str) -> Result<Sequence, LlmError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        let candidate = extract_json_object(trimmed);
        let value: serde_json::Value =
            serde_json::from_str(candidate).map_err(|e| LlmError::MalformedJson(e.to_string()))?;

        let missing: Vec<&'static str> = REQUIRED_SEQUENCE_KEYS
            .iter()
            .filter(|k| value.get(**k).is_none())
            .copied()
            .collect();
        if !missing.is_empty() || value.get("notes").is_none() {
            let mut missing = missing;
            if value.get("notes").is_none() {
                missing.push("notes");
            }
            return Err(LlmError::MissingKeys(missing));
        }

        serde_json::from_value(value).map_err(|e| LlmError::MalformedJson(e.to_string()))
    }
}

/// Pulls the JSON object out of a possibly-fenced LLM response: prefer a
/// ```json ... ``` block, otherwise the substring from the first `{` to the
/// last `}`.
fn extract_json_object(text: &str) -> &str {
    if let Some(fence_start) = text.find("```json") {
        let after = &text[fence_start + 7..];
        if let Some(fence_end) = after.find("```") {
            return after[..fence_end].trim();
        }
    }
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            return &text[start..=end];
        }
    }
    text
}

pub fn log_edit_attempt(instruction: &str, range: Option<EditRange>) {
    match range {
        Some(r) => debug!("speech edit, range [{}..{}]: {}", r.start, r.end, instruction),
        None => debug!("speech edit, unscoped: {}", instruction),
    }
}

pub fn log_edit_failure(err: &LlmError) {
    warn!("speech edit failed: {err}");
}
