//! Completion API response types.
//!
//! Mirrors the shape of one `data: { ... }` SSE payload as emitted by an
//! OpenAI-style completions endpoint. `serde`-derived rather than
//! hand-parsed field-by-field the way the harness this crate descends
//! from does it with `nlohmann::json`.

use std::collections::HashMap;

use serde::Deserialize;

pub type TopLogprobs = Vec<HashMap<String, f32>>;

#[derive(Debug, Clone, Deserialize)]
pub struct Logprobs {
    pub tokens: Vec<String>,
    pub token_logprobs: Vec<f32>,
    pub top_logprobs: TopLogprobs,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub finish_reason: String,
    pub text: String,
    pub index: i32,
    pub logprobs: Logprobs,
}

/// One decoded completion chunk. A single streamed response may yield
/// several of these in sequence; the pipeline's grading step only ever
/// looks at the first one it sees.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResults {
    pub id: String,
    pub object: String,
    pub created: i64,
    #[serde(default = "default_model")]
    pub model: String,
    pub choices: Vec<Choice>,
}

fn default_model() -> String {
    "N/A".to_string()
}

impl CompletionResults {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// True if every choice carries empty text. A chunk that fails this
    /// check is kept; one that passes it is discarded by the pipeline.
    pub fn all_choices_empty(&self) -> bool {
        !self.choices.is_empty() && self.choices.iter().all(|c| c.text.is_empty())
    }

    pub fn first_choice_text(&self) -> Option<&str> {
        self.choices.first().map(|c| c.text.as_str())
    }
}
