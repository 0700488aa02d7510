//! Prompt construction, grading, and label-logprob extraction.
//!
//! Grounded on `DatasetToRequestStrategy::get_prompt_from_row`/
//! `fill_req_from_row` and `utils.cpp`'s `guessed_correctly`/
//! `get_label_logprobs`/`filter_label_logprobs` (`original_source`).

use std::collections::HashMap;

use crate::completion::CompletionResults;
use crate::config::Config;
use crate::dataset::DatasetSource;
use crate::result::RequestParameters;

/// Builds the full prompt for one dataset row: the row's sentence
/// fields joined with `" | "` substituted into `pre_formatted_prompt`,
/// followed by a fixed "choose from the following" suffix naming the
/// configured label responses. Mirrors the two-stage `std::vformat`
/// calls in `get_prompt_from_row`.
pub fn build_prompt(cfg: &Config, row: &serde_json::Value) -> String {
    let sentences: Vec<String> = cfg
        .sentence_tags
        .iter()
        .map(|tag| row_field_as_string(row, tag))
        .collect();
    let possible_answers: Vec<&str> = cfg.class_label.values.iter().map(|v| v.response.as_str()).collect();

    let task = cfg.pre_formatted_prompt.replacen("{}", &sentences.join(" | "), 1);
    format!(
        "{task}\nPlease choose from the following choices: {}\n Answer: ",
        possible_answers.join(", ")
    )
}

fn row_field_as_string(row: &serde_json::Value, tag: &str) -> String {
    match row.get(tag) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// Builds one `RequestParameters` for dataset row `idx`, combining the
/// config's `request_params` defaults with the row's computed prompt
/// and golden label. Mirrors `fill_req_from_row`.
pub fn build_request(dataset: &dyn DatasetSource, idx: usize) -> RequestParameters {
    let cfg = dataset.config();
    let row = dataset.row(idx);
    let defaults = &cfg.request_params;

    RequestParameters {
        model: defaults.model.clone(),
        prompt: build_prompt(cfg, row),
        echo: defaults.echo,
        temperature: defaults.temperature,
        num_logprobs: defaults.num_logprobs,
        max_tokens: defaults.max_tokens,
        top_k: defaults.top_k,
        stream: defaults.stream,
        golden_label: row.get(&cfg.class_label.tag).cloned().unwrap_or(serde_json::Value::Null),
    }
}

fn trim_and_lower(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Pure function mapping the row's golden label and the first choice's
/// text to a correctness flag. Normalizes via trim+lowercase before
/// comparing against the configured label responses, mirroring
/// `guessed_correctly`.
pub fn grade(cfg: &Config, golden_label: &serde_json::Value, first_choice_text: &str) -> bool {
    let guess = trim_and_lower(first_choice_text);
    let guessed_id = cfg
        .class_label
        .values
        .iter()
        .find(|value| trim_and_lower(&value.response) == guess)
        .map(|value| value.id);

    match (guessed_id, golden_label_as_i64(golden_label)) {
        (Some(guessed), Some(golden)) => guessed == golden,
        _ => false,
    }
}

fn golden_label_as_i64(value: &serde_json::Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// One label response's best-matching logprob, chosen as in
/// `filter_label_logprobs`: the highest `top_logprobs` entry across all
/// tokens that case/whitespace-normalize to that response.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelLogprob {
    pub response: String,
    pub logprob: f32,
}

/// Extracts one logprob per configured label response from the first
/// `CompletionResults`' first choice, mirroring `get_label_logprobs`.
/// Returns `None` if the first choice carries no `logprobs`, or no
/// `top_logprobs` entry matches any configured response.
pub fn label_logprobs(cfg: &Config, first: &CompletionResults) -> Option<Vec<LabelLogprob>> {
    let choice = first.choices.first()?;
    let mut best: HashMap<String, f32> = HashMap::new();

    for top_logprob in &choice.logprobs.top_logprobs {
        for (token, logprob) in top_logprob {
            let normalized = trim_and_lower(token);
            for value in &cfg.class_label.values {
                if trim_and_lower(&value.response) == normalized {
                    best
                        .entry(value.response.clone())
                        .and_modify(|existing| {
                            if *logprob > *existing {
                                *existing = *logprob;
                            }
                        })
                        .or_insert(*logprob);
                }
            }
        }
    }

    if best.is_empty() {
        return None;
    }

    Some(
        cfg.class_label
            .values
            .iter()
            .filter_map(|v| best.get(&v.response).map(|lp| LabelLogprob { response: v.response.clone(), logprob: *lp }))
            .collect(),
    )
}
