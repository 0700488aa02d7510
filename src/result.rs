//! Per-request parameter and result types.
//!
//! `RequestParameters` is handed from the driver to the transport;
//! `RequestResult` is assembled by the pipeline and moved into the
//! results ring. Grounded on `request_parameters.hpp`/`result_types.hpp`,
//! generalized so every field comes from the config's `request_params`
//! block rather than being hardcoded per benchmark.

use serde::Serialize;
use serde_json::Value;

use crate::completion::CompletionResults;
use crate::streaming::LatencyMetrics;

/// One outbound request's parameters, config-driven rather than
/// hardcoded per benchmark.
#[derive(Debug, Clone, Serialize)]
pub struct RequestParameters {
    pub model: String,
    pub prompt: String,
    pub echo: bool,
    pub temperature: f64,
    #[serde(rename = "logprobs")]
    pub num_logprobs: u32,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<i64>,
    pub stream: bool,
    /// The dataset row's annotated correct-answer id. Not sent to the
    /// transport; carried alongside the request for grading once a
    /// response comes back.
    #[serde(skip)]
    pub golden_label: Value,
}

impl RequestParameters {
    /// The JSON body posted to the completions endpoint. `golden_label`
    /// never leaves the process.
    pub fn to_request_body(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

/// One completed request, assembled once by the pipeline and consumed
/// once by the writer.
#[derive(Debug, Clone)]
pub struct RequestResult {
    pub params: RequestParameters,
    pub completion_results: Vec<CompletionResults>,
    pub latencies: LatencyMetrics,
    pub guessed_correctly: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params() -> RequestParameters {
        RequestParameters {
            model: "gpt-3.5-turbo-instruct".to_string(),
            prompt: "Is this sentence ok?\nAnswer:".to_string(),
            echo: false,
            temperature: 0.0,
            num_logprobs: 5,
            max_tokens: 1,
            top_k: None,
            stream: true,
            golden_label: Value::from(1),
        }
    }

    #[test]
    fn golden_label_is_excluded_from_request_body() {
        let params = sample_params();
        let body = params.to_request_body().unwrap();
        assert!(body.get("golden_label").is_none());
        assert_eq!(body["model"], "gpt-3.5-turbo-instruct");
        assert_eq!(body["logprobs"], 5);
    }

    #[test]
    fn top_k_omitted_when_absent() {
        let params = sample_params();
        let body = params.to_request_body().unwrap();
        assert!(body.get("top_k").is_none());
    }

    #[test]
    fn top_k_present_when_set() {
        let mut params = sample_params();
        params.top_k = Some(40);
        let body = params.to_request_body().unwrap();
        assert_eq!(body["top_k"], 40);
    }
}
