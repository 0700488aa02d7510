//! Dataset source contract and the HuggingFace dataset-server downloader.
//!
//! Grounded on `HFDatasetParser` (`benchmark_types.hpp`/`.cpp`): page
//! through the dataset-server's `rows` endpoint, retry a failed page
//! with backoff, and stop once `max_rows` rows have been collected.

use std::thread;
use std::time::Duration;

use anyhow::Context;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::constants::{
    DATASET_MAX_FAILED_REQUESTS, DATASET_MS_BETWEEN_QUERIES, DATASET_RETRY_BACKOFF_SECS,
    DATASET_ROWS_PER_QUERY,
};
use crate::error::{BenchError, Result};

/// Read-only, thread-safe view over a downloaded dataset plus the
/// config that describes how to build a prompt/golden-label from each
/// row.
pub trait DatasetSource: Send + Sync {
    fn size(&self) -> usize;
    fn row(&self, idx: usize) -> &Value;
    fn config(&self) -> &Config;
}

/// A dataset already fully materialized in memory. Pages from the
/// HuggingFace dataset-server before the run starts; the driver only
/// ever sees the `DatasetSource` trait.
pub struct HfDatasetSource {
    rows: Vec<Value>,
    config: Config,
}

const DATASET_SERVER_URL: &str = "https://datasets-server.huggingface.co/rows";

impl HfDatasetSource {
    /// Downloads up to `max_rows` rows, paging `rows_per_query` at a
    /// time. Mirrors `HFDatasetParser::download`: a failed page is
    /// retried up to `DATASET_MAX_FAILED_REQUESTS` times with a fixed
    /// backoff before the whole download is treated as fatal.
    pub fn download(client: &reqwest::blocking::Client, config: Config, max_rows: usize) -> Result<Self> {
        let mut rows = Vec::with_capacity(max_rows);
        let mut offset = 0usize;
        let mut failed_requests = 0u32;

        while rows.len() < max_rows {
            let url = format!(
                "{DATASET_SERVER_URL}?dataset={}&config={}&split={}&offset={}",
                config.dataset.tag, config.dataset.subset, config.dataset.split, offset
            );

            match fetch_page(client, &url) {
                Ok(page_rows) if !page_rows.is_empty() => {
                    failed_requests = 0;
                    offset += DATASET_ROWS_PER_QUERY;
                    rows.extend(page_rows);
                }
                Ok(_) => {
                    // Empty `rows` array: dataset server has nothing
                    // more to give us.
                    break;
                }
                Err(err) => {
                    failed_requests += 1;
                    if failed_requests >= DATASET_MAX_FAILED_REQUESTS {
                        return Err(BenchError::dataset_unavailable(err.to_string()));
                    }
                    warn!(failed_requests, error = %err, "dataset page fetch failed, retrying after backoff");
                    thread::sleep(Duration::from_secs(DATASET_RETRY_BACKOFF_SECS));
                    continue;
                }
            }

            thread::sleep(Duration::from_millis(DATASET_MS_BETWEEN_QUERIES));
        }

        rows.truncate(max_rows);
        info!(rows = rows.len(), "dataset download complete");
        Ok(Self { rows, config })
    }
}

/// Internal, ad-hoc error path for one page fetch; `download` collapses
/// it into `BenchError::DatasetUnavailable` once the retry budget is
/// exhausted, so the richer `anyhow::Error` context never needs to
/// cross the library's public boundary.
fn fetch_page(client: &reqwest::blocking::Client, url: &str) -> anyhow::Result<Vec<Value>> {
    let response = client.get(url).send().context("dataset-server request failed")?;
    let body: Value = response.json().context("dataset-server response was not valid JSON")?;
    let rows = body
        .get("rows")
        .and_then(Value::as_array)
        .context("dataset-server response had no 'rows' array")?;
    debug!(page_rows = rows.len(), "fetched dataset page");
    Ok(rows
        .iter()
        .map(|entry| entry.get("row").cloned().unwrap_or(Value::Null))
        .collect())
}

impl DatasetSource for HfDatasetSource {
    fn size(&self) -> usize {
        self.rows.len()
    }

    fn row(&self, idx: usize) -> &Value {
        &self.rows[idx]
    }

    fn config(&self) -> &Config {
        &self.config
    }
}

/// An in-memory dataset, for tests and for the `FakeTransport` end-to-end
/// scenarios.
pub struct StaticDatasetSource {
    rows: Vec<Value>,
    config: Config,
}

impl StaticDatasetSource {
    pub fn new(rows: Vec<Value>, config: Config) -> Self {
        Self { rows, config }
    }
}

impl DatasetSource for StaticDatasetSource {
    fn size(&self) -> usize {
        self.rows.len()
    }

    fn row(&self, idx: usize) -> &Value {
        &self.rows[idx]
    }

    fn config(&self) -> &Config {
        &self.config
    }
}
