//! scale-bench: a concurrent load-testing and grading harness for
//! OpenAI-style `/completions` endpoints.
//!
//! The core is five components, leaves first: bounded lock-free ring
//! buffers ([`ring`]), a per-request streaming handle over one of them
//! ([`streaming`]), a pure SSE chunk framer ([`framer`]), a per-request
//! fan-out pipeline ([`pipeline`]), and the top-level job-dispatch
//! driver ([`driver`]). Everything else -- config loading, dataset
//! download, the HTTP transport, grading, and the CLI -- is an external
//! collaborator the core only knows through a trait.

pub mod cli;
pub mod completion;
pub mod config;
pub mod constants;
pub mod dataset;
pub mod driver;
pub mod error;
pub mod framer;
pub mod grade;
pub mod metrics;
pub mod pipeline;
pub mod result;
pub mod ring;
pub mod streaming;
pub mod transport;
mod wait;

pub use completion::CompletionResults;
pub use config::Config;
pub use error::{BenchError, Result};
pub use framer::{ChunkFramer, FramerEvent};
pub use metrics::{Diagnostics, FinalMetrics, Metrics};
pub use result::{RequestParameters, RequestResult};
pub use ring::{FetchOutcome, MpscRing, PushOutcome, SpmcRing};
pub use streaming::{LatencyMetrics, StreamingResponse};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
