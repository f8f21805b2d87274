//! Translate selected string fields of JSON and JSON Lines documents with a
//! language model, keeping every other byte of structure intact.

pub mod batch;
pub mod config;
pub mod documents;
pub mod error;
pub mod fields;
pub mod gemini;
pub mod metrics;
pub mod model;
pub mod openai;
pub mod pipeline;
pub mod prompts;
pub mod retry;
pub mod review;
pub mod translation;

pub use config::Config;
pub use error::{ConfigError, ModelError, PipelineError};
pub use metrics::RunReport;
pub use pipeline::Pipeline;
