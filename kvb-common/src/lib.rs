//! KVB - Common Library
//!
//! Shared types, error taxonomy, and logging initialization used by the
//! benchmark core (`kvb-bench`) and the CLI (`kvb`).

#![forbid(unsafe_code)]

pub mod errors;
pub mod logging;
pub mod types;

pub use errors::{ConfigError, KdfError, TaskError};
pub use logging::{LogConfig, LogFormat, init_logging};
pub use types::{
    BatchReport, DEFAULT_TIMEOUT_MS, ErrorSample, FailureKind, KdfOptions, MAX_ERROR_SAMPLES,
    Mode, RunConfig, VariantKind,
};
