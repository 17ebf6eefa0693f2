//! Core data model shared across the workspace.
//!
//! A [`RunConfig`] is built once per invocation, validated, and read-only
//! thereafter. Each (variant, concurrency) batch produces one [`BatchReport`]
//! that is never mutated after the batch completes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Per-call deadline applied to every primitive invocation (not configurable
/// from the CLI).
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Maximum number of error samples retained per batch. Every failure still
/// counts toward [`BatchReport::fail`].
pub const MAX_ERROR_SAMPLES: usize = 5;

/// Input-generation mode for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Inputs derived purely from the task index; every task is invoked twice
    /// and the two outputs are compared byte-for-byte.
    Sequential,
    /// Inputs drawn from a shared seeded stream; one invocation per task.
    /// Content depends on claim order, so this mode measures throughput only.
    Random,
}

impl Mode {
    /// Primitive invocations per iteration in this mode.
    pub fn calls_per_iteration(&self) -> u32 {
        match self {
            Mode::Sequential => 2,
            Mode::Random => 1,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Sequential => write!(f, "sequential"),
            Mode::Random => write!(f, "random"),
        }
    }
}

/// The three asynchronous wrapping styles under comparison.
///
/// The enumeration is closed; batches are reported in the order listed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariantKind {
    /// Raw callback invocation adapted into a future at the call site.
    Callback,
    /// The callback primitive run through a generic promisify combinator.
    Promisified,
    /// A hand-implemented future completed by the same callback primitive.
    ManualFuture,
}

impl VariantKind {
    /// All variants in fixed report order.
    pub const ALL: [VariantKind; 3] = [
        VariantKind::Callback,
        VariantKind::Promisified,
        VariantKind::ManualFuture,
    ];

    /// Stable label used in reports and timeout messages.
    pub fn label(&self) -> &'static str {
        match self {
            VariantKind::Callback => "callback",
            VariantKind::Promisified => "promisified",
            VariantKind::ManualFuture => "manual-future",
        }
    }
}

impl std::fmt::Display for VariantKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Opaque numeric cost options forwarded unmodified to the primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfOptions {
    /// Number of mixing rounds; the dominant cost knob.
    pub rounds: u32,
}

impl Default for KdfOptions {
    fn default() -> Self {
        Self { rounds: 60_000 }
    }
}

/// Immutable configuration for one CLI invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of tasks per batch.
    pub iterations: u32,
    /// Concurrency levels to sweep; one batch per value, in order.
    pub concurrency: Vec<usize>,
    /// Input-generation mode.
    pub mode: Mode,
    /// Derived key length in bytes.
    pub key_length: usize,
    /// Cost options forwarded to the primitive.
    pub options: KdfOptions,
    /// Seed for the deterministic sequence generator.
    pub seed: u32,
    /// Per-call deadline in milliseconds.
    pub timeout_ms: u64,
}

impl RunConfig {
    /// Build a config with the fixed per-call deadline.
    pub fn new(
        iterations: u32,
        concurrency: Vec<usize>,
        mode: Mode,
        key_length: usize,
        options: KdfOptions,
        seed: u32,
    ) -> Self {
        Self {
            iterations,
            concurrency,
            mode,
            key_length,
            options,
            seed,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Validate the configuration. This is the single fatal gate; it runs
    /// before any batch starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        if self.concurrency.is_empty() {
            return Err(ConfigError::EmptyConcurrency);
        }
        if let Some(position) = self.concurrency.iter().position(|&c| c == 0) {
            return Err(ConfigError::ZeroConcurrency { position });
        }
        if self.key_length == 0 {
            return Err(ConfigError::ZeroKeyLength);
        }
        if self.options.rounds == 0 {
            return Err(ConfigError::ZeroRounds);
        }
        Ok(())
    }
}

/// Classification of a recorded task failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// The primitive invocation rejected.
    Error,
    /// The per-call deadline elapsed first.
    Timeout,
    /// Sequential-mode double invocation diverged.
    Mismatch,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Error => write!(f, "error"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Mismatch => write!(f, "mismatch"),
        }
    }
}

/// One entry of the bounded per-batch error sample list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorSample {
    /// Task index the failure belongs to.
    pub index: u32,
    #[serde(rename = "type")]
    pub kind: FailureKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Final record for one (variant, concurrency) batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub variant: VariantKind,
    pub concurrency: usize,
    pub iterations: u32,
    /// Tasks that completed successfully.
    pub ok: u32,
    /// Tasks that failed (error, timeout, or mismatch).
    pub fail: u32,
    /// Wall-clock time from before the first worker spawn to after the join.
    pub total_ms: f64,
    /// `ok / total_seconds`.
    pub iterations_per_sec: f64,
    /// `(ok + fail) * calls_per_iteration / total_seconds`.
    pub calls_per_sec: f64,
    /// Number of collected call-latency samples.
    pub samples: usize,
    #[serde(with = "nan_as_null")]
    pub p50_ms: f64,
    #[serde(with = "nan_as_null")]
    pub p90_ms: f64,
    #[serde(with = "nan_as_null")]
    pub p99_ms: f64,
    /// Bounded error sample list (cap [`MAX_ERROR_SAMPLES`]).
    pub errors: Vec<ErrorSample>,
    pub finished_at: DateTime<Utc>,
}

/// Serialize non-finite floats (the empty-percentile sentinel) as JSON null.
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> RunConfig {
        RunConfig::new(
            10,
            vec![1, 4],
            Mode::Sequential,
            64,
            KdfOptions::default(),
            42,
        )
    }

    #[test]
    fn test_validate_accepts_sane_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_fields() {
        let mut config = valid_config();
        config.iterations = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroIterations)
        ));

        let mut config = valid_config();
        config.concurrency.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyConcurrency)
        ));

        let mut config = valid_config();
        config.concurrency = vec![2, 0];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroConcurrency { position: 1 })
        ));

        let mut config = valid_config();
        config.key_length = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroKeyLength)));

        let mut config = valid_config();
        config.options.rounds = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroRounds)));
    }

    #[test]
    fn test_new_pins_default_timeout() {
        assert_eq!(valid_config().timeout_ms, DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn test_calls_per_iteration() {
        assert_eq!(Mode::Sequential.calls_per_iteration(), 2);
        assert_eq!(Mode::Random.calls_per_iteration(), 1);
    }

    #[test]
    fn test_variant_order_and_labels() {
        let labels: Vec<&str> = VariantKind::ALL.iter().map(|v| v.label()).collect();
        assert_eq!(labels, vec!["callback", "promisified", "manual-future"]);
    }

    #[test]
    fn test_report_serde_roundtrip() {
        let report = BatchReport {
            variant: VariantKind::Promisified,
            concurrency: 4,
            iterations: 100,
            ok: 99,
            fail: 1,
            total_ms: 1234.5,
            iterations_per_sec: 80.2,
            calls_per_sec: 160.4,
            samples: 199,
            p50_ms: 10.0,
            p90_ms: 20.0,
            p99_ms: 30.0,
            errors: vec![ErrorSample {
                index: 7,
                kind: FailureKind::Timeout,
                message: "promisified #7 timed out after 60000ms".to_string(),
                code: None,
            }],
            finished_at: Utc::now(),
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"variant\":\"promisified\""));
        assert!(json.contains("\"type\":\"timeout\""));
        let parsed: BatchReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.ok, 99);
        assert_eq!(parsed.errors.len(), 1);
    }

    #[test]
    fn test_nan_percentiles_serialize_as_null() {
        let report = BatchReport {
            variant: VariantKind::Callback,
            concurrency: 1,
            iterations: 1,
            ok: 0,
            fail: 1,
            total_ms: 5.0,
            iterations_per_sec: 0.0,
            calls_per_sec: 200.0,
            samples: 0,
            p50_ms: f64::NAN,
            p90_ms: f64::NAN,
            p99_ms: f64::NAN,
            errors: vec![],
            finished_at: Utc::now(),
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"p50_ms\":null"));
        let parsed: BatchReport = serde_json::from_str(&json).unwrap();
        assert!(parsed.p50_ms.is_nan());
    }
}
