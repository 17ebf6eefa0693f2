//! Error taxonomy.
//!
//! Task-level failures ([`TaskError`]) are absorbed inside the worker loop and
//! converted into recorded failures; they never abort a batch, a sibling
//! worker, or the process. Only [`ConfigError`] is fatal, and it surfaces
//! before any batch starts.

use thiserror::Error;

use crate::types::FailureKind;

/// Error surface of the key-derivation primitive.
///
/// Mirrors the platform contract: a message plus an optional machine-readable
/// code. Cloneable so a single failure can be both recorded and logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct KdfError {
    pub message: String,
    pub code: Option<String>,
}

impl KdfError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Per-task failure recorded by the batch runner.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The underlying invocation rejected.
    #[error("key derivation failed: {message}")]
    Primitive {
        message: String,
        code: Option<String>,
    },

    /// The per-call deadline elapsed before the invocation settled. The
    /// label identifies the variant and task index; the stale invocation is
    /// abandoned, not cancelled.
    #[error("{label} timed out after {deadline_ms}ms")]
    Timeout { label: String, deadline_ms: u64 },

    /// Sequential-mode double invocation produced differing outputs for
    /// identical input. Digests are truncated blake3 hex.
    #[error("derived keys diverged: first={first_digest} second={second_digest}")]
    Mismatch {
        first_digest: String,
        second_digest: String,
    },
}

impl TaskError {
    /// Classification used by the bounded error sample list.
    pub fn kind(&self) -> FailureKind {
        match self {
            TaskError::Primitive { .. } => FailureKind::Error,
            TaskError::Timeout { .. } => FailureKind::Timeout,
            TaskError::Mismatch { .. } => FailureKind::Mismatch,
        }
    }

    /// Machine-readable code, when the primitive supplied one.
    pub fn code(&self) -> Option<&str> {
        match self {
            TaskError::Primitive { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

impl From<KdfError> for TaskError {
    fn from(err: KdfError) -> Self {
        TaskError::Primitive {
            message: err.message,
            code: err.code,
        }
    }
}

/// Fatal configuration errors, raised by `RunConfig::validate`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("iterations must be positive")]
    ZeroIterations,

    #[error("at least one concurrency level is required")]
    EmptyConcurrency,

    #[error("concurrency levels must be positive (found 0 at position {position})")]
    ZeroConcurrency { position: usize },

    #[error("key length must be positive")]
    ZeroKeyLength,

    #[error("kdf rounds must be positive")]
    ZeroRounds,
}
