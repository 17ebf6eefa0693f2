//! KVB Bench - Core Benchmark Machinery
//!
//! This crate provides the execution core of the harness:
//! - Deterministic seeded input generation
//! - The bundled CPU-bound key-derivation primitive behind its callback
//!   platform signature
//! - The three asynchronous wrapping styles under comparison
//! - The bounded-concurrency batch runner with per-call deadlines
//! - Nearest-rank percentile statistics and cross-variant ranking

#![forbid(unsafe_code)]

pub mod guard;
pub mod inputs;
pub mod kdf;
pub mod prng;
pub mod runner;
pub mod stats;
pub mod variants;

pub use guard::with_deadline;
pub use inputs::{InputGenerator, InputPair};
pub use kdf::{KdfRequest, derive_key_blocking, derive_key_callback, short_digest};
pub use prng::SeededSequence;
pub use runner::{run_batch, run_batch_with};
pub use stats::{BatchTally, Leaderboard, percentile, rank, summarize};
pub use variants::{KdfFuture, VariantDriver, promisify};
