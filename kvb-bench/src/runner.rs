//! The concurrent batch runner.
//!
//! One batch drains a fixed queue of task indices with exactly `C` spawned
//! workers. Each worker independently claims an index, generates inputs,
//! invokes the variant through the deadline guard, and records the outcome in
//! a shared tally. Task failures of any kind are absorbed per-task; nothing a
//! task does can abort a sibling worker or the batch. The batch completes
//! when the queue is empty and all workers have joined.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use kvb_common::{BatchReport, Mode, RunConfig, TaskError, VariantKind};
use tracing::{debug, info, warn};

use crate::guard::with_deadline;
use crate::inputs::InputGenerator;
use crate::kdf::{KdfRequest, short_digest};
use crate::stats::{self, BatchTally};
use crate::variants::VariantDriver;

/// Shared claim-one task queue.
///
/// Removal is a single indivisible, non-suspending step; no two workers can
/// observe the same index.
struct TaskQueue {
    indices: Mutex<VecDeque<u32>>,
}

impl TaskQueue {
    fn new(iterations: u32) -> Self {
        Self {
            indices: Mutex::new((0..iterations).collect()),
        }
    }

    fn claim(&self) -> Option<u32> {
        self.indices.lock().expect("task queue lock").pop_front()
    }
}

/// Everything a worker needs, shared across all workers of one batch.
struct BatchContext {
    driver: Arc<dyn VariantDriver>,
    variant: VariantKind,
    config: RunConfig,
    queue: TaskQueue,
    inputs: InputGenerator,
    tally: Mutex<BatchTally>,
    completed: AtomicU32,
    progress_every: u32,
}

/// Run one batch for a real variant at one concurrency level.
pub async fn run_batch(
    variant: VariantKind,
    concurrency: usize,
    config: &RunConfig,
) -> BatchReport {
    run_batch_with(Arc::new(variant), variant, concurrency, config).await
}

/// Run one batch through an explicit driver.
///
/// `variant` is only used for reporting and timeout labels; the driver seam
/// lets tests substitute fault-injecting primitives.
pub async fn run_batch_with(
    driver: Arc<dyn VariantDriver>,
    variant: VariantKind,
    concurrency: usize,
    config: &RunConfig,
) -> BatchReport {
    info!(
        variant = %variant,
        concurrency,
        iterations = config.iterations,
        mode = %config.mode,
        "starting batch"
    );

    let ctx = Arc::new(BatchContext {
        driver,
        variant,
        config: config.clone(),
        queue: TaskQueue::new(config.iterations),
        inputs: InputGenerator::new(config.mode, config.seed),
        tally: Mutex::new(BatchTally::default()),
        completed: AtomicU32::new(0),
        progress_every: (config.iterations / 10).max(1),
    });

    // Wall clock spans from before the first spawn to after the join.
    let started = Instant::now();
    let mut handles = Vec::with_capacity(concurrency);
    for worker in 0..concurrency {
        let ctx = ctx.clone();
        handles.push(tokio::spawn(async move { worker_loop(worker, &ctx).await }));
    }
    for handle in handles {
        if let Err(err) = handle.await {
            // Task errors never panic a worker; this only fires on runtime
            // shutdown or an unexpected panic, and the batch still reports.
            warn!(variant = %variant, error = %err, "worker join failed");
        }
    }
    let wall = started.elapsed();

    let tally = std::mem::take(&mut *ctx.tally.lock().expect("batch tally lock"));
    let report = stats::summarize(variant, concurrency, config, tally, wall);
    info!(
        variant = %variant,
        concurrency,
        ok = report.ok,
        fail = report.fail,
        total_ms = %format!("{:.1}", report.total_ms),
        "batch complete"
    );
    report
}

async fn worker_loop(worker: usize, ctx: &BatchContext) {
    debug!(worker, variant = %ctx.variant, "worker started");
    while let Some(index) = ctx.queue.claim() {
        run_task(index, ctx).await;
        let done = ctx.completed.fetch_add(1, Ordering::Relaxed) + 1;
        if done % ctx.progress_every == 0 {
            info!(
                variant = %ctx.variant,
                processed = done,
                total = ctx.config.iterations,
                "batch progress"
            );
        }
    }
    debug!(worker, variant = %ctx.variant, "worker drained");
}

async fn run_task(index: u32, ctx: &BatchContext) {
    let pair = ctx.inputs.pair_for(index);

    match ctx.config.mode {
        Mode::Random => {
            let label = format!("{} #{index}", ctx.variant);
            match timed_call(ctx, &label, pair.primary, pair.secondary).await {
                Ok((_key, elapsed_ms)) => {
                    let mut tally = ctx.tally.lock().expect("batch tally lock");
                    tally.push_latency(elapsed_ms);
                    tally.record_success();
                }
                Err(err) => record_failure(ctx, index, err),
            }
        }
        Mode::Sequential => {
            // Inputs are index-derived here, so the second call reuses the
            // same pair and the outputs must agree byte-for-byte.
            let first = match timed_call(
                ctx,
                &format!("{} #{index} call 1", ctx.variant),
                pair.primary.clone(),
                pair.secondary.clone(),
            )
            .await
            {
                Ok((key, elapsed_ms)) => {
                    ctx.tally
                        .lock()
                        .expect("batch tally lock")
                        .push_latency(elapsed_ms);
                    key
                }
                Err(err) => {
                    record_failure(ctx, index, err);
                    return;
                }
            };

            let second = match timed_call(
                ctx,
                &format!("{} #{index} call 2", ctx.variant),
                pair.primary,
                pair.secondary,
            )
            .await
            {
                Ok((key, elapsed_ms)) => {
                    ctx.tally
                        .lock()
                        .expect("batch tally lock")
                        .push_latency(elapsed_ms);
                    key
                }
                Err(err) => {
                    record_failure(ctx, index, err);
                    return;
                }
            };

            if first == second {
                ctx.tally.lock().expect("batch tally lock").record_success();
            } else {
                let err = TaskError::Mismatch {
                    first_digest: short_digest(&first),
                    second_digest: short_digest(&second),
                };
                record_failure(ctx, index, err);
            }
        }
    }
}

/// One guarded invocation with elapsed-time measurement. Returns the derived
/// key and the call latency in milliseconds.
async fn timed_call(
    ctx: &BatchContext,
    label: &str,
    primary: Vec<u8>,
    secondary: Vec<u8>,
) -> Result<(Vec<u8>, f64), TaskError> {
    let request = KdfRequest {
        primary,
        secondary,
        key_length: ctx.config.key_length,
        options: ctx.config.options,
    };
    let deadline = Duration::from_millis(ctx.config.timeout_ms);
    let started = Instant::now();
    let result = with_deadline(ctx.driver.invoke(request), deadline, label).await;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    result.map(|key| (key, elapsed_ms))
}

fn record_failure(ctx: &BatchContext, index: u32, err: TaskError) {
    debug!(variant = %ctx.variant, index, error = %err, "task failed");
    ctx.tally
        .lock()
        .expect("batch tally lock")
        .record_failure(index, &err);
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvb_common::KdfOptions;

    fn quick_config(iterations: u32, mode: Mode) -> RunConfig {
        RunConfig::new(
            iterations,
            vec![1],
            mode,
            32,
            KdfOptions { rounds: 50 },
            42,
        )
    }

    #[test]
    fn test_queue_claims_each_index_once() {
        let queue = TaskQueue::new(16);
        let mut seen = Vec::new();
        while let Some(index) = queue.claim() {
            seen.push(index);
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..16).collect::<Vec<u32>>());
        assert!(queue.claim().is_none());
    }

    #[tokio::test]
    async fn test_sequential_batch_with_real_variant() {
        let config = quick_config(4, Mode::Sequential);
        let report = run_batch(VariantKind::Callback, 2, &config).await;
        assert_eq!(report.ok, 4);
        assert_eq!(report.fail, 0);
        assert_eq!(report.ok + report.fail, config.iterations);
        assert_eq!(report.samples, 8);
        assert!(report.errors.is_empty());
        assert!(report.p50_ms.is_finite());
    }

    #[tokio::test]
    async fn test_random_batch_with_real_variant() {
        let config = quick_config(8, Mode::Random);
        let report = run_batch(VariantKind::ManualFuture, 4, &config).await;
        assert_eq!(report.ok, 8);
        assert_eq!(report.fail, 0);
        assert_eq!(report.samples, 8);
    }

    #[tokio::test]
    async fn test_concurrency_above_iterations_is_harmless() {
        let config = quick_config(2, Mode::Sequential);
        let report = run_batch(VariantKind::Promisified, 16, &config).await;
        assert_eq!(report.ok + report.fail, 2);
        assert_eq!(report.ok, 2);
    }
}
