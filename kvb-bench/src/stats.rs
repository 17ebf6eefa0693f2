//! Metrics aggregation and cross-variant ranking.

use std::time::Duration;

use chrono::Utc;
use kvb_common::{
    BatchReport, ErrorSample, MAX_ERROR_SAMPLES, RunConfig, TaskError, VariantKind,
};
use serde::Serialize;

/// Mutable batch bookkeeping, accumulated by all workers behind a mutex and
/// frozen into a [`BatchReport`] after the join.
#[derive(Debug, Default)]
pub struct BatchTally {
    pub ok: u32,
    pub fail: u32,
    pub latencies_ms: Vec<f64>,
    pub errors: Vec<ErrorSample>,
}

impl BatchTally {
    /// Record one latency sample for a completed invocation that neither
    /// timed out nor errored.
    pub fn push_latency(&mut self, ms: f64) {
        self.latencies_ms.push(ms);
    }

    pub fn record_success(&mut self) {
        self.ok += 1;
    }

    /// Count one failure; keep at most [`MAX_ERROR_SAMPLES`] samples.
    pub fn record_failure(&mut self, index: u32, error: &TaskError) {
        self.fail += 1;
        if self.errors.len() < MAX_ERROR_SAMPLES {
            self.errors.push(ErrorSample {
                index,
                kind: error.kind(),
                message: error.to_string(),
                code: error.code().map(str::to_string),
            });
        }
    }
}

/// Nearest-rank percentile over an ascending-sorted slice.
///
/// Index is `clamp(ceil(p/100 * N) - 1, 0, N-1)`; no interpolation. Returns
/// `f64::NAN` for an empty slice. The formula is a comparability contract
/// across implementations of this harness and must not be changed.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let n = sorted.len();
    let rank = ((p / 100.0) * n as f64).ceil() as isize - 1;
    sorted[rank.clamp(0, n as isize - 1) as usize]
}

/// Freeze a finished tally into the immutable batch report.
///
/// `wall` spans from before the first worker spawn to after the join.
pub fn summarize(
    variant: VariantKind,
    concurrency: usize,
    config: &RunConfig,
    tally: BatchTally,
    wall: Duration,
) -> BatchReport {
    let mut latencies = tally.latencies_ms;
    latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let secs = wall.as_secs_f64();
    let attempted = tally.ok + tally.fail;
    let calls = u64::from(attempted) * u64::from(config.mode.calls_per_iteration());
    let (iterations_per_sec, calls_per_sec) = if secs > 0.0 {
        (f64::from(tally.ok) / secs, calls as f64 / secs)
    } else {
        (0.0, 0.0)
    };

    BatchReport {
        variant,
        concurrency,
        iterations: config.iterations,
        ok: tally.ok,
        fail: tally.fail,
        total_ms: secs * 1000.0,
        iterations_per_sec,
        calls_per_sec,
        samples: latencies.len(),
        p50_ms: percentile(&latencies, 50.0),
        p90_ms: percentile(&latencies, 90.0),
        p99_ms: percentile(&latencies, 99.0),
        errors: tally.errors,
        finished_at: Utc::now(),
    }
}

/// Best variants per metric at one concurrency level. Ties list every tying
/// variant; a metric with no finite value for any variant lists none.
#[derive(Debug, Clone, Serialize)]
pub struct Leaderboard {
    pub concurrency: usize,
    pub best_iterations_per_sec: Vec<VariantKind>,
    pub best_calls_per_sec: Vec<VariantKind>,
    pub best_p50: Vec<VariantKind>,
    pub best_p90: Vec<VariantKind>,
    pub best_p99: Vec<VariantKind>,
}

/// Rank variants against each other, one leaderboard per concurrency level
/// in first-seen (requested) order.
pub fn rank(reports: &[BatchReport]) -> Vec<Leaderboard> {
    let mut levels: Vec<usize> = Vec::new();
    for report in reports {
        if !levels.contains(&report.concurrency) {
            levels.push(report.concurrency);
        }
    }

    levels
        .into_iter()
        .map(|concurrency| {
            let group: Vec<&BatchReport> = reports
                .iter()
                .filter(|r| r.concurrency == concurrency)
                .collect();
            Leaderboard {
                concurrency,
                best_iterations_per_sec: best_by(&group, |r| r.iterations_per_sec, true),
                best_calls_per_sec: best_by(&group, |r| r.calls_per_sec, true),
                best_p50: best_by(&group, |r| r.p50_ms, false),
                best_p90: best_by(&group, |r| r.p90_ms, false),
                best_p99: best_by(&group, |r| r.p99_ms, false),
            }
        })
        .collect()
}

fn best_by<F>(group: &[&BatchReport], metric: F, higher_is_better: bool) -> Vec<VariantKind>
where
    F: Fn(&BatchReport) -> f64,
{
    let candidates: Vec<(VariantKind, f64)> = group
        .iter()
        .map(|r| (r.variant, metric(r)))
        .filter(|(_, value)| value.is_finite())
        .collect();

    let Some(best) = candidates
        .iter()
        .map(|&(_, value)| value)
        .reduce(|a, b| if higher_is_better { a.max(b) } else { a.min(b) })
    else {
        return Vec::new();
    };

    candidates
        .into_iter()
        .filter(|&(_, value)| value == best)
        .map(|(variant, _)| variant)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvb_common::{KdfOptions, Mode};

    fn config(mode: Mode) -> RunConfig {
        RunConfig::new(10, vec![1], mode, 64, KdfOptions { rounds: 100 }, 42)
    }

    #[test]
    fn test_percentile_nearest_rank_reference_values() {
        let sorted: Vec<f64> = (1..=10).map(f64::from).collect();
        assert_eq!(percentile(&sorted, 50.0), 5.0);
        assert_eq!(percentile(&sorted, 90.0), 9.0);
        assert_eq!(percentile(&sorted, 99.0), 10.0);
    }

    #[test]
    fn test_percentile_bounds() {
        let sorted = vec![3.0, 4.0, 5.0];
        assert_eq!(percentile(&sorted, 0.0), 3.0);
        assert_eq!(percentile(&sorted, 100.0), 5.0);
        assert_eq!(percentile(&sorted, 33.4), 4.0);
    }

    #[test]
    fn test_percentile_empty_is_nan() {
        assert!(percentile(&[], 50.0).is_nan());
    }

    #[test]
    fn test_summarize_throughput_and_percentiles() {
        let mut tally = BatchTally::default();
        for _ in 0..9 {
            tally.record_success();
        }
        tally.fail = 1;
        for ms in [5.0, 1.0, 3.0, 2.0, 4.0] {
            tally.push_latency(ms);
        }

        let report = summarize(
            VariantKind::Callback,
            2,
            &config(Mode::Sequential),
            tally,
            Duration::from_secs(2),
        );
        assert_eq!(report.ok, 9);
        assert_eq!(report.fail, 1);
        assert_eq!(report.samples, 5);
        assert_eq!(report.total_ms, 2000.0);
        assert_eq!(report.iterations_per_sec, 4.5);
        // 10 attempted iterations, 2 calls each, over 2 seconds.
        assert_eq!(report.calls_per_sec, 10.0);
        assert_eq!(report.p50_ms, 3.0);
        assert_eq!(report.p99_ms, 5.0);
    }

    #[test]
    fn test_summarize_random_mode_counts_single_calls() {
        let mut tally = BatchTally::default();
        tally.ok = 10;
        let report = summarize(
            VariantKind::Promisified,
            1,
            &config(Mode::Random),
            tally,
            Duration::from_secs(1),
        );
        assert_eq!(report.calls_per_sec, 10.0);
        assert!(report.p50_ms.is_nan());
    }

    fn report(variant: VariantKind, concurrency: usize, iter_tp: f64, p50: f64) -> BatchReport {
        BatchReport {
            variant,
            concurrency,
            iterations: 10,
            ok: 10,
            fail: 0,
            total_ms: 100.0,
            iterations_per_sec: iter_tp,
            calls_per_sec: iter_tp * 2.0,
            samples: 20,
            p50_ms: p50,
            p90_ms: p50 * 2.0,
            p99_ms: p50 * 3.0,
            errors: vec![],
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_rank_marks_single_winner() {
        let reports = vec![
            report(VariantKind::Callback, 4, 100.0, 8.0),
            report(VariantKind::Promisified, 4, 120.0, 6.0),
            report(VariantKind::ManualFuture, 4, 110.0, 7.0),
        ];
        let boards = rank(&reports);
        assert_eq!(boards.len(), 1);
        assert_eq!(
            boards[0].best_iterations_per_sec,
            vec![VariantKind::Promisified]
        );
        assert_eq!(boards[0].best_p50, vec![VariantKind::Promisified]);
    }

    #[test]
    fn test_rank_ties_mark_all() {
        let reports = vec![
            report(VariantKind::Callback, 1, 100.0, 5.0),
            report(VariantKind::Promisified, 1, 100.0, 5.0),
            report(VariantKind::ManualFuture, 1, 90.0, 9.0),
        ];
        let boards = rank(&reports);
        assert_eq!(
            boards[0].best_iterations_per_sec,
            vec![VariantKind::Callback, VariantKind::Promisified]
        );
        assert_eq!(
            boards[0].best_p50,
            vec![VariantKind::Callback, VariantKind::Promisified]
        );
    }

    #[test]
    fn test_rank_ignores_nan_percentiles() {
        let reports = vec![
            report(VariantKind::Callback, 1, 100.0, f64::NAN),
            report(VariantKind::Promisified, 1, 90.0, 5.0),
        ];
        let boards = rank(&reports);
        assert_eq!(boards[0].best_p50, vec![VariantKind::Promisified]);
    }

    #[test]
    fn test_rank_groups_by_concurrency_in_requested_order() {
        let reports = vec![
            report(VariantKind::Callback, 4, 100.0, 5.0),
            report(VariantKind::Callback, 1, 50.0, 5.0),
            report(VariantKind::Promisified, 4, 90.0, 6.0),
            report(VariantKind::Promisified, 1, 60.0, 4.0),
        ];
        let boards = rank(&reports);
        assert_eq!(boards.len(), 2);
        assert_eq!(boards[0].concurrency, 4);
        assert_eq!(boards[1].concurrency, 1);
        assert_eq!(boards[1].best_iterations_per_sec, vec![VariantKind::Promisified]);
    }

    #[test]
    fn test_tally_caps_error_samples_but_counts_all() {
        let mut tally = BatchTally::default();
        for index in 0..8 {
            tally.record_failure(
                index,
                &TaskError::Primitive {
                    message: "boom".into(),
                    code: None,
                },
            );
        }
        assert_eq!(tally.fail, 8);
        assert_eq!(tally.errors.len(), MAX_ERROR_SAMPLES);
    }
}
