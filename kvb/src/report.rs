//! Report rendering: console table, CSV, Markdown, and JSON.
//!
//! Best-in-class cells (per the leaderboards) are highlighted in the console
//! table and bolded in Markdown. Non-finite percentiles render as `NaN` in
//! text formats and `null` in JSON.

use std::io::Write;

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use kvb_bench::stats::Leaderboard;
use kvb_common::{BatchReport, VariantKind};

/// Output format for the final report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Column-aligned console table with highlighted winners.
    Table,
    /// Comma-separated values with a stable header.
    Csv,
    /// GitHub-flavored Markdown table with bolded winners.
    Markdown,
    /// JSON object with reports and leaderboards.
    Json,
}

/// Render all batch reports to stdout in the requested format.
pub fn render(
    format: ReportFormat,
    reports: &[BatchReport],
    leaderboards: &[Leaderboard],
) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match format {
        ReportFormat::Table => render_table(&mut out, reports, leaderboards)?,
        ReportFormat::Csv => render_csv(&mut out, reports)?,
        ReportFormat::Markdown => render_markdown(&mut out, reports, leaderboards)?,
        ReportFormat::Json => render_json(&mut out, reports, leaderboards)?,
    }
    Ok(())
}

const CSV_HEADER: &str = "variant,concurrency,iterations,ok,fail,total_ms,\
iterations_per_sec,calls_per_sec,samples,p50_ms,p90_ms,p99_ms";

fn fmt_ms(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.2}")
    } else {
        "NaN".to_string()
    }
}

fn fmt_rate(value: f64) -> String {
    format!("{value:.1}")
}

/// Which metrics a report wins at its concurrency level.
struct Wins {
    iterations_per_sec: bool,
    calls_per_sec: bool,
    p50: bool,
    p90: bool,
    p99: bool,
}

fn wins_for(report: &BatchReport, leaderboards: &[Leaderboard]) -> Wins {
    let board = leaderboards
        .iter()
        .find(|b| b.concurrency == report.concurrency);
    let contains = |list: Option<&Vec<VariantKind>>| {
        list.is_some_and(|variants| variants.contains(&report.variant))
    };
    Wins {
        iterations_per_sec: contains(board.map(|b| &b.best_iterations_per_sec)),
        calls_per_sec: contains(board.map(|b| &b.best_calls_per_sec)),
        p50: contains(board.map(|b| &b.best_p50)),
        p90: contains(board.map(|b| &b.best_p90)),
        p99: contains(board.map(|b| &b.best_p99)),
    }
}

fn render_table<W: Write>(
    out: &mut W,
    reports: &[BatchReport],
    leaderboards: &[Leaderboard],
) -> Result<()> {
    writeln!(
        out,
        "{:14} {:>5} {:>6} {:>6} {:>6} {:>10} {:>9} {:>9} {:>9} {:>9} {:>9}",
        "Variant", "Conc", "Iter", "OK", "Fail", "Total ms", "Iter/s", "Calls/s", "p50 ms", "p90 ms", "p99 ms"
    )?;
    writeln!(
        out,
        "{:14} {:>5} {:>6} {:>6} {:>6} {:>10} {:>9} {:>9} {:>9} {:>9} {:>9}",
        "--------------", "-----", "------", "------", "------", "----------", "---------",
        "---------", "---------", "---------", "---------"
    )?;

    for report in reports {
        let wins = wins_for(report, leaderboards);
        // Pad first, then color, so ANSI codes do not skew the columns.
        let accent = |text: String, winner: bool| {
            if winner {
                text.green().bold().to_string()
            } else {
                text
            }
        };
        let fail_cell = {
            let text = format!("{:>6}", report.fail);
            if report.fail > 0 {
                text.red().to_string()
            } else {
                text
            }
        };

        writeln!(
            out,
            "{:14} {:>5} {:>6} {:>6} {} {:>10} {} {} {} {} {}",
            report.variant.label(),
            report.concurrency,
            report.iterations,
            report.ok,
            fail_cell,
            fmt_ms(report.total_ms),
            accent(
                format!("{:>9}", fmt_rate(report.iterations_per_sec)),
                wins.iterations_per_sec
            ),
            accent(
                format!("{:>9}", fmt_rate(report.calls_per_sec)),
                wins.calls_per_sec
            ),
            accent(format!("{:>9}", fmt_ms(report.p50_ms)), wins.p50),
            accent(format!("{:>9}", fmt_ms(report.p90_ms)), wins.p90),
            accent(format!("{:>9}", fmt_ms(report.p99_ms)), wins.p99),
        )?;

        for sample in &report.errors {
            writeln!(
                out,
                "    {} #{} {}: {}",
                "!".red(),
                sample.index,
                sample.kind,
                sample.message
            )?;
        }
    }

    Ok(())
}

fn render_csv<W: Write>(out: &mut W, reports: &[BatchReport]) -> Result<()> {
    writeln!(out, "{CSV_HEADER}")?;
    for report in reports {
        writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{},{},{}",
            report.variant.label(),
            report.concurrency,
            report.iterations,
            report.ok,
            report.fail,
            fmt_ms(report.total_ms),
            fmt_rate(report.iterations_per_sec),
            fmt_rate(report.calls_per_sec),
            report.samples,
            fmt_ms(report.p50_ms),
            fmt_ms(report.p90_ms),
            fmt_ms(report.p99_ms),
        )?;
    }
    Ok(())
}

fn render_markdown<W: Write>(
    out: &mut W,
    reports: &[BatchReport],
    leaderboards: &[Leaderboard],
) -> Result<()> {
    writeln!(
        out,
        "| Variant | Conc | Iter | OK | Fail | Total ms | Iter/s | Calls/s | p50 ms | p90 ms | p99 ms |"
    )?;
    writeln!(
        out,
        "|---|---:|---:|---:|---:|---:|---:|---:|---:|---:|---:|"
    )?;

    for report in reports {
        let wins = wins_for(report, leaderboards);
        let bold = |text: String, winner: bool| {
            if winner { format!("**{text}**") } else { text }
        };
        writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {} | {} | {} | {} | {} |",
            report.variant.label(),
            report.concurrency,
            report.iterations,
            report.ok,
            report.fail,
            fmt_ms(report.total_ms),
            bold(fmt_rate(report.iterations_per_sec), wins.iterations_per_sec),
            bold(fmt_rate(report.calls_per_sec), wins.calls_per_sec),
            bold(fmt_ms(report.p50_ms), wins.p50),
            bold(fmt_ms(report.p90_ms), wins.p90),
            bold(fmt_ms(report.p99_ms), wins.p99),
        )?;
    }
    Ok(())
}

fn render_json<W: Write>(
    out: &mut W,
    reports: &[BatchReport],
    leaderboards: &[Leaderboard],
) -> Result<()> {
    let document = serde_json::json!({
        "reports": reports,
        "leaderboards": leaderboards,
    });
    serde_json::to_writer_pretty(&mut *out, &document)?;
    writeln!(out)?;
    Ok(())
}
