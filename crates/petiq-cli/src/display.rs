//! Terminal rendering for petition tables, summaries, and charts.

use std::borrow::Cow;
use std::fmt::Write as _;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use petiq_core::{PetitionRecord, TableSummary};

const TITLE_WIDTH: usize = 56;
const BAR_WIDTH: usize = 40;
/// One bar per petition up to this many rows; a histogram beyond it.
const BAR_CHART_MAX_ROWS: usize = 20;
const HISTOGRAM_BINS: u64 = 20;

/// Print the dataset overview card.
pub fn print_summary(summary: &TableSummary, fetched_at: DateTime<Utc>) {
    println!("=== UK Parliament petitions ===");
    println!("fetched {}", fetched_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!();

    println!("Dataset");
    kv("petitions", &thousands(summary.rows as u64));
    kv("total signatures", &thousands(summary.total_signatures));
    kv("average signatures", &format!("{:.0}", summary.mean_signatures));
    kv("median signatures", &format!("{:.0}", summary.median_signatures));
    kv(
        "range",
        &format!(
            "{} to {}",
            thousands(summary.min_signatures),
            thousands(summary.max_signatures)
        ),
    );
    println!();

    println!("Impact");
    kv("over 100K signatures", &summary.high_impact.to_string());
    kv("10K to 100K signatures", &summary.medium_impact.to_string());
    kv("under 10K signatures", &summary.low_impact.to_string());
    println!();

    println!("States");
    for (state, count) in &summary.states {
        kv(state.as_str(), &count.to_string());
    }
}

/// Print rows as an aligned table in their given order.
pub fn print_table(rows: &[&PetitionRecord]) {
    println!(
        "{:>12}  {:<8}  {:<title$}  {}",
        "SIGNATURES",
        "STATE",
        "TITLE",
        "URL",
        title = TITLE_WIDTH
    );
    for row in rows {
        println!(
            "{:>12}  {:<8}  {:<title$}  {}",
            thousands(row.signatures),
            row.state,
            truncate(&row.title, TITLE_WIDTH),
            row.url,
            title = TITLE_WIDTH
        );
    }
}

/// One-line metrics for a matched-row set.
pub fn print_metrics(rows: &[&PetitionRecord]) {
    let Some(summary) = TableSummary::compute(rows.iter().copied()) else {
        return;
    };
    println!(
        "{} matching petitions | {} total signatures | {:.0} average | {} max",
        thousands(summary.rows as u64),
        thousands(summary.total_signatures),
        summary.mean_signatures,
        thousands(summary.max_signatures)
    );
}

/// Chart the signature counts: per-petition bars for small result sets,
/// a distribution histogram for large ones.
pub fn print_signature_chart(rows: &[&PetitionRecord]) {
    if rows.is_empty() {
        return;
    }
    if rows.len() <= BAR_CHART_MAX_ROWS {
        print_signature_bars(rows);
    } else {
        print_signature_histogram(rows);
    }
}

/// Chart the state distribution. A single-state result set needs no chart.
pub fn print_state_chart(rows: &[&PetitionRecord]) {
    let Some(summary) = TableSummary::compute(rows.iter().copied()) else {
        return;
    };
    if summary.states.len() < 2 {
        return;
    }
    let max = summary.states[0].1 as u64;
    println!("States");
    for (state, count) in &summary.states {
        println!(
            "{:>12}  {:<width$}  {}",
            state.as_str(),
            bar(*count as u64, max),
            count,
            width = BAR_WIDTH
        );
    }
}

/// Write rows to a CSV file, quoting fields that need it.
pub fn write_csv(path: &Path, rows: &[&PetitionRecord]) -> anyhow::Result<()> {
    let mut out = String::from("title,url,state,signatures\n");
    for row in rows {
        let _ = writeln!(
            out,
            "{},{},{},{}",
            csv_field(&row.title),
            csv_field(&row.url),
            row.state,
            row.signatures
        );
    }
    std::fs::write(path, out).with_context(|| format!("writing {}", path.display()))
}

fn print_signature_bars(rows: &[&PetitionRecord]) {
    let max = rows.iter().map(|r| r.signatures).max().unwrap_or(0);
    println!("Signatures");
    for row in rows {
        println!(
            "{:>12}  {:<width$}  {}",
            thousands(row.signatures),
            bar(row.signatures, max),
            truncate(&row.title, TITLE_WIDTH),
            width = BAR_WIDTH
        );
    }
}

fn print_signature_histogram(rows: &[&PetitionRecord]) {
    println!("Signature distribution ({} petitions)", rows.len());
    let bins = histogram_bins(rows);
    let max_count = bins.iter().map(|b| b.count).max().unwrap_or(0) as u64;
    for bin in &bins {
        println!(
            "{:>12} to {:<12}  {:<width$}  {}",
            thousands(bin.lo),
            thousands(bin.hi),
            bar(bin.count as u64, max_count),
            bin.count,
            width = BAR_WIDTH
        );
    }
}

struct Bin {
    lo: u64,
    hi: u64,
    count: usize,
}

/// Equal-width inclusive bins over the observed signature range, with the
/// empty tail trimmed.
fn histogram_bins(rows: &[&PetitionRecord]) -> Vec<Bin> {
    let min = rows.iter().map(|r| r.signatures).min().unwrap_or(0);
    let max = rows.iter().map(|r| r.signatures).max().unwrap_or(0);
    let width = (max - min + 1).div_ceil(HISTOGRAM_BINS);

    let mut bins: Vec<Bin> = (0..HISTOGRAM_BINS)
        .map(|i| {
            let lo = min + i * width;
            Bin {
                lo,
                hi: lo + width - 1,
                count: 0,
            }
        })
        .collect();

    for row in rows {
        bins[((row.signatures - min) / width) as usize].count += 1;
    }

    while bins.last().is_some_and(|b| b.count == 0) {
        bins.pop();
    }
    bins
}

fn kv(label: &str, value: &str) {
    println!("  {label:<24} {value}");
}

fn bar(value: u64, max: u64) -> String {
    if max == 0 {
        return String::new();
    }
    let len = ((value as f64 / max as f64) * BAR_WIDTH as f64).round() as usize;
    let len = if value > 0 { len.clamp(1, BAR_WIDTH) } else { 0 };
    "█".repeat(len)
}

fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max).collect();
        out.push_str("...");
        out
    }
}

fn csv_field(s: &str) -> Cow<'_, str> {
    if s.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", s.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(s)
    }
}
