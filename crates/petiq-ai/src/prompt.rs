//! Prompt templates for the petition query interpreter.

use std::fmt::Write;

use petiq_core::{PetitionRecord, TableSummary};

/// Sample rows embedded in the prompt context. The cap keeps the prompt
/// bounded regardless of table size.
pub(crate) const SAMPLE_ROW_CAP: usize = 20;
const SAMPLE_TITLE_MAX: usize = 80;

/// System prompt: dataset context plus the reply contract.
pub(crate) fn build_system_prompt(records: &[PetitionRecord]) -> String {
    format!(
        "You are a data analyst specialising in UK Parliament petition data.\n\
         \n\
         The dataset columns are:\n\
         - title: the petition title\n\
         - url: link to the petition page\n\
         - state: open, closed, rejected, or unknown\n\
         - signatures: number of people who signed\n\
         \n\
         {context}\n\
         Interpret the user's question about this dataset and respond ONLY with a \
         JSON object. No markdown fences, no explanation, just raw JSON:\n\
         {{\n\
         \x20 \"interpretation\": \"what you understood from the question\",\n\
         \x20 \"filters\": [{{\"field\": \"signatures\", \"comparator\": \">\", \"value\": 100000}}],\n\
         \x20 \"sort\": \"signatures_desc\" or \"signatures_asc\" or \"alphabetical\" or null,\n\
         \x20 \"limit\": null or a number of rows,\n\
         \x20 \"narrative\": \"a short insight about what the filtered results show\"\n\
         }}\n\
         \n\
         Allowed comparators: equals, contains, >, >=, <, <=, range (value is [min, max]).\n\
         Allowed fields: title, url, state, signatures.\n\
         Filters combine with AND semantics. Use an empty filters array when the \
         question asks for everything.",
        context = render_context(records)
    )
}

pub(crate) fn build_user_prompt(question: &str) -> String {
    format!("Question: {question}")
}

/// Bounded dataset description: aggregates plus at most [`SAMPLE_ROW_CAP`]
/// sample rows (the table is sorted by signatures, so the sample is the top
/// of the dataset).
fn render_context(records: &[PetitionRecord]) -> String {
    let Some(summary) = TableSummary::compute(records) else {
        return "The dataset is currently empty.\n".to_string();
    };

    let states = summary
        .states
        .iter()
        .map(|(state, count)| format!("{count} {state}"))
        .collect::<Vec<_>>()
        .join(", ");

    let mut out = String::new();
    let _ = writeln!(out, "Current dataset: {} petitions.", summary.rows);
    let _ = writeln!(out, "- Total signatures: {}", summary.total_signatures);
    let _ = writeln!(
        out,
        "- Average signatures per petition: {:.0}",
        summary.mean_signatures
    );
    let _ = writeln!(out, "- Median signatures: {:.0}", summary.median_signatures);
    let _ = writeln!(
        out,
        "- Range: {} to {} signatures",
        summary.min_signatures, summary.max_signatures
    );
    let _ = writeln!(
        out,
        "- High-impact petitions (>100K signatures): {}",
        summary.high_impact
    );
    let _ = writeln!(
        out,
        "- Medium-impact petitions (10K-100K signatures): {}",
        summary.medium_impact
    );
    let _ = writeln!(
        out,
        "- Lower-impact petitions (<10K signatures): {}",
        summary.low_impact
    );
    let _ = writeln!(out, "- Petition states: {states}");

    let _ = writeln!(out, "Sample rows (highest signature counts first):");
    for record in records.iter().take(SAMPLE_ROW_CAP) {
        let _ = writeln!(
            out,
            "- {} ({} signatures, {})",
            truncate(&record.title, SAMPLE_TITLE_MAX),
            record.signatures,
            record.state
        );
    }
    out
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max).collect();
        out.push_str("...");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petiq_core::PetitionState;

    fn record(i: usize) -> PetitionRecord {
        PetitionRecord {
            title: format!("Petition number {i}"),
            url: format!("http://p.example/{i}"),
            state: PetitionState::Open,
            signatures: 1000 + i as u64,
        }
    }

    #[test]
    fn sample_rows_are_capped() {
        let records: Vec<PetitionRecord> = (0..100).map(record).collect();
        let prompt = build_system_prompt(&records);
        let sample_lines = prompt
            .lines()
            .filter(|line| line.contains("signatures,"))
            .count();
        assert_eq!(sample_lines, SAMPLE_ROW_CAP);
        assert!(prompt.contains("Current dataset: 100 petitions."));
    }

    #[test]
    fn empty_table_has_explicit_context() {
        let prompt = build_system_prompt(&[]);
        assert!(prompt.contains("The dataset is currently empty."));
    }

    #[test]
    fn prompt_names_the_reply_contract() {
        let prompt = build_system_prompt(&[]);
        assert!(prompt.contains("\"interpretation\""));
        assert!(prompt.contains("\"filters\""));
        assert!(prompt.contains("\"narrative\""));
        assert!(prompt.contains("raw JSON"));
    }

    #[test]
    fn user_prompt_embeds_question() {
        assert_eq!(
            build_user_prompt("how many are open?"),
            "Question: how many are open?"
        );
    }

    #[test]
    fn long_titles_are_truncated() {
        let long = "x".repeat(300);
        assert_eq!(truncate(&long, 80).chars().count(), 83);
        assert_eq!(truncate("short", 80), "short");
    }
}
