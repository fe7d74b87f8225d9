//! Aggregate statistics over a set of petition records.
//!
//! Shared by the model-prompt context and the CLI summary card, so both
//! describe the dataset with the same numbers.

use std::collections::BTreeMap;

use crate::record::{PetitionRecord, PetitionState};

/// Signature count above which a petition counts as high-impact.
pub const HIGH_IMPACT_MIN: u64 = 100_000;
/// Signature count at which a petition counts as medium-impact.
pub const MEDIUM_IMPACT_MIN: u64 = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub struct TableSummary {
    pub rows: usize,
    pub total_signatures: u64,
    pub mean_signatures: f64,
    pub median_signatures: f64,
    pub min_signatures: u64,
    pub max_signatures: u64,
    /// Petitions with more than [`HIGH_IMPACT_MIN`] signatures.
    pub high_impact: usize,
    /// Petitions with [`MEDIUM_IMPACT_MIN`]..=[`HIGH_IMPACT_MIN`] signatures.
    pub medium_impact: usize,
    /// Petitions below [`MEDIUM_IMPACT_MIN`] signatures.
    pub low_impact: usize,
    /// State distribution, largest count first.
    pub states: Vec<(PetitionState, usize)>,
}

impl TableSummary {
    /// Compute statistics over any iterable of records (a full table or a
    /// filtered view). Returns `None` for an empty input.
    pub fn compute<'a, I>(rows: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a PetitionRecord>,
    {
        let mut signatures: Vec<u64> = Vec::new();
        let mut counts: BTreeMap<PetitionState, usize> = BTreeMap::new();
        let mut high = 0;
        let mut medium = 0;
        let mut low = 0;

        for record in rows {
            signatures.push(record.signatures);
            *counts.entry(record.state).or_default() += 1;
            if record.signatures > HIGH_IMPACT_MIN {
                high += 1;
            } else if record.signatures >= MEDIUM_IMPACT_MIN {
                medium += 1;
            } else {
                low += 1;
            }
        }

        if signatures.is_empty() {
            return None;
        }

        signatures.sort_unstable();
        let n = signatures.len();
        let total: u64 = signatures.iter().sum();
        let median = if n % 2 == 0 {
            (signatures[n / 2 - 1] + signatures[n / 2]) as f64 / 2.0
        } else {
            signatures[n / 2] as f64
        };

        let mut states: Vec<(PetitionState, usize)> = counts.into_iter().collect();
        states.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        Some(Self {
            rows: n,
            total_signatures: total,
            mean_signatures: total as f64 / n as f64,
            median_signatures: median,
            min_signatures: signatures[0],
            max_signatures: signatures[n - 1],
            high_impact: high,
            medium_impact: medium,
            low_impact: low,
            states,
        })
    }
}
