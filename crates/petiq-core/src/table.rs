//! Lenient table loading for the petition data feed.
//!
//! The feed returns either a JSON array of objects with loosely-named fields,
//! or a header row followed by data rows (the Google Apps Script export
//! shape). Field-level problems coerce to sentinel values and are reported
//! as warnings; only a payload that is not a sequence of records at all
//! fails the load.

use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::filter::Field;
use crate::record::{PetitionRecord, PetitionState};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("expected a JSON array of petition records, got {0}")]
    NotAnArray(&'static str),

    #[error("array element {0} is not a petition record")]
    NotARecord(usize),

    #[error("header row contains no recognised petition columns")]
    NoUsableColumns,
}

/// A signature count that failed validation during loading and was replaced
/// with `0` instead of dropping the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoercionWarning {
    /// Zero-based index of the record within the loaded table's source order.
    pub row: usize,
    /// The raw value as it appeared in the payload.
    pub raw: String,
}

impl fmt::Display for CoercionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "row {}: signature count {:?} is not a non-negative integer; recorded as 0",
            self.row, self.raw
        )
    }
}

/// An immutable table snapshot: coerced records plus the fetch timestamp.
///
/// A single-writer value passed by reference into each interpretation call;
/// replaced wholesale on refresh, never mutated in place.
#[derive(Debug, Clone)]
pub struct PetitionTable {
    records: Vec<PetitionRecord>,
    fetched_at: DateTime<Utc>,
}

impl PetitionTable {
    /// Build a table snapshot, sorted by signature count descending. The
    /// sort is stable, so records with equal counts keep their source order.
    pub fn new(mut records: Vec<PetitionRecord>) -> Self {
        records.sort_by(|a, b| b.signatures.cmp(&a.signatures));
        Self {
            records,
            fetched_at: Utc::now(),
        }
    }

    pub fn records(&self) -> &[PetitionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }
}

/// Result of a successful load: the table plus per-record coercion warnings.
#[derive(Debug)]
pub struct LoadOutcome {
    pub table: PetitionTable,
    pub warnings: Vec<CoercionWarning>,
}

/// Coerce a raw JSON payload into a petition table.
///
/// Accepts an array of objects or a header-row-plus-data-rows array of
/// arrays. Every record in the payload appears in the table: invalid
/// signature counts become `0` with a warning, missing text fields become
/// empty strings, and unrecognised states become [`PetitionState::Unknown`].
pub fn load_table(payload: &Value) -> Result<LoadOutcome, LoadError> {
    let rows = payload
        .as_array()
        .ok_or_else(|| LoadError::NotAnArray(kind(payload)))?;

    let mut records = Vec::with_capacity(rows.len());
    let mut warnings = Vec::new();

    match rows.first() {
        None => {}
        Some(Value::Array(header)) => {
            load_header_rows(header, &rows[1..], &mut records, &mut warnings)?
        }
        _ => load_objects(rows, &mut records, &mut warnings)?,
    }

    debug!(
        rows = records.len(),
        warnings = warnings.len(),
        "loaded petition records"
    );
    Ok(LoadOutcome {
        table: PetitionTable::new(records),
        warnings,
    })
}

/// Header-row shape: `[["Petition", "URL", ...], ["Ban X", "http://x", ...]]`.
fn load_header_rows(
    header: &[Value],
    rows: &[Value],
    records: &mut Vec<PetitionRecord>,
    warnings: &mut Vec<CoercionWarning>,
) -> Result<(), LoadError> {
    let columns: Vec<Option<Field>> = header
        .iter()
        .map(|cell| cell.as_str().and_then(Field::resolve))
        .collect();

    if columns.iter().all(Option::is_none) {
        return Err(LoadError::NoUsableColumns);
    }

    for (row_idx, row) in rows.iter().enumerate() {
        let cells = row
            .as_array()
            .ok_or(LoadError::NotARecord(row_idx + 1))?;

        let cell_for = |field: Field| {
            columns
                .iter()
                .position(|c| *c == Some(field))
                .and_then(|i| cells.get(i))
        };

        records.push(build_record(
            row_idx,
            cell_for(Field::Title),
            cell_for(Field::Url),
            cell_for(Field::State),
            cell_for(Field::Signatures),
            warnings,
        ));
    }
    Ok(())
}

/// Object shape: `[{"Petition": "Ban X", "Signatures Count": 150000, ...}]`.
fn load_objects(
    rows: &[Value],
    records: &mut Vec<PetitionRecord>,
    warnings: &mut Vec<CoercionWarning>,
) -> Result<(), LoadError> {
    for (row_idx, row) in rows.iter().enumerate() {
        let obj = row.as_object().ok_or(LoadError::NotARecord(row_idx))?;

        let value_for = |field: Field| {
            obj.iter()
                .find(|(key, _)| Field::resolve(key) == Some(field))
                .map(|(_, value)| value)
        };

        records.push(build_record(
            row_idx,
            value_for(Field::Title),
            value_for(Field::Url),
            value_for(Field::State),
            value_for(Field::Signatures),
            warnings,
        ));
    }
    Ok(())
}

fn build_record(
    row: usize,
    title: Option<&Value>,
    url: Option<&Value>,
    state: Option<&Value>,
    signatures: Option<&Value>,
    warnings: &mut Vec<CoercionWarning>,
) -> PetitionRecord {
    let signatures = match coerce_count(signatures) {
        Ok(n) => n,
        Err(raw) => {
            warnings.push(CoercionWarning { row, raw });
            0
        }
    };

    PetitionRecord {
        title: text(title),
        url: text(url),
        state: state
            .and_then(Value::as_str)
            .map(PetitionState::parse)
            .unwrap_or(PetitionState::Unknown),
        signatures,
    }
}

/// Render a loosely-typed cell as trimmed text; missing and non-text cells
/// that have no sensible rendering become the empty string.
fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn coerce_count(value: Option<&Value>) -> Result<u64, String> {
    let Some(value) = value else {
        return Err("missing".to_string());
    };
    match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Ok(u)
            } else {
                // Not a u64: negative, fractional, or a float encoding of
                // an integer ("1234.0").
                match n.as_f64() {
                    Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(f as u64),
                    _ => Err(n.to_string()),
                }
            }
        }
        Value::String(s) => parse_count(s).ok_or_else(|| s.clone()),
        Value::Null => Err("null".to_string()),
        other => Err(other.to_string()),
    }
}

/// Parse a signature count from text. Accepts plain integers, thousands
/// separators ("150,000"), and integral floats ("1234.0").
pub(crate) fn parse_count(raw: &str) -> Option<u64> {
    let cleaned = raw.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(n) = cleaned.parse::<u64>() {
        return Some(n);
    }
    let f: f64 = cleaned.parse().ok()?;
    (f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64).then_some(f as u64)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn loads_array_of_objects() {
        let payload = json!([
            {"Petition": " Ban X ", "URL": "http://x", "State": "open", "Signatures Count": "150000"},
            {"Petition": "Fix Y", "URL": "http://y", "State": "Closed", "Signatures Count": 42},
        ]);
        let outcome = load_table(&payload).unwrap();
        assert_eq!(outcome.table.len(), 2);
        assert!(outcome.warnings.is_empty());

        // Sorted descending, text trimmed, string count parsed.
        let first = &outcome.table.records()[0];
        assert_eq!(first.title, "Ban X");
        assert_eq!(first.signatures, 150_000);
        assert_eq!(first.state, PetitionState::Open);
        assert_eq!(outcome.table.records()[1].state, PetitionState::Closed);
    }

    #[test]
    fn loads_header_row_shape() {
        let payload = json!([
            ["Petition", "URL", "State", "Signatures Count"],
            ["Ban X", "http://x", "open", "150000"],
            ["Fix Y", "http://y", "rejected", 9000],
        ]);
        let outcome = load_table(&payload).unwrap();
        assert_eq!(outcome.table.len(), 2);
        assert_eq!(outcome.table.records()[0].signatures, 150_000);
        assert_eq!(outcome.table.records()[1].state, PetitionState::Rejected);
    }

    #[test]
    fn both_shapes_load_identically() {
        let objects = json!([
            {"title": "A", "url": "u", "state": "open", "signatures": 5},
        ]);
        let headers = json!([
            ["title", "url", "state", "signatures"],
            ["A", "u", "open", 5],
        ]);
        let a = load_table(&objects).unwrap();
        let b = load_table(&headers).unwrap();
        assert_eq!(a.table.records(), b.table.records());
    }

    #[test]
    fn invalid_count_is_flagged_not_dropped() {
        let payload = json!([
            {"title": "A", "url": "u", "state": "open", "signatures": "N/A"},
            {"title": "B", "url": "u", "state": "open", "signatures": 10},
        ]);
        let outcome = load_table(&payload).unwrap();
        assert_eq!(outcome.table.len(), 2);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].row, 0);
        assert_eq!(outcome.warnings[0].raw, "N/A");

        let flagged = outcome
            .table
            .records()
            .iter()
            .find(|r| r.title == "A")
            .unwrap();
        assert_eq!(flagged.signatures, 0);
    }

    #[test]
    fn negative_count_is_flagged() {
        let payload = json!([{"title": "A", "url": "u", "state": "open", "signatures": -5}]);
        let outcome = load_table(&payload).unwrap();
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.table.records()[0].signatures, 0);
    }

    #[test]
    fn missing_fields_default() {
        let payload = json!([{"title": "A"}]);
        let outcome = load_table(&payload).unwrap();
        let rec = &outcome.table.records()[0];
        assert_eq!(rec.url, "");
        assert_eq!(rec.state, PetitionState::Unknown);
        assert_eq!(rec.signatures, 0);
        // Missing count is a coercion, not a silent default.
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn non_array_payload_fails_wholesale() {
        assert!(matches!(
            load_table(&json!({"rows": []})),
            Err(LoadError::NotAnArray("an object"))
        ));
        assert!(matches!(
            load_table(&json!("nope")),
            Err(LoadError::NotAnArray("a string"))
        ));
    }

    #[test]
    fn scalar_rows_fail_wholesale() {
        assert!(matches!(
            load_table(&json!([1, 2, 3])),
            Err(LoadError::NotARecord(0))
        ));
    }

    #[test]
    fn unrecognised_headers_fail_wholesale() {
        let payload = json!([["foo", "bar"], ["a", "b"]]);
        assert!(matches!(
            load_table(&payload),
            Err(LoadError::NoUsableColumns)
        ));
    }

    #[test]
    fn empty_array_loads_empty_table() {
        let outcome = load_table(&json!([])).unwrap();
        assert!(outcome.table.is_empty());
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn table_sorts_by_signatures_descending() {
        let payload = json!([
            {"title": "low", "url": "", "state": "open", "signatures": 10},
            {"title": "high", "url": "", "state": "open", "signatures": 1000},
            {"title": "mid", "url": "", "state": "open", "signatures": 500},
        ]);
        let outcome = load_table(&payload).unwrap();
        let titles: Vec<&str> = outcome
            .table
            .records()
            .iter()
            .map(|r| r.title.as_str())
            .collect();
        assert_eq!(titles, vec!["high", "mid", "low"]);
    }

    #[test]
    fn parse_count_accepts_separators_and_integral_floats() {
        assert_eq!(parse_count("150,000"), Some(150_000));
        assert_eq!(parse_count("1234.0"), Some(1234));
        assert_eq!(parse_count(" 7 "), Some(7));
        assert_eq!(parse_count("1234.5"), None);
        assert_eq!(parse_count("-5"), None);
        assert_eq!(parse_count("N/A"), None);
        assert_eq!(parse_count(""), None);
    }
}
