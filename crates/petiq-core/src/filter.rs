//! Filter-spec types and the pure filter-application engine.
//!
//! A filter spec is built from untrusted model output, so evaluation fails open:
//! an unknown field name, an unknown comparator, or a value whose type does
//! not fit the field degrades that predicate to match-all rather than
//! raising. Predicates combine with AND semantics; without an explicit sort
//! the filter is stable and preserves the table's record order.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::PetitionRecord;
use crate::table::parse_count;

/// A petition column a predicate may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Url,
    State,
    Signatures,
}

impl Field {
    /// Resolve a loose field name (model output or a source header) to a
    /// column. Matching ignores case, whitespace, and punctuation, so
    /// "Signatures Count", "signature_count", and "signatures" all resolve
    /// to [`Field::Signatures`]. Unrecognised names resolve to `None`.
    pub fn resolve(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "title" | "petition" | "petitiontitle" | "name" => Some(Self::Title),
            "url" | "link" | "petitionurl" => Some(Self::Url),
            "state" | "status" | "petitionstate" => Some(Self::State),
            "signatures" | "signature" | "signaturescount" | "signaturecount" | "sigs" => {
                Some(Self::Signatures)
            }
            _ => None,
        }
    }
}

/// Comparison operator in a predicate triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Equals,
    Contains,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    Range,
}

impl Comparator {
    /// Resolve a loose comparator spelling. Unrecognised spellings resolve
    /// to `None`, which degrades the predicate to match-all.
    pub fn resolve(s: &str) -> Option<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "=" | "==" | "eq" | "equals" | "is" => Some(Self::Equals),
            "contains" | "like" | "includes" | "has" => Some(Self::Contains),
            ">" | "gt" | "greater_than" | "greaterthan" | "above" | "over" | "more_than" => {
                Some(Self::GreaterThan)
            }
            ">=" | "gte" | "ge" | "at_least" | "min" => Some(Self::GreaterOrEqual),
            "<" | "lt" | "less_than" | "lessthan" | "below" | "under" | "fewer_than" => {
                Some(Self::LessThan)
            }
            "<=" | "lte" | "le" | "at_most" | "max" => Some(Self::LessOrEqual),
            "range" | "between" | "in_range" | "within" => Some(Self::Range),
            _ => None,
        }
    }
}

/// Result ordering requested by the model alongside its predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    SignaturesDesc,
    SignaturesAsc,
    Alphabetical,
}

impl SortOrder {
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "signatures_desc" | "signaturesdesc" | "desc" | "most_signed" => {
                Some(Self::SignaturesDesc)
            }
            "signatures_asc" | "signaturesasc" | "asc" | "least_signed" => {
                Some(Self::SignaturesAsc)
            }
            "alphabetical" | "alpha" | "title" => Some(Self::Alphabetical),
            _ => None,
        }
    }
}

/// One field/comparator/value triple as the model reported it.
///
/// Field and comparator stay as raw strings; they are resolved at
/// evaluation time so that an unresolvable triple fails open instead of
/// failing the whole reply parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub comparator: String,
    #[serde(default)]
    pub value: Value,
}

impl Predicate {
    /// Evaluate this predicate against one record, failing open on any
    /// unknown field, unknown comparator, or type mismatch.
    pub fn matches(&self, record: &PetitionRecord) -> bool {
        let Some(field) = Field::resolve(&self.field) else {
            return true;
        };
        let Some(comparator) = Comparator::resolve(&self.comparator) else {
            return true;
        };

        match field {
            Field::Signatures => match_count(comparator, record.signatures, &self.value),
            Field::Title => match_text(comparator, &record.title, &self.value),
            Field::Url => match_text(comparator, &record.url, &self.value),
            Field::State => match_text(comparator, record.state.as_str(), &self.value),
        }
    }
}

/// A validated filter specification: AND-ed predicates plus optional
/// ordering and row limit. [`FilterSpec::default`] is the identity spec.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(default)]
    pub predicates: Vec<Predicate>,
    #[serde(default)]
    pub sort: Option<SortOrder>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl FilterSpec {
    /// True when applying the spec returns every record unchanged.
    pub fn is_identity(&self) -> bool {
        self.predicates.is_empty() && self.sort.is_none() && self.limit.is_none()
    }

    /// True when every predicate matches the record.
    pub fn matches(&self, record: &PetitionRecord) -> bool {
        self.predicates.iter().all(|p| p.matches(record))
    }

    /// Apply the spec to a record slice, returning a borrowed view over the
    /// matching rows. The filter is stable; sorting happens only when the
    /// spec asks for it, and the limit truncates after sorting.
    pub fn apply<'a>(&self, records: &'a [PetitionRecord]) -> Vec<&'a PetitionRecord> {
        let mut rows: Vec<&PetitionRecord> =
            records.iter().filter(|r| self.matches(r)).collect();

        match self.sort {
            Some(SortOrder::SignaturesDesc) => rows.sort_by(|a, b| b.signatures.cmp(&a.signatures)),
            Some(SortOrder::SignaturesAsc) => rows.sort_by(|a, b| a.signatures.cmp(&b.signatures)),
            Some(SortOrder::Alphabetical) => {
                rows.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
            }
            None => {}
        }

        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
        rows
    }
}

fn match_count(comparator: Comparator, actual: u64, value: &Value) -> bool {
    match comparator {
        Comparator::Range => match range_bounds(value) {
            Some((lo, hi)) => lo <= actual && actual <= hi,
            None => true,
        },
        Comparator::Equals => count_value(value).map(|v| actual == v).unwrap_or(true),
        Comparator::GreaterThan => count_value(value).map(|v| actual > v).unwrap_or(true),
        Comparator::GreaterOrEqual => count_value(value).map(|v| actual >= v).unwrap_or(true),
        Comparator::LessThan => count_value(value).map(|v| actual < v).unwrap_or(true),
        Comparator::LessOrEqual => count_value(value).map(|v| actual <= v).unwrap_or(true),
        // Substring matching is not meaningful for a count.
        Comparator::Contains => true,
    }
}

fn match_text(comparator: Comparator, actual: &str, value: &Value) -> bool {
    let actual = actual.trim().to_lowercase();
    match comparator {
        Comparator::Equals => any_text(value, |v| actual == v.trim().to_lowercase()),
        Comparator::Contains => any_text(value, |v| actual.contains(&v.trim().to_lowercase())),
        // Ordering and range comparators do not apply to text fields.
        _ => true,
    }
}

/// Evaluate a text test against a scalar value, or against an array (a list
/// of states or keywords) where any element may match.
fn any_text(value: &Value, test: impl Fn(&str) -> bool) -> bool {
    match value {
        Value::String(s) => test(s),
        Value::Number(n) => test(&n.to_string()),
        Value::Array(items) => {
            let texts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            if texts.is_empty() {
                return true;
            }
            texts.into_iter().any(test)
        }
        _ => true,
    }
}

fn count_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => {
            n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                    .map(|f| f as u64)
            })
        }
        Value::String(s) => parse_count(s),
        _ => None,
    }
}

/// Inclusive range bounds from `[min, max]` or `{"min": .., "max": ..}`.
fn range_bounds(value: &Value) -> Option<(u64, u64)> {
    match value {
        Value::Array(items) if items.len() == 2 => {
            Some((count_value(&items[0])?, count_value(&items[1])?))
        }
        Value::Object(map) => {
            let lo = map.get("min").or_else(|| map.get("from")).or_else(|| map.get("low"))?;
            let hi = map.get("max").or_else(|| map.get("to")).or_else(|| map.get("high"))?;
            Some((count_value(lo)?, count_value(hi)?))
        }
        _ => None,
    }
}
