//! Shared petition vocabulary types for the petiq workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a petition on the UK Parliament petitions site.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PetitionState {
    Open,
    Closed,
    Rejected,
    /// Any state string the source reports that we do not recognise.
    #[serde(other)]
    Unknown,
}

impl PetitionState {
    /// Parse a state string from source data.
    ///
    /// Case-insensitive; unrecognised values map to [`PetitionState::Unknown`]
    /// rather than failing the record.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Self::Open,
            "closed" => Self::Closed,
            "rejected" => Self::Rejected,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Rejected => "rejected",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PetitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of source data describing a single UK Parliament petition.
///
/// Records are created in bulk by the table loader, held immutably for the
/// session, and replaced wholesale on refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetitionRecord {
    pub title: String,
    pub url: String,
    pub state: PetitionState,
    /// Signature count, always a non-negative integer. Records whose source
    /// value failed coercion carry `0` and a per-load warning.
    pub signatures: u64,
}
