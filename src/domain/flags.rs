//! Stage status flags.
//!
//! The legacy sheets store these as strings: `"0"`/`"1"` and, in older
//! rows, `"No"`/`"Yes"`. Internally they are explicit enums with monotonic
//! transitions; the legacy strings exist only at the store boundary.

use std::fmt;

/// Terminal string value for both flag kinds at the store boundary
pub const FLAG_SET: &str = "1";

/// Initial string value written for fresh rows
pub const FLAG_UNSET: &str = "0";

/// Whether a stage row has been joined into the merged log.
///
/// `Merged` is terminal: once set, a row never participates in a join again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStatus {
    Unmerged,
    Merged,
}

/// Whether a merged row has been included in a dispatched report.
///
/// `Sent` is terminal and never reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Unsent,
    Sent,
}

/// Parse a legacy flag cell. `"1"`, `"Yes"` and `"yes"` mean set; anything
/// else, including an empty cell or a missing column, means unset.
fn cell_is_set(cell: Option<&str>) -> bool {
    matches!(cell.map(str::trim), Some("1") | Some("Yes") | Some("yes"))
}

impl MergeStatus {
    pub fn from_cell(cell: Option<&str>) -> Self {
        if cell_is_set(cell) {
            Self::Merged
        } else {
            Self::Unmerged
        }
    }

    pub fn as_cell(&self) -> &'static str {
        match self {
            Self::Unmerged => FLAG_UNSET,
            Self::Merged => FLAG_SET,
        }
    }
}

impl SendStatus {
    /// Unlike merge flags, a merged row with a blank cell is NOT unsent:
    /// only an explicit `"0"` marks a row as awaiting dispatch. Legacy rows
    /// predating the sent flag stay out of the outbound batch.
    pub fn from_cell(cell: Option<&str>) -> Option<Self> {
        match cell.map(str::trim) {
            Some(FLAG_UNSET) => Some(Self::Unsent),
            Some(c) if cell_is_set(Some(c)) => Some(Self::Sent),
            _ => None,
        }
    }

    pub fn as_cell(&self) -> &'static str {
        match self {
            Self::Unsent => FLAG_UNSET,
            Self::Sent => FLAG_SET,
        }
    }
}

impl fmt::Display for MergeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unmerged => "unmerged",
            Self::Merged => "merged",
        })
    }
}

impl fmt::Display for SendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unsent => "unsent",
            Self::Sent => "sent",
        })
    }
}
