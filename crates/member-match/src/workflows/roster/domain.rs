use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub const EMAIL_COLUMN: &str = "Email";
pub const FIRST_NAME_COLUMN: &str = "First name";
pub const LAST_NAME_COLUMN: &str = "Last name";
pub const RENEWAL_DUE_COLUMN: &str = "Renewal due";
pub const LAST_SIGN_IN_COLUMN: &str = "Last sign in at";

/// Label used for matched members whose renewal date is missing or unreadable.
pub const NO_RENEWAL_DATE: &str = "No Renewal Date";

/// Lookback window for the "recently active" flag.
pub const RECENT_ACTIVITY_WINDOW_DAYS: i64 = 30;

/// The two exports being reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    /// Membership-management platform export (renewal dates live here).
    Source,
    /// Community platform export (sign-in activity lives here).
    Target,
}

impl Dataset {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Source => "membership export",
            Self::Target => "community export",
        }
    }

    pub const fn required_columns(self) -> &'static [&'static str] {
        match self {
            Self::Source => &[
                EMAIL_COLUMN,
                FIRST_NAME_COLUMN,
                LAST_NAME_COLUMN,
                RENEWAL_DUE_COLUMN,
            ],
            Self::Target => &[EMAIL_COLUMN],
        }
    }

    /// Suffix applied to a non-key header that both exports share.
    pub const fn overlap_suffix(self) -> &'static str {
        match self {
            Self::Source => "_source",
            Self::Target => "_target",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipCategory {
    Matched,
    SourceOnly,
    TargetOnly,
}

impl MembershipCategory {
    pub const fn ordered() -> [Self; 3] {
        [Self::Matched, Self::SourceOnly, Self::TargetOnly]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Matched => "both",
            Self::SourceOnly => "source_only",
            Self::TargetOnly => "target_only",
        }
    }
}

/// Calendar bucket for a matched member's renewal date.
///
/// Ordering is chronological, with the sentinel bucket after every dated one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RenewalMonth {
    Dated { year: i32, month: u32 },
    NoRenewalDate,
}

impl RenewalMonth {
    pub fn from_due(due: Option<NaiveDate>) -> Self {
        match due {
            Some(date) => Self::Dated {
                year: date.year(),
                month: date.month(),
            },
            None => Self::NoRenewalDate,
        }
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RenewalMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dated { year, month } => match NaiveDate::from_ymd_opt(*year, *month, 1) {
                Some(first) => write!(f, "{}", first.format("%B %Y")),
                None => f.write_str(NO_RENEWAL_DATE),
            },
            Self::NoRenewalDate => f.write_str(NO_RENEWAL_DATE),
        }
    }
}

/// Whether the community export carried a sign-in column at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityFeature {
    Absent,
    Present,
}

impl ActivityFeature {
    pub fn is_present(self) -> bool {
        matches!(self, Self::Present)
    }
}

/// One data row of an export after email normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRow {
    /// 1-based position among the data rows of the export.
    pub row_number: usize,
    /// Normalized email; empty when the export had no usable address.
    pub email: String,
    cells: HashMap<String, String>,
}

impl RosterRow {
    pub(crate) fn new(row_number: usize, email: String, cells: HashMap<String, String>) -> Self {
        Self {
            row_number,
            email,
            cells,
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells.get(column).map(String::as_str)
    }

    /// Key used for the join; blank emails never match anything.
    pub fn join_key(&self) -> Option<&str> {
        if self.email.is_empty() {
            None
        } else {
            Some(self.email.as_str())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRecord {
    pub category: MembershipCategory,
    pub email: String,
    pub source: Option<RosterRow>,
    pub target: Option<RosterRow>,
}

impl MemberRecord {
    pub fn source_field(&self, column: &str) -> Option<&str> {
        self.source.as_ref().and_then(|row| row.get(column))
    }

    pub fn target_field(&self, column: &str) -> Option<&str> {
        self.target.as_ref().and_then(|row| row.get(column))
    }

    pub fn first_name(&self) -> Option<&str> {
        self.source_field(FIRST_NAME_COLUMN)
            .filter(|value| !value.is_empty())
    }

    pub fn last_name(&self) -> Option<&str> {
        self.source_field(LAST_NAME_COLUMN)
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{dataset} is missing required column '{column}'")]
pub struct SchemaError {
    pub dataset: Dataset,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot format renewal message for {email}: missing {field}")]
pub struct MissingFieldError {
    pub email: String,
    pub field: &'static str,
}
