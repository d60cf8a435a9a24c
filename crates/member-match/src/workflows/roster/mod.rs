//! Membership-platform / community-platform roster reconciliation.
//!
//! The pipeline runs strictly forward: both exports are normalized ([`loader`]), joined on
//! email ([`reconcile`]), matched members are enriched with renewal and activity fields
//! ([`enrich`]), filtered into dated/undated partitions ([`filter`]) and finally rendered
//! ([`export`], [`report`]). Each stage returns a new value; nothing upstream is mutated.

pub mod domain;
pub mod enrich;
pub mod export;
pub mod filter;
pub mod loader;
mod normalizer;
pub mod parser;
pub mod reconcile;
pub mod report;

pub use domain::{
    ActivityFeature, Dataset, MemberRecord, MembershipCategory, MissingFieldError, RenewalMonth,
    RosterRow, SchemaError, NO_RENEWAL_DATE,
};
pub use enrich::{EnrichedMember, EnrichedMembers};
pub use export::{export_filename, renewal_message, ExportError, ExportOptions};
pub use filter::{ActivityFilter, DateRange, FilterError, FilterSpec, FilteredMembers, ALL_MONTHS};
pub use normalizer::normalize_email;
pub use parser::RawTable;
pub use reconcile::{JoinedTable, ReconciliationStats};
pub use report::RenewalReport;

use chrono::NaiveDateTime;
use std::io::Read;
use std::path::Path;

#[derive(Debug)]
pub enum RosterImportError {
    Io {
        dataset: Dataset,
        source: std::io::Error,
    },
    Csv {
        dataset: Dataset,
        source: csv::Error,
    },
    Schema(SchemaError),
}

impl std::fmt::Display for RosterImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RosterImportError::Io { dataset, source } => {
                write!(f, "failed to read {}: {}", dataset, source)
            }
            RosterImportError::Csv { dataset, source } => {
                write!(f, "invalid CSV data in {}: {}", dataset, source)
            }
            RosterImportError::Schema(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for RosterImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RosterImportError::Io { source, .. } => Some(source),
            RosterImportError::Csv { source, .. } => Some(source),
            RosterImportError::Schema(err) => Some(err),
        }
    }
}

impl From<SchemaError> for RosterImportError {
    fn from(err: SchemaError) -> Self {
        Self::Schema(err)
    }
}

/// Outcome of joining and enriching both exports. The joined table stays the source of
/// truth for statistics; filters only ever borrow from `members`.
#[derive(Debug, Clone)]
pub struct MemberReconciliation {
    pub stats: ReconciliationStats,
    pub joined: JoinedTable,
    pub members: EnrichedMembers,
}

impl MemberReconciliation {
    pub fn filter(&self, spec: &FilterSpec) -> FilteredMembers<'_> {
        filter::apply(&self.members, spec)
    }

    /// Filters with `spec` and orders the dated partition by renewal date.
    pub fn report(&self, spec: &FilterSpec) -> RenewalReport<'_> {
        let mut filtered = self.filter(spec);
        filtered.sort_by_renewal();
        RenewalReport {
            stats: self.stats,
            members: &self.members,
            filtered,
        }
    }

    pub fn activity(&self) -> ActivityFeature {
        self.members.activity()
    }
}

pub struct MemberRosterImporter;

impl MemberRosterImporter {
    pub fn from_paths<S: AsRef<Path>, T: AsRef<Path>>(
        source: S,
        target: T,
        now: NaiveDateTime,
    ) -> Result<MemberReconciliation, RosterImportError> {
        let source_file = open(Dataset::Source, source.as_ref())?;
        let target_file = open(Dataset::Target, target.as_ref())?;
        Self::from_readers(source_file, target_file, now)
    }

    pub fn from_readers<S: Read, T: Read>(
        source: S,
        target: T,
        now: NaiveDateTime,
    ) -> Result<MemberReconciliation, RosterImportError> {
        let source = read_table(Dataset::Source, source)?;
        let target = read_table(Dataset::Target, target)?;
        Self::from_tables(&source, &target, now)
    }

    /// Runs the pipeline on already-decoded tables. Only schema problems abort; unreadable
    /// cells are absorbed per row.
    pub fn from_tables(
        source: &RawTable,
        target: &RawTable,
        now: NaiveDateTime,
    ) -> Result<MemberReconciliation, RosterImportError> {
        let source = loader::normalize_table(Dataset::Source, source)?;
        let target = loader::normalize_table(Dataset::Target, target)?;

        let reconcile::Reconciliation { joined, stats } = reconcile::reconcile(&source, &target);
        let members = enrich::enrich(&joined, now);

        Ok(MemberReconciliation {
            stats,
            joined,
            members,
        })
    }
}

fn open(dataset: Dataset, path: &Path) -> Result<std::fs::File, RosterImportError> {
    std::fs::File::open(path).map_err(|source| RosterImportError::Io { dataset, source })
}

fn read_table<R: Read>(dataset: Dataset, reader: R) -> Result<RawTable, RosterImportError> {
    RawTable::from_reader(reader).map_err(|source| RosterImportError::Csv { dataset, source })
}
