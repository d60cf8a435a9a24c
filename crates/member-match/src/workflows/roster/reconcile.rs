use super::domain::{Dataset, MemberRecord, MembershipCategory, EMAIL_COLUMN};
use super::loader::RosterTable;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// Column name carrying the join category in the flattened reconciliation sheet.
pub const CATEGORY_COLUMN: &str = "membership_category";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationStats {
    pub total_source: usize,
    pub total_target: usize,
    pub matched: usize,
    pub source_only: usize,
    pub target_only: usize,
    /// Keys that occur more than once within either export. While non-zero, matched rows are a
    /// cross product and `matched + source_only` may exceed `total_source`.
    pub duplicate_keys: usize,
}

impl ReconciliationStats {
    pub fn joined_rows(&self) -> usize {
        self.matched + self.source_only + self.target_only
    }
}

/// Full outer join of both exports. The table itself is never modified after the join.
#[derive(Debug, Clone)]
pub struct JoinedTable {
    source_headers: Vec<String>,
    target_headers: Vec<String>,
    records: Vec<MemberRecord>,
}

impl JoinedTable {
    pub fn records(&self) -> &[MemberRecord] {
        &self.records
    }

    pub fn records_in(
        &self,
        category: MembershipCategory,
    ) -> impl Iterator<Item = &MemberRecord> + '_ {
        self.records
            .iter()
            .filter(move |record| record.category == category)
    }

    pub fn count(&self, category: MembershipCategory) -> usize {
        self.records_in(category).count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn target_has_column(&self, column: &str) -> bool {
        self.target_headers.iter().any(|header| header == column)
    }

    /// Headers of the flattened view: the key, source columns, target columns, then the
    /// category. Headers present in both exports are suffixed with their origin.
    pub fn columns(&self) -> Vec<String> {
        let mut columns = vec![EMAIL_COLUMN.to_string()];
        columns.extend(
            self.flattened_columns(Dataset::Source)
                .into_iter()
                .map(|(_, name)| name),
        );
        columns.extend(
            self.flattened_columns(Dataset::Target)
                .into_iter()
                .map(|(_, name)| name),
        );
        columns.push(CATEGORY_COLUMN.to_string());
        columns
    }

    /// Values of `record` aligned with [`JoinedTable::columns`]. Columns from the side a record
    /// lacks are left blank.
    pub fn flatten(&self, record: &MemberRecord) -> Vec<String> {
        let mut values = vec![record.email.clone()];
        for (header, _) in self.flattened_columns(Dataset::Source) {
            values.push(record.source_field(header).unwrap_or_default().to_string());
        }
        for (header, _) in self.flattened_columns(Dataset::Target) {
            values.push(record.target_field(header).unwrap_or_default().to_string());
        }
        values.push(record.category.label().to_string());
        values
    }

    fn flattened_columns(&self, dataset: Dataset) -> Vec<(&str, String)> {
        let (own, other) = match dataset {
            Dataset::Source => (&self.source_headers, &self.target_headers),
            Dataset::Target => (&self.target_headers, &self.source_headers),
        };

        own.iter()
            .filter(|header| header.as_str() != EMAIL_COLUMN)
            .map(|header| {
                let name = if other.contains(header) {
                    format!("{header}{}", dataset.overlap_suffix())
                } else {
                    header.clone()
                };
                (header.as_str(), name)
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub joined: JoinedTable,
    pub stats: ReconciliationStats,
}

/// Full outer join on the normalized email.
///
/// Each source row yields one matched row per target row sharing its key, or a single
/// source-only row. Target rows that never matched follow in input order.
pub fn reconcile(source: &RosterTable, target: &RosterTable) -> Reconciliation {
    let mut target_index: HashMap<&str, Vec<usize>> = HashMap::new();
    for (index, row) in target.rows.iter().enumerate() {
        if let Some(key) = row.join_key() {
            target_index.entry(key).or_default().push(index);
        }
    }

    let mut target_matched = vec![false; target.rows.len()];
    let mut records = Vec::with_capacity(source.rows.len() + target.rows.len());

    for row in &source.rows {
        match row.join_key().and_then(|key| target_index.get(key)) {
            Some(indices) => {
                for &index in indices {
                    target_matched[index] = true;
                    records.push(MemberRecord {
                        category: MembershipCategory::Matched,
                        email: row.email.clone(),
                        source: Some(row.clone()),
                        target: Some(target.rows[index].clone()),
                    });
                }
            }
            None => records.push(MemberRecord {
                category: MembershipCategory::SourceOnly,
                email: row.email.clone(),
                source: Some(row.clone()),
                target: None,
            }),
        }
    }

    for (row, matched) in target.rows.iter().zip(&target_matched) {
        if !matched {
            records.push(MemberRecord {
                category: MembershipCategory::TargetOnly,
                email: row.email.clone(),
                source: None,
                target: Some(row.clone()),
            });
        }
    }

    let joined = JoinedTable {
        source_headers: source.headers.clone(),
        target_headers: target.headers.clone(),
        records,
    };

    let duplicate_keys = duplicate_key_count(source, target);
    let stats = ReconciliationStats {
        total_source: source.len(),
        total_target: target.len(),
        matched: joined.count(MembershipCategory::Matched),
        source_only: joined.count(MembershipCategory::SourceOnly),
        target_only: joined.count(MembershipCategory::TargetOnly),
        duplicate_keys,
    };

    if duplicate_keys > 0 {
        warn!(
            duplicate_keys,
            "duplicate emails present; matched rows include every pairing"
        );
    }
    info!(
        total_source = stats.total_source,
        total_target = stats.total_target,
        matched = stats.matched,
        source_only = stats.source_only,
        target_only = stats.target_only,
        "reconciled member exports"
    );

    Reconciliation { joined, stats }
}

fn duplicate_key_count(source: &RosterTable, target: &RosterTable) -> usize {
    let mut duplicated: HashSet<&str> = HashSet::new();
    for table in [source, target] {
        let mut seen: HashSet<&str> = HashSet::new();
        for key in table.rows.iter().filter_map(|row| row.join_key()) {
            if !seen.insert(key) {
                duplicated.insert(key);
            }
        }
    }
    duplicated.len()
}
