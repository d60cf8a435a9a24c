use super::domain::{
    ActivityFeature, MemberRecord, MembershipCategory, RenewalMonth, LAST_SIGN_IN_COLUMN,
    RECENT_ACTIVITY_WINDOW_DAYS, RENEWAL_DUE_COLUMN,
};
use super::filter::ALL_MONTHS;
use super::parser::{parse_date, parse_timestamp};
use super::reconcile::JoinedTable;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::BTreeSet;
use tracing::debug;

/// A matched member with the fields derived from its renewal and sign-in columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedMember {
    pub record: MemberRecord,
    pub renewal_due: Option<NaiveDate>,
    pub renewal_month: RenewalMonth,
    /// Only populated when the community export has a sign-in column and the cell parsed.
    pub last_active_at: Option<NaiveDateTime>,
    /// `None` when the feature is absent or this member's timestamp was blank/unreadable.
    pub active_recently: Option<bool>,
}

impl EnrichedMember {
    pub fn email(&self) -> &str {
        &self.record.email
    }

    pub fn first_name(&self) -> Option<&str> {
        self.record.first_name()
    }

    pub fn last_name(&self) -> Option<&str> {
        self.record.last_name()
    }

    pub fn has_renewal_date(&self) -> bool {
        self.renewal_due.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct EnrichedMembers {
    members: Vec<EnrichedMember>,
    activity: ActivityFeature,
    evaluated_at: NaiveDateTime,
}

impl EnrichedMembers {
    pub fn members(&self) -> &[EnrichedMember] {
        &self.members
    }

    pub fn activity(&self) -> ActivityFeature {
        self.activity
    }

    pub fn evaluated_at(&self) -> NaiveDateTime {
        self.evaluated_at
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Choices for the month filter: `All`, then each bucket present in chronological order.
    pub fn month_options(&self) -> Vec<String> {
        let buckets: BTreeSet<RenewalMonth> = self
            .members
            .iter()
            .map(|member| member.renewal_month)
            .collect();

        std::iter::once(ALL_MONTHS.to_string())
            .chain(buckets.iter().map(RenewalMonth::label))
            .collect()
    }
}

/// Derives renewal and activity fields for every matched row of `joined`.
///
/// Unreadable cells degrade to "absent" for that member only. The activity flag is derived
/// only when the community export carried a sign-in column.
pub fn enrich(joined: &JoinedTable, now: NaiveDateTime) -> EnrichedMembers {
    let activity = if joined.target_has_column(LAST_SIGN_IN_COLUMN) {
        ActivityFeature::Present
    } else {
        ActivityFeature::Absent
    };
    let active_since = now - Duration::days(RECENT_ACTIVITY_WINDOW_DAYS);

    let members = joined
        .records_in(MembershipCategory::Matched)
        .map(|record| {
            let renewal_due = renewal_due(record);
            let last_active_at = match activity {
                ActivityFeature::Present => last_active_at(record),
                ActivityFeature::Absent => None,
            };

            EnrichedMember {
                record: record.clone(),
                renewal_due,
                renewal_month: RenewalMonth::from_due(renewal_due),
                last_active_at,
                active_recently: last_active_at.map(|at| at > active_since),
            }
        })
        .collect::<Vec<_>>();

    debug!(
        matched = members.len(),
        activity_tracked = activity.is_present(),
        "enriched matched members"
    );

    EnrichedMembers {
        members,
        activity,
        evaluated_at: now,
    }
}

fn renewal_due(record: &MemberRecord) -> Option<NaiveDate> {
    let raw = record.source_field(RENEWAL_DUE_COLUMN)?;
    let parsed = parse_date(raw);
    if parsed.is_none() && !raw.trim().is_empty() {
        debug!(
            email = %record.email,
            row = record.source.as_ref().map(|row| row.row_number),
            value = raw,
            "unreadable renewal date; member treated as having none"
        );
    }
    parsed
}

fn last_active_at(record: &MemberRecord) -> Option<NaiveDateTime> {
    let raw = record.target_field(LAST_SIGN_IN_COLUMN)?;
    let parsed = parse_timestamp(raw);
    if parsed.is_none() && !raw.trim().is_empty() {
        debug!(
            email = %record.email,
            row = record.target.as_ref().map(|row| row.row_number),
            value = raw,
            "unreadable sign-in timestamp; activity treated as unknown"
        );
    }
    parsed
}
