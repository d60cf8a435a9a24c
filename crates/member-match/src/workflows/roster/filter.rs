use super::enrich::{EnrichedMember, EnrichedMembers};
use chrono::{Days, NaiveDate};
use serde::Serialize;
use tracing::debug;

/// Month filter value meaning "every bucket".
pub const ALL_MONTHS: &str = "All";

/// Width of the operator's default renewal window, starting today.
pub const DEFAULT_RENEWAL_WINDOW_DAYS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("date range starts on {start} which is after its end {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
    #[error("a window of {window_days} days from {start} runs past the last representable date")]
    WindowOutOfRange { start: NaiveDate, window_days: u32 },
}

/// Inclusive range of renewal dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, FilterError> {
        if start > end {
            return Err(FilterError::InvertedRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// `start` through `start + window_days`, both inclusive.
    pub fn spanning(start: NaiveDate, window_days: u32) -> Result<Self, FilterError> {
        let end = start
            .checked_add_days(Days::new(u64::from(window_days)))
            .ok_or(FilterError::WindowOutOfRange { start, window_days })?;
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Operator filter selection. Unset predicates do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    /// Exact renewal-month label such as `"March 2025"` or `"No Renewal Date"`.
    pub month: Option<String>,
    /// Applies to members with a renewal date only.
    pub date_range: Option<DateRange>,
    /// Ignored when the community export had no sign-in column.
    pub active_only: bool,
}

impl FilterSpec {
    /// Renewals due from `today` through the next [`DEFAULT_RENEWAL_WINDOW_DAYS`] days.
    pub fn operator_default(today: NaiveDate) -> Result<Self, FilterError> {
        Self::upcoming(today, DEFAULT_RENEWAL_WINDOW_DAYS)
    }

    pub fn upcoming(today: NaiveDate, window_days: u32) -> Result<Self, FilterError> {
        Ok(Self {
            month: None,
            date_range: Some(DateRange::spanning(today, window_days)?),
            active_only: false,
        })
    }

    /// Sets the month predicate; `All` (any case) or a blank value clears it.
    pub fn with_month(mut self, month: Option<&str>) -> Self {
        self.month = month
            .map(str::trim)
            .filter(|value| !value.is_empty() && !value.eq_ignore_ascii_case(ALL_MONTHS))
            .map(str::to_string);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityFilter {
    NotRequested,
    Applied,
    /// Requested, but the community export has no sign-in data to filter on.
    SkippedFeatureAbsent,
}

/// Members passing a [`FilterSpec`], split by whether a renewal date was parsed.
#[derive(Debug, Clone)]
pub struct FilteredMembers<'a> {
    pub with_renewal_date: Vec<&'a EnrichedMember>,
    pub without_renewal_date: Vec<&'a EnrichedMember>,
    pub activity_filter: ActivityFilter,
}

impl<'a> FilteredMembers<'a> {
    pub fn len(&self) -> usize {
        self.with_renewal_date.len() + self.without_renewal_date.len()
    }

    /// True for the "no members match the current filters" state.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a EnrichedMember> + '_ {
        self.with_renewal_date
            .iter()
            .chain(self.without_renewal_date.iter())
            .copied()
    }

    /// Orders dated members by renewal date, keeping join order among equal dates.
    pub fn sort_by_renewal(&mut self) {
        self.with_renewal_date
            .sort_by_key(|member| member.renewal_due);
    }
}

/// Partitions `members` by renewal-date presence, then keeps those satisfying every predicate
/// of `spec`. The date range only ever constrains the dated partition.
pub fn apply<'a>(members: &'a EnrichedMembers, spec: &FilterSpec) -> FilteredMembers<'a> {
    let activity_filter = match (spec.active_only, members.activity().is_present()) {
        (false, _) => ActivityFilter::NotRequested,
        (true, true) => ActivityFilter::Applied,
        (true, false) => ActivityFilter::SkippedFeatureAbsent,
    };

    let (dated, undated): (Vec<&EnrichedMember>, Vec<&EnrichedMember>) = members
        .members()
        .iter()
        .partition(|member| member.has_renewal_date());

    let shared = |member: &&EnrichedMember| {
        matches_month(member, spec.month.as_deref()) && matches_activity(member, activity_filter)
    };

    let with_renewal_date = dated
        .into_iter()
        .filter(shared)
        .filter(|member| matches_range(member, spec.date_range))
        .collect::<Vec<_>>();
    let without_renewal_date = undated.into_iter().filter(shared).collect::<Vec<_>>();

    debug!(
        with_renewal_date = with_renewal_date.len(),
        without_renewal_date = without_renewal_date.len(),
        ?activity_filter,
        "applied member filters"
    );

    FilteredMembers {
        with_renewal_date,
        without_renewal_date,
        activity_filter,
    }
}

fn matches_month(member: &EnrichedMember, month: Option<&str>) -> bool {
    month.map_or(true, |label| member.renewal_month.label() == label)
}

fn matches_range(member: &EnrichedMember, range: Option<DateRange>) -> bool {
    match (range, member.renewal_due) {
        (Some(range), Some(due)) => range.contains(due),
        _ => true,
    }
}

fn matches_activity(member: &EnrichedMember, filter: ActivityFilter) -> bool {
    match filter {
        ActivityFilter::Applied => member.active_recently == Some(true),
        ActivityFilter::NotRequested | ActivityFilter::SkippedFeatureAbsent => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::roster::domain::{Dataset, NO_RENEWAL_DATE};
    use crate::workflows::roster::enrich::enrich;
    use crate::workflows::roster::loader::normalize_table;
    use crate::workflows::roster::parser::RawTable;
    use crate::workflows::roster::reconcile::reconcile;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn raw(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|cell| cell.to_string()).collect())
                .collect(),
        )
    }

    fn members(with_activity: bool) -> EnrichedMembers {
        let source = normalize_table(
            Dataset::Source,
            &raw(
                &["Email", "First name", "Last name", "Renewal due"],
                &[
                    &["a@x.com", "Ann", "Lee", "2025-03-20"],
                    &["b@x.com", "Bo", "Park", "2025-03-05"],
                    &["c@x.com", "Cy", "Diaz", ""],
                    &["d@x.com", "Di", "Ng", "2025-05-02"],
                    &["e@x.com", "Ed", "Ito", "n/a"],
                ],
            ),
        )
        .unwrap();

        let target = if with_activity {
            raw(
                &["Email", "Last sign in at"],
                &[
                    &["a@x.com", "2025-03-10T00:00:00Z"],
                    &["b@x.com", "2024-11-01T00:00:00Z"],
                    &["c@x.com", "2025-03-12T00:00:00Z"],
                    &["d@x.com", ""],
                    &["e@x.com", "2024-01-01T00:00:00Z"],
                ],
            )
        } else {
            raw(
                &["Email"],
                &[&["a@x.com"], &["b@x.com"], &["c@x.com"], &["d@x.com"], &["e@x.com"]],
            )
        };
        let target = normalize_table(Dataset::Target, &target).unwrap();

        let now = date(2025, 3, 15).and_hms_opt(9, 0, 0).unwrap();
        enrich(&reconcile(&source, &target).joined, now)
    }

    fn emails(list: &[&EnrichedMember]) -> Vec<String> {
        list.iter().map(|member| member.email().to_string()).collect()
    }

    #[test]
    fn empty_spec_partitions_without_dropping() {
        let members = members(false);
        let filtered = apply(&members, &FilterSpec::default());
        assert_eq!(filtered.len(), members.len());
        assert_eq!(
            emails(&filtered.with_renewal_date),
            vec!["a@x.com", "b@x.com", "d@x.com"]
        );
        assert_eq!(
            emails(&filtered.without_renewal_date),
            vec!["c@x.com", "e@x.com"]
        );
        assert_eq!(filtered.activity_filter, ActivityFilter::NotRequested);
    }

    #[test]
    fn date_range_only_constrains_dated_members() {
        let members = members(false);
        let spec = FilterSpec {
            date_range: Some(DateRange::new(date(2025, 3, 5), date(2025, 3, 20)).unwrap()),
            ..FilterSpec::default()
        };
        let filtered = apply(&members, &spec);
        assert_eq!(emails(&filtered.with_renewal_date), vec!["a@x.com", "b@x.com"]);
        assert_eq!(filtered.without_renewal_date.len(), 2);
    }

    #[test]
    fn month_filter_selects_sentinel_bucket() {
        let members = members(false);
        let spec = FilterSpec::default().with_month(Some(NO_RENEWAL_DATE));
        let filtered = apply(&members, &spec);
        assert!(filtered.with_renewal_date.is_empty());
        assert_eq!(
            emails(&filtered.without_renewal_date),
            vec!["c@x.com", "e@x.com"]
        );
    }

    #[test]
    fn all_month_value_clears_the_predicate() {
        let spec = FilterSpec::default().with_month(Some(" all "));
        assert!(spec.month.is_none());
        let spec = FilterSpec::default().with_month(Some("March 2025"));
        assert_eq!(spec.month.as_deref(), Some("March 2025"));
    }

    #[test]
    fn active_only_keeps_recent_members_in_both_partitions() {
        let members = members(true);
        let spec = FilterSpec {
            active_only: true,
            ..FilterSpec::default()
        };
        let filtered = apply(&members, &spec);
        assert_eq!(filtered.activity_filter, ActivityFilter::Applied);
        assert_eq!(emails(&filtered.with_renewal_date), vec!["a@x.com"]);
        assert_eq!(emails(&filtered.without_renewal_date), vec!["c@x.com"]);
    }

    #[test]
    fn active_only_is_a_no_op_without_activity_column() {
        let members = members(false);
        let unset = apply(&members, &FilterSpec::default());
        let requested = apply(
            &members,
            &FilterSpec {
                active_only: true,
                ..FilterSpec::default()
            },
        );
        assert_eq!(requested.activity_filter, ActivityFilter::SkippedFeatureAbsent);
        assert_eq!(
            emails(&requested.with_renewal_date),
            emails(&unset.with_renewal_date)
        );
        assert_eq!(
            emails(&requested.without_renewal_date),
            emails(&unset.without_renewal_date)
        );
    }

    #[test]
    fn additional_predicates_never_grow_the_result() {
        let members = members(true);
        let range = DateRange::new(date(2025, 3, 1), date(2025, 3, 31)).unwrap();
        let specs = [
            FilterSpec::default(),
            FilterSpec {
                date_range: Some(range),
                ..FilterSpec::default()
            },
            FilterSpec {
                date_range: Some(range),
                active_only: true,
                ..FilterSpec::default()
            },
            FilterSpec {
                date_range: Some(range),
                active_only: true,
                month: Some("March 2025".to_string()),
            },
        ];

        let sizes: Vec<usize> = specs.iter().map(|spec| apply(&members, spec).len()).collect();
        assert!(sizes.windows(2).all(|pair| pair[1] <= pair[0]), "{sizes:?}");
    }

    #[test]
    fn sorting_orders_dated_members_ascending() {
        let members = members(false);
        let mut filtered = apply(&members, &FilterSpec::default());
        filtered.sort_by_renewal();
        assert_eq!(
            emails(&filtered.with_renewal_date),
            vec!["b@x.com", "a@x.com", "d@x.com"]
        );
    }

    #[test]
    fn operator_default_spans_thirty_days() {
        let spec = FilterSpec::operator_default(date(2025, 3, 1)).expect("window fits");
        let range = spec.date_range.expect("range set");
        assert_eq!(range.start(), date(2025, 3, 1));
        assert_eq!(range.end(), date(2025, 3, 31));
        assert!(spec.month.is_none());
        assert!(!spec.active_only);
    }

    #[test]
    fn oversized_window_is_an_error_not_a_panic() {
        let error = FilterSpec::upcoming(date(2025, 3, 15), u32::MAX).unwrap_err();
        assert_eq!(
            error,
            FilterError::WindowOutOfRange {
                start: date(2025, 3, 15),
                window_days: u32::MAX,
            }
        );
        assert!(DateRange::spanning(NaiveDate::MAX, 1).is_err());
    }

    #[test]
    fn inverted_range_is_rejected() {
        let error = DateRange::new(date(2025, 4, 1), date(2025, 3, 1)).unwrap_err();
        assert_eq!(
            error,
            FilterError::InvertedRange {
                start: date(2025, 4, 1),
                end: date(2025, 3, 1)
            }
        );
    }
}
