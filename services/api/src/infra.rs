use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use member_match::workflows::roster::{DateRange, FilterError, FilterSpec};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    /// Days covered by the default renewal date range.
    pub(crate) renewal_window_days: u32,
}

/// Filter choices shared by the CLI flags and the HTTP request body.
#[derive(Debug, Clone, Default)]
pub(crate) struct FilterSelection {
    pub(crate) month: Option<String>,
    pub(crate) start: Option<NaiveDate>,
    pub(crate) end: Option<NaiveDate>,
    pub(crate) active_only: bool,
}

impl FilterSelection {
    /// Without explicit bounds the range covers `today` plus `window_days`. A lone bound is
    /// completed from `today` or from the window.
    pub(crate) fn to_filter_spec(
        &self,
        today: NaiveDate,
        window_days: u32,
    ) -> Result<FilterSpec, FilterError> {
        let base = match (self.start, self.end) {
            (None, None) => FilterSpec::upcoming(today, window_days)?,
            (start, end) => {
                let start = start.unwrap_or(today);
                let range = match end {
                    Some(end) => DateRange::new(start, end)?,
                    None => DateRange::spanning(start, window_days)?,
                };
                FilterSpec {
                    date_range: Some(range),
                    ..FilterSpec::default()
                }
            }
        };

        Ok(FilterSpec {
            active_only: self.active_only,
            ..base.with_month(self.month.as_deref())
        })
    }
}

/// Resolves the reporting date and the instant recency is measured from. An overridden
/// date is evaluated as of the start of that day.
pub(crate) fn evaluation_instant(today: Option<NaiveDate>) -> (NaiveDate, NaiveDateTime) {
    match today {
        Some(day) => (day, day.and_time(NaiveTime::MIN)),
        None => (Local::now().date_naive(), Utc::now().naive_utc()),
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn deserialize_optional_date<'de, D>(
    deserializer: D,
) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    opt.filter(|value| !value.trim().is_empty())
        .map(|value| parse_date(&value).map_err(serde::de::Error::custom))
        .transpose()
}
