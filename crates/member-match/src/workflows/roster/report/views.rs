use super::super::domain::ActivityFeature;
use super::super::filter::ActivityFilter;
use super::super::reconcile::ReconciliationStats;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberView {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub renewal_due: Option<NaiveDate>,
    pub renewal_month: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renewal_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_active_at: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_recently: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenewalReportSummary {
    pub stats: ReconciliationStats,
    pub evaluated_at: NaiveDateTime,
    pub activity: ActivityFeature,
    pub activity_filter: ActivityFilter,
    pub month_options: Vec<String>,
    pub with_renewal_date: Vec<MemberView>,
    pub without_renewal_date: Vec<MemberView>,
}

impl RenewalReportSummary {
    pub fn matched_after_filters(&self) -> usize {
        self.with_renewal_date.len() + self.without_renewal_date.len()
    }
}
