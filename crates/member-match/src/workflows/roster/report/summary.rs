use super::super::enrich::{EnrichedMember, EnrichedMembers};
use super::super::export::renewal_message;
use super::super::filter::FilteredMembers;
use super::super::reconcile::ReconciliationStats;
use super::views::{MemberView, RenewalReportSummary};

/// Statistics and filtered partitions of a single reconciliation run.
#[derive(Debug, Clone)]
pub struct RenewalReport<'a> {
    pub stats: ReconciliationStats,
    pub members: &'a EnrichedMembers,
    pub filtered: FilteredMembers<'a>,
}

impl RenewalReport<'_> {
    pub fn summary(&self) -> RenewalReportSummary {
        RenewalReportSummary {
            stats: self.stats,
            evaluated_at: self.members.evaluated_at(),
            activity: self.members.activity(),
            activity_filter: self.filtered.activity_filter,
            month_options: self.members.month_options(),
            with_renewal_date: self
                .filtered
                .with_renewal_date
                .iter()
                .map(|member| member.to_view())
                .collect(),
            without_renewal_date: self
                .filtered
                .without_renewal_date
                .iter()
                .map(|member| member.to_view())
                .collect(),
        }
    }
}

impl EnrichedMember {
    /// Members without a renewal date get no message.
    pub fn to_view(&self) -> MemberView {
        let renewal_message = if self.has_renewal_date() {
            renewal_message(self).ok()
        } else {
            None
        };

        MemberView {
            email: self.email().to_string(),
            first_name: self.first_name().map(str::to_string),
            last_name: self.last_name().map(str::to_string),
            renewal_due: self.renewal_due,
            renewal_month: self.renewal_month.label(),
            renewal_message,
            last_active_at: self.last_active_at,
            active_recently: self.active_recently,
        }
    }
}
