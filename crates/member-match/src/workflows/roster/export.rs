use super::domain::{
    ActivityFeature, MissingFieldError, EMAIL_COLUMN, FIRST_NAME_COLUMN, LAST_NAME_COLUMN,
    RENEWAL_DUE_COLUMN,
};
use super::enrich::EnrichedMember;
use super::filter::FilteredMembers;
use super::reconcile::JoinedTable;
use chrono::NaiveDate;
use std::io::Write;
use tracing::debug;

pub const RENEWAL_MONTH_COLUMN: &str = "Renewal month";
pub const RENEWAL_MESSAGE_COLUMN: &str = "Renewal message";
pub const ACTIVE_COLUMN: &str = "Active in community";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to write CSV export: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to write CSV export: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    MissingField(#[from] MissingFieldError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    /// Append members without a renewal date after the dated ones.
    pub include_undated: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_undated: true,
        }
    }
}

/// Renders the reminder sent to a member ahead of their renewal date.
pub fn renewal_message(member: &EnrichedMember) -> Result<String, MissingFieldError> {
    let missing = |field| MissingFieldError {
        email: member.email().to_string(),
        field,
    };
    let first_name = member.first_name().ok_or_else(|| missing(FIRST_NAME_COLUMN))?;
    let due = member.renewal_due.ok_or_else(|| missing(RENEWAL_DUE_COLUMN))?;

    Ok(format!(
        "Hi {first_name}, your membership is due for renewal on {}. Renew before then to keep \
         your access to the community.",
        due.format("%B %-d, %Y")
    ))
}

/// `member_renewals_<YYYYMMDD>.csv`
pub fn export_filename(today: NaiveDate) -> String {
    format!("member_renewals_{}.csv", today.format("%Y%m%d"))
}

pub fn export_columns(activity: ActivityFeature) -> Vec<&'static str> {
    let mut columns = vec![
        EMAIL_COLUMN,
        FIRST_NAME_COLUMN,
        LAST_NAME_COLUMN,
        RENEWAL_DUE_COLUMN,
        RENEWAL_MONTH_COLUMN,
        RENEWAL_MESSAGE_COLUMN,
    ];
    if activity.is_present() {
        columns.push(ACTIVE_COLUMN);
    }
    columns
}

/// Writes the filtered members as CSV. Only the dated partition gets a renewal message; the
/// undated partition, when included, leaves that cell empty. A dated member without a first
/// name keeps its row with an empty message.
pub fn write_renewal_export<W: Write>(
    writer: W,
    filtered: &FilteredMembers<'_>,
    activity: ActivityFeature,
    options: ExportOptions,
) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(export_columns(activity))?;

    for member in &filtered.with_renewal_date {
        let message = match renewal_message(member) {
            Ok(message) => message,
            Err(err) if err.field == FIRST_NAME_COLUMN => {
                debug!(email = %err.email, "renewal message left blank: no first name");
                String::new()
            }
            Err(err) => return Err(err.into()),
        };
        csv_writer.write_record(export_row(member, message, activity))?;
    }

    if options.include_undated {
        for member in &filtered.without_renewal_date {
            csv_writer.write_record(export_row(member, String::new(), activity))?;
        }
    }

    csv_writer.flush()?;
    Ok(())
}

pub fn renewal_export_bytes(
    filtered: &FilteredMembers<'_>,
    activity: ActivityFeature,
    options: ExportOptions,
) -> Result<Vec<u8>, ExportError> {
    let mut buffer = Vec::new();
    write_renewal_export(&mut buffer, filtered, activity, options)?;
    Ok(buffer)
}

/// Writes every joined row (all categories) with both exports' columns side by side.
pub fn write_reconciliation_sheet<W: Write>(
    writer: W,
    joined: &JoinedTable,
) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(joined.columns())?;
    for record in joined.records() {
        csv_writer.write_record(joined.flatten(record))?;
    }
    csv_writer.flush()?;
    Ok(())
}

fn export_row(member: &EnrichedMember, message: String, activity: ActivityFeature) -> Vec<String> {
    let mut row = vec![
        member.email().to_string(),
        member.first_name().unwrap_or_default().to_string(),
        member.last_name().unwrap_or_default().to_string(),
        member
            .renewal_due
            .map(|due| due.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        member.renewal_month.label(),
        message,
    ];
    if activity.is_present() {
        row.push(
            member
                .active_recently
                .map(|active| active.to_string())
                .unwrap_or_default(),
        );
    }
    row
}
