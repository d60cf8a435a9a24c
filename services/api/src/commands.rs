use crate::infra::{evaluation_instant, parse_date, FilterSelection};
use chrono::NaiveDate;
use clap::Args;
use member_match::config::{AppConfig, RenewalConfig};
use member_match::error::AppError;
use member_match::telemetry::{self, LogSink};
use member_match::workflows::roster::export::{renewal_export_bytes, write_reconciliation_sheet};
use member_match::workflows::roster::report::views::MemberView;
use member_match::workflows::roster::{
    export_filename, ActivityFilter, ExportOptions, FilterSpec, JoinedTable, MemberRosterImporter,
    RenewalReport,
};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Args, Debug)]
pub(crate) struct ReconcileArgs {
    /// Membership platform export (needs Email, First name, Last name, Renewal due)
    #[arg(long)]
    pub(crate) source: PathBuf,
    /// Community platform export (needs Email; Last sign in at enables activity filtering)
    #[arg(long)]
    pub(crate) target: PathBuf,
    /// Renewal month label such as "March 2025", "No Renewal Date" or "All"
    #[arg(long)]
    pub(crate) month: Option<String>,
    /// First renewal date to include (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) start: Option<NaiveDate>,
    /// Last renewal date to include (YYYY-MM-DD). Defaults to the configured window.
    #[arg(long, value_parser = parse_date)]
    pub(crate) end: Option<NaiveDate>,
    /// Keep only members who signed in to the community recently
    #[arg(long)]
    pub(crate) active_only: bool,
    /// Override the reporting date (defaults to today)
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Leave members without a renewal date out of the export
    #[arg(long)]
    pub(crate) hide_undated: bool,
    /// Directory for the renewal export (defaults to APP_EXPORT_DIR)
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
    /// Also write every joined row, all categories, to this path
    #[arg(long)]
    pub(crate) reconciliation_sheet: Option<PathBuf>,
}

#[derive(Debug)]
pub(crate) struct ReconcileOutput {
    pub(crate) export_path: PathBuf,
    pub(crate) exported_rows: usize,
    pub(crate) sheet_path: Option<PathBuf>,
}

pub(crate) fn run_reconcile(args: ReconcileArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry, LogSink::Stderr)?;

    let output = execute(args, &config.renewals)?;
    println!(
        "\nExport written to {} ({} rows)",
        output.export_path.display(),
        output.exported_rows
    );
    if let Some(sheet) = output.sheet_path {
        println!("Reconciliation sheet written to {}", sheet.display());
    }
    Ok(())
}

fn execute(args: ReconcileArgs, renewals: &RenewalConfig) -> Result<ReconcileOutput, AppError> {
    let ReconcileArgs {
        source,
        target,
        month,
        start,
        end,
        active_only,
        today,
        hide_undated,
        output,
        reconciliation_sheet,
    } = args;

    let (today, now) = evaluation_instant(today);
    let filters = FilterSelection {
        month,
        start,
        end,
        active_only,
    }
    .to_filter_spec(today, renewals.window_days)?;
    let options = ExportOptions {
        include_undated: !hide_undated,
    };

    let outcome = MemberRosterImporter::from_paths(&source, &target, now)?;
    let report = outcome.report(&filters);
    for line in report_lines(&report, &filters, today) {
        println!("{line}");
    }

    let export = renewal_export_bytes(&report.filtered, outcome.activity(), options)?;
    let output_dir = output.unwrap_or_else(|| renewals.export_dir.clone());
    fs::create_dir_all(&output_dir)?;
    let export_path = output_dir.join(export_filename(today));
    fs::write(&export_path, export)?;
    let exported_rows = if options.include_undated {
        report.filtered.len()
    } else {
        report.filtered.with_renewal_date.len()
    };
    info!(path = %export_path.display(), rows = exported_rows, "renewal export written");

    let sheet_path = match reconciliation_sheet {
        Some(path) => {
            write_sheet(&path, &outcome.joined)?;
            Some(path)
        }
        None => None,
    };

    Ok(ReconcileOutput {
        export_path,
        exported_rows,
        sheet_path,
    })
}

fn write_sheet(path: &Path, joined: &JoinedTable) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    write_reconciliation_sheet(BufWriter::new(File::create(path)?), joined)?;
    info!(path = %path.display(), rows = joined.len(), "reconciliation sheet written");
    Ok(())
}

fn report_lines(report: &RenewalReport<'_>, filters: &FilterSpec, today: NaiveDate) -> Vec<String> {
    let summary = report.summary();
    let stats = summary.stats;
    let mut lines = vec![
        "Member reconciliation".to_string(),
        format!(
            "Membership export: {} rows | Community export: {} rows (evaluated {})",
            stats.total_source, stats.total_target, today
        ),
        format!(
            "Matched {} | Membership only {} | Community only {}",
            stats.matched, stats.source_only, stats.target_only
        ),
    ];
    if stats.duplicate_keys > 0 {
        lines.push(format!(
            "Warning: {} email(s) appear more than once in an export",
            stats.duplicate_keys
        ));
    }

    lines.push(format!("Renewal months: {}", summary.month_options.join(", ")));

    let mut applied = Vec::new();
    if let Some(month) = &filters.month {
        applied.push(format!("month {month}"));
    }
    if let Some(range) = filters.date_range {
        applied.push(format!("renewal {} -> {}", range.start(), range.end()));
    }
    match summary.activity_filter {
        ActivityFilter::Applied => applied.push("active in community".to_string()),
        ActivityFilter::SkippedFeatureAbsent => lines.push(
            "Activity filter skipped: community export has no sign-in column".to_string(),
        ),
        ActivityFilter::NotRequested => {}
    }
    if !applied.is_empty() {
        lines.push(format!("Filters: {}", applied.join(", ")));
    }

    if summary.matched_after_filters() == 0 {
        lines.push("\nNo members match the current filters.".to_string());
        return lines;
    }

    lines.push(format!(
        "\nMembers with a renewal date ({})",
        summary.with_renewal_date.len()
    ));
    lines.extend(summary.with_renewal_date.iter().map(member_line));

    if summary.without_renewal_date.is_empty() {
        lines.push("\nMembers without a renewal date: none".to_string());
    } else {
        lines.push(format!(
            "\nMembers without a renewal date ({})",
            summary.without_renewal_date.len()
        ));
        lines.extend(summary.without_renewal_date.iter().map(member_line));
    }

    lines
}

fn member_line(member: &MemberView) -> String {
    let name = [member.first_name.as_deref(), member.last_name.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    let due = member
        .renewal_due
        .map(|due| due.to_string())
        .unwrap_or_else(|| member.renewal_month.clone());
    let activity = match member.active_recently {
        Some(true) => ", active",
        Some(false) => ", inactive",
        None => "",
    };
    format!("- {} <{}>, due {}{}", name, member.email, due, activity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../crates/member-match/tests/fixtures")
            .join(name)
    }

    fn scratch_dir(label: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock after epoch")
            .as_nanos();
        std::env::temp_dir().join(format!("member-match-{label}-{nanos}"))
    }

    fn args(output: &Path) -> ReconcileArgs {
        ReconcileArgs {
            source: fixture("membership_export.csv"),
            target: fixture("community_export.csv"),
            month: None,
            start: None,
            end: None,
            active_only: false,
            today: NaiveDate::from_ymd_opt(2025, 3, 15),
            hide_undated: false,
            output: Some(output.to_path_buf()),
            reconciliation_sheet: None,
        }
    }

    fn renewals() -> RenewalConfig {
        RenewalConfig {
            export_dir: PathBuf::from("."),
            window_days: 30,
        }
    }

    #[test]
    fn reconcile_writes_dated_export_file() {
        let dir = scratch_dir("export");
        let output = execute(args(&dir), &renewals()).expect("command succeeds");

        assert_eq!(output.export_path, dir.join("member_renewals_20250315.csv"));
        assert_eq!(output.exported_rows, 3);
        let written = fs::read_to_string(&output.export_path).expect("export exists");
        assert_eq!(written.lines().count(), 4);
        assert!(written.contains("fay.ruiz@example.com"));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn hide_undated_and_sheet_flags() {
        let dir = scratch_dir("sheet");
        let sheet = dir.join("sheets").join("joined.csv");
        let mut args = args(&dir);
        args.hide_undated = true;
        args.reconciliation_sheet = Some(sheet.clone());

        let output = execute(args, &renewals()).expect("command succeeds");
        assert_eq!(output.exported_rows, 2);
        assert_eq!(output.sheet_path.as_deref(), Some(sheet.as_path()));

        let written = fs::read_to_string(&sheet).expect("sheet exists");
        assert_eq!(written.lines().count(), 10);
        assert!(!fs::read_to_string(&output.export_path)
            .expect("export exists")
            .contains("ed.ito@example.com"));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_source_file_is_reported() {
        let dir = scratch_dir("missing");
        let mut args = args(&dir);
        args.source = dir.join("absent.csv");
        let error = execute(args, &renewals()).expect_err("missing file fails");
        assert!(error.to_string().contains("membership export"));
    }

    #[test]
    fn empty_result_prints_placeholder() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 15).expect("valid date");
        let outcome = MemberRosterImporter::from_paths(
            fixture("membership_export.csv"),
            fixture("community_export.csv"),
            today.and_hms_opt(0, 0, 0).expect("valid time"),
        )
        .expect("fixtures import");
        let filters = FilterSpec::default().with_month(Some("December 2030"));
        let report = outcome.report(&filters);

        let lines = report_lines(&report, &filters, today);
        assert_eq!(
            lines.last().map(String::as_str),
            Some("\nNo members match the current filters.")
        );
        assert!(lines
            .iter()
            .any(|line| line == "Matched 5 | Membership only 2 | Community only 2"));
    }
}
