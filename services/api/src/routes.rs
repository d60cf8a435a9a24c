use crate::infra::{deserialize_optional_date, evaluation_instant, AppState, FilterSelection};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json, Router};
use chrono::{NaiveDate, NaiveDateTime};
use member_match::error::AppError;
use member_match::workflows::roster::export::renewal_export_bytes;
use member_match::workflows::roster::report::views::MemberView;
use member_match::workflows::roster::{
    export_filename, ActivityFeature, ActivityFilter, DateRange, ExportOptions, FilterSpec,
    MemberReconciliation, MemberRosterImporter, ReconciliationStats,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::Cursor;
use tracing::info;

#[derive(Debug, Deserialize)]
pub(crate) struct MemberReconcileRequest {
    pub(crate) source_csv: String,
    pub(crate) target_csv: String,
    #[serde(default)]
    pub(crate) month: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) start: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) end: Option<NaiveDate>,
    #[serde(default)]
    pub(crate) active_only: bool,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) today: Option<NaiveDate>,
    #[serde(default = "include_undated_default")]
    pub(crate) include_undated: bool,
}

fn include_undated_default() -> bool {
    ExportOptions::default().include_undated
}

#[derive(Debug, Serialize)]
pub(crate) struct MemberReconcileResponse {
    pub(crate) today: NaiveDate,
    pub(crate) evaluated_at: NaiveDateTime,
    pub(crate) stats: ReconciliationStats,
    pub(crate) activity: ActivityFeature,
    pub(crate) activity_filter: ActivityFilter,
    pub(crate) month_options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) month: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) date_range: Option<DateRange>,
    pub(crate) with_renewal_date: Vec<MemberView>,
    pub(crate) without_renewal_date: Vec<MemberView>,
    pub(crate) export_filename: String,
}

struct PreparedRun {
    today: NaiveDate,
    outcome: MemberReconciliation,
    filters: FilterSpec,
    options: ExportOptions,
}

fn prepare(request: MemberReconcileRequest, window_days: u32) -> Result<PreparedRun, AppError> {
    let MemberReconcileRequest {
        source_csv,
        target_csv,
        month,
        start,
        end,
        active_only,
        today,
        include_undated,
    } = request;

    let (today, now) = evaluation_instant(today);
    let filters = FilterSelection {
        month,
        start,
        end,
        active_only,
    }
    .to_filter_spec(today, window_days)?;

    let outcome = MemberRosterImporter::from_readers(
        Cursor::new(source_csv.into_bytes()),
        Cursor::new(target_csv.into_bytes()),
        now,
    )?;

    Ok(PreparedRun {
        today,
        outcome,
        filters,
        options: ExportOptions { include_undated },
    })
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/members/reconcile",
            axum::routing::post(reconcile_endpoint),
        )
        .route(
            "/api/v1/members/export",
            axum::routing::post(export_endpoint),
        )
        .layer(Extension(state))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn reconcile_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<MemberReconcileRequest>,
) -> Result<Json<MemberReconcileResponse>, AppError> {
    let PreparedRun {
        today,
        outcome,
        filters,
        options,
    } = prepare(payload, state.renewal_window_days)?;

    let summary = outcome.report(&filters).summary();
    let without_renewal_date = if options.include_undated {
        summary.without_renewal_date
    } else {
        Vec::new()
    };

    Ok(Json(MemberReconcileResponse {
        today,
        evaluated_at: summary.evaluated_at,
        stats: summary.stats,
        activity: summary.activity,
        activity_filter: summary.activity_filter,
        month_options: summary.month_options,
        month: filters.month,
        date_range: filters.date_range,
        with_renewal_date: summary.with_renewal_date,
        without_renewal_date,
        export_filename: export_filename(today),
    }))
}

pub(crate) async fn export_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<MemberReconcileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let PreparedRun {
        today,
        outcome,
        filters,
        options,
    } = prepare(payload, state.renewal_window_days)?;

    let report = outcome.report(&filters);
    let body = renewal_export_bytes(&report.filtered, outcome.activity(), options)?;
    let filename = export_filename(today);
    let content_type = mime_guess::from_path(&filename)
        .first_or_octet_stream()
        .to_string();

    info!(
        %filename,
        rows = report.filtered.len(),
        "renewal export rendered"
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    ))
}
