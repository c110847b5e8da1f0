// HTTP handlers: query string -> criteria -> analysis -> rendered response

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};

use crate::analysis;
use crate::error::AnalyticsError;
use crate::models::{
    AnalysisResult, ApiResponse, Pagination, ReportFormat, SegmentKind, SegmentSelection,
};
use crate::render::render_envelope;
use crate::segmentation::{SegmentParams, SegmentationCriteria};
use crate::store::ActivityConnection;
use crate::{ApiError, AppState};

/// Resolve criteria against the database's date, so "today" is the calendar
/// the activity rows were written in. Taken once per report.
async fn criteria_for(
    conn: &mut dyn ActivityConnection,
    state: &AppState,
    params: &SegmentParams,
) -> Result<SegmentationCriteria, AnalyticsError> {
    let reference_date = conn.current_date().await?;
    Ok(SegmentationCriteria::from_params(
        params,
        state.default_threshold_days,
        reference_date,
    ))
}

fn respond(
    result: AnalysisResult,
    format: ReportFormat,
    message: String,
    pagination: Option<Pagination>,
) -> Result<Response, ApiError> {
    let mut envelope = ApiResponse::ok(result).with_message(message);
    if let Some(pagination) = pagination {
        envelope = envelope.with_pagination(pagination);
    }
    let rendered = render_envelope(&envelope, format)
        .map_err(|e| ApiError::new("Failed to render report", e))?;
    Ok(([(header::CONTENT_TYPE, rendered.content_type)], rendered.body).into_response())
}

async fn build_report(
    conn: &mut dyn ActivityConnection,
    state: &AppState,
    params: &SegmentParams,
) -> Result<(AnalysisResult, SegmentationCriteria), AnalyticsError> {
    let mut criteria = criteria_for(conn, state, params).await?;
    criteria.page = 1;

    info!(
        "High-value report: selection={:?} minNetBet={} threshold={}d limit={} details={} date={}",
        criteria.selection,
        criteria.min_net_bet,
        criteria.threshold_days,
        criteria.limit,
        criteria.show_details,
        criteria.reference_date
    );

    let result = analysis::analyze(conn, &criteria).await?;
    Ok((result, criteria))
}

/// Full high-value report: both segments by default, optional event effects.
pub async fn high_value_report(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SegmentParams>,
) -> Result<Response, ApiError> {
    let mut conn = state
        .store
        .acquire()
        .await
        .map_err(|e| ApiError::new("Failed to build high-value report", e))?;
    let outcome = build_report(conn.as_mut(), &state, &params).await;
    drop(conn);

    let (result, criteria) =
        outcome.map_err(|e| ApiError::new("Failed to build high-value report", e))?;
    let message = format!("Found {} high-value users", result.summary.count);
    respond(result, criteria.format, message, None)
}

async fn build_page(
    conn: &mut dyn ActivityConnection,
    state: &AppState,
    params: &SegmentParams,
    kind: SegmentKind,
) -> Result<(AnalysisResult, Pagination, ReportFormat), AnalyticsError> {
    let selection = match kind {
        SegmentKind::Active => SegmentSelection::Active,
        SegmentKind::Dormant => SegmentSelection::Dormant,
    };
    let criteria = criteria_for(conn, state, params)
        .await?
        .with_selection(selection);
    let (result, pagination) = analysis::analyze_page(conn, kind, &criteria).await?;
    Ok((result, pagination, criteria.format))
}

async fn segment_page(
    state: &AppState,
    params: &SegmentParams,
    kind: SegmentKind,
) -> Result<Response, ApiError> {
    let context = match kind {
        SegmentKind::Active => "Failed to fetch active high-value users",
        SegmentKind::Dormant => "Failed to fetch dormant high-value users",
    };

    let mut conn = state
        .store
        .acquire()
        .await
        .map_err(|e| ApiError::new(context, e))?;
    let outcome = build_page(conn.as_mut(), state, params, kind).await;
    drop(conn);

    let (result, pagination, format) = outcome.map_err(|e| ApiError::new(context, e))?;
    let message = format!(
        "Found {} {} high-value users",
        pagination.total,
        kind.as_str()
    );
    respond(result, format, message, Some(pagination))
}

/// Active segment: `inactiveDays < threshold`, most recent activity first.
pub async fn active_users(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SegmentParams>,
) -> Result<Response, ApiError> {
    segment_page(&state, &params, SegmentKind::Active).await
}

/// Dormant segment: `inactiveDays >= threshold`, longest inactive first.
pub async fn dormant_users(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SegmentParams>,
) -> Result<Response, ApiError> {
    segment_page(&state, &params, SegmentKind::Dormant).await
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let db_health = match state.store.acquire().await {
        Ok(mut conn) => conn.ping().await.is_ok(),
        Err(e) => {
            error!("Health check could not reach database: {}", e);
            false
        }
    };

    let (status_code, status) = if db_health {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status_code,
        Json(serde_json::json!({
            "status": status,
            "timestamp": Utc::now().to_rfc3339(),
            "database": if db_health { "up" } else { "down" },
        })),
    )
}

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::failure("Not found", "no such endpoint")),
    )
}
