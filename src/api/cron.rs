// Scheduled-job trigger handlers. The server also runs these sweeps on a
// timer; the endpoints let an external scheduler or an admin drive them.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json};
use chrono::Utc;

use crate::api::{require_admin, ApiResponse, ApiResult, AppState};
use crate::jobs;
use crate::rules::PenaltyEngine;
use crate::store;

/// POST /api/cron/check-overdue - Flip past-due records to overdue, apply
/// penalties through the rule engine, and log reminder notifications
pub async fn check_overdue(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, &headers)?;

    let conn = state.db.lock().unwrap();
    let engine = PenaltyEngine::from_rules(store::load_penalty_rules(&conn)?);
    let sweep = jobs::check_overdue_taxes(&conn, &engine, Utc::now().date_naive())?;

    Ok(Json(ApiResponse::with_message(
        "Overdue check completed",
        sweep,
    )))
}

/// POST /api/cron/weekly-reminders - Send the weekly unpaid-balance
/// reminders
pub async fn weekly_reminders(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, &headers)?;

    let conn = state.db.lock().unwrap();
    let sweep = jobs::send_weekly_reminders(&conn, Utc::now().date_naive())?;

    Ok(Json(ApiResponse::with_message(
        "Weekly reminders sent",
        sweep,
    )))
}
