// Analytics handlers for the admin and citizen dashboards.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json};
use chrono::{Datelike, Utc};
use serde::Deserialize;

use crate::analytics;
use crate::api::{require_admin, require_admin_or_self, ApiError, ApiResponse, ApiResult, AppState};

#[derive(Deserialize)]
pub struct AdminAnalyticsQuery {
    /// Reporting year, defaults to the current year
    year: Option<i32>,
}

/// GET /api/analytics/admin - Municipality-wide overview, charts, and
/// recent activity
pub async fn admin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AdminAnalyticsQuery>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, &headers)?;

    let year = query.year.unwrap_or_else(|| Utc::now().year());
    let conn = state.db.lock().unwrap();
    let data = analytics::admin_analytics(&conn, year)?;

    Ok(Json(ApiResponse::ok(data)))
}

/// GET /api/analytics/citizen/:citizen_id - One citizen's dashboard
pub async fn citizen(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(citizen_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    require_admin_or_self(&state, &headers, &citizen_id)?;

    let conn = state.db.lock().unwrap();
    let data = analytics::citizen_analytics(&conn, &citizen_id)?
        .ok_or_else(|| ApiError::not_found("Citizen not found"))?;

    Ok(Json(ApiResponse::ok(data)))
}
