// Tax report handler.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json};
use chrono::Utc;
use serde::Deserialize;

use crate::api::{require_admin, ApiError, ApiResponse, ApiResult, AppState};
use crate::entities::TaxStatus;
use crate::report::{self, ReportFilter};

#[derive(Deserialize)]
pub struct ReportQuery {
    status: Option<String>,
    district_id: Option<String>,
    tax_year: Option<i32>,
    search: Option<String>,
}

/// GET /api/report - Filtered tax report with summary totals and per-record
/// payment and penalty context
pub async fn tax_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ReportQuery>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, &headers)?;

    let status = match query.status.as_deref() {
        Some(raw) => Some(
            TaxStatus::parse(raw)
                .ok_or_else(|| ApiError::bad_request("Invalid status filter"))?,
        ),
        None => None,
    };

    let filter = ReportFilter {
        status,
        district_id: query.district_id,
        tax_year: query.tax_year,
        search: query.search,
    };

    let conn = state.db.lock().unwrap();
    let data = report::tax_report(&conn, &filter, Utc::now().date_naive())?;

    Ok(Json(ApiResponse::ok(data)))
}
