// District administration handlers.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::{require_admin, required, ApiResponse, ApiResult, AppState};
use crate::entities::District;
use crate::store;

#[derive(Serialize)]
pub struct DistrictData {
    district_id: String,
    district_name: String,
    citizen_count: i64,
    created_at: DateTime<Utc>,
}

/// GET /api/district - All districts with citizen counts
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, &headers)?;

    let conn = state.db.lock().unwrap();
    let districts = store::list_districts(&conn)?;

    let data: Vec<DistrictData> = districts
        .into_iter()
        .map(|row| DistrictData {
            district_id: row.district.id,
            district_name: row.district.name,
            citizen_count: row.citizen_count,
            created_at: row.district.created_at,
        })
        .collect();

    Ok(Json(ApiResponse::ok(data)))
}

#[derive(Deserialize)]
pub struct CreateDistrictRequest {
    district_name: Option<String>,
}

/// POST /api/district - Create a district; duplicate names are rejected
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateDistrictRequest>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, &headers)?;

    let name = required(body.district_name, "District name is required")?;
    let district = District::new(name.trim());

    {
        let conn = state.db.lock().unwrap();
        store::insert_district(&conn, &district)?;
    }

    info!(district = %district.name, "district created");

    Ok(Json(ApiResponse::with_message(
        "District created successfully",
        DistrictData {
            district_id: district.id,
            district_name: district.name,
            citizen_count: 0,
            created_at: district.created_at,
        },
    )))
}
