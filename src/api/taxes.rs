// Tax record creation and per-citizen tax history handlers.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::{
    require_admin, require_admin_or_self, required, ApiError, ApiResponse, ApiResult, AppState,
    CitizenRef,
};
use crate::entities::TaxRecord;
use crate::store;

// ============================================================================
// CREATE
// ============================================================================

#[derive(Deserialize)]
pub struct CreateTaxRequest {
    citizen_id: Option<String>,
    tax_year: Option<i32>,
    amount: Option<f64>,
    due_date: Option<String>,
}

#[derive(Serialize)]
pub struct TaxRecordData {
    tax_id: String,
    citizen: CitizenRef,
    tax_year: i32,
    amount: f64,
    due_date: NaiveDate,
    status: String,
    created_at: DateTime<Utc>,
}

/// POST /api/tax - Levy a tax on a citizen for a year. One record per
/// citizen and year.
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateTaxRequest>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, &headers)?;

    let citizen_id = required(body.citizen_id, "All fields are required")?;
    let tax_year = body
        .tax_year
        .ok_or_else(|| ApiError::bad_request("All fields are required"))?;
    let amount = body
        .amount
        .ok_or_else(|| ApiError::bad_request("All fields are required"))?;
    let due_date_raw = required(body.due_date, "All fields are required")?;

    if amount <= 0.0 || !amount.is_finite() {
        return Err(ApiError::bad_request("Amount must be greater than zero"));
    }
    let due_date = NaiveDate::parse_from_str(&due_date_raw, "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request("Invalid due date, expected YYYY-MM-DD"))?;

    let conn = state.db.lock().unwrap();
    let citizen = store::find_citizen(&conn, &citizen_id)?
        .ok_or_else(|| ApiError::not_found("Citizen not found"))?;

    let record = TaxRecord::new(&citizen.id, tax_year, amount, due_date);
    store::insert_tax_record(&conn, &record)?;

    info!(
        customer_id = %citizen.customer_id,
        tax_year,
        amount,
        "tax record created"
    );

    let citizen_ref = CitizenRef::build(&conn, &citizen)?;

    Ok(Json(ApiResponse::with_message(
        "Tax record created successfully",
        TaxRecordData {
            tax_id: record.id,
            citizen: citizen_ref,
            tax_year: record.tax_year,
            amount: record.amount,
            due_date: record.due_date,
            status: record.status.as_str().to_string(),
            created_at: record.created_at,
        },
    )))
}

// ============================================================================
// HISTORY
// ============================================================================

#[derive(Serialize)]
pub struct TaxPaymentRow {
    payment_id: String,
    payment_date: DateTime<Utc>,
    payment_mode: String,
    receipt_no: String,
    amount: f64,
    status: String,
}

#[derive(Serialize)]
pub struct TaxPenaltyRow {
    penalty_id: String,
    amount: f64,
    reason: String,
    applied_date: DateTime<Utc>,
    status: String,
}

#[derive(Serialize)]
pub struct TaxHistoryRow {
    tax_id: String,
    tax_year: i32,
    amount: f64,
    due_date: NaiveDate,
    status: String,
    payments: Vec<TaxPaymentRow>,
    penalties: Vec<TaxPenaltyRow>,
    created_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct TaxHistoryData {
    citizen: CitizenRef,
    tax_records: Vec<TaxHistoryRow>,
}

/// GET /api/tax/:citizen_id - All tax records for a citizen with their
/// payments and penalties nested. A citizen with no records gets an empty
/// list, not an error.
pub async fn for_citizen(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(citizen_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    require_admin_or_self(&state, &headers, &citizen_id)?;

    let conn = state.db.lock().unwrap();
    let citizen = store::find_citizen(&conn, &citizen_id)?
        .ok_or_else(|| ApiError::not_found("Citizen not found"))?;

    let records = store::tax_records_for_citizen(&conn, &citizen.id)?;
    let mut rows = Vec::with_capacity(records.len());

    for record in records {
        let payments = store::payments_for_record(&conn, &record.id)?
            .into_iter()
            .map(|payment| TaxPaymentRow {
                payment_id: payment.id,
                payment_date: payment.payment_date,
                payment_mode: payment.method.as_str().to_string(),
                receipt_no: payment.receipt_no,
                amount: payment.amount,
                status: payment.status.as_str().to_string(),
            })
            .collect();

        let penalties = store::penalties_for_record(&conn, &record.id)?
            .into_iter()
            .map(|penalty| TaxPenaltyRow {
                penalty_id: penalty.id,
                amount: penalty.amount,
                reason: penalty.reason,
                applied_date: penalty.applied_date,
                status: penalty.status.as_str().to_string(),
            })
            .collect();

        rows.push(TaxHistoryRow {
            tax_id: record.id,
            tax_year: record.tax_year,
            amount: record.amount,
            due_date: record.due_date,
            status: record.status.as_str().to_string(),
            payments,
            penalties,
            created_at: record.created_at,
        });
    }

    let citizen_ref = CitizenRef::build(&conn, &citizen)?;

    Ok(Json(ApiResponse::ok(TaxHistoryData {
        citizen: citizen_ref,
        tax_records: rows,
    })))
}
