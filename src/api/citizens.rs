// Citizen registration, lookup, and per-citizen tax detail handlers.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::{
    require_admin, require_admin_or_self, required, ApiError, ApiResponse, ApiResult, AppState,
};
use crate::entities::{Citizen, TaxStatus};
use crate::store;

// ============================================================================
// PROFILE SHAPE
// ============================================================================

/// Citizen profile returned by login, verification, and detail endpoints.
#[derive(Serialize)]
pub struct CitizenProfile {
    pub citizen_id: String,
    pub customer_id: String,
    pub name: String,
    pub ward_no: String,
    pub district: String,
    pub city: String,
    pub state: String,
    pub contact_no: String,
}

impl CitizenProfile {
    pub(crate) fn build(conn: &Connection, citizen: &Citizen) -> ApiResult<Self> {
        let district = store::find_district(conn, &citizen.district_id)?
            .map(|d| d.name)
            .unwrap_or_default();

        Ok(CitizenProfile {
            citizen_id: citizen.id.clone(),
            customer_id: citizen.customer_id.clone(),
            name: citizen.name.clone(),
            ward_no: citizen.ward_no.clone(),
            district,
            city: citizen.city.clone(),
            state: citizen.state.clone(),
            contact_no: citizen.contact_no.clone(),
        })
    }
}

// ============================================================================
// LIST
// ============================================================================

#[derive(Deserialize)]
pub struct CitizenListQuery {
    district_id: Option<String>,
    search: Option<String>,
}

#[derive(Serialize)]
pub struct CitizenListData {
    citizen_id: String,
    customer_id: String,
    name: String,
    ward_no: String,
    district: String,
    city: String,
    state: String,
    contact_no: String,
    tax_records_count: i64,
    payments_count: i64,
    pending_amount: f64,
    created_at: DateTime<Utc>,
}

/// GET /api/citizen - List citizens, optionally filtered by district or a
/// search term over name, customer id, and contact number
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CitizenListQuery>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, &headers)?;

    let filter = store::CitizenFilter {
        district_id: query.district_id,
        search: query.search,
    };

    let conn = state.db.lock().unwrap();
    let rows = store::list_citizens(&conn, &filter)?;

    let data: Vec<CitizenListData> = rows
        .into_iter()
        .map(|row| CitizenListData {
            citizen_id: row.citizen.id,
            customer_id: row.citizen.customer_id,
            name: row.citizen.name,
            ward_no: row.citizen.ward_no,
            district: row.district_name,
            city: row.citizen.city,
            state: row.citizen.state,
            contact_no: row.citizen.contact_no,
            tax_records_count: row.tax_record_count,
            payments_count: row.payment_count,
            pending_amount: row.pending_amount,
            created_at: row.citizen.created_at,
        })
        .collect();

    Ok(Json(ApiResponse::ok(data)))
}

// ============================================================================
// REGISTER
// ============================================================================

#[derive(Deserialize)]
pub struct RegisterCitizenRequest {
    name: Option<String>,
    ward_no: Option<String>,
    district_id: Option<String>,
    city: Option<String>,
    state: Option<String>,
    contact_no: Option<String>,
}

#[derive(Serialize)]
pub struct RegisteredCitizen {
    #[serde(flatten)]
    profile: CitizenProfile,
    created_at: DateTime<Utc>,
}

/// POST /api/citizen - Register a citizen with a freshly minted customer id
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RegisterCitizenRequest>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, &headers)?;

    let name = required(body.name, "All fields are required")?;
    let ward_no = required(body.ward_no, "All fields are required")?;
    let district_id = required(body.district_id, "All fields are required")?;
    let city = required(body.city, "All fields are required")?;
    let state_name = required(body.state, "All fields are required")?;
    let contact_no = required(body.contact_no, "All fields are required")?;

    let conn = state.db.lock().unwrap();

    store::find_district(&conn, &district_id)?
        .ok_or_else(|| ApiError::not_found("District not found"))?;

    let customer_id = store::unique_customer_id(&conn)?;
    let citizen = Citizen::new(
        customer_id,
        name,
        ward_no,
        district_id,
        city,
        state_name,
        contact_no,
    );
    store::insert_citizen(&conn, &citizen)?;

    info!(customer_id = %citizen.customer_id, name = %citizen.name, "citizen registered");

    let profile = CitizenProfile::build(&conn, &citizen)?;

    Ok(Json(ApiResponse::with_message(
        "Citizen registered successfully",
        RegisteredCitizen {
            profile,
            created_at: citizen.created_at,
        },
    )))
}

// ============================================================================
// TAX DETAILS
// ============================================================================

#[derive(Serialize)]
pub struct TaxSummary {
    total_tax_amount: f64,
    total_paid_amount: f64,
    total_pending_amount: f64,
    total_penalties: f64,
    total_records: usize,
    paid_records: usize,
    pending_records: usize,
}

#[derive(Serialize)]
pub struct LastPayment {
    payment_date: DateTime<Utc>,
    payment_mode: String,
    receipt_no: String,
}

#[derive(Serialize)]
pub struct TaxDetailRow {
    tax_id: String,
    tax_year: i32,
    amount: f64,
    due_date: NaiveDate,
    status: String,
    is_overdue: bool,
    days_overdue: i64,
    penalty_amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_payment: Option<LastPayment>,
    created_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct TaxDetailsData {
    citizen_info: CitizenProfile,
    tax_summary: TaxSummary,
    tax_records: Vec<TaxDetailRow>,
}

/// GET /api/citizen/:citizen_id/tax - Tax position for one citizen: summary
/// totals plus per-record penalty and payment context
pub async fn tax_details(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(citizen_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    require_admin_or_self(&state, &headers, &citizen_id)?;

    let conn = state.db.lock().unwrap();
    let citizen = store::find_citizen(&conn, &citizen_id)?
        .ok_or_else(|| ApiError::not_found("Citizen not found"))?;

    let today = Utc::now().date_naive();
    let records = store::tax_records_for_citizen(&conn, &citizen.id)?;
    let penalty_totals = store::active_penalty_totals_by_record(&conn, &citizen.id)?;

    let mut rows = Vec::with_capacity(records.len());
    for record in &records {
        let penalty_amount = penalty_totals.get(&record.id).copied().unwrap_or(0.0);
        let last_payment = store::completed_payments_for_record(&conn, &record.id)?
            .into_iter()
            .next()
            .map(|payment| LastPayment {
                payment_date: payment.payment_date,
                payment_mode: payment.method.as_str().to_string(),
                receipt_no: payment.receipt_no,
            });

        rows.push(TaxDetailRow {
            tax_id: record.id.clone(),
            tax_year: record.tax_year,
            amount: record.amount,
            due_date: record.due_date,
            status: record.status.as_str().to_string(),
            is_overdue: record.is_overdue(today),
            days_overdue: record.days_overdue(today),
            penalty_amount,
            last_payment,
            created_at: record.created_at,
        });
    }

    let total_tax_amount: f64 = records.iter().map(|r| r.amount).sum();
    let total_paid_amount: f64 = records
        .iter()
        .filter(|r| r.status == TaxStatus::Paid)
        .map(|r| r.amount)
        .sum();
    let paid_records = records.iter().filter(|r| r.status == TaxStatus::Paid).count();

    let summary = TaxSummary {
        total_tax_amount,
        total_paid_amount,
        total_pending_amount: total_tax_amount - total_paid_amount,
        total_penalties: store::active_penalty_total_for_citizen(&conn, &citizen.id)?,
        total_records: records.len(),
        paid_records,
        pending_records: records.len() - paid_records,
    };

    let citizen_info = CitizenProfile::build(&conn, &citizen)?;

    Ok(Json(ApiResponse::ok(TaxDetailsData {
        citizen_info,
        tax_summary: summary,
        tax_records: rows,
    })))
}
