// Penalty handlers: manual application, per-citizen history, the
// auto-calculation sweep, simulation, and rule management.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::api::{
    require_admin, require_admin_or_self, required, ApiError, ApiResponse, ApiResult, AppState,
    CitizenRef,
};
use crate::entities::{Penalty, PenaltyStatus, TaxStatus};
use crate::jobs::{self, AutoCalcResult, AutoCalcSummary};
use crate::rules::{self, PenaltyEngine, PenaltyRule};
use crate::store;

// ============================================================================
// MANUAL APPLICATION
// ============================================================================

#[derive(Deserialize)]
pub struct ManualPenaltyRequest {
    tax_ids: Option<Vec<String>>,
    penalty_percentage: Option<f64>,
}

#[derive(Serialize)]
pub struct AppliedPenalty {
    penalty_id: String,
    citizen: CitizenRef,
    tax_year: i32,
    tax_amount: f64,
    penalty_amount: f64,
    applied_date: DateTime<Utc>,
    status: String,
}

#[derive(Serialize)]
pub struct ManualPenaltyData {
    total_penalties: usize,
    penalty_percentage: f64,
    penalties: Vec<AppliedPenalty>,
}

/// POST /api/penalty - Apply a percentage penalty to a batch of unpaid tax
/// records. Records already carrying an active penalty are skipped; the rest
/// flip to overdue.
pub async fn apply_manual(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ManualPenaltyRequest>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, &headers)?;

    let tax_ids = match body.tax_ids {
        Some(ids) if !ids.is_empty() => ids,
        _ => return Err(ApiError::bad_request("Tax IDs array is required")),
    };
    let percentage = match body.penalty_percentage {
        Some(pct) if pct.is_finite() && pct > 0.0 => pct,
        _ => return Err(ApiError::bad_request("Valid penalty percentage is required")),
    };

    let today = Utc::now().date_naive();
    let conn = state.db.lock().unwrap();

    let mut eligible = Vec::new();
    for tax_id in &tax_ids {
        if let Some(record) = store::find_tax_record(&conn, tax_id)? {
            if record.status != TaxStatus::Paid {
                eligible.push(record);
            }
        }
    }
    if eligible.is_empty() {
        return Err(ApiError::not_found("No eligible tax records found"));
    }

    let mut applied = Vec::new();
    for record in eligible {
        if store::has_active_penalty(&conn, &record.id)? {
            continue;
        }

        let citizen = match store::find_citizen(&conn, &record.citizen_id)? {
            Some(citizen) => citizen,
            None => {
                warn!(tax_record_id = %record.id, "tax record without citizen, skipping");
                continue;
            }
        };

        let amount = (record.amount * percentage / 100.0).round();
        let penalty = Penalty::new(
            &record.citizen_id,
            &record.id,
            amount,
            format!("Manual penalty: {}% of tax amount", percentage),
            record.days_overdue(today),
            format!("{}% of ₹{} = ₹{}", percentage, record.amount, amount),
        );
        store::insert_penalty(&conn, &penalty)?;

        if record.status == TaxStatus::Pending {
            store::set_tax_status(&conn, &record.id, TaxStatus::Overdue, None)?;
        }

        info!(
            customer_id = %citizen.customer_id,
            tax_year = record.tax_year,
            amount,
            "manual penalty applied"
        );

        applied.push(AppliedPenalty {
            penalty_id: penalty.id,
            citizen: CitizenRef::build(&conn, &citizen)?,
            tax_year: record.tax_year,
            tax_amount: record.amount,
            penalty_amount: amount,
            applied_date: penalty.applied_date,
            status: penalty.status.as_str().to_string(),
        });
    }

    Ok(Json(ApiResponse::with_message(
        format!("Penalties added for {} tax records", applied.len()),
        ManualPenaltyData {
            total_penalties: applied.len(),
            penalty_percentage: percentage,
            penalties: applied,
        },
    )))
}

// ============================================================================
// PER-CITIZEN HISTORY
// ============================================================================

#[derive(Serialize)]
pub struct PenaltySummary {
    total_penalties: usize,
    active_penalties: usize,
    paid_penalties: usize,
    waived_penalties: usize,
    total_penalty_amount: f64,
}

#[derive(Serialize)]
pub struct PenaltyHistoryRow {
    penalty_id: String,
    tax_year: i32,
    tax_amount: f64,
    penalty_amount: f64,
    reason: String,
    applied_date: DateTime<Utc>,
    status: String,
    tax_status: String,
}

#[derive(Serialize)]
pub struct PenaltyHistoryData {
    citizen_info: CitizenRef,
    penalty_summary: PenaltySummary,
    penalties: Vec<PenaltyHistoryRow>,
}

/// GET /api/penalty/:citizen_id - Penalty history with summary counts. The
/// outstanding total covers active penalties only.
pub async fn for_citizen(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(citizen_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    require_admin_or_self(&state, &headers, &citizen_id)?;

    let conn = state.db.lock().unwrap();
    let citizen = store::find_citizen(&conn, &citizen_id)?
        .ok_or_else(|| ApiError::not_found("Citizen not found"))?;

    let penalties = store::penalties_for_citizen(&conn, &citizen.id)?;

    let active = penalties
        .iter()
        .filter(|p| p.status == PenaltyStatus::Active)
        .count();
    let paid = penalties
        .iter()
        .filter(|p| p.status == PenaltyStatus::Paid)
        .count();
    let summary = PenaltySummary {
        total_penalties: penalties.len(),
        active_penalties: active,
        paid_penalties: paid,
        waived_penalties: penalties.len() - active - paid,
        total_penalty_amount: penalties
            .iter()
            .filter(|p| p.status == PenaltyStatus::Active)
            .map(|p| p.amount)
            .sum(),
    };

    let mut rows = Vec::with_capacity(penalties.len());
    for penalty in penalties {
        let Some(record) = store::find_tax_record(&conn, &penalty.tax_record_id)? else {
            warn!(penalty_id = %penalty.id, "penalty references missing tax record");
            continue;
        };

        rows.push(PenaltyHistoryRow {
            penalty_id: penalty.id,
            tax_year: record.tax_year,
            tax_amount: record.amount,
            penalty_amount: penalty.amount,
            reason: penalty.reason,
            applied_date: penalty.applied_date,
            status: penalty.status.as_str().to_string(),
            tax_status: record.status.as_str().to_string(),
        });
    }

    let citizen_info = CitizenRef::build(&conn, &citizen)?;

    Ok(Json(ApiResponse::ok(PenaltyHistoryData {
        citizen_info,
        penalty_summary: summary,
        penalties: rows,
    })))
}

// ============================================================================
// AUTO-CALCULATION
// ============================================================================

#[derive(Deserialize)]
pub struct AutoCalcRequest {
    citizen_ids: Option<Vec<String>>,
    #[serde(default)]
    dry_run: bool,
}

#[derive(Serialize)]
pub struct AutoCalcData {
    summary: AutoCalcSummary,
    results: Vec<AutoCalcResult>,
}

/// POST /api/penalty/auto-calculate - Run the rule engine over unpaid
/// past-due records, optionally narrowed to specific citizens or as a dry
/// run.
pub async fn auto_calculate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AutoCalcRequest>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, &headers)?;

    let today = Utc::now().date_naive();
    let conn = state.db.lock().unwrap();

    let engine = PenaltyEngine::from_rules(store::load_penalty_rules(&conn)?);
    let outcome = jobs::auto_calculate_penalties(
        &conn,
        &engine,
        today,
        body.citizen_ids.as_deref(),
        body.dry_run,
    )?;

    Ok(Json(ApiResponse::with_message(
        outcome.message,
        AutoCalcData {
            summary: outcome.summary,
            results: outcome.results,
        },
    )))
}

// ============================================================================
// SIMULATION
// ============================================================================

#[derive(Deserialize)]
pub struct SimulateRequest {
    tax_amount: Option<f64>,
    due_date: Option<String>,
    /// Evaluation date, defaults to today
    as_of: Option<String>,
}

#[derive(Serialize)]
pub struct SimulatedPenalty {
    amount: f64,
    rule_id: String,
    rule_name: String,
    calculation: String,
}

#[derive(Serialize)]
pub struct SimulationData {
    tax_amount: f64,
    due_date: NaiveDate,
    evaluated_on: NaiveDate,
    days_overdue: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    penalty: Option<SimulatedPenalty>,
}

/// POST /api/penalty/simulate - Preview what the rule engine would charge
/// for an amount and due date, without touching any record.
pub async fn simulate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SimulateRequest>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, &headers)?;

    let tax_amount = body
        .tax_amount
        .ok_or_else(|| ApiError::bad_request("Tax amount and due date are required"))?;
    let due_date_raw = required(body.due_date, "Tax amount and due date are required")?;

    if tax_amount <= 0.0 || !tax_amount.is_finite() {
        return Err(ApiError::bad_request("Tax amount must be greater than zero"));
    }
    let due_date = NaiveDate::parse_from_str(&due_date_raw, "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request("Invalid due date, expected YYYY-MM-DD"))?;
    let evaluated_on = match body.as_of {
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map_err(|_| ApiError::bad_request("Invalid as_of date, expected YYYY-MM-DD"))?,
        None => Utc::now().date_naive(),
    };

    let conn = state.db.lock().unwrap();
    let engine = PenaltyEngine::from_rules(store::load_penalty_rules(&conn)?);

    let assessment = engine.evaluate(tax_amount, due_date, evaluated_on);
    let message = match &assessment {
        Some(_) => "Penalty calculated",
        None => "No penalty applicable",
    };

    Ok(Json(ApiResponse::with_message(
        message,
        SimulationData {
            tax_amount,
            due_date,
            evaluated_on,
            days_overdue: rules::days_overdue(due_date, evaluated_on).max(0),
            penalty: assessment.map(|a| SimulatedPenalty {
                amount: a.amount,
                rule_id: a.rule.id,
                rule_name: a.rule.name,
                calculation: a.calculation,
            }),
        },
    )))
}

// ============================================================================
// RULE MANAGEMENT
// ============================================================================

#[derive(Serialize)]
pub struct RulesData {
    rules: Vec<PenaltyRule>,
    count: usize,
}

/// GET /api/penalty/rules - The configured rule set in evaluation order
pub async fn get_rules(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, &headers)?;

    let conn = state.db.lock().unwrap();
    let rules = store::load_penalty_rules(&conn)?;
    let count = rules.len();

    Ok(Json(ApiResponse::ok(RulesData { rules, count })))
}

#[derive(Deserialize)]
pub struct UpdateRulesRequest {
    rules: Option<Vec<PenaltyRule>>,
}

/// PUT /api/penalty/rules - Replace the rule set. Every rule must validate
/// and rule ids must be unique; the swap is atomic.
pub async fn put_rules(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<UpdateRulesRequest>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, &headers)?;

    let rules = match body.rules {
        Some(rules) if !rules.is_empty() => rules,
        _ => return Err(ApiError::bad_request("Rules array is required")),
    };

    let mut seen = HashSet::new();
    for rule in &rules {
        rule.validate().map_err(ApiError::bad_request)?;
        if !seen.insert(rule.id.clone()) {
            return Err(ApiError::bad_request(format!("Duplicate rule id: {}", rule.id)));
        }
    }

    {
        let mut conn = state.db.lock().unwrap();
        store::replace_penalty_rules(&mut conn, &rules)?;
    }

    info!(count = rules.len(), "penalty rules replaced");

    Ok(Json(ApiResponse::with_message(
        "Penalty rules updated successfully",
        RulesData {
            count: rules.len(),
            rules,
        },
    )))
}
