// Payment handlers: counter payments, online checkout sessions, gateway
// verification, webhooks, history, and receipts.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::api::citizens::CitizenProfile;
use crate::api::{
    require_admin_or_self, require_citizen, require_session, required, ApiError, ApiResponse,
    ApiResult, AppState, CitizenRef,
};
use crate::auth::Role;
use crate::entities::{Payment, PaymentMethod, PaymentStatus, PenaltyStatus, TaxStatus};
use crate::store;

/// Compare money amounts at paise precision.
fn amounts_match(a: f64, b: f64) -> bool {
    (a * 100.0).round() == (b * 100.0).round()
}

// ============================================================================
// DIRECT PAYMENT
// ============================================================================

#[derive(Deserialize)]
pub struct PaymentRequest {
    tax_id: Option<String>,
    payment_mode: Option<String>,
    amount: Option<f64>,
}

#[derive(Serialize)]
pub struct AmountBreakdown {
    tax_amount: f64,
    penalty_amount: f64,
    total_amount: f64,
}

#[derive(Serialize)]
pub struct PaymentData {
    payment_id: String,
    receipt_no: String,
    tax_id: String,
    citizen: CitizenRef,
    tax_year: i32,
    payment_date: DateTime<Utc>,
    payment_mode: String,
    amount_breakdown: AmountBreakdown,
    status: String,
}

/// POST /api/payment - Record a payment for a tax record. The amount must
/// cover the tax plus every active penalty exactly; the record and its
/// penalties settle together.
pub async fn record_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<PaymentRequest>,
) -> ApiResult<impl IntoResponse> {
    let session = require_session(&state, &headers)?;

    let tax_id = required(body.tax_id, "Tax ID, payment mode, and amount are required")?;
    let payment_mode = required(body.payment_mode, "Tax ID, payment mode, and amount are required")?;
    let amount = body
        .amount
        .ok_or_else(|| ApiError::bad_request("Tax ID, payment mode, and amount are required"))?;

    let method = PaymentMethod::parse(&payment_mode)
        .ok_or_else(|| ApiError::bad_request("Payment mode must be 'online' or 'offline'"))?;

    let mut conn = state.db.lock().unwrap();
    let record = store::find_tax_record(&conn, &tax_id)?
        .ok_or_else(|| ApiError::not_found("Tax record not found"))?;

    if session.role == Role::Citizen && session.subject_id != record.citizen_id {
        return Err(ApiError::forbidden("Access denied"));
    }
    if record.status == TaxStatus::Paid {
        return Err(ApiError::conflict("Tax already paid"));
    }

    let penalty_amount = store::active_penalty_total_for_record(&conn, &record.id)?;
    let total_amount = record.amount + penalty_amount;

    if !amounts_match(amount, total_amount) {
        return Err(
            ApiError::bad_request("Payment amount mismatch").with_details(json!({
                "expected_amount": total_amount,
                "breakdown": {
                    "tax_amount": record.amount,
                    "penalty_amount": penalty_amount,
                    "total_amount": total_amount,
                },
            })),
        );
    }

    let payment = store::record_direct_payment(&mut conn, &record, method, total_amount)?;

    info!(
        receipt_no = %payment.receipt_no,
        tax_id = %record.id,
        amount = total_amount,
        "payment recorded"
    );

    let citizen = store::find_citizen(&conn, &record.citizen_id)?
        .ok_or_else(|| ApiError::not_found("Citizen not found"))?;
    let citizen_ref = CitizenRef::build(&conn, &citizen)?;

    Ok(Json(ApiResponse::with_message(
        "Payment processed successfully",
        PaymentData {
            payment_id: payment.id,
            receipt_no: payment.receipt_no,
            tax_id: record.id,
            citizen: citizen_ref,
            tax_year: record.tax_year,
            payment_date: payment.payment_date,
            payment_mode: payment.method.as_str().to_string(),
            amount_breakdown: AmountBreakdown {
                tax_amount: record.amount,
                penalty_amount,
                total_amount,
            },
            status: payment.status.as_str().to_string(),
        },
    )))
}

// ============================================================================
// ONLINE CHECKOUT
// ============================================================================

#[derive(Deserialize)]
pub struct OnlinePaymentRequest {
    tax_record_id: Option<String>,
}

#[derive(Serialize)]
pub struct OnlinePaymentData {
    payment_id: String,
    amount: f64,
    tax_amount: f64,
    penalty_amount: f64,
    receipt_no: String,
    session_id: String,
    payment_url: String,
    expires_at: DateTime<Utc>,
}

/// POST /api/payment/online - Open a gateway checkout session for a
/// citizen's own tax record. A pending payment row tracks the session until
/// verification or a webhook settles it.
pub async fn start_online(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<OnlinePaymentRequest>,
) -> ApiResult<impl IntoResponse> {
    let session = require_citizen(&state, &headers)?;
    let tax_record_id = required(body.tax_record_id, "Tax record ID is required")?;

    let conn = state.db.lock().unwrap();
    let record = store::find_tax_record(&conn, &tax_record_id)?
        .ok_or_else(|| ApiError::not_found("Tax record not found"))?;

    if record.citizen_id != session.subject_id {
        return Err(ApiError::forbidden("Access denied"));
    }
    if record.status == TaxStatus::Paid {
        return Err(ApiError::conflict("Tax already paid"));
    }

    let penalty_amount = store::active_penalty_total_for_record(&conn, &record.id)?;
    let total_amount = record.amount + penalty_amount;

    let checkout = state
        .gateway
        .create_session(total_amount, &format!("Tax Payment - {}", record.tax_year));

    let receipt_no = store::unique_receipt_no(&conn)?;
    let payment = Payment::pending_online(
        &record.id,
        &record.citizen_id,
        total_amount,
        receipt_no,
        checkout.session_id.clone(),
    );
    store::insert_payment(&conn, &payment)?;

    info!(
        session_id = %checkout.session_id,
        tax_id = %record.id,
        amount = total_amount,
        "online payment session opened"
    );

    Ok(Json(ApiResponse::with_message(
        "Payment session created successfully",
        OnlinePaymentData {
            payment_id: payment.id,
            amount: total_amount,
            tax_amount: record.amount,
            penalty_amount,
            receipt_no: payment.receipt_no,
            session_id: checkout.session_id,
            payment_url: checkout.payment_url,
            expires_at: checkout.expires_at,
        },
    )))
}

// ============================================================================
// VERIFICATION
// ============================================================================

#[derive(Deserialize)]
pub struct VerifyPaymentRequest {
    payment_id: Option<String>,
    session_id: Option<String>,
}

#[derive(Serialize)]
pub struct VerifiedCitizen {
    name: String,
    customer_id: String,
}

#[derive(Serialize)]
pub struct VerifiedTaxRecord {
    tax_year: i32,
    amount: f64,
}

#[derive(Serialize)]
pub struct VerifiedPaymentData {
    payment_id: String,
    status: String,
    receipt_no: String,
    amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    payment_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    citizen: Option<VerifiedCitizen>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tax_record: Option<VerifiedTaxRecord>,
}

/// POST /api/payment/verify - Confirm a pending online payment against the
/// gateway and settle it. Called by the checkout return page, so it carries
/// no session token. Verifying a settled payment is a no-op success.
pub async fn verify(
    State(state): State<AppState>,
    Json(body): Json<VerifyPaymentRequest>,
) -> ApiResult<impl IntoResponse> {
    if body.payment_id.is_none() && body.session_id.is_none() {
        return Err(ApiError::bad_request("Payment ID or session ID is required"));
    }

    let mut conn = state.db.lock().unwrap();
    let payment = match &body.session_id {
        Some(session_id) => store::find_payment_by_session(&conn, session_id)?,
        None => match &body.payment_id {
            Some(payment_id) => store::find_payment(&conn, payment_id)?,
            None => None,
        },
    }
    .ok_or_else(|| ApiError::not_found("Payment record not found"))?;

    if payment.status == PaymentStatus::Completed {
        return Ok(Json(ApiResponse::with_message(
            "Payment already verified",
            VerifiedPaymentData {
                payment_id: payment.id,
                status: payment.status.as_str().to_string(),
                receipt_no: payment.receipt_no,
                amount: payment.amount,
                payment_date: None,
                citizen: None,
                tax_record: None,
            },
        )));
    }

    let reference = payment
        .gateway_session_id
        .clone()
        .unwrap_or_else(|| payment.id.clone());
    let verification = state.gateway.verify(&reference);

    if !verification.verified {
        store::mark_pending_payment(&conn, &payment.id, PaymentStatus::Failed)?;
        return Err(ApiError::bad_request("Payment verification failed"));
    }

    let settled = store::complete_pending_payment(
        &mut conn,
        &payment.id,
        &verification.payment_id,
        &verification.transaction_id,
    )?;

    info!(receipt_no = %settled.receipt_no, "online payment verified and settled");

    let citizen = store::find_citizen(&conn, &settled.citizen_id)?.map(|c| VerifiedCitizen {
        name: c.name,
        customer_id: c.customer_id,
    });
    let tax_record =
        store::find_tax_record(&conn, &settled.tax_record_id)?.map(|r| VerifiedTaxRecord {
            tax_year: r.tax_year,
            amount: r.amount,
        });

    Ok(Json(ApiResponse::with_message(
        "Payment verified and completed successfully",
        VerifiedPaymentData {
            payment_id: settled.id,
            status: settled.status.as_str().to_string(),
            receipt_no: settled.receipt_no,
            amount: settled.amount,
            payment_date: Some(settled.payment_date),
            citizen,
            tax_record,
        },
    )))
}

// ============================================================================
// WEBHOOK
// ============================================================================

#[derive(Deserialize)]
pub struct WebhookPayload {
    session_id: Option<String>,
    payment_id: Option<String>,
    transaction_id: Option<String>,
}

#[derive(Deserialize)]
pub struct WebhookRequest {
    event: Option<String>,
    data: Option<WebhookPayload>,
}

#[derive(Serialize)]
pub struct WebhookAck {
    received: bool,
    event: String,
}

/// POST /api/payment/webhook - Gateway notifications, authenticated by the
/// shared-secret signature header. Only pending payments transition; replays
/// and unknown events are acknowledged without effect.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<WebhookRequest>,
) -> ApiResult<impl IntoResponse> {
    let signature = headers
        .get("x-webhook-signature")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if !state.gateway.verify_webhook_signature(signature) {
        return Err(ApiError::unauthorized("Invalid webhook signature"));
    }

    let event = required(body.event, "Webhook event is required")?;
    let payload = body.data.unwrap_or(WebhookPayload {
        session_id: None,
        payment_id: None,
        transaction_id: None,
    });

    let mut conn = state.db.lock().unwrap();
    match event.as_str() {
        "payment.completed" => {
            let session_id = payload
                .session_id
                .ok_or_else(|| ApiError::bad_request("Session ID is required"))?;

            if let Some(payment) = store::find_payment_by_session(&conn, &session_id)? {
                if payment.status == PaymentStatus::Pending {
                    let gateway_payment_id = payload.payment_id.unwrap_or_default();
                    let gateway_transaction_id = payload.transaction_id.unwrap_or_default();
                    store::complete_pending_payment(
                        &mut conn,
                        &payment.id,
                        &gateway_payment_id,
                        &gateway_transaction_id,
                    )?;
                    info!(session_id = %session_id, "webhook settled payment");
                }
            }
        }
        "payment.failed" => {
            let session_id = payload
                .session_id
                .ok_or_else(|| ApiError::bad_request("Session ID is required"))?;

            if let Some(payment) = store::find_payment_by_session(&conn, &session_id)? {
                if store::mark_pending_payment(&conn, &payment.id, PaymentStatus::Failed)? {
                    info!(session_id = %session_id, "webhook marked payment failed");
                }
            }
        }
        "payment.expired" => {
            let session_id = payload
                .session_id
                .ok_or_else(|| ApiError::bad_request("Session ID is required"))?;

            if let Some(payment) = store::find_payment_by_session(&conn, &session_id)? {
                if store::mark_pending_payment(&conn, &payment.id, PaymentStatus::Expired)? {
                    info!(session_id = %session_id, "webhook marked payment expired");
                }
            }
        }
        other => {
            warn!(event = %other, "unhandled webhook event");
        }
    }

    Ok(Json(ApiResponse::with_message(
        "Webhook processed",
        WebhookAck {
            received: true,
            event,
        },
    )))
}

// ============================================================================
// HISTORY
// ============================================================================

#[derive(Serialize)]
pub struct PaymentSummary {
    total_payments: usize,
    total_amount: f64,
    online_payments: usize,
    offline_payments: usize,
}

#[derive(Serialize)]
pub struct PaymentHistoryRow {
    payment_id: String,
    receipt_no: String,
    tax_year: i32,
    payment_date: DateTime<Utc>,
    payment_mode: String,
    amount: f64,
    status: String,
    tax_amount: f64,
}

#[derive(Serialize)]
pub struct PaymentHistoryData {
    citizen_info: CitizenRef,
    payment_summary: PaymentSummary,
    payments: Vec<PaymentHistoryRow>,
}

/// GET /api/payment/:citizen_id - Payment history with summary counts.
/// Citizens with no payments get empty data, not an error.
pub async fn history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(citizen_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    require_admin_or_self(&state, &headers, &citizen_id)?;

    let conn = state.db.lock().unwrap();
    let citizen = store::find_citizen(&conn, &citizen_id)?
        .ok_or_else(|| ApiError::not_found("Citizen not found"))?;

    let payments = store::payments_for_citizen(&conn, &citizen.id)?;

    let total_amount: f64 = payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Completed)
        .map(|p| p.amount)
        .sum();
    let online_payments = payments
        .iter()
        .filter(|p| p.method == PaymentMethod::Online)
        .count();

    let summary = PaymentSummary {
        total_payments: payments.len(),
        total_amount,
        online_payments,
        offline_payments: payments.len() - online_payments,
    };

    let mut rows = Vec::with_capacity(payments.len());
    for payment in payments {
        let Some(record) = store::find_tax_record(&conn, &payment.tax_record_id)? else {
            warn!(payment_id = %payment.id, "payment references missing tax record");
            continue;
        };

        rows.push(PaymentHistoryRow {
            payment_id: payment.id,
            receipt_no: payment.receipt_no,
            tax_year: record.tax_year,
            payment_date: payment.payment_date,
            payment_mode: payment.method.as_str().to_string(),
            amount: payment.amount,
            status: payment.status.as_str().to_string(),
            tax_amount: record.amount,
        });
    }

    let citizen_info = CitizenRef::build(&conn, &citizen)?;

    Ok(Json(ApiResponse::ok(PaymentHistoryData {
        citizen_info,
        payment_summary: summary,
        payments: rows,
    })))
}

// ============================================================================
// RECEIPT
// ============================================================================

#[derive(Serialize)]
pub struct ReceiptInfo {
    receipt_no: String,
    payment_id: String,
    payment_date: DateTime<Utc>,
    payment_mode: String,
    status: String,
}

#[derive(Serialize)]
pub struct ReceiptTaxInfo {
    tax_id: String,
    tax_year: i32,
    due_date: NaiveDate,
}

#[derive(Serialize)]
pub struct ReceiptPenaltyRow {
    penalty_id: String,
    amount: f64,
    applied_date: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct ReceiptData {
    receipt_info: ReceiptInfo,
    citizen_info: CitizenProfile,
    tax_info: ReceiptTaxInfo,
    payment_breakdown: AmountBreakdown,
    penalties: Vec<ReceiptPenaltyRow>,
}

/// GET /api/receipt/:payment_id - Full receipt: payment, citizen, tax
/// record, and the penalties settled with it.
pub async fn receipt(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(payment_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let session = require_session(&state, &headers)?;

    let conn = state.db.lock().unwrap();
    let payment = store::find_payment(&conn, &payment_id)?
        .ok_or_else(|| ApiError::not_found("Receipt not found"))?;

    if session.role == Role::Citizen && session.subject_id != payment.citizen_id {
        return Err(ApiError::forbidden("Access denied"));
    }

    let record = store::find_tax_record(&conn, &payment.tax_record_id)?
        .ok_or_else(|| ApiError::not_found("Receipt not found"))?;
    let citizen = store::find_citizen(&conn, &payment.citizen_id)?
        .ok_or_else(|| ApiError::not_found("Receipt not found"))?;

    let paid_penalties: Vec<_> = store::penalties_for_record(&conn, &record.id)?
        .into_iter()
        .filter(|p| p.status == PenaltyStatus::Paid)
        .collect();
    let penalty_amount: f64 = paid_penalties.iter().map(|p| p.amount).sum();

    let citizen_info = CitizenProfile::build(&conn, &citizen)?;

    Ok(Json(ApiResponse::ok(ReceiptData {
        receipt_info: ReceiptInfo {
            receipt_no: payment.receipt_no,
            payment_id: payment.id,
            payment_date: payment.payment_date,
            payment_mode: payment.method.as_str().to_string(),
            status: payment.status.as_str().to_string(),
        },
        citizen_info,
        tax_info: ReceiptTaxInfo {
            tax_id: record.id,
            tax_year: record.tax_year,
            due_date: record.due_date,
        },
        payment_breakdown: AmountBreakdown {
            tax_amount: record.amount,
            penalty_amount,
            total_amount: payment.amount,
        },
        penalties: paid_penalties
            .into_iter()
            .map(|p| ReceiptPenaltyRow {
                penalty_id: p.id,
                amount: p.amount,
                applied_date: p.applied_date,
            })
            .collect(),
    })))
}
