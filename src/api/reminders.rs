// Reminder and SMS handlers: ad hoc reminders, per-citizen history, direct
// SMS, and the audience-based bulk sends.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::{
    require_admin, require_admin_or_self, required, ApiError, ApiResponse, ApiResult, AppState,
    CitizenRef,
};
use crate::entities::{Citizen, Reminder, ReminderKind, ReminderStatus};
use crate::sms::{self, SmsClient};
use crate::store;

/// Send one SMS and persist the reminder row that records it.
fn send_and_log(
    conn: &Connection,
    client: &SmsClient,
    citizen: &Citizen,
    message: String,
    kind: ReminderKind,
) -> crate::error::Result<Reminder> {
    let outcome = client.send(&citizen.contact_no, &message);
    let reminder = Reminder::sent(&citizen.id, message, kind, Some(outcome.message_id));
    store::insert_reminder(conn, &reminder)?;
    Ok(reminder)
}

// ============================================================================
// AD HOC REMINDERS
// ============================================================================

#[derive(Deserialize)]
pub struct CreateReminderRequest {
    citizen_ids: Option<Vec<String>>,
    message: Option<String>,
}

#[derive(Serialize)]
pub struct ReminderCitizen {
    customer_id: String,
    name: String,
    contact_no: String,
}

#[derive(Serialize)]
pub struct SentReminder {
    reminder_id: String,
    citizen: ReminderCitizen,
    message: String,
    sent_at: DateTime<Utc>,
    status: String,
}

#[derive(Serialize)]
pub struct SmsResult {
    citizen_id: String,
    customer_id: String,
    name: String,
    contact_no: String,
    status: String,
    message_id: Option<String>,
}

#[derive(Serialize)]
pub struct CreateReminderData {
    total_sent: usize,
    reminders: Vec<SentReminder>,
    sms_results: Vec<SmsResult>,
}

/// POST /api/reminder - Send a custom message to a list of citizens. The
/// whole batch is rejected when any citizen id is unknown.
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateReminderRequest>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, &headers)?;

    let citizen_ids = match body.citizen_ids {
        Some(ids) if !ids.is_empty() => ids,
        _ => return Err(ApiError::bad_request("Citizen IDs array is required")),
    };
    let message = required(body.message, "Message is required")?;

    let conn = state.db.lock().unwrap();
    let citizens = store::citizens_by_ids(&conn, &citizen_ids)?;
    if citizens.len() != citizen_ids.len() {
        return Err(ApiError::not_found("Some citizens not found"));
    }

    let mut reminders = Vec::with_capacity(citizens.len());
    let mut sms_results = Vec::with_capacity(citizens.len());

    for citizen in &citizens {
        let reminder = send_and_log(
            &conn,
            &state.sms,
            citizen,
            message.clone(),
            ReminderKind::General,
        )?;

        sms_results.push(SmsResult {
            citizen_id: citizen.id.clone(),
            customer_id: citizen.customer_id.clone(),
            name: citizen.name.clone(),
            contact_no: citizen.contact_no.clone(),
            status: reminder.status.as_str().to_string(),
            message_id: reminder.message_id.clone(),
        });
        reminders.push(SentReminder {
            reminder_id: reminder.id,
            citizen: ReminderCitizen {
                customer_id: citizen.customer_id.clone(),
                name: citizen.name.clone(),
                contact_no: citizen.contact_no.clone(),
            },
            message: reminder.message,
            sent_at: reminder.sent_at,
            status: reminder.status.as_str().to_string(),
        });
    }

    info!(count = reminders.len(), "reminders sent");

    Ok(Json(ApiResponse::with_message(
        format!("Reminders sent to {} citizens", reminders.len()),
        CreateReminderData {
            total_sent: reminders.len(),
            reminders,
            sms_results,
        },
    )))
}

// ============================================================================
// HISTORY
// ============================================================================

#[derive(Serialize)]
pub struct ReminderSummary {
    total_reminders: usize,
    sent_reminders: usize,
    failed_reminders: usize,
}

#[derive(Serialize)]
pub struct ReminderHistoryRow {
    reminder_id: String,
    message: String,
    kind: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_id: Option<String>,
    sent_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct ReminderHistoryData {
    citizen_info: CitizenRef,
    reminder_summary: ReminderSummary,
    reminders: Vec<ReminderHistoryRow>,
}

/// GET /api/reminder/:citizen_id - Reminder history, newest first
pub async fn for_citizen(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(citizen_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    require_admin_or_self(&state, &headers, &citizen_id)?;

    let conn = state.db.lock().unwrap();
    let citizen = store::find_citizen(&conn, &citizen_id)?
        .ok_or_else(|| ApiError::not_found("Citizen not found"))?;

    let reminders = store::reminders_for_citizen(&conn, &citizen.id)?;
    let sent = reminders
        .iter()
        .filter(|r| r.status == ReminderStatus::Sent)
        .count();

    let summary = ReminderSummary {
        total_reminders: reminders.len(),
        sent_reminders: sent,
        failed_reminders: reminders.len() - sent,
    };

    let rows = reminders
        .into_iter()
        .map(|reminder| ReminderHistoryRow {
            reminder_id: reminder.id,
            message: reminder.message,
            kind: reminder.kind.as_str().to_string(),
            status: reminder.status.as_str().to_string(),
            message_id: reminder.message_id,
            sent_at: reminder.sent_at,
        })
        .collect();

    let citizen_info = CitizenRef::build(&conn, &citizen)?;

    Ok(Json(ApiResponse::ok(ReminderHistoryData {
        citizen_info,
        reminder_summary: summary,
        reminders: rows,
    })))
}

// ============================================================================
// DIRECT SMS
// ============================================================================

#[derive(Deserialize)]
pub struct SendSmsRequest {
    citizen_ids: Option<Vec<String>>,
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Serialize)]
pub struct SendSmsOutcome {
    citizen_id: String,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
pub struct SendSummary {
    total: usize,
    successful: usize,
    failed: usize,
}

#[derive(Serialize)]
pub struct SendSmsData {
    results: Vec<SendSmsOutcome>,
    summary: SendSummary,
}

/// POST /api/sms/send - Send a message to each citizen id individually.
/// Unknown ids fail per entry instead of rejecting the batch.
pub async fn send_sms(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SendSmsRequest>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, &headers)?;

    let citizen_ids = match body.citizen_ids {
        Some(ids) if !ids.is_empty() => ids,
        _ => return Err(ApiError::bad_request("Citizen IDs are required")),
    };
    let message = required(body.message, "Message is required")?;
    let kind = match body.kind.as_deref() {
        Some(raw) => {
            ReminderKind::parse(raw).ok_or_else(|| ApiError::bad_request("Invalid reminder type"))?
        }
        None => ReminderKind::General,
    };

    let conn = state.db.lock().unwrap();
    let mut results = Vec::with_capacity(citizen_ids.len());

    for citizen_id in &citizen_ids {
        match store::find_citizen(&conn, citizen_id)? {
            Some(citizen) => {
                let reminder = send_and_log(&conn, &state.sms, &citizen, message.clone(), kind)?;
                results.push(SendSmsOutcome {
                    citizen_id: citizen.id,
                    success: true,
                    message_id: reminder.message_id,
                    error: None,
                });
            }
            None => {
                results.push(SendSmsOutcome {
                    citizen_id: citizen_id.clone(),
                    success: false,
                    message_id: None,
                    error: Some("Citizen not found".to_string()),
                });
            }
        }
    }

    let successful = results.iter().filter(|r| r.success).count();
    let failed = results.len() - successful;

    Ok(Json(ApiResponse::with_message(
        format!("SMS sent to {} citizens, {} failed", successful, failed),
        SendSmsData {
            summary: SendSummary {
                total: results.len(),
                successful,
                failed,
            },
            results,
        },
    )))
}

// ============================================================================
// BULK REMINDERS
// ============================================================================

#[derive(Deserialize)]
pub struct BulkReminderRequest {
    #[serde(rename = "type")]
    kind: Option<String>,
    custom_message: Option<String>,
}

#[derive(Serialize)]
pub struct BulkReminderData {
    reminder_type: String,
    results: Vec<SmsResult>,
    summary: SendSummary,
}

/// POST /api/sms/bulk-reminder - Template reminders to a computed audience:
/// `upcoming` (due within a week), `overdue` (past due, unpaid), or
/// `penalty` (active penalties outstanding).
pub async fn bulk_reminder(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<BulkReminderRequest>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, &headers)?;

    let kind = body.kind.unwrap_or_default();
    let today = Utc::now().date_naive();
    let conn = state.db.lock().unwrap();

    // Audience plus the per-citizen template message
    let batch: Vec<(Citizen, String, ReminderKind)> = match kind.as_str() {
        "upcoming" => store::citizens_with_upcoming_tax(&conn, today, 7)?
            .into_iter()
            .map(|row| {
                let message = body.custom_message.clone().unwrap_or_else(|| {
                    sms::reminder_message(
                        &row.citizen.name,
                        row.record.amount,
                        &row.record.due_date.format("%Y-%m-%d").to_string(),
                    )
                });
                (row.citizen, message, ReminderKind::Upcoming)
            })
            .collect(),
        "overdue" => {
            let rows = store::citizens_with_overdue_tax(&conn, today)?;
            let mut batch = Vec::with_capacity(rows.len());
            for row in rows {
                let penalty_amount =
                    store::active_penalty_total_for_record(&conn, &row.record.id)?;
                let message = body.custom_message.clone().unwrap_or_else(|| {
                    sms::overdue_message(&row.citizen.name, row.record.amount, penalty_amount)
                });
                batch.push((row.citizen, message, ReminderKind::Overdue));
            }
            batch
        }
        "penalty" => {
            let citizens = store::citizens_with_active_penalties(&conn)?;
            let mut batch = Vec::with_capacity(citizens.len());
            for citizen in citizens {
                let total = store::active_penalty_total_for_citizen(&conn, &citizen.id)?;
                let message = body
                    .custom_message
                    .clone()
                    .unwrap_or_else(|| sms::penalty_message(&citizen.name, total));
                batch.push((citizen, message, ReminderKind::Penalty));
            }
            batch
        }
        _ => {
            return Err(ApiError::bad_request(
                "Valid reminder type is required (upcoming, overdue, or penalty)",
            ))
        }
    };

    let mut results = Vec::with_capacity(batch.len());
    for (citizen, message, reminder_kind) in batch {
        let reminder = send_and_log(&conn, &state.sms, &citizen, message, reminder_kind)?;
        results.push(SmsResult {
            citizen_id: citizen.id,
            customer_id: citizen.customer_id,
            name: citizen.name,
            contact_no: citizen.contact_no,
            status: reminder.status.as_str().to_string(),
            message_id: reminder.message_id,
        });
    }

    let successful = results.len();
    info!(reminder_type = %kind, count = successful, "bulk reminders sent");

    Ok(Json(ApiResponse::with_message(
        format!("Bulk reminders sent: {} successful, 0 failed", successful),
        BulkReminderData {
            reminder_type: kind,
            summary: SendSummary {
                total: successful,
                successful,
                failed: 0,
            },
            results,
        },
    )))
}
