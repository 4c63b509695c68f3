// Scheduled Sweeps
//
// Batch operations over the store: the daily overdue sweep, the weekly
// reminder sweep, and the admin-triggered penalty auto-calculation. The
// server runs the first two on a timer; all three are also reachable from
// the admin API and the CLI.

use crate::entities::{Penalty, Reminder, ReminderKind, TaxStatus};
use crate::error::Result;
use crate::rules::PenaltyEngine;
use crate::store;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

// ============================================================================
// DAILY OVERDUE SWEEP
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct OverdueSweep {
    pub records_processed: usize,

    /// Pending records flipped to overdue this run
    pub records_marked_overdue: usize,

    pub penalties_applied: usize,
    pub total_penalty_amount: f64,
    pub reminders_sent: usize,
}

/// Walk every unpaid record past its due date: flip pending records to
/// overdue, apply the first matching penalty rule where the grace period has
/// lapsed and no active penalty exists yet, and log an overdue reminder for
/// the citizen.
pub fn check_overdue_taxes(
    conn: &Connection,
    engine: &PenaltyEngine,
    today: NaiveDate,
) -> Result<OverdueSweep> {
    let records = store::unpaid_overdue_records(conn, today, None)?;

    let mut outcome = OverdueSweep {
        records_processed: records.len(),
        records_marked_overdue: 0,
        penalties_applied: 0,
        total_penalty_amount: 0.0,
        reminders_sent: 0,
    };

    if records.is_empty() {
        info!("no overdue taxes found");
        return Ok(outcome);
    }

    for record in &records {
        let citizen = match store::find_citizen(conn, &record.citizen_id)? {
            Some(citizen) => citizen,
            None => {
                warn!(tax_record_id = %record.id, "overdue record without citizen, skipping");
                continue;
            }
        };

        if !store::has_active_penalty(conn, &record.id)? {
            if let Some(assessment) = engine.evaluate(record.amount, record.due_date, today) {
                let penalty = Penalty::new(
                    &record.citizen_id,
                    &record.id,
                    assessment.amount,
                    format!("Auto-applied: {}", assessment.rule.name),
                    assessment.days_overdue,
                    assessment.calculation.clone(),
                );
                store::insert_penalty(conn, &penalty)?;

                outcome.penalties_applied += 1;
                outcome.total_penalty_amount += assessment.amount;
                info!(
                    customer_id = %citizen.customer_id,
                    amount = assessment.amount,
                    days_overdue = assessment.days_overdue,
                    rule = %assessment.rule.id,
                    "applied penalty"
                );
            }
        }

        if record.status == TaxStatus::Pending {
            store::set_tax_status(conn, &record.id, TaxStatus::Overdue, None)?;
            outcome.records_marked_overdue += 1;
        }

        let message = format!(
            "Dear {}, your tax payment for {} is overdue. Amount: ₹{}. \
             Please pay immediately to avoid additional penalties. Customer ID: {}",
            citizen.name, record.tax_year, record.amount, citizen.customer_id
        );
        store::insert_reminder(
            conn,
            &Reminder::sent(&record.citizen_id, message, ReminderKind::Overdue, None),
        )?;
        outcome.reminders_sent += 1;
    }

    info!(
        processed = outcome.records_processed,
        penalties = outcome.penalties_applied,
        total_amount = outcome.total_penalty_amount,
        "overdue sweep finished"
    );

    Ok(outcome)
}

// ============================================================================
// WEEKLY REMINDER SWEEP
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct WeeklySweep {
    pub reminders_sent: usize,
}

/// One weekly reminder per citizen's unpaid past-due record, quoting the
/// total owed including active penalties.
pub fn send_weekly_reminders(conn: &Connection, today: NaiveDate) -> Result<WeeklySweep> {
    let records = store::unpaid_overdue_records(conn, today, None)?;

    if records.is_empty() {
        info!("no overdue taxes for weekly reminders");
        return Ok(WeeklySweep { reminders_sent: 0 });
    }

    let mut sent = 0;
    for record in &records {
        let citizen = match store::find_citizen(conn, &record.citizen_id)? {
            Some(citizen) => citizen,
            None => {
                warn!(tax_record_id = %record.id, "overdue record without citizen, skipping");
                continue;
            }
        };

        let penalty_amount = store::active_penalty_total_for_record(conn, &record.id)?;
        let total = record.amount + penalty_amount;

        let message = format!(
            "WEEKLY REMINDER: Dear {}, your tax payment for {} remains unpaid. \
             Total amount including penalties: ₹{}. Please pay immediately. Customer ID: {}",
            citizen.name, record.tax_year, total, citizen.customer_id
        );
        store::insert_reminder(
            conn,
            &Reminder::sent(&record.citizen_id, message, ReminderKind::Weekly, None),
        )?;
        sent += 1;
    }

    info!(reminders = sent, "weekly reminder sweep finished");
    Ok(WeeklySweep { reminders_sent: sent })
}

// ============================================================================
// PENALTY AUTO-CALCULATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoCalcStatus {
    /// Penalty written to the store
    Applied,

    /// Dry run, nothing persisted
    Calculated,

    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct AutoCalcResult {
    pub tax_record_id: String,
    pub citizen_id: String,
    pub citizen_name: String,
    pub tax_year: i32,
    pub tax_amount: f64,
    pub status: AutoCalcStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub penalty_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_overdue: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_rule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calculation: Option<String>,

    /// Why the record was skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Amount of the already-active penalty on a skipped record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_penalty: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AutoCalcSummary {
    pub total_records_processed: usize,
    pub penalties_applied: usize,
    pub total_penalty_amount: f64,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AutoCalcOutcome {
    pub message: String,
    pub summary: AutoCalcSummary,
    pub results: Vec<AutoCalcResult>,
}

/// Assess penalties for unpaid past-due records, optionally narrowed to
/// specific citizens. With `dry_run` nothing is persisted; the results show
/// what a real run would apply.
pub fn auto_calculate_penalties(
    conn: &Connection,
    engine: &PenaltyEngine,
    today: NaiveDate,
    citizen_ids: Option<&[String]>,
    dry_run: bool,
) -> Result<AutoCalcOutcome> {
    let records = store::unpaid_overdue_records(conn, today, citizen_ids)?;

    let mut results = Vec::with_capacity(records.len());
    let mut penalties_applied = 0;
    let mut total_penalty_amount = 0.0;

    for record in &records {
        let citizen = match store::find_citizen(conn, &record.citizen_id)? {
            Some(citizen) => citizen,
            None => {
                warn!(tax_record_id = %record.id, "overdue record without citizen, skipping");
                continue;
            }
        };

        let mut result = AutoCalcResult {
            tax_record_id: record.id.clone(),
            citizen_id: record.citizen_id.clone(),
            citizen_name: citizen.name.clone(),
            tax_year: record.tax_year,
            tax_amount: record.amount,
            status: AutoCalcStatus::Skipped,
            penalty_amount: None,
            days_overdue: None,
            applied_rule: None,
            calculation: None,
            reason: None,
            existing_penalty: None,
        };

        let existing = store::active_penalties_for_record(conn, &record.id)?;
        if let Some(existing) = existing.first() {
            result.reason = Some("Penalty already exists".to_string());
            result.existing_penalty = Some(existing.amount);
            results.push(result);
            continue;
        }

        let assessment = match engine.evaluate(record.amount, record.due_date, today) {
            Some(assessment) => assessment,
            None => {
                result.reason = Some("Still within grace period".to_string());
                results.push(result);
                continue;
            }
        };

        if !dry_run {
            let penalty = Penalty::new(
                &record.citizen_id,
                &record.id,
                assessment.amount,
                format!("Overdue tax payment - {}", assessment.rule.name),
                assessment.days_overdue,
                assessment.calculation.clone(),
            );
            store::insert_penalty(conn, &penalty)?;
        }

        result.status = if dry_run {
            AutoCalcStatus::Calculated
        } else {
            AutoCalcStatus::Applied
        };
        result.penalty_amount = Some(assessment.amount);
        result.days_overdue = Some(assessment.days_overdue);
        result.applied_rule = Some(assessment.rule.name.clone());
        result.calculation = Some(assessment.calculation.clone());
        results.push(result);

        penalties_applied += 1;
        total_penalty_amount += assessment.amount;
    }

    let message = if dry_run {
        format!(
            "Penalty calculation completed (dry run): {} penalties calculated",
            penalties_applied
        )
    } else {
        format!(
            "Auto-penalty application completed: {} penalties applied",
            penalties_applied
        )
    };

    Ok(AutoCalcOutcome {
        message,
        summary: AutoCalcSummary {
            total_records_processed: records.len(),
            penalties_applied,
            total_penalty_amount,
            dry_run,
        },
        results,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Citizen, PenaltyStatus, TaxRecord};
    use crate::store::{
        find_tax_record, insert_citizen, insert_tax_record, list_districts,
        penalties_for_citizen, reminders_for_citizen, seed_defaults, setup_database,
    };

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        seed_defaults(&conn).unwrap();
        conn
    }

    fn citizen(conn: &Connection, customer_id: &str, name: &str) -> Citizen {
        let district = &list_districts(conn).unwrap()[0].district;
        let citizen = Citizen::new(
            customer_id.to_string(),
            name.to_string(),
            "Ward-1".to_string(),
            district.id.clone(),
            "Mumbai".to_string(),
            "Maharashtra".to_string(),
            "9876543210".to_string(),
        );
        insert_citizen(conn, &citizen).unwrap();
        citizen
    }

    fn levy(conn: &Connection, citizen: &Citizen, year: i32, amount: f64, due: &str) -> TaxRecord {
        let record = TaxRecord::new(&citizen.id, year, amount, date(due));
        insert_tax_record(conn, &record).unwrap();
        record
    }

    #[test]
    fn test_sweep_applies_penalty_and_marks_overdue() {
        let conn = test_conn();
        let engine = PenaltyEngine::default();

        let john = citizen(&conn, "CID000000300", "John Doe");
        let record = levy(&conn, &john, 2024, 5000.0, "2024-01-01");

        // 19 days overdue: fixed rule fires
        let outcome = check_overdue_taxes(&conn, &engine, date("2024-01-20")).unwrap();

        assert_eq!(outcome.records_processed, 1);
        assert_eq!(outcome.records_marked_overdue, 1);
        assert_eq!(outcome.penalties_applied, 1);
        assert_eq!(outcome.total_penalty_amount, 100.0);
        assert_eq!(outcome.reminders_sent, 1);

        let record = find_tax_record(&conn, &record.id).unwrap().unwrap();
        assert_eq!(record.status, TaxStatus::Overdue);

        let penalties = penalties_for_citizen(&conn, &john.id).unwrap();
        assert_eq!(penalties.len(), 1);
        assert_eq!(penalties[0].amount, 100.0);
        assert_eq!(penalties[0].status, PenaltyStatus::Active);
        assert_eq!(penalties[0].reason, "Auto-applied: Fixed Penalty");
        assert_eq!(penalties[0].days_overdue, 19);

        let reminders = reminders_for_citizen(&conn, &john.id).unwrap();
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].kind, ReminderKind::Overdue);
        assert!(reminders[0].message.contains("your tax payment for 2024 is overdue"));
        assert!(reminders[0].message.contains("Customer ID: CID000000300"));
    }

    #[test]
    fn test_sweep_skips_existing_penalty_but_still_reminds() {
        let conn = test_conn();
        let engine = PenaltyEngine::default();

        let john = citizen(&conn, "CID000000301", "John Doe");
        levy(&conn, &john, 2024, 5000.0, "2024-01-01");

        check_overdue_taxes(&conn, &engine, date("2024-01-20")).unwrap();
        let second = check_overdue_taxes(&conn, &engine, date("2024-01-21")).unwrap();

        // Record is still in scope but already penalized and already overdue
        assert_eq!(second.records_processed, 1);
        assert_eq!(second.penalties_applied, 0);
        assert_eq!(second.records_marked_overdue, 0);
        assert_eq!(second.reminders_sent, 1);

        assert_eq!(penalties_for_citizen(&conn, &john.id).unwrap().len(), 1);
        assert_eq!(reminders_for_citizen(&conn, &john.id).unwrap().len(), 2);
    }

    #[test]
    fn test_sweep_marks_overdue_within_grace_without_penalty() {
        let conn = test_conn();
        let engine = PenaltyEngine::default();

        let john = citizen(&conn, "CID000000302", "John Doe");
        let record = levy(&conn, &john, 2024, 5000.0, "2024-01-01");

        // 3 days overdue: inside every grace period
        let outcome = check_overdue_taxes(&conn, &engine, date("2024-01-04")).unwrap();

        assert_eq!(outcome.records_processed, 1);
        assert_eq!(outcome.penalties_applied, 0);
        assert_eq!(outcome.records_marked_overdue, 1);

        let record = find_tax_record(&conn, &record.id).unwrap().unwrap();
        assert_eq!(record.status, TaxStatus::Overdue);

        // Grace lapses before a later sweep, which now applies the penalty
        let later = check_overdue_taxes(&conn, &engine, date("2024-01-20")).unwrap();
        assert_eq!(later.penalties_applied, 1);
    }

    #[test]
    fn test_sweep_ignores_future_and_paid_records() {
        let conn = test_conn();
        let engine = PenaltyEngine::default();

        let john = citizen(&conn, "CID000000303", "John Doe");
        levy(&conn, &john, 2025, 5000.0, "2025-12-31");

        let outcome = check_overdue_taxes(&conn, &engine, date("2024-01-20")).unwrap();
        assert_eq!(outcome.records_processed, 0);
        assert!(reminders_for_citizen(&conn, &john.id).unwrap().is_empty());
    }

    #[test]
    fn test_weekly_reminders_quote_total_with_penalties() {
        let conn = test_conn();
        let engine = PenaltyEngine::default();

        let john = citizen(&conn, "CID000000304", "John Doe");
        levy(&conn, &john, 2024, 5000.0, "2024-01-01");

        // Daily sweep applies the ₹100 fixed penalty first
        check_overdue_taxes(&conn, &engine, date("2024-01-20")).unwrap();

        let weekly = send_weekly_reminders(&conn, date("2024-01-22")).unwrap();
        assert_eq!(weekly.reminders_sent, 1);

        let reminders = reminders_for_citizen(&conn, &john.id).unwrap();
        let weekly_reminder = reminders
            .iter()
            .find(|r| r.kind == ReminderKind::Weekly)
            .unwrap();
        assert!(weekly_reminder.message.starts_with("WEEKLY REMINDER: Dear John Doe"));
        assert!(weekly_reminder.message.contains("Total amount including penalties: ₹5100"));
    }

    #[test]
    fn test_auto_calculate_dry_run_persists_nothing() {
        let conn = test_conn();
        let engine = PenaltyEngine::default();

        let john = citizen(&conn, "CID000000305", "John Doe");
        levy(&conn, &john, 2024, 5000.0, "2024-01-01");

        let outcome =
            auto_calculate_penalties(&conn, &engine, date("2024-01-20"), None, true).unwrap();

        assert!(outcome.summary.dry_run);
        assert_eq!(outcome.summary.penalties_applied, 1);
        assert_eq!(outcome.summary.total_penalty_amount, 100.0);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].status, AutoCalcStatus::Calculated);
        assert_eq!(outcome.results[0].penalty_amount, Some(100.0));
        assert!(outcome.message.contains("dry run"));

        // Nothing written
        assert!(penalties_for_citizen(&conn, &john.id).unwrap().is_empty());
    }

    #[test]
    fn test_auto_calculate_applies_and_skips() {
        let conn = test_conn();
        let engine = PenaltyEngine::default();

        let john = citizen(&conn, "CID000000306", "John Doe");
        let jane = citizen(&conn, "CID000000307", "Jane Smith");
        levy(&conn, &john, 2024, 5000.0, "2024-01-01");
        // Jane is only 2 days overdue, inside the grace period
        levy(&conn, &jane, 2024, 8000.0, "2024-01-18");

        let outcome =
            auto_calculate_penalties(&conn, &engine, date("2024-01-20"), None, false).unwrap();

        assert_eq!(outcome.summary.total_records_processed, 2);
        assert_eq!(outcome.summary.penalties_applied, 1);

        let applied = outcome
            .results
            .iter()
            .find(|r| r.citizen_id == john.id)
            .unwrap();
        assert_eq!(applied.status, AutoCalcStatus::Applied);
        assert_eq!(applied.applied_rule.as_deref(), Some("Fixed Penalty"));

        let skipped = outcome
            .results
            .iter()
            .find(|r| r.citizen_id == jane.id)
            .unwrap();
        assert_eq!(skipped.status, AutoCalcStatus::Skipped);
        assert_eq!(skipped.reason.as_deref(), Some("Still within grace period"));

        let penalties = penalties_for_citizen(&conn, &john.id).unwrap();
        assert_eq!(penalties[0].reason, "Overdue tax payment - Fixed Penalty");

        // Second run skips the now-penalized record
        let again =
            auto_calculate_penalties(&conn, &engine, date("2024-01-21"), None, false).unwrap();
        let re_skipped = again
            .results
            .iter()
            .find(|r| r.citizen_id == john.id)
            .unwrap();
        assert_eq!(re_skipped.reason.as_deref(), Some("Penalty already exists"));
        assert_eq!(re_skipped.existing_penalty, Some(100.0));
    }

    #[test]
    fn test_auto_calculate_citizen_filter() {
        let conn = test_conn();
        let engine = PenaltyEngine::default();

        let john = citizen(&conn, "CID000000308", "John Doe");
        let jane = citizen(&conn, "CID000000309", "Jane Smith");
        levy(&conn, &john, 2024, 5000.0, "2024-01-01");
        levy(&conn, &jane, 2024, 8000.0, "2024-01-01");

        let only_jane = vec![jane.id.clone()];
        let outcome =
            auto_calculate_penalties(&conn, &engine, date("2024-01-20"), Some(&only_jane), false)
                .unwrap();

        assert_eq!(outcome.summary.total_records_processed, 1);
        assert!(penalties_for_citizen(&conn, &john.id).unwrap().is_empty());
        assert_eq!(penalties_for_citizen(&conn, &jane.id).unwrap().len(), 1);
    }
}
