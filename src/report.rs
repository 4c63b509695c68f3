// Tax Report
//
// Filterable register of levies with payment and penalty context, plus a CSV
// export of the same rows. Backs the admin reports endpoint and the
// export-report CLI command.

use crate::entities::{PaymentMethod, TaxStatus};
use crate::error::Result;
use crate::store;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use std::io::Write;

// ============================================================================
// FILTER & ROWS
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub status: Option<TaxStatus>,
    pub district_id: Option<String>,
    pub tax_year: Option<i32>,

    /// Case-insensitive match on citizen name or customer id
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaxReport {
    pub summary: ReportSummary,
    pub records: Vec<ReportRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub total_records: i64,
    pub paid_records: i64,
    pub pending_records: i64,
    pub overdue_records: i64,
    pub total_amount: f64,
    pub collected_amount: f64,
    pub pending_amount: f64,
    pub total_penalties: f64,

    /// Paid share of all records, percent with two decimals
    pub collection_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub tax_record_id: String,
    pub citizen: ReportCitizen,
    pub tax_year: i32,
    pub amount: f64,
    pub due_date: NaiveDate,
    pub status: TaxStatus,

    /// Most recent completed payment, when one exists
    pub payment_info: Option<ReportPayment>,

    /// Active penalties on the record
    pub penalty_amount: f64,

    pub days_overdue: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportCitizen {
    pub id: String,
    pub customer_id: String,
    pub name: String,
    pub ward_no: String,
    pub district: String,
    pub contact_no: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportPayment {
    pub payment_date: DateTime<Utc>,
    pub method: PaymentMethod,
    pub receipt_no: String,
}

// ============================================================================
// REPORT BUILD
// ============================================================================

/// Build the report as of `today` (drives days-overdue arithmetic).
pub fn tax_report(conn: &Connection, filter: &ReportFilter, today: NaiveDate) -> Result<TaxReport> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(status) = filter.status {
        clauses.push("t.status = ?");
        bindings.push(status.as_str().to_string());
    }
    if let Some(district_id) = &filter.district_id {
        clauses.push("c.district_id = ?");
        bindings.push(district_id.clone());
    }
    if let Some(year) = filter.tax_year {
        clauses.push("t.tax_year = ?");
        bindings.push(year.to_string());
    }
    if let Some(search) = &filter.search {
        clauses.push("(LOWER(c.name) LIKE ? OR LOWER(c.customer_id) LIKE ?)");
        let needle = format!("%{}%", search.to_lowercase());
        bindings.push(needle.clone());
        bindings.push(needle);
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let sql = format!(
        "SELECT t.id, t.tax_year, t.amount, t.due_date, t.status, t.paid_date, t.created_at,
                c.id, c.customer_id, c.name, c.ward_no, c.contact_no,
                d.name,
                (SELECT COALESCE(SUM(pn.amount), 0) FROM penalties pn
                  WHERE pn.tax_record_id = t.id AND pn.status = 'active')
         FROM tax_records t
         JOIN citizens c ON c.id = t.citizen_id
         JOIN districts d ON d.id = c.district_id
         {}
         ORDER BY t.created_at DESC",
        where_sql
    );

    struct RawRow {
        record_id: String,
        tax_year: i32,
        amount: f64,
        due_date: NaiveDate,
        status: TaxStatus,
        created_at: DateTime<Utc>,
        citizen: ReportCitizen,
        penalty_amount: f64,
    }

    let mut stmt = conn.prepare(&sql)?;
    let raw_rows = stmt
        .query_map(params_from_iter(bindings.iter()), |row| {
            let due_date: String = row.get(3)?;
            let status: String = row.get(4)?;
            let created_at: String = row.get(6)?;
            Ok(RawRow {
                record_id: row.get(0)?,
                tax_year: row.get(1)?,
                amount: row.get(2)?,
                due_date: store::parse_day(&due_date)?,
                status: TaxStatus::parse(&status).ok_or(rusqlite::Error::InvalidQuery)?,
                created_at: store::parse_dt(&created_at)?,
                citizen: ReportCitizen {
                    id: row.get(7)?,
                    customer_id: row.get(8)?,
                    name: row.get(9)?,
                    ward_no: row.get(10)?,
                    district: row.get(12)?,
                    contact_no: row.get(11)?,
                },
                penalty_amount: row.get(13)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut records = Vec::with_capacity(raw_rows.len());
    for raw in raw_rows {
        let payment_info = store::completed_payments_for_record(conn, &raw.record_id)?
            .into_iter()
            .next()
            .map(|p| ReportPayment {
                payment_date: p.payment_date,
                method: p.method,
                receipt_no: p.receipt_no,
            });

        let days_overdue = match raw.status {
            TaxStatus::Paid => 0,
            TaxStatus::Pending | TaxStatus::Overdue => {
                (today - raw.due_date).num_days().max(0)
            }
        };

        records.push(ReportRow {
            tax_record_id: raw.record_id,
            citizen: raw.citizen,
            tax_year: raw.tax_year,
            amount: raw.amount,
            due_date: raw.due_date,
            status: raw.status,
            payment_info,
            penalty_amount: raw.penalty_amount,
            days_overdue,
            created_at: raw.created_at,
        });
    }

    Ok(TaxReport {
        summary: summarize(&records),
        records,
    })
}

fn summarize(records: &[ReportRow]) -> ReportSummary {
    let total_records = records.len() as i64;
    let paid_records = records.iter().filter(|r| r.status == TaxStatus::Paid).count() as i64;
    let pending_records = records
        .iter()
        .filter(|r| r.status == TaxStatus::Pending)
        .count() as i64;
    let overdue_records = records
        .iter()
        .filter(|r| r.status == TaxStatus::Overdue)
        .count() as i64;

    let total_amount: f64 = records.iter().map(|r| r.amount).sum();
    let collected_amount: f64 = records
        .iter()
        .filter(|r| r.status == TaxStatus::Paid)
        .map(|r| r.amount)
        .sum();
    let total_penalties: f64 = records.iter().map(|r| r.penalty_amount).sum();

    let collection_rate = if total_records > 0 {
        let rate = paid_records as f64 / total_records as f64 * 100.0;
        (rate * 100.0).round() / 100.0
    } else {
        0.0
    };

    ReportSummary {
        total_records,
        paid_records,
        pending_records,
        overdue_records,
        total_amount,
        collected_amount,
        pending_amount: total_amount - collected_amount,
        total_penalties,
        collection_rate,
    }
}

// ============================================================================
// CSV EXPORT
// ============================================================================

/// Write the report rows as CSV, one line per levy.
pub fn export_csv<W: Write>(report: &TaxReport, writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record([
        "customer_id",
        "name",
        "ward_no",
        "district",
        "contact_no",
        "tax_year",
        "amount",
        "due_date",
        "status",
        "penalty_amount",
        "days_overdue",
        "receipt_no",
        "payment_date",
    ])?;

    for row in &report.records {
        let (receipt_no, payment_date) = match &row.payment_info {
            Some(info) => (info.receipt_no.clone(), info.payment_date.to_rfc3339()),
            None => (String::new(), String::new()),
        };

        csv_writer.write_record([
            row.citizen.customer_id.as_str(),
            row.citizen.name.as_str(),
            row.citizen.ward_no.as_str(),
            row.citizen.district.as_str(),
            row.citizen.contact_no.as_str(),
            &row.tax_year.to_string(),
            &row.amount.to_string(),
            &row.due_date.to_string(),
            row.status.as_str(),
            &row.penalty_amount.to_string(),
            &row.days_overdue.to_string(),
            &receipt_no,
            &payment_date,
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Citizen, Payment, Penalty, TaxRecord};
    use crate::store::{
        insert_citizen, insert_payment, insert_penalty, insert_tax_record, list_districts,
        seed_defaults, setup_database,
    };
    use rusqlite::params;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        seed_defaults(&conn).unwrap();
        conn
    }

    fn seeded_report_conn() -> (Connection, Citizen, Citizen) {
        let conn = test_conn();
        let districts = list_districts(&conn).unwrap();

        let john = Citizen::new(
            "CID000000200".to_string(),
            "John Doe".to_string(),
            "Ward-1".to_string(),
            districts[0].district.id.clone(),
            "Mumbai".to_string(),
            "Maharashtra".to_string(),
            "9876543210".to_string(),
        );
        insert_citizen(&conn, &john).unwrap();

        let jane = Citizen::new(
            "CID000000201".to_string(),
            "Jane Smith".to_string(),
            "Ward-2".to_string(),
            districts[1].district.id.clone(),
            "Mumbai".to_string(),
            "Maharashtra".to_string(),
            "9876543211".to_string(),
        );
        insert_citizen(&conn, &jane).unwrap();

        // John: paid 2024 levy with a completed payment
        let paid = TaxRecord::new(&john.id, 2024, 5000.0, date("2024-03-31"));
        insert_tax_record(&conn, &paid).unwrap();
        conn.execute(
            "UPDATE tax_records SET status = 'paid', paid_date = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), paid.id],
        )
        .unwrap();
        let payment = Payment::completed(
            &paid.id,
            &john.id,
            5000.0,
            PaymentMethod::Offline,
            "RCP0000000200".to_string(),
        );
        insert_payment(&conn, &payment).unwrap();

        // Jane: pending 2024 levy, past due, with an active penalty
        let overdue = TaxRecord::new(&jane.id, 2024, 8000.0, date("2024-01-01"));
        insert_tax_record(&conn, &overdue).unwrap();
        let penalty = Penalty::new(
            &jane.id,
            &overdue.id,
            160.0,
            "Auto-applied: Percentage Penalty".to_string(),
            19,
            "2% of ₹8000 = ₹160".to_string(),
        );
        insert_penalty(&conn, &penalty).unwrap();

        (conn, john, jane)
    }

    #[test]
    fn test_report_summary() {
        let (conn, _, _) = seeded_report_conn();

        let report = tax_report(&conn, &ReportFilter::default(), date("2024-01-20")).unwrap();

        assert_eq!(report.summary.total_records, 2);
        assert_eq!(report.summary.paid_records, 1);
        assert_eq!(report.summary.pending_records, 1);
        assert_eq!(report.summary.total_amount, 13000.0);
        assert_eq!(report.summary.collected_amount, 5000.0);
        assert_eq!(report.summary.pending_amount, 8000.0);
        assert_eq!(report.summary.total_penalties, 160.0);
        assert_eq!(report.summary.collection_rate, 50.0);
    }

    #[test]
    fn test_report_rows_carry_payment_and_penalty_context() {
        let (conn, john, jane) = seeded_report_conn();

        let report = tax_report(&conn, &ReportFilter::default(), date("2024-01-20")).unwrap();

        let john_row = report
            .records
            .iter()
            .find(|r| r.citizen.id == john.id)
            .unwrap();
        assert_eq!(john_row.status, TaxStatus::Paid);
        assert_eq!(john_row.days_overdue, 0);
        let info = john_row.payment_info.as_ref().unwrap();
        assert_eq!(info.receipt_no, "RCP0000000200");
        assert_eq!(info.method, PaymentMethod::Offline);

        let jane_row = report
            .records
            .iter()
            .find(|r| r.citizen.id == jane.id)
            .unwrap();
        assert_eq!(jane_row.status, TaxStatus::Pending);
        assert_eq!(jane_row.days_overdue, 19);
        assert_eq!(jane_row.penalty_amount, 160.0);
        assert!(jane_row.payment_info.is_none());
        assert_eq!(jane_row.citizen.district, "North District");
    }

    #[test]
    fn test_report_filters() {
        let (conn, john, _) = seeded_report_conn();
        let today = date("2024-01-20");

        let paid_only = tax_report(
            &conn,
            &ReportFilter {
                status: Some(TaxStatus::Paid),
                ..Default::default()
            },
            today,
        )
        .unwrap();
        assert_eq!(paid_only.records.len(), 1);
        assert_eq!(paid_only.records[0].citizen.id, john.id);

        let by_search = tax_report(
            &conn,
            &ReportFilter {
                search: Some("jane".to_string()),
                ..Default::default()
            },
            today,
        )
        .unwrap();
        assert_eq!(by_search.records.len(), 1);
        assert_eq!(by_search.records[0].citizen.name, "Jane Smith");

        let wrong_year = tax_report(
            &conn,
            &ReportFilter {
                tax_year: Some(2020),
                ..Default::default()
            },
            today,
        )
        .unwrap();
        assert!(wrong_year.records.is_empty());
        assert_eq!(wrong_year.summary.collection_rate, 0.0);
    }

    #[test]
    fn test_csv_export() {
        let (conn, _, _) = seeded_report_conn();

        let report = tax_report(&conn, &ReportFilter::default(), date("2024-01-20")).unwrap();

        let mut buffer = Vec::new();
        export_csv(&report, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("customer_id,name,ward_no"));
        assert_eq!(lines.count(), 2);
        assert!(text.contains("RCP0000000200"));
        assert!(text.contains("Jane Smith"));
    }
}
