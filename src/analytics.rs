// Analytics
//
// Aggregates for the admin dashboard and the citizen portal. Everything is
// computed from the live tables on each call; at municipal scale there is no
// need for materialized rollups.

use crate::entities::{PaymentMethod, PaymentStatus, PenaltyStatus, ReminderKind, ReminderStatus, TaxStatus};
use crate::error::Result;
use crate::store;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::BTreeMap;

const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

// ============================================================================
// ADMIN DASHBOARD
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct AdminAnalytics {
    pub overview: AdminOverview,
    pub charts: AdminCharts,
    pub recent_activities: AdminRecentActivities,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminOverview {
    pub total_citizens: i64,
    pub total_districts: i64,

    /// Tax records levied for the requested year
    pub total_tax_records: i64,

    /// Completed payments, all years
    pub total_payments: i64,

    /// Active penalties
    pub total_penalties: i64,

    pub tax_collected: f64,
    pub pending_tax: f64,
    pub total_penalty_amount: f64,

    /// Collected share of (collected + pending), whole percent
    pub collection_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminCharts {
    pub monthly_collections: Vec<MonthlyCollection>,
    pub district_analytics: Vec<DistrictAnalytics>,
    pub payment_methods: Vec<MethodBreakdown>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyCollection {
    /// Short month label, "Jan" through "Dec"
    pub month: String,
    pub amount: f64,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DistrictAnalytics {
    pub name: String,
    pub citizens: i64,
    pub total_tax: f64,
    pub collected_tax: f64,
    pub pending_tax: f64,
    pub penalties: f64,
    pub collection_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MethodBreakdown {
    pub method: PaymentMethod,
    pub amount: f64,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminRecentActivities {
    pub payments: Vec<RecentPayment>,
    pub penalties: Vec<RecentPenalty>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentPayment {
    pub id: String,
    pub citizen_name: String,
    pub customer_id: String,
    pub amount: f64,
    pub method: PaymentMethod,
    pub date: DateTime<Utc>,
    pub receipt_no: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentPenalty {
    pub id: String,
    pub citizen_name: String,
    pub customer_id: String,
    pub amount: f64,
    pub reason: String,
    pub date: DateTime<Utc>,
    pub days_overdue: i64,
}

fn rate_percent(collected: f64, pending: f64) -> f64 {
    let total = collected + pending;
    if total > 0.0 {
        (collected / total * 100.0).round()
    } else {
        0.0
    }
}

/// Dashboard aggregates across the whole municipality. Year scoping applies
/// to levies and the monthly chart; payment and penalty totals span all years.
pub fn admin_analytics(conn: &Connection, year: i32) -> Result<AdminAnalytics> {
    let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |row| row.get(0))?) };

    let total_citizens = count("SELECT COUNT(*) FROM citizens")?;
    let total_districts = count("SELECT COUNT(*) FROM districts")?;
    let total_payments = count("SELECT COUNT(*) FROM payments WHERE status = 'completed'")?;
    let total_penalties = count("SELECT COUNT(*) FROM penalties WHERE status = 'active'")?;

    let total_tax_records: i64 = conn.query_row(
        "SELECT COUNT(*) FROM tax_records WHERE tax_year = ?1",
        params![year],
        |row| row.get(0),
    )?;

    let tax_collected: f64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE status = 'completed'",
        [],
        |row| row.get(0),
    )?;
    let pending_tax: f64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM tax_records
         WHERE status != 'paid' AND tax_year = ?1",
        params![year],
        |row| row.get(0),
    )?;
    let total_penalty_amount: f64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM penalties WHERE status = 'active'",
        [],
        |row| row.get(0),
    )?;

    Ok(AdminAnalytics {
        overview: AdminOverview {
            total_citizens,
            total_districts,
            total_tax_records,
            total_payments,
            total_penalties,
            tax_collected,
            pending_tax,
            total_penalty_amount,
            collection_rate: rate_percent(tax_collected, pending_tax),
        },
        charts: AdminCharts {
            monthly_collections: monthly_collections(conn, year)?,
            district_analytics: district_analytics(conn, year)?,
            payment_methods: payment_method_breakdown(conn)?,
        },
        recent_activities: AdminRecentActivities {
            payments: recent_payments(conn, 10)?,
            penalties: recent_penalties(conn, 10)?,
        },
    })
}

/// Completed payments bucketed by calendar month of the given year. Always
/// returns twelve buckets, zero-filled.
fn monthly_collections(conn: &Connection, year: i32) -> Result<Vec<MonthlyCollection>> {
    let mut stmt = conn.prepare(
        "SELECT amount, payment_date FROM payments
         WHERE status = 'completed' AND payment_date >= ?1 AND payment_date < ?2",
    )?;

    let rows = stmt
        .query_map(
            params![format!("{}-01-01", year), format!("{}-01-01", year + 1)],
            |row| {
                let amount: f64 = row.get(0)?;
                let date: String = row.get(1)?;
                Ok((amount, store::parse_dt(&date)?))
            },
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut buckets: Vec<MonthlyCollection> = MONTH_LABELS
        .iter()
        .map(|label| MonthlyCollection {
            month: label.to_string(),
            amount: 0.0,
            count: 0,
        })
        .collect();

    for (amount, date) in rows {
        let bucket = &mut buckets[date.month0() as usize];
        bucket.amount += amount;
        bucket.count += 1;
    }

    Ok(buckets)
}

fn district_analytics(conn: &Connection, year: i32) -> Result<Vec<DistrictAnalytics>> {
    let mut stmt = conn.prepare(
        "SELECT d.name,
                (SELECT COUNT(*) FROM citizens c WHERE c.district_id = d.id),
                (SELECT COALESCE(SUM(t.amount), 0) FROM tax_records t
                   JOIN citizens c ON c.id = t.citizen_id
                  WHERE c.district_id = d.id AND t.tax_year = ?1),
                (SELECT COALESCE(SUM(p.amount), 0) FROM payments p
                   JOIN citizens c ON c.id = p.citizen_id
                  WHERE c.district_id = d.id AND p.status = 'completed'),
                (SELECT COALESCE(SUM(pn.amount), 0) FROM penalties pn
                   JOIN citizens c ON c.id = pn.citizen_id
                  WHERE c.district_id = d.id AND pn.status = 'active')
         FROM districts d
         ORDER BY d.name",
    )?;

    let districts = stmt
        .query_map(params![year], |row| {
            let total_tax: f64 = row.get(2)?;
            let collected_tax: f64 = row.get(3)?;
            Ok(DistrictAnalytics {
                name: row.get(0)?,
                citizens: row.get(1)?,
                total_tax,
                collected_tax,
                pending_tax: total_tax - collected_tax,
                penalties: row.get(4)?,
                collection_rate: if total_tax > 0.0 {
                    (collected_tax / total_tax * 100.0).round()
                } else {
                    0.0
                },
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(districts)
}

fn payment_method_breakdown(conn: &Connection) -> Result<Vec<MethodBreakdown>> {
    let mut stmt = conn.prepare(
        "SELECT method, COALESCE(SUM(amount), 0), COUNT(*)
         FROM payments
         WHERE status = 'completed'
         GROUP BY method
         ORDER BY method",
    )?;

    let methods = stmt
        .query_map([], |row| {
            let method: String = row.get(0)?;
            Ok(MethodBreakdown {
                method: PaymentMethod::parse(&method).ok_or(rusqlite::Error::InvalidQuery)?,
                amount: row.get(1)?,
                count: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(methods)
}

fn recent_payments(conn: &Connection, limit: i64) -> Result<Vec<RecentPayment>> {
    let mut stmt = conn.prepare(
        "SELECT p.id, c.name, c.customer_id, p.amount, p.method, p.payment_date, p.receipt_no
         FROM payments p
         JOIN citizens c ON c.id = p.citizen_id
         WHERE p.status = 'completed'
         ORDER BY p.payment_date DESC
         LIMIT ?1",
    )?;

    let payments = stmt
        .query_map(params![limit], |row| {
            let method: String = row.get(4)?;
            let date: String = row.get(5)?;
            Ok(RecentPayment {
                id: row.get(0)?,
                citizen_name: row.get(1)?,
                customer_id: row.get(2)?,
                amount: row.get(3)?,
                method: PaymentMethod::parse(&method).ok_or(rusqlite::Error::InvalidQuery)?,
                date: store::parse_dt(&date)?,
                receipt_no: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(payments)
}

fn recent_penalties(conn: &Connection, limit: i64) -> Result<Vec<RecentPenalty>> {
    let mut stmt = conn.prepare(
        "SELECT pn.id, c.name, c.customer_id, pn.amount, pn.reason, pn.applied_date, pn.days_overdue
         FROM penalties pn
         JOIN citizens c ON c.id = pn.citizen_id
         WHERE pn.status = 'active'
         ORDER BY pn.applied_date DESC
         LIMIT ?1",
    )?;

    let penalties = stmt
        .query_map(params![limit], |row| {
            let date: String = row.get(5)?;
            Ok(RecentPenalty {
                id: row.get(0)?,
                citizen_name: row.get(1)?,
                customer_id: row.get(2)?,
                amount: row.get(3)?,
                reason: row.get(4)?,
                date: store::parse_dt(&date)?,
                days_overdue: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(penalties)
}

// ============================================================================
// CITIZEN PORTAL
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CitizenAnalytics {
    pub citizen: CitizenProfile,
    pub overview: CitizenOverview,
    pub charts: CitizenCharts,
    pub recent_activities: CitizenRecentActivities,
}

#[derive(Debug, Clone, Serialize)]
pub struct CitizenProfile {
    pub id: String,
    pub customer_id: String,
    pub name: String,
    pub ward_no: String,
    pub district: String,
    pub city: String,
    pub state: String,
    pub contact_no: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CitizenOverview {
    pub total_tax_paid: f64,
    pub total_pending_tax: f64,
    pub total_penalties: f64,
    pub total_tax_records: i64,
    pub total_payments: i64,
    pub active_penalties: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CitizenCharts {
    /// Completed payments grouped by tax year, ascending
    pub payment_history: Vec<YearlyPayments>,

    /// Every levy, ascending by year
    pub tax_trend: Vec<TaxTrendPoint>,

    pub payment_methods: Vec<MethodBreakdown>,
}

#[derive(Debug, Clone, Serialize)]
pub struct YearlyPayments {
    pub year: i32,
    pub amount: f64,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaxTrendPoint {
    pub year: i32,
    pub amount: f64,
    pub status: TaxStatus,
    pub due_date: NaiveDate,
    pub paid_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CitizenRecentActivities {
    pub payments: Vec<CitizenPaymentActivity>,
    pub penalties: Vec<CitizenPenaltyActivity>,
    pub reminders: Vec<CitizenReminderActivity>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CitizenPaymentActivity {
    pub id: String,
    pub amount: f64,
    pub method: PaymentMethod,
    pub date: DateTime<Utc>,
    pub receipt_no: String,
    pub tax_year: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CitizenPenaltyActivity {
    pub id: String,
    pub amount: f64,
    pub reason: String,
    pub date: DateTime<Utc>,
    pub status: PenaltyStatus,
    pub tax_year: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CitizenReminderActivity {
    pub id: String,
    pub message: String,
    pub kind: ReminderKind,
    pub status: ReminderStatus,
    pub date: DateTime<Utc>,
}

/// Per-citizen aggregates for the portal dashboard. The caller has already
/// checked the citizen exists and the session may see it.
pub fn citizen_analytics(conn: &Connection, citizen_id: &str) -> Result<Option<CitizenAnalytics>> {
    let citizen = match store::find_citizen(conn, citizen_id)? {
        Some(citizen) => citizen,
        None => return Ok(None),
    };
    let district_name: String = conn.query_row(
        "SELECT name FROM districts WHERE id = ?1",
        params![citizen.district_id],
        |row| row.get(0),
    )?;

    let records = store::tax_records_for_citizen(conn, citizen_id)?;
    let penalties = store::penalties_for_citizen(conn, citizen_id)?;

    // Completed payments with their levy's year attached
    let mut stmt = conn.prepare(
        "SELECT p.id, p.amount, p.method, p.payment_date, p.receipt_no, t.tax_year
         FROM payments p
         JOIN tax_records t ON t.id = p.tax_record_id
         WHERE p.citizen_id = ?1 AND p.status = ?2
         ORDER BY p.payment_date DESC",
    )?;
    let payments = stmt
        .query_map(
            params![citizen_id, PaymentStatus::Completed.as_str()],
            |row| {
                let method: String = row.get(2)?;
                let date: String = row.get(3)?;
                Ok(CitizenPaymentActivity {
                    id: row.get(0)?,
                    amount: row.get(1)?,
                    method: PaymentMethod::parse(&method).ok_or(rusqlite::Error::InvalidQuery)?,
                    date: store::parse_dt(&date)?,
                    receipt_no: row.get(4)?,
                    tax_year: row.get(5)?,
                })
            },
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let total_tax_paid: f64 = payments.iter().map(|p| p.amount).sum();
    let total_pending_tax: f64 = records
        .iter()
        .filter(|r| r.status != TaxStatus::Paid)
        .map(|r| r.amount)
        .sum();
    let active: Vec<_> = penalties
        .iter()
        .filter(|p| p.status == PenaltyStatus::Active)
        .collect();
    let total_penalties: f64 = active.iter().map(|p| p.amount).sum();

    let mut by_year: BTreeMap<i32, YearlyPayments> = BTreeMap::new();
    for payment in &payments {
        let entry = by_year.entry(payment.tax_year).or_insert(YearlyPayments {
            year: payment.tax_year,
            amount: 0.0,
            count: 0,
        });
        entry.amount += payment.amount;
        entry.count += 1;
    }

    let mut by_method: BTreeMap<&'static str, MethodBreakdown> = BTreeMap::new();
    for payment in &payments {
        let entry = by_method
            .entry(payment.method.as_str())
            .or_insert(MethodBreakdown {
                method: payment.method,
                amount: 0.0,
                count: 0,
            });
        entry.amount += payment.amount;
        entry.count += 1;
    }

    let mut tax_trend: Vec<TaxTrendPoint> = records
        .iter()
        .map(|r| TaxTrendPoint {
            year: r.tax_year,
            amount: r.amount,
            status: r.status,
            due_date: r.due_date,
            paid_date: r.paid_date,
        })
        .collect();
    tax_trend.sort_by_key(|p| p.year);

    // Penalty activity needs the levy year too
    let mut stmt = conn.prepare(
        "SELECT pn.id, pn.amount, pn.reason, pn.applied_date, pn.status, t.tax_year
         FROM penalties pn
         JOIN tax_records t ON t.id = pn.tax_record_id
         WHERE pn.citizen_id = ?1
         ORDER BY pn.applied_date DESC
         LIMIT 5",
    )?;
    let penalty_activity = stmt
        .query_map(params![citizen_id], |row| {
            let date: String = row.get(3)?;
            let status: String = row.get(4)?;
            Ok(CitizenPenaltyActivity {
                id: row.get(0)?,
                amount: row.get(1)?,
                reason: row.get(2)?,
                date: store::parse_dt(&date)?,
                status: PenaltyStatus::parse(&status).ok_or(rusqlite::Error::InvalidQuery)?,
                tax_year: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let reminder_activity = store::reminders_for_citizen(conn, citizen_id)?
        .into_iter()
        .take(5)
        .map(|r| CitizenReminderActivity {
            id: r.id,
            message: r.message,
            kind: r.kind,
            status: r.status,
            date: r.sent_at,
        })
        .collect();

    Ok(Some(CitizenAnalytics {
        citizen: CitizenProfile {
            id: citizen.id,
            customer_id: citizen.customer_id,
            name: citizen.name,
            ward_no: citizen.ward_no,
            district: district_name,
            city: citizen.city,
            state: citizen.state,
            contact_no: citizen.contact_no,
        },
        overview: CitizenOverview {
            total_tax_paid,
            total_pending_tax,
            total_penalties,
            total_tax_records: records.len() as i64,
            total_payments: payments.len() as i64,
            active_penalties: active.len() as i64,
        },
        charts: CitizenCharts {
            payment_history: by_year.into_values().collect(),
            tax_trend,
            payment_methods: by_method.into_values().collect(),
        },
        recent_activities: CitizenRecentActivities {
            payments: payments.into_iter().take(5).collect(),
            penalties: penalty_activity,
            reminders: reminder_activity,
        },
    }))
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

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        seed_defaults(&conn).unwrap();
        conn
    }

    fn citizen_in(conn: &Connection, district_idx: usize, customer_id: &str) -> Citizen {
        let district = &list_districts(conn).unwrap()[district_idx].district;
        let citizen = Citizen::new(
            customer_id.to_string(),
            format!("Citizen {}", customer_id),
            "Ward-1".to_string(),
            district.id.clone(),
            "Mumbai".to_string(),
            "Maharashtra".to_string(),
            "9876543210".to_string(),
        );
        insert_citizen(conn, &citizen).unwrap();
        citizen
    }

    fn levy(conn: &Connection, citizen: &Citizen, year: i32, amount: f64) -> TaxRecord {
        let due = NaiveDate::from_ymd_opt(year, 3, 31).unwrap();
        let record = TaxRecord::new(&citizen.id, year, amount, due);
        insert_tax_record(conn, &record).unwrap();
        record
    }

    fn pay(conn: &Connection, record: &TaxRecord, amount: f64, receipt: &str) -> Payment {
        let payment = Payment::completed(
            &record.id,
            &record.citizen_id,
            amount,
            PaymentMethod::Online,
            receipt.to_string(),
        );
        insert_payment(conn, &payment).unwrap();
        payment
    }

    #[test]
    fn test_admin_overview_counts_and_rate() {
        let conn = test_conn();
        let year = Utc::now().year();

        let a = citizen_in(&conn, 0, "CID000000100");
        let b = citizen_in(&conn, 1, "CID000000101");

        let paid = levy(&conn, &a, year, 3000.0);
        pay(&conn, &paid, 3000.0, "RCP0000000100");
        conn.execute(
            "UPDATE tax_records SET status = 'paid' WHERE id = ?1",
            params![paid.id],
        )
        .unwrap();

        levy(&conn, &b, year, 1000.0);

        let analytics = admin_analytics(&conn, year).unwrap();

        assert_eq!(analytics.overview.total_citizens, 2);
        assert_eq!(analytics.overview.total_districts, 3);
        assert_eq!(analytics.overview.total_tax_records, 2);
        assert_eq!(analytics.overview.total_payments, 1);
        assert_eq!(analytics.overview.tax_collected, 3000.0);
        assert_eq!(analytics.overview.pending_tax, 1000.0);
        // 3000 / 4000 = 75%
        assert_eq!(analytics.overview.collection_rate, 75.0);
    }

    #[test]
    fn test_monthly_buckets_are_zero_filled() {
        let conn = test_conn();
        let year = Utc::now().year();

        let citizen = citizen_in(&conn, 0, "CID000000102");
        let record = levy(&conn, &citizen, year, 2000.0);
        pay(&conn, &record, 2000.0, "RCP0000000102");

        let analytics = admin_analytics(&conn, year).unwrap();
        let months = &analytics.charts.monthly_collections;

        assert_eq!(months.len(), 12);
        assert_eq!(months[0].month, "Jan");
        assert_eq!(months[11].month, "Dec");

        let total: f64 = months.iter().map(|m| m.amount).sum();
        assert_eq!(total, 2000.0);

        let this_month = Utc::now().month0() as usize;
        assert_eq!(months[this_month].count, 1);
    }

    #[test]
    fn test_district_rollup() {
        let conn = test_conn();
        let year = Utc::now().year();

        let a = citizen_in(&conn, 0, "CID000000103");
        let record = levy(&conn, &a, year, 4000.0);
        pay(&conn, &record, 4000.0, "RCP0000000103");

        let penalty = Penalty::new(
            &a.id,
            &record.id,
            100.0,
            "Auto-applied: Fixed Penalty".to_string(),
            10,
            "Fixed penalty: ₹100".to_string(),
        );
        insert_penalty(&conn, &penalty).unwrap();

        let analytics = admin_analytics(&conn, year).unwrap();
        let districts = &analytics.charts.district_analytics;

        assert_eq!(districts.len(), 3);
        let central = districts.iter().find(|d| d.name == "Central District").unwrap();
        assert_eq!(central.citizens, 1);
        assert_eq!(central.total_tax, 4000.0);
        assert_eq!(central.collected_tax, 4000.0);
        assert_eq!(central.penalties, 100.0);
        assert_eq!(central.collection_rate, 100.0);

        let north = districts.iter().find(|d| d.name == "North District").unwrap();
        assert_eq!(north.citizens, 0);
        assert_eq!(north.collection_rate, 0.0);
    }

    #[test]
    fn test_citizen_analytics_rollup() {
        let conn = test_conn();

        let citizen = citizen_in(&conn, 0, "CID000000104");
        let old = levy(&conn, &citizen, 2023, 4500.0);
        pay(&conn, &old, 4500.0, "RCP0000000104");
        conn.execute(
            "UPDATE tax_records SET status = 'paid' WHERE id = ?1",
            params![old.id],
        )
        .unwrap();

        let current = levy(&conn, &citizen, 2024, 5000.0);
        let penalty = Penalty::new(
            &citizen.id,
            &current.id,
            100.0,
            "Auto-applied: Fixed Penalty".to_string(),
            19,
            "Fixed penalty: ₹100".to_string(),
        );
        insert_penalty(&conn, &penalty).unwrap();

        let analytics = citizen_analytics(&conn, &citizen.id).unwrap().unwrap();

        assert_eq!(analytics.citizen.district, "Central District");
        assert_eq!(analytics.overview.total_tax_paid, 4500.0);
        assert_eq!(analytics.overview.total_pending_tax, 5000.0);
        assert_eq!(analytics.overview.total_penalties, 100.0);
        assert_eq!(analytics.overview.total_tax_records, 2);
        assert_eq!(analytics.overview.active_penalties, 1);

        // Trend is ascending by year
        assert_eq!(analytics.charts.tax_trend[0].year, 2023);
        assert_eq!(analytics.charts.tax_trend[1].year, 2024);

        assert_eq!(analytics.charts.payment_history.len(), 1);
        assert_eq!(analytics.charts.payment_history[0].year, 2023);

        assert_eq!(analytics.recent_activities.penalties.len(), 1);
        assert_eq!(analytics.recent_activities.penalties[0].tax_year, 2024);
    }

    #[test]
    fn test_citizen_analytics_missing_citizen() {
        let conn = test_conn();

        assert!(citizen_analytics(&conn, "no-such-citizen").unwrap().is_none());
    }
}
