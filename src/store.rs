// SQLite store
//
// Schema setup, seeds, and typed queries for every entity. Settlement paths
// (direct payment, gateway completion) run inside a transaction so a
// completed payment, its paid tax record, and its cleared penalties commit
// together.

use crate::auth;
use crate::entities::{
    Citizen, District, Payment, PaymentMethod, PaymentStatus, Penalty, PenaltyStatus, Reminder,
    TaxRecord, TaxStatus,
};
use crate::error::{Result, TaxError};
use crate::rules::{default_rules, PenaltyRule, RuleKind};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::info;

// ============================================================================
// SETUP & SEEDS
// ============================================================================

/// Open (or create) the database file and make sure the schema exists.
pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    setup_database(&conn)?;
    info!(path = %path.display(), "database opened");
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS admins (
            id TEXT PRIMARY KEY,
            username TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            salt TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS districts (
            id TEXT PRIMARY KEY,
            name TEXT UNIQUE NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS citizens (
            id TEXT PRIMARY KEY,
            customer_id TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            ward_no TEXT NOT NULL,
            district_id TEXT NOT NULL REFERENCES districts(id),
            city TEXT NOT NULL,
            state TEXT NOT NULL,
            contact_no TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // One obligation per citizen and year
    conn.execute(
        "CREATE TABLE IF NOT EXISTS tax_records (
            id TEXT PRIMARY KEY,
            citizen_id TEXT NOT NULL REFERENCES citizens(id),
            tax_year INTEGER NOT NULL,
            amount REAL NOT NULL,
            due_date TEXT NOT NULL,
            status TEXT NOT NULL,
            paid_date TEXT,
            created_at TEXT NOT NULL,
            UNIQUE(citizen_id, tax_year)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS payments (
            id TEXT PRIMARY KEY,
            tax_record_id TEXT NOT NULL REFERENCES tax_records(id),
            citizen_id TEXT NOT NULL REFERENCES citizens(id),
            amount REAL NOT NULL,
            method TEXT NOT NULL,
            status TEXT NOT NULL,
            receipt_no TEXT UNIQUE NOT NULL,
            gateway_session_id TEXT,
            gateway_payment_id TEXT,
            gateway_transaction_id TEXT,
            payment_date TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS penalties (
            id TEXT PRIMARY KEY,
            citizen_id TEXT NOT NULL REFERENCES citizens(id),
            tax_record_id TEXT NOT NULL REFERENCES tax_records(id),
            amount REAL NOT NULL,
            reason TEXT NOT NULL,
            status TEXT NOT NULL,
            days_overdue INTEGER NOT NULL,
            calculation TEXT NOT NULL,
            applied_date TEXT NOT NULL,
            paid_date TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS reminders (
            id TEXT PRIMARY KEY,
            citizen_id TEXT NOT NULL REFERENCES citizens(id),
            message TEXT NOT NULL,
            kind TEXT NOT NULL,
            status TEXT NOT NULL,
            message_id TEXT,
            sent_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS penalty_rules (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            value REAL NOT NULL,
            grace_period_days INTEGER NOT NULL,
            max_penalty REAL,
            description TEXT NOT NULL DEFAULT '',
            priority INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_citizens_district ON citizens(district_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_tax_records_citizen ON tax_records(citizen_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_tax_records_status ON tax_records(status, due_date)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_payments_citizen ON payments(citizen_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_payments_record ON payments(tax_record_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_payments_session ON payments(gateway_session_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_penalties_record ON penalties(tax_record_id, status)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_penalties_citizen ON penalties(citizen_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_reminders_citizen ON reminders(citizen_id)",
        [],
    )?;

    Ok(())
}

/// Seed the fixtures an empty database needs to be usable: the admin account,
/// the stock districts, and the default penalty rules. Safe to call on every
/// startup.
pub fn seed_defaults(conn: &Connection) -> Result<()> {
    let admin_count: i64 = conn.query_row("SELECT COUNT(*) FROM admins", [], |row| row.get(0))?;
    if admin_count == 0 {
        insert_admin(conn, "admin", "admin123")?;
        info!("seeded default admin account");
    }

    let district_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM districts", [], |row| row.get(0))?;
    if district_count == 0 {
        for name in ["Central District", "North District", "South District"] {
            insert_district(conn, &District::new(name))?;
        }
        info!("seeded default districts");
    }

    let rule_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM penalty_rules", [], |row| row.get(0))?;
    if rule_count == 0 {
        for rule in default_rules() {
            insert_penalty_rule(conn, &rule)?;
        }
        info!("seeded default penalty rules");
    }

    Ok(())
}

/// Sample citizens, tax records, and one settled payment for demos and
/// manual testing. Skipped when citizens already exist.
pub fn seed_demo_data(conn: &Connection) -> Result<()> {
    let citizen_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM citizens", [], |row| row.get(0))?;
    if citizen_count > 0 {
        return Ok(());
    }

    let districts = list_districts(conn)?;
    let central = districts
        .iter()
        .find(|d| d.district.name == "Central District")
        .ok_or_else(|| TaxError::not_found("Central District missing; seed defaults first"))?;
    let north = districts
        .iter()
        .find(|d| d.district.name == "North District")
        .ok_or_else(|| TaxError::not_found("North District missing; seed defaults first"))?;

    let john = Citizen::new(
        "CID001001".to_string(),
        "John Doe".to_string(),
        "Ward-1".to_string(),
        central.district.id.clone(),
        "Mumbai".to_string(),
        "Maharashtra".to_string(),
        "9876543210".to_string(),
    );
    let jane = Citizen::new(
        "CID001002".to_string(),
        "Jane Smith".to_string(),
        "Ward-2".to_string(),
        north.district.id.clone(),
        "Mumbai".to_string(),
        "Maharashtra".to_string(),
        "9876543211".to_string(),
    );
    insert_citizen(conn, &john)?;
    insert_citizen(conn, &jane)?;

    let year = Utc::now().year();
    let due = NaiveDate::from_ymd_opt(year, 12, 31)
        .ok_or_else(|| TaxError::validation("invalid seed due date"))?;

    let john_tax = TaxRecord::new(&john.id, year, 5000.0, due);
    insert_tax_record(conn, &john_tax)?;

    let mut jane_tax = TaxRecord::new(&jane.id, year, 7500.0, due);
    jane_tax.status = TaxStatus::Paid;
    jane_tax.paid_date = Some(Utc::now());
    insert_tax_record(conn, &jane_tax)?;

    let mut payment = Payment::completed(
        &jane_tax.id,
        &jane.id,
        7500.0,
        PaymentMethod::Online,
        "RCP12345678".to_string(),
    );
    payment.gateway_payment_id = Some("pay_seed_0001".to_string());
    insert_payment(conn, &payment)?;

    info!("seeded demo citizens and tax records");
    Ok(())
}

// ============================================================================
// ROW MAPPERS
// ============================================================================

pub(crate) fn parse_dt(s: &str) -> std::result::Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| rusqlite::Error::InvalidQuery)
}

pub(crate) fn parse_opt_dt(
    s: Option<String>,
) -> std::result::Result<Option<DateTime<Utc>>, rusqlite::Error> {
    s.map(|s| parse_dt(&s)).transpose()
}

pub(crate) fn parse_day(s: &str) -> std::result::Result<NaiveDate, rusqlite::Error> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| rusqlite::Error::InvalidQuery)
}

pub(crate) fn map_citizen(row: &Row, base: usize) -> rusqlite::Result<Citizen> {
    let created_at: String = row.get(base + 8)?;
    Ok(Citizen {
        id: row.get(base)?,
        customer_id: row.get(base + 1)?,
        name: row.get(base + 2)?,
        ward_no: row.get(base + 3)?,
        district_id: row.get(base + 4)?,
        city: row.get(base + 5)?,
        state: row.get(base + 6)?,
        contact_no: row.get(base + 7)?,
        created_at: parse_dt(&created_at)?,
    })
}

pub(crate) const CITIZEN_COLS: &str =
    "id, customer_id, name, ward_no, district_id, city, state, contact_no, created_at";

pub(crate) fn map_tax_record(row: &Row, base: usize) -> rusqlite::Result<TaxRecord> {
    let due_date: String = row.get(base + 4)?;
    let status: String = row.get(base + 5)?;
    let paid_date: Option<String> = row.get(base + 6)?;
    let created_at: String = row.get(base + 7)?;
    Ok(TaxRecord {
        id: row.get(base)?,
        citizen_id: row.get(base + 1)?,
        tax_year: row.get(base + 2)?,
        amount: row.get(base + 3)?,
        due_date: parse_day(&due_date)?,
        status: TaxStatus::parse(&status).ok_or(rusqlite::Error::InvalidQuery)?,
        paid_date: parse_opt_dt(paid_date)?,
        created_at: parse_dt(&created_at)?,
    })
}

pub(crate) const TAX_COLS: &str =
    "id, citizen_id, tax_year, amount, due_date, status, paid_date, created_at";

fn map_payment(row: &Row) -> rusqlite::Result<Payment> {
    let method: String = row.get(4)?;
    let status: String = row.get(5)?;
    let payment_date: String = row.get(10)?;
    Ok(Payment {
        id: row.get(0)?,
        tax_record_id: row.get(1)?,
        citizen_id: row.get(2)?,
        amount: row.get(3)?,
        method: PaymentMethod::parse(&method).ok_or(rusqlite::Error::InvalidQuery)?,
        status: PaymentStatus::parse(&status).ok_or(rusqlite::Error::InvalidQuery)?,
        receipt_no: row.get(6)?,
        gateway_session_id: row.get(7)?,
        gateway_payment_id: row.get(8)?,
        gateway_transaction_id: row.get(9)?,
        payment_date: parse_dt(&payment_date)?,
    })
}

const PAYMENT_COLS: &str = "id, tax_record_id, citizen_id, amount, method, status, receipt_no, \
     gateway_session_id, gateway_payment_id, gateway_transaction_id, payment_date";

fn map_penalty(row: &Row) -> rusqlite::Result<Penalty> {
    let status: String = row.get(5)?;
    let applied_date: String = row.get(8)?;
    let paid_date: Option<String> = row.get(9)?;
    Ok(Penalty {
        id: row.get(0)?,
        citizen_id: row.get(1)?,
        tax_record_id: row.get(2)?,
        amount: row.get(3)?,
        reason: row.get(4)?,
        status: PenaltyStatus::parse(&status).ok_or(rusqlite::Error::InvalidQuery)?,
        days_overdue: row.get(6)?,
        calculation: row.get(7)?,
        applied_date: parse_dt(&applied_date)?,
        paid_date: parse_opt_dt(paid_date)?,
    })
}

const PENALTY_COLS: &str = "id, citizen_id, tax_record_id, amount, reason, status, days_overdue, \
     calculation, applied_date, paid_date";

fn map_reminder(row: &Row) -> rusqlite::Result<Reminder> {
    use crate::entities::{ReminderKind, ReminderStatus};

    let kind: String = row.get(3)?;
    let status: String = row.get(4)?;
    let sent_at: String = row.get(6)?;
    Ok(Reminder {
        id: row.get(0)?,
        citizen_id: row.get(1)?,
        message: row.get(2)?,
        kind: ReminderKind::parse(&kind).ok_or(rusqlite::Error::InvalidQuery)?,
        status: ReminderStatus::parse(&status).ok_or(rusqlite::Error::InvalidQuery)?,
        message_id: row.get(5)?,
        sent_at: parse_dt(&sent_at)?,
    })
}

const REMINDER_COLS: &str = "id, citizen_id, message, kind, status, message_id, sent_at";

fn map_rule(row: &Row) -> rusqlite::Result<PenaltyRule> {
    let kind: String = row.get(2)?;
    Ok(PenaltyRule {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: RuleKind::parse(&kind).ok_or(rusqlite::Error::InvalidQuery)?,
        value: row.get(3)?,
        grace_period_days: row.get(4)?,
        max_penalty: row.get(5)?,
        description: row.get(6)?,
        priority: row.get(7)?,
    })
}

fn conflict_on_constraint(
    result: std::result::Result<usize, rusqlite::Error>,
    message: &str,
) -> Result<usize> {
    match result {
        Ok(n) => Ok(n),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(TaxError::conflict(message))
        }
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// ADMINS
// ============================================================================

#[derive(Debug, Clone)]
pub struct Admin {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub salt: String,
    pub created_at: DateTime<Utc>,
}

pub fn insert_admin(conn: &Connection, username: &str, password: &str) -> Result<Admin> {
    let salt = auth::new_salt();
    let admin = Admin {
        id: uuid::Uuid::new_v4().to_string(),
        username: username.to_string(),
        password_hash: auth::hash_password(password, &salt),
        salt,
        created_at: Utc::now(),
    };

    conflict_on_constraint(
        conn.execute(
            "INSERT INTO admins (id, username, password_hash, salt, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                admin.id,
                admin.username,
                admin.password_hash,
                admin.salt,
                admin.created_at.to_rfc3339(),
            ],
        ),
        "Username already exists",
    )?;

    Ok(admin)
}

pub fn find_admin_by_username(conn: &Connection, username: &str) -> Result<Option<Admin>> {
    let admin = conn
        .query_row(
            "SELECT id, username, password_hash, salt, created_at FROM admins WHERE username = ?1",
            params![username],
            |row| {
                let created_at: String = row.get(4)?;
                Ok(Admin {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    password_hash: row.get(2)?,
                    salt: row.get(3)?,
                    created_at: parse_dt(&created_at)?,
                })
            },
        )
        .optional()?;

    Ok(admin)
}

pub fn find_admin(conn: &Connection, id: &str) -> Result<Option<Admin>> {
    let admin = conn
        .query_row(
            "SELECT id, username, password_hash, salt, created_at FROM admins WHERE id = ?1",
            params![id],
            |row| {
                let created_at: String = row.get(4)?;
                Ok(Admin {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    password_hash: row.get(2)?,
                    salt: row.get(3)?,
                    created_at: parse_dt(&created_at)?,
                })
            },
        )
        .optional()?;

    Ok(admin)
}

// ============================================================================
// DISTRICTS
// ============================================================================

#[derive(Debug, Clone)]
pub struct DistrictSummary {
    pub district: District,
    pub citizen_count: i64,
}

pub fn insert_district(conn: &Connection, district: &District) -> Result<()> {
    conflict_on_constraint(
        conn.execute(
            "INSERT INTO districts (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![district.id, district.name, district.created_at.to_rfc3339()],
        ),
        "District already exists",
    )?;

    Ok(())
}

pub fn find_district(conn: &Connection, id: &str) -> Result<Option<District>> {
    let district = conn
        .query_row(
            "SELECT id, name, created_at FROM districts WHERE id = ?1",
            params![id],
            |row| {
                let created_at: String = row.get(2)?;
                Ok(District {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: parse_dt(&created_at)?,
                })
            },
        )
        .optional()?;

    Ok(district)
}

pub fn list_districts(conn: &Connection) -> Result<Vec<DistrictSummary>> {
    let mut stmt = conn.prepare(
        "SELECT d.id, d.name, d.created_at, COUNT(c.id)
         FROM districts d
         LEFT JOIN citizens c ON c.district_id = d.id
         GROUP BY d.id, d.name, d.created_at
         ORDER BY d.name",
    )?;

    let districts = stmt
        .query_map([], |row| {
            let created_at: String = row.get(2)?;
            Ok(DistrictSummary {
                district: District {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: parse_dt(&created_at)?,
                },
                citizen_count: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(districts)
}

// ============================================================================
// CITIZENS
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct CitizenFilter {
    pub district_id: Option<String>,
    /// Case-insensitive match on name, customer id, or contact number
    pub search: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CitizenListRow {
    pub citizen: Citizen,
    pub district_name: String,
    pub tax_record_count: i64,
    pub payment_count: i64,
    pub pending_amount: f64,
}

pub fn insert_citizen(conn: &Connection, citizen: &Citizen) -> Result<()> {
    conflict_on_constraint(
        conn.execute(
            "INSERT INTO citizens (id, customer_id, name, ward_no, district_id, city, state, contact_no, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                citizen.id,
                citizen.customer_id,
                citizen.name,
                citizen.ward_no,
                citizen.district_id,
                citizen.city,
                citizen.state,
                citizen.contact_no,
                citizen.created_at.to_rfc3339(),
            ],
        ),
        "Customer ID already exists",
    )?;

    Ok(())
}

pub fn list_citizens(conn: &Connection, filter: &CitizenFilter) -> Result<Vec<CitizenListRow>> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(district_id) = &filter.district_id {
        clauses.push("c.district_id = ?");
        bindings.push(district_id.clone());
    }
    if let Some(search) = &filter.search {
        clauses.push(
            "(LOWER(c.name) LIKE ? OR LOWER(c.customer_id) LIKE ? OR c.contact_no LIKE ?)",
        );
        let needle = format!("%{}%", search.to_lowercase());
        bindings.push(needle.clone());
        bindings.push(needle.clone());
        bindings.push(needle);
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let sql = format!(
        "SELECT c.id, c.customer_id, c.name, c.ward_no, c.district_id, c.city, c.state, c.contact_no, c.created_at,
                d.name,
                (SELECT COUNT(*) FROM tax_records t WHERE t.citizen_id = c.id),
                (SELECT COUNT(*) FROM payments p WHERE p.citizen_id = c.id AND p.status = 'completed'),
                (SELECT COALESCE(SUM(t.amount), 0) FROM tax_records t WHERE t.citizen_id = c.id AND t.status != 'paid')
         FROM citizens c
         JOIN districts d ON d.id = c.district_id
         {}
         ORDER BY c.created_at DESC",
        where_sql
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(bindings.iter()), |row| {
            Ok(CitizenListRow {
                citizen: map_citizen(row, 0)?,
                district_name: row.get(9)?,
                tax_record_count: row.get(10)?,
                payment_count: row.get(11)?,
                pending_amount: row.get(12)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

pub fn find_citizen(conn: &Connection, id: &str) -> Result<Option<Citizen>> {
    let sql = format!("SELECT {} FROM citizens WHERE id = ?1", CITIZEN_COLS);
    let citizen = conn
        .query_row(&sql, params![id], |row| map_citizen(row, 0))
        .optional()?;

    Ok(citizen)
}

pub fn find_citizen_by_customer_id(conn: &Connection, customer_id: &str) -> Result<Option<Citizen>> {
    let sql = format!("SELECT {} FROM citizens WHERE customer_id = ?1", CITIZEN_COLS);
    let citizen = conn
        .query_row(&sql, params![customer_id], |row| map_citizen(row, 0))
        .optional()?;

    Ok(citizen)
}

pub fn customer_id_exists(conn: &Connection, customer_id: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM citizens WHERE customer_id = ?1",
        params![customer_id],
        |row| row.get(0),
    )?;

    Ok(count > 0)
}

/// Mint a customer id that is not yet taken.
pub fn unique_customer_id(conn: &Connection) -> Result<String> {
    loop {
        let candidate = auth::generate_customer_id();
        if !customer_id_exists(conn, &candidate)? {
            return Ok(candidate);
        }
    }
}

pub fn citizens_by_ids(conn: &Connection, ids: &[String]) -> Result<Vec<Citizen>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT {} FROM citizens WHERE id IN ({}) ORDER BY created_at",
        CITIZEN_COLS, placeholders
    );

    let mut stmt = conn.prepare(&sql)?;
    let citizens = stmt
        .query_map(params_from_iter(ids.iter()), |row| map_citizen(row, 0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(citizens)
}

// ============================================================================
// TAX RECORDS
// ============================================================================

pub fn insert_tax_record(conn: &Connection, record: &TaxRecord) -> Result<()> {
    conflict_on_constraint(
        conn.execute(
            "INSERT INTO tax_records (id, citizen_id, tax_year, amount, due_date, status, paid_date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id,
                record.citizen_id,
                record.tax_year,
                record.amount,
                record.due_date.to_string(),
                record.status.as_str(),
                record.paid_date.map(|d| d.to_rfc3339()),
                record.created_at.to_rfc3339(),
            ],
        ),
        "Tax record already exists for this citizen and year",
    )?;

    Ok(())
}

pub fn find_tax_record(conn: &Connection, id: &str) -> Result<Option<TaxRecord>> {
    let sql = format!("SELECT {} FROM tax_records WHERE id = ?1", TAX_COLS);
    let record = conn
        .query_row(&sql, params![id], |row| map_tax_record(row, 0))
        .optional()?;

    Ok(record)
}

pub fn tax_records_for_citizen(conn: &Connection, citizen_id: &str) -> Result<Vec<TaxRecord>> {
    let sql = format!(
        "SELECT {} FROM tax_records WHERE citizen_id = ?1 ORDER BY tax_year DESC",
        TAX_COLS
    );

    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map(params![citizen_id], |row| map_tax_record(row, 0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(records)
}

pub fn set_tax_status(
    conn: &Connection,
    id: &str,
    status: TaxStatus,
    paid_date: Option<DateTime<Utc>>,
) -> Result<()> {
    conn.execute(
        "UPDATE tax_records SET status = ?1, paid_date = ?2 WHERE id = ?3",
        params![status.as_str(), paid_date.map(|d| d.to_rfc3339()), id],
    )?;

    Ok(())
}

/// Unpaid records past their due date, optionally narrowed to a set of
/// citizens. Feeds the sweep and the auto-calculate endpoint. Covers both
/// pending records and ones an earlier sweep already flipped to overdue,
/// since grace periods can lapse between sweeps.
pub fn unpaid_overdue_records(
    conn: &Connection,
    today: NaiveDate,
    citizen_ids: Option<&[String]>,
) -> Result<Vec<TaxRecord>> {
    let mut bindings: Vec<String> = vec![today.to_string()];
    let mut sql = format!(
        "SELECT {} FROM tax_records WHERE status != 'paid' AND due_date < ?",
        TAX_COLS
    );

    if let Some(ids) = citizen_ids {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        sql.push_str(&format!(" AND citizen_id IN ({})", placeholders));
        bindings.extend(ids.iter().cloned());
    }

    sql.push_str(" ORDER BY due_date");

    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map(params_from_iter(bindings.iter()), |row| {
            map_tax_record(row, 0)
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(records)
}

/// Pending records due within the next `within_days` days (inclusive).
pub fn upcoming_pending_records(
    conn: &Connection,
    today: NaiveDate,
    within_days: i64,
) -> Result<Vec<TaxRecord>> {
    let horizon = today + Duration::days(within_days);
    let sql = format!(
        "SELECT {} FROM tax_records
         WHERE status = 'pending' AND due_date >= ?1 AND due_date <= ?2
         ORDER BY due_date",
        TAX_COLS
    );

    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map(params![today.to_string(), horizon.to_string()], |row| {
            map_tax_record(row, 0)
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(records)
}

// ============================================================================
// PAYMENTS & SETTLEMENT
// ============================================================================

pub fn insert_payment(conn: &Connection, payment: &Payment) -> Result<()> {
    conflict_on_constraint(
        conn.execute(
            "INSERT INTO payments (id, tax_record_id, citizen_id, amount, method, status, receipt_no,
                                   gateway_session_id, gateway_payment_id, gateway_transaction_id, payment_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                payment.id,
                payment.tax_record_id,
                payment.citizen_id,
                payment.amount,
                payment.method.as_str(),
                payment.status.as_str(),
                payment.receipt_no,
                payment.gateway_session_id,
                payment.gateway_payment_id,
                payment.gateway_transaction_id,
                payment.payment_date.to_rfc3339(),
            ],
        ),
        "Receipt number already exists",
    )?;

    Ok(())
}

pub fn find_payment(conn: &Connection, id: &str) -> Result<Option<Payment>> {
    let sql = format!("SELECT {} FROM payments WHERE id = ?1", PAYMENT_COLS);
    let payment = conn.query_row(&sql, params![id], map_payment).optional()?;

    Ok(payment)
}

pub fn find_payment_by_session(conn: &Connection, session_id: &str) -> Result<Option<Payment>> {
    let sql = format!(
        "SELECT {} FROM payments WHERE gateway_session_id = ?1",
        PAYMENT_COLS
    );
    let payment = conn
        .query_row(&sql, params![session_id], map_payment)
        .optional()?;

    Ok(payment)
}

pub fn payments_for_citizen(conn: &Connection, citizen_id: &str) -> Result<Vec<Payment>> {
    let sql = format!(
        "SELECT {} FROM payments WHERE citizen_id = ?1 ORDER BY payment_date DESC",
        PAYMENT_COLS
    );

    let mut stmt = conn.prepare(&sql)?;
    let payments = stmt
        .query_map(params![citizen_id], map_payment)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(payments)
}

pub fn payments_for_record(conn: &Connection, tax_record_id: &str) -> Result<Vec<Payment>> {
    let sql = format!(
        "SELECT {} FROM payments WHERE tax_record_id = ?1 ORDER BY payment_date DESC",
        PAYMENT_COLS
    );

    let mut stmt = conn.prepare(&sql)?;
    let payments = stmt
        .query_map(params![tax_record_id], map_payment)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(payments)
}

pub fn completed_payments_for_record(
    conn: &Connection,
    tax_record_id: &str,
) -> Result<Vec<Payment>> {
    let sql = format!(
        "SELECT {} FROM payments
         WHERE tax_record_id = ?1 AND status = 'completed'
         ORDER BY payment_date DESC",
        PAYMENT_COLS
    );

    let mut stmt = conn.prepare(&sql)?;
    let payments = stmt
        .query_map(params![tax_record_id], map_payment)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(payments)
}

pub fn receipt_exists(conn: &Connection, receipt_no: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM payments WHERE receipt_no = ?1",
        params![receipt_no],
        |row| row.get(0),
    )?;

    Ok(count > 0)
}

/// Mint a receipt number that is not yet taken.
pub fn unique_receipt_no(conn: &Connection) -> Result<String> {
    loop {
        let candidate = auth::generate_receipt_no();
        if !receipt_exists(conn, &candidate)? {
            return Ok(candidate);
        }
    }
}

fn settle_record_stmts(
    conn: &Connection,
    tax_record_id: &str,
    now: DateTime<Utc>,
) -> std::result::Result<(), rusqlite::Error> {
    conn.execute(
        "UPDATE tax_records SET status = 'paid', paid_date = ?1 WHERE id = ?2",
        params![now.to_rfc3339(), tax_record_id],
    )?;
    conn.execute(
        "UPDATE penalties SET status = 'paid', paid_date = ?1
         WHERE tax_record_id = ?2 AND status = 'active'",
        params![now.to_rfc3339(), tax_record_id],
    )?;
    Ok(())
}

/// Record a completed counter/direct payment and settle its tax record and
/// active penalties in one transaction.
pub fn record_direct_payment(
    conn: &mut Connection,
    record: &TaxRecord,
    method: PaymentMethod,
    amount: f64,
) -> Result<Payment> {
    let receipt_no = unique_receipt_no(conn)?;
    let payment = Payment::completed(&record.id, &record.citizen_id, amount, method, receipt_no);

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO payments (id, tax_record_id, citizen_id, amount, method, status, receipt_no,
                               gateway_session_id, gateway_payment_id, gateway_transaction_id, payment_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            payment.id,
            payment.tax_record_id,
            payment.citizen_id,
            payment.amount,
            payment.method.as_str(),
            payment.status.as_str(),
            payment.receipt_no,
            payment.gateway_session_id,
            payment.gateway_payment_id,
            payment.gateway_transaction_id,
            payment.payment_date.to_rfc3339(),
        ],
    )?;
    settle_record_stmts(&tx, &record.id, payment.payment_date)?;
    tx.commit()?;

    Ok(payment)
}

/// Settle a pending online payment after gateway confirmation. The payment,
/// its tax record, and the record's active penalties flip together.
pub fn complete_pending_payment(
    conn: &mut Connection,
    payment_id: &str,
    gateway_payment_id: &str,
    gateway_transaction_id: &str,
) -> Result<Payment> {
    let now = Utc::now();

    let tx = conn.transaction()?;
    let updated = tx.execute(
        "UPDATE payments
         SET status = 'completed', gateway_payment_id = ?1, gateway_transaction_id = ?2
         WHERE id = ?3 AND status = 'pending'",
        params![gateway_payment_id, gateway_transaction_id, payment_id],
    )?;
    if updated == 0 {
        return Err(TaxError::conflict("Payment is not pending"));
    }

    let sql = format!("SELECT {} FROM payments WHERE id = ?1", PAYMENT_COLS);
    let payment = tx.query_row(&sql, params![payment_id], map_payment)?;

    settle_record_stmts(&tx, &payment.tax_record_id, now)?;
    tx.commit()?;

    Ok(payment)
}

/// Flip a pending payment to failed/expired. Settled payments are left alone;
/// returns whether anything changed.
pub fn mark_pending_payment(
    conn: &Connection,
    payment_id: &str,
    status: PaymentStatus,
) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE payments SET status = ?1 WHERE id = ?2 AND status = 'pending'",
        params![status.as_str(), payment_id],
    )?;

    Ok(updated > 0)
}

// ============================================================================
// PENALTIES
// ============================================================================

pub fn insert_penalty(conn: &Connection, penalty: &Penalty) -> Result<()> {
    conn.execute(
        "INSERT INTO penalties (id, citizen_id, tax_record_id, amount, reason, status, days_overdue,
                                calculation, applied_date, paid_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            penalty.id,
            penalty.citizen_id,
            penalty.tax_record_id,
            penalty.amount,
            penalty.reason,
            penalty.status.as_str(),
            penalty.days_overdue,
            penalty.calculation,
            penalty.applied_date.to_rfc3339(),
            penalty.paid_date.map(|d| d.to_rfc3339()),
        ],
    )?;

    Ok(())
}

pub fn penalties_for_citizen(conn: &Connection, citizen_id: &str) -> Result<Vec<Penalty>> {
    let sql = format!(
        "SELECT {} FROM penalties WHERE citizen_id = ?1 ORDER BY applied_date DESC",
        PENALTY_COLS
    );

    let mut stmt = conn.prepare(&sql)?;
    let penalties = stmt
        .query_map(params![citizen_id], map_penalty)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(penalties)
}

pub fn penalties_for_record(conn: &Connection, tax_record_id: &str) -> Result<Vec<Penalty>> {
    let sql = format!(
        "SELECT {} FROM penalties WHERE tax_record_id = ?1 ORDER BY applied_date DESC",
        PENALTY_COLS
    );

    let mut stmt = conn.prepare(&sql)?;
    let penalties = stmt
        .query_map(params![tax_record_id], map_penalty)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(penalties)
}

pub fn active_penalties_for_record(
    conn: &Connection,
    tax_record_id: &str,
) -> Result<Vec<Penalty>> {
    let sql = format!(
        "SELECT {} FROM penalties
         WHERE tax_record_id = ?1 AND status = 'active'
         ORDER BY applied_date DESC",
        PENALTY_COLS
    );

    let mut stmt = conn.prepare(&sql)?;
    let penalties = stmt
        .query_map(params![tax_record_id], map_penalty)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(penalties)
}

pub fn has_active_penalty(conn: &Connection, tax_record_id: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM penalties WHERE tax_record_id = ?1 AND status = 'active'",
        params![tax_record_id],
        |row| row.get(0),
    )?;

    Ok(count > 0)
}

pub fn active_penalty_total_for_record(conn: &Connection, tax_record_id: &str) -> Result<f64> {
    let total: f64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM penalties
         WHERE tax_record_id = ?1 AND status = 'active'",
        params![tax_record_id],
        |row| row.get(0),
    )?;

    Ok(total)
}

/// Active penalty totals per tax record for one citizen.
pub fn active_penalty_totals_by_record(
    conn: &Connection,
    citizen_id: &str,
) -> Result<HashMap<String, f64>> {
    let mut stmt = conn.prepare(
        "SELECT tax_record_id, SUM(amount) FROM penalties
         WHERE citizen_id = ?1 AND status = 'active'
         GROUP BY tax_record_id",
    )?;

    let totals = stmt
        .query_map(params![citizen_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?
        .collect::<std::result::Result<HashMap<_, _>, _>>()?;

    Ok(totals)
}

pub fn citizens_with_active_penalties(conn: &Connection) -> Result<Vec<Citizen>> {
    let sql = format!(
        "SELECT DISTINCT c.id, c.customer_id, c.name, c.ward_no, c.district_id, c.city, c.state, c.contact_no, c.created_at
         FROM citizens c
         JOIN penalties p ON p.citizen_id = c.id
         WHERE p.status = 'active'
         ORDER BY c.created_at",
    );

    let mut stmt = conn.prepare(&sql)?;
    let citizens = stmt
        .query_map([], |row| map_citizen(row, 0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(citizens)
}

pub fn active_penalty_total_for_citizen(conn: &Connection, citizen_id: &str) -> Result<f64> {
    let total: f64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM penalties
         WHERE citizen_id = ?1 AND status = 'active'",
        params![citizen_id],
        |row| row.get(0),
    )?;

    Ok(total)
}

// ============================================================================
// REMINDERS
// ============================================================================

pub fn insert_reminder(conn: &Connection, reminder: &Reminder) -> Result<()> {
    conn.execute(
        "INSERT INTO reminders (id, citizen_id, message, kind, status, message_id, sent_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            reminder.id,
            reminder.citizen_id,
            reminder.message,
            reminder.kind.as_str(),
            reminder.status.as_str(),
            reminder.message_id,
            reminder.sent_at.to_rfc3339(),
        ],
    )?;

    Ok(())
}

pub fn reminders_for_citizen(conn: &Connection, citizen_id: &str) -> Result<Vec<Reminder>> {
    let sql = format!(
        "SELECT {} FROM reminders WHERE citizen_id = ?1 ORDER BY sent_at DESC",
        REMINDER_COLS
    );

    let mut stmt = conn.prepare(&sql)?;
    let reminders = stmt
        .query_map(params![citizen_id], map_reminder)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(reminders)
}

// ============================================================================
// PENALTY RULES
// ============================================================================

pub fn insert_penalty_rule(conn: &Connection, rule: &PenaltyRule) -> Result<()> {
    conn.execute(
        "INSERT INTO penalty_rules (id, name, kind, value, grace_period_days, max_penalty, description, priority)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            rule.id,
            rule.name,
            rule.kind.as_str(),
            rule.value,
            rule.grace_period_days,
            rule.max_penalty,
            rule.description,
            rule.priority,
        ],
    )?;

    Ok(())
}

/// Rules in evaluation order (highest priority first).
pub fn load_penalty_rules(conn: &Connection) -> Result<Vec<PenaltyRule>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, kind, value, grace_period_days, max_penalty, description, priority
         FROM penalty_rules
         ORDER BY priority DESC",
    )?;

    let rules = stmt
        .query_map([], map_rule)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rules)
}

/// Swap the whole rule set atomically.
pub fn replace_penalty_rules(conn: &mut Connection, rules: &[PenaltyRule]) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM penalty_rules", [])?;
    for rule in rules {
        tx.execute(
            "INSERT INTO penalty_rules (id, name, kind, value, grace_period_days, max_penalty, description, priority)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                rule.id,
                rule.name,
                rule.kind.as_str(),
                rule.value,
                rule.grace_period_days,
                rule.max_penalty,
                rule.description,
                rule.priority,
            ],
        )?;
    }
    tx.commit()?;

    Ok(())
}

// ============================================================================
// JOINED VIEWS
// ============================================================================

#[derive(Debug, Clone)]
pub struct CitizenTaxRow {
    pub citizen: Citizen,
    pub record: TaxRecord,
}

fn citizen_tax_rows(conn: &Connection, where_sql: &str, bindings: &[String]) -> Result<Vec<CitizenTaxRow>> {
    let sql = format!(
        "SELECT c.id, c.customer_id, c.name, c.ward_no, c.district_id, c.city, c.state, c.contact_no, c.created_at,
                t.id, t.citizen_id, t.tax_year, t.amount, t.due_date, t.status, t.paid_date, t.created_at
         FROM citizens c
         JOIN tax_records t ON t.citizen_id = c.id
         WHERE {}
         ORDER BY c.created_at, t.due_date",
        where_sql
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(bindings.iter()), |row| {
            Ok(CitizenTaxRow {
                citizen: map_citizen(row, 0)?,
                record: map_tax_record(row, 9)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    // One row per citizen: keep the earliest-due record
    let mut seen = HashSet::new();
    Ok(rows
        .into_iter()
        .filter(|row| seen.insert(row.citizen.id.clone()))
        .collect())
}

/// Citizens with a pending record due within the next `within_days` days.
pub fn citizens_with_upcoming_tax(
    conn: &Connection,
    today: NaiveDate,
    within_days: i64,
) -> Result<Vec<CitizenTaxRow>> {
    let horizon = today + Duration::days(within_days);
    citizen_tax_rows(
        conn,
        "t.status = 'pending' AND t.due_date >= ? AND t.due_date <= ?",
        &[today.to_string(), horizon.to_string()],
    )
}

/// Citizens with an unpaid record already past due.
pub fn citizens_with_overdue_tax(conn: &Connection, today: NaiveDate) -> Result<Vec<CitizenTaxRow>> {
    citizen_tax_rows(
        conn,
        "t.status != 'paid' AND t.due_date < ?",
        &[today.to_string()],
    )
}

// ============================================================================
// COUNTS
// ============================================================================

#[derive(Debug, Clone)]
pub struct TableCounts {
    pub admins: i64,
    pub districts: i64,
    pub citizens: i64,
    pub tax_records: i64,
    pub payments: i64,
    pub penalties: i64,
    pub reminders: i64,
}

pub fn table_counts(conn: &Connection) -> Result<TableCounts> {
    let count = |table: &str| -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        Ok(conn.query_row(&sql, [], |row| row.get(0))?)
    };

    Ok(TableCounts {
        admins: count("admins")?,
        districts: count("districts")?,
        citizens: count("citizens")?,
        tax_records: count("tax_records")?,
        payments: count("payments")?,
        penalties: count("penalties")?,
        reminders: count("reminders")?,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ReminderKind;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        seed_defaults(&conn).unwrap();
        conn
    }

    fn test_citizen(conn: &Connection, customer_id: &str, name: &str) -> Citizen {
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

    fn test_tax_record(
        conn: &Connection,
        citizen: &Citizen,
        year: i32,
        amount: f64,
        due: &str,
    ) -> TaxRecord {
        let due = NaiveDate::parse_from_str(due, "%Y-%m-%d").unwrap();
        let record = TaxRecord::new(&citizen.id, year, amount, due);
        insert_tax_record(conn, &record).unwrap();
        record
    }

    #[test]
    fn test_setup_and_seed() {
        let conn = test_conn();

        let admin = find_admin_by_username(&conn, "admin").unwrap().unwrap();
        assert!(auth::verify_password("admin123", &admin.salt, &admin.password_hash));

        let districts = list_districts(&conn).unwrap();
        assert_eq!(districts.len(), 3);

        let rules = load_penalty_rules(&conn).unwrap();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0].id, "fixed_100");
    }

    #[test]
    fn test_seed_defaults_is_idempotent() {
        let conn = test_conn();
        seed_defaults(&conn).unwrap();

        assert_eq!(list_districts(&conn).unwrap().len(), 3);
        assert_eq!(load_penalty_rules(&conn).unwrap().len(), 3);
    }

    #[test]
    fn test_demo_seed() {
        let conn = test_conn();
        seed_demo_data(&conn).unwrap();

        let john = find_citizen_by_customer_id(&conn, "CID001001").unwrap().unwrap();
        assert_eq!(john.name, "John Doe");

        let jane = find_citizen_by_customer_id(&conn, "CID001002").unwrap().unwrap();
        let records = tax_records_for_citizen(&conn, &jane.id).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, TaxStatus::Paid);

        // Second run is a no-op
        seed_demo_data(&conn).unwrap();
        assert_eq!(table_counts(&conn).unwrap().citizens, 2);
    }

    #[test]
    fn test_duplicate_district_is_conflict() {
        let conn = test_conn();

        let result = insert_district(&conn, &District::new("Central District"));
        assert!(matches!(result, Err(TaxError::Conflict(_))));
    }

    #[test]
    fn test_duplicate_customer_id_is_conflict() {
        let conn = test_conn();
        test_citizen(&conn, "CID000000001", "First");

        let district = &list_districts(&conn).unwrap()[0].district;
        let dup = Citizen::new(
            "CID000000001".to_string(),
            "Second".to_string(),
            "Ward-2".to_string(),
            district.id.clone(),
            "Mumbai".to_string(),
            "Maharashtra".to_string(),
            "9000000000".to_string(),
        );

        let result = insert_citizen(&conn, &dup);
        assert!(matches!(result, Err(TaxError::Conflict(_))));
    }

    #[test]
    fn test_duplicate_tax_year_is_conflict() {
        let conn = test_conn();
        let citizen = test_citizen(&conn, "CID000000002", "Payer");
        test_tax_record(&conn, &citizen, 2024, 5000.0, "2024-12-31");

        let dup = TaxRecord::new(
            &citizen.id,
            2024,
            6000.0,
            NaiveDate::parse_from_str("2024-12-31", "%Y-%m-%d").unwrap(),
        );
        let result = insert_tax_record(&conn, &dup);
        assert!(matches!(result, Err(TaxError::Conflict(_))));
    }

    #[test]
    fn test_citizen_list_filters() {
        let conn = test_conn();
        let districts = list_districts(&conn).unwrap();

        let mut john = Citizen::new(
            "CID000000010".to_string(),
            "John Doe".to_string(),
            "Ward-1".to_string(),
            districts[0].district.id.clone(),
            "Mumbai".to_string(),
            "Maharashtra".to_string(),
            "9876543210".to_string(),
        );
        john.created_at = Utc::now();
        insert_citizen(&conn, &john).unwrap();

        let jane = Citizen::new(
            "CID000000011".to_string(),
            "Jane Smith".to_string(),
            "Ward-2".to_string(),
            districts[1].district.id.clone(),
            "Pune".to_string(),
            "Maharashtra".to_string(),
            "9123456789".to_string(),
        );
        insert_citizen(&conn, &jane).unwrap();

        let all = list_citizens(&conn, &CitizenFilter::default()).unwrap();
        assert_eq!(all.len(), 2);

        let by_district = list_citizens(
            &conn,
            &CitizenFilter {
                district_id: Some(districts[1].district.id.clone()),
                search: None,
            },
        )
        .unwrap();
        assert_eq!(by_district.len(), 1);
        assert_eq!(by_district[0].citizen.name, "Jane Smith");

        let by_name = list_citizens(
            &conn,
            &CitizenFilter {
                district_id: None,
                search: Some("john".to_string()),
            },
        )
        .unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].citizen.customer_id, "CID000000010");

        let by_contact = list_citizens(
            &conn,
            &CitizenFilter {
                district_id: None,
                search: Some("912345".to_string()),
            },
        )
        .unwrap();
        assert_eq!(by_contact.len(), 1);
        assert_eq!(by_contact[0].citizen.name, "Jane Smith");
    }

    #[test]
    fn test_direct_payment_settles_everything() {
        let mut conn = test_conn();
        let citizen = test_citizen(&conn, "CID000000020", "Payer");
        let record = test_tax_record(&conn, &citizen, 2024, 5000.0, "2024-01-01");

        let penalty = Penalty::new(
            &citizen.id,
            &record.id,
            100.0,
            "Auto-applied: Fixed Penalty".to_string(),
            19,
            "Fixed penalty: ₹100".to_string(),
        );
        insert_penalty(&conn, &penalty).unwrap();

        let payment =
            record_direct_payment(&mut conn, &record, PaymentMethod::Offline, 5100.0).unwrap();

        assert_eq!(payment.status, PaymentStatus::Completed);
        assert!(payment.receipt_no.starts_with("RCP"));

        let record = find_tax_record(&conn, &record.id).unwrap().unwrap();
        assert_eq!(record.status, TaxStatus::Paid);
        assert!(record.paid_date.is_some());

        let penalties = penalties_for_citizen(&conn, &citizen.id).unwrap();
        assert_eq!(penalties[0].status, PenaltyStatus::Paid);
        assert!(penalties[0].paid_date.is_some());

        assert_eq!(active_penalty_total_for_record(&conn, &record.id).unwrap(), 0.0);
    }

    #[test]
    fn test_complete_pending_payment() {
        let mut conn = test_conn();
        let citizen = test_citizen(&conn, "CID000000021", "Online Payer");
        let record = test_tax_record(&conn, &citizen, 2024, 5000.0, "2024-06-30");

        let pending = Payment::pending_online(
            &record.id,
            &citizen.id,
            5000.0,
            unique_receipt_no(&conn).unwrap(),
            "sess_test_1".to_string(),
        );
        insert_payment(&conn, &pending).unwrap();

        let settled =
            complete_pending_payment(&mut conn, &pending.id, "pay_1", "txn_1").unwrap();

        assert_eq!(settled.status, PaymentStatus::Completed);
        assert_eq!(settled.gateway_payment_id.as_deref(), Some("pay_1"));

        let record = find_tax_record(&conn, &record.id).unwrap().unwrap();
        assert_eq!(record.status, TaxStatus::Paid);

        // A second completion attempt is rejected
        let again = complete_pending_payment(&mut conn, &pending.id, "pay_2", "txn_2");
        assert!(matches!(again, Err(TaxError::Conflict(_))));
    }

    #[test]
    fn test_mark_pending_payment_skips_settled() {
        let mut conn = test_conn();
        let citizen = test_citizen(&conn, "CID000000022", "Late Payer");
        let record = test_tax_record(&conn, &citizen, 2024, 5000.0, "2024-06-30");

        let pending = Payment::pending_online(
            &record.id,
            &citizen.id,
            5000.0,
            unique_receipt_no(&conn).unwrap(),
            "sess_test_2".to_string(),
        );
        insert_payment(&conn, &pending).unwrap();

        assert!(mark_pending_payment(&conn, &pending.id, PaymentStatus::Expired).unwrap());
        let payment = find_payment(&conn, &pending.id).unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Expired);

        // No longer pending, so nothing changes
        assert!(!mark_pending_payment(&conn, &pending.id, PaymentStatus::Failed).unwrap());

        complete_pending_payment(&mut conn, &pending.id, "pay", "txn").unwrap_err();
    }

    #[test]
    fn test_overdue_and_upcoming_queries() {
        let conn = test_conn();
        let citizen = test_citizen(&conn, "CID000000023", "Mixed");
        test_tax_record(&conn, &citizen, 2023, 4000.0, "2023-12-31");
        test_tax_record(&conn, &citizen, 2024, 5000.0, "2024-06-05");

        let today = NaiveDate::parse_from_str("2024-06-01", "%Y-%m-%d").unwrap();

        let overdue = unpaid_overdue_records(&conn, today, None).unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].tax_year, 2023);

        // Records a sweep already flipped stay in scope
        set_tax_status(&conn, &overdue[0].id, TaxStatus::Overdue, None).unwrap();
        let still_overdue = unpaid_overdue_records(&conn, today, None).unwrap();
        assert_eq!(still_overdue.len(), 1);

        let upcoming = upcoming_pending_records(&conn, today, 7).unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].tax_year, 2024);

        // Citizen filter that excludes everything
        let none =
            unpaid_overdue_records(&conn, today, Some(&["other-citizen".to_string()])).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_rules_replace_round_trip() {
        let mut conn = test_conn();

        let mut rules = default_rules();
        rules.truncate(1);
        rules[0].value = 250.0;
        replace_penalty_rules(&mut conn, &rules).unwrap();

        let loaded = load_penalty_rules(&conn).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].value, 250.0);
        assert_eq!(loaded[0].kind, RuleKind::Fixed);
    }

    #[test]
    fn test_reminder_round_trip() {
        let conn = test_conn();
        let citizen = test_citizen(&conn, "CID000000024", "Reminded");

        let reminder = Reminder::sent(
            &citizen.id,
            "pay your taxes".to_string(),
            ReminderKind::General,
            Some("sms_1".to_string()),
        );
        insert_reminder(&conn, &reminder).unwrap();

        let reminders = reminders_for_citizen(&conn, &citizen.id).unwrap();
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].kind, ReminderKind::General);
        assert_eq!(reminders[0].message_id.as_deref(), Some("sms_1"));
    }

    #[test]
    fn test_citizens_with_overdue_tax_dedupes() {
        let conn = test_conn();
        let citizen = test_citizen(&conn, "CID000000025", "Repeat Offender");
        test_tax_record(&conn, &citizen, 2022, 3000.0, "2022-12-31");
        test_tax_record(&conn, &citizen, 2023, 4000.0, "2023-12-31");

        let today = NaiveDate::parse_from_str("2024-06-01", "%Y-%m-%d").unwrap();
        let rows = citizens_with_overdue_tax(&conn, today).unwrap();

        assert_eq!(rows.len(), 1);
        // Earliest due date wins
        assert_eq!(rows[0].record.tax_year, 2022);
    }

    #[test]
    fn test_unique_receipt_no() {
        let conn = test_conn();

        let first = unique_receipt_no(&conn).unwrap();
        assert!(first.starts_with("RCP"));
    }
}
