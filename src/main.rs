// Municipal Tax Service - CLI
//
// Database setup and the batch side of the service: overdue sweeps, weekly
// reminders, penalty simulation, and CSV report export. The REST API lives
// in the tax-server binary.

use anyhow::{bail, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io;
use std::path::PathBuf;

use municipal_tax::entities::TaxStatus;
use municipal_tax::report::{self, ReportFilter};
use municipal_tax::rules::{default_rules, PenaltyEngine};
use municipal_tax::{jobs, store};

#[derive(Parser)]
#[command(name = "municipal-tax", version, about = "Municipal property tax management")]
struct Cli {
    /// SQLite database path
    #[arg(long, global = true, env = "MUNITAX_DB", default_value = "municipal_tax.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the schema and seed the default admin, districts, and rules
    Init {
        /// Also load a small demo data set
        #[arg(long)]
        demo: bool,
    },

    /// Flip past-due records to overdue, apply penalties, log reminders
    CheckOverdue {
        /// Evaluation date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        on: Option<NaiveDate>,
    },

    /// Send the weekly unpaid-balance reminders
    WeeklyReminders {
        /// Evaluation date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        on: Option<NaiveDate>,
    },

    /// Preview the penalty the rule engine would charge
    Simulate {
        /// Tax amount
        #[arg(long)]
        amount: f64,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due_date: NaiveDate,

        /// Evaluation date, defaults to today
        #[arg(long)]
        on: Option<NaiveDate>,
    },

    /// Export the tax report as CSV
    ExportReport {
        /// Output file, "-" for stdout
        #[arg(long, default_value = "tax_report.csv")]
        out: PathBuf,

        /// Filter by status (pending, paid, overdue)
        #[arg(long)]
        status: Option<String>,

        /// Filter by district id
        #[arg(long)]
        district_id: Option<String>,

        /// Filter by tax year
        #[arg(long)]
        tax_year: Option<i32>,
    },

    /// Show row counts per table
    Stats,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let conn = store::open_database(&cli.db)?;
    store::setup_database(&conn)?;

    match cli.command {
        Command::Init { demo } => run_init(&conn, &cli.db, demo),
        Command::CheckOverdue { on } => run_check_overdue(&conn, on),
        Command::WeeklyReminders { on } => run_weekly_reminders(&conn, on),
        Command::Simulate { amount, due_date, on } => run_simulate(&conn, amount, due_date, on),
        Command::ExportReport {
            out,
            status,
            district_id,
            tax_year,
        } => run_export_report(&conn, out, status, district_id, tax_year),
        Command::Stats => run_stats(&conn),
    }
}

fn run_init(conn: &rusqlite::Connection, db_path: &PathBuf, demo: bool) -> Result<()> {
    store::seed_defaults(conn)?;
    println!("✓ Database initialized: {}", db_path.display());
    println!("✓ Default admin: username 'admin', password 'admin123'");

    if demo {
        store::seed_demo_data(conn)?;
        println!("✓ Demo data loaded");
    }

    let counts = store::table_counts(conn)?;
    println!(
        "  {} districts, {} citizens, {} tax records",
        counts.districts, counts.citizens, counts.tax_records
    );
    Ok(())
}

fn run_check_overdue(conn: &rusqlite::Connection, on: Option<NaiveDate>) -> Result<()> {
    let today = on.unwrap_or_else(|| Utc::now().date_naive());
    let engine = PenaltyEngine::from_rules(store::load_penalty_rules(conn)?);

    let sweep = jobs::check_overdue_taxes(conn, &engine, today)?;

    println!("Overdue check for {}", today);
    println!("  records processed: {}", sweep.records_processed);
    println!("  marked overdue:    {}", sweep.records_marked_overdue);
    println!("  penalties applied: {}", sweep.penalties_applied);
    println!("  penalty amount:    ₹{}", sweep.total_penalty_amount);
    println!("  reminders sent:    {}", sweep.reminders_sent);
    Ok(())
}

fn run_weekly_reminders(conn: &rusqlite::Connection, on: Option<NaiveDate>) -> Result<()> {
    let today = on.unwrap_or_else(|| Utc::now().date_naive());
    let sweep = jobs::send_weekly_reminders(conn, today)?;

    println!("Weekly reminders for {}", today);
    println!("  reminders sent: {}", sweep.reminders_sent);
    Ok(())
}

fn run_simulate(
    conn: &rusqlite::Connection,
    amount: f64,
    due_date: NaiveDate,
    on: Option<NaiveDate>,
) -> Result<()> {
    let evaluated_on = on.unwrap_or_else(|| Utc::now().date_naive());

    let mut rules = store::load_penalty_rules(conn)?;
    if rules.is_empty() {
        println!("(no rules configured, using the default rule set)");
        rules = default_rules();
    }
    let engine = PenaltyEngine::from_rules(rules);

    println!("Simulating ₹{} due {} as of {}", amount, due_date, evaluated_on);
    match engine.evaluate(amount, due_date, evaluated_on) {
        Some(assessment) => {
            println!("  rule:         {} ({})", assessment.rule.name, assessment.rule.id);
            println!("  days overdue: {}", assessment.days_overdue);
            println!("  penalty:      ₹{}", assessment.amount);
            println!("  calculation:  {}", assessment.calculation);
        }
        None => println!("  no penalty applicable"),
    }
    Ok(())
}

fn run_export_report(
    conn: &rusqlite::Connection,
    out: PathBuf,
    status: Option<String>,
    district_id: Option<String>,
    tax_year: Option<i32>,
) -> Result<()> {
    let status = match status.as_deref() {
        Some(raw) => match TaxStatus::parse(raw) {
            Some(status) => Some(status),
            None => bail!("invalid status filter '{}', expected pending, paid, or overdue", raw),
        },
        None => None,
    };

    let filter = ReportFilter {
        status,
        district_id,
        tax_year,
        search: None,
    };
    let tax_report = report::tax_report(conn, &filter, Utc::now().date_naive())?;

    if out.as_os_str() == "-" {
        report::export_csv(&tax_report, io::stdout().lock())?;
    } else {
        report::export_csv(&tax_report, File::create(&out)?)?;
        println!(
            "✓ Exported {} records to {}",
            tax_report.summary.total_records,
            out.display()
        );
    }
    Ok(())
}

fn run_stats(conn: &rusqlite::Connection) -> Result<()> {
    let counts = store::table_counts(conn)?;

    println!("admins:      {}", counts.admins);
    println!("districts:   {}", counts.districts);
    println!("citizens:    {}", counts.citizens);
    println!("tax records: {}", counts.tax_records);
    println!("payments:    {}", counts.payments);
    println!("penalties:   {}", counts.penalties);
    println!("reminders:   {}", counts.reminders);
    Ok(())
}
