// Municipal Tax Service - API Server
//
// Serves the REST API and runs the scheduled sweeps on fixed intervals. The
// overdue sweep also fires once at startup to catch up after downtime.

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

use municipal_tax::api::{self, AppState};
use municipal_tax::rules::PenaltyEngine;
use municipal_tax::{jobs, store};

#[derive(Parser)]
#[command(name = "tax-server", version, about = "Municipal tax REST API server")]
struct Args {
    /// SQLite database path
    #[arg(long, env = "MUNITAX_DB", default_value = "municipal_tax.db")]
    db: PathBuf,

    /// Bind address
    #[arg(long, env = "MUNITAX_BIND", default_value = "0.0.0.0:3000")]
    bind: String,

    /// Seconds between overdue sweeps, 0 disables
    #[arg(long, env = "MUNITAX_SWEEP_INTERVAL", default_value_t = 86_400)]
    sweep_interval: u64,

    /// Seconds between weekly reminder passes, 0 disables
    #[arg(long, env = "MUNITAX_REMINDER_INTERVAL", default_value_t = 604_800)]
    reminder_interval: u64,

    /// Load a small demo data set on startup
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let conn = store::open_database(&args.db)?;
    store::setup_database(&conn)?;
    store::seed_defaults(&conn)?;
    if args.demo {
        store::seed_demo_data(&conn)?;
    }
    info!(db = %args.db.display(), "database ready");

    let state = AppState::new(conn);

    if args.sweep_interval > 0 {
        spawn_overdue_sweeps(state.clone(), Duration::from_secs(args.sweep_interval));
    }
    if args.reminder_interval > 0 {
        spawn_weekly_reminders(state.clone(), Duration::from_secs(args.reminder_interval));
    }

    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    info!(addr = %args.bind, "server listening");

    println!("\n🚀 Server running on http://{}", args.bind);
    println!("   API: http://{}/api/health", args.bind);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await?;
    Ok(())
}

// ============================================================================
// SCHEDULED SWEEPS
// ============================================================================

/// The first interval tick fires immediately, so the sweep runs once at
/// startup and then on the configured cadence.
fn spawn_overdue_sweeps(state: AppState, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            if let Err(err) = run_overdue_sweep(&state) {
                error!("overdue sweep failed: {}", err);
            }
        }
    });
}

fn spawn_weekly_reminders(state: AppState, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // Skip the immediate tick; sending reminders on every restart
        // would spam citizens.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(err) = run_weekly_reminders(&state) {
                error!("weekly reminder pass failed: {}", err);
            }
        }
    });
}

fn run_overdue_sweep(state: &AppState) -> municipal_tax::Result<()> {
    let conn = state.db.lock().unwrap();
    let engine = PenaltyEngine::from_rules(store::load_penalty_rules(&conn)?);
    let sweep = jobs::check_overdue_taxes(&conn, &engine, Utc::now().date_naive())?;

    info!(
        processed = sweep.records_processed,
        penalties = sweep.penalties_applied,
        reminders = sweep.reminders_sent,
        "scheduled overdue sweep finished"
    );
    Ok(())
}

fn run_weekly_reminders(state: &AppState) -> municipal_tax::Result<()> {
    let conn = state.db.lock().unwrap();
    let sweep = jobs::send_weekly_reminders(&conn, Utc::now().date_naive())?;

    info!(reminders = sweep.reminders_sent, "scheduled weekly reminders finished");
    Ok(())
}
