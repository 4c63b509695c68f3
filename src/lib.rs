// Municipal Tax Service - Core Library
// Exposes all modules for use in the CLI, API server, and tests

pub mod analytics;
pub mod auth;
pub mod entities;
pub mod error;
pub mod gateway;
pub mod jobs;
pub mod report;
pub mod rules;
pub mod sms;
pub mod store;

// REST API layer, only with the server feature
#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use entities::{
    Citizen, District, Payment, PaymentMethod, PaymentStatus, Penalty, PenaltyStatus, Reminder,
    ReminderKind, ReminderStatus, TaxRecord, TaxStatus,
};
pub use error::{Result, TaxError};
pub use rules::{default_rules, PenaltyAssessment, PenaltyEngine, PenaltyRule, RuleKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
