// Penalty Entity
//
// Surcharge for late payment. At most one active penalty per tax record;
// settlement flips active penalties to paid together with the record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// PENALTY STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PenaltyStatus {
    /// Outstanding, added to the amount due
    Active,

    /// Settled together with its tax record
    Paid,

    /// Cancelled by an admin, no longer owed
    Waived,
}

impl PenaltyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PenaltyStatus::Active => "active",
            PenaltyStatus::Paid => "paid",
            PenaltyStatus::Waived => "waived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(PenaltyStatus::Active),
            "paid" => Some(PenaltyStatus::Paid),
            "waived" => Some(PenaltyStatus::Waived),
            _ => None,
        }
    }
}

// ============================================================================
// PENALTY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Penalty {
    /// Stable identity (UUID)
    pub id: String,

    pub citizen_id: String,
    pub tax_record_id: String,

    pub amount: f64,

    /// Why the penalty was applied, e.g. "Auto-applied: Fixed Penalty"
    pub reason: String,

    pub status: PenaltyStatus,

    /// Days past due when the penalty was assessed
    pub days_overdue: i64,

    /// Human-readable arithmetic, e.g. "2% of ₹5000 = ₹100"
    pub calculation: String,

    pub applied_date: DateTime<Utc>,
    pub paid_date: Option<DateTime<Utc>>,
}

impl Penalty {
    pub fn new(
        citizen_id: &str,
        tax_record_id: &str,
        amount: f64,
        reason: String,
        days_overdue: i64,
        calculation: String,
    ) -> Self {
        Penalty {
            id: uuid::Uuid::new_v4().to_string(),
            citizen_id: citizen_id.to_string(),
            tax_record_id: tax_record_id.to_string(),
            amount,
            reason,
            status: PenaltyStatus::Active,
            days_overdue,
            calculation,
            applied_date: Utc::now(),
            paid_date: None,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_penalty_is_active() {
        let penalty = Penalty::new(
            "citizen-1",
            "tax-1",
            100.0,
            "Auto-applied: Fixed Penalty".to_string(),
            19,
            "Fixed penalty: ₹100".to_string(),
        );

        assert_eq!(penalty.status, PenaltyStatus::Active);
        assert_eq!(penalty.days_overdue, 19);
        assert!(penalty.paid_date.is_none());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [PenaltyStatus::Active, PenaltyStatus::Paid, PenaltyStatus::Waived] {
            assert_eq!(PenaltyStatus::parse(status.as_str()), Some(status));
        }
    }
}
