// Tax Record Entity
//
// One annual tax obligation per citizen and year. A completed payment flips
// the record to Paid; the overdue sweep flips past-due pending records to
// Overdue when it applies a penalty.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// TAX STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxStatus {
    /// Levied, not yet paid
    Pending,

    /// Settled by a completed payment
    Paid,

    /// Past due with a penalty applied
    Overdue,
}

impl TaxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxStatus::Pending => "pending",
            TaxStatus::Paid => "paid",
            TaxStatus::Overdue => "overdue",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaxStatus::Pending),
            "paid" => Some(TaxStatus::Paid),
            "overdue" => Some(TaxStatus::Overdue),
            _ => None,
        }
    }
}

// ============================================================================
// TAX RECORD
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxRecord {
    /// Stable identity (UUID)
    pub id: String,

    pub citizen_id: String,
    pub tax_year: i32,
    pub amount: f64,

    /// Date the payment falls due (date only, no time component)
    pub due_date: NaiveDate,

    pub status: TaxStatus,

    /// Set when a completed payment settles the record
    pub paid_date: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl TaxRecord {
    pub fn new(citizen_id: &str, tax_year: i32, amount: f64, due_date: NaiveDate) -> Self {
        TaxRecord {
            id: uuid::Uuid::new_v4().to_string(),
            citizen_id: citizen_id.to_string(),
            tax_year,
            amount,
            due_date,
            status: TaxStatus::Pending,
            paid_date: None,
            created_at: Utc::now(),
        }
    }

    /// An unpaid record past its due date counts as overdue even before the
    /// sweep has flipped its status.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        match self.status {
            TaxStatus::Overdue => true,
            TaxStatus::Pending => today > self.due_date,
            TaxStatus::Paid => false,
        }
    }

    pub fn days_overdue(&self, today: NaiveDate) -> i64 {
        if self.is_overdue(today) {
            (today - self.due_date).num_days()
        } else {
            0
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_status_round_trip() {
        for status in [TaxStatus::Pending, TaxStatus::Paid, TaxStatus::Overdue] {
            assert_eq!(TaxStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaxStatus::parse("unknown"), None);
    }

    #[test]
    fn test_new_record_is_pending() {
        let record = TaxRecord::new("citizen-1", 2024, 5000.0, date("2024-12-31"));

        assert_eq!(record.status, TaxStatus::Pending);
        assert!(record.paid_date.is_none());
    }

    #[test]
    fn test_pending_past_due_is_overdue() {
        let record = TaxRecord::new("citizen-1", 2024, 5000.0, date("2024-01-01"));

        assert!(!record.is_overdue(date("2024-01-01")));
        assert!(record.is_overdue(date("2024-01-20")));
        assert_eq!(record.days_overdue(date("2024-01-20")), 19);
    }

    #[test]
    fn test_paid_record_never_overdue() {
        let mut record = TaxRecord::new("citizen-1", 2024, 5000.0, date("2024-01-01"));
        record.status = TaxStatus::Paid;

        assert!(!record.is_overdue(date("2025-01-01")));
        assert_eq!(record.days_overdue(date("2025-01-01")), 0);
    }
}
