// Payment Entity
//
// Direct (offline/counter) payments are created already completed. Online
// payments start pending with a gateway session attached and are settled by
// verification or a webhook event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// PAYMENT METHOD
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Online,
    Offline,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Online => "online",
            PaymentMethod::Offline => "offline",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "online" => Some(PaymentMethod::Online),
            "offline" => Some(PaymentMethod::Offline),
            _ => None,
        }
    }
}

// ============================================================================
// PAYMENT STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Awaiting gateway settlement
    Pending,

    Completed,
    Failed,

    /// Gateway session lapsed before settlement
    Expired,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            "expired" => Some(PaymentStatus::Expired),
            _ => None,
        }
    }
}

// ============================================================================
// PAYMENT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// Stable identity (UUID)
    pub id: String,

    pub tax_record_id: String,
    pub citizen_id: String,

    /// Tax amount plus active penalties at payment time
    pub amount: f64,

    pub method: PaymentMethod,
    pub status: PaymentStatus,

    /// Unique receipt number, format "RCP" + digits
    pub receipt_no: String,

    /// Gateway session reference for online payments
    pub gateway_session_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub gateway_transaction_id: Option<String>,

    pub payment_date: DateTime<Utc>,
}

impl Payment {
    /// A completed payment, as recorded for counter/offline collection.
    pub fn completed(
        tax_record_id: &str,
        citizen_id: &str,
        amount: f64,
        method: PaymentMethod,
        receipt_no: String,
    ) -> Self {
        Payment {
            id: uuid::Uuid::new_v4().to_string(),
            tax_record_id: tax_record_id.to_string(),
            citizen_id: citizen_id.to_string(),
            amount,
            method,
            status: PaymentStatus::Completed,
            receipt_no,
            gateway_session_id: None,
            gateway_payment_id: None,
            gateway_transaction_id: None,
            payment_date: Utc::now(),
        }
    }

    /// A pending online payment tied to a gateway session.
    pub fn pending_online(
        tax_record_id: &str,
        citizen_id: &str,
        amount: f64,
        receipt_no: String,
        gateway_session_id: String,
    ) -> Self {
        Payment {
            id: uuid::Uuid::new_v4().to_string(),
            tax_record_id: tax_record_id.to_string(),
            citizen_id: citizen_id.to_string(),
            amount,
            method: PaymentMethod::Online,
            status: PaymentStatus::Pending,
            receipt_no,
            gateway_session_id: Some(gateway_session_id),
            gateway_payment_id: None,
            gateway_transaction_id: None,
            payment_date: Utc::now(),
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
    fn test_method_and_status_round_trip() {
        assert_eq!(PaymentMethod::parse("online"), Some(PaymentMethod::Online));
        assert_eq!(PaymentMethod::parse("card"), None);

        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Completed,
            PaymentStatus::Failed,
            PaymentStatus::Expired,
        ] {
            assert_eq!(PaymentStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_completed_payment() {
        let payment = Payment::completed("tax-1", "citizen-1", 5100.0, PaymentMethod::Offline, "RCP0000000001".to_string());

        assert_eq!(payment.status, PaymentStatus::Completed);
        assert!(payment.gateway_session_id.is_none());
    }

    #[test]
    fn test_pending_online_payment() {
        let payment = Payment::pending_online(
            "tax-1",
            "citizen-1",
            5100.0,
            "RCP0000000002".to_string(),
            "sess_123".to_string(),
        );

        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.method, PaymentMethod::Online);
        assert_eq!(payment.gateway_session_id.as_deref(), Some("sess_123"));
    }
}
