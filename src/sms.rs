// SMS Client (mock)
//
// Stands in for a Twilio-style provider: sends are logged, never transmitted,
// and always succeed. Reminder rows persist what was "sent".

use tracing::info;

/// Message templates sent to citizens. Wording is fixed; the templates are
/// the contract the bulk-reminder endpoints rely on.
pub fn reminder_message(citizen_name: &str, tax_amount: f64, due_date: &str) -> String {
    format!(
        "Dear {}, your tax payment of ₹{} is due on {}. Please pay to avoid penalties. - Municipality",
        citizen_name, tax_amount, due_date
    )
}

pub fn overdue_message(citizen_name: &str, tax_amount: f64, penalty_amount: f64) -> String {
    format!(
        "Dear {}, your tax payment of ₹{} is overdue. Penalty of ₹{} has been added. Total: ₹{}. - Municipality",
        citizen_name,
        tax_amount,
        penalty_amount,
        tax_amount + penalty_amount
    )
}

pub fn penalty_message(citizen_name: &str, penalty_amount: f64) -> String {
    format!(
        "Dear {}, a penalty of ₹{} has been added to your account for late payment. Please clear your dues immediately. - Municipality",
        citizen_name, penalty_amount
    )
}

// ============================================================================
// CLIENT
// ============================================================================

#[derive(Debug, Clone)]
pub struct SmsOutcome {
    pub message_id: String,
}

#[derive(Debug, Clone)]
pub struct SmsClient {
    from_number: String,
}

impl SmsClient {
    pub fn new(from_number: &str) -> Self {
        SmsClient {
            from_number: from_number.to_string(),
        }
    }

    /// Sender number from `MUNITAX_SMS_FROM`, with a mock default.
    pub fn from_env() -> Self {
        let from_number =
            std::env::var("MUNITAX_SMS_FROM").unwrap_or_else(|_| "+1234567890".to_string());
        SmsClient::new(&from_number)
    }

    /// Send a message. The mock logs and returns a delivery reference.
    pub fn send(&self, to: &str, message: &str) -> SmsOutcome {
        info!(from = %self.from_number, to = %to, "sms: {}", message);

        let millis = chrono::Utc::now().timestamp_millis();
        let suffix = uuid::Uuid::new_v4().simple().to_string();

        SmsOutcome {
            message_id: format!("sms_{}_{}", millis, &suffix[..9]),
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
    fn test_reminder_message_wording() {
        let message = reminder_message("John Doe", 5000.0, "2024-12-31");

        assert_eq!(
            message,
            "Dear John Doe, your tax payment of ₹5000 is due on 2024-12-31. Please pay to avoid penalties. - Municipality"
        );
    }

    #[test]
    fn test_overdue_message_includes_total() {
        let message = overdue_message("John Doe", 5000.0, 100.0);

        assert!(message.contains("₹5000 is overdue"));
        assert!(message.contains("Penalty of ₹100"));
        assert!(message.contains("Total: ₹5100"));
    }

    #[test]
    fn test_penalty_message_wording() {
        let message = penalty_message("Jane Smith", 250.0);

        assert!(message.starts_with("Dear Jane Smith, a penalty of ₹250"));
        assert!(message.ends_with("- Municipality"));
    }

    #[test]
    fn test_send_returns_message_id() {
        let client = SmsClient::new("+1000000000");
        let outcome = client.send("9876543210", "hello");

        assert!(outcome.message_id.starts_with("sms_"));
    }
}
