// Payment Gateway (mock)
//
// Stands in for a Stripe/Razorpay integration: sessions point at a fake
// payment URL, verification always settles. Webhook calls authenticate with a
// shared-secret signature header.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;

pub const DEFAULT_GATEWAY_URL: &str = "https://mock-gateway.com";
pub const DEFAULT_WEBHOOK_SECRET: &str = "mock_webhook_secret";

/// Gateway sessions lapse after 30 minutes
pub const SESSION_EXPIRY_MINUTES: i64 = 30;

// ============================================================================
// SESSION & VERIFICATION
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PaymentSession {
    pub session_id: String,
    pub payment_url: String,
    pub amount: f64,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GatewayVerification {
    pub verified: bool,
    pub payment_id: String,
    pub transaction_id: String,
    pub verified_at: DateTime<Utc>,
}

// ============================================================================
// GATEWAY CLIENT
// ============================================================================

#[derive(Debug, Clone)]
pub struct PaymentGateway {
    base_url: String,
    webhook_secret: String,
}

impl PaymentGateway {
    pub fn new(base_url: &str, webhook_secret: &str) -> Self {
        PaymentGateway {
            base_url: base_url.trim_end_matches('/').to_string(),
            webhook_secret: webhook_secret.to_string(),
        }
    }

    /// Configuration from `MUNITAX_GATEWAY_URL` / `MUNITAX_WEBHOOK_SECRET`,
    /// with mock defaults.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("MUNITAX_GATEWAY_URL").unwrap_or_else(|_| DEFAULT_GATEWAY_URL.to_string());
        let webhook_secret = std::env::var("MUNITAX_WEBHOOK_SECRET")
            .unwrap_or_else(|_| DEFAULT_WEBHOOK_SECRET.to_string());
        PaymentGateway::new(&base_url, &webhook_secret)
    }

    /// Open a checkout session for an amount.
    pub fn create_session(&self, amount: f64, description: &str) -> PaymentSession {
        info!(amount, description, "gateway: creating payment session");

        let millis = Utc::now().timestamp_millis();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let session_id = format!("sess_{}_{}", millis, &suffix[..9]);

        PaymentSession {
            payment_url: format!("{}/pay/{}", self.base_url, session_id),
            session_id,
            amount,
            expires_at: Utc::now() + Duration::minutes(SESSION_EXPIRY_MINUTES),
        }
    }

    /// Confirm a payment against the gateway by session or payment reference.
    /// The mock settles every reference it is asked about.
    pub fn verify(&self, reference: &str) -> GatewayVerification {
        info!(reference, "gateway: verifying payment");

        let millis = Utc::now().timestamp_millis();
        let suffix = uuid::Uuid::new_v4().simple().to_string();

        GatewayVerification {
            verified: true,
            payment_id: format!("pay_{}_{}", millis, &suffix[..9]),
            transaction_id: format!("txn_{}_{}", millis, &suffix[9..18]),
            verified_at: Utc::now(),
        }
    }

    /// Webhook requests must carry the shared secret in their signature
    /// header.
    pub fn verify_webhook_signature(&self, signature: &str) -> bool {
        signature == self.webhook_secret
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_points_at_gateway() {
        let gateway = PaymentGateway::new("https://mock-gateway.com", "secret");
        let session = gateway.create_session(5100.0, "Tax Payment - 2024");

        assert!(session.session_id.starts_with("sess_"));
        assert_eq!(
            session.payment_url,
            format!("https://mock-gateway.com/pay/{}", session.session_id)
        );
        assert_eq!(session.amount, 5100.0);
    }

    #[test]
    fn test_session_expires_in_thirty_minutes() {
        let gateway = PaymentGateway::new(DEFAULT_GATEWAY_URL, DEFAULT_WEBHOOK_SECRET);
        let session = gateway.create_session(100.0, "test");

        let minutes = (session.expires_at - Utc::now()).num_minutes();
        assert!((29..=30).contains(&minutes));
    }

    #[test]
    fn test_verification_settles() {
        let gateway = PaymentGateway::new(DEFAULT_GATEWAY_URL, DEFAULT_WEBHOOK_SECRET);
        let verification = gateway.verify("sess_123");

        assert!(verification.verified);
        assert!(verification.payment_id.starts_with("pay_"));
        assert!(verification.transaction_id.starts_with("txn_"));
    }

    #[test]
    fn test_webhook_signature_check() {
        let gateway = PaymentGateway::new(DEFAULT_GATEWAY_URL, "topsecret");

        assert!(gateway.verify_webhook_signature("topsecret"));
        assert!(!gateway.verify_webhook_signature("wrong"));
        assert!(!gateway.verify_webhook_signature(""));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let gateway = PaymentGateway::new("https://gateway.example/", "s");
        let session = gateway.create_session(1.0, "t");

        assert!(!session.payment_url.contains("//pay"));
    }
}
