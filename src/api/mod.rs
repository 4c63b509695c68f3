// Municipal Tax Service - REST API
//
// Bearer-token JSON API over the tax store. Handlers lock the shared SQLite
// connection, work through the store module, and wrap results in the
// `{"success": ..., "data": ...}` envelope. Domain errors map onto HTTP
// statuses in one place (`ApiError`).

pub mod analytics;
pub mod auth;
pub mod citizens;
pub mod cron;
pub mod districts;
pub mod payments;
pub mod penalties;
pub mod reminders;
pub mod reports;
pub mod taxes;

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use rusqlite::Connection;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::auth::{Role, Session, SessionStore};
use crate::entities::Citizen;
use crate::error::TaxError;
use crate::gateway::PaymentGateway;
use crate::sms::SmsClient;
use crate::store;

// ============================================================================
// SHARED STATE
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub sessions: Arc<SessionStore>,
    pub gateway: Arc<PaymentGateway>,
    pub sms: Arc<SmsClient>,
}

impl AppState {
    pub fn new(conn: Connection) -> Self {
        AppState {
            db: Arc::new(Mutex::new(conn)),
            sessions: Arc::new(SessionStore::new()),
            gateway: Arc::new(PaymentGateway::from_env()),
            sms: Arc::new(SmsClient::from_env()),
        }
    }
}

// ============================================================================
// RESPONSE ENVELOPE
// ============================================================================

/// API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data,
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data,
        }
    }
}

/// Error carried back to the client as `{"success": false, "error": ...}`.
/// Payment mismatches attach their breakdown through `details`, flattened
/// into the body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(flatten)]
    details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::new(StatusCode::CONFLICT, message)
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.message,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<TaxError> for ApiError {
    fn from(err: TaxError) -> Self {
        match err {
            TaxError::Validation(msg) => ApiError::bad_request(msg),
            TaxError::Unauthorized(msg) => ApiError::unauthorized(msg),
            TaxError::Forbidden(msg) => ApiError::forbidden(msg),
            TaxError::NotFound(msg) => ApiError::not_found(msg),
            TaxError::Conflict(msg) => ApiError::conflict(msg),
            other => {
                error!("internal error: {}", other);
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

// ============================================================================
// AUTH GUARDS
// ============================================================================

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.to_string())
}

/// Any live session.
pub(crate) fn require_session(state: &AppState, headers: &HeaderMap) -> ApiResult<Session> {
    let token =
        bearer_token(headers).ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    state
        .sessions
        .get(&token)
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))
}

pub(crate) fn require_admin(state: &AppState, headers: &HeaderMap) -> ApiResult<Session> {
    let session = require_session(state, headers)?;
    if session.role != Role::Admin {
        return Err(ApiError::forbidden("Admin access required"));
    }
    Ok(session)
}

pub(crate) fn require_citizen(state: &AppState, headers: &HeaderMap) -> ApiResult<Session> {
    let session = require_session(state, headers)?;
    if session.role != Role::Citizen {
        return Err(ApiError::forbidden("Citizen access required"));
    }
    Ok(session)
}

/// Admins see every citizen; citizens only themselves.
pub(crate) fn require_admin_or_self(
    state: &AppState,
    headers: &HeaderMap,
    citizen_id: &str,
) -> ApiResult<Session> {
    let session = require_session(state, headers)?;
    if session.role == Role::Citizen && session.subject_id != citizen_id {
        return Err(ApiError::forbidden("Access denied"));
    }
    Ok(session)
}

// ============================================================================
// SHARED HELPERS
// ============================================================================

/// Reject missing or blank request fields with the given message.
pub(crate) fn required(value: Option<String>, message: &str) -> ApiResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ApiError::bad_request(message)),
    }
}

/// Citizen reference embedded in tax, payment, and penalty responses.
#[derive(Serialize)]
pub struct CitizenRef {
    pub customer_id: String,
    pub name: String,
    pub district: String,
}

impl CitizenRef {
    pub(crate) fn build(conn: &Connection, citizen: &Citizen) -> ApiResult<Self> {
        let district = store::find_district(conn, &citizen.district_id)?
            .map(|d| d.name)
            .unwrap_or_default();

        Ok(CitizenRef {
            customer_id: citizen.customer_id.clone(),
            name: citizen.name.clone(),
            district,
        })
    }
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/admin/login", post(auth::admin_login))
        .route("/citizen/login", post(auth::citizen_login))
        .route("/auth/verify", post(auth::verify))
        .route("/auth/logout", post(auth::logout))
        .route("/district", get(districts::list).post(districts::create))
        .route("/citizen", get(citizens::list).post(citizens::register))
        .route("/citizen/:citizen_id/tax", get(citizens::tax_details))
        .route("/tax", post(taxes::create))
        .route("/tax/:citizen_id", get(taxes::for_citizen))
        .route("/payment", post(payments::record_payment))
        .route("/payment/online", post(payments::start_online))
        .route("/payment/verify", post(payments::verify))
        .route("/payment/webhook", post(payments::webhook))
        .route("/payment/:citizen_id", get(payments::history))
        .route("/receipt/:payment_id", get(payments::receipt))
        .route("/penalty", post(penalties::apply_manual))
        .route("/penalty/auto-calculate", post(penalties::auto_calculate))
        .route("/penalty/simulate", post(penalties::simulate))
        .route(
            "/penalty/rules",
            get(penalties::get_rules).put(penalties::put_rules),
        )
        .route("/penalty/:citizen_id", get(penalties::for_citizen))
        .route("/reminder", post(reminders::create))
        .route("/reminder/:citizen_id", get(reminders::for_citizen))
        .route("/sms/send", post(reminders::send_sms))
        .route("/sms/bulk-reminder", post(reminders::bulk_reminder))
        .route("/analytics/admin", get(analytics::admin))
        .route("/analytics/citizen/:citizen_id", get(analytics::citizen))
        .route("/report", get(reports::tax_report))
        .route("/cron/check-overdue", post(cron::check_overdue))
        .route("/cron/weekly-reminders", post(cron::weekly_reminders))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> AppState {
        AppState::new(Connection::open_in_memory().unwrap())
    }

    fn auth_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            format!("Bearer {}", token).parse().unwrap(),
        );
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(
            bearer_token(&auth_headers("abc123")),
            Some("abc123".to_string())
        );
        assert_eq!(bearer_token(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Basic abc123".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_require_session_rejects_unknown_token() {
        let state = test_state();

        let missing = require_session(&state, &HeaderMap::new()).unwrap_err();
        assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
        assert_eq!(missing.message, "Authentication required");

        let bogus = require_session(&state, &auth_headers("nope")).unwrap_err();
        assert_eq!(bogus.status, StatusCode::UNAUTHORIZED);
        assert_eq!(bogus.message, "Invalid or expired token");
    }

    #[test]
    fn test_require_admin_rejects_citizen_token() {
        let state = test_state();
        let citizen = state.sessions.issue(Role::Citizen, "cit-1", "John Doe");
        let admin = state.sessions.issue(Role::Admin, "adm-1", "admin");

        let denied = require_admin(&state, &auth_headers(&citizen.token)).unwrap_err();
        assert_eq!(denied.status, StatusCode::FORBIDDEN);
        assert_eq!(denied.message, "Admin access required");

        let session = require_admin(&state, &auth_headers(&admin.token)).unwrap();
        assert_eq!(session.subject_id, "adm-1");
    }

    #[test]
    fn test_require_admin_or_self() {
        let state = test_state();
        let citizen = state.sessions.issue(Role::Citizen, "cit-1", "John Doe");
        let admin = state.sessions.issue(Role::Admin, "adm-1", "admin");

        let own = require_admin_or_self(&state, &auth_headers(&citizen.token), "cit-1");
        assert!(own.is_ok());

        let other = require_admin_or_self(&state, &auth_headers(&citizen.token), "cit-2");
        assert_eq!(other.unwrap_err().message, "Access denied");

        let as_admin = require_admin_or_self(&state, &auth_headers(&admin.token), "cit-2");
        assert!(as_admin.is_ok());
    }

    #[test]
    fn test_required_rejects_blank_fields() {
        assert_eq!(
            required(Some("value".to_string()), "msg").unwrap(),
            "value"
        );
        assert!(required(Some("   ".to_string()), "msg").is_err());
        assert!(required(None, "msg").is_err());
    }

    #[test]
    fn test_tax_error_status_mapping() {
        let cases = [
            (TaxError::validation("bad"), StatusCode::BAD_REQUEST),
            (TaxError::unauthorized("who"), StatusCode::UNAUTHORIZED),
            (TaxError::forbidden("no"), StatusCode::FORBIDDEN),
            (TaxError::not_found("gone"), StatusCode::NOT_FOUND),
            (TaxError::conflict("dup"), StatusCode::CONFLICT),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }

        let internal = ApiError::from(TaxError::Database(
            rusqlite::Error::InvalidQuery,
        ));
        assert_eq!(internal.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(internal.message, "Internal server error");
    }
}
