// Login, logout, and token verification handlers.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::citizens::CitizenProfile;
use crate::api::{bearer_token, required, ApiError, ApiResponse, ApiResult, AppState};
use crate::auth::{self, Role};
use crate::store;

// ============================================================================
// ADMIN LOGIN
// ============================================================================

#[derive(Deserialize)]
pub struct AdminLoginRequest {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
pub struct AdminInfo {
    admin_id: String,
    username: String,
}

#[derive(Serialize)]
pub struct AdminLoginData {
    token: String,
    admin: AdminInfo,
}

/// POST /api/admin/login
pub async fn admin_login(
    State(state): State<AppState>,
    Json(body): Json<AdminLoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let username = required(body.username, "Username and password are required")?;
    let password = required(body.password, "Username and password are required")?;

    let admin = {
        let conn = state.db.lock().unwrap();
        store::find_admin_by_username(&conn, &username)?
    };

    let admin = admin.ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;
    if !auth::verify_password(&password, &admin.salt, &admin.password_hash) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let session = state.sessions.issue(Role::Admin, &admin.id, &admin.username);
    info!(username = %admin.username, "admin logged in");

    Ok(Json(ApiResponse::with_message(
        "Admin login successful",
        AdminLoginData {
            token: session.token,
            admin: AdminInfo {
                admin_id: admin.id,
                username: admin.username,
            },
        },
    )))
}

// ============================================================================
// CITIZEN LOGIN
// ============================================================================

#[derive(Deserialize)]
pub struct CitizenLoginRequest {
    customer_id: Option<String>,
}

#[derive(Serialize)]
pub struct CitizenLoginData {
    token: String,
    citizen: CitizenProfile,
}

/// POST /api/citizen/login
pub async fn citizen_login(
    State(state): State<AppState>,
    Json(body): Json<CitizenLoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let customer_id = required(body.customer_id, "Customer ID is required")?;

    let conn = state.db.lock().unwrap();
    let citizen = store::find_citizen_by_customer_id(&conn, &customer_id)?
        .ok_or_else(|| ApiError::unauthorized("Invalid Customer ID"))?;

    let session = state.sessions.issue(Role::Citizen, &citizen.id, &citizen.name);
    info!(customer_id = %citizen.customer_id, "citizen logged in");

    let profile = CitizenProfile::build(&conn, &citizen)?;

    Ok(Json(ApiResponse::with_message(
        "Citizen login successful",
        CitizenLoginData {
            token: session.token,
            citizen: profile,
        },
    )))
}

// ============================================================================
// TOKEN VERIFICATION
// ============================================================================

#[derive(Deserialize)]
pub struct VerifyRequest {
    token: Option<String>,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum VerifiedUser {
    Admin(AdminInfo),
    Citizen(CitizenProfile),
}

#[derive(Serialize)]
pub struct VerifyData {
    #[serde(rename = "type")]
    role: &'static str,
    user: VerifiedUser,
}

/// POST /api/auth/verify
pub async fn verify(
    State(state): State<AppState>,
    Json(body): Json<VerifyRequest>,
) -> ApiResult<impl IntoResponse> {
    let token = required(body.token, "Token is required")?;

    let session = state
        .sessions
        .get(&token)
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

    let conn = state.db.lock().unwrap();
    let data = match session.role {
        Role::Admin => {
            let admin = store::find_admin(&conn, &session.subject_id)?
                .ok_or_else(|| ApiError::not_found("User not found"))?;
            VerifyData {
                role: Role::Admin.as_str(),
                user: VerifiedUser::Admin(AdminInfo {
                    admin_id: admin.id,
                    username: admin.username,
                }),
            }
        }
        Role::Citizen => {
            let citizen = store::find_citizen(&conn, &session.subject_id)?
                .ok_or_else(|| ApiError::not_found("User not found"))?;
            VerifyData {
                role: Role::Citizen.as_str(),
                user: VerifiedUser::Citizen(CitizenProfile::build(&conn, &citizen)?),
            }
        }
    };

    Ok(Json(ApiResponse::ok(data)))
}

// ============================================================================
// LOGOUT
// ============================================================================

#[derive(Serialize)]
pub struct LogoutData {
    revoked: bool,
}

/// POST /api/auth/logout
///
/// Revokes the presented bearer token. Safe to call twice; the second call
/// reports `revoked: false`.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<impl IntoResponse> {
    let token =
        bearer_token(&headers).ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    let revoked = state.sessions.revoke(&token);

    Ok(Json(ApiResponse::with_message(
        "Logged out successfully",
        LogoutData { revoked },
    )))
}
