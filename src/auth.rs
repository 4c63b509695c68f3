// Identity & Sessions
//
// Logins hand out opaque UUID bearer tokens held in an in-memory store with a
// 24 hour expiry. Admin passwords are salted SHA-256 hashes; citizens log in
// with their customer id alone.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;

/// Session lifetime in hours
pub const SESSION_TTL_HOURS: i64 = 24;

// ============================================================================
// ROLES & SESSIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Citizen,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Citizen => "citizen",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub role: Role,

    /// Admin id or citizen id the token acts as
    pub subject_id: String,

    /// Display name (admin username, citizen name)
    pub name: String,

    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// In-memory session registry. Expired entries are dropped on lookup.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        SessionStore {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Issue a fresh token for a subject.
    pub fn issue(&self, role: Role, subject_id: &str, name: &str) -> Session {
        self.issue_with_ttl(role, subject_id, name, Duration::hours(SESSION_TTL_HOURS))
    }

    pub fn issue_with_ttl(&self, role: Role, subject_id: &str, name: &str, ttl: Duration) -> Session {
        let session = Session {
            token: uuid::Uuid::new_v4().to_string(),
            role,
            subject_id: subject_id.to_string(),
            name: name.to_string(),
            expires_at: Utc::now() + ttl,
        };

        let mut sessions = self.sessions.write().unwrap();
        sessions.insert(session.token.clone(), session.clone());
        session
    }

    /// Look up a live session by token.
    pub fn get(&self, token: &str) -> Option<Session> {
        let now = Utc::now();

        {
            let sessions = self.sessions.read().unwrap();
            match sessions.get(token) {
                Some(session) if !session.is_expired(now) => return Some(session.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Found but expired: evict
        let mut sessions = self.sessions.write().unwrap();
        sessions.remove(token);
        None
    }

    pub fn revoke(&self, token: &str) -> bool {
        let mut sessions = self.sessions.write().unwrap();
        sessions.remove(token).is_some()
    }

    pub fn active_count(&self) -> usize {
        let now = Utc::now();
        let sessions = self.sessions.read().unwrap();
        sessions.values().filter(|s| !s.is_expired(now)).count()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// PASSWORD HASHING
// ============================================================================

pub fn new_salt() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}{}", salt, password));
    format!("{:x}", hasher.finalize())
}

pub fn verify_password(password: &str, salt: &str, expected_hash: &str) -> bool {
    hash_password(password, salt) == expected_hash
}

// ============================================================================
// PUBLIC IDENTIFIERS
// ============================================================================

/// New customer id: "CID" + 6 trailing digits of epoch millis + 3 more
/// digits. Callers re-check uniqueness against the store before accepting.
pub fn generate_customer_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix = (uuid::Uuid::new_v4().as_u128() % 1000) as u32;
    format!("CID{:06}{:03}", millis % 1_000_000, suffix)
}

/// New receipt number: "RCP" + 8 trailing digits of epoch millis + 2 more
/// digits. Same uniqueness caveat as customer ids.
pub fn generate_receipt_no() -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix = (uuid::Uuid::new_v4().as_u128() % 100) as u32;
    format!("RCP{:08}{:02}", millis % 100_000_000, suffix)
}

// ============================================================================
// TESTS
// ============================================================================
