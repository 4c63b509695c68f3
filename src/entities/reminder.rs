// Reminder Entity
//
// Log of every notification sent to a citizen, whether from the bulk SMS
// endpoints or the scheduled sweeps. The SMS client is a mock, so the row is
// the system of record for what went out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// REMINDER KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderKind {
    /// Due date inside the next seven days
    Upcoming,

    /// Past due
    Overdue,

    /// Carries an active penalty
    Penalty,

    /// Weekly sweep notification
    Weekly,

    /// Ad hoc admin message
    General,
}

impl ReminderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderKind::Upcoming => "upcoming",
            ReminderKind::Overdue => "overdue",
            ReminderKind::Penalty => "penalty",
            ReminderKind::Weekly => "weekly",
            ReminderKind::General => "general",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "upcoming" => Some(ReminderKind::Upcoming),
            "overdue" => Some(ReminderKind::Overdue),
            "penalty" => Some(ReminderKind::Penalty),
            "weekly" => Some(ReminderKind::Weekly),
            "general" => Some(ReminderKind::General),
            _ => None,
        }
    }
}

// ============================================================================
// REMINDER STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Sent,
    Failed,
}

impl ReminderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderStatus::Sent => "sent",
            ReminderStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(ReminderStatus::Sent),
            "failed" => Some(ReminderStatus::Failed),
            _ => None,
        }
    }
}

// ============================================================================
// REMINDER
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    /// Stable identity (UUID)
    pub id: String,

    pub citizen_id: String,
    pub message: String,
    pub kind: ReminderKind,
    pub status: ReminderStatus,

    /// Delivery reference from the SMS client, when one was issued
    pub message_id: Option<String>,

    pub sent_at: DateTime<Utc>,
}

impl Reminder {
    pub fn sent(citizen_id: &str, message: String, kind: ReminderKind, message_id: Option<String>) -> Self {
        Reminder {
            id: uuid::Uuid::new_v4().to_string(),
            citizen_id: citizen_id.to_string(),
            message,
            kind,
            status: ReminderStatus::Sent,
            message_id,
            sent_at: Utc::now(),
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
    fn test_kind_round_trip() {
        for kind in [
            ReminderKind::Upcoming,
            ReminderKind::Overdue,
            ReminderKind::Penalty,
            ReminderKind::Weekly,
            ReminderKind::General,
        ] {
            assert_eq!(ReminderKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ReminderKind::parse("monthly"), None);
    }

    #[test]
    fn test_sent_reminder() {
        let reminder = Reminder::sent("citizen-1", "pay up".to_string(), ReminderKind::Weekly, None);

        assert_eq!(reminder.status, ReminderStatus::Sent);
        assert_eq!(reminder.kind, ReminderKind::Weekly);
    }
}
