// Citizen Entity
//
// A registered taxpayer. The customer id ("CID" + 9 digits) is the public
// identifier citizens use to log in; the UUID is the foreign-key identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citizen {
    /// Stable identity (UUID)
    pub id: String,

    /// Public identifier, unique, format "CID" + 9 digits
    pub customer_id: String,

    pub name: String,
    pub ward_no: String,
    pub district_id: String,
    pub city: String,
    pub state: String,

    /// Contact number reminders and SMS go to
    pub contact_no: String,

    pub created_at: DateTime<Utc>,
}

impl Citizen {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        customer_id: String,
        name: String,
        ward_no: String,
        district_id: String,
        city: String,
        state: String,
        contact_no: String,
    ) -> Self {
        Citizen {
            id: uuid::Uuid::new_v4().to_string(),
            customer_id,
            name,
            ward_no,
            district_id,
            city,
            state,
            contact_no,
            created_at: Utc::now(),
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
    fn test_citizen_creation() {
        let citizen = Citizen::new(
            "CID123456789".to_string(),
            "John Doe".to_string(),
            "Ward-1".to_string(),
            "district-uuid".to_string(),
            "Mumbai".to_string(),
            "Maharashtra".to_string(),
            "9876543210".to_string(),
        );

        assert!(!citizen.id.is_empty());
        assert_eq!(citizen.customer_id, "CID123456789");
        assert_eq!(citizen.district_id, "district-uuid");
    }
}
