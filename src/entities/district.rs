// District Entity
//
// Administrative area a citizen belongs to. Names are unique; duplicate
// creation surfaces as a conflict at the store layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct District {
    /// Stable identity (UUID)
    pub id: String,

    /// Unique district name, e.g. "Central District"
    pub name: String,

    pub created_at: DateTime<Utc>,
}

impl District {
    pub fn new(name: &str) -> Self {
        District {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
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
    fn test_district_creation() {
        let district = District::new("North District");

        assert!(!district.id.is_empty());
        assert_eq!(district.name, "North District");
    }
}
