// Penalty Rules - Rules as Data
//
// Tiered late-payment penalties. The engine walks rules in priority order and
// applies the first one whose grace period the overdue record has exceeded,
// so rule ordering is the policy: with the default set, a record 19 days
// overdue gets the fixed penalty (grace 7), not the percentage one (grace 15).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// Flat amount
    Fixed,

    /// Flat amount per started month past the grace period
    Escalating,

    /// Percentage of the tax amount, optionally capped
    Percentage,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Fixed => "fixed",
            RuleKind::Escalating => "escalating",
            RuleKind::Percentage => "percentage",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fixed" => Some(RuleKind::Fixed),
            "escalating" => Some(RuleKind::Escalating),
            "percentage" => Some(RuleKind::Percentage),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenaltyRule {
    /// Rule ID for tracking, e.g. "fixed_100"
    pub id: String,

    /// Display name carried into penalty reasons
    pub name: String,

    pub kind: RuleKind,

    /// Flat amount for fixed/escalating rules, percent for percentage rules
    pub value: f64,

    /// Days past due before this rule fires
    pub grace_period_days: i64,

    /// Ceiling for percentage rules
    #[serde(default)]
    pub max_penalty: Option<f64>,

    #[serde(default)]
    pub description: String,

    /// Priority (higher = evaluated first)
    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_priority() -> i32 {
    0
}

impl PenaltyRule {
    /// Check the rule is well-formed before it is persisted.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("rule id must not be empty".to_string());
        }
        if self.name.trim().is_empty() {
            return Err(format!("rule '{}': name must not be empty", self.id));
        }
        if !self.value.is_finite() || self.value <= 0.0 {
            return Err(format!("rule '{}': value must be a positive number", self.id));
        }
        if self.grace_period_days < 0 {
            return Err(format!("rule '{}': grace period must not be negative", self.id));
        }
        if let Some(cap) = self.max_penalty {
            if !cap.is_finite() || cap <= 0.0 {
                return Err(format!("rule '{}': max penalty must be a positive number", self.id));
            }
        }
        Ok(())
    }
}

/// The stock rule set every new database is seeded with.
pub fn default_rules() -> Vec<PenaltyRule> {
    vec![
        PenaltyRule {
            id: "fixed_100".to_string(),
            name: "Fixed Penalty".to_string(),
            kind: RuleKind::Fixed,
            value: 100.0,
            grace_period_days: 7,
            max_penalty: None,
            description: "Fixed penalty of ₹100 after 7 days grace period".to_string(),
            priority: 100,
        },
        PenaltyRule {
            id: "percentage_2".to_string(),
            name: "Percentage Penalty".to_string(),
            kind: RuleKind::Percentage,
            value: 2.0,
            grace_period_days: 15,
            max_penalty: Some(1000.0),
            description: "2% of tax amount after 15 days, max ₹1000".to_string(),
            priority: 50,
        },
        PenaltyRule {
            id: "escalating".to_string(),
            name: "Escalating Penalty".to_string(),
            kind: RuleKind::Escalating,
            value: 50.0,
            grace_period_days: 30,
            max_penalty: None,
            description: "₹50 per month after 30 days".to_string(),
            priority: 10,
        },
    ]
}

// ============================================================================
// ASSESSMENT RESULT
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PenaltyAssessment {
    /// Penalty amount, rounded to the nearest rupee
    pub amount: f64,

    pub days_overdue: i64,

    /// The rule that fired
    pub rule: PenaltyRule,

    /// Human-readable arithmetic, e.g. "2% of ₹5000 = ₹100"
    pub calculation: String,
}

/// Whole days between due date and evaluation date. Negative while the due
/// date is still ahead.
pub fn days_overdue(due_date: NaiveDate, evaluated_on: NaiveDate) -> i64 {
    (evaluated_on - due_date).num_days()
}

// ============================================================================
// PENALTY ENGINE
// ============================================================================

pub struct PenaltyEngine {
    rules: Vec<PenaltyRule>,
}

impl PenaltyEngine {
    /// Create a new empty engine
    pub fn new() -> Self {
        PenaltyEngine { rules: Vec::new() }
    }

    /// Create engine from a list of rules
    pub fn from_rules(mut rules: Vec<PenaltyRule>) -> Self {
        // Sort by priority (higher first); ties keep list order
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        PenaltyEngine { rules }
    }

    /// Add a single rule
    pub fn add_rule(&mut self, rule: PenaltyRule) {
        self.rules.push(rule);
        self.rules.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Assess a penalty for a tax amount due on `due_date`, as of
    /// `evaluated_on`. Returns None while the record is not overdue or every
    /// rule's grace period still covers it.
    pub fn evaluate(
        &self,
        tax_amount: f64,
        due_date: NaiveDate,
        evaluated_on: NaiveDate,
    ) -> Option<PenaltyAssessment> {
        let days_overdue = days_overdue(due_date, evaluated_on);

        if days_overdue <= 0 {
            return None;
        }

        // First rule whose grace period is exceeded (already sorted)
        let rule = self
            .rules
            .iter()
            .find(|rule| days_overdue > rule.grace_period_days)?;

        let (amount, calculation) = match rule.kind {
            RuleKind::Fixed => (rule.value, format!("Fixed penalty: ₹{}", rule.value)),
            RuleKind::Escalating => {
                let months_overdue =
                    ((days_overdue - rule.grace_period_days) as f64 / 30.0).ceil() as i64;
                let amount = rule.value * months_overdue as f64;
                (
                    amount,
                    format!("₹{} × {} months = ₹{}", rule.value, months_overdue, amount),
                )
            }
            RuleKind::Percentage => {
                let raw = (tax_amount * rule.value) / 100.0;
                match rule.max_penalty {
                    Some(cap) if raw > cap => (
                        cap,
                        format!(
                            "{}% of ₹{} = ₹{}, capped at ₹{}",
                            rule.value, tax_amount, raw, cap
                        ),
                    ),
                    _ => (raw, format!("{}% of ₹{} = ₹{}", rule.value, tax_amount, raw)),
                }
            }
        };

        Some(PenaltyAssessment {
            amount: amount.round(),
            days_overdue,
            rule: rule.clone(),
            calculation,
        })
    }

    /// Get the rules in evaluation order
    pub fn rules(&self) -> &[PenaltyRule] {
        &self.rules
    }

    /// Get number of rules loaded
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl Default for PenaltyEngine {
    fn default() -> Self {
        Self::from_rules(default_rules())
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

    fn single_rule_engine(rule: PenaltyRule) -> PenaltyEngine {
        PenaltyEngine::from_rules(vec![rule])
    }

    #[test]
    fn test_not_overdue_no_penalty() {
        let engine = PenaltyEngine::default();

        // Due today and due in the future
        assert!(engine.evaluate(5000.0, date("2024-01-01"), date("2024-01-01")).is_none());
        assert!(engine.evaluate(5000.0, date("2024-06-01"), date("2024-01-20")).is_none());
    }

    #[test]
    fn test_within_grace_no_penalty() {
        let engine = PenaltyEngine::default();

        // 5 days overdue, shortest grace period is 7 days
        let result = engine.evaluate(5000.0, date("2024-01-01"), date("2024-01-06"));
        assert!(result.is_none());

        // Exactly at the grace boundary (7 days) still no penalty
        let result = engine.evaluate(5000.0, date("2024-01-01"), date("2024-01-08"));
        assert!(result.is_none());
    }

    #[test]
    fn test_fixed_penalty_after_grace() {
        let engine = PenaltyEngine::default();

        // 19 days overdue: fixed rule (grace 7) fires
        let result = engine
            .evaluate(5000.0, date("2024-01-01"), date("2024-01-20"))
            .unwrap();

        assert_eq!(result.days_overdue, 19);
        assert_eq!(result.amount, 100.0);
        assert_eq!(result.rule.id, "fixed_100");
        assert_eq!(result.calculation, "Fixed penalty: ₹100");
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let engine = PenaltyEngine::default();

        // 19 days exceeds both the 7-day and 15-day grace periods; the
        // higher-priority fixed rule is applied, not the percentage one.
        let result = engine
            .evaluate(5000.0, date("2024-01-01"), date("2024-01-20"))
            .unwrap();

        assert_eq!(result.rule.id, "fixed_100");
        assert_eq!(result.rule.kind, RuleKind::Fixed);
    }

    #[test]
    fn test_percentage_penalty() {
        let engine = single_rule_engine(PenaltyRule {
            id: "percentage_2".to_string(),
            name: "Percentage Penalty".to_string(),
            kind: RuleKind::Percentage,
            value: 2.0,
            grace_period_days: 15,
            max_penalty: Some(1000.0),
            description: String::new(),
            priority: 0,
        });

        let result = engine
            .evaluate(5000.0, date("2024-01-01"), date("2024-01-20"))
            .unwrap();

        assert_eq!(result.amount, 100.0);
        assert_eq!(result.calculation, "2% of ₹5000 = ₹100");
    }

    #[test]
    fn test_percentage_penalty_capped() {
        let engine = single_rule_engine(PenaltyRule {
            id: "percentage_2".to_string(),
            name: "Percentage Penalty".to_string(),
            kind: RuleKind::Percentage,
            value: 2.0,
            grace_period_days: 15,
            max_penalty: Some(1000.0),
            description: String::new(),
            priority: 0,
        });

        // 2% of 60000 = 1200, above the 1000 cap
        let result = engine
            .evaluate(60000.0, date("2024-01-01"), date("2024-01-20"))
            .unwrap();

        assert_eq!(result.amount, 1000.0);
        assert_eq!(result.calculation, "2% of ₹60000 = ₹1200, capped at ₹1000");
    }

    #[test]
    fn test_percentage_rounding() {
        let engine = single_rule_engine(PenaltyRule {
            id: "percentage_2".to_string(),
            name: "Percentage Penalty".to_string(),
            kind: RuleKind::Percentage,
            value: 2.0,
            grace_period_days: 0,
            max_penalty: None,
            description: String::new(),
            priority: 0,
        });

        // 2% of 333 = 6.66, rounded to 7
        let result = engine
            .evaluate(333.0, date("2024-01-01"), date("2024-01-10"))
            .unwrap();

        assert_eq!(result.amount, 7.0);
    }

    #[test]
    fn test_escalating_penalty_by_month() {
        let rule = PenaltyRule {
            id: "escalating".to_string(),
            name: "Escalating Penalty".to_string(),
            kind: RuleKind::Escalating,
            value: 50.0,
            grace_period_days: 30,
            max_penalty: None,
            description: String::new(),
            priority: 0,
        };
        let engine = single_rule_engine(rule);

        // 120 days overdue: ceil((120 - 30) / 30) = 3 months
        let result = engine
            .evaluate(5000.0, date("2024-01-01"), date("2024-04-30"))
            .unwrap();

        assert_eq!(result.days_overdue, 120);
        assert_eq!(result.amount, 150.0);
        assert_eq!(result.calculation, "₹50 × 3 months = ₹150");

        // 31 days overdue: one started month
        let result = engine
            .evaluate(5000.0, date("2024-01-01"), date("2024-02-01"))
            .unwrap();

        assert_eq!(result.amount, 50.0);
        assert_eq!(result.calculation, "₹50 × 1 months = ₹50");
    }

    #[test]
    fn test_rule_priority_order() {
        let mut engine = PenaltyEngine::new();

        engine.add_rule(PenaltyRule {
            id: "late".to_string(),
            name: "Late".to_string(),
            kind: RuleKind::Fixed,
            value: 500.0,
            grace_period_days: 3,
            max_penalty: None,
            description: String::new(),
            priority: 1,
        });
        engine.add_rule(PenaltyRule {
            id: "preferred".to_string(),
            name: "Preferred".to_string(),
            kind: RuleKind::Fixed,
            value: 25.0,
            grace_period_days: 3,
            max_penalty: None,
            description: String::new(),
            priority: 100,
        });

        // Higher priority rule is checked first
        let result = engine
            .evaluate(5000.0, date("2024-01-01"), date("2024-01-10"))
            .unwrap();

        assert_eq!(result.rule.id, "preferred");
        assert_eq!(result.amount, 25.0);
    }

    #[test]
    fn test_empty_engine_no_penalty() {
        let engine = PenaltyEngine::new();

        assert!(engine
            .evaluate(5000.0, date("2024-01-01"), date("2024-06-01"))
            .is_none());
        assert_eq!(engine.rule_count(), 0);
    }

    #[test]
    fn test_days_overdue_arithmetic() {
        assert_eq!(days_overdue(date("2024-01-01"), date("2024-01-20")), 19);
        assert_eq!(days_overdue(date("2024-01-01"), date("2024-01-01")), 0);
        assert_eq!(days_overdue(date("2024-01-20"), date("2024-01-01")), -19);
        // Leap day included
        assert_eq!(days_overdue(date("2024-02-28"), date("2024-03-01")), 2);
    }

    #[test]
    fn test_rule_validation() {
        let mut rule = default_rules().remove(0);
        assert!(rule.validate().is_ok());

        rule.value = 0.0;
        assert!(rule.validate().is_err());

        rule.value = 100.0;
        rule.grace_period_days = -1;
        assert!(rule.validate().is_err());

        rule.grace_period_days = 7;
        rule.id = "".to_string();
        assert!(rule.validate().is_err());
    }

    #[test]
    fn test_default_rule_set() {
        let rules = default_rules();

        assert_eq!(rules.len(), 3);
        for rule in &rules {
            assert!(rule.validate().is_ok());
        }

        // Ordering pins the policy: fixed fires before percentage
        let engine = PenaltyEngine::from_rules(rules);
        assert_eq!(engine.rules()[0].id, "fixed_100");
        assert_eq!(engine.rules()[1].id, "percentage_2");
        assert_eq!(engine.rules()[2].id, "escalating");
    }
}
