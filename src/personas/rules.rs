// 🏷️ Persona Rules - rules as data, resolved by priority
//
// Each persona is one registry row: id, priority, display name and the
// evaluator that tests a signal bundle. Lower priority number wins.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::criteria::{
    check_debt_burden, check_high_utilization, check_savings_builder, check_subscription_heavy,
    check_variable_income, RuleOutcome, SignalsUsed,
};
use crate::features::SignalBundle;

/// Reasoning when nothing matched
pub const NO_PERSONA_REASONING: &str = "No persona assigned";

/// Display name when nothing matched
pub const NO_PERSONA_NAME: &str = "No Persona";

// ============================================================================
// PERSONA ID
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PersonaId {
    #[serde(rename = "persona1_high_utilization")]
    HighUtilization,
    #[serde(rename = "persona2_variable_income")]
    VariableIncome,
    #[serde(rename = "persona3_subscription_heavy")]
    SubscriptionHeavy,
    #[serde(rename = "persona4_savings_builder")]
    SavingsBuilder,
    #[serde(rename = "persona5_debt_burden")]
    DebtBurden,
}

impl PersonaId {
    pub const ALL: [PersonaId; 5] = [
        PersonaId::HighUtilization,
        PersonaId::VariableIncome,
        PersonaId::SubscriptionHeavy,
        PersonaId::DebtBurden,
        PersonaId::SavingsBuilder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PersonaId::HighUtilization => "persona1_high_utilization",
            PersonaId::VariableIncome => "persona2_variable_income",
            PersonaId::SubscriptionHeavy => "persona3_subscription_heavy",
            PersonaId::SavingsBuilder => "persona4_savings_builder",
            PersonaId::DebtBurden => "persona5_debt_burden",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        PersonaId::ALL.into_iter().find(|id| id.as_str() == value)
    }
}

impl fmt::Display for PersonaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// RULE DEFINITION
// ============================================================================

pub type Evaluator = fn(&SignalBundle) -> RuleOutcome;

#[derive(Clone, Copy)]
pub struct PersonaRule {
    pub id: PersonaId,

    /// Lower number = higher priority
    pub priority: u8,
    pub display_name: &'static str,
    pub evaluate: Evaluator,
}

/// A persona whose rule fired
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaMatch {
    pub persona: PersonaId,
    pub persona_name: String,
    pub reasoning: String,
    pub signals_used: SignalsUsed,
}

/// Outcome of priority resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub persona: Option<PersonaId>,
    pub reasoning: String,
    pub signals_used: SignalsUsed,
}

impl Resolution {
    pub fn none() -> Self {
        Resolution {
            persona: None,
            reasoning: NO_PERSONA_REASONING.to_string(),
            signals_used: SignalsUsed::new(),
        }
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

pub struct PersonaRegistry {
    rules: Vec<PersonaRule>,
}

impl PersonaRegistry {
    /// The five product personas
    pub fn standard() -> Self {
        PersonaRegistry::from_rules(vec![
            PersonaRule {
                id: PersonaId::HighUtilization,
                priority: 1,
                display_name: "High Utilization",
                evaluate: check_high_utilization,
            },
            PersonaRule {
                id: PersonaId::VariableIncome,
                priority: 2,
                display_name: "Variable Income Budgeter",
                evaluate: check_variable_income,
            },
            PersonaRule {
                id: PersonaId::SubscriptionHeavy,
                priority: 3,
                display_name: "Subscription-Heavy",
                evaluate: check_subscription_heavy,
            },
            PersonaRule {
                id: PersonaId::DebtBurden,
                priority: 4,
                display_name: "Debt Burden",
                evaluate: check_debt_burden,
            },
            PersonaRule {
                id: PersonaId::SavingsBuilder,
                priority: 5,
                display_name: "Savings Builder",
                evaluate: check_savings_builder,
            },
        ])
    }

    pub fn from_rules(mut rules: Vec<PersonaRule>) -> Self {
        rules.sort_by_key(|r| r.priority);
        PersonaRegistry { rules }
    }

    pub fn rules(&self) -> &[PersonaRule] {
        &self.rules
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    fn rule(&self, id: PersonaId) -> Option<&PersonaRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn display_name(&self, id: PersonaId) -> &'static str {
        self.rule(id).map(|r| r.display_name).unwrap_or(NO_PERSONA_NAME)
    }

    /// Unregistered personas sort last
    pub fn priority_of(&self, id: PersonaId) -> u8 {
        self.rule(id).map(|r| r.priority).unwrap_or(u8::MAX)
    }

    /// Every rule that fires, in priority order
    pub fn evaluate_all(&self, bundle: &SignalBundle) -> Vec<PersonaMatch> {
        self.rules
            .iter()
            .filter_map(|rule| {
                let outcome = (rule.evaluate)(bundle);
                outcome.matched.then(|| PersonaMatch {
                    persona: rule.id,
                    persona_name: rule.display_name.to_string(),
                    reasoning: outcome.reasoning,
                    signals_used: outcome.signals_used,
                })
            })
            .collect()
    }

    /// Highest priority wins; the rest are named in the reasoning
    pub fn resolve(&self, matches: &[PersonaMatch]) -> Resolution {
        let mut sorted: Vec<&PersonaMatch> = matches.iter().collect();
        sorted.sort_by_key(|m| self.priority_of(m.persona));

        let (winner, others) = match sorted.split_first() {
            Some(split) => split,
            None => return Resolution::none(),
        };

        let mut reasoning = winner.reasoning.clone();
        if !others.is_empty() {
            let names: Vec<&str> = others
                .iter()
                .map(|m| self.display_name(m.persona))
                .collect();
            reasoning.push_str(&format!(" (also matched: {})", names.join(", ")));
        }

        Resolution {
            persona: Some(winner.persona),
            reasoning,
            signals_used: winner.signals_used.clone(),
        }
    }

    /// Pure classification: the winning persona, if any rule fires
    pub fn classify(&self, bundle: &SignalBundle) -> Option<PersonaId> {
        self.resolve(&self.evaluate_all(bundle)).persona
    }
}

impl Default for PersonaRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Account, AccountType, Transaction};
    use crate::features::window::date_to_utc;
    use crate::features::{build_signal_bundle, UserSnapshot};
    use chrono::NaiveDate;

    fn matched(persona: PersonaId, reasoning: &str) -> PersonaMatch {
        PersonaMatch {
            persona,
            persona_name: PersonaRegistry::standard().display_name(persona).to_string(),
            reasoning: reasoning.to_string(),
            signals_used: SignalsUsed::new(),
        }
    }

    #[test]
    fn test_registry_order_and_names() {
        let registry = PersonaRegistry::standard();
        let order: Vec<PersonaId> = registry.rules().iter().map(|r| r.id).collect();

        assert_eq!(order, PersonaId::ALL.to_vec());
        assert_eq!(registry.rule_count(), 5);
        assert_eq!(registry.display_name(PersonaId::VariableIncome), "Variable Income Budgeter");
        assert_eq!(registry.priority_of(PersonaId::DebtBurden), 4);
        assert_eq!(registry.priority_of(PersonaId::SavingsBuilder), 5);
    }

    #[test]
    fn test_persona_id_strings() {
        for id in PersonaId::ALL {
            assert_eq!(PersonaId::parse(id.as_str()), Some(id));
            assert_eq!(serde_json::to_value(id).unwrap(), serde_json::Value::from(id.as_str()));
        }
        assert_eq!(PersonaId::parse("persona5_lifestyle_inflator"), None);
    }

    #[test]
    fn test_resolve_empty() {
        let resolution = PersonaRegistry::standard().resolve(&[]);

        assert_eq!(resolution.persona, None);
        assert_eq!(resolution.reasoning, "No persona assigned");
        assert!(resolution.signals_used.is_empty());
    }

    #[test]
    fn test_resolve_picks_priority_and_lists_others() {
        let registry = PersonaRegistry::standard();
        let matches = vec![
            matched(PersonaId::SavingsBuilder, "Savings Builder: ok"),
            matched(PersonaId::SubscriptionHeavy, "Subscription-Heavy: ok"),
            matched(PersonaId::HighUtilization, "High Utilization: Has overdue payments"),
            matched(PersonaId::DebtBurden, "Debt Burden: ok"),
        ];

        let resolution = registry.resolve(&matches);

        assert_eq!(resolution.persona, Some(PersonaId::HighUtilization));
        assert_eq!(
            resolution.reasoning,
            "High Utilization: Has overdue payments (also matched: Subscription-Heavy, Debt Burden, Savings Builder)"
        );
    }

    #[test]
    fn test_custom_registry_sorts_by_priority() {
        fn always(_: &SignalBundle) -> RuleOutcome {
            RuleOutcome {
                matched: true,
                reasoning: "always".to_string(),
                signals_used: SignalsUsed::new(),
            }
        }
        let registry = PersonaRegistry::from_rules(vec![
            PersonaRule { id: PersonaId::SavingsBuilder, priority: 9, display_name: "B", evaluate: always },
            PersonaRule { id: PersonaId::DebtBurden, priority: 2, display_name: "A", evaluate: always },
        ]);
        let bundle = build_signal_bundle(
            &UserSnapshot::new("u1"),
            30,
            date_to_utc(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()),
        );

        assert_eq!(registry.classify(&bundle), Some(PersonaId::DebtBurden));
        assert_eq!(registry.evaluate_all(&bundle).len(), 2);
        assert_eq!(registry.display_name(PersonaId::HighUtilization), "No Persona");
    }

    #[test]
    fn test_high_utilization_beats_savings_builder() {
        let as_of = date_to_utc(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());
        let mut snapshot = UserSnapshot::new("u1");
        snapshot.accounts = vec![
            Account::new("sav_1", "u1", AccountType::Savings, 10_000.0),
            Account::new("cc_1", "u1", AccountType::CreditCard, 0.0).with_credit_limit(1_000.0),
        ];
        snapshot.transactions = vec![
            Transaction::new("dep", "sav_1", NaiveDate::from_ymd_opt(2024, 6, 20).unwrap(), -500.0, None, "TRANSFER_IN"),
            Transaction::new("fee", "cc_1", NaiveDate::from_ymd_opt(2024, 6, 21).unwrap(), 5.0, Some("Late Fee"), "FEES"),
        ];

        let registry = PersonaRegistry::standard();
        let bundle = build_signal_bundle(&snapshot, 30, as_of);
        let matches = registry.evaluate_all(&bundle);
        let personas: Vec<PersonaId> = matches.iter().map(|m| m.persona).collect();
        assert_eq!(personas, vec![PersonaId::HighUtilization, PersonaId::SavingsBuilder]);

        let resolution = registry.resolve(&matches);
        assert_eq!(resolution.persona, Some(PersonaId::HighUtilization));
        assert!(resolution.reasoning.ends_with("(also matched: Savings Builder)"));

        println!("✅ Priority precedence PASSED");
    }
}
