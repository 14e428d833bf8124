// 📄 Liability Entity - per-account debt terms (credit cards and loans)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiabilityType {
    CreditCard,
    Mortgage,
    StudentLoan,
    Other(String),
}

impl LiabilityType {
    pub fn as_str(&self) -> &str {
        match self {
            LiabilityType::CreditCard => "credit_card",
            LiabilityType::Mortgage => "mortgage",
            LiabilityType::StudentLoan => "student_loan",
            LiabilityType::Other(name) => name.as_str(),
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "credit_card" => LiabilityType::CreditCard,
            "mortgage" => LiabilityType::Mortgage,
            "student_loan" => LiabilityType::StudentLoan,
            other => LiabilityType::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Liability {
    pub liability_id: String,
    pub account_id: String,
    pub liability_type: LiabilityType,
    pub apr_percentage: Option<f64>,
    pub minimum_payment_amount: Option<f64>,
    pub last_payment_amount: Option<f64>,
    pub is_overdue: bool,

    /// Loans only
    pub interest_rate: Option<f64>,
}

impl Liability {
    pub fn new(liability_id: &str, account_id: &str, liability_type: LiabilityType) -> Self {
        Liability {
            liability_id: liability_id.to_string(),
            account_id: account_id.to_string(),
            liability_type,
            apr_percentage: None,
            minimum_payment_amount: None,
            last_payment_amount: None,
            is_overdue: false,
            interest_rate: None,
        }
    }

    pub fn with_minimum_payment(mut self, amount: f64) -> Self {
        self.minimum_payment_amount = Some(amount);
        self
    }

    pub fn with_interest_rate(mut self, rate: f64) -> Self {
        self.interest_rate = Some(rate);
        self
    }

    pub fn overdue(mut self) -> Self {
        self.is_overdue = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_liability_type_parse() {
        assert_eq!(LiabilityType::parse("mortgage"), LiabilityType::Mortgage);
        assert_eq!(LiabilityType::parse("STUDENT_LOAN"), LiabilityType::StudentLoan);
        assert_eq!(LiabilityType::parse("credit_card").as_str(), "credit_card");
        assert_eq!(
            LiabilityType::parse("auto"),
            LiabilityType::Other("auto".to_string())
        );
    }

    #[test]
    fn test_builder() {
        let liability = Liability::new("l1", "cc_1", LiabilityType::CreditCard)
            .with_minimum_payment(35.0)
            .overdue();
        assert!(liability.is_overdue);
        assert_eq!(liability.minimum_payment_amount, Some(35.0));
        assert_eq!(liability.interest_rate, None);
    }
}
