//! Business-rule violations
//!
//! These map to 422 responses with a stable machine-readable code.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error(
        "Expense of {amount_cents} cents exceeds the remaining budget of {remaining_cents} cents"
    )]
    BudgetExceeded {
        amount_cents: i64,
        remaining_cents: i64,
    },

    #[error("Budget of {new_total_cents} cents is below actual expenditure of {actual_cents} cents")]
    BudgetBelowExpenditure {
        new_total_cents: i64,
        actual_cents: i64,
    },

    #[error("Amount must be positive")]
    NonPositiveAmount,
}

impl DomainError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::BudgetExceeded { .. } => "BUDGET_EXCEEDED",
            Self::BudgetBelowExpenditure { .. } => "BUDGET_BELOW_EXPENDITURE",
            Self::NonPositiveAmount => "INVALID_AMOUNT",
        }
    }

    /// Request field the violation is reported against
    pub fn field(&self) -> &'static str {
        match self {
            Self::BudgetExceeded { .. } | Self::NonPositiveAmount => "amount_cents",
            Self::BudgetBelowExpenditure { .. } => "total_budget_cents",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_fields() {
        let err = DomainError::BudgetExceeded {
            amount_cents: 500,
            remaining_cents: 100,
        };
        assert_eq!(err.code(), "BUDGET_EXCEEDED");
        assert_eq!(err.field(), "amount_cents");
        assert!(err.to_string().contains("500"));

        let err = DomainError::BudgetBelowExpenditure {
            new_total_cents: 10,
            actual_cents: 20,
        };
        assert_eq!(err.code(), "BUDGET_BELOW_EXPENDITURE");
        assert_eq!(err.field(), "total_budget_cents");
    }
}
