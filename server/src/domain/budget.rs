//! Budget arithmetic
//!
//! All amounts are integer cents. The invariant `actual <= total` is checked
//! here before a write and enforced again by the schema's CHECK constraint.

use serde::Serialize;
use utoipa::ToSchema;

use super::error::DomainError;

/// Budget figures derived from a project's totals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct BudgetStatus {
    pub total_budget_cents: i64,
    pub actual_expenditure_cents: i64,
    pub remaining_cents: i64,
    pub remaining_percent: f64,
}

impl BudgetStatus {
    pub fn new(total_cents: i64, actual_cents: i64) -> Self {
        Self {
            total_budget_cents: total_cents,
            actual_expenditure_cents: actual_cents,
            remaining_cents: remaining_cents(total_cents, actual_cents),
            remaining_percent: remaining_percent(total_cents, actual_cents),
        }
    }
}

pub fn remaining_cents(total_cents: i64, actual_cents: i64) -> i64 {
    total_cents - actual_cents
}

/// Remaining budget as a percentage of the total. An empty budget with no
/// spending counts as fully available.
pub fn remaining_percent(total_cents: i64, actual_cents: i64) -> f64 {
    if total_cents <= 0 {
        return if actual_cents <= 0 { 100.0 } else { 0.0 };
    }
    remaining_cents(total_cents, actual_cents) as f64 / total_cents as f64 * 100.0
}

/// Validate an expense against the budget; returns the new actual expenditure
pub fn check_expense(
    total_cents: i64,
    actual_cents: i64,
    amount_cents: i64,
) -> Result<i64, DomainError> {
    if amount_cents <= 0 {
        return Err(DomainError::NonPositiveAmount);
    }
    let new_actual = actual_cents.saturating_add(amount_cents);
    if new_actual > total_cents {
        return Err(DomainError::BudgetExceeded {
            amount_cents,
            remaining_cents: remaining_cents(total_cents, actual_cents),
        });
    }
    Ok(new_actual)
}

/// A new total may not drop below what has already been spent
pub fn check_budget_change(new_total_cents: i64, actual_cents: i64) -> Result<(), DomainError> {
    if new_total_cents < actual_cents {
        return Err(DomainError::BudgetBelowExpenditure {
            new_total_cents,
            actual_cents,
        });
    }
    Ok(())
}

/// Whether remaining budget is at or under `threshold_percent` of the total
pub fn is_below_threshold(total_cents: i64, actual_cents: i64, threshold_percent: u32) -> bool {
    total_cents > 0 && remaining_percent(total_cents, actual_cents) <= f64::from(threshold_percent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_percent() {
        assert_eq!(remaining_percent(1000, 250), 75.0);
        assert_eq!(remaining_percent(1000, 1000), 0.0);
        assert_eq!(remaining_percent(0, 0), 100.0);
    }

    #[test]
    fn test_check_expense_within_budget() {
        assert_eq!(check_expense(1000, 400, 600), Ok(1000));
        assert_eq!(check_expense(1000, 0, 1), Ok(1));
    }

    #[test]
    fn test_check_expense_exceeds() {
        assert_eq!(
            check_expense(1000, 400, 601),
            Err(DomainError::BudgetExceeded {
                amount_cents: 601,
                remaining_cents: 600
            })
        );
        assert!(check_expense(0, 0, 1).is_err());
    }

    #[test]
    fn test_check_expense_rejects_non_positive() {
        assert_eq!(check_expense(1000, 0, 0), Err(DomainError::NonPositiveAmount));
        assert_eq!(check_expense(1000, 0, -5), Err(DomainError::NonPositiveAmount));
    }

    #[test]
    fn test_check_budget_change() {
        assert!(check_budget_change(500, 500).is_ok());
        assert!(check_budget_change(0, 0).is_ok());
        assert_eq!(
            check_budget_change(499, 500),
            Err(DomainError::BudgetBelowExpenditure {
                new_total_cents: 499,
                actual_cents: 500
            })
        );
    }

    #[test]
    fn test_threshold() {
        // 20% remaining is at the threshold
        assert!(is_below_threshold(1000, 800, 20));
        assert!(is_below_threshold(1000, 1000, 20));
        assert!(!is_below_threshold(1000, 799, 20));
        // No budget, no alert
        assert!(!is_below_threshold(0, 0, 20));
    }

    #[test]
    fn test_budget_status() {
        let status = BudgetStatus::new(2000, 500);
        assert_eq!(status.remaining_cents, 1500);
        assert_eq!(status.remaining_percent, 75.0);
    }
}
