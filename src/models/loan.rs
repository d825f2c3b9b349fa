//! Loans, salary advances and their ledgers.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

/// Loan or salary advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanKind {
    /// A loan repaid in installments.
    Loan,
    /// A salary advance (adelanto).
    Advance,
}

/// Lifecycle of a loan.
///
/// `Draft → Pending → Approved → Applied → Paid`, with `Rejected` reachable
/// from `Pending` and `Cancelled` from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    /// Being prepared.
    Draft,
    /// Awaiting approval.
    Pending,
    /// Approved; deducted by payroll.
    Approved,
    /// Payments applied by an applied payroll run.
    Applied,
    /// Fully repaid.
    Paid,
    /// Rejected during approval.
    Rejected,
    /// Voided.
    Cancelled,
}

impl LoanStatus {
    /// Returns true when `self → next` is allowed.
    pub fn can_transition_to(self, next: LoanStatus) -> bool {
        use LoanStatus::*;
        matches!(
            (self, next),
            (Draft, Pending)
                | (Pending, Approved)
                | (Pending, Rejected)
                | (Approved, Applied)
                | (Approved, Paid)
                | (Applied, Paid)
                | (Draft | Pending | Approved | Applied, Cancelled)
        )
    }

    /// Statuses whose balance payroll deducts from.
    pub fn is_collectible(self) -> bool {
        matches!(self, LoanStatus::Approved | LoanStatus::Applied)
    }
}

/// How interest accrues on the outstanding balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestType {
    /// No interest.
    #[default]
    None,
    /// Simple daily interest.
    Simple,
    /// Daily compounded interest.
    Compound,
}

/// Amortization method for installment schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmortizationMethod {
    /// Constant total payment.
    #[default]
    French,
    /// Constant principal portion.
    German,
}

/// A loan or salary advance owed by an employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    /// Unique identifier.
    pub id: String,
    /// The borrowing employee.
    pub employee_id: String,
    /// Loan or advance.
    pub kind: LoanKind,
    /// Requested principal.
    pub principal: Decimal,
    /// Approved amount.
    pub approved_amount: Decimal,
    /// Outstanding balance.
    pub balance: Decimal,
    /// Annual interest rate in percent.
    #[serde(default)]
    pub annual_rate: Decimal,
    /// Interest accrual type.
    #[serde(default)]
    pub interest_type: InterestType,
    /// Amortization method for dynamic installments.
    #[serde(default)]
    pub amortization_method: AmortizationMethod,
    /// Fixed installment; when absent the installment is recomputed from the balance.
    #[serde(default)]
    pub installment_amount: Option<Decimal>,
    /// Total number of installments.
    pub installments: u32,
    /// Installments already paid.
    #[serde(default)]
    pub installments_paid: u32,
    /// Deduction order among the employee's loans; lower first.
    #[serde(default)]
    pub priority: u32,
    /// Current status.
    pub status: LoanStatus,
    /// Disbursement date.
    pub start_date: NaiveDate,
    /// Date interest was last accrued up to.
    #[serde(default)]
    pub last_interest_date: Option<NaiveDate>,
}

impl Loan {
    /// Moves the loan to `next`, rejecting illegal transitions.
    pub fn transition(&mut self, next: LoanStatus) -> EngineResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(EngineError::InvalidTransition {
                from: format!("{:?}", self.status),
                to: format!("{:?}", next),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Installments not yet paid, at least one.
    pub fn remaining_installments(&self) -> u32 {
        self.installments.saturating_sub(self.installments_paid).max(1)
    }

    /// The date interest accrues from.
    pub fn interest_from(&self) -> NaiveDate {
        self.last_interest_date.unwrap_or(self.start_date)
    }
}

/// An installment payment recorded against a loan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanPayment {
    /// Unique identifier.
    pub id: Uuid,
    /// The loan paid.
    pub loan_id: String,
    /// The run that produced the payment.
    pub run_id: Uuid,
    /// Payment date.
    pub date: NaiveDate,
    /// Balance before the payment.
    pub balance_before: Decimal,
    /// Amount paid.
    pub amount: Decimal,
    /// Balance after the payment.
    pub balance_after: Decimal,
}

/// Interest accrued onto a loan balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestAccrual {
    /// Unique identifier.
    pub id: Uuid,
    /// The loan accrued on.
    pub loan_id: String,
    /// The run that produced the accrual.
    pub run_id: Uuid,
    /// Accrual date.
    pub date: NaiveDate,
    /// Days accrued.
    pub days: i64,
    /// Annual rate applied, in percent.
    pub rate: Decimal,
    /// Balance before accrual.
    pub balance_before: Decimal,
    /// Interest amount.
    pub interest: Decimal,
    /// Balance after accrual.
    pub balance_after: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loan(status: LoanStatus) -> Loan {
        Loan {
            id: "LN-1".to_string(),
            employee_id: "emp_001".to_string(),
            kind: LoanKind::Loan,
            principal: Decimal::from(10000),
            approved_amount: Decimal::from(10000),
            balance: Decimal::from(10000),
            annual_rate: Decimal::from(12),
            interest_type: InterestType::Simple,
            amortization_method: AmortizationMethod::French,
            installment_amount: None,
            installments: 12,
            installments_paid: 3,
            priority: 0,
            status,
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            last_interest_date: None,
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut l = loan(LoanStatus::Draft);
        l.transition(LoanStatus::Pending).unwrap();
        l.transition(LoanStatus::Approved).unwrap();
        l.transition(LoanStatus::Applied).unwrap();
        l.transition(LoanStatus::Paid).unwrap();
        assert_eq!(l.status, LoanStatus::Paid);
    }

    #[test]
    fn test_paid_is_terminal() {
        let mut l = loan(LoanStatus::Paid);
        let err = l.transition(LoanStatus::Cancelled).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
        assert_eq!(l.status, LoanStatus::Paid);
    }

    #[test]
    fn test_rejected_only_from_pending() {
        assert!(LoanStatus::Pending.can_transition_to(LoanStatus::Rejected));
        assert!(!LoanStatus::Approved.can_transition_to(LoanStatus::Rejected));
    }

    #[test]
    fn test_collectible_statuses() {
        assert!(LoanStatus::Approved.is_collectible());
        assert!(LoanStatus::Applied.is_collectible());
        assert!(!LoanStatus::Pending.is_collectible());
        assert!(!LoanStatus::Paid.is_collectible());
    }

    #[test]
    fn test_remaining_installments() {
        let mut l = loan(LoanStatus::Approved);
        assert_eq!(l.remaining_installments(), 9);
        l.installments_paid = 15;
        assert_eq!(l.remaining_installments(), 1);
    }
}
