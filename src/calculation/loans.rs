//! Loan and advance installment processing.
//!
//! Collectible loans and advances become installment candidates in an
//! [`InstallmentPlan`]. Loans carry the definition's loan priority and
//! advances its advance priority, so each installment takes its turn among
//! the concept deductions against the same shrinking available balance.
//! At its turn an installment accrues interest up to the payment date and
//! is then clipped to whatever balance is left.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use super::interest::{accrue_interest, next_installment};
use super::{BALANCE_TOLERANCE, WarningCollector, round_money};
use crate::config::CalculationConfig;
use crate::models::{
    EmployeeCalculation, InterestAccrual, InterestType, LineItem, Loan, LoanKind, LoanPayment,
    LoanStatus, PayrollDefinition,
};

/// Ledger entries and updated loans produced for one employee.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoanOutcome {
    /// Installment payments recorded.
    pub payments: Vec<LoanPayment>,
    /// Interest accrued.
    pub accruals: Vec<InterestAccrual>,
    /// Loans whose balance or status changed.
    pub updated: Vec<Loan>,
}

#[derive(Debug, Clone)]
struct PendingInstallment {
    loan: Loan,
    priority: u32,
}

/// Loan and advance installments due from one employee in one run.
///
/// Installments are listed loans first, then advances, each group in
/// ascending loan priority. They are collected one at a time with
/// [`InstallmentPlan::collect`] as the deduction pass reaches them.
#[derive(Debug, Clone)]
pub struct InstallmentPlan<'a> {
    pending: Vec<Option<PendingInstallment>>,
    run_id: Uuid,
    payment_date: NaiveDate,
    config: &'a CalculationConfig,
    outcome: LoanOutcome,
}

impl<'a> InstallmentPlan<'a> {
    /// Lists the installments the definition collects from these loans.
    pub fn new(
        loans: &[Loan],
        definition: &PayrollDefinition,
        run_id: Uuid,
        payment_date: NaiveDate,
        config: &'a CalculationConfig,
    ) -> Self {
        let passes = [
            (LoanKind::Loan, definition.apply_loans, definition.loan_priority),
            (LoanKind::Advance, definition.apply_advances, definition.advance_priority),
        ];

        let mut pending = Vec::new();
        for (kind, enabled, priority) in passes {
            if !enabled {
                continue;
            }
            let mut due: Vec<&Loan> = loans
                .iter()
                .filter(|l| l.kind == kind && l.status.is_collectible() && l.balance > Decimal::ZERO)
                .collect();
            due.sort_by_key(|l| l.priority);
            pending.extend(due.into_iter().map(|loan| {
                Some(PendingInstallment {
                    loan: loan.clone(),
                    priority,
                })
            }));
        }

        Self {
            pending,
            run_id,
            payment_date,
            config,
            outcome: LoanOutcome::default(),
        }
    }

    /// Number of installments in the plan.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true when nothing is due.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Deduction priority of each installment, by index.
    pub fn priorities(&self) -> Vec<u32> {
        self.pending
            .iter()
            .map(|p| p.as_ref().map_or(u32::MAX, |p| p.priority))
            .collect()
    }

    /// Collects installment `index` against the current available balance.
    ///
    /// With no balance left the installment is skipped with a warning and
    /// the loan is left untouched. Each installment is collected at most
    /// once.
    pub fn collect(&mut self, index: usize, calc: &mut EmployeeCalculation, warnings: &mut WarningCollector) {
        let Some(PendingInstallment { mut loan, priority }) =
            self.pending.get_mut(index).and_then(Option::take)
        else {
            return;
        };
        if calc.available_balance() <= Decimal::ZERO {
            warnings.push_concept(&loan.id, "insufficient balance for installment; skipped");
            return;
        }

        accrue(&mut loan, self.run_id, self.payment_date, self.config, &mut self.outcome);
        collect(
            calc,
            &mut loan,
            priority,
            self.run_id,
            self.payment_date,
            self.config,
            warnings,
            &mut self.outcome,
        );
        self.outcome.updated.push(loan);
    }

    /// The ledger entries and loan updates collected so far.
    pub fn into_outcome(self) -> LoanOutcome {
        self.outcome
    }
}

fn accrue(
    loan: &mut Loan,
    run_id: Uuid,
    payment_date: NaiveDate,
    config: &CalculationConfig,
    outcome: &mut LoanOutcome,
) {
    let days = (payment_date - loan.interest_from()).num_days();
    if loan.interest_type == InterestType::None || days <= 0 {
        return;
    }
    let interest = accrue_interest(
        loan.interest_type,
        loan.balance,
        loan.annual_rate,
        days,
        config.days_per_year,
    );
    loan.last_interest_date = Some(payment_date);
    if interest <= Decimal::ZERO {
        return;
    }

    let balance_before = loan.balance;
    loan.balance += interest;
    outcome.accruals.push(InterestAccrual {
        id: Uuid::new_v4(),
        loan_id: loan.id.clone(),
        run_id,
        date: payment_date,
        days,
        rate: loan.annual_rate,
        balance_before,
        interest,
        balance_after: loan.balance,
    });
}

#[allow(clippy::too_many_arguments)]
fn collect(
    calc: &mut EmployeeCalculation,
    loan: &mut Loan,
    line_priority: u32,
    run_id: Uuid,
    payment_date: NaiveDate,
    config: &CalculationConfig,
    warnings: &mut WarningCollector,
    outcome: &mut LoanOutcome,
) {
    let installment = loan.installment_amount.unwrap_or_else(|| {
        next_installment(
            loan.balance,
            loan.annual_rate,
            loan.remaining_installments(),
            loan.amortization_method,
            loan.interest_type,
            config.months_per_year,
        )
    });
    let due = round_money(installment.min(loan.balance));
    let applied = due.min(calc.available_balance());
    if applied <= Decimal::ZERO {
        return;
    }
    if applied < due {
        warnings.push_concept(
            &loan.id,
            format!("installment clipped from {} to {}", due, applied),
        );
    }

    let balance_before = loan.balance;
    loan.balance -= applied;
    loan.installments_paid += 1;
    let label = match loan.kind {
        LoanKind::Loan => "Loan",
        LoanKind::Advance => "Advance",
    };
    calc.add_item(LineItem::loan_installment(
        loan.id.clone(),
        format!("{} {}", label, loan.id),
        applied,
        line_priority,
    ));
    outcome.payments.push(LoanPayment {
        id: Uuid::new_v4(),
        loan_id: loan.id.clone(),
        run_id,
        date: payment_date,
        balance_before,
        amount: applied,
        balance_after: loan.balance,
    });

    if loan.balance <= BALANCE_TOLERANCE {
        loan.balance = Decimal::ZERO;
        if loan.status != LoanStatus::Paid && loan.transition(LoanStatus::Paid).is_err() {
            warnings.push_concept(&loan.id, "loan fully repaid but could not be marked paid");
        }
    }
    debug!(
        employee_id = %calc.employee_id,
        loan_id = %loan.id,
        amount = %applied,
        balance = %loan.balance,
        "installment applied"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculation::test_support::{calculation, definition, loan};
    use crate::models::LineKind;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn collect_all(
        calc: &mut EmployeeCalculation,
        loans: &[Loan],
        definition: &PayrollDefinition,
        warnings: &mut WarningCollector,
    ) -> LoanOutcome {
        let config = CalculationConfig::default();
        let mut plan = InstallmentPlan::new(loans, definition, Uuid::new_v4(), date(2025, 1, 31), &config);
        for index in 0..plan.len() {
            plan.collect(index, calc, warnings);
        }
        plan.into_outcome()
    }

    #[test]
    fn test_loans_before_advances() {
        let mut calc = calculation(dec("10000.00"));
        let mut warnings = WarningCollector::new();
        let loans = vec![
            loan("ADV-1", LoanKind::Advance, "2000.00", Some("500.00"), 0),
            loan("LN-1", LoanKind::Loan, "5000.00", Some("1000.00"), 0),
        ];
        let config = CalculationConfig::default();
        let plan = InstallmentPlan::new(
            &loans,
            &definition(),
            Uuid::new_v4(),
            date(2025, 1, 31),
            &config,
        );
        assert_eq!(plan.priorities(), vec![90, 91]);

        let outcome = collect_all(&mut calc, &loans, &definition(), &mut warnings);
        let codes: Vec<&str> = calc.deductions().iter().map(|d| d.code.as_str()).collect();
        assert_eq!(codes, vec!["LN-1", "ADV-1"]);
        assert_eq!(calc.deductions()[0].priority, 90);
        assert_eq!(calc.deductions()[1].priority, 91);
        assert!(calc.deductions().iter().all(|d| d.kind == LineKind::Deduction));
        assert_eq!(outcome.payments.len(), 2);
        assert_eq!(outcome.payments[0].balance_before, dec("5000.00"));
        assert_eq!(outcome.payments[0].balance_after, dec("4000.00"));
    }

    #[test]
    fn test_installment_clipped_then_skipped_with_warning() {
        let mut calc = calculation(dec("800.00"));
        let mut warnings = WarningCollector::new();
        let loans = vec![
            loan("LN-1", LoanKind::Loan, "5000.00", Some("1000.00"), 1),
            loan("LN-2", LoanKind::Loan, "5000.00", Some("1000.00"), 2),
        ];
        let outcome = collect_all(&mut calc, &loans, &definition(), &mut warnings);
        assert_eq!(calc.total_deductions(), dec("800.00"));
        assert_eq!(outcome.payments.len(), 1);
        assert_eq!(outcome.updated.len(), 1);
        assert_eq!(calc.net_pay(), Decimal::ZERO);
        assert_eq!(warnings.len(), 2);
        assert!(warnings.entries()[0].message.contains("clipped"));
        assert!(warnings.entries()[1].message.contains("insufficient balance"));
    }

    #[test]
    fn test_installment_collected_once() {
        let mut calc = calculation(dec("10000.00"));
        let mut warnings = WarningCollector::new();
        let loans = vec![loan("LN-1", LoanKind::Loan, "5000.00", Some("1000.00"), 0)];
        let config = CalculationConfig::default();
        let mut plan = InstallmentPlan::new(&loans, &definition(), Uuid::new_v4(), date(2025, 1, 31), &config);
        plan.collect(0, &mut calc, &mut warnings);
        plan.collect(0, &mut calc, &mut warnings);
        plan.collect(7, &mut calc, &mut warnings);
        assert_eq!(calc.total_deductions(), dec("1000.00"));
        assert_eq!(plan.into_outcome().payments.len(), 1);
    }

    #[test]
    fn test_final_payment_marks_paid() {
        let mut calc = calculation(dec("10000.00"));
        let mut warnings = WarningCollector::new();
        let loans = vec![loan("LN-1", LoanKind::Loan, "300.00", Some("1000.00"), 0)];
        let outcome = collect_all(&mut calc, &loans, &definition(), &mut warnings);
        assert_eq!(calc.total_deductions(), dec("300.00"));
        assert_eq!(outcome.updated[0].balance, Decimal::ZERO);
        assert_eq!(outcome.updated[0].status, LoanStatus::Paid);
    }

    #[test]
    fn test_interest_accrues_before_payment() {
        let mut calc = calculation(dec("10000.00"));
        let mut warnings = WarningCollector::new();
        let mut l = loan("LN-1", LoanKind::Loan, "10000.00", Some("1000.00"), 0);
        l.interest_type = InterestType::Simple;
        l.annual_rate = dec("36.5");
        let outcome = collect_all(&mut calc, &[l], &definition(), &mut warnings);
        // 10000 * 36.5% * 30 / 365 = 300
        assert_eq!(outcome.accruals[0].interest, dec("300.00"));
        assert_eq!(outcome.accruals[0].days, 30);
        assert_eq!(outcome.payments[0].balance_before, dec("10300.00"));
        assert_eq!(outcome.updated[0].balance, dec("9300.00"));
        assert_eq!(outcome.updated[0].last_interest_date, Some(date(2025, 1, 31)));
    }

    #[test]
    fn test_dynamic_installment_and_disabled_pass() {
        let mut calc = calculation(dec("10000.00"));
        let mut warnings = WarningCollector::new();
        let mut def = definition();
        def.apply_advances = false;
        let loans = vec![
            loan("LN-1", LoanKind::Loan, "1000.00", None, 0),
            loan("ADV-1", LoanKind::Advance, "1000.00", Some("100.00"), 0),
        ];
        collect_all(&mut calc, &loans, &def, &mut warnings);
        assert_eq!(calc.deductions().len(), 1);
        assert_eq!(calc.deductions()[0].amount, dec("100.00"));
        assert_eq!(calc.deductions()[0].code, "LN-1");
    }
}
