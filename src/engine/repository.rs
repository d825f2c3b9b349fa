//! Data access contract used by the payroll engine.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::calculation::VacationLedger;
use crate::config::CalculationConfig;
use crate::error::EngineResult;
use crate::models::{
    AccumulatedAnnual, CalculationRule, InterestAccrual, Loan, LoanPayment, Novelty,
    PayrollDefinition, PayrollRun,
};

/// A nested transaction scope opened with [`PayrollRepository::savepoint`].
///
/// Scopes are strictly nested: releasing or rolling back a scope also ends
/// every scope opened after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Savepoint(pub(crate) usize);

/// Storage for everything a payroll run reads and writes.
///
/// Reads never mutate. Writes performed inside a savepoint are undone by
/// [`rollback_to`](PayrollRepository::rollback_to); payroll runs themselves
/// are persisted outside savepoints so a failed batch can still be recorded.
pub trait PayrollRepository: Send {
    /// Loads a payroll definition with its employees, concepts and payroll type.
    fn get_payroll_definition(&self, id: &str) -> EngineResult<PayrollDefinition>;

    /// Calculation configuration for a company, falling back to the global defaults.
    fn get_calculation_config(&self, company_id: &str) -> CalculationConfig;

    /// Fetches the accumulator for a fiscal year, creating an empty one if needed.
    fn get_or_create_accumulated_annual(
        &mut self,
        employee_id: &str,
        payroll_type_id: &str,
        company_id: &str,
        fiscal_year_start: NaiveDate,
    ) -> EngineResult<AccumulatedAnnual>;

    /// Stores an updated accumulator.
    fn save_accumulated_annual(&mut self, accumulated: AccumulatedAnnual) -> EngineResult<()>;

    /// The most recent rate converting `from` into `to` effective on or before `as_of`.
    fn get_exchange_rate(&self, from: &str, to: &str, as_of: NaiveDate) -> EngineResult<Option<Decimal>>;

    /// Loans and advances of an employee that can still be collected.
    fn get_active_loans(&self, employee_id: &str) -> EngineResult<Vec<Loan>>;

    /// Loads a single loan.
    fn get_loan(&self, id: &str) -> EngineResult<Loan>;

    /// Stores an updated loan.
    fn save_loan(&mut self, loan: Loan) -> EngineResult<()>;

    /// Appends a payment ledger entry.
    fn record_loan_payment(&mut self, payment: LoanPayment) -> EngineResult<()>;

    /// Appends an interest ledger entry.
    fn record_interest_accrual(&mut self, accrual: InterestAccrual) -> EngineResult<()>;

    /// Payments recorded by a run.
    fn loan_payments_for_run(&self, run_id: Uuid) -> EngineResult<Vec<LoanPayment>>;

    /// Novelties recorded for an employee within a date range.
    fn get_novelties(&self, employee_id: &str, start: NaiveDate, end: NaiveDate) -> EngineResult<Vec<Novelty>>;

    /// Calculation rules currently configured.
    fn get_rules(&self) -> EngineResult<Vec<CalculationRule>>;

    /// Stores a run, replacing any previous version.
    fn save_run(&mut self, run: &PayrollRun) -> EngineResult<()>;

    /// Loads a run.
    fn get_run(&self, id: Uuid) -> EngineResult<PayrollRun>;

    /// Runs of a payroll definition.
    fn list_runs(&self, definition_id: &str) -> EngineResult<Vec<PayrollRun>>;

    /// Removes ledger entries written by a run ahead of reprocessing it.
    fn delete_run_data(&mut self, run_id: Uuid) -> EngineResult<()>;

    /// The vacation ledger.
    fn vacation_ledger(&mut self) -> &mut dyn VacationLedger;

    /// Opens a nested transaction scope.
    fn savepoint(&mut self) -> EngineResult<Savepoint>;

    /// Keeps the writes made since `savepoint` and closes the scope.
    fn release(&mut self, savepoint: Savepoint) -> EngineResult<()>;

    /// Undoes the writes made since `savepoint` and closes the scope.
    fn rollback_to(&mut self, savepoint: Savepoint) -> EngineResult<()>;
}

/// Aggregates novelty quantities per concept code.
pub fn novelty_quantities(novelties: &[Novelty]) -> BTreeMap<String, Decimal> {
    let mut quantities = BTreeMap::new();
    for novelty in novelties {
        *quantities
            .entry(novelty.concept_code.clone())
            .or_insert(Decimal::ZERO) += novelty.quantity;
    }
    quantities
}
