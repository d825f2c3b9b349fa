//! In-memory repository.
//!
//! Savepoints are implemented by snapshotting the whole store, which keeps
//! the rollback semantics exact at the cost of a clone per scope.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use super::repository::{PayrollRepository, Savepoint};
use crate::calculation::{InMemoryVacationLedger, VacationLedger};
use crate::config::{CalculationConfig, CalculationSettings, SeedData};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    AccumulatedAnnual, CalculationRule, ExchangeRate, InterestAccrual, Loan, LoanPayment, Novelty,
    PayrollDefinition, PayrollRun,
};

type AccumulatedKey = (String, String, String, NaiveDate);

#[derive(Debug, Clone, Default)]
struct Store {
    definitions: HashMap<String, PayrollDefinition>,
    accumulated: HashMap<AccumulatedKey, AccumulatedAnnual>,
    exchange_rates: Vec<ExchangeRate>,
    loans: BTreeMap<String, Loan>,
    payments: Vec<LoanPayment>,
    accruals: Vec<InterestAccrual>,
    novelties: Vec<Novelty>,
    rules: Vec<CalculationRule>,
    vacation: InMemoryVacationLedger,
}

/// A [`PayrollRepository`] held entirely in memory.
///
/// Used by the server binary (seeded from `seed.yaml`) and by tests.
///
/// # Example
///
/// ```
/// use payroll_engine::config::{CalculationSettings, SeedData};
/// use payroll_engine::engine::{InMemoryRepository, PayrollRepository};
///
/// let mut repo = InMemoryRepository::from_seed(CalculationSettings::default(), SeedData::default());
/// let scope = repo.savepoint().unwrap();
/// repo.rollback_to(scope).unwrap();
/// assert!(repo.get_payroll_definition("missing").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    settings: CalculationSettings,
    store: Store,
    savepoints: Vec<Store>,
    runs: HashMap<Uuid, PayrollRun>,
}

impl InMemoryRepository {
    /// Creates a repository from configuration and seed data.
    pub fn from_seed(settings: CalculationSettings, seed: SeedData) -> Self {
        let vacation = InMemoryVacationLedger::new(seed.vacation_policies, settings.defaults.days_per_year);
        let mut repo = Self {
            settings,
            store: Store {
                vacation,
                exchange_rates: seed.exchange_rates,
                novelties: seed.novelties,
                rules: seed.rules,
                ..Store::default()
            },
            savepoints: Vec::new(),
            runs: HashMap::new(),
        };
        for definition in seed.payroll_definitions {
            repo.insert_definition(definition);
        }
        for loan in seed.loans {
            repo.insert_loan(loan);
        }
        for accumulated in seed.accumulated {
            repo.insert_accumulated(accumulated);
        }
        repo
    }

    /// Adds or replaces a payroll definition.
    pub fn insert_definition(&mut self, definition: PayrollDefinition) {
        self.store.definitions.insert(definition.id.clone(), definition);
    }

    /// Adds or replaces a loan.
    pub fn insert_loan(&mut self, loan: Loan) {
        self.store.loans.insert(loan.id.clone(), loan);
    }

    /// Records a novelty.
    pub fn insert_novelty(&mut self, novelty: Novelty) {
        self.store.novelties.push(novelty);
    }

    /// Records an exchange rate.
    pub fn insert_exchange_rate(&mut self, rate: ExchangeRate) {
        self.store.exchange_rates.push(rate);
    }

    /// Adds a calculation rule.
    pub fn insert_rule(&mut self, rule: CalculationRule) {
        self.store.rules.push(rule);
    }

    /// Adds or replaces an accumulator.
    pub fn insert_accumulated(&mut self, accumulated: AccumulatedAnnual) {
        let key = (
            accumulated.employee_id.clone(),
            accumulated.payroll_type_id.clone(),
            accumulated.company_id.clone(),
            accumulated.fiscal_year_start,
        );
        self.store.accumulated.insert(key, accumulated);
    }

    /// Replaces the vacation ledger.
    pub fn set_vacation_ledger(&mut self, ledger: InMemoryVacationLedger) {
        self.store.vacation = ledger;
    }

    /// Accumulators of an employee, in no particular order.
    pub fn accumulated_for(&self, employee_id: &str) -> Vec<&AccumulatedAnnual> {
        self.store
            .accumulated
            .values()
            .filter(|a| a.employee_id == employee_id)
            .collect()
    }

    /// Every payment ledger entry.
    pub fn loan_payments(&self) -> &[LoanPayment] {
        &self.store.payments
    }

    /// Every interest ledger entry.
    pub fn interest_accruals(&self) -> &[InterestAccrual] {
        &self.store.accruals
    }

    /// Depth of open savepoints.
    pub fn savepoint_depth(&self) -> usize {
        self.savepoints.len()
    }

    fn check_savepoint(&self, savepoint: Savepoint) -> EngineResult<()> {
        if savepoint.0 >= self.savepoints.len() {
            return Err(EngineError::transient(format!(
                "savepoint {} is no longer open",
                savepoint.0
            )));
        }
        Ok(())
    }
}

impl PayrollRepository for InMemoryRepository {
    fn get_payroll_definition(&self, id: &str) -> EngineResult<PayrollDefinition> {
        self.store
            .definitions
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("Payroll definition", id))
    }

    fn get_calculation_config(&self, company_id: &str) -> CalculationConfig {
        self.settings.for_company(company_id).clone()
    }

    fn get_or_create_accumulated_annual(
        &mut self,
        employee_id: &str,
        payroll_type_id: &str,
        company_id: &str,
        fiscal_year_start: NaiveDate,
    ) -> EngineResult<AccumulatedAnnual> {
        let key = (
            employee_id.to_string(),
            payroll_type_id.to_string(),
            company_id.to_string(),
            fiscal_year_start,
        );
        let accumulated = self.store.accumulated.entry(key).or_insert_with(|| {
            debug!(employee_id, %fiscal_year_start, "creating accumulator");
            AccumulatedAnnual::new(employee_id, payroll_type_id, company_id, fiscal_year_start)
        });
        Ok(accumulated.clone())
    }

    fn save_accumulated_annual(&mut self, accumulated: AccumulatedAnnual) -> EngineResult<()> {
        self.insert_accumulated(accumulated);
        Ok(())
    }

    fn get_exchange_rate(&self, from: &str, to: &str, as_of: NaiveDate) -> EngineResult<Option<Decimal>> {
        if from == to {
            return Ok(Some(Decimal::ONE));
        }
        Ok(self
            .store
            .exchange_rates
            .iter()
            .filter(|r| r.from_currency == from && r.to_currency == to && r.effective_date <= as_of)
            .max_by_key(|r| r.effective_date)
            .map(|r| r.rate))
    }

    fn get_active_loans(&self, employee_id: &str) -> EngineResult<Vec<Loan>> {
        let mut loans: Vec<Loan> = self
            .store
            .loans
            .values()
            .filter(|l| l.employee_id == employee_id && l.status.is_collectible() && l.balance > Decimal::ZERO)
            .cloned()
            .collect();
        loans.sort_by_key(|l| l.priority);
        Ok(loans)
    }

    fn get_loan(&self, id: &str) -> EngineResult<Loan> {
        self.store
            .loans
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("Loan", id))
    }

    fn save_loan(&mut self, loan: Loan) -> EngineResult<()> {
        self.insert_loan(loan);
        Ok(())
    }

    fn record_loan_payment(&mut self, payment: LoanPayment) -> EngineResult<()> {
        self.store.payments.push(payment);
        Ok(())
    }

    fn record_interest_accrual(&mut self, accrual: InterestAccrual) -> EngineResult<()> {
        self.store.accruals.push(accrual);
        Ok(())
    }

    fn loan_payments_for_run(&self, run_id: Uuid) -> EngineResult<Vec<LoanPayment>> {
        Ok(self
            .store
            .payments
            .iter()
            .filter(|p| p.run_id == run_id)
            .cloned()
            .collect())
    }

    fn get_novelties(&self, employee_id: &str, start: NaiveDate, end: NaiveDate) -> EngineResult<Vec<Novelty>> {
        Ok(self
            .store
            .novelties
            .iter()
            .filter(|n| n.employee_id == employee_id && n.date >= start && n.date <= end)
            .cloned()
            .collect())
    }

    fn get_rules(&self) -> EngineResult<Vec<CalculationRule>> {
        Ok(self.store.rules.clone())
    }

    fn save_run(&mut self, run: &PayrollRun) -> EngineResult<()> {
        self.runs.insert(run.id, run.clone());
        Ok(())
    }

    fn get_run(&self, id: Uuid) -> EngineResult<PayrollRun> {
        self.runs
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("Payroll run", id))
    }

    fn list_runs(&self, definition_id: &str) -> EngineResult<Vec<PayrollRun>> {
        let mut runs: Vec<PayrollRun> = self
            .runs
            .values()
            .filter(|r| r.definition_id == definition_id)
            .cloned()
            .collect();
        runs.sort_by_key(|r| r.created_at);
        Ok(runs)
    }

    fn delete_run_data(&mut self, run_id: Uuid) -> EngineResult<()> {
        self.store.payments.retain(|p| p.run_id != run_id);
        self.store.accruals.retain(|a| a.run_id != run_id);
        Ok(())
    }

    fn vacation_ledger(&mut self) -> &mut dyn VacationLedger {
        &mut self.store.vacation
    }

    fn savepoint(&mut self) -> EngineResult<Savepoint> {
        self.savepoints.push(self.store.clone());
        Ok(Savepoint(self.savepoints.len() - 1))
    }

    fn release(&mut self, savepoint: Savepoint) -> EngineResult<()> {
        self.check_savepoint(savepoint)?;
        self.savepoints.truncate(savepoint.0);
        Ok(())
    }

    fn rollback_to(&mut self, savepoint: Savepoint) -> EngineResult<()> {
        self.check_savepoint(savepoint)?;
        if let Some(store) = self.savepoints.drain(savepoint.0..).next() {
            self.store = store;
        }
        Ok(())
    }
}
