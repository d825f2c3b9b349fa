//! Vacation accrual and consumption triggers.
//!
//! The ledger itself sits behind [`VacationLedger`]; the payroll run only
//! asks it to accrue entitlement for the period and to consume the days
//! taken. Ledger failures never block salary payment and are reported as
//! warnings instead.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{WarningCollector, round_to};
use crate::error::{EngineError, EngineResult};
use crate::models::{Employee, Novelty, PayPeriod};

/// Accrual terms for a group of employees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VacationPolicy {
    /// Policy identifier referenced by employees.
    pub id: String,
    /// Vacation days earned per full year of service.
    pub annual_days: Decimal,
    /// Upper bound on the balance, if any.
    #[serde(default)]
    pub max_balance: Option<Decimal>,
}

/// Something that keeps vacation balances.
pub trait VacationLedger {
    /// Credits the entitlement earned over `period`, returning the days credited.
    fn accrue(&mut self, employee: &Employee, period: &PayPeriod) -> EngineResult<Decimal>;

    /// Debits `days` of taken vacation, returning the remaining balance.
    fn consume(&mut self, employee: &Employee, days: Decimal) -> EngineResult<Decimal>;

    /// The employee's current balance in days.
    fn balance(&self, employee_id: &str) -> Decimal;
}

/// A ledger held in memory, keyed by employee id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InMemoryVacationLedger {
    policies: HashMap<String, VacationPolicy>,
    balances: HashMap<String, Decimal>,
    days_per_year: u32,
}

impl InMemoryVacationLedger {
    /// Creates a ledger for the given policies.
    pub fn new(policies: impl IntoIterator<Item = VacationPolicy>, days_per_year: u32) -> Self {
        Self {
            policies: policies.into_iter().map(|p| (p.id.clone(), p)).collect(),
            balances: HashMap::new(),
            days_per_year,
        }
    }

    /// Sets an opening balance.
    pub fn set_balance(&mut self, employee_id: impl Into<String>, days: Decimal) {
        self.balances.insert(employee_id.into(), days);
    }
}

impl VacationLedger for InMemoryVacationLedger {
    fn accrue(&mut self, employee: &Employee, period: &PayPeriod) -> EngineResult<Decimal> {
        let Some(policy_id) = &employee.vacation_policy else {
            return Ok(Decimal::ZERO);
        };
        let policy = self
            .policies
            .get(policy_id)
            .ok_or_else(|| EngineError::not_found("Vacation policy", policy_id))?;
        if self.days_per_year == 0 {
            return Err(EngineError::calculation("days_per_year must be positive"));
        }

        let earned = round_to(
            policy.annual_days * Decimal::from(period.days()) / Decimal::from(self.days_per_year),
            4,
        );
        let balance = self.balances.entry(employee.id.clone()).or_default();
        let mut next = *balance + earned;
        if let Some(max) = policy.max_balance {
            next = next.min(max);
        }
        let credited = next - *balance;
        *balance = next;
        Ok(credited)
    }

    fn consume(&mut self, employee: &Employee, days: Decimal) -> EngineResult<Decimal> {
        let balance = self.balances.entry(employee.id.clone()).or_default();
        if days > *balance {
            return Err(EngineError::validation(format!(
                "vacation balance {} is less than {} days taken",
                balance, days
            )));
        }
        *balance -= days;
        Ok(*balance)
    }

    fn balance(&self, employee_id: &str) -> Decimal {
        self.balances.get(employee_id).copied().unwrap_or_default()
    }
}

/// Days of vacation recorded in a set of novelties.
pub fn vacation_days_taken(novelties: &[Novelty]) -> Decimal {
    novelties
        .iter()
        .filter(|n| n.is_vacation)
        .map(|n| n.quantity)
        .sum()
}

/// What the ledger did for one employee-period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VacationSummary {
    /// Days credited.
    pub accrued: Decimal,
    /// Days debited.
    pub consumed: Decimal,
}

/// Accrues entitlement and consumes taken days, downgrading failures to warnings.
pub fn process_vacation(
    ledger: &mut dyn VacationLedger,
    employee: &Employee,
    period: &PayPeriod,
    days_taken: Decimal,
    warnings: &mut WarningCollector,
) -> VacationSummary {
    let mut summary = VacationSummary::default();
    match ledger.accrue(employee, period) {
        Ok(days) => summary.accrued = days,
        Err(e) => warnings.push(format!("vacation accrual failed: {}", e)),
    }
    if days_taken > Decimal::ZERO {
        match ledger.consume(employee, days_taken) {
            Ok(_) => summary.consumed = days_taken,
            Err(e) => warnings.push(format!("vacation consumption failed: {}", e)),
        }
    }
    summary
}
