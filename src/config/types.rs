//! Configuration types for payroll calculation.
//!
//! This module contains the strongly-typed configuration structures that
//! are deserialized from YAML configuration files.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculation::{VacationPolicy, round_money};
use crate::models::{
    AccumulatedAnnual, CalculationRule, ExchangeRate, Loan, Novelty, PayrollDefinition,
};

/// Jurisdiction-dependent calculation constants.
///
/// Missing fields take their defaults, so a company override only needs to
/// list what differs.
///
/// # Example
///
/// ```
/// use payroll_engine::config::CalculationConfig;
/// use rust_decimal::Decimal;
///
/// let config = CalculationConfig::default();
/// assert_eq!(config.days_per_month, 30);
/// assert_eq!(config.daily_rate(Decimal::from(30000)), Decimal::from(1000));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculationConfig {
    /// Days used to derive a daily rate from a monthly salary.
    pub days_per_month: u32,
    /// Hours used to derive an hourly rate from a daily rate.
    pub hours_per_day: u32,
    /// Days in the interest year.
    pub days_per_year: u32,
    /// Months in the amortization year.
    pub months_per_year: u32,
    /// Nominal days in a biweekly period.
    pub biweekly_days: u32,
    /// Warn when an employee's net pay is clamped to zero.
    pub net_zero_warning: bool,
    /// Employees processed between progress flushes.
    pub progress_flush_interval: usize,
    /// Longest accepted pay period in days.
    pub max_period_days: i64,
}

impl Default for CalculationConfig {
    fn default() -> Self {
        Self {
            days_per_month: 30,
            hours_per_day: 8,
            days_per_year: 365,
            months_per_year: 12,
            biweekly_days: 15,
            net_zero_warning: true,
            progress_flush_interval: 10,
            max_period_days: 366,
        }
    }
}

impl CalculationConfig {
    /// Monthly salary divided by `days_per_month`, rounded.
    pub fn daily_rate(&self, monthly_salary: Decimal) -> Decimal {
        if self.days_per_month == 0 {
            return Decimal::ZERO;
        }
        round_money(monthly_salary / Decimal::from(self.days_per_month))
    }

    /// Daily rate divided by `hours_per_day`, rounded.
    pub fn hourly_rate(&self, monthly_salary: Decimal) -> Decimal {
        if self.hours_per_day == 0 {
            return Decimal::ZERO;
        }
        round_money(self.daily_rate(monthly_salary) / Decimal::from(self.hours_per_day))
    }
}

/// Contents of `calculation.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CalculationSettings {
    /// Global defaults.
    #[serde(default)]
    pub defaults: CalculationConfig,
    /// Per-company overrides keyed by company id.
    #[serde(default)]
    pub companies: HashMap<String, CalculationConfig>,
}

impl CalculationSettings {
    /// Configuration for a company, falling back to the global defaults.
    pub fn for_company(&self, company_id: &str) -> &CalculationConfig {
        self.companies.get(company_id).unwrap_or(&self.defaults)
    }
}

/// Contents of `seed.yaml`: reference data for the in-memory repository.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedData {
    /// Payroll definitions with their employees and concepts.
    pub payroll_definitions: Vec<PayrollDefinition>,
    /// Calculation rules.
    pub rules: Vec<CalculationRule>,
    /// Loans and advances.
    pub loans: Vec<Loan>,
    /// Period novelties.
    pub novelties: Vec<Novelty>,
    /// Exchange rates.
    pub exchange_rates: Vec<ExchangeRate>,
    /// Pre-existing accumulators.
    pub accumulated: Vec<AccumulatedAnnual>,
    /// Vacation accrual policies.
    pub vacation_policies: Vec<VacationPolicy>,
}
