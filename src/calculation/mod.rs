//! Calculation logic for the payroll engine.
//!
//! This module contains the per-employee calculation steps: monetary
//! rounding, interest and amortization, period salary proration, concept
//! amount resolution, perception, deduction and benefit application, loan
//! and advance collection, accumulated-average income tax, year-to-date
//! accumulation and vacation ledger triggers.

mod accumulation;
mod benefits;
mod concept;
mod deductions;
mod interest;
mod loans;
mod perceptions;
mod rounding;
mod salary_period;
mod tax;
mod vacation;
mod warnings;

#[cfg(test)]
pub(crate) mod test_support;

pub use accumulation::{accumulate, fiscal_year_start, period_contribution, seed_opening_balances};
pub use benefits::apply_benefits;
pub use concept::{ConceptCalculator, Overrides};
pub use deductions::apply_deductions;
pub use interest::{
    Installment, accrue_interest, amortization_schedule, compound_interest, french_installment,
    next_installment, simple_interest,
};
pub use loans::{InstallmentPlan, LoanOutcome};
pub use perceptions::apply_perceptions;
pub use rounding::{BALANCE_TOLERANCE, MONEY_SCALE, percentage_of, round_money, round_to, safe_divide};
pub use salary_period::{EmploymentWindow, PeriodSalary, period_salary};
pub use tax::accumulated_average_withholding;
pub use vacation::{
    InMemoryVacationLedger, VacationLedger, VacationPolicy, VacationSummary, process_vacation,
    vacation_days_taken,
};
pub use warnings::{Warning, WarningCollector};
