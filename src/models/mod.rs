//! Core data models for the payroll engine.
//!
//! This module contains all the domain models used throughout the engine.

mod accumulated;
mod concept;
mod employee;
mod employee_calculation;
mod line_item;
mod loan;
mod pay_period;
mod payroll_definition;
mod payroll_run;
mod reference;

pub use accumulated::{AccumulatedAnnual, PeriodContribution};
pub use concept::{CalculationRule, Concept, ConceptKind, ConceptStatus, FormulaStrategy};
pub use employee::{ConceptOverride, Employee, OpeningBalances};
pub use employee_calculation::{EmployeeCalculation, YearToDate, variable_name};
pub use line_item::{LineItem, LineKind, TaxTreatment};
pub use loan::{
    AmortizationMethod, InterestAccrual, InterestType, Loan, LoanKind, LoanPayment, LoanStatus,
};
pub use pay_period::{MAX_PERIOD_DAYS, PayPeriod};
pub use payroll_definition::{ConceptAssignment, PayrollDefinition, PayrollType, Periodicity};
pub use payroll_run::{
    EmployeeError, EmployeeResult, LogEntry, LogLevel, PayrollRun, RunSnapshot, RunStatus,
    RunTotals, StatusChange,
};
pub use reference::{ExchangeRate, Novelty};
