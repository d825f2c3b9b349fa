//! Payroll runs (nominas), their results and audit trail.
//!
//! A [`PayrollRun`] is one execution of a payroll definition over a period.
//! It carries per-employee results, aggregate totals, the processing log
//! shown to operators, and a frozen snapshot of the inputs it was computed
//! from.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CalculationRule, Concept, EmployeeCalculation, LineItem, PayPeriod};
use crate::error::{EngineError, EngineResult};

/// State of a payroll run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Employees are being processed.
    Calculating,
    /// All employees processed successfully.
    Generated,
    /// Some employees failed; the rest have results.
    GeneratedWithErrors,
    /// Approved for application.
    Approved,
    /// Applied to loans and accumulators of record.
    Applied,
    /// Paid out.
    Paid,
    /// Voided after application.
    Cancelled,
    /// The batch failed and was rolled back.
    Error,
}

impl RunStatus {
    /// Returns true when `self → next` is allowed.
    ///
    /// # Example
    ///
    /// ```
    /// use payroll_engine::models::RunStatus;
    ///
    /// assert!(RunStatus::Error.can_transition_to(RunStatus::Calculating));
    /// assert!(!RunStatus::Paid.can_transition_to(RunStatus::Calculating));
    /// ```
    pub fn can_transition_to(self, next: RunStatus) -> bool {
        use RunStatus::*;
        matches!(
            (self, next),
            (Calculating, Generated)
                | (Calculating, GeneratedWithErrors)
                | (Calculating, Error)
                | (Generated, Approved)
                | (GeneratedWithErrors, Approved)
                | (Approved, Applied)
                | (Applied, Paid)
                | (Applied, Cancelled)
                | (Error, Calculating)
        )
    }

    /// Returns true when a run in this state keeps its period reserved.
    pub fn reserves_period(self) -> bool {
        self != RunStatus::Cancelled
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Calculating => "calculating",
            Self::Generated => "generated",
            Self::GeneratedWithErrors => "generated_with_errors",
            Self::Approved => "approved",
            Self::Applied => "applied",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Severity of a processing log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Informational.
    Info,
    /// Employee processed successfully.
    Success,
    /// Non-blocking issue.
    Warning,
    /// Failure.
    Error,
}

/// One entry of the operator-visible processing log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the entry was written.
    pub timestamp: DateTime<Utc>,
    /// The employee concerned, if any.
    pub employee_id: Option<String>,
    /// Severity.
    pub level: LogLevel,
    /// Message.
    pub message: String,
}

/// An employee that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeError {
    /// The employee.
    pub employee_id: String,
    /// Why processing failed.
    pub message: String,
}

/// A recorded state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// Previous status.
    pub from: RunStatus,
    /// New status.
    pub to: RunStatus,
    /// When it happened.
    pub at: DateTime<Utc>,
    /// Who triggered it.
    pub user: Option<String>,
    /// Free-text reason, e.g. for cancellation.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Persisted result for one employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeResult {
    /// The employee.
    pub employee_id: String,
    /// The employee's code.
    pub employee_code: String,
    /// The employee's display name.
    pub employee_name: String,
    /// Monthly salary in the payroll currency.
    pub monthly_salary: Decimal,
    /// Salary prorated to the period.
    pub period_salary: Decimal,
    /// Exchange rate applied to the base salary.
    pub exchange_rate: Decimal,
    /// Days worked in the period.
    pub days_worked: i64,
    /// Perception lines.
    pub perceptions: Vec<LineItem>,
    /// Deduction lines, ascending by priority.
    pub deductions: Vec<LineItem>,
    /// Benefit lines.
    pub benefits: Vec<LineItem>,
    /// Period salary plus perceptions.
    pub gross_salary: Decimal,
    /// Taxable income.
    pub taxable_income: Decimal,
    /// Sum of perceptions.
    pub total_perceptions: Decimal,
    /// Sum of deductions.
    pub total_deductions: Decimal,
    /// Sum of benefits.
    pub total_benefits: Decimal,
    /// Net pay, never negative.
    pub net_pay: Decimal,
}

impl From<&EmployeeCalculation> for EmployeeResult {
    fn from(calc: &EmployeeCalculation) -> Self {
        Self {
            employee_id: calc.employee_id.clone(),
            employee_code: calc.employee_code.clone(),
            employee_name: calc.employee_name.clone(),
            monthly_salary: calc.monthly_salary,
            period_salary: calc.period_salary,
            exchange_rate: calc.exchange_rate,
            days_worked: calc.days_worked,
            perceptions: calc.perceptions().to_vec(),
            deductions: calc.deductions().to_vec(),
            benefits: calc.benefits().to_vec(),
            gross_salary: calc.gross_salary(),
            taxable_income: calc.taxable_income(),
            total_perceptions: calc.total_perceptions(),
            total_deductions: calc.total_deductions(),
            total_benefits: calc.total_benefits(),
            net_pay: calc.net_pay(),
        }
    }
}

/// Aggregate totals across employee results.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunTotals {
    /// Sum of gross salaries.
    pub gross: Decimal,
    /// Sum of perceptions.
    pub perceptions: Decimal,
    /// Sum of deductions.
    pub deductions: Decimal,
    /// Sum of net pay.
    pub net: Decimal,
    /// Sum of employer benefits.
    pub benefits: Decimal,
    /// Gross plus benefits.
    pub employer_cost: Decimal,
    /// Employees with results.
    pub employee_count: usize,
}

impl RunTotals {
    /// Sums the given results.
    pub fn from_results(results: &[EmployeeResult]) -> Self {
        let mut totals = results.iter().fold(Self::default(), |mut t, r| {
            t.gross += r.gross_salary;
            t.perceptions += r.total_perceptions;
            t.deductions += r.total_deductions;
            t.net += r.net_pay;
            t.benefits += r.total_benefits;
            t
        });
        totals.employer_cost = totals.gross + totals.benefits;
        totals.employee_count = results.len();
        totals
    }
}

/// Inputs frozen at run creation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// The calculation configuration in effect.
    pub config: serde_json::Value,
    /// Exchange rates used, keyed `FROM->TO`.
    pub exchange_rates: BTreeMap<String, Decimal>,
    /// Concepts linked to the definition.
    pub concepts: Vec<Concept>,
    /// Calculation rules linked to those concepts.
    pub rules: Vec<CalculationRule>,
}

impl RunSnapshot {
    /// Key used for an exchange-rate pair.
    pub fn rate_key(from: &str, to: &str) -> String {
        format!("{}->{}", from, to)
    }

    /// Finds a frozen rule by code.
    pub fn rule(&self, code: &str) -> Option<&CalculationRule> {
        self.rules.iter().find(|r| r.code == code)
    }

    /// Finds the frozen rule linked to a concept.
    pub fn rule_for_concept(&self, concept_code: &str) -> Option<&CalculationRule> {
        self.rules
            .iter()
            .find(|r| r.concept_codes.iter().any(|c| c == concept_code))
    }
}

/// One execution of a payroll definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayrollRun {
    /// Unique identifier.
    pub id: Uuid,
    /// The executed definition.
    pub definition_id: String,
    /// The pay period.
    pub period: PayPeriod,
    /// The calculation date.
    pub calculation_date: NaiveDate,
    /// Current status.
    pub status: RunStatus,
    /// Aggregate totals over `results`.
    pub totals: RunTotals,
    /// Per-employee results.
    pub results: Vec<EmployeeResult>,
    /// Employees that failed.
    pub errors: Vec<EmployeeError>,
    /// Non-blocking warnings.
    pub warnings: Vec<String>,
    /// Processing log.
    pub log: Vec<LogEntry>,
    /// Frozen inputs.
    pub snapshot: RunSnapshot,
    /// Token of the batch job holding the run, if any.
    pub job_id: Option<Uuid>,
    /// For `Error` runs: whether the failure is transient.
    pub error_recoverable: Option<bool>,
    /// Audit trail of transitions.
    pub history: Vec<StatusChange>,
    /// Who created the run.
    pub created_by: Option<String>,
    /// When the run was created.
    pub created_at: DateTime<Utc>,
}

impl PayrollRun {
    /// Creates a run in `Calculating`.
    pub fn new(
        definition_id: impl Into<String>,
        period: PayPeriod,
        calculation_date: NaiveDate,
        user: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            definition_id: definition_id.into(),
            period,
            calculation_date,
            status: RunStatus::Calculating,
            totals: RunTotals::default(),
            results: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            log: Vec::new(),
            snapshot: RunSnapshot::default(),
            job_id: None,
            error_recoverable: None,
            history: Vec::new(),
            created_by: user,
            created_at: Utc::now(),
        }
    }

    /// Moves the run to `next`, recording the change.
    pub fn transition(
        &mut self,
        next: RunStatus,
        user: Option<&str>,
        reason: Option<&str>,
    ) -> EngineResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(EngineError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.history.push(StatusChange {
            from: self.status,
            to: next,
            at: Utc::now(),
            user: user.map(str::to_string),
            reason: reason.map(str::to_string),
        });
        self.status = next;
        Ok(())
    }

    /// Appends to the processing log.
    pub fn log(&mut self, level: LogLevel, employee_id: Option<&str>, message: impl Into<String>) {
        self.log.push(LogEntry {
            timestamp: Utc::now(),
            employee_id: employee_id.map(str::to_string),
            level,
            message: message.into(),
        });
    }

    /// Recomputes totals from the current results.
    pub fn recompute_totals(&mut self) {
        self.totals = RunTotals::from_results(&self.results);
    }

    /// Ids of employees that failed.
    pub fn failed_employee_ids(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.employee_id.as_str()).collect()
    }

    /// Clears results, errors and warnings ahead of reprocessing.
    pub fn reset_results(&mut self) {
        self.results.clear();
        self.errors.clear();
        self.warnings.clear();
        self.totals = RunTotals::default();
        self.error_recoverable = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn run() -> PayrollRun {
        let period = PayPeriod::new(
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
        )
        .unwrap();
        PayrollRun::new("PLN-1", period, period.end_date, Some("admin".to_string()))
    }

    fn result(gross: &str, deductions: &str, benefits: &str) -> EmployeeResult {
        let gross = dec(gross);
        let deductions = dec(deductions);
        EmployeeResult {
            employee_id: "emp".to_string(),
            employee_code: "E".to_string(),
            employee_name: "E".to_string(),
            monthly_salary: gross,
            period_salary: gross,
            exchange_rate: Decimal::ONE,
            days_worked: 31,
            perceptions: vec![],
            deductions: vec![],
            benefits: vec![],
            gross_salary: gross,
            taxable_income: gross,
            total_perceptions: Decimal::ZERO,
            total_deductions: deductions,
            total_benefits: dec(benefits),
            net_pay: gross - deductions,
        }
    }

    #[test]
    fn test_full_lifecycle() {
        let mut r = run();
        r.transition(RunStatus::Generated, Some("admin"), None).unwrap();
        r.transition(RunStatus::Approved, Some("admin"), None).unwrap();
        r.transition(RunStatus::Applied, Some("admin"), None).unwrap();
        r.transition(RunStatus::Cancelled, Some("admin"), Some("duplicated")).unwrap();
        assert_eq!(r.history.len(), 4);
        assert_eq!(r.history[3].reason.as_deref(), Some("duplicated"));
    }

    #[test]
    fn test_illegal_transition_is_rejected() {
        let mut r = run();
        let err = r.transition(RunStatus::Approved, None, None).unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidTransition {
                from: "calculating".to_string(),
                to: "approved".to_string()
            }
        );
        assert_eq!(r.status, RunStatus::Calculating);
        assert!(r.history.is_empty());
    }

    #[test]
    fn test_error_can_only_return_to_calculating() {
        assert!(RunStatus::Error.can_transition_to(RunStatus::Calculating));
        assert!(!RunStatus::Error.can_transition_to(RunStatus::Generated));
        assert!(!RunStatus::Generated.can_transition_to(RunStatus::Calculating));
    }

    #[test]
    fn test_totals_sum_results() {
        let results = vec![
            result("1000.00", "100.00", "50.00"),
            result("2000.00", "300.00", "0"),
        ];
        let totals = RunTotals::from_results(&results);
        assert_eq!(totals.gross, dec("3000.00"));
        assert_eq!(totals.deductions, dec("400.00"));
        assert_eq!(totals.net, dec("2600.00"));
        assert_eq!(totals.employer_cost, dec("3050.00"));
        assert_eq!(totals.employee_count, 2);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&RunStatus::GeneratedWithErrors).unwrap();
        assert_eq!(json, "\"generated_with_errors\"");
        assert_eq!(RunStatus::GeneratedWithErrors.to_string(), "generated_with_errors");
    }
}
