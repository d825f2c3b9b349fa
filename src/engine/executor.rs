//! Payroll run execution.
//!
//! A run moves through three phases:
//!
//! 1. **Prepare**: load the definition, check it can run for the period and
//!    freeze a snapshot of the configuration, exchange rates and rules.
//! 2. **Process**: calculate employees one at a time, each inside its own
//!    savepoint. An employee failure rolls back only that employee. A
//!    recoverable failure (infrastructure) rolls back the whole batch.
//! 3. **Finish**: recompute totals and move to `Generated`,
//!    `GeneratedWithErrors` or `Error`.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::repository::{PayrollRepository, novelty_quantities};
use super::validation::precheck;
use crate::calculation::{
    ConceptCalculator, EmploymentWindow, InstallmentPlan, WarningCollector, accumulate,
    apply_benefits, apply_deductions, apply_perceptions, fiscal_year_start, period_salary,
    process_vacation, round_money, seed_opening_balances, vacation_days_taken,
};
use crate::config::CalculationConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    CalculationRule, Employee, EmployeeCalculation, EmployeeError, EmployeeResult, FormulaStrategy,
    LogEntry, LogLevel, PayPeriod, PayrollDefinition, PayrollRun, RunSnapshot, RunStatus,
};

/// Number of log entries carried by a progress update.
const LOG_TAIL: usize = 5;

/// Parameters of a payroll execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// The payroll definition to execute.
    pub definition_id: String,
    /// First day of the period.
    pub period_start: NaiveDate,
    /// Last day of the period.
    pub period_end: NaiveDate,
    /// Calculation date; defaults to the period end.
    #[serde(default)]
    pub calculation_date: Option<NaiveDate>,
    /// Who requested the run.
    #[serde(default)]
    pub user: Option<String>,
}

/// What an execution produced.
///
/// No run with errors means the run was rejected before anything was
/// written. A run with errors completed with per-employee failures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionOutcome {
    /// The persisted run, if validation passed.
    pub run: Option<PayrollRun>,
    /// Run-level or per-employee errors.
    pub errors: Vec<String>,
    /// Non-blocking warnings.
    pub warnings: Vec<String>,
}

/// Progress of a run being processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Employees handled so far.
    pub processed: usize,
    /// Employees in the run.
    pub total: usize,
    /// Employees that failed so far.
    pub errors: usize,
    /// The employee handled last.
    pub current_employee: Option<String>,
    /// The most recent log entries.
    pub log_tail: Vec<LogEntry>,
}

impl ProgressUpdate {
    fn from_run(run: &PayrollRun, processed: usize, total: usize, current: Option<&str>) -> Self {
        let tail_start = run.log.len().saturating_sub(LOG_TAIL);
        Self {
            processed,
            total,
            errors: run.errors.len(),
            current_employee: current.map(str::to_string),
            log_tail: run.log[tail_start..].to_vec(),
        }
    }
}

/// Executes payroll runs against a repository.
pub struct PayrollEngine<'r> {
    pub(crate) repo: &'r mut dyn PayrollRepository,
}

impl<'r> PayrollEngine<'r> {
    /// Creates an engine writing through `repo`.
    pub fn new(repo: &'r mut dyn PayrollRepository) -> Self {
        Self { repo }
    }

    /// Prepares and processes a run synchronously.
    pub fn execute(&mut self, request: &ExecutionRequest) -> ExecutionOutcome {
        let (mut run, definition) = match self.prepare(request) {
            Ok(prepared) => prepared,
            Err(errors) => {
                return ExecutionOutcome {
                    run: None,
                    errors: errors.iter().map(ToString::to_string).collect(),
                    warnings: Vec::new(),
                };
            }
        };

        let batch_error = self.process(&mut run, &definition, &mut |_| {}).err();
        let mut errors: Vec<String> = run
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.employee_id, e.message))
            .collect();
        if let Some(err) = batch_error {
            errors.push(err.to_string());
        }
        ExecutionOutcome {
            warnings: run.warnings.clone(),
            errors,
            run: Some(run),
        }
    }

    /// Validates the request and persists a new run in `Calculating`.
    ///
    /// Nothing is written when an error is returned.
    pub fn prepare(
        &mut self,
        request: &ExecutionRequest,
    ) -> Result<(PayrollRun, PayrollDefinition), Vec<EngineError>> {
        let definition = self
            .repo
            .get_payroll_definition(&request.definition_id)
            .map_err(|e| vec![e])?;
        let period = PayPeriod::new(request.period_start, request.period_end).map_err(|e| vec![e])?;
        let existing = self.repo.list_runs(&definition.id).map_err(|e| vec![e])?;
        precheck(&definition, &period, &existing)?;

        let config = self.repo.get_calculation_config(&definition.company_id);
        if period.days() > config.max_period_days {
            return Err(vec![EngineError::validation(format!(
                "period spans {} days, more than the {} allowed",
                period.days(),
                config.max_period_days
            ))]);
        }

        let calculation_date = request.calculation_date.unwrap_or(period.end_date);
        let mut run = PayrollRun::new(&definition.id, period, calculation_date, request.user.clone());
        run.snapshot = self
            .build_snapshot(&definition, &config, &period, calculation_date)
            .map_err(|e| vec![e])?;
        run.log(
            LogLevel::Info,
            None,
            format!(
                "run created for {} to {} with {} employees",
                period.start_date,
                period.end_date,
                definition.employees.len()
            ),
        );
        self.repo.save_run(&run).map_err(|e| vec![e])?;

        info!(
            run_id = %run.id,
            definition_id = %definition.id,
            employees = definition.employees.len(),
            "payroll run created"
        );
        Ok((run, definition))
    }

    /// Processes every employee of a run and finishes it.
    ///
    /// `progress` is called every `progress_flush_interval` employees and
    /// once at the end. On a batch-level failure all writes of the run are
    /// rolled back, the run is marked `Error` and the error is returned.
    pub fn process(
        &mut self,
        run: &mut PayrollRun,
        definition: &PayrollDefinition,
        progress: &mut dyn FnMut(&ProgressUpdate),
    ) -> EngineResult<()> {
        let config = self.repo.get_calculation_config(&definition.company_id);
        let result = self.process_batch(run, definition, &config, progress);

        match result {
            Ok(()) => {
                run.recompute_totals();
                let next = if run.errors.is_empty() {
                    RunStatus::Generated
                } else {
                    RunStatus::GeneratedWithErrors
                };
                let user = run.created_by.clone();
                run.transition(next, user.as_deref(), None)?;
                run.log(
                    LogLevel::Info,
                    None,
                    format!(
                        "run finished: {} processed, {} failed, net {}",
                        run.results.len(),
                        run.errors.len(),
                        run.totals.net
                    ),
                );
                info!(
                    run_id = %run.id,
                    status = %run.status,
                    gross = %run.totals.gross,
                    net = %run.totals.net,
                    failed = run.errors.len(),
                    "payroll run finished"
                );
                self.repo.save_run(run)?;
                Ok(())
            }
            Err(err) => {
                error!(run_id = %run.id, error = %err, "payroll run failed; batch rolled back");
                run.reset_results();
                run.error_recoverable = Some(err.is_recoverable());
                run.log(LogLevel::Error, None, format!("run failed: {}", err));
                run.transition(RunStatus::Error, None, Some(&err.to_string()))?;
                self.repo.save_run(run)?;
                Err(err)
            }
        }
    }

    fn process_batch(
        &mut self,
        run: &mut PayrollRun,
        definition: &PayrollDefinition,
        config: &CalculationConfig,
        progress: &mut dyn FnMut(&ProgressUpdate),
    ) -> EngineResult<()> {
        let batch = self.repo.savepoint()?;
        match self.process_employees(run, definition, config, progress) {
            Ok(()) => self.repo.release(batch),
            Err(err) => {
                if let Err(rollback) = self.repo.rollback_to(batch) {
                    error!(run_id = %run.id, error = %rollback, "batch rollback failed");
                }
                Err(err)
            }
        }
    }

    fn process_employees(
        &mut self,
        run: &mut PayrollRun,
        definition: &PayrollDefinition,
        config: &CalculationConfig,
        progress: &mut dyn FnMut(&ProgressUpdate),
    ) -> EngineResult<()> {
        let live_rules = self.repo.get_rules()?;
        let total = definition.employees.len();
        let flush_every = config.progress_flush_interval.max(1);
        let mut warnings = WarningCollector::new();

        for (index, employee) in definition.employees.iter().enumerate() {
            warnings.set_employee(Some(&employee.id));
            let mark = warnings.len();
            let scope = self.repo.savepoint()?;

            let outcome = self.process_employee(run, definition, employee, config, &live_rules, &mut warnings);
            for warning in warnings.since(mark) {
                run.log(LogLevel::Warning, Some(&employee.id), warning.message.clone());
            }

            match outcome {
                Ok(Some(result)) => {
                    self.repo.release(scope)?;
                    run.log(
                        LogLevel::Success,
                        Some(&employee.id),
                        format!("gross {} net {}", result.gross_salary, result.net_pay),
                    );
                    run.results.push(result);
                }
                Ok(None) => {
                    self.repo.release(scope)?;
                    run.log(
                        LogLevel::Info,
                        Some(&employee.id),
                        "not active during the period; skipped",
                    );
                }
                Err(err) if err.is_recoverable() => {
                    self.repo.rollback_to(scope)?;
                    return Err(err);
                }
                Err(err) => {
                    self.repo.rollback_to(scope)?;
                    warnings.truncate(mark);
                    warn!(run_id = %run.id, employee_id = %employee.id, error = %err, "employee failed");
                    run.log(LogLevel::Error, Some(&employee.id), err.to_string());
                    run.errors.push(EmployeeError {
                        employee_id: employee.id.clone(),
                        message: err.to_string(),
                    });
                }
            }

            let processed = index + 1;
            if processed % flush_every == 0 || processed == total {
                progress(&ProgressUpdate::from_run(run, processed, total, Some(&employee.id)));
            }
        }

        run.warnings = warnings.entries().iter().map(ToString::to_string).collect();
        Ok(())
    }

    /// Calculates one employee. `Ok(None)` means the employee was skipped.
    fn process_employee(
        &mut self,
        run: &PayrollRun,
        definition: &PayrollDefinition,
        employee: &Employee,
        config: &CalculationConfig,
        live_rules: &[CalculationRule],
        warnings: &mut WarningCollector,
    ) -> EngineResult<Option<EmployeeResult>> {
        let period = run.period;
        if !employee.active || !employee.is_employed_during(period.start_date, period.end_date) {
            return Ok(None);
        }
        if employee.base_salary <= Decimal::ZERO {
            return Err(EngineError::validation(format!(
                "base salary {} must be positive",
                employee.base_salary
            )));
        }
        let payroll_type = definition
            .payroll_type
            .as_ref()
            .ok_or_else(|| EngineError::validation("payroll definition has no payroll type"))?;
        let currency = definition.currency.as_deref().unwrap_or(&employee.currency);

        let mut calc = EmployeeCalculation::new(employee, period);
        calc.exchange_rate = snapshot_rate(&run.snapshot, &employee.currency, currency)?;
        calc.monthly_salary = round_money(employee.base_salary * calc.exchange_rate);
        calc.periods_per_year = payroll_type.periods_per_year();

        let salary = period_salary(
            calc.monthly_salary,
            payroll_type.periodicity,
            period.start_date,
            period.end_date,
            EmploymentWindow {
                hire_date: Some(employee.hire_date),
                termination_date: employee.termination_date,
            },
            config,
        )?;
        calc.period_salary = salary.amount;
        calc.days_worked = salary.worked_days;

        let novelties = self
            .repo
            .get_novelties(&employee.id, period.start_date, period.end_date)?;
        calc.novelties = novelty_quantities(&novelties);

        let fiscal_start = fiscal_year_start(Some(payroll_type), run.calculation_date);
        let mut accumulated = self.repo.get_or_create_accumulated_annual(
            &employee.id,
            &payroll_type.id,
            &definition.company_id,
            fiscal_start,
        )?;
        if seed_opening_balances(&mut accumulated, employee, period.start_date, calc.periods_per_year) {
            debug!(
                employee_id = %employee.id,
                %fiscal_start,
                periods = accumulated.opening_periods,
                "accumulator seeded from opening balances"
            );
        }
        calc.year_to_date = accumulated.year_to_date(period.end_date);

        let calculator = ConceptCalculator::new(config, &run.snapshot, live_rules, period.end_date);
        apply_perceptions(&mut calc, employee, definition.perceptions(), &calculator, warnings);
        let loans = self.repo.get_active_loans(&employee.id)?;
        let mut installments =
            InstallmentPlan::new(&loans, definition, run.id, run.calculation_date, config);
        apply_deductions(
            &mut calc,
            employee,
            definition.deductions(),
            &mut installments,
            &calculator,
            warnings,
        );
        let outcome = installments.into_outcome();
        for accrual in outcome.accruals {
            self.repo.record_interest_accrual(accrual)?;
        }
        for payment in outcome.payments {
            self.repo.record_loan_payment(payment)?;
        }
        for loan in outcome.updated {
            self.repo.save_loan(loan)?;
        }

        apply_benefits(&mut calc, employee, definition.benefits(), &calculator, warnings);

        let raw_net = calc.raw_net_pay();
        if raw_net < Decimal::ZERO {
            warnings.push(format!(
                "deductions exceed gross salary by {}; net pay clamped to zero",
                -raw_net
            ));
        } else if raw_net == Decimal::ZERO && config.net_zero_warning {
            warnings.push("net pay is zero");
        }

        accumulate(&mut accumulated, &calc);
        self.repo.save_accumulated_annual(accumulated)?;

        process_vacation(
            self.repo.vacation_ledger(),
            employee,
            &period,
            vacation_days_taken(&novelties),
            warnings,
        );

        debug!(
            employee_id = %employee.id,
            gross = %calc.gross_salary(),
            deductions = %calc.total_deductions(),
            net = %calc.net_pay(),
            "employee calculated"
        );
        Ok(Some(EmployeeResult::from(&calc)))
    }

    fn build_snapshot(
        &self,
        definition: &PayrollDefinition,
        config: &CalculationConfig,
        period: &PayPeriod,
        calculation_date: NaiveDate,
    ) -> EngineResult<RunSnapshot> {
        let config_value = serde_json::to_value(config)
            .map_err(|e| EngineError::calculation(format!("cannot snapshot configuration: {}", e)))?;

        let mut exchange_rates = BTreeMap::new();
        if let Some(currency) = definition.currency.as_deref() {
            let foreign: BTreeSet<&str> = definition
                .employees
                .iter()
                .map(|e| e.currency.as_str())
                .filter(|c| *c != currency)
                .collect();
            for from in foreign {
                if let Some(rate) = self.repo.get_exchange_rate(from, currency, calculation_date)? {
                    exchange_rates.insert(RunSnapshot::rate_key(from, currency), rate);
                }
            }
        }

        let concepts: Vec<_> = definition.concepts.iter().map(|a| a.concept.clone()).collect();
        let concept_codes: BTreeSet<&str> = concepts.iter().map(|c| c.code.as_str()).collect();
        let rule_codes: BTreeSet<&str> = concepts
            .iter()
            .filter_map(|c| match &c.formula {
                FormulaStrategy::Rule { rule_code } => rule_code.as_deref(),
                _ => None,
            })
            .collect();
        let rules = self
            .repo
            .get_rules()?
            .into_iter()
            .filter(|r| r.active && r.is_effective_on(period.end_date))
            .filter(|r| {
                rule_codes.contains(r.code.as_str())
                    || r.concept_codes.iter().any(|c| concept_codes.contains(c.as_str()))
            })
            .collect();

        Ok(RunSnapshot {
            config: config_value,
            exchange_rates,
            concepts,
            rules,
        })
    }
}

/// The rate converting `from` into `to` frozen in the snapshot.
fn snapshot_rate(snapshot: &RunSnapshot, from: &str, to: &str) -> EngineResult<Decimal> {
    if from == to {
        return Ok(Decimal::ONE);
    }
    snapshot
        .exchange_rates
        .get(&RunSnapshot::rate_key(from, to))
        .copied()
        .ok_or_else(|| EngineError::calculation(format!("no exchange rate from {} to {}", from, to)))
}
