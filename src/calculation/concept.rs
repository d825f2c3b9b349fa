//! Amount resolution for a single concept.
//!
//! Resolution order:
//! 1. An explicit amount override wins outright.
//! 2. A percentage override is applied to the period base salary.
//! 3. Otherwise the concept's [`FormulaStrategy`] decides.
//!
//! Formula and rule errors never propagate: they are recorded as warnings
//! and the concept contributes zero. Negative results are clamped to zero
//! with a warning.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use super::{WarningCollector, percentage_of, round_money};
use crate::config::CalculationConfig;
use crate::error::{EngineError, EngineResult};
use crate::formula::{FormulaEngine, FormulaSchema};
use crate::models::{
    CalculationRule, Concept, ConceptAssignment, Employee, EmployeeCalculation, FormulaStrategy,
    RunSnapshot,
};

/// Amount and percentage overrides for one concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Overrides {
    /// Amount that wins outright.
    pub amount: Option<Decimal>,
    /// Percentage of base salary.
    pub percentage: Option<Decimal>,
}

impl Overrides {
    /// Overrides for an employee's assignment.
    ///
    /// A per-employee override replaces the assignment-level one entirely.
    pub fn resolve(assignment: &ConceptAssignment, employee: &Employee) -> Self {
        match employee.override_for(&assignment.concept.code) {
            Some(o) => Self {
                amount: o.amount,
                percentage: o.percentage,
            },
            None => Self {
                amount: assignment.amount_override,
                percentage: assignment.percentage_override,
            },
        }
    }
}

/// Resolves concept amounts for employees of one run.
#[derive(Debug, Clone, Copy)]
pub struct ConceptCalculator<'a> {
    config: &'a CalculationConfig,
    snapshot: &'a RunSnapshot,
    live_rules: &'a [CalculationRule],
    on: NaiveDate,
}

impl<'a> ConceptCalculator<'a> {
    /// Creates a calculator.
    ///
    /// `snapshot` rules are preferred; `live_rules` are the fallback. Rules
    /// must be effective on `on` (the period end).
    pub fn new(
        config: &'a CalculationConfig,
        snapshot: &'a RunSnapshot,
        live_rules: &'a [CalculationRule],
        on: NaiveDate,
    ) -> Self {
        Self {
            config,
            snapshot,
            live_rules,
            on,
        }
    }

    /// The calculation configuration in use.
    pub fn config(&self) -> &CalculationConfig {
        self.config
    }

    /// The date concepts and rules must be effective on.
    pub fn effective_date(&self) -> NaiveDate {
        self.on
    }

    /// Returns true when an assignment should be calculated.
    ///
    /// Inactive links and concepts, and concepts outside their validity
    /// window, are skipped silently. Draft concepts are skipped with a warning.
    pub fn is_applicable(&self, assignment: &ConceptAssignment, warnings: &mut WarningCollector) -> bool {
        let concept = &assignment.concept;
        if !assignment.active || !concept.active || !concept.is_effective_on(self.on) {
            return false;
        }
        if !concept.is_usable() {
            warnings.push_concept(&concept.code, "concept is not approved; skipped");
            return false;
        }
        true
    }

    /// Computes a concept's amount for an employee, quantized to two decimals.
    pub fn amount(
        &self,
        calc: &EmployeeCalculation,
        concept: &Concept,
        overrides: Overrides,
        warnings: &mut WarningCollector,
    ) -> Decimal {
        let raw = match self.raw_amount(calc, concept, overrides) {
            Ok(value) => value,
            Err(err) => {
                warnings.push_concept(&concept.code, format!("{}; amount set to zero", err));
                return Decimal::ZERO;
            }
        };

        let amount = round_money(raw);
        if amount < Decimal::ZERO {
            warnings.push_concept(
                &concept.code,
                format!("negative amount {} clamped to zero", amount),
            );
            return Decimal::ZERO;
        }
        debug!(
            employee_id = %calc.employee_id,
            concept = %concept.code,
            amount = %amount,
            "concept calculated"
        );
        amount
    }

    fn raw_amount(
        &self,
        calc: &EmployeeCalculation,
        concept: &Concept,
        overrides: Overrides,
    ) -> EngineResult<Decimal> {
        if let Some(amount) = overrides.amount {
            return Ok(amount);
        }
        if let Some(percentage) = overrides.percentage {
            return Ok(percentage_of(calc.period_salary, percentage));
        }

        match &concept.formula {
            FormulaStrategy::Fixed { amount } => Ok(*amount),
            FormulaStrategy::PercentageOfSalary { percentage } => {
                Ok(percentage_of(calc.period_salary, *percentage))
            }
            FormulaStrategy::PercentageOfGross { percentage } => {
                Ok(percentage_of(calc.gross_salary(), *percentage))
            }
            FormulaStrategy::Hours { percentage } => {
                let rate = self.config.hourly_rate(calc.monthly_salary);
                Ok(self.novelty_amount(calc, &concept.code, rate, *percentage))
            }
            FormulaStrategy::Days { percentage } => {
                let rate = self.config.daily_rate(calc.monthly_salary);
                Ok(self.novelty_amount(calc, &concept.code, rate, *percentage))
            }
            FormulaStrategy::Formula { schema } => evaluate(schema, calc),
            FormulaStrategy::Rule { rule_code } => {
                let rule = self.resolve_rule(rule_code.as_deref(), &concept.code)?;
                evaluate(&rule.schema, calc)
            }
        }
    }

    fn novelty_amount(
        &self,
        calc: &EmployeeCalculation,
        concept_code: &str,
        rate: Decimal,
        percentage: Option<Decimal>,
    ) -> Decimal {
        let quantity = calc
            .novelties
            .get(concept_code)
            .copied()
            .unwrap_or(Decimal::ZERO);
        let base = round_money(quantity * rate);
        match percentage {
            Some(p) => percentage_of(base, p),
            None => base,
        }
    }

    /// Finds the rule for a concept: frozen snapshot first, then live rules.
    fn resolve_rule(&self, rule_code: Option<&str>, concept_code: &str) -> EngineResult<&'a CalculationRule> {
        let frozen = match rule_code {
            Some(code) => self.snapshot.rule(code),
            None => self.snapshot.rule_for_concept(concept_code),
        };
        if let Some(rule) = frozen {
            return Ok(rule);
        }

        self.live_rules
            .iter()
            .filter(|r| r.is_effective_on(self.on))
            .find(|r| match rule_code {
                Some(code) => r.code == code,
                None => r.concept_codes.iter().any(|c| c == concept_code),
            })
            .ok_or_else(|| {
                EngineError::formula(format!(
                    "no calculation rule {} found",
                    rule_code.unwrap_or(concept_code)
                ))
            })
    }
}

fn evaluate(schema: &FormulaSchema, calc: &EmployeeCalculation) -> EngineResult<Decimal> {
    let result = FormulaEngine::new(schema).execute(&calc.variables())?;
    Ok(result.output)
}
