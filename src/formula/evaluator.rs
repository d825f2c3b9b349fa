//! Sequential interpreter for calculation schemas.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculation::round_money;
use crate::error::{EngineError, EngineResult};

use super::{Expr, FormulaSchema, Step, Value};

/// The outcome of evaluating a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// The schema output, quantized to two decimals (round-half-up).
    pub output: Decimal,
    /// Every value bound by a step, in name order.
    pub variables: BTreeMap<String, Value>,
}

/// Evaluates a [`FormulaSchema`] against a set of inputs.
///
/// Evaluation is a single pass over the steps. Each step reads only from
/// the inputs and from values bound by earlier steps.
///
/// # Example
///
/// ```
/// use payroll_engine::formula::{FormulaEngine, FormulaSchema, Value};
/// use rust_decimal::Decimal;
/// use std::collections::HashMap;
///
/// let schema: FormulaSchema = serde_json::from_str(r#"{
///     "inputs": [{"name": "gross_salary"}],
///     "steps": [
///         {"type": "calculation", "name": "inss", "expression": "gross_salary * 0.07"}
///     ]
/// }"#).unwrap();
///
/// let mut inputs = HashMap::new();
/// inputs.insert("gross_salary".to_string(), Value::Number(Decimal::new(2600000, 2)));
///
/// let result = FormulaEngine::new(&schema).execute(&inputs).unwrap();
/// assert_eq!(result.output, Decimal::new(182000, 2));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FormulaEngine<'a> {
    schema: &'a FormulaSchema,
}

impl<'a> FormulaEngine<'a> {
    /// Creates an engine for the given schema.
    pub fn new(schema: &'a FormulaSchema) -> Self {
        Self { schema }
    }

    /// Executes the schema.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::FormulaEvaluation`] when the schema is
    /// malformed, a required input is missing, a step references a name
    /// that is not yet bound, or the output is not a number.
    pub fn execute(&self, inputs: &HashMap<String, Value>) -> EngineResult<EvaluationResult> {
        self.schema.validate()?;

        let mut scope: HashMap<String, Value> = inputs.clone();
        for input in &self.schema.inputs {
            if scope.contains_key(&input.name) {
                continue;
            }
            match input.default {
                Some(default) => {
                    scope.insert(input.name.clone(), default);
                }
                None if input.required => {
                    return Err(EngineError::formula(format!(
                        "missing required input '{}'",
                        input.name
                    )));
                }
                None => {}
            }
        }

        let mut variables = BTreeMap::new();
        for step in &self.schema.steps {
            let value = self.evaluate_step(step, &scope)?;
            scope.insert(step.name().to_string(), value);
            variables.insert(step.name().to_string(), value);
        }

        let output_name = self.schema.output_name()?;
        let output = scope
            .get(output_name)
            .ok_or_else(|| EngineError::formula(format!("output '{}' was not bound", output_name)))?
            .as_number()?;

        Ok(EvaluationResult {
            output: round_money(output),
            variables,
        })
    }

    fn evaluate_step(&self, step: &Step, scope: &HashMap<String, Value>) -> EngineResult<Value> {
        let step_error = |e: EngineError| match e {
            EngineError::FormulaEvaluation { message } => {
                EngineError::formula(format!("step '{}': {}", step.name(), message))
            }
            other => other,
        };

        match step {
            Step::Calculation { expression, .. } => {
                let value = Expr::parse(expression)
                    .and_then(|e| e.evaluate(scope))
                    .map_err(step_error)?;
                Ok(Value::Number(value.as_number().map_err(step_error)?))
            }
            Step::Conditional {
                condition,
                if_true,
                if_false,
                ..
            } => {
                let holds = Expr::parse(condition)
                    .and_then(|e| e.evaluate(scope))
                    .map_err(step_error)?
                    .is_truthy();
                let branch = if holds { if_true } else { if_false };
                Expr::parse(branch)
                    .and_then(|e| e.evaluate(scope))
                    .map_err(step_error)
            }
            Step::TaxLookup { table, input, .. } => {
                let table = self.schema.tax_tables.get(table).ok_or_else(|| {
                    step_error(EngineError::formula(format!("unknown tax table '{}'", table)))
                })?;
                let income = Expr::parse(input)
                    .and_then(|e| e.evaluate(scope))
                    .and_then(|v| v.as_number())
                    .map_err(step_error)?;
                Ok(Value::Number(table.tax_for(income)))
            }
            Step::Assignment { value, .. } => Expr::parse(value)
                .and_then(|e| e.evaluate(scope))
                .map_err(step_error),
        }
    }
}

/// Convenience wrapper around [`FormulaEngine::execute`].
pub fn execute(
    schema: &FormulaSchema,
    inputs: &HashMap<String, Value>,
) -> EngineResult<EvaluationResult> {
    FormulaEngine::new(schema).execute(inputs)
}
