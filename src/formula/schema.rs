//! Declarative calculation schemas.
//!
//! A schema is the serialized form of a calculation rule: declared inputs,
//! an ordered list of typed steps, and the named tax tables those steps may
//! look up.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

use super::{Expr, TaxTable, Value};

/// A declared schema input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDef {
    /// The variable name the input is bound to.
    pub name: String,
    /// Whether evaluation fails when the input is absent and has no default.
    #[serde(default = "default_required")]
    pub required: bool,
    /// Value used when the caller does not supply the input.
    #[serde(default)]
    pub default: Option<Value>,
}

fn default_required() -> bool {
    true
}

/// One step of a calculation schema.
///
/// Every step binds its result to `name`, which later steps may reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    /// Evaluates an arithmetic expression to a number.
    Calculation {
        /// The name bound to the result.
        name: String,
        /// The expression source.
        expression: String,
    },
    /// Picks one of two expressions depending on a condition.
    Conditional {
        /// The name bound to the result.
        name: String,
        /// The condition; non-zero is true.
        condition: String,
        /// Expression evaluated when the condition holds.
        if_true: String,
        /// Expression evaluated otherwise.
        if_false: String,
    },
    /// Looks up a value in a named progressive tax table.
    TaxLookup {
        /// The name bound to the result.
        name: String,
        /// The tax table to consult.
        table: String,
        /// Expression producing the (normalized) income to look up.
        input: String,
    },
    /// Binds any value (number or date) to a new name.
    Assignment {
        /// The name bound to the result.
        name: String,
        /// The expression source.
        value: String,
    },
}

impl Step {
    /// The name this step binds.
    pub fn name(&self) -> &str {
        match self {
            Self::Calculation { name, .. }
            | Self::Conditional { name, .. }
            | Self::TaxLookup { name, .. }
            | Self::Assignment { name, .. } => name,
        }
    }

    /// The expression sources this step evaluates.
    pub fn expressions(&self) -> Vec<&str> {
        match self {
            Self::Calculation { expression, .. } => vec![expression],
            Self::Conditional {
                condition,
                if_true,
                if_false,
                ..
            } => vec![condition, if_true, if_false],
            Self::TaxLookup { input, .. } => vec![input],
            Self::Assignment { value, .. } => vec![value],
        }
    }
}

/// A complete calculation schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaSchema {
    /// Declared inputs. Callers may pass additional, undeclared inputs.
    #[serde(default)]
    pub inputs: Vec<InputDef>,
    /// Steps evaluated in order.
    pub steps: Vec<Step>,
    /// Named tax tables available to `tax_lookup` steps.
    #[serde(default)]
    pub tax_tables: BTreeMap<String, TaxTable>,
    /// The step whose value is the schema output; defaults to the last step.
    #[serde(default)]
    pub output: Option<String>,
}

impl FormulaSchema {
    /// Returns the name of the output step.
    pub fn output_name(&self) -> EngineResult<&str> {
        match &self.output {
            Some(name) => Ok(name),
            None => self
                .steps
                .last()
                .map(Step::name)
                .ok_or_else(|| EngineError::formula("schema has no steps")),
        }
    }

    /// Statically checks the schema.
    ///
    /// Verifies that every step parses, that no step references a name
    /// first defined by a later step (a name may be redefined), that every referenced tax table exists and
    /// is well formed, and that the output names a step.
    pub fn validate(&self) -> EngineResult<()> {
        if self.steps.is_empty() {
            return Err(EngineError::formula("schema has no steps"));
        }

        for (name, table) in &self.tax_tables {
            table.validate().map_err(|e| {
                EngineError::formula(format!("tax table '{}': {}", name, e))
            })?;
        }

        let mut step_positions: BTreeMap<&str, usize> = BTreeMap::new();
        for (i, step) in self.steps.iter().enumerate() {
            step_positions.entry(step.name()).or_insert(i);
        }
        let declared: HashSet<&str> = self.inputs.iter().map(|i| i.name.as_str()).collect();

        for (index, step) in self.steps.iter().enumerate() {
            if let Step::TaxLookup { table, .. } = step {
                if !self.tax_tables.contains_key(table) {
                    return Err(EngineError::formula(format!(
                        "step '{}' references unknown tax table '{}'",
                        step.name(),
                        table
                    )));
                }
            }
            for source in step.expressions() {
                let expr = Expr::parse(source)?;
                for variable in expr.variables() {
                    if declared.contains(variable.as_str()) {
                        continue;
                    }
                    if let Some(&defined_at) = step_positions.get(variable.as_str()) {
                        if defined_at >= index {
                            return Err(EngineError::formula(format!(
                                "step '{}' references '{}' before it is defined",
                                step.name(),
                                variable
                            )));
                        }
                    }
                }
            }
        }

        let output = self.output_name()?;
        if !step_positions.contains_key(output) {
            return Err(EngineError::formula(format!(
                "output '{}' does not name a step",
                output
            )));
        }
        Ok(())
    }
}
