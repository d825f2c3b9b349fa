//! Fixtures shared by engine unit tests.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

use super::{ExecutionRequest, InMemoryRepository};
use crate::calculation::test_support;
use crate::models::{
    ConceptKind, Employee, FormulaStrategy, PayrollDefinition, PayrollType, Periodicity,
};

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn employee(id: &str, salary: &str) -> Employee {
    let mut employee = test_support::employee();
    employee.id = id.to_string();
    employee.code = id.to_uppercase();
    employee.base_salary = dec(salary);
    employee
}

/// A monthly NIO definition with a mandatory 7% INSS deduction.
pub fn definition(employees: Vec<Employee>) -> PayrollDefinition {
    let mut definition: PayrollDefinition = serde_json::from_str(
        r#"{"id": "PLN-1", "name": "Main", "company_id": "acme", "currency": "NIO"}"#,
    )
    .unwrap();
    definition.payroll_type = Some(PayrollType {
        id: "monthly".to_string(),
        name: "Monthly".to_string(),
        periodicity: Periodicity::Monthly,
        fiscal_year_start_month: 1,
        fiscal_year_start_day: 1,
        periods_per_year: None,
    });
    definition.employees = employees;
    definition.concepts = vec![test_support::assignment(
        "INSS",
        ConceptKind::Deduction {
            priority: 1,
            mandatory: true,
            is_tax: false,
            pre_tax: true,
        },
        FormulaStrategy::PercentageOfGross {
            percentage: dec("7"),
        },
    )];
    definition
}

pub fn repository(definition: PayrollDefinition) -> InMemoryRepository {
    let mut repo = InMemoryRepository::default();
    repo.insert_definition(definition);
    repo
}

pub fn request(month: u32) -> ExecutionRequest {
    let start = date(2025, month, 1);
    let end = start
        .checked_add_months(chrono::Months::new(1))
        .and_then(|d| d.pred_opt())
        .unwrap();
    ExecutionRequest {
        definition_id: "PLN-1".to_string(),
        period_start: start,
        period_end: end,
        calculation_date: None,
        user: Some("tester".to_string()),
    }
}
