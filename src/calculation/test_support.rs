//! Fixtures shared by calculation unit tests.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use std::str::FromStr;

use crate::models::{
    AmortizationMethod, Concept, ConceptAssignment, ConceptKind, ConceptStatus, Employee,
    EmployeeCalculation, FormulaStrategy, InterestType, Loan, LoanKind, LoanStatus, PayPeriod,
    PayrollDefinition,
};

pub fn employee() -> Employee {
    Employee {
        id: "emp_001".to_string(),
        code: "E001".to_string(),
        first_name: "Ana".to_string(),
        last_name: "Lopez".to_string(),
        company_id: "acme".to_string(),
        base_salary: Decimal::from(25000),
        currency: "NIO".to_string(),
        hire_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        termination_date: None,
        active: true,
        vacation_policy: None,
        opening_balances: None,
        overrides: vec![],
    }
}

pub fn january() -> PayPeriod {
    PayPeriod::new(
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
    )
    .unwrap()
}

pub fn calculation(period_salary: Decimal) -> EmployeeCalculation {
    let mut calc = EmployeeCalculation::new(&employee(), january());
    calc.monthly_salary = period_salary;
    calc.period_salary = period_salary;
    calc
}

pub fn assignment(code: &str, kind: ConceptKind, formula: FormulaStrategy) -> ConceptAssignment {
    ConceptAssignment {
        concept: Concept {
            code: code.to_string(),
            name: code.to_string(),
            kind,
            formula,
            effective_from: None,
            effective_to: None,
            status: ConceptStatus::Approved,
            active: true,
            created_by_plugin: false,
            version: 1,
        },
        amount_override: None,
        percentage_override: None,
        active: true,
    }
}

pub fn deduction(code: &str, priority: u32, mandatory: bool, amount: Decimal) -> ConceptAssignment {
    assignment(
        code,
        ConceptKind::Deduction {
            priority,
            mandatory,
            is_tax: false,
            pre_tax: false,
        },
        FormulaStrategy::Fixed { amount },
    )
}

pub fn definition() -> PayrollDefinition {
    serde_json::from_str(r#"{"id": "PLN-1", "name": "Main", "company_id": "acme"}"#).unwrap()
}

pub fn loan(id: &str, kind: LoanKind, balance: &str, installment: Option<&str>, priority: u32) -> Loan {
    let dec = |s: &str| Decimal::from_str(s).unwrap();
    Loan {
        id: id.to_string(),
        employee_id: "emp_001".to_string(),
        kind,
        principal: dec(balance),
        approved_amount: dec(balance),
        balance: dec(balance),
        annual_rate: Decimal::ZERO,
        interest_type: InterestType::None,
        amortization_method: AmortizationMethod::French,
        installment_amount: installment.map(dec),
        installments: 10,
        installments_paid: 0,
        priority,
        status: LoanStatus::Approved,
        start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        last_interest_date: None,
    }
}
