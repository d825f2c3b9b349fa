//! Per-employee working state for one run.
//!
//! An [`EmployeeCalculation`] is created when an employee's processing starts
//! and discarded once its results are persisted. Totals are always derived
//! from the line items, so `sum(items of kind X) == total_X` holds by
//! construction.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Employee, LineItem, LineKind, PayPeriod, TaxTreatment};
use crate::formula::Value;

/// Year-to-date figures as they stood before the current period.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct YearToDate {
    /// Accumulated gross salary.
    pub gross_salary: Decimal,
    /// Accumulated taxable salary.
    pub taxable_salary: Decimal,
    /// Accumulated pre-tax deductions.
    pub pre_tax_deductions: Decimal,
    /// Accumulated income tax withheld.
    pub tax_withheld: Decimal,
    /// Periods processed in the fiscal year.
    pub periods_processed: u32,
    /// Periods the year-to-date figures cover, opening balances included.
    pub periods: u32,
    /// Gross salary accumulated in the current calendar month.
    pub month_gross: Decimal,
}

/// Mutable per-employee, per-run calculation state.
#[derive(Debug, Clone, PartialEq)]
pub struct EmployeeCalculation {
    /// The employee being processed.
    pub employee_id: String,
    /// The employee's code.
    pub employee_code: String,
    /// The employee's display name.
    pub employee_name: String,
    /// The employee's hire date.
    pub hire_date: NaiveDate,
    /// The pay period.
    pub period: PayPeriod,
    /// Monthly salary in the payroll currency.
    pub monthly_salary: Decimal,
    /// Salary prorated to the pay period.
    pub period_salary: Decimal,
    /// Rate applied to convert the employee's currency to the payroll currency.
    pub exchange_rate: Decimal,
    /// Days of the period the employee was employed.
    pub days_worked: i64,
    /// Pay periods per year for annualization.
    pub periods_per_year: u32,
    /// Ad hoc period inputs keyed by concept code.
    pub novelties: BTreeMap<String, Decimal>,
    /// Year-to-date figures before this period.
    pub year_to_date: YearToDate,
    perceptions: Vec<LineItem>,
    deductions: Vec<LineItem>,
    benefits: Vec<LineItem>,
}

impl EmployeeCalculation {
    /// Starts a calculation for an employee over a period.
    ///
    /// The monthly salary starts as the employee's base salary with an
    /// exchange rate of one; callers convert it when currencies differ.
    pub fn new(employee: &Employee, period: PayPeriod) -> Self {
        Self {
            employee_id: employee.id.clone(),
            employee_code: employee.code.clone(),
            employee_name: employee.full_name(),
            hire_date: employee.hire_date,
            period,
            monthly_salary: employee.base_salary,
            period_salary: Decimal::ZERO,
            exchange_rate: Decimal::ONE,
            days_worked: period.days(),
            periods_per_year: 12,
            novelties: BTreeMap::new(),
            year_to_date: YearToDate::default(),
            perceptions: Vec::new(),
            deductions: Vec::new(),
            benefits: Vec::new(),
        }
    }

    /// Appends a line item to the list matching its kind.
    pub fn add_item(&mut self, item: LineItem) {
        match item.kind {
            LineKind::Perception => self.perceptions.push(item),
            LineKind::Deduction => self.deductions.push(item),
            LineKind::Benefit => self.benefits.push(item),
        }
    }

    /// Perception lines.
    pub fn perceptions(&self) -> &[LineItem] {
        &self.perceptions
    }

    /// Deduction lines.
    pub fn deductions(&self) -> &[LineItem] {
        &self.deductions
    }

    /// Benefit lines.
    pub fn benefits(&self) -> &[LineItem] {
        &self.benefits
    }

    /// Sum of perception lines.
    pub fn total_perceptions(&self) -> Decimal {
        sum(&self.perceptions)
    }

    /// Sum of deduction lines.
    pub fn total_deductions(&self) -> Decimal {
        sum(&self.deductions)
    }

    /// Sum of benefit lines.
    pub fn total_benefits(&self) -> Decimal {
        sum(&self.benefits)
    }

    /// Period salary plus perceptions.
    pub fn gross_salary(&self) -> Decimal {
        self.period_salary + self.total_perceptions()
    }

    /// Period salary plus taxable perceptions.
    pub fn taxable_income(&self) -> Decimal {
        self.period_salary
            + self
                .perceptions
                .iter()
                .filter(|p| p.tax_treatment == TaxTreatment::Taxable)
                .map(|p| p.amount)
                .sum::<Decimal>()
    }

    /// Sum of deductions that reduce the taxable base.
    pub fn pre_tax_deductions(&self) -> Decimal {
        self.deductions_with(TaxTreatment::PreTax)
    }

    /// Sum of income-tax withholding deductions.
    pub fn tax_withheld(&self) -> Decimal {
        self.deductions_with(TaxTreatment::Tax)
    }

    /// Gross minus deductions, before clamping.
    pub fn raw_net_pay(&self) -> Decimal {
        self.gross_salary() - self.total_deductions()
    }

    /// Net pay, clamped at zero.
    pub fn net_pay(&self) -> Decimal {
        self.raw_net_pay().max(Decimal::ZERO)
    }

    /// Gross salary still available for deductions.
    pub fn available_balance(&self) -> Decimal {
        self.net_pay()
    }

    fn deductions_with(&self, treatment: TaxTreatment) -> Decimal {
        self.deductions
            .iter()
            .filter(|d| d.tax_treatment == treatment)
            .map(|d| d.amount)
            .sum()
    }

    /// Builds the variable context exposed to formulas and rules.
    ///
    /// Novelties are exposed as `novelty_<code>`, and the amounts already
    /// computed as `perception_<code>` and `deduction_<code>`, with codes
    /// lowercased.
    pub fn variables(&self) -> HashMap<String, Value> {
        let mut vars: HashMap<String, Value> = HashMap::new();
        let mut put = |name: &str, value: Decimal| {
            vars.insert(name.to_string(), Value::Number(value));
        };

        put("base_salary", self.period_salary);
        put("monthly_salary", self.monthly_salary);
        put("gross_salary", self.gross_salary());
        put("total_perceptions", self.total_perceptions());
        put("taxable_income", self.taxable_income());
        put("total_deductions", self.total_deductions());
        put("pre_tax_deductions", self.pre_tax_deductions());
        put("period_days", Decimal::from(self.period.days()));
        put("days_worked", Decimal::from(self.days_worked));
        put("exchange_rate", self.exchange_rate);
        put("periods_per_year", Decimal::from(self.periods_per_year));
        put("ytd_gross", self.year_to_date.gross_salary);
        put("ytd_taxable", self.year_to_date.taxable_salary);
        put("ytd_pre_tax_deductions", self.year_to_date.pre_tax_deductions);
        put("ytd_tax_withheld", self.year_to_date.tax_withheld);
        put(
            "periods_processed",
            Decimal::from(self.year_to_date.periods_processed),
        );
        put("ytd_periods", Decimal::from(self.year_to_date.periods));
        put("month_gross", self.year_to_date.month_gross);

        vars.insert("hire_date".to_string(), Value::Date(self.hire_date));
        vars.insert("period_start".to_string(), Value::Date(self.period.start_date));
        vars.insert("period_end".to_string(), Value::Date(self.period.end_date));

        for (code, quantity) in &self.novelties {
            vars.insert(variable_name("novelty", code), Value::Number(*quantity));
        }
        for item in &self.perceptions {
            vars.insert(variable_name("perception", &item.code), Value::Number(item.amount));
        }
        for item in &self.deductions {
            vars.insert(variable_name("deduction", &item.code), Value::Number(item.amount));
        }
        vars
    }
}

fn sum(items: &[LineItem]) -> Decimal {
    items.iter().map(|i| i.amount).sum()
}

/// Builds an identifier-safe variable name from a prefix and a code.
pub fn variable_name(prefix: &str, code: &str) -> String {
    let code: String = code
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_{}", prefix, code)
}
