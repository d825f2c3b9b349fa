//! Arithmetic expression language used by formula steps.
//!
//! Expressions are parsed once into an [`Expr`] tree and evaluated against a
//! variable scope. The grammar, lowest precedence first:
//!
//! ```text
//! or         := and ("or" and)*
//! and        := not ("and" not)*
//! not        := "not" not | comparison
//! comparison := additive (("<" | "<=" | ">" | ">=" | "==" | "!=") additive)?
//! additive   := term (("+" | "-") term)*
//! term       := unary (("*" | "/") unary)*
//! unary      := "-" unary | primary
//! primary    := number | ident | ident "(" args ")" | "(" or ")"
//! ```

use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use chrono::Datelike;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::calculation::{round_to, safe_divide};
use crate::error::{EngineError, EngineResult};

use super::Value;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Decimal),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    And,
    Or,
    Not,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Arithmetic negation.
    Neg,
    /// Logical negation.
    Not,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Addition.
    Add,
    /// Subtraction (dates subtract to a day count).
    Sub,
    /// Multiplication.
    Mul,
    /// Division; a zero denominator yields zero.
    Div,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
    /// Equality.
    Eq,
    /// Inequality.
    Ne,
    /// Logical and.
    And,
    /// Logical or.
    Or,
}

/// A parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A numeric literal.
    Number(Decimal),
    /// A reference to an input or an earlier step.
    Variable(String),
    /// A unary operation.
    Unary {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        operand: Box<Expr>,
    },
    /// A binary operation.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// A built-in function call.
    Call {
        /// The function name.
        function: String,
        /// Call arguments.
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Parses an expression from source text.
    ///
    /// # Examples
    ///
    /// ```
    /// use payroll_engine::formula::{Expr, Value};
    /// use rust_decimal::Decimal;
    /// use std::collections::HashMap;
    ///
    /// let expr = Expr::parse("salary * 7 / 100").unwrap();
    /// let mut scope = HashMap::new();
    /// scope.insert("salary".to_string(), Value::Number(Decimal::from(1000)));
    /// assert_eq!(expr.evaluate(&scope).unwrap(), Value::Number(Decimal::from(70)));
    /// ```
    pub fn parse(source: &str) -> EngineResult<Self> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            tokens,
            position: 0,
            source,
        };
        let expr = parser.parse_or()?;
        if parser.position < parser.tokens.len() {
            return Err(EngineError::formula(format!(
                "unexpected trailing input in expression '{}'",
                source
            )));
        }
        Ok(expr)
    }

    /// Returns every variable name the expression references.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut set = BTreeSet::new();
        self.collect_variables(&mut set);
        set
    }

    fn collect_variables(&self, set: &mut BTreeSet<String>) {
        match self {
            Self::Number(_) => {}
            Self::Variable(name) => {
                set.insert(name.clone());
            }
            Self::Unary { operand, .. } => operand.collect_variables(set),
            Self::Binary { lhs, rhs, .. } => {
                lhs.collect_variables(set);
                rhs.collect_variables(set);
            }
            Self::Call { args, .. } => {
                for arg in args {
                    arg.collect_variables(set);
                }
            }
        }
    }

    /// Evaluates the expression against a variable scope.
    pub fn evaluate(&self, scope: &HashMap<String, Value>) -> EngineResult<Value> {
        match self {
            Self::Number(n) => Ok(Value::Number(*n)),
            Self::Variable(name) => scope
                .get(name)
                .copied()
                .ok_or_else(|| EngineError::formula(format!("unknown variable '{}'", name))),
            Self::Unary { op, operand } => {
                let value = operand.evaluate(scope)?;
                match op {
                    UnaryOp::Neg => Ok(Value::Number(-value.as_number()?)),
                    UnaryOp::Not => Ok(Value::from_bool(!value.is_truthy())),
                }
            }
            Self::Binary { op, lhs, rhs } => {
                // Short-circuit logical operators before evaluating the right side.
                match op {
                    BinaryOp::And => {
                        if !lhs.evaluate(scope)?.is_truthy() {
                            return Ok(Value::from_bool(false));
                        }
                        return Ok(Value::from_bool(rhs.evaluate(scope)?.is_truthy()));
                    }
                    BinaryOp::Or => {
                        if lhs.evaluate(scope)?.is_truthy() {
                            return Ok(Value::from_bool(true));
                        }
                        return Ok(Value::from_bool(rhs.evaluate(scope)?.is_truthy()));
                    }
                    _ => {}
                }
                let left = lhs.evaluate(scope)?;
                let right = rhs.evaluate(scope)?;
                apply_binary(*op, left, right)
            }
            Self::Call { function, args } => {
                let values = args
                    .iter()
                    .map(|arg| arg.evaluate(scope))
                    .collect::<EngineResult<Vec<_>>>()?;
                call_function(function, &values)
            }
        }
    }
}

fn apply_binary(op: BinaryOp, left: Value, right: Value) -> EngineResult<Value> {
    // Date arithmetic and comparisons.
    if let (Value::Date(a), Value::Date(b)) = (left, right) {
        return match op {
            BinaryOp::Sub => Ok(Value::Number(Decimal::from((a - b).num_days()))),
            BinaryOp::Lt => Ok(Value::from_bool(a < b)),
            BinaryOp::Le => Ok(Value::from_bool(a <= b)),
            BinaryOp::Gt => Ok(Value::from_bool(a > b)),
            BinaryOp::Ge => Ok(Value::from_bool(a >= b)),
            BinaryOp::Eq => Ok(Value::from_bool(a == b)),
            BinaryOp::Ne => Ok(Value::from_bool(a != b)),
            _ => Err(EngineError::formula(format!(
                "operator {:?} is not defined for dates",
                op
            ))),
        };
    }

    let a = left.as_number()?;
    let b = right.as_number()?;
    let overflow = || EngineError::formula("arithmetic overflow");
    let result = match op {
        BinaryOp::Add => Value::Number(a.checked_add(b).ok_or_else(overflow)?),
        BinaryOp::Sub => Value::Number(a.checked_sub(b).ok_or_else(overflow)?),
        BinaryOp::Mul => Value::Number(a.checked_mul(b).ok_or_else(overflow)?),
        BinaryOp::Div => Value::Number(safe_divide(a, b)),
        BinaryOp::Lt => Value::from_bool(a < b),
        BinaryOp::Le => Value::from_bool(a <= b),
        BinaryOp::Gt => Value::from_bool(a > b),
        BinaryOp::Ge => Value::from_bool(a >= b),
        BinaryOp::Eq => Value::from_bool(a == b),
        BinaryOp::Ne => Value::from_bool(a != b),
        BinaryOp::And | BinaryOp::Or => Value::from_bool(left.is_truthy() && right.is_truthy()),
    };
    Ok(result)
}

fn expect_arity(function: &str, args: &[Value], expected: usize) -> EngineResult<()> {
    if args.len() != expected {
        return Err(EngineError::formula(format!(
            "function '{}' expects {} argument(s), got {}",
            function,
            expected,
            args.len()
        )));
    }
    Ok(())
}

fn call_function(function: &str, args: &[Value]) -> EngineResult<Value> {
    match function {
        "min" | "max" => {
            if args.is_empty() {
                return Err(EngineError::formula(format!(
                    "function '{}' expects at least one argument",
                    function
                )));
            }
            let numbers = args
                .iter()
                .map(|v| v.as_number())
                .collect::<EngineResult<Vec<_>>>()?;
            let picked = if function == "min" {
                numbers.into_iter().min()
            } else {
                numbers.into_iter().max()
            };
            Ok(Value::Number(picked.unwrap_or(Decimal::ZERO)))
        }
        "abs" => {
            expect_arity(function, args, 1)?;
            Ok(Value::Number(args[0].as_number()?.abs()))
        }
        "floor" => {
            expect_arity(function, args, 1)?;
            Ok(Value::Number(args[0].as_number()?.floor()))
        }
        "ceil" => {
            expect_arity(function, args, 1)?;
            Ok(Value::Number(args[0].as_number()?.ceil()))
        }
        "round" => {
            let places = match args.len() {
                1 => 0,
                2 => {
                    args[1].as_number()?.trunc().to_u32().ok_or_else(|| {
                        EngineError::formula("round() places must be a non-negative integer")
                    })?
                }
                n => {
                    return Err(EngineError::formula(format!(
                        "function 'round' expects 1 or 2 arguments, got {}",
                        n
                    )));
                }
            };
            Ok(Value::Number(round_to(args[0].as_number()?, places)))
        }
        "days_between" => {
            expect_arity(function, args, 2)?;
            let from = args[0].as_date()?;
            let to = args[1].as_date()?;
            Ok(Value::Number(Decimal::from((to - from).num_days())))
        }
        "year" => {
            expect_arity(function, args, 1)?;
            Ok(Value::Number(Decimal::from(args[0].as_date()?.year())))
        }
        "month" => {
            expect_arity(function, args, 1)?;
            Ok(Value::Number(Decimal::from(args[0].as_date()?.month())))
        }
        "day" => {
            expect_arity(function, args, 1)?;
            Ok(Value::Number(Decimal::from(args[0].as_date()?.day())))
        }
        other => Err(EngineError::formula(format!("unknown function '{}'", other))),
    }
}

fn tokenize(source: &str) -> EngineResult<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.' || chars[i] == '_') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().filter(|c| **c != '_').collect();
                let number = Decimal::from_str(&literal).map_err(|_| {
                    EngineError::formula(format!("invalid number literal '{}'", literal))
                })?;
                tokens.push(Token::Number(number));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Ident(word),
                });
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '<' | '>' | '=' | '!' => {
                let next_is_eq = chars.get(i + 1) == Some(&'=');
                let token = match (c, next_is_eq) {
                    ('<', true) => Token::Le,
                    ('<', false) => Token::Lt,
                    ('>', true) => Token::Ge,
                    ('>', false) => Token::Gt,
                    ('=', true) => Token::EqEq,
                    ('!', true) => Token::NotEq,
                    _ => {
                        return Err(EngineError::formula(format!(
                            "unexpected character '{}' in expression '{}'",
                            c, source
                        )));
                    }
                };
                tokens.push(token);
                i += if next_is_eq { 2 } else { 1 };
            }
            _ => {
                return Err(EngineError::formula(format!(
                    "unexpected character '{}' in expression '{}'",
                    c, source
                )));
            }
        }
    }

    if tokens.is_empty() {
        return Err(EngineError::formula("empty expression"));
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    position: usize,
    source: &'a str,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, message: &str) -> EngineError {
        EngineError::formula(format!("{} in expression '{}'", message, self.source))
    }

    fn parse_or(&mut self) -> EngineResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Or) {
            let rhs = self.parse_and()?;
            lhs = binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> EngineResult<Expr> {
        let mut lhs = self.parse_not()?;
        while self.eat(&Token::And) {
            let rhs = self.parse_not()?;
            lhs = binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> EngineResult<Expr> {
        if self.eat(&Token::Not) {
            let operand = self.parse_not()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> EngineResult<Expr> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Ge) => BinaryOp::Ge,
            Some(Token::EqEq) => BinaryOp::Eq,
            Some(Token::NotEq) => BinaryOp::Ne,
            _ => return Ok(lhs),
        };
        self.position += 1;
        let rhs = self.parse_additive()?;
        Ok(binary(op, lhs, rhs))
    }

    fn parse_additive(&mut self) -> EngineResult<Expr> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.position += 1;
            let rhs = self.parse_term()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_term(&mut self) -> EngineResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.position += 1;
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_unary(&mut self) -> EngineResult<Expr> {
        if self.eat(&Token::Minus) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> EngineResult<Expr> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Ident(name)) => {
                if !self.eat(&Token::LParen) {
                    return Ok(Expr::Variable(name));
                }
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.parse_or()?);
                        if self.eat(&Token::Comma) {
                            continue;
                        }
                        if self.eat(&Token::RParen) {
                            break;
                        }
                        return Err(self.error("expected ',' or ')'"));
                    }
                }
                Ok(Expr::Call {
                    function: name,
                    args,
                })
            }
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                if !self.eat(&Token::RParen) {
                    return Err(self.error("missing closing parenthesis"));
                }
                Ok(inner)
            }
            Some(_) => Err(self.error("unexpected token")),
            None => Err(self.error("unexpected end of input")),
        }
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn eval(source: &str, scope: &[(&str, Value)]) -> EngineResult<Value> {
        let scope: HashMap<String, Value> = scope
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        Expr::parse(source)?.evaluate(&scope)
    }

    fn num(s: &str) -> Value {
        Value::Number(dec(s))
    }

    #[test]
    fn test_precedence_of_multiplication_over_addition() {
        assert_eq!(eval("2 + 3 * 4", &[]).unwrap(), num("14"));
        assert_eq!(eval("(2 + 3) * 4", &[]).unwrap(), num("20"));
    }

    #[test]
    fn test_unary_minus() {
        assert_eq!(eval("-5 + 2", &[]).unwrap(), num("-3"));
        assert_eq!(eval("--5", &[]).unwrap(), num("5"));
    }

    #[test]
    fn test_division_by_zero_yields_zero() {
        assert_eq!(eval("10 / x", &[("x", num("0"))]).unwrap(), num("0"));
    }

    #[test]
    fn test_comparison_and_logic() {
        assert_eq!(eval("3 > 2 and 1 < 2", &[]).unwrap(), num("1"));
        assert_eq!(eval("3 > 2 and not 1 < 2", &[]).unwrap(), num("0"));
        assert_eq!(eval("0 or 5 >= 5", &[]).unwrap(), num("1"));
        assert_eq!(eval("2 == 2", &[]).unwrap(), num("1"));
        assert_eq!(eval("2 != 2", &[]).unwrap(), num("0"));
    }

    #[test]
    fn test_functions() {
        assert_eq!(eval("min(3, 1, 2)", &[]).unwrap(), num("1"));
        assert_eq!(eval("max(3, 1, 2)", &[]).unwrap(), num("3"));
        assert_eq!(eval("abs(-4.5)", &[]).unwrap(), num("4.5"));
        assert_eq!(eval("round(2.345, 2)", &[]).unwrap(), num("2.35"));
        assert_eq!(eval("round(2.5)", &[]).unwrap(), num("3"));
        assert_eq!(eval("floor(2.9)", &[]).unwrap(), num("2"));
        assert_eq!(eval("ceil(2.1)", &[]).unwrap(), num("3"));
    }

    #[test]
    fn test_date_functions() {
        let hire = Value::Date(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        let end = Value::Date(NaiveDate::from_ymd_opt(2025, 1, 31).unwrap());
        let scope = [("hire", hire), ("end", end)];
        assert_eq!(eval("days_between(hire, end)", &scope).unwrap(), num("30"));
        assert_eq!(eval("end - hire", &scope).unwrap(), num("30"));
        assert_eq!(eval("month(end)", &scope).unwrap(), num("1"));
        assert_eq!(eval("year(end)", &scope).unwrap(), num("2025"));
        assert_eq!(eval("day(end)", &scope).unwrap(), num("31"));
        assert_eq!(eval("hire < end", &scope).unwrap(), num("1"));
    }

    #[test]
    fn test_unknown_variable_is_an_error() {
        let err = eval("missing * 2", &[]).unwrap_err();
        assert!(err.to_string().contains("unknown variable 'missing'"));
    }

    #[test]
    fn test_unknown_function_is_an_error() {
        assert!(eval("sqrt(4)", &[]).is_err());
    }

    #[test]
    fn test_wrong_arity_is_an_error() {
        assert!(eval("abs(1, 2)", &[]).is_err());
        assert!(eval("min()", &[]).is_err());
    }

    #[test]
    fn test_syntax_errors() {
        assert!(Expr::parse("").is_err());
        assert!(Expr::parse("(1 + 2").is_err());
        assert!(Expr::parse("1 +").is_err());
        assert!(Expr::parse("1 2").is_err());
        assert!(Expr::parse("a = b").is_err());
        assert!(Expr::parse("1 $ 2").is_err());
    }

    #[test]
    fn test_numeric_literals_with_underscores() {
        assert_eq!(eval("100_000.50", &[]).unwrap(), num("100000.50"));
    }

    #[test]
    fn test_variables_are_collected() {
        let expr = Expr::parse("max(a, b * c) + round(d, 2)").unwrap();
        let vars: Vec<String> = expr.variables().into_iter().collect();
        assert_eq!(vars, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_arithmetic_on_date_and_number_is_an_error() {
        let scope = [("d", Value::Date(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()))];
        assert!(eval("d + 1", &scope).is_err());
    }
}
