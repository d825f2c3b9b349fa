//! Payroll Calculation Engine
//!
//! This crate computes payroll runs for a company's employees: base salary
//! for the period, rule-driven perceptions, deductions and employer
//! benefits, loan and advance installments, year-to-date accumulation for
//! progressive withholding, and vacation accrual. Runs are executed with
//! per-employee savepoints and move through an audited approval lifecycle.

#![warn(missing_docs)]

pub mod api;
pub mod batch;
pub mod calculation;
pub mod config;
pub mod engine;
pub mod error;
pub mod formula;
pub mod models;
