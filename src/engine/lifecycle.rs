//! Post-calculation run lifecycle: approval, application, payment and voiding.

use std::collections::BTreeSet;

use tracing::info;
use uuid::Uuid;

use super::executor::PayrollEngine;
use crate::error::EngineResult;
use crate::models::{LoanStatus, LogLevel, PayrollRun, RunStatus};

impl PayrollEngine<'_> {
    /// Approves a generated run.
    pub fn approve(&mut self, run_id: Uuid, user: Option<&str>) -> EngineResult<PayrollRun> {
        self.move_run(run_id, RunStatus::Approved, user, None, |_, _| Ok(()))
    }

    /// Applies an approved run.
    ///
    /// Loans still `Approved` that received a payment in this run become
    /// `Applied`. Loans the run fully repaid are already `Paid`.
    pub fn apply(&mut self, run_id: Uuid, user: Option<&str>) -> EngineResult<PayrollRun> {
        self.move_run(run_id, RunStatus::Applied, user, None, |engine, run| {
            let payments = engine.repo.loan_payments_for_run(run.id)?;
            let loan_ids: BTreeSet<String> = payments.into_iter().map(|p| p.loan_id).collect();
            for loan_id in loan_ids {
                let mut loan = engine.repo.get_loan(&loan_id)?;
                if loan.status == LoanStatus::Approved {
                    loan.transition(LoanStatus::Applied)?;
                    run.log(LogLevel::Info, Some(&loan.employee_id), format!("loan {} applied", loan.id));
                    engine.repo.save_loan(loan)?;
                }
            }
            Ok(())
        })
    }

    /// Marks an applied run as paid.
    pub fn mark_paid(&mut self, run_id: Uuid, user: Option<&str>) -> EngineResult<PayrollRun> {
        self.move_run(run_id, RunStatus::Paid, user, None, |_, _| Ok(()))
    }

    /// Voids an applied run, recording who did it and why.
    pub fn cancel(&mut self, run_id: Uuid, user: Option<&str>, reason: &str) -> EngineResult<PayrollRun> {
        self.move_run(run_id, RunStatus::Cancelled, user, Some(reason), |_, _| Ok(()))
    }

    /// Puts a failed run back into `Calculating` with its results cleared.
    ///
    /// Ledger entries a previous attempt may have left are deleted. The
    /// frozen snapshot is kept so the retry sees the same inputs.
    pub fn reset_for_retry(&mut self, run_id: Uuid, user: Option<&str>) -> EngineResult<PayrollRun> {
        let mut run = self.repo.get_run(run_id)?;
        run.transition(RunStatus::Calculating, user, Some("retry"))?;
        self.repo.delete_run_data(run.id)?;
        run.reset_results();
        run.log(LogLevel::Info, None, "retry requested; reprocessing all employees");
        self.repo.save_run(&run)?;
        info!(run_id = %run.id, "payroll run reset for retry");
        Ok(run)
    }

    fn move_run<F>(
        &mut self,
        run_id: Uuid,
        next: RunStatus,
        user: Option<&str>,
        reason: Option<&str>,
        side_effects: F,
    ) -> EngineResult<PayrollRun>
    where
        F: FnOnce(&mut Self, &mut PayrollRun) -> EngineResult<()>,
    {
        let mut run = self.repo.get_run(run_id)?;
        let from = run.status;
        run.transition(next, user, reason)?;

        let scope = self.repo.savepoint()?;
        if let Err(err) = side_effects(self, &mut run) {
            self.repo.rollback_to(scope)?;
            return Err(err);
        }
        self.repo.release(scope)?;

        let message = match reason {
            Some(reason) => format!("{} -> {}: {}", from, next, reason),
            None => format!("{} -> {}", from, next),
        };
        run.log(LogLevel::Info, None, message);
        self.repo.save_run(&run)?;
        info!(run_id = %run.id, from = %from, to = %next, user = ?user, "payroll run transitioned");
        Ok(run)
    }
}
