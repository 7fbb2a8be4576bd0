//! Statement execution order and reporting.
//!
//! Pre-statements run first and abort the run on failure. Unset statements
//! run next; their failures are logged and skipped. Set and comment
//! statements run last, only when applying is enabled, with every failure
//! recorded in the [`WriteReport`].

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::executor::StatementExecutor;
use crate::statement::StatementPlan;

/// Called after each set statement with (done, total).
pub type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// One statement the warehouse rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedStatement {
    pub statement: String,
    pub error: String,
}

/// Outcome of one writer run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub pre_statements: usize,
    pub unset_executed: usize,
    pub unset_failed: usize,
    pub executed: usize,
    pub failed: Vec<FailedStatement>,
    /// Set statements left out because applying was disabled
    pub not_applied: usize,
}

impl WriteReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Runs a [`StatementPlan`] against an executor.
pub struct TagWriter<'a> {
    executor: &'a dyn StatementExecutor,
    pre_statements: Vec<String>,
    apply: bool,
    progress: Option<ProgressCallback>,
}

impl<'a> TagWriter<'a> {
    pub fn new(executor: &'a dyn StatementExecutor) -> Self {
        Self {
            executor,
            pre_statements: Vec::new(),
            apply: true,
            progress: None,
        }
    }

    pub fn with_pre_statements(mut self, statements: Vec<String>) -> Self {
        self.pre_statements = statements;
        self
    }

    /// Whether set and comment statements are executed.
    pub fn with_apply(mut self, apply: bool) -> Self {
        self.apply = apply;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Execute the plan. Only a failing pre-statement returns `Err`.
    pub async fn apply(&self, plan: &StatementPlan) -> Result<WriteReport> {
        let mut report = WriteReport::default();

        if plan.unset.is_empty() {
            info!("Will NOT unset tags");
        } else {
            info!("Will unset tags ({} statements)", plan.unset.len());
        }
        if self.apply {
            info!("Will update tags ({} statements)", plan.set.len());
        } else {
            info!("Will NOT update tags");
        }

        info!("Executing {} pre-statements", self.pre_statements.len());
        for statement in &self.pre_statements {
            self.executor.execute(statement).await?;
            report.pre_statements += 1;
        }

        for statement in &plan.unset {
            match self.executor.execute(statement).await {
                Ok(_) => report.unset_executed += 1,
                Err(e) => {
                    warn!("Unset failed, continuing: {}: {}", statement, e);
                    report.unset_failed += 1;
                }
            }
        }

        if !self.apply {
            report.not_applied = plan.set.len();
            return Ok(report);
        }

        let total = plan.set.len();
        for (i, statement) in plan.set.iter().enumerate() {
            info!("Executing {}", statement);
            match self.executor.execute(statement).await {
                Ok(outcome) => {
                    debug!("{} finished as {}", statement, outcome.statement_id);
                    report.executed += 1;
                }
                Err(e) => {
                    warn!("Statement failed: {}: {}", statement, e);
                    report.failed.push(FailedStatement {
                        statement: statement.clone(),
                        error: e.to_string(),
                    });
                }
            }
            if let Some(progress) = &self.progress {
                progress(i + 1, total);
            }
        }

        info!(
            "Executed {} statements, {} failed",
            report.executed,
            report.failed.len()
        );
        Ok(report)
    }
}
