//! Benchmark results, grouped by workload.

use std::error::Error as _;
use std::fmt;
use std::time::Duration;

use itertools::Itertools;

use crate::{Error, ExecutionRecord, Strategy};

/// A trial that could not produce a record.
#[derive(Debug)]
pub struct TrialError {
    workload: String,
    strategy: String,
    error: Error,
}

impl TrialError {
    /// Creates a trial error for the given workload and strategy labels.
    #[must_use]
    pub fn new(workload: impl Into<String>, strategy: impl Into<String>, error: Error) -> Self {
        Self {
            workload: workload.into(),
            strategy: strategy.into(),
            error,
        }
    }

    /// The label of the workload.
    #[must_use]
    pub fn workload(&self) -> &str {
        &self.workload
    }

    /// The label of the strategy.
    #[must_use]
    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    /// What went wrong.
    #[must_use]
    pub fn error(&self) -> &Error {
        &self.error
    }
}

/// The collected outcome of a benchmark suite.
///
/// Records are shown in the order they were added, with consecutive records of the same
/// workload grouped under one heading. Within a group, speedups are relative to the
/// sequential record of that group.
#[derive(Debug, Default)]
pub struct Report {
    records: Vec<ExecutionRecord>,
    errors: Vec<TrialError>,
}

impl Report {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the record of a completed trial.
    pub fn push(&mut self, record: ExecutionRecord) {
        self.records.push(record);
    }

    /// Adds a trial that was aborted.
    pub fn push_error(&mut self, error: TrialError) {
        self.errors.push(error);
    }

    /// Records of completed trials, in the order they were added.
    #[must_use]
    pub fn records(&self) -> &[ExecutionRecord] {
        &self.records
    }

    /// Trials that were aborted, in the order they were added.
    #[must_use]
    pub fn errors(&self) -> &[TrialError] {
        &self.errors
    }

    /// Whether every trial completed and no verdict is a mismatch.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.errors.is_empty() && !self.records.iter().any(|r| r.verdict().is_failure())
    }

    /// Prints the report to stdout.
    #[cfg_attr(test, mutants::skip)] // Output to stdout cannot be asserted on.
    pub fn print_to_stdout(&self) {
        print!("{self}");
    }
}

/// How many times faster `record` ran than `baseline`.
fn speedup_over(baseline: Duration, record: Duration) -> Option<f64> {
    if record.is_zero() {
        return None;
    }

    Some(baseline.as_secs_f64() / record.as_secs_f64())
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.records.is_empty() && self.errors.is_empty() {
            return writeln!(f, "No trials were run.");
        }

        for (workload, group) in &self.records.iter().chunk_by(|r| r.workload().to_owned()) {
            let group: Vec<_> = group.collect();

            let baseline = group
                .iter()
                .find(|r| matches!(r.strategy(), Strategy::Sequential))
                .map(|r| r.elapsed());

            writeln!(f, "{workload}")?;
            writeln!(
                f,
                "  {:<12} {:<14} {:>7} {:>12} {:>8} {:>16} {:>9}  verdict",
                "strategy", "policy", "workers", "elapsed", "speedup", "result", "combines"
            )?;

            for record in group {
                let policy = record
                    .policy()
                    .map_or_else(|| "-".to_owned(), |p| p.to_string());

                let speedup = baseline
                    .and_then(|baseline| speedup_over(baseline, record.elapsed()))
                    .map_or_else(|| "-".to_owned(), |s| format!("{s:.2}x"));

                writeln!(
                    f,
                    "  {:<12} {:<14} {:>7} {:>12} {:>8} {:>16} {:>9}  {}",
                    record.strategy_name(),
                    policy,
                    record.workers(),
                    format!("{:.3?}", record.elapsed()),
                    speedup,
                    record.result().to_string(),
                    record.combines(),
                    record.verdict()
                )?;
            }

            writeln!(f)?;
        }

        if !self.errors.is_empty() {
            writeln!(f, "Aborted trials:")?;

            for trial in &self.errors {
                write!(f, "  {} [{}]: {}", trial.workload, trial.strategy, trial.error)?;

                let mut cause = trial.error.source();
                while let Some(inner) = cause {
                    write!(f, ": {inner}")?;
                    cause = inner.source();
                }

                writeln!(f)?;
            }
        }

        Ok(())
    }
}
