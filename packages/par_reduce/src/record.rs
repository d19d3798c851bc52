use std::time::Duration;

use crate::{ResultValue, SchedulingPolicy, StrategyConfig, Tolerance, Verdict};

/// How a trial was executed.
#[derive(Clone, Copy, Debug, PartialEq)]
#[non_exhaustive]
pub enum Strategy {
    /// A single-threaded pass in index order. This is the baseline of a comparison.
    Sequential,

    /// Concurrent workers coordinated by the execution engine.
    Parallel(StrategyConfig),

    /// One producer thread publishing data to one consumer thread.
    Pipeline,
}

/// The outcome of one (workload, strategy) trial.
///
/// Records are immutable once created, except that a verdict can be attached to a record that
/// has none yet.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutionRecord {
    workload: String,
    strategy: Strategy,
    workers: usize,
    elapsed: Duration,
    result: ResultValue,
    combines: usize,
    verdict: Verdict,
}

impl ExecutionRecord {
    pub(crate) fn new(
        workload: String,
        strategy: Strategy,
        workers: usize,
        elapsed: Duration,
        result: ResultValue,
        combines: usize,
    ) -> Self {
        Self {
            workload,
            strategy,
            workers,
            elapsed,
            result,
            combines,
            verdict: Verdict::Unverified,
        }
    }

    /// The label of the workload.
    #[must_use]
    pub fn workload(&self) -> &str {
        &self.workload
    }

    /// How the trial was executed.
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// The name of the synchronization discipline, or of the non-engine strategy.
    #[must_use]
    pub fn strategy_name(&self) -> String {
        match self.strategy {
            Strategy::Sequential => "sequential".to_owned(),
            Strategy::Parallel(config) => config.discipline().to_string(),
            Strategy::Pipeline => "pipeline".to_owned(),
        }
    }

    /// The scheduling policy, if the trial ran on the execution engine.
    #[must_use]
    pub fn policy(&self) -> Option<SchedulingPolicy> {
        match self.strategy {
            Strategy::Parallel(config) => Some(config.policy()),
            Strategy::Sequential | Strategy::Pipeline => None,
        }
    }

    /// Number of threads that did the work.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Wall-clock time of the measured part of the trial.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// The computed result.
    #[must_use]
    pub fn result(&self) -> ResultValue {
        self.result
    }

    /// Number of synchronization points passed while combining results.
    #[must_use]
    pub fn combines(&self) -> usize {
        self.combines
    }

    /// Whether the result agreed with the sequential reference.
    #[must_use]
    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    /// Attaches a verdict to the record.
    #[must_use]
    pub fn with_verdict(self, verdict: Verdict) -> Self {
        Self { verdict, ..self }
    }

    /// Judges the result of the record against `reference` and attaches the verdict.
    #[must_use]
    pub fn verified_against(self, reference: ResultValue, tolerance: Tolerance) -> Self {
        let verdict = Verdict::judge(reference, self.result, tolerance);
        self.with_verdict(verdict)
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;
    use crate::Discipline;

    assert_impl_all!(ExecutionRecord: Send, Sync, Debug, Clone);

    fn record(strategy: Strategy) -> ExecutionRecord {
        ExecutionRecord::new(
            "vector sum (n=3)".to_owned(),
            strategy,
            2,
            Duration::from_millis(5),
            ResultValue::Integer(6),
            2,
        )
    }

    #[test]
    fn new_record_is_unverified() {
        assert_eq!(record(Strategy::Sequential).verdict(), Verdict::Unverified);
    }

    #[test]
    fn names_follow_strategy() {
        let config =
            StrategyConfig::new(Discipline::ExplicitLock, SchedulingPolicy::guided(), 2).unwrap();

        let parallel = record(Strategy::Parallel(config));
        assert_eq!(parallel.strategy_name(), "lock");
        assert_eq!(parallel.policy(), Some(SchedulingPolicy::guided()));

        let pipeline = record(Strategy::Pipeline);
        assert_eq!(pipeline.strategy_name(), "pipeline");
        assert_eq!(pipeline.policy(), None);
    }

    #[test]
    fn verification_attaches_verdict() {
        let passed = record(Strategy::Sequential)
            .verified_against(ResultValue::Integer(6), Tolerance::Exact);
        assert_eq!(passed.verdict(), Verdict::Pass);

        let failed = record(Strategy::Sequential)
            .verified_against(ResultValue::Integer(5), Tolerance::Exact);
        assert!(failed.verdict().is_failure());
        assert_eq!(failed.result(), ResultValue::Integer(6));
    }
}
