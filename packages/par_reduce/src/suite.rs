//! The catalog of benchmark experiments and the runner that turns them into a [`Report`].

use std::iter;
use std::num::NonZero;
use std::str::FromStr;
use std::sync::Arc;

use itertools::iproduct;
use tracing::{debug, warn};

use crate::pipeline::{PipelineConfig, run_pipeline, run_sequential_pipeline};
use crate::services::MonotonicClock;
use crate::source::DEFAULT_MAX_COST;
use crate::{
    Dimensions, Discipline, DotProduct, ElementRange, Error, ExecutionEngine, ExecutionRecord,
    MaxOfRowMins, NestedRowMins, RectangleIntegral, ReduceOp, Report, Result, SchedulingPolicy,
    SkewedTasks, Strategy, StrategyConfig, TrialError, Value, VectorReduction, Verdict, Verifier,
    Workload, WorkloadKind, WorkloadSource,
};

/// One comparison of strategies on a family of workloads.
#[derive(Clone, Copy, Debug, derive_more::Display, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum Experiment {
    /// Minimum and maximum of an integer vector.
    #[display("minmax")]
    MinMax,

    /// Dot product of two integer vectors.
    #[display("dot-int")]
    IntegerDotProduct,

    /// Rectangle-rule integral of `x³`.
    #[display("integral")]
    Integral,

    /// Maximum of the row minima of a dense matrix.
    #[display("row-mins")]
    RowMins,

    /// Maximum of the row minima of banded and triangular matrices, under every scheduling
    /// policy.
    #[display("band-tri")]
    BandedTriangular,

    /// Tasks of random cost, under every scheduling policy.
    #[display("skewed")]
    Skewed,

    /// Sum of a vector of ones, also with one combine per element.
    #[display("sum")]
    Sum,

    /// Dot product of two float vectors.
    #[display("dot-float")]
    FloatDotProduct,

    /// Dot products of vector pairs handed from a producer thread to a consumer thread.
    #[display("pipeline")]
    Pipeline,

    /// Maximum of row minima with a parallel trial per row inside a parallel trial over rows.
    #[display("nested")]
    Nested,
}

impl Experiment {
    /// Every experiment, in the order the suite runs them.
    pub const ALL: [Self; 10] = [
        Self::MinMax,
        Self::IntegerDotProduct,
        Self::Integral,
        Self::RowMins,
        Self::BandedTriangular,
        Self::Skewed,
        Self::Sum,
        Self::FloatDotProduct,
        Self::Pipeline,
        Self::Nested,
    ];

    /// One line describing what the experiment compares.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::MinMax => "min and max of integers in [-50, 50], every discipline",
            Self::IntegerDotProduct => "dot product of integers in [0, 99], every discipline",
            Self::Integral => "integral of x^3 on [0, 1e6] with left rectangles, every discipline",
            Self::RowMins => "max of row mins of a dense matrix, every discipline",
            Self::BandedTriangular => {
                "max of row mins of banded and triangular matrices, every policy"
            }
            Self::Skewed => "sum of sin(k)cos(k) tasks with random cost, every policy",
            Self::Sum => "sum of ones, static ranges and one combine per element, every discipline",
            Self::FloatDotProduct => "dot product of floats in [0, 1), every discipline",
            Self::Pipeline => "producer/consumer dot products through one-shot slots",
            Self::Nested => "max of row mins with a parallel inner trial per row, against the flat scan",
        }
    }
}

/// How big the data of every experiment is.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum Scale {
    /// Tiny data that runs in moments. Meant for tests.
    Smoke,

    /// Data big enough for meaningful timings without a long wait.
    #[default]
    Standard,

    /// The largest sizes. Needs several gigabytes of memory.
    Full,
}

impl Scale {
    /// Picks the value matching this scale.
    fn pick<T>(self, smoke: T, standard: T, full: T) -> T {
        match self {
            Self::Smoke => smoke,
            Self::Standard => standard,
            Self::Full => full,
        }
    }
}

impl FromStr for Scale {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "smoke" => Ok(Self::Smoke),
            "standard" => Ok(Self::Standard),
            "full" => Ok(Self::Full),
            other => Err(Error::configuration(format!(
                "unknown scale '{other}', expected smoke, standard or full"
            ))),
        }
    }
}

/// What the suite runs.
#[derive(Clone, Debug)]
pub struct SuiteConfig {
    workers: Vec<NonZero<usize>>,
    seed: u64,
    scale: Scale,
    filter: Option<String>,
}

impl SuiteConfig {
    /// Creates a suite configuration.
    ///
    /// Every parallel strategy is tried with each of the `workers` counts. Only experiments
    /// whose name contains `filter` are run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `workers` is empty or contains zero.
    pub fn new(workers: &[usize], seed: u64, scale: Scale, filter: Option<String>) -> Result<Self> {
        if workers.is_empty() {
            return Err(Error::configuration("at least one worker count is needed"));
        }

        let workers = workers
            .iter()
            .map(|&count| {
                NonZero::new(count)
                    .ok_or_else(|| Error::configuration("worker count must be at least 1"))
            })
            .collect::<Result<_>>()?;

        Ok(Self {
            workers,
            seed,
            scale,
            filter,
        })
    }

    /// The experiments selected by the filter.
    #[must_use]
    pub fn experiments(&self) -> Vec<Experiment> {
        Experiment::ALL
            .into_iter()
            .filter(|experiment| {
                self.filter
                    .as_deref()
                    .is_none_or(|filter| experiment.to_string().contains(filter))
            })
            .collect()
    }

    /// The worker counts every parallel strategy is tried with.
    #[must_use]
    pub fn workers(&self) -> &[NonZero<usize>] {
        &self.workers
    }

    /// The seed all data is generated from.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// How big the data is.
    #[must_use]
    pub fn scale(&self) -> Scale {
        self.scale
    }
}

/// Runs every selected experiment and collects the results.
///
/// A trial that fails is recorded in the report and the suite moves on to the next one.
///
/// # Errors
///
/// Returns an error if the data of an experiment cannot be generated.
pub fn run_suite(config: &SuiteConfig) -> Result<Report> {
    let mut suite = Suite {
        config,
        source: WorkloadSource::new(),
        engine: ExecutionEngine::new(),
        verifier: Verifier::new(),
        report: Report::new(),
    };

    for experiment in config.experiments() {
        debug!(%experiment, scale = ?config.scale, "running experiment");
        suite.run(experiment)?;
    }

    Ok(suite.report)
}

struct Suite<'a> {
    config: &'a SuiteConfig,
    source: WorkloadSource,
    engine: ExecutionEngine,
    verifier: Verifier,
    report: Report,
}

impl Suite<'_> {
    fn run(&mut self, experiment: Experiment) -> Result<()> {
        let scale = self.config.scale;
        let seed = self.config.seed;

        match experiment {
            Experiment::MinMax => {
                let data = self
                    .source
                    .generate(
                        WorkloadKind::DenseVector(ElementRange::Integers { min: -50, max: 50 }),
                        Dimensions::Length(scale.pick(100, 5000, 5000)),
                        seed,
                    )?
                    .into_integers()?;

                let strategies = self.strategies(&Discipline::ALL, &[SchedulingPolicy::Static])?;

                for op in [ReduceOp::Min, ReduceOp::Max] {
                    let workload = VectorReduction::new(Arc::clone(&data), op);
                    self.compare(&workload, &strategies);
                }
            }
            Experiment::IntegerDotProduct => {
                let kind = WorkloadKind::DenseVector(ElementRange::Integers { min: 0, max: 99 });
                let len = Dimensions::Length(scale.pick(1000, 1_000_000, 100_000_000));

                let left = self.source.generate(kind, len, seed)?.into_integers()?;
                let right = self
                    .source
                    .generate(kind, len, seed.wrapping_add(1))?
                    .into_integers()?;

                let strategies = self.strategies(&Discipline::ALL, &[SchedulingPolicy::Static])?;
                self.compare(&DotProduct::new(left, right)?, &strategies);
            }
            Experiment::Integral => {
                let steps = scale.pick(1000, 1_000_000, 10_000_000);
                let workload = RectangleIntegral::cubic(0.0, 1e6, steps)?;

                let strategies = self.strategies(&Discipline::ALL, &[SchedulingPolicy::Static])?;
                self.compare(&workload, &strategies);
            }
            Experiment::RowMins => {
                let (rows, cols) = scale.pick((10, 100), (100, 10_000), (100, 10_000));
                let matrix = self
                    .source
                    .generate(
                        WorkloadKind::DenseMatrix { min: 0, max: 99 },
                        Dimensions::Grid { rows, cols },
                        seed,
                    )?
                    .into_matrix()?;

                let strategies = self.strategies(&Discipline::ALL, &[SchedulingPolicy::Static])?;
                self.compare(&MaxOfRowMins::new(matrix), &strategies);
            }
            Experiment::BandedTriangular => {
                let size = scale.pick(50, 4000, 10_000);
                let grid = Dimensions::Grid {
                    rows: size,
                    cols: size,
                };

                let strategies = self.strategies(
                    &[Discipline::AtomicUpdate, Discipline::ReductionDirective],
                    &all_policies(),
                )?;

                for kind in [
                    WorkloadKind::BandedMatrix { bandwidth: 10 },
                    WorkloadKind::TriangularMatrix,
                ] {
                    let matrix = self.source.generate(kind, grid, seed)?.into_matrix()?;
                    self.compare(&MaxOfRowMins::new(matrix), &strategies);
                }
            }
            Experiment::Skewed => {
                let costs = self
                    .source
                    .generate(
                        WorkloadKind::SyntheticCostSequence {
                            max_cost: DEFAULT_MAX_COST,
                        },
                        Dimensions::Length(scale.pick(200, 20_000, 100_000)),
                        seed,
                    )?
                    .into_costs()?;

                let strategies =
                    self.strategies(&[Discipline::ReductionDirective], &all_policies())?;
                self.compare(&SkewedTasks::new(costs), &strategies);
            }
            Experiment::Sum => {
                let ones: Arc<[i64]> =
                    iter::repeat_n(1, scale.pick(1000, 1_000_000, 10_000_000)).collect();

                let strategies = self.strategies(
                    &Discipline::ALL,
                    &[SchedulingPolicy::Static, SchedulingPolicy::dynamic()],
                )?;
                self.compare(&VectorReduction::new(ones, ReduceOp::Sum), &strategies);
            }
            Experiment::FloatDotProduct => {
                let kind = WorkloadKind::DenseVector(ElementRange::UnitFloats);
                let len = Dimensions::Length(scale.pick(1000, 1_000_000, 10_000_000));

                let left = self.source.generate(kind, len, seed)?.into_floats()?;
                let right = self
                    .source
                    .generate(kind, len, seed.wrapping_add(1))?
                    .into_floats()?;

                let strategies = self.strategies(&Discipline::ALL, &[SchedulingPolicy::Static])?;
                self.compare(&DotProduct::new(left, right)?, &strategies);
            }
            Experiment::Pipeline => {
                let (pairs, vector_len) = scale.pick((10, 100), (1000, 1000), (10_000, 10_000));
                self.pipeline(&PipelineConfig::new(pairs, vector_len, seed));
            }
            Experiment::Nested => {
                let (rows, cols) = scale.pick((8, 50), (100, 10_000), (100, 10_000));
                let matrix = self
                    .source
                    .generate(
                        WorkloadKind::DenseMatrix { min: 0, max: 99 },
                        Dimensions::Grid { rows, cols },
                        seed,
                    )?
                    .into_matrix()?;

                let inner = StrategyConfig::new(
                    Discipline::ReductionDirective,
                    SchedulingPolicy::Static,
                    2,
                )?;
                let strategies =
                    self.strategies(&[Discipline::ReductionDirective], &[SchedulingPolicy::Static])?;

                // The flat scan over the same matrix shows what the inner trials cost.
                self.compare(&NestedRowMins::new(Arc::clone(&matrix), inner), &strategies);
                self.compare(&MaxOfRowMins::new(matrix), &strategies);
            }
        }

        Ok(())
    }

    /// Every combination of discipline, policy and configured worker count.
    fn strategies(
        &self,
        disciplines: &[Discipline],
        policies: &[SchedulingPolicy],
    ) -> Result<Vec<StrategyConfig>> {
        iproduct!(disciplines, policies, &self.config.workers)
            .map(|(&discipline, &policy, workers)| {
                StrategyConfig::new(discipline, policy, workers.get())
            })
            .collect()
    }

    /// Records a sequential baseline for `workload`, then one verified record per strategy.
    fn compare<W: Workload>(&mut self, workload: &W, strategies: &[StrategyConfig]) {
        let label = workload.label();

        let reference = match self.verifier.reference(workload) {
            Ok(reference) => reference,
            Err(error) => {
                warn!(workload = label, %error, "sequential reference failed");
                self.report
                    .push_error(TrialError::new(label, "sequential", error));
                return;
            }
        };

        let expected = reference.value.to_result();

        self.report.push(
            ExecutionRecord::new(
                label.clone(),
                Strategy::Sequential,
                1,
                reference.elapsed,
                expected,
                0,
            )
            .with_verdict(Verdict::Pass),
        );

        for config in strategies {
            match self.engine.run(workload, config) {
                Ok(record) => {
                    let record = record.verified_against(expected, workload.tolerance());

                    if record.verdict().is_failure() {
                        warn!(
                            workload = label,
                            strategy = %config,
                            verdict = %record.verdict(),
                            "verification failed"
                        );
                    }

                    self.report.push(record);
                }
                Err(error) => {
                    self.report
                        .push_error(TrialError::new(label.clone(), config.to_string(), error));
                }
            }
        }
    }

    fn pipeline(&mut self, config: &PipelineConfig) {
        let clock = MonotonicClock::new();

        let reference = match run_sequential_pipeline(&self.source, config, &clock) {
            Ok(reference) => reference,
            Err(error) => {
                self.report
                    .push_error(TrialError::new("pipeline", "sequential", error));
                return;
            }
        };

        match run_pipeline(&self.source, config, &clock) {
            Ok(outcome) => {
                let verdict = outcome.verdict_against(&reference);

                self.report
                    .push(reference.into_record(Strategy::Sequential).with_verdict(Verdict::Pass));
                self.report
                    .push(outcome.into_record(Strategy::Pipeline).with_verdict(verdict));
            }
            Err(error) => {
                self.report
                    .push(reference.into_record(Strategy::Sequential).with_verdict(Verdict::Pass));
                self.report
                    .push_error(TrialError::new("pipeline", "pipeline", error));
            }
        }
    }
}

fn all_policies() -> [SchedulingPolicy; 3] {
    [
        SchedulingPolicy::Static,
        SchedulingPolicy::dynamic(),
        SchedulingPolicy::guided(),
    ]
}

#[cfg(test)]
mod tests {
    use std::ops::Range;

    use super::*;

    /// Succeeds only when one worker folds the whole domain.
    #[derive(Debug)]
    struct RejectsSplits {
        len: usize,
    }

    impl Workload for RejectsSplits {
        type Value = i64;

        fn label(&self) -> String {
            "rejects splits".to_owned()
        }

        fn domain_size(&self) -> usize {
            self.len
        }

        fn op(&self) -> ReduceOp {
            ReduceOp::Sum
        }

        fn evaluate(&self, _index: usize) -> Result<i64> {
            Ok(1)
        }

        fn fold_range(&self, range: Range<usize>, acc: i64) -> Result<i64> {
            if range.len() < self.len {
                return Err(Error::malformed(range.start, "range does not span the domain"));
            }

            Ok(acc + i64::try_from(range.len()).unwrap())
        }
    }

    /// Adds one too many for every range it folds.
    #[derive(Debug)]
    struct OffByOne {
        len: usize,
    }

    impl Workload for OffByOne {
        type Value = i64;

        fn label(&self) -> String {
            "off by one".to_owned()
        }

        fn domain_size(&self) -> usize {
            self.len
        }

        fn op(&self) -> ReduceOp {
            ReduceOp::Sum
        }

        fn evaluate(&self, _index: usize) -> Result<i64> {
            Ok(1)
        }

        fn fold_range(&self, range: Range<usize>, acc: i64) -> Result<i64> {
            Ok(acc + i64::try_from(range.len()).unwrap() + 1)
        }
    }

    fn smoke(filter: &str) -> SuiteConfig {
        SuiteConfig::new(&[1, 3], 42, Scale::Smoke, Some(filter.to_owned())).unwrap()
    }

    #[test]
    fn rejects_bad_worker_counts() {
        assert!(matches!(
            SuiteConfig::new(&[], 42, Scale::Smoke, None),
            Err(Error::Configuration { .. })
        ));
        assert!(matches!(
            SuiteConfig::new(&[4, 0], 42, Scale::Smoke, None),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn filter_selects_experiments() {
        assert_eq!(smoke("dot").experiments(), [
            Experiment::IntegerDotProduct,
            Experiment::FloatDotProduct
        ]);

        let all = SuiteConfig::new(&[1], 42, Scale::Smoke, None).unwrap();
        assert_eq!(all.experiments().len(), Experiment::ALL.len());
    }

    #[test]
    fn parses_scales() {
        assert_eq!("smoke".parse::<Scale>().unwrap(), Scale::Smoke);
        assert_eq!("full".parse::<Scale>().unwrap(), Scale::Full);
        assert!("huge".parse::<Scale>().is_err());
    }

    #[test]
    fn minmax_records_baseline_and_every_strategy() {
        let report = run_suite(&smoke("minmax")).unwrap();

        // Two workloads, each with a baseline plus 4 disciplines x 2 worker counts.
        assert_eq!(report.records().len(), 2 * (1 + 4 * 2));
        assert!(report.all_passed(), "{report}");

        assert!(matches!(
            report.records().first().unwrap().strategy(),
            Strategy::Sequential
        ));
    }

    #[test]
    fn band_tri_compares_every_policy() {
        let report = run_suite(&smoke("band-tri")).unwrap();

        // Two matrices, each with a baseline plus 2 disciplines x 3 policies x 2 worker counts.
        assert_eq!(report.records().len(), 2 * (1 + 2 * 3 * 2));
        assert!(report.all_passed(), "{report}");
    }

    #[test]
    fn failed_trials_do_not_stop_the_comparison() {
        let config = SuiteConfig::new(&[1, 2, 4], 42, Scale::Smoke, None).unwrap();
        let mut suite = Suite {
            config: &config,
            source: WorkloadSource::new(),
            engine: ExecutionEngine::new(),
            verifier: Verifier::new(),
            report: Report::new(),
        };

        let strategies = suite
            .strategies(&Discipline::ALL, &[SchedulingPolicy::Static])
            .unwrap();

        suite.compare(&RejectsSplits { len: 100 }, &strategies);
        suite.compare(&OffByOne { len: 100 }, &strategies);

        let report = suite.report;

        // Only the single-worker trials of every discipline complete.
        let completed = report
            .records()
            .iter()
            .filter(|r| r.workload() == "rejects splits")
            .count();
        assert_eq!(completed, 1 + 4);

        assert_eq!(report.errors().len(), 4 * 2);
        for trial in report.errors() {
            assert_eq!(trial.workload(), "rejects splits");
            assert!(matches!(trial.error(), Error::WorkerFailure { .. }));
        }

        // The next workload still runs every strategy, and every one of them mismatches.
        let mismatched: Vec<_> = report
            .records()
            .iter()
            .filter(|r| r.workload() == "off by one")
            .collect();
        assert_eq!(mismatched.len(), 1 + 4 * 3);
        assert!(!mismatched.first().unwrap().verdict().is_failure());
        assert!(mismatched.iter().skip(1).all(|r| r.verdict().is_failure()));

        assert!(!report.all_passed());
    }

    #[test]
    fn nested_is_compared_with_flat_scan() {
        let report = run_suite(&smoke("nested")).unwrap();

        // Nested and flat, each with a baseline plus one strategy x 2 worker counts.
        assert_eq!(report.records().len(), 2 * (1 + 2));
        assert!(report.all_passed(), "{report}");

        let nested = report.records().first().unwrap();
        let flat = report.records().get(3).unwrap();
        assert!(nested.workload().contains("nested"));
        assert!(!flat.workload().contains("nested"));
        assert_eq!(nested.result(), flat.result());
    }

    #[test]
    fn pipeline_passes() {
        let report = run_suite(&smoke("pipeline")).unwrap();

        assert_eq!(report.records().len(), 2);
        assert!(report.all_passed(), "{report}");
    }

    #[test]
    fn whole_smoke_suite_passes() {
        let config = SuiteConfig::new(&[1, 2, 4], 7, Scale::Smoke, None).unwrap();

        let report = run_suite(&config).unwrap();

        assert!(report.errors().is_empty(), "{report}");
        assert!(report.all_passed(), "{report}");
    }
}
