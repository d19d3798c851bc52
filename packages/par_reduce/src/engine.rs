use std::any::Any;
use std::fmt::{self, Display};
use std::num::NonZero;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::services::{Clock, MonotonicClock};
use crate::{
    Combiner, Discipline, Error, ExecutionRecord, Partitioner, Result, SchedulingPolicy, Strategy,
    Value, Workload,
};

/// How a trial distributes and combines its work.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct StrategyConfig {
    discipline: Discipline,
    policy: SchedulingPolicy,
    workers: NonZero<usize>,
}

impl StrategyConfig {
    /// Creates a strategy with `workers` concurrent workers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `workers` is zero.
    pub fn new(discipline: Discipline, policy: SchedulingPolicy, workers: usize) -> Result<Self> {
        let workers = NonZero::new(workers)
            .ok_or_else(|| Error::configuration("worker count must be at least 1"))?;

        Ok(Self {
            discipline,
            policy,
            workers,
        })
    }

    /// How partial results are combined.
    #[must_use]
    pub fn discipline(&self) -> Discipline {
        self.discipline
    }

    /// How the domain is divided among workers.
    #[must_use]
    pub fn policy(&self) -> SchedulingPolicy {
        self.policy
    }

    /// Number of concurrent workers.
    #[must_use]
    pub fn workers(&self) -> NonZero<usize> {
        self.workers
    }
}

impl Display for StrategyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} x{}", self.discipline, self.policy, self.workers)
    }
}

/// Runs workloads on concurrent workers and measures how long they take.
///
/// Every call to [`run()`][Self::run] gets a fresh partitioner, a fresh shared result and
/// its own set of worker threads. Nothing carries over from one trial to the next.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use par_reduce::{
///     Discipline, ExecutionEngine, ReduceOp, ResultValue, SchedulingPolicy, StrategyConfig,
///     VectorReduction,
/// };
///
/// let data: Arc<[i64]> = (1..=100).collect();
/// let workload = VectorReduction::new(data, ReduceOp::Sum);
/// let config = StrategyConfig::new(Discipline::AtomicUpdate, SchedulingPolicy::dynamic(), 4)?;
///
/// let record = ExecutionEngine::new().run(&workload, &config)?;
///
/// assert_eq!(record.result(), ResultValue::Integer(5050));
/// # Ok::<(), par_reduce::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct ExecutionEngine<C = MonotonicClock> {
    clock: C,
}

impl ExecutionEngine {
    /// Creates an engine that measures with the monotonic clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clock: MonotonicClock::new(),
        }
    }
}

impl<C: Clock> ExecutionEngine<C> {
    /// Creates an engine that measures with a custom clock.
    #[must_use]
    pub fn with_clock(clock: C) -> Self {
        Self { clock }
    }

    /// Executes `workload` with the given strategy and blocks until every worker has finished.
    ///
    /// The returned record has no verdict yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for a minimum or maximum over an empty domain. If any
    /// worker fails, the trial is aborted and the failure of the lowest-numbered failing worker
    /// is returned as [`Error::WorkerFailure`], [`Error::WorkerPanicked`] or
    /// [`Error::ThreadSpawn`].
    pub fn run<W: Workload>(&self, workload: &W, config: &StrategyConfig) -> Result<ExecutionRecord> {
        let execution = execute(workload, config, &self.clock)?;

        Ok(ExecutionRecord::new(
            workload.label(),
            Strategy::Parallel(*config),
            config.workers().get(),
            execution.elapsed,
            execution.value.to_result(),
            execution.combines,
        ))
    }
}

/// The typed outcome of one parallel execution.
#[derive(Debug)]
pub(crate) struct Execution<V> {
    pub(crate) value: V,
    pub(crate) elapsed: Duration,
    pub(crate) combines: usize,
}

pub(crate) fn execute<W: Workload, C: Clock + ?Sized>(
    workload: &W,
    config: &StrategyConfig,
    clock: &C,
) -> Result<Execution<W::Value>> {
    let op = workload.op();
    let domain = workload.domain_size();

    if domain == 0 && !op.defined_on_empty() {
        return Err(Error::configuration(format!(
            "{op} of an empty domain is undefined"
        )));
    }

    let partitioner = Partitioner::new(domain, config.workers(), config.policy());
    let combiner = Combiner::<W::Value>::new(config.discipline(), op, config.workers());
    let abort = AtomicBool::new(false);

    debug!(workload = workload.label(), strategy = %config, "starting trial");

    let start = clock.now();

    let outcomes = thread::scope(|s| {
        let mut handles = Vec::with_capacity(config.workers().get());

        for worker in 0..config.workers().get() {
            let partitioner = &partitioner;
            let combiner = &combiner;
            let abort = &abort;
            let discipline = config.discipline();

            let spawned = thread::Builder::new()
                .name(format!("par_reduce-w{worker}"))
                .spawn_scoped(s, move || {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                        work(worker, workload, partitioner, combiner, discipline, abort)
                    }))
                    .unwrap_or_else(|payload| {
                        Err(Error::WorkerPanicked {
                            worker,
                            message: panic_message(payload.as_ref()),
                        })
                    });

                    if outcome.is_err() {
                        abort.store(true, Ordering::Relaxed);
                    }

                    outcome
                });

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    abort.store(true, Ordering::Relaxed);

                    // The threads already started see the abort flag and finish early.
                    let mut outcomes = join_all(handles);
                    outcomes.push(Err(Error::ThreadSpawn { worker, source }));
                    return outcomes;
                }
            }
        }

        join_all(handles)
    });

    let combines = combiner.combines();
    let value = combiner.into_value();
    let elapsed = clock.now().saturating_sub(start);

    if let Some(error) = outcomes.into_iter().find_map(|outcome| outcome.err()) {
        warn!(workload = workload.label(), strategy = %config, %error, "trial aborted");
        return Err(error);
    }

    debug!(
        workload = workload.label(),
        strategy = %config,
        ?elapsed,
        combines,
        "finished trial"
    );

    Ok(Execution {
        value,
        elapsed,
        combines,
    })
}

fn join_all(handles: Vec<thread::ScopedJoinHandle<'_, Result<()>>>) -> Vec<Result<()>> {
    handles
        .into_iter()
        .enumerate()
        .map(|(worker, handle)| {
            handle.join().unwrap_or_else(|payload| {
                Err(Error::WorkerPanicked {
                    worker,
                    message: panic_message(payload.as_ref()),
                })
            })
        })
        .collect()
}

/// The loop of one worker: pull a range, fold it, combine, until the partitioner runs dry.
fn work<W: Workload>(
    worker: usize,
    workload: &W,
    partitioner: &Partitioner,
    combiner: &Combiner<W::Value>,
    discipline: Discipline,
    abort: &AtomicBool,
) -> Result<()> {
    let op = workload.op();
    let once_per_worker = discipline.combines_once_per_worker();

    let mut partial = op.identity::<W::Value>();

    let wrap = |source| Error::WorkerFailure {
        worker,
        source: Box::new(source),
    };

    while !abort.load(Ordering::Relaxed) {
        let Some(range) = partitioner.next_range(worker) else {
            break;
        };

        trace!(worker, start = range.start, end = range.end, "pulled range");

        if once_per_worker {
            partial = workload.fold_range(range, partial).map_err(wrap)?;
        } else {
            let local = workload.fold_range(range, op.identity()).map_err(wrap)?;
            combiner.combine(worker, local).map_err(wrap)?;
        }
    }

    if once_per_worker && !abort.load(Ordering::Relaxed) {
        combiner.combine(worker, partial).map_err(wrap)?;
    }

    trace!(worker, "worker finished");

    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use std::ops::Range;
    use std::sync::Arc;
    use std::sync::atomic::AtomicU64;

    use new_zealand::nz;
    use static_assertions::assert_impl_all;

    use super::*;
    use crate::{ReduceOp, ResultValue, VectorReduction};

    assert_impl_all!(ExecutionEngine: Send, Sync);
    assert_impl_all!(StrategyConfig: Send, Sync, Copy);

    /// Advances by one millisecond on every reading.
    #[derive(Debug, Default)]
    struct SteppingClock {
        ticks: AtomicU64,
    }

    impl Clock for SteppingClock {
        fn now(&self) -> Duration {
            Duration::from_millis(self.ticks.fetch_add(1, Ordering::Relaxed))
        }
    }

    /// Sums indexes but fails on one of them.
    #[derive(Debug)]
    struct FailsAt {
        domain: usize,
        bad_index: usize,
        panics: bool,
    }

    impl Workload for FailsAt {
        type Value = i64;

        fn label(&self) -> String {
            "fails".to_owned()
        }

        fn domain_size(&self) -> usize {
            self.domain
        }

        fn op(&self) -> ReduceOp {
            ReduceOp::Sum
        }

        fn evaluate(&self, index: usize) -> Result<i64> {
            if index == self.bad_index {
                assert!(!self.panics, "element {index} exploded");
                return Err(Error::malformed(index, "bad element"));
            }

            Ok(i64::try_from(index).unwrap())
        }

        fn fold_range(&self, range: Range<usize>, acc: i64) -> Result<i64> {
            range.clone().try_fold(acc, |acc, i| Ok(acc + self.evaluate(i)?))
        }
    }

    fn config(discipline: Discipline, policy: SchedulingPolicy, workers: usize) -> StrategyConfig {
        StrategyConfig::new(discipline, policy, workers).unwrap()
    }

    #[test]
    fn zero_workers_is_configuration_error() {
        assert!(matches!(
            StrategyConfig::new(Discipline::AtomicUpdate, SchedulingPolicy::Static, 0),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn every_discipline_and_policy_sums_correctly() {
        let data: Arc<[i64]> = (1..=1000).collect();
        let workload = VectorReduction::new(data, ReduceOp::Sum);
        let engine = ExecutionEngine::new();

        for discipline in Discipline::ALL {
            for policy in [
                SchedulingPolicy::Static,
                SchedulingPolicy::dynamic(),
                SchedulingPolicy::guided(),
            ] {
                for workers in [1, 2, 3, 8] {
                    let record = engine
                        .run(&workload, &config(discipline, policy, workers))
                        .unwrap();

                    assert_eq!(
                        record.result(),
                        ResultValue::Integer(500_500),
                        "{discipline}/{policy} x{workers}"
                    );
                }
            }
        }
    }

    #[test]
    fn elapsed_comes_from_clock() {
        let data: Arc<[i64]> = Arc::from(vec![1, 2, 3]);
        let workload = VectorReduction::new(data, ReduceOp::Max);
        let engine = ExecutionEngine::with_clock(SteppingClock::default());

        let record = engine
            .run(
                &workload,
                &config(Discipline::CriticalSection, SchedulingPolicy::Static, 2),
            )
            .unwrap();

        assert_eq!(record.elapsed(), Duration::from_millis(1));
        assert_eq!(record.workers(), 2);
        assert_eq!(record.strategy_name(), "critical");
    }

    #[test]
    fn reduction_combines_once_per_worker() {
        let data: Arc<[i64]> = (0..100).collect();
        let workload = VectorReduction::new(data, ReduceOp::Sum);
        let engine = ExecutionEngine::new();

        let reduction = engine
            .run(
                &workload,
                &config(Discipline::ReductionDirective, SchedulingPolicy::dynamic(), 4),
            )
            .unwrap();
        assert_eq!(reduction.combines(), 4);

        let atomic = engine
            .run(
                &workload,
                &config(Discipline::AtomicUpdate, SchedulingPolicy::dynamic(), 4),
            )
            .unwrap();
        assert_eq!(atomic.combines(), 100);
    }

    #[test]
    fn empty_min_is_configuration_error() {
        let data: Arc<[i64]> = Arc::from(Vec::new());
        let workload = VectorReduction::new(data, ReduceOp::Min);

        let result = ExecutionEngine::new().run(
            &workload,
            &config(Discipline::AtomicUpdate, SchedulingPolicy::Static, 4),
        );

        assert!(matches!(result, Err(Error::Configuration { .. })));
    }

    #[test]
    fn empty_sum_is_zero() {
        let data: Arc<[i64]> = Arc::from(Vec::new());
        let workload = VectorReduction::new(data, ReduceOp::Sum);

        let record = ExecutionEngine::new()
            .run(
                &workload,
                &config(Discipline::ReductionDirective, SchedulingPolicy::guided(), 4),
            )
            .unwrap();

        assert_eq!(record.result(), ResultValue::Integer(0));
    }

    #[test]
    fn worker_error_aborts_trial() {
        let workload = FailsAt {
            domain: 1000,
            bad_index: 500,
            panics: false,
        };

        for discipline in Discipline::ALL {
            let result = ExecutionEngine::new().run(
                &workload,
                &config(discipline, SchedulingPolicy::dynamic(), 4),
            );

            let Err(Error::WorkerFailure { source, .. }) = result else {
                panic!("expected worker failure with {discipline}, got {result:?}");
            };

            assert!(matches!(*source, Error::MalformedInput { index: 500, .. }));
        }
    }

    #[test]
    fn static_failure_names_owning_worker() {
        let workload = FailsAt {
            domain: 100,
            bad_index: 60,
            panics: false,
        };

        let result = ExecutionEngine::new().run(
            &workload,
            &config(Discipline::CriticalSection, SchedulingPolicy::Static, 4),
        );

        // Worker 2 owns indexes 50..75.
        assert!(matches!(result, Err(Error::WorkerFailure { worker: 2, .. })));
    }

    #[test]
    fn worker_panic_aborts_trial() {
        let workload = FailsAt {
            domain: 100,
            bad_index: 10,
            panics: true,
        };

        let result = ExecutionEngine::new().run(
            &workload,
            &config(Discipline::ExplicitLock, SchedulingPolicy::Static, 2),
        );

        let Err(Error::WorkerPanicked { worker, message }) = result else {
            panic!("expected worker panic, got {result:?}");
        };

        assert_eq!(worker, 0);
        assert!(message.contains("element 10 exploded"), "{message}");
    }

    #[test]
    fn single_element_is_the_result() {
        let data: Arc<[i64]> = Arc::from(vec![-42]);

        for discipline in Discipline::ALL {
            for op in [ReduceOp::Min, ReduceOp::Max, ReduceOp::Sum] {
                let workload = VectorReduction::new(Arc::clone(&data), op);

                let record = ExecutionEngine::new()
                    .run(
                        &workload,
                        &config(discipline, SchedulingPolicy::Guided { min_chunk: nz!(3) }, 8),
                    )
                    .unwrap();

                assert_eq!(record.result(), ResultValue::Integer(-42), "{discipline} {op}");
            }
        }
    }

    #[test]
    fn display_config() {
        let config = config(Discipline::AtomicUpdate, SchedulingPolicy::dynamic(), 8);

        assert_eq!(config.to_string(), "atomic/dynamic(1) x8");
    }
}
