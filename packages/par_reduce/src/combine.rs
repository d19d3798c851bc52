use std::cell::UnsafeCell;
use std::fmt::{self, Debug};
use std::num::NonZero;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::lock_api::RawMutex as _;
use parking_lot::{Mutex, RawMutex};

use crate::{Error, ReduceOp, Result, Value};

/// The synchronization mechanism that merges partial results into the shared result.
#[derive(Clone, Copy, Debug, derive_more::Display, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum Discipline {
    /// Every combine is one atomic read-modify-write of the shared result.
    #[display("atomic")]
    AtomicUpdate,

    /// Combines are serialized by a scoped mutual-exclusion region.
    #[display("critical")]
    CriticalSection,

    /// Combines are serialized by a lock that is acquired and released explicitly.
    #[display("lock")]
    ExplicitLock,

    /// Every worker keeps a private result for the whole trial and hands it over once, at
    /// exit. The private results are merged after all workers have finished.
    #[display("reduction")]
    ReductionDirective,
}

impl Discipline {
    /// Every discipline, in the order they are usually compared.
    pub const ALL: [Self; 4] = [
        Self::AtomicUpdate,
        Self::CriticalSection,
        Self::ExplicitLock,
        Self::ReductionDirective,
    ];

    /// Whether workers combine once per trial instead of once per range.
    #[must_use]
    pub fn combines_once_per_worker(self) -> bool {
        matches!(self, Self::ReductionDirective)
    }
}

/// Accumulates partial results from concurrent workers into one shared result.
///
/// The final value does not depend on the order in which combines arrive, as long as the
/// operation is associative and commutative. For the reduction discipline the per-worker
/// results are merged in worker order, which makes floating-point sums reproducible for a
/// given partitioning.
#[derive(Debug)]
pub struct Combiner<V: Value> {
    op: ReduceOp,
    shared: Shared<V>,

    // Number of synchronization points passed so far.
    combines: AtomicUsize,
}

#[derive(Debug)]
enum Shared<V: Value> {
    Atomic(AtomicU64),
    Critical(Mutex<V>),
    Lock(ExplicitLock<V>),
    PerWorker(Box<[OnceLock<V>]>),
}

impl<V: Value> Combiner<V> {
    /// Creates a combiner whose shared result starts at the identity of `op`.
    ///
    /// `workers` is the number of workers that will combine into it.
    #[must_use]
    pub fn new(discipline: Discipline, op: ReduceOp, workers: NonZero<usize>) -> Self {
        let identity = op.identity::<V>();

        let shared = match discipline {
            Discipline::AtomicUpdate => Shared::Atomic(AtomicU64::new(identity.to_bits())),
            Discipline::CriticalSection => Shared::Critical(Mutex::new(identity)),
            Discipline::ExplicitLock => Shared::Lock(ExplicitLock::new(identity)),
            Discipline::ReductionDirective => {
                Shared::PerWorker((0..workers.get()).map(|_| OnceLock::new()).collect())
            }
        };

        Self {
            op,
            shared,
            combines: AtomicUsize::new(0),
        }
    }

    /// Folds a partial result of `worker` into the shared result.
    ///
    /// # Errors
    ///
    /// With the reduction discipline, each worker may combine exactly once. Returns
    /// [`Error::Configuration`] if `worker` is not one of the workers the combiner was created
    /// for or if it has already combined.
    pub fn combine(&self, worker: usize, partial: V) -> Result<()> {
        let op = self.op;

        match &self.shared {
            Shared::Atomic(bits) => {
                let updated = bits.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                    Some(op.apply(V::from_bits(current), partial).to_bits())
                });
                debug_assert!(updated.is_ok());
            }
            Shared::Critical(value) => {
                let mut value = value.lock();
                *value = op.apply(*value, partial);
            }
            Shared::Lock(lock) => lock.update(|value| op.apply(value, partial)),
            Shared::PerWorker(slots) => {
                let slot = slots.get(worker).ok_or_else(|| {
                    Error::configuration(format!(
                        "worker {worker} is not one of the {} combining workers",
                        slots.len()
                    ))
                })?;

                if slot.set(partial).is_err() {
                    return Err(Error::configuration(format!(
                        "worker {worker} combined more than once"
                    )));
                }
            }
        }

        self.combines.fetch_add(1, Ordering::Relaxed);

        Ok(())
    }

    /// Number of combines performed so far.
    #[must_use]
    pub fn combines(&self) -> usize {
        self.combines.load(Ordering::Relaxed)
    }

    /// Consumes the combiner and returns the shared result.
    ///
    /// Taking `self` by value guarantees that no worker can still be combining.
    #[must_use]
    pub fn into_value(self) -> V {
        let op = self.op;

        match self.shared {
            Shared::Atomic(bits) => V::from_bits(bits.into_inner()),
            Shared::Critical(value) => value.into_inner(),
            Shared::Lock(lock) => lock.into_inner(),
            Shared::PerWorker(slots) => slots
                .into_iter()
                .filter_map(OnceLock::into_inner)
                .fold(op.identity(), |acc, partial| op.apply(acc, partial)),
        }
    }
}

/// A value guarded by a raw lock that is taken and released by hand.
struct ExplicitLock<V> {
    raw: RawMutex,
    value: UnsafeCell<V>,
}

// SAFETY: The value is only accessed while `raw` is held, which makes access exclusive.
unsafe impl<V: Send> Sync for ExplicitLock<V> {}

impl<V: Copy> ExplicitLock<V> {
    fn new(value: V) -> Self {
        Self {
            raw: RawMutex::INIT,
            value: UnsafeCell::new(value),
        }
    }

    fn update(&self, f: impl FnOnce(V) -> V) {
        self.raw.lock();

        let value = self.value.get();

        // SAFETY: We hold the lock, so no other reference to the value exists.
        unsafe {
            *value = f(*value);
        }

        // SAFETY: The lock was acquired above by this thread.
        unsafe {
            self.raw.unlock();
        }
    }

    fn into_inner(self) -> V {
        self.value.into_inner()
    }
}

impl<V> Debug for ExplicitLock<V> {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExplicitLock")
            .field("locked", &self.raw.is_locked())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use new_zealand::nz;
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Combiner<i64>: Send, Sync, Debug);
    assert_impl_all!(Combiner<f64>: Send, Sync, Debug);

    #[test]
    fn concurrent_sums_are_exact_for_every_discipline() {
        const WORKERS: usize = 8;
        const PER_WORKER: i64 = 1000;

        for discipline in Discipline::ALL {
            let combiner = Combiner::<i64>::new(discipline, ReduceOp::Sum, nz!(8));

            thread::scope(|s| {
                for worker in 0..WORKERS {
                    let combiner = &combiner;

                    s.spawn(move || {
                        if discipline.combines_once_per_worker() {
                            combiner.combine(worker, PER_WORKER).unwrap();
                        } else {
                            for _ in 0..PER_WORKER {
                                combiner.combine(worker, 1).unwrap();
                            }
                        }
                    });
                }
            });

            assert_eq!(combiner.into_value(), 8 * PER_WORKER, "{discipline}");
        }
    }

    #[test]
    fn min_and_max_start_from_identity() {
        for discipline in Discipline::ALL {
            let min = Combiner::<i64>::new(discipline, ReduceOp::Min, nz!(2));
            min.combine(0, -1).unwrap();
            min.combine(1, 3).unwrap();
            assert_eq!(min.into_value(), -1, "{discipline}");

            let max = Combiner::<f64>::new(discipline, ReduceOp::Max, nz!(2));
            max.combine(0, -0.5).unwrap();
            max.combine(1, -2.0).unwrap();
            assert!((max.into_value() - -0.5).abs() < f64::EPSILON, "{discipline}");
        }
    }

    #[test]
    fn untouched_combiner_holds_identity() {
        let combiner = Combiner::<i64>::new(Discipline::AtomicUpdate, ReduceOp::Min, nz!(1));
        assert_eq!(combiner.into_value(), i64::MAX);

        let combiner = Combiner::<i64>::new(Discipline::ReductionDirective, ReduceOp::Sum, nz!(4));
        assert_eq!(combiner.into_value(), 0);
    }

    #[test]
    fn reduction_rejects_second_combine() {
        let combiner = Combiner::<i64>::new(Discipline::ReductionDirective, ReduceOp::Sum, nz!(2));

        combiner.combine(1, 5).unwrap();

        assert!(matches!(
            combiner.combine(1, 5),
            Err(Error::Configuration { .. })
        ));
        assert!(matches!(
            combiner.combine(2, 5),
            Err(Error::Configuration { .. })
        ));
        assert_eq!(combiner.combines(), 1);
    }

    #[test]
    fn reduction_merges_in_worker_order() {
        // In arrival order the small value is lost to rounding and the sum is zero. In worker
        // order the large values cancel first and the small value survives.
        let combiner = Combiner::<f64>::new(Discipline::ReductionDirective, ReduceOp::Sum, nz!(3));

        combiner.combine(2, 1.0).unwrap();
        combiner.combine(1, -1e16).unwrap();
        combiner.combine(0, 1e16).unwrap();

        assert!((combiner.into_value() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn counts_every_combine() {
        let combiner = Combiner::<i64>::new(Discipline::CriticalSection, ReduceOp::Sum, nz!(1));

        for _ in 0..5 {
            combiner.combine(0, 1).unwrap();
        }

        assert_eq!(combiner.combines(), 5);
    }

    #[test]
    fn display_names() {
        let names: Vec<_> = Discipline::ALL.iter().map(ToString::to_string).collect();

        assert_eq!(names, ["atomic", "critical", "lock", "reduction"]);
    }
}
