use std::num::NonZero;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use new_zealand::nz;
use num_integer::Integer;
use parking_lot::Mutex;

/// How the index domain of a workload is divided among workers.
#[derive(Clone, Copy, Debug, derive_more::Display, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum SchedulingPolicy {
    /// The domain is split up front into one contiguous range per worker.
    #[display("static")]
    Static,

    /// Workers repeatedly pull fixed-size chunks from a shared cursor.
    #[display("dynamic({chunk})")]
    Dynamic {
        /// Number of indexes per chunk.
        chunk: NonZero<usize>,
    },

    /// Workers pull chunks from a shared cursor. The first chunk covers a worker's fair share
    /// of the domain and every following chunk is half the size of the previous one.
    #[display("guided({min_chunk})")]
    Guided {
        /// Chunks never shrink below this many indexes (except the last one).
        min_chunk: NonZero<usize>,
    },
}

impl SchedulingPolicy {
    /// Dynamic scheduling with chunks of one index.
    #[must_use]
    pub const fn dynamic() -> Self {
        Self::Dynamic { chunk: nz!(1) }
    }

    /// Guided scheduling with chunks shrinking down to one index.
    #[must_use]
    pub const fn guided() -> Self {
        Self::Guided { min_chunk: nz!(1) }
    }
}

/// Where a [`Partitioner`] is in its lifecycle.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum PartitionerState {
    /// No worker has asked for work yet.
    Unstarted,

    /// Some but not all of the domain has been handed out.
    Distributing,

    /// Every index has been handed out. All further requests return `None`.
    Exhausted,
}

/// Hands out disjoint ranges of an index domain to concurrent workers.
///
/// Over the lifetime of a partitioner, the issued ranges cover `[0, domain)` exactly once.
/// A partitioner serves one trial and is then discarded.
///
/// # Thread safety
///
/// [`next_range()`][Self::next_range] may be called from any number of threads at once.
#[derive(Debug)]
pub struct Partitioner {
    domain: usize,
    strategy: Strategy,

    started: AtomicBool,

    // Number of indexes handed out so far.
    issued: AtomicUsize,
}

#[derive(Debug)]
enum Strategy {
    Static {
        ranges: Box<[Range<usize>]>,
        claimed: Box<[AtomicBool]>,
    },
    Dynamic {
        chunk: usize,
        cursor: Mutex<usize>,
    },
    Guided {
        min_chunk: usize,
        cursor: Mutex<GuidedCursor>,
    },
}

#[derive(Debug)]
struct GuidedCursor {
    next: usize,
    chunk: usize,
}

impl Partitioner {
    /// Creates a partitioner for `domain` indexes shared among `workers` workers.
    #[must_use]
    pub fn new(domain: usize, workers: NonZero<usize>, policy: SchedulingPolicy) -> Self {
        let strategy = match policy {
            SchedulingPolicy::Static => {
                let ranges = static_ranges(domain, workers);
                let claimed = ranges.iter().map(|_| AtomicBool::new(false)).collect();

                Strategy::Static { ranges, claimed }
            }
            SchedulingPolicy::Dynamic { chunk } => Strategy::Dynamic {
                chunk: chunk.get(),
                cursor: Mutex::new(0),
            },
            SchedulingPolicy::Guided { min_chunk } => Strategy::Guided {
                min_chunk: min_chunk.get(),
                cursor: Mutex::new(GuidedCursor {
                    next: 0,
                    chunk: Integer::div_floor(&domain, &workers.get()).max(min_chunk.get()),
                }),
            },
        };

        Self {
            domain,
            strategy,
            started: AtomicBool::new(false),
            issued: AtomicUsize::new(0),
        }
    }

    /// Number of indexes in the domain being distributed.
    #[must_use]
    pub fn domain(&self) -> usize {
        self.domain
    }

    /// The next range for `worker` to process, or `None` if there is no more work for it.
    ///
    /// Issued ranges are never empty. With the static policy, each worker receives its one
    /// range on the first call and `None` afterwards; a worker index beyond the configured
    /// worker count has no range. The other policies serve any worker from a shared cursor.
    ///
    /// Once the domain is exhausted, calls return `None` without side effects.
    pub fn next_range(&self, worker: usize) -> Option<Range<usize>> {
        self.started.store(true, Ordering::Relaxed);

        let range = match &self.strategy {
            Strategy::Static { ranges, claimed } => {
                let flag = claimed.get(worker)?;

                if flag.swap(true, Ordering::Relaxed) {
                    return None;
                }

                ranges.get(worker).cloned().filter(|r| !r.is_empty())?
            }
            Strategy::Dynamic { chunk, cursor } => {
                let mut next = cursor.lock();

                if *next >= self.domain {
                    return None;
                }

                let start = *next;
                let end = start.saturating_add(*chunk).min(self.domain);
                *next = end;

                start..end
            }
            Strategy::Guided { min_chunk, cursor } => {
                let mut cursor = cursor.lock();

                if cursor.next >= self.domain {
                    return None;
                }

                let start = cursor.next;
                let end = start.saturating_add(cursor.chunk).min(self.domain);
                cursor.next = end;
                cursor.chunk = Integer::div_floor(&cursor.chunk, &2).max(*min_chunk);

                start..end
            }
        };

        self.issued.fetch_add(range.len(), Ordering::Relaxed);

        Some(range)
    }

    /// Where the partitioner is in its lifecycle.
    #[must_use]
    pub fn state(&self) -> PartitionerState {
        if !self.started.load(Ordering::Relaxed) {
            PartitionerState::Unstarted
        } else if self.issued.load(Ordering::Relaxed) >= self.domain {
            PartitionerState::Exhausted
        } else {
            PartitionerState::Distributing
        }
    }
}

/// Splits `[0, domain)` into `workers` contiguous ranges whose lengths differ by at most one.
/// The earlier ranges are the longer ones.
#[expect(
    clippy::arithmetic_side_effects,
    reason = "every bound is at most `domain`, so nothing can overflow"
)]
fn static_ranges(domain: usize, workers: NonZero<usize>) -> Box<[Range<usize>]> {
    let (base, remainder) = domain.div_rem(&workers.get());

    let mut start = 0;

    (0..workers.get())
        .map(|worker| {
            let len = if worker < remainder { base + 1 } else { base };
            let range = start..start + len;
            start = range.end;
            range
        })
        .collect()
}
