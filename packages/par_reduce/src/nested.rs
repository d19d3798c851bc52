use std::sync::Arc;

use crate::engine::execute;
use crate::services::{Clock, MonotonicClock};
use crate::workloads::row_min;
use crate::{Error, Matrix, ReduceOp, Result, StrategyConfig, Workload};

/// The largest of the row minima of a matrix, computed with two levels of parallelism.
///
/// Used as a workload, every index is a row. Evaluating a row runs a complete inner trial on
/// the execution engine over the populated entries of that row, with its own workers,
/// partitioner and combiner. When the outer trial is itself parallel, the two levels
/// multiply: `outer workers * inner workers` threads may be alive at once.
///
/// The inner trials pay for thread start-up on every row, so this only outperforms the flat
/// [`MaxOfRowMins`][crate::MaxOfRowMins] when rows are long.
///
/// The sequential reference skips the inner trials and scans each row on the calling thread.
#[derive(Debug)]
pub struct NestedRowMins<C = MonotonicClock> {
    matrix: Arc<Matrix>,
    inner: StrategyConfig,
    clock: C,
}

impl NestedRowMins {
    /// Creates the workload. Each row minimum is computed with the `inner` strategy.
    #[must_use]
    pub fn new(matrix: Arc<Matrix>, inner: StrategyConfig) -> Self {
        Self {
            matrix,
            inner,
            clock: MonotonicClock::new(),
        }
    }
}

impl<C: Clock> NestedRowMins<C> {
    /// Creates the workload with a custom clock for the inner trials.
    #[must_use]
    pub fn with_clock(matrix: Arc<Matrix>, inner: StrategyConfig, clock: C) -> Self {
        Self {
            matrix,
            inner,
            clock,
        }
    }

    /// The strategy used for the per-row inner trials.
    #[must_use]
    pub fn inner(&self) -> StrategyConfig {
        self.inner
    }
}

impl<C: Clock> Workload for NestedRowMins<C> {
    type Value = i64;

    fn label(&self) -> String {
        format!(
            "max of row mins, nested {}, {:?} {}x{}",
            self.inner,
            self.matrix.shape(),
            self.matrix.rows(),
            self.matrix.cols()
        )
    }

    fn domain_size(&self) -> usize {
        self.matrix.rows()
    }

    fn op(&self) -> ReduceOp {
        ReduceOp::Max
    }

    fn evaluate(&self, index: usize) -> Result<i64> {
        let entries = self
            .matrix
            .row(index)
            .ok_or_else(|| Error::malformed(index, "row exceeds the matrix"))?;

        if entries.is_empty() {
            return Err(Error::malformed(index, "row has no populated entries"));
        }

        let row = RowEntries { entries };

        Ok(execute(&row, &self.inner, &self.clock)?.value)
    }

    fn evaluate_sequential(&self, index: usize) -> Result<i64> {
        row_min(&self.matrix, index)
    }
}

/// The populated entries of one row, reduced to their minimum.
#[derive(Debug)]
struct RowEntries<'a> {
    entries: &'a [i32],
}

impl Workload for RowEntries<'_> {
    type Value = i64;

    fn label(&self) -> String {
        format!("row min (n={})", self.entries.len())
    }

    fn domain_size(&self) -> usize {
        self.entries.len()
    }

    fn op(&self) -> ReduceOp {
        ReduceOp::Min
    }

    fn evaluate(&self, index: usize) -> Result<i64> {
        self.entries
            .get(index)
            .copied()
            .map(i64::from)
            .ok_or_else(|| Error::malformed(index, "column exceeds the row"))
    }
}
