//! The workloads a benchmark trial can execute.
//!
//! A workload is a read-only view over generated data that knows how to compute the value of
//! every index in its domain. The execution engine never looks at the data itself. It asks
//! the workload to fold ranges of indexes, so the same engine drives vector reductions,
//! matrix scans and synthetic task lists alike.

use std::ops::Range;
use std::sync::Arc;

use crate::{Error, Matrix, ReduceOp, Result, Tolerance, Value};

/// A reduction over an index domain `[0, domain_size())`.
///
/// Implementations must be pure: evaluating the same index twice yields the same value, and
/// evaluation never mutates shared state. Workers call into one workload concurrently.
pub trait Workload: Sync {
    /// Type of the per-index values and of the reduction result.
    type Value: Value;

    /// Human-readable name shown in reports.
    fn label(&self) -> String;

    /// Number of indexes in the domain.
    fn domain_size(&self) -> usize;

    /// How the values of individual indexes are combined.
    fn op(&self) -> ReduceOp;

    /// The value of a single index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedInput`] if the index lies outside the domain or the data at
    /// the index cannot be processed.
    fn evaluate(&self, index: usize) -> Result<Self::Value>;

    /// The value of a single index, computed entirely on the calling thread.
    ///
    /// Sequential references are built from this. Workloads whose [`evaluate()`][Self::evaluate]
    /// spreads its work over other threads override it.
    ///
    /// # Errors
    ///
    /// Same as [`evaluate()`][Self::evaluate].
    fn evaluate_sequential(&self, index: usize) -> Result<Self::Value> {
        self.evaluate(index)
    }

    /// How closely a parallel result must match the sequential reference.
    fn tolerance(&self) -> Tolerance {
        <Self::Value as Value>::DEFAULT_TOLERANCE
    }

    /// Folds the values of every index in `range` into `acc`, in ascending index order.
    ///
    /// Workloads override this when they can walk their data faster than index by index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedInput`] if any index in the range cannot be evaluated.
    fn fold_range(&self, mut range: Range<usize>, acc: Self::Value) -> Result<Self::Value> {
        let op = self.op();

        range.try_fold(acc, |acc, index| Ok(op.apply(acc, self.evaluate(index)?)))
    }
}

fn out_of_domain(range: &Range<usize>, domain: usize) -> Error {
    Error::malformed(
        range.start,
        format!(
            "range {}..{} exceeds the domain of {domain} indexes",
            range.start, range.end
        ),
    )
}

/// Minimum, maximum or sum of the elements of a vector.
#[derive(Clone, Debug)]
pub struct VectorReduction<V> {
    data: Arc<[V]>,
    op: ReduceOp,
}

impl<V: Value> VectorReduction<V> {
    /// Creates a reduction of `data` with `op`.
    #[must_use]
    pub fn new(data: Arc<[V]>, op: ReduceOp) -> Self {
        Self { data, op }
    }
}

impl<V: Value> Workload for VectorReduction<V> {
    type Value = V;

    fn label(&self) -> String {
        format!("vector {} (n={})", self.op, self.data.len())
    }

    fn domain_size(&self) -> usize {
        self.data.len()
    }

    fn op(&self) -> ReduceOp {
        self.op
    }

    fn evaluate(&self, index: usize) -> Result<V> {
        self.data
            .get(index)
            .copied()
            .ok_or_else(|| Error::malformed(index, "index exceeds the vector length"))
    }

    fn fold_range(&self, range: Range<usize>, acc: V) -> Result<V> {
        let slice = self
            .data
            .get(range.clone())
            .ok_or_else(|| out_of_domain(&range, self.data.len()))?;

        Ok(slice.iter().fold(acc, |acc, &value| self.op.apply(acc, value)))
    }
}

/// Sum of the pairwise products of two vectors of equal length.
#[derive(Clone, Debug)]
pub struct DotProduct<V> {
    left: Arc<[V]>,
    right: Arc<[V]>,
}

impl<V: Value> DotProduct<V> {
    /// Creates a dot product of `left` and `right`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the vectors differ in length.
    pub fn new(left: Arc<[V]>, right: Arc<[V]>) -> Result<Self> {
        if left.len() != right.len() {
            return Err(Error::configuration(format!(
                "dot product of vectors with lengths {} and {}",
                left.len(),
                right.len()
            )));
        }

        Ok(Self { left, right })
    }
}

impl<V: Value> Workload for DotProduct<V> {
    type Value = V;

    fn label(&self) -> String {
        format!("dot product (n={})", self.left.len())
    }

    fn domain_size(&self) -> usize {
        self.left.len()
    }

    fn op(&self) -> ReduceOp {
        ReduceOp::Sum
    }

    fn evaluate(&self, index: usize) -> Result<V> {
        match (self.left.get(index), self.right.get(index)) {
            (Some(&left), Some(&right)) => Ok(left.times(right)),
            _ => Err(Error::malformed(index, "index exceeds the vector length")),
        }
    }

    fn fold_range(&self, range: Range<usize>, acc: V) -> Result<V> {
        let domain = self.left.len();

        let (Some(left), Some(right)) = (self.left.get(range.clone()), self.right.get(range.clone()))
        else {
            return Err(out_of_domain(&range, domain));
        };

        Ok(left
            .iter()
            .zip(right)
            .fold(acc, |acc, (&l, &r)| acc.plus(l.times(r))))
    }
}

/// Left-rectangle quadrature of a function over `[lower, upper]`.
///
/// Index `i` contributes `f(lower + i * h) * h` where `h = (upper - lower) / steps`.
#[derive(Clone, Debug)]
pub struct RectangleIntegral {
    name: &'static str,
    integrand: fn(f64) -> f64,
    lower: f64,
    upper: f64,
    steps: usize,
    step_width: f64,
}

impl RectangleIntegral {
    /// Creates a quadrature of `integrand` over `[lower, upper]` with `steps` rectangles.
    ///
    /// `name` describes the integrand in reports.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the bounds are not finite, `lower >= upper` or
    /// `steps` is zero.
    #[expect(
        clippy::cast_precision_loss,
        reason = "step counts are far below the precision limit of f64"
    )]
    pub fn new(
        name: &'static str,
        integrand: fn(f64) -> f64,
        lower: f64,
        upper: f64,
        steps: usize,
    ) -> Result<Self> {
        if !lower.is_finite() || !upper.is_finite() || lower >= upper {
            return Err(Error::configuration(format!(
                "integration bounds [{lower}, {upper}] do not form an interval"
            )));
        }

        if steps == 0 {
            return Err(Error::configuration("integration needs at least one step"));
        }

        Ok(Self {
            name,
            integrand,
            lower,
            upper,
            steps,
            step_width: (upper - lower) / steps as f64,
        })
    }

    /// The integral of `x³` over `[lower, upper]`.
    ///
    /// # Errors
    ///
    /// See [`new()`][Self::new].
    pub fn cubic(lower: f64, upper: f64, steps: usize) -> Result<Self> {
        Self::new("x^3", |x| x * x * x, lower, upper, steps)
    }
}

impl Workload for RectangleIntegral {
    type Value = f64;

    fn label(&self) -> String {
        format!(
            "integral of {} on [{}, {}] (steps={})",
            self.name, self.lower, self.upper, self.steps
        )
    }

    fn domain_size(&self) -> usize {
        self.steps
    }

    fn op(&self) -> ReduceOp {
        ReduceOp::Sum
    }

    #[expect(
        clippy::cast_precision_loss,
        reason = "step counts are far below the precision limit of f64"
    )]
    fn evaluate(&self, index: usize) -> Result<f64> {
        if index >= self.steps {
            return Err(Error::malformed(index, "index exceeds the step count"));
        }

        let x = self.lower + index as f64 * self.step_width;
        Ok((self.integrand)(x) * self.step_width)
    }
}

/// The largest of the row minima of a matrix, one index per row.
///
/// Row minima are taken over the populated entries only.
#[derive(Clone, Debug)]
pub struct MaxOfRowMins {
    matrix: Arc<Matrix>,
}

impl MaxOfRowMins {
    /// Creates the reduction over `matrix`.
    #[must_use]
    pub fn new(matrix: Arc<Matrix>) -> Self {
        Self { matrix }
    }
}

/// The minimum of the populated entries of one row.
pub(crate) fn row_min(matrix: &Matrix, row: usize) -> Result<i64> {
    let entries = matrix
        .row(row)
        .ok_or_else(|| Error::malformed(row, "row exceeds the matrix"))?;

    entries
        .iter()
        .copied()
        .min()
        .map(i64::from)
        .ok_or_else(|| Error::malformed(row, "row has no populated entries"))
}

impl Workload for MaxOfRowMins {
    type Value = i64;

    fn label(&self) -> String {
        format!(
            "max of row mins, {:?} {}x{}",
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
        row_min(&self.matrix, index)
    }
}

/// Tasks of unequal cost whose outputs are summed into a checksum.
///
/// Task `i` with cost `c` computes `sin(k) * cos(k)` for every `k` in `0..c`.
#[derive(Clone, Debug)]
pub struct SkewedTasks {
    costs: Arc<[u32]>,
}

impl SkewedTasks {
    /// Creates the task list from per-task costs.
    #[must_use]
    pub fn new(costs: Arc<[u32]>) -> Self {
        Self { costs }
    }

    /// Total amount of work over all tasks.
    #[must_use]
    pub fn total_cost(&self) -> u64 {
        self.costs.iter().map(|&c| u64::from(c)).sum()
    }
}

fn task(cost: u32) -> f64 {
    (0..cost)
        .map(|k| {
            let k = f64::from(k);
            k.sin() * k.cos()
        })
        .sum()
}

impl Workload for SkewedTasks {
    type Value = f64;

    fn label(&self) -> String {
        format!("skewed tasks (n={})", self.costs.len())
    }

    fn domain_size(&self) -> usize {
        self.costs.len()
    }

    fn op(&self) -> ReduceOp {
        ReduceOp::Sum
    }

    fn evaluate(&self, index: usize) -> Result<f64> {
        self.costs
            .get(index)
            .map(|&cost| task(cost))
            .ok_or_else(|| Error::malformed(index, "index exceeds the task count"))
    }
}
