use std::num::NonZero;
use std::sync::Arc;

use new_zealand::nz;
use tracing::debug;

use crate::services::{RandomService, RandomStream, StdRandom};
use crate::{Error, Matrix, MatrixShape, Result};

/// Entries of banded and triangular matrices are drawn from this range.
pub const MATRIX_ENTRY_RANGE: (i32, i32) = (0, 99);

/// The default upper bound on the cost of a synthetic task.
pub const DEFAULT_MAX_COST: NonZero<u32> = nz!(1000);

/// Mixes the index into the seed of a synthetic cost sequence, so that every index has its
/// own stream.
const INDEX_SEED_MULTIPLIER: u64 = 0x9E37_79B9_7F4A_7C15;

/// The values a dense vector is filled with.
#[derive(Clone, Copy, Debug, PartialEq)]
#[non_exhaustive]
pub enum ElementRange {
    /// Integers uniformly drawn from `[min, max]`.
    Integers {
        /// Smallest possible value.
        min: i64,
        /// Largest possible value.
        max: i64,
    },

    /// Floats uniformly drawn from `[0, 1)`.
    UnitFloats,
}

/// What kind of data to generate.
#[derive(Clone, Copy, Debug, PartialEq)]
#[non_exhaustive]
pub enum WorkloadKind {
    /// A vector of independent elements.
    DenseVector(ElementRange),

    /// A matrix with every entry populated, entries drawn from `[min, max]`.
    DenseMatrix {
        /// Smallest possible entry.
        min: i32,
        /// Largest possible entry.
        max: i32,
    },

    /// A square matrix populated only near the diagonal.
    BandedMatrix {
        /// How many columns on each side of the diagonal are populated.
        bandwidth: usize,
    },

    /// A square matrix populated only on and below the diagonal.
    TriangularMatrix,

    /// A per-index task cost in `[1, max_cost]`, modeling unequal work per task.
    SyntheticCostSequence {
        /// Upper bound on the cost of one task.
        max_cost: NonZero<u32>,
    },
}

/// The size of the data to generate.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum Dimensions {
    /// Number of elements in a vector or sequence.
    Length(usize),

    /// Shape of a matrix.
    Grid {
        /// Number of rows.
        rows: usize,
        /// Number of columns.
        cols: usize,
    },
}

/// Immutable data produced by a [`WorkloadSource`].
///
/// The data is reference-counted so that several workloads and trials can share one copy.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Dataset {
    /// A vector of integers.
    Integers(Arc<[i64]>),

    /// A vector of floats.
    Floats(Arc<[f64]>),

    /// A matrix.
    Matrix(Arc<Matrix>),

    /// A sequence of task costs.
    Costs(Arc<[u32]>),
}

impl Dataset {
    /// Number of elements, or of rows for a matrix.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Integers(values) => values.len(),
            Self::Floats(values) => values.len(),
            Self::Matrix(matrix) => matrix.rows(),
            Self::Costs(costs) => costs.len(),
        }
    }

    /// Whether the dataset has no elements (or no rows).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The integer vector, if this is one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the dataset is not an integer vector.
    pub fn into_integers(self) -> Result<Arc<[i64]>> {
        match self {
            Self::Integers(values) => Ok(values),
            other => Err(other.wrong_kind("an integer vector")),
        }
    }

    /// The float vector, if this is one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the dataset is not a float vector.
    pub fn into_floats(self) -> Result<Arc<[f64]>> {
        match self {
            Self::Floats(values) => Ok(values),
            other => Err(other.wrong_kind("a float vector")),
        }
    }

    /// The matrix, if this is one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the dataset is not a matrix.
    pub fn into_matrix(self) -> Result<Arc<Matrix>> {
        match self {
            Self::Matrix(matrix) => Ok(matrix),
            other => Err(other.wrong_kind("a matrix")),
        }
    }

    /// The cost sequence, if this is one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the dataset is not a cost sequence.
    pub fn into_costs(self) -> Result<Arc<[u32]>> {
        match self {
            Self::Costs(costs) => Ok(costs),
            other => Err(other.wrong_kind("a cost sequence")),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Self::Integers(_) => "an integer vector",
            Self::Floats(_) => "a float vector",
            Self::Matrix(_) => "a matrix",
            Self::Costs(_) => "a cost sequence",
        }
    }

    fn wrong_kind(&self, expected: &str) -> Error {
        Error::configuration(format!(
            "expected {expected} but the dataset is {}",
            self.kind_name()
        ))
    }
}

/// Produces the data that workloads process.
///
/// Generation is deterministic: the same kind, dimensions and seed always produce identical
/// data, so that different strategies can be compared on exactly the same input.
///
/// # Examples
///
/// ```
/// use par_reduce::{Dimensions, ElementRange, WorkloadKind, WorkloadSource};
///
/// let source = WorkloadSource::new();
/// let kind = WorkloadKind::DenseVector(ElementRange::Integers { min: -50, max: 50 });
///
/// let first = source.generate(kind, Dimensions::Length(5000), 42).unwrap();
/// let second = source.generate(kind, Dimensions::Length(5000), 42).unwrap();
///
/// assert_eq!(first, second);
/// ```
#[derive(Clone, Debug, Default)]
pub struct WorkloadSource<R = StdRandom> {
    random: R,
}

impl WorkloadSource {
    /// Creates a source backed by the standard random number generator.
    #[must_use]
    pub fn new() -> Self {
        Self { random: StdRandom }
    }
}

impl<R: RandomService> WorkloadSource<R> {
    /// Creates a source backed by a custom random number service.
    #[must_use]
    pub fn with_random(random: R) -> Self {
        Self { random }
    }

    /// Generates a dataset of the given kind and dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the dimensions do not fit the kind (a vector needs a
    /// length, a matrix a grid, banded and triangular matrices must be square, matrices need
    /// at least one column) or if a value range is empty.
    pub fn generate(&self, kind: WorkloadKind, dimensions: Dimensions, seed: u64) -> Result<Dataset> {
        debug!(?kind, ?dimensions, seed, "generating dataset");

        match kind {
            WorkloadKind::DenseVector(range) => {
                let len = expect_length(kind, dimensions)?;
                self.vector(range, len, seed)
            }
            WorkloadKind::DenseMatrix { min, max } => {
                let (rows, cols) = expect_grid(kind, dimensions)?;
                self.matrix(rows, cols, MatrixShape::Dense, (min, max), seed)
            }
            WorkloadKind::BandedMatrix { bandwidth } => {
                let size = expect_square(kind, dimensions)?;
                self.matrix(
                    size,
                    size,
                    MatrixShape::Banded { bandwidth },
                    MATRIX_ENTRY_RANGE,
                    seed,
                )
            }
            WorkloadKind::TriangularMatrix => {
                let size = expect_square(kind, dimensions)?;
                self.matrix(
                    size,
                    size,
                    MatrixShape::LowerTriangular,
                    MATRIX_ENTRY_RANGE,
                    seed,
                )
            }
            WorkloadKind::SyntheticCostSequence { max_cost } => {
                let len = expect_length(kind, dimensions)?;
                Ok(self.costs(len, max_cost, seed))
            }
        }
    }

    fn vector(&self, range: ElementRange, len: usize, seed: u64) -> Result<Dataset> {
        let mut stream = self.random.stream(seed);

        match range {
            ElementRange::Integers { min, max } => {
                if min > max {
                    return Err(Error::configuration(format!(
                        "integer range [{min}, {max}] is empty"
                    )));
                }

                Ok(Dataset::Integers(
                    (0..len).map(|_| stream.integer_in(min..=max)).collect(),
                ))
            }
            ElementRange::UnitFloats => Ok(Dataset::Floats(
                (0..len).map(|_| stream.unit_float()).collect(),
            )),
        }
    }

    fn matrix(
        &self,
        rows: usize,
        cols: usize,
        shape: MatrixShape,
        (min, max): (i32, i32),
        seed: u64,
    ) -> Result<Dataset> {
        if cols == 0 && rows > 0 {
            return Err(Error::configuration(
                "a matrix with rows must have at least one column",
            ));
        }

        if min > max {
            return Err(Error::configuration(format!(
                "matrix entry range [{min}, {max}] is empty"
            )));
        }

        let mut stream = self.random.stream(seed);
        let range = i64::from(min)..=i64::from(max);

        let matrix = Matrix::build(rows, cols, shape, |_, _| {
            i32::try_from(stream.integer_in(range.clone()))
                .expect("the range was built from i32 bounds so every value fits in i32")
        });

        Ok(Dataset::Matrix(Arc::new(matrix)))
    }

    fn costs(&self, len: usize, max_cost: NonZero<u32>, seed: u64) -> Dataset {
        let max_cost = i64::from(max_cost.get());

        Dataset::Costs(
            (0..len)
                .map(|index| {
                    let mut stream = self.random.stream(index_seed(seed, index));

                    u32::try_from(stream.integer_in(1..=max_cost))
                        .expect("the range was built from u32 bounds so every value fits in u32")
                })
                .collect(),
        )
    }
}

/// Every index of a synthetic cost sequence draws from its own stream, so the cost of an index
/// depends only on the seed and the index.
fn index_seed(seed: u64, index: usize) -> u64 {
    seed ^ (index as u64).wrapping_mul(INDEX_SEED_MULTIPLIER)
}

fn expect_length(kind: WorkloadKind, dimensions: Dimensions) -> Result<usize> {
    match dimensions {
        Dimensions::Length(len) => Ok(len),
        Dimensions::Grid { .. } => Err(Error::configuration(format!(
            "{kind:?} needs a length but got {dimensions:?}"
        ))),
    }
}

fn expect_grid(kind: WorkloadKind, dimensions: Dimensions) -> Result<(usize, usize)> {
    match dimensions {
        Dimensions::Grid { rows, cols } => Ok((rows, cols)),
        Dimensions::Length(_) => Err(Error::configuration(format!(
            "{kind:?} needs a grid but got {dimensions:?}"
        ))),
    }
}

fn expect_square(kind: WorkloadKind, dimensions: Dimensions) -> Result<usize> {
    let (rows, cols) = expect_grid(kind, dimensions)?;

    if rows != cols {
        return Err(Error::configuration(format!(
            "{kind:?} must be square but got {rows}x{cols}"
        )));
    }

    Ok(rows)
}
