use std::fmt::{self, Debug, Display};

/// How closely a parallel result must match the sequential reference.
#[derive(Clone, Copy, Debug, PartialEq)]
#[non_exhaustive]
pub enum Tolerance {
    /// The results must be bit-for-bit identical.
    Exact,

    /// The results may differ by at most `epsilon * max(1, |reference|)`.
    ///
    /// Parallel floating-point accumulation reorders additions, which perturbs the low-order
    /// bits of the result. The bound scales with the magnitude of the expected value.
    Relative(f64),
}

impl Tolerance {
    /// The tolerance applied to floating-point accumulations unless a workload says otherwise.
    pub const FLOAT_DEFAULT: Self = Self::Relative(1e-6);
}

/// A scalar that partial and shared results are made of.
///
/// Every value type declares its neutral elements explicitly so that no reduction ever
/// depends on a sentinel that could legitimately appear in the input.
pub trait Value: Copy + Debug + PartialEq + Send + Sync + 'static {
    /// The additive identity.
    const ZERO: Self;

    /// The greatest value of the type. This is the identity of a minimum.
    const GREATEST: Self;

    /// The least value of the type. This is the identity of a maximum.
    const LEAST: Self;

    /// The tolerance used when a workload does not specify one.
    const DEFAULT_TOLERANCE: Tolerance;

    /// Sum of two values. Integers wrap so that the operation stays associative.
    #[must_use]
    fn plus(self, other: Self) -> Self;

    /// Product of two values. Integers wrap.
    #[must_use]
    fn times(self, other: Self) -> Self;

    /// The smaller of two values.
    #[must_use]
    fn lesser(self, other: Self) -> Self;

    /// The greater of two values.
    #[must_use]
    fn greater(self, other: Self) -> Self;

    /// Lossless encoding into a machine word, used by atomic read-modify-write updates.
    fn to_bits(self) -> u64;

    /// Inverse of [`to_bits()`][Self::to_bits].
    fn from_bits(bits: u64) -> Self;

    /// Whether `self` is acceptable as a result when `reference` was expected.
    fn within(self, reference: Self, tolerance: Tolerance) -> bool;

    /// Erases the type for reporting.
    fn to_result(self) -> ResultValue;
}

impl Value for i64 {
    const ZERO: Self = 0;
    const GREATEST: Self = Self::MAX;
    const LEAST: Self = Self::MIN;
    const DEFAULT_TOLERANCE: Tolerance = Tolerance::Exact;

    fn plus(self, other: Self) -> Self {
        self.wrapping_add(other)
    }

    fn times(self, other: Self) -> Self {
        self.wrapping_mul(other)
    }

    fn lesser(self, other: Self) -> Self {
        Ord::min(self, other)
    }

    fn greater(self, other: Self) -> Self {
        Ord::max(self, other)
    }

    fn to_bits(self) -> u64 {
        u64::from_ne_bytes(self.to_ne_bytes())
    }

    fn from_bits(bits: u64) -> Self {
        Self::from_ne_bytes(bits.to_ne_bytes())
    }

    #[expect(
        clippy::cast_precision_loss,
        reason = "relative comparison is approximate by definition"
    )]
    fn within(self, reference: Self, tolerance: Tolerance) -> bool {
        match tolerance {
            Tolerance::Exact => self == reference,
            Tolerance::Relative(epsilon) => {
                let difference = self.abs_diff(reference) as f64;
                difference <= epsilon * (reference.unsigned_abs() as f64).max(1.0)
            }
        }
    }

    fn to_result(self) -> ResultValue {
        ResultValue::Integer(self)
    }
}

impl Value for f64 {
    const ZERO: Self = 0.0;
    const GREATEST: Self = Self::INFINITY;
    const LEAST: Self = Self::NEG_INFINITY;
    const DEFAULT_TOLERANCE: Tolerance = Tolerance::FLOAT_DEFAULT;

    fn plus(self, other: Self) -> Self {
        self + other
    }

    fn times(self, other: Self) -> Self {
        self * other
    }

    fn lesser(self, other: Self) -> Self {
        self.min(other)
    }

    fn greater(self, other: Self) -> Self {
        self.max(other)
    }

    fn to_bits(self) -> u64 {
        Self::to_bits(self)
    }

    fn from_bits(bits: u64) -> Self {
        Self::from_bits(bits)
    }

    fn within(self, reference: Self, tolerance: Tolerance) -> bool {
        match tolerance {
            Tolerance::Exact => Self::to_bits(self) == Self::to_bits(reference),
            Tolerance::Relative(epsilon) => {
                (self - reference).abs() <= epsilon * reference.abs().max(1.0)
            }
        }
    }

    fn to_result(self) -> ResultValue {
        ResultValue::Float(self)
    }
}

/// The outcome of a reduction with its value type erased, as stored in execution records.
#[derive(Clone, Copy, Debug, PartialEq)]
#[non_exhaustive]
pub enum ResultValue {
    /// Result of an exact integer reduction.
    Integer(i64),

    /// Result of a floating-point accumulation.
    Float(f64),
}

impl ResultValue {
    /// Whether `self` is acceptable as a result when `reference` was expected.
    ///
    /// Results of different kinds never agree.
    #[must_use]
    pub fn agrees_with(self, reference: Self, tolerance: Tolerance) -> bool {
        match (self, reference) {
            (Self::Integer(observed), Self::Integer(expected)) => {
                observed.within(expected, tolerance)
            }
            (Self::Float(observed), Self::Float(expected)) => observed.within(expected, tolerance),
            _ => false,
        }
    }
}

impl Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) if value.abs() >= 1e9 => write!(f, "{value:.6e}"),
            Self::Float(value) => write!(f, "{value:.6}"),
        }
    }
}
