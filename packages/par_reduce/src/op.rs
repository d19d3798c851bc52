use crate::Value;

/// The element-combine operation of a reduction.
///
/// All operations are associative and commutative on integers, so the result of a reduction
/// does not depend on the order in which workers deliver their partial results. Floating-point
/// sums are associative only up to rounding.
#[derive(Clone, Copy, Debug, derive_more::Display, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum ReduceOp {
    /// Smallest element.
    #[display("min")]
    Min,

    /// Largest element.
    #[display("max")]
    Max,

    /// Sum of all elements.
    #[display("sum")]
    Sum,
}

impl ReduceOp {
    /// The neutral element of the operation for the given value type.
    #[must_use]
    pub fn identity<V: Value>(self) -> V {
        match self {
            Self::Min => V::GREATEST,
            Self::Max => V::LEAST,
            Self::Sum => V::ZERO,
        }
    }

    /// Folds `value` into the accumulator `acc`.
    #[must_use]
    pub fn apply<V: Value>(self, acc: V, value: V) -> V {
        match self {
            Self::Min => acc.lesser(value),
            Self::Max => acc.greater(value),
            Self::Sum => acc.plus(value),
        }
    }

    /// Whether the operation has a meaningful result over an empty domain.
    ///
    /// The minimum or maximum of nothing is undefined, whereas an empty sum is zero.
    #[must_use]
    pub fn defined_on_empty(self) -> bool {
        matches!(self, Self::Sum)
    }
}
