use std::fmt::{self, Display};
use std::time::Duration;

use tracing::debug;

use crate::services::{Clock, MonotonicClock};
use crate::{Error, Result, ResultValue, Tolerance, Value, Workload};

/// Whether a parallel result agrees with the sequential reference.
#[derive(Clone, Copy, Debug, PartialEq)]
#[non_exhaustive]
pub enum Verdict {
    /// The results agree within the tolerance of the workload.
    Pass,

    /// The results disagree beyond the tolerance of the workload.
    Mismatch {
        /// What the sequential reference computed.
        reference: ResultValue,

        /// What the trial computed.
        observed: ResultValue,
    },

    /// The result has not been compared with a reference.
    Unverified,
}

impl Verdict {
    /// Compares an observed result with the reference.
    #[must_use]
    pub fn judge(reference: ResultValue, observed: ResultValue, tolerance: Tolerance) -> Self {
        if observed.agrees_with(reference, tolerance) {
            Self::Pass
        } else {
            Self::Mismatch {
                reference,
                observed,
            }
        }
    }

    /// Whether the verdict is a mismatch.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Mismatch { .. })
    }
}

impl Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::Mismatch {
                reference,
                observed,
            } => write!(f, "FAIL (expected {reference}, got {observed})"),
            Self::Unverified => write!(f, "-"),
        }
    }
}

/// The result of a sequential run, used as the ground truth for parallel trials.
#[derive(Clone, Copy, Debug, PartialEq)]
#[non_exhaustive]
pub struct Reference<V> {
    /// The result of the reduction.
    pub value: V,

    /// How long the sequential run took.
    pub elapsed: Duration,
}

/// Computes trusted results with a strictly sequential, single-threaded pass and judges
/// parallel results against them.
///
/// The verifier keeps no state between calls and shares nothing with the execution engine.
#[derive(Debug, Default)]
pub struct Verifier<C = MonotonicClock> {
    clock: C,
}

impl Verifier {
    /// Creates a verifier that times reference runs with the monotonic clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clock: MonotonicClock::new(),
        }
    }
}

impl<C: Clock> Verifier<C> {
    /// Creates a verifier that times reference runs with a custom clock.
    #[must_use]
    pub fn with_clock(clock: C) -> Self {
        Self { clock }
    }

    /// Computes the reference result by evaluating every index in ascending order on the
    /// calling thread, through [`Workload::evaluate_sequential()`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for a minimum or maximum over an empty domain, and
    /// [`Error::MalformedInput`] if an index cannot be evaluated.
    pub fn reference<W: Workload>(&self, workload: &W) -> Result<Reference<W::Value>> {
        let op = workload.op();
        let domain = workload.domain_size();

        if domain == 0 && !op.defined_on_empty() {
            return Err(Error::configuration(format!(
                "{op} of an empty domain is undefined"
            )));
        }

        let start = self.clock.now();

        let value = (0..domain).try_fold(op.identity(), |acc, index| {
            Ok::<_, Error>(op.apply(acc, workload.evaluate_sequential(index)?))
        })?;

        let elapsed = self.clock.now().saturating_sub(start);

        debug!(workload = workload.label(), ?elapsed, "computed sequential reference");

        Ok(Reference { value, elapsed })
    }

    /// Judges `parallel` against a freshly computed sequential reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the reference cannot be computed. A disagreement between the
    /// results is not an error; it is reported as [`Verdict::Mismatch`].
    pub fn verify<W: Workload>(&self, workload: &W, parallel: W::Value) -> Result<Verdict> {
        let reference = self.reference(workload)?;

        Ok(Verdict::judge(
            reference.value.to_result(),
            parallel.to_result(),
            workload.tolerance(),
        ))
    }
}
