//! Services the core calls into but does not own: a monotonic clock and a seeded source of
//! random numbers. Tests substitute their own implementations.

use std::fmt::Debug;
use std::ops::RangeInclusive;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A monotonic clock.
pub trait Clock: Debug + Send + Sync {
    /// The time elapsed since an arbitrary origin that is fixed for the lifetime of the clock.
    ///
    /// Successive calls never return a smaller value.
    fn now(&self) -> Duration;
}

/// The production [`Clock`], backed by [`Instant`].
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Creates a clock whose origin is the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[cfg_attr(test, mutants::skip)] // Real time cannot be asserted on.
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hands out reproducible streams of random numbers.
pub trait RandomService: Debug + Send + Sync {
    /// The stream type produced by this service.
    type Stream: RandomStream;

    /// Returns a stream fully determined by `seed`.
    ///
    /// Two streams created from the same seed yield the same sequence of numbers.
    fn stream(&self, seed: u64) -> Self::Stream;
}

/// A sequence of random numbers.
pub trait RandomStream {
    /// The next integer, uniformly distributed over `range`.
    ///
    /// The range must not be empty.
    fn integer_in(&mut self, range: RangeInclusive<i64>) -> i64;

    /// The next float, uniformly distributed over `[0, 1)`.
    fn unit_float(&mut self) -> f64;
}

/// The production [`RandomService`], backed by the standard RNG of the `rand` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdRandom;

impl RandomService for StdRandom {
    type Stream = StdRandomStream;

    fn stream(&self, seed: u64) -> Self::Stream {
        StdRandomStream {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

/// Stream handed out by [`StdRandom`].
#[derive(Debug)]
pub struct StdRandomStream {
    rng: StdRng,
}

impl RandomStream for StdRandomStream {
    fn integer_in(&mut self, range: RangeInclusive<i64>) -> i64 {
        self.rng.random_range(range)
    }

    fn unit_float(&mut self) -> f64 {
        self.rng.random::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = StdRandom.stream(42);
        let mut b = StdRandom.stream(42);

        for _ in 0..100 {
            assert_eq!(a.integer_in(-50..=50), b.integer_in(-50..=50));
            assert_eq!(a.unit_float().to_bits(), b.unit_float().to_bits());
        }
    }

    #[test]
    fn integers_stay_in_range() {
        let mut stream = StdRandom.stream(7);

        for _ in 0..1000 {
            let value = stream.integer_in(-50..=50);
            assert!((-50..=50).contains(&value));
        }
    }

    #[test]
    fn floats_stay_in_unit_interval() {
        let mut stream = StdRandom.stream(7);

        for _ in 0..1000 {
            let value = stream.unit_float();
            assert!((0.0..1.0).contains(&value));
        }
    }

    #[test]
    fn monotonic_clock_does_not_go_backwards() {
        let clock = MonotonicClock::new();

        let first = clock.now();
        let second = clock.now();

        assert!(second >= first);
    }
}
