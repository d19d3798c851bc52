//! A producer thread generates vector pairs and hands each one to a consumer through its own
//! one-shot slot. The consumer computes the dot product of every pair, in slot order.

use std::iter;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::services::{Clock, RandomService};
use crate::{
    Dimensions, DotProduct, ElementRange, Error, ExecutionRecord, Result, ResultValue, Strategy,
    Verdict, Workload, WorkloadKind, WorkloadSource,
};

type Pair = (Arc<[f64]>, Arc<[f64]>);

/// What a pipeline produces and consumes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub struct PipelineConfig {
    /// Number of vector pairs handed from the producer to the consumer.
    pub pairs: usize,

    /// Length of every vector.
    pub vector_len: usize,

    /// Seed from which the data of every pair is derived.
    pub seed: u64,
}

impl PipelineConfig {
    /// Creates a pipeline configuration.
    #[must_use]
    pub fn new(pairs: usize, vector_len: usize, seed: u64) -> Self {
        Self {
            pairs,
            vector_len,
            seed,
        }
    }

    fn label(&self) -> String {
        format!(
            "pipeline of {} dot products (n={})",
            self.pairs, self.vector_len
        )
    }
}

/// The dot products computed by a pipeline run.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineOutcome {
    label: String,
    dot_products: Vec<f64>,
    elapsed: Duration,
}

impl PipelineOutcome {
    /// The dot product of every pair, in pair order.
    #[must_use]
    pub fn dot_products(&self) -> &[f64] {
        &self.dot_products
    }

    /// How long the run took, generation included.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// The sum of all dot products, as a compact summary of the outcome.
    #[must_use]
    pub fn checksum(&self) -> f64 {
        self.dot_products.iter().sum()
    }

    /// Compares the outcome with a reference outcome, pair by pair.
    ///
    /// Both runs compute every dot product sequentially over identical data, so the results
    /// must be bit-identical.
    #[must_use]
    pub fn verdict_against(&self, reference: &Self) -> Verdict {
        if self.dot_products.len() != reference.dot_products.len() {
            return Verdict::Mismatch {
                reference: count(reference.dot_products.len()),
                observed: count(self.dot_products.len()),
            };
        }

        self.dot_products
            .iter()
            .zip(&reference.dot_products)
            .find(|(observed, expected)| observed.to_bits() != expected.to_bits())
            .map_or(Verdict::Pass, |(&observed, &expected)| Verdict::Mismatch {
                reference: ResultValue::Float(expected),
                observed: ResultValue::Float(observed),
            })
    }

    /// Turns the outcome into a report record.
    #[must_use]
    pub fn into_record(self, strategy: Strategy) -> ExecutionRecord {
        let (workers, handoffs) = match strategy {
            Strategy::Pipeline => (2, self.dot_products.len()),
            Strategy::Sequential | Strategy::Parallel(_) => (1, 0),
        };

        let checksum = self.checksum();

        ExecutionRecord::new(
            self.label,
            strategy,
            workers,
            self.elapsed,
            ResultValue::Float(checksum),
            handoffs,
        )
    }
}

fn count(len: usize) -> ResultValue {
    ResultValue::Integer(i64::try_from(len).unwrap_or(i64::MAX))
}

/// Runs the producer on its own thread and consumes on the calling thread.
///
/// # Errors
///
/// Returns [`Error::ProducerVanished`] if the producer stops before publishing every pair.
/// Returns [`Error::ThreadSpawn`] if the producer thread cannot be started.
pub fn run_pipeline<R: RandomService, C: Clock>(
    source: &WorkloadSource<R>,
    config: &PipelineConfig,
    clock: &C,
) -> Result<PipelineOutcome> {
    let (senders, receivers): (Vec<_>, Vec<_>) = iter::repeat_with(oneshot::channel::<Pair>)
        .take(config.pairs)
        .unzip();

    debug!(pairs = config.pairs, vector_len = config.vector_len, "starting pipeline");

    let start = clock.now();

    let dot_products = thread::scope(|s| {
        let producer = thread::Builder::new()
            .name("par_reduce-producer".to_owned())
            .spawn_scoped(s, move || -> Result<()> {
                for (slot, sender) in senders.into_iter().enumerate() {
                    let pair = generate_pair(source, config, slot)?;

                    if sender.send(pair).is_err() {
                        // The consumer is gone, nobody needs the rest.
                        break;
                    }
                }

                Ok(())
            })
            .map_err(|spawn_error| Error::ThreadSpawn {
                worker: 0,
                source: spawn_error,
            })?;

        let consumed = consume(receivers);

        match producer.join() {
            Ok(Ok(())) => {}
            Ok(Err(error)) => warn!(%error, "pipeline producer failed"),
            Err(_) => warn!("pipeline producer panicked"),
        }

        consumed
    })?;

    let elapsed = clock.now().saturating_sub(start);

    debug!(?elapsed, "finished pipeline");

    Ok(PipelineOutcome {
        label: config.label(),
        dot_products,
        elapsed,
    })
}

/// Generates and consumes every pair in turn on the calling thread.
///
/// # Errors
///
/// Returns an error if the data of a pair cannot be generated.
pub fn run_sequential_pipeline<R: RandomService, C: Clock>(
    source: &WorkloadSource<R>,
    config: &PipelineConfig,
    clock: &C,
) -> Result<PipelineOutcome> {
    let start = clock.now();

    let dot_products = (0..config.pairs)
        .map(|slot| {
            let (left, right) = generate_pair(source, config, slot)?;
            dot(left, right)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(PipelineOutcome {
        label: config.label(),
        dot_products,
        elapsed: clock.now().saturating_sub(start),
    })
}

/// Waits for every slot in order and computes the dot product of its pair.
fn consume(receivers: Vec<oneshot::Receiver<Pair>>) -> Result<Vec<f64>> {
    receivers
        .into_iter()
        .enumerate()
        .map(|(slot, receiver)| {
            let (left, right) = receiver
                .recv()
                .map_err(|_recv_error| Error::ProducerVanished { slot })?;

            dot(left, right)
        })
        .collect()
}

fn dot(left: Arc<[f64]>, right: Arc<[f64]>) -> Result<f64> {
    let len = left.len();
    DotProduct::new(left, right)?.fold_range(0..len, 0.0)
}

fn generate_pair<R: RandomService>(
    source: &WorkloadSource<R>,
    config: &PipelineConfig,
    slot: usize,
) -> Result<Pair> {
    let kind = WorkloadKind::DenseVector(ElementRange::UnitFloats);
    let dimensions = Dimensions::Length(config.vector_len);

    // Each pair draws from two seeds of its own, so a pair does not depend on how many pairs
    // precede it.
    let base = config.seed.wrapping_add((slot as u64).wrapping_mul(2));

    let left = source.generate(kind, dimensions, base)?.into_floats()?;
    let right = source
        .generate(kind, dimensions, base.wrapping_add(1))?
        .into_floats()?;

    Ok((left, right))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MonotonicClock;

    #[test]
    fn pipeline_matches_sequential_run() {
        let source = WorkloadSource::new();
        let config = PipelineConfig::new(20, 500, 42);
        let clock = MonotonicClock::new();

        let piped = run_pipeline(&source, &config, &clock).unwrap();
        let sequential = run_sequential_pipeline(&source, &config, &clock).unwrap();

        assert_eq!(piped.dot_products().len(), 20);
        assert_eq!(piped.verdict_against(&sequential), Verdict::Pass);
    }

    #[test]
    fn dot_products_are_in_expected_range() {
        let outcome = run_sequential_pipeline(
            &WorkloadSource::new(),
            &PipelineConfig::new(5, 1000, 7),
            &MonotonicClock::new(),
        )
        .unwrap();

        // Each product of two values in [0, 1) averages 1/4.
        for &value in outcome.dot_products() {
            assert!((150.0..350.0).contains(&value), "{value}");
        }
    }

    #[test]
    fn dropped_sender_is_producer_vanished() {
        let (senders, receivers): (Vec<_>, Vec<_>) = iter::repeat_with(oneshot::channel::<Pair>)
            .take(3)
            .unzip();

        let mut senders = senders.into_iter();
        let first: Arc<[f64]> = Arc::from(vec![2.0, 3.0]);
        senders
            .next()
            .unwrap()
            .send((Arc::clone(&first), first))
            .unwrap();

        // The remaining slots are never published.
        drop(senders);

        assert!(matches!(
            consume(receivers),
            Err(Error::ProducerVanished { slot: 1 })
        ));
    }

    #[test]
    fn zero_pairs_is_empty_outcome() {
        let outcome = run_pipeline(
            &WorkloadSource::new(),
            &PipelineConfig::new(0, 10, 1),
            &MonotonicClock::new(),
        )
        .unwrap();

        assert!(outcome.dot_products().is_empty());
        assert!(outcome.checksum().abs() < f64::EPSILON);
    }

    #[test]
    fn verdict_reports_first_difference() {
        let reference = PipelineOutcome {
            label: "p".to_owned(),
            dot_products: vec![1.0, 2.0, 3.0],
            elapsed: Duration::ZERO,
        };
        let observed = PipelineOutcome {
            dot_products: vec![1.0, 2.5, 3.5],
            ..reference.clone()
        };

        assert_eq!(
            observed.verdict_against(&reference),
            Verdict::Mismatch {
                reference: ResultValue::Float(2.0),
                observed: ResultValue::Float(2.5),
            }
        );

        let shorter = PipelineOutcome {
            dot_products: vec![1.0],
            ..reference.clone()
        };
        assert!(shorter.verdict_against(&reference).is_failure());
    }

    #[test]
    fn record_counts_handoffs() {
        let outcome = PipelineOutcome {
            label: "p".to_owned(),
            dot_products: vec![1.0, 2.0],
            elapsed: Duration::from_millis(3),
        };

        let record = outcome.clone().into_record(Strategy::Pipeline);
        assert_eq!(record.workers(), 2);
        assert_eq!(record.combines(), 2);
        assert_eq!(record.result(), ResultValue::Float(3.0));

        let record = outcome.into_record(Strategy::Sequential);
        assert_eq!(record.workers(), 1);
        assert_eq!(record.combines(), 0);
    }
}
