//! Measures and compares strategies for parallel reductions on many-processor systems.
//!
//! A reduction folds every element of a workload into one value. When the work is spread over
//! several threads, two choices decide how fast that goes:
//!
//! - The [`Discipline`] that merges the partial results of workers into the shared result:
//!   an atomic read-modify-write, a critical section, an explicitly managed lock, or private
//!   per-worker results merged once at the end.
//! - The [`SchedulingPolicy`] that divides the index domain among workers: one fixed range per
//!   worker, fixed-size chunks pulled on demand, or chunks that shrink as the work runs out.
//!
//! The [`ExecutionEngine`] runs a [`Workload`] under a [`StrategyConfig`] that combines both
//! choices with a worker count, and returns an [`ExecutionRecord`] with the result and the
//! elapsed time. The [`Verifier`] recomputes the result on one thread and judges whether the
//! parallel result agrees. The [`WorkloadSource`] generates reproducible data for the
//! workloads: vectors, dense, banded and triangular matrices, and sequences of task costs.
//!
//! The benchmark suite in [`run_suite()`] ties all of this together and produces a [`Report`].
//! The `par_reduce` binary runs the suite from the command line.
//!
//! # Example
//!
//! ```
//! use par_reduce::{
//!     Dimensions, Discipline, ElementRange, ExecutionEngine, ReduceOp, SchedulingPolicy,
//!     StrategyConfig, VectorReduction, Verdict, Verifier, WorkloadKind, WorkloadSource,
//! };
//!
//! let data = WorkloadSource::new()
//!     .generate(
//!         WorkloadKind::DenseVector(ElementRange::Integers { min: -50, max: 50 }),
//!         Dimensions::Length(5000),
//!         42,
//!     )?
//!     .into_integers()?;
//!
//! let workload = VectorReduction::new(data, ReduceOp::Min);
//! let config = StrategyConfig::new(Discipline::ReductionDirective, SchedulingPolicy::Static, 4)?;
//!
//! let record = ExecutionEngine::new().run(&workload, &config)?;
//! println!("min in {:?}: {}", record.elapsed(), record.result());
//!
//! let verifier = Verifier::new();
//! let reference = verifier.reference(&workload)?;
//! assert_eq!(verifier.verify(&workload, reference.value)?, Verdict::Pass);
//! # Ok::<(), par_reduce::Error>(())
//! ```

mod combine;
mod engine;
mod error;
mod matrix;
mod nested;
mod op;
mod partition;
mod pipeline;
mod record;
mod report;
mod source;
mod suite;
mod value;
mod verify;
mod workloads;

pub mod services;

pub use combine::*;
pub use engine::*;
pub use error::*;
pub use matrix::*;
pub use nested::*;
pub use op::*;
pub use partition::*;
pub use pipeline::*;
pub use record::*;
pub use report::*;
pub use source::*;
pub use suite::*;
pub use value::*;
pub use verify::*;
pub use workloads::*;
