use thiserror::Error;

/// Errors that can abort a trial or prevent one from starting.
///
/// A parallel result that disagrees with the sequential reference is not an error. It is
/// recorded as a [`Verdict::Mismatch`][crate::Verdict::Mismatch] and the suite carries on.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The caller asked for something that cannot be executed, such as zero workers,
    /// impossible dimensions or a minimum over an empty domain.
    #[error("invalid configuration: {problem}")]
    Configuration {
        /// A human-readable description of the problem.
        problem: String,
    },

    /// An element function or a range check found input it cannot process.
    #[error("malformed input at index {index}: {problem}")]
    MalformedInput {
        /// Index in the workload domain where the problem was detected.
        index: usize,

        /// A human-readable description of the problem.
        problem: String,
    },

    /// A worker hit an error mid-trial. The whole trial is aborted.
    #[error("worker {worker} failed")]
    WorkerFailure {
        /// Index of the worker that failed.
        worker: usize,

        /// What went wrong inside the worker.
        #[source]
        source: Box<Error>,
    },

    /// A worker thread panicked. The whole trial is aborted.
    #[error("worker {worker} panicked: {message}")]
    WorkerPanicked {
        /// Index of the worker that panicked.
        worker: usize,

        /// The panic payload, if it was a string.
        message: String,
    },

    /// The operating system refused to start a worker thread. The whole trial is aborted.
    #[error("cannot start worker {worker}")]
    ThreadSpawn {
        /// Index of the worker that could not be started.
        worker: usize,

        /// The error reported by the operating system.
        #[source]
        source: std::io::Error,
    },

    /// The pipeline producer stopped before it published the data for a slot.
    #[error("producer stopped before publishing slot {slot}")]
    ProducerVanished {
        /// Index of the slot that never received data.
        slot: usize,
    },
}

impl Error {
    pub(crate) fn configuration(problem: impl Into<String>) -> Self {
        Self::Configuration {
            problem: problem.into(),
        }
    }

    pub(crate) fn malformed(index: usize, problem: impl Into<String>) -> Self {
        Self::MalformedInput {
            index,
            problem: problem.into(),
        }
    }

    /// Whether this error means a worker failed while the trial was running.
    #[must_use]
    pub fn is_worker_failure(&self) -> bool {
        matches!(
            self,
            Self::WorkerFailure { .. }
                | Self::WorkerPanicked { .. }
                | Self::ThreadSpawn { .. }
                | Self::ProducerVanished { .. }
        )
    }
}

/// A specialized `Result` type for reduction benchmark operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;
