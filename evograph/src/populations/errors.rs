use crate::exec::TaskError;
use crate::GenomeId;

use std::error::Error;
use std::fmt;

/// Failures surfaced by the trainer on the orchestrating thread.
///
/// Configuration errors fail fast at the point of misuse;
/// worker failures are captured on their thread and re-raised
/// here exactly once at the next synchronization point.
#[derive(Debug)]
pub enum TrainError {
    /// The population contains no genomes.
    EmptyPopulation,
    /// A genome's input/output topology does not match the
    /// trainer's configuration.
    MismatchedTopology {
        genome: GenomeId,
        expected: (usize, usize),
        found: (usize, usize),
    },
    /// The mutation dispatcher odds are unusable (negative
    /// entries, or a zero sum).
    InvalidOperatorOdds,
    /// Every species' offspring share collapsed to zero, so no
    /// next generation can be allotted.
    DegeneratePopulation,
    /// The worker pool was shut down; the trainer can no longer
    /// run generations.
    ExecutorShutDown,
    /// A worker task failed; the original failure is preserved.
    Worker(TaskError),
}

impl fmt::Display for TrainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPopulation => write!(f, "population can not be empty"),
            Self::MismatchedTopology {
                genome,
                expected,
                found,
            } => write!(
                f,
                "genome {} has topology {}/{}, trainer is configured for {}/{}",
                genome, found.0, found.1, expected.0, expected.1
            ),
            Self::InvalidOperatorOdds => {
                write!(f, "mutation operator odds must be non-negative with a positive sum")
            }
            Self::DegeneratePopulation => {
                write!(f, "all species' offspring shares are zero")
            }
            Self::ExecutorShutDown => {
                write!(f, "the worker pool has been shut down")
            }
            Self::Worker(e) => write!(f, "a worker task failed: {}", e),
        }
    }
}

impl Error for TrainError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Worker(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}
