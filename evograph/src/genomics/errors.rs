use crate::NeuronId;

use std::error::Error;
use std::fmt;

/// Structural invariant violations detectable on a genome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenomeError {
    /// The genome has no bias neuron, or more than one.
    MalformedBias,
    /// An input/output neuron expected from the configured
    /// topology is missing.
    MissingIoNeuron(NeuronId),
    /// A link gene references a neuron id absent from the
    /// neuron gene list.
    DanglingEndpoint(NeuronId, NeuronId),
    /// Two link genes connect the same (source, target) pair
    /// in the same direction.
    DuplicateLink(NeuronId, NeuronId),
    /// The link gene list is not sorted ascending by innovation id.
    UnsortedLinks,
}

impl fmt::Display for GenomeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedBias => write!(f, "genome must contain exactly one bias neuron"),
            Self::MissingIoNeuron(id) => {
                write!(f, "genome is missing i/o neuron {} required by its topology", id)
            }
            Self::DanglingEndpoint(from, to) => write!(
                f,
                "link {} -> {} references a neuron absent from the genome",
                from, to
            ),
            Self::DuplicateLink(from, to) => {
                write!(f, "duplicate link between neurons {} -> {}", from, to)
            }
            Self::UnsortedLinks => {
                write!(f, "link genes are not sorted ascending by innovation id")
            }
        }
    }
}

impl Error for GenomeError {}
