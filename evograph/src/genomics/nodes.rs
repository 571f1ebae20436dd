use crate::{Innovation, NeuronId};

use serde::{Deserialize, Serialize};

use std::fmt;

/// An ActivationType names the activation function a
/// neuron's decoded network counterpart will apply.
///
/// Decoding is external to this crate; the engine only
/// carries the reference through mutation and crossover.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationType {
    Sigmoid,
    Identity,
    ReLU,
    Gaussian,
    Sinusoidal,
}

/// The role a neuron gene plays in its genome's topology.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NeuronKind {
    /// The constant-one bias neuron. Exactly one per genome.
    Bias,
    /// Input neurons.
    Input,
    /// Output neurons.
    Output,
    /// Neurons introduced by link-split mutations.
    Hidden,
}

/// A neuron gene. Immutable once created, apart from
/// genome-side bookkeeping.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct NeuronGene {
    id: NeuronId,
    kind: NeuronKind,
    activation: ActivationType,
    innovation: Innovation,
}

impl NeuronGene {
    /// Returns a new neuron gene with the specified parameters.
    /// `innovation` is the id of the mutation that introduced the
    /// neuron; primordial (bias/input/output) neurons carry 0.
    ///
    /// # Examples
    /// ```
    /// use evograph::genomics::{ActivationType, NeuronGene, NeuronKind};
    ///
    /// let neuron = NeuronGene::new(5, NeuronKind::Hidden, ActivationType::Sigmoid, 12);
    ///
    /// assert_eq!(neuron.id(), 5);
    /// assert_eq!(neuron.kind(), NeuronKind::Hidden);
    /// ```
    pub fn new(
        id: NeuronId,
        kind: NeuronKind,
        activation: ActivationType,
        innovation: Innovation,
    ) -> NeuronGene {
        NeuronGene {
            id,
            kind,
            activation,
            innovation,
        }
    }

    /// Returns the neuron's id.
    pub fn id(&self) -> NeuronId {
        self.id
    }

    /// Returns the neuron's kind.
    pub fn kind(&self) -> NeuronKind {
        self.kind
    }

    /// Returns the neuron's activation function reference.
    pub fn activation(&self) -> ActivationType {
        self.activation
    }

    /// Returns the innovation id of the mutation that
    /// created the neuron.
    pub fn innovation(&self) -> Innovation {
        self.innovation
    }
}

impl fmt::Display for NeuronGene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}[{:?}, {:?}]",
            self.id, self.kind, self.activation,
        )
    }
}

#[cfg(test)]
mod tests {}
