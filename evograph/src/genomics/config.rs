use crate::genomics::ActivationType;

use std::num::NonZeroUsize;

/// Configuration data for genome generation
/// and intra-genome variation operators.
#[derive(Clone, Debug)]
pub struct GeneticConfig {
    /// Number of input neurons in a genome.
    pub input_count: NonZeroUsize,
    /// Number of output neurons in a genome.
    pub output_count: NonZeroUsize,
    /// Possible activation types for hidden neurons.
    /// If empty, hidden neurons default to [`Sigmoid`].
    ///
    /// [`Sigmoid`]: crate::genomics::ActivationType
    pub hidden_activation_types: Vec<ActivationType>,
    /// Activation type of the output neurons.
    pub output_activation_type: ActivationType,
    /// Maximum magnitude of a link weight. Fresh weights are
    /// drawn uniformly from this range, and perturbed weights
    /// are clamped back into it.
    pub weight_range: f64,
    /// Chance that a given enabled link is weight-mutated
    /// during a weight mutation pass.
    pub weight_mutation_rate: f64,
    /// Chance that a weight mutation replaces the weight
    /// outright instead of perturbing it.
    pub weight_replacement_chance: f64,
    /// Bound on the uniform delta applied by a weight perturbation.
    pub max_weight_perturbation: f64,
    /// Chance that a crossover offspring additionally passes
    /// through the mutation dispatcher.
    pub child_mutation_chance: f64,
    /// Dispatcher odds of a weight mutation pass.
    pub mutate_weights_odds: f64,
    /// Dispatcher odds of an add-neuron (link split) mutation.
    pub add_neuron_odds: f64,
    /// Dispatcher odds of an add-link mutation.
    pub add_link_odds: f64,
    /// Dispatcher odds of the reserved adjust-curve operation.
    pub adjust_curve_odds: f64,
    /// Dispatcher odds of a remove-link mutation.
    pub remove_link_odds: f64,
    /// Maximum number of candidate draws before a structural
    /// mutation gives up as a no-op.
    pub max_mutation_attempts: usize,
    /// Genomes with fewer links than this are never shrunk
    /// by remove-link.
    pub min_links_for_removal: usize,
    /// Genomes at or above this neuron count receive no
    /// further add-neuron mutations.
    pub max_neurons: usize,
    /// Weight of excess genes in compatibility distance (c1).
    pub excess_factor: f64,
    /// Weight of disjoint genes in compatibility distance (c2).
    pub disjoint_factor: f64,
    /// Weight of the mean matched-gene weight difference in
    /// compatibility distance (c3).
    pub matched_weight_factor: f64,
}

impl GeneticConfig {
    /// Returns a "zero-valued" default configuration.
    /// All values are 0, empty, or in the case of
    /// `NonZeroUsize`s, 1.
    pub fn zero() -> GeneticConfig {
        GeneticConfig {
            input_count: NonZeroUsize::new(1).unwrap(),
            output_count: NonZeroUsize::new(1).unwrap(),
            hidden_activation_types: vec![],
            output_activation_type: ActivationType::Sigmoid,
            weight_range: 0.0,
            weight_mutation_rate: 0.0,
            weight_replacement_chance: 0.0,
            max_weight_perturbation: 0.0,
            child_mutation_chance: 0.0,
            mutate_weights_odds: 0.0,
            add_neuron_odds: 0.0,
            add_link_odds: 0.0,
            adjust_curve_odds: 0.0,
            remove_link_odds: 0.0,
            max_mutation_attempts: 0,
            min_links_for_removal: 0,
            max_neurons: 0,
            excess_factor: 0.0,
            disjoint_factor: 0.0,
            matched_weight_factor: 0.0,
        }
    }

    /// Returns the classic parameter block for the given
    /// topology: NEAT's 1/1/0.4 compatibility coefficients
    /// and the original engine's operator odds.
    pub fn standard(input_count: NonZeroUsize, output_count: NonZeroUsize) -> GeneticConfig {
        GeneticConfig {
            input_count,
            output_count,
            hidden_activation_types: vec![ActivationType::Sigmoid],
            output_activation_type: ActivationType::Sigmoid,
            weight_range: 1.0,
            weight_mutation_rate: 0.2,
            weight_replacement_chance: 0.1,
            max_weight_perturbation: 0.5,
            child_mutation_chance: 0.8,
            mutate_weights_odds: 0.988,
            add_neuron_odds: 0.001,
            add_link_odds: 0.01,
            adjust_curve_odds: 0.0,
            remove_link_odds: 0.001,
            max_mutation_attempts: 5,
            min_links_for_removal: 5,
            max_neurons: 100,
            excess_factor: 1.0,
            disjoint_factor: 1.0,
            matched_weight_factor: 0.4,
        }
    }

    /// Sum of the dispatcher odds. A valid configuration
    /// has a positive sum and no negative entry.
    pub(crate) fn operator_odds(&self) -> [f64; 5] {
        [
            self.mutate_weights_odds,
            self.add_neuron_odds,
            self.add_link_odds,
            self.adjust_curve_odds,
            self.remove_link_odds,
        ]
    }
}
