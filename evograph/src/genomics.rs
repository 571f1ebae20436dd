//! Genomes are the focus of evolution in NEAT.
//! A genome is an arena of neuron and link gene records,
//! cross-referenced by stable integer id rather than by
//! pointer, which can be decoded into a network elsewhere.
//! Structural operators work purely on ids and must leave
//! the genome's invariants intact on return.

mod config;
mod crossover;
mod errors;
mod genes;
mod history;
mod mutation;
mod nodes;

pub use config::GeneticConfig;
pub use crossover::crossover;
pub use errors::GenomeError;
pub use genes::LinkGene;
pub use history::{InnovationLedger, SplitInnovation};
pub use mutation::{
    mutate, mutate_add_link, mutate_add_neuron, mutate_remove_link, mutate_weights, MutationKind,
};
pub use nodes::{ActivationType, NeuronGene, NeuronKind};

use crate::{GenomeId, NeuronId, SpeciesId};

use rand::Rng;
use serde::{Deserialize, Serialize};

use std::fmt;

/// One individual's evolvable blueprint: an ordered list of
/// neuron genes and an ordered list of link genes, plus the
/// scores and bookkeeping the population tracks per individual.
///
/// Invariants (see [`validate`]):
/// - every neuron id referenced by a link gene exists in the
///   neuron gene list;
/// - no two link genes share a (source, target) pair in the
///   same direction;
/// - link genes are sorted ascending by innovation id;
/// - neuron genes are sorted ascending by id, with the
///   configured inputs at `0..n`, the bias at `n`, and the
///   outputs at `n+1..=n+m`.
///
/// [`validate`]: Genome::validate
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Genome {
    id: GenomeId,
    neurons: Vec<NeuronGene>,
    links: Vec<LinkGene>,
    score: f64,
    adjusted_score: f64,
    species: Option<SpeciesId>,
    birth_generation: usize,
    input_count: usize,
    output_count: usize,
}

impl Genome {
    /// Creates an initial-topology genome: inputs and bias
    /// fully connected to the outputs, link weights drawn
    /// uniformly from ±`config.weight_range`, and innovation
    /// ids taken from the (seeded) ledger so that all initial
    /// genomes of a population align.
    ///
    /// # Examples
    /// ```
    /// use evograph::genomics::{Genome, GeneticConfig, InnovationLedger};
    /// use rand::rngs::StdRng;
    /// use rand::SeedableRng;
    /// use std::num::NonZeroUsize;
    ///
    /// let config = GeneticConfig {
    ///     input_count: NonZeroUsize::new(3).unwrap(),
    ///     output_count: NonZeroUsize::new(1).unwrap(),
    ///     weight_range: 1.0,
    ///     ..GeneticConfig::zero()
    /// };
    /// let mut ledger = InnovationLedger::seeded(&config);
    /// let mut rng = StdRng::seed_from_u64(0);
    ///
    /// let genome = Genome::initial(0, &config, &mut ledger, &mut rng);
    ///
    /// // 3 inputs + bias + output, fully connected.
    /// assert_eq!(genome.neuron_count(), 5);
    /// assert_eq!(genome.gene_count(), 4);
    /// assert!(genome.validate().is_ok());
    /// ```
    pub fn initial<R: Rng>(
        id: GenomeId,
        config: &GeneticConfig,
        ledger: &mut InnovationLedger,
        rng: &mut R,
    ) -> Genome {
        let input_count = config.input_count.get();
        let output_count = config.output_count.get();

        let neurons: Vec<NeuronGene> = (0..input_count + output_count + 1)
            .map(|id| {
                ledger
                    .create_neuron_from_id(id)
                    .expect("seeded ledger covers the initial topology")
            })
            .collect();

        let mut links = Vec::with_capacity((input_count + 1) * output_count);
        for from in 0..=input_count {
            for o in 0..output_count {
                let to = input_count + 1 + o;
                let innovation = ledger.find_or_create_link_innovation(from, to);
                links.push(LinkGene::new(
                    innovation,
                    from,
                    to,
                    LinkGene::random_weight(config, rng),
                ));
            }
        }
        links.sort_unstable_by_key(LinkGene::innovation);

        Genome {
            id,
            neurons,
            links,
            score: 0.0,
            adjusted_score: 0.0,
            species: None,
            birth_generation: 0,
            input_count,
            output_count,
        }
    }

    /// Assembles a genome from explicit gene lists, as crossover
    /// does. Neurons are sorted by id and links by innovation id.
    pub fn from_parts(
        id: GenomeId,
        mut neurons: Vec<NeuronGene>,
        mut links: Vec<LinkGene>,
        input_count: usize,
        output_count: usize,
        birth_generation: usize,
    ) -> Genome {
        neurons.sort_unstable_by_key(NeuronGene::id);
        links.sort_unstable_by_key(LinkGene::innovation);
        Genome {
            id,
            neurons,
            links,
            score: 0.0,
            adjusted_score: 0.0,
            species: None,
            birth_generation,
            input_count,
            output_count,
        }
    }

    /// Returns the genome's id.
    pub fn id(&self) -> GenomeId {
        self.id
    }

    /// Reassigns the genome's id. Used when a clone enters the
    /// population as a new individual.
    pub(crate) fn set_id(&mut self, id: GenomeId) {
        self.id = id;
    }

    /// Returns the number of link genes.
    pub fn gene_count(&self) -> usize {
        self.links.len()
    }

    /// Returns the number of neuron genes.
    pub fn neuron_count(&self) -> usize {
        self.neurons.len()
    }

    /// Returns an iterator over the genome's link genes,
    /// ascending by innovation id.
    pub fn links(&self) -> impl Iterator<Item = &LinkGene> {
        self.links.iter()
    }

    /// Returns an iterator over the genome's neuron genes,
    /// ascending by id.
    pub fn neurons(&self) -> impl Iterator<Item = &NeuronGene> {
        self.neurons.iter()
    }

    pub(crate) fn links_slice(&self) -> &[LinkGene] {
        &self.links
    }

    pub(crate) fn links_mut(&mut self) -> &mut [LinkGene] {
        &mut self.links
    }

    pub(crate) fn neurons_slice(&self) -> &[NeuronGene] {
        &self.neurons
    }

    /// Returns the genome's score.
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Sets the genome's score.
    pub fn set_score(&mut self, score: f64) {
        self.score = score;
    }

    /// Returns the genome's fitness-shared score.
    pub fn adjusted_score(&self) -> f64 {
        self.adjusted_score
    }

    /// Sets the genome's fitness-shared score.
    pub fn set_adjusted_score(&mut self, adjusted_score: f64) {
        self.adjusted_score = adjusted_score;
    }

    /// Returns the species the genome currently belongs to.
    pub fn species(&self) -> Option<SpeciesId> {
        self.species
    }

    /// Records the species the genome belongs to.
    pub(crate) fn set_species(&mut self, species: Option<SpeciesId>) {
        self.species = species;
    }

    /// Returns the generation in which the genome was born.
    pub fn birth_generation(&self) -> usize {
        self.birth_generation
    }

    pub(crate) fn set_birth_generation(&mut self, generation: usize) {
        self.birth_generation = generation;
    }

    /// Returns the number of input neurons in the genome's topology.
    pub fn input_count(&self) -> usize {
        self.input_count
    }

    /// Returns the number of output neurons in the genome's topology.
    pub fn output_count(&self) -> usize {
        self.output_count
    }

    /// Returns the position of the neuron with the given id in
    /// the neuron gene list.
    pub fn neuron_position(&self, id: NeuronId) -> Option<usize> {
        self.neurons.binary_search_by_key(&id, NeuronGene::id).ok()
    }

    /// Returns the neuron gene with the given id.
    pub fn find_neuron(&self, id: NeuronId) -> Option<&NeuronGene> {
        self.neuron_position(id).map(|i| &self.neurons[i])
    }

    /// Returns whether the genome contains a neuron with the given id.
    pub fn has_neuron(&self, id: NeuronId) -> bool {
        self.neuron_position(id).is_some()
    }

    /// Returns whether a link between `from` and `to` (in that
    /// direction) already exists.
    pub fn is_duplicate_link(&self, from: NeuronId, to: NeuronId) -> bool {
        self.links.iter().any(|l| l.from() == from && l.to() == to)
    }

    /// Returns whether a neuron must be kept: bias, input and
    /// output neurons always, hidden neurons while any link
    /// still touches them.
    pub fn is_neuron_needed(&self, id: NeuronId) -> bool {
        if let Some(neuron) = self.find_neuron(id) {
            if !matches!(neuron.kind(), NeuronKind::Hidden) {
                return true;
            }
        }
        self.links.iter().any(|l| l.from() == id || l.to() == id)
    }

    /// Inserts a neuron gene, keeping the list sorted by id.
    pub(crate) fn insert_neuron(&mut self, neuron: NeuronGene) {
        match self.neurons.binary_search_by_key(&neuron.id(), NeuronGene::id) {
            Ok(_) => {}
            Err(pos) => self.neurons.insert(pos, neuron),
        }
    }

    /// Removes the neuron gene with the given id, if present.
    pub(crate) fn remove_neuron(&mut self, id: NeuronId) {
        if let Some(pos) = self.neuron_position(id) {
            self.neurons.remove(pos);
        }
    }

    /// Inserts a link gene, keeping the list sorted by
    /// innovation id.
    pub(crate) fn insert_link(&mut self, link: LinkGene) {
        let pos = self
            .links
            .binary_search_by_key(&link.innovation(), LinkGene::innovation)
            .unwrap_or_else(|pos| pos);
        self.links.insert(pos, link);
    }

    /// Removes and returns the link gene at `index`.
    pub(crate) fn remove_link_at(&mut self, index: usize) -> LinkGene {
        self.links.remove(index)
    }

    /// Checks the genome's structural invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    ///
    /// # Examples
    /// ```
    /// use evograph::genomics::{Genome, GeneticConfig, InnovationLedger};
    /// use rand::rngs::StdRng;
    /// use rand::SeedableRng;
    ///
    /// let config = GeneticConfig { weight_range: 1.0, ..GeneticConfig::zero() };
    /// let mut ledger = InnovationLedger::seeded(&config);
    /// let mut rng = StdRng::seed_from_u64(0);
    ///
    /// let genome = Genome::initial(0, &config, &mut ledger, &mut rng);
    /// assert!(genome.validate().is_ok());
    /// ```
    pub fn validate(&self) -> Result<(), GenomeError> {
        let bias_count = self
            .neurons
            .iter()
            .filter(|n| n.kind() == NeuronKind::Bias)
            .count();
        if bias_count != 1 {
            return Err(GenomeError::MalformedBias);
        }

        for id in 0..self.input_count + self.output_count + 1 {
            if !self.has_neuron(id) {
                return Err(GenomeError::MissingIoNeuron(id));
            }
        }

        for window in self.links.windows(2) {
            if window[0].innovation() > window[1].innovation() {
                return Err(GenomeError::UnsortedLinks);
            }
        }

        for (i, link) in self.links.iter().enumerate() {
            if !self.has_neuron(link.from()) || !self.has_neuron(link.to()) {
                return Err(GenomeError::DanglingEndpoint(link.from(), link.to()));
            }
            if self.links[..i]
                .iter()
                .any(|other| other.endpoints() == link.endpoints())
            {
                return Err(GenomeError::DuplicateLink(link.from(), link.to()));
            }
        }

        Ok(())
    }
}

impl fmt::Display for Genome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Genome")
            .field("Id", &self.id)
            .field("Neurons", &self.neurons.iter().map(ToString::to_string).collect::<Vec<_>>())
            .field("Links", &self.links.iter().map(ToString::to_string).collect::<Vec<_>>())
            .field("Score", &self.score)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::num::NonZeroUsize;

    fn config(inputs: usize, outputs: usize) -> GeneticConfig {
        GeneticConfig {
            input_count: NonZeroUsize::new(inputs).unwrap(),
            output_count: NonZeroUsize::new(outputs).unwrap(),
            weight_range: 1.0,
            ..GeneticConfig::zero()
        }
    }

    #[test]
    fn initial_genome_is_fully_connected() {
        for inputs in 1..6 {
            for outputs in 1..4 {
                let config = config(inputs, outputs);
                let mut ledger = InnovationLedger::seeded(&config);
                let mut rng = StdRng::seed_from_u64(42);

                let genome = Genome::initial(0, &config, &mut ledger, &mut rng);

                assert_eq!(genome.neuron_count(), inputs + outputs + 1);
                assert_eq!(genome.gene_count(), (inputs + 1) * outputs);
                assert!(genome.validate().is_ok());
                assert!(genome.links().all(|l| l.weight().abs() <= 1.0));
                assert!(genome.links().all(|l| l.enabled()));
            }
        }
    }

    #[test]
    fn initial_genomes_share_innovations() {
        let config = config(3, 1);
        let mut ledger = InnovationLedger::seeded(&config);
        let mut rng = StdRng::seed_from_u64(42);

        let a = Genome::initial(0, &config, &mut ledger, &mut rng);
        let b = Genome::initial(1, &config, &mut ledger, &mut rng);

        let a_ids: Vec<_> = a.links().map(LinkGene::innovation).collect();
        let b_ids: Vec<_> = b.links().map(LinkGene::innovation).collect();
        assert_eq!(a_ids, b_ids);
        assert_eq!(a_ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn duplicate_link_is_directional() {
        let config = config(1, 1);
        let mut ledger = InnovationLedger::seeded(&config);
        let mut rng = StdRng::seed_from_u64(42);
        let genome = Genome::initial(0, &config, &mut ledger, &mut rng);

        assert!(genome.is_duplicate_link(0, 2));
        assert!(!genome.is_duplicate_link(2, 0));
    }

    #[test]
    fn neuron_needed_rules() {
        let config = config(2, 1);
        let mut ledger = InnovationLedger::seeded(&config);
        let mut rng = StdRng::seed_from_u64(42);
        let mut genome = Genome::initial(0, &config, &mut ledger, &mut rng);

        // I/O neurons are always needed, linked or not.
        assert!(genome.is_neuron_needed(0));
        assert!(genome.is_neuron_needed(2));

        // A hidden neuron is needed only while links touch it.
        genome.insert_neuron(NeuronGene::new(
            9,
            NeuronKind::Hidden,
            ActivationType::Sigmoid,
            5,
        ));
        assert!(!genome.is_neuron_needed(9));
        genome.insert_link(LinkGene::new(10, 0, 9, 0.5));
        assert!(genome.is_neuron_needed(9));
    }

    #[test]
    fn validate_catches_duplicate_links() {
        let config = config(1, 1);
        let mut ledger = InnovationLedger::seeded(&config);
        let mut rng = StdRng::seed_from_u64(42);
        let mut genome = Genome::initial(0, &config, &mut ledger, &mut rng);

        genome.insert_link(LinkGene::new(99, 0, 2, 0.1));
        assert_eq!(genome.validate(), Err(GenomeError::DuplicateLink(0, 2)));
    }

    #[test]
    fn validate_catches_dangling_endpoints() {
        let config = config(1, 1);
        let mut ledger = InnovationLedger::seeded(&config);
        let mut rng = StdRng::seed_from_u64(42);
        let mut genome = Genome::initial(0, &config, &mut ledger, &mut rng);

        genome.insert_link(LinkGene::new(99, 0, 77, 0.1));
        assert_eq!(genome.validate(), Err(GenomeError::DanglingEndpoint(0, 77)));
    }

    #[test]
    fn serde_round_trip() {
        let config = config(2, 2);
        let mut ledger = InnovationLedger::seeded(&config);
        let mut rng = StdRng::seed_from_u64(42);
        let genome = Genome::initial(7, &config, &mut ledger, &mut rng);

        let json = serde_json::to_string(&genome).unwrap();
        let back: Genome = serde_json::from_str(&json).unwrap();
        assert_eq!(genome, back);
    }
}
