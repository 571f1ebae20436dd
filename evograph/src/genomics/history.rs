use crate::genomics::{ActivationType, GeneticConfig, NeuronGene, NeuronKind};
use crate::{Innovation, NeuronId};

use ahash::RandomState;
use serde::{Deserialize, Serialize};

use std::collections::hash_map::{Entry, HashMap};

/// The innovation ids handed out for a link-split mutation:
/// the id of the split itself and the id of the hidden neuron
/// it introduces. The two constituent links receive ordinary
/// link innovations, registered alongside the split.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitInnovation {
    /// Id of the hidden neuron created by the split.
    pub neuron: NeuronId,
    /// Innovation id of the split mutation itself.
    pub innovation: Innovation,
}

/// The information needed to re-materialize a neuron gene
/// from its id alone, as crossover does when rebuilding an
/// offspring's neuron list.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
struct NeuronSeed {
    kind: NeuronKind,
    activation: ActivationType,
    innovation: Innovation,
}

/// An `InnovationLedger` keeps track of every structural
/// mutation that has occurred anywhere in a population, so
/// that identical mutations — a link between the same pair of
/// neurons, or a split of the same link — are assigned the
/// same innovation ids no matter which genome performs them.
///
/// The ledger is explicit state owned by the population and
/// passed into every operator call; it lives exactly as long
/// as its training run. During concurrent breeding it sits
/// behind a single mutex, since two workers may discover the
/// same structural change and must agree on one id.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InnovationLedger {
    link_innovations: HashMap<(NeuronId, NeuronId), Innovation, RandomState>,
    split_innovations: HashMap<(NeuronId, NeuronId), SplitInnovation, RandomState>,
    neuron_seeds: HashMap<NeuronId, NeuronSeed, RandomState>,
    next_innovation: Innovation,
    next_neuron_id: NeuronId,
}

impl InnovationLedger {
    /// Creates a ledger pre-seeded for the configured topology:
    /// the bias/input/output neurons are registered, and the
    /// full set of initial (input ∪ bias) → output links is
    /// assigned the innovation ids `0..(input_count + 1) × output_count`,
    /// so every initial genome in a population aligns perfectly.
    ///
    /// Neuron ids are laid out as inputs `0..n`, bias `n`,
    /// outputs `n+1..=n+m`.
    ///
    /// # Examples
    /// ```
    /// use evograph::genomics::{GeneticConfig, InnovationLedger};
    /// use std::num::NonZeroUsize;
    ///
    /// let config = GeneticConfig {
    ///     input_count: NonZeroUsize::new(3).unwrap(),
    ///     output_count: NonZeroUsize::new(1).unwrap(),
    ///     ..GeneticConfig::zero()
    /// };
    /// let mut ledger = InnovationLedger::seeded(&config);
    ///
    /// // The four initial links (3 inputs + bias, to the output).
    /// assert_eq!(ledger.find_or_create_link_innovation(0, 4), 0);
    /// assert_eq!(ledger.find_or_create_link_innovation(3, 4), 3);
    /// ```
    pub fn seeded(config: &GeneticConfig) -> InnovationLedger {
        let input_count = config.input_count.get();
        let output_count = config.output_count.get();

        let mut ledger = InnovationLedger {
            next_innovation: 0,
            next_neuron_id: input_count + output_count + 1,
            ..InnovationLedger::default()
        };

        for id in 0..input_count {
            ledger.register_neuron(id, NeuronKind::Input, ActivationType::Identity, 0);
        }
        ledger.register_neuron(input_count, NeuronKind::Bias, ActivationType::Identity, 0);
        for o in 0..output_count {
            ledger.register_neuron(
                input_count + 1 + o,
                NeuronKind::Output,
                config.output_activation_type,
                0,
            );
        }

        for from in 0..=input_count {
            for o in 0..output_count {
                ledger.find_or_create_link_innovation(from, input_count + 1 + o);
            }
        }

        ledger
    }

    fn register_neuron(
        &mut self,
        id: NeuronId,
        kind: NeuronKind,
        activation: ActivationType,
        innovation: Innovation,
    ) {
        self.neuron_seeds.insert(
            id,
            NeuronSeed {
                kind,
                activation,
                innovation,
            },
        );
    }

    /// Returns the innovation id for a link between `from` and
    /// `to`, creating a new record the first time the pair is
    /// seen. Idempotent for the same structural input within a run.
    ///
    /// # Examples
    /// ```
    /// use evograph::genomics::{GeneticConfig, InnovationLedger};
    ///
    /// let mut ledger = InnovationLedger::seeded(&GeneticConfig::zero());
    ///
    /// let first = ledger.find_or_create_link_innovation(1, 2);
    /// let second = ledger.find_or_create_link_innovation(1, 2);
    ///
    /// assert_eq!(first, second);
    /// ```
    pub fn find_or_create_link_innovation(
        &mut self,
        from: NeuronId,
        to: NeuronId,
    ) -> Innovation {
        match self.link_innovations.entry((from, to)) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let innovation = self.next_innovation;
                self.next_innovation += 1;
                entry.insert(innovation);
                innovation
            }
        }
    }

    /// Returns the split record for the link `from -> to`,
    /// creating one — along with the two constituent link
    /// innovations and the new hidden neuron's seed — the first
    /// time that link is split anywhere in the population.
    ///
    /// `activation` is only consulted on creation; later callers
    /// receive the activation recorded by the first split, so
    /// independently-evolved identical splits produce identical
    /// neuron genes.
    pub fn find_or_create_split_innovation(
        &mut self,
        from: NeuronId,
        to: NeuronId,
        activation: ActivationType,
    ) -> SplitInnovation {
        if let Some(split) = self.split_innovations.get(&(from, to)) {
            return *split;
        }
        self.create_split_innovation(from, to, activation)
    }

    /// Replaces the split record for `from -> to` with a fresh
    /// one. Used when a genome already contains the recorded
    /// neuron id (it split the same link in an earlier
    /// generation) and reusing the record would duplicate genes
    /// within one genome.
    pub fn replace_split_innovation(
        &mut self,
        from: NeuronId,
        to: NeuronId,
        activation: ActivationType,
    ) -> SplitInnovation {
        self.create_split_innovation(from, to, activation)
    }

    fn create_split_innovation(
        &mut self,
        from: NeuronId,
        to: NeuronId,
        activation: ActivationType,
    ) -> SplitInnovation {
        let neuron = self.next_neuron_id;
        self.next_neuron_id += 1;
        let innovation = self.next_innovation;
        self.next_innovation += 1;

        let split = SplitInnovation { neuron, innovation };
        self.split_innovations.insert((from, to), split);
        self.register_neuron(neuron, NeuronKind::Hidden, activation, innovation);

        // The sides of the split are ordinary link innovations.
        self.link_innovations.insert((from, neuron), self.next_innovation);
        self.next_innovation += 1;
        self.link_innovations.insert((neuron, to), self.next_innovation);
        self.next_innovation += 1;

        split
    }

    /// Materializes the neuron gene for a previously-registered
    /// neuron id. Returns `None` for ids the ledger has never
    /// handed out.
    pub fn create_neuron_from_id(&self, id: NeuronId) -> Option<NeuronGene> {
        self.neuron_seeds
            .get(&id)
            .map(|seed| NeuronGene::new(id, seed.kind, seed.activation, seed.innovation))
    }

    /// Returns the innovation id already assigned to the link
    /// `from -> to`, without creating one.
    pub fn link_innovation(&self, from: NeuronId, to: NeuronId) -> Option<Innovation> {
        self.link_innovations.get(&(from, to)).copied()
    }

    /// Returns the next innovation id the ledger would assign.
    pub fn next_innovation(&self) -> Innovation {
        self.next_innovation
    }

    /// Returns the next neuron id the ledger would assign.
    pub fn next_neuron_id(&self) -> NeuronId {
        self.next_neuron_id
    }
}
