//! A Population is the full set of genomes under evolution,
//! clustered into species, together with the id counters and
//! the shared innovation ledger that keep structural change
//! globally consistent across a training run.

mod config;
mod errors;
pub mod log;
mod speciation;
mod species;

pub use config::PopulationConfig;
pub use errors::TrainError;
pub use speciation::{compatibility_distance, Speciation};
pub use species::Species;

pub(crate) use speciation::better;

use crate::genomics::{GeneticConfig, Genome, InnovationLedger};
use crate::{GenomeId, SpeciesId};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// The full genome set, its species, the id counters and the
/// innovation ledger of one training run.
///
/// The population persists for the life of the run: genomes are
/// born through mutation and crossover each generation and die
/// when their species is allotted no offspring; the ledger is
/// never pruned.
#[derive(Serialize, Deserialize)]
pub struct Population {
    genomes: Vec<Genome>,
    species: Vec<Species>,
    ledger: InnovationLedger,
    next_genome_id: GenomeId,
    next_species_id: SpeciesId,
    generation: usize,
    target_size: usize,
}

impl Population {
    /// Creates a population of initial-topology genomes with a
    /// freshly seeded ledger, so that every genome's link genes
    /// carry matching innovation ids.
    ///
    /// # Examples
    /// ```
    /// use evograph::genomics::GeneticConfig;
    /// use evograph::populations::{Population, PopulationConfig};
    /// use std::num::NonZeroUsize;
    ///
    /// let population = Population::new(
    ///     &PopulationConfig {
    ///         size: NonZeroUsize::new(50).unwrap(),
    ///         ..PopulationConfig::zero()
    ///     },
    ///     &GeneticConfig::zero(),
    /// );
    ///
    /// assert_eq!(population.genomes().len(), 50);
    /// ```
    pub fn new(population_config: &PopulationConfig, genetic_config: &GeneticConfig) -> Population {
        Self::with_rng(population_config, genetic_config, &mut StdRng::from_entropy())
    }

    /// As [`new`], with an explicit random source for
    /// reproducible construction.
    ///
    /// [`new`]: Population::new
    pub fn with_rng<R: Rng>(
        population_config: &PopulationConfig,
        genetic_config: &GeneticConfig,
        rng: &mut R,
    ) -> Population {
        let size = population_config.size.get();
        let mut ledger = InnovationLedger::seeded(genetic_config);
        let genomes: Vec<Genome> = (0..size)
            .map(|id| Genome::initial(id, genetic_config, &mut ledger, rng))
            .collect();

        Population {
            genomes,
            species: Vec::new(),
            ledger,
            next_genome_id: size,
            next_species_id: 0,
            generation: 0,
            target_size: size,
        }
    }

    /// Returns the genomes of the current generation.
    pub fn genomes(&self) -> &[Genome] {
        &self.genomes
    }

    pub(crate) fn genomes_vec(&mut self) -> &mut Vec<Genome> {
        &mut self.genomes
    }

    /// Returns the genome with the given id, if it is part of
    /// the current generation.
    pub fn genome(&self, id: GenomeId) -> Option<&Genome> {
        self.genomes.iter().find(|g| g.id() == id)
    }

    /// Returns the current species.
    pub fn species(&self) -> &[Species] {
        &self.species
    }

    pub(crate) fn species_mut(&mut self) -> &mut Vec<Species> {
        &mut self.species
    }

    /// Returns the configured population size.
    pub fn target_size(&self) -> usize {
        self.target_size
    }

    /// Returns the generation counter.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Returns the population's innovation ledger.
    pub fn ledger(&self) -> &InnovationLedger {
        &self.ledger
    }

    /// Hands the ledger out for a generation's concurrent
    /// breeding; [`restore_ledger`] puts it back afterwards.
    ///
    /// [`restore_ledger`]: Population::restore_ledger
    pub(crate) fn take_ledger(&mut self) -> InnovationLedger {
        std::mem::take(&mut self.ledger)
    }

    pub(crate) fn restore_ledger(&mut self, ledger: InnovationLedger) {
        self.ledger = ledger;
    }

    /// Hands out the next genome id.
    pub fn assign_genome_id(&mut self) -> GenomeId {
        let id = self.next_genome_id;
        self.next_genome_id += 1;
        id
    }

    pub(crate) fn next_genome_id(&self) -> GenomeId {
        self.next_genome_id
    }

    pub(crate) fn set_next_genome_id(&mut self, next: GenomeId) {
        self.next_genome_id = next;
    }

    /// Hands out the next species id.
    pub(crate) fn assign_species_id(&mut self) -> SpeciesId {
        let id = self.next_species_id;
        self.next_species_id += 1;
        id
    }

    /// Replaces the genome set with the next generation.
    pub(crate) fn install_genomes(&mut self, genomes: Vec<Genome>) {
        self.genomes = genomes;
        self.generation += 1;
    }

    /// Returns the best-scoring genome under the given
    /// orientation.
    pub fn champion(&self, minimize: bool) -> Option<&Genome> {
        self.genomes.iter().reduce(|best, g| {
            if better(g.score(), best.score(), minimize) {
                g
            } else {
                best
            }
        })
    }

    /// Applies the result of a speciation assignment pass:
    /// founds the new species in discovery order, fills
    /// membership lists, promotes leaders that were beaten, and
    /// stamps each genome's species back-reference.
    pub(crate) fn apply_assignments(
        &mut self,
        assignments: &[Option<usize>],
        new_species: &[usize],
        minimize: bool,
    ) {
        let existing = self.species.len();

        for &genome_index in new_species {
            let id = self.assign_species_id();
            let founder = &self.genomes[genome_index];
            let species = Species::new(id, founder.id(), founder.score());
            self.species.push(species);
        }

        let mut next_new = 0;
        for (index, assignment) in assignments.iter().enumerate() {
            let slot = match assignment {
                Some(slot) => *slot,
                None => {
                    let slot = existing + next_new;
                    next_new += 1;
                    slot
                }
            };
            let id = self.genomes[index].id();
            let score = self.genomes[index].score();
            let species = &mut self.species[slot];
            if assignment.is_some() {
                species.add_member(id);
                if better(score, species.best_score(), minimize) {
                    species.promote_leader(id, score);
                }
            }
            let species_id = species.id();
            self.genomes[index].set_species(Some(species_id));
        }
    }

    /// Computes fitness-shared scores: each member's score gets
    /// the young-species bonus or old-age penalty, then is
    /// divided by the species' member count.
    pub(crate) fn apply_fitness_sharing(&mut self, config: &PopulationConfig, minimize: bool) {
        for species in &self.species {
            let member_count = species.members().len().max(1);
            for &id in species.members() {
                let index = match self.genomes.iter().position(|g| g.id() == id) {
                    Some(index) => index,
                    None => continue,
                };
                let mut score = self.genomes[index].score();
                if species.age() < config.young_age_threshold {
                    score = apply_bonus(score, config.young_score_bonus, minimize);
                }
                if species.age() > config.old_age_threshold {
                    score = apply_penalty(score, config.old_age_penalty, minimize);
                }
                self.genomes[index].set_adjusted_score(score / member_count as f64);
            }
        }
    }
}

fn apply_bonus(score: f64, bonus: f64, minimize: bool) -> f64 {
    let amount = score * bonus;
    if minimize {
        score - amount
    } else {
        score + amount
    }
}

fn apply_penalty(score: f64, penalty: f64, minimize: bool) -> f64 {
    let amount = score * penalty;
    if minimize {
        score + amount
    } else {
        score - amount
    }
}

/// Rounds non-negative shares to whole offspring counts whose
/// sum is exactly `target`: everything is floored first, then
/// the remainder goes to the largest fractional parts.
pub(crate) fn round_retain_sum(values: &[f64], target: usize) -> Vec<usize> {
    let mut floored: Vec<usize> = values.iter().map(|v| v.max(0.0) as usize).collect();
    let floored_sum: usize = floored.iter().sum();
    let remainder = target.saturating_sub(floored_sum);

    let mut by_error: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .map(|(i, v)| (i, v.max(0.0) - v.max(0.0).floor()))
        .collect();
    by_error.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    for (index, _) in by_error.into_iter().take(remainder) {
        floored[index] += 1;
    }
    floored
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;

    #[test]
    fn round_retain_sum_conserves_target() {
        let shares = [5.2, 9.5, 2.8, 1.3, 2.2, 2.7, 6.3, 1.0];
        let target = 31;
        let rounded = round_retain_sum(&shares, target);
        assert_eq!(rounded.iter().sum::<usize>(), target);
        // No share loses more than one whole offspring to rounding.
        for (share, quota) in shares.iter().zip(&rounded) {
            assert!((*share - *quota as f64).abs() < 1.0);
        }
    }

    #[test]
    fn round_retain_sum_handles_exact_values() {
        let shares = [3.0, 4.0, 5.0];
        assert_eq!(round_retain_sum(&shares, 12), vec![3, 4, 5]);
    }

    #[test]
    fn initial_population_is_aligned() {
        let genetic_config = GeneticConfig {
            input_count: NonZeroUsize::new(3).unwrap(),
            output_count: NonZeroUsize::new(1).unwrap(),
            weight_range: 1.0,
            ..GeneticConfig::zero()
        };
        let population_config = PopulationConfig {
            size: NonZeroUsize::new(25).unwrap(),
            ..PopulationConfig::zero()
        };
        let mut rng = StdRng::seed_from_u64(5);
        let population = Population::with_rng(&population_config, &genetic_config, &mut rng);

        assert_eq!(population.genomes().len(), 25);
        let first: Vec<_> = population.genomes()[0]
            .links()
            .map(|l| l.innovation())
            .collect();
        for genome in population.genomes() {
            assert!(genome.validate().is_ok());
            let ids: Vec<_> = genome.links().map(|l| l.innovation()).collect();
            assert_eq!(ids, first);
        }
        // Genome ids are unique.
        let mut ids: Vec<_> = population.genomes().iter().map(Genome::id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 25);
    }
}
