//! Clustering of the population into species, the adaptive
//! compatibility threshold, and offspring quota allotment.

use crate::genomics::{GeneticConfig, Genome};
use crate::populations::{round_retain_sum, Population, PopulationConfig, TrainError};
use crate::GenomeId;

/// Computes the compatibility distance between two genomes by
/// walking both sorted link-gene lists with two cursors.
/// Genes present on only one side count as *excess* once the
/// other list is exhausted and as *disjoint* before that;
/// matching innovation ids accumulate absolute weight
/// difference. The result is
/// `c1·excess + c2·disjoint + c3·(weight_diff / matched)`,
/// with the matched count guarded against zero.
///
/// The distance is symmetric in its genome arguments.
///
/// # Examples
/// ```
/// use evograph::genomics::{GeneticConfig, Genome, InnovationLedger};
/// use evograph::populations::compatibility_distance;
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
///
/// let config = GeneticConfig {
///     weight_range: 1.0,
///     excess_factor: 1.0,
///     disjoint_factor: 1.0,
///     matched_weight_factor: 0.4,
///     ..GeneticConfig::zero()
/// };
/// let mut ledger = InnovationLedger::seeded(&config);
/// let mut rng = StdRng::seed_from_u64(0);
/// let genome = Genome::initial(0, &config, &mut ledger, &mut rng);
///
/// assert_eq!(compatibility_distance(&genome, &genome, &config), 0.0);
/// ```
pub fn compatibility_distance(a: &Genome, b: &Genome, config: &GeneticConfig) -> f64 {
    let a_links = a.links_slice();
    let b_links = b.links_slice();

    let mut excess = 0usize;
    let mut disjoint = 0usize;
    let mut matched = 0usize;
    let mut weight_diff = 0.0f64;

    let mut ca = 0;
    let mut cb = 0;
    while ca < a_links.len() || cb < b_links.len() {
        if ca == a_links.len() {
            excess += 1;
            cb += 1;
            continue;
        }
        if cb == b_links.len() {
            excess += 1;
            ca += 1;
            continue;
        }

        let ia = a_links[ca].innovation();
        let ib = b_links[cb].innovation();
        if ia == ib {
            weight_diff += (a_links[ca].weight() - b_links[cb].weight()).abs();
            matched += 1;
            ca += 1;
            cb += 1;
        } else if ia < ib {
            disjoint += 1;
            ca += 1;
        } else {
            disjoint += 1;
            cb += 1;
        }
    }

    config.excess_factor * excess as f64
        + config.disjoint_factor * disjoint as f64
        + config.matched_weight_factor * (weight_diff / matched.max(1) as f64)
}

/// The per-generation speciation pass. Owns the adaptive
/// compatibility threshold across generations.
#[derive(Clone, Debug)]
pub struct Speciation {
    compatibility_threshold: f64,
}

impl Speciation {
    /// Binds the pass to a training run's starting threshold.
    pub fn new(config: &PopulationConfig) -> Speciation {
        Speciation {
            compatibility_threshold: config.compatibility_threshold,
        }
    }

    /// Returns the current compatibility threshold.
    pub fn compatibility_threshold(&self) -> f64 {
        self.compatibility_threshold
    }

    /// Runs the full speciation state machine over the
    /// population: reset, assign, threshold adjustment, and
    /// quota allotment. `best` identifies the population's
    /// best-ever genome, which exempts its species from
    /// stagnation eviction and the zero-quota drop.
    ///
    /// # Errors
    ///
    /// Returns [`TrainError::DegeneratePopulation`] if every
    /// species' offspring share is zero.
    pub fn perform(
        &mut self,
        population: &mut Population,
        population_config: &PopulationConfig,
        genetic_config: &GeneticConfig,
        minimize: bool,
        best: Option<GenomeId>,
    ) -> Result<(), TrainError> {
        self.reset(population, population_config, best);
        self.assign(population, genetic_config, minimize);
        self.adjust_threshold(population, population_config);
        self.allot_quotas(population, population_config, minimize, best)
    }

    /// Purges species membership and evicts species whose
    /// leader no longer exists in the population, or that have
    /// stagnated beyond the limit without holding the best genome.
    fn reset(
        &self,
        population: &mut Population,
        config: &PopulationConfig,
        best: Option<GenomeId>,
    ) {
        let live: Vec<GenomeId> = population.genomes().iter().map(Genome::id).collect();
        let stagnation_limit = config.stagnation_limit;

        let species = population.species_mut();
        for s in species.iter_mut() {
            s.purge();
        }
        species.retain(|s| {
            if !live.contains(&s.leader()) {
                return false;
            }
            s.gens_no_improvement() <= stagnation_limit || Some(s.leader()) == best
        });
    }

    /// Assigns every genome to the first species whose leader
    /// is within the compatibility threshold, creating a new
    /// species otherwise. A joining genome that beats the
    /// current leader is promoted on the spot.
    fn assign(&self, population: &mut Population, config: &GeneticConfig, minimize: bool) {
        // Leader snapshots keep the borrow on the genome arena
        // short; they are replaced as leaders are promoted.
        let mut leaders: Vec<Genome> = population
            .species()
            .iter()
            .filter_map(|s| population.genome(s.leader()).cloned())
            .collect();

        let mut assignments: Vec<Option<usize>> = Vec::with_capacity(population.genomes().len());
        let mut new_species: Vec<usize> = Vec::new();

        for index in 0..population.genomes().len() {
            let genome = &population.genomes()[index];
            let found = leaders
                .iter()
                .position(|leader| {
                    compatibility_distance(genome, leader, config) <= self.compatibility_threshold
                });
            match found {
                Some(slot) => {
                    assignments.push(Some(slot));
                    if better(genome.score(), leaders[slot].score(), minimize) {
                        leaders[slot] = genome.clone();
                    }
                }
                None => {
                    assignments.push(None);
                    new_species.push(index);
                    leaders.push(genome.clone());
                }
            }
        }

        population.apply_assignments(&assignments, &new_species, minimize);
    }

    /// Nudges the compatibility threshold to keep the species
    /// count in range: up when there are too many species, down
    /// when there are fewer than two.
    fn adjust_threshold(&mut self, population: &Population, config: &PopulationConfig) {
        if config.max_species == 0 {
            return;
        }
        if population.species().len() > config.max_species {
            self.compatibility_threshold += config.threshold_increment;
        } else if population.species().len() < 2 {
            self.compatibility_threshold -= config.threshold_increment;
        }
    }

    /// Computes fitness-shared member scores and converts each
    /// species' share into an offspring quota. Shares are
    /// oriented so that larger is better, normalized to the
    /// population size with largest-remainder rounding, and a
    /// zero-quota species is dropped unless it holds the best
    /// genome, in which case it is floored to one offspring.
    fn allot_quotas(
        &self,
        population: &mut Population,
        config: &PopulationConfig,
        minimize: bool,
        best: Option<GenomeId>,
    ) -> Result<(), TrainError> {
        population.apply_fitness_sharing(config, minimize);

        // Orientation baseline: the worst finite adjusted score.
        let max_adjusted = population
            .genomes()
            .iter()
            .map(Genome::adjusted_score)
            .filter(|s| s.is_finite())
            .fold(f64::NEG_INFINITY, f64::max);

        let shares: Vec<f64> = population
            .species()
            .iter()
            .map(|s| {
                s.members()
                    .iter()
                    .filter_map(|id| population.genome(*id))
                    .map(|g| oriented(g.adjusted_score(), max_adjusted, minimize))
                    .sum::<f64>()
                    .max(0.0)
            })
            .collect();

        let share_total: f64 = shares.iter().sum();
        if share_total <= 0.0 || !share_total.is_finite() {
            return Err(TrainError::DegeneratePopulation);
        }

        let target = population.target_size();
        let normalized: Vec<f64> = shares
            .iter()
            .map(|share| share / share_total * target as f64)
            .collect();
        let quotas = round_retain_sum(&normalized, target);

        let species = population.species_mut();
        for (s, quota) in species.iter_mut().zip(quotas) {
            s.set_offspring_quota(quota);
        }
        // A species allotted nothing dies, unless it shelters
        // the population's best genome.
        species.retain_mut(|s| {
            if s.offspring_quota() > 0 {
                return true;
            }
            if Some(s.leader()) == best {
                s.set_offspring_quota(1);
                return true;
            }
            false
        });

        Ok(())
    }
}

pub(crate) fn better(candidate: f64, incumbent: f64, minimize: bool) -> bool {
    if minimize {
        candidate < incumbent
    } else {
        candidate > incumbent
    }
}

pub(crate) fn oriented(score: f64, max_observed: f64, minimize: bool) -> f64 {
    if !score.is_finite() {
        return 0.0;
    }
    if minimize {
        max_observed - score
    } else {
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::{mutate_add_link, mutate_add_neuron, InnovationLedger};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::num::NonZeroUsize;

    fn config(inputs: usize, outputs: usize) -> GeneticConfig {
        GeneticConfig {
            weight_range: 1.0,
            max_mutation_attempts: 5,
            max_neurons: 100,
            ..GeneticConfig::standard(
                NonZeroUsize::new(inputs).unwrap(),
                NonZeroUsize::new(outputs).unwrap(),
            )
        }
    }

    #[test]
    fn distance_is_zero_for_identical_genomes() {
        let config = config(3, 1);
        let mut ledger = InnovationLedger::seeded(&config);
        let mut rng = StdRng::seed_from_u64(0);
        let genome = Genome::initial(0, &config, &mut ledger, &mut rng);

        assert_eq!(compatibility_distance(&genome, &genome, &config), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let config = config(3, 2);
        let mut ledger = InnovationLedger::seeded(&config);
        let mut rng = StdRng::seed_from_u64(9);
        let mut a = Genome::initial(0, &config, &mut ledger, &mut rng);
        let mut b = Genome::initial(1, &config, &mut ledger, &mut rng);
        for _ in 0..5 {
            mutate_add_neuron(&mut a, &mut ledger, &config, &mut rng);
            mutate_add_link(&mut a, &mut ledger, &config, &mut rng);
            mutate_add_neuron(&mut b, &mut ledger, &config, &mut rng);
        }

        let ab = compatibility_distance(&a, &b, &config);
        let ba = compatibility_distance(&b, &a, &config);
        assert_eq!(ab, ba);
        assert!(ab > 0.0);
    }

    #[test]
    fn distance_counts_weight_differences() {
        let config = config(2, 1);
        let mut ledger = InnovationLedger::seeded(&config);
        let mut rng = StdRng::seed_from_u64(12);
        let a = Genome::initial(0, &config, &mut ledger, &mut rng);
        let b = Genome::initial(1, &config, &mut ledger, &mut rng);

        // Same topology: distance is purely the mean matched
        // weight difference, scaled by c3.
        let expected: f64 = a
            .links()
            .zip(b.links())
            .map(|(la, lb)| (la.weight() - lb.weight()).abs())
            .sum::<f64>()
            / a.gene_count() as f64
            * config.matched_weight_factor;
        let distance = compatibility_distance(&a, &b, &config);
        assert!((distance - expected).abs() < 1e-12);
    }
}
