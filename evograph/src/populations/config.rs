use std::num::NonZeroUsize;

/// Configuration data for population-level evolution:
/// speciation, selection and generational bookkeeping.
#[derive(Clone, Debug)]
pub struct PopulationConfig {
    /// Number of genomes in the population.
    pub size: NonZeroUsize,
    /// Starting compatibility threshold for species membership.
    /// Adapted at runtime between generations.
    pub compatibility_threshold: f64,
    /// Fixed step by which the compatibility threshold is
    /// raised or lowered when the species count drifts.
    pub threshold_increment: f64,
    /// Species count above which the threshold is raised.
    /// 0 disables threshold adaptation.
    pub max_species: usize,
    /// Generations without improvement after which a species is
    /// destroyed, unless it holds the population's best genome.
    pub stagnation_limit: usize,
    /// Fraction of a species (by rank) eligible as parents.
    pub survival_threshold: f64,
    /// Chance that an offspring slot is filled by crossover
    /// rather than clone-and-mutate, when the species has the
    /// parents for it.
    pub crossover_chance: f64,
    /// Retries to find a second, distinct crossover parent
    /// before falling back to mutation.
    pub max_parent_retries: usize,
    /// Age below which a species' member scores receive a bonus.
    pub young_age_threshold: usize,
    /// Score bonus applied to members of young species.
    pub young_score_bonus: f64,
    /// Age above which a species' member scores are penalized.
    pub old_age_threshold: usize,
    /// Score penalty applied to members of old species.
    pub old_age_penalty: f64,
}

impl PopulationConfig {
    /// Returns a "zero-valued" default configuration.
    /// All values are 0, or 1 for `NonZeroUsize`s.
    pub fn zero() -> PopulationConfig {
        PopulationConfig {
            size: NonZeroUsize::new(1).unwrap(),
            compatibility_threshold: 0.0,
            threshold_increment: 0.0,
            max_species: 0,
            stagnation_limit: 0,
            survival_threshold: 0.0,
            crossover_chance: 0.0,
            max_parent_retries: 0,
            young_age_threshold: 0,
            young_score_bonus: 0.0,
            old_age_threshold: 0,
            old_age_penalty: 0.0,
        }
    }

    /// Returns the original engine's default parameter block.
    pub fn standard() -> PopulationConfig {
        PopulationConfig {
            size: NonZeroUsize::new(150).unwrap(),
            compatibility_threshold: 3.0,
            threshold_increment: 0.01,
            max_species: 40,
            stagnation_limit: 15,
            survival_threshold: 0.2,
            crossover_chance: 0.7,
            max_parent_retries: 5,
            young_age_threshold: 10,
            young_score_bonus: 0.3,
            old_age_threshold: 50,
            old_age_penalty: 0.3,
        }
    }
}
