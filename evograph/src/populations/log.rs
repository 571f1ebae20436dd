//! Generational logging: snapshots of a population's state
//! taken between generations, at a configurable level of detail.

use crate::genomics::Genome;
use crate::populations::Population;
use crate::SpeciesId;

use std::fmt;

/// How much of a population each snapshot clones.
#[derive(Clone, Copy, Debug)]
pub enum ReportingLevel {
    /// Clones the entire population.
    AllGenomes,
    /// Clones each species' leader.
    SpeciesLeaders,
    /// Clones only the population champion.
    PopulationChampion,
    /// Clones no genomes.
    NoGenomes,
}

/// A reporting-level dependent store of genomes from a population.
#[derive(Clone, Debug)]
pub enum GenerationRecord {
    /// Species ids, their members, and stagnation levels.
    Species(Vec<(SpeciesId, Vec<Genome>, usize)>),
    /// Species ids, their leaders, and stagnation levels.
    SpeciesLeaders(Vec<(SpeciesId, Option<Genome>, usize)>),
    /// Only the population champion.
    PopulationChampion(Option<Genome>),
    /// Empty.
    None,
}

/// Basic statistics over one generation's scores.
#[derive(Clone, Copy, Debug)]
pub struct Stats {
    pub maximum: f64,
    pub minimum: f64,
    pub mean: f64,
}

impl Stats {
    /// Returns statistics about the numbers in a sequence.
    /// All fields are 0 for an empty sequence.
    ///
    /// # Examples
    /// ```
    /// use evograph::populations::log::Stats;
    ///
    /// let stats = Stats::from_scores([-2.0, -1.0, 0.5, 1.0, 1.5].iter().copied());
    /// assert_eq!(stats.maximum, 1.5);
    /// assert_eq!(stats.minimum, -2.0);
    /// assert_eq!(stats.mean, 0.0);
    /// ```
    pub fn from_scores(scores: impl Iterator<Item = f64>) -> Stats {
        let mut count = 0usize;
        let (mut max, mut min, mut sum) = (f64::MIN, f64::MAX, 0.0);
        for s in scores {
            max = s.max(max);
            min = s.min(min);
            sum += s;
            count += 1;
        }
        if count == 0 {
            return Stats {
                maximum: 0.0,
                minimum: 0.0,
                mean: 0.0,
            };
        }
        Stats {
            maximum: max,
            minimum: min,
            mean: sum / count as f64,
        }
    }
}

/// A snapshot of a population between generations.
#[derive(Clone, Debug)]
pub struct Log {
    pub generation: usize,
    pub species_count: usize,
    pub score_stats: Stats,
    pub complexity_stats: Stats,
    pub sample: GenerationRecord,
}

impl fmt::Display for Log {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "generation {}: {} species, scores [{:.3}, {:.3}] mean {:.3}, mean genes {:.1}",
            self.generation,
            self.species_count,
            self.score_stats.minimum,
            self.score_stats.maximum,
            self.score_stats.mean,
            self.complexity_stats.mean,
        )
    }
}

/// A log of the evolution of a population over time.
///
/// # Examples
/// ```
/// use evograph::genomics::GeneticConfig;
/// use evograph::populations::log::{EvolutionLogger, ReportingLevel};
/// use evograph::populations::{Population, PopulationConfig};
///
/// let population = Population::new(&PopulationConfig::zero(), &GeneticConfig::zero());
/// let mut logger = EvolutionLogger::new(ReportingLevel::NoGenomes);
///
/// logger.log(&population, false);
/// for log in logger.iter() {
///     println!("{}", log);
/// }
/// ```
#[derive(Clone, Debug)]
pub struct EvolutionLogger {
    reporting_level: ReportingLevel,
    logs: Vec<Log>,
}

impl EvolutionLogger {
    /// Returns a logger with the given reporting level.
    pub fn new(reporting_level: ReportingLevel) -> EvolutionLogger {
        EvolutionLogger {
            reporting_level,
            logs: vec![],
        }
    }

    /// Stores a snapshot of the population. `minimize` orients
    /// the champion lookup.
    pub fn log(&mut self, population: &Population, minimize: bool) {
        self.logs.push(Log {
            generation: population.generation(),
            species_count: population.species().len(),
            score_stats: Stats::from_scores(population.genomes().iter().map(Genome::score)),
            complexity_stats: Stats::from_scores(
                population.genomes().iter().map(|g| g.gene_count() as f64),
            ),
            sample: match self.reporting_level {
                ReportingLevel::AllGenomes => GenerationRecord::Species(
                    population
                        .species()
                        .iter()
                        .map(|s| {
                            (
                                s.id(),
                                s.members()
                                    .iter()
                                    .filter_map(|id| population.genome(*id).cloned())
                                    .collect(),
                                s.gens_no_improvement(),
                            )
                        })
                        .collect(),
                ),
                ReportingLevel::SpeciesLeaders => GenerationRecord::SpeciesLeaders(
                    population
                        .species()
                        .iter()
                        .map(|s| {
                            (
                                s.id(),
                                population.genome(s.leader()).cloned(),
                                s.gens_no_improvement(),
                            )
                        })
                        .collect(),
                ),
                ReportingLevel::PopulationChampion => GenerationRecord::PopulationChampion(
                    population.champion(minimize).cloned(),
                ),
                ReportingLevel::NoGenomes => GenerationRecord::None,
            },
        })
    }

    /// Iterates over all logged snapshots.
    pub fn iter(&self) -> impl Iterator<Item = &Log> {
        self.logs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::GeneticConfig;
    use crate::populations::PopulationConfig;
    use std::num::NonZeroUsize;

    #[test]
    fn logger_snapshots_generation_state() {
        let population = Population::new(
            &PopulationConfig {
                size: NonZeroUsize::new(10).unwrap(),
                ..PopulationConfig::zero()
            },
            &GeneticConfig {
                weight_range: 1.0,
                ..GeneticConfig::zero()
            },
        );
        let mut logger = EvolutionLogger::new(ReportingLevel::PopulationChampion);

        logger.log(&population, false);

        let log = logger.iter().next().unwrap();
        assert_eq!(log.generation, 0);
        // One link per initial genome: 2 genes each.
        assert_eq!(log.complexity_stats.mean, 2.0);
        assert!(matches!(log.sample, GenerationRecord::PopulationChampion(Some(_))));
    }
}
