//! A NEAT-style neuroevolution engine.
//!
//! Genomes are graphs of neuron and link genes, aligned between unrelated
//! individuals through historically-marked innovation ids. A population is
//! clustered into species by compatibility distance, each species receives
//! an offspring quota, and offspring are bred through mutation and crossover
//! on a worker-thread pool with fork-join task groups.
//!
//! Fitness computation and genome-to-network decoding are deliberately
//! external: the engine only consumes a [`FitnessFunction`] and hands the
//! evolved genomes back.
//!
//! [`FitnessFunction`]: crate::training::FitnessFunction
//!
//! # Example usage: evolving toward small, heavy genomes
//! ```
//! use evograph::genomics::GeneticConfig;
//! use evograph::populations::{Population, PopulationConfig};
//! use evograph::training::{FitnessFunction, Trainer};
//! use evograph::exec::TaskError;
//! use evograph::genomics::Genome;
//! use std::num::NonZeroUsize;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! // Reward genomes for the total magnitude of their link weights.
//! struct WeightMass;
//!
//! impl FitnessFunction for WeightMass {
//!     fn calculate_score(&self, genome: &Genome) -> Result<f64, TaskError> {
//!         Ok(genome.links().map(|l| l.weight().abs()).sum())
//!     }
//! }
//!
//! let genetic_config = GeneticConfig::standard(
//!     NonZeroUsize::new(2).unwrap(),
//!     NonZeroUsize::new(1).unwrap(),
//! );
//! let population_config = PopulationConfig {
//!     size: NonZeroUsize::new(30).unwrap(),
//!     ..PopulationConfig::standard()
//! };
//!
//! let population = Population::new(&population_config, &genetic_config);
//! let mut trainer = Trainer::new(
//!     population,
//!     Arc::new(WeightMass),
//!     genetic_config,
//!     population_config,
//!     0,
//! )
//! .unwrap();
//!
//! for _ in 0..5 {
//!     trainer.iteration().unwrap();
//! }
//! assert!(trainer.best_genome().is_some());
//! trainer.shutdown(Duration::from_secs(5));
//! ```

pub mod exec;
pub mod genomics;
pub mod populations;
pub mod training;

/// Identifier type used to designate historically
/// identical mutations for the purposes of
/// genome alignment and genetic tracking.
pub type Innovation = usize;

/// Identifier of a neuron gene, unique within a genome
/// and stable across the whole population.
pub type NeuronId = usize;

/// Identifier of a genome, unique within its population.
pub type GenomeId = usize;

/// Identifier of a species, unique within its population.
pub type SpeciesId = usize;

#[cfg(test)]
mod tests {}
