mod network;

use evograph::exec::TaskError;
use evograph::genomics::{GeneticConfig, Genome};
use evograph::populations::{Population, PopulationConfig};
use evograph::training::{FitnessFunction, Trainer};
use network::Network;

use rayon::prelude::*;

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

const ERROR_MARGIN: f64 = 0.3;
const TARGET_FITNESS: f64 = 16.0;
const ACTIVATION_CYCLES: usize = 4;

struct Xor;

impl FitnessFunction for Xor {
    fn calculate_score(&self, genome: &Genome) -> Result<f64, TaskError> {
        let mut network = Network::decode(genome, ACTIVATION_CYCLES);

        let cases = [
            ([0.0, 0.0], 0.0),
            ([0.0, 1.0], 1.0),
            ([1.0, 0.0], 1.0),
            ([1.0, 1.0], 0.0),
        ];

        let mut error_sum = 0.0;
        for (inputs, expected) in &cases {
            let mut error = (network.evaluate(inputs)[0] - expected).abs();
            if error < ERROR_MARGIN {
                error = 0.0;
            }
            error_sum += error;
        }
        Ok((4.0 - error_sum).powf(2.0))
    }
}

fn configs() -> (GeneticConfig, PopulationConfig) {
    let genetic_config = GeneticConfig {
        weight_range: 5.0,
        weight_mutation_rate: 0.8,
        weight_replacement_chance: 0.1,
        max_weight_perturbation: 2.5,
        child_mutation_chance: 0.8,
        mutate_weights_odds: 0.9,
        add_neuron_odds: 0.03,
        add_link_odds: 0.05,
        remove_link_odds: 0.005,
        ..GeneticConfig::standard(
            NonZeroUsize::new(2).unwrap(),
            NonZeroUsize::new(1).unwrap(),
        )
    };
    let population_config = PopulationConfig {
        size: NonZeroUsize::new(150).unwrap(),
        compatibility_threshold: 3.0,
        stagnation_limit: 15,
        crossover_chance: 0.6,
        ..PopulationConfig::standard()
    };
    (genetic_config, population_config)
}

/// Runs one evolution attempt, returning the generation that
/// solved XOR, if any.
fn run(max_generations: usize) -> Option<usize> {
    let (genetic_config, population_config) = configs();
    let population = Population::new(&population_config, &genetic_config);
    let mut trainer = Trainer::new(
        population,
        Arc::new(Xor),
        genetic_config,
        population_config,
        0,
    )
    .expect("configuration is valid");

    let mut solved = None;
    for generation in 1..=max_generations {
        if let Err(e) = trainer.iteration() {
            eprintln!("{}", e);
            break;
        }
        if trainer.best_score().unwrap_or(0.0) >= TARGET_FITNESS {
            solved = Some(generation);
            break;
        }
    }

    if solved.is_some() {
        if let Some(champion) = trainer.best_genome() {
            match ron::to_string(champion) {
                Ok(snapshot) => println!("champion: {}", snapshot),
                Err(e) => eprintln!("{}", e),
            }
        }
    }
    trainer.shutdown(Duration::from_secs(5));
    solved
}

fn main() {
    const RUNS: usize = 20;
    const MAX_GENERATIONS: usize = 100;

    let generations: Vec<Option<usize>> = (0..RUNS)
        .into_par_iter()
        .map(|_| run(MAX_GENERATIONS))
        .collect();

    let solved: Vec<usize> = generations.iter().filter_map(|g| *g).collect();
    let failures = RUNS - solved.len();
    let mean = if solved.is_empty() {
        f64::NAN
    } else {
        solved.iter().sum::<usize>() as f64 / solved.len() as f64
    };

    println!(
        "solved {}/{} runs, mean solve generation {:.1}, {}% failure rate",
        solved.len(),
        RUNS,
        mean,
        failures as f64 * 100.0 / RUNS as f64,
    );
}
