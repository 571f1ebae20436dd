//! The training orchestrator: clusters the population into
//! species, allots offspring quotas, breeds and scores each
//! species' offspring on the worker pool, and carries the best
//! genome across generations.
//!
//! Fitness itself is an external collaborator supplied through
//! [`FitnessFunction`]; decoding a genome into something
//! scoreable happens on the caller's side of that trait.

use crate::exec::{TaskError, TaskGroup, TaskPool};
use crate::genomics::{crossover, mutate, GeneticConfig, Genome, InnovationLedger};
use crate::populations::{better, Population, PopulationConfig, Speciation, TrainError};
use crate::GenomeId;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// The external scoring contract. `should_minimize` decides
/// whether lower or higher scores are better everywhere
/// comparisons occur: favored-parent selection, species leader
/// promotion, and bonus/penalty application.
pub trait FitnessFunction: Send + Sync {
    /// Scores a genome. A returned error aborts the generation
    /// on the orchestrating thread with the failure preserved.
    fn calculate_score(&self, genome: &Genome) -> Result<f64, TaskError>;

    /// Whether lower scores are better. Defaults to false.
    fn should_minimize(&self) -> bool {
        false
    }
}

/// The closed set of variation operators the trainer draws
/// from when filling an offspring slot. Each reports the
/// uniform contract: how many parents it consumes and how many
/// offspring it produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    /// Clone one parent and mutate the clone in place.
    Mutation,
    /// Merge two parents by innovation-id alignment.
    Crossover,
}

impl Operator {
    /// Number of parent genomes the operator consumes.
    pub fn parents_required(self) -> usize {
        match self {
            Operator::Mutation => 1,
            Operator::Crossover => 2,
        }
    }

    /// Number of offspring genomes the operator produces.
    pub fn offspring_produced(self) -> usize {
        1
    }

    /// Applies the operator to `parents[..parents_required()]`,
    /// producing the offspring genome.
    pub fn apply<R: Rng>(
        self,
        parents: &[&Genome],
        ledger: &mut InnovationLedger,
        config: &GeneticConfig,
        minimize: bool,
        offspring_id: GenomeId,
        birth_generation: usize,
        rng: &mut R,
    ) -> Genome {
        match self {
            Operator::Mutation => {
                let mut child = parents[0].clone();
                child.set_id(offspring_id);
                child.set_birth_generation(birth_generation);
                child.set_species(None);
                mutate(&mut child, ledger, config, rng);
                child
            }
            Operator::Crossover => {
                let mut child = crossover(
                    parents[0],
                    parents[1],
                    ledger,
                    minimize,
                    offspring_id,
                    birth_generation,
                    rng,
                );
                if rng.gen::<f64>() < config.child_mutation_chance {
                    mutate(&mut child, ledger, config, rng);
                }
                child
            }
        }
    }
}

/// Everything a species' breeding task shares with the
/// orchestrator for one generation. The ledger sits behind the
/// generation's single mutex; the offspring sink is capacity-
/// capped at the configured population size.
struct GenerationContext {
    ledger: Mutex<InnovationLedger>,
    fitness: Arc<dyn FitnessFunction>,
    genetic_config: GeneticConfig,
    crossover_chance: f64,
    survival_threshold: f64,
    max_parent_retries: usize,
    minimize: bool,
    birth_generation: usize,
    target_size: usize,
    next_genome_id: AtomicUsize,
    sink: Mutex<Vec<Genome>>,
    reseeded_best: Option<GenomeId>,
}

impl GenerationContext {
    /// Adds an offspring to the next generation. Returns false
    /// once the generation is full. The pre-seeded best genome
    /// is never re-added.
    fn add_child(&self, genome: Genome) -> bool {
        let mut sink = self.sink.lock().unwrap();
        if sink.len() >= self.target_size {
            return false;
        }
        if Some(genome.id()) == self.reseeded_best {
            return true;
        }
        sink.push(genome);
        true
    }
}

/// The per-species unit of work dispatched to the pool.
struct SpeciesSeed {
    /// Members cloned out of the population, sorted so the
    /// better-scoring genomes come first.
    members: Vec<Genome>,
    leader: GenomeId,
    quota: usize,
}

/// A NEAT training run over one population.
pub struct Trainer {
    population: Population,
    genetic_config: GeneticConfig,
    population_config: PopulationConfig,
    fitness: Arc<dyn FitnessFunction>,
    speciation: Speciation,
    pool: Option<TaskPool>,
    best_genome: Option<Genome>,
    iteration: usize,
}

impl Trainer {
    /// Builds a trainer around an already-constructed
    /// population, scoring it and running the initial
    /// speciation pass.
    ///
    /// `threads` sizes the worker pool; 0 uses the machine's
    /// available parallelism. Pinning to a single worker makes
    /// whole-run results reproducible up to the per-task seeds.
    ///
    /// # Errors
    ///
    /// Fails fast on configuration errors: an empty population,
    /// genomes whose input/output topology does not match the
    /// genetic configuration, or unusable operator odds. Also
    /// propagates scoring failures from the initial evaluation.
    pub fn new(
        population: Population,
        fitness: Arc<dyn FitnessFunction>,
        genetic_config: GeneticConfig,
        population_config: PopulationConfig,
        threads: usize,
    ) -> Result<Trainer, TrainError> {
        if population.genomes().is_empty() {
            return Err(TrainError::EmptyPopulation);
        }
        let expected = (
            genetic_config.input_count.get(),
            genetic_config.output_count.get(),
        );
        for genome in population.genomes() {
            let found = (genome.input_count(), genome.output_count());
            if found != expected {
                return Err(TrainError::MismatchedTopology {
                    genome: genome.id(),
                    expected,
                    found,
                });
            }
        }
        let odds = genetic_config.operator_odds();
        if odds.iter().any(|o| *o < 0.0) || odds.iter().sum::<f64>() <= 0.0 {
            return Err(TrainError::InvalidOperatorOdds);
        }

        let pool = if threads == 0 {
            TaskPool::with_default_size()
        } else {
            TaskPool::new(threads)
        };

        let mut trainer = Trainer {
            speciation: Speciation::new(&population_config),
            population,
            genetic_config,
            population_config,
            fitness,
            pool: Some(pool),
            best_genome: None,
            iteration: 0,
        };

        trainer.score_population()?;
        trainer.record_best();
        trainer.speciate()?;
        Ok(trainer)
    }

    /// Returns the best genome observed so far.
    pub fn best_genome(&self) -> Option<&Genome> {
        self.best_genome.as_ref()
    }

    /// Returns the best score observed so far.
    pub fn best_score(&self) -> Option<f64> {
        self.best_genome.as_ref().map(Genome::score)
    }

    /// Returns the population under training.
    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Returns the number of completed training iterations.
    pub fn iteration_count(&self) -> usize {
        self.iteration
    }

    /// Returns the speciation pass (e.g. for threshold inspection).
    pub fn speciation(&self) -> &Speciation {
        &self.speciation
    }

    /// Runs `count` training iterations.
    ///
    /// # Errors
    ///
    /// Stops at the first failed iteration.
    pub fn train(&mut self, count: usize) -> Result<(), TrainError> {
        for _ in 0..count {
            self.iteration()?;
        }
        Ok(())
    }

    /// Runs one generation: breeds every species' offspring
    /// quota on the worker pool, scores the offspring as they
    /// are built, installs the next generation, and
    /// re-speciates it.
    ///
    /// # Errors
    ///
    /// Surfaces the first worker failure recorded during the
    /// generation, or speciation failures afterwards. Fails
    /// with [`TrainError::ExecutorShutDown`] once [`shutdown`]
    /// has been called.
    ///
    /// [`shutdown`]: Trainer::shutdown
    pub fn iteration(&mut self) -> Result<(), TrainError> {
        if self.pool.is_none() {
            return Err(TrainError::ExecutorShutDown);
        }
        self.iteration += 1;

        let minimize = self.fitness.should_minimize();
        let seeds = self.species_seeds(minimize);

        let mut sink = Vec::with_capacity(self.population.target_size());
        let reseeded_best = self.best_genome.as_ref().map(Genome::id);
        if let Some(best) = &self.best_genome {
            // Champion preservation: the best genome survives
            // verbatim, ahead of every species' quota.
            sink.push(best.clone());
        }

        let context = Arc::new(GenerationContext {
            ledger: Mutex::new(self.population.take_ledger()),
            fitness: Arc::clone(&self.fitness),
            genetic_config: self.genetic_config.clone(),
            crossover_chance: self.population_config.crossover_chance,
            survival_threshold: self.population_config.survival_threshold,
            max_parent_retries: self.population_config.max_parent_retries,
            minimize,
            birth_generation: self.population.generation() + 1,
            target_size: self.population.target_size(),
            next_genome_id: AtomicUsize::new(self.population.next_genome_id()),
            sink: Mutex::new(sink),
            reseeded_best,
        });

        let group = TaskGroup::new();
        let outcome = self.run_generation(&group, &context, seeds);

        // The ledger goes back into the population even when the
        // generation failed mid-flight.
        let ledger = std::mem::take(&mut *context.ledger.lock().unwrap());
        self.population.restore_ledger(ledger);
        self.population
            .set_next_genome_id(context.next_genome_id.load(Ordering::SeqCst));
        outcome?;

        let mut next_generation = std::mem::take(&mut *context.sink.lock().unwrap());
        self.top_up(&mut next_generation)?;
        self.population.install_genomes(next_generation);

        self.record_best();
        self.speciate()
    }

    fn run_generation(
        &self,
        group: &TaskGroup,
        context: &Arc<GenerationContext>,
        seeds: Vec<SpeciesSeed>,
    ) -> Result<(), TrainError> {
        let pool = self.pool.as_ref().ok_or(TrainError::ExecutorShutDown)?;
        for seed in seeds {
            group.check().map_err(TrainError::Worker)?;
            let context = Arc::clone(context);
            pool.process(group, move || breed_species(seed, &context))
                .map_err(TrainError::Worker)?;
        }
        group.wait().map_err(TrainError::Worker)
    }

    /// Snapshots each species into its breeding task input:
    /// member clones sorted best-first, plus leader and quota.
    fn species_seeds(&self, minimize: bool) -> Vec<SpeciesSeed> {
        self.population
            .species()
            .iter()
            .filter(|s| s.offspring_quota() > 0)
            .map(|s| {
                let mut members: Vec<Genome> = s
                    .members()
                    .iter()
                    .filter_map(|id| self.population.genome(*id).cloned())
                    .collect();
                members.sort_by(|a, b| {
                    let ordering = a
                        .score()
                        .partial_cmp(&b.score())
                        .unwrap_or(std::cmp::Ordering::Equal);
                    if minimize {
                        ordering
                    } else {
                        ordering.reverse()
                    }
                });
                SpeciesSeed {
                    members,
                    leader: s.leader(),
                    quota: s.offspring_quota(),
                }
            })
            .collect()
    }

    /// Scores every genome in the population on the pool.
    fn score_population(&mut self) -> Result<(), TrainError> {
        let pool = self.pool.as_ref().ok_or(TrainError::ExecutorShutDown)?;
        let genomes = std::mem::take(&mut *self.population.genomes_vec());
        let scored: Arc<Mutex<Vec<Genome>>> = Arc::new(Mutex::new(Vec::with_capacity(genomes.len())));
        let group = TaskGroup::new();

        for mut genome in genomes {
            let fitness = Arc::clone(&self.fitness);
            let scored = Arc::clone(&scored);
            pool.process(&group, move || {
                let score = fitness.calculate_score(&genome)?;
                genome.set_score(score);
                scored.lock().unwrap().push(genome);
                Ok(())
            })
            .map_err(TrainError::Worker)?;
        }
        group.wait().map_err(TrainError::Worker)?;

        let scored = std::mem::take(&mut *scored.lock().unwrap());
        *self.population.genomes_vec() = scored;
        Ok(())
    }

    /// Fills any shortfall left by quota underruns with mutated
    /// clones of surviving genomes, scored synchronously.
    fn top_up(&mut self, next_generation: &mut Vec<Genome>) -> Result<(), TrainError> {
        let target = self.population.target_size();
        if next_generation.len() >= target {
            return Ok(());
        }
        if next_generation.is_empty() {
            return Err(TrainError::DegeneratePopulation);
        }
        let mut rng = StdRng::from_entropy();
        let mut ledger = self.population.take_ledger();
        while next_generation.len() < target {
            let parent = next_generation[rng.gen_range(0..next_generation.len())].clone();
            let id = self.population.assign_genome_id();
            let mut child = parent;
            child.set_id(id);
            child.set_birth_generation(self.population.generation() + 1);
            child.set_species(None);
            mutate(&mut child, &mut ledger, &self.genetic_config, &mut rng);
            match self.fitness.calculate_score(&child) {
                Ok(score) => child.set_score(score),
                Err(e) => {
                    self.population.restore_ledger(ledger);
                    return Err(TrainError::Worker(e));
                }
            }
            next_generation.push(child);
        }
        self.population.restore_ledger(ledger);
        Ok(())
    }

    /// Folds the current generation's champion into the
    /// best-ever record.
    fn record_best(&mut self) {
        let minimize = self.fitness.should_minimize();
        if let Some(champion) = self.population.champion(minimize) {
            let improved = match &self.best_genome {
                Some(best) => better(champion.score(), best.score(), minimize),
                None => true,
            };
            if improved {
                self.best_genome = Some(champion.clone());
            }
        }
    }

    fn speciate(&mut self) -> Result<(), TrainError> {
        let minimize = self.fitness.should_minimize();
        let best = self.best_genome.as_ref().map(Genome::id);
        self.speciation.perform(
            &mut self.population,
            &self.population_config,
            &self.genetic_config,
            minimize,
            best,
        )
    }

    /// Shuts the worker pool down, allowing in-flight tasks up
    /// to `timeout` to finish, and clears the pool so the
    /// trainer cannot run further generations. Returns whether
    /// every worker exited in time; repeated calls return true.
    pub fn shutdown(&mut self, timeout: Duration) -> bool {
        match self.pool.take() {
            Some(pool) => pool.shutdown(timeout),
            None => true,
        }
    }
}

/// One species' breeding task: fills the species' offspring
/// quota, scoring each offspring as it is produced. The first
/// slot re-emits the species leader (elitism); the rest draw
/// crossover or clone-and-mutate per the configured odds, with
/// parents taken from the better-scoring fraction of the
/// species.
fn breed_species(seed: SpeciesSeed, context: &GenerationContext) -> Result<(), TaskError> {
    // One random stream per task, so a genome's construction
    // does not depend on sibling-task interleaving.
    let mut rng = StdRng::from_entropy();

    for slot in 0..seed.quota {
        let genome = if slot == 0 {
            // The species elite survives unchanged, score included.
            let elite = seed
                .members
                .iter()
                .find(|g| g.id() == seed.leader)
                .unwrap_or(&seed.members[0]);
            elite.clone()
        } else {
            let offspring_id = context.next_genome_id.fetch_add(1, Ordering::SeqCst);
            let first = choose_parent(&seed.members, context.survival_threshold, &mut rng);

            let mut operator = Operator::Mutation;
            let mut second = first;
            if seed.members.len() > 1 && rng.gen::<f64>() < context.crossover_chance {
                for _ in 0..=context.max_parent_retries {
                    second = choose_parent(&seed.members, context.survival_threshold, &mut rng);
                    if second.id() != first.id() {
                        operator = Operator::Crossover;
                        break;
                    }
                }
            }

            let parents = [first, second];
            let mut child = {
                let mut ledger = context.ledger.lock().unwrap();
                operator.apply(
                    &parents[..operator.parents_required()],
                    &mut ledger,
                    &context.genetic_config,
                    context.minimize,
                    offspring_id,
                    context.birth_generation,
                    &mut rng,
                )
            };
            let score = context.fitness.calculate_score(&child)?;
            child.set_score(score);
            child
        };

        if !context.add_child(genome) {
            break;
        }
    }
    Ok(())
}

/// Selects a parent from the better-scoring fraction of the
/// species, per the survival threshold.
fn choose_parent<'a, R: Rng>(members: &'a [Genome], survival_threshold: f64, rng: &mut R) -> &'a Genome {
    if members.len() == 1 {
        return &members[0];
    }
    let cutoff = ((members.len() as f64 * survival_threshold) as usize + 1).min(members.len());
    &members[rng.gen_range(0..cutoff)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::populations::Species;
    use std::num::NonZeroUsize;
    use std::sync::atomic::AtomicUsize;

    /// Rewards genomes for having many link genes.
    struct GeneCount;

    impl FitnessFunction for GeneCount {
        fn calculate_score(&self, genome: &Genome) -> Result<f64, TaskError> {
            Ok(genome.gene_count() as f64)
        }
    }

    /// Prefers small genomes: minimizes the gene count.
    struct LeanGenomes;

    impl FitnessFunction for LeanGenomes {
        fn calculate_score(&self, genome: &Genome) -> Result<f64, TaskError> {
            Ok(genome.gene_count() as f64 + genome.id() as f64 * 1e-6)
        }

        fn should_minimize(&self) -> bool {
            true
        }
    }

    /// Fails after a configurable number of evaluations.
    struct FailAfter {
        remaining: AtomicUsize,
    }

    impl FitnessFunction for FailAfter {
        fn calculate_score(&self, _genome: &Genome) -> Result<f64, TaskError> {
            if self.remaining.fetch_sub(1, Ordering::SeqCst) == 0 {
                return Err("scoring backend went away".into());
            }
            Ok(1.0)
        }
    }

    fn configs(size: usize) -> (GeneticConfig, PopulationConfig) {
        let genetic = GeneticConfig::standard(
            NonZeroUsize::new(3).unwrap(),
            NonZeroUsize::new(1).unwrap(),
        );
        let population = PopulationConfig {
            size: NonZeroUsize::new(size).unwrap(),
            ..PopulationConfig::standard()
        };
        (genetic, population)
    }

    fn trainer(size: usize, fitness: Arc<dyn FitnessFunction>) -> Trainer {
        let (genetic, population_config) = configs(size);
        let population = Population::new(&population_config, &genetic);
        Trainer::new(population, fitness, genetic, population_config, 4).unwrap()
    }

    #[test]
    fn new_scores_and_speciates() {
        let trainer = trainer(30, Arc::new(GeneCount));

        // Every initial genome has 4 links.
        assert!(trainer.population().genomes().iter().all(|g| g.score() == 4.0));
        assert_eq!(trainer.best_score(), Some(4.0));
        assert!(!trainer.population().species().is_empty());
    }

    #[test]
    fn empty_population_fails_fast() {
        let (genetic, population_config) = configs(1);
        let mut population = Population::new(&population_config, &genetic);
        population.install_genomes(Vec::new());

        let result = Trainer::new(
            population,
            Arc::new(GeneCount),
            genetic,
            population_config,
            1,
        );
        assert!(matches!(result, Err(TrainError::EmptyPopulation)));
    }

    #[test]
    fn mismatched_topology_fails_fast() {
        let (genetic, population_config) = configs(5);
        let population = Population::new(&population_config, &genetic);

        // Reconfigure the trainer for a different topology.
        let wrong = GeneticConfig {
            input_count: NonZeroUsize::new(7).unwrap(),
            ..genetic
        };
        let result = Trainer::new(
            population,
            Arc::new(GeneCount),
            wrong,
            population_config,
            1,
        );
        assert!(matches!(result, Err(TrainError::MismatchedTopology { .. })));
    }

    #[test]
    fn invalid_odds_fail_fast() {
        let (mut genetic, population_config) = configs(5);
        genetic.mutate_weights_odds = 0.0;
        genetic.add_neuron_odds = 0.0;
        genetic.add_link_odds = 0.0;
        genetic.adjust_curve_odds = 0.0;
        genetic.remove_link_odds = 0.0;
        let population = Population::new(&population_config, &genetic);

        let result = Trainer::new(
            population,
            Arc::new(GeneCount),
            genetic,
            population_config,
            1,
        );
        assert!(matches!(result, Err(TrainError::InvalidOperatorOdds)));
    }

    #[test]
    fn iteration_preserves_population_size_and_partition() {
        let mut trainer = trainer(40, Arc::new(GeneCount));

        for _ in 0..5 {
            trainer.iteration().unwrap();

            let population = trainer.population();
            assert_eq!(population.genomes().len(), 40);

            // Every genome belongs to exactly one species, and
            // every species' leader is present in the population.
            for genome in population.genomes() {
                let holders = population
                    .species()
                    .iter()
                    .filter(|s| s.contains(genome.id()))
                    .count();
                assert_eq!(holders, 1, "genome {} in {} species", genome.id(), holders);
            }
            for species in population.species() {
                assert!(population.genome(species.leader()).is_some());
            }
        }
    }

    #[test]
    fn quotas_conserve_population_size() {
        let mut trainer = trainer(40, Arc::new(GeneCount));
        trainer.iteration().unwrap();

        let quota_sum: usize = trainer
            .population()
            .species()
            .iter()
            .map(Species::offspring_quota)
            .sum();
        // The best-species floor can add at most one.
        assert!(quota_sum == 40 || quota_sum == 41);
    }

    #[test]
    fn best_score_never_degrades() {
        let mut trainer = trainer(30, Arc::new(GeneCount));
        let mut previous = trainer.best_score().unwrap();

        for _ in 0..8 {
            trainer.iteration().unwrap();
            let current = trainer.best_score().unwrap();
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn minimizing_runs_orient_comparisons() {
        let mut trainer = trainer(30, Arc::new(LeanGenomes));
        let mut previous = trainer.best_score().unwrap();

        for _ in 0..5 {
            trainer.iteration().unwrap();
            let current = trainer.best_score().unwrap();
            assert!(current <= previous);
            previous = current;
        }
    }

    #[test]
    fn worker_failure_aborts_generation_with_original_error() {
        let (genetic, population_config) = configs(20);
        let population = Population::new(&population_config, &genetic);
        // Let the initial scoring pass, then fail mid-generation.
        let fitness = Arc::new(FailAfter {
            remaining: AtomicUsize::new(30),
        });
        let mut trainer = Trainer::new(
            population,
            fitness,
            genetic,
            population_config,
            4,
        )
        .unwrap();

        let error = loop {
            match trainer.iteration() {
                Ok(()) => continue,
                Err(e) => break e,
            }
        };
        match error {
            TrainError::Worker(e) => {
                assert!(e.to_string().contains("scoring backend went away"))
            }
            other => panic!("expected worker failure, got {}", other),
        }
    }

    #[test]
    fn shutdown_prevents_further_iterations() {
        let mut trainer = trainer(10, Arc::new(GeneCount));

        assert!(trainer.shutdown(Duration::from_secs(5)));
        assert!(matches!(
            trainer.iteration(),
            Err(TrainError::ExecutorShutDown)
        ));
        // Idempotent.
        assert!(trainer.shutdown(Duration::from_secs(1)));
    }

    #[test]
    fn operator_contract_shape() {
        assert_eq!(Operator::Mutation.parents_required(), 1);
        assert_eq!(Operator::Crossover.parents_required(), 2);
        assert_eq!(Operator::Mutation.offspring_produced(), 1);
        assert_eq!(Operator::Crossover.offspring_produced(), 1);
    }
}
