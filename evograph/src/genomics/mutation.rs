//! The mutation operators. Each transforms one genome in
//! place; failure to find an eligible structural change within
//! the retry budget is a silent no-op, not an error, since
//! evolutionary search tolerates wasted attempts.

use crate::genomics::{
    ActivationType, GeneticConfig, Genome, InnovationLedger, LinkGene, NeuronKind,
};

use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;

/// The closed set of mutation operators the dispatcher
/// draws from. Order matches the configured odds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationKind {
    MutateWeights,
    AddNeuron,
    AddLink,
    /// Reserved: activation-curve adjustment is not yet an
    /// operator, but keeps its slot in the odds table.
    AdjustCurve,
    RemoveLink,
}

const MUTATION_KINDS: [MutationKind; 5] = [
    MutationKind::MutateWeights,
    MutationKind::AddNeuron,
    MutationKind::AddLink,
    MutationKind::AdjustCurve,
    MutationKind::RemoveLink,
];

/// Draws one operator from the configured weighted
/// distribution and applies it to the genome in place.
///
/// All stochastic choices, including the operator draw itself,
/// consume the supplied random source, so a genome's
/// construction is reproducible from one seed.
///
/// # Examples
/// ```
/// use evograph::genomics::{mutate, Genome, GeneticConfig, InnovationLedger};
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
/// use std::num::NonZeroUsize;
///
/// let config = GeneticConfig::standard(
///     NonZeroUsize::new(2).unwrap(),
///     NonZeroUsize::new(1).unwrap(),
/// );
/// let mut ledger = InnovationLedger::seeded(&config);
/// let mut rng = StdRng::seed_from_u64(0);
/// let mut genome = Genome::initial(0, &config, &mut ledger, &mut rng);
///
/// mutate(&mut genome, &mut ledger, &config, &mut rng);
/// assert!(genome.validate().is_ok());
/// ```
pub fn mutate<R: Rng>(
    genome: &mut Genome,
    ledger: &mut InnovationLedger,
    config: &GeneticConfig,
    rng: &mut R,
) {
    let odds = config.operator_odds();
    let choice = match WeightedIndex::new(odds) {
        Ok(distribution) => MUTATION_KINDS[distribution.sample(rng)],
        // Degenerate odds are caught at trainer construction.
        Err(_) => return,
    };

    match choice {
        MutationKind::MutateWeights => mutate_weights(genome, config, rng),
        MutationKind::AddNeuron => mutate_add_neuron(genome, ledger, config, rng),
        MutationKind::AddLink => mutate_add_link(genome, ledger, config, rng),
        MutationKind::AdjustCurve => {}
        MutationKind::RemoveLink => mutate_remove_link(genome, config, rng),
    }
}

/// Mutates the genome's link weights: each enabled link is
/// considered with probability [`weight_mutation_rate`], and a
/// considered link either receives a whole new weight (with
/// probability [`weight_replacement_chance`]) or a bounded
/// perturbation clamped to ±[`weight_range`].
///
/// [`weight_mutation_rate`]: GeneticConfig::weight_mutation_rate
/// [`weight_replacement_chance`]: GeneticConfig::weight_replacement_chance
/// [`weight_range`]: GeneticConfig::weight_range
pub fn mutate_weights<R: Rng>(genome: &mut Genome, config: &GeneticConfig, rng: &mut R) {
    for link in genome.links_mut() {
        if !link.enabled() {
            continue;
        }
        if rng.gen::<f64>() < config.weight_mutation_rate {
            if rng.gen::<f64>() < config.weight_replacement_chance {
                link.randomize_weight(config, rng);
            } else {
                link.perturb_weight(config, rng);
            }
        }
    }
}

/// Mutates the genome by adding a link between two existing
/// neurons. Candidate sources exclude output neurons and
/// candidate targets exclude input and bias neurons; a pair is
/// rejected if the link already exists. Gives up silently
/// after [`max_mutation_attempts`] draws.
///
/// [`max_mutation_attempts`]: GeneticConfig::max_mutation_attempts
pub fn mutate_add_link<R: Rng>(
    genome: &mut Genome,
    ledger: &mut InnovationLedger,
    config: &GeneticConfig,
    rng: &mut R,
) {
    let from_pool: Vec<usize> = genome
        .neurons_slice()
        .iter()
        .enumerate()
        .filter(|(_, n)| n.kind() != NeuronKind::Output)
        .map(|(i, _)| i)
        .collect();
    let to_pool: Vec<usize> = genome
        .neurons_slice()
        .iter()
        .enumerate()
        .filter(|(_, n)| !matches!(n.kind(), NeuronKind::Input | NeuronKind::Bias))
        .map(|(i, _)| i)
        .collect();

    if from_pool.is_empty() || to_pool.is_empty() {
        return;
    }

    let mut endpoints = None;
    for _ in 0..config.max_mutation_attempts {
        let from = genome.neurons_slice()[*from_pool.choose(rng).unwrap()].id();
        let to = genome.neurons_slice()[*to_pool.choose(rng).unwrap()].id();
        if !genome.is_duplicate_link(from, to) {
            endpoints = Some((from, to));
            break;
        }
    }

    // Exhausting the retry budget is a wasted attempt, nothing more.
    let (from, to) = match endpoints {
        Some(pair) => pair,
        None => return,
    };

    let innovation = ledger.find_or_create_link_innovation(from, to);
    let weight = LinkGene::random_weight(config, rng);
    genome.insert_link(LinkGene::new(innovation, from, to, weight));
}

/// Mutates the genome by splitting an existing enabled link
/// with a new hidden neuron. While the genome is still small,
/// the candidate index range is restricted with a square-root-
/// scaled upper bound so older links are preferred. The chosen
/// link is disabled and replaced by source→new (keeping the
/// original weight) and new→target (fresh random weight), with
/// all ids taken from the ledger — so identical splits
/// elsewhere in the population reuse the same neuron id.
pub fn mutate_add_neuron<R: Rng>(
    genome: &mut Genome,
    ledger: &mut InnovationLedger,
    config: &GeneticConfig,
    rng: &mut R,
) {
    if genome.gene_count() == 0 || genome.neuron_count() >= config.max_neurons {
        return;
    }

    let gene_count = genome.gene_count();
    let size_bias = genome.input_count() + genome.output_count() + 10;
    let upper_limit = if gene_count < size_bias {
        // Bias the draw toward older genes in young genomes.
        (gene_count as isize - 1 - (gene_count as f64).sqrt() as isize).max(0) as usize
    } else {
        gene_count - 1
    };

    let mut split_index = None;
    for _ in 0..config.max_mutation_attempts {
        let i = rng.gen_range(0..=upper_limit);
        let link = &genome.links_slice()[i];
        let source_kind = match genome.find_neuron(link.from()) {
            Some(neuron) => neuron.kind(),
            None => continue,
        };
        if link.enabled() && source_kind != NeuronKind::Bias {
            split_index = Some(i);
            break;
        }
    }

    let split_index = match split_index {
        Some(i) => i,
        None => return,
    };

    let (from, to) = genome.links_slice()[split_index].endpoints();
    let original_weight = genome.links_slice()[split_index].weight();
    genome.links_mut()[split_index].set_enabled(false);

    let activation = *config
        .hidden_activation_types
        .choose(rng)
        .unwrap_or(&ActivationType::Sigmoid);

    let mut split = ledger.find_or_create_split_innovation(from, to, activation);
    if genome.has_neuron(split.neuron) {
        // This lineage already split the link once; reusing the
        // record would duplicate genes within one genome.
        split = ledger.replace_split_innovation(from, to, activation);
    }

    let neuron = match ledger.create_neuron_from_id(split.neuron) {
        Some(neuron) => neuron,
        None => return,
    };
    genome.insert_neuron(neuron);

    let incoming = ledger.find_or_create_link_innovation(from, split.neuron);
    genome.insert_link(LinkGene::new(incoming, from, split.neuron, original_weight));
    let outgoing = ledger.find_or_create_link_innovation(split.neuron, to);
    let fresh_weight = LinkGene::random_weight(config, rng);
    genome.insert_link(LinkGene::new(outgoing, split.neuron, to, fresh_weight));
}

/// Mutates the genome by removing one uniformly chosen link,
/// then removing any hidden neuron left without incident
/// links. Genomes below [`min_links_for_removal`] links are
/// left untouched so the search cannot degenerate into empty
/// genomes.
///
/// [`min_links_for_removal`]: GeneticConfig::min_links_for_removal
pub fn mutate_remove_link<R: Rng>(genome: &mut Genome, config: &GeneticConfig, rng: &mut R) {
    if genome.gene_count() < config.min_links_for_removal {
        return;
    }

    let index = rng.gen_range(0..genome.gene_count());
    let removed = genome.remove_link_at(index);

    // Orphaned endpoints go with the link.
    if !genome.is_neuron_needed(removed.from()) {
        genome.remove_neuron(removed.from());
    }
    if !genome.is_neuron_needed(removed.to()) {
        genome.remove_neuron(removed.to());
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
            weight_range: 1.0,
            max_weight_perturbation: 0.5,
            max_mutation_attempts: 5,
            min_links_for_removal: 5,
            max_neurons: 100,
            ..GeneticConfig::standard(
                NonZeroUsize::new(inputs).unwrap(),
                NonZeroUsize::new(outputs).unwrap(),
            )
        }
    }

    fn initial(config: &GeneticConfig, seed: u64) -> (Genome, InnovationLedger, StdRng) {
        let mut ledger = InnovationLedger::seeded(config);
        let mut rng = StdRng::seed_from_u64(seed);
        let genome = Genome::initial(0, config, &mut ledger, &mut rng);
        (genome, ledger, rng)
    }

    #[test]
    fn weight_mutation_respects_bounds() {
        let config = GeneticConfig {
            weight_mutation_rate: 1.0,
            weight_replacement_chance: 0.5,
            ..config(4, 2)
        };
        let (mut genome, _, mut rng) = initial(&config, 3);

        for _ in 0..50 {
            mutate_weights(&mut genome, &config, &mut rng);
            assert!(genome.links().all(|l| l.weight().abs() <= config.weight_range));
        }
    }

    #[test]
    fn add_link_never_duplicates() {
        let config = config(3, 2);
        let (mut genome, mut ledger, mut rng) = initial(&config, 11);

        // Open up room for new links with a few hidden neurons.
        for _ in 0..3 {
            mutate_add_neuron(&mut genome, &mut ledger, &config, &mut rng);
        }
        for _ in 0..200 {
            mutate_add_link(&mut genome, &mut ledger, &config, &mut rng);
            assert!(genome.validate().is_ok());
        }
        // Targets never include inputs or the bias.
        for link in genome.links() {
            let target = genome.find_neuron(link.to()).unwrap();
            assert!(!matches!(target.kind(), NeuronKind::Input | NeuronKind::Bias));
        }
    }

    #[test]
    fn add_link_uses_ledger_innovations() {
        let config = config(3, 2);
        let mut ledger = InnovationLedger::seeded(&config);
        let mut rng = StdRng::seed_from_u64(5);
        let mut a = Genome::initial(0, &config, &mut ledger, &mut rng);
        let mut b = Genome::initial(1, &config, &mut ledger, &mut rng);

        // Drive both genomes through many attempts; every link
        // shared by the two genomes must agree on its innovation.
        for _ in 0..100 {
            mutate_add_link(&mut a, &mut ledger, &config, &mut rng);
            mutate_add_link(&mut b, &mut ledger, &config, &mut rng);
        }
        for la in a.links() {
            for lb in b.links() {
                if la.endpoints() == lb.endpoints() {
                    assert_eq!(la.innovation(), lb.innovation());
                }
            }
        }
    }

    // A single-link genome split must disable the original link
    // and wire the new hidden neuron through ledger-assigned ids;
    // a second genome splitting the same link reuses them.
    #[test]
    fn add_neuron_splits_and_reuses_ids() {
        let config = config(3, 1);
        let mut ledger = InnovationLedger::seeded(&config);
        let mut rng = StdRng::seed_from_u64(17);
        let mut first = Genome::initial(0, &config, &mut ledger, &mut rng);
        let mut second = Genome::initial(1, &config, &mut ledger, &mut rng);

        // Shrink both genomes to the single link 0 -> 4.
        let keep = |g: &mut Genome| {
            while g.gene_count() > 1 {
                let last = g.gene_count() - 1;
                g.remove_link_at(last);
            }
        };
        keep(&mut first);
        keep(&mut second);
        assert_eq!(first.links().next().unwrap().endpoints(), (0, 4));

        mutate_add_neuron(&mut first, &mut ledger, &config, &mut rng);
        assert_eq!(first.neuron_count(), 6);
        assert_eq!(first.gene_count(), 3);
        assert!(!first.links().next().unwrap().enabled());
        let new_links: Vec<_> = first.links().filter(|l| l.enabled()).collect();
        assert_eq!(new_links.len(), 2);
        let hidden = first
            .neurons()
            .find(|n| n.kind() == NeuronKind::Hidden)
            .unwrap()
            .id();
        assert_eq!(new_links[0].endpoints(), (0, hidden));
        assert_eq!(new_links[1].endpoints(), (hidden, 4));

        // Same split in another genome, same generation: the
        // neuron id and link innovations must be identical.
        mutate_add_neuron(&mut second, &mut ledger, &config, &mut rng);
        let second_hidden = second
            .neurons()
            .find(|n| n.kind() == NeuronKind::Hidden)
            .unwrap()
            .id();
        assert_eq!(second_hidden, hidden);
        let firsts: Vec<_> = first
            .links()
            .filter(|l| l.enabled())
            .map(|l| l.innovation())
            .collect();
        let seconds: Vec<_> = second
            .links()
            .filter(|l| l.enabled())
            .map(|l| l.innovation())
            .collect();
        assert_eq!(firsts, seconds);
    }

    #[test]
    fn add_neuron_preserves_split_weights() {
        let config = config(3, 1);
        let (mut genome, mut ledger, mut rng) = initial(&config, 23);

        let before: Vec<LinkGene> = genome.links().cloned().collect();
        mutate_add_neuron(&mut genome, &mut ledger, &config, &mut rng);

        let disabled = genome.links().find(|l| !l.enabled()).unwrap().clone();
        let original = before
            .iter()
            .find(|l| l.innovation() == disabled.innovation())
            .unwrap();
        let incoming = genome
            .links()
            .find(|l| l.enabled() && l.from() == disabled.from() && l.to() != disabled.to())
            .unwrap();
        assert_eq!(incoming.weight(), original.weight());
    }

    #[test]
    fn remove_link_respects_stability_floor() {
        let config = config(1, 1);
        let (mut genome, _, mut rng) = initial(&config, 31);

        // 2 links < floor of 5: the genome must not shrink.
        assert_eq!(genome.gene_count(), 2);
        mutate_remove_link(&mut genome, &config, &mut rng);
        assert_eq!(genome.gene_count(), 2);
    }

    #[test]
    fn remove_link_sweeps_orphaned_neurons() {
        let config = GeneticConfig {
            min_links_for_removal: 1,
            ..config(1, 1)
        };
        let (mut genome, mut ledger, mut rng) = initial(&config, 37);

        mutate_add_neuron(&mut genome, &mut ledger, &config, &mut rng);
        assert_eq!(genome.neuron_count(), 4);

        // Strip every link; the hidden neuron must go with them,
        // while bias/input/output survive.
        while genome.gene_count() > 0 {
            mutate_remove_link(&mut genome, &config, &mut rng);
        }
        assert_eq!(genome.neuron_count(), 3);
        assert!(genome.neurons().all(|n| n.kind() != NeuronKind::Hidden));
    }

    #[test]
    fn dispatcher_keeps_genomes_valid() {
        let config = config(3, 2);
        let (mut genome, mut ledger, mut rng) = initial(&config, 41);

        for _ in 0..500 {
            mutate(&mut genome, &mut ledger, &config, &mut rng);
            assert!(genome.validate().is_ok());
        }
    }
}
