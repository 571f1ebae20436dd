//! Crossover mixes the link genes of two parents to produce an
//! offspring. Only link genes are walked; neuron genes are
//! implied by whichever links were chosen, and re-materialized
//! from the innovation ledger afterwards. Alignment is by
//! innovation id over both parents' sorted link lists.

use crate::genomics::{Genome, InnovationLedger, LinkGene, NeuronGene};
use crate::{GenomeId, NeuronId};

use rand::Rng;

use std::collections::HashSet;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Favored {
    Mom,
    Dad,
}

/// Determines which parent's disjoint and excess genes the
/// offspring inherits: the better-scoring parent, with ties
/// broken by fewer link genes, and full ties by a coin flip
/// from the supplied random source.
fn favor_parent<R: Rng>(mom: &Genome, dad: &Genome, minimize: bool, rng: &mut R) -> Favored {
    if mom.score() == dad.score() {
        if mom.gene_count() == dad.gene_count() {
            if rng.gen::<bool>() {
                Favored::Mom
            } else {
                Favored::Dad
            }
        } else if mom.gene_count() < dad.gene_count() {
            Favored::Mom
        } else {
            Favored::Dad
        }
    } else {
        // Better could be the larger or the smaller score.
        let mom_better = if minimize {
            mom.score() < dad.score()
        } else {
            mom.score() > dad.score()
        };
        if mom_better {
            Favored::Mom
        } else {
            Favored::Dad
        }
    }
}

/// Merges two parent genomes into one offspring.
///
/// The parents' link lists are walked with two cursors in
/// ascending innovation order. Matching genes are chosen from
/// either parent at random; disjoint and excess genes are
/// included only when their owner is the favored parent. The
/// bias/input/output neurons are always carried over, so
/// alignment can never drop required topology. The offspring's
/// neuron genes are rebuilt from the ledger, sorted by id, and
/// its link list is sorted ascending with no duplicate
/// innovation ids.
///
/// # Examples
/// ```
/// use evograph::genomics::{crossover, Genome, GeneticConfig, InnovationLedger};
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
/// let mom = Genome::initial(0, &config, &mut ledger, &mut rng);
/// let dad = Genome::initial(1, &config, &mut ledger, &mut rng);
///
/// let child = crossover(&mom, &dad, &ledger, false, 2, 1, &mut rng);
///
/// assert_eq!(child.id(), 2);
/// assert_eq!(child.gene_count(), 4);
/// assert!(child.validate().is_ok());
/// ```
#[allow(clippy::too_many_arguments)]
pub fn crossover<R: Rng>(
    mom: &Genome,
    dad: &Genome,
    ledger: &InnovationLedger,
    minimize: bool,
    offspring_id: GenomeId,
    birth_generation: usize,
    rng: &mut R,
) -> Genome {
    let favored = favor_parent(mom, dad, minimize, rng);

    let mut selected_links: Vec<LinkGene> = Vec::new();
    let mut neuron_ids: HashSet<NeuronId> = HashSet::new();

    // The i/o skeleton is unconditional.
    let always_count = mom.input_count() + mom.output_count() + 1;
    neuron_ids.extend(0..always_count);

    let mom_links = mom.links_slice();
    let dad_links = dad.links_slice();
    let mut cur_mom = 0;
    let mut cur_dad = 0;

    while cur_mom < mom_links.len() || cur_dad < dad_links.len() {
        let mom_gene = mom_links.get(cur_mom);
        let dad_gene = dad_links.get(cur_dad);

        // Select at most one gene for the offspring this step.
        let selected: Option<&LinkGene> = match (mom_gene, dad_gene) {
            (None, Some(d)) => {
                cur_dad += 1;
                (favored == Favored::Dad).then(|| d)
            }
            (Some(m), None) => {
                cur_mom += 1;
                (favored == Favored::Mom).then(|| m)
            }
            (Some(m), Some(d)) => {
                if m.innovation() < d.innovation() {
                    cur_mom += 1;
                    (favored == Favored::Mom).then(|| m)
                } else if d.innovation() < m.innovation() {
                    cur_dad += 1;
                    (favored == Favored::Dad).then(|| d)
                } else {
                    cur_mom += 1;
                    cur_dad += 1;
                    Some(if rng.gen::<bool>() { m } else { d })
                }
            }
            (None, None) => unreachable!(),
        };

        if let Some(gene) = selected {
            // Consecutive picks can repeat an innovation id when
            // the cursors pass matching genes one side at a time.
            let duplicate = selected_links
                .last()
                .map(|last| last.innovation() == gene.innovation())
                .unwrap_or(false);
            if !duplicate {
                selected_links.push(gene.clone());
                neuron_ids.insert(gene.from());
                neuron_ids.insert(gene.to());
            }
        }
    }

    // Materialize the neuron set in ascending id order.
    let mut neuron_ids: Vec<NeuronId> = neuron_ids.into_iter().collect();
    neuron_ids.sort_unstable();
    let neurons: Vec<NeuronGene> = neuron_ids
        .into_iter()
        .filter_map(|id| {
            ledger
                .create_neuron_from_id(id)
                .or_else(|| mom.find_neuron(id).copied())
                .or_else(|| dad.find_neuron(id).copied())
        })
        .collect();

    Genome::from_parts(
        offspring_id,
        neurons,
        selected_links,
        mom.input_count(),
        mom.output_count(),
        birth_generation,
    )
}
