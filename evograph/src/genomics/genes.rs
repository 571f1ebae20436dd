use crate::genomics::GeneticConfig;
use crate::{Innovation, NeuronId};

use rand::Rng;
use serde::{Deserialize, Serialize};

use std::fmt;

/// A link gene connects two neuron ids and carries a weight.
/// Link genes are the unit of alignment between genomes:
/// within a genome they are kept sorted ascending by
/// innovation id, which crossover and compatibility
/// distance both rely on.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct LinkGene {
    innovation: Innovation,
    from: NeuronId,
    to: NeuronId,
    weight: f64,
    enabled: bool,
}

impl LinkGene {
    /// Returns a new _enabled_ link gene with the specified parameters.
    ///
    /// # Examples
    /// ```
    /// use evograph::genomics::LinkGene;
    ///
    /// let link = LinkGene::new(42, 3, 9, 2.0);
    ///
    /// assert_eq!(link.innovation(), 42);
    /// assert!(link.enabled());
    /// ```
    pub fn new(innovation: Innovation, from: NeuronId, to: NeuronId, weight: f64) -> LinkGene {
        LinkGene {
            innovation,
            from,
            to,
            weight,
            enabled: true,
        }
    }

    /// Returns a random weight. Uses a uniform distribution
    /// over the range ±`config.weight_range`.
    pub(crate) fn random_weight<R: Rng>(config: &GeneticConfig, rng: &mut R) -> f64 {
        rng.gen_range(-config.weight_range..=config.weight_range)
    }

    /// Replaces the link's weight with a fresh random value
    /// drawn uniformly from ±[`weight_range`].
    ///
    /// [`weight_range`]: crate::genomics::GeneticConfig::weight_range
    pub(crate) fn randomize_weight<R: Rng>(&mut self, config: &GeneticConfig, rng: &mut R) {
        self.weight = Self::random_weight(config, rng);
    }

    /// Perturbs the link's weight by a bounded uniform delta
    /// from ±[`max_weight_perturbation`], then clamps the result
    /// to ±[`weight_range`].
    ///
    /// [`max_weight_perturbation`]: crate::genomics::GeneticConfig::max_weight_perturbation
    /// [`weight_range`]: crate::genomics::GeneticConfig::weight_range
    pub(crate) fn perturb_weight<R: Rng>(&mut self, config: &GeneticConfig, rng: &mut R) {
        self.weight +=
            rng.gen_range(-config.max_weight_perturbation..=config.max_weight_perturbation);
        self.weight = self.weight.clamp(-config.weight_range, config.weight_range);
    }

    /// Returns the link's innovation id.
    pub fn innovation(&self) -> Innovation {
        self.innovation
    }

    /// Returns the id of the link's source neuron.
    pub fn from(&self) -> NeuronId {
        self.from
    }

    /// Returns the id of the link's target neuron.
    pub fn to(&self) -> NeuronId {
        self.to
    }

    /// Returns the link's weight.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Sets the link's weight.
    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    /// Returns whether the link is enabled.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Sets the link's enabled flag.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Returns the link's source and target neuron ids.
    pub fn endpoints(&self) -> (NeuronId, NeuronId) {
        (self.from, self.to)
    }
}

impl fmt::Display for LinkGene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:?}[{:?}->{:?}, {:.3}]{}",
            if self.enabled { "" } else { "(" },
            self.innovation,
            self.from,
            self.to,
            self.weight,
            if self.enabled { "" } else { ")" },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::num::NonZeroUsize;

    fn config() -> GeneticConfig {
        GeneticConfig {
            weight_range: 5.0,
            max_weight_perturbation: 2.5,
            ..GeneticConfig::zero()
        }
    }

    #[test]
    fn perturb_stays_within_range() {
        let config = config();
        let mut rng = StdRng::seed_from_u64(7);
        let mut link = LinkGene::new(0, 0, 1, 4.9);
        for _ in 0..100 {
            let before = link.weight();
            link.perturb_weight(&config, &mut rng);
            assert!((link.weight() - before).abs() <= config.max_weight_perturbation);
            assert!(link.weight().abs() <= config.weight_range);
        }
    }

    #[test]
    fn randomize_stays_within_range() {
        let config = GeneticConfig {
            input_count: NonZeroUsize::new(1).unwrap(),
            ..config()
        };
        let mut rng = StdRng::seed_from_u64(7);
        let mut link = LinkGene::new(0, 0, 1, 0.0);
        for _ in 0..100 {
            link.randomize_weight(&config, &mut rng);
            assert!(link.weight().abs() <= config.weight_range);
        }
    }
}
