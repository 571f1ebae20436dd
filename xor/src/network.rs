//! A minimal cycle-driven network decoded from a genome.
//!
//! The engine itself never decodes genomes; this is the demo's
//! side of that collaboration. Neuron ids are mapped onto dense
//! indices, enabled links become weighted edges, and activation
//! runs a fixed number of relaxation cycles so recurrent
//! structure settles instead of needing a topological order.

use evograph::genomics::{ActivationType, Genome, NeuronKind};

struct Edge {
    from: usize,
    to: usize,
    weight: f64,
}

pub struct Network {
    activations: Vec<f64>,
    sums: Vec<f64>,
    functions: Vec<ActivationType>,
    edges: Vec<Edge>,
    input_indices: Vec<usize>,
    output_indices: Vec<usize>,
    bias_index: usize,
    cycles: usize,
}

impl Network {
    /// Decodes a genome into an executable network, activating
    /// for `cycles` relaxation passes per evaluation.
    pub fn decode(genome: &Genome, cycles: usize) -> Network {
        let neurons: Vec<_> = genome.neurons().collect();
        let index_of = |id| neurons.iter().position(|n| n.id() == id);

        let mut input_indices = Vec::new();
        let mut output_indices = Vec::new();
        let mut bias_index = 0;
        let mut functions = Vec::with_capacity(neurons.len());
        for (i, neuron) in neurons.iter().enumerate() {
            functions.push(neuron.activation());
            match neuron.kind() {
                NeuronKind::Input => input_indices.push(i),
                NeuronKind::Output => output_indices.push(i),
                NeuronKind::Bias => bias_index = i,
                NeuronKind::Hidden => {}
            }
        }

        let edges = genome
            .links()
            .filter(|l| l.enabled())
            .filter_map(|l| {
                Some(Edge {
                    from: index_of(l.from())?,
                    to: index_of(l.to())?,
                    weight: l.weight(),
                })
            })
            .collect();

        Network {
            activations: vec![0.0; neurons.len()],
            sums: vec![0.0; neurons.len()],
            functions,
            edges,
            input_indices,
            output_indices,
            bias_index,
            cycles,
        }
    }

    /// Computes the network's outputs for the given inputs.
    pub fn evaluate(&mut self, inputs: &[f64]) -> Vec<f64> {
        for a in &mut self.activations {
            *a = 0.0;
        }
        for (slot, value) in self.input_indices.iter().zip(inputs) {
            self.activations[*slot] = *value;
        }
        self.activations[self.bias_index] = 1.0;

        for _ in 0..self.cycles {
            for s in &mut self.sums {
                *s = 0.0;
            }
            for edge in &self.edges {
                self.sums[edge.to] += self.activations[edge.from] * edge.weight;
            }
            for (i, sum) in self.sums.iter().enumerate() {
                if self.input_indices.contains(&i) || i == self.bias_index {
                    continue;
                }
                self.activations[i] = activate(self.functions[i], *sum);
            }
        }

        self.output_indices
            .iter()
            .map(|i| self.activations[*i])
            .collect()
    }
}

fn activate(function: ActivationType, x: f64) -> f64 {
    match function {
        ActivationType::Sigmoid => 1.0 / (1.0 + (-4.9 * x).exp()),
        ActivationType::Identity => x,
        ActivationType::ReLU => x.max(0.0),
        ActivationType::Gaussian => (-x * x).exp(),
        ActivationType::Sinusoidal => x.sin(),
    }
}
