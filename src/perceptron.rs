/*
 * Copyright 2019 DTAI Research Group - KU Leuven.
 * License: Apache License 2.0
 * Author: Laurens Devos
*/

use rand::Rng;
use rand::rngs::SmallRng;

use crate::NumT;
use crate::learner::BinaryData;
use crate::stump::best_positive_threshold;

/// Weights are rescaled to unit length once their squared norm exceeds this.
const MAX_SQ_NORM: NumT = 1e10;

/// Linear threshold unit `sgn(w.x + b)` trained by random coordinate descent.
///
/// The weight vector has `nfeatures + 1` entries; the last one is the bias.
#[derive(Debug, Clone)]
pub struct Perceptron {
    nfeatures: usize,
    max_run: usize,
    weights: Vec<NumT>,
}

impl Perceptron {
    pub fn new(nfeatures: usize) -> Perceptron {
        Perceptron {
            nfeatures,
            max_run: 200,
            weights: vec![0.0; nfeatures + 1],
        }
    }

    /// A trained perceptron from its weights, bias last.
    pub fn from_weights(weights: Vec<NumT>) -> Perceptron {
        assert!(!weights.is_empty());
        Perceptron {
            nfeatures: weights.len() - 1,
            max_run: 200,
            weights,
        }
    }

    pub fn set_max_run(&mut self, max_run: usize) { self.max_run = max_run; }
    pub fn max_run(&self) -> usize { self.max_run }
    pub fn nfeatures(&self) -> usize { self.nfeatures }
    pub fn weights(&self) -> &[NumT] { &self.weights }

    fn activation(&self, x: &[NumT]) -> NumT {
        let b = self.weights[self.nfeatures];
        self.weights[0..self.nfeatures].iter().zip(x).map(|(w, x)| w * x).sum::<NumT>() + b
    }

    pub fn predict(&self, x: &[NumT]) -> NumT {
        debug_assert_eq!(x.len(), self.nfeatures);
        if self.activation(x) >= 0.0 { 1.0 } else { -1.0 }
    }

    /// Random coordinate descent: every run moves the weights along one direction of a random
    /// basis by the best 1-d threshold of the projected examples. A new basis is drawn each time
    /// all its directions have been used.
    pub fn train(&mut self, data: &BinaryData, rng: &mut SmallRng) {
        let dim = self.nfeatures + 1;
        let n = data.nexamples();
        let yw = data.signed_weights();

        for w in self.weights.iter_mut() { *w = 0.0; }

        let mut basis = Vec::new();
        let mut x_new = vec![0.0; n];
        let mut y_new = vec![0.0; n];

        for run in 0..self.max_run {
            let c = (run + dim - 1) % dim;
            if c == dim - 1 {
                basis = random_basis(dim, rng);
            }
            let dir = &basis[c];

            for i in 0..n {
                let x = data.data().example(i);
                let x_d = dot_with_bias(dir, x);
                if x_d != 0.0 {
                    y_new[i] = if x_d > 0.0 { yw[i] } else { -yw[i] };
                    x_new[i] = self.activation(x) / x_d;
                } else {
                    y_new[i] = 0.0;
                    x_new[i] = 0.0;
                }
            }

            let t = best_positive_threshold(&x_new, &y_new);
            for (w, d) in self.weights.iter_mut().zip(dir) {
                *w -= t * d;
            }

            let sq_norm: NumT = self.weights.iter().map(|w| w * w).sum();
            if sq_norm > MAX_SQ_NORM {
                let norm = sq_norm.sqrt();
                for w in self.weights.iter_mut() { *w /= norm; }
            }
        }

        debug!("perceptron after {} runs: {:?}", self.max_run, self.weights);
    }
}

/// Equal when the weights are; `max_run` only matters for training.
impl PartialEq for Perceptron {
    fn eq(&self, other: &Perceptron) -> bool {
        self.nfeatures == other.nfeatures && self.weights == other.weights
    }
}

/// `dir . (x, 1)`
fn dot_with_bias(dir: &[NumT], x: &[NumT]) -> NumT {
    let k = x.len();
    dir[0..k].iter().zip(x).map(|(d, x)| d * x).sum::<NumT>() + dir[k]
}

/// `dim` directions: the last is the bias axis, the others are uniform in [-1, 1] with a zero
/// bias component. They are not orthogonalized.
fn random_basis(dim: usize, rng: &mut SmallRng) -> Vec<Vec<NumT>> {
    let mut basis = Vec::with_capacity(dim);
    for _ in 0..dim - 1 {
        let mut dir: Vec<NumT> = (0..dim - 1).map(|_| rng.gen_range(-1.0, 1.0)).collect();
        dir.push(0.0);
        basis.push(dir);
    }
    let mut bias = vec![0.0; dim];
    bias[dim - 1] = 1.0;
    basis.push(bias);
    basis
}
