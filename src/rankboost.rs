/*
 * Copyright 2019 DTAI Research Group - KU Leuven.
 * License: Apache License 2.0
 * Author: Laurens Devos
*/

//! Pairwise-ranking update rule. Every pair `(i, j)` with `rank_i < rank_j` carries the loss
//! `exp(s_i - s_j)`; per-rank sums keep every pass linear in the number of examples.

use rand::rngs::SmallRng;

use crate::NumT;
use crate::boost::{TrainState, Round, sanitize_weight};
use crate::config::Config;
use crate::ensemble::Ensemble;

#[derive(Debug, Clone, PartialEq)]
pub struct RankBoost {
    reg_param: NumT,
}

impl RankBoost {
    pub fn new() -> RankBoost {
        RankBoost { reg_param: 0.0 }
    }

    pub fn from_config(config: &Config) -> RankBoost {
        RankBoost { reg_param: config.reg_param }
    }

    /// Stored only; the pairwise weight is unregularized.
    pub fn reg_param(&self) -> NumT { self.reg_param }
    pub fn set_reg_param(&mut self, reg_param: NumT) { self.reg_param = reg_param; }

    /// `rho_pos[j] = exp(-s_j) * sum_{rank_i < rank_j} exp(s_i)` and
    /// `rho_neg[j] = exp(s_j) * sum_{rank_i > rank_j} exp(-s_i)`.
    pub fn reweight(&self, state: &mut TrainState) {
        let n_rank = state.n_rank();
        let ranks = state.ranks();

        // lower[k]: sum of exp(s) over ranks below k, upper[k]: sum of exp(-s) over ranks above k
        let mut lower = vec![0.0; n_rank + 1];
        let mut upper = vec![0.0; n_rank + 1];
        for (&s, &y) in state.scores.iter().zip(ranks) {
            lower[y] += s.exp();
            upper[y] += (-s).exp();
        }
        let mut sum = 0.0;
        for k in 1..=n_rank {
            let tmp = lower[k];
            lower[k] = sum;
            sum += tmp;
        }
        let mut sum = 0.0;
        for k in (1..=n_rank).rev() {
            let tmp = upper[k];
            upper[k] = sum;
            sum += tmp;
        }

        let mut sum_rhodiff = 0.0;
        let mut objective = 0.0;
        for j in 0..state.nexamples() {
            let (s, y) = (state.scores[j], ranks[j]);
            let rp = (-s).exp() * lower[y];
            let rn = s.exp() * upper[y];
            state.rho_pos[j] = rp;
            state.rho_neg[j] = rn;
            sum_rhodiff += (rp - rn).abs();
            objective += 0.5 * (rp + rn);
        }
        state.sum_rhodiff = sum_rhodiff;
        state.objective = objective;
    }

    /// Closed form weight `0.25 * ln((sumd + r) / (sumd - r))` of a learner with the given
    /// outputs. Not sanitized: NaN and infinity are possible.
    pub fn compute_weight(&self, state: &TrainState, outputs: &[NumT]) -> NumT {
        let n_rank = state.n_rank();
        let mut exppos = vec![0.0; n_rank + 1];
        let mut expneg = vec![0.0; n_rank + 1];
        let mut sumpos = vec![0.0; n_rank + 1];
        let mut sumneg = vec![0.0; n_rank + 1];
        for ((&s, &y), &o) in state.scores.iter().zip(state.ranks()).zip(outputs) {
            let (ep, en) = (s.exp(), (-s).exp());
            exppos[y] += o * ep;
            expneg[y] += o * en;
            sumpos[y] += ep;
            sumneg[y] += en;
        }

        // pairs a < b, accumulated with running sums over the lower ranks
        let mut r = 0.0;
        let mut sumd = 0.0;
        let mut below_sumpos = 0.0;
        let mut below_exppos = 0.0;
        for b in 1..=n_rank {
            r += expneg[b] * below_sumpos - below_exppos * sumneg[b];
            sumd += below_sumpos * sumneg[b];
            below_sumpos += sumpos[b];
            below_exppos += exppos[b];
        }
        r *= 0.5;

        0.25 * ((sumd + r) / (sumd - r)).ln()
    }

    pub fn round(&self, ensemble: &Ensemble, state: &mut TrainState, rng: &mut SmallRng) -> Round {
        let data = state.data();
        let learner = ensemble.request_weak_learner(data, &state.rho_pos, &state.rho_neg,
                                                    state.sum_rhodiff, rng);
        let outputs = learner.outputs(data);
        let (weight, saturated) = sanitize_weight(self.compute_weight(state, &outputs));

        state.fold(&outputs, weight);
        let row = ensemble.compute_thresholds(&state.scores, state.ranks());
        if !saturated {
            self.reweight(state);
        }

        Round { learner, weight, row, saturated }
    }
}

impl Default for RankBoost {
    fn default() -> RankBoost { RankBoost::new() }
}






#[cfg(test)]
mod test {
    use super::*;
    use crate::data::Data;

    fn pairwise_loss(scores: &[NumT], ranks: &[usize]) -> NumT {
        let mut loss = 0.0;
        for i in 0..scores.len() {
            for j in 0..scores.len() {
                if ranks[i] < ranks[j] { loss += (scores[i] - scores[j]).exp(); }
            }
        }
        loss
    }

    #[test]
    fn reweight_matches_pairs() {
        let data = Data::from_rows(&vec![vec![0.0]; 5], &[1, 3, 2, 1, 3]);
        let scores = vec![0.3, -0.2, 0.1, -1.0, 0.5];
        let mut state = TrainState::new(&data, 3, scores.clone());
        RankBoost::new().reweight(&mut state);

        // rho_pos of example 1 (rank 3): exp(0.2) * (exp(0.3) + exp(0.1) + exp(-1.0))
        let expected = (0.2f64).exp() * ((0.3f64).exp() + (0.1f64).exp() + (-1.0f64).exp());
        assert!((state.rho_pos[1] - expected).abs() < 1e-12);
        assert_eq!(state.rho_neg[1], 0.0);
        assert_eq!(state.rho_pos[0], 0.0);

        let loss = pairwise_loss(&scores, data.ranks());
        assert!((state.objective - loss).abs() < 1e-12);
        let sum_pos: NumT = state.rho_pos.iter().sum();
        assert!((sum_pos - loss).abs() < 1e-12);
    }

    #[test]
    fn weight_matches_pairs() {
        let data = Data::from_rows(&vec![vec![0.0]; 4], &[1, 2, 3, 2]);
        let scores = vec![0.1, 0.4, -0.3, 0.0];
        let outputs = vec![-1.0, 1.0, 1.0, -1.0];
        let state = TrainState::new(&data, 3, scores.clone());
        let w = RankBoost::new().compute_weight(&state, &outputs);

        let ranks = data.ranks();
        let (mut r, mut sumd) = (0.0, 0.0);
        for i in 0..4 {
            for j in 0..4 {
                if ranks[i] < ranks[j] {
                    let d = (scores[i] - scores[j]).exp();
                    r += 0.5 * d * (outputs[j] - outputs[i]);
                    sumd += d;
                }
            }
        }
        let expected = 0.25 * ((sumd + r) / (sumd - r)).ln();
        assert!((w - expected).abs() < 1e-12);
    }

    #[test]
    fn constant_zero_learner() {
        let data = Data::from_rows(&vec![vec![0.0]; 4], &[1, 2, 3, 2]);
        let state = TrainState::new(&data, 3, vec![0.5, -0.5, 0.0, 1.0]);
        let w = RankBoost::new().compute_weight(&state, &[0.0; 4]);
        assert_eq!(w, 0.0);

        // single rank: 0/0
        let data = Data::from_rows(&vec![vec![0.0]; 2], &[2, 2]);
        let state = TrainState::new(&data, 3, vec![0.0; 2]);
        let w = RankBoost::new().compute_weight(&state, &[0.0; 2]);
        assert!(w.is_nan());
        assert_eq!(sanitize_weight(w), (0.0, false));
    }

    #[test]
    fn reg_param_keeps_separator_infinite() {
        let data = Data::from_rows(&vec![vec![0.0]; 2], &[1, 2]);
        let state = TrainState::new(&data, 2, vec![0.0; 2]);
        let mut rule = RankBoost::new();
        assert!(rule.compute_weight(&state, &[-1.0, 1.0]).is_infinite());
        rule.set_reg_param(1.0);
        assert_eq!(rule.reg_param(), 1.0);
        assert!(rule.compute_weight(&state, &[-1.0, 1.0]).is_infinite());
        let w = rule.compute_weight(&state, &[1.0, 1.0]);
        assert_eq!(w, 0.0);
    }
}
