/*
 * Copyright 2019 DTAI Research Group - KU Leuven.
 * License: Apache License 2.0
 * Author: Laurens Devos
*/

//! Margin-exponential update rule. Thresholds are optimized jointly with the learner weights:
//! example `j` pays `exp(theta_k - s_j)` for the boundaries `k` below its rank and
//! `exp(s_j - theta_k)` for those above.

use std::str::FromStr;

use rand::rngs::SmallRng;

use crate::NumT;
use crate::boost::{TrainState, Round, sanitize_weight};
use crate::config::Config;
use crate::ensemble::Ensemble;
use crate::threshold::exploss_thresholds;

/// Which boundaries contribute to the loss of an example.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Form {
    /// Only the boundaries directly below and above the example's rank.
    Lr,
    /// All boundaries.
    Full,
}

impl FromStr for Form {
    type Err = String;
    fn from_str(s: &str) -> Result<Form, String> {
        match s.to_lowercase().as_str() {
            "lr" => Ok(Form::Lr),
            "full" => Ok(Form::Full),
            _ => Err(format!("unknown ORBoost form '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrBoost {
    form: Form,
    ordered: bool,
    sub_iter: usize,
    reg_param: NumT,
}

impl OrBoost {
    pub fn new() -> OrBoost {
        OrBoost {
            form: Form::Lr,
            ordered: true,
            sub_iter: 1,
            reg_param: 0.0,
        }
    }

    pub fn from_config(config: &Config) -> OrBoost {
        OrBoost {
            form: config.form,
            ordered: config.ordered,
            sub_iter: config.sub_iter.max(1),
            reg_param: config.reg_param,
        }
    }

    pub fn form(&self) -> Form { self.form }
    pub fn ordered(&self) -> bool { self.ordered }
    pub fn sub_iter(&self) -> usize { self.sub_iter }
    pub fn reg_param(&self) -> NumT { self.reg_param }
    pub fn set_form(&mut self, form: Form) { self.form = form; }
    pub fn set_ordered(&mut self, ordered: bool) { self.ordered = ordered; }
    pub fn set_sub_iter(&mut self, sub_iter: usize) { self.sub_iter = sub_iter.max(1); }
    pub fn set_reg_param(&mut self, reg_param: NumT) { self.reg_param = reg_param; }

    /// Thresholds including the two sentinels.
    fn thresholds(&self, state: &TrainState) -> Vec<NumT> {
        exploss_thresholds(&state.scores, state.ranks(), state.n_rank(), self.ordered,
                           self.form == Form::Full)
    }

    /// Replace the current threshold row by the optimum for the refreshed scores and compute the
    /// first example weights.
    pub fn prepare(&self, ensemble: &mut Ensemble, state: &mut TrainState) {
        let th = self.thresholds(state);
        ensemble.replace_last_row(&th[1..state.n_rank()]);
        self.reweight(state, &th);
    }

    /// Example weights under thresholds `th` (with sentinels). Sentinel boundaries do not
    /// contribute.
    pub fn reweight(&self, state: &mut TrainState, th: &[NumT]) {
        let n_rank = state.n_rank();
        debug_assert_eq!(th.len(), n_rank + 1);
        let ranks = state.ranks();

        let mut sum_rhodiff = 0.0;
        let mut objective = 0.0;
        for j in 0..state.nexamples() {
            let (s, y) = (state.scores[j], ranks[j]);
            let (rp, rn) = match self.form {
                Form::Lr => {
                    let rp = if y > 1 { (th[y - 1] - s).exp() } else { 0.0 };
                    let rn = if y < n_rank { (s - th[y]).exp() } else { 0.0 };
                    (rp, rn)
                },
                Form::Full => {
                    let rp: NumT = (1..y).map(|k| (th[k] - s).exp()).sum();
                    let rn: NumT = (y..n_rank).map(|k| (s - th[k]).exp()).sum();
                    (rp, rn)
                },
            };
            state.rho_pos[j] = rp;
            state.rho_neg[j] = rn;
            sum_rhodiff += (rp - rn).abs();
            objective += rp + rn;
        }
        state.sum_rhodiff = sum_rhodiff;
        state.objective = objective;
    }

    /// `0.5 * ln(wn / wp)` where `wn` (`wp`) collects the weight the learner's outputs agree
    /// (disagree) with. Not sanitized.
    pub fn compute_weight(&self, state: &TrainState, outputs: &[NumT]) -> NumT {
        let mut wn = self.reg_param;
        let mut wp = self.reg_param;
        for ((&rp, &rn), &o) in state.rho_pos.iter().zip(&state.rho_neg).zip(outputs) {
            if o >= 0.0 {
                wn += rp * o;
                wp += rn * o;
            } else {
                wp += rp * -o;
                wn += rn * -o;
            }
        }
        0.5 * (wn / wp).ln()
    }

    /// One round: a single weak learner, whose weight is refined over `sub_iter` alternations
    /// with the thresholds.
    pub fn round(&self, ensemble: &Ensemble, state: &mut TrainState, rng: &mut SmallRng) -> Round {
        let data = state.data();
        let learner = ensemble.request_weak_learner(data, &state.rho_pos, &state.rho_neg,
                                                    state.sum_rhodiff, rng);
        let outputs = learner.outputs(data);

        let mut total = 0.0;
        let mut saturated = false;
        let mut th = Vec::new();
        for z in 0..self.sub_iter {
            let (w, sat) = sanitize_weight(self.compute_weight(state, &outputs));
            state.fold(&outputs, w);
            total += w;
            th = self.thresholds(state);
            if sat {
                saturated = true;
                break;
            }
            self.reweight(state, &th);
            trace!("sub-iteration {}: weight {:.4e}, objective {:.4e}", z, w, state.objective);
        }

        let (weight, _) = sanitize_weight(total);
        let row = th[1..state.n_rank()].to_vec();
        Round { learner, weight, row, saturated }
    }
}

impl Default for OrBoost {
    fn default() -> OrBoost { OrBoost::new() }
}






#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;
    use crate::{THRES_MAX, THRES_MIN};
    use crate::data::Data;
    use crate::learner::{LearnerKind, WeakLearner};

    fn data() -> Data {
        let rows = vec![vec![-1.0], vec![-0.5], vec![0.2], vec![0.1], vec![0.9], vec![1.3]];
        Data::from_rows(&rows, &[1, 1, 2, 2, 3, 3])
    }

    #[test]
    fn reweight_forms() {
        let data = data();
        let mut state = TrainState::new(&data, 3, vec![0.0, 0.5, 0.0, -0.5, 1.0, 2.0]);
        let th = [THRES_MIN, -0.25, 0.75, THRES_MAX];

        let mut rule = OrBoost::new();
        rule.reweight(&mut state, &th);
        // rank 1: only the upper boundary
        assert_eq!(state.rho_pos[0], 0.0);
        assert!((state.rho_neg[0] - (0.25f64).exp()).abs() < 1e-12);
        // rank 2: both neighbours
        assert!((state.rho_pos[3] - (0.25f64).exp()).abs() < 1e-12);
        assert!((state.rho_neg[3] - (-1.25f64).exp()).abs() < 1e-12);
        // rank 3: only the lower boundary
        assert!((state.rho_pos[5] - (-1.25f64).exp()).abs() < 1e-12);
        assert_eq!(state.rho_neg[5], 0.0);

        rule.set_form(Form::Full);
        rule.reweight(&mut state, &th);
        assert!((state.rho_neg[0] - (0.25f64).exp() - (-0.75f64).exp()).abs() < 1e-12);
        assert!((state.rho_pos[5] - (-2.25f64).exp() - (-1.25f64).exp()).abs() < 1e-12);
        let expected: NumT = state.rho_pos.iter().zip(&state.rho_neg).map(|(a, b)| a + b).sum();
        assert!((state.objective - expected).abs() < 1e-12);
    }

    #[test]
    fn constant_zero_learner() {
        let data = data();
        let mut state = TrainState::new(&data, 3, vec![0.0; 6]);
        let rule = OrBoost::new();
        rule.reweight(&mut state, &[THRES_MIN, 0.0, 0.0, THRES_MAX]);
        let w = rule.compute_weight(&state, &[0.0; 6]);
        assert!(w.is_nan());
        assert_eq!(sanitize_weight(w), (0.0, false));

        let mut rule = OrBoost::new();
        rule.set_reg_param(1e-32);
        assert_eq!(rule.compute_weight(&state, &[0.0; 6]), 0.0);
    }

    #[test]
    fn weight_lowers_objective() {
        let data = data();
        let mut state = TrainState::new(&data, 3, vec![0.0; 6]);
        let rule = OrBoost::new();
        let th = [THRES_MIN, -0.3, 0.3, THRES_MAX];
        rule.reweight(&mut state, &th);
        let before = state.objective;

        let outputs = vec![-1.0, -1.0, 1.0, -1.0, 1.0, 1.0];
        let w = rule.compute_weight(&state, &outputs);
        assert!(w > 0.0);
        state.fold(&outputs, w);
        rule.reweight(&mut state, &th);
        assert!(state.objective < before);
    }

    #[test]
    fn round_sub_iterations() {
        let data = data();
        let mut rng = SmallRng::seed_from_u64(4);
        let mut ens = Ensemble::new(3, WeakLearner::new(LearnerKind::Stump, 1));
        ens.reset(&mut rng);
        let mut rule = OrBoost::new();
        rule.set_sub_iter(3);

        let mut state = TrainState::new(&data, 3, ens.refresh_scores(&data));
        rule.prepare(&mut ens, &mut state);
        let row0 = ens.thresholds().row(0).to_vec();
        assert!(row0[0] <= row0[1]);

        let round = rule.round(&ens, &mut state, &mut rng);
        assert!(!round.saturated);
        assert_eq!(round.row.len(), 2);
        assert!(round.row[0] <= round.row[1]);

        // the ledger holds the sum of the sub-iteration weights
        let outputs = round.learner.outputs(&data);
        for (s, o) in state.scores.iter().zip(&outputs) {
            assert!((s - round.weight * o).abs() < 1e-9);
        }
    }
}
