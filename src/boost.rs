/*
 * Copyright 2019 DTAI Research Group - KU Leuven.
 * License: Apache License 2.0
 * Author: Laurens Devos
*/

use std::str::FromStr;
use std::time::Instant;

use rand::rngs::SmallRng;

use crate::{NumT, THRES_MAX};
use crate::config::Config;
use crate::data::Data;
use crate::ensemble::{Ensemble, Prediction};
use crate::learner::WeakLearner;
use crate::metric::Metric;
use crate::orboost::OrBoost;
use crate::rankboost::RankBoost;
use crate::threshold::rank_of;

macro_rules! time {
    ($($block:tt)*) => {{
        let start = Instant::now();
        let res = {
            $($block)*
        };
        let el = start.elapsed();
        let seconds = el.as_secs() as f32 + el.subsec_micros() as f32 * 1e-6;
        (res, seconds)
    }}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    RankBoost,
    OrBoost,
}

impl RuleKind {
    /// Type tag used in the persisted model.
    pub fn tag(self) -> &'static str {
        match self {
            RuleKind::RankBoost => "rankboost",
            RuleKind::OrBoost => "orboost",
        }
    }
}

impl FromStr for RuleKind {
    type Err = String;
    fn from_str(s: &str) -> Result<RuleKind, String> {
        match s.to_lowercase().as_str() {
            "rankboost" => Ok(RuleKind::RankBoost),
            "orboost" => Ok(RuleKind::OrBoost),
            _ => Err(format!("unknown boosting rule '{}'", s)),
        }
    }
}




// - Training state -------------------------------------------------------------------------------

/// Mutable state of one `train` call: the score ledger and the per-example weights the next
/// weak learner is fit to.
pub struct TrainState<'a> {
    data: &'a Data,
    n_rank: usize,

    /// `scores[j] == sum_i weight[i] * output_i(x_j)` over the committed learners (plus the
    /// sub-iterations of the round in progress).
    pub scores: Vec<NumT>,

    /// Weight pushing example `j` towards a higher score.
    pub rho_pos: Vec<NumT>,

    /// Weight pushing example `j` towards a lower score.
    pub rho_neg: Vec<NumT>,

    /// `sum_j |rho_pos[j] - rho_neg[j]|`, the normalizer of the weak learner's example weights.
    pub sum_rhodiff: NumT,
    pub objective: NumT,
}

impl <'a> TrainState<'a> {
    pub fn new(data: &'a Data, n_rank: usize, scores: Vec<NumT>) -> TrainState<'a> {
        assert_eq!(scores.len(), data.nexamples());
        assert!(data.max_rank() <= n_rank, "rank {} in data exceeds n_rank={}",
                data.max_rank(), n_rank);
        let n = data.nexamples();
        TrainState {
            data,
            n_rank,
            scores,
            rho_pos: vec![0.0; n],
            rho_neg: vec![0.0; n],
            sum_rhodiff: 0.0,
            objective: 0.0,
        }
    }

    pub fn data(&self) -> &'a Data { self.data }
    pub fn ranks(&self) -> &'a [usize] { self.data.ranks() }
    pub fn n_rank(&self) -> usize { self.n_rank }
    pub fn nexamples(&self) -> usize { self.scores.len() }

    /// Add `weight * outputs[j]` to every score.
    pub fn fold(&mut self, outputs: &[NumT], weight: NumT) {
        assert_eq!(outputs.len(), self.scores.len());
        for (s, &o) in self.scores.iter_mut().zip(outputs) {
            *s += weight * o;
        }
    }

    /// Training predictions under the given threshold row.
    pub fn predictions(&self, row: &[NumT]) -> Vec<Prediction> {
        self.scores.iter()
            .map(|&score| Prediction { rank: rank_of(score, row), score })
            .collect()
    }
}

/// Outcome of one boosting round, committed to the ensemble by the booster.
pub struct Round {
    pub learner: WeakLearner,
    pub weight: NumT,
    pub row: Vec<NumT>,

    /// The weight was infinite: the learner separates the data perfectly and training stops.
    pub saturated: bool,
}

/// NaN weights become 0; infinite weights are clamped to `±THRES_MAX` and flagged.
pub fn sanitize_weight(w: NumT) -> (NumT, bool) {
    if w.is_nan() {
        debug!("degenerate weak learner: weight NaN, using 0");
        (0.0, false)
    } else if w.is_infinite() {
        debug!("weight saturated: {}", w);
        (w.signum() * THRES_MAX, true)
    } else {
        (w, false)
    }
}




// - Boosting rules -------------------------------------------------------------------------------

/// The closed set of update rules. Each decides which weak learner to request and how much weight
/// it gets, and produces the threshold row for the round.
#[derive(Debug, Clone, PartialEq)]
pub enum BoostingRule {
    RankBoost(RankBoost),
    OrBoost(OrBoost),
}

impl BoostingRule {
    pub fn new(kind: RuleKind) -> BoostingRule {
        match kind {
            RuleKind::RankBoost => BoostingRule::RankBoost(RankBoost::new()),
            RuleKind::OrBoost => BoostingRule::OrBoost(OrBoost::new()),
        }
    }

    pub fn from_config(config: &Config) -> BoostingRule {
        match config.rule {
            RuleKind::RankBoost => BoostingRule::RankBoost(RankBoost::from_config(config)),
            RuleKind::OrBoost => BoostingRule::OrBoost(OrBoost::from_config(config)),
        }
    }

    pub fn kind(&self) -> RuleKind {
        match self {
            BoostingRule::RankBoost(_) => RuleKind::RankBoost,
            BoostingRule::OrBoost(_) => RuleKind::OrBoost,
        }
    }

    pub fn name(&self) -> &'static str { self.kind().tag() }

    pub fn reg_param(&self) -> NumT {
        match self {
            BoostingRule::RankBoost(r) => r.reg_param(),
            BoostingRule::OrBoost(r) => r.reg_param(),
        }
    }

    pub fn set_reg_param(&mut self, reg_param: NumT) {
        match self {
            BoostingRule::RankBoost(r) => r.set_reg_param(reg_param),
            BoostingRule::OrBoost(r) => r.set_reg_param(reg_param),
        }
    }

    /// Compute the example weights for the first round from the refreshed scores.
    fn prepare(&self, ensemble: &mut Ensemble, state: &mut TrainState) {
        match self {
            BoostingRule::RankBoost(r) => r.reweight(state),
            BoostingRule::OrBoost(r) => r.prepare(ensemble, state),
        }
    }

    fn round(&self, ensemble: &Ensemble, state: &mut TrainState, rng: &mut SmallRng) -> Round {
        match self {
            BoostingRule::RankBoost(r) => r.round(ensemble, state, rng),
            BoostingRule::OrBoost(r) => r.round(ensemble, state, rng),
        }
    }

    /// Grow `ensemble` by at most `niterations` rounds. Returns the number of rounds committed.
    pub fn train(&self, ensemble: &mut Ensemble, data: &Data, niterations: usize,
                 rng: &mut SmallRng) -> usize
    {
        Booster::new(self, data, niterations).train(ensemble, rng)
    }
}




// - Booster --------------------------------------------------------------------------------------

/// The round loop shared by all rules.
pub struct Booster<'a> {
    rule: &'a BoostingRule,
    data: &'a Data,
    niterations: usize,
    start: Instant,
    iter_count: usize,
    metrics: &'a [Box<dyn Metric>],
    metric_frequency: usize,
}

impl <'a> Booster<'a> {
    pub fn new(rule: &'a BoostingRule, data: &'a Data, niterations: usize) -> Booster<'a> {
        Booster {
            rule,
            data,
            niterations,
            start: Instant::now(),
            iter_count: 0,
            metrics: &[],
            metric_frequency: 0,
        }
    }

    /// Evaluate `metrics` on the training data every `frequency` rounds (0 disables).
    pub fn set_metrics(&mut self, metrics: &'a [Box<dyn Metric>], frequency: usize) {
        self.metrics = metrics;
        self.metric_frequency = frequency;
    }

    pub fn train(mut self, ensemble: &mut Ensemble, rng: &mut SmallRng) -> usize {
        assert!(self.iter_count == 0);
        assert!(ensemble.is_ready(), "ensemble not reset");
        assert_eq!(ensemble.nfeatures(), self.data.nfeatures());
        self.start = Instant::now();

        let scores = ensemble.refresh_scores(self.data);
        let mut state = TrainState::new(self.data, ensemble.n_rank(), scores);
        ensemble.reserve_rounds(self.niterations);
        self.rule.prepare(ensemble, &mut state);

        info!("{} training: {} examples, {} features, n_rank={}, {} rounds, {} in ensemble",
              self.rule.name(), self.data.nexamples(), self.data.nfeatures(), ensemble.n_rank(),
              self.niterations, ensemble.n_in_agg());

        for _ in 0..self.niterations {
            if self.train_one_iter(ensemble, &mut state, rng) {
                info!("[{:3}] perfect separation, stopping early", self.iter_count);
                break;
            }
        }

        debug_assert_eq!(ensemble.thresholds().nrows(), ensemble.n_in_agg() + 1);
        self.iter_count
    }

    fn train_one_iter(&mut self, ensemble: &mut Ensemble, state: &mut TrainState,
                      rng: &mut SmallRng) -> bool
    {
        self.iter_count += 1;
        let (round, rt) = time!(self.rule.round(ensemble, state, rng));
        let saturated = round.saturated;
        let weight = round.weight;
        ensemble.commit(round.learner, round.weight, &round.row);

        let el = self.start.elapsed();
        let seconds = el.as_secs() as f32 + el.subsec_micros() as f32 * 1e-6;
        info!("[{:3}] weight {:10.4e}, objective {:10.4e}, round {:5.1} ms, total {:.3} s",
              self.iter_count, weight, state.objective, rt * 1000.0, seconds);

        let run_metrics = !self.metrics.is_empty()
            && self.metric_frequency > 0
            && self.iter_count % self.metric_frequency == 0;
        if run_metrics {
            let preds = state.predictions(ensemble.thresholds().last_row());
            for m in self.metrics {
                let eval = m.eval(state.ranks(), &preds);
                info!("[   ] eval {:<24} {:10.4e}", m.name(), eval);
            }
        }

        saturated
    }
}






#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;
    use crate::learner::LearnerKind;
    use crate::orboost::Form;
    use crate::threshold::ThresMode;

    fn separable() -> Data {
        Data::from_rows(&[vec![-2.0], vec![-1.0], vec![1.0], vec![2.0]], &[1, 1, 2, 2])
    }

    fn noisy() -> Data {
        let rows = vec![
            vec![0.1, 1.0], vec![0.4, -0.5], vec![0.35, 0.3], vec![0.8, 0.1], vec![0.6, -0.2],
            vec![0.9, 0.7], vec![0.2, -1.0], vec![0.7, 0.4], vec![0.5, 0.9], vec![0.05, 0.2],
            vec![0.95, -0.3], vec![0.3, 0.5],
        ];
        Data::from_rows(&rows, &[1, 2, 1, 3, 2, 3, 1, 2, 2, 1, 3, 1])
    }

    #[test]
    fn sanitize() {
        assert_eq!(sanitize_weight(0.25), (0.25, false));
        assert_eq!(sanitize_weight(NumT::NAN), (0.0, false));
        assert_eq!(sanitize_weight(NumT::INFINITY), (THRES_MAX, true));
        assert_eq!(sanitize_weight(NumT::NEG_INFINITY), (-THRES_MAX, true));
        assert_eq!("OrBoost".parse::<RuleKind>(), Ok(RuleKind::OrBoost));
        assert!("adaboost".parse::<RuleKind>().is_err());
    }

    #[test]
    fn perfect_separator_stops() {
        let data = separable();
        for &kind in &[RuleKind::RankBoost, RuleKind::OrBoost] {
            let mut rng = SmallRng::seed_from_u64(7);
            let rule = BoostingRule::new(kind);
            let mut ens = Ensemble::new(2, WeakLearner::new(LearnerKind::Stump, 1));
            ens.reset(&mut rng);

            let nrounds = rule.train(&mut ens, &data, 10, &mut rng);
            assert_eq!(nrounds, 1, "{:?}", kind);
            assert_eq!(ens.n_in_agg(), 1);
            assert_eq!(ens.thresholds().nrows(), ens.n_in_agg() + 1);
            assert_eq!(ens.weights()[0], THRES_MAX);
            for (i, &r) in data.ranks().iter().enumerate() {
                assert_eq!(ens.predict(data.example(i), 1).rank, r);
            }
        }
    }

    #[test]
    fn separator_stops_with_bag_codes() {
        let data = separable();
        for &bag in &[11, 21] {
            let mut config = Config::new();
            config.apply_bag_code(bag).unwrap();
            assert!(config.reg_param > 0.0);
            let mut rng = SmallRng::seed_from_u64(3);
            let rule = BoostingRule::from_config(&config);
            let mut ens = Ensemble::from_config(&config, 2, data.nfeatures());
            ens.reset(&mut rng);

            let nrounds = rule.train(&mut ens, &data, 10, &mut rng);
            assert_eq!(nrounds, 1, "bag={}", bag);
            assert_eq!(ens.weights()[0], THRES_MAX);
        }
    }

    #[test]
    fn rows_track_rounds() {
        let data = noisy();
        let configs = vec![
            (RuleKind::RankBoost, ThresMode::AbsLoss, Form::Lr),
            (RuleKind::RankBoost, ThresMode::ClaLoss, Form::Lr),
            (RuleKind::OrBoost, ThresMode::AbsLoss, Form::Lr),
            (RuleKind::OrBoost, ThresMode::AbsLoss, Form::Full),
        ];
        for (kind, thres_mode, form) in configs {
            let mut config = Config::new();
            config.rule = kind;
            config.thres_mode = thres_mode;
            config.form = form;
            config.sub_iter = 2;
            let mut rng = SmallRng::seed_from_u64(11);
            let rule = BoostingRule::from_config(&config);
            let mut ens = Ensemble::from_config(&config, 3, data.nfeatures());
            ens.reset(&mut rng);

            let nrounds = rule.train(&mut ens, &data, 5, &mut rng);
            assert_eq!(ens.n_in_agg(), nrounds);
            assert_eq!(ens.thresholds().nrows(), nrounds + 1);
            for row in ens.thresholds().rows() {
                assert_eq!(row.len(), 2);
                assert!(row[0] <= row[1], "{:?} {:?}", kind, row);
            }

            // the ledger built during training agrees with replaying the ensemble
            let scores = ens.refresh_scores(&data);
            let preds = ens.predict_data(&data, usize::MAX);
            for (s, p) in scores.iter().zip(&preds) {
                assert!((s - p.score).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn continue_training() {
        let data = noisy();
        let mut rng = SmallRng::seed_from_u64(2);
        let rule = BoostingRule::new(RuleKind::RankBoost);
        let mut ens = Ensemble::new(3, WeakLearner::new(LearnerKind::Stump, 2));
        ens.reset(&mut rng);

        let a = rule.train(&mut ens, &data, 2, &mut rng);
        let b = rule.train(&mut ens, &data, 3, &mut rng);
        assert_eq!(ens.n_in_agg(), a + b);
        assert_eq!(ens.thresholds().nrows(), a + b + 1);
    }
}
