/*
 * Copyright 2019 DTAI Research Group - KU Leuven.
 * License: Apache License 2.0
 * Author: Laurens Devos
*/

use std::io::Write;
use std::str::FromStr;

use rand::Rng;
use rand::rngs::SmallRng;

use crate::NumT;
use crate::config::Config;
use crate::data::Data;
use crate::learner::{BinaryData, WeakLearner};
use crate::model::{Tokens, fmt_num};
use crate::threshold::{ThresMode, ThresholdTable, rank_of, compute_thresholds};

/// How row 0 of the threshold table is seeded by `Ensemble::reset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitMode {
    /// All thresholds at 0.
    Zero,
    /// Evenly spaced ladder `1 + k - n_rank / 2` around 0.
    Naive,
    /// Increasing random walk with steps uniform in [0, 1).
    Rand,
}

impl FromStr for InitMode {
    type Err = String;
    fn from_str(s: &str) -> Result<InitMode, String> {
        match s.to_lowercase().as_str() {
            "zero" => Ok(InitMode::Zero),
            "naive" => Ok(InitMode::Naive),
            "rand" | "random" => Ok(InitMode::Rand),
            _ => Err(format!("unknown init mode '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub rank: usize,
    pub score: NumT,
}

/// Thresholded ensemble: weighted weak learners and one threshold row per committed round.
///
/// Invariant once reset: `thresholds().nrows() == n_in_agg() + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Ensemble {
    n_rank: usize,
    nfeatures: usize,
    init_mode: InitMode,
    thres_mode: ThresMode,
    base: WeakLearner,
    learners: Vec<WeakLearner>,
    weights: Vec<NumT>,
    table: ThresholdTable,
}

impl Ensemble {
    pub fn new(n_rank: usize, base: WeakLearner) -> Ensemble {
        assert!(n_rank >= 2, "n_rank must be at least 2, got {}", n_rank);
        Ensemble {
            n_rank,
            nfeatures: base.nfeatures(),
            init_mode: InitMode::Zero,
            thres_mode: ThresMode::AbsLoss,
            base,
            learners: Vec::new(),
            weights: Vec::new(),
            table: ThresholdTable::new(n_rank - 1),
        }
    }

    pub fn from_config(config: &Config, n_rank: usize, nfeatures: usize) -> Ensemble {
        let mut ensemble = Ensemble::new(n_rank, WeakLearner::from_config(config, nfeatures));
        ensemble.init_mode = config.init_mode;
        ensemble.thres_mode = config.thres_mode;
        ensemble
    }

    pub fn n_rank(&self) -> usize { self.n_rank }
    pub fn nthres(&self) -> usize { self.n_rank - 1 }
    pub fn nfeatures(&self) -> usize { self.nfeatures }
    pub fn n_in_agg(&self) -> usize { self.learners.len() }
    pub fn init_mode(&self) -> InitMode { self.init_mode }
    pub fn thres_mode(&self) -> ThresMode { self.thres_mode }
    pub fn set_init_mode(&mut self, mode: InitMode) { self.init_mode = mode; }
    pub fn set_thres_mode(&mut self, mode: ThresMode) { self.thres_mode = mode; }
    pub fn base(&self) -> &WeakLearner { &self.base }
    pub fn learners(&self) -> &[WeakLearner] { &self.learners }
    pub fn weights(&self) -> &[NumT] { &self.weights }
    pub fn thresholds(&self) -> &ThresholdTable { &self.table }
    pub fn is_ready(&self) -> bool { !self.table.is_empty() }

    /// Drop all weak learners and seed row 0 of the threshold table.
    pub fn reset(&mut self, rng: &mut SmallRng) {
        assert!(self.n_rank >= 2);
        self.learners.clear();
        self.weights.clear();
        self.table.clear();

        let nthres = self.nthres();
        let row: Vec<NumT> = match self.init_mode {
            InitMode::Zero => vec![0.0; nthres],
            InitMode::Naive => (0..nthres)
                .map(|k| 1.0 + k as NumT - 0.5 * self.n_rank as NumT)
                .collect(),
            InitMode::Rand => {
                let mut acc = 0.0;
                (0..nthres).map(|_| { acc += rng.gen::<NumT>(); acc }).collect()
            },
        };
        debug!("reset ensemble: n_rank={}, {:?} seed {:?}", self.n_rank, self.init_mode, row);
        self.table.push_row(&row);
    }

    /// Pre-size the threshold table for `nrounds` more rounds.
    pub fn reserve_rounds(&mut self, nrounds: usize) {
        self.table.reserve_rounds(nrounds);
        self.learners.reserve(nrounds);
        self.weights.reserve(nrounds);
    }

    /// Score of the first `min(iter, n_in_agg)` learners and the rank it maps to under the
    /// matching threshold row.
    pub fn predict(&self, x: &[NumT], iter: usize) -> Prediction {
        assert!(self.is_ready(), "ensemble not reset");
        let n = iter.min(self.n_in_agg());
        let score: NumT = self.learners[0..n].iter()
            .zip(&self.weights)
            .map(|(l, &w)| w * l.predict(x))
            .sum();
        Prediction {
            rank: rank_of(score, self.table.row(n)),
            score,
        }
    }

    pub fn predict_data(&self, data: &Data, iter: usize) -> Vec<Prediction> {
        (0..data.nexamples()).map(|i| self.predict(data.example(i), iter)).collect()
    }

    /// Rebuild the score of every example from scratch, using the sign of every learner output.
    /// Learners output ±1, so this equals the raw weighted sum.
    pub fn refresh_scores(&self, data: &Data) -> Vec<NumT> {
        let mut scores = vec![0.0; data.nexamples()];
        for (learner, &w) in self.learners.iter().zip(&self.weights) {
            for (i, s) in scores.iter_mut().enumerate() {
                *s += if learner.predict(data.example(i)) >= 0.0 { w } else { -w };
            }
        }
        scores
    }

    /// Fit a fresh copy of the base learner to the binary problem defined by the per-example
    /// positive and negative weights.
    pub fn request_weak_learner(&self, data: &Data, pos: &[NumT], neg: &[NumT],
                                normalizer: NumT, rng: &mut SmallRng) -> WeakLearner
    {
        let bd = BinaryData::from_sample_weights(data, pos, neg, normalizer);
        let mut learner = self.base.clone();
        learner.train(&bd, rng);
        learner
    }

    /// Thresholds for the given scores under the configured criterion.
    pub fn compute_thresholds(&self, scores: &[NumT], ranks: &[usize]) -> Vec<NumT> {
        compute_thresholds(self.thres_mode, scores, ranks, self.n_rank)
    }

    /// Append a round: the learner, its weight and the threshold row valid after it.
    pub fn commit(&mut self, learner: WeakLearner, weight: NumT, row: &[NumT]) {
        assert!(self.is_ready(), "ensemble not reset");
        assert_eq!(learner.nfeatures(), self.nfeatures);
        self.learners.push(learner);
        self.weights.push(weight);
        self.table.push_row(row);
        debug_assert_eq!(self.table.nrows(), self.n_in_agg() + 1);
    }

    /// Overwrite the threshold row of the current ensemble size.
    pub fn replace_last_row(&mut self, row: &[NumT]) {
        self.table.replace_last_row(row);
    }

    /// Writes everything after the type tag line.
    pub fn write<W: Write>(&self, out: &mut W) -> Result<(), String> {
        let err = |e: std::io::Error| format!("write error: {}", e);
        writeln!(out, "{} {}", self.nfeatures, self.n_in_agg()).map_err(err)?;
        self.base.write(out)?;
        for learner in &self.learners {
            learner.write(out)?;
        }
        if !self.weights.is_empty() {
            let ws: Vec<String> = self.weights.iter().map(|&w| fmt_num(w)).collect();
            writeln!(out, "{}", ws.join(" ")).map_err(err)?;
        }
        writeln!(out, "{}", self.n_rank).map_err(err)?;
        for row in self.table.rows() {
            let ts: Vec<String> = row.iter().map(|&t| fmt_num(t)).collect();
            writeln!(out, "{}", ts.join(" ")).map_err(err)?;
        }
        Ok(())
    }

    pub fn read(tokens: &mut Tokens) -> Result<Ensemble, String> {
        let nfeatures: usize = tokens.next_value("number of features")?;
        let n_in_agg: usize = tokens.next_value("ensemble size")?;
        let base = WeakLearner::read(tokens, nfeatures)?;

        // counts come from the stream: grow as tokens arrive
        let mut learners = Vec::new();
        for _ in 0..n_in_agg {
            learners.push(WeakLearner::read(tokens, nfeatures)?);
        }
        let mut weights: Vec<NumT> = Vec::new();
        for _ in 0..n_in_agg {
            weights.push(tokens.next_value("learner weight")?);
        }

        let n_rank: usize = tokens.next_value("n_rank")?;
        if n_rank < 2 {
            return Err(format!("invalid n_rank {}", n_rank));
        }
        let mut table = ThresholdTable::new(n_rank - 1);
        let mut row: Vec<NumT> = Vec::new();
        for _ in 0..=n_in_agg {
            row.clear();
            for _ in 0..n_rank - 1 {
                row.push(tokens.next_value("threshold")?);
            }
            table.push_row(&row);
        }

        Ok(Ensemble {
            n_rank,
            nfeatures,
            init_mode: InitMode::Zero,
            thres_mode: ThresMode::AbsLoss,
            base,
            learners,
            weights,
            table,
        })
    }
}
