/*
 * Copyright 2019 DTAI Research Group - KU Leuven.
 * License: Apache License 2.0
 * Author: Laurens Devos
*/

use std::cmp::Ordering;

use crate::NumT;
use crate::ensemble::Prediction;



macro_rules! impl_metric {
    ($type:ty, $name:expr, eval_one: $impl:expr) => {
        impl_metric!($type, $name, eval_all: |this: &$type, ranks: &[usize],
                                              preds: &[Prediction]| -> NumT {
            let mut loss = 0.0;
            let mut count = 0;
            for (&r, p) in ranks.iter().zip(preds) {
                loss += $impl(this, r, p);
                count += 1;
            }
            if count == 0 { 0.0 } else { loss / count as NumT }
        });
    };
    ($type:ty, $name:expr, eval_all: $impl:expr) => {
        impl Metric for $type {
            fn name(&self) -> &'static str { $name }
            fn eval(&self, ranks: &[usize], predictions: &[Prediction]) -> NumT {
                assert_eq!(ranks.len(), predictions.len());
                $impl(self, ranks, predictions)
            }
        }
    }
}


/// Evaluation of predicted ranks and scores against the true ranks.
pub trait Metric {
    fn name(&self) -> &'static str;
    fn eval(&self, ranks: &[usize], predictions: &[Prediction]) -> NumT;
}

pub fn metric_from_name(name: &str) -> Option<Box<dyn Metric>> {
    match name.to_lowercase().as_str() {
        "absolute_error" | "abs" | "mae" => Some(Box::new(AbsoluteError::new())),
        "classification_error" | "cla" => Some(Box::new(ClassificationError::new())),
        "raw_ranking_loss" | "rl" => Some(Box::new(RawRankingLoss::new())),
        "thresholded_ranking_loss" | "tl" => Some(Box::new(ThresholdedRankingLoss::new())),
        _ => None
    }
}

pub fn metrics_from_names(names: &[String]) -> Option<Vec<Box<dyn Metric>>> {
    let mut metrics = Vec::new();
    for name in names {
        match metric_from_name(name) {
            Some(metric) => metrics.push(metric),
            None => return None,
        }
    }
    Some(metrics)
}

/// Fraction of critical pairs (`rank_i < rank_j`) with `key_i > key_j`; ties count half.
/// Returns 0 when there are no critical pairs.
fn ranking_loss<K: PartialOrd + Copy>(ranks: &[usize], keys: &[K]) -> NumT {
    let n_rank = ranks.iter().cloned().max().unwrap_or(0);
    let mut order: Vec<usize> = (0..ranks.len()).collect();
    order.sort_by(|&i, &j| keys[j].partial_cmp(&keys[i]).unwrap_or(Ordering::Equal));

    // above[k]: examples of rank k with a strictly larger key than the current group
    let mut above = vec![0.0; n_rank + 1];
    let mut group = vec![0.0; n_rank + 1];
    let mut wrong = 0.0;
    let mut start = 0;
    while start < order.len() {
        let key = keys[order[start]];
        let mut end = start;
        while end < order.len() && keys[order[end]] == key { end += 1; }

        for x in group.iter_mut() { *x = 0.0; }
        for &j in &order[start..end] {
            let r = ranks[j];
            wrong += above[1..r].iter().sum::<NumT>();
            group[r] += 1.0;
        }
        wrong += 0.5 * cross_pairs(&group);
        for (a, g) in above.iter_mut().zip(&group) { *a += g; }
        start = end;
    }

    let mut count = vec![0.0; n_rank + 1];
    for &r in ranks { count[r] += 1.0; }
    let n_crit = cross_pairs(&count);

    if n_crit == 0.0 { 0.0 } else { wrong / n_crit }
}

/// `sum_{a < b} count[a] * count[b]`
fn cross_pairs(count: &[NumT]) -> NumT {
    let mut below = 0.0;
    let mut pairs = 0.0;
    for &c in count {
        pairs += below * c;
        below += c;
    }
    pairs
}


// ------------------------------------------------------------------------------------------------

pub struct AbsoluteError {}
impl_metric!(AbsoluteError, "absolute_error", eval_one: |_, r: usize, p: &Prediction| {
    (p.rank as NumT - r as NumT).abs()
});

impl AbsoluteError {
    pub fn new() -> AbsoluteError { AbsoluteError {} }
}

// ------------------------------------------------------------------------------------------------

pub struct ClassificationError {}
impl_metric!(ClassificationError, "classification_error", eval_one: |_, r: usize, p: &Prediction| {
    if p.rank != r { 1.0 } else { 0.0 }
});

impl ClassificationError {
    pub fn new() -> ClassificationError { ClassificationError {} }
}

// ------------------------------------------------------------------------------------------------

/// Pairwise disagreement of the predictions ordered by predicted rank, raw score within a rank.
pub struct RawRankingLoss {}
impl_metric!(RawRankingLoss, "raw_ranking_loss",
             eval_all: |_, ranks: &[usize], preds: &[Prediction]| {
    let keys: Vec<(usize, NumT)> = preds.iter().map(|p| (p.rank, p.score)).collect();
    ranking_loss(ranks, &keys)
});

impl RawRankingLoss {
    pub fn new() -> RawRankingLoss { RawRankingLoss {} }
}

// ------------------------------------------------------------------------------------------------

/// Pairwise disagreement of the predicted ranks.
pub struct ThresholdedRankingLoss {}
impl_metric!(ThresholdedRankingLoss, "thresholded_ranking_loss",
             eval_all: |_, ranks: &[usize], preds: &[Prediction]| {
    let pred_ranks: Vec<usize> = preds.iter().map(|p| p.rank).collect();
    ranking_loss(ranks, &pred_ranks)
});

impl ThresholdedRankingLoss {
    pub fn new() -> ThresholdedRankingLoss { ThresholdedRankingLoss {} }
}






#[cfg(test)]
mod test {
    use super::*;

    fn preds(ranks: &[usize], scores: &[NumT]) -> Vec<Prediction> {
        ranks.iter().zip(scores).map(|(&rank, &score)| Prediction { rank, score }).collect()
    }

    fn brute_force<K: PartialOrd>(ranks: &[usize], keys: &[K]) -> NumT {
        let (mut wrong, mut n_crit) = (0.0, 0.0);
        for i in 0..ranks.len() {
            for j in 0..ranks.len() {
                if ranks[i] < ranks[j] {
                    n_crit += 1.0;
                    if keys[i] > keys[j] { wrong += 1.0; }
                    else if keys[i] == keys[j] { wrong += 0.5; }
                }
            }
        }
        if n_crit == 0.0 { 0.0 } else { wrong / n_crit }
    }

    #[test]
    fn pointwise() {
        let ranks = [1, 2, 3, 3];
        let p = preds(&[1, 3, 1, 3], &[0.0; 4]);
        assert_eq!(AbsoluteError::new().eval(&ranks, &p), 0.75);
        assert_eq!(ClassificationError::new().eval(&ranks, &p), 0.5);
    }

    #[test]
    fn ranking_losses() {
        let ranks = [1, 2, 2, 3, 1, 3, 2];
        let scores = [0.5, 0.1, 0.7, 2.0, -1.0, 0.7, 0.1];
        let pred_ranks = [2, 1, 2, 3, 1, 2, 1];
        let p = preds(&pred_ranks, &scores);

        let keys: Vec<(usize, NumT)> = pred_ranks.iter().cloned().zip(scores.iter().cloned())
            .collect();
        let rl = RawRankingLoss::new().eval(&ranks, &p);
        assert!((rl - brute_force(&ranks, &keys)).abs() < 1e-12);

        let tl = ThresholdedRankingLoss::new().eval(&ranks, &p);
        assert!((tl - brute_force(&ranks, &pred_ranks)).abs() < 1e-12);
    }

    #[test]
    fn raw_loss_follows_predicted_ranks() {
        // non-monotone thresholds: predicted ranks inverted while the scores are ordered
        let ranks = [1, 2];
        let p = preds(&[2, 1], &[0.0, 1.0]);
        assert_eq!(RawRankingLoss::new().eval(&ranks, &p), 1.0);
        assert_eq!(ThresholdedRankingLoss::new().eval(&ranks, &p), 1.0);

        // same predicted rank: the scores decide
        let p = preds(&[2, 2], &[0.0, 1.0]);
        assert_eq!(RawRankingLoss::new().eval(&ranks, &p), 0.0);
        assert_eq!(ThresholdedRankingLoss::new().eval(&ranks, &p), 0.5);
        let p = preds(&[2, 2], &[1.0, 1.0]);
        assert_eq!(RawRankingLoss::new().eval(&ranks, &p), 0.5);
    }

    #[test]
    fn ranking_loss_extremes() {
        let ranks = [1, 2, 3];
        assert_eq!(RawRankingLoss::new().eval(&ranks, &preds(&[1, 2, 3], &[0.0, 1.0, 2.0])), 0.0);
        assert_eq!(RawRankingLoss::new().eval(&ranks, &preds(&[2, 2, 2], &[2.0, 1.0, 0.0])), 1.0);
        assert_eq!(RawRankingLoss::new().eval(&ranks, &preds(&[3, 2, 1], &[0.0, 1.0, 2.0])), 1.0);
        assert_eq!(ThresholdedRankingLoss::new().eval(&ranks, &preds(&[2, 2, 2], &[0.0; 3])), 0.5);

        // no critical pairs
        let ranks = [2, 2];
        assert_eq!(RawRankingLoss::new().eval(&ranks, &preds(&[1, 2], &[1.0, 0.0])), 0.0);
    }

    #[test]
    fn names() {
        let names = vec!["absolute_error".to_string(), "tl".to_string()];
        let ms = metrics_from_names(&names).unwrap();
        assert_eq!(ms[0].name(), "absolute_error");
        assert_eq!(ms[1].name(), "thresholded_ranking_loss");
        assert!(metric_from_name("rmse").is_none());
    }
}
