/*
 * Copyright 2019 DTAI Research Group - KU Leuven.
 * License: Apache License 2.0
 * Author: Laurens Devos
*/

use std::cmp::Ordering;

use crate::{NumT, EPSILON};
use crate::learner::BinaryData;

/// Groups with a summed signed weight below this are ignored by the 1-d search.
const INFINITESIMAL: NumT = 1e-14;

/// Decision stump: `sgn(x[feat_id] - threshold)`, negated when the direction is not positive.
#[derive(Debug, Clone, PartialEq)]
pub struct Stump {
    nfeatures: usize,
    feat_id: usize,
    threshold: NumT,
    positive: bool,
}

/// Result of the search along one feature.
#[derive(Debug, Clone, PartialEq)]
pub struct Split1d {
    pub error: NumT,
    pub threshold: NumT,
    pub positive: bool,

    /// false if the threshold lies outside the range of the (weighted) values
    pub interior: bool,
}

impl Stump {
    pub fn new(nfeatures: usize) -> Stump {
        Stump::from_parts(nfeatures, 0, 0.0, true)
    }

    pub fn from_parts(nfeatures: usize, feat_id: usize, threshold: NumT, positive: bool) -> Stump {
        assert!(feat_id < nfeatures || nfeatures == 0);
        Stump { nfeatures, feat_id, threshold, positive }
    }

    pub fn nfeatures(&self) -> usize { self.nfeatures }
    pub fn feat_id(&self) -> usize { self.feat_id }
    pub fn threshold(&self) -> NumT { self.threshold }
    pub fn positive(&self) -> bool { self.positive }

    /// Pick the feature, threshold and direction with the smallest weighted error.
    pub fn train(&mut self, data: &BinaryData) {
        let yw = data.signed_weights();
        let total_weight: NumT = data.weights().iter().sum();
        let mut column = Vec::with_capacity(data.nexamples());
        let mut best: Option<(usize, Split1d)> = None;

        for feat_id in 0..data.nfeatures() {
            data.data().feature_column(feat_id, &mut column);
            let split = train_1d(&column, &yw, total_weight);
            let better = match best {
                None => true,
                Some((_, ref b)) => split.error < b.error,
            };
            if better { best = Some((feat_id, split)); }
        }

        if let Some((feat_id, split)) = best {
            if !split.interior {
                warn!("stump threshold out of range (F{:02}, error {:.4})", feat_id, split.error);
            }
            debug!("stump F{:02} threshold {} {} error {:.4}", feat_id, split.threshold,
                   if split.positive { "P" } else { "N" }, split.error);
            self.feat_id = feat_id;
            self.threshold = split.threshold;
            self.positive = split.positive;
        }
    }

    pub fn predict(&self, x: &[NumT]) -> NumT {
        debug_assert_eq!(x.len(), self.nfeatures);
        let y = if x[self.feat_id] < self.threshold { -1.0 } else { 1.0 };
        if self.positive { y } else { -y }
    }
}

/// Sort `x`, merge equal values summing their signed weights and drop groups that carry no
/// weight.
fn weighted_groups(x: &[NumT], yw: &[NumT]) -> Vec<(NumT, NumT)> {
    assert_eq!(x.len(), yw.len());
    let mut order: Vec<usize> = (0..x.len()).collect();
    order.sort_by(|&i, &j| x[i].partial_cmp(&x[j]).unwrap_or(Ordering::Equal));

    let mut groups: Vec<(NumT, NumT)> = Vec::new();
    for i in order {
        match groups.last_mut() {
            Some(g) if g.0 == x[i] => g.1 += yw[i],
            _ => groups.push((x[i], yw[i])),
        }
    }
    groups.retain(|g| g.1.abs() >= INFINITESIMAL);
    groups
}

/// Threshold after group `t` (or before all groups if `t` is `None`).
fn cut_between(groups: &[(NumT, NumT)], t: Option<usize>) -> NumT {
    match t {
        None => groups[0].0 - 1.0,
        Some(t) if t + 1 < groups.len() => 0.5 * (groups[t].0 + groups[t + 1].0),
        Some(t) => groups[t].0 + 1.0,
    }
}

/// Best threshold and direction for a single feature. `yw` are the signed weights (label times
/// weight), `total_weight` the sum of the unsigned weights.
pub fn train_1d(x: &[NumT], yw: &[NumT], total_weight: NumT) -> Split1d {
    let groups = weighted_groups(x, yw);
    if groups.is_empty() {
        let min = x.iter().cloned().fold(NumT::INFINITY, NumT::min);
        return Split1d {
            error: 0.0,
            threshold: if min.is_finite() { min - 1.0 } else { 0.0 },
            positive: true,
            interior: false,
        };
    }

    let sum: NumT = groups.iter().map(|g| g.1).sum();
    let neg_weight = 0.5 * (total_weight - sum);

    // cut before all groups: everything predicted +1 (positive direction)
    let mut prefix = 0.0;
    let mut best_err = neg_weight.min(total_weight - neg_weight);
    let mut best_positive = neg_weight <= total_weight - neg_weight;
    let mut best_cut = None;

    for t in 0..groups.len() {
        prefix += groups[t].1;
        let err_pos = neg_weight + prefix;
        let err_neg = total_weight - err_pos;
        let (err, positive) = if err_pos <= err_neg { (err_pos, true) } else { (err_neg, false) };

        let interior = t + 1 < groups.len();
        let best_interior = best_cut.map_or(false, |b| b + 1 < groups.len());
        if err < best_err - EPSILON
            || (err <= best_err + EPSILON && interior && !best_interior)
        {
            best_err = err;
            best_positive = positive;
            best_cut = Some(t);
        }
    }

    Split1d {
        error: best_err,
        threshold: cut_between(&groups, best_cut),
        positive: best_positive,
        interior: best_cut.map_or(false, |b| b + 1 < groups.len()),
    }
}

/// Threshold `th` minimizing the weighted error of `sgn(x - th)`; the smallest such cut wins.
pub fn best_positive_threshold(x: &[NumT], yw: &[NumT]) -> NumT {
    let groups = weighted_groups(x, yw);
    if groups.is_empty() {
        let min = x.iter().cloned().fold(NumT::INFINITY, NumT::min);
        return if min.is_finite() { min - 1.0 } else { 0.0 };
    }

    let mut prefix = 0.0;
    let mut best_err = 0.0;
    let mut best_cut = None;
    for t in 0..groups.len() {
        prefix += groups[t].1;
        if prefix < best_err {
            best_err = prefix;
            best_cut = Some(t);
        }
    }
    cut_between(&groups, best_cut)
}






#[cfg(test)]
mod test {
    use super::*;
    use crate::data::Data;

    #[test]
    fn train_1d_basic() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let yw = [-0.25, -0.25, 0.25, 0.25];
        let split = train_1d(&x, &yw, 1.0);
        assert!(split.error.abs() < 1e-12);
        assert_eq!(split.threshold, 1.5);
        assert!(split.positive);
        assert!(split.interior);

        let yw = [0.25, 0.25, -0.25, -0.25];
        let split = train_1d(&x, &yw, 1.0);
        assert_eq!(split.threshold, 1.5);
        assert!(!split.positive);
    }

    #[test]
    fn train_1d_merges_equal_values() {
        let x = [1.0, 1.0, 2.0, 0.0];
        let yw = [0.3, -0.1, 0.2, -0.4];
        let split = train_1d(&x, &yw, 1.0);
        assert_eq!(split.threshold, 0.5);
        assert!(split.positive);
        assert!((split.error - 0.1).abs() < 1e-12);
    }

    #[test]
    fn train_1d_all_one_class() {
        let x = [0.0, 1.0, 2.0];
        let yw = [0.5, 0.25, 0.25];
        let split = train_1d(&x, &yw, 1.0);
        assert!(split.error.abs() < 1e-12);
        assert!(!split.interior);
        assert_eq!(split.threshold, -1.0);
        assert!(split.positive);
    }

    #[test]
    fn positive_threshold() {
        let x = [3.0, 0.0, 2.0, 1.0];
        let yw = [1.0, -1.0, 1.0, -1.0];
        assert_eq!(best_positive_threshold(&x, &yw), 1.5);
        assert_eq!(best_positive_threshold(&x, &[1.0; 4]), -1.0);
        assert_eq!(best_positive_threshold(&x, &[-1.0; 4]), 4.0);
        assert_eq!(best_positive_threshold(&x, &[0.0; 4]), -1.0);
    }

    #[test]
    fn stump_picks_best_feature() {
        // feature 0 is noise, feature 1 separates
        let rows = vec![vec![0.3, -2.0], vec![0.1, -1.0], vec![0.2, 1.0], vec![0.0, 2.0]];
        let data = Data::from_rows(&rows, &[1, 1, 2, 2]);
        let bd = BinaryData::new(&data, vec![-1.0, -1.0, 1.0, 1.0], vec![0.25; 4]);

        let mut stump = Stump::new(2);
        stump.train(&bd);
        assert_eq!(stump.feat_id(), 1);
        assert_eq!(stump.threshold(), 0.0);
        assert!(stump.positive());
        for (i, &y) in bd.labels().iter().enumerate() {
            assert_eq!(stump.predict(data.example(i)), y);
        }
        assert_eq!(stump.predict(&[5.0, 0.0]), 1.0); // sgn(0) = +1
    }
}
