/*
 * Copyright 2019 DTAI Research Group - KU Leuven.
 * License: Apache License 2.0
 * Author: Laurens Devos
*/

//! Threshold rows: the `n_rank - 1` ordered cut points that turn a real valued score into a rank,
//! and the optimizers that choose them from (score, rank) pairs.

use std::cmp::Ordering;
use std::str::FromStr;

use crate::{NumT, THRES_MAX, THRES_MIN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresMode {
    /// Per-boundary exponential margin loss, boundaries solved independently.
    ExpLoss,
    /// Exponential margin loss with adjacent-boundary merging to keep the row non-decreasing.
    ExpLossOrdered,
    /// Exact dynamic program minimizing the absolute rank error.
    AbsLoss,
    /// Exact dynamic program minimizing the number of misranked samples.
    ClaLoss,
}

impl FromStr for ThresMode {
    type Err = String;
    fn from_str(s: &str) -> Result<ThresMode, String> {
        match s.to_lowercase().as_str() {
            "exploss" => Ok(ThresMode::ExpLoss),
            "exploss_ordered" | "explossordered" => Ok(ThresMode::ExpLossOrdered),
            "absloss" | "abs" => Ok(ThresMode::AbsLoss),
            "claloss" | "cla" => Ok(ThresMode::ClaLoss),
            _ => Err(format!("unknown threshold mode '{}'", s)),
        }
    }
}

/// Map a score to a rank: `1 + #{k : score >= row[k]}`. A score equal to a threshold goes up.
pub fn rank_of(score: NumT, row: &[NumT]) -> usize {
    1 + row.iter().filter(|&&t| score >= t).count()
}




// - Threshold table ------------------------------------------------------------------------------

/// Append-only store of threshold rows. Row `i` holds the cut points valid when exactly `i` weak
/// learners are in the ensemble; row 0 is the seeded, untrained state.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdTable {
    nthres: usize,
    values: Vec<NumT>,
}

impl ThresholdTable {
    pub fn new(nthres: usize) -> ThresholdTable {
        assert!(nthres > 0);
        ThresholdTable {
            nthres,
            values: Vec::new(),
        }
    }

    pub fn nthres(&self) -> usize { self.nthres }
    pub fn nrows(&self) -> usize { self.values.len() / self.nthres }
    pub fn is_empty(&self) -> bool { self.values.is_empty() }

    pub fn row(&self, iter: usize) -> &[NumT] {
        assert!(iter < self.nrows(), "threshold row {} not available", iter);
        let start = iter * self.nthres;
        &self.values[start..start + self.nthres]
    }

    pub fn last_row(&self) -> &[NumT] {
        assert!(!self.is_empty(), "threshold table not initialized");
        self.row(self.nrows() - 1)
    }

    /// Make room for `nrounds` more rows so that boosting does not reallocate.
    pub fn reserve_rounds(&mut self, nrounds: usize) {
        self.values.reserve(nrounds * self.nthres);
    }

    pub fn push_row(&mut self, row: &[NumT]) {
        assert_eq!(row.len(), self.nthres);
        self.values.extend_from_slice(row);
    }

    /// Overwrite the most recent row.
    pub fn replace_last_row(&mut self, row: &[NumT]) {
        assert_eq!(row.len(), self.nthres);
        assert!(!self.is_empty(), "threshold table not initialized");
        let start = self.values.len() - self.nthres;
        self.values[start..].copy_from_slice(row);
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn rows(&self) -> impl Iterator<Item = &[NumT]> {
        self.values.chunks(self.nthres)
    }
}




// - Optimizers -----------------------------------------------------------------------------------

/// Compute the threshold row (`n_rank - 1` values) for the given scores and 1-based ranks.
pub fn compute_thresholds(mode: ThresMode, scores: &[NumT], ranks: &[usize], n_rank: usize)
    -> Vec<NumT>
{
    let th = match mode {
        ThresMode::ExpLoss        => exploss_thresholds(scores, ranks, n_rank, false, false),
        ThresMode::ExpLossOrdered => exploss_thresholds(scores, ranks, n_rank, true, false),
        ThresMode::AbsLoss        => dploss_thresholds(scores, ranks, n_rank, true),
        ThresMode::ClaLoss        => dploss_thresholds(scores, ranks, n_rank, false),
    };
    th[1..n_rank].to_vec()
}

fn new_bounded_row(n_rank: usize) -> Vec<NumT> {
    assert!(n_rank >= 2);
    let mut th = vec![0.0; n_rank + 1];
    th[0] = THRES_MIN;
    th[n_rank] = THRES_MAX;
    th
}

/// `0.5 * ln(wn / wp)`, with 0/0 replaced by `next` and infinities clamped.
fn half_log_ratio(wn: NumT, wp: NumT, next: NumT) -> NumT {
    let t = 0.5 * (wn / wp).ln();
    if t.is_nan() {
        next
    } else if t.is_infinite() {
        t.signum() * THRES_MAX
    } else {
        t
    }
}

/// Exponential margin loss thresholds. Returns `n_rank + 1` values, index 0 and `n_rank` being
/// the sentinels; boundary `k` sits between rank `k` and rank `k + 1`.
///
/// `full` makes every sample below (above) boundary `k` contribute to it, instead of only the
/// samples of rank `k` (`k + 1`).
pub fn exploss_thresholds(scores: &[NumT], ranks: &[usize], n_rank: usize, ordered: bool,
                          full: bool) -> Vec<NumT>
{
    assert_eq!(scores.len(), ranks.len());
    let mut th = new_bounded_row(n_rank);
    let mut wp = vec![0.0; n_rank + 1];
    let mut wn = vec![0.0; n_rank + 1];

    for (&s, &o) in scores.iter().zip(ranks) {
        debug_assert!(o >= 1 && o <= n_rank);
        if full {
            for k in 1..o { wp[k] += (-s).exp(); }
            for k in o..n_rank { wn[k] += s.exp(); }
        } else {
            wp[o - 1] += (-s).exp();
            wn[o] += s.exp();
        }
    }

    for k in (1..n_rank).rev() {
        th[k] = half_log_ratio(wn[k], wp[k], th[k + 1]);

        if ordered && th[k] > th[k + 1] {
            // merge with the boundaries above until the block value fits under its successor
            let (mut wwn, mut wwp) = (wn[k], wp[k]);
            let mut kk = k + 1;
            while kk < n_rank {
                wwn += wn[kk];
                wwp += wp[kk];
                th[kk] = half_log_ratio(wwn, wwp, th[kk + 1]);
                if th[kk] <= th[kk + 1] { break; }
                kk += 1;
            }
            let kk = kk.min(n_rank - 1);
            let value = th[kk];
            for t in &mut th[k..kk] {
                *t = value;
            }
        }
    }

    th
}

/// Exact monotone assignment of ranks to score-sorted groups, minimizing the absolute rank error
/// (`do_abs`) or the number of misranked samples. Returns `n_rank + 1` values like
/// `exploss_thresholds`.
pub fn dploss_thresholds(scores: &[NumT], ranks: &[usize], n_rank: usize, do_abs: bool)
    -> Vec<NumT>
{
    assert_eq!(scores.len(), ranks.len());
    let mut th = new_bounded_row(n_rank);
    if scores.is_empty() { return th; }

    let groups = group_by_score(scores, ranks);
    let ngroups = groups.len();

    let loss = |group: &[usize], k: usize| -> NumT {
        group.iter()
            .filter(|&&r| r != k)
            .map(|&r| if do_abs { (r as NumT - k as NumT).abs() } else { 1.0 })
            .sum()
    };

    // cost[n][k-1]: best loss of groups 0..=n with group n at rank k
    // back[n][k-1]: rank of group n-1 on that best path
    let mut cost = vec![vec![0.0; n_rank]; ngroups];
    let mut back = vec![vec![0usize; n_rank]; ngroups];

    for k in 1..=n_rank {
        cost[0][k - 1] = loss(&groups[0].1, k);
    }
    for n in 1..ngroups {
        let mut best_loss = NumT::INFINITY;
        let mut best_rank = 0;
        for k in 1..=n_rank {
            if cost[n - 1][k - 1] < best_loss {
                best_loss = cost[n - 1][k - 1];
                best_rank = k;
            }
            cost[n][k - 1] = best_loss + loss(&groups[n].1, k);
            back[n][k - 1] = best_rank;
        }
    }

    let last = &cost[ngroups - 1];
    let mut rank = 1;
    for k in 1..=n_rank {
        if last[k - 1] < last[rank - 1] { rank = k; }
    }

    for t in &mut th[rank..n_rank] { *t = THRES_MAX; }
    for n in (1..ngroups).rev() {
        let prev = back[n][rank - 1];
        if prev != rank {
            let mid = 0.5 * groups[n].0 + 0.5 * groups[n - 1].0;
            for t in &mut th[prev..rank] { *t = mid; }
            rank = prev;
        }
    }
    for t in &mut th[1..rank] { *t = THRES_MIN; }

    th
}

/// Sort by score and collapse equal scores into one group holding the ranks of its members.
fn group_by_score(scores: &[NumT], ranks: &[usize]) -> Vec<(NumT, Vec<usize>)> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&i, &j| scores[i].partial_cmp(&scores[j]).unwrap_or(Ordering::Equal));

    let mut groups: Vec<(NumT, Vec<usize>)> = Vec::new();
    for i in order {
        match groups.last_mut() {
            Some(group) if group.0 == scores[i] => group.1.push(ranks[i]),
            _ => groups.push((scores[i], vec![ranks[i]])),
        }
    }
    groups
}
