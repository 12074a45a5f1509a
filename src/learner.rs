/*
 * Copyright 2019 DTAI Research Group - KU Leuven.
 * License: Apache License 2.0
 * Author: Laurens Devos
*/

use std::io::Write;
use std::str::FromStr;

use rand::rngs::SmallRng;

use crate::NumT;
use crate::config::Config;
use crate::data::Data;
use crate::model::Tokens;
use crate::perceptron::Perceptron;
use crate::stump::Stump;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnerKind {
    Stump,
    Perceptron,
}

impl FromStr for LearnerKind {
    type Err = String;
    fn from_str(s: &str) -> Result<LearnerKind, String> {
        match s.to_lowercase().as_str() {
            "stump" => Ok(LearnerKind::Stump),
            "perceptron" | "perc" => Ok(LearnerKind::Perceptron),
            _ => Err(format!("unknown weak learner '{}'", s)),
        }
    }
}

/// A weighted, binary labeled view on a ranked data set. Labels are +1 or -1.
pub struct BinaryData<'a> {
    data: &'a Data,
    labels: Vec<NumT>,
    weights: Vec<NumT>,
}

impl <'a> BinaryData<'a> {
    pub fn new(data: &'a Data, labels: Vec<NumT>, weights: Vec<NumT>) -> BinaryData<'a> {
        assert_eq!(labels.len(), data.nexamples());
        assert_eq!(weights.len(), data.nexamples());
        debug_assert!(labels.iter().all(|&y| y == 1.0 || y == -1.0));
        BinaryData { data, labels, weights }
    }

    /// The label of an example is +1 if its positive-supporting weight is at least its
    /// negative-supporting weight; its weight is `|pos - neg| / normalizer`.
    pub fn from_sample_weights(data: &'a Data, pos: &[NumT], neg: &[NumT], normalizer: NumT)
        -> BinaryData<'a>
    {
        assert_eq!(pos.len(), data.nexamples());
        assert_eq!(neg.len(), data.nexamples());
        let labels = pos.iter().zip(neg)
            .map(|(&p, &n)| if p >= n { 1.0 } else { -1.0 })
            .collect();
        let weights = pos.iter().zip(neg)
            .map(|(&p, &n)| if normalizer > 0.0 { (p - n).abs() / normalizer } else { 0.0 })
            .collect();
        BinaryData { data, labels, weights }
    }

    pub fn data(&self) -> &Data { self.data }
    pub fn nexamples(&self) -> usize { self.data.nexamples() }
    pub fn nfeatures(&self) -> usize { self.data.nfeatures() }
    pub fn labels(&self) -> &[NumT] { &self.labels }
    pub fn weights(&self) -> &[NumT] { &self.weights }

    /// `label * weight` per example.
    pub fn signed_weights(&self) -> Vec<NumT> {
        self.labels.iter().zip(&self.weights).map(|(&y, &w)| y * w).collect()
    }
}




/// The closed set of binary base learners an ensemble can hold.
///
/// Every learner outputs exactly -1.0 or +1.0. The ensemble relies on this when it rebuilds
/// training scores from the signs of the learner outputs.
#[derive(Debug, Clone, PartialEq)]
pub enum WeakLearner {
    Stump(Stump),
    Perceptron(Perceptron),
}

impl WeakLearner {
    pub fn new(kind: LearnerKind, nfeatures: usize) -> WeakLearner {
        match kind {
            LearnerKind::Stump => WeakLearner::Stump(Stump::new(nfeatures)),
            LearnerKind::Perceptron => WeakLearner::Perceptron(Perceptron::new(nfeatures)),
        }
    }

    pub fn from_config(config: &Config, nfeatures: usize) -> WeakLearner {
        let mut learner = WeakLearner::new(config.learner, nfeatures);
        if let WeakLearner::Perceptron(ref mut p) = learner {
            p.set_max_run(config.perceptron_max_run);
        }
        learner
    }

    pub fn kind(&self) -> LearnerKind {
        match self {
            WeakLearner::Stump(_) => LearnerKind::Stump,
            WeakLearner::Perceptron(_) => LearnerKind::Perceptron,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WeakLearner::Stump(_) => "stump",
            WeakLearner::Perceptron(_) => "perceptron",
        }
    }

    pub fn nfeatures(&self) -> usize {
        match self {
            WeakLearner::Stump(s) => s.nfeatures(),
            WeakLearner::Perceptron(p) => p.nfeatures(),
        }
    }

    pub fn train(&mut self, data: &BinaryData, rng: &mut SmallRng) {
        assert_eq!(data.nfeatures(), self.nfeatures());
        match self {
            WeakLearner::Stump(s) => s.train(data),
            WeakLearner::Perceptron(p) => p.train(data, rng),
        }
    }

    pub fn predict(&self, x: &[NumT]) -> NumT {
        match self {
            WeakLearner::Stump(s) => s.predict(x),
            WeakLearner::Perceptron(p) => p.predict(x),
        }
    }

    /// The outputs on every example of `data`, computed once per round and reused.
    pub fn outputs(&self, data: &Data) -> Vec<NumT> {
        (0..data.nexamples()).map(|i| self.predict(data.example(i))).collect()
    }

    pub fn write<W: Write>(&self, out: &mut W) -> Result<(), String> {
        let res = match self {
            WeakLearner::Stump(s) => {
                writeln!(out, "# stump v1")
                    .and_then(|_| writeln!(out, "{} {} {}", s.feat_id(), s.threshold(),
                                           if s.positive() { 'P' } else { 'N' }))
            },
            WeakLearner::Perceptron(p) => {
                writeln!(out, "# perceptron v1").and_then(|_| {
                    let ws: Vec<String> = p.weights().iter().map(|w| w.to_string()).collect();
                    writeln!(out, "{}", ws.join(" "))
                })
            },
        };
        res.map_err(|err| format!("write error: {}", err))
    }

    pub fn read(tokens: &mut Tokens, nfeatures: usize) -> Result<WeakLearner, String> {
        let tag = tokens.tag()?;
        match tag.as_str() {
            "stump" => {
                let feat_id: usize = tokens.next_value("stump feature")?;
                let threshold: NumT = tokens.next_value("stump threshold")?;
                let positive = match tokens.next_token("stump direction")? {
                    "P" => true,
                    "N" => false,
                    d => return Err(format!("invalid stump direction '{}'", d)),
                };
                if feat_id >= nfeatures {
                    return Err(format!("stump feature {} out of range", feat_id));
                }
                Ok(WeakLearner::Stump(Stump::from_parts(nfeatures, feat_id, threshold, positive)))
            },
            "perceptron" => {
                let nweights = nfeatures.checked_add(1)
                    .ok_or(format!("invalid number of features {}", nfeatures))?;
                let mut weights: Vec<NumT> = Vec::new();
                for _ in 0..nweights {
                    weights.push(tokens.next_value("perceptron weight")?);
                }
                Ok(WeakLearner::Perceptron(Perceptron::from_weights(weights)))
            },
            _ => Err(format!("unknown weak learner type '{}'", tag)),
        }
    }
}






#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn binary_view_from_sample_weights() {
        let data = Data::from_rows(&[vec![0.0], vec![1.0], vec![2.0]], &[1, 2, 2]);
        let bd = BinaryData::from_sample_weights(&data, &[0.0, 2.0, 1.0], &[1.0, 1.0, 1.0], 2.0);
        assert_eq!(bd.labels(), &[-1.0, 1.0, 1.0]);
        assert_eq!(bd.weights(), &[0.5, 0.5, 0.0]);
        assert_eq!(bd.signed_weights(), vec![-0.5, 0.5, 0.0]);

        let bd = BinaryData::from_sample_weights(&data, &[1.0; 3], &[1.0; 3], 0.0);
        assert_eq!(bd.weights(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn write_read_learners() {
        let learners = vec![
            WeakLearner::Stump(Stump::from_parts(3, 2, -0.25, false)),
            WeakLearner::Perceptron(Perceptron::from_weights(vec![0.5, -1.0, 2.0, 0.125])),
        ];
        for learner in learners {
            let mut buf = Vec::new();
            learner.write(&mut buf).unwrap();
            let text = String::from_utf8(buf).unwrap();
            let mut tokens = Tokens::new(&text);
            assert_eq!(WeakLearner::read(&mut tokens, 3).unwrap(), learner);
        }
    }

    #[test]
    fn read_rejects_garbage() {
        let mut tokens = Tokens::new("# stump v1\n5 0.0 P\n");
        assert!(WeakLearner::read(&mut tokens, 3).is_err());
        let mut tokens = Tokens::new("# stump v1\n0 0.0 X\n");
        assert!(WeakLearner::read(&mut tokens, 3).is_err());
        let mut tokens = Tokens::new("# tree v1\n");
        assert!(WeakLearner::read(&mut tokens, 3).is_err());
        let mut tokens = Tokens::new("# perceptron v1\n1.0 2.0\n");
        assert!(WeakLearner::read(&mut tokens, 3).is_err());
    }
}
