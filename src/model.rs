/*
 * Copyright 2019 DTAI Research Group - KU Leuven.
 * License: Apache License 2.0
 * Author: Laurens Devos
*/

use std::fs::File;
use std::io::{Read, Write, BufWriter};
use std::path::Path;
use std::str::{FromStr, SplitWhitespace};

use flate2::Compression;
use flate2::write::GzEncoder;
use rand::rngs::SmallRng;

use crate::NumT;
use crate::boost::{BoostingRule, Booster, RuleKind};
use crate::config::Config;
use crate::data::{Data, open_reader};
use crate::ensemble::{Ensemble, Prediction};
use crate::metric::Metric;

/// Tag that stands for "no particular type".
pub const WILDCARD_TAG: &str = "*";

/// Whitespace separated tokens of a persisted model.
pub struct Tokens<'a> {
    iter: SplitWhitespace<'a>,
}

impl <'a> Tokens<'a> {
    pub fn new(text: &'a str) -> Tokens<'a> {
        Tokens { iter: text.split_whitespace() }
    }

    pub fn next_token(&mut self, what: &str) -> Result<&'a str, String> {
        self.iter.next().ok_or(format!("unexpected end of model, expected {}", what))
    }

    pub fn next_value<T: FromStr>(&mut self, what: &str) -> Result<T, String> {
        let token = self.next_token(what)?;
        token.parse::<T>().map_err(|_| format!("invalid {} '{}'", what, token))
    }

    /// A `# <tag> v1` line; returns the tag.
    pub fn tag(&mut self) -> Result<String, String> {
        let hash = self.next_token("type tag")?;
        if hash != "#" {
            return Err(format!("expected type tag, got '{}'", hash));
        }
        let tag = self.next_token("type tag")?.to_string();
        match self.next_token("version")? {
            "v1" => Ok(tag),
            v => Err(format!("unsupported version '{}' for '{}'", v, tag)),
        }
    }
}

/// Shortest text that parses back to the same value; exponent notation for extreme magnitudes.
pub fn fmt_num(v: NumT) -> String {
    let a = v.abs();
    if a != 0.0 && (a >= 1e16 || a < 1e-5) {
        format!("{:e}", v)
    } else {
        format!("{}", v)
    }
}




/// A boosting rule together with the ensemble it trains.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    rule: BoostingRule,
    ensemble: Ensemble,
}

impl Model {
    pub fn new(rule: BoostingRule, ensemble: Ensemble) -> Model {
        Model { rule, ensemble }
    }

    pub fn from_config(config: &Config, n_rank: usize, nfeatures: usize) -> Model {
        Model {
            rule: BoostingRule::from_config(config),
            ensemble: Ensemble::from_config(config, n_rank, nfeatures),
        }
    }

    pub fn rule(&self) -> &BoostingRule { &self.rule }
    pub fn rule_mut(&mut self) -> &mut BoostingRule { &mut self.rule }
    pub fn ensemble(&self) -> &Ensemble { &self.ensemble }
    pub fn ensemble_mut(&mut self) -> &mut Ensemble { &mut self.ensemble }
    pub fn n_rank(&self) -> usize { self.ensemble.n_rank() }
    pub fn n_in_agg(&self) -> usize { self.ensemble.n_in_agg() }

    pub fn reset(&mut self, rng: &mut SmallRng) {
        self.ensemble.reset(rng);
    }

    /// Run `config.niterations` boosting rounds on `data`; returns the number of rounds done.
    pub fn train(&mut self, config: &Config, data: &Data, metrics: &[Box<dyn Metric>],
                 rng: &mut SmallRng) -> usize
    {
        if !self.ensemble.is_ready() {
            self.ensemble.reset(rng);
        }
        let mut booster = Booster::new(&self.rule, data, config.niterations);
        booster.set_metrics(metrics, config.metric_frequency);
        booster.train(&mut self.ensemble, rng)
    }

    pub fn predict(&self, x: &[NumT], iter: usize) -> Prediction {
        self.ensemble.predict(x, iter)
    }

    pub fn predict_data(&self, data: &Data, iter: usize) -> Vec<Prediction> {
        self.ensemble.predict_data(data, iter)
    }

    pub fn write<W: Write>(&self, out: &mut W) -> Result<(), String> {
        writeln!(out, "# {} v1", self.rule.name())
            .map_err(|err| format!("write error: {}", err))?;
        self.ensemble.write(out)
    }

    /// Decode a model of either rule from its type tag.
    pub fn read(text: &str) -> Result<Model, String> {
        let mut tokens = Tokens::new(text);
        let tag = tokens.tag()?;
        let kind = match tag.as_str() {
            WILDCARD_TAG => return Err(String::from("model has no type tag, rule unknown")),
            tag => tag.parse::<RuleKind>()?,
        };
        let ensemble = Ensemble::read(&mut tokens)?;
        Ok(Model { rule: BoostingRule::new(kind), ensemble })
    }

    /// Decode a model that must be of rule `kind`, or carry the wildcard tag.
    pub fn read_as(kind: RuleKind, text: &str) -> Result<Model, String> {
        let mut tokens = Tokens::new(text);
        let tag = tokens.tag()?;
        if tag != kind.tag() && tag != WILDCARD_TAG {
            return Err(format!("model type '{}' does not match '{}'", tag, kind.tag()));
        }
        let ensemble = Ensemble::read(&mut tokens)?;
        Ok(Model { rule: BoostingRule::new(kind), ensemble })
    }

    /// Save to `path`; gzip compressed when the name ends in `.gz`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), String> {
        let path = path.as_ref();
        let file = File::create(path)
            .map_err(|err| format!("path error '{}': {}", path.display(), err))?;
        let mut out = BufWriter::new(file);
        if path.extension().map_or(false, |ext| ext == "gz") {
            let mut gz = GzEncoder::new(out, Compression::default());
            self.write(&mut gz)?;
            gz.finish()
                .and_then(|mut w| w.flush())
                .map_err(|err| format!("gzip error: {}", err))
        } else {
            self.write(&mut out)?;
            out.flush().map_err(|err| format!("write error: {}", err))
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Model, String> {
        let mut text = String::new();
        open_reader(path)?
            .read_to_string(&mut text)
            .map_err(|err| format!("read_to_string err: {}", err))?;
        Model::read(&text)
    }
}
