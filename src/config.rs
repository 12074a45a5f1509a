/*
 * Copyright 2019 DTAI Research Group - KU Leuven.
 * License: Apache License 2.0
 * Author: Laurens Devos
*/

use std::str::FromStr;

use crate::NumT;
use crate::boost::RuleKind;
use crate::ensemble::InitMode;
use crate::learner::LearnerKind;
use crate::orboost::Form;
use crate::threshold::ThresMode;

pub struct Config {

    // Files
    pub train: String,
    pub test: String,
    pub model: String,
    pub output: String,

    // Dataset
    pub csv_has_header: bool,
    pub csv_delimiter: u8,

    /// Number of ordered ranks; 0 means "take the largest rank found in the training data".
    pub n_rank: usize,

    // Ensemble
    pub niterations: usize,
    pub iteration: usize,
    pub init_mode: InitMode,
    pub thres_mode: ThresMode,
    pub random_seed: u64,

    // Boosting rule
    pub rule: RuleKind,
    pub form: Form,
    pub ordered: bool,
    pub sub_iter: usize,
    pub reg_param: NumT,

    // Weak learner
    pub learner: LearnerKind,
    pub perceptron_max_run: usize,

    // Evaluation
    pub metrics: Vec<String>,
    pub metric_frequency: usize,
}

impl Config {
    pub fn new() -> Config {
        Config {
            train: String::new(),
            test: String::new(),
            model: String::new(),
            output: String::new(),

            csv_has_header: false,
            csv_delimiter: b' ',

            n_rank: 0,

            niterations: 100,
            iteration: usize::MAX,
            init_mode: InitMode::Zero,
            thres_mode: ThresMode::AbsLoss,
            random_seed: 1,

            rule: RuleKind::RankBoost,
            form: Form::Lr,
            ordered: true,
            sub_iter: 1,
            reg_param: 0.0,

            learner: LearnerKind::Stump,
            perceptron_max_run: 200,

            metrics: vec![String::from("absolute_error"), String::from("classification_error")],
            metric_frequency: 0,
        }
    }

    /// Parse `key=value` pairs on top of the defaults.
    pub fn parse<'a, I>(args: I) -> Result<Config, String>
    where I: Iterator<Item = &'a str>
    {
        let mut config = Config::new();
        for arg in args {
            let mut split = arg.splitn(2, '=');
            let key = split.next().unwrap_or("").trim();
            let value = split.next()
                .ok_or(format!("expected key=value, got '{}'", arg))?
                .trim();
            config.set(key, value)?;
        }
        Ok(config)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "train"              => self.train = value.to_string(),
            "test"               => self.test = value.to_string(),
            "model"              => self.model = value.to_string(),
            "output"             => self.output = value.to_string(),
            "csv_has_header"     => self.csv_has_header = parse_value(key, value)?,
            "csv_delimiter"      => self.csv_delimiter = parse_delimiter(value)?,
            "n_rank"             => self.n_rank = parse_value(key, value)?,
            "niterations"        => self.niterations = parse_value(key, value)?,
            "iteration"          => self.iteration = parse_value(key, value)?,
            "init_mode"          => self.init_mode = parse_value(key, value)?,
            "thres_mode"         => self.thres_mode = parse_value(key, value)?,
            "random_seed"        => self.random_seed = parse_value(key, value)?,
            "rule"               => self.rule = parse_value(key, value)?,
            "form"               => self.form = parse_value(key, value)?,
            "ordered"            => self.ordered = parse_value(key, value)?,
            "sub_iter"           => self.sub_iter = parse_value(key, value)?,
            "reg_param"          => self.reg_param = parse_value(key, value)?,
            "learner"            => self.learner = parse_value(key, value)?,
            "perceptron_max_run" => self.perceptron_max_run = parse_value(key, value)?,
            "metric_frequency"   => self.metric_frequency = parse_value(key, value)?,
            "metrics" => {
                self.metrics = value.split(',')
                    .map(|m| m.trim())
                    .filter(|m| !m.is_empty())
                    .map(|m| m.to_string())
                    .collect();
            },
            "bag"  => self.apply_bag_code(parse_value(key, value)?)?,
            "base" => self.apply_base_code(parse_value(key, value)?)?,
            _ => return Err(format!("unknown config key '{}'", key)),
        }
        Ok(())
    }

    /// Ensemble selector codes of the classic `boostrank-train` driver.
    pub fn apply_bag_code(&mut self, bag: u32) -> Result<(), String> {
        match bag / 10 {
            1 => {
                self.rule = RuleKind::RankBoost;
                self.thres_mode = ThresMode::ClaLoss;
            },
            2 => {
                self.rule = RuleKind::RankBoost;
                self.thres_mode = ThresMode::AbsLoss;
            },
            3 | 4 => {
                self.rule = RuleKind::OrBoost;
                self.form = if bag / 10 == 3 { Form::Lr } else { Form::Full };
                self.ordered = true;
                self.sub_iter = 1;
            },
            _ => return Err(format!("{} is not a valid bag code", bag)),
        }
        self.reg_param = match bag % 10 {
            0 => 0.0,
            1 => 1e-32,
            _ => return Err(format!("{} is not a valid bag code", bag)),
        };
        Ok(())
    }

    /// Weak learner selector codes of the classic `boostrank-train` driver.
    pub fn apply_base_code(&mut self, base: u32) -> Result<(), String> {
        match base {
            100 => self.learner = LearnerKind::Stump,
            200 => {
                self.learner = LearnerKind::Perceptron;
                self.perceptron_max_run = 200;
            },
            _ => return Err(format!("{} is not a valid base learner code", base)),
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Config { Config::new() }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, String> {
    value.parse::<T>().map_err(|_| format!("invalid value '{}' for '{}'", value, key))
}

fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "space" | " " => Ok(b' '),
        "tab" | "\\t" => Ok(b'\t'),
        "comma"       => Ok(b','),
        _ if value.len() == 1 => Ok(value.as_bytes()[0]),
        _ => Err(format!("invalid csv delimiter '{}'", value)),
    }
}
