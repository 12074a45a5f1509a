/*
 * Copyright 2019 DTAI Research Group - KU Leuven.
 * License: Apache License 2.0
 * Author: Laurens Devos
*/

use std::env;
use std::process;

use log::{info, error};
use rand::SeedableRng;
use rand::rngs::SmallRng;

use ordensemble::config::Config;
use ordensemble::data::Data;
use ordensemble::ensemble::Prediction;
use ordensemble::metric::{Metric, metrics_from_names};
use ordensemble::model::Model;

enum Failure {
    Usage(String),
    Io(String),
}

pub fn main() {
    pretty_env_logger::init();

    let args: Vec<String> = env::args().collect();
    match train(&args[1..]) {
        Ok(_) => info!("Done"),
        Err(Failure::Usage(msg)) => {
            error!("Failure: {}", msg);
            eprintln!("usage: {} train=<file> [n_rank=<k>] [niterations=<n>] [rule=rankboost|orboost] \
                       [learner=stump|perceptron] [model=<file>] [key=value ...]", args[0]);
            process::exit(1);
        },
        Err(Failure::Io(msg)) => {
            error!("Failure: {}", msg);
            process::exit(2);
        },
    }
}

fn load_data(config: &Config) -> Result<(Data, Option<Data>), String> {
    let train_data = Data::from_csv_path(&config, config.train.as_str())?;
    let test_data = if !config.test.is_empty() {
        Some(Data::from_csv_path(&config, config.test.as_str())?)
    } else { None };

    Ok((train_data, test_data))
}

fn train(args: &[String]) -> Result<(), Failure> {
    let config = Config::parse(args.iter().map(|x| x.as_str())).map_err(Failure::Usage)?;
    if config.train.is_empty() {
        return Err(Failure::Usage(String::from("no training data given")));
    }
    let ms = metrics_from_names(&config.metrics)
        .ok_or(Failure::Usage(String::from("unknown metric")))?;
    let (train_data, test_data) = load_data(&config).map_err(Failure::Io)?;

    let n_rank = if config.n_rank > 0 { config.n_rank } else { train_data.max_rank() };
    if n_rank < 2 {
        return Err(Failure::Usage(format!("need at least 2 ranks, got {}", n_rank)));
    }
    if let Some(ref test_data) = test_data {
        if test_data.nfeatures() != train_data.nfeatures() {
            return Err(Failure::Usage(format!("test data has {} features, train data {}",
                                              test_data.nfeatures(), train_data.nfeatures())));
        }
        if test_data.max_rank() > n_rank {
            return Err(Failure::Usage(format!("test rank {} exceeds n_rank={}",
                                              test_data.max_rank(), n_rank)));
        }
    }

    let mut rng = SmallRng::seed_from_u64(config.random_seed);
    let mut model = Model::from_config(&config, n_rank, train_data.nfeatures());
    model.reset(&mut rng);
    let nrounds = model.train(&config, &train_data, &ms, &mut rng);
    info!("trained {} rounds", nrounds);

    summary(&model, &train_data, test_data.as_ref(), &ms);

    if !config.model.is_empty() {
        model.save(&config.model).map_err(Failure::Io)?;
        info!("model written to '{}'", config.model);
    }

    Ok(())
}

fn summary(model: &Model, train: &Data, test: Option<&Data>, ms: &[Box<dyn Metric>]) {
    let train_pred: Vec<Prediction> = model.predict_data(train, usize::MAX);
    let test_pred = test.map(|test| (test, model.predict_data(test, usize::MAX)));

    println!();
    println!(" | Rule: {}, learner: {}", model.rule().name(), model.ensemble().base().name());
    println!(" | Ranks: {}, ensemble size: {}", model.n_rank(), model.n_in_agg());

    for m in ms {
        let train_eval = m.eval(train.ranks(), &train_pred);
        let test_eval = match test_pred {
            Some((test_data, ref test_pred)) => {
                let test_eval = m.eval(test_data.ranks(), test_pred);
                format!(",     test {:10.5}", test_eval)
            },
            None => "".to_string(),
        };
        println!(" | Eval {:24} train {:10.5}{}", m.name(), train_eval, test_eval);
    }
}
