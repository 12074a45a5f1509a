/*
 * Copyright 2019 DTAI Research Group - KU Leuven.
 * License: Apache License 2.0
 * Author: Laurens Devos
*/

use std::env;
use std::fs::File;
use std::io::{Write, BufWriter};
use std::process;

use log::{info, error};

use ordensemble::config::Config;
use ordensemble::data::Data;
use ordensemble::ensemble::Prediction;
use ordensemble::metric::metrics_from_names;
use ordensemble::model::{Model, fmt_num};

const METRICS: [&str; 4] = ["absolute_error", "classification_error", "raw_ranking_loss",
                            "thresholded_ranking_loss"];

enum Failure {
    Usage(String),
    Io(String),
}

pub fn main() {
    pretty_env_logger::init();

    let args: Vec<String> = env::args().collect();
    match predict(&args[1..]) {
        Ok(_) => info!("Done"),
        Err(Failure::Usage(msg)) => {
            error!("Failure: {}", msg);
            eprintln!("usage: {} model=<file> test=<file> [iteration=<n>] [output=<file>] \
                       [key=value ...]", args[0]);
            process::exit(1);
        },
        Err(Failure::Io(msg)) => {
            error!("Failure: {}", msg);
            process::exit(2);
        },
    }
}

fn predict(args: &[String]) -> Result<(), Failure> {
    let config = Config::parse(args.iter().map(|x| x.as_str())).map_err(Failure::Usage)?;
    if config.model.is_empty() || config.test.is_empty() {
        return Err(Failure::Usage(String::from("need both a model and test data")));
    }

    let model = Model::load(&config.model).map_err(Failure::Io)?;
    let data = Data::from_csv_path(&config, config.test.as_str()).map_err(Failure::Io)?;
    if data.nfeatures() != model.ensemble().nfeatures() {
        return Err(Failure::Usage(format!("data has {} features, model expects {}",
                                          data.nfeatures(), model.ensemble().nfeatures())));
    }
    if data.max_rank() > model.n_rank() {
        return Err(Failure::Usage(format!("rank {} exceeds the model's n_rank={}",
                                          data.max_rank(), model.n_rank())));
    }

    let iter = config.iteration.min(model.n_in_agg());
    info!("{} model, {} of {} learners, {} examples", model.rule().name(), iter,
          model.n_in_agg(), data.nexamples());
    let preds = model.predict_data(&data, iter);

    if !config.output.is_empty() {
        write_predictions(&config.output, &preds).map_err(Failure::Io)?;
        info!("predictions written to '{}'", config.output);
    }

    let names: Vec<String> = METRICS.iter().map(|m| m.to_string()).collect();
    let ms = metrics_from_names(&names)
        .ok_or(Failure::Usage(String::from("unknown metric")))?;
    println!();
    for m in &ms {
        println!(" | Eval {:24} {:10.5}", m.name(), m.eval(data.ranks(), &preds));
    }

    Ok(())
}

fn write_predictions(path: &str, preds: &[Prediction]) -> Result<(), String> {
    let file = File::create(path).map_err(|err| format!("path error '{}': {}", path, err))?;
    let mut out = BufWriter::new(file);
    for p in preds {
        writeln!(out, "{} {}", p.rank, fmt_num(p.score))
            .map_err(|err| format!("write error: {}", err))?;
    }
    out.flush().map_err(|err| format!("write error: {}", err))
}
