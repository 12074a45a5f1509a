/*
 * Copyright 2019 DTAI Research Group - KU Leuven.
 * License: Apache License 2.0
 * Author: Laurens Devos
*/

extern crate rand;
extern crate csv;
extern crate flate2;

#[macro_use]
extern crate log;

pub type NumT = f64;

/// Largest representable threshold. Boundaries that no optimal cut crosses are set to
/// `THRES_MAX` / `THRES_MIN`, and infinite weights are clamped to it.
pub const THRES_MAX: NumT = NumT::MAX;
pub const THRES_MIN: NumT = -NumT::MAX;
pub const EPSILON: NumT = 1e-10;

pub mod config;
pub mod data;
pub mod threshold;
pub mod learner;
pub mod stump;
pub mod perceptron;
pub mod ensemble;
pub mod boost;
pub mod rankboost;
pub mod orboost;
pub mod metric;
pub mod model;
