//! The CPU-bound job the worker pool hands out.
//!
//! A linear classifier trained with stochastic gradient descent (hinge loss,
//! L2 penalty, decaying step size) on a fixed synthetic two-class dataset of
//! the same shape as the classic breast-cancer set: 569 samples, 30 features.

use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

pub const SAMPLES: usize = 569;
pub const FEATURES: usize = 30;
const DATASET_SEED: u64 = 569;

const ALPHA: f64 = 1e-4;
const ETA0: f64 = 0.01;
const TOL: f64 = 1e-3;
const NO_CHANGE_EPOCHS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainJob {
    pub max_iter: u32,
    /// Sleep after training, so the pool has something to overlap.
    pub pause_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainReport {
    pub max_iter: u32,
    /// Epochs actually run before the loss stopped improving.
    pub epochs: u32,
    pub accuracy: f64,
}

pub struct Dataset {
    pub features: Vec<[f64; FEATURES]>,
    pub labels: Vec<bool>,
}

/// Two overlapping clouds, about 63% positive.
pub fn synthetic_dataset() -> Dataset {
    let mut rng = StdRng::seed_from_u64(DATASET_SEED);
    let mut features = Vec::with_capacity(SAMPLES);
    let mut labels = Vec::with_capacity(SAMPLES);
    for _ in 0..SAMPLES {
        let positive = rng.random_bool(0.63);
        let center = if positive { 0.35 } else { -0.35 };
        let mut x = [0.0; FEATURES];
        for (j, value) in x.iter_mut().enumerate() {
            // later features carry less signal
            let signal = center / (1.0 + j as f64 / 10.0);
            *value = signal + rng.random_range(-1.0..1.0);
        }
        features.push(x);
        labels.push(positive);
    }
    Dataset { features, labels }
}

#[derive(Debug, Clone)]
pub struct LinearModel {
    weights: [f64; FEATURES],
    bias: f64,
}

impl LinearModel {
    fn decision(&self, x: &[f64; FEATURES]) -> f64 {
        self.weights.iter().zip(x).map(|(w, x)| w * x).sum::<f64>() + self.bias
    }

    pub fn predict(&self, x: &[f64; FEATURES]) -> bool {
        self.decision(x) > 0.0
    }

    pub fn accuracy(&self, data: &Dataset) -> f64 {
        let correct = data
            .features
            .iter()
            .zip(&data.labels)
            .filter(|(x, label)| self.predict(x) == **label)
            .count();
        correct as f64 / data.labels.len() as f64
    }
}

/// Fit for at most `max_iter` epochs; returns the model and epochs run.
pub fn fit(data: &Dataset, max_iter: u32, seed: u64) -> (LinearModel, u32) {
    let mut model = LinearModel {
        weights: [0.0; FEATURES],
        bias: 0.0,
    };
    let mut rng = StdRng::seed_from_u64(seed);
    let mut order: Vec<usize> = (0..data.labels.len()).collect();
    let t0 = 1.0 / (ALPHA * ETA0);
    let mut t = 0.0;
    let mut best_loss = f64::INFINITY;
    let mut stale = 0;
    let mut epochs = 0;

    while epochs < max_iter {
        epochs += 1;
        order.shuffle(&mut rng);
        let mut loss = 0.0;
        for &i in &order {
            let x = &data.features[i];
            let y = if data.labels[i] { 1.0 } else { -1.0 };
            let eta = 1.0 / (ALPHA * (t0 + t));
            t += 1.0;

            let margin = y * model.decision(x);
            for w in &mut model.weights {
                *w *= 1.0 - eta * ALPHA;
            }
            if margin < 1.0 {
                loss += 1.0 - margin;
                for (w, xi) in model.weights.iter_mut().zip(x) {
                    *w += eta * y * xi;
                }
                model.bias += eta * y;
            }
        }

        if loss > best_loss - TOL * order.len() as f64 {
            stale += 1;
            if stale >= NO_CHANGE_EPOCHS {
                break;
            }
        } else {
            stale = 0;
        }
        best_loss = best_loss.min(loss);
    }
    (model, epochs)
}

pub fn train_model(job: &TrainJob) -> TrainReport {
    let data = synthetic_dataset();
    let (model, epochs) = fit(&data, job.max_iter, u64::from(job.max_iter));
    let report = TrainReport {
        max_iter: job.max_iter,
        epochs,
        accuracy: model.accuracy(&data),
    };
    thread::sleep(Duration::from_millis(job.pause_ms));
    report
}
