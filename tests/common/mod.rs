#![allow(dead_code)]

use anyhow::Result;
use machine_teacher::clock::{Clock, ManualClock};
use machine_teacher::config::Params;
use machine_teacher::dataset::Dataset;
use machine_teacher::learners::{Learner, NearestNeighborLearner};
use ndarray::{Array1, Array2};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Two alternating classes, separated by the second feature; the first
/// feature only makes rows distinct.
pub fn separable(m: usize) -> Dataset {
    let y: Vec<usize> = (0..m).map(|i| i % 2).collect();
    let x = Array2::from_shape_fn((m, 2), |(i, j)| {
        if j == 0 {
            i as f32 * 0.01
        } else {
            y[i] as f32 * 10.0
        }
    });
    Dataset::new("separable", x, Array1::from_vec(y)).unwrap()
}

/// First half class 0, second half class 1, on a single feature.
pub fn halves(m: usize) -> Dataset {
    let y: Vec<usize> = (0..m).map(|i| usize::from(i >= m / 2)).collect();
    let x = Array2::from_shape_fn((m, 1), |(i, _)| i as f32);
    Dataset::new("halves", x, Array1::from_vec(y)).unwrap()
}

/// Classes alternating in blocks of ten rows along one feature, which a
/// single centroid per class cannot separate.
pub fn blocks(m: usize) -> Dataset {
    let y: Vec<usize> = (0..m).map(|i| (i / 10) % 2).collect();
    let x = Array2::from_shape_fn((m, 1), |(i, _)| i as f32);
    Dataset::new("blocks", x, Array1::from_vec(y)).unwrap()
}

pub fn assert_unique_in_range(ids: &[usize], m: usize) {
    let mut sorted = ids.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), ids.len(), "duplicate training ids");
    assert!(ids.iter().all(|&id| id < m), "training id out of range");
}

/// A 1-NN learner whose `fit` costs `cost` seconds on a manual clock.
#[derive(Clone)]
pub struct SlowLearner {
    inner: NearestNeighborLearner,
    clock: ManualClock,
    cost: f64,
}

impl SlowLearner {
    pub fn new(clock: ManualClock, cost: f64) -> Self {
        SlowLearner {
            inner: NearestNeighborLearner::new(),
            clock,
            cost,
        }
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }
}

impl Learner for SlowLearner {
    fn name(&self) -> &str {
        "SlowLearner"
    }

    fn fit(&mut self, x: &Array2<f32>, y: &Array1<usize>) -> Result<()> {
        self.clock.advance(self.cost);
        self.inner.fit(x, y)
    }

    fn predict(&self, x: &Array2<f32>) -> Result<Array1<usize>> {
        self.inner.predict(x)
    }

    fn get_params(&self) -> Params {
        self.inner.get_params()
    }

    fn box_clone(&self) -> Box<dyn Learner> {
        Box::new(self.clone())
    }
}
