use anyhow::{bail, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::config::Params;
use crate::error::TeachingError;
use crate::learners::Learner;

/// 1-nearest-neighbour memoriser: a row is labeled like the closest fitted
/// row (squared Euclidean distance, first fitted row wins ties).
///
/// Training accuracy is 1 whenever the fitted rows are distinct, which makes
/// it a convenient reference learner for the protocol.
#[derive(Debug, Clone, Default)]
pub struct NearestNeighborLearner {
    x: Option<Array2<f32>>,
    y: Array1<usize>,
}

impl NearestNeighborLearner {
    pub fn new() -> Self {
        Self::default()
    }

    fn closest(x: &Array2<f32>, y: &Array1<usize>, row: ArrayView1<f32>) -> usize {
        let mut best = (f32::INFINITY, 0usize);
        for (candidate, &label) in x.axis_iter(Axis(0)).zip(y.iter()) {
            let d: f32 = row
                .iter()
                .zip(candidate.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            if d < best.0 {
                best = (d, label);
            }
        }
        best.1
    }
}

impl Learner for NearestNeighborLearner {
    fn name(&self) -> &str {
        "NearestNeighborLearner"
    }

    fn start(&mut self) -> Result<()> {
        self.x = None;
        self.y = Array1::from_vec(Vec::new());
        Ok(())
    }

    fn fit(&mut self, x: &Array2<f32>, y: &Array1<usize>) -> Result<()> {
        if x.nrows() == 0 {
            bail!("NearestNeighborLearner cannot be fitted on an empty training set");
        }
        self.x = Some(x.clone());
        self.y = y.clone();
        Ok(())
    }

    fn predict(&self, x: &Array2<f32>) -> Result<Array1<usize>> {
        let fitted = match &self.x {
            Some(fitted) => fitted,
            None => return Err(TeachingError::NotFitted(self.name().to_string()).into()),
        };
        Ok(x
            .axis_iter(Axis(0))
            .map(|row| Self::closest(fitted, &self.y, row))
            .collect())
    }

    fn get_params(&self) -> Params {
        let mut params = Params::new();
        params.insert("n_neighbors".to_string(), serde_json::json!(1));
        params
    }

    fn box_clone(&self) -> Box<dyn Learner> {
        Box::new(self.clone())
    }
}
