use anyhow::{bail, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::config::Params;
use crate::error::TeachingError;
use crate::learners::Learner;

/// Assigns each row to the class whose feature mean is closest
/// (squared Euclidean distance). Ties go to the lowest class id.
#[derive(Debug, Clone, Default)]
pub struct NearestCentroidLearner {
    centroids: Vec<(usize, Array1<f32>)>,
}

impl NearestCentroidLearner {
    pub fn new() -> Self {
        Self::default()
    }

    fn closest(&self, row: ArrayView1<f32>) -> usize {
        let mut best = (f32::INFINITY, 0usize);
        for (class, centroid) in &self.centroids {
            let d: f32 = row
                .iter()
                .zip(centroid.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            if d < best.0 {
                best = (d, *class);
            }
        }
        best.1
    }
}

impl Learner for NearestCentroidLearner {
    fn name(&self) -> &str {
        "NearestCentroidLearner"
    }

    fn start(&mut self) -> Result<()> {
        self.centroids.clear();
        Ok(())
    }

    fn fit(&mut self, x: &Array2<f32>, y: &Array1<usize>) -> Result<()> {
        if x.nrows() == 0 {
            bail!("NearestCentroidLearner cannot be fitted on an empty training set");
        }
        let n_classes = y.iter().max().map_or(0, |&m| m + 1);
        let mut sums = Array2::<f32>::zeros((n_classes, x.ncols()));
        let mut counts = vec![0usize; n_classes];
        for (row, &label) in x.axis_iter(Axis(0)).zip(y.iter()) {
            let mut acc = sums.row_mut(label);
            acc += &row;
            counts[label] += 1;
        }

        self.centroids = counts
            .iter()
            .enumerate()
            .filter(|(_, &count)| count > 0)
            .map(|(class, &count)| (class, sums.row(class).mapv(|v| v / count as f32)))
            .collect();
        Ok(())
    }

    fn predict(&self, x: &Array2<f32>) -> Result<Array1<usize>> {
        if self.centroids.is_empty() {
            return Err(TeachingError::NotFitted(self.name().to_string()).into());
        }
        Ok(x.axis_iter(Axis(0)).map(|row| self.closest(row)).collect())
    }

    fn get_params(&self) -> Params {
        Params::new()
    }

    fn box_clone(&self) -> Box<dyn Learner> {
        Box::new(self.clone())
    }
}
