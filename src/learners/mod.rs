//! Learners: trainable classifiers driven by the teaching protocol.
//!
//! A learner is fit on a growing subset of the dataset rows and asked to
//! label arbitrary rows. The protocol owns it exclusively for a run and may
//! snapshot it with `box_clone` to keep the best candidate.
use anyhow::Result;
use ndarray::{Array1, Array2};

use crate::config::Params;

pub mod centroid;
pub mod factory;
pub mod gbdt;
pub mod neighbor;

pub use centroid::NearestCentroidLearner;
pub use factory::build_learner;
pub use gbdt::GbdtLearner;
pub use neighbor::NearestNeighborLearner;

pub trait Learner: Send {
    /// Name used in logs and result summaries.
    fn name(&self) -> &str;

    /// Reset the learner before a run.
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Fit on `x` with zero-based class labels `y`. Called with growing
    /// subsets across a run; every call replaces the previous model.
    fn fit(&mut self, x: &Array2<f32>, y: &Array1<usize>) -> Result<()>;

    /// Predict a class label for every row of `x`.
    fn predict(&self, x: &Array2<f32>) -> Result<Array1<usize>>;

    fn get_params(&self) -> Params {
        Params::new()
    }

    /// Deep copy of the current (possibly fitted) state.
    fn box_clone(&self) -> Box<dyn Learner>;
}

impl Clone for Box<dyn Learner> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}
