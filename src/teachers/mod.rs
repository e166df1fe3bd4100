//! Teachers: strategies choosing which rows a learner trains on.
//!
//! Lifecycle of a run: `start` → `get_first_examples` → repeated
//! (`get_new_test_ids` ⇄ learner predictions) → `get_new_examples`, until
//! `get_new_examples` returns no ids.
use anyhow::Result;
use ndarray::{Array1, Array2};
use serde::Serialize;
use serde_json::Value;

use crate::config::Params;
use crate::dataset;
use crate::error::TeachingError;

pub mod double;
pub mod factory;
pub mod fixed_perc_wrong;
pub mod id_queue;
pub mod single_batch;
pub mod wtf;

pub use double::DoubleTeacher;
pub use factory::build_teacher;
pub use fixed_perc_wrong::FixedPercWrongTeacher;
pub use id_queue::IdQueue;
pub use single_batch::SingleBatchTeacher;
pub use wtf::WtfTeacher;

pub trait Teacher: Send {
    fn name(&self) -> &str;

    /// Hand the teacher the dataset it has to teach.
    fn start(&mut self, x: &Array2<f32>, y: &Array1<usize>, time_left: f64) -> Result<()>;

    /// Ids of the first training batch, chosen before any feedback.
    fn get_first_examples(&mut self, time_left: f64) -> Result<Vec<usize>>;

    /// Ids of the next training batch given the round's query feedback
    /// (`test_labels[i]` is the learner's label for `test_ids[i]`).
    /// An empty vector ends the run.
    fn get_new_examples(
        &mut self,
        test_ids: &[usize],
        test_labels: &[usize],
        time_left: f64,
    ) -> Result<Vec<usize>>;

    /// Ids the learner should label next, given what it labeled so far this
    /// round. An empty vector ends the query sub-round.
    fn get_new_test_ids(
        &mut self,
        test_ids: &[usize],
        test_labels: &[usize],
        time_left: f64,
    ) -> Result<Vec<usize>>;

    fn get_params(&self) -> Params;

    /// The teacher's own accuracy estimate from the last query, if it makes one.
    fn estimated_accuracy(&self) -> Option<f64> {
        None
    }

    fn log_header(&self) -> Vec<&'static str> {
        vec!["iter_number", "training_set_size", "accuracy"]
    }

    /// Diagnostic row for a full-dataset hypothesis `h`.
    fn log_line(&self, h: &[usize]) -> Vec<f64>;
}

/// Ground truth shared by every teacher.
#[derive(Debug, Clone, Default)]
pub struct TeacherBase {
    y: Vec<usize>,
}

impl TeacherBase {
    pub fn start(&mut self, x: &Array2<f32>, y: &Array1<usize>) -> Result<(), TeachingError> {
        if x.nrows() != y.len() {
            return Err(TeachingError::ShapeMismatch {
                rows: x.nrows(),
                labels: y.len(),
            });
        }
        self.y = y.to_vec();
        Ok(())
    }

    pub fn m(&self) -> usize {
        self.y.len()
    }

    pub fn labels(&self) -> &[usize] {
        &self.y
    }

    pub fn classes(&self) -> Vec<usize> {
        dataset::distinct_labels(self.y.iter().copied())
    }

    /// Rows misclassified by the full-dataset hypothesis `h`.
    pub fn wrong_label_ids(&self, h: &[usize]) -> Vec<usize> {
        assert_eq!(h.len(), self.y.len(), "hypothesis must cover the dataset");
        self.y
            .iter()
            .zip(h.iter())
            .enumerate()
            .filter_map(|(i, (truth, label))| (truth != label).then_some(i))
            .collect()
    }

    pub fn accuracy(&self, h: &[usize]) -> f64 {
        dataset::accuracy(&self.y, h)
    }

    /// Split queried ids into (misclassified, correctly classified),
    /// preserving query order.
    pub fn split_by_correctness(
        &self,
        ids: &[usize],
        labels: &[usize],
    ) -> (Vec<usize>, Vec<usize>) {
        assert_eq!(ids.len(), labels.len(), "one label per queried id");
        let mut wrong = Vec::new();
        let mut correct = Vec::new();
        for (&id, &label) in ids.iter().zip(labels.iter()) {
            if self.y[id] != label {
                wrong.push(id);
            } else {
                correct.push(id);
            }
        }
        (wrong, correct)
    }

    /// Query the whole dataset once per round: all ids when nothing was
    /// queried yet, nothing afterwards.
    pub fn query_all_once(&self, test_ids: &[usize]) -> Vec<usize> {
        if test_ids.is_empty() {
            (0..self.m()).collect()
        } else {
            Vec::new()
        }
    }
}

/// Flatten a serializable parameter struct into a `Params` mapping.
pub(crate) fn params_of<T: Serialize>(params: &T) -> Params {
    match serde_json::to_value(params) {
        Ok(Value::Object(map)) => map.into_iter().collect(),
        _ => Params::new(),
    }
}
