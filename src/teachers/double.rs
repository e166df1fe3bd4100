use anyhow::Result;
use ndarray::{Array1, Array2};

use crate::config::{BatchStrategy, DoubleParams, Params};
use crate::sampler;
use crate::teachers::{params_of, IdQueue, Teacher, TeacherBase};

/// Trains on geometrically growing batches drawn from a fixed permutation,
/// ignoring the learner's feedback.
#[derive(Debug, Clone)]
pub struct DoubleTeacher {
    params: DoubleParams,
    base: TeacherBase,
    queue: IdQueue,
    batch_size: usize,
    num_iters: usize,
}

impl DoubleTeacher {
    pub fn new(params: DoubleParams) -> Self {
        DoubleTeacher {
            params,
            base: TeacherBase::default(),
            queue: IdQueue::default(),
            batch_size: 1,
            num_iters: 0,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn current_size(&self) -> usize {
        self.queue.cursor()
    }

    fn send(&mut self, new_ids: Vec<usize>) -> Vec<usize> {
        self.num_iters += 1;
        log::trace!(
            "DoubleTeacher batch {}: {} ids, training set now {}",
            self.num_iters,
            new_ids.len(),
            self.current_size()
        );
        new_ids
    }
}

impl Teacher for DoubleTeacher {
    fn name(&self) -> &str {
        "DoubleTeacher"
    }

    fn start(&mut self, x: &Array2<f32>, y: &Array1<usize>, _time_left: f64) -> Result<()> {
        self.base.start(x, y)?;
        self.queue = IdQueue::new(sampler::shuffled_ids(self.base.m(), self.params.seed));
        self.batch_size = 1;
        self.num_iters = 0;
        Ok(())
    }

    fn get_first_examples(&mut self, _time_left: f64) -> Result<Vec<usize>> {
        let first = sampler::get_first_examples(
            self.params.frac_start,
            self.base.m(),
            &self.base.classes(),
            self.base.labels(),
            sampler::seeded_shuffle(self.params.seed),
        );
        self.queue.front_load(&first);
        let new_ids = self.queue.take(first.len());

        self.batch_size = match self.params.strategy {
            BatchStrategy::DoubleSize => new_ids.len(),
            BatchStrategy::DoubleIncrement => self.params.increment_start,
        };
        Ok(self.send(new_ids))
    }

    fn get_new_examples(&mut self, _: &[usize], _: &[usize], _: f64) -> Result<Vec<usize>> {
        if self.queue.is_exhausted() {
            return Ok(Vec::new());
        }
        let new_ids = self.queue.take(self.batch_size);
        self.batch_size = self.batch_size.saturating_mul(2);
        Ok(self.send(new_ids))
    }

    fn get_new_test_ids(&mut self, _: &[usize], _: &[usize], _: f64) -> Result<Vec<usize>> {
        Ok(Vec::new())
    }

    fn get_params(&self) -> Params {
        params_of(&self.params)
    }

    fn log_line(&self, h: &[usize]) -> Vec<f64> {
        vec![
            self.num_iters as f64,
            self.current_size() as f64,
            self.base.accuracy(h),
        ]
    }
}
