use anyhow::Result;
use ndarray::{Array1, Array2};

use crate::config::{Params, SingleBatchParams};
use crate::sampler;
use crate::teachers::{params_of, Teacher, TeacherBase};

/// Sends one shuffled fraction of the dataset and nothing afterwards: a
/// single training round, no queries.
#[derive(Debug, Clone)]
pub struct SingleBatchTeacher {
    params: SingleBatchParams,
    base: TeacherBase,
    shuffled_ids: Vec<usize>,
    num_iters: usize,
    current_size: usize,
}

impl SingleBatchTeacher {
    pub fn new(params: SingleBatchParams) -> Self {
        SingleBatchTeacher {
            params,
            base: TeacherBase::default(),
            shuffled_ids: Vec::new(),
            num_iters: 0,
            current_size: 0,
        }
    }
}

impl Teacher for SingleBatchTeacher {
    fn name(&self) -> &str {
        "SingleBatchTeacher"
    }

    fn start(&mut self, x: &Array2<f32>, y: &Array1<usize>, _time_left: f64) -> Result<()> {
        self.base.start(x, y)?;
        self.shuffled_ids = sampler::shuffled_ids(self.base.m(), self.params.seed);
        self.num_iters = 0;
        self.current_size = 0;
        Ok(())
    }

    fn get_first_examples(&mut self, _time_left: f64) -> Result<Vec<usize>> {
        let size = (self.params.frac_dataset * self.base.m() as f64).round() as usize;
        let new_ids = self.shuffled_ids[..size.min(self.shuffled_ids.len())].to_vec();
        self.num_iters += 1;
        self.current_size += new_ids.len();
        Ok(new_ids)
    }

    fn get_new_examples(&mut self, _: &[usize], _: &[usize], _: f64) -> Result<Vec<usize>> {
        Ok(Vec::new())
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
            self.current_size as f64,
            self.base.accuracy(h),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(frac_dataset: f64, m: usize) -> SingleBatchTeacher {
        let mut teacher = SingleBatchTeacher::new(SingleBatchParams {
            seed: 3,
            frac_dataset,
        });
        let x = Array2::<f32>::zeros((m, 2));
        let y = Array1::from_iter((0..m).map(|i| i % 2));
        teacher.start(&x, &y, 10.0).unwrap();
        teacher
    }

    #[test]
    fn sends_the_whole_dataset_once() {
        let mut teacher = started(1.0, 10);
        let mut ids = teacher.get_first_examples(10.0).unwrap();
        ids.sort_unstable();
        assert_eq!(ids, (0..10).collect::<Vec<_>>());
        assert!(teacher.get_new_test_ids(&[], &[], 10.0).unwrap().is_empty());
        assert!(teacher.get_new_examples(&[], &[], 10.0).unwrap().is_empty());
    }

    #[test]
    fn fraction_is_rounded() {
        let mut teacher = started(0.25, 10);
        // 2.5 rounds away from zero
        assert_eq!(teacher.get_first_examples(10.0).unwrap().len(), 3);
        assert_eq!(teacher.log_line(&[0; 10])[1], 3.0);
    }
}
