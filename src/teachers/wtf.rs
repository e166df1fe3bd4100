use anyhow::Result;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{Params, WtfParams};
use crate::error::TeachingError;
use crate::sampler;
use crate::teachers::{params_of, Teacher, TeacherBase};

/// Boosting-style teacher.
///
/// Keeps a weight per row (initially `1/(2m)`). Each round the weights of
/// the misclassified, not yet selected rows are multiplied by the smallest
/// power of two that lifts their sum to 1, and a systematic sweep of `n`
/// sorted uniforms over the weight increments picks the next batch. `n`
/// doubles whenever the weights saturate or the sweep picks nothing.
#[derive(Debug, Clone)]
pub struct WtfTeacher {
    params: WtfParams,
    base: TeacherBase,
    rng: StdRng,
    weights: Vec<f64>,
    selected: Vec<bool>,
    n: usize,
    max_size: usize,
    current_size: usize,
    num_iters: usize,
    last_accuracy: Option<f64>,
}

impl WtfTeacher {
    pub fn new(params: WtfParams) -> Result<Self, TeachingError> {
        if !(0.0..=1.0).contains(&params.frac_start) {
            return Err(TeachingError::InvalidParameter {
                param: "frac_start".to_string(),
                reason: format!("must be in [0, 1], got {}", params.frac_start),
            });
        }
        if !(params.frac_start..=1.0).contains(&params.frac_stop) {
            return Err(TeachingError::InvalidParameter {
                param: "frac_stop".to_string(),
                reason: format!(
                    "must be in [{}, 1], got {}",
                    params.frac_start, params.frac_stop
                ),
            });
        }
        Ok(WtfTeacher {
            rng: StdRng::seed_from_u64(params.seed),
            params,
            base: TeacherBase::default(),
            weights: Vec::new(),
            selected: Vec::new(),
            n: 1,
            max_size: 0,
            current_size: 0,
            num_iters: 0,
            last_accuracy: None,
        })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn current_size(&self) -> usize {
        self.current_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    fn uniform_weight(&self) -> f64 {
        1.0 / (2.0 * self.base.m() as f64)
    }

    fn reset_weights(&mut self) {
        let w = self.uniform_weight();
        self.weights.iter_mut().for_each(|weight| *weight = w);
    }

    /// Misclassified rows of the full-dataset prediction `h` that were never
    /// selected. Also records the accuracy of `h`.
    fn delta(&mut self, h: &[usize]) -> Vec<usize> {
        let wrong = self.base.wrong_label_ids(h);
        let m = self.base.m() as f64;
        self.last_accuracy = Some((m - wrong.len() as f64) / m);
        wrong.into_iter().filter(|&i| !self.selected[i]).collect()
    }

    /// Scale the weights of `delta` and return the half increments.
    fn update_weights(&mut self, delta: &[usize]) -> Vec<f64> {
        let mut v: f64 = delta.iter().map(|&i| self.weights[i]).sum();
        if v >= 1.0 {
            log::trace!("WTFTeacher: weights saturated (v = {:.4}), n = {}", v, self.n * 2);
            self.n *= 2;
            self.reset_weights();
            v = self.uniform_weight() * delta.len() as f64;
        }

        let mut k = 1.0;
        while v * k < 1.0 {
            k *= 2.0;
        }

        delta
            .iter()
            .map(|&i| {
                let old = self.weights[i];
                self.weights[i] = old * k;
                (self.weights[i] - old) / 2.0
            })
            .collect()
    }

    /// Sweep `n` sorted uniforms over the cumulative increments; a row is
    /// picked when a draw lands inside its interval.
    fn sweep(&mut self, delta: &[usize], delta_w: &[f64]) -> Vec<usize> {
        let mut draws: Vec<f64> = (0..self.n).map(|_| self.rng.gen::<f64>()).collect();
        draws.sort_by(|a, b| a.total_cmp(b));

        let mut picked = Vec::new();
        let (mut i, mut j) = (0, 0);
        let mut upper = 0.0;
        let mut advanced = true;
        while j < draws.len() && i < delta.len() {
            if advanced {
                upper += delta_w[i];
            }
            advanced = false;
            if draws[j] <= upper {
                if draws[j] > upper - delta_w[i] {
                    picked.push(delta[i]);
                    advanced = true;
                    i += 1;
                }
                j += 1;
            } else {
                i += 1;
                advanced = true;
            }
        }
        picked
    }

    fn send(&mut self, new_ids: Vec<usize>) -> Vec<usize> {
        self.num_iters += 1;
        self.current_size += new_ids.len();
        for &id in &new_ids {
            self.selected[id] = true;
        }
        new_ids
    }
}

impl Teacher for WtfTeacher {
    fn name(&self) -> &str {
        "WTFTeacher"
    }

    fn start(&mut self, x: &Array2<f32>, y: &Array1<usize>, _time_left: f64) -> Result<()> {
        self.base.start(x, y)?;
        let m = self.base.m();
        self.max_size = (m as f64 * self.params.frac_stop) as usize;
        self.rng = StdRng::seed_from_u64(self.params.seed);
        self.weights = vec![self.uniform_weight(); m];
        self.selected = vec![false; m];
        self.n = 1;
        self.current_size = 0;
        self.num_iters = 0;
        self.last_accuracy = None;
        Ok(())
    }

    /// The stratified sample rounds up per class, so it is cut back to the
    /// `frac_stop` cap (never below one id).
    fn get_first_examples(&mut self, _time_left: f64) -> Result<Vec<usize>> {
        let mut first = sampler::get_first_examples(
            self.params.frac_start,
            self.base.m(),
            &self.base.classes(),
            self.base.labels(),
            sampler::seeded_shuffle(self.params.first_example_seed),
        );
        first.truncate(self.max_size.max(1));
        Ok(self.send(first))
    }

    /// Expects the learner's labels for the whole dataset, as queried by
    /// `get_new_test_ids`.
    fn get_new_examples(
        &mut self,
        test_ids: &[usize],
        test_labels: &[usize],
        _time_left: f64,
    ) -> Result<Vec<usize>> {
        let m = self.base.m();
        if test_ids.len() != m || test_labels.len() != m {
            return Err(TeachingError::ProtocolViolation(format!(
                "WTFTeacher needs labels for all {} rows, got {}",
                m,
                test_labels.len()
            ))
            .into());
        }
        let mut h = vec![0usize; m];
        for (&id, &label) in test_ids.iter().zip(test_labels.iter()) {
            h[id] = label;
        }

        let delta = self.delta(&h);
        if delta.is_empty() || self.current_size >= self.max_size {
            return Ok(Vec::new());
        }

        let mut new_ids = Vec::new();
        while new_ids.is_empty() {
            let delta_w = self.update_weights(&delta);
            new_ids = self.sweep(&delta, &delta_w);
            if new_ids.is_empty() {
                self.n *= 2;
                self.reset_weights();
            }
        }
        new_ids.truncate(self.max_size - self.current_size);

        log::trace!(
            "WTFTeacher round {}: {} wrong unselected, sending {} (n = {})",
            self.num_iters,
            delta.len(),
            new_ids.len(),
            self.n
        );
        Ok(self.send(new_ids))
    }

    fn get_new_test_ids(
        &mut self,
        test_ids: &[usize],
        _test_labels: &[usize],
        _time_left: f64,
    ) -> Result<Vec<usize>> {
        Ok(self.base.query_all_once(test_ids))
    }

    fn get_params(&self) -> Params {
        params_of(&self.params)
    }

    fn estimated_accuracy(&self) -> Option<f64> {
        self.last_accuracy
    }

    fn log_header(&self) -> Vec<&'static str> {
        vec!["iter_number", "n", "training_set_size", "accuracy"]
    }

    fn log_line(&self, h: &[usize]) -> Vec<f64> {
        vec![
            self.num_iters as f64,
            self.n as f64,
            self.current_size as f64,
            self.base.accuracy(h),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(m: usize) -> (Array2<f32>, Array1<usize>) {
        let x = Array2::<f32>::zeros((m, 1));
        let y = Array1::from_iter((0..m).map(|i| i % 2));
        (x, y)
    }

    fn started(m: usize, frac_stop: f64) -> (WtfTeacher, Array1<usize>) {
        let (x, y) = data(m);
        let mut teacher = WtfTeacher::new(WtfParams {
            seed: 4,
            frac_start: 0.05,
            frac_stop,
            first_example_seed: 2,
        })
        .unwrap();
        teacher.start(&x, &y, 1.0).unwrap();
        (teacher, y)
    }

    #[test]
    fn first_batch_respects_the_cap() {
        let (x, y) = data(10);
        let mut teacher = WtfTeacher::new(WtfParams {
            seed: 0,
            frac_start: 0.15,
            frac_stop: 0.15,
            first_example_seed: 0,
        })
        .unwrap();
        teacher.start(&x, &y, 1.0).unwrap();
        assert_eq!(teacher.max_size(), 1);
        let first = teacher.get_first_examples(1.0).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(teacher.current_size(), 1);
    }

    #[test]
    fn rejects_fractions_out_of_range() {
        let bad_start = WtfParams {
            frac_start: 1.5,
            ..WtfParams::default()
        };
        assert!(WtfTeacher::new(bad_start).is_err());
        let bad_stop = WtfParams {
            frac_start: 0.5,
            frac_stop: 0.2,
            ..WtfParams::default()
        };
        assert!(matches!(
            WtfTeacher::new(bad_stop),
            Err(TeachingError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn queries_the_whole_dataset_once() {
        let (mut teacher, _) = started(10, 1.0);
        let ids = teacher.get_new_test_ids(&[], &[], 1.0).unwrap();
        assert_eq!(ids, (0..10).collect::<Vec<_>>());
        assert!(teacher.get_new_test_ids(&ids, &ids, 1.0).unwrap().is_empty());
    }

    #[test]
    fn selection_never_repeats_and_respects_the_cap() {
        let (mut teacher, y) = started(60, 0.5);
        let mut seen = teacher.get_first_examples(1.0).unwrap();
        let all: Vec<usize> = (0..60).collect();
        // a learner that is always wrong
        let h: Vec<usize> = y.iter().map(|l| 1 - l).collect();
        loop {
            let batch = teacher.get_new_examples(&all, &h, 1.0).unwrap();
            if batch.is_empty() {
                break;
            }
            seen.extend(batch);
            assert!(teacher.current_size() <= teacher.max_size());
        }
        assert_eq!(teacher.current_size(), teacher.max_size());
        let mut unique = seen.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), seen.len());
        assert!(teacher.n() >= 1);
    }

    #[test]
    fn perfect_prediction_stops() {
        let (mut teacher, y) = started(20, 1.0);
        teacher.get_first_examples(1.0).unwrap();
        let all: Vec<usize> = (0..20).collect();
        let batch = teacher.get_new_examples(&all, &y.to_vec(), 1.0).unwrap();
        assert!(batch.is_empty());
        assert_eq!(teacher.estimated_accuracy(), Some(1.0));
    }

    #[test]
    fn weight_increments_lift_the_wrong_mass_to_one() {
        let (mut teacher, _) = started(8, 1.0);
        // uniform weight 1/16, two rows: v = 1/8, k = 8
        let delta_w = teacher.update_weights(&[1, 2]);
        assert_eq!(delta_w.len(), 2);
        for dw in delta_w {
            assert!((dw - (8.0 - 1.0) / 16.0 / 2.0).abs() < 1e-12);
        }
        assert!((teacher.weights[1] - 0.5).abs() < 1e-12);
        assert_eq!(teacher.n(), 1);
    }
}
