use anyhow::Result;
use ndarray::{Array1, Array2};

use crate::config::{BatchStrategy, FixedPercWrongParams, Params};
use crate::error::TeachingError;
use crate::sampler;
use crate::teachers::{params_of, IdQueue, Teacher, TeacherBase};

/// Query error below this is treated as zero.
const ZERO_ERROR: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryState {
    SendNewIds,
    ChooseBatchSize,
    SendEmpty,
}

/// Error-driven teacher.
///
/// Each round queries a sample as large as the current training set, grows
/// the query when the learner makes mistakes (fewer mistakes, larger query),
/// then trains on every misclassified id plus enough correct ones to fill
/// the batch. The batch doubles each round.
#[derive(Debug, Clone)]
pub struct FixedPercWrongTeacher {
    params: FixedPercWrongParams,
    base: TeacherBase,
    queue: IdQueue,
    batch_size: usize,
    sample_size: usize,
    state: QueryState,
    done: bool,
    last_accuracy: Option<f64>,
    num_iters: usize,
}

impl FixedPercWrongTeacher {
    pub fn new(params: FixedPercWrongParams) -> Self {
        FixedPercWrongTeacher {
            batch_size: params.sample_size,
            sample_size: params.sample_size,
            params,
            base: TeacherBase::default(),
            queue: IdQueue::default(),
            state: QueryState::SendNewIds,
            done: false,
            last_accuracy: None,
            num_iters: 0,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn current_size(&self) -> usize {
        self.queue.cursor()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Extra query ids for an observed error rate, never negative.
    fn increment(&self, error: f64) -> usize {
        let k = self.params.frac_wrong_increment * self.batch_size as f64;
        let increment = (k / error).floor() - k.floor();
        increment.max(0.0) as usize
    }

    fn error_rate(&self, test_ids: &[usize], test_labels: &[usize]) -> f64 {
        if test_ids.is_empty() {
            return 0.0;
        }
        let (wrong, _) = self.base.split_by_correctness(test_ids, test_labels);
        wrong.len() as f64 / test_ids.len() as f64
    }

    fn send(&mut self, new_ids: Vec<usize>) -> Vec<usize> {
        self.num_iters += 1;
        new_ids
    }
}

impl Teacher for FixedPercWrongTeacher {
    fn name(&self) -> &str {
        "FixedPercWrongTeacher"
    }

    fn start(&mut self, x: &Array2<f32>, y: &Array1<usize>, _time_left: f64) -> Result<()> {
        self.base.start(x, y)?;
        self.queue = IdQueue::new(sampler::shuffled_ids(self.base.m(), self.params.seed));
        self.batch_size = self.params.sample_size;
        self.sample_size = self.params.sample_size;
        self.state = QueryState::SendNewIds;
        self.done = false;
        self.last_accuracy = None;
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
            BatchStrategy::DoubleIncrement => self.params.sample_size,
        };
        Ok(self.send(new_ids))
    }

    fn get_new_examples(
        &mut self,
        test_ids: &[usize],
        test_labels: &[usize],
        _time_left: f64,
    ) -> Result<Vec<usize>> {
        if self.queue.is_exhausted() || self.done || test_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut expected = self.queue.peek(0, test_ids.len()).to_vec();
        let mut queried = test_ids.to_vec();
        expected.sort_unstable();
        queried.sort_unstable();
        if expected != queried {
            return Err(TeachingError::ProtocolViolation(
                "FixedPercWrongTeacher received feedback for ids it did not query".to_string(),
            )
            .into());
        }

        let (wrong, correct) = self.base.split_by_correctness(test_ids, test_labels);
        let take = self.batch_size.saturating_sub(wrong.len()).min(correct.len());
        let error = wrong.len() as f64 / test_ids.len() as f64;

        let mut selected = wrong;
        selected.extend_from_slice(&correct[..take]);
        let new_ids = self
            .queue
            .commit_query(&selected, test_ids.len(), &correct[take..]);

        log::trace!(
            "FixedPercWrongTeacher: query error {:.4}, sending {} ids ({} correct), batch {}",
            error,
            new_ids.len(),
            take,
            self.batch_size
        );

        self.last_accuracy = Some(1.0 - error);
        self.batch_size = self.batch_size.saturating_mul(2);
        self.state = QueryState::SendNewIds;
        Ok(self.send(new_ids))
    }

    fn get_new_test_ids(
        &mut self,
        test_ids: &[usize],
        test_labels: &[usize],
        _time_left: f64,
    ) -> Result<Vec<usize>> {
        if self.queue.is_exhausted() {
            return Ok(Vec::new());
        }

        match self.state {
            QueryState::SendNewIds => {
                self.sample_size = self.current_size();
                self.state = QueryState::ChooseBatchSize;
                Ok(self.queue.peek(0, self.sample_size).to_vec())
            }
            QueryState::ChooseBatchSize => {
                let error = self.error_rate(test_ids, test_labels);
                self.state = QueryState::SendEmpty;
                if error.abs() <= ZERO_ERROR {
                    log::debug!("FixedPercWrongTeacher: no mistakes on the query, done");
                    self.done = true;
                    return Ok(Vec::new());
                }
                let end = self.batch_size + self.increment(error);
                Ok(self.queue.peek(self.sample_size, end).to_vec())
            }
            QueryState::SendEmpty => Ok(Vec::new()),
        }
    }

    fn get_params(&self) -> Params {
        params_of(&self.params)
    }

    fn estimated_accuracy(&self) -> Option<f64> {
        self.last_accuracy
    }

    fn log_line(&self, h: &[usize]) -> Vec<f64> {
        vec![
            self.num_iters as f64,
            self.current_size() as f64,
            self.base.accuracy(h),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balanced(m: usize) -> (Array2<f32>, Array1<usize>) {
        let x = Array2::<f32>::zeros((m, 1));
        let y = Array1::from_iter((0..m).map(|i| i % 2));
        (x, y)
    }

    fn teacher(frac_wrong_increment: f64) -> FixedPercWrongTeacher {
        FixedPercWrongTeacher::new(FixedPercWrongParams {
            seed: 1,
            frac_start: 0.1,
            frac_wrong_increment,
            sample_size: 300,
            strategy: BatchStrategy::DoubleSize,
        })
    }

    fn truth(y: &Array1<usize>, ids: &[usize]) -> Vec<usize> {
        ids.iter().map(|&i| y[i]).collect()
    }

    #[test]
    fn zero_query_error_ends_the_run() {
        let (x, y) = balanced(40);
        let mut teacher = teacher(0.1);
        teacher.start(&x, &y, 1.0).unwrap();
        teacher.get_first_examples(1.0).unwrap();

        let query = teacher.get_new_test_ids(&[], &[], 1.0).unwrap();
        assert_eq!(query.len(), teacher.current_size());
        let labels = truth(&y, &query);

        assert!(teacher.get_new_test_ids(&query, &labels, 1.0).unwrap().is_empty());
        assert!(teacher.is_done());
        assert!(teacher.get_new_examples(&query, &labels, 1.0).unwrap().is_empty());
    }

    #[test]
    fn mistakes_grow_the_query_and_lead_the_batch() {
        let (x, y) = balanced(40);
        let mut teacher = teacher(0.5);
        teacher.start(&x, &y, 1.0).unwrap();
        let first = teacher.get_first_examples(1.0).unwrap();
        assert_eq!(first.len(), 4);
        assert_eq!(teacher.batch_size(), 4);

        let mut query = teacher.get_new_test_ids(&[], &[], 1.0).unwrap();
        assert_eq!(query.len(), 4);
        let mut labels = truth(&y, &query);
        labels[0] = 1 - labels[0];
        labels[1] = 1 - labels[1];

        // error 0.5: floor(0.5 * 4 / 0.5) - floor(0.5 * 4) = 2 more ids
        let extra = teacher.get_new_test_ids(&query, &labels, 1.0).unwrap();
        assert_eq!(extra.len(), 2);
        labels.extend(truth(&y, &extra));
        query.extend(extra);
        assert!(teacher.get_new_test_ids(&query, &labels, 1.0).unwrap().is_empty());

        let batch = teacher.get_new_examples(&query, &labels, 1.0).unwrap();
        assert_eq!(batch.len(), 4);
        assert_eq!(&batch[..2], &query[..2]);
        assert_eq!(teacher.current_size(), 8);
        assert_eq!(teacher.batch_size(), 8);
        assert!((teacher.estimated_accuracy().unwrap() - 4.0 / 6.0).abs() < 1e-12);

        // the two correct ids left out wait at the end of the queue
        let tail = teacher.queue.peek(30, 32).to_vec();
        assert_eq!(tail, vec![query[4], query[5]]);
    }

    #[test]
    fn more_mistakes_than_batch_takes_only_mistakes() {
        let (x, y) = balanced(40);
        let mut teacher = teacher(0.1);
        teacher.start(&x, &y, 1.0).unwrap();
        teacher.get_first_examples(1.0).unwrap();
        teacher.batch_size = 2;

        let query = teacher.get_new_test_ids(&[], &[], 1.0).unwrap();
        let labels: Vec<usize> = truth(&y, &query).iter().map(|l| 1 - l).collect();
        let batch = teacher.get_new_examples(&query, &labels, 1.0).unwrap();
        assert_eq!(batch, query);
    }

    #[test]
    fn feedback_for_unqueried_ids_is_rejected() {
        let (x, y) = balanced(40);
        let mut teacher = teacher(0.1);
        teacher.start(&x, &y, 1.0).unwrap();
        let first = teacher.get_first_examples(1.0).unwrap();
        let labels = truth(&y, &first);
        let err = teacher.get_new_examples(&first, &labels, 1.0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TeachingError>(),
            Some(TeachingError::ProtocolViolation(_))
        ));
    }
}
