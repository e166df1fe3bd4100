//! End-to-end runs of the teaching protocol.

mod common;

use std::sync::Arc;

use anyhow::Result;
use machine_teacher::clock::{Clock, ManualClock};
use machine_teacher::config::{
    BatchStrategy, DoubleParams, FixedPercWrongParams, Params, SingleBatchParams, TeachOptions,
    WtfParams,
};
use machine_teacher::dataset::Dataset;
use machine_teacher::learners::{Learner, NearestCentroidLearner, NearestNeighborLearner};
use machine_teacher::protocol::{teach_with_clock, LOG_HEADER};
use machine_teacher::teachers::{
    DoubleTeacher, FixedPercWrongTeacher, SingleBatchTeacher, Teacher, WtfTeacher,
};
use machine_teacher::{TeachingError, TeachingResult};
use ndarray::{Array1, Array2};

use common::{assert_unique_in_range, blocks, halves, init_logging, separable, SlowLearner};

fn run(
    teacher: &mut dyn Teacher,
    learner: Box<dyn Learner>,
    dataset: &Dataset,
    validation: Option<&Dataset>,
    options: &TeachOptions,
) -> Result<TeachingResult> {
    teach_with_clock(
        teacher,
        learner,
        dataset,
        validation,
        options,
        Arc::new(ManualClock::new()),
    )
}

fn teaching_error(err: &anyhow::Error) -> &TeachingError {
    err.downcast_ref::<TeachingError>()
        .expect("expected a TeachingError")
}

fn ts_sizes(result: &TeachingResult) -> Vec<usize> {
    result
        .log
        .as_ref()
        .unwrap()
        .rows()
        .iter()
        .map(|row| row.ts_size)
        .collect()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn single_batch_trains_once_on_everything() {
    init_logging();
    let dataset = separable(100);
    let mut teacher = SingleBatchTeacher::new(SingleBatchParams {
        seed: 0,
        frac_dataset: 1.0,
    });
    let result = run(
        &mut teacher,
        Box::new(NearestNeighborLearner::new()),
        &dataset,
        None,
        &TeachOptions::default(),
    )
    .unwrap();

    assert_eq!(result.summary.qtd_iters, 1.0);
    assert_eq!(result.training_ids.len(), 100);
    assert_unique_in_range(&result.training_ids, 100);
    assert_eq!(result.summary.accuracy, 1.0);
    assert_eq!(result.hypothesis.to_vec(), dataset.y.to_vec());

    let log = result.log.as_ref().unwrap();
    assert_eq!(log.len(), 1);
    let row = &log.rows()[0];
    assert_eq!(row.ts_size, 100);
    assert_eq!(row.qtd_classified_examples, 0);
    assert_eq!(row.ts_class_distribution, "0.50,0.50");
    assert_eq!(row.test_set_accuracy, None);
    assert_eq!(row.to_record().len(), LOG_HEADER.len());
}

#[test]
fn double_teacher_doubles_until_exhausted() {
    init_logging();
    let dataset = halves(20);
    let mut teacher = DoubleTeacher::new(DoubleParams {
        seed: 0,
        frac_start: 0.1,
        strategy: BatchStrategy::DoubleIncrement,
        increment_start: 1,
    });
    let result = run(
        &mut teacher,
        Box::new(NearestNeighborLearner::new()),
        &dataset,
        None,
        &TeachOptions::default(),
    )
    .unwrap();

    assert_eq!(ts_sizes(&result), vec![2, 3, 5, 9, 17, 20]);
    assert_eq!(result.summary.qtd_iters, 6.0);
    assert_eq!(result.summary.teaching_set_size, 20.0);
    assert_unique_in_range(&result.training_ids, 20);
    assert_eq!(result.summary.accuracy, 1.0);

    for (i, row) in result.log.as_ref().unwrap().rows().iter().enumerate() {
        assert_eq!(row.iter, i + 1);
        assert_eq!(row.learner_selected, row.iter);
        assert_eq!(row.estimated_accuracy, 0.0);
        assert_eq!(row.to_record().len(), LOG_HEADER.len());
    }
}

#[test]
fn replacing_sets_keeps_only_the_last_batch() {
    let dataset = halves(20);
    let mut teacher = DoubleTeacher::new(DoubleParams {
        seed: 0,
        frac_start: 0.1,
        strategy: BatchStrategy::DoubleIncrement,
        increment_start: 1,
    });
    let options = TeachOptions {
        join_sets: false,
        ..TeachOptions::default()
    };
    let result = run(
        &mut teacher,
        Box::new(NearestNeighborLearner::new()),
        &dataset,
        None,
        &options,
    )
    .unwrap();
    assert_eq!(ts_sizes(&result), vec![2, 1, 2, 4, 8, 3]);
    assert_eq!(result.training_ids.len(), 3);
}

#[test]
fn time_budget_stops_the_loop_and_freezes_the_last_round() {
    init_logging();
    let dataset = halves(20);
    let clock = ManualClock::new();
    let mut teacher = DoubleTeacher::new(DoubleParams {
        seed: 0,
        frac_start: 0.1,
        strategy: BatchStrategy::DoubleIncrement,
        increment_start: 1,
    });
    let options = TeachOptions {
        time_limit: 2.5,
        ..TeachOptions::default()
    };
    let result = teach_with_clock(
        &mut teacher,
        Box::new(SlowLearner::new(clock.clone(), 1.0)),
        &dataset,
        None,
        &options,
        Arc::new(clock.clone()),
    )
    .unwrap();

    // fits at t = 1, 2, 3; the third round never starts
    assert_eq!(result.summary.qtd_iters, 2.0);
    assert_eq!(result.training_ids.len(), 3);
    assert!((result.summary.total_time - 2.0).abs() < 1e-9);
    assert!((result.summary.training_time - 2.0).abs() < 1e-9);
    assert!((result.timer.others_time()).abs() < 1e-9);
    assert!((clock.now() - 3.0).abs() < 1e-9);
    assert_eq!(result.log.as_ref().unwrap().len(), 2);
}

#[test]
fn perfect_query_ends_fixed_perc_wrong_with_forced_retention() {
    init_logging();
    let dataset = separable(100);
    let mut teacher = FixedPercWrongTeacher::new(FixedPercWrongParams {
        seed: 2,
        frac_start: 0.1,
        ..FixedPercWrongParams::default()
    });
    let options = TeachOptions {
        save_best_learner: true,
        ..TeachOptions::default()
    };
    let result = run(
        &mut teacher,
        Box::new(NearestNeighborLearner::new()),
        &dataset,
        None,
        &options,
    )
    .unwrap();

    assert_eq!(result.summary.qtd_iters, 1.0);
    assert_eq!(result.training_ids.len(), 10);
    assert_eq!(result.summary.accuracy, 1.0);
    let row = result.log.as_ref().unwrap().last().unwrap().clone();
    assert_eq!(row.estimated_accuracy, 2.0);
    assert_eq!(row.validation_set_size, 10);
    assert_eq!(row.learner_selected, 1);
}

#[test]
fn fixed_perc_wrong_with_retention_keeps_invariants() {
    init_logging();
    let dataset = blocks(200);
    let mut teacher = FixedPercWrongTeacher::new(FixedPercWrongParams {
        seed: 7,
        frac_start: 0.1,
        frac_wrong_increment: 0.1,
        sample_size: 300,
        strategy: BatchStrategy::DoubleSize,
    });
    let options = TeachOptions {
        save_best_learner: true,
        ..TeachOptions::default()
    };
    let result = run(
        &mut teacher,
        Box::new(NearestCentroidLearner::new()),
        &dataset,
        None,
        &options,
    )
    .unwrap();

    assert_unique_in_range(&result.training_ids, 200);
    let log = result.log.as_ref().unwrap();
    assert_eq!(log.len() as f64, result.summary.qtd_iters);
    let sizes = ts_sizes(&result);
    assert!(sizes.windows(2).all(|w| w[0] < w[1]));
    for row in log.rows() {
        assert!(row.learner_selected <= row.iter);
        assert!(row.estimated_accuracy <= 2.0);
        assert_eq!(row.to_record().len(), LOG_HEADER.len());
    }
}

#[test]
fn wtf_stays_under_its_cap() {
    init_logging();
    let dataset = blocks(200);
    let mut teacher = WtfTeacher::new(WtfParams {
        seed: 11,
        frac_start: 0.05,
        frac_stop: 0.5,
        first_example_seed: 3,
    })
    .unwrap();
    let result = run(
        &mut teacher,
        Box::new(NearestCentroidLearner::new()),
        &dataset,
        None,
        &TeachOptions::default(),
    )
    .unwrap();

    assert_unique_in_range(&result.training_ids, 200);
    assert!(result.training_ids.len() <= 100);
    assert!(result.training_ids.len() > 10);
    let log = result.log.as_ref().unwrap();
    assert!(log.len() >= 2);
    // every round after the first reports a whole-dataset query
    assert!(log.rows()[1..]
        .iter()
        .all(|row| row.qtd_classified_examples == 200));
}

#[test]
fn held_out_accuracy_is_reported() {
    let dataset = separable(60);
    let validation = separable(20);
    let mut teacher = SingleBatchTeacher::new(SingleBatchParams::default());
    let result = run(
        &mut teacher,
        Box::new(NearestNeighborLearner::new()),
        &dataset,
        Some(&validation),
        &TeachOptions::default(),
    )
    .unwrap();
    let row = result.log.as_ref().unwrap().last().unwrap();
    assert_eq!(row.test_set_accuracy, Some(1.0));
    assert_eq!(row.accuracy_selected, Some(1.0));
    assert_eq!(result.summary.validation_set_accuracy, Some(1.0));
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn a_single_class_is_rejected_before_any_round() {
    let dataset = Dataset::new(
        "one-class",
        Array2::zeros((4, 1)),
        Array1::from_vec(vec![0, 0, 0, 0]),
    )
    .unwrap();
    let mut teacher = SingleBatchTeacher::new(SingleBatchParams::default());
    let err = run(
        &mut teacher,
        Box::new(NearestNeighborLearner::new()),
        &dataset,
        None,
        &TeachOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(teaching_error(&err), TeachingError::InvalidLabels(_)));
}

#[test]
fn labels_must_start_at_zero() {
    let dataset = Dataset::new(
        "shifted",
        Array2::zeros((4, 1)),
        Array1::from_vec(vec![1, 2, 1, 2]),
    )
    .unwrap();
    let mut teacher = SingleBatchTeacher::new(SingleBatchParams::default());
    let err = run(
        &mut teacher,
        Box::new(NearestNeighborLearner::new()),
        &dataset,
        None,
        &TeachOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(teaching_error(&err), TeachingError::InvalidLabels(_)));
}

#[test]
fn empty_first_batch_is_a_protocol_violation() {
    let dataset = separable(10);
    let mut teacher = SingleBatchTeacher::new(SingleBatchParams {
        seed: 0,
        frac_dataset: 0.0,
    });
    let err = run(
        &mut teacher,
        Box::new(NearestNeighborLearner::new()),
        &dataset,
        None,
        &TeachOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(
        teaching_error(&err),
        TeachingError::ProtocolViolation(_)
    ));
}

#[test]
fn no_time_means_no_rounds() {
    let dataset = separable(10);
    let mut teacher = SingleBatchTeacher::new(SingleBatchParams::default());
    let options = TeachOptions {
        time_limit: 0.0,
        ..TeachOptions::default()
    };
    let err = run(
        &mut teacher,
        Box::new(NearestNeighborLearner::new()),
        &dataset,
        None,
        &options,
    )
    .unwrap_err();
    match teaching_error(&err) {
        TeachingError::NoRounds {
            teacher,
            learner,
            dataset,
        } => {
            assert_eq!(teacher, "SingleBatchTeacher");
            assert_eq!(learner, "NearestNeighborLearner");
            assert_eq!(dataset, "separable");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

/// Sends `first`, then `next` once, and queries `query` once per round.
struct ScriptedTeacher {
    first: Vec<usize>,
    next: Vec<usize>,
    query: Vec<usize>,
}

impl Teacher for ScriptedTeacher {
    fn name(&self) -> &str {
        "ScriptedTeacher"
    }

    fn start(&mut self, _: &Array2<f32>, _: &Array1<usize>, _: f64) -> Result<()> {
        Ok(())
    }

    fn get_first_examples(&mut self, _: f64) -> Result<Vec<usize>> {
        Ok(self.first.clone())
    }

    fn get_new_examples(&mut self, _: &[usize], _: &[usize], _: f64) -> Result<Vec<usize>> {
        Ok(std::mem::take(&mut self.next))
    }

    fn get_new_test_ids(&mut self, test_ids: &[usize], _: &[usize], _: f64) -> Result<Vec<usize>> {
        if test_ids.is_empty() {
            Ok(self.query.clone())
        } else {
            Ok(Vec::new())
        }
    }

    fn get_params(&self) -> Params {
        Params::new()
    }

    fn log_line(&self, _: &[usize]) -> Vec<f64> {
        Vec::new()
    }
}

#[test]
fn duplicate_training_ids_are_rejected() {
    let dataset = separable(10);
    let mut teacher = ScriptedTeacher {
        first: vec![0, 1],
        next: vec![2, 1],
        query: Vec::new(),
    };
    let err = run(
        &mut teacher,
        Box::new(NearestNeighborLearner::new()),
        &dataset,
        None,
        &TeachOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(
        teaching_error(&err),
        TeachingError::ProtocolViolation(_)
    ));
}

#[test]
fn oversized_query_is_rejected() {
    let dataset = separable(4);
    let mut teacher = ScriptedTeacher {
        first: vec![0, 1],
        next: Vec::new(),
        query: vec![0, 1, 2, 3, 0],
    };
    let err = run(
        &mut teacher,
        Box::new(NearestNeighborLearner::new()),
        &dataset,
        None,
        &TeachOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(
        teaching_error(&err),
        TeachingError::ProtocolViolation(_)
    ));
}
