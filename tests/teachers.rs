//! Every registered teacher against every registered learner.

mod common;

use std::sync::Arc;

use machine_teacher::clock::ManualClock;
use machine_teacher::config::{GbdtParams, LearnerType, Params, TeachOptions, TeacherType};
use machine_teacher::learners::build_learner;
use machine_teacher::protocol::{teach_with_clock, LOG_HEADER};
use machine_teacher::teachers::build_teacher;
use serde_json::json;

use common::{assert_unique_in_range, blocks, halves, init_logging};

fn teacher_types() -> Vec<TeacherType> {
    let mut params = Params::new();
    params.insert("seed".to_string(), json!(5));
    params.insert("frac_start".to_string(), json!(0.05));
    let mut single = Params::new();
    single.insert("frac_dataset".to_string(), json!(0.5));
    vec![
        TeacherType::from_params("SingleBatchTeacher", &single).unwrap(),
        TeacherType::from_params("DoubleTeacher", &params).unwrap(),
        TeacherType::from_params("FixedPercWrongTeacher", &params).unwrap(),
        TeacherType::from_params("WTFTeacher", &params).unwrap(),
    ]
}

#[test]
fn every_pairing_respects_the_id_contract() {
    init_logging();
    let dataset = blocks(120);
    for teacher_type in teacher_types() {
        for learner_type in [LearnerType::NearestCentroid, LearnerType::NearestNeighbor] {
            for save_best_learner in [false, true] {
                let mut teacher = build_teacher(teacher_type.clone()).unwrap();
                let options = TeachOptions {
                    save_best_learner,
                    ..TeachOptions::default()
                };
                let result = teach_with_clock(
                    teacher.as_mut(),
                    build_learner(learner_type.clone()),
                    &dataset,
                    None,
                    &options,
                    Arc::new(ManualClock::new()),
                )
                .unwrap();

                assert_eq!(result.summary.teacher_name, teacher_type.name());
                assert_eq!(result.summary.learner_name, learner_type.name());
                assert_unique_in_range(&result.training_ids, 120);
                assert_eq!(result.hypothesis.len(), 120);
                let log = result.log.as_ref().unwrap();
                assert_eq!(log.len() as f64, result.summary.qtd_iters);
                assert!(log.rows().iter().all(|row| row.to_record().len() == LOG_HEADER.len()));
                assert_eq!(
                    log.last().unwrap().ts_size,
                    result.training_ids.len(),
                    "{} / {}",
                    teacher_type.name(),
                    learner_type.name()
                );
                assert!(!result.teacher_params.is_empty());
            }
        }
    }
}

#[test]
fn nearest_neighbor_ends_perfect_when_double_sends_everything() {
    let dataset = blocks(80);
    let mut teacher = build_teacher(teacher_types()[1].clone()).unwrap();
    let result = teach_with_clock(
        teacher.as_mut(),
        build_learner(LearnerType::NearestNeighbor),
        &dataset,
        None,
        &TeachOptions::default(),
        Arc::new(ManualClock::new()),
    )
    .unwrap();
    assert_eq!(result.training_ids.len(), 80);
    assert_eq!(result.summary.accuracy, 1.0);
}

#[test]
fn gbdt_learns_a_threshold() {
    init_logging();
    let dataset = halves(40);
    let mut teacher = build_teacher(teacher_types()[0].clone()).unwrap();
    let learner = build_learner(LearnerType::Gbdt(GbdtParams {
        num_boost_round: 20,
        max_depth: 3,
        ..GbdtParams::default()
    }));
    let result = teach_with_clock(
        teacher.as_mut(),
        learner,
        &dataset,
        None,
        &TeachOptions::default(),
        Arc::new(ManualClock::new()),
    )
    .unwrap();
    assert_eq!(result.summary.learner_name, "GBDTLearner");
    assert_eq!(result.training_ids.len(), 20);
    assert!(result.summary.accuracy >= 0.9);
    assert_eq!(result.learner_params["max_depth"], json!(3));
}
