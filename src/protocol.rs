//! The teaching protocol: a teacher picks training rows for a learner,
//! checks it on query rows, and picks more rows until it sends none or
//! the time budget runs out.
//!
//! Round 0 fits the teacher's first examples. Each following round logs the
//! learner's state, runs the query sub-protocol (`get_new_test_ids` ⇄
//! `predict`), asks for new training ids and refits.
use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::config::TeachOptions;
use crate::dataset::{self, Dataset};
use crate::error::TeachingError;
use crate::learners::Learner;
use crate::result::{TeachingResult, TeachingSummary, DATE_FORMAT};
use crate::teachers::Teacher;
use crate::timer::Timer;

pub const LOG_HEADER: [&str; 16] = [
    "iter",
    "TS_size",
    "dataset_accuracy",
    "elapsed_time",
    "time_left",
    "get_examples_time",
    "training_time",
    "classification_time",
    "qtd_classified_examples",
    "TS_qtd_classes",
    "TS_class_distribution",
    "test_set_accuracy",
    "estimated_accuracy",
    "validation_set_size",
    "learner_selected",
    "accuracy_selected",
];

pub const PHASES: [&str; 3] = ["training", "classification", "get_examples"];

/// z-score of the 95% lower confidence bound used for retention.
const Z_95: f64 = 1.96;
const RETENTION_TOLERANCE: f64 = 1e-7;
/// Estimate recorded when the teacher has nothing left to send; beats any
/// real bound so the last learner is retained.
const FORCED_ESTIMATE: f64 = 2.0;

/// One row of the teaching log, describing the learner at the start of a round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRow {
    pub iter: usize,
    pub ts_size: usize,
    pub dataset_accuracy: f64,
    pub elapsed_time: f64,
    pub time_left: f64,
    pub get_examples_time: f64,
    pub training_time: f64,
    pub classification_time: f64,
    /// Size of the previous round's query set.
    pub qtd_classified_examples: usize,
    pub ts_qtd_classes: usize,
    pub ts_class_distribution: String,
    /// Accuracy on the held-out set, when one was given.
    pub test_set_accuracy: Option<f64>,
    pub estimated_accuracy: f64,
    pub validation_set_size: usize,
    pub learner_selected: usize,
    pub accuracy_selected: Option<f64>,
}

impl LogRow {
    fn with_selection(
        mut self,
        estimated_accuracy: f64,
        validation_set_size: usize,
        learner_selected: usize,
        accuracy_selected: Option<f64>,
    ) -> Self {
        self.estimated_accuracy = estimated_accuracy;
        self.validation_set_size = validation_set_size;
        self.learner_selected = learner_selected;
        self.accuracy_selected = accuracy_selected;
        self
    }

    /// The row as strings in `LOG_HEADER` order; a missing held-out
    /// accuracy is written as `-`.
    pub fn to_record(&self) -> Vec<String> {
        let optional = |a: Option<f64>| a.map_or_else(|| "-".to_string(), |a| a.to_string());
        vec![
            self.iter.to_string(),
            self.ts_size.to_string(),
            self.dataset_accuracy.to_string(),
            self.elapsed_time.to_string(),
            self.time_left.to_string(),
            self.get_examples_time.to_string(),
            self.training_time.to_string(),
            self.classification_time.to_string(),
            self.qtd_classified_examples.to_string(),
            self.ts_qtd_classes.to_string(),
            self.ts_class_distribution.clone(),
            optional(self.test_set_accuracy),
            self.estimated_accuracy.to_string(),
            self.validation_set_size.to_string(),
            self.learner_selected.to_string(),
            optional(self.accuracy_selected),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeachingLog {
    rows: Vec<LogRow>,
}

impl TeachingLog {
    pub fn header(&self) -> &'static [&'static str] {
        &LOG_HEADER
    }

    pub fn rows(&self) -> &[LogRow] {
        &self.rows
    }

    pub fn last(&self) -> Option<&LogRow> {
        self.rows.last()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn push(&mut self, row: LogRow) {
        self.rows.push(row);
    }
}

/// Run the protocol against the system clock.
pub fn teach(
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
        Arc::new(SystemClock::new()),
    )
}

/// Run the protocol, measuring time with `clock`.
pub fn teach_with_clock(
    teacher: &mut dyn Teacher,
    mut learner: Box<dyn Learner>,
    dataset: &Dataset,
    validation: Option<&Dataset>,
    options: &TeachOptions,
    clock: Arc<dyn Clock>,
) -> Result<TeachingResult> {
    dataset.validate_labels()?;
    let m = dataset.nrows();
    let time_left = |timer: &Timer| options.time_limit - timer.elapsed();

    let mut timer = Timer::with_clock(clock);
    timer.start();
    for phase in PHASES {
        timer.tick(phase);
        timer.tock();
    }

    dataset.log_summary();
    log::info!(
        "Teaching {} with {} on '{}' (time limit {}s)",
        learner.name(),
        teacher.name(),
        dataset.name,
        options.time_limit
    );

    learner
        .start()
        .with_context(|| format!("Failed to start {}", learner.name()))?;
    teacher
        .start(&dataset.x, &dataset.y, time_left(&timer))
        .with_context(|| format!("Failed to start {}", teacher.name()))?;

    timer.tick("get_examples");
    let first_ids = teacher.get_first_examples(time_left(&timer))?;
    timer.tock();
    if first_ids.is_empty() {
        return Err(TeachingError::ProtocolViolation(format!(
            "{} sent no first examples",
            teacher.name()
        ))
        .into());
    }
    check_training_ids(&first_ids, m)?;

    let mut train_ids = first_ids;
    timer.tick("training");
    fit(learner.as_mut(), dataset, &train_ids)?;
    timer.tock();

    let mut log = TeachingLog::default();
    let mut best_bound = 0.0;
    let mut best_learner: Option<Box<dyn Learner>> = None;
    let mut final_learner: Option<Box<dyn Learner>> = None;
    let mut iter_selected = 1;
    let mut last_query_size = 0;
    let mut ok_timer: Option<Timer> = None;
    let mut ok_train_ids: Option<Vec<usize>> = None;

    let mut qtd_iters = 0;
    while time_left(&timer) > 0.0 {
        qtd_iters += 1;

        // bookkeeping below is not charged to the budget
        timer.stop();
        let mut snapshot = timer.clone();
        snapshot.finish();
        ok_train_ids = Some(train_ids.clone());
        let row = build_log_row(
            &*teacher,
            learner.as_ref(),
            dataset,
            validation,
            &train_ids,
            &snapshot,
            time_left(&timer),
            last_query_size,
            qtd_iters,
        )?;
        ok_timer = Some(snapshot);
        if !options.save_best_learner {
            iter_selected = qtd_iters;
            let selected_accuracy = row.test_set_accuracy;
            log.push(row.clone().with_selection(0.0, 0, qtd_iters, selected_accuracy));
        }
        timer.unstop();

        timer.tick("classification");
        let (test_ids, test_labels) =
            run_queries(teacher, learner.as_ref(), dataset, &timer, options.time_limit)?;
        timer.tock();
        last_query_size = test_ids.len();

        timer.tick("get_examples");
        let new_ids = teacher.get_new_examples(&test_ids, &test_labels, time_left(&timer))?;
        timer.tock();

        if options.save_best_learner {
            let bound = if new_ids.is_empty() {
                FORCED_ESTIMATE
            } else {
                let (estimate, n) = estimate_accuracy(&*teacher, dataset, &row, &test_ids, &test_labels);
                lower_confidence_bound(estimate, n)
            };
            if bound + RETENTION_TOLERANCE >= best_bound {
                log::debug!(
                    "Round {}: retaining learner (bound {:.4} >= best {:.4})",
                    qtd_iters,
                    bound,
                    best_bound
                );
                best_bound = bound;
                best_learner = Some(learner.box_clone());
                iter_selected = qtd_iters;
            }
            let selected_accuracy = if iter_selected == qtd_iters {
                row.test_set_accuracy
            } else {
                log.rows()
                    .get(iter_selected - 1)
                    .and_then(|selected| selected.test_set_accuracy)
            };
            log.push(row.with_selection(bound, test_ids.len(), iter_selected, selected_accuracy));
        } else {
            final_learner = Some(learner.box_clone());
        }

        if new_ids.is_empty() {
            log::info!("{} sent no new examples after {} rounds", teacher.name(), qtd_iters);
            break;
        }

        timer.tick("training");
        if options.join_sets {
            train_ids.extend(new_ids);
        } else {
            train_ids = new_ids;
        }
        check_training_ids(&train_ids, m)?;
        fit(learner.as_mut(), dataset, &train_ids)?;
        timer.tock();
    }

    let (Some(ok_timer), Some(ok_train_ids)) = (ok_timer, ok_train_ids) else {
        return Err(TeachingError::NoRounds {
            teacher: teacher.name().to_string(),
            learner: learner.name().to_string(),
            dataset: dataset.name.clone(),
        }
        .into());
    };
    check_training_ids(&ok_train_ids, m)?;

    let final_learner = if options.save_best_learner {
        best_learner.unwrap_or(learner)
    } else {
        final_learner.unwrap_or(learner)
    };
    let hypothesis = final_learner
        .predict(&dataset.x)
        .with_context(|| format!("{} failed to label the dataset", final_learner.name()))?;

    let validation_set_accuracy = validation.and(log.last().and_then(|row| row.accuracy_selected));

    let summary = TeachingSummary {
        teacher_name: teacher.name().to_string(),
        learner_name: final_learner.name().to_string(),
        dataset: dataset.identity(),
        time_limit: options.time_limit,
        total_time: ok_timer.total_time(),
        qtd_iters: qtd_iters as f64,
        teaching_set_size: ok_train_ids.len() as f64,
        accuracy: dataset::accuracy(&dataset.y.to_vec(), &hypothesis.to_vec()),
        get_examples_time: ok_timer.phase("get_examples"),
        training_time: ok_timer.phase("training"),
        classification_time: ok_timer.phase("classification"),
        validation_set_accuracy,
    };
    log::info!(
        "Finished after {} rounds: {} training ids, accuracy {:.4}",
        qtd_iters,
        ok_train_ids.len(),
        summary.accuracy
    );

    Ok(TeachingResult {
        hypothesis,
        training_ids: ok_train_ids,
        summary,
        timer: ok_timer,
        log: Some(log),
        teacher_params: teacher.get_params(),
        learner_params: final_learner.get_params(),
        date: Some(chrono::Local::now().format(DATE_FORMAT).to_string()),
    })
}

fn fit(learner: &mut dyn Learner, dataset: &Dataset, ids: &[usize]) -> Result<()> {
    learner
        .fit(&dataset.select_rows(ids), &dataset.select_labels(ids))
        .with_context(|| format!("{} failed to fit {} rows", learner.name(), ids.len()))
}

/// Training ids must be in range, unique and no more than the dataset.
fn check_training_ids(ids: &[usize], m: usize) -> Result<(), TeachingError> {
    if ids.len() > m {
        return Err(TeachingError::ProtocolViolation(format!(
            "training set of {} ids exceeds the {} dataset rows",
            ids.len(),
            m
        )));
    }
    let mut seen = HashSet::with_capacity(ids.len());
    for &id in ids {
        if id >= m {
            return Err(TeachingError::ProtocolViolation(format!(
                "training id {} out of range for {} rows",
                id, m
            )));
        }
        if !seen.insert(id) {
            return Err(TeachingError::ProtocolViolation(format!(
                "training id {} sent twice",
                id
            )));
        }
    }
    Ok(())
}

/// Ask the teacher for query ids and label them until it sends none.
fn run_queries(
    teacher: &mut dyn Teacher,
    learner: &dyn Learner,
    dataset: &Dataset,
    timer: &Timer,
    time_limit: f64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let m = dataset.nrows();
    let mut test_ids: Vec<usize> = Vec::new();
    let mut test_labels: Vec<usize> = Vec::new();
    loop {
        let new_ids =
            teacher.get_new_test_ids(&test_ids, &test_labels, time_limit - timer.elapsed())?;
        if new_ids.is_empty() {
            break;
        }
        if test_ids.len() + new_ids.len() > m {
            return Err(TeachingError::ProtocolViolation(format!(
                "{} queried {} ids on a dataset of {} rows",
                teacher.name(),
                test_ids.len() + new_ids.len(),
                m
            ))
            .into());
        }
        if let Some(&id) = new_ids.iter().find(|&&id| id >= m) {
            return Err(TeachingError::ProtocolViolation(format!(
                "query id {} out of range for {} rows",
                id, m
            ))
            .into());
        }
        let labels = learner.predict(&dataset.select_rows(&new_ids))?;
        test_ids.extend(new_ids);
        test_labels.extend(labels.iter().copied());
    }
    Ok((test_ids, test_labels))
}

#[allow(clippy::too_many_arguments)]
fn build_log_row(
    teacher: &dyn Teacher,
    learner: &dyn Learner,
    dataset: &Dataset,
    validation: Option<&Dataset>,
    train_ids: &[usize],
    timer: &Timer,
    time_left: f64,
    last_query_size: usize,
    iter: usize,
) -> Result<LogRow> {
    let h = learner.predict(&dataset.x)?.to_vec();
    let y = dataset.y.to_vec();
    let dataset_accuracy = dataset::accuracy(&y, &h);
    log::trace!(
        "{} {:?} = {:?}",
        teacher.name(),
        teacher.log_header(),
        teacher.log_line(&h)
    );

    let train_labels: Vec<usize> = train_ids.iter().map(|&id| y[id]).collect();
    let test_set_accuracy = match validation {
        Some(v) => {
            let predicted = learner.predict(&v.x)?.to_vec();
            Some(dataset::accuracy(&v.y.to_vec(), &predicted))
        }
        None => None,
    };

    log::debug!(
        "Round {}: {} training ids, dataset accuracy {:.4}",
        iter,
        train_ids.len(),
        dataset_accuracy
    );

    Ok(LogRow {
        iter,
        ts_size: train_ids.len(),
        dataset_accuracy,
        elapsed_time: timer.elapsed(),
        time_left,
        get_examples_time: timer.phase("get_examples"),
        training_time: timer.phase("training"),
        classification_time: timer.phase("classification"),
        qtd_classified_examples: last_query_size,
        ts_qtd_classes: dataset::distinct_labels(train_labels.iter().copied()).len(),
        ts_class_distribution: dataset::format_distribution(&train_labels),
        test_set_accuracy,
        estimated_accuracy: 0.0,
        validation_set_size: 0,
        learner_selected: iter,
        accuracy_selected: None,
    })
}

/// Accuracy estimate behind the retention bound and the sample size it
/// rests on. Falls back to the query accuracy, then to the whole dataset.
fn estimate_accuracy(
    teacher: &dyn Teacher,
    dataset: &Dataset,
    row: &LogRow,
    test_ids: &[usize],
    test_labels: &[usize],
) -> (f64, usize) {
    if test_ids.is_empty() {
        let estimate = teacher.estimated_accuracy().unwrap_or(row.dataset_accuracy);
        return (estimate, dataset.nrows());
    }
    let estimate = teacher.estimated_accuracy().unwrap_or_else(|| {
        let truth: Vec<usize> = test_ids.iter().map(|&id| dataset.y[id]).collect();
        dataset::accuracy(&truth, test_labels)
    });
    (estimate, test_ids.len())
}

/// `p - 1.96 * sqrt(p (1 - p) / n)`.
pub fn lower_confidence_bound(p: f64, n: usize) -> f64 {
    if n == 0 {
        return p;
    }
    let variance = (p * (1.0 - p) / n as f64).max(0.0);
    p - Z_95 * variance.sqrt()
}
