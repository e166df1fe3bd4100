//! Outcome of a teaching run and its arithmetic for averaging repeated runs.
use std::fmt;
use std::ops::{Add, Div, Mul};

use anyhow::Result;
use ndarray::Array1;
use serde::Serialize;

use crate::config::Params;
use crate::dataset::DatasetIdentity;
use crate::error::TeachingError;
use crate::protocol::TeachingLog;
use crate::timer::Timer;

pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Column names matching `TeachingSummary::to_record`.
pub const SUMMARY_HEADER: [&str; 16] = [
    "teacher_name",
    "learner_name",
    "dataset_name",
    "dataset_qtd_examples",
    "dataset_qtd_attributes",
    "dataset_qtd_classes",
    "dataset_dist_classes",
    "time_limit",
    "total_time",
    "qtd_iters",
    "teaching_set_size",
    "dataset_accuracy",
    "get_examples_time",
    "training_time",
    "classification_time",
    "validation_set_accuracy",
];

/// Headline statistics of a run. Counts are `f64` so averaged summaries
/// keep their fractional part.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeachingSummary {
    pub teacher_name: String,
    pub learner_name: String,
    pub dataset: DatasetIdentity,
    pub time_limit: f64,
    pub total_time: f64,
    pub qtd_iters: f64,
    pub teaching_set_size: f64,
    pub accuracy: f64,
    pub get_examples_time: f64,
    pub training_time: f64,
    pub classification_time: f64,
    pub validation_set_accuracy: Option<f64>,
}

impl TeachingSummary {
    /// Runs are comparable when teacher, learner, dataset and time limit agree.
    pub fn check_identity(&self, other: &TeachingSummary) -> Result<(), TeachingError> {
        let mismatch = |what: &str, a: &dyn fmt::Debug, b: &dyn fmt::Debug| {
            Err(TeachingError::IdentityMismatch(format!(
                "{} differs: {:?} vs {:?}",
                what, a, b
            )))
        };
        if self.teacher_name != other.teacher_name {
            return mismatch("teacher", &self.teacher_name, &other.teacher_name);
        }
        if self.learner_name != other.learner_name {
            return mismatch("learner", &self.learner_name, &other.learner_name);
        }
        if self.dataset != other.dataset {
            return mismatch("dataset", &self.dataset, &other.dataset);
        }
        let tolerance = 1e-9 * self.time_limit.abs().max(other.time_limit.abs());
        if (self.time_limit - other.time_limit).abs() > tolerance {
            return mismatch("time limit", &self.time_limit, &other.time_limit);
        }
        Ok(())
    }

    pub fn try_add(&self, other: &TeachingSummary) -> Result<TeachingSummary, TeachingError> {
        self.check_identity(other)?;
        Ok(TeachingSummary {
            total_time: self.total_time + other.total_time,
            qtd_iters: self.qtd_iters + other.qtd_iters,
            teaching_set_size: self.teaching_set_size + other.teaching_set_size,
            accuracy: self.accuracy + other.accuracy,
            get_examples_time: self.get_examples_time + other.get_examples_time,
            training_time: self.training_time + other.training_time,
            classification_time: self.classification_time + other.classification_time,
            validation_set_accuracy: match (self.validation_set_accuracy, other.validation_set_accuracy) {
                (Some(a), Some(b)) => Some(a + b),
                _ => None,
            },
            ..self.clone()
        })
    }

    pub fn scale(&self, alpha: f64) -> TeachingSummary {
        TeachingSummary {
            total_time: self.total_time * alpha,
            qtd_iters: self.qtd_iters * alpha,
            teaching_set_size: self.teaching_set_size * alpha,
            accuracy: self.accuracy * alpha,
            get_examples_time: self.get_examples_time * alpha,
            training_time: self.training_time * alpha,
            classification_time: self.classification_time * alpha,
            validation_set_accuracy: self.validation_set_accuracy.map(|a| a * alpha),
            ..self.clone()
        }
    }

    pub fn to_record(&self) -> Vec<String> {
        vec![
            self.teacher_name.clone(),
            self.learner_name.clone(),
            self.dataset.name.clone(),
            self.dataset.n_examples.to_string(),
            self.dataset.n_attributes.to_string(),
            self.dataset.n_classes.to_string(),
            self.dataset.class_distribution.clone(),
            self.time_limit.to_string(),
            self.total_time.to_string(),
            self.qtd_iters.to_string(),
            self.teaching_set_size.to_string(),
            self.accuracy.to_string(),
            self.get_examples_time.to_string(),
            self.training_time.to_string(),
            self.classification_time.to_string(),
            self.validation_set_accuracy
                .map_or_else(|| "-".to_string(), |a| a.to_string()),
        ]
    }
}

impl fmt::Display for TeachingSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "teacher: {}", self.teacher_name)?;
        writeln!(f, "learner: {}", self.learner_name)?;
        writeln!(f, "dataset: {}", self.dataset.name)?;
        writeln!(f, "dataset qtd examples: {}", self.dataset.n_examples)?;
        writeln!(f, "qtd attributes: {}", self.dataset.n_attributes)?;
        writeln!(f, "qtd classes: {}", self.dataset.n_classes)?;
        writeln!(f, "dataset dist classes: {}", self.dataset.class_distribution)?;
        writeln!(f, "time limit: {:.3}", self.time_limit)?;
        writeln!(f, "total time: {:.3}", self.total_time)?;
        writeln!(f, "qtd iters: {}", self.qtd_iters)?;
        writeln!(f, "teaching set size: {}", self.teaching_set_size)?;
        writeln!(f, "accuracy: {:.3}", self.accuracy)?;
        writeln!(f, "get examples time: {:.3}", self.get_examples_time)?;
        writeln!(f, "training time: {:.3}", self.training_time)?;
        writeln!(f, "classification time: {:.3}", self.classification_time)?;
        match self.validation_set_accuracy {
            Some(a) => write!(f, "validation set accuracy: {:.3}", a),
            None => write!(f, "validation set accuracy: -"),
        }
    }
}

/// Everything a run produces.
///
/// Combined results (via `+`, `*`, `/` or `average`) keep the hypothesis and
/// training ids of the left operand but drop the log, parameters and date.
#[derive(Debug, Clone)]
pub struct TeachingResult {
    /// The final learner's label for every dataset row.
    pub hypothesis: Array1<usize>,
    /// Training ids as of the last completed round.
    pub training_ids: Vec<usize>,
    pub summary: TeachingSummary,
    pub timer: Timer,
    pub log: Option<TeachingLog>,
    pub teacher_params: Params,
    pub learner_params: Params,
    pub date: Option<String>,
}

impl TeachingResult {
    pub fn try_add(&self, other: &TeachingResult) -> Result<TeachingResult, TeachingError> {
        let summary = self.summary.try_add(&other.summary)?;
        let timer = self.timer.try_add(&other.timer)?;
        Ok(TeachingResult {
            hypothesis: self.hypothesis.clone(),
            training_ids: self.training_ids.clone(),
            summary,
            timer,
            log: None,
            teacher_params: Params::new(),
            learner_params: Params::new(),
            date: None,
        })
    }

    pub fn scale(&self, alpha: f64) -> TeachingResult {
        TeachingResult {
            summary: self.summary.scale(alpha),
            timer: self.timer.scale(alpha),
            ..self.clone()
        }
    }

    /// Mean of several runs of the same configuration.
    pub fn average(results: &[TeachingResult]) -> Result<TeachingResult> {
        let (first, rest) = results
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("Cannot average an empty set of results"))?;
        let mut total = first.clone();
        for result in rest {
            total = total.try_add(result)?;
        }
        Ok(total.scale(1.0 / results.len() as f64))
    }
}

/// Panics when the identities differ; use `try_add` to get an error instead.
impl Add for &TeachingResult {
    type Output = TeachingResult;

    fn add(self, rhs: Self) -> TeachingResult {
        match self.try_add(rhs) {
            Ok(result) => result,
            Err(e) => panic!("{}", e),
        }
    }
}

impl Mul<f64> for &TeachingResult {
    type Output = TeachingResult;

    fn mul(self, alpha: f64) -> TeachingResult {
        self.scale(alpha)
    }
}

impl Div<f64> for &TeachingResult {
    type Output = TeachingResult;

    fn div(self, alpha: f64) -> TeachingResult {
        self.scale(1.0 / alpha)
    }
}

impl fmt::Display for TeachingResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "-- main infos")?;
        writeln!(f, "date: {}", self.date.as_deref().unwrap_or("-"))?;
        writeln!(f, "{}", self.summary)?;
        writeln!(f, "\n-- times (in seconds)")?;
        writeln!(f, "{}", self.timer)?;
        writeln!(f, "\n-- teacher parameters")?;
        for (key, value) in &self.teacher_params {
            writeln!(f, "{}: {}", key, value)?;
        }
        writeln!(f, "\n-- learner parameters")?;
        for (key, value) in &self.learner_params {
            writeln!(f, "{}: {}", key, value)?;
        }
        Ok(())
    }
}
