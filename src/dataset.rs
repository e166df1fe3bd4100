//! Labeled datasets handed to the teaching protocol.
//!
//! A `Dataset` is a feature matrix (rows = examples) plus a zero-based
//! integer label per row. It never changes during a run; teachers and the
//! protocol only ever select rows by id.
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::TeachingError;

pub const DEFAULT_DATASET_NAME: &str = "???";

#[derive(Debug, Clone)]
pub struct Dataset {
    pub name: String,
    pub x: Array2<f32>,
    pub y: Array1<usize>,
}

/// What makes two teaching runs comparable: same data, same class layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetIdentity {
    pub name: String,
    pub n_examples: usize,
    pub n_attributes: usize,
    pub n_classes: usize,
    pub class_distribution: String,
}

impl Dataset {
    pub fn new(name: &str, x: Array2<f32>, y: Array1<usize>) -> Result<Self, TeachingError> {
        if x.nrows() != y.len() {
            return Err(TeachingError::ShapeMismatch {
                rows: x.nrows(),
                labels: y.len(),
            });
        }
        Ok(Dataset {
            name: name.to_string(),
            x,
            y,
        })
    }

    pub fn nrows(&self) -> usize {
        self.x.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.x.ncols()
    }

    /// The protocol requires at least two classes and a minimum label of 0.
    pub fn validate_labels(&self) -> Result<(), TeachingError> {
        validate_labels(&self.y.to_vec())
    }

    /// Sorted distinct labels.
    pub fn classes(&self) -> Vec<usize> {
        distinct_labels(self.y.iter().copied())
    }

    pub fn select_rows(&self, ids: &[usize]) -> Array2<f32> {
        self.x.select(Axis(0), ids)
    }

    pub fn select_labels(&self, ids: &[usize]) -> Array1<usize> {
        self.y.select(Axis(0), ids)
    }

    pub fn identity(&self) -> DatasetIdentity {
        let labels = self.y.to_vec();
        DatasetIdentity {
            name: self.name.clone(),
            n_examples: self.nrows(),
            n_attributes: self.ncols(),
            n_classes: self.classes().len(),
            class_distribution: format_distribution(&labels),
        }
    }

    pub fn log_summary(&self) {
        let counts = bincount(&self.y.to_vec());
        log::info!(
            "Dataset '{}': {} examples, {} attributes, class counts {:?}",
            self.name,
            self.nrows(),
            self.ncols(),
            counts
        );
    }
}

pub fn validate_labels(labels: &[usize]) -> Result<(), TeachingError> {
    let classes = distinct_labels(labels.iter().copied());
    if classes.len() < 2 {
        return Err(TeachingError::InvalidLabels(format!(
            "there must be more than one class in the dataset, found {}",
            classes.len()
        )));
    }
    if classes[0] != 0 {
        return Err(TeachingError::InvalidLabels(format!(
            "minimum label must be 0, found {}",
            classes[0]
        )));
    }
    Ok(())
}

pub fn distinct_labels<I: IntoIterator<Item = usize>>(labels: I) -> Vec<usize> {
    let mut classes: Vec<usize> = labels.into_iter().collect();
    classes.sort_unstable();
    classes.dedup();
    classes
}

/// Occurrences of each label value from 0 up to the largest label present.
pub fn bincount(labels: &[usize]) -> Vec<usize> {
    let len = labels.iter().max().map_or(0, |&m| m + 1);
    let mut counts = vec![0usize; len];
    for &label in labels {
        counts[label] += 1;
    }
    counts
}

/// Class frequencies as `"0.50,0.50"`.
pub fn format_distribution(labels: &[usize]) -> String {
    if labels.is_empty() {
        return String::new();
    }
    let n = labels.len() as f64;
    bincount(labels)
        .iter()
        .map(|&c| format!("{:.2}", c as f64 / n))
        .collect::<Vec<_>>()
        .join(",")
}

/// Fraction of positions where `h` agrees with `y`.
pub fn accuracy(y: &[usize], h: &[usize]) -> f64 {
    assert_eq!(y.len(), h.len(), "accuracy requires vectors of equal length");
    if y.is_empty() {
        return 0.0;
    }
    let wrong = y.iter().zip(h.iter()).filter(|(a, b)| a != b).count();
    1.0 - wrong as f64 / y.len() as f64
}
