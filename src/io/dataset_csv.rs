//! CSV reader producing `Dataset`s.
//!
//! One row per example; the label column may hold any text and is encoded
//! to zero-based contiguous class ids. Feature columns either parse as
//! numbers or, for categorical data, are one-hot encoded.
use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use ndarray::{Array1, Array2, Axis};

use crate::config::DatasetConfig;
use crate::dataset::Dataset;
use crate::sampler;

/// Maps raw label strings to class ids `0..n` in sorted label order
/// (numeric order when every label is a number).
#[derive(Debug, Clone, PartialEq)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit(labels: &[String]) -> Self {
        let mut classes: Vec<String> = labels.to_vec();
        let numeric: Option<Vec<f64>> = classes.iter().map(|l| l.parse::<f64>().ok()).collect();
        if numeric.is_some() {
            classes.sort_by(|a, b| {
                let (a, b) = (a.parse::<f64>().unwrap_or(0.0), b.parse::<f64>().unwrap_or(0.0));
                a.total_cmp(&b)
            });
        } else {
            classes.sort();
        }
        classes.dedup();
        LabelEncoder { classes }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn transform(&self, labels: &[String]) -> Result<Array1<usize>> {
        labels
            .iter()
            .map(|label| {
                self.classes
                    .iter()
                    .position(|class| class == label)
                    .ok_or_else(|| anyhow!("Unknown label '{}'", label))
            })
            .collect::<Result<Vec<_>>>()
            .map(Array1::from_vec)
    }
}

/// Column means and standard deviations of a training matrix.
#[derive(Debug, Clone)]
struct Standardizer {
    mean: Array1<f32>,
    std: Array1<f32>,
}

impl Standardizer {
    fn fit(x: &Array2<f32>) -> Self {
        let mean = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(x.ncols()));
        // constant columns are left centred but unscaled
        let std = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > f32::EPSILON { s } else { 1.0 });
        Standardizer { mean, std }
    }

    fn transform(&self, x: &mut Array2<f32>) {
        for mut row in x.rows_mut() {
            row -= &self.mean;
            row /= &self.std;
        }
    }
}

/// Label and feature cells of a CSV file, before any encoding.
struct RawTable {
    cells: Vec<Vec<String>>,
    labels: Vec<String>,
    n_features: usize,
}

fn read_table(path: &Path, config: &DatasetConfig) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(config.delimiter as u8)
        .has_headers(config.has_headers)
        .from_path(path)
        .with_context(|| format!("Failed to open dataset: {}", path.display()))?;

    let mut cells = Vec::new();
    let mut labels = Vec::new();
    let mut n_features: Option<usize> = None;

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;
        let label = record.get(config.label_column).ok_or_else(|| {
            anyhow!(
                "Missing label column {} at row {}",
                config.label_column,
                row_idx + 1
            )
        })?;
        labels.push(label.trim().to_string());

        let width = record.len() - 1;
        match n_features {
            None => n_features = Some(width),
            Some(expected) if expected != width => {
                return Err(anyhow!(
                    "Row {} has {} features, expected {}",
                    row_idx + 1,
                    width,
                    expected
                ))
            }
            Some(_) => {}
        }

        cells.push(
            record
                .iter()
                .enumerate()
                .filter(|(idx, _)| *idx != config.label_column)
                .map(|(_, value)| value.trim().to_string())
                .collect(),
        );
    }

    Ok(RawTable {
        cells,
        labels,
        n_features: n_features.unwrap_or(0),
    })
}

fn parse_numeric(table: &RawTable) -> Result<Array2<f32>> {
    let mut features = Vec::with_capacity(table.cells.len() * table.n_features);
    for (row_idx, row) in table.cells.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            let parsed = value.parse::<f32>().with_context(|| {
                format!(
                    "Invalid feature in column {} at row {}",
                    col_idx,
                    row_idx + 1
                )
            })?;
            features.push(parsed);
        }
    }
    Array2::from_shape_vec((table.cells.len(), table.n_features), features)
        .context("Failed to build feature matrix")
}

/// One indicator column per distinct value of each categorical column,
/// columns in file order and values in sorted order.
#[derive(Debug, Clone, PartialEq)]
struct OneHotEncoder {
    categories: Vec<Vec<String>>,
}

impl OneHotEncoder {
    /// Collect the vocabulary of every column over all `tables`.
    fn fit(tables: &[&RawTable]) -> Self {
        let n_features = tables.first().map_or(0, |t| t.n_features);
        let mut columns = vec![BTreeSet::new(); n_features];
        for table in tables {
            for row in &table.cells {
                for (column, value) in columns.iter_mut().zip(row.iter()) {
                    column.insert(value.clone());
                }
            }
        }
        OneHotEncoder {
            categories: columns
                .into_iter()
                .map(|values| values.into_iter().collect())
                .collect(),
        }
    }

    fn width(&self) -> usize {
        self.categories.iter().map(Vec::len).sum()
    }

    fn transform(&self, table: &RawTable) -> Array2<f32> {
        let mut x = Array2::zeros((table.cells.len(), self.width()));
        for (row_idx, row) in table.cells.iter().enumerate() {
            let mut offset = 0;
            for (values, value) in self.categories.iter().zip(row.iter()) {
                if let Ok(pos) = values.binary_search(value) {
                    x[[row_idx, offset + pos]] = 1.0;
                }
                offset += values.len();
            }
        }
        x
    }
}

/// Feature matrices of `tables`, one-hot encoded over their shared
/// vocabulary unless the data is numeric.
fn feature_matrices(tables: &[&RawTable], config: &DatasetConfig) -> Result<Vec<Array2<f32>>> {
    if config.is_numeric {
        return tables.iter().map(|table| parse_numeric(table)).collect();
    }
    let encoder = OneHotEncoder::fit(tables);
    log::debug!(
        "One-hot encoded {} categorical columns into {} features",
        encoder.categories.len(),
        encoder.width()
    );
    Ok(tables.iter().map(|table| encoder.transform(table)).collect())
}

/// Reorder the rows of `dataset` with a seeded permutation.
fn shuffle_rows(dataset: Dataset, seed: u64) -> Result<Dataset> {
    let order = sampler::shuffled_ids(dataset.nrows(), seed);
    Ok(Dataset::new(
        &dataset.name,
        dataset.select_rows(&order),
        dataset.select_labels(&order),
    )?)
}

fn finish(dataset: Dataset, config: &DatasetConfig) -> Result<Dataset> {
    if config.shuffle_dataset {
        shuffle_rows(dataset, config.shuffle_random_state)
    } else {
        Ok(dataset)
    }
}

fn dataset_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Read a single dataset file.
pub fn read_dataset_csv<P: AsRef<Path>>(path: P, config: &DatasetConfig) -> Result<Dataset> {
    let path = path.as_ref();
    let table = read_table(path, config)?;
    let mut x = feature_matrices(&[&table], config)?
        .pop()
        .ok_or_else(|| anyhow!("No feature matrix for {}", path.display()))?;
    if config.scale {
        Standardizer::fit(&x).transform(&mut x);
    }
    let encoder = LabelEncoder::fit(&table.labels);
    let y = encoder.transform(&table.labels)?;
    log::debug!(
        "Loaded {} rows x {} features from {} ({} classes)",
        x.nrows(),
        x.ncols(),
        path.display(),
        encoder.classes().len()
    );
    finish(Dataset::new(&dataset_name(path), x, y)?, config)
}

/// Read `config.path` and, when configured, the held-out `config.path_test`.
///
/// The held-out rows are scaled with the training statistics and encoded
/// with the training labels; a label unseen in training is an error.
/// Categorical columns share one vocabulary across both files.
pub fn read_train_test_csv(config: &DatasetConfig) -> Result<(Dataset, Option<Dataset>)> {
    let Some(test_path) = &config.path_test else {
        return Ok((read_dataset_csv(&config.path, config)?, None));
    };

    let train_path = Path::new(&config.path);
    let test_path = Path::new(test_path);
    let train = read_table(train_path, config)?;
    let test = read_table(test_path, config)?;
    if train.n_features != test.n_features {
        return Err(anyhow!(
            "Training data has {} features but held-out data has {}",
            train.n_features,
            test.n_features
        ));
    }

    let mut matrices = feature_matrices(&[&train, &test], config)?.into_iter();
    let (Some(mut x_train), Some(mut x_test)) = (matrices.next(), matrices.next()) else {
        return Err(anyhow!("Failed to build feature matrices"));
    };

    if config.scale {
        let scaler = Standardizer::fit(&x_train);
        scaler.transform(&mut x_train);
        scaler.transform(&mut x_test);
    }

    let encoder = LabelEncoder::fit(&train.labels);
    let y_train = encoder.transform(&train.labels)?;
    let y_test = encoder
        .transform(&test.labels)
        .with_context(|| format!("Failed to encode labels of {}", test_path.display()))?;

    Ok((
        finish(Dataset::new(&dataset_name(train_path), x_train, y_train)?, config)?,
        Some(finish(
            Dataset::new(&dataset_name(test_path), x_test, y_test)?,
            config,
        )?),
    ))
}
