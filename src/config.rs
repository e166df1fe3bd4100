use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TeachingError;

/// Free-form parameter mapping reported by `get_params`.
pub type Params = BTreeMap<String, Value>;

/// How a batch-growing teacher sizes its batches after the first one.
///
/// Accepts the legacy integer codes (`0`, `1`) as well as the snake_case names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "String")]
pub enum BatchStrategy {
    /// Start from a configured increment and double it each round.
    DoubleIncrement,
    /// Start from the size of the initial sample and double it each round.
    DoubleSize,
}

impl BatchStrategy {
    pub fn from_code(code: i64) -> Result<Self, TeachingError> {
        match code {
            0 => Ok(BatchStrategy::DoubleIncrement),
            1 => Ok(BatchStrategy::DoubleSize),
            other => Err(TeachingError::UnknownStrategy(other.to_string())),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            BatchStrategy::DoubleIncrement => 0,
            BatchStrategy::DoubleSize => 1,
        }
    }
}

impl Default for BatchStrategy {
    fn default() -> Self {
        BatchStrategy::DoubleIncrement
    }
}

impl FromStr for BatchStrategy {
    type Err = TeachingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "0" | "double_increment" => Ok(BatchStrategy::DoubleIncrement),
            "1" | "double_size" => Ok(BatchStrategy::DoubleSize),
            other => Err(TeachingError::UnknownStrategy(other.to_string())),
        }
    }
}

impl TryFrom<Value> for BatchStrategy {
    type Error = TeachingError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match &value {
            Value::Number(n) => match n.as_i64() {
                Some(code) => BatchStrategy::from_code(code),
                None => Err(TeachingError::UnknownStrategy(n.to_string())),
            },
            Value::String(s) => s.parse(),
            other => Err(TeachingError::UnknownStrategy(other.to_string())),
        }
    }
}

impl From<BatchStrategy> for String {
    fn from(strategy: BatchStrategy) -> Self {
        match strategy {
            BatchStrategy::DoubleIncrement => "double_increment".to_string(),
            BatchStrategy::DoubleSize => "double_size".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SingleBatchParams {
    pub seed: u64,
    pub frac_dataset: f64,
}

impl Default for SingleBatchParams {
    fn default() -> Self {
        Self {
            seed: 0,
            frac_dataset: 1.0,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DoubleParams {
    pub seed: u64,
    pub frac_start: f64,
    pub strategy: BatchStrategy,
    pub increment_start: usize,
}

impl Default for DoubleParams {
    fn default() -> Self {
        Self {
            seed: 0,
            frac_start: 0.01,
            strategy: BatchStrategy::DoubleIncrement,
            increment_start: 1,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FixedPercWrongParams {
    pub seed: u64,
    pub frac_start: f64,
    pub frac_wrong_increment: f64,
    /// Batch size used by the increment strategy (and initial query size).
    pub sample_size: usize,
    pub strategy: BatchStrategy,
}

impl Default for FixedPercWrongParams {
    fn default() -> Self {
        Self {
            seed: 0,
            frac_start: 0.01,
            frac_wrong_increment: 0.1,
            sample_size: 300,
            strategy: BatchStrategy::DoubleIncrement,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct WtfParams {
    pub seed: u64,
    pub frac_start: f64,
    pub frac_stop: f64,
    pub first_example_seed: u64,
}

impl Default for WtfParams {
    fn default() -> Self {
        Self {
            seed: 0,
            frac_start: 0.01,
            frac_stop: 1.0,
            first_example_seed: 0,
        }
    }
}

/// Supported teachers and their parameters, tagged by teacher name.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "name")]
pub enum TeacherType {
    #[serde(rename = "SingleBatchTeacher")]
    SingleBatch(SingleBatchParams),
    #[serde(rename = "DoubleTeacher")]
    Double(DoubleParams),
    #[serde(rename = "FixedPercWrongTeacher")]
    FixedPercWrong(FixedPercWrongParams),
    #[serde(rename = "WTFTeacher")]
    Wtf(WtfParams),
}

impl TeacherType {
    pub fn name(&self) -> &'static str {
        match self {
            TeacherType::SingleBatch(_) => "SingleBatchTeacher",
            TeacherType::Double(_) => "DoubleTeacher",
            TeacherType::FixedPercWrong(_) => "FixedPercWrongTeacher",
            TeacherType::Wtf(_) => "WTFTeacher",
        }
    }

    /// Build from a teacher name and a parameter mapping; missing parameters
    /// take their defaults.
    pub fn from_params(name: &str, params: &Params) -> Result<Self, TeachingError> {
        // resolves aliases to the tag serde expects
        let canonical = name.parse::<TeacherType>()?.name();
        let mut object: serde_json::Map<String, Value> =
            params.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        object.insert("name".to_string(), Value::String(canonical.to_string()));
        serde_json::from_value(Value::Object(object)).map_err(|e| {
            TeachingError::InvalidParameter {
                param: name.to_string(),
                reason: e.to_string(),
            }
        })
    }
}

impl Default for TeacherType {
    fn default() -> Self {
        TeacherType::Double(DoubleParams::default())
    }
}

impl FromStr for TeacherType {
    type Err = TeachingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "singlebatchteacher" | "single_batch" => {
                Ok(TeacherType::SingleBatch(SingleBatchParams::default()))
            }
            "doubleteacher" | "double" => Ok(TeacherType::Double(DoubleParams::default())),
            "fixedpercwrongteacher" | "fixed_perc_wrong" => {
                Ok(TeacherType::FixedPercWrong(FixedPercWrongParams::default()))
            }
            "wtfteacher" | "wtf" => Ok(TeacherType::Wtf(WtfParams::default())),
            _ => Err(TeachingError::UnknownTeacher(s.to_string())),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GbdtParams {
    pub learning_rate: f32,
    pub max_depth: u32,
    pub num_boost_round: u32,
    pub debug: bool,
    pub training_optimization_level: u8,
}

impl Default for GbdtParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            max_depth: 6,
            num_boost_round: 50,
            debug: false,
            training_optimization_level: 2,
        }
    }
}

/// Supported learners and their parameters, tagged by learner name.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "name")]
pub enum LearnerType {
    #[serde(rename = "GBDTLearner")]
    Gbdt(GbdtParams),
    #[serde(rename = "NearestCentroidLearner")]
    NearestCentroid,
    #[serde(rename = "NearestNeighborLearner")]
    NearestNeighbor,
}

impl LearnerType {
    pub fn name(&self) -> &'static str {
        match self {
            LearnerType::Gbdt(_) => "GBDTLearner",
            LearnerType::NearestCentroid => "NearestCentroidLearner",
            LearnerType::NearestNeighbor => "NearestNeighborLearner",
        }
    }

    pub fn from_params(name: &str, params: &Params) -> Result<Self, TeachingError> {
        let canonical = name.parse::<LearnerType>()?.name();
        let mut object: serde_json::Map<String, Value> =
            params.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        object.insert("name".to_string(), Value::String(canonical.to_string()));
        serde_json::from_value(Value::Object(object)).map_err(|e| {
            TeachingError::InvalidParameter {
                param: name.to_string(),
                reason: e.to_string(),
            }
        })
    }
}

impl Default for LearnerType {
    fn default() -> Self {
        LearnerType::Gbdt(GbdtParams::default())
    }
}

impl FromStr for LearnerType {
    type Err = TeachingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gbdtlearner" | "gbdt" => Ok(LearnerType::Gbdt(GbdtParams::default())),
            "nearestcentroidlearner" | "nearest_centroid" => Ok(LearnerType::NearestCentroid),
            "nearestneighborlearner" | "nearest_neighbor" => Ok(LearnerType::NearestNeighbor),
            _ => Err(TeachingError::UnknownLearner(s.to_string())),
        }
    }
}

/// Options of a single protocol run.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TeachOptions {
    /// Time budget in seconds.
    pub time_limit: f64,
    /// Append new ids to the training set (true) or replace it (false).
    pub join_sets: bool,
    /// Keep the learner with the best lower confidence bound on accuracy.
    pub save_best_learner: bool,
}

impl Default for TeachOptions {
    fn default() -> Self {
        Self {
            time_limit: 1_000_000_000.0,
            join_sets: true,
            save_best_learner: false,
        }
    }
}

/// Where an experiment reads its data from.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct DatasetConfig {
    /// CSV file with the training (teaching) rows.
    pub path: String,
    /// Optional held-out CSV, encoded and scaled like `path`.
    #[serde(default)]
    pub path_test: Option<String>,
    /// Column holding the class label.
    #[serde(default)]
    pub label_column: usize,
    #[serde(default)]
    pub has_headers: bool,
    /// Standardize every feature to zero mean and unit variance.
    #[serde(default = "default_scale")]
    pub scale: bool,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// When false every feature column is categorical and one-hot encoded.
    #[serde(default = "default_is_numeric")]
    pub is_numeric: bool,
    /// Permute the rows after loading, seeded by `shuffle_random_state`.
    #[serde(default)]
    pub shuffle_dataset: bool,
    #[serde(default)]
    pub shuffle_random_state: u64,
}

fn default_scale() -> bool {
    true
}

fn default_is_numeric() -> bool {
    true
}

fn default_delimiter() -> char {
    ','
}

impl DatasetConfig {
    pub fn new(path: &str) -> Self {
        DatasetConfig {
            path: path.to_string(),
            path_test: None,
            label_column: 0,
            has_headers: false,
            scale: default_scale(),
            delimiter: default_delimiter(),
            is_numeric: default_is_numeric(),
            shuffle_dataset: false,
            shuffle_random_state: 0,
        }
    }
}

/// A named component whose parameters may hold lists of candidate values.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ComponentGrid {
    pub name: String,
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
}

/// An experiment file: one teacher and one learner, each with a grid of
/// parameter values, run over the same dataset.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ExperimentConfig {
    pub teacher: ComponentGrid,
    pub learner: ComponentGrid,
    #[serde(default)]
    pub dataset: Option<DatasetConfig>,
    #[serde(default)]
    pub protocol: TeachOptions,
    /// Number of runs per configuration.
    #[serde(default = "default_repetitions")]
    pub repetitions: usize,
    /// Folder receiving the reports.
    #[serde(default)]
    pub destination: Option<String>,
}

fn default_repetitions() -> usize {
    1
}

/// Load an experiment configuration from a JSON file.
pub fn load_experiment_config<P: AsRef<Path>>(path: P) -> Result<ExperimentConfig> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
    let config: ExperimentConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
    Ok(config)
}
