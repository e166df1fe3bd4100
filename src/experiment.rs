//! Experiments: every combination of a teacher grid and a learner grid,
//! each run `repetitions` times over the same data and averaged.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{anyhow, Context, Result};
use rayon::prelude::*;
use serde_json::Value;

use crate::config::{self, ExperimentConfig, LearnerType, Params, TeacherType};
use crate::dataset::Dataset;
use crate::io;
use crate::learners::build_learner;
use crate::protocol::teach;
use crate::report;
use crate::result::TeachingResult;
use crate::teachers::build_teacher;

/// Cartesian product of parameter values.
///
/// A list value contributes one candidate per element, any other value a
/// single candidate. Combinations are enumerated with the first key (in
/// key order) varying fastest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterGrid {
    keys: Vec<String>,
    values: Vec<Vec<Value>>,
}

impl ParameterGrid {
    pub fn new(params: &BTreeMap<String, Value>) -> Self {
        let (keys, values) = params
            .iter()
            .map(|(key, value)| {
                let candidates = match value {
                    Value::Array(items) => items.clone(),
                    other => vec![other.clone()],
                };
                (key.clone(), candidates)
            })
            .unzip();
        ParameterGrid { keys, values }
    }

    /// Number of combinations; an empty grid has one (no parameters).
    pub fn len(&self) -> usize {
        self.values.iter().map(Vec::len).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `index`-th combination.
    pub fn get(&self, mut index: usize) -> Option<Params> {
        if index >= self.len() {
            return None;
        }
        let mut params = Params::new();
        for (key, candidates) in self.keys.iter().zip(self.values.iter()) {
            let radix = candidates.len();
            params.insert(key.clone(), candidates[index % radix].clone());
            index /= radix;
        }
        Some(params)
    }

    pub fn iter(&self) -> impl Iterator<Item = Params> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }
}

/// One concrete teacher/learner pairing of an experiment.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSpec {
    pub teacher: TeacherType,
    pub learner: LearnerType,
}

/// Teacher combinations outer, learner combinations inner.
pub fn expand_configuration(config: &ExperimentConfig) -> Result<Vec<RunSpec>> {
    let teacher_grid = ParameterGrid::new(&config.teacher.params);
    let learner_grid = ParameterGrid::new(&config.learner.params);

    let mut specs = Vec::with_capacity(teacher_grid.len() * learner_grid.len());
    for teacher_params in teacher_grid.iter() {
        let teacher = TeacherType::from_params(&config.teacher.name, &teacher_params)?;
        for learner_params in learner_grid.iter() {
            let learner = LearnerType::from_params(&config.learner.name, &learner_params)?;
            specs.push(RunSpec {
                teacher: teacher.clone(),
                learner,
            });
        }
    }
    Ok(specs)
}

/// All runs of one configuration and their mean.
#[derive(Debug, Clone)]
pub struct ConfigurationOutcome {
    pub spec: RunSpec,
    pub results: Vec<TeachingResult>,
    pub average: TeachingResult,
}

#[derive(Debug, Clone, Default)]
pub struct ExperimentReport {
    pub outcomes: Vec<ConfigurationOutcome>,
}

impl ExperimentReport {
    pub fn all_results(&self) -> impl Iterator<Item = &TeachingResult> {
        self.outcomes.iter().flat_map(|outcome| outcome.results.iter())
    }

    pub fn averages(&self) -> Vec<&TeachingResult> {
        self.outcomes.iter().map(|outcome| &outcome.average).collect()
    }
}

/// One protocol run with its own teacher and learner instances.
pub fn run_once(
    spec: &RunSpec,
    dataset: &Dataset,
    validation: Option<&Dataset>,
    options: &config::TeachOptions,
) -> Result<TeachingResult> {
    let mut teacher = build_teacher(spec.teacher.clone())?;
    let learner = build_learner(spec.learner.clone());
    teach(teacher.as_mut(), learner, dataset, validation, options)
}

/// Run every configuration `config.repetitions` times in parallel.
pub fn run_configuration(
    config: &ExperimentConfig,
    dataset: &Dataset,
    validation: Option<&Dataset>,
) -> Result<ExperimentReport> {
    if config.repetitions == 0 {
        return Err(anyhow!("An experiment needs at least one repetition"));
    }
    let specs = expand_configuration(config)?;
    let jobs: Vec<(usize, usize)> = (0..specs.len())
        .flat_map(|spec_idx| (0..config.repetitions).map(move |rep| (spec_idx, rep)))
        .collect();

    log::info!(
        "Running {} configurations x {} repetitions of {} with {}",
        specs.len(),
        config.repetitions,
        config.teacher.name,
        config.learner.name
    );

    let finished = AtomicUsize::new(0);
    let results = jobs
        .par_iter()
        .map(|&(spec_idx, rep)| {
            let result = run_once(&specs[spec_idx], dataset, validation, &config.protocol)
                .with_context(|| {
                    format!(
                        "Run {} of configuration {} failed: {:?}",
                        rep + 1,
                        spec_idx + 1,
                        specs[spec_idx]
                    )
                })?;
            let done = finished.fetch_add(1, Ordering::AcqRel) + 1;
            log::info!(
                "Finished run {}/{}: accuracy {:.4} with {} training ids",
                done,
                jobs.len(),
                result.summary.accuracy,
                result.training_ids.len()
            );
            Ok((spec_idx, result))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut grouped: Vec<Vec<TeachingResult>> = vec![Vec::new(); specs.len()];
    for (spec_idx, result) in results {
        grouped[spec_idx].push(result);
    }

    let outcomes = specs
        .into_iter()
        .zip(grouped)
        .map(|(spec, results)| {
            let average = TeachingResult::average(&results)?;
            Ok(ConfigurationOutcome {
                spec,
                results,
                average,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ExperimentReport { outcomes })
}

/// Write a report per configuration under `dest`: a single run folder when
/// the configuration ran once, a set folder otherwise.
pub fn write_reports<P: AsRef<Path>>(experiment: &ExperimentReport, dest: P) -> Result<()> {
    for outcome in &experiment.outcomes {
        if let [single] = outcome.results.as_slice() {
            report::create_report(single, dest.as_ref())?;
        } else {
            report::create_reports(&outcome.results, dest.as_ref())?;
        }
    }
    Ok(())
}

fn load_and_run(path: &Path) -> Result<(ExperimentConfig, ExperimentReport)> {
    let config = config::load_experiment_config(path)?;
    let dataset_config = config.dataset.as_ref().ok_or_else(|| {
        anyhow!("Experiment file {} has no dataset section", path.display())
    })?;
    let (dataset, validation) = io::read_train_test_csv(dataset_config)?;

    let experiment = run_configuration(&config, &dataset, validation.as_ref())?;
    Ok((config, experiment))
}

/// Load an experiment file, read its dataset, run it and write its reports
/// to the configured destination (if any).
pub fn run_experiment_file<P: AsRef<Path>>(path: P) -> Result<ExperimentReport> {
    let (config, experiment) = load_and_run(path.as_ref())?;
    if let Some(destination) = &config.destination {
        write_reports(&experiment, destination)?;
    }
    Ok(experiment)
}

/// Everything produced by `run_configuration_folder`.
#[derive(Debug, Clone)]
pub struct FamilyReport {
    /// The `family_<timestamp>` folder holding one set folder per file.
    pub folder: PathBuf,
    pub files: Vec<PathBuf>,
    pub experiments: Vec<ExperimentReport>,
    /// Mean of all runs of each file, in file order.
    pub averages: Vec<TeachingResult>,
}

/// Run every `.json` experiment file of `folder` in name order.
///
/// Reports go to a new `family_<timestamp>` folder under `dest`, one set
/// folder per file, whatever destination the files name themselves. The
/// family folder also gets a `summaries.csv` with one averaged line per file.
pub fn run_configuration_folder<P: AsRef<Path>, Q: AsRef<Path>>(
    folder: P,
    dest: Q,
) -> Result<FamilyReport> {
    let folder = folder.as_ref();
    let mut files = fs::read_dir(folder)
        .with_context(|| format!("Failed to read configuration folder: {}", folder.display()))?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<std::io::Result<Vec<PathBuf>>>()?;
    files.retain(|path| path.is_file() && path.extension().map_or(false, |ext| ext == "json"));
    files.sort();
    if files.is_empty() {
        return Err(anyhow!(
            "No experiment files (*.json) in {}",
            folder.display()
        ));
    }

    let family = report::create_family_folder(dest.as_ref())?;
    log::info!(
        "Running {} experiment files from {} into {}",
        files.len(),
        folder.display(),
        family.display()
    );

    let mut experiments = Vec::with_capacity(files.len());
    let mut averages = Vec::with_capacity(files.len());
    for file in &files {
        let (_, experiment) = load_and_run(file)
            .with_context(|| format!("Experiment file {} failed", file.display()))?;
        let results: Vec<TeachingResult> = experiment.all_results().cloned().collect();
        report::create_reports(&results, &family)?;
        averages.push(TeachingResult::average(&results)?);
        experiments.push(experiment);
    }
    report::write_summaries_csv(&averages, family.join("summaries.csv"))?;

    Ok(FamilyReport {
        folder: family,
        files,
        experiments,
        averages,
    })
}
