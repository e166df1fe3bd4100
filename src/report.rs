//! Report sink: one folder per run holding a text summary and the teaching
//! log as CSV.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use crate::protocol::{TeachingLog, LOG_HEADER};
use crate::result::{TeachingResult, SUMMARY_HEADER};

const SUFFIX_FORMAT: &str = "%Y_%m_%d_%H_%M_%S_%6f";

/// Paths written by `create_report`.
#[derive(Debug, Clone)]
pub struct ReportFiles {
    pub folder: PathBuf,
    pub summary: PathBuf,
    pub log: Option<PathBuf>,
}

fn timestamp() -> String {
    chrono::Local::now().format(SUFFIX_FORMAT).to_string()
}

/// Create `<parent>/<prefix>_<timestamp>`, adding a counter on collision.
fn create_unique_dir(parent: &Path, prefix: &str) -> Result<(PathBuf, String)> {
    if !parent.is_dir() {
        return Err(anyhow!("Report destination is not a folder: {}", parent.display()));
    }
    let stamp = timestamp();
    let mut suffix = stamp.clone();
    let mut attempt = 0;
    loop {
        let folder = parent.join(format!("{}_{}", prefix, suffix));
        match fs::create_dir(&folder) {
            Ok(()) => return Ok((folder, suffix)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                attempt += 1;
                suffix = format!("{}_{}", stamp, attempt);
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to create folder: {}", folder.display()))
            }
        }
    }
}

/// Create the `family_<timestamp>` folder grouping the reports of several
/// experiment files.
pub fn create_family_folder<P: AsRef<Path>>(dest: P) -> Result<PathBuf> {
    let (folder, _) = create_unique_dir(dest.as_ref(), "family")?;
    Ok(folder)
}

/// Write the header and every row of `log` as CSV.
pub fn write_log_csv<P: AsRef<Path>>(log: &TeachingLog, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create log file: {}", path.display()))?;
    writer.write_record(LOG_HEADER)?;
    for row in log.rows() {
        writer.write_record(row.to_record())?;
    }
    writer.flush()?;
    Ok(())
}

/// Write one summary line per result, e.g. for a set of repeated runs.
pub fn write_summaries_csv<P: AsRef<Path>>(results: &[TeachingResult], path: P) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create summary file: {}", path.display()))?;
    writer.write_record(SUMMARY_HEADER)?;
    for result in results {
        writer.write_record(result.summary.to_record())?;
    }
    writer.flush()?;
    Ok(())
}

/// Create `run_<timestamp>/` under `dest` with `summary_<timestamp>.txt`
/// and, when the result carries one, `log_<timestamp>.csv`.
pub fn create_report<P: AsRef<Path>>(result: &TeachingResult, dest: P) -> Result<ReportFiles> {
    let (folder, suffix) = create_unique_dir(dest.as_ref(), "run")?;

    let summary = folder.join(format!("summary_{}.txt", suffix));
    fs::write(&summary, result.to_string())
        .with_context(|| format!("Failed to write summary: {}", summary.display()))?;

    let log = match &result.log {
        Some(teaching_log) => {
            let path = folder.join(format!("log_{}.csv", suffix));
            write_log_csv(teaching_log, &path)?;
            Some(path)
        }
        None => None,
    };

    log::info!("Report written to {}", folder.display());
    Ok(ReportFiles {
        folder,
        summary,
        log,
    })
}

/// Group one report per result under `set_<timestamp>/` and return that folder.
pub fn create_reports<P: AsRef<Path>>(results: &[TeachingResult], dest: P) -> Result<PathBuf> {
    let (folder, _) = create_unique_dir(dest.as_ref(), "set")?;
    for result in results {
        create_report(result, &folder)?;
    }
    write_summaries_csv(results, folder.join("summaries.csv"))?;
    Ok(folder)
}
