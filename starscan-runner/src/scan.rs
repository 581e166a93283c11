//! Batch signal scan over a directory of persisted series.
//!
//! Files are evaluated in parallel; the result set sorts its matches, so the
//! output does not depend on directory order or thread scheduling.

use rayon::prelude::*;
use starscan_core::data::{RecordSet, SeriesParser};
use starscan_core::signals::{Detector, Match, ResultSet, ScanOutcome};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("data directory not found: {0}")]
    MissingDataDir(PathBuf),

    #[error("failed to list {path}: {source}")]
    List {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// `*.csv` files directly under `dir`, sorted by name.
pub fn list_series_files(dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    if !dir.is_dir() {
        return Err(ScanError::MissingDataDir(dir.to_path_buf()));
    }
    let entries = std::fs::read_dir(dir).map_err(|source| ScanError::List {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    files.sort();
    Ok(files)
}

/// Parse one file and run the detector on it.
pub fn scan_file<D: Detector>(detector: &D, path: &Path) -> ScanOutcome<D::Hit> {
    let records = match RecordSet::from_path(path) {
        Ok(records) => records,
        Err(e) => {
            tracing::debug!(path = %path.display(), "unreadable series: {e}");
            return ScanOutcome::Skipped;
        }
    };
    let series = match SeriesParser::new(detector.price_field()).parse(&records) {
        Ok(series) => series,
        Err(e) => {
            tracing::debug!(path = %path.display(), "no series: {e}");
            return ScanOutcome::Skipped;
        }
    };

    match detector.detect(&series) {
        Some(hit) => {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            let source = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
            ScanOutcome::Matched(Match::new(&series.code, stem, &series.name, source, hit))
        }
        None => ScanOutcome::NoSignal,
    }
}

/// Run `detector` over every series file in `dir`.
pub fn run_scan<D: Detector>(detector: &D, dir: &Path) -> Result<ResultSet<D::Hit>, ScanError> {
    let files = list_series_files(dir)?;
    let results: ResultSet<D::Hit> = files
        .par_iter()
        .map(|path| scan_file(detector, path))
        .collect::<Vec<_>>()
        .into_iter()
        .collect();

    tracing::info!(
        detector = detector.name(),
        scanned = results.scanned(),
        skipped = results.skipped(),
        matched = results.matched(),
        "scan finished"
    );
    Ok(results)
}

/// Scan `dir` and write the results to `out`.
///
/// A missing data directory fails before any output is written.
pub fn scan_to_file<D: Detector>(
    detector: &D,
    dir: &Path,
    out: &Path,
) -> anyhow::Result<ResultSet<D::Hit>> {
    let results = run_scan(detector, dir)?;
    crate::export::write_results(out, &results)?;
    Ok(results)
}
