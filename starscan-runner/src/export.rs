//! Result export: detector matches as CSV.
//!
//! The output file is always rewritten with a header, even when nothing
//! matched, so a stale result never survives a scan.

use std::path::Path;

use anyhow::{Context, Result};
use starscan_core::signals::{ResultSet, SignalRow};

/// Render a result set as CSV text.
pub fn results_csv<H: SignalRow>(results: &ResultSet<H>) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(results.header())?;
    for row in results.rows() {
        wtr.write_record(&row)?;
    }
    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

/// Write a result set to `path`, creating parent directories.
pub fn write_results<H: SignalRow>(path: &Path, results: &ResultSet<H>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let body = results_csv(results)?;
    std::fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))
}
