//! CSV series store.
//!
//! Layout:
//! - `{root}/daily/{code}.csv`: one append-only series per instrument
//! - `{root}/stock_basic.csv`: last fetched universe listing
//!
//! Appends open the file in append mode and only write a header when the file
//! is new or empty. Full rewrites (overwrite mode, universe listing) are atomic: write
//! to `.tmp`, then rename into place.

use super::merge::{PersistedState, WriteMode, WritePlan};
use super::parser::RecordSet;
use super::provider::DataError;
use crate::domain::Instrument;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Header of the universe listing.
pub const UNIVERSE_HEADER: [&str; 5] = ["code", "name", "market", "secid", "updated_at"];

/// The on-disk series store.
#[derive(Debug, Clone)]
pub struct SeriesStore {
    root: PathBuf,
}

impl SeriesStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the per-instrument files.
    pub fn daily_dir(&self) -> PathBuf {
        self.root.join("daily")
    }

    pub fn series_path(&self, code: &str) -> PathBuf {
        self.daily_dir().join(format!("{code}.csv"))
    }

    pub fn universe_path(&self) -> PathBuf {
        self.root.join("stock_basic.csv")
    }

    pub fn ensure_layout(&self) -> Result<(), DataError> {
        fs::create_dir_all(self.daily_dir())
            .map_err(|e| DataError::StoreError(format!("failed to create dir: {e}")))
    }

    /// Load header and persisted dates for `code`.
    pub fn load_state(&self, code: &str) -> Result<PersistedState, DataError> {
        let path = self.series_path(code);
        if !path.exists() {
            return Ok(PersistedState::absent());
        }
        let records = RecordSet::from_path(&path)?;
        Ok(PersistedState::from_records(&records))
    }

    /// Execute a reconciled write. Returns the number of rows written.
    pub fn apply(&self, code: &str, plan: &WritePlan) -> Result<usize, DataError> {
        if plan.rows.is_empty() {
            return Ok(0);
        }
        let path = self.series_path(code);

        match plan.mode {
            WriteMode::Overwrite => {
                write_atomic(&path, &plan.header, &plan.rows)?;
            }
            WriteMode::Append => {
                let existed = path.metadata().is_ok_and(|m| m.len() > 0);
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .map_err(|e| DataError::StoreError(format!("open {}: {e}", path.display())))?;
                let header = (!existed).then_some(plan.header.as_slice());
                write_table(file, header, &plan.rows)?;
            }
        }

        Ok(plan.rows.len())
    }

    /// Replace the universe listing, stamping every row with `updated_at`.
    pub fn write_universe(&self, instruments: &[Instrument], updated_at: &str) -> Result<(), DataError> {
        if instruments.is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.root)
            .map_err(|e| DataError::StoreError(format!("failed to create dir: {e}")))?;

        let header: Vec<String> = UNIVERSE_HEADER.iter().map(|s| s.to_string()).collect();
        let rows: Vec<Vec<String>> = instruments
            .iter()
            .map(|i| {
                vec![
                    i.code.clone(),
                    i.name.clone(),
                    i.market.clone(),
                    i.secid.clone(),
                    updated_at.to_string(),
                ]
            })
            .collect();
        write_atomic(&self.universe_path(), &header, &rows)
    }
}

fn write_table<W: Write>(writer: W, header: Option<&[String]>, rows: &[Vec<String>]) -> Result<(), DataError> {
    let mut wtr = csv::Writer::from_writer(writer);
    if let Some(header) = header {
        wtr.write_record(header)?;
    }
    for row in rows {
        wtr.write_record(row)?;
    }
    wtr.flush()
        .map_err(|e| DataError::StoreError(format!("flush: {e}")))
}

fn write_atomic(path: &Path, header: &[String], rows: &[Vec<String>]) -> Result<(), DataError> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let file = fs::File::create(&tmp_path)
        .map_err(|e| DataError::StoreError(format!("create {}: {e}", tmp_path.display())))?;
    write_table(file, Some(header), rows)?;

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        DataError::StoreError(format!("atomic rename failed: {e}"))
    })
}
