//! Incremental ingest: bring every instrument's persisted series up to date.
//!
//! Instruments are processed one at a time. For each one the persisted state
//! is loaded, the fetch window is narrowed to what is missing, the fetched
//! klines are reconciled by the merge engine, and the result is written.
//! A failure on one instrument is recorded and the loop moves on.

use crate::config::FetchConfig;
use chrono::NaiveDate;
use starscan_core::data::{
    recency_floor, DataError, DataProvider, FetchRequest, KlineSchema, MergeEngine, MergeOutcome,
    PersistedState, SeriesStore, SkipReason, UniverseProvider,
};
use starscan_core::domain::{Instrument, TradeDate};
use std::time::Duration;

/// Resolved per-run ingest parameters.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub schema: KlineSchema,
    pub begin: TradeDate,
    pub end: TradeDate,
    pub overwrite: bool,
    pub recency_floor: Option<TradeDate>,
    /// Pause between instruments.
    pub sleep: Duration,
}

impl IngestOptions {
    pub fn from_config(fetch: &FetchConfig, today: NaiveDate) -> Self {
        Self {
            schema: fetch.schema(),
            begin: fetch.begin,
            end: fetch.end,
            overwrite: fetch.overwrite,
            recency_floor: recency_floor(today, fetch.recent_days),
            sleep: fetch.sleep(),
        }
    }

    fn request(&self) -> FetchRequest {
        FetchRequest {
            begin: self.begin,
            end: self.end,
            overwrite: self.overwrite,
            recency_floor: self.recency_floor,
        }
    }
}

/// What happened to one instrument.
#[derive(Debug, Clone, PartialEq)]
pub enum InstrumentOutcome {
    Written {
        rows: usize,
        /// Computed fields the persisted header lacked.
        missing_fields: Vec<String>,
    },
    Skipped(SkipReason),
    Failed(String),
}

/// Per-instrument progress callbacks.
pub trait UpdateProgress {
    fn on_start(&self, code: &str, index: usize, total: usize);

    fn on_complete(&self, code: &str, index: usize, total: usize, outcome: &InstrumentOutcome);

    fn on_batch_complete(&self, summary: &IngestSummary);
}

/// Prints one line per skipped or failed instrument and a final tally.
pub struct StdoutProgress;

impl UpdateProgress for StdoutProgress {
    fn on_start(&self, _code: &str, _index: usize, _total: usize) {}

    fn on_complete(&self, code: &str, index: usize, total: usize, outcome: &InstrumentOutcome) {
        match outcome {
            InstrumentOutcome::Written { rows, .. } => {
                println!("[{}/{total}] {code}: {rows} rows", index + 1);
            }
            InstrumentOutcome::Skipped(reason) => {
                println!("[{}/{total}] skip {code}: {reason}", index + 1);
            }
            InstrumentOutcome::Failed(err) => {
                println!("[{}/{total}] FAILED {code}: {err}", index + 1);
            }
        }
    }

    fn on_batch_complete(&self, summary: &IngestSummary) {
        println!(
            "updated {} symbols ({} rows), skipped {}, failed {}",
            summary.written,
            summary.rows,
            summary.skipped,
            summary.failed.len()
        );
    }
}

/// Totals for one ingest run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestSummary {
    pub total: usize,
    pub written: usize,
    pub skipped: usize,
    pub rows: usize,
    /// `(code, error)` for instruments whose write failed.
    pub failed: Vec<(String, String)>,
}

impl IngestSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, code: &str, outcome: &InstrumentOutcome) {
        match outcome {
            InstrumentOutcome::Written { rows, .. } => {
                self.written += 1;
                self.rows += rows;
            }
            InstrumentOutcome::Skipped(_) => self.skipped += 1,
            InstrumentOutcome::Failed(err) => self.failed.push((code.to_string(), err.clone())),
        }
    }
}

/// Instruments to update: the explicit code list when given, otherwise the
/// remote listing (which is also persisted to `stock_basic.csv`).
pub fn resolve_universe(
    codes: &[String],
    universe: &dyn UniverseProvider,
    store: &SeriesStore,
    max_stocks: Option<usize>,
    updated_at: &str,
) -> Result<Vec<Instrument>, DataError> {
    let explicit: Vec<Instrument> = codes
        .iter()
        .flat_map(|raw| Instrument::parse_code_list(raw))
        .collect();
    if !explicit.is_empty() {
        return Ok(explicit);
    }

    let instruments = universe.list_instruments(max_stocks)?;
    store.write_universe(&instruments, updated_at)?;
    tracing::info!(count = instruments.len(), "fetched instrument universe");
    Ok(instruments)
}

/// Persisted state as the merge engine may use it.
///
/// Overwrite ignores the file entirely; a schema without a date field keeps
/// the persisted header but cannot deduplicate.
fn persisted_state(
    store: &SeriesStore,
    code: &str,
    opts: &IngestOptions,
) -> Result<PersistedState, DataError> {
    if opts.overwrite {
        return Ok(PersistedState::absent());
    }
    let mut state = store.load_state(code)?;
    if opts.schema.date_field().is_none() {
        state.dates.clear();
        state.latest = None;
    }
    Ok(state)
}

/// Update a single instrument.
pub fn update_instrument(
    provider: &dyn DataProvider,
    store: &SeriesStore,
    instrument: &Instrument,
    opts: &IngestOptions,
) -> InstrumentOutcome {
    let code = instrument.code.as_str();
    let state = match persisted_state(store, code, opts) {
        Ok(state) => state,
        Err(e) => return InstrumentOutcome::Failed(e.to_string()),
    };

    let begin = opts.request().effective_begin(&state);
    let payload = match provider.fetch_klines(instrument, begin, opts.end) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(code, provider = provider.name(), "fetch failed: {e}");
            None
        }
    };

    let engine = MergeEngine::new(&opts.schema, opts.overwrite);
    match engine.reconcile(instrument, payload.as_ref(), &state) {
        MergeOutcome::Skip(reason) => {
            tracing::info!(code, "skip: {reason}");
            InstrumentOutcome::Skipped(reason)
        }
        MergeOutcome::Write(plan) => match store.apply(code, &plan) {
            Ok(rows) => {
                tracing::debug!(code, rows, dropped = ?plan.dropped, "wrote rows");
                InstrumentOutcome::Written {
                    rows,
                    missing_fields: plan.missing_fields,
                }
            }
            Err(e) => InstrumentOutcome::Failed(e.to_string()),
        },
    }
}

/// Update every instrument in order, sleeping between them.
///
/// Only a store that cannot be laid out aborts the run.
pub fn run_update(
    provider: &dyn DataProvider,
    store: &SeriesStore,
    instruments: &[Instrument],
    opts: &IngestOptions,
    progress: Option<&dyn UpdateProgress>,
) -> Result<IngestSummary, DataError> {
    store.ensure_layout()?;

    let total = instruments.len();
    let mut summary = IngestSummary {
        total,
        ..IngestSummary::default()
    };

    for (i, instrument) in instruments.iter().enumerate() {
        let code = instrument.code.as_str();
        if let Some(p) = progress {
            p.on_start(code, i, total);
        }

        let outcome = update_instrument(provider, store, instrument, opts);
        summary.record(code, &outcome);
        if let Some(p) = progress {
            p.on_complete(code, i, total, &outcome);
        }

        if i + 1 < total && !opts.sleep.is_zero() {
            std::thread::sleep(opts.sleep);
        }
    }

    tracing::info!(
        provider = provider.name(),
        written = summary.written,
        skipped = summary.skipped,
        failed = summary.failed.len(),
        rows = summary.rows,
        "ingest finished"
    );
    if let Some(p) = progress {
        p.on_batch_complete(&summary);
    }
    Ok(summary)
}
