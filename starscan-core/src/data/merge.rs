//! Incremental merge engine.
//!
//! Decides where a fetch must start for one instrument and reconciles the
//! fetched rows against what is already on disk:
//!
//! - the fetch starts at the latest persisted date (unless overwriting), never
//!   before the requested begin or the recency floor
//! - rows already persisted are dropped, never rewritten
//! - the persisted header wins over the freshly computed one; extra computed
//!   fields are reported and discarded
//! - rows are validated and ordered before they reach the file, so an append
//!   keeps the file strictly increasing by date
//!
//! Everything here is pure; `SeriesStore::apply` performs the resulting write.

use super::fields::{field_name, KlineSchema, LogicalField};
use super::parser::{parse_price, RecordSet};
use super::provider::KlinePayload;
use crate::domain::{Instrument, TradeDate, IDENTITY_FIELDS};
use chrono::{Days, NaiveDate};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Lower bound for "last N days" mode: `today - (N - 1)` days.
///
/// `None` when `recent_days` is unset or zero, or reaches before the
/// earliest representable date.
pub fn recency_floor(today: NaiveDate, recent_days: Option<u32>) -> Option<TradeDate> {
    let days = recent_days.filter(|d| *d > 0)?;
    let start = today.checked_sub_days(Days::new(u64::from(days - 1)))?;
    Some(TradeDate::from_naive(start))
}

/// What the caller asked for, before looking at the persisted series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    pub begin: TradeDate,
    pub end: TradeDate,
    pub overwrite: bool,
    pub recency_floor: Option<TradeDate>,
}

impl FetchRequest {
    /// `max(begin, latest persisted date unless overwriting, recency floor)`.
    pub fn effective_begin(&self, state: &PersistedState) -> TradeDate {
        let mut begin = self.begin;
        if !self.overwrite {
            if let Some(latest) = state.latest {
                begin = begin.max(latest);
            }
        }
        if let Some(floor) = self.recency_floor {
            begin = begin.max(floor);
        }
        begin
    }
}

/// What is already on disk for one instrument.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedState {
    /// `None` when the file does not exist or has no header line.
    pub header: Option<Vec<String>>,
    pub dates: HashSet<TradeDate>,
    pub latest: Option<TradeDate>,
}

impl PersistedState {
    /// State of an instrument with no file.
    pub fn absent() -> Self {
        Self::default()
    }

    /// Collect header and date set from a persisted record set.
    ///
    /// Without a date column the header is kept but no dates are known.
    pub fn from_records(records: &RecordSet) -> Self {
        let header = records.header();
        if header.is_empty() {
            return Self::absent();
        }

        let mut dates = HashSet::new();
        if let Some(col) = LogicalField::Date.resolve(header) {
            for row in records.rows() {
                if let Some(date) = row.get(col).and_then(TradeDate::parse) {
                    dates.insert(date);
                }
            }
        }
        let latest = dates.iter().max().copied();

        Self {
            header: Some(header.to_vec()),
            dates,
            latest,
        }
    }
}

/// One fetched row keyed by column name, before projection onto the header.
pub type StagedRow = HashMap<String, String>;

fn meta_column(key: &str) -> String {
    format!("meta_{key}")
}

fn is_identity(key: &str) -> bool {
    IDENTITY_FIELDS.contains(&key)
}

/// Value of persisted column `col` in a staged row.
///
/// Files written by older tooling name kline columns by code (`f51`), so a
/// column that is not a staged key directly is looked up by its field name.
fn staged_value(row: &StagedRow, col: &str) -> String {
    row.get(col)
        .or_else(|| row.get(field_name(col)))
        .cloned()
        .unwrap_or_default()
}

/// Header for a new file: identity fields, kline fields, then `meta_*` keys.
pub fn build_header(instrument: &Instrument, schema: &KlineSchema, payload: &KlinePayload) -> Vec<String> {
    let mut header: Vec<String> = instrument
        .identity()
        .iter()
        .map(|(k, _)| k.to_string())
        .collect();
    header.extend(schema.fields().iter().cloned());
    header.extend(
        payload
            .meta
            .iter()
            .filter(|(key, _)| !is_identity(key))
            .map(|(key, _)| meta_column(key)),
    );
    header
}

/// Expand each kline string into a keyed row.
///
/// Values are positional against the kline schema; a short kline leaves the
/// trailing fields empty.
pub fn build_rows(instrument: &Instrument, schema: &KlineSchema, payload: &KlinePayload) -> Vec<StagedRow> {
    payload
        .klines
        .iter()
        .map(|raw| {
            let mut row: StagedRow = instrument
                .identity()
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            let mut values = raw.split(',');
            for field in schema.fields() {
                row.insert(field.clone(), values.next().unwrap_or("").to_string());
            }
            for (key, value) in &payload.meta {
                if !is_identity(key) {
                    row.insert(meta_column(key), value.clone());
                }
            }
            row
        })
        .collect()
}

/// Why an instrument produced nothing to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No data object, or the fetch failed.
    EmptyResponse,
    /// The data object had no usable kline rows.
    NoRows,
    /// Every fetched row was already persisted.
    AllDuplicates,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            SkipReason::EmptyResponse => "empty response",
            SkipReason::NoRows => "no kline rows",
            SkipReason::AllDuplicates => "no new rows",
        };
        f.write_str(msg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Append,
    Overwrite,
}

/// Rows removed during reconciliation, by cause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropStats {
    /// Unparseable date or close.
    pub invalid: usize,
    /// Date already persisted, or repeated within the fetch.
    pub duplicates: usize,
    /// Older than the latest persisted date.
    pub stale: usize,
}

/// A reconciled write, ready for the store.
#[derive(Debug, Clone, PartialEq)]
pub struct WritePlan {
    pub header: Vec<String>,
    /// Rows projected onto `header`.
    pub rows: Vec<Vec<String>>,
    /// Computed fields the persisted header lacks, sorted.
    pub missing_fields: Vec<String>,
    pub mode: WriteMode,
    pub dropped: DropStats,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    Write(WritePlan),
    Skip(SkipReason),
}

/// Reconciles fetched klines against one instrument's persisted state.
#[derive(Debug, Clone, Copy)]
pub struct MergeEngine<'a> {
    schema: &'a KlineSchema,
    overwrite: bool,
}

impl<'a> MergeEngine<'a> {
    pub fn new(schema: &'a KlineSchema, overwrite: bool) -> Self {
        Self { schema, overwrite }
    }

    pub fn reconcile(
        &self,
        instrument: &Instrument,
        payload: Option<&KlinePayload>,
        state: &PersistedState,
    ) -> MergeOutcome {
        let Some(payload) = payload.filter(|p| !p.is_empty()) else {
            return MergeOutcome::Skip(SkipReason::EmptyResponse);
        };

        let rows = build_rows(instrument, self.schema, payload);
        if rows.is_empty() {
            return MergeOutcome::Skip(SkipReason::NoRows);
        }

        let computed = build_header(instrument, self.schema, payload);
        let existing = if self.overwrite {
            None
        } else {
            state.header.as_ref()
        };
        let missing_fields = match existing {
            Some(existing) => {
                let present: HashSet<&str> = existing
                    .iter()
                    .flat_map(|col| [col.as_str(), field_name(col)])
                    .collect();
                let mut missing: Vec<String> = computed
                    .iter()
                    .filter(|f| !present.contains(f.as_str()))
                    .cloned()
                    .collect();
                missing.sort();
                missing.dedup();
                missing
            }
            None => Vec::new(),
        };
        if !missing_fields.is_empty() {
            tracing::warn!(code = %instrument.code, missing = ?missing_fields, "header missing fields");
        }
        let header = existing.cloned().unwrap_or(computed);

        let mut dropped = DropStats::default();
        let rows = match self.schema.date_field() {
            Some(date_field) => {
                let kept = self.order_rows(rows, date_field, state, &mut dropped);
                if kept.is_empty() {
                    let reason = if dropped.invalid > 0 && dropped.duplicates + dropped.stale == 0 {
                        SkipReason::NoRows
                    } else {
                        SkipReason::AllDuplicates
                    };
                    return MergeOutcome::Skip(reason);
                }
                kept
            }
            None => rows,
        };

        let rows = rows
            .iter()
            .map(|row| {
                header
                    .iter()
                    .map(|col| staged_value(row, col))
                    .collect()
            })
            .collect();

        MergeOutcome::Write(WritePlan {
            header,
            rows,
            missing_fields,
            mode: if self.overwrite {
                WriteMode::Overwrite
            } else {
                WriteMode::Append
            },
            dropped,
        })
    }

    /// Validate, sort and deduplicate rows by date.
    fn order_rows(
        &self,
        rows: Vec<StagedRow>,
        date_field: &str,
        state: &PersistedState,
        dropped: &mut DropStats,
    ) -> Vec<StagedRow> {
        let close_field = LogicalField::Close.as_str();
        let check_close = self.schema.has_field(close_field);

        let mut dated: Vec<(TradeDate, StagedRow)> = Vec::with_capacity(rows.len());
        for row in rows {
            let date = row.get(date_field).and_then(|v| TradeDate::parse(v));
            let close_ok = !check_close
                || row
                    .get(close_field)
                    .and_then(|v| parse_price(v))
                    .is_some();
            match date {
                Some(date) if close_ok => dated.push((date, row)),
                _ => dropped.invalid += 1,
            }
        }

        dated.sort_by_key(|(date, _)| *date);

        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(dated.len());
        for (date, row) in dated {
            if !seen.insert(date) {
                dropped.duplicates += 1;
                continue;
            }
            if !self.overwrite {
                if state.dates.contains(&date) {
                    dropped.duplicates += 1;
                    continue;
                }
                if state.latest.is_some_and(|latest| date <= latest) {
                    dropped.stale += 1;
                    continue;
                }
            }
            kept.push(row);
        }
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> KlineSchema {
        KlineSchema::from_codes("f51,f53,f56")
    }

    fn payload(klines: &[&str]) -> KlinePayload {
        KlinePayload {
            klines: klines.iter().map(|s| s.to_string()).collect(),
            meta: vec![
                ("code".into(), "688001".into()),
                ("decimal".into(), "2".into()),
            ],
        }
    }

    fn inst() -> Instrument {
        Instrument::new("688001", "HY", "1")
    }

    fn state(header: &[&str], dates: &[u32]) -> PersistedState {
        let dates: HashSet<TradeDate> = dates.iter().map(|d| TradeDate::new(*d)).collect();
        PersistedState {
            header: Some(header.iter().map(|s| s.to_string()).collect()),
            latest: dates.iter().max().copied(),
            dates,
        }
    }

    fn plan(outcome: MergeOutcome) -> WritePlan {
        match outcome {
            MergeOutcome::Write(plan) => plan,
            MergeOutcome::Skip(reason) => panic!("expected write, got skip: {reason}"),
        }
    }

    #[test]
    fn recency_floor_counts_today() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert_eq!(recency_floor(today, Some(1)), Some(TradeDate::new(20240310)));
        assert_eq!(recency_floor(today, Some(10)), Some(TradeDate::new(20240301)));
        assert_eq!(recency_floor(today, Some(0)), None);
        assert_eq!(recency_floor(today, None), None);
        assert_eq!(recency_floor(today, Some(4_000_000_000)), None);
    }

    #[test]
    fn effective_begin_takes_the_maximum() {
        let st = state(&["date"], &[20240105, 20240110]);
        let req = FetchRequest {
            begin: TradeDate::new(20240101),
            end: TradeDate::new(20500101),
            overwrite: false,
            recency_floor: None,
        };
        assert_eq!(req.effective_begin(&st), TradeDate::new(20240110));

        let with_floor = FetchRequest {
            recency_floor: Some(TradeDate::new(20240201)),
            ..req
        };
        assert_eq!(with_floor.effective_begin(&st), TradeDate::new(20240201));

        let overwrite = FetchRequest {
            overwrite: true,
            ..req
        };
        assert_eq!(overwrite.effective_begin(&st), TradeDate::new(20240101));
    }

    #[test]
    fn first_run_with_recency_floor_is_bounded() {
        let req = FetchRequest {
            begin: TradeDate::MIN,
            end: TradeDate::new(20500101),
            overwrite: false,
            recency_floor: Some(TradeDate::new(20240301)),
        };
        assert_eq!(
            req.effective_begin(&PersistedState::absent()),
            TradeDate::new(20240301)
        );
    }

    #[test]
    fn new_file_uses_computed_header() {
        let schema = schema();
        let engine = MergeEngine::new(&schema, false);
        let p = payload(&["2024-01-02,10.0,100", "2024-01-03,10.5,120"]);
        let plan = plan(engine.reconcile(&inst(), Some(&p), &PersistedState::absent()));

        assert_eq!(
            plan.header,
            ["code", "name", "market", "secid", "date", "close", "volume", "meta_decimal"]
        );
        assert_eq!(
            plan.rows[0],
            ["688001", "HY", "1", "1.688001", "2024-01-02", "10.0", "100", "2"]
        );
        assert_eq!(plan.mode, WriteMode::Append);
        assert!(plan.missing_fields.is_empty());
    }

    #[test]
    fn persisted_dates_are_dropped() {
        let schema = schema();
        let engine = MergeEngine::new(&schema, false);
        let st = state(&["date", "close"], &[20240102, 20240103]);
        let p = payload(&["2024-01-03,10.5,120", "2024-01-04,11.0,130"]);
        let plan = plan(engine.reconcile(&inst(), Some(&p), &st));

        assert_eq!(plan.rows, vec![vec!["2024-01-04".to_string(), "11.0".to_string()]]);
        assert_eq!(plan.dropped.duplicates, 1);
    }

    #[test]
    fn narrower_persisted_header_wins() {
        let schema = schema();
        let engine = MergeEngine::new(&schema, false);
        let st = state(&["date", "close"], &[]);
        let p = payload(&["2024-01-02,10.0,100"]);
        let plan = plan(engine.reconcile(&inst(), Some(&p), &st));

        assert_eq!(plan.header, ["date", "close"]);
        assert_eq!(plan.rows[0], ["2024-01-02", "10.0"]);
        assert!(plan.missing_fields.contains(&"volume".to_string()));
        assert!(plan.missing_fields.contains(&"meta_decimal".to_string()));
        let mut sorted = plan.missing_fields.clone();
        sorted.sort();
        assert_eq!(plan.missing_fields, sorted);
    }

    #[test]
    fn code_named_header_reads_fields_by_alias() {
        let schema = KlineSchema::from_codes("f51,f53");
        let engine = MergeEngine::new(&schema, false);
        let st = state(&["f51", "f53"], &[20240102]);
        let p = payload(&["2024-01-02,10.0", "2024-01-03,11.0"]);
        let plan = plan(engine.reconcile(&inst(), Some(&p), &st));

        assert_eq!(plan.header, ["f51", "f53"]);
        assert_eq!(plan.rows, vec![vec!["2024-01-03".to_string(), "11.0".to_string()]]);
        assert!(!plan.missing_fields.contains(&"date".to_string()));
        assert!(!plan.missing_fields.contains(&"close".to_string()));
        assert!(plan.missing_fields.contains(&"meta_decimal".to_string()));
    }

    #[test]
    fn out_of_order_rows_are_sorted() {
        let schema = schema();
        let engine = MergeEngine::new(&schema, false);
        let p = payload(&[
            "2024-01-05,12,1",
            "2024-01-03,10,1",
            "bad,1,1",
            "2024-01-04,11,1",
            "2024-01-03,99,1",
        ]);
        let st = state(&["date", "close"], &[]);
        let plan = plan(engine.reconcile(&inst(), Some(&p), &st));

        let dates: Vec<&str> = plan.rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(dates, ["2024-01-03", "2024-01-04", "2024-01-05"]);
        assert_eq!(plan.rows[0][1], "10");
        assert_eq!(plan.dropped.invalid, 1);
        assert_eq!(plan.dropped.duplicates, 1);
    }

    #[test]
    fn rows_older_than_latest_are_stale() {
        let schema = schema();
        let engine = MergeEngine::new(&schema, false);
        let st = state(&["date", "close"], &[20240102, 20240110]);
        let p = payload(&["2024-01-05,10,1", "2024-01-11,11,1"]);
        let plan = plan(engine.reconcile(&inst(), Some(&p), &st));

        assert_eq!(plan.rows.len(), 1);
        assert_eq!(plan.rows[0][0], "2024-01-11");
        assert_eq!(plan.dropped.stale, 1);
    }

    #[test]
    fn all_duplicates_skip() {
        let schema = schema();
        let engine = MergeEngine::new(&schema, false);
        let st = state(&["date", "close"], &[20240102]);
        let p = payload(&["2024-01-02,10,1"]);
        assert_eq!(
            engine.reconcile(&inst(), Some(&p), &st),
            MergeOutcome::Skip(SkipReason::AllDuplicates)
        );
    }

    #[test]
    fn empty_payloads_skip() {
        let schema = schema();
        let engine = MergeEngine::new(&schema, false);
        let st = PersistedState::absent();
        assert_eq!(
            engine.reconcile(&inst(), None, &st),
            MergeOutcome::Skip(SkipReason::EmptyResponse)
        );
        assert_eq!(
            engine.reconcile(&inst(), Some(&KlinePayload::default()), &st),
            MergeOutcome::Skip(SkipReason::EmptyResponse)
        );
        let no_rows = KlinePayload {
            klines: vec![],
            meta: vec![("name".into(), "HY".into())],
        };
        assert_eq!(
            engine.reconcile(&inst(), Some(&no_rows), &st),
            MergeOutcome::Skip(SkipReason::NoRows)
        );
    }

    #[test]
    fn overwrite_ignores_persisted_state() {
        let schema = schema();
        let engine = MergeEngine::new(&schema, true);
        let st = state(&["date", "close"], &[20240102]);
        let p = payload(&["2024-01-02,10,1"]);
        let plan = plan(engine.reconcile(&inst(), Some(&p), &st));

        assert_eq!(plan.mode, WriteMode::Overwrite);
        assert_eq!(plan.header.len(), 8);
        assert_eq!(plan.rows.len(), 1);
        assert!(plan.missing_fields.is_empty());
    }

    #[test]
    fn schema_without_date_keeps_rows_verbatim() {
        let schema = KlineSchema::from_codes("f53,f56");
        let engine = MergeEngine::new(&schema, false);
        let p = KlinePayload {
            klines: vec!["10,1".into(), "9,2".into()],
            meta: vec![],
        };
        let plan = plan(engine.reconcile(&inst(), Some(&p), &PersistedState::absent()));
        assert_eq!(plan.rows.len(), 2);
        assert_eq!(plan.rows[1][4], "9");
    }

    #[test]
    fn short_kline_fills_blanks() {
        let schema = schema();
        let p = payload(&["2024-01-02,10"]);
        let rows = build_rows(&inst(), &schema, &p);
        assert_eq!(rows[0]["volume"], "");
        assert_eq!(rows[0]["meta_decimal"], "2");
        assert!(!rows[0].contains_key("meta_code"));
    }

    #[test]
    fn persisted_state_from_records() {
        let rs = RecordSet::from_reader(
            "date,close\n2024-01-03,1\n2024-01-02,1\nbad,1\n".as_bytes(),
        )
        .unwrap();
        let st = PersistedState::from_records(&rs);
        assert_eq!(st.latest, Some(TradeDate::new(20240103)));
        assert_eq!(st.dates.len(), 2);

        let no_date = RecordSet::from_reader("close\n1\n".as_bytes()).unwrap();
        let st = PersistedState::from_records(&no_date);
        assert_eq!(st.header, Some(vec!["close".to_string()]));
        assert!(st.latest.is_none());
    }
}
