//! Eastmoney data provider.
//!
//! Fetches daily klines from the `stock/kline/get` endpoint and the instrument
//! universe from the paginated `clist/get` listing. Every request is retried
//! with exponential backoff (`backoff * 2^attempt`); a request that still
//! fails surfaces as `DataError::RetriesExhausted`.

use super::provider::{DataError, DataProvider, KlinePayload, UniverseProvider};
use crate::domain::{Instrument, TradeDate, DEFAULT_MARKET};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, REFERER, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                          AppleWebKit/537.36 (KHTML, like Gecko) \
                          Chrome/120.0.0.0 Safari/537.36";

/// Columns requested from the listing: code, name, market.
const LIST_FIELDS: &str = "f12,f14,f13";

/// Remote request parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EastmoneyConfig {
    pub kline_url: String,
    pub list_url: String,
    pub fields1: String,
    pub fields2: String,
    /// Kline period; 101 is daily.
    pub klt: u32,
    /// Price adjustment; 1 is forward-adjusted.
    pub fqt: u32,
    pub limit: u32,
    pub ut: Option<String>,
    /// Listing filter; the default selects the STAR board.
    pub list_fs: String,
    pub page_size: u32,
    pub retries: u32,
    pub backoff_secs: f64,
    pub timeout_secs: u64,
    /// Pause between listing pages and between instruments.
    pub sleep_secs: f64,
}

impl Default for EastmoneyConfig {
    fn default() -> Self {
        Self {
            kline_url: "https://push2his.eastmoney.com/api/qt/stock/kline/get".into(),
            list_url: "https://push2.eastmoney.com/api/qt/clist/get".into(),
            fields1: "f1,f2,f3,f4,f5,f6".into(),
            fields2: "f51,f52,f53,f54,f55,f56,f57,f58,f59,f60,f61".into(),
            klt: 101,
            fqt: 1,
            limit: 2000,
            ut: Some("fa5fd1943c7b386f172d6893dbfba10b".into()),
            list_fs: "m:1+t:23".into(),
            page_size: 200,
            retries: 3,
            backoff_secs: 0.6,
            timeout_secs: 10,
            sleep_secs: 0.25,
        }
    }
}

/// Eastmoney data provider.
pub struct EastmoneyProvider {
    client: reqwest::blocking::Client,
    config: EastmoneyConfig,
}

impl EastmoneyProvider {
    pub fn new(config: EastmoneyConfig) -> Result<Self, DataError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_UA));
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(REFERER, HeaderValue::from_static("https://quote.eastmoney.com/"));

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &EastmoneyConfig {
        &self.config
    }

    /// GET `url` and decode JSON, retrying with exponential backoff.
    fn get_json(&self, url: &str, params: &[(&str, String)]) -> Result<Value, DataError> {
        let attempts = self.config.retries.max(1);
        let mut last_error = String::new();

        for attempt in 0..attempts {
            let result = self
                .client
                .get(url)
                .query(params)
                .send()
                .and_then(|resp| resp.error_for_status())
                .and_then(|resp| resp.json::<Value>());

            match result {
                Ok(body) => return Ok(body),
                Err(e) => {
                    tracing::debug!(url, attempt, "request failed: {e}");
                    last_error = e.to_string();
                    if attempt + 1 < attempts {
                        let delay = self.config.backoff_secs * 2f64.powi(attempt.min(16) as i32);
                        std::thread::sleep(Duration::from_secs_f64(delay.max(0.0)));
                    }
                }
            }
        }

        Err(DataError::RetriesExhausted {
            url: url.to_string(),
            attempts,
            reason: last_error,
        })
    }

    fn with_token(&self, mut params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        if let Some(ut) = self.config.ut.as_deref().filter(|ut| !ut.is_empty()) {
            params.push(("ut", ut.to_string()));
        }
        params
    }

    fn list_params(&self, page: u64) -> Vec<(&'static str, String)> {
        self.with_token(vec![
            ("pn", page.to_string()),
            ("pz", self.config.page_size.to_string()),
            ("po", "1".into()),
            ("np", "1".into()),
            ("fltt", "2".into()),
            ("invt", "2".into()),
            ("fs", self.config.list_fs.clone()),
            ("fields", LIST_FIELDS.into()),
        ])
    }
}

impl DataProvider for EastmoneyProvider {
    fn name(&self) -> &str {
        "eastmoney"
    }

    fn fetch_klines(
        &self,
        instrument: &Instrument,
        begin: TradeDate,
        end: TradeDate,
    ) -> Result<Option<KlinePayload>, DataError> {
        let params = self.with_token(vec![
            ("secid", instrument.secid.clone()),
            ("fields1", self.config.fields1.clone()),
            ("fields2", self.config.fields2.clone()),
            ("klt", self.config.klt.to_string()),
            ("fqt", self.config.fqt.to_string()),
            ("beg", begin.value().to_string()),
            ("end", end.value().to_string()),
            ("lmt", self.config.limit.to_string()),
        ]);
        let body = self.get_json(&self.config.kline_url, &params)?;
        Ok(parse_kline_payload(&body))
    }
}

impl UniverseProvider for EastmoneyProvider {
    fn list_instruments(&self, max: Option<usize>) -> Result<Vec<Instrument>, DataError> {
        let body = self.get_json(&self.config.list_url, &self.list_params(1))?;
        let data = body
            .get("data")
            .filter(|d| d.is_object())
            .ok_or_else(|| DataError::ResponseFormatChanged("stock list has no data object".into()))?;

        let first = list_rows(data);
        let total = data
            .get("total")
            .and_then(Value::as_u64)
            .filter(|t| *t > 0)
            .unwrap_or(first.len() as u64);
        let pages = page_count(total, self.config.page_size);

        let mut items = Vec::new();
        if extend_until(&mut items, first, max) {
            return Ok(items);
        }

        for page in 2..=pages {
            if max.is_some_and(|m| m > 0 && items.len() >= m) {
                break;
            }
            let rows = match self.get_json(&self.config.list_url, &self.list_params(page)) {
                Ok(body) => body.get("data").map(list_rows).unwrap_or_default(),
                Err(e) => {
                    tracing::warn!(page, "skipping stock list page: {e}");
                    continue;
                }
            };
            if extend_until(&mut items, rows, max) {
                break;
            }
            std::thread::sleep(Duration::from_secs_f64(self.config.sleep_secs.max(0.0)));
        }

        Ok(items)
    }
}

/// Number of listing pages for `total` rows.
pub fn page_count(total: u64, page_size: u32) -> u64 {
    let size = u64::from(page_size.max(1));
    total.div_ceil(size).max(1)
}

/// Append rows; returns true once `max` items have been collected.
fn extend_until(items: &mut Vec<Instrument>, rows: Vec<Instrument>, max: Option<usize>) -> bool {
    for row in rows {
        items.push(row);
        if max.is_some_and(|m| m > 0 && items.len() >= m) {
            return true;
        }
    }
    false
}

/// JSON scalar as the text written to CSV.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Extract the `data` object of a kline response.
///
/// `None` when `data` is missing, null, not an object, or empty.
pub fn parse_kline_payload(body: &Value) -> Option<KlinePayload> {
    let data = body.get("data")?.as_object()?;
    if data.is_empty() {
        return None;
    }

    let klines = data
        .get("klines")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let meta = data
        .iter()
        .filter(|(key, _)| key.as_str() != "klines")
        .map(|(key, value)| (key.clone(), stringify(value)))
        .collect();

    Some(KlinePayload { klines, meta })
}

/// Instruments from one listing page's `data` object.
pub fn list_rows(data: &Value) -> Vec<Instrument> {
    let rows: Vec<&Value> = match data.get("diff") {
        Some(Value::Array(rows)) => rows.iter().collect(),
        Some(Value::Object(rows)) => rows.values().collect(),
        _ => Vec::new(),
    };

    rows.into_iter()
        .filter_map(|row| {
            let code = row.get("f12").map(stringify).unwrap_or_default();
            let code = code.trim();
            if code.is_empty() {
                return None;
            }
            let name = row.get("f14").map(stringify).unwrap_or_default();
            let market = row.get("f13").map(stringify).unwrap_or_default();
            let market = match market.trim() {
                "" => DEFAULT_MARKET,
                m => m,
            };
            Some(Instrument::new(code, name.trim(), market))
        })
        .collect()
}
