use serde::{Deserialize, Serialize};

/// Identity columns every persisted series starts with, in header order.
pub const IDENTITY_FIELDS: [&str; 4] = ["code", "name", "market", "secid"];

/// Market id used when an instrument is given by bare code.
pub const DEFAULT_MARKET: &str = "1";

/// An exchange-listed instrument as known to the remote source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub code: String,
    pub name: String,
    pub market: String,
    /// Remote security id, `{market}.{code}`.
    pub secid: String,
}

impl Instrument {
    pub fn new(code: impl Into<String>, name: impl Into<String>, market: impl Into<String>) -> Self {
        let code = code.into();
        let market = market.into();
        let secid = format!("{market}.{code}");
        Self {
            code,
            name: name.into(),
            market,
            secid,
        }
    }

    /// Instrument from a bare code on the default market, name unknown.
    pub fn from_code(code: impl Into<String>) -> Self {
        Self::new(code, "", DEFAULT_MARKET)
    }

    /// Parse a comma-separated code list, ignoring blanks.
    pub fn parse_code_list(raw: &str) -> Vec<Self> {
        raw.split(',')
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(Self::from_code)
            .collect()
    }

    /// Identity values keyed by their column names.
    pub fn identity(&self) -> [(&'static str, &str); 4] {
        [
            (IDENTITY_FIELDS[0], self.code.as_str()),
            (IDENTITY_FIELDS[1], self.name.as_str()),
            (IDENTITY_FIELDS[2], self.market.as_str()),
            (IDENTITY_FIELDS[3], self.secid.as_str()),
        ]
    }
}
