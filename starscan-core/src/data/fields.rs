//! Kline field codes and the logical→physical column aliases.
//!
//! The remote source addresses kline columns by code (`f51`, `f53`, ...).
//! New files are written with readable names, but files written by older
//! tooling still carry the raw codes, so every logical field keeps a
//! prioritized list of physical names.

/// Remote `fields2` code → column name.
const FIELD_NAMES: [(&str, &str); 11] = [
    ("f51", "date"),
    ("f52", "open"),
    ("f53", "close"),
    ("f54", "high"),
    ("f55", "low"),
    ("f56", "volume"),
    ("f57", "amount"),
    ("f58", "amplitude"),
    ("f59", "pct_chg"),
    ("f60", "chg"),
    ("f61", "turnover"),
];

/// Split a comma-separated field list, trimming and dropping blanks.
pub fn parse_field_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(String::from)
        .collect()
}

/// Readable name for a field code; unknown codes keep the code itself.
pub fn field_name(code: &str) -> &str {
    FIELD_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
        .unwrap_or(code)
}

/// Logical fields the parser and merge engine need to locate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalField {
    Date,
    Close,
    High,
    Code,
    Name,
}

impl LogicalField {
    /// Physical column names, most preferred first.
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            LogicalField::Date => &["date", "f51"],
            LogicalField::Close => &["close", "f53"],
            LogicalField::High => &["high", "f54"],
            LogicalField::Code => &["code"],
            LogicalField::Name => &["name"],
        }
    }

    pub fn as_str(self) -> &'static str {
        self.candidates()[0]
    }

    /// Index of the first candidate present in `header`.
    pub fn resolve<S: AsRef<str>>(self, header: &[S]) -> Option<usize> {
        self.candidates()
            .iter()
            .find_map(|cand| header.iter().position(|h| h.as_ref() == *cand))
    }
}

/// Ordered kline column names derived from a `fields2` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KlineSchema {
    fields: Vec<String>,
}

impl KlineSchema {
    pub fn from_codes(fields2: &str) -> Self {
        let fields = parse_field_list(fields2)
            .iter()
            .map(|code| field_name(code).to_string())
            .collect();
        Self { fields }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Name of the date column, when the field list requests one.
    pub fn date_field(&self) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.as_str() == LogicalField::Date.as_str())
            .map(String::as_str)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f == name)
    }
}
