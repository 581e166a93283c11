//! Result aggregation for one detector over many instruments.

use super::SignalRow;

/// A matching instrument and its evidence.
#[derive(Debug, Clone, PartialEq)]
pub struct Match<H> {
    pub code: String,
    pub name: String,
    /// File the series was read from.
    pub source: String,
    pub hit: H,
}

impl<H> Match<H> {
    /// Build a match, falling back to `stem` when the series carried no code.
    pub fn new(series_code: &str, stem: &str, name: &str, source: &str, hit: H) -> Self {
        let code = match series_code.trim() {
            "" => stem,
            code => code,
        };
        Self {
            code: code.to_string(),
            name: name.to_string(),
            source: source.to_string(),
            hit,
        }
    }
}

/// What scanning one instrument produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome<H> {
    Matched(Match<H>),
    NoSignal,
    /// The file could not be turned into a series.
    Skipped,
}

/// Matches for one detector, ordered by code then source file.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet<H> {
    matches: Vec<Match<H>>,
    scanned: usize,
    skipped: usize,
}

impl<H> Default for ResultSet<H> {
    fn default() -> Self {
        Self {
            matches: Vec::new(),
            scanned: 0,
            skipped: 0,
        }
    }
}

impl<H> FromIterator<ScanOutcome<H>> for ResultSet<H> {
    fn from_iter<I: IntoIterator<Item = ScanOutcome<H>>>(iter: I) -> Self {
        let mut set = Self::default();
        for outcome in iter {
            set.scanned += 1;
            match outcome {
                ScanOutcome::Matched(m) => set.matches.push(m),
                ScanOutcome::NoSignal => {}
                ScanOutcome::Skipped => set.skipped += 1,
            }
        }
        set.matches
            .sort_by(|a, b| a.code.cmp(&b.code).then_with(|| a.source.cmp(&b.source)));
        set
    }
}

impl<H> ResultSet<H> {
    pub fn matches(&self) -> &[Match<H>] {
        &self.matches
    }

    pub fn matched(&self) -> usize {
        self.matches.len()
    }

    /// Files examined, including skipped ones.
    pub fn scanned(&self) -> usize {
        self.scanned
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<H: SignalRow> ResultSet<H> {
    /// Output header: `code`, `name`, then the detector's columns.
    pub fn header(&self) -> Vec<&'static str> {
        let mut header = vec!["code", "name"];
        header.extend_from_slice(H::columns());
        header
    }

    /// Output rows, aligned with `header()`.
    pub fn rows(&self) -> impl Iterator<Item = Vec<String>> + '_ {
        self.matches.iter().map(|m| {
            let mut row = vec![m.code.clone(), m.name.clone()];
            row.extend(m.hit.values());
            row
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Dummy(u32);

    impl SignalRow for Dummy {
        fn columns() -> &'static [&'static str] {
            &["score"]
        }

        fn values(&self) -> Vec<String> {
            vec![self.0.to_string()]
        }
    }

    fn matched(code: &str, stem: &str, score: u32) -> ScanOutcome<Dummy> {
        ScanOutcome::Matched(Match::new(code, stem, "N", &format!("{stem}.csv"), Dummy(score)))
    }

    #[test]
    fn outcomes_are_counted_and_sorted() {
        let set: ResultSet<Dummy> = vec![
            matched("688003", "688003", 3),
            ScanOutcome::NoSignal,
            matched("688001", "688001", 1),
            ScanOutcome::Skipped,
            matched("", "688002", 2),
        ]
        .into_iter()
        .collect();

        assert_eq!(set.scanned(), 5);
        assert_eq!(set.skipped(), 1);
        assert_eq!(set.matched(), 3);
        let codes: Vec<&str> = set.matches().iter().map(|m| m.code.as_str()).collect();
        assert_eq!(codes, ["688001", "688002", "688003"]);
    }

    #[test]
    fn header_and_rows_align() {
        let set: ResultSet<Dummy> = vec![matched("688001", "x", 7)].into_iter().collect();
        assert_eq!(set.header(), ["code", "name", "score"]);
        let rows: Vec<Vec<String>> = set.rows().collect();
        assert_eq!(rows, vec![vec!["688001", "N", "7"]]);
    }

    #[test]
    fn equal_codes_order_by_source() {
        let set: ResultSet<Dummy> = vec![matched("688001", "b", 2), matched("688001", "a", 1)]
            .into_iter()
            .collect();
        assert_eq!(set.matches()[0].source, "a.csv");
    }
}
