//! Detectors driven end to end from CSV text through the series parser.

use starscan_core::data::{RecordSet, SeriesParser};
use starscan_core::domain::{PriceField, Series};
use starscan_core::signals::{
    BandTrend, BandTrendConfig, Detector, MaCross, MaCrossConfig, NewHigh, NewHighConfig,
    SignalRow,
};

/// Build a persisted-style file body: `code,name,date,close,high`.
fn csv_body(rows: &[(&str, f64, f64)]) -> String {
    let mut body = String::from("code,name,date,close,high\n");
    for (date, close, high) in rows {
        body.push_str(&format!("688001,HY,{date},{close},{high}\n"));
    }
    body
}

fn parse(body: &str, field: PriceField) -> Series {
    let records = RecordSet::from_reader(body.as_bytes()).unwrap();
    SeriesParser::new(field).parse(&records).unwrap()
}

fn dates(n: usize) -> Vec<String> {
    let base = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    (0..n)
        .map(|i| (base + chrono::Duration::days(i as i64)).format("%Y-%m-%d").to_string())
        .collect()
}

#[test]
fn crossover_reports_original_date_spelling() {
    let closes = [10.0, 10.0, 10.0, 9.0, 9.0, 9.0, 11.0, 11.0];
    let days = dates(closes.len());
    // Written out of order; the parser sorts.
    let mut rows: Vec<(&str, f64, f64)> = days
        .iter()
        .zip(closes)
        .map(|(d, c)| (d.as_str(), c, c + 0.5))
        .collect();
    rows.reverse();

    let series = parse(&csv_body(&rows), PriceField::Close);
    let detector = MaCross::new(MaCrossConfig {
        window_days: 20,
        ma_window: 3,
    })
    .unwrap();
    let hit = detector.detect(&series).unwrap();

    assert_eq!(hit.down_date, "2024-03-04");
    assert_eq!(hit.up_date, "2024-03-06");
    assert_eq!(hit.last_date, "2024-03-08");
    assert_eq!(hit.values().len(), 7);
}

#[test]
fn new_high_on_high_column_keeps_close() {
    let days = dates(5);
    let rows: Vec<(&str, f64, f64)> = days
        .iter()
        .zip([5.0, 6.0, 7.0, 6.0, 8.0])
        .map(|(d, h)| (d.as_str(), h - 1.0, h))
        .collect();
    let series = parse(&csv_body(&rows), PriceField::High);

    let detector = NewHigh::new(NewHighConfig {
        window_days: 4,
        ..NewHighConfig::default()
    })
    .unwrap();
    let hit = detector.detect(&series).unwrap();
    assert_eq!(hit.last_high, Some(8.0));
    assert_eq!(hit.last_close, Some(7.0));
    assert_eq!(hit.values()[0], "high");
}

#[test]
fn new_high_needs_high_column() {
    let body = "date,close\n2024-03-01,1\n2024-03-02,2\n";
    let records = RecordSet::from_reader(body.as_bytes()).unwrap();
    assert!(SeriesParser::new(PriceField::High).parse(&records).is_err());
}

#[test]
fn band_trend_on_legacy_field_codes() {
    let days = dates(40);
    let mut body = String::from("f51,f53\n");
    for (i, d) in days.iter().enumerate() {
        body.push_str(&format!("{d},{}\n", 50.0 + i as f64 * 0.05));
    }
    let series = parse(&body, PriceField::Close);
    assert!(series.code.is_empty());

    let detector = BandTrend::new(BandTrendConfig::default()).unwrap();
    let hit = detector.detect(&series).unwrap();
    assert_eq!(hit.ma_window, 20);
    assert_eq!(hit.start_date, "2024-03-31");
    assert_eq!(hit.end_date, "2024-04-09");
}

#[test]
fn generic_runner_accepts_any_detector() {
    fn run<D: Detector>(detector: &D, series: &Series) -> Option<Vec<String>> {
        detector.detect(series).map(|hit| hit.values())
    }

    let days = dates(3);
    let rows: Vec<(&str, f64, f64)> = days
        .iter()
        .zip([1.0, 2.0, 3.0])
        .map(|(d, c)| (d.as_str(), c, c))
        .collect();
    let series = parse(&csv_body(&rows), PriceField::Close);

    let cross = MaCross::new(MaCrossConfig::default()).unwrap();
    assert!(run(&cross, &series).is_none());
    assert_eq!(cross.price_field(), PriceField::Close);
}
