//! StarScan CLI: incremental kline updates and signal scans.
//!
//! Commands:
//! - `update`: fetch daily klines and merge them into `<out_dir>/daily/<code>.csv`
//! - `scan ma-cross`: drop below a moving average and recovery within N days
//! - `scan band-trend`: close hugging a rising MA20/MA30
//! - `scan new-high`: latest price tops the trailing window
//!
//! Every command starts from defaults, applies `--config <file>` when given,
//! then applies its flags, and validates the result before doing any work.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use starscan_core::data::{EastmoneyProvider, SeriesStore};
use starscan_core::domain::{PriceField, TradeDate};
use starscan_core::signals::{parse_ma_list, BandTrend, Detector, MaCross, NewHigh};
use starscan_runner::{
    resolve_universe, run_update, scan_to_file, AppConfig, IngestOptions, StdoutProgress,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "starscan", about = "StarScan: STAR market daily klines and signal scans")]
struct Cli {
    /// TOML config file; flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Incrementally update per-instrument daily kline files.
    Update(UpdateArgs),
    /// Scan persisted series for a signal.
    Scan {
        #[command(subcommand)]
        detector: ScanCommand,
    },
}

#[derive(Args)]
struct UpdateArgs {
    /// Output directory (holds daily/ and stock_basic.csv).
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Comma-separated stock codes; skips the remote listing.
    #[arg(long)]
    codes: Option<String>,

    /// Limit number of stocks taken from the listing.
    #[arg(long)]
    max_stocks: Option<usize>,

    /// Only fetch the last N calendar days.
    #[arg(long)]
    recent_days: Option<u32>,

    /// Rewrite per-stock files instead of appending.
    #[arg(long, default_value_t = false)]
    overwrite: bool,

    /// Stock list filter for the listing endpoint.
    #[arg(long)]
    list_fs: Option<String>,

    #[arg(long)]
    klt: Option<u32>,

    #[arg(long)]
    fqt: Option<u32>,

    /// First date to fetch (YYYYMMDD or YYYY-MM-DD).
    #[arg(long, value_parser = parse_trade_date)]
    beg: Option<TradeDate>,

    /// Last date to fetch (YYYYMMDD or YYYY-MM-DD).
    #[arg(long, value_parser = parse_trade_date)]
    end: Option<TradeDate>,

    #[arg(long)]
    limit: Option<u32>,

    #[arg(long)]
    fields1: Option<String>,

    #[arg(long)]
    fields2: Option<String>,

    /// Seconds to pause between stocks.
    #[arg(long)]
    sleep: Option<f64>,

    /// Request timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    #[arg(long)]
    retries: Option<u32>,

    /// Base backoff in seconds; doubles per retry.
    #[arg(long)]
    backoff: Option<f64>,

    /// Request token; pass an empty string to omit it.
    #[arg(long)]
    ut: Option<String>,
}

#[derive(Args)]
struct ScanArgs {
    /// Directory of per-instrument CSV files.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Result CSV path.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Subcommand)]
enum ScanCommand {
    /// Crossed below the MA and back above it within the last N days.
    MaCross {
        #[command(flatten)]
        common: ScanArgs,

        /// Trailing trading days to scan.
        #[arg(long)]
        window: Option<usize>,

        /// Moving-average window.
        #[arg(long)]
        ma: Option<usize>,
    },
    /// Close stays near a rising MA over the last N days.
    BandTrend {
        #[command(flatten)]
        common: ScanArgs,

        #[arg(long)]
        window: Option<usize>,

        /// Comma-separated MA windows, tried in order.
        #[arg(long)]
        ma_list: Option<String>,

        /// Max relative distance from the MA.
        #[arg(long)]
        band: Option<f64>,

        /// Days allowed outside the band.
        #[arg(long)]
        max_outside: Option<usize>,

        /// Minimum non-decreasing MA days (default: max(1, window - 4)).
        #[arg(long)]
        min_up_days: Option<usize>,

        /// Minimum MA rise over the window, as a fraction.
        #[arg(long)]
        min_rise_pct: Option<f64>,
    },
    /// Latest price is a new high of the trailing window.
    NewHigh {
        #[command(flatten)]
        common: ScanArgs,

        #[arg(long)]
        window: Option<usize>,

        /// Price field used to determine new highs (high or close).
        #[arg(long)]
        price_field: Option<PriceField>,

        /// Treat equal highs as new highs.
        #[arg(long, default_value_t = false)]
        include_equal: bool,
    },
}

fn parse_trade_date(raw: &str) -> Result<TradeDate, String> {
    TradeDate::parse(raw).ok_or_else(|| format!("invalid date '{raw}' (expected YYYYMMDD)"))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref()).context("failed to load config")?;

    match cli.command {
        Commands::Update(args) => {
            apply_update_args(&mut config, args);
            config.validate().context("invalid configuration")?;
            run_update_cmd(&config)
        }
        Commands::Scan { detector } => run_scan_cmd(&mut config, detector),
    }
}

fn apply_update_args(config: &mut AppConfig, args: UpdateArgs) {
    let fetch = &mut config.fetch;
    let src = &mut fetch.source;

    if let Some(dir) = args.out_dir {
        config.store.out_dir = dir;
    }
    if let Some(codes) = args.codes {
        fetch.codes = vec![codes];
    }
    if args.max_stocks.is_some() {
        fetch.max_stocks = args.max_stocks;
    }
    if args.recent_days.is_some() {
        fetch.recent_days = args.recent_days;
    }
    fetch.overwrite |= args.overwrite;
    if let Some(v) = args.beg {
        fetch.begin = v;
    }
    if let Some(v) = args.end {
        fetch.end = v;
    }
    if let Some(v) = args.list_fs {
        src.list_fs = v;
    }
    if let Some(v) = args.klt {
        src.klt = v;
    }
    if let Some(v) = args.fqt {
        src.fqt = v;
    }
    if let Some(v) = args.limit {
        src.limit = v;
    }
    if let Some(v) = args.fields1 {
        src.fields1 = v;
    }
    if let Some(v) = args.fields2 {
        src.fields2 = v;
    }
    if let Some(v) = args.sleep {
        src.sleep_secs = v;
    }
    if let Some(v) = args.timeout {
        src.timeout_secs = v;
    }
    if let Some(v) = args.retries {
        src.retries = v;
    }
    if let Some(v) = args.backoff {
        src.backoff_secs = v;
    }
    if let Some(v) = args.ut {
        src.ut = Some(v);
    }
}

fn run_update_cmd(config: &AppConfig) -> Result<()> {
    let fetch = &config.fetch;
    let store = SeriesStore::new(&config.store.out_dir);
    let provider = EastmoneyProvider::new(fetch.source.clone())?;

    let now = chrono::Local::now();
    let updated_at = now.format("%Y-%m-%d %H:%M:%S").to_string();
    let instruments = resolve_universe(
        &fetch.codes,
        &provider,
        &store,
        fetch.max_stocks,
        &updated_at,
    )
    .context("failed to resolve instrument universe")?;

    let opts = IngestOptions::from_config(fetch, now.date_naive());
    let summary = run_update(&provider, &store, &instruments, &opts, Some(&StdoutProgress))?;

    for (code, err) in &summary.failed {
        eprintln!("Error for {code}: {err}");
    }
    Ok(())
}

fn run_scan_cmd(config: &mut AppConfig, command: ScanCommand) -> Result<()> {
    let signals = &mut config.signals;

    match command {
        ScanCommand::MaCross { common, window, ma } => {
            let cfg = &mut signals.ma_cross;
            if let Some(v) = window {
                cfg.window_days = v;
            }
            if let Some(v) = ma {
                cfg.ma_window = v;
            }
            apply_scan_args(&mut signals.data_dir, &mut signals.ma_cross_out, common);
            let detector = MaCross::new(*cfg)?;
            scan(&detector, &signals.data_dir, &signals.ma_cross_out)
        }
        ScanCommand::BandTrend {
            common,
            window,
            ma_list,
            band,
            max_outside,
            min_up_days,
            min_rise_pct,
        } => {
            let cfg = &mut signals.band_trend;
            if let Some(v) = window {
                cfg.window_days = v;
            }
            if let Some(raw) = ma_list {
                cfg.ma_list = parse_ma_list(&raw);
            }
            if let Some(v) = band {
                cfg.band = v;
            }
            if let Some(v) = max_outside {
                cfg.max_outside = v;
            }
            if min_up_days.is_some() {
                cfg.min_up_days = min_up_days;
            }
            if let Some(v) = min_rise_pct {
                cfg.min_rise_pct = v;
            }
            apply_scan_args(&mut signals.data_dir, &mut signals.band_trend_out, common);
            let detector = BandTrend::new(cfg.clone())?;
            scan(&detector, &signals.data_dir, &signals.band_trend_out)
        }
        ScanCommand::NewHigh {
            common,
            window,
            price_field,
            include_equal,
        } => {
            let cfg = &mut signals.new_high;
            if let Some(v) = window {
                cfg.window_days = v;
            }
            if let Some(v) = price_field {
                cfg.price_field = v;
            }
            cfg.include_equal |= include_equal;
            apply_scan_args(&mut signals.data_dir, &mut signals.new_high_out, common);
            let detector = NewHigh::new(*cfg)?;
            scan(&detector, &signals.data_dir, &signals.new_high_out)
        }
    }
}

fn apply_scan_args(data_dir: &mut PathBuf, out: &mut PathBuf, args: ScanArgs) {
    if let Some(dir) = args.data_dir {
        *data_dir = dir;
    }
    if let Some(path) = args.out {
        *out = path;
    }
}

fn scan<D: Detector>(detector: &D, data_dir: &Path, out: &Path) -> Result<()> {
    let results = scan_to_file(detector, data_dir, out)?;
    println!("matched {} symbols", results.matched());
    Ok(())
}
