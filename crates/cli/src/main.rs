//! cropscan CLI - spectral index time series for a field plot

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use cropscan_algorithms::imagery::SpectralIndex;
use cropscan_cloud::{StacCatalog, StacCatalogOptions, StacImageryCatalog};
use cropscan_core::Roi;
use cropscan_timeseries::{
    default_start, read_csv, trim_trailing_empty, update_range, windows, CsvSink, FlatRow,
    IndexPipeline, IndexRecord, IndexSeries, JsonLinesSink, PipelineConfig, RecordSink,
};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "cropscan")]
#[command(author, version, about = "Spectral index time series for a field plot", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    catalog: CatalogArgs,

    #[command(flatten)]
    pipeline: PipelineArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CatalogArgs {
    /// STAC catalog: "es" (Earth Search), "pc" (Planetary Computer) or a search URL
    #[arg(long, global = true, env = "CROPSCAN_STAC_URL", default_value = "es")]
    catalog: String,

    /// STAC collection
    #[arg(long, global = true, default_value = "sentinel-2-l2a")]
    collection: String,

    /// Maximum scenes loaded per window
    #[arg(long, global = true, default_value = "20")]
    max_items: usize,

    /// Per-request timeout in seconds
    #[arg(long, global = true, default_value = "60")]
    timeout: u64,

    /// Retries on transient HTTP failures
    #[arg(long, global = true, default_value = "3")]
    retries: u32,

    /// Keep cloud and shadow pixels
    #[arg(long, global = true)]
    no_cloud_mask: bool,
}

#[derive(Args)]
struct PipelineArgs {
    /// JSON file with pipeline settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Window width in days
    #[arg(long, global = true)]
    step_days: Option<u32>,

    /// Scenes must be strictly below this cloud cover (%)
    #[arg(long, global = true)]
    max_cloud_cover: Option<f64>,

    /// Region sampling interval in metres
    #[arg(long, global = true)]
    scale: Option<f64>,

    /// Cap on region samples per reduction
    #[arg(long, global = true)]
    max_pixels: Option<u64>,
}

#[derive(Args)]
struct RangeArgs {
    /// First day (YYYY-MM-DD); defaults to 30 days before the end
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Day after the last one (YYYY-MM-DD); defaults to today
    #[arg(long)]
    end: Option<NaiveDate>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Flat table, one column per index statistic
    Csv,
    /// One nested JSON record per line
    Jsonl,
    /// Nested records as a JSON array
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the index series for a date range
    Series {
        #[command(flatten)]
        range: RangeArgs,

        /// Region as a GeoJSON polygon file (default: demo farm plot)
        #[arg(long)]
        roi: Option<PathBuf>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value = "csv")]
        format: OutputFormat,
    },
    /// Append windows after the latest date of an existing CSV table
    Update {
        /// CSV table written by `series`
        #[arg(short, long)]
        table: PathBuf,

        /// Day after the last one (YYYY-MM-DD); defaults to today
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Region as a GeoJSON polygon file (default: demo farm plot)
        #[arg(long)]
        roi: Option<PathBuf>,
    },
    /// List the windows a range splits into
    Windows {
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Print the series of one index from a CSV table as JSON
    Select {
        /// CSV table written by `series`
        #[arg(short, long)]
        table: PathBuf,

        /// Index name (ndvi, gndvi, ndmi, dswi, ndni, evi2)
        #[arg(short, long)]
        index: SpectralIndex,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn resolve_range(range: &RangeArgs) -> Result<(NaiveDate, NaiveDate)> {
    let end = range.end.unwrap_or_else(today);
    let start = match range.start {
        Some(start) => start,
        None => default_start(end)?,
    };
    Ok((start, end))
}

fn load_config(args: &PipelineArgs) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(step_days) = args.step_days {
        config.step_days = step_days;
    }
    if let Some(max_cloud_cover) = args.max_cloud_cover {
        config.max_cloud_cover = max_cloud_cover;
    }
    if let Some(scale) = args.scale {
        config.scale = scale;
    }
    if let Some(max_pixels) = args.max_pixels {
        config.max_pixels = max_pixels;
    }
    config.validate().context("Invalid pipeline settings")?;
    Ok(config)
}

fn open_catalog(args: &CatalogArgs) -> Result<StacImageryCatalog> {
    let options = StacCatalogOptions {
        catalog: StacCatalog::from_str_or_url(&args.catalog),
        collection: args.collection.clone(),
        max_items: args.max_items,
        request_timeout: Duration::from_secs(args.timeout),
        max_retries: args.retries,
        mask_clouds: !args.no_cloud_mask,
    };
    info!("Catalog: {} ({})", options.catalog, options.collection);
    StacImageryCatalog::new(options).context("Failed to create STAC client")
}

fn load_roi(path: Option<&Path>) -> Result<Roi> {
    let Some(path) = path else {
        info!("ROI: built-in demo farm plot");
        return Ok(Roi::demo_farm());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read ROI {}", path.display()))?;
    let roi = Roi::from_geojson(&text)
        .with_context(|| format!("Invalid ROI in {}", path.display()))?;
    info!("ROI: {} ({} vertices)", path.display(), roi.points().len());
    Ok(roi)
}

fn progress(len: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("Invalid progress template")?
            .progress_chars("=> "),
    );
    Ok(pb)
}

fn run_pipeline(
    catalog: &StacImageryCatalog,
    config: PipelineConfig,
    roi: &Roi,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<IndexRecord>> {
    let pipeline = IndexPipeline::new(catalog, config)?;
    let pb = progress(pipeline.windows(start, end).len())?;
    let records = pipeline
        .run_with(roi, start, end, |window, record| {
            let status = if record.is_empty() { "no data" } else { "ok" };
            pb.set_message(format!("{} {}", window.label(), status));
            pb.inc(1);
        })
        .context("Index series failed")?;
    pb.finish_and_clear();
    Ok(records)
}

fn write_records(
    records: &[IndexRecord],
    output: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    match (format, output) {
        (OutputFormat::Csv, Some(path)) => {
            // start a fresh table
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
            CsvSink::new(path).write(records)?;
        }
        (OutputFormat::Csv, None) => {
            let mut wtr = csv::Writer::from_writer(io::stdout().lock());
            for record in records {
                wtr.serialize(FlatRow::from(record))?;
            }
            wtr.flush()?;
        }
        (OutputFormat::Jsonl, Some(path)) => {
            let file =
                File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
            JsonLinesSink::new(BufWriter::new(file)).write(records)?;
        }
        (OutputFormat::Jsonl, None) => {
            JsonLinesSink::new(io::stdout().lock()).write(records)?;
        }
        (OutputFormat::Json, Some(path)) => {
            let file =
                File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, records)?;
            writer.flush()?;
        }
        (OutputFormat::Json, None) => {
            let mut stdout = io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, records)?;
            writeln!(stdout)?;
        }
    }
    Ok(())
}

fn done(records: &[IndexRecord], elapsed: Duration) {
    let filled = records.iter().filter(|r| !r.is_empty()).count();
    eprintln!("{} window(s), {} with data", records.len(), filled);
    eprintln!("  Processing time: {:.2?}", elapsed);
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Series ───────────────────────────────────────────────────
        Commands::Series {
            range,
            roi,
            output,
            format,
        } => {
            let (start, end) = resolve_range(&range)?;
            let config = load_config(&cli.pipeline)?;
            let roi = load_roi(roi.as_deref())?;
            let catalog = open_catalog(&cli.catalog)?;

            let timer = Instant::now();
            let records = run_pipeline(&catalog, config, &roi, start, end)?;
            let elapsed = timer.elapsed();

            write_records(&records, output.as_deref(), format)?;
            if let Some(path) = &output {
                eprintln!("Series saved to: {}", path.display());
            }
            done(&records, elapsed);
        }

        // ── Update ───────────────────────────────────────────────────
        Commands::Update { table, end, roi } => {
            let config = load_config(&cli.pipeline)?;
            let end = end.unwrap_or_else(today);

            let rows = if table.exists() {
                read_csv(&table)
                    .with_context(|| format!("Failed to read table {}", table.display()))?
            } else {
                Vec::new()
            };
            let Some((start, end)) = update_range(&rows, end, config.step_days)? else {
                println!("No new data to append.");
                return Ok(());
            };
            info!("Table has {} row(s); updating from {} to {}", rows.len(), start, end);

            let roi = load_roi(roi.as_deref())?;
            let catalog = open_catalog(&cli.catalog)?;
            let timer = Instant::now();
            let mut records = run_pipeline(&catalog, config, &roi, start, end)?;
            let elapsed = timer.elapsed();

            trim_trailing_empty(&mut records);
            if records.is_empty() {
                println!("No new data to append.");
                return Ok(());
            }
            CsvSink::new(&table)
                .write(&records)
                .with_context(|| format!("Failed to append to {}", table.display()))?;
            println!("Appended {} row(s) to {}", records.len(), table.display());
            done(&records, elapsed);
        }

        // ── Windows ──────────────────────────────────────────────────
        Commands::Windows { range } => {
            let (start, end) = resolve_range(&range)?;
            let config = load_config(&cli.pipeline)?;
            for window in windows(start, end, config.step_days) {
                println!("{}  {}", window.label(), window);
            }
        }

        // ── Select ───────────────────────────────────────────────────
        Commands::Select { table, index } => {
            let rows = read_csv(&table)
                .with_context(|| format!("Failed to read table {}", table.display()))?;
            let records: Vec<IndexRecord> = rows.iter().map(IndexRecord::from).collect();
            let series = IndexSeries::from_records(&records, index);
            println!("{}", serde_json::to_string_pretty(&series)?);
        }
    }

    Ok(())
}
