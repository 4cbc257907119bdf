use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use nir_peaks::analysis::aggregate::{aggregate, analyze_object, PopulationTable};
use nir_peaks::config::{InterpKind, PhaseWindow, PipelineConfig};
use nir_peaks::data::filter::{filtered_indices, parse_selectors, select_by_id, unknown_keys};
use nir_peaks::data::loader::{load_band_dir, load_file, PhotometryColumns};
use nir_peaks::data::model::LightCurveSet;
use nir_peaks::export::{describe_peaks, pretty_table, records, write_summary_csv, write_table};
use nir_peaks::optical::{standard_comparisons, ComparisonFrame, OpticalTable};
use nir_peaks::style::StyleCycle;

#[derive(Parser)]
#[command(name = "nir-peaks")]
#[command(about = "Find and label the near-infrared maxima of Type Ia supernova light curves")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyse a single light-curve file.
    Object {
        file: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,

        #[command(flatten)]
        columns: ColumnArgs,
    },
    /// Analyse every object in a band directory.
    Population {
        #[command(flatten)]
        band: BandArgs,

        /// Write the population table (.csv, .json or .parquet).
        #[arg(long)]
        out: Option<PathBuf>,

        /// Write the population mean curve as CSV.
        #[arg(long)]
        summary: Option<PathBuf>,

        #[command(flatten)]
        pipeline: PipelineArgs,

        #[command(flatten)]
        columns: ColumnArgs,
    },
    /// Regress NIR peak properties against optical fit parameters.
    Compare {
        #[command(flatten)]
        band: BandArgs,

        /// Whitespace-delimited optical parameter table with an SN_name column.
        #[arg(long)]
        optical: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,

        #[command(flatten)]
        columns: ColumnArgs,
    },
}

#[derive(Args)]
struct BandArgs {
    /// Directory of light-curve files for one band.
    #[arg(long)]
    band_dir: PathBuf,

    /// Only analyse these objects (repeatable).
    #[arg(long, value_name = "ID")]
    select: Vec<String>,

    /// Keep objects whose header entry matches (repeatable, same key ORs).
    #[arg(long = "where", value_name = "KEY=VALUE")]
    where_: Vec<String>,
}

#[derive(Args)]
struct PipelineArgs {
    /// JSON pipeline configuration; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Interpolation: linear, slinear or cubic.
    #[arg(long)]
    interp: Option<InterpKind>,

    /// Phase grid step in days.
    #[arg(long)]
    bin_size: Option<f64>,

    /// Minimum distance in days between a peak and a trough.
    #[arg(long)]
    min_separation: Option<f64>,

    /// Only keep peaks inside this open phase interval.
    #[arg(long, value_name = "LO,HI", allow_hyphen_values = true)]
    peak_window: Option<PhaseWindow>,

    /// Fewest distinct phases an object needs.
    #[arg(long)]
    min_samples: Option<usize>,
}

impl PipelineArgs {
    fn resolve(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(kind) = self.interp {
            config.resample.interpolation = kind;
        }
        if let Some(step) = self.bin_size {
            config.resample.grid.step = step;
        }
        if let Some(sep) = self.min_separation {
            config.peaks.min_separation = sep;
        }
        if let Some(window) = self.peak_window {
            config.peaks.phase_window = Some(window);
        }
        if let Some(n) = self.min_samples {
            config.resample.min_samples = n;
        }
        config.validate().context("invalid pipeline configuration")?;
        log::debug!("pipeline configuration: {config:?}");
        Ok(config)
    }
}

#[derive(Args)]
struct ColumnArgs {
    #[arg(long, default_value = "Phase(T_Bmax)")]
    phase_column: String,

    #[arg(long, default_value = "Abs mag")]
    magnitude_column: String,

    #[arg(long, default_value = "Error Abs mag")]
    error_column: String,
}

impl From<ColumnArgs> for PhotometryColumns {
    fn from(args: ColumnArgs) -> Self {
        Self {
            phase: args.phase_column,
            magnitude: args.magnitude_column,
            magnitude_error: args.error_column,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Object {
            file,
            pipeline,
            columns,
        } => run_object(&file, &pipeline.resolve()?, &columns.into()),
        Command::Population {
            band,
            out,
            summary,
            pipeline,
            columns,
        } => run_population(
            &band,
            out.as_deref(),
            summary.as_deref(),
            &pipeline.resolve()?,
            &columns.into(),
        ),
        Command::Compare {
            band,
            optical,
            pipeline,
            columns,
        } => run_compare(&band, &optical, &pipeline.resolve()?, &columns.into()),
    }
}

fn run_object(file: &Path, config: &PipelineConfig, columns: &PhotometryColumns) -> Result<()> {
    let lc = load_file(file, columns)?;
    let row = analyze_object(&lc, config).with_context(|| format!("analysing {}", lc.id()))?;

    println!("{}", row.id);
    println!(
        "  {} samples, {} of {} grid points covered",
        row.n_samples,
        row.curve.coverage(),
        row.curve.len()
    );
    println!("{}", describe_peaks(&row.peaks));
    if let Some(delta) = row.peaks.second_minus_first_magnitude() {
        println!("  second - first max: {delta:.3} mag");
    }
    Ok(())
}

/// Load a band directory and apply `--where` / `--select`.
fn load_selection(band: &BandArgs, columns: &PhotometryColumns) -> Result<LightCurveSet> {
    let set = load_band_dir(&band.band_dir, columns)?;
    if set.is_empty() {
        bail!("No light curves found in {}", band.band_dir.display());
    }

    let filters = parse_selectors(&band.where_)?;
    for key in unknown_keys(&set, &filters) {
        log::warn!("no object has a '{key}' header entry");
    }
    let mut indices = filtered_indices(&set, &filters);
    if !band.select.is_empty() {
        let wanted = select_by_id(&set, &band.select);
        indices.retain(|i| wanted.contains(i));
    }
    let selected = set.subset(&indices);
    log::info!("{} of {} objects selected", selected.len(), set.len());
    Ok(selected)
}

fn run_population(
    band: &BandArgs,
    out: Option<&Path>,
    summary: Option<&Path>,
    config: &PipelineConfig,
    columns: &PhotometryColumns,
) -> Result<()> {
    let set = load_selection(band, columns)?;
    let table = aggregate(&set.curves, config)?;
    let recs = records(&table, &mut StyleCycle::new());

    println!("{}", pretty_table(&recs)?);
    print_skipped(&table);

    if let Some(path) = out {
        write_table(path, &table, &recs)?;
    }
    if let Some(path) = summary {
        write_summary_csv(path, &table.summary())?;
    }
    Ok(())
}

fn run_compare(
    band: &BandArgs,
    optical: &Path,
    config: &PipelineConfig,
    columns: &PhotometryColumns,
) -> Result<()> {
    let set = load_selection(band, columns)?;
    let table = aggregate(&set.curves, config)?;
    let optical = OpticalTable::load(optical)?;
    let frame = ComparisonFrame::join(&table, &optical);

    println!("{} objects with optical parameters", frame.len());
    for comparison in standard_comparisons(&frame) {
        match &comparison.result {
            Ok(fit) => println!("{} vs {}: {fit}", comparison.y, comparison.x),
            Err(err) => println!("{} vs {}: {err}", comparison.y, comparison.x),
        }
    }
    print_skipped(&table);
    Ok(())
}

fn print_skipped(table: &PopulationTable) {
    if table.skipped().is_empty() {
        return;
    }
    println!("skipped {} objects:", table.skipped().len());
    for s in table.skipped() {
        println!("  {}: {}", s.id, s.reason);
    }
}
