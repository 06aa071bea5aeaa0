//! FlowUQ CLI - uncertainty quantification for mass-flow simulation ensembles

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use flowuq_algorithms::emulator::{GpParams, LooMetrics, ScalarEmulator, VectorEmulator};
use flowuq_algorithms::moments::{
    compare, compute_mcs_moments, compute_pem_moments, load_mcs_inputs, MomentComparison,
    MomentSummary,
};
use flowuq_algorithms::scalars::ScalarKind;
use flowuq_algorithms::simulations::{CurationSettings, SimulationSet};
use flowuq_cloud::{CatalogSource, FigshareOptions};
use flowuq_core::io::write_stack;
use flowuq_core::catalog::DEFAULT_THRESHOLD;
use flowuq_core::{Analysis, Catalog, DatasetName, DesignMatrix, Qoi, RasterStack};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "flowuq")]
#[command(author, version, about = "Uncertainty quantification for mass-flow simulations", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Catalog YAML; datasets it does not list are fetched from Figshare
    #[arg(short, long, global = true)]
    catalog: Option<PathBuf>,

    /// Directory of input CSVs when no catalog is given
    #[arg(long, global = true, default_value = "input")]
    input_dir: PathBuf,

    /// HTTP timeout for remote stacks, in seconds
    #[arg(long, global = true, default_value = "120")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show size, resolution and extent of a dataset
    Info {
        /// Dataset name (e.g. synth, acheron_pem)
        name: DatasetName,
    },
    /// Curate per-run scalar outputs (ia, da, dv, vmax, hmax) as CSV
    Scalars {
        name: DatasetName,
        #[command(flatten)]
        curation: CurationArgs,
        /// Write CSV here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Leave-one-out cross-validation of scalar emulators
    CrossValidate {
        /// Base dataset (synth or acheron)
        name: DatasetName,
        /// Scalars to emulate (default: all)
        #[arg(short, long, value_delimiter = ',')]
        scalars: Vec<ScalarKind>,
        #[command(flatten)]
        curation: CurationArgs,
    },
    /// Validate a field emulator against the held-out runs
    ValidateField {
        /// Base dataset (synth or acheron)
        name: DatasetName,
        /// Field quantity: hmax, vmax or pmax
        #[arg(short, long, default_value = "hmax")]
        qoi: Qoi,
        /// Activation threshold
        #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f64,
    },
    /// Predict per-cell mean and standard deviation of a field
    PredictField {
        /// Base dataset (synth or acheron)
        name: DatasetName,
        /// Design CSV of the inputs to predict at
        design: PathBuf,
        /// Output GeoTIFF (band 1 mean, band 2 standard deviation)
        output: PathBuf,
        /// Field quantity: hmax, vmax or pmax
        #[arg(short, long, default_value = "hmax")]
        qoi: Qoi,
        /// Activation threshold
        #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f64,
    },
    /// Monte Carlo (through the emulator) vs point-estimate moments
    Moments {
        /// Base dataset (synth or acheron)
        name: DatasetName,
        /// Scalars to analyse (default: all)
        #[arg(short, long, value_delimiter = ',')]
        scalars: Vec<ScalarKind>,
        #[command(flatten)]
        curation: CurationArgs,
    },
    /// Lateral spread (widest column) of every run
    LateralSpread {
        name: DatasetName,
        #[arg(short, long, default_value = "hmax")]
        qoi: Qoi,
        /// Activation threshold
        #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f64,
    },
}

#[derive(Args)]
struct CurationArgs {
    /// Activation threshold for areas and volume
    #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,
    /// x-coordinate of the extraction point (default: dataset location)
    #[arg(long)]
    x: Option<f64>,
    /// y-coordinate of the extraction point (default: dataset location)
    #[arg(long)]
    y: Option<f64>,
}

impl CurationArgs {
    fn settings(&self, name: DatasetName) -> Result<CurationSettings> {
        let default = name.default_location();
        let x = self.x.unwrap_or(default.x);
        let y = self.y.unwrap_or(default.y);
        CurationSettings::new(self.threshold, x, y).context("Invalid curation settings")
    }
}

// ─── Session ────────────────────────────────────────────────────────────

struct Session {
    catalog: Catalog,
    options: FigshareOptions,
}

impl Session {
    fn new(cli: &Cli) -> Result<Self> {
        let catalog = match &cli.catalog {
            Some(path) => Catalog::load(path)
                .with_context(|| format!("Failed to load catalog {}", path.display()))?,
            None => Catalog::with_input_dir(cli.input_dir.clone()),
        };
        let options = FigshareOptions {
            request_timeout: std::time::Duration::from_secs(cli.timeout),
            ..Default::default()
        };
        Ok(Self { catalog, options })
    }

    fn open(&self, name: DatasetName) -> Result<SimulationSet> {
        let pb = spinner(&format!("Opening {name}..."));
        let source = if self.catalog.contains(name) {
            CatalogSource::from_catalog(&self.catalog, name, self.options.clone())
        } else {
            CatalogSource::figshare(name, self.options.clone())
        }
        .with_context(|| format!("Failed to resolve dataset {name}"))?;
        let sims = SimulationSet::new(name, source)
            .with_context(|| format!("Failed to open dataset {name}"))?;
        pb.finish_and_clear();
        info!("{}: {} runs at {} m", name, sims.size(), sims.resolution());
        Ok(sims)
    }

    fn design(&self, name: DatasetName) -> Result<DesignMatrix> {
        let path = self.catalog.input_path(name, Analysis::Emulator);
        DesignMatrix::from_csv_path(&path)
            .with_context(|| format!("Failed to read design {}", path.display()))
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install log subscriber")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{text}");
    Ok(())
}

fn done(name: &str, elapsed: std::time::Duration) {
    eprintln!("{name} finished in {elapsed:.2?}");
}

fn or_all(scalars: Vec<ScalarKind>) -> Vec<ScalarKind> {
    if scalars.is_empty() {
        ScalarKind::ALL.to_vec()
    } else {
        scalars
    }
}

fn vector_emulator(
    ctx: &Session,
    name: DatasetName,
    qoi: Qoi,
    threshold: f64,
) -> Result<VectorEmulator> {
    name.require_base()?;
    qoi.require_field()?;
    let design = ctx.design(name)?;
    let sims = ctx.open(name)?;
    let mut emulator =
        VectorEmulator::from_simulations(&sims, qoi, threshold, design, GpParams::default())
            .context("Failed to prepare field emulator")?;

    let pb = spinner(&format!("Training {qoi} emulator..."));
    emulator.train().context("Failed to train field emulator")?;
    pb.finish_and_clear();
    Ok(emulator)
}

#[derive(Serialize)]
struct MomentsReport {
    mcs: MomentSummary,
    pem: MomentSummary,
    difference: MomentComparison,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;
    let ctx = Session::new(&cli)?;
    let start = Instant::now();

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { name } => {
            let sims = ctx.open(name)?;
            let hmax = sims.open(Qoi::Hmax)?;
            let envelope = hmax.max_envelope();
            let reached = envelope.iter().filter(|&&v| v > 0.0).count();
            let bounds = sims.bounds();
            let (rows, cols) = hmax.shape();

            println!("Dataset: {name}");
            println!("Runs: {}", sims.size());
            println!("Grid: {cols} x {rows} ({} cells)", hmax.cells());
            println!("Resolution: {} m", sims.resolution());
            println!(
                "Bounds: ({:.3}, {:.3}) - ({:.3}, {:.3})",
                bounds.left, bounds.bottom, bounds.right, bounds.top
            );
            println!(
                "Cells reached by any run: {reached} ({:.1}%)",
                100.0 * reached as f64 / hmax.cells() as f64
            );
        }

        // ── Scalars ──────────────────────────────────────────────────
        Commands::Scalars {
            name,
            curation,
            output,
        } => {
            let settings = curation.settings(name)?;
            let sims = ctx.open(name)?;
            let pb = spinner("Curating scalars...");
            let table = sims
                .curate_scalars(&settings)
                .context("Failed to curate scalars")?;
            pb.finish_and_clear();
            match output {
                Some(path) => {
                    let file = std::fs::File::create(&path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    table.write_csv(file).context("Failed to write CSV")?;
                    println!("Scalars saved to: {}", path.display());
                }
                None => table
                    .write_csv(std::io::stdout().lock())
                    .context("Failed to write CSV")?,
            }
        }

        // ── Cross-validation ─────────────────────────────────────────
        Commands::CrossValidate {
            name,
            scalars,
            curation,
        } => {
            name.require_base()?;
            let settings = curation.settings(name)?;
            let scalars = or_all(scalars);
            let design = ctx.design(name)?;
            let sims = ctx.open(name)?;
            let mut emulator =
                ScalarEmulator::from_simulations(&sims, &settings, design, GpParams::default())
                    .context("Failed to prepare scalar emulator")?;

            let pb = spinner("Training scalar emulators...");
            emulator.train(&scalars).context("Failed to train")?;
            pb.set_message("Cross-validating...");
            let mut report: BTreeMap<ScalarKind, LooMetrics> = BTreeMap::new();
            for scalar in scalars {
                let metrics = emulator
                    .cross_validate_loo(scalar)
                    .with_context(|| format!("Failed to cross-validate {scalar}"))?;
                report.insert(scalar, metrics);
            }
            pb.finish_and_clear();
            print_json(&report)?;
        }

        // ── Field validation ─────────────────────────────────────────
        Commands::ValidateField {
            name,
            qoi,
            threshold,
        } => {
            let emulator = vector_emulator(&ctx, name, qoi, threshold)?;
            let held_out = name.validation();
            let design = ctx.design(held_out)?;
            let sims = ctx.open(held_out)?;
            let truth = emulator
                .validation_data(&sims)
                .context("Failed to read validation runs")?;
            let report = emulator
                .validate(&design, truth.view())
                .context("Failed to validate")?;
            print_json(&report)?;
        }

        // ── Field prediction ─────────────────────────────────────────
        Commands::PredictField {
            name,
            design,
            output,
            qoi,
            threshold,
        } => {
            let inputs = DesignMatrix::from_csv_path(&design)
                .with_context(|| format!("Failed to read design {}", design.display()))?;
            let emulator = vector_emulator(&ctx, name, qoi, threshold)?;
            let fields = emulator
                .predict_vector(&inputs)
                .context("Failed to predict field")?;

            let stats = fields.mean.statistics();
            info!(
                "Predicted mean {qoi}: max {:.4}, mean {:.4} over {} cells",
                stats.max, stats.mean, stats.valid_count
            );
            let stack = RasterStack::from_bands(
                vec![fields.mean.into_array(), fields.std.into_array()],
                *emulator.transform(),
            )?;
            let pb = spinner("Writing output...");
            write_stack(&stack, &output).context("Failed to write output")?;
            pb.finish_and_clear();
            println!("Field saved to: {}", output.display());
        }

        // ── Moments ──────────────────────────────────────────────────
        Commands::Moments {
            name,
            scalars,
            curation,
        } => {
            name.require_base()?;
            let settings = curation.settings(name)?;
            let scalars = or_all(scalars);
            let inputs = load_mcs_inputs(&ctx.catalog, name).context("Failed to read MCS inputs")?;
            let design = ctx.design(name)?;
            let sims = ctx.open(name)?;
            let mut emulator =
                ScalarEmulator::from_simulations(&sims, &settings, design, GpParams::default())
                    .context("Failed to prepare scalar emulator")?;

            let pb = spinner("Monte Carlo moments...");
            let mcs = compute_mcs_moments(&mut emulator, &inputs, &scalars)
                .context("Failed to compute MCS moments")?;
            pb.set_message("Point-estimate moments...");
            let pem_sims = ctx.open(name.pem())?;
            let pem_table = pem_sims
                .curate_scalars(&settings)
                .context("Failed to curate PEM scalars")?;
            let pem = compute_pem_moments(&pem_table).context("Failed to compute PEM moments")?;
            pb.finish_and_clear();

            let difference = compare(&mcs, &pem).context("Failed to compare moments")?;
            print_json(&MomentsReport {
                mcs,
                pem,
                difference,
            })?;
        }

        // ── Lateral spread ───────────────────────────────────────────
        Commands::LateralSpread {
            name,
            qoi,
            threshold,
        } => {
            let sims = ctx.open(name)?;
            let spread = sims
                .lateral_spread(qoi, threshold)
                .context("Failed to compute lateral spread")?;
            print_json(&spread)?;
        }
    }

    done("flowuq", start.elapsed());
    Ok(())
}
