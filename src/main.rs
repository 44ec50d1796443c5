//! Loss Reserving CLI
//!
//! Loads reported and paid triangles, builds the paid/reported loss model and
//! writes its description, optionally with prior-predictive draws.

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use loss_reserving::model::VariableSummary;
use loss_reserving::triangle::load_triangle;
use loss_reserving::{build_model, LogDensity, Model, ModelConfig, Point, PriorPredictive};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "loss_reserving", version, about = "Build the paid/reported loss reserving model")]
struct Args {
    /// Reported loss triangle (CSV: origin,development,value)
    #[arg(long)]
    reported: PathBuf,

    /// Paid loss triangle (CSV: origin,development,value)
    #[arg(long)]
    paid: PathBuf,

    /// JSON model config (priors, gamma_parameterization, options)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of prior-predictive draws to include in the output
    #[arg(long, default_value_t = 0)]
    prior_draws: usize,

    /// Seed for prior-predictive draws
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Write JSON here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
struct Report<'a> {
    variables: Vec<VariableSummary>,
    parameter_names: Vec<String>,
    initial_log_prob: f64,
    model: &'a Model,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    prior_predictive: Vec<Point>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ModelConfig::from_json_path(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => ModelConfig::default(),
    };

    let reported = load_triangle(&args.reported)
        .with_context(|| format!("failed to load {}", args.reported.display()))?;
    let paid = load_triangle(&args.paid)
        .with_context(|| format!("failed to load {}", args.paid.display()))?;
    info!(
        "Loaded triangles: {} origin x {} development periods ({} reported, {} paid cells)",
        reported.origin_period.len(),
        reported.development_period.len(),
        reported.observed_cells(),
        paid.observed_cells(),
    );

    // paid is laid out on the reported axes
    let paid = paid
        .align_to(&reported.origin_period, &reported.development_period)
        .context("paid triangle does not share the reported triangle's axes")?;

    let unobserved = reported.values.len() - reported.observed_cells();
    if unobserved > 0 {
        warn!("{} cells have no reported value and are left out of the likelihood", unobserved);
    }

    let model = build_model(
        reported.origin_period.clone(),
        reported.development_period.clone(),
        reported.values,
        paid.values,
        &config,
    )
    .context("failed to build model")?;

    let initial_log_prob = model.log_prob(&model.initial_point())?;
    if !initial_log_prob.is_finite() {
        bail!("log density at the initial point is {initial_log_prob}");
    }

    let prior_predictive = if args.prior_draws > 0 {
        info!("Drawing {} prior-predictive samples", args.prior_draws);
        PriorPredictive::new(&model).run(args.prior_draws, args.seed)?
    } else {
        Vec::new()
    };

    let report = Report {
        variables: model.describe(),
        parameter_names: model.unconstrained().parameter_names(),
        initial_log_prob,
        model: &model,
        prior_predictive,
    };

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &report)?;
            writer.flush()?;
            info!("Model written to {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            serde_json::to_writer_pretty(&mut handle, &report)?;
            writeln!(handle)?;
        }
    }

    Ok(())
}
