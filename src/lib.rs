mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod regression;
pub mod service;

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use serde::{Deserialize, Serialize};

use cli::{Cli, Commands, FitArgs, PathArgs, PredictArgs, ServeArgs};
use data::Dataset;
use regression::{create_file, FittedModel};
use service::{serve_lines, LocalHost, ScoringService, ServiceHost};

pub use error::{LassoError, LassoResult};

/// Which cross-validated lambda a model is frozen at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum Selection {
    /// Lambda with the smallest mean cross-validated error.
    #[value(name = "min")]
    #[serde(rename = "min")]
    Min,
    /// Largest lambda within one standard error of that minimum.
    #[value(name = "1se")]
    #[serde(rename = "1se")]
    OneSe,
}

impl Selection {
    pub fn label(self) -> &'static str {
        match self {
            Selection::Min => "min",
            Selection::OneSe => "1se",
        }
    }
}

impl std::fmt::Display for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lambda.{}", self.label())
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Fit(args) => handle_fit(args),
        Commands::Path(args) => handle_path(args),
        Commands::Predict(args) => handle_predict(args),
        Commands::Serve(args) => handle_serve(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<()> {
    let config = config::RunConfig::from_fit_args(args).with_defaults();
    config.validate()?;

    println!("--> Configuration\n{}", config.summary());

    if config.dry_run {
        println!("\nDry run requested: skipping solver execution.");
        return Ok(());
    }

    let outcome = regression::fit_cross_validated(&config)?;
    println!("\n--> Report\n{}", outcome.report.render());

    if let Some(path) = &config.output {
        outcome.report.persist(path)?;
        println!("\nReport written to {}", path.display());
    }
    if let Some(path) = &config.curve_out {
        regression::write_curve_csv(&outcome.cv, create_file(path)?)?;
        println!("Cross-validation curve written to {}", path.display());
    }
    if let Some(path) = &config.model_out {
        outcome.model.save(path)?;
        println!("Model ({}) written to {}", config.selection, path.display());
    }

    Ok(())
}

fn handle_path(args: PathArgs) -> Result<()> {
    let config = config::RunConfig::from_path_args(args).with_defaults();
    config.validate()?;

    println!("--> Configuration\n{}", config.path_summary());

    if config.dry_run {
        println!("\nDry run requested: skipping solver execution.");
        return Ok(());
    }

    let (report, path) = regression::fit_full_path(&config)?;
    println!("\n--> Path\n{}", report.render());

    if let Some(dest) = &config.output {
        report.persist(dest)?;
        println!("\nReport written to {}", dest.display());
    }
    if let Some(dest) = &config.coefficients_out {
        regression::write_path_csv(&path, create_file(dest)?)?;
        println!("Coefficient path written to {}", dest.display());
    }

    Ok(())
}

fn handle_predict(args: PredictArgs) -> Result<()> {
    let model = FittedModel::load(&args.model)?;
    let mut dataset = Dataset::from_csv(&args.dataset)?;
    if let Some(n) = args.head {
        dataset = dataset.head(n);
    }

    let predictions = model
        .predict(&dataset)
        .with_context(|| format!("{}: cannot score with this model", args.dataset.display()))?;
    info!("scored {} rows at lambda {:.4}", predictions.len(), model.lambda);

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(create_file(path)?),
        None => Box::new(io::stdout().lock()),
    };
    let mut writer = csv::Writer::from_writer(sink);
    writer.write_record([format!("{}_hat", model.response)])?;
    for value in &predictions {
        writer.write_record([value.to_string()])?;
    }
    writer.flush()?;

    Ok(())
}

fn handle_serve(args: ServeArgs) -> Result<()> {
    let model = FittedModel::load(&args.model)?;
    let service = ScoringService::new(model).with_output_field(&args.output_field);

    let mut host = LocalHost::new();
    let endpoint = host.publish(&args.name, service)?;
    eprintln!("Serving '{}' at {}", endpoint.name, endpoint.location);

    let answered = serve_lines(&host, &endpoint, io::stdin().lock(), io::stdout().lock())?;
    info!("answered {} requests", answered);
    Ok(())
}
