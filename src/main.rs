#![allow(non_snake_case)]
//! RustedEqBench - noise-robustness benchmark of equation discovery
//!
//! Usage:
//!   RustedEqBench run tasks/lotka_volterra.task            # noise sweep described by a task file
//!   RustedEqBench run tasks/burgers.task --log-level debug
//!   RustedEqBench generate-lv data/lotka_volterra          # synthetic predator-prey dataset
use RustedEqBench::Utils::logger::{init_logger, parse_level};
use RustedEqBench::Utils::task_parser::TaskDocument;
use RustedEqBench::benchmark::burgers::run_burgers;
use RustedEqBench::benchmark::dataset::{
    LotkaVolterraParams, synthesize_lotka_volterra, write_table,
};
use RustedEqBench::benchmark::lotka_volterra::run_lotka_volterra;
use RustedEqBench::errors::{BenchError, Result};
use clap::{Parser, Subcommand};
use log::info;
use ndarray::{Array1, Array2};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "RustedEqBench")]
#[command(about = "Noise-robustness benchmark of equation discovery engines")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the experiment described by a task file
    Run {
        /// Task file; relative paths inside it are resolved against its directory
        task: PathBuf,

        /// off, error, warn, info, debug or trace
        #[arg(long, default_value = "info")]
        log_level: String,

        /// Copy of the log messages
        #[arg(long)]
        log_file: Option<PathBuf>,
    },

    /// Write t.csv and data.csv of a synthetic Lotka-Volterra dataset
    GenerateLv {
        out_dir: PathBuf,

        #[arg(long, default_value_t = 201)]
        points: usize,

        #[arg(long, default_value_t = 1.0)]
        t_end: f64,
    },
}

fn run(task_path: &Path) -> Result<()> {
    let task = TaskDocument::from_file(task_path)?;
    let kind = task.get_str("experiment", "kind")?;
    match kind.as_str() {
        "lotka_volterra" => {
            let results = run_lotka_volterra(&task)?;
            if let Some(log) = &results.log {
                info!("log written to {}", log.path().display());
            }
            Ok(())
        }
        "burgers" => run_burgers(&task),
        _ => Err(BenchError::InvalidTaskValue {
            section: "experiment".to_string(),
            key: "kind".to_string(),
            value: kind,
        }),
    }
}

fn generate_lv(out_dir: &Path, points: usize, t_end: f64) -> Result<()> {
    if points < 2 || t_end <= 0.0 {
        return Err(BenchError::ShapeMismatch(format!(
            "{} points up to t = {}",
            points, t_end
        )));
    }
    std::fs::create_dir_all(out_dir)?;
    let t = Array1::linspace(0.0, t_end, points);
    let data = synthesize_lotka_volterra(&LotkaVolterraParams::default(), &t)?;
    let t_table = Array2::from_shape_vec((points, 1), t.to_vec())
        .map_err(|e| BenchError::ShapeMismatch(e.to_string()))?;
    write_table(&out_dir.join("t.csv"), &["t"], &t_table)?;
    write_table(&out_dir.join("data.csv"), &["u", "v"], &data)?;
    info!("{} points written to {}", points, out_dir.display());
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Run {
            task,
            log_level,
            log_file,
        } => parse_level(&log_level).and_then(|level| {
            init_logger(level, log_file.as_deref());
            run(&task)
        }),
        Commands::GenerateLv {
            out_dir,
            points,
            t_end,
        } => {
            init_logger(log::LevelFilter::Info, None);
            generate_lv(&out_dir, points, t_end)
        }
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
