//! FlipAnim CLI
//!
//! Commands: convert, verify, defaults
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 when a sequence failed or verification found issues

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;

use flipanim_core::{verify_output, BatchPipeline, RunConfig};

#[derive(Parser)]
#[command(name = "flipanim-cli")]
#[command(about = "FlipAnim CLI - image folders to Flipper animation frames")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// More log output (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert every subfolder of the input directory into an animation
    Convert {
        /// JSON run configuration; flags below override its fields
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Folder containing one subfolder per animation
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Base output folder
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Animation set name, nested under the output folder
        #[arg(short, long)]
        name: Option<String>,

        /// Intensity threshold (0-255); at or above becomes white
        #[arg(short, long, allow_negative_numbers = true)]
        threshold: Option<i64>,

        /// Horizontal shift in pixels, positive moves right
        #[arg(long, allow_negative_numbers = true)]
        shift_x: Option<i32>,

        /// Vertical shift in pixels, positive moves down
        #[arg(long, allow_negative_numbers = true)]
        shift_y: Option<i32>,

        /// Uniform scale factor applied before centering
        #[arg(short, long, allow_negative_numbers = true)]
        scale: Option<f64>,
    },

    /// Check an output folder's descriptors against its frames
    Verify {
        /// Output root containing manifest.txt
        root: PathBuf,
    },

    /// Print the default run configuration
    Defaults,
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => LevelFilter::ERROR,
        (false, 0) => LevelFilter::INFO,
        (false, 1) => LevelFilter::DEBUG,
        (false, _) => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn print_error(error: impl std::fmt::Display) -> ExitCode {
    let output = serde_json::json!({
        "success": false,
        "error": error.to_string(),
    });
    println!("{}", output);
    ExitCode::FAILURE
}

fn print_json(value: &impl serde::Serialize) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Defaults => match print_json(&RunConfig::default()) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => print_error(e),
        },

        Commands::Verify { root } => {
            let report = verify_output(&root);
            if let Err(e) = print_json(&report) {
                return print_error(e);
            }
            if report.is_ok() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }

        Commands::Convert { config, input, output, name, threshold, shift_x, shift_y, scale } => {
            let base = match config {
                Some(path) => match RunConfig::load_from_file(&path) {
                    Ok(c) => c,
                    Err(e) => return print_error(e),
                },
                None => RunConfig::default(),
            };

            let config = RunConfig {
                input_dir: input.unwrap_or(base.input_dir),
                output_dir: output.unwrap_or(base.output_dir),
                animation_name: name.or(base.animation_name),
                threshold: threshold.unwrap_or(base.threshold),
                shift_x: shift_x.unwrap_or(base.shift_x),
                shift_y: shift_y.unwrap_or(base.shift_y),
                scale_factor: scale.unwrap_or(base.scale_factor),
            };

            let pipeline = match BatchPipeline::new(config) {
                Ok(p) => p,
                Err(e) => return print_error(e),
            };

            match pipeline.run() {
                Ok(report) => {
                    if let Err(e) = print_json(&report) {
                        return print_error(e);
                    }
                    if report.is_clean() {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::from(2)
                    }
                }
                Err(e) => print_error(e),
            }
        }
    }
}
