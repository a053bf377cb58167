//! Powerplay OCR command line.
//!
//! Processes saved panel screenshots into batch files, parses OCR text
//! dumps, and re-runs the cycle consistency check on archived batches.

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

use powerplay_ocr::capture::FileScreenshots;
use powerplay_ocr::config::{default_config_path, load_config};
use powerplay_ocr::ocr::engine::TesseractCli;
use powerplay_ocr::ocr::{setup, Extractor};
use powerplay_ocr::parser::PanelParser;
use powerplay_ocr::validation::{describe_missing, missing_fields};
use powerplay_ocr::{logging, paths, pipeline};

#[derive(Parser, Debug)]
#[command(
    name = "powerplay-ocr",
    version,
    about = "Extract Powerplay panel data from screenshots"
)]
struct Cli {
    /// Config file (default: config.json next to the executable)
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process one screenshot per system listed in the input file
    Process {
        /// System names, one per line
        #[arg(short = 'i', long = "input", default_value = "input.txt")]
        input: PathBuf,

        /// Directory holding capture_NNN_<name>.png files
        #[arg(short = 's', long = "screenshots", default_value = "auto_capture/screenshots")]
        screenshots: PathBuf,
    },
    /// Parse a saved OCR text dump
    Parse {
        file: PathBuf,

        /// Print the record as JSON
        #[arg(long = "json")]
        json: bool,
    },
    /// Compare the two latest archived batches
    Compare,
    /// Install Tesseract language data into the local data directory
    Setup,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = load_config(&config_path);

    match cli.command {
        Command::Process { input, screenshots } => {
            paths::ensure_directories(&config.output).context("Failed to create output directories")?;
            let systems = pipeline::read_system_names(&input)?;
            if systems.is_empty() {
                return Err(anyhow!("{} has no system names", input.display()));
            }
            info!("Found {} systems to process", systems.len());

            let engine = TesseractCli::from_config(&config.ocr)?;
            let extractor = Extractor::new(engine, &config)?;
            let mut source = FileScreenshots::for_systems(
                &screenshots,
                &systems,
                config.output.delete_processed_screenshots,
            );

            let summary = pipeline::run_batch(&systems, &mut source, &extractor, &config, Local::now())?;
            for (name, missing) in &summary.rejected {
                warn!("Retry {}: missing {}", name, describe_missing(missing));
            }
            for (name, error) in &summary.failed {
                warn!("Retry {}: {}", name, error);
            }
        }
        Command::Parse { file, json } => {
            let text = fs::read_to_string(&file).with_context(|| format!("Failed to read {}", file.display()))?;
            let parser = PanelParser::new(config.parsing.clone())?;
            let record = parser.parse_record(&text);

            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                let name = file
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                print!("{}", pipeline::debug_report(1, &name, &record));
            }
            let missing = missing_fields(&record);
            if !missing.is_empty() {
                warn!("Invalid: Missing {}", describe_missing(&missing));
            }
        }
        Command::Compare => {
            pipeline::compare_latest(&config.output.archive_dir, &config)?;
        }
        Command::Setup => {
            let tessdata = setup::ensure_tessdata(&config.ocr.language)?;
            info!("Language data ready in {}", tessdata.display());
            setup::locate(&config.ocr)?;
        }
    }

    Ok(())
}
