// src/main.rs
use std::fs;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::info;

use spectral_stack::batch::process_batch;
use spectral_stack::cli::{Cli, Commands, LoadArgs};
use spectral_stack::config::SceneManifest;
use spectral_stack::io::{GdalStackSource, StackSource};
use spectral_stack::pipeline::{run_compare, run_ndi, run_standard};
use spectral_stack::processing::indices::{StandardIndices, STANDARD_LAYERS};
use spectral_stack::processing::ParallelProcessor;
use spectral_stack::stack::{bands, RasterStack};

fn load_stack(load: &LoadArgs, bands: &[&str]) -> Result<RasterStack> {
    let manifest = SceneManifest::from_file(&load.manifest)
        .with_context(|| format!("Failed to read manifest {}", load.manifest.display()))?;
    let request = load.to_request(&manifest.product, bands);

    GdalStackSource::new(manifest)
        .load(&request)
        .with_context(|| format!("Failed to load stack from {}", load.manifest.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let processor = ParallelProcessor::new(cli.threads)?;
    info!("Using {} threads", processor.threads());
    let options = cli.write_options();

    match &cli.command {
        Commands::Ndi {
            load,
            band_a,
            band_b,
            name,
            output,
        } => {
            let mut stack = load_stack(load, &[band_a.as_str(), band_b.as_str()])?;
            let written = run_ndi(&processor, &mut stack, band_a, band_b, name, output, &options)?;
            info!("Processing complete: {} file(s) in {}", written.len(), output.display());
        }
        Commands::Standard {
            load,
            mndwi_denominator,
            output,
        } => {
            let mut stack = load_stack(load, &standard_bands())?;
            let indices = StandardIndices {
                mndwi_denominator: *mndwi_denominator,
            };
            let written = run_standard(&processor, &mut stack, &indices, output, &options)?;
            info!(
                "Processing complete: {} ({} file(s)) in {}",
                STANDARD_LAYERS.join(", "),
                written.len(),
                output.display()
            );
        }
        Commands::Compare {
            load,
            index,
            before,
            after,
            lower_bound,
            bins,
            mndwi_denominator,
            report,
        } => {
            let mut stack = load_stack(load, &standard_bands())?;
            let indices = StandardIndices {
                mndwi_denominator: *mndwi_denominator,
            };
            let result = run_compare(
                &processor,
                &mut stack,
                index,
                &indices,
                (*before, *after),
                *lower_bound,
                *bins,
            )?;

            let json = serde_json::to_string_pretty(&result)?;
            match report {
                Some(path) => {
                    fs::write(path, json)
                        .with_context(|| format!("Failed to write report {}", path.display()))?;
                    info!("Report written to {}", path.display());
                }
                None => println!("{}", json),
            }
        }
        Commands::Batch { config } => {
            process_batch(config, &processor)?;
        }
    }

    Ok(())
}

fn standard_bands() -> [&'static str; 4] {
    [bands::GREEN, bands::RED, bands::NIR, bands::SWIR1]
}
