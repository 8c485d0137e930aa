use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::config::{BoundingBox, LoadRequest};
use crate::io::WriteOptions;
use crate::processing::indices::{MndwiDenominator, STANDARD_LAYERS};

#[derive(Parser)]
#[command(name = "spectral-stack")]
#[command(about = "Band-index calculator for multi-temporal Landsat stacks")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Worker threads (default: all cores)
    #[arg(long, global = true)]
    pub threads: Option<usize>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use float32 instead of int16
    #[arg(long, global = true)]
    pub float: bool,

    /// Scaling factor for fixed-point
    #[arg(long, default_value = "10000", global = true)]
    pub scale_factor: i32,

    /// Compression: DEFLATE, ZSTD, LZW or NONE
    #[arg(long, default_value = "DEFLATE", global = true)]
    pub compress: String,

    #[arg(long, default_value = "6", global = true)]
    pub compress_level: u8,

    /// Write striped instead of tiled GeoTIFFs
    #[arg(long, global = true)]
    pub no_tiled: bool,
}

impl Cli {
    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            float: self.float,
            scale_factor: self.scale_factor,
            compress: self.compress.clone(),
            compress_level: self.compress_level,
            tiled: !self.no_tiled,
        }
    }
}

/// Where and what to load
#[derive(Args, Debug, Clone)]
pub struct LoadArgs {
    /// Scene manifest (JSON)
    #[arg(short, long)]
    pub manifest: PathBuf,

    /// Product identifier (default: the manifest's product)
    #[arg(long)]
    pub product: Option<String>,

    /// Expected CRS, e.g. EPSG:32633
    #[arg(long)]
    pub crs: Option<String>,

    /// Target pixel size in CRS units
    #[arg(long)]
    pub resolution: Option<f64>,

    /// Region as min_x,min_y,max_x,max_y in the scene CRS
    #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true)]
    pub region: Option<BoundingBox>,

    /// First acquisition date (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last acquisition date (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<NaiveDate>,
}

impl LoadArgs {
    pub fn to_request(&self, manifest_product: &str, bands: &[&str]) -> LoadRequest {
        let product = self.product.as_deref().unwrap_or(manifest_product);
        let mut request = LoadRequest::new(product, bands);
        request.region = self.region;
        request.crs = self.crs.clone();
        request.resolution = self.resolution;

        if self.start.is_some() || self.end.is_some() {
            request = request.with_time_range(
                self.start.unwrap_or(NaiveDate::MIN),
                self.end.unwrap_or(NaiveDate::MAX),
            );
        }
        request
    }
}

fn parse_bbox(s: &str) -> Result<BoundingBox, String> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|e| format!("'{}': {}", v, e)))
        .collect::<Result<Vec<_>, _>>()?;

    match values.as_slice() {
        &[min_x, min_y, max_x, max_y] => Ok(BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }),
        _ => Err(format!("expected 4 comma-separated values, got {}", values.len())),
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Normalized Difference Index: (A-B)/(A+B)
    Ndi {
        #[command(flatten)]
        load: LoadArgs,

        /// First band (A)
        #[arg(short = 'a', long)]
        band_a: String,

        /// Second band (B)
        #[arg(short = 'b', long)]
        band_b: String,

        /// Name of the derived layer
        #[arg(short, long, default_value = "ndi")]
        name: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// NDVI, NDWI and MNDWI in one pass
    Standard {
        #[command(flatten)]
        load: LoadArgs,

        #[arg(long, value_enum, default_value_t = MndwiDenominator::GreenSwir1)]
        mndwi_denominator: MndwiDenominator,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Difference of an index between two time slices, as a JSON report
    Compare {
        #[command(flatten)]
        load: LoadArgs,

        #[arg(long, value_parser = STANDARD_LAYERS, default_value = "ndvi")]
        index: String,

        /// Time index of the earlier slice
        #[arg(long, default_value = "0")]
        before: usize,

        /// Time index of the later slice
        #[arg(long, default_value = "1")]
        after: usize,

        /// Drop differences below this value from the histogram
        #[arg(long, allow_negative_numbers = true)]
        lower_bound: Option<f32>,

        #[arg(long, default_value = "40")]
        bins: usize,

        #[arg(long, value_enum, default_value_t = MndwiDenominator::GreenSwir1)]
        mndwi_denominator: MndwiDenominator,

        /// Report file (default: stdout)
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Run operations from a JSON batch file
    Batch {
        config: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_parses_four_values() {
        let bbox = parse_bbox("500000, 4090000,510000,4100000").unwrap();
        assert_eq!(bbox.min_x, 500000.0);
        assert_eq!(bbox.max_y, 4100000.0);
        assert!(parse_bbox("1,2,3").is_err());
        assert!(parse_bbox("1,2,x,4").is_err());
    }

    #[test]
    fn region_accepts_negative_coordinates() {
        let cli = Cli::try_parse_from([
            "spectral-stack",
            "ndi",
            "-m",
            "scene.json",
            "-a",
            "nir",
            "-b",
            "swir1",
            "--region",
            "-105.3,39.9,-105.1,40.1",
        ])
        .unwrap();

        match cli.command {
            Commands::Ndi { load, .. } => {
                let bbox = load.region.unwrap();
                assert_eq!(bbox.min_x, -105.3);
                assert_eq!(bbox.max_y, 40.1);
            }
            _ => panic!("expected ndi command"),
        }
    }

    #[test]
    fn standard_command_parses() {
        let cli = Cli::try_parse_from([
            "spectral-stack",
            "standard",
            "--manifest",
            "scene.json",
            "--mndwi-denominator",
            "nir-swir1",
            "--start",
            "2019-01-01",
            "--float",
        ])
        .unwrap();

        assert!(cli.write_options().float);
        match cli.command {
            Commands::Standard {
                load,
                mndwi_denominator,
                ..
            } => {
                assert_eq!(mndwi_denominator, MndwiDenominator::NirSwir1);
                let request = load.to_request("ls8", &["nir"]);
                let range = request.time_range.unwrap();
                assert_eq!(range.start, NaiveDate::from_ymd_opt(2019, 1, 1).unwrap());
                assert_eq!(range.end, NaiveDate::MAX);
            }
            _ => panic!("expected standard command"),
        }
    }
}
