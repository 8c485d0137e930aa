// src/io/writer.rs
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use gdal::raster::{Buffer, RasterCreationOptions};
use gdal::{DriverManager, Metadata};
use log::info;
use ndarray::{Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::stack::GeoInfo;
use crate::utils::fixed_point::{to_fixed_point, NODATA_VALUE_INT};

/// GeoTIFF output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOptions {
    /// Write float32 (NaN nodata) instead of scaled int16
    #[serde(default)]
    pub float: bool,
    #[serde(default = "default_scale_factor")]
    pub scale_factor: i32,
    #[serde(default = "default_compress")]
    pub compress: String,
    #[serde(default = "default_compress_level")]
    pub compress_level: u8,
    #[serde(default = "default_true")]
    pub tiled: bool,
}

fn default_compress() -> String {
    "DEFLATE".to_string()
}

fn default_compress_level() -> u8 {
    6
}

fn default_scale_factor() -> i32 {
    10000
}

fn default_true() -> bool {
    true
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            float: false,
            scale_factor: default_scale_factor(),
            compress: default_compress(),
            compress_level: default_compress_level(),
            tiled: true,
        }
    }
}

impl WriteOptions {
    fn creation_options(&self) -> Vec<String> {
        let mut options = Vec::new();
        let compress = self.compress.to_uppercase();

        // Add compression if not NONE
        if compress != "NONE" {
            options.push(format!("COMPRESS={}", compress));

            match compress.as_str() {
                "DEFLATE" => options.push(format!("ZLEVEL={}", self.compress_level.min(9))),
                "ZSTD" => options.push(format!("ZSTD_LEVEL={}", self.compress_level.min(22))),
                _ => {}
            }
        }

        if self.tiled {
            options.push("TILED=YES".to_string());
        }

        options.push("NUM_THREADS=ALL_CPUS".to_string());
        options
    }
}

/// Write one 2-D layer slice as a single-band GeoTIFF
pub fn write_layer(
    path: &Path,
    name: &str,
    data: ArrayView2<'_, f32>,
    geo: &GeoInfo,
    options: &WriteOptions,
) -> Result<()> {
    let (rows, cols) = data.dim();
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let creation_options = RasterCreationOptions::from_iter(options.creation_options());

    let mut out_ds = if options.float {
        driver.create_with_band_type_with_options::<f32, _>(path, cols, rows, 1, &creation_options)?
    } else {
        driver.create_with_band_type_with_options::<i16, _>(path, cols, rows, 1, &creation_options)?
    };

    if !geo.projection.is_empty() {
        out_ds.set_projection(&geo.projection)?;
    }
    out_ds.set_geo_transform(&geo.geo_transform)?;

    let mut band = out_ds.rasterband(1)?;
    if options.float {
        band.set_no_data_value(Some(f64::NAN))?;
        band.set_description(name)?;

        let mut buffer = Buffer::new((cols, rows), data.iter().copied().collect());
        band.write((0, 0), (cols, rows), &mut buffer)?;
    } else {
        band.set_no_data_value(Some(NODATA_VALUE_INT as f64))?;
        band.set_metadata_item("SCALE", &format!("{}", 1.0 / options.scale_factor as f64), "")?;
        band.set_metadata_item("OFFSET", "0", "")?;
        band.set_description(&format!("{} (scaled by {})", name, options.scale_factor))?;

        let fixed = to_fixed_point(data.iter(), options.scale_factor, NODATA_VALUE_INT);
        let mut buffer = Buffer::new((cols, rows), fixed);
        band.write((0, 0), (cols, rows), &mut buffer)?;
    }

    out_ds.flush_cache()?;
    Ok(())
}

/// Write every time slice of a layer into `dir`, one file per slice.
///
/// Files are named `<name>_<YYYY-MM-DD>.tif` when dates are known,
/// `<name>_<index>.tif` for unnamed slices, and `<name>.tif` for a single
/// undated slice.
pub fn write_layer_series(
    dir: &Path,
    name: &str,
    layer: &Array3<f32>,
    times: Option<&[NaiveDate]>,
    geo: &GeoInfo,
    options: &WriteOptions,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let slices = layer.len_of(Axis(0));
    let mut written = Vec::with_capacity(slices);

    for (t, slice) in layer.axis_iter(Axis(0)).enumerate() {
        let file_name = match times.and_then(|times| times.get(t)) {
            Some(date) => format!("{}_{}.tif", name, date.format("%Y-%m-%d")),
            None if slices == 1 => format!("{}.tif", name),
            None => format!("{}_{:03}.tif", name, t),
        };
        let path = dir.join(file_name);

        write_layer(&path, name, slice, geo, options)?;
        info!("Wrote {}", path.display());
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_options_follow_compression() {
        let options = WriteOptions::default();
        assert_eq!(
            options.creation_options(),
            vec!["COMPRESS=DEFLATE", "ZLEVEL=6", "TILED=YES", "NUM_THREADS=ALL_CPUS"]
        );

        let options = WriteOptions {
            compress: "zstd".to_string(),
            compress_level: 30,
            tiled: false,
            ..WriteOptions::default()
        };
        assert_eq!(
            options.creation_options(),
            vec!["COMPRESS=ZSTD", "ZSTD_LEVEL=22", "NUM_THREADS=ALL_CPUS"]
        );

        let options = WriteOptions {
            compress: "none".to_string(),
            ..WriteOptions::default()
        };
        assert_eq!(options.creation_options(), vec!["TILED=YES", "NUM_THREADS=ALL_CPUS"]);
    }

    #[test]
    fn write_options_defaults_from_json() {
        let options: WriteOptions = serde_json::from_str(r#"{"float": true}"#).unwrap();
        assert!(options.float);
        assert_eq!(options.scale_factor, 10000);
        assert_eq!(options.compress, "DEFLATE");
        assert!(options.tiled);
    }
}
