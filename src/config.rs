// src/config.rs
//! Explicit configuration for the data-access layer: what to load
//! ([`LoadRequest`]) and where the scene files live ([`SceneManifest`]).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StackError};
use crate::stack::bands;

/// Projected bounding box in the CRS of the scene files
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

/// Inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Everything the data-access layer needs to assemble a stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadRequest {
    /// Product identifier, e.g. `ls8_usgs_sr_scene`
    pub product: String,
    pub bands: Vec<String>,
    #[serde(default)]
    pub region: Option<BoundingBox>,
    /// Expected output CRS, e.g. `EPSG:32633`. Not reprojected to.
    #[serde(default)]
    pub crs: Option<String>,
    /// Target pixel size in CRS units
    #[serde(default)]
    pub resolution: Option<f64>,
    #[serde(default)]
    pub time_range: Option<TimeRange>,
}

impl LoadRequest {
    pub fn new(product: impl Into<String>, bands: &[&str]) -> Self {
        Self {
            product: product.into(),
            bands: bands.iter().map(|b| b.to_string()).collect(),
            region: None,
            crs: None,
            resolution: None,
            time_range: None,
        }
    }

    /// Request the bands needed by NDVI, NDWI and MNDWI
    pub fn standard(product: impl Into<String>) -> Self {
        Self::new(
            product,
            &[bands::GREEN, bands::RED, bands::NIR, bands::SWIR1],
        )
    }

    pub fn with_region(mut self, region: BoundingBox) -> Self {
        self.region = Some(region);
        self
    }

    pub fn with_crs(mut self, crs: impl Into<String>) -> Self {
        self.crs = Some(crs.into());
        self
    }

    pub fn with_resolution(mut self, resolution: f64) -> Self {
        self.resolution = Some(resolution);
        self
    }

    pub fn with_time_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.time_range = Some(TimeRange { start, end });
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.bands.is_empty() {
            return Err(invalid("bands", "[]", "at least one band must be requested"));
        }
        if let Some(res) = self.resolution {
            if !(res.is_finite() && res > 0.0) {
                return Err(invalid("resolution", res, "must be positive"));
            }
        }
        if let Some(range) = &self.time_range {
            if range.start > range.end {
                return Err(invalid(
                    "time_range",
                    format!("{}..{}", range.start, range.end),
                    "start is after end",
                ));
            }
        }
        if let Some(bbox) = &self.region {
            if !(bbox.min_x < bbox.max_x && bbox.min_y < bbox.max_y) {
                return Err(invalid(
                    "region",
                    format!("{:?}", bbox),
                    "min must be below max on both axes",
                ));
            }
        }
        Ok(())
    }
}

fn invalid(name: &'static str, value: impl ToString, reason: &str) -> StackError {
    StackError::InvalidParameter {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Where one band of one acquisition is stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BandSource {
    /// Single-band file
    Path(PathBuf),
    /// A band (1-based) of a multi-band file
    Band { path: PathBuf, band: usize },
}

impl BandSource {
    pub fn path(&self) -> &Path {
        match self {
            BandSource::Path(path) => path,
            BandSource::Band { path, .. } => path,
        }
    }

    pub fn band_index(&self) -> usize {
        match self {
            BandSource::Path(_) => 1,
            BandSource::Band { band, .. } => *band,
        }
    }

    fn resolve(&mut self, base: &Path) {
        let path = match self {
            BandSource::Path(path) => path,
            BandSource::Band { path, .. } => path,
        };
        if path.is_relative() {
            *path = base.join(&*path);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acquisition {
    pub date: NaiveDate,
    pub bands: BTreeMap<String, BandSource>,
}

/// Local catalogue of aligned scene files, one entry per acquisition date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneManifest {
    pub product: String,
    #[serde(default)]
    pub acquisitions: Vec<Acquisition>,
}

impl SceneManifest {
    /// Read a manifest, resolving relative band paths against its directory
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut manifest: SceneManifest = serde_json::from_str(&content)?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for acquisition in &mut manifest.acquisitions {
            for source in acquisition.bands.values_mut() {
                source.resolve(base);
            }
        }
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_manifest_with_both_band_forms() {
        let json = r#"{
            "product": "ls8_usgs_sr_scene",
            "acquisitions": [
                {
                    "date": "2019-03-01",
                    "bands": {
                        "nir": "LC08_20190301_B5.tif",
                        "red": { "path": "LC08_20190301_stack.tif", "band": 4 }
                    }
                }
            ]
        }"#;
        let manifest: SceneManifest = serde_json::from_str(json).unwrap();
        let bands = &manifest.acquisitions[0].bands;

        assert_eq!(bands["nir"].band_index(), 1);
        assert_eq!(bands["red"].band_index(), 4);
        assert_eq!(bands["red"].path(), Path::new("LC08_20190301_stack.tif"));
    }

    #[test]
    fn manifest_paths_resolve_against_its_directory() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = dir.path().join("scene.json");
        fs::write(
            &manifest_path,
            r#"{"product": "ls8", "acquisitions": [{"date": "2019-03-01", "bands": {"nir": "b5.tif"}}]}"#,
        )
        .unwrap();

        let manifest = SceneManifest::from_file(&manifest_path).unwrap();
        assert_eq!(
            manifest.acquisitions[0].bands["nir"].path(),
            dir.path().join("b5.tif")
        );
    }

    #[test]
    fn load_request_defaults_and_validation() {
        let request: LoadRequest =
            serde_json::from_str(r#"{"product": "ls8", "bands": ["nir", "red"]}"#).unwrap();
        assert!(request.region.is_none());
        assert!(request.validate().is_ok());

        let start = NaiveDate::from_ymd_opt(2019, 6, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap();
        assert!(request.clone().with_time_range(start, end).validate().is_err());
        assert!(request.clone().with_resolution(0.0).validate().is_err());
        assert!(LoadRequest::new("ls8", &[]).validate().is_err());
    }

    #[test]
    fn standard_request_covers_index_bands() {
        let request = LoadRequest::standard("ls8");
        assert_eq!(request.bands, vec!["green", "red", "nir", "swir1"]);
    }
}
