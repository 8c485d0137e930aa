// src/io/reader.rs
use std::path::Path;
use std::sync::Arc;

use itertools::Itertools;
use log::{debug, info, warn};
use ndarray::{Array2, ArrayView2, Axis};
use rayon::prelude::*;

use crate::config::{Acquisition, BandSource, BoundingBox, LoadRequest, SceneManifest};
use crate::error::{Result, StackError};
use crate::stack::{GeoInfo, RasterStack};
use crate::utils::cache::RasterCache;

/// Data-access port: builds a [`RasterStack`] for a load request
pub trait StackSource {
    fn load(&self, request: &LoadRequest) -> Result<RasterStack>;
}

/// Loads stacks from local GeoTIFFs listed in a [`SceneManifest`].
///
/// The files of one manifest must already share a grid; nothing here
/// reprojects. `region` crops through the geo-transform and `resolution`
/// goes through GDAL's buffer resampling.
pub struct GdalStackSource {
    manifest: SceneManifest,
    cache: Arc<RasterCache>,
}

impl GdalStackSource {
    pub fn new(manifest: SceneManifest) -> Self {
        Self::with_cache(manifest, Arc::new(RasterCache::new()))
    }

    pub fn with_cache(manifest: SceneManifest, cache: Arc<RasterCache>) -> Self {
        Self { manifest, cache }
    }

    pub fn from_manifest_file(path: &Path) -> Result<Self> {
        info!("Reading scene manifest: {}", path.display());
        Ok(Self::new(SceneManifest::from_file(path)?))
    }

    fn select_acquisitions(&self, request: &LoadRequest) -> Result<Vec<&Acquisition>> {
        if request.product != self.manifest.product {
            return Err(StackError::InvalidParameter {
                name: "product",
                value: request.product.clone(),
                reason: format!("manifest holds '{}'", self.manifest.product),
            });
        }

        let acquisitions = self
            .manifest
            .acquisitions
            .iter()
            .filter(|acq| request.time_range.map_or(true, |range| range.contains(acq.date)))
            .sorted_by_key(|acq| acq.date)
            .collect::<Vec<_>>();

        if acquisitions.is_empty() {
            return Err(StackError::InvalidParameter {
                name: "time_range",
                value: format!("{:?}", request.time_range),
                reason: "no acquisitions in range".to_string(),
            });
        }

        for acq in &acquisitions {
            if let Some(band) = request.bands.iter().find(|b| !acq.bands.contains_key(*b)) {
                warn!("Acquisition {} has no '{}' band", acq.date, band);
                return Err(StackError::MissingBand(band.clone()));
            }
        }
        Ok(acquisitions)
    }

    fn read_slice(
        &self,
        source: &BandSource,
        window: &ReadWindow,
        reference: (usize, usize),
    ) -> Result<Array2<f32>> {
        let dataset = self.cache.get_dataset(source.path())?;
        let dataset = dataset.lock();

        let (width, height) = dataset.raster_size();
        if (width, height) != reference {
            return Err(StackError::ShapeMismatch {
                expected_name: "reference grid".to_string(),
                expected: (1, reference.1, reference.0),
                actual_name: source.path().display().to_string(),
                actual: (1, height, width),
            });
        }

        let band = dataset.rasterband(source.band_index())?;
        let buffer = band.read_as::<f32>(window.offset, window.size, window.buffer, None)?;
        let data = nodata_to_nan(buffer.data(), band.no_data_value());

        Ok(Array2::from_shape_vec(
            (window.buffer.1, window.buffer.0),
            data,
        )?)
    }
}

impl StackSource for GdalStackSource {
    fn load(&self, request: &LoadRequest) -> Result<RasterStack> {
        request.validate()?;
        let acquisitions = self.select_acquisitions(request)?;

        // The first requested band of the first acquisition defines the grid
        let reference = &acquisitions[0].bands[&request.bands[0]];
        let (raster_size, geo_transform, projection) = {
            let dataset = self.cache.get_dataset(reference.path())?;
            let dataset = dataset.lock();
            (
                dataset.raster_size(),
                dataset.geo_transform()?,
                dataset.projection(),
            )
        };

        if let Some(crs) = &request.crs {
            if !projection_matches(&projection, crs) {
                warn!(
                    "Requested CRS {} does not match scene projection; bands are used as stored",
                    crs
                );
            }
        }

        let window = ReadWindow::new(
            raster_size,
            geo_transform,
            request.region.as_ref(),
            request.resolution,
        )?;
        info!(
            "Loading {} band(s) x {} acquisition(s) of {} at {}x{}",
            request.bands.len(),
            acquisitions.len(),
            request.product,
            window.buffer.0,
            window.buffer.1
        );

        let jobs = request
            .bands
            .iter()
            .flat_map(|band| acquisitions.iter().map(move |acq| &acq.bands[band]))
            .collect::<Vec<_>>();

        let slices = jobs
            .par_iter()
            .map(|source| self.read_slice(source, &window, raster_size))
            .collect::<Result<Vec<_>>>()?;

        let geo = GeoInfo {
            projection,
            geo_transform: window.geo_transform,
        };
        let times = acquisitions.iter().map(|acq| acq.date).collect();
        let mut stack = RasterStack::with_times(times, geo)?;

        // `slices` is band-major: one run of `acquisitions.len()` slices per band
        for (band, per_band) in request.bands.iter().zip(slices.chunks(acquisitions.len())) {
            let views = per_band.iter().map(|s| s.view()).collect::<Vec<ArrayView2<'_, f32>>>();
            stack.insert_band(band.clone(), ndarray::stack(Axis(0), &views)?)?;
            debug!("Loaded band {}", band);
        }

        Ok(stack)
    }
}

/// Replace the band's nodata sentinel with NaN. The sentinel is compared in
/// f32, the type the samples are read as.
fn nodata_to_nan(values: &[f32], nodata: Option<f64>) -> Vec<f32> {
    match nodata.map(|nd| nd as f32) {
        Some(nd) => values
            .iter()
            .map(|&v| if v == nd { f32::NAN } else { v })
            .collect(),
        None => values.to_vec(),
    }
}

/// Loose check that a WKT projection refers to an `AUTHORITY:CODE` CRS
fn projection_matches(projection: &str, crs: &str) -> bool {
    match crs.split_once(':') {
        Some((authority, code)) => {
            projection.contains(&format!("\"{}\",\"{}\"", authority.to_uppercase(), code))
                || projection.contains(&format!("\"{}\",{}", authority.to_uppercase(), code))
        }
        None => projection.contains(crs),
    }
}

/// Pixel window read from every band file, and the georeferencing of the result
#[derive(Debug, Clone, PartialEq)]
struct ReadWindow {
    offset: (isize, isize),
    size: (usize, usize),
    buffer: (usize, usize),
    geo_transform: [f64; 6],
}

impl ReadWindow {
    fn new(
        raster_size: (usize, usize),
        gt: [f64; 6],
        region: Option<&BoundingBox>,
        resolution: Option<f64>,
    ) -> Result<Self> {
        let (width, height) = raster_size;
        let (mut col0, mut row0, mut cols, mut rows) = (0usize, 0usize, width, height);

        if let Some(bbox) = region {
            if gt[2] != 0.0 || gt[4] != 0.0 {
                return Err(StackError::InvalidParameter {
                    name: "region",
                    value: format!("{:?}", bbox),
                    reason: "cropping a rotated grid is not supported".to_string(),
                });
            }

            let to_col = |x: f64| (x - gt[0]) / gt[1];
            let to_row = |y: f64| (y - gt[3]) / gt[5];
            let (c_lo, c_hi) = min_max(to_col(bbox.min_x), to_col(bbox.max_x));
            let (r_lo, r_hi) = min_max(to_row(bbox.min_y), to_row(bbox.max_y));

            let c0 = c_lo.floor().clamp(0.0, width as f64) as usize;
            let c1 = c_hi.ceil().clamp(0.0, width as f64) as usize;
            let r0 = r_lo.floor().clamp(0.0, height as f64) as usize;
            let r1 = r_hi.ceil().clamp(0.0, height as f64) as usize;

            if c1 <= c0 || r1 <= r0 {
                return Err(StackError::InvalidParameter {
                    name: "region",
                    value: format!("{:?}", bbox),
                    reason: "region does not overlap the scene".to_string(),
                });
            }
            (col0, row0, cols, rows) = (c0, r0, c1 - c0, r1 - r0);
        }

        let buffer = match resolution {
            Some(res) => (
                ((cols as f64 * gt[1].abs()) / res).round().max(1.0) as usize,
                ((rows as f64 * gt[5].abs()) / res).round().max(1.0) as usize,
            ),
            None => (cols, rows),
        };

        // Keep the window's footprint, spread over the buffer's pixel count
        let x_scale = cols as f64 / buffer.0 as f64;
        let y_scale = rows as f64 / buffer.1 as f64;
        let geo_transform = [
            gt[0] + col0 as f64 * gt[1] + row0 as f64 * gt[2],
            gt[1] * x_scale,
            gt[2] * y_scale,
            gt[3] + col0 as f64 * gt[4] + row0 as f64 * gt[5],
            gt[4] * x_scale,
            gt[5] * y_scale,
        ];

        Ok(Self {
            offset: (col0 as isize, row0 as isize),
            size: (cols, rows),
            buffer,
            geo_transform,
        })
    }
}

fn min_max(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 30 m UTM grid, 100 x 80 pixels, origin (500000, 4100000)
    const GT: [f64; 6] = [500000.0, 30.0, 0.0, 4100000.0, 0.0, -30.0];

    #[test]
    fn full_window_without_region() {
        let window = ReadWindow::new((100, 80), GT, None, None).unwrap();
        assert_eq!(window.offset, (0, 0));
        assert_eq!(window.size, (100, 80));
        assert_eq!(window.buffer, (100, 80));
        assert_eq!(window.geo_transform, GT);
    }

    #[test]
    fn region_crops_to_pixel_window() {
        let bbox = BoundingBox {
            min_x: 500300.0,
            min_y: 4099100.0,
            max_x: 500600.0,
            max_y: 4099700.0,
        };
        let window = ReadWindow::new((100, 80), GT, Some(&bbox), None).unwrap();

        assert_eq!(window.offset, (10, 10));
        assert_eq!(window.size, (10, 20));
        assert_eq!(window.geo_transform[0], 500300.0);
        assert_eq!(window.geo_transform[3], 4099700.0);
    }

    #[test]
    fn region_outside_scene_is_rejected() {
        let bbox = BoundingBox {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 10.0,
            max_y: 10.0,
        };
        assert!(matches!(
            ReadWindow::new((100, 80), GT, Some(&bbox), None),
            Err(StackError::InvalidParameter { name: "region", .. })
        ));
    }

    #[test]
    fn resolution_sets_buffer_size() {
        let window = ReadWindow::new((100, 80), GT, None, Some(60.0)).unwrap();
        assert_eq!(window.size, (100, 80));
        assert_eq!(window.buffer, (50, 40));
        assert_eq!(window.geo_transform[1], 60.0);
        assert_eq!(window.geo_transform[5], -60.0);
    }

    #[test]
    fn nodata_sentinel_becomes_nan() {
        let values = [-10000.0f32, 0.25, -9999.0, 1e-4];
        let out = nodata_to_nan(&values, Some(-10000.0));
        assert!(out[0].is_nan());
        assert_eq!(&out[1..], &[0.25, -9999.0, 1e-4]);

        // A sentinel that only exists in f64 still matches its f32 rounding
        let out = nodata_to_nan(&[-3.4028235e38f32], Some(-3.4028234663852886e38));
        assert!(out[0].is_nan());

        assert_eq!(nodata_to_nan(&values, None), values.to_vec());
    }

    #[test]
    fn projection_match_is_loose() {
        let wkt = r#"PROJCS["WGS 84 / UTM zone 33N",AUTHORITY["EPSG","32633"]]"#;
        assert!(projection_matches(wkt, "EPSG:32633"));
        assert!(projection_matches(wkt, "epsg:32633"));
        assert!(!projection_matches(wkt, "EPSG:4326"));
    }
}
