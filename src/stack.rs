// src/stack.rs
//! Multi-band, optionally multi-temporal raster stack.
//!
//! Every layer is an `Array3<f32>` laid out as `(time, row, col)`. A stack
//! without a time axis holds exactly one slice per layer.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use itertools::Itertools;
use ndarray::{Array2, Array3, ArrayView2, Axis};

use crate::error::{Result, StackError};

/// Canonical Landsat band names used by the standard indices
pub mod bands {
    pub const BLUE: &str = "blue";
    pub const GREEN: &str = "green";
    pub const RED: &str = "red";
    pub const NIR: &str = "nir";
    pub const SWIR1: &str = "swir1";
    pub const SWIR2: &str = "swir2";
}

/// Georeferencing carried alongside the stack. Never interpreted by the
/// index code, only handed back to the writer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoInfo {
    pub projection: String,
    pub geo_transform: [f64; 6],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    /// Supplied by the data-access layer
    Band,
    /// Attached by index computation
    Derived,
}

#[derive(Debug, Clone)]
struct Layer {
    data: Array3<f32>,
    kind: LayerKind,
}

#[derive(Debug, Clone)]
pub struct RasterStack {
    layers: BTreeMap<String, Layer>,
    times: Option<Vec<NaiveDate>>,
    geo: GeoInfo,
}

impl RasterStack {
    /// Create an empty stack without a time axis
    pub fn new(geo: GeoInfo) -> Self {
        Self {
            layers: BTreeMap::new(),
            times: None,
            geo,
        }
    }

    /// Create an empty stack with a time axis. Dates must be strictly ascending.
    pub fn with_times(times: Vec<NaiveDate>, geo: GeoInfo) -> Result<Self> {
        if times.is_empty() {
            return Err(StackError::InvalidTimeAxis("time axis is empty".to_string()));
        }
        if let Some((prev, next)) = times.iter().tuple_windows().find(|(a, b)| a >= b) {
            return Err(StackError::InvalidTimeAxis(format!(
                "dates must be strictly ascending, found {} before {}",
                prev, next
            )));
        }

        Ok(Self {
            layers: BTreeMap::new(),
            times: Some(times),
            geo,
        })
    }

    pub fn geo(&self) -> &GeoInfo {
        &self.geo
    }

    pub fn times(&self) -> Option<&[NaiveDate]> {
        self.times.as_deref()
    }

    /// Number of time slices per layer
    pub fn time_len(&self) -> usize {
        self.times.as_ref().map_or(1, Vec::len)
    }

    /// `(time, rows, cols)` shared by every layer, `None` while the stack is empty
    pub fn shape(&self) -> Option<(usize, usize, usize)> {
        self.layers.values().next().map(|layer| layer.data.dim())
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.layers.contains_key(name)
    }

    pub fn kind(&self, name: &str) -> Option<LayerKind> {
        self.layers.get(name).map(|layer| layer.kind)
    }

    /// Names of every layer, bands and derived, in name order
    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }

    pub fn band_names(&self) -> impl Iterator<Item = &str> {
        self.names_of(LayerKind::Band)
    }

    pub fn derived_names(&self) -> impl Iterator<Item = &str> {
        self.names_of(LayerKind::Derived)
    }

    fn names_of(&self, kind: LayerKind) -> impl Iterator<Item = &str> {
        self.layers
            .iter()
            .filter(move |(_, layer)| layer.kind == kind)
            .map(|(name, _)| name.as_str())
    }

    pub fn layer(&self, name: &str) -> Option<&Array3<f32>> {
        self.layers.get(name).map(|layer| &layer.data)
    }

    /// Like [`RasterStack::layer`], failing with `MissingBand` when absent
    pub fn require(&self, name: &str) -> Result<&Array3<f32>> {
        self.layer(name)
            .ok_or_else(|| StackError::MissingBand(name.to_string()))
    }

    /// One time slice of a layer
    pub fn slice(&self, name: &str, time_index: usize) -> Result<ArrayView2<'_, f32>> {
        let layer = self.require(name)?;
        let len = layer.len_of(Axis(0));
        if time_index >= len {
            return Err(StackError::TimeIndexOutOfRange {
                index: time_index,
                len,
            });
        }
        Ok(layer.index_axis(Axis(0), time_index))
    }

    /// Add an input band. The band's time extent must match the time axis.
    pub fn insert_band(&mut self, name: impl Into<String>, data: Array3<f32>) -> Result<()> {
        let name = name.into();
        if self.layers.contains_key(&name) {
            return Err(StackError::LayerNameConflict(name));
        }
        self.check_shape(&name, &data)?;
        self.layers.insert(
            name,
            Layer {
                data,
                kind: LayerKind::Band,
            },
        );
        Ok(())
    }

    /// Add a single-date band to a stack without a time axis
    pub fn insert_band_2d(&mut self, name: impl Into<String>, data: Array2<f32>) -> Result<()> {
        self.insert_band(name, data.insert_axis(Axis(0)))
    }

    /// Attach a derived layer, replacing an earlier derived layer of the same name.
    /// Input bands can never be replaced.
    pub fn attach_derived(&mut self, name: impl Into<String>, data: Array3<f32>) -> Result<()> {
        let name = name.into();
        if self.kind(&name) == Some(LayerKind::Band) {
            return Err(StackError::LayerNameConflict(name));
        }
        // An existing derived layer of the same name is about to be replaced,
        // so only compare against the other layers.
        if let Some((other, existing)) = self.layers.iter().find(|(n, _)| **n != name) {
            if existing.data.dim() != data.dim() {
                return Err(StackError::ShapeMismatch {
                    expected_name: other.clone(),
                    expected: existing.data.dim(),
                    actual_name: name,
                    actual: data.dim(),
                });
            }
        }
        self.layers.insert(
            name,
            Layer {
                data,
                kind: LayerKind::Derived,
            },
        );
        Ok(())
    }

    /// Remove a derived layer. Bands stay.
    pub fn remove_derived(&mut self, name: &str) -> Option<Array3<f32>> {
        if self.kind(name) == Some(LayerKind::Derived) {
            self.layers.remove(name).map(|layer| layer.data)
        } else {
            None
        }
    }

    fn check_shape(&self, name: &str, data: &Array3<f32>) -> Result<()> {
        let time_len = data.len_of(Axis(0));
        if time_len != self.time_len() {
            return Err(StackError::InvalidTimeAxis(format!(
                "layer '{}' has {} time slices, stack has {}",
                name,
                time_len,
                self.time_len()
            )));
        }
        if let Some((other, existing)) = self.layers.iter().next() {
            if existing.data.dim() != data.dim() {
                return Err(StackError::ShapeMismatch {
                    expected_name: other.clone(),
                    expected: existing.data.dim(),
                    actual_name: name.to_string(),
                    actual: data.dim(),
                });
            }
        }
        Ok(())
    }
}
