// src/processing/analysis.rs
//! Numeric helpers for comparing index layers across processing levels or
//! time periods: range masking, differences, summaries and histograms.

use std::ops::RangeInclusive;

use ndarray::{Array, Array2, Array3, ArrayBase, ArrayView3, Axis, Data, Dimension};
use serde::Serialize;

use crate::error::{Result, StackError};
use crate::stack::RasterStack;

/// Nominal range of a normalized-difference index
pub const INDEX_RANGE: RangeInclusive<f32> = -1.0..=1.0;

/// Copy of `layer` with non-finite samples and samples outside `range` set to NaN.
///
/// Zero-denominator samples come out of the index calculators as ±inf or
/// NaN, and cloud-contaminated inputs can produce finite values far
/// outside [-1, 1]; both are removed here.
pub fn mask_outside<S, D>(layer: &ArrayBase<S, D>, range: RangeInclusive<f32>) -> Array<f32, D>
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    layer.mapv(|v| if v.is_finite() && range.contains(&v) { v } else { f32::NAN })
}

/// `a - b` elementwise
pub fn difference(a: ArrayView3<'_, f32>, b: ArrayView3<'_, f32>) -> Result<Array3<f32>> {
    if a.dim() != b.dim() {
        return Err(StackError::ShapeMismatch {
            expected_name: "minuend".to_string(),
            expected: a.dim(),
            actual_name: "subtrahend".to_string(),
            actual: b.dim(),
        });
    }
    Ok(&a - &b)
}

/// Difference of the same layer between two stacks, e.g. the same scene
/// at two processing levels: `a[layer] - b[layer]`
pub fn stack_difference(a: &RasterStack, b: &RasterStack, layer: &str) -> Result<Array3<f32>> {
    difference(a.require(layer)?.view(), b.require(layer)?.view())
}

/// Change of a layer between two time slices: `layer[after] - layer[before]`
pub fn slice_difference(layer: &Array3<f32>, before: usize, after: usize) -> Result<Array2<f32>> {
    let len = layer.len_of(Axis(0));
    if let Some(&index) = [before, after].iter().find(|&&t| t >= len) {
        return Err(StackError::TimeIndexOutOfRange { index, len });
    }
    let before = layer.index_axis(Axis(0), before);
    let after = layer.index_axis(Axis(0), after);
    Ok(&after - &before)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LayerSummary {
    pub count: usize,
    /// Finite samples
    pub valid: usize,
    pub min: Option<f32>,
    pub max: Option<f32>,
    pub mean: Option<f64>,
}

impl LayerSummary {
    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a f32>) -> Self {
        let mut count = 0;
        let mut valid = 0;
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut sum = 0.0f64;

        for &v in values {
            count += 1;
            if !v.is_finite() {
                continue;
            }
            valid += 1;
            min = min.min(v);
            max = max.max(v);
            sum += v as f64;
        }

        if valid == 0 {
            return Self {
                count,
                valid,
                min: None,
                max: None,
                mean: None,
            };
        }
        Self {
            count,
            valid,
            min: Some(min),
            max: Some(max),
            mean: Some(sum / valid as f64),
        }
    }
}

/// Fixed-width histogram over a closed range
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    /// `bins + 1` bin edges
    pub edges: Vec<f32>,
    pub counts: Vec<usize>,
    pub lower_bound: Option<f32>,
    /// Non-finite samples and samples below `lower_bound`
    pub filtered: usize,
    /// Finite samples that passed the filter but fall outside the range
    pub outside: usize,
}

impl Histogram {
    /// Bin `values` into `bins` equal-width bins over `range`. With
    /// `lower_bound` set, samples below it are dropped before binning.
    pub fn build<'a>(
        values: impl IntoIterator<Item = &'a f32>,
        bins: usize,
        range: RangeInclusive<f32>,
        lower_bound: Option<f32>,
    ) -> Result<Self> {
        let (lo, hi) = (*range.start(), *range.end());
        if bins == 0 {
            return Err(StackError::InvalidParameter {
                name: "bins",
                value: bins.to_string(),
                reason: "at least one bin is required".to_string(),
            });
        }
        if !(lo.is_finite() && hi.is_finite() && lo < hi) {
            return Err(StackError::InvalidParameter {
                name: "range",
                value: format!("{}..={}", lo, hi),
                reason: "range must be finite and non-empty".to_string(),
            });
        }

        let width = (hi - lo) / bins as f32;
        let edges = (0..=bins).map(|i| lo + width * i as f32).collect();
        let mut counts = vec![0usize; bins];
        let mut filtered = 0;
        let mut outside = 0;

        for &v in values {
            if !v.is_finite() || lower_bound.is_some_and(|bound| v < bound) {
                filtered += 1;
                continue;
            }
            if !range.contains(&v) {
                outside += 1;
                continue;
            }
            let bin = (((v - lo) / width) as usize).min(bins - 1);
            counts[bin] += 1;
        }

        Ok(Self {
            edges,
            counts,
            lower_bound,
            filtered,
            outside,
        })
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}
