// src/pipeline.rs
//! Load → compute → write steps shared by the command line and batch runner.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::info;
use serde::Serialize;

use crate::io::{write_layer_series, WriteOptions};
use crate::processing::analysis::{
    mask_outside, slice_difference, Histogram, LayerSummary, INDEX_RANGE,
};
use crate::processing::indices::{standard_calculator, StandardIndices, STANDARD_LAYERS};
use crate::processing::ParallelProcessor;
use crate::stack::RasterStack;

/// Differences of two [-1, 1] layers span [-2, 2]
const DIFFERENCE_RANGE: std::ops::RangeInclusive<f32> = -2.0..=2.0;

pub fn run_ndi(
    processor: &ParallelProcessor,
    stack: &mut RasterStack,
    band_a: &str,
    band_b: &str,
    name: &str,
    output: &Path,
    options: &WriteOptions,
) -> Result<Vec<PathBuf>> {
    processor
        .compute_index(stack, name, band_a, band_b)
        .with_context(|| format!("Failed to compute {} from {} and {}", name, band_a, band_b))?;

    write_derived(stack, name, output, options)
}

pub fn run_standard(
    processor: &ParallelProcessor,
    stack: &mut RasterStack,
    config: &StandardIndices,
    output: &Path,
    options: &WriteOptions,
) -> Result<Vec<PathBuf>> {
    processor
        .compute_standard_indices(stack, config)
        .context("Failed to compute standard indices")?;

    let mut written = Vec::new();
    for name in STANDARD_LAYERS {
        written.extend(write_derived(stack, name, output, options)?);
    }
    Ok(written)
}

fn write_derived(
    stack: &RasterStack,
    name: &str,
    output: &Path,
    options: &WriteOptions,
) -> Result<Vec<PathBuf>> {
    let layer = stack.require(name)?;
    write_layer_series(output, name, layer, stack.times(), stack.geo(), options)
        .with_context(|| format!("Failed to write {} to {}", name, output.display()))
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub index: String,
    pub before: Option<NaiveDate>,
    pub after: Option<NaiveDate>,
    pub summary: LayerSummary,
    pub histogram: Histogram,
}

/// Compare an index between two time slices.
///
/// Standard indices are computed with `config`, replacing any earlier layer
/// of the same name; other names must already be attached. Both slices are masked to [-1, 1] before differencing; the histogram
/// additionally drops differences below `lower_bound`.
pub fn run_compare(
    processor: &ParallelProcessor,
    stack: &mut RasterStack,
    index: &str,
    config: &StandardIndices,
    (before, after): (usize, usize),
    lower_bound: Option<f32>,
    bins: usize,
) -> Result<ComparisonReport> {
    // Standard layers are recomputed so an earlier run with another MNDWI
    // denominator is never reported; other layers must already exist.
    if let Some(calculator) = standard_calculator(index, config) {
        processor
            .compute_layer(calculator.as_ref(), stack)
            .with_context(|| format!("Failed to compute {}", index))?;
    }

    let masked = mask_outside(stack.require(index)?, INDEX_RANGE);
    let diff = slice_difference(&masked, before, after)
        .with_context(|| format!("Failed to difference {} slices {} and {}", index, before, after))?;

    let summary = LayerSummary::from_values(diff.iter());
    let histogram = Histogram::build(diff.iter(), bins, DIFFERENCE_RANGE, lower_bound)?;
    info!(
        "{}: {} of {} samples valid, {} filtered from histogram",
        index, summary.valid, summary.count, histogram.filtered
    );

    let date = |t: usize| stack.times().and_then(|times| times.get(t).copied());
    Ok(ComparisonReport {
        index: index.to_string(),
        before: date(before),
        after: date(after),
        summary,
        histogram,
    })
}
