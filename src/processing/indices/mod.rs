// src/processing/indices/mod.rs
pub mod mndwi;
pub mod ndi;

use ndarray::Array3;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::processing::parallel::{IndexCalculator, ParallelProcessor};
use crate::stack::RasterStack;

// Re-export indices
pub use mndwi::{MndwiDenominator, MNDWI};
pub use ndi::NDI;

/// Layer names attached by [`compute_standard_indices`]
pub const STANDARD_LAYERS: [&str; 3] = ["ndvi", "ndwi", "mndwi"];

/// Options for the NDVI / NDWI / MNDWI set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardIndices {
    #[serde(default)]
    pub mndwi_denominator: MndwiDenominator,
}

/// Calculator for one of [`STANDARD_LAYERS`], `None` for any other name
pub fn standard_calculator(
    name: &str,
    config: &StandardIndices,
) -> Option<Box<dyn IndexCalculator>> {
    match name {
        "ndvi" => Some(Box::new(NDI::ndvi())),
        "ndwi" => Some(Box::new(NDI::ndwi())),
        "mndwi" => Some(Box::new(MNDWI::new(config.mndwi_denominator, None))),
        _ => None,
    }
}

/// [`ParallelProcessor::compute_index`] on the global rayon pool
pub fn compute_index<'s>(
    stack: &'s mut RasterStack,
    index_name: &str,
    band_a: &str,
    band_b: &str,
) -> Result<&'s Array3<f32>> {
    ParallelProcessor::default().compute_index(stack, index_name, band_a, band_b)
}

/// [`ParallelProcessor::compute_standard_indices`] on the global rayon pool
pub fn compute_standard_indices(stack: &mut RasterStack, config: &StandardIndices) -> Result<()> {
    ParallelProcessor::default().compute_standard_indices(stack, config)
}
