// src/processing/indices/ndi.rs
use ndarray::{Array2, ArrayView2, Zip};

use crate::processing::parallel::IndexCalculator;
use crate::stack::bands;

/// Normalized Difference Index (NDI) calculator: `(A - B) / (A + B)`
///
/// A zero sum is left to IEEE-754: `x / 0` gives a signed infinity and
/// `0 / 0` gives NaN. Callers mask those samples before plotting or
/// computing statistics.
#[derive(Debug, Clone)]
pub struct NDI {
    band_a: String,
    band_b: String,
    name: String,
}

impl NDI {
    pub fn new(band_a: &str, band_b: &str, name: Option<String>) -> Self {
        Self {
            band_a: band_a.to_string(),
            band_b: band_b.to_string(),
            name: name.unwrap_or_else(|| "ndi".to_string()),
        }
    }

    /// NDVI: (NIR - RED) / (NIR + RED)
    pub fn ndvi() -> Self {
        Self::new(bands::NIR, bands::RED, Some("ndvi".to_string()))
    }

    /// NDWI (McFeeters): (GREEN - NIR) / (GREEN + NIR)
    pub fn ndwi() -> Self {
        Self::new(bands::GREEN, bands::NIR, Some("ndwi".to_string()))
    }
}

impl IndexCalculator for NDI {
    fn calculate(&self, inputs: &[ArrayView2<'_, f32>]) -> Array2<f32> {
        debug_assert_eq!(inputs.len(), 2, "NDI takes exactly two bands");
        let band_a = &inputs[0];
        let band_b = &inputs[1];

        Zip::from(band_a)
            .and(band_b)
            .par_map_collect(|&a, &b| (a - b) / (a + b))
    }

    fn required_bands(&self) -> Vec<&str> {
        vec![self.band_a.as_str(), self.band_b.as_str()]
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn zero_sum_propagates_ieee_values() {
        let a = array![[0.0f32, 0.2, -0.2]];
        let b = array![[0.0f32, -0.2, 0.2]];
        let out = NDI::new("a", "b", None).calculate(&[a.view(), b.view()]);

        assert!(out[[0, 0]].is_nan());
        assert_eq!(out[[0, 1]], f32::INFINITY);
        assert_eq!(out[[0, 2]], f32::NEG_INFINITY);
    }

    #[test]
    fn band_order_follows_constructor() {
        assert_eq!(NDI::ndvi().required_bands(), vec!["nir", "red"]);
        assert_eq!(NDI::ndwi().required_bands(), vec!["green", "nir"]);
        assert_eq!(NDI::new("x", "y", None).name(), "ndi");
    }
}
