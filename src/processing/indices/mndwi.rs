// src/processing/indices/mndwi.rs
use ndarray::{Array2, ArrayView2, Zip};
use serde::{Deserialize, Serialize};

use crate::processing::parallel::IndexCalculator;
use crate::stack::bands;

/// Denominator used by MNDWI. The numerator is always `GREEN - SWIR1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MndwiDenominator {
    /// `GREEN + SWIR1` (Xu, 2006)
    #[default]
    GreenSwir1,
    /// `NIR + SWIR1`, matches MNDWI layers produced by earlier water-mapping runs
    NirSwir1,
}

/// Modified Normalized Difference Water Index (MNDWI) calculator
#[derive(Debug, Clone)]
pub struct MNDWI {
    denominator: MndwiDenominator,
    name: String,
}

impl MNDWI {
    pub fn new(denominator: MndwiDenominator, name: Option<String>) -> Self {
        Self {
            denominator,
            name: name.unwrap_or_else(|| "mndwi".to_string()),
        }
    }
}

impl IndexCalculator for MNDWI {
    fn calculate(&self, inputs: &[ArrayView2<'_, f32>]) -> Array2<f32> {
        let green = &inputs[0];
        let swir1 = &inputs[1];

        match self.denominator {
            MndwiDenominator::GreenSwir1 => Zip::from(green)
                .and(swir1)
                .par_map_collect(|&g, &s| (g - s) / (g + s)),
            MndwiDenominator::NirSwir1 => {
                let nir = &inputs[2];
                Zip::from(green)
                    .and(swir1)
                    .and(nir)
                    .par_map_collect(|&g, &s, &n| (g - s) / (n + s))
            }
        }
    }

    fn required_bands(&self) -> Vec<&str> {
        match self.denominator {
            MndwiDenominator::GreenSwir1 => vec![bands::GREEN, bands::SWIR1],
            MndwiDenominator::NirSwir1 => vec![bands::GREEN, bands::SWIR1, bands::NIR],
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn canonical_denominator_ignores_nir() {
        let green = array![[0.3f32]];
        let swir1 = array![[0.1f32]];
        let mndwi = MNDWI::new(MndwiDenominator::GreenSwir1, None);

        let out = mndwi.calculate(&[green.view(), swir1.view()]);
        assert_abs_diff_eq!(out[[0, 0]], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn nir_swir1_denominator_uses_nir() {
        let green = array![[0.3f32]];
        let swir1 = array![[0.1f32]];
        let nir = array![[0.3f32]];
        let mndwi = MNDWI::new(MndwiDenominator::NirSwir1, None);

        let out = mndwi.calculate(&[green.view(), swir1.view(), nir.view()]);
        // (0.3 - 0.1) / (0.3 + 0.1)
        assert_abs_diff_eq!(out[[0, 0]], 0.5, epsilon = 1e-6);

        let nir = array![[0.7f32]];
        let out = mndwi.calculate(&[green.view(), swir1.view(), nir.view()]);
        // (0.3 - 0.1) / (0.7 + 0.1)
        assert_abs_diff_eq!(out[[0, 0]], 0.25, epsilon = 1e-6);
    }

    #[test]
    fn serde_names_are_kebab_case() {
        let parsed: MndwiDenominator = serde_json::from_str("\"nir-swir1\"").unwrap();
        assert_eq!(parsed, MndwiDenominator::NirSwir1);
        assert_eq!(MndwiDenominator::default(), MndwiDenominator::GreenSwir1);
    }
}
