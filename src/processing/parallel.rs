// src/processing/parallel.rs
use std::sync::Arc;

use log::debug;
use ndarray::{Array2, Array3, ArrayView2, Axis};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{Result, StackError};
use crate::processing::indices::{standard_calculator, StandardIndices, NDI, STANDARD_LAYERS};
use crate::stack::{LayerKind, RasterStack};

/// Trait for spectral index calculators
pub trait IndexCalculator: Send + Sync {
    /// Calculate the index for one time slice. `inputs` follow the order
    /// of [`IndexCalculator::required_bands`] and all share one shape.
    fn calculate(&self, inputs: &[ArrayView2<'_, f32>]) -> Array2<f32>;

    /// Names of the stack layers this index reads
    fn required_bands(&self) -> Vec<&str>;

    /// Name of the derived layer
    fn name(&self) -> &str;
}

/// Evaluates index calculators over a stack, one rayon task per time slice.
///
/// Slices never depend on each other, so the output is identical whatever
/// the thread count.
#[derive(Clone, Default)]
pub struct ParallelProcessor {
    // `None` runs on the global rayon pool
    pool: Option<Arc<ThreadPool>>,
}

impl ParallelProcessor {
    pub fn new(threads: Option<usize>) -> Result<Self> {
        let threads = threads.unwrap_or_else(num_cpus::get).max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| StackError::InvalidParameter {
                name: "threads",
                value: threads.to_string(),
                reason: e.to_string(),
            })?;

        debug!("Created processing pool with {} threads", threads);
        Ok(Self {
            pool: Some(Arc::new(pool)),
        })
    }

    pub fn threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    /// Run `calculator` over every time slice of `stack` without attaching
    /// the result.
    pub fn process<I: IndexCalculator + ?Sized>(
        &self,
        calculator: &I,
        stack: &RasterStack,
    ) -> Result<Array3<f32>> {
        let names = calculator.required_bands();
        let inputs = collect_inputs(stack, &names)?;
        let time_len = inputs[0].len_of(Axis(0));

        debug!(
            "Computing {} from [{}] over {} time slice(s)",
            calculator.name(),
            names.join(", "),
            time_len
        );

        let compute = || -> Vec<Array2<f32>> {
            (0..time_len)
                .into_par_iter()
                .map(|t| {
                    let views: Vec<ArrayView2<'_, f32>> = inputs
                        .iter()
                        .map(|band| band.index_axis(Axis(0), t))
                        .collect();
                    calculator.calculate(&views)
                })
                .collect()
        };

        let slices = match &self.pool {
            Some(pool) => pool.install(compute),
            None => compute(),
        };

        let views: Vec<ArrayView2<'_, f32>> = slices.iter().map(|slice| slice.view()).collect();
        Ok(ndarray::stack(Axis(0), &views)?)
    }

    /// Compute `(band_a - band_b) / (band_a + band_b)` and attach it to the
    /// stack as `index_name`, replacing an earlier derived layer of that name.
    pub fn compute_index<'s>(
        &self,
        stack: &'s mut RasterStack,
        index_name: &str,
        band_a: &str,
        band_b: &str,
    ) -> Result<&'s Array3<f32>> {
        let ndi = NDI::new(band_a, band_b, Some(index_name.to_string()));
        self.compute_layer(&ndi, stack)
    }

    /// Run `calculator` and attach the result under its name, replacing an
    /// earlier derived layer of that name.
    pub fn compute_layer<'s, I: IndexCalculator + ?Sized>(
        &self,
        calculator: &I,
        stack: &'s mut RasterStack,
    ) -> Result<&'s Array3<f32>> {
        let name = calculator.name();
        ensure_not_band(stack, name)?;
        let layer = self.process(calculator, stack)?;

        stack.attach_derived(name, layer)?;
        stack.require(name)
    }

    /// Attach `ndvi`, `ndwi` and `mndwi`. Nothing is attached unless all
    /// three can be computed.
    pub fn compute_standard_indices(
        &self,
        stack: &mut RasterStack,
        config: &StandardIndices,
    ) -> Result<()> {
        let calculators = STANDARD_LAYERS
            .iter()
            .filter_map(|name| standard_calculator(name, config))
            .collect::<Vec<_>>();

        for calculator in &calculators {
            collect_inputs(stack, &calculator.required_bands())?;
            ensure_not_band(stack, calculator.name())?;
        }

        let layers = calculators
            .iter()
            .map(|calculator| {
                self.process(calculator.as_ref(), stack)
                    .map(|layer| (calculator.name().to_string(), layer))
            })
            .collect::<Result<Vec<_>>>()?;

        for (name, layer) in layers {
            stack.attach_derived(name, layer)?;
        }
        Ok(())
    }
}

/// Resolve every named layer, checking presence before shape.
fn collect_inputs<'s>(stack: &'s RasterStack, names: &[&str]) -> Result<Vec<&'s Array3<f32>>> {
    let inputs = names
        .iter()
        .map(|name| stack.require(name))
        .collect::<Result<Vec<_>>>()?;

    let Some(first) = inputs.first() else {
        return Err(StackError::InvalidParameter {
            name: "required_bands",
            value: "[]".to_string(),
            reason: "an index needs at least one input band".to_string(),
        });
    };

    for (name, band) in names.iter().zip(&inputs).skip(1) {
        if band.dim() != first.dim() {
            return Err(StackError::ShapeMismatch {
                expected_name: names[0].to_string(),
                expected: first.dim(),
                actual_name: name.to_string(),
                actual: band.dim(),
            });
        }
    }
    Ok(inputs)
}

fn ensure_not_band(stack: &RasterStack, name: &str) -> Result<()> {
    if stack.kind(name) == Some(LayerKind::Band) {
        return Err(StackError::LayerNameConflict(name.to_string()));
    }
    Ok(())
}
