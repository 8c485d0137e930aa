// src/batch.rs
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::config::LoadRequest;
use crate::io::{GdalStackSource, StackSource, WriteOptions};
use crate::pipeline::{run_compare, run_ndi, run_standard};
use crate::processing::indices::{MndwiDenominator, StandardIndices};
use crate::processing::ParallelProcessor;

#[derive(Deserialize, Serialize, Debug)]
pub struct BatchConfig {
    #[serde(default)]
    pub global: WriteOptions,
    /// Scene manifest. This and every operation's `output` or `report`
    /// path are relative to the batch file.
    pub manifest: PathBuf,
    pub load: LoadRequest,
    pub operations: Vec<Operation>,
}

/// Per-operation output overrides of [`BatchConfig::global`]
#[derive(Deserialize, Serialize, Debug, Default, Clone)]
pub struct OutputOverrides {
    pub float: Option<bool>,
    pub scale_factor: Option<i32>,
    pub compress: Option<String>,
    pub compress_level: Option<u8>,
    pub tiled: Option<bool>,
}

impl OutputOverrides {
    pub fn apply(&self, global: &WriteOptions) -> WriteOptions {
        WriteOptions {
            float: self.float.unwrap_or(global.float),
            scale_factor: self.scale_factor.unwrap_or(global.scale_factor),
            compress: self.compress.clone().unwrap_or_else(|| global.compress.clone()),
            compress_level: self.compress_level.unwrap_or(global.compress_level),
            tiled: self.tiled.unwrap_or(global.tiled),
        }
    }
}

fn default_bins() -> usize {
    40
}

#[derive(Deserialize, Serialize, Debug)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Operation {
    Ndi {
        a: String,
        b: String,
        name: String,
        output: PathBuf,
        #[serde(default)]
        options: OutputOverrides,
    },
    Standard {
        #[serde(default)]
        mndwi_denominator: MndwiDenominator,
        output: PathBuf,
        #[serde(default)]
        options: OutputOverrides,
    },
    Compare {
        index: String,
        before: usize,
        after: usize,
        #[serde(default)]
        lower_bound: Option<f32>,
        #[serde(default = "default_bins")]
        bins: usize,
        #[serde(default)]
        mndwi_denominator: MndwiDenominator,
        report: PathBuf,
    },
}

impl Operation {
    fn label(&self) -> &'static str {
        match self {
            Operation::Ndi { .. } => "ndi",
            Operation::Standard { .. } => "standard",
            Operation::Compare { .. } => "compare",
        }
    }
}

impl BatchConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read batch file {}", path.display()))?;
        let mut config: BatchConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse batch file {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        resolve(base, &mut config.manifest);
        for op in &mut config.operations {
            match op {
                Operation::Ndi { output, .. } | Operation::Standard { output, .. } => {
                    resolve(base, output)
                }
                Operation::Compare { report, .. } => resolve(base, report),
            }
        }
        Ok(config)
    }
}

fn resolve(base: &Path, path: &mut PathBuf) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

pub fn process_batch(config_path: &Path, processor: &ParallelProcessor) -> Result<()> {
    let config = BatchConfig::from_file(config_path)?;

    let source = GdalStackSource::from_manifest_file(&config.manifest)?;
    let mut stack = source
        .load(&config.load)
        .with_context(|| format!("Failed to load stack from {}", config.manifest.display()))?;

    info!(
        "Starting batch processing with {} operations...",
        config.operations.len()
    );

    for (i, op) in config.operations.iter().enumerate() {
        info!("[{}/{}] Processing {}", i + 1, config.operations.len(), op.label());

        match op {
            Operation::Ndi {
                a,
                b,
                name,
                output,
                options,
            } => {
                let options = options.apply(&config.global);
                run_ndi(processor, &mut stack, a, b, name, output, &options)?;
            }
            Operation::Standard {
                mndwi_denominator,
                output,
                options,
            } => {
                let options = options.apply(&config.global);
                let indices = StandardIndices {
                    mndwi_denominator: *mndwi_denominator,
                };
                run_standard(processor, &mut stack, &indices, output, &options)?;
            }
            Operation::Compare {
                index,
                before,
                after,
                lower_bound,
                bins,
                mndwi_denominator,
                report,
            } => {
                let indices = StandardIndices {
                    mndwi_denominator: *mndwi_denominator,
                };
                let result = run_compare(
                    processor,
                    &mut stack,
                    index,
                    &indices,
                    (*before, *after),
                    *lower_bound,
                    *bins,
                )?;
                fs::write(report, serde_json::to_string_pretty(&result)?)
                    .with_context(|| format!("Failed to write report {}", report.display()))?;
            }
        }
    }

    info!("Batch processing complete!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_batch_file() {
        let json = r#"{
            "global": { "float": true },
            "manifest": "scene.json",
            "load": { "product": "ls8_usgs_sr_scene", "bands": ["green", "red", "nir", "swir1"] },
            "operations": [
                { "type": "ndi", "a": "nir", "b": "swir1", "name": "nbr", "output": "out",
                  "options": { "compress": "ZSTD" } },
                { "type": "standard", "mndwi_denominator": "nir-swir1", "output": "out" },
                { "type": "compare", "index": "ndvi", "before": 0, "after": 1,
                  "lower_bound": -0.5, "report": "ndvi_change.json" }
            ]
        }"#;
        let config: BatchConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.operations.len(), 3);

        match &config.operations[0] {
            Operation::Ndi { name, options, .. } => {
                assert_eq!(name, "nbr");
                let write = options.apply(&config.global);
                assert!(write.float);
                assert_eq!(write.compress, "ZSTD");
            }
            other => panic!("unexpected operation {:?}", other),
        }
        match &config.operations[1] {
            Operation::Standard { mndwi_denominator, .. } => {
                assert_eq!(*mndwi_denominator, MndwiDenominator::NirSwir1)
            }
            other => panic!("unexpected operation {:?}", other),
        }
        match &config.operations[2] {
            Operation::Compare { bins, lower_bound, .. } => {
                assert_eq!(*bins, 40);
                assert_eq!(*lower_bound, Some(-0.5));
            }
            other => panic!("unexpected operation {:?}", other),
        }
    }

    #[test]
    fn paths_are_relative_to_batch_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.json");
        fs::write(
            &path,
            r#"{
                "manifest": "scene.json",
                "load": {"product": "ls8", "bands": ["nir", "red"]},
                "operations": [
                    {"type": "ndi", "a": "nir", "b": "red", "name": "ndvi", "output": "out"},
                    {"type": "standard", "output": "/srv/indices"},
                    {"type": "compare", "index": "ndvi", "before": 0, "after": 1, "report": "change.json"}
                ]
            }"#,
        )
        .unwrap();

        let config = BatchConfig::from_file(&path).unwrap();
        assert_eq!(config.manifest, dir.path().join("scene.json"));
        assert_eq!(config.global, WriteOptions::default());

        match &config.operations[0] {
            Operation::Ndi { output, .. } => assert_eq!(output, &dir.path().join("out")),
            other => panic!("unexpected operation {:?}", other),
        }
        match &config.operations[1] {
            Operation::Standard { output, .. } => assert_eq!(output, Path::new("/srv/indices")),
            other => panic!("unexpected operation {:?}", other),
        }
        match &config.operations[2] {
            Operation::Compare { report, .. } => {
                assert_eq!(report, &dir.path().join("change.json"))
            }
            other => panic!("unexpected operation {:?}", other),
        }
    }
}
