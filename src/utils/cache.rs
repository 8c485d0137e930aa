// src/utils/cache.rs
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gdal::Dataset;
use log::debug;
use parking_lot::Mutex;

use crate::error::Result;

/// Thread-safe cache of open GDAL datasets, keyed by path.
///
/// Multi-band scene files are referenced once per band in a manifest; the
/// cache opens each file once and serialises access to the handle.
#[derive(Default)]
pub struct RasterCache {
    datasets: Mutex<HashMap<PathBuf, Arc<Mutex<Dataset>>>>,
}

impl RasterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_dataset<P: AsRef<Path>>(&self, path: P) -> Result<Arc<Mutex<Dataset>>> {
        let path = path.as_ref();
        let mut cache = self.datasets.lock();

        if let Some(dataset) = cache.get(path) {
            return Ok(Arc::clone(dataset));
        }

        debug!("Opening {}", path.display());
        let dataset = Arc::new(Mutex::new(Dataset::open(path)?));
        cache.insert(path.to_path_buf(), Arc::clone(&dataset));

        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.datasets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.lock().is_empty()
    }
}
