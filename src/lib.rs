// src/lib.rs
pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod processing;
pub mod stack;
pub mod utils;

pub use error::{Result, StackError};
pub use processing::{compute_index, compute_standard_indices, StandardIndices};
pub use stack::{GeoInfo, LayerKind, RasterStack};

// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
