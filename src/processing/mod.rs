// src/processing/mod.rs
pub mod analysis;
pub mod indices;
pub mod parallel;

// Re-export main components
pub use indices::{compute_index, compute_standard_indices, StandardIndices};
pub use parallel::{IndexCalculator, ParallelProcessor};
