// src/error.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StackError {
    #[error("Missing band '{0}' in raster stack")]
    MissingBand(String),

    #[error("Shape mismatch: '{expected_name}' is {expected:?}, '{actual_name}' is {actual:?}")]
    ShapeMismatch {
        expected_name: String,
        expected: (usize, usize, usize),
        actual_name: String,
        actual: (usize, usize, usize),
    },

    #[error("Layer name '{0}' is already used by an input band")]
    LayerNameConflict(String),

    #[error("Invalid time axis: {0}")]
    InvalidTimeAxis(String),

    #[error("Time index {index} out of range (stack has {len} slices)")]
    TimeIndexOutOfRange { index: usize, len: usize },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

pub type Result<T> = std::result::Result<T, StackError>;
