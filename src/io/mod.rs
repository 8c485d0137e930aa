// src/io/mod.rs
pub mod reader;
pub mod writer;

pub use reader::{GdalStackSource, StackSource};
pub use writer::{write_layer, write_layer_series, WriteOptions};
