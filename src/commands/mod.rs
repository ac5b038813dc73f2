//! Command implementations

pub mod download;
pub mod preprocess;
pub mod resample;
