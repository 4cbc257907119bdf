//! Near-infrared light-curve peak analysis for Type Ia supernovae.
//!
//! Raw photometry is resampled onto a common phase grid, brightness peaks
//! are extracted and labelled as first or second maximum, and the results
//! are gathered into a population table that can be summarised, exported
//! and compared against optical light-curve parameters.

pub mod analysis;
pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod optical;
pub mod style;
