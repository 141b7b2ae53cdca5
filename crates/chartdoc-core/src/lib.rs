//! Core document types for chart configurations.
//!
//! This crate only describes the shape of a saved chart and the operation
//! catalog it refers to. Every transformation lives in `chartdoc-update`; the
//! command-line front end lives in `chartdoc-cli`.

pub mod chart;
pub mod error;
pub mod operation;
pub mod source;
pub mod threshold;
pub mod workflow;

pub use chart::Chart;
pub use error::{Error, Result};
