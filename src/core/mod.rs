//! Core reusable components of the emission stage.
//!
//! These are agnostic to the operating mode of the pipeline: record
//! streams, alignment action strings and base encoding.

pub mod alignment;
pub mod compute;
pub mod io;
pub mod utils;
