//! Processing stages built on the core components.
//!
//! - `emission`: scoring, filtering and ordered output of candidate hits

pub mod emission;
