//! Base encoding helpers.

pub mod encoding;
