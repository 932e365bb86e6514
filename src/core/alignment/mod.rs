//! Alignment results as seen by the emission stage.
//!
//! The edit-distance aligner is an external collaborator behind the
//! [`Aligner`](aligner::Aligner) trait; these modules hold what flows out of
//! it (action strings), what is derived from it (mismatch counts, MD
//! strings) and the buffers reused between calls.

pub mod actions;
pub mod aligner;
pub mod edit_distance;
pub mod workspace; // Per-side alignment caches
