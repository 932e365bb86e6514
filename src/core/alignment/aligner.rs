//! The edit-distance aligner consumed by the emission stage.
//!
//! The aligner itself lives outside this crate; the emitters only need the
//! narrow interface below. Implementations must be deterministic for a
//! given input so that repeated requests can be served from the per-side
//! caches.

use thiserror::Error;

use super::actions::Actions;

/// Failure reported by an aligner implementation.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct AlignerError {
    message: String,
}

impl AlignerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Edit-distance aligner.
///
/// `read` is the read as stored (2-bit codes, forward orientation); the
/// aligner handles the reverse complement itself when `reverse` is set.
/// `start` is the proposed 0-based start in `template`, which is the
/// (possibly clipped) template slice held by the caller. The aligner may
/// shift the start by up to `max_shift` positions.
///
/// On return `out` holds the actions, the score and the final start. When
/// the best alignment would score above `max_score` the aligner may stop
/// early and report any score greater than `max_score`, typically
/// [`UNALIGNED_SCORE`](super::actions::UNALIGNED_SCORE).
///
/// `first_arm` is true for the first read of a pair (and for single-end
/// reads), for aligners that use arm-specific scoring.
pub trait Aligner {
    #[allow(clippy::too_many_arguments)]
    fn align(
        &mut self,
        read: &[u8],
        template: &[u8],
        start: i32,
        reverse: bool,
        max_score: i32,
        max_shift: i32,
        first_arm: bool,
        out: &mut Actions,
    ) -> Result<(), AlignerError>;
}

impl<A: Aligner + ?Sized> Aligner for Box<A> {
    fn align(
        &mut self,
        read: &[u8],
        template: &[u8],
        start: i32,
        reverse: bool,
        max_score: i32,
        max_shift: i32,
        first_arm: bool,
        out: &mut Actions,
    ) -> Result<(), AlignerError> {
        (**self).align(read, template, start, reverse, max_score, max_shift, first_arm, out)
    }
}
