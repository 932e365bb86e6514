//! Alignment admission pipeline.
//!
//! One emitter per worker. Each walks its templates in increasing id order,
//! scores the candidate hits it is given, filters them against mismatch
//! ceilings, the worker's clip region and the shared per-read blockers, and
//! hands admitted records to its reordering buffers.
//!
//! - [`SingleEndEmitter`]: one stream, best-score blocking per read
//! - [`PairedEmitter`]: mated and unmated streams, combined-score blocking
//! - [`UnfilteredEmitter`]: mated and unmated streams, per-read output caps

pub mod blocker;
pub mod clip_region;
pub mod emit_opt;
pub mod paired;
pub mod scoring;
pub mod sequences;
pub mod single_end;
pub mod stats;
pub mod template;
pub mod top_hits;
pub mod unfiltered;

#[doc(hidden)]
pub mod test_support;

pub use blocker::{BestScoreBlocker, Blocker, ReadFrequencyBlocker};
pub use clip_region::ClipRegion;
pub use emit_opt::{EmitOpt, MaxMismatches};
pub use paired::{MatedHit, PairedEmitter};
pub use sequences::{InMemorySequences, SequenceStore};
pub use single_end::SingleEndEmitter;
pub use stats::{Admission, EmitStats, Rejection};
pub use template::END_OF_TEMPLATES;
pub use top_hits::{TopHit, TopHitsTracker};
pub use unfiltered::UnfilteredEmitter;
