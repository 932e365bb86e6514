//! Result emission for a short-read aligner.
//!
//! Candidate hits produced by seeding are re-scored against their template,
//! filtered, deduplicated and written as ordered binary record streams that
//! a later merge stage consumes.

pub mod core;
pub mod error;
pub mod pipelines;

pub use crate::core::alignment::aligner::{Aligner, AlignerError};
pub use crate::core::io::{
    AlignmentRecord, OrderingPolicy, PairedOrder, RecordOrder, RecordReader, RecordSink,
    RecordWriter, ReorderingBuffer, SingleEndOrder, StreamFlags, record_flags,
};
pub use error::{EmitError, Result};
pub use pipelines::emission::{
    Admission, BestScoreBlocker, Blocker, ClipRegion, EmitOpt, EmitStats, InMemorySequences,
    MatedHit, MaxMismatches, PairedEmitter, ReadFrequencyBlocker, Rejection, SequenceStore,
    SingleEndEmitter, UnfilteredEmitter,
};
