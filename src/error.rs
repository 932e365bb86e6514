//! Error types for the emission stage.

use thiserror::Error;

use crate::core::alignment::aligner::AlignerError;

/// Result type alias for emission operations
pub type Result<T> = std::result::Result<T, EmitError>;

/// Errors raised while scoring, ordering or serializing alignment records.
///
/// Threshold, blocker and clip-region exclusions are not errors; they are
/// reported as [`Rejection`](crate::pipelines::emission::Rejection) values.
#[derive(Debug, Error)]
pub enum EmitError {
    /// I/O error on the underlying channel
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An operation was invoked out of protocol order
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Malformed binary input
    #[error("Malformed record stream: {0}")]
    Format(String),

    /// The channel closed before the end-of-stream record
    #[error("Record stream closed after {records} records without an end-of-stream marker")]
    Truncated {
        /// Records decoded before the channel closed
        records: u64,
    },

    /// A record arrived too far out of order for the buffer
    #[error("Record {record} arrived after {last_written} was written (buffer distance {distance})")]
    OrderingViolation {
        /// The offending record
        record: String,
        /// The most recently written record
        last_written: String,
        /// Configured buffer distance
        distance: i32,
    },

    /// The combined score of a mate pair does not fit in an `i32`
    #[error("Combined score overflow for read {read_id}: {left} + {right}")]
    ArithmeticOverflow {
        /// Read id of the pair
        read_id: u32,
        /// Score of the left mate
        left: i32,
        /// Score of the right mate
        right: i32,
    },

    /// The aligner failed to score a candidate
    #[error("Aligner failed for read {read_id}: {source}")]
    Aligner {
        /// Read id of the candidate
        read_id: u32,
        /// Error reported by the aligner
        #[source]
        source: AlignerError,
    },

    /// A read or template could not be retrieved
    #[error("{kind} {id} not found")]
    SequenceNotFound {
        /// "Read" or "Template"
        kind: &'static str,
        /// The requested id
        id: usize,
    },
}
