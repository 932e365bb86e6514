//! Intermediate result streams: records, their binary codec and the
//! reordering buffer that keeps each stream in position order.

pub mod record;
pub mod record_codec;
pub mod reorder;

pub use record::{AlignmentRecord, StreamFlags, record_flags};
pub use record_codec::{RecordReader, RecordWriter, encode_record};
pub use reorder::{
    OrderingPolicy, PairedOrder, RecordOrder, RecordSink, ReorderingBuffer, SingleEndOrder,
};
