//! Bounded-lookahead reordering of near-sorted record streams.
//!
//! Upstream stages produce hits in approximately position order: an aligner
//! may move a hit by a few bases, and hits of one read length arrive
//! interleaved. [`ReorderingBuffer`] holds records until no earlier record
//! can still arrive, then writes them to its sink in strict order with
//! exact duplicates removed.
//!
//! A record is flushed once it lies on an earlier reference than the newest
//! record added, or more than `distance` positions behind it on the same
//! reference. Callers size the distance as `2 * max_read_length + max_shift`.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::io::Write;
use std::marker::PhantomData;

use super::record::AlignmentRecord;
use super::record_codec::RecordWriter;
use crate::error::{EmitError, Result};

/// A total order over records of one stream.
///
/// Records comparing `Equal` are duplicates.
pub trait RecordOrder {
    fn compare(a: &AlignmentRecord, b: &AlignmentRecord) -> Ordering;
}

/// Reference, position, read id, strand, arm, score.
///
/// Single-end records carry no arm bits. Unmated mates of a pair do, and
/// the first arm sorts before the second.
#[derive(Clone, Copy, Debug, Default)]
pub struct SingleEndOrder;

impl RecordOrder for SingleEndOrder {
    fn compare(a: &AlignmentRecord, b: &AlignmentRecord) -> Ordering {
        a.reference_id
            .cmp(&b.reference_id)
            .then(a.start_position.cmp(&b.start_position))
            .then(a.read_id.cmp(&b.read_id))
            .then(a.is_reverse().cmp(&b.is_reverse()))
            .then(a.is_second_in_pair().cmp(&b.is_second_in_pair()))
            .then(a.score.cmp(&b.score))
    }
}

/// Reference, position, read id, mate position, strand, pairing status,
/// mate strand, first/second of pair, combined score.
#[derive(Clone, Copy, Debug, Default)]
pub struct PairedOrder;

impl RecordOrder for PairedOrder {
    fn compare(a: &AlignmentRecord, b: &AlignmentRecord) -> Ordering {
        a.reference_id
            .cmp(&b.reference_id)
            .then(a.start_position.cmp(&b.start_position))
            .then(a.read_id.cmp(&b.read_id))
            .then(a.mate_position.cmp(&b.mate_position))
            .then(a.is_reverse().cmp(&b.is_reverse()))
            // Mated before unmated
            .then(b.is_proper_pair().cmp(&a.is_proper_pair()))
            .then(a.is_mate_reverse().cmp(&b.is_mate_reverse()))
            // First read of the pair before the second
            .then(a.is_second_in_pair().cmp(&b.is_second_in_pair()))
            .then(a.combo_score.cmp(&b.combo_score))
    }
}

/// Destination of flushed records.
pub trait RecordSink {
    fn write_record(&mut self, record: &AlignmentRecord) -> Result<()>;

    /// Terminate the stream. Called once, after the last record.
    fn finish(&mut self) -> Result<()>;
}

impl<W: Write> RecordSink for RecordWriter<W> {
    fn write_record(&mut self, record: &AlignmentRecord) -> Result<()> {
        self.write(record)
    }

    fn finish(&mut self) -> Result<()> {
        RecordWriter::finish(self)
    }
}

/// In-memory collection of flushed records
impl RecordSink for Vec<AlignmentRecord> {
    fn write_record(&mut self, record: &AlignmentRecord) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// What to do with a record that sorts before the last written record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderingPolicy {
    /// Fail with [`EmitError::OrderingViolation`]
    Strict,
    /// Drop the record and log a warning
    Lenient,
}

impl Default for OrderingPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            OrderingPolicy::Strict
        } else {
            OrderingPolicy::Lenient
        }
    }
}

/// Set entry ordered by `O`.
struct Ordered<O> {
    record: AlignmentRecord,
    _order: PhantomData<fn() -> O>,
}

impl<O: RecordOrder> Ordered<O> {
    fn new(record: AlignmentRecord) -> Self {
        Self {
            record,
            _order: PhantomData,
        }
    }
}

impl<O: RecordOrder> PartialEq for Ordered<O> {
    fn eq(&self, other: &Self) -> bool {
        O::compare(&self.record, &other.record) == Ordering::Equal
    }
}

impl<O: RecordOrder> Eq for Ordered<O> {}

impl<O: RecordOrder> PartialOrd for Ordered<O> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<O: RecordOrder> Ord for Ordered<O> {
    fn cmp(&self, other: &Self) -> Ordering {
        O::compare(&self.record, &other.record)
    }
}

/// Turns a near-sorted record stream into a sorted, duplicate-free one.
pub struct ReorderingBuffer<S: RecordSink, O: RecordOrder> {
    sink: Option<S>,
    pending: BTreeSet<Ordered<O>>,
    last_written: Option<AlignmentRecord>,
    distance: i32,
    policy: OrderingPolicy,
    added: u64,
    duplicates: u64,
    dropped: u64,
    written: u64,
    closed: bool,
}

impl<S: RecordSink, O: RecordOrder> ReorderingBuffer<S, O> {
    pub fn new(sink: S, distance: i32, policy: OrderingPolicy) -> Self {
        Self {
            sink: Some(sink),
            pending: BTreeSet::new(),
            last_written: None,
            distance,
            policy,
            added: 0,
            duplicates: 0,
            dropped: 0,
            written: 0,
            closed: false,
        }
    }

    pub fn distance(&self) -> i32 {
        self.distance
    }

    pub fn policy(&self) -> OrderingPolicy {
        self.policy
    }

    /// Records accepted by [`add`](Self::add)
    pub fn added(&self) -> u64 {
        self.added
    }

    /// Records discarded as duplicates
    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    /// Records dropped under [`OrderingPolicy::Lenient`]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Records written to the sink
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Records currently held
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn last_written(&self) -> Option<&AlignmentRecord> {
        self.last_written.as_ref()
    }

    /// Add a record. Returns false if it was discarded as a duplicate or
    /// dropped as out of order.
    pub fn add(&mut self, record: AlignmentRecord) -> Result<bool> {
        if self.closed {
            return Err(EmitError::Protocol(format!("add of {record} after close")));
        }
        if record.is_sentinel() {
            return Err(EmitError::Protocol(
                "the end-of-stream record is written by close()".to_string(),
            ));
        }

        if let Some(last) = &self.last_written {
            match O::compare(&record, last) {
                Ordering::Equal => {
                    self.duplicates += 1;
                    return Ok(false);
                }
                Ordering::Less => match self.policy {
                    OrderingPolicy::Strict => {
                        return Err(EmitError::OrderingViolation {
                            record: record.to_string(),
                            last_written: last.to_string(),
                            distance: self.distance,
                        });
                    }
                    OrderingPolicy::Lenient => {
                        log::warn!(
                            "Dropping out-of-order record {} (last written {}, buffer distance {})",
                            record,
                            last,
                            self.distance
                        );
                        self.dropped += 1;
                        return Ok(false);
                    }
                },
                Ordering::Greater => {}
            }
        }

        let reference_id = record.reference_id;
        let horizon = record.start_position as i64 - self.distance as i64;
        if !self.pending.insert(Ordered::new(record)) {
            self.duplicates += 1;
            return Ok(false);
        }
        self.added += 1;

        while let Some(first) = self.pending.first() {
            let first = &first.record;
            let expired = first.reference_id < reference_id
                || (first.reference_id == reference_id
                    && (first.start_position as i64) < horizon);
            if !expired {
                break;
            }
            self.write_first()?;
        }
        Ok(true)
    }

    fn write_first(&mut self) -> Result<()> {
        let Some(entry) = self.pending.pop_first() else {
            return Ok(());
        };
        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| EmitError::Protocol("record sink already released".to_string()))?;
        sink.write_record(&entry.record)?;
        self.written += 1;
        self.last_written = Some(entry.record);
        Ok(())
    }

    /// Write every buffered record without closing the stream.
    pub fn flush_all(&mut self) -> Result<()> {
        let count = self.pending.len();
        while !self.pending.is_empty() {
            self.write_first()?;
        }
        if count > 0 {
            log::debug!("Flushed {} buffered records", count);
        }
        Ok(())
    }

    /// Flush, terminate the sink and release it. Calling it again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.flush_all()?;
        if let Some(sink) = self.sink.as_mut() {
            sink.finish()?;
        }
        Ok(())
    }

    /// Close and hand back the sink.
    pub fn into_sink(mut self) -> Result<S> {
        self.close()?;
        self.sink
            .take()
            .ok_or_else(|| EmitError::Protocol("record sink already released".to_string()))
    }
}

impl<S: RecordSink, O: RecordOrder> Drop for ReorderingBuffer<S, O> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        log::warn!(
            "Reordering buffer dropped without close(); flushing {} pending records",
            self.pending.len()
        );
        if let Err(e) = self.close() {
            log::error!("Failed to close reordering buffer: {}", e);
        }
    }
}
