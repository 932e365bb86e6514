//! Binary codec for alignment record streams.
//!
//! Layout of one record (all integers little-endian):
//!
//! ```text
//! reference_id:i32                      -1 marks end of stream, nothing follows
//! start_position:i32 read_id:i32 flags:u8
//! cigar_len:i32 cigar:[u8]
//! score:i32 mismatches:i32
//! [md_len:i32 md:[u8]]                                    legacy_md
//! [mate_position:i32 template_length:i32 combo_score:i32] paired
//! [read_len:i32 read:[u8]
//!  super_cigar_len:i32 super_cigar:[u8]
//!  read_delta_len:i32 read_delta:[u8]]                    platform_cg
//! [unfiltered_mated:u8]                                   unfiltered
//! ```
//!
//! Optional groups are written only when the stream's [`StreamFlags`] ask
//! for them; the record contents never decide the layout.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use super::record::{AlignmentRecord, SENTINEL_REFERENCE_ID, StreamFlags};
use crate::core::utils::{BinaryWrite, i32_from_le};
use crate::error::{EmitError, Result};

/// Initial (and minimum refill) size of the reader buffer
const READ_CHUNK: usize = 64 * 1024;

/// Append the encoding of `record` to `out`.
///
/// The sentinel is encoded as its reference id alone.
pub fn encode_record<W: Write + ?Sized>(
    record: &AlignmentRecord,
    flags: StreamFlags,
    out: &mut W,
) -> Result<()> {
    out.write_i32_le(record.reference_id)?;
    if record.is_sentinel() {
        return Ok(());
    }

    let read_id = i32::try_from(record.read_id)
        .map_err(|_| EmitError::Format(format!("read id {} exceeds i32 range", record.read_id)))?;
    out.write_i32_le(record.start_position)?;
    out.write_i32_le(read_id)?;
    out.write_u8_le(record.flags)?;
    out.write_bytes_le(&record.cigar)?;
    out.write_i32_le(record.score)?;
    out.write_i32_le(record.mismatches)?;

    if flags.legacy_md {
        out.write_bytes_le(&record.md)?;
    }
    if flags.paired {
        out.write_i32_le(record.mate_position)?;
        out.write_i32_le(record.template_length)?;
        out.write_i32_le(record.combo_score)?;
    }
    if flags.platform_cg {
        out.write_bytes_le(&record.read)?;
        out.write_bytes_le(&record.super_cigar)?;
        out.write_bytes_le(&record.read_delta)?;
    }
    if flags.unfiltered {
        out.write_u8_le(record.unfiltered_mated as u8)?;
    }
    Ok(())
}

/// Writes records to a stream and terminates it with the sentinel.
///
/// The sentinel is written exactly once, by [`finish`](Self::finish) or,
/// failing that, when the writer is dropped.
pub struct RecordWriter<W: Write> {
    inner: Option<W>,
    flags: StreamFlags,
    scratch: Vec<u8>,
    records: u64,
    finished: bool,
}

impl RecordWriter<BufWriter<File>> {
    /// Create (truncate) a stream file.
    pub fn create<P: AsRef<Path>>(path: P, flags: StreamFlags) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file), flags))
    }
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W, flags: StreamFlags) -> Self {
        Self {
            inner: Some(inner),
            flags,
            scratch: Vec::with_capacity(256),
            records: 0,
            finished: false,
        }
    }

    pub fn flags(&self) -> StreamFlags {
        self.flags
    }

    /// Records written so far (sentinel excluded)
    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn inner_mut(&mut self) -> Result<&mut W> {
        self.inner
            .as_mut()
            .ok_or_else(|| EmitError::Protocol("record writer already released".to_string()))
    }

    /// Write one record.
    pub fn write(&mut self, record: &AlignmentRecord) -> Result<()> {
        if self.finished {
            return Err(EmitError::Protocol(format!(
                "write of {record} after end of stream"
            )));
        }
        if record.is_sentinel() {
            return Err(EmitError::Protocol(
                "the end-of-stream record is written by finish()".to_string(),
            ));
        }
        self.scratch.clear();
        encode_record(record, self.flags, &mut self.scratch)?;
        let Self { inner, scratch, .. } = self;
        match inner.as_mut() {
            Some(w) => w.write_all(scratch)?,
            None => return Err(EmitError::Protocol("record writer already released".to_string())),
        }
        self.records += 1;
        Ok(())
    }

    /// Write the sentinel and flush. Calling it again is a no-op.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        let inner = self.inner_mut()?;
        inner.write_i32_le(SENTINEL_REFERENCE_ID)?;
        inner.flush()?;
        Ok(())
    }

    /// Finish the stream and return the underlying writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.finish()?;
        self.inner
            .take()
            .ok_or_else(|| EmitError::Protocol("record writer already released".to_string()))
    }
}

impl<W: Write> Drop for RecordWriter<W> {
    fn drop(&mut self) {
        if self.finished || self.inner.is_none() {
            return;
        }
        log::warn!(
            "Record stream dropped without finish(); terminating after {} records",
            self.records
        );
        if let Err(e) = self.finish() {
            log::error!("Failed to terminate record stream: {}", e);
        }
    }
}

/// Reads records back from a stream written by [`RecordWriter`].
///
/// The input buffer grows to hold any record and is refilled mid-record as
/// needed. Reaching the sentinel ends iteration; reaching end of input
/// before it is an error.
pub struct RecordReader<R: Read> {
    inner: R,
    flags: StreamFlags,
    buf: Vec<u8>,
    pos: usize,
    end: usize,
    eof: bool,
    done: bool,
    records: u64,
}

impl RecordReader<File> {
    pub fn open<P: AsRef<Path>>(path: P, flags: StreamFlags) -> Result<Self> {
        Ok(Self::new(File::open(path)?, flags))
    }
}

impl<R: Read> RecordReader<R> {
    pub fn new(inner: R, flags: StreamFlags) -> Self {
        Self {
            inner,
            flags,
            buf: vec![0; READ_CHUNK],
            pos: 0,
            end: 0,
            eof: false,
            done: false,
            records: 0,
        }
    }

    pub fn flags(&self) -> StreamFlags {
        self.flags
    }

    /// Records decoded so far
    pub fn records(&self) -> u64 {
        self.records
    }

    /// True once the sentinel has been read (or decoding failed)
    pub fn is_done(&self) -> bool {
        self.done
    }

    #[inline]
    fn available(&self) -> usize {
        self.end - self.pos
    }

    /// Make at least `need` unread bytes available. Returns false if the
    /// input ends first.
    fn fill(&mut self, need: usize) -> Result<bool> {
        while self.available() < need {
            if self.eof {
                return Ok(false);
            }
            if self.pos > 0 {
                self.buf.copy_within(self.pos..self.end, 0);
                self.end -= self.pos;
                self.pos = 0;
            }
            let wanted = need.max(READ_CHUNK);
            if self.buf.len() < wanted {
                self.buf.resize(wanted, 0);
            }
            match self.inner.read(&mut self.buf[self.end..]) {
                Ok(0) => self.eof = true,
                Ok(n) => self.end += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(true)
    }

    fn take_i32(&mut self, field: &str) -> Result<i32> {
        if !self.fill(4)? {
            return Err(EmitError::Format(format!(
                "stream ended inside {field} of record {}",
                self.records + 1
            )));
        }
        let value = i32_from_le(&self.buf[self.pos..self.pos + 4]);
        self.pos += 4;
        Ok(value)
    }

    fn take_u8(&mut self, field: &str) -> Result<u8> {
        if !self.fill(1)? {
            return Err(EmitError::Format(format!(
                "stream ended inside {field} of record {}",
                self.records + 1
            )));
        }
        let value = self.buf[self.pos];
        self.pos += 1;
        Ok(value)
    }

    fn take_bytes(&mut self, field: &str) -> Result<Vec<u8>> {
        let len = self.take_i32(field)?;
        let len = usize::try_from(len).map_err(|_| {
            EmitError::Format(format!(
                "negative {field} length {len} in record {}",
                self.records + 1
            ))
        })?;
        if !self.fill(len)? {
            return Err(EmitError::Format(format!(
                "stream ended inside {field} of record {} ({} of {} bytes)",
                self.records + 1,
                self.available(),
                len
            )));
        }
        let bytes = self.buf[self.pos..self.pos + len].to_vec();
        self.pos += len;
        Ok(bytes)
    }

    /// Decode the next record, or `None` at the sentinel.
    pub fn read_record(&mut self) -> Result<Option<AlignmentRecord>> {
        if self.done {
            return Ok(None);
        }
        if !self.fill(4)? {
            if self.available() == 0 {
                return Err(EmitError::Truncated {
                    records: self.records,
                });
            }
            return Err(EmitError::Format(format!(
                "stream ended inside reference id of record {}",
                self.records + 1
            )));
        }

        let reference_id = self.take_i32("reference id")?;
        if reference_id == SENTINEL_REFERENCE_ID {
            self.done = true;
            return Ok(None);
        }
        if reference_id < 0 {
            return Err(EmitError::Format(format!(
                "invalid reference id {reference_id} in record {}",
                self.records + 1
            )));
        }

        let start_position = self.take_i32("start position")?;
        let read_id = self.take_i32("read id")?;
        let read_id = u32::try_from(read_id).map_err(|_| {
            EmitError::Format(format!("negative read id {read_id} in record {}", self.records + 1))
        })?;
        let mut record = AlignmentRecord {
            reference_id,
            start_position,
            read_id,
            flags: self.take_u8("flags")?,
            cigar: self.take_bytes("cigar")?,
            score: self.take_i32("score")?,
            mismatches: self.take_i32("mismatch count")?,
            ..AlignmentRecord::default()
        };

        if self.flags.legacy_md {
            record.md = self.take_bytes("MD string")?;
        }
        if self.flags.paired {
            record.mate_position = self.take_i32("mate position")?;
            record.template_length = self.take_i32("template length")?;
            record.combo_score = self.take_i32("combined score")?;
        }
        if self.flags.platform_cg {
            record.read = self.take_bytes("read")?;
            record.super_cigar = self.take_bytes("super-CIGAR")?;
            record.read_delta = self.take_bytes("read delta")?;
        }
        if self.flags.unfiltered {
            record.unfiltered_mated = self.take_u8("unfiltered tag")? != 0;
        }

        self.records += 1;
        Ok(Some(record))
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<AlignmentRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::record::record_flags;

    fn full_record() -> AlignmentRecord {
        AlignmentRecord {
            reference_id: 3,
            start_position: 12_345,
            read_id: 99,
            flags: record_flags::PAIRED | record_flags::FIRST_IN_PAIR | record_flags::REVERSE,
            cigar: b"40=1X59=".to_vec(),
            score: 1,
            mismatches: 1,
            md: b"40G59".to_vec(),
            mate_position: 12_600,
            template_length: 355,
            combo_score: 3,
            read: b"ACGTNACGT".to_vec(),
            super_cigar: b"5=2B6=".to_vec(),
            read_delta: b"AC".to_vec(),
            unfiltered_mated: true,
        }
    }

    fn all_flags() -> StreamFlags {
        StreamFlags::paired()
            .with_md(true)
            .with_cg(true)
            .with_unfiltered(true)
    }

    /// Reader that hands out at most `step` bytes per call.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        step: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn test_round_trip_all_groups() {
        let record = full_record();
        let mut writer = RecordWriter::new(Vec::new(), all_flags());
        writer.write(&record).unwrap();
        let bytes = writer.into_inner().unwrap();

        let mut reader = RecordReader::new(bytes.as_slice(), all_flags());
        assert_eq!(reader.read_record().unwrap(), Some(record));
        assert_eq!(reader.read_record().unwrap(), None);
        assert_eq!(reader.records(), 1);
    }

    #[test]
    fn test_disabled_groups_are_not_written() {
        let record = full_record();
        let mut bytes = Vec::new();
        encode_record(&record, StreamFlags::single_end(), &mut bytes).unwrap();
        // ref, pos, read id, flags, cigar len + cigar, score, mismatches
        assert_eq!(bytes.len(), 4 + 4 + 4 + 1 + 4 + record.cigar.len() + 4 + 4);

        let decoded = RecordReader::new(bytes.as_slice(), StreamFlags::single_end())
            .read_record()
            .unwrap()
            .unwrap();
        assert_eq!(decoded.cigar, record.cigar);
        assert!(decoded.md.is_empty());
        assert_eq!(decoded.mate_position, 0);
        assert!(!decoded.unfiltered_mated);
    }

    #[test]
    fn test_sentinel_is_four_bytes() {
        let mut bytes = Vec::new();
        encode_record(&AlignmentRecord::sentinel(), all_flags(), &mut bytes).unwrap();
        assert_eq!(bytes, vec![0xFF; 4]);
    }

    #[test]
    fn test_refill_mid_record() {
        let records: Vec<AlignmentRecord> = (0..50)
            .map(|i| AlignmentRecord {
                start_position: i * 10,
                read_id: i as u32,
                cigar: vec![b'='; 300 + i as usize],
                ..full_record()
            })
            .collect();
        let mut writer = RecordWriter::new(Vec::new(), all_flags());
        for record in &records {
            writer.write(record).unwrap();
        }
        let data = writer.into_inner().unwrap();

        let reader = RecordReader::new(Trickle { data, pos: 0, step: 7 }, all_flags());
        let decoded: Vec<AlignmentRecord> = reader.collect::<Result<_>>().unwrap();
        assert_eq!(decoded, records);
    }

    #[test]
    fn test_record_larger_than_buffer() {
        let record = AlignmentRecord {
            cigar: vec![b'='; 3 * READ_CHUNK],
            ..full_record()
        };
        let mut writer = RecordWriter::new(Vec::new(), all_flags());
        writer.write(&record).unwrap();
        let bytes = writer.into_inner().unwrap();
        let mut reader = RecordReader::new(bytes.as_slice(), all_flags());
        assert_eq!(reader.read_record().unwrap(), Some(record));
    }

    #[test]
    fn test_eof_inside_record_is_format_error() {
        let mut bytes = Vec::new();
        encode_record(&full_record(), all_flags(), &mut bytes).unwrap();
        bytes.truncate(bytes.len() - 3);
        let mut reader = RecordReader::new(bytes.as_slice(), all_flags());
        assert!(matches!(reader.read_record(), Err(EmitError::Format(_))));
    }

    #[test]
    fn test_missing_sentinel_is_truncated() {
        let mut bytes = Vec::new();
        encode_record(&full_record(), all_flags(), &mut bytes).unwrap();
        let mut reader = RecordReader::new(bytes.as_slice(), all_flags());
        assert!(reader.read_record().unwrap().is_some());
        match reader.read_record() {
            Err(EmitError::Truncated { records }) => assert_eq!(records, 1),
            other => panic!("expected truncation, got {other:?}"),
        }
    }

    #[test]
    fn test_negative_length_is_format_error() {
        let mut bytes = Vec::new();
        bytes.write_i32_le(0).unwrap();
        bytes.write_i32_le(1).unwrap();
        bytes.write_i32_le(1).unwrap();
        bytes.write_u8_le(0).unwrap();
        bytes.write_i32_le(-5).unwrap();
        let mut reader = RecordReader::new(bytes.as_slice(), StreamFlags::single_end());
        match reader.read_record() {
            Err(EmitError::Format(msg)) => assert!(msg.contains("negative cigar length")),
            other => panic!("expected format error, got {other:?}"),
        }
    }

    #[test]
    fn test_nothing_decoded_after_sentinel() {
        let mut writer = RecordWriter::new(Vec::new(), StreamFlags::single_end());
        writer.write(&full_record()).unwrap();
        let mut bytes = writer.into_inner().unwrap();
        // Garbage after the sentinel must never be interpreted
        bytes.extend_from_slice(&[1, 2, 3]);
        let mut reader = RecordReader::new(bytes.as_slice(), StreamFlags::single_end());
        assert!(reader.next().is_some());
        assert!(reader.next().is_none());
        assert!(reader.next().is_none());
        assert!(reader.is_done());
    }

    #[test]
    fn test_drop_writes_sentinel_once() {
        let mut bytes = Vec::new();
        {
            let mut writer = RecordWriter::new(&mut bytes, StreamFlags::single_end());
            writer.write(&full_record()).unwrap();
        }
        assert_eq!(&bytes[bytes.len() - 4..], &[0xFF; 4]);
        let decoded: Vec<_> = RecordReader::new(bytes.as_slice(), StreamFlags::single_end())
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(decoded.len(), 1);

        let mut finished = Vec::new();
        {
            let mut writer = RecordWriter::new(&mut finished, StreamFlags::single_end());
            writer.finish().unwrap();
            writer.finish().unwrap();
        }
        assert_eq!(finished, vec![0xFF; 4]);
    }

    #[test]
    fn test_write_after_finish_is_rejected() {
        let mut writer = RecordWriter::new(Vec::new(), StreamFlags::single_end());
        writer.finish().unwrap();
        assert!(matches!(writer.write(&full_record()), Err(EmitError::Protocol(_))));
        assert!(matches!(
            RecordWriter::new(Vec::new(), StreamFlags::single_end()).write(&AlignmentRecord::sentinel()),
            Err(EmitError::Protocol(_))
        ));
    }
}
