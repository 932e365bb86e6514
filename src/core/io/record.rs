//! Alignment records carried by the intermediate result streams.

use std::fmt;

/// Per-record flag bits (one byte on the wire).
pub mod record_flags {
    pub const REVERSE: u8 = 0x01; // Read aligned on the reverse strand
    pub const PAIRED: u8 = 0x02; // Read is one mate of a pair
    pub const FIRST_IN_PAIR: u8 = 0x04; // First read of the pair
    pub const SECOND_IN_PAIR: u8 = 0x08; // Second read of the pair
    pub const MATE_REVERSE: u8 = 0x10; // Mate aligned on the reverse strand
    pub const PROPER_PAIR: u8 = 0x20; // Emitted as part of a mated pair
}

/// Reference id reserved for the end-of-stream record.
pub const SENTINEL_REFERENCE_ID: i32 = -1;

/// Optional field groups of a stream.
///
/// Fixed when a stream is opened; a reader must use the same flags as the
/// writer that produced the stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamFlags {
    /// Mate position, template length and combined score
    pub paired: bool,
    /// MD mismatch string
    pub legacy_md: bool,
    /// CG platform fields (read, super-CIGAR, read delta)
    pub platform_cg: bool,
    /// Unfiltered mated/unmated tag
    pub unfiltered: bool,
}

impl StreamFlags {
    pub const fn single_end() -> Self {
        Self {
            paired: false,
            legacy_md: false,
            platform_cg: false,
            unfiltered: false,
        }
    }

    pub const fn paired() -> Self {
        Self {
            paired: true,
            ..Self::single_end()
        }
    }

    pub const fn with_md(mut self, legacy_md: bool) -> Self {
        self.legacy_md = legacy_md;
        self
    }

    pub const fn with_cg(mut self, platform_cg: bool) -> Self {
        self.platform_cg = platform_cg;
        self
    }

    pub const fn with_unfiltered(mut self, unfiltered: bool) -> Self {
        self.unfiltered = unfiltered;
        self
    }
}

/// One surviving alignment.
///
/// `start_position` and `mate_position` are 1-based absolute template
/// coordinates. Optional groups are only meaningful (and only serialized)
/// when the matching [`StreamFlags`] field is set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AlignmentRecord {
    pub reference_id: i32,
    pub start_position: i32,
    pub read_id: u32,
    pub flags: u8,
    pub cigar: Vec<u8>,
    pub score: i32,
    pub mismatches: i32,

    // legacy_md
    pub md: Vec<u8>,

    // paired
    pub mate_position: i32,
    pub template_length: i32,
    pub combo_score: i32,

    // platform_cg
    pub read: Vec<u8>,
    pub super_cigar: Vec<u8>,
    pub read_delta: Vec<u8>,

    // unfiltered
    pub unfiltered_mated: bool,
}

impl AlignmentRecord {
    /// The end-of-stream record
    pub fn sentinel() -> Self {
        Self {
            reference_id: SENTINEL_REFERENCE_ID,
            ..Self::default()
        }
    }

    #[inline]
    pub fn is_sentinel(&self) -> bool {
        self.reference_id == SENTINEL_REFERENCE_ID
    }

    #[inline]
    fn has(&self, bit: u8) -> bool {
        self.flags & bit != 0
    }

    #[inline]
    pub fn is_reverse(&self) -> bool {
        self.has(record_flags::REVERSE)
    }

    #[inline]
    pub fn is_paired(&self) -> bool {
        self.has(record_flags::PAIRED)
    }

    #[inline]
    pub fn is_first_in_pair(&self) -> bool {
        self.has(record_flags::FIRST_IN_PAIR)
    }

    #[inline]
    pub fn is_second_in_pair(&self) -> bool {
        self.has(record_flags::SECOND_IN_PAIR)
    }

    #[inline]
    pub fn is_mate_reverse(&self) -> bool {
        self.has(record_flags::MATE_REVERSE)
    }

    #[inline]
    pub fn is_proper_pair(&self) -> bool {
        self.has(record_flags::PROPER_PAIR)
    }

    /// Strand character used in diagnostics and the `view` output
    pub fn strand(&self) -> char {
        if self.is_reverse() {
            '-'
        } else {
            '+'
        }
    }
}

impl fmt::Display for AlignmentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_sentinel() {
            return write!(f, "<end of stream>");
        }
        write!(
            f,
            "{}:{} read={}{} score={}",
            self.reference_id,
            self.start_position,
            self.read_id,
            self.strand(),
            self.score
        )?;
        if self.is_paired() {
            write!(
                f,
                " mate={} combo={}",
                self.mate_position, self.combo_score
            )?;
        }
        Ok(())
    }
}
