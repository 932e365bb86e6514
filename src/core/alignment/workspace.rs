//! Reusable per-side alignment buffers
//!
//! Every emitter owns one [`AlignmentWorkspace`] holding a cache for each
//! side ("left" and "right") of a candidate. A cache remembers the last
//! alignment it computed, so a repeated request for the same read, strand,
//! start and score ceiling is answered without calling the aligner again.
//! The read and action buffers are sized for the current read length and
//! reused across candidates; a cache is invalidated and resized whenever
//! the read length changes.

use super::actions::Actions;

/// Which of the two caches a request uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    #[inline]
    fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }
}

/// Identity of one alignment request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlignKey {
    pub read_id: u32,
    pub first_arm: bool,
    pub reverse: bool,
    /// Proposed 0-based absolute template start
    pub start: i32,
    pub max_score: i32,
}

/// Cached alignment and scratch buffers for one side.
#[derive(Debug, Default)]
pub struct SideCache {
    key: Option<AlignKey>,
    read_len: usize,
    /// Read bases as stored (2-bit codes)
    pub read: Vec<u8>,
    /// Result of the last alignment
    pub actions: Actions,
    hits: u64,
    misses: u64,
}

impl SideCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true (and counts a hit) when `key` was the last request served.
    pub fn lookup(&mut self, key: &AlignKey) -> bool {
        if self.key.as_ref() == Some(key) {
            self.hits += 1;
            true
        } else {
            false
        }
    }

    /// Prepare the buffers for a new alignment of a read of `read_len` bases.
    ///
    /// The cached result is dropped; buffers are reallocated only when the
    /// read length differs from the one they were sized for.
    pub fn prepare(&mut self, read_len: usize) {
        self.misses += 1;
        self.key = None;
        if read_len != self.read_len {
            self.read = Vec::with_capacity(read_len);
            self.actions = Actions::with_capacity(2 * read_len);
            self.read_len = read_len;
        } else {
            self.read.clear();
            self.actions.clear();
        }
    }

    /// Mark the current buffers as the result for `key`.
    pub fn store(&mut self, key: AlignKey) {
        self.key = Some(key);
    }

    pub fn invalidate(&mut self) {
        self.key = None;
    }

    /// Read length the buffers are currently sized for
    pub fn read_len(&self) -> usize {
        self.read_len
    }

    /// (hits, misses) since construction
    pub fn counts(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

/// The two per-side caches of an emitter.
#[derive(Debug, Default)]
pub struct AlignmentWorkspace {
    sides: [SideCache; 2],
}

impl AlignmentWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn side(&self, side: Side) -> &SideCache {
        &self.sides[side.index()]
    }

    #[inline]
    pub fn side_mut(&mut self, side: Side) -> &mut SideCache {
        &mut self.sides[side.index()]
    }

    /// Invalidate both caches (template changed)
    pub fn invalidate(&mut self) {
        for cache in &mut self.sides {
            cache.invalidate();
        }
    }

    /// Total (hits, misses) over both sides
    pub fn counts(&self) -> (u64, u64) {
        self.sides.iter().fold((0, 0), |(h, m), cache| {
            let (ch, cm) = cache.counts();
            (h + ch, m + cm)
        })
    }
}
