//! Admission outcomes and per-emitter counters.

use std::fmt;

/// Why a candidate was not emitted. Rejections are not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Alignment score above the mismatch-derived ceiling
    ScoreAboveCeiling,
    /// Final start outside the worker's clip region
    OutsideClipRegion,
    /// The best-score blocker already holds an equal or better hit
    Blocked,
    /// Per-read output cap reached
    FrequencyCap,
    /// Dropped by the reordering buffer as out of order
    OutOfOrder,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rejection::ScoreAboveCeiling => "score above ceiling",
            Rejection::OutsideClipRegion => "outside clip region",
            Rejection::Blocked => "blocked",
            Rejection::FrequencyCap => "frequency cap",
            Rejection::OutOfOrder => "out of order",
        };
        f.write_str(name)
    }
}

/// Outcome of one submit call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Record handed to the reordering buffer
    Accepted,
    /// Record equal to one already emitted
    Duplicate,
    Rejected(Rejection),
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accepted)
    }

    /// Outcome of a buffer `add` that returned false, from the buffer's
    /// dropped count before and after the call.
    pub(crate) fn not_added(dropped_before: u64, dropped_after: u64) -> Self {
        if dropped_after > dropped_before {
            Admission::Rejected(Rejection::OutOfOrder)
        } else {
            Admission::Duplicate
        }
    }
}

/// Counters of one emitter, logged when it closes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitStats {
    pub candidates: u64,
    pub accepted: u64,
    pub duplicates: u64,
    pub rejected_score: u64,
    pub rejected_clip: u64,
    pub rejected_blocked: u64,
    pub rejected_frequency: u64,
    pub dropped_out_of_order: u64,
    pub templates: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

impl EmitStats {
    /// Count one admission decision.
    pub fn record(&mut self, admission: Admission) {
        self.candidates += 1;
        match admission {
            Admission::Accepted => self.accepted += 1,
            Admission::Duplicate => self.duplicates += 1,
            Admission::Rejected(Rejection::ScoreAboveCeiling) => self.rejected_score += 1,
            Admission::Rejected(Rejection::OutsideClipRegion) => self.rejected_clip += 1,
            Admission::Rejected(Rejection::Blocked) => self.rejected_blocked += 1,
            Admission::Rejected(Rejection::FrequencyCap) => self.rejected_frequency += 1,
            Admission::Rejected(Rejection::OutOfOrder) => self.dropped_out_of_order += 1,
        }
    }

    pub fn rejected(&self) -> u64 {
        self.rejected_score
            + self.rejected_clip
            + self.rejected_blocked
            + self.rejected_frequency
            + self.dropped_out_of_order
    }

    /// Add another emitter's counters (for multi-worker summaries).
    pub fn merge(&mut self, other: &EmitStats) {
        self.candidates += other.candidates;
        self.accepted += other.accepted;
        self.duplicates += other.duplicates;
        self.rejected_score += other.rejected_score;
        self.rejected_clip += other.rejected_clip;
        self.rejected_blocked += other.rejected_blocked;
        self.rejected_frequency += other.rejected_frequency;
        self.dropped_out_of_order += other.dropped_out_of_order;
        self.templates += other.templates;
        self.cache_hits += other.cache_hits;
        self.cache_misses += other.cache_misses;
    }
}

impl fmt::Display for EmitStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} candidates over {} templates: {} accepted, {} duplicates, {} rejected \
             (score {}, clip {}, blocked {}, frequency {}, out of order {}); \
             alignment cache {} hits / {} misses",
            self.candidates,
            self.templates,
            self.accepted,
            self.duplicates,
            self.rejected(),
            self.rejected_score,
            self.rejected_clip,
            self.rejected_blocked,
            self.rejected_frequency,
            self.dropped_out_of_order,
            self.cache_hits,
            self.cache_misses
        )
    }
}
