//! Mated-pair emission.
//!
//! A candidate pair is submitted in two calls. The "left" call (mate with
//! the lesser position) aligns both mates, rejects the pair if either mate
//! exceeds its mated ceiling or the combined score is blocked, and emits
//! the left mate. The caller then submits the "right" call only for pairs
//! the left call accepted. Both calls emit through one routine that checks
//! the clip region against the mate actually emitted and counts the pair in
//! the combined-score blocker once.
//!
//! Mates that could not be paired are submitted one at a time with
//! [`PairedEmitter::submit_unmated`] and go to a separate stream.

use super::blocker::Blocker;
use super::clip_region::ClipRegion;
use super::emit_opt::EmitOpt;
use super::scoring::EmitterCore;
use super::sequences::SequenceStore;
use super::stats::{Admission, EmitStats, Rejection};
use crate::core::alignment::actions::Actions;
use crate::core::alignment::aligner::Aligner;
use crate::core::alignment::workspace::Side;
use crate::core::io::{
    AlignmentRecord, PairedOrder, RecordSink, ReorderingBuffer, SingleEndOrder, record_flags,
};
use crate::error::{EmitError, Result};

/// One candidate mate pair, carried across the left and right calls.
///
/// Reusable: [`reset`](Self::reset) keeps the action buffers.
#[derive(Debug, Clone, Default)]
pub struct MatedHit {
    pub read_id: u32,
    /// True if the left mate is the first read of the pair
    pub left_first_arm: bool,
    pub left_reverse: bool,
    /// Proposed 0-based absolute start of the left mate
    pub left_start: i32,
    pub right_reverse: bool,
    /// Proposed 0-based absolute start of the right mate
    pub right_start: i32,

    left: Actions,
    right: Actions,
    combo: i32,
    accepted: bool,
    left_very_poor: bool,
    counted: bool,
}

impl MatedHit {
    /// `left` and `right` are `(reverse, start)` of each mate.
    pub fn new(read_id: u32, left_first_arm: bool, left: (bool, i32), right: (bool, i32)) -> Self {
        let mut hit = Self::default();
        hit.reset(read_id, left_first_arm, left, right);
        hit
    }

    /// Reuse for another candidate.
    pub fn reset(&mut self, read_id: u32, left_first_arm: bool, left: (bool, i32), right: (bool, i32)) {
        self.read_id = read_id;
        self.left_first_arm = left_first_arm;
        (self.left_reverse, self.left_start) = left;
        (self.right_reverse, self.right_start) = right;
        self.left.clear();
        self.right.clear();
        self.clear_outcome();
    }

    fn clear_outcome(&mut self) {
        self.combo = 0;
        self.accepted = false;
        self.left_very_poor = false;
        self.counted = false;
    }

    pub(crate) fn set_accepted(&mut self, combo: i32) {
        self.combo = combo;
        self.accepted = true;
    }

    /// True once the left call accepted the pair
    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    /// True if the left call gave up on the left mate alone
    pub fn is_left_very_poor(&self) -> bool {
        self.left_very_poor
    }

    pub fn combo_score(&self) -> i32 {
        self.combo
    }

    pub fn left_actions(&self) -> &Actions {
        &self.left
    }

    pub fn right_actions(&self) -> &Actions {
        &self.right
    }
}

/// Outcome of scoring both mates of a pair.
pub(crate) enum PairScore {
    /// Left mate above its ceiling; the right mate was not aligned
    LeftVeryPoor,
    RightAboveCeiling,
    Scored(i32),
}

/// Align both mates with their mated ceilings and sum the scores.
pub(crate) fn score_pair<A: Aligner>(core: &mut EmitterCore<'_, A>, hit: &mut MatedHit) -> Result<PairScore> {
    hit.clear_outcome();
    let left_arm = hit.left_first_arm;
    let left_ceiling = core.opt().mated_ceiling(core.read(hit.read_id, left_arm)?.len());
    let right_ceiling = core.opt().mated_ceiling(core.read(hit.read_id, !left_arm)?.len());

    let left = core.align(Side::Left, hit.read_id, left_arm, hit.left_reverse, hit.left_start, left_ceiling)?;
    hit.left.copy_from(core.actions(Side::Left));
    if left > left_ceiling {
        hit.left_very_poor = true;
        return Ok(PairScore::LeftVeryPoor);
    }

    let right = core.align(Side::Right, hit.read_id, !left_arm, hit.right_reverse, hit.right_start, right_ceiling)?;
    hit.right.copy_from(core.actions(Side::Right));
    if right > right_ceiling {
        return Ok(PairScore::RightAboveCeiling);
    }

    let combo = left.checked_add(right).ok_or(EmitError::ArithmeticOverflow {
        read_id: hit.read_id,
        left,
        right,
    })?;
    Ok(PairScore::Scored(combo))
}

/// Record for one mate of an accepted pair, or `None` if the mate's final
/// start is outside the clip region.
pub(crate) fn mate_record<A: Aligner>(
    core: &EmitterCore<'_, A>,
    hit: &MatedHit,
    side: Side,
) -> Result<Option<AlignmentRecord>> {
    let (actions, mate, first_arm, reverse, mate_reverse) = match side {
        Side::Left => (&hit.left, &hit.right, hit.left_first_arm, hit.left_reverse, hit.right_reverse),
        Side::Right => (&hit.right, &hit.left, !hit.left_first_arm, hit.right_reverse, hit.left_reverse),
    };
    if !core.in_clip(actions)? {
        return Ok(None);
    }

    let mut flags = record_flags::PAIRED | record_flags::PROPER_PAIR;
    flags |= if first_arm { record_flags::FIRST_IN_PAIR } else { record_flags::SECOND_IN_PAIR };
    if reverse {
        flags |= record_flags::REVERSE;
    }
    if mate_reverse {
        flags |= record_flags::MATE_REVERSE;
    }

    let mut record = core.build_record(actions, hit.read_id, first_arm, reverse, flags)?;
    let start = core.final_start(actions) as i64;
    let mate_start = core.final_start(mate) as i64;
    let lo = start.min(mate_start);
    let hi = (start + actions.reference_length() as i64).max(mate_start + mate.reference_length() as i64);
    let span = (hi - lo).clamp(0, i32::MAX as i64) as i32;
    let leftmost = start < mate_start || (start == mate_start && side == Side::Left);

    record.mate_position = mate_start as i32 + 1;
    record.template_length = if leftmost { span } else { -span };
    record.combo_score = hit.combo;
    Ok(Some(record))
}

/// Flags of a mate emitted on its own
pub(crate) fn unmated_flags(first_arm: bool, reverse: bool) -> u8 {
    let mut flags = record_flags::PAIRED;
    flags |= if first_arm { record_flags::FIRST_IN_PAIR } else { record_flags::SECOND_IN_PAIR };
    if reverse {
        flags |= record_flags::REVERSE;
    }
    flags
}

/// Key of one arm of a read in per-arm blockers
#[inline]
pub(crate) fn arm_key(read_id: u32, first_arm: bool) -> u32 {
    read_id.wrapping_mul(2) + u32::from(!first_arm)
}

pub struct PairedEmitter<'a, A: Aligner, S: RecordSink> {
    core: EmitterCore<'a, A>,
    combo_blocker: &'a dyn Blocker,
    unmated_blocker: &'a dyn Blocker,
    mated: ReorderingBuffer<S, PairedOrder>,
    unmated: ReorderingBuffer<S, SingleEndOrder>,
}

impl<'a, A: Aligner, S: RecordSink> PairedEmitter<'a, A, S> {
    /// `combo_blocker` is keyed by read id, `unmated_blocker` by
    /// `2 * read_id + arm`. The mated sink must use the layout of
    /// `opt.stream_flags(true, false)`, the unmated sink
    /// `opt.stream_flags(false, false)`.
    pub fn new(
        opt: EmitOpt,
        aligner: A,
        store: &'a dyn SequenceStore,
        clip: &'a ClipRegion,
        combo_blocker: &'a dyn Blocker,
        unmated_blocker: &'a dyn Blocker,
        mated_sink: S,
        unmated_sink: S,
    ) -> Result<Self> {
        let distance = opt.buffer_distance();
        let policy = opt.ordering_policy;
        Ok(Self {
            core: EmitterCore::new(opt, aligner, store, clip)?,
            combo_blocker,
            unmated_blocker,
            mated: ReorderingBuffer::new(mated_sink, distance, policy),
            unmated: ReorderingBuffer::new(unmated_sink, distance, policy),
        })
    }

    pub fn advance(&mut self, template_id: u32) -> Result<()> {
        self.mated.flush_all()?;
        self.unmated.flush_all()?;
        self.core.advance(template_id)
    }

    /// Score a pair and emit its left mate. Returns true if the pair was
    /// accepted, in which case the caller follows with
    /// [`pair_result_right`](Self::pair_result_right).
    pub fn pair_result_left(&mut self, hit: &mut MatedHit) -> Result<bool> {
        self.core.template_id()?;
        if !self.core.template_in_region() {
            self.core.stats.record(Admission::Rejected(Rejection::OutsideClipRegion));
            return Ok(false);
        }

        let combo = match score_pair(&mut self.core, hit)? {
            PairScore::Scored(combo) => combo,
            PairScore::LeftVeryPoor | PairScore::RightAboveCeiling => {
                self.core.stats.record(Admission::Rejected(Rejection::ScoreAboveCeiling));
                log::trace!("pair {} rejected on score (left very poor: {})", hit.read_id, hit.left_very_poor);
                return Ok(false);
            }
        };
        if self.combo_blocker.is_blocked_at_or_below(hit.read_id, combo) {
            self.core.stats.record(Admission::Rejected(Rejection::Blocked));
            return Ok(false);
        }

        hit.set_accepted(combo);
        let admission = self.emit_mate(hit, Side::Left)?;
        self.core.stats.record(admission);
        log::trace!("pair {} combo {}: left mate {:?}", hit.read_id, combo, admission);
        Ok(true)
    }

    /// Emit the right mate of a pair accepted by the left call.
    pub fn pair_result_right(&mut self, hit: &mut MatedHit) -> Result<Admission> {
        self.core.template_id()?;
        if !hit.accepted {
            return Err(EmitError::Protocol(format!(
                "right mate of read {} submitted for a pair that was not accepted",
                hit.read_id
            )));
        }
        let admission = self.emit_mate(hit, Side::Right)?;
        self.core.stats.record(admission);
        log::trace!("pair {}: right mate {:?}", hit.read_id, admission);
        Ok(admission)
    }

    fn emit_mate(&mut self, hit: &mut MatedHit, side: Side) -> Result<Admission> {
        let Some(record) = mate_record(&self.core, hit, side)? else {
            return Ok(Admission::Rejected(Rejection::OutsideClipRegion));
        };
        let dropped = self.mated.dropped();
        if !self.mated.add(record)? {
            return Ok(Admission::not_added(dropped, self.mated.dropped()));
        }
        if !hit.counted {
            self.combo_blocker.increment(hit.read_id, hit.combo);
            hit.counted = true;
        }
        Ok(Admission::Accepted)
    }

    /// Score one mate on its own against the unmated ceiling and emit it to
    /// the unmated stream if admitted.
    pub fn submit_unmated(
        &mut self,
        read_id: u32,
        first_arm: bool,
        reverse: bool,
        start: i32,
    ) -> Result<Admission> {
        let admission = self.admit_unmated(read_id, first_arm, reverse, start)?;
        self.core.stats.record(admission);
        log::trace!("unmated read {}/{}: {:?}", read_id, if first_arm { 1 } else { 2 }, admission);
        Ok(admission)
    }

    fn admit_unmated(&mut self, read_id: u32, first_arm: bool, reverse: bool, start: i32) -> Result<Admission> {
        self.core.template_id()?;
        if !self.core.template_in_region() {
            return Ok(Admission::Rejected(Rejection::OutsideClipRegion));
        }
        let ceiling = self.core.opt().unmated_ceiling(self.core.read(read_id, first_arm)?.len());
        let score = self.core.align(Side::Left, read_id, first_arm, reverse, start, ceiling)?;
        if score > ceiling {
            return Ok(Admission::Rejected(Rejection::ScoreAboveCeiling));
        }
        let actions = self.core.actions(Side::Left);
        if !self.core.in_clip(actions)? {
            return Ok(Admission::Rejected(Rejection::OutsideClipRegion));
        }
        let key = arm_key(read_id, first_arm);
        if self.unmated_blocker.is_blocked_at_or_below(key, score) {
            return Ok(Admission::Rejected(Rejection::Blocked));
        }

        let record = self
            .core
            .build_record(actions, read_id, first_arm, reverse, unmated_flags(first_arm, reverse))?;
        let dropped = self.unmated.dropped();
        if !self.unmated.add(record)? {
            return Ok(Admission::not_added(dropped, self.unmated.dropped()));
        }
        self.unmated_blocker.increment(key, score);
        Ok(Admission::Accepted)
    }

    pub fn stats(&self) -> EmitStats {
        self.core.stats()
    }

    /// Flush and terminate both streams; returns the mated sink, the
    /// unmated sink and the final counters.
    pub fn finish(self) -> Result<(S, S, EmitStats)> {
        let stats = self.core.stats();
        let mated = self.mated.into_sink()?;
        let unmated = self.unmated.into_sink()?;
        log::info!("Paired emitter: {}", stats);
        Ok((mated, unmated, stats))
    }

    pub fn close(self) -> Result<EmitStats> {
        self.finish().map(|(_, _, stats)| stats)
    }
}
