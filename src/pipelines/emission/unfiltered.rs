//! Unfiltered emission.
//!
//! Same left/right protocol and score ceilings as paired mode, but no
//! best-score blocking. Output is instead capped per read and arm by a pair
//! of [`ReadFrequencyBlocker`]s shared between workers. Mated results are
//! tagged `unfiltered_mated = true` on the alignment stream; single mates go
//! to the unmated stream tagged `false`.

use super::blocker::ReadFrequencyBlocker;
use super::clip_region::ClipRegion;
use super::emit_opt::EmitOpt;
use super::paired::{MatedHit, PairScore, mate_record, score_pair, unmated_flags};
use super::scoring::EmitterCore;
use super::sequences::SequenceStore;
use super::stats::{Admission, EmitStats, Rejection};
use crate::core::alignment::aligner::Aligner;
use crate::core::alignment::workspace::Side;
use crate::core::io::{
    AlignmentRecord, PairedOrder, RecordOrder, RecordSink, ReorderingBuffer, SingleEndOrder,
};
use crate::error::{EmitError, Result};

pub struct UnfilteredEmitter<'a, A: Aligner, S: RecordSink> {
    core: EmitterCore<'a, A>,
    first_arm_cap: &'a ReadFrequencyBlocker,
    second_arm_cap: &'a ReadFrequencyBlocker,
    alignments: ReorderingBuffer<S, PairedOrder>,
    unmated: ReorderingBuffer<S, SingleEndOrder>,
}

impl<'a, A: Aligner, S: RecordSink> UnfilteredEmitter<'a, A, S> {
    /// Both caps are keyed by read id. The alignment sink must use the
    /// layout of `opt.stream_flags(true, true)`, the unmated sink
    /// `opt.stream_flags(false, true)`.
    pub fn new(
        opt: EmitOpt,
        aligner: A,
        store: &'a dyn SequenceStore,
        clip: &'a ClipRegion,
        first_arm_cap: &'a ReadFrequencyBlocker,
        second_arm_cap: &'a ReadFrequencyBlocker,
        alignment_sink: S,
        unmated_sink: S,
    ) -> Result<Self> {
        let distance = opt.buffer_distance();
        let policy = opt.ordering_policy;
        Ok(Self {
            core: EmitterCore::new(opt, aligner, store, clip)?,
            first_arm_cap,
            second_arm_cap,
            alignments: ReorderingBuffer::new(alignment_sink, distance, policy),
            unmated: ReorderingBuffer::new(unmated_sink, distance, policy),
        })
    }

    pub fn advance(&mut self, template_id: u32) -> Result<()> {
        self.alignments.flush_all()?;
        self.unmated.flush_all()?;
        self.core.advance(template_id)
    }

    fn cap(&self, first_arm: bool) -> &'a ReadFrequencyBlocker {
        if first_arm { self.first_arm_cap } else { self.second_arm_cap }
    }

    /// Score a pair and emit its left mate. Returns true if the pair passed
    /// both mated ceilings.
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
                return Ok(false);
            }
        };

        hit.set_accepted(combo);
        let admission = match mate_record(&self.core, hit, Side::Left)? {
            Some(record) => {
                let cap = self.cap(hit.left_first_arm);
                capped_add(&mut self.alignments, cap, tagged(record, true))?
            }
            None => Admission::Rejected(Rejection::OutsideClipRegion),
        };
        self.core.stats.record(admission);
        log::trace!("unfiltered pair {} combo {}: left mate {:?}", hit.read_id, combo, admission);
        Ok(true)
    }

    /// Emit the right mate of a pair accepted by the left call.
    pub fn pair_result_right(&mut self, hit: &mut MatedHit) -> Result<Admission> {
        self.core.template_id()?;
        if !hit.is_accepted() {
            return Err(EmitError::Protocol(format!(
                "right mate of read {} submitted for a pair that was not accepted",
                hit.read_id
            )));
        }
        let admission = match mate_record(&self.core, hit, Side::Right)? {
            Some(record) => {
                let cap = self.cap(!hit.left_first_arm);
                capped_add(&mut self.alignments, cap, tagged(record, true))?
            }
            None => Admission::Rejected(Rejection::OutsideClipRegion),
        };
        self.core.stats.record(admission);
        Ok(admission)
    }

    /// Score one mate on its own against the unmated ceiling.
    pub fn submit_unmated(
        &mut self,
        read_id: u32,
        first_arm: bool,
        reverse: bool,
        start: i32,
    ) -> Result<Admission> {
        let admission = self.admit_unmated(read_id, first_arm, reverse, start)?;
        self.core.stats.record(admission);
        log::trace!("unfiltered unmated read {}/{}: {:?}", read_id, if first_arm { 1 } else { 2 }, admission);
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
        let record = self
            .core
            .build_record(actions, read_id, first_arm, reverse, unmated_flags(first_arm, reverse))?;
        let cap = self.cap(first_arm);
        capped_add(&mut self.unmated, cap, tagged(record, false))
    }

    pub fn stats(&self) -> EmitStats {
        self.core.stats()
    }

    /// Flush and terminate both streams; returns the alignment sink, the
    /// unmated sink and the final counters.
    pub fn finish(self) -> Result<(S, S, EmitStats)> {
        let stats = self.core.stats();
        let alignments = self.alignments.into_sink()?;
        let unmated = self.unmated.into_sink()?;
        log::info!("Unfiltered emitter: {}", stats);
        Ok((alignments, unmated, stats))
    }

    pub fn close(self) -> Result<EmitStats> {
        self.finish().map(|(_, _, stats)| stats)
    }
}

fn tagged(mut record: AlignmentRecord, mated: bool) -> AlignmentRecord {
    record.unfiltered_mated = mated;
    record
}

/// Take a slot of the read's cap and add the record, returning the slot if
/// the buffer does not keep it.
fn capped_add<S: RecordSink, O: RecordOrder>(
    buffer: &mut ReorderingBuffer<S, O>,
    cap: &ReadFrequencyBlocker,
    record: AlignmentRecord,
) -> Result<Admission> {
    let read_id = record.read_id;
    if !cap.try_acquire(read_id) {
        return Ok(Admission::Rejected(Rejection::FrequencyCap));
    }
    let dropped = buffer.dropped();
    match buffer.add(record) {
        Ok(true) => Ok(Admission::Accepted),
        Ok(false) => {
            cap.release(read_id);
            Ok(Admission::not_added(dropped, buffer.dropped()))
        }
        Err(e) => {
            cap.release(read_id);
            Err(e)
        }
    }
}
