//! Single-end emission.
//!
//! Each candidate `(read, strand, start)` is aligned against the current
//! template with a ceiling of `max_unmated_mismatches(read length) *
//! substitution_penalty`. A hit is emitted if its score is within the
//! ceiling, its final start lies in the clip region and the best-score
//! blocker does not already hold an equal or better hit for the read.

use super::blocker::Blocker;
use super::clip_region::ClipRegion;
use super::emit_opt::EmitOpt;
use super::scoring::EmitterCore;
use super::sequences::SequenceStore;
use super::stats::{Admission, EmitStats, Rejection};
use super::top_hits::{TopHit, TopHitsTracker};
use crate::core::alignment::aligner::Aligner;
use crate::core::alignment::workspace::Side;
use crate::core::io::{RecordSink, ReorderingBuffer, SingleEndOrder, record_flags};
use crate::error::Result;

pub struct SingleEndEmitter<'a, A: Aligner, S: RecordSink> {
    core: EmitterCore<'a, A>,
    blocker: &'a dyn Blocker,
    top_hits: Option<&'a TopHitsTracker>,
    buffer: ReorderingBuffer<S, SingleEndOrder>,
}

impl<'a, A: Aligner, S: RecordSink> SingleEndEmitter<'a, A, S> {
    /// The sink must use the layout of `opt.stream_flags(false, false)`.
    pub fn new(
        opt: EmitOpt,
        aligner: A,
        store: &'a dyn SequenceStore,
        clip: &'a ClipRegion,
        blocker: &'a dyn Blocker,
        sink: S,
    ) -> Result<Self> {
        let buffer = ReorderingBuffer::new(sink, opt.buffer_distance(), opt.ordering_policy);
        Ok(Self {
            core: EmitterCore::new(opt, aligner, store, clip)?,
            blocker,
            top_hits: None,
            buffer,
        })
    }

    /// Also report accepted hits to `tracker`.
    pub fn with_top_hits(mut self, tracker: &'a TopHitsTracker) -> Self {
        self.top_hits = Some(tracker);
        self
    }

    /// Move to the next template (ids strictly increasing, or
    /// [`END_OF_TEMPLATES`](super::template::END_OF_TEMPLATES)).
    pub fn advance(&mut self, template_id: u32) -> Result<()> {
        self.buffer.flush_all()?;
        self.core.advance(template_id)
    }

    /// Score one candidate and emit it if admitted. `start` is the proposed
    /// 0-based absolute start on the current template.
    pub fn submit(&mut self, read_id: u32, reverse: bool, start: i32) -> Result<Admission> {
        let admission = self.admit(read_id, reverse, start)?;
        self.core.stats.record(admission);
        log::trace!(
            "single-end read {} {} @{}: {:?}",
            read_id,
            if reverse { '-' } else { '+' },
            start,
            admission
        );
        Ok(admission)
    }

    fn admit(&mut self, read_id: u32, reverse: bool, start: i32) -> Result<Admission> {
        let template_id = self.core.template_id()?;
        if !self.core.template_in_region() {
            return Ok(Admission::Rejected(Rejection::OutsideClipRegion));
        }

        let read_len = self.core.read(read_id, true)?.len();
        let ceiling = self.core.opt().unmated_ceiling(read_len);
        let score = self
            .core
            .align(Side::Left, read_id, true, reverse, start, ceiling)?;
        if score > ceiling {
            return Ok(Admission::Rejected(Rejection::ScoreAboveCeiling));
        }
        let actions = self.core.actions(Side::Left);
        if !self.core.in_clip(actions)? {
            return Ok(Admission::Rejected(Rejection::OutsideClipRegion));
        }
        if self.blocker.is_blocked_at_or_below(read_id, score) {
            return Ok(Admission::Rejected(Rejection::Blocked));
        }

        let flags = if reverse { record_flags::REVERSE } else { 0 };
        let record = self.core.build_record(actions, read_id, true, reverse, flags)?;
        let position = record.start_position;

        let dropped = self.buffer.dropped();
        if !self.buffer.add(record)? {
            return Ok(Admission::not_added(dropped, self.buffer.dropped()));
        }

        self.blocker.increment(read_id, score);
        if let Some(tracker) = self.top_hits {
            tracker.offer(
                read_id,
                TopHit {
                    template_id,
                    position,
                    reverse,
                    score,
                },
            );
        }
        Ok(Admission::Accepted)
    }

    /// Counters so far
    pub fn stats(&self) -> EmitStats {
        self.core.stats()
    }

    /// Flush and terminate the stream; returns the sink and final counters.
    pub fn finish(self) -> Result<(S, EmitStats)> {
        let stats = self.core.stats();
        let sink = self.buffer.into_sink()?;
        log::info!("Single-end emitter: {}", stats);
        Ok((sink, stats))
    }

    /// Flush and terminate the stream; returns the final counters.
    pub fn close(self) -> Result<EmitStats> {
        self.finish().map(|(_, stats)| stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::{AlignmentRecord, OrderingPolicy};
    use crate::error::EmitError;
    use crate::pipelines::emission::blocker::BestScoreBlocker;
    use crate::pipelines::emission::emit_opt::MaxMismatches;
    use crate::pipelines::emission::sequences::InMemorySequences;
    use crate::pipelines::emission::template::END_OF_TEMPLATES;
    use crate::pipelines::emission::test_support::{FailingAligner, HammingAligner};

    const TEMPLATE: &[u8] = b"GGGGGGGGGGACGTTGCAACGTGGGGGGGGGGTTTTTTTTTTACGTTGCAACGTTTTTTTTTTT";

    fn opt() -> EmitOpt {
        EmitOpt {
            max_unmated_mismatches: MaxMismatches::Absolute(6),
            max_read_length: 12,
            max_shift: 2,
            ..EmitOpt::default()
        }
    }

    fn store() -> InMemorySequences {
        let mut store = InMemorySequences::new();
        store.add_template(TEMPLATE);
        store.add_read(b"ACGTTGCAACGT"); // exact at 10 and 42
        store.add_read(b"CATGGTCAACGT"); // 6 mismatches at 10
        store.add_read(b"TTTTTTTTTTTT"); // many mismatches at 10
        store
    }

    #[test]
    fn test_accept_and_block_worse() {
        let store = store();
        let clip = ClipRegion::unrestricted();
        let blocker = BestScoreBlocker::new(4, 1);
        let mut emitter =
            SingleEndEmitter::new(opt(), HammingAligner::new(1), &store, &clip, &blocker, Vec::new())
                .unwrap();
        emitter.advance(0).unwrap();
        assert_eq!(emitter.submit(0, false, 10).unwrap(), Admission::Accepted);
        // Same read, equal score elsewhere: blocked at threshold 1
        assert_eq!(
            emitter.submit(0, false, 42).unwrap(),
            Admission::Rejected(Rejection::Blocked)
        );
        emitter.advance(END_OF_TEMPLATES).unwrap();
        let (records, stats) = emitter.finish().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].start_position, 11);
        assert_eq!(records[0].cigar, b"12=");
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.rejected_blocked, 1);
        assert_eq!(blocker.best(0), Some((0, 1)));
    }

    #[test]
    fn test_score_at_ceiling_accepted_above_rejected() {
        let store = store();
        let clip = ClipRegion::unrestricted();
        let blocker = BestScoreBlocker::new(4, 1);
        let mut emitter =
            SingleEndEmitter::new(opt(), HammingAligner::new(1), &store, &clip, &blocker, Vec::new())
                .unwrap();
        emitter.advance(0).unwrap();
        assert_eq!(emitter.submit(1, false, 10).unwrap(), Admission::Accepted);
        assert_eq!(
            emitter.submit(2, false, 10).unwrap(),
            Admission::Rejected(Rejection::ScoreAboveCeiling)
        );
        assert_eq!(blocker.best(2), None);
        let (records, _) = emitter.finish().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].mismatches, 6);
    }

    #[test]
    fn test_penalty_scales_ceiling() {
        // 4 mismatches x penalty 2 = 8 > ceiling 3 x 2 = 6
        let mut store = InMemorySequences::new();
        store.add_template(TEMPLATE);
        store.add_read(b"ACGTTGCATGCA");
        let opt = EmitOpt {
            substitution_penalty: 2,
            max_unmated_mismatches: MaxMismatches::Absolute(3),
            ..opt()
        };
        let clip = ClipRegion::unrestricted();
        let blocker = BestScoreBlocker::new(4, 1);
        let mut emitter =
            SingleEndEmitter::new(opt, HammingAligner::new(2), &store, &clip, &blocker, Vec::new())
                .unwrap();
        emitter.advance(0).unwrap();
        assert_eq!(
            emitter.submit(0, false, 10).unwrap(),
            Admission::Rejected(Rejection::ScoreAboveCeiling)
        );
        assert!(emitter.finish().unwrap().0.is_empty());
    }

    #[test]
    fn test_duplicate_does_not_touch_blocker() {
        let store = store();
        let clip = ClipRegion::unrestricted();
        let blocker = BestScoreBlocker::new(4, 10);
        let tracker = TopHitsTracker::new(3);
        let mut emitter =
            SingleEndEmitter::new(opt(), HammingAligner::new(1), &store, &clip, &blocker, Vec::new())
                .unwrap()
                .with_top_hits(&tracker);
        emitter.advance(0).unwrap();
        assert_eq!(emitter.submit(0, false, 10).unwrap(), Admission::Accepted);
        // Proposed one base off, shifted back onto the same placement
        assert_eq!(emitter.submit(0, false, 11).unwrap(), Admission::Duplicate);
        assert_eq!(blocker.best(0), Some((0, 1)));
        assert_eq!(tracker.hits(0).len(), 1);
    }

    #[test]
    fn test_late_record_dropped_under_lenient_policy() {
        let mut store = InMemorySequences::new();
        store.add_template(&[b'A'; 400]);
        for _ in 0..3 {
            store.add_read(&[b'A'; 10]);
        }
        // Buffer distance 2 * 10 + 2 = 22
        let opt = EmitOpt {
            max_read_length: 10,
            ordering_policy: OrderingPolicy::Lenient,
            ..opt()
        };
        let clip = ClipRegion::unrestricted();
        let blocker = BestScoreBlocker::new(4, 1);
        let tracker = TopHitsTracker::new(2);
        let mut emitter =
            SingleEndEmitter::new(opt, HammingAligner::new(1), &store, &clip, &blocker, Vec::new())
                .unwrap()
                .with_top_hits(&tracker);
        emitter.advance(0).unwrap();
        assert_eq!(emitter.submit(0, false, 100).unwrap(), Admission::Accepted);
        // Far ahead: the first record is written
        assert_eq!(emitter.submit(1, false, 300).unwrap(), Admission::Accepted);
        assert_eq!(
            emitter.submit(2, false, 50).unwrap(),
            Admission::Rejected(Rejection::OutOfOrder)
        );
        assert_eq!(blocker.best(2), None);
        assert!(tracker.hits(2).is_empty());

        let (records, stats) = emitter.finish().unwrap();
        assert_eq!(stats.dropped_out_of_order, 1);
        assert_eq!(stats.accepted, 2);
        assert_eq!(
            records.iter().map(|r| r.read_id).collect::<Vec<_>>(),
            vec![0, 1]
        );
    }

    #[test]
    fn test_clip_uses_final_start() {
        let store = store();
        let clip = ClipRegion::empty().with_range(0, 11, 64);
        let blocker = BestScoreBlocker::new(4, 10);
        let mut emitter =
            SingleEndEmitter::new(opt(), HammingAligner::new(1), &store, &clip, &blocker, Vec::new())
                .unwrap();
        emitter.advance(0).unwrap();
        // Proposed inside the region, shifted to 10 which is outside
        assert_eq!(
            emitter.submit(0, false, 11).unwrap(),
            Admission::Rejected(Rejection::OutsideClipRegion)
        );
        assert_eq!(emitter.submit(0, false, 43).unwrap(), Admission::Accepted);
        let (records, _) = emitter.finish().unwrap();
        assert_eq!(
            records.iter().map(|r| r.start_position).collect::<Vec<_>>(),
            vec![43]
        );
    }

    #[test]
    fn test_reverse_strand() {
        let mut store = InMemorySequences::new();
        store.add_template(TEMPLATE);
        // Aligned as GGGGGGGGGGGG: two mismatches at the start of the template
        store.add_read(b"CCCCCCCCCCCC");
        let clip = ClipRegion::unrestricted();
        let blocker = BestScoreBlocker::new(4, 10);
        let mut emitter =
            SingleEndEmitter::new(opt(), HammingAligner::new(1), &store, &clip, &blocker, Vec::new())
                .unwrap();
        emitter.advance(0).unwrap();
        assert_eq!(emitter.submit(0, true, 0).unwrap(), Admission::Accepted);
        let (records, _) = emitter.finish().unwrap();
        assert!(records[0].is_reverse());
        assert_eq!(records[0].start_position, 1);
        assert_eq!(records[0].score, 2);
        assert_eq!(records[0].cigar, b"10=2X");
    }

    #[test]
    fn test_protocol_errors() {
        let store = store();
        let clip = ClipRegion::unrestricted();
        let blocker = BestScoreBlocker::new(4, 1);
        let mut emitter =
            SingleEndEmitter::new(opt(), HammingAligner::new(1), &store, &clip, &blocker, Vec::new())
                .unwrap();
        assert!(matches!(emitter.submit(0, false, 10), Err(EmitError::Protocol(_))));
        emitter.advance(0).unwrap();
        assert!(matches!(emitter.advance(0), Err(EmitError::Protocol(_))));
        assert!(matches!(
            emitter.submit(9, false, 10),
            Err(EmitError::SequenceNotFound { kind: "Read", id: 9 })
        ));
    }

    #[test]
    fn test_aligner_error_propagates() {
        let store = store();
        let clip = ClipRegion::unrestricted();
        let blocker = BestScoreBlocker::new(4, 1);
        let mut emitter =
            SingleEndEmitter::new(opt(), FailingAligner, &store, &clip, &blocker, Vec::new())
                .unwrap();
        emitter.advance(0).unwrap();
        assert!(matches!(
            emitter.submit(0, false, 10),
            Err(EmitError::Aligner { read_id: 0, .. })
        ));
    }

    #[test]
    fn test_records_sorted_across_templates() {
        let mut store = store();
        store.add_template(TEMPLATE);
        let clip = ClipRegion::unrestricted();
        let blocker = BestScoreBlocker::new(4, 10);
        let mut emitter =
            SingleEndEmitter::new(opt(), HammingAligner::new(1), &store, &clip, &blocker, Vec::new())
                .unwrap();
        emitter.advance(0).unwrap();
        emitter.submit(0, false, 42).unwrap();
        emitter.submit(0, false, 10).unwrap();
        emitter.advance(1).unwrap();
        emitter.submit(1, false, 10).unwrap();
        let records: Vec<AlignmentRecord> = emitter.finish().unwrap().0;
        let keys: Vec<(i32, i32)> = records
            .iter()
            .map(|r| (r.reference_id, r.start_position))
            .collect();
        assert_eq!(keys, vec![(0, 11), (0, 43), (1, 11)]);
    }
}
