//! Per-hit alignment and record construction shared by all emitter modes.

use super::clip_region::ClipRegion;
use super::emit_opt::EmitOpt;
use super::sequences::SequenceStore;
use super::stats::EmitStats;
use super::template::TemplateState;
use crate::core::alignment::actions::Actions;
use crate::core::alignment::aligner::Aligner;
use crate::core::alignment::edit_distance::{compute_mismatches_and_md, count_mismatches};
use crate::core::alignment::workspace::{AlignKey, AlignmentWorkspace, Side};
use crate::core::compute::encoding::{decode_into, reverse_complement_into};
use crate::core::io::AlignmentRecord;
use crate::error::{EmitError, Result};

/// State every emitter owns: options, aligner, template and caches.
pub struct EmitterCore<'a, A: Aligner> {
    opt: EmitOpt,
    aligner: A,
    store: &'a dyn SequenceStore,
    clip: &'a ClipRegion,
    template: TemplateState,
    workspace: AlignmentWorkspace,
    pub(crate) stats: EmitStats,
}

impl<'a, A: Aligner> EmitterCore<'a, A> {
    pub fn new(
        opt: EmitOpt,
        aligner: A,
        store: &'a dyn SequenceStore,
        clip: &'a ClipRegion,
    ) -> Result<Self> {
        opt.validate().map_err(|errors| {
            EmitError::Protocol(format!("invalid emission options: {}", errors.join("; ")))
        })?;
        Ok(Self {
            opt,
            aligner,
            store,
            clip,
            template: TemplateState::new(),
            workspace: AlignmentWorkspace::new(),
            stats: EmitStats::default(),
        })
    }

    pub fn opt(&self) -> &EmitOpt {
        &self.opt
    }

    /// Load the next template and drop cached alignments.
    pub fn advance(&mut self, template_id: u32) -> Result<()> {
        self.template
            .advance(template_id, self.store, self.clip, self.opt.clip_padding())?;
        self.workspace.invalidate();
        if !self.template.is_finished() {
            self.stats.templates += 1;
        }
        Ok(())
    }

    /// Current template id (protocol error outside advance calls)
    pub fn template_id(&self) -> Result<u32> {
        self.template.current()
    }

    pub fn template_in_region(&self) -> bool {
        self.template.in_region()
    }

    pub fn read(&self, read_id: u32, first_arm: bool) -> Result<&'a [u8]> {
        let store: &'a dyn SequenceStore = self.store;
        store
            .read(read_id, first_arm)
            .ok_or(EmitError::SequenceNotFound {
                kind: "Read",
                id: read_id as usize,
            })
    }

    /// Align a candidate on one side, reusing that side's cached result when
    /// the request is unchanged. `start` is 0-based absolute. Returns the
    /// alignment score.
    pub fn align(
        &mut self,
        side: Side,
        read_id: u32,
        first_arm: bool,
        reverse: bool,
        start: i32,
        max_score: i32,
    ) -> Result<i32> {
        self.template.current()?;
        let key = AlignKey {
            read_id,
            first_arm,
            reverse,
            start,
            max_score,
        };
        let read = self.read(read_id, first_arm)?;
        let Self {
            aligner,
            template,
            workspace,
            opt,
            ..
        } = self;

        let cache = workspace.side_mut(side);
        if cache.lookup(&key) {
            return Ok(cache.actions.score());
        }
        cache.prepare(read.len());
        cache.read.extend_from_slice(read);
        aligner
            .align(
                &cache.read,
                template.bases(),
                start - template.offset(),
                reverse,
                max_score,
                opt.max_shift,
                first_arm,
                &mut cache.actions,
            )
            .map_err(|source| EmitError::Aligner { read_id, source })?;
        cache.store(key);
        Ok(cache.actions.score())
    }

    /// Result of the last alignment on `side`
    pub fn actions(&self, side: Side) -> &Actions {
        &self.workspace.side(side).actions
    }

    /// Final 0-based absolute start of an alignment on the current template
    pub fn final_start(&self, actions: &Actions) -> i32 {
        actions.start() + self.template.offset()
    }

    /// Clip check on the final (shifted) start
    pub fn in_clip(&self, actions: &Actions) -> Result<bool> {
        let template_id = self.template.current()?;
        Ok(self.clip.is_in_range(template_id, self.final_start(actions)))
    }

    /// Build the record for an alignment on the current template.
    ///
    /// Paired fields are left for the caller.
    pub fn build_record(
        &self,
        actions: &Actions,
        read_id: u32,
        first_arm: bool,
        reverse: bool,
        flags: u8,
    ) -> Result<AlignmentRecord> {
        let template_id = self.template.current()?;
        let reference_id = i32::try_from(template_id)
            .map_err(|_| EmitError::Format(format!("template id {template_id} exceeds i32 range")))?;
        let mut record = AlignmentRecord {
            reference_id,
            start_position: self.final_start(actions) + 1,
            read_id,
            flags,
            score: actions.score(),
            ..AlignmentRecord::default()
        };

        if self.opt.legacy_md {
            let local = usize::try_from(actions.start()).unwrap_or(0);
            let template = self.template.bases().get(local..).unwrap_or(&[]);
            record.mismatches = compute_mismatches_and_md(template, actions, &mut record.md);
        } else {
            record.mismatches = count_mismatches(actions);
        }

        if self.opt.platform_cg {
            let read = self.read(read_id, first_arm)?;
            let mut oriented = Vec::with_capacity(read.len());
            if reverse {
                reverse_complement_into(read, &mut oriented);
            } else {
                oriented.extend_from_slice(read);
            }
            decode_into(&oriented, &mut record.read);
            actions.write_cigar(&mut record.super_cigar);
            let mut delta = Vec::new();
            actions.write_flattened(&oriented, &mut record.cigar, &mut delta);
            decode_into(&delta, &mut record.read_delta);
        } else {
            actions.write_cigar(&mut record.cigar);
        }
        Ok(record)
    }

    /// Counters including the alignment cache totals
    pub fn stats(&self) -> EmitStats {
        let (hits, misses) = self.workspace.counts();
        EmitStats {
            cache_hits: hits,
            cache_misses: misses,
            ..self.stats.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipelines::emission::sequences::InMemorySequences;
    use crate::pipelines::emission::test_support::{CountingAligner, HammingAligner};

    fn store() -> InMemorySequences {
        let mut store = InMemorySequences::new();
        store.add_template(b"TTTTTACGTACGTACGTTTTTGGGGGGGGGG");
        store.add_read(b"ACGTACGTACGT");
        store.add_read(b"ACGTACCTACGT");
        store
    }

    #[test]
    fn test_align_before_advance_is_protocol_error() {
        let store = store();
        let clip = ClipRegion::unrestricted();
        let mut core =
            EmitterCore::new(EmitOpt::default(), HammingAligner::new(1), &store, &clip).unwrap();
        assert!(matches!(
            core.align(Side::Left, 0, true, false, 5, 10),
            Err(EmitError::Protocol(_))
        ));
    }

    #[test]
    fn test_repeat_request_served_from_cache() {
        let store = store();
        let clip = ClipRegion::unrestricted();
        let aligner = CountingAligner::new(HammingAligner::new(1));
        let calls = aligner.calls();
        let mut core = EmitterCore::new(EmitOpt::default(), aligner, &store, &clip).unwrap();
        core.advance(0).unwrap();
        assert_eq!(core.align(Side::Left, 1, true, false, 5, 10).unwrap(), 1);
        assert_eq!(core.align(Side::Left, 1, true, false, 5, 10).unwrap(), 1);
        assert_eq!(calls.get(), 1);
        // Different ceiling is a different request
        core.align(Side::Left, 1, true, false, 5, 4).unwrap();
        assert_eq!(calls.get(), 2);
        let stats = core.stats();
        assert_eq!((stats.cache_hits, stats.cache_misses), (1, 2));
    }

    #[test]
    fn test_shifted_start_is_reported() {
        let store = store();
        let clip = ClipRegion::unrestricted();
        let mut core =
            EmitterCore::new(EmitOpt::default(), HammingAligner::new(1), &store, &clip).unwrap();
        core.advance(0).unwrap();
        // Proposed 3, true placement 5
        assert_eq!(core.align(Side::Left, 0, true, false, 3, 10).unwrap(), 0);
        let actions = core.actions(Side::Left).clone();
        assert_eq!(core.final_start(&actions), 5);
        let record = core.build_record(&actions, 0, true, false, 0).unwrap();
        assert_eq!(record.start_position, 6);
        assert_eq!(record.cigar, b"12=");
        assert_eq!(record.mismatches, 0);
    }

    #[test]
    fn test_record_with_md_and_cg() {
        let store = store();
        let clip = ClipRegion::unrestricted();
        let opt = EmitOpt {
            legacy_md: true,
            platform_cg: true,
            ..EmitOpt::default()
        };
        let mut core = EmitterCore::new(opt, HammingAligner::new(1), &store, &clip).unwrap();
        core.advance(0).unwrap();
        core.align(Side::Left, 1, true, false, 5, 10).unwrap();
        let actions = core.actions(Side::Left).clone();
        let record = core.build_record(&actions, 1, true, false, 0).unwrap();
        assert_eq!(record.md, b"6G5");
        assert_eq!(record.mismatches, 1);
        assert_eq!(record.read, b"ACGTACCTACGT");
        assert_eq!(record.super_cigar, b"6=1X5=");
        assert_eq!(record.cigar, record.super_cigar);
        assert!(record.read_delta.is_empty());
    }

    #[test]
    fn test_clip_region_offsets() {
        let store = store();
        let clip = ClipRegion::empty().with_range(0, 6, 20);
        let opt = EmitOpt {
            max_read_length: 2,
            max_shift: 1,
            ..EmitOpt::default()
        };
        let mut core = EmitterCore::new(opt, HammingAligner::new(1), &store, &clip).unwrap();
        core.advance(0).unwrap();
        // Loaded [3, 23); read 0 truly starts at absolute 5, outside the region
        assert_eq!(core.align(Side::Left, 0, true, false, 5, 10).unwrap(), 0);
        let actions = core.actions(Side::Left).clone();
        assert_eq!(actions.start(), 2);
        assert_eq!(core.final_start(&actions), 5);
        assert!(!core.in_clip(&actions).unwrap());
    }

    #[test]
    fn test_invalid_options_rejected() {
        let store = store();
        let clip = ClipRegion::unrestricted();
        let opt = EmitOpt {
            substitution_penalty: 0,
            ..EmitOpt::default()
        };
        assert!(matches!(
            EmitterCore::new(opt, HammingAligner::new(1), &store, &clip),
            Err(EmitError::Protocol(_))
        ));
    }
}
