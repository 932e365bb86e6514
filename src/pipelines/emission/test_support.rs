//! Deterministic aligners for the emitter tests, unit and integration.

use std::cell::Cell;
use std::rc::Rc;

use crate::core::alignment::actions::{Actions, MATCH, MISMATCH, UNALIGNED_SCORE};
use crate::core::alignment::aligner::{Aligner, AlignerError};
use crate::core::compute::encoding::reverse_complement_into;

/// Ungapped aligner: tries every start within `max_shift` of the proposed
/// one (nearest first) and keeps the placement with the fewest mismatches.
pub struct HammingAligner {
    penalty: i32,
    oriented: Vec<u8>,
}

impl HammingAligner {
    pub fn new(penalty: i32) -> Self {
        Self {
            penalty,
            oriented: Vec::new(),
        }
    }
}

impl Default for HammingAligner {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Aligner for HammingAligner {
    fn align(
        &mut self,
        read: &[u8],
        template: &[u8],
        start: i32,
        reverse: bool,
        max_score: i32,
        max_shift: i32,
        _first_arm: bool,
        out: &mut Actions,
    ) -> Result<(), AlignerError> {
        if reverse {
            reverse_complement_into(read, &mut self.oriented);
        } else {
            self.oriented.clear();
            self.oriented.extend_from_slice(read);
        }
        let read = &self.oriented;

        let mut best: Option<(i32, i32)> = None;
        for step in 0..=2 * max_shift {
            let delta = if step % 2 == 0 { -(step / 2) } else { step / 2 + 1 };
            let pos = start + delta;
            if pos < 0 || pos as usize + read.len() > template.len() {
                continue;
            }
            let window = &template[pos as usize..pos as usize + read.len()];
            let mismatches = read.iter().zip(window).filter(|(a, b)| a != b).count() as i32;
            if best.map_or(true, |(m, _)| mismatches < m) {
                best = Some((mismatches, pos));
            }
        }

        out.clear();
        out.set_start(start);
        let Some((mismatches, pos)) = best else {
            out.set_score(UNALIGNED_SCORE);
            return Ok(());
        };
        let score = mismatches * self.penalty;
        if score > max_score {
            out.set_score(UNALIGNED_SCORE);
            return Ok(());
        }
        let window = &template[pos as usize..pos as usize + read.len()];
        for (a, b) in read.iter().zip(window) {
            out.push(if a == b { MATCH } else { MISMATCH });
        }
        out.set_start(pos);
        out.set_score(score);
        Ok(())
    }
}

/// Counts calls reaching the wrapped aligner.
pub struct CountingAligner<A> {
    inner: A,
    calls: Rc<Cell<u32>>,
}

impl<A: Aligner> CountingAligner<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            calls: Rc::new(Cell::new(0)),
        }
    }

    pub fn calls(&self) -> Rc<Cell<u32>> {
        Rc::clone(&self.calls)
    }
}

impl<A: Aligner> Aligner for CountingAligner<A> {
    fn align(
        &mut self,
        read: &[u8],
        template: &[u8],
        start: i32,
        reverse: bool,
        max_score: i32,
        max_shift: i32,
        first_arm: bool,
        out: &mut Actions,
    ) -> Result<(), AlignerError> {
        self.calls.set(self.calls.get() + 1);
        self.inner
            .align(read, template, start, reverse, max_score, max_shift, first_arm, out)
    }
}

/// Reports fixed scores per arm at the proposed start.
pub struct FixedScoreAligner {
    pub first_arm_score: i32,
    pub second_arm_score: i32,
}

impl Aligner for FixedScoreAligner {
    fn align(
        &mut self,
        read: &[u8],
        _template: &[u8],
        start: i32,
        _reverse: bool,
        _max_score: i32,
        _max_shift: i32,
        first_arm: bool,
        out: &mut Actions,
    ) -> Result<(), AlignerError> {
        out.clear();
        out.push_run(MATCH, read.len());
        out.set_start(start);
        out.set_score(if first_arm {
            self.first_arm_score
        } else {
            self.second_arm_score
        });
        Ok(())
    }
}

/// Always fails.
pub struct FailingAligner;

impl Aligner for FailingAligner {
    fn align(
        &mut self,
        _read: &[u8],
        _template: &[u8],
        _start: i32,
        _reverse: bool,
        _max_score: i32,
        _max_shift: i32,
        _first_arm: bool,
        _out: &mut Actions,
    ) -> Result<(), AlignerError> {
        Err(AlignerError::new("band overflow"))
    }
}
