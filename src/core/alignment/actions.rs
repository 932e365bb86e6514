//! Alignment action strings.
//!
//! An aligner reports an alignment as one action per alignment column
//! together with the alignment score and the (possibly shifted) template
//! start. Records carry the run-length rendering of the actions
//! (e.g. `"50=1X49="`).
//!
//! ## Operations
//!
//! | op  | read | template | meaning                                   |
//! |-----|------|----------|-------------------------------------------|
//! | `=` | 1    | 1        | match                                     |
//! | `X` | 1    | 1        | mismatch                                  |
//! | `I` | 1    | 0        | insertion into the reference              |
//! | `D` | 0    | 1        | deletion from the reference               |
//! | `N` | 0    | 1        | CG gap (skipped template)                 |
//! | `B` | 0    | -1       | CG overlap (read backs up on the template)|
//! | `S` | 1    | 0        | soft clip                                 |

pub const MATCH: u8 = b'=';
pub const MISMATCH: u8 = b'X';
pub const INSERTION: u8 = b'I';
pub const DELETION: u8 = b'D';
pub const CG_GAP: u8 = b'N';
pub const CG_OVERLAP: u8 = b'B';
pub const SOFT_CLIP: u8 = b'S';

/// Score value an aligner may report when it gave up above `max_score`.
pub const UNALIGNED_SCORE: i32 = i32::MAX;

#[inline]
fn consumes_read(op: u8) -> bool {
    matches!(op, MATCH | MISMATCH | INSERTION | SOFT_CLIP)
}

#[inline]
fn consumes_template(op: u8) -> bool {
    matches!(op, MATCH | MISMATCH | DELETION | CG_GAP)
}

/// One alignment as produced by an [`Aligner`](super::aligner::Aligner).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Actions {
    score: i32,
    start: i32,
    ops: Vec<u8>,
}

impl Actions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty action string able to hold `capacity` columns.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            score: 0,
            start: 0,
            ops: Vec::with_capacity(capacity),
        }
    }

    /// Reset for reuse (keeps capacity)
    pub fn clear(&mut self) {
        self.score = 0;
        self.start = 0;
        self.ops.clear();
    }

    #[inline]
    pub fn score(&self) -> i32 {
        self.score
    }

    #[inline]
    pub fn set_score(&mut self, score: i32) {
        self.score = score;
    }

    /// 0-based template start, in the coordinates of the template slice the
    /// aligner was given.
    #[inline]
    pub fn start(&self) -> i32 {
        self.start
    }

    #[inline]
    pub fn set_start(&mut self, start: i32) {
        self.start = start;
    }

    #[inline]
    pub fn push(&mut self, op: u8) {
        self.ops.push(op);
    }

    pub fn push_run(&mut self, op: u8, len: usize) {
        self.ops.extend(std::iter::repeat(op).take(len));
    }

    #[inline]
    pub fn ops(&self) -> &[u8] {
        &self.ops
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.ops.capacity()
    }

    /// Copy another action string into this one without reallocating when
    /// the capacity suffices.
    pub fn copy_from(&mut self, other: &Actions) {
        self.score = other.score;
        self.start = other.start;
        self.ops.clear();
        self.ops.extend_from_slice(&other.ops);
    }

    /// Run-length view of the operations as `(op, len)` pairs.
    pub fn runs(&self) -> Runs<'_> {
        Runs { ops: &self.ops, pos: 0 }
    }

    /// Number of template bases spanned by the alignment.
    pub fn reference_length(&self) -> i32 {
        self.ops.iter().fold(0i32, |acc, &op| {
            if consumes_template(op) {
                acc + 1
            } else if op == CG_OVERLAP {
                acc - 1
            } else {
                acc
            }
        })
    }

    /// Number of read bases consumed by the alignment.
    pub fn read_length(&self) -> usize {
        self.ops.iter().filter(|&&op| consumes_read(op)).count()
    }

    /// Append the run-length rendering of all operations to `out`.
    pub fn write_cigar(&self, out: &mut Vec<u8>) {
        write_runs(self.runs(), out);
    }

    /// Render the alignment with CG overlaps removed.
    ///
    /// Each `B` run of length k is dropped together with the next k
    /// template-consuming operations, so the flattened CIGAR walks the
    /// template monotonically. Read bases of the skipped `=`/`X` columns are
    /// appended to `delta` (taken from `read`, which must be in aligned
    /// orientation).
    pub fn write_flattened(&self, read: &[u8], cigar: &mut Vec<u8>, delta: &mut Vec<u8>) {
        let mut flat: Vec<u8> = Vec::with_capacity(self.ops.len());
        let mut read_pos = 0usize;
        let mut skip = 0usize;
        for &op in &self.ops {
            if op == CG_OVERLAP {
                skip += 1;
                continue;
            }
            if skip > 0 && consumes_template(op) {
                skip -= 1;
                if consumes_read(op) {
                    if let Some(&base) = read.get(read_pos) {
                        delta.push(base);
                    }
                    read_pos += 1;
                }
                continue;
            }
            if consumes_read(op) {
                read_pos += 1;
            }
            flat.push(op);
        }
        write_runs(Runs { ops: &flat, pos: 0 }, cigar);
    }
}

fn write_runs(runs: Runs<'_>, out: &mut Vec<u8>) {
    for (op, len) in runs {
        out.extend_from_slice(len.to_string().as_bytes());
        out.push(op);
    }
}

/// Iterator over `(op, run length)` pairs of an action string.
pub struct Runs<'a> {
    ops: &'a [u8],
    pos: usize,
}

impl Iterator for Runs<'_> {
    type Item = (u8, u32);

    fn next(&mut self) -> Option<Self::Item> {
        let op = *self.ops.get(self.pos)?;
        let start = self.pos;
        while self.pos < self.ops.len() && self.ops[self.pos] == op {
            self.pos += 1;
        }
        Some((op, (self.pos - start) as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actions_from(ops: &[u8]) -> Actions {
        let mut actions = Actions::new();
        for &op in ops {
            actions.push(op);
        }
        actions
    }

    #[test]
    fn test_runs_and_cigar() {
        let actions = actions_from(b"=====X==II===D==");
        let runs: Vec<(u8, u32)> = actions.runs().collect();
        assert_eq!(
            runs,
            vec![(b'=', 5), (b'X', 1), (b'=', 2), (b'I', 2), (b'=', 3), (b'D', 1), (b'=', 2)]
        );

        let mut cigar = Vec::new();
        actions.write_cigar(&mut cigar);
        assert_eq!(cigar, b"5=1X2=2I3=1D2=");
    }

    #[test]
    fn test_cigar_multi_digit_runs() {
        let mut actions = Actions::default();
        actions.push_run(MATCH, 150);
        actions.push(MISMATCH);
        actions.push_run(MATCH, 1000);
        let mut cigar = Vec::new();
        actions.write_cigar(&mut cigar);
        assert_eq!(cigar, b"150=1X1000=");
    }

    #[test]
    fn test_reference_and_read_length() {
        let actions = actions_from(b"SS===X=IID==");
        // template: 3= + X + = + D + 2= = 8
        assert_eq!(actions.reference_length(), 8);
        // read: 2S + 3= + X + = + 2I + 2= = 11
        assert_eq!(actions.read_length(), 11);
    }

    #[test]
    fn test_overlap_reduces_reference_length() {
        let actions = actions_from(b"=====BB=======");
        assert_eq!(actions.reference_length(), 5 - 2 + 7);
    }

    #[test]
    fn test_flattened_moves_overlap_bases_to_delta() {
        let actions = actions_from(b"===BB=X==");
        let read = b"ACGTACGT";
        let mut cigar = Vec::new();
        let mut delta = Vec::new();
        actions.write_flattened(read, &mut cigar, &mut delta);
        // The two columns after the overlap (= and X, read bases T and A) are dropped
        assert_eq!(cigar, b"5=");
        assert_eq!(delta, b"TA");
    }

    #[test]
    fn test_flattened_without_overlap_matches_cigar() {
        let actions = actions_from(b"==X=ID=");
        let mut plain = Vec::new();
        actions.write_cigar(&mut plain);
        let mut flat = Vec::new();
        let mut delta = Vec::new();
        actions.write_flattened(b"ACGTAC", &mut flat, &mut delta);
        assert_eq!(plain, flat);
        assert!(delta.is_empty());
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut actions = Actions::with_capacity(128);
        actions.push_run(MATCH, 100);
        actions.set_score(3);
        actions.set_start(17);
        let capacity = actions.capacity();
        actions.clear();
        assert_eq!(actions.ops().len(), 0);
        assert_eq!(actions.score(), 0);
        assert_eq!(actions.start(), 0);
        assert_eq!(actions.capacity(), capacity);
    }

    #[test]
    fn test_copy_from() {
        let mut source = actions_from(b"===X");
        source.set_score(1);
        source.set_start(42);
        let mut target = Actions::with_capacity(8);
        target.copy_from(&source);
        assert_eq!(target, source);
    }
}
