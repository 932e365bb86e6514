// Shared fixtures for the integration tests.
#![allow(dead_code)]

use ferrous_emit::{AlignmentRecord, record_flags};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

#[allow(unused_imports)]
pub use ferrous_emit::pipelines::emission::test_support::{FixedScoreAligner, HammingAligner};

/// Seeded random ASCII bases
pub fn random_bases(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|_| *b"ACGT".choose(&mut rng).unwrap_or(&b'A'))
        .collect()
}

/// A minimal single-end record
pub fn record(reference_id: i32, start_position: i32, read_id: u32, reverse: bool, score: i32) -> AlignmentRecord {
    AlignmentRecord {
        reference_id,
        start_position,
        read_id,
        flags: if reverse { record_flags::REVERSE } else { 0 },
        score,
        cigar: b"20=".to_vec(),
        ..AlignmentRecord::default()
    }
}
