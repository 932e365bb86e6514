//! # Sequence Encoding
//!
//! Reads and templates are held as classic 2-bit codes:
//! A=0, C=1, G=2, T=3, N=4 (3 bits per base, stored in a u8).
//!
//! The emission stage only needs a handful of helpers on top of that:
//! converting ASCII to codes, complementing codes, reverse-complementing a
//! read into a reusable buffer, and rendering codes back to ASCII for the
//! platform-specific record fields and the `view` command.

// ============================================================================
// CLASSIC ENCODING HELPERS
// ============================================================================

/// Convert ASCII base to 2-bit code (Classic encoding).
///
/// - A/a → 0
/// - C/c → 1
/// - G/g → 2
/// - T/t → 3
/// - N/n/other → 4
#[inline]
pub fn classic_base_to_code(base: u8) -> u8 {
    match base {
        b'A' | b'a' => 0,
        b'C' | b'c' => 1,
        b'G' | b'g' => 2,
        b'T' | b't' => 3,
        _ => 4, // N or unknown
    }
}

/// Convert 2-bit code to ASCII base.
#[inline(always)]
pub const fn code_to_base(code: u8) -> u8 {
    match code {
        0 => b'A',
        1 => b'C',
        2 => b'G',
        3 => b'T',
        _ => b'N',
    }
}

/// Get complement of 2-bit code (A↔T, C↔G).
#[inline]
pub fn classic_complement_code(code: u8) -> u8 {
    match code {
        0 => 3, // A → T
        1 => 2, // C → G
        2 => 1, // G → C
        3 => 0, // T → A
        _ => 4, // N → N
    }
}

/// Encode an ASCII sequence into 2-bit codes.
pub fn encode_sequence(seq: &[u8]) -> Vec<u8> {
    seq.iter().map(|&b| classic_base_to_code(b)).collect()
}

/// Write the reverse complement of `codes` into `out`, reusing its capacity.
pub fn reverse_complement_into(codes: &[u8], out: &mut Vec<u8>) {
    out.clear();
    out.extend(codes.iter().rev().map(|&c| classic_complement_code(c)));
}

/// Append the ASCII rendering of `codes` to `out`.
pub fn decode_into(codes: &[u8], out: &mut Vec<u8>) {
    out.extend(codes.iter().map(|&c| code_to_base(c)));
}

// ============================================================================
// UNIT TESTS
// ============================================================================
