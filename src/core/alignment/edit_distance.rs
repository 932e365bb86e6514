//! Mismatch count (NM) and MD string computation from alignment actions.
//!
//! Both values are derived from the same walk over the actions so that a
//! record's mismatch count always agrees with its MD string.

use super::actions::{Actions, CG_GAP, CG_OVERLAP, DELETION, INSERTION, MATCH, MISMATCH};
use crate::core::compute::encoding::code_to_base;

/// Count mismatches, inserted and deleted bases in an alignment.
///
/// CG gaps and overlaps are platform artefacts and are not counted.
#[inline]
pub fn count_mismatches(actions: &Actions) -> i32 {
    actions
        .ops()
        .iter()
        .filter(|&&op| matches!(op, MISMATCH | INSERTION | DELETION))
        .count() as i32
}

/// Compute the mismatch count and MD string of an alignment.
///
/// Columns are classified by their action, so only template bases are
/// needed for the MD letters. Outside CG overlaps the count equals
/// [`count_mismatches`].
///
/// # Arguments
/// * `template` - Template bases (2-bit codes) starting at the alignment start
/// * `actions` - Alignment actions
/// * `md` - Output buffer; the MD string is appended
///
/// # MD Format
/// - Numbers: count of matching bases
/// - Letters: mismatching template base
/// - ^LETTERS: deleted template bases
/// - Consecutive mismatches are separated by 0: "A0T" not "AT"
///
/// Columns re-covered after a CG overlap are skipped, matching the
/// flattened CIGAR produced by [`Actions::write_flattened`].
///
/// # Example
/// ```ignore
/// // 5 matches, 1 mismatch (template G), 4 matches
/// let nm = compute_mismatches_and_md(&template, &actions, &mut md);
/// assert_eq!((nm, md.as_slice()), (1, b"5G4".as_slice()));
/// ```
pub fn compute_mismatches_and_md(template: &[u8], actions: &Actions, md: &mut Vec<u8>) -> i32 {
    let mut nm: i32 = 0;
    let mut match_count: u32 = 0;
    let mut ti = 0usize; // Template index
    let mut skip = 0usize;
    let mut in_deletion = false;

    for &op in actions.ops() {
        if skip > 0 && matches!(op, MATCH | MISMATCH | DELETION | CG_GAP) {
            // Column re-covered after an overlap; the template index already moved past it
            skip -= 1;
            continue;
        }
        match op {
            MATCH | MISMATCH => {
                let template_base = template.get(ti).copied().unwrap_or(4);
                if op == MATCH {
                    match_count += 1;
                } else {
                    nm += 1;
                    // emit match count (even if 0), then mismatch base
                    push_number(md, match_count);
                    match_count = 0;
                    md.push(code_to_base(template_base));
                }
                ti += 1;
            }
            INSERTION => {
                nm += 1;
            }
            DELETION => {
                nm += 1;
                // Emit accumulated matches (even if 0) before a new deletion block
                if !in_deletion {
                    push_number(md, match_count);
                    match_count = 0;
                    md.push(b'^');
                }
                md.push(code_to_base(template.get(ti).copied().unwrap_or(4)));
                ti += 1;
            }
            CG_GAP => {
                ti += 1;
            }
            CG_OVERLAP => {
                skip += 1;
            }
            _ => {}
        }
        in_deletion = op == DELETION;
    }

    push_number(md, match_count);

    nm
}

/// Helper to push a number to the MD string
#[inline(always)]
fn push_number(md: &mut Vec<u8>, n: u32) {
    // Fast path for common small numbers
    if n < 10 {
        md.push(b'0' + n as u8);
    } else if n < 100 {
        md.push(b'0' + (n / 10) as u8);
        md.push(b'0' + (n % 10) as u8);
    } else {
        md.extend_from_slice(n.to_string().as_bytes());
    }
}
