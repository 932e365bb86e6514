//! Read and template retrieval.
//!
//! Sequences are handed out as 2-bit codes (see
//! [`encoding`](crate::core::compute::encoding)). A read id names a
//! fragment; `first_arm` selects the first or second mate of a pair.
//! Single-end reads only have a first arm.

use crate::core::compute::encoding::encode_sequence;

/// Random-access sequence source shared by all workers.
pub trait SequenceStore: Send + Sync {
    fn read(&self, read_id: u32, first_arm: bool) -> Option<&[u8]>;

    fn template(&self, template_id: u32) -> Option<&[u8]>;

    fn read_count(&self) -> usize;

    fn template_count(&self) -> usize;
}

/// Sequences held in memory, encoded on insertion.
#[derive(Debug, Default)]
pub struct InMemorySequences {
    reads: Vec<(Vec<u8>, Option<Vec<u8>>)>,
    templates: Vec<Vec<u8>>,
}

impl InMemorySequences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single-end read (ASCII bases). Returns its read id.
    pub fn add_read(&mut self, bases: &[u8]) -> u32 {
        self.reads.push((encode_sequence(bases), None));
        (self.reads.len() - 1) as u32
    }

    /// Add a mate pair (ASCII bases). Returns the read id of the pair.
    pub fn add_pair(&mut self, first: &[u8], second: &[u8]) -> u32 {
        self.reads
            .push((encode_sequence(first), Some(encode_sequence(second))));
        (self.reads.len() - 1) as u32
    }

    /// Add a template (ASCII bases). Returns its template id.
    pub fn add_template(&mut self, bases: &[u8]) -> u32 {
        self.templates.push(encode_sequence(bases));
        (self.templates.len() - 1) as u32
    }
}

impl SequenceStore for InMemorySequences {
    fn read(&self, read_id: u32, first_arm: bool) -> Option<&[u8]> {
        let (first, second) = self.reads.get(read_id as usize)?;
        if first_arm {
            Some(first)
        } else {
            second.as_deref()
        }
    }

    fn template(&self, template_id: u32) -> Option<&[u8]> {
        self.templates.get(template_id as usize).map(Vec::as_slice)
    }

    fn read_count(&self) -> usize {
        self.reads.len()
    }

    fn template_count(&self) -> usize {
        self.templates.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_and_pairs() {
        let mut store = InMemorySequences::new();
        let single = store.add_read(b"ACGT");
        let pair = store.add_pair(b"AAAA", b"TTTT");
        assert_eq!(store.read(single, true), Some(&[0u8, 1, 2, 3][..]));
        assert_eq!(store.read(single, false), None);
        assert_eq!(store.read(pair, false), Some(&[3u8, 3, 3, 3][..]));
        assert_eq!(store.read(9, true), None);
        assert_eq!(store.read_count(), 2);
    }

    #[test]
    fn test_templates() {
        let mut store = InMemorySequences::new();
        let id = store.add_template(b"ACGTN");
        assert_eq!(store.template(id), Some(&[0u8, 1, 2, 3, 4][..]));
        assert_eq!(store.template(id + 1), None);
        assert_eq!(store.template_count(), 1);
    }
}
