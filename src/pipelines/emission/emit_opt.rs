// Emission options
//
// Thresholds and stream layout shared by the three emitter modes.

use crate::core::io::{OrderingPolicy, StreamFlags};

/// Maximum number of mismatches allowed for a read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaxMismatches {
    /// Fixed count regardless of read length
    Absolute(u32),
    /// Percentage of the read length, rounded down
    Percentage(f64),
}

impl MaxMismatches {
    /// Mismatches allowed for a read of `read_length` bases
    pub fn for_read_length(&self, read_length: usize) -> u32 {
        match *self {
            MaxMismatches::Absolute(n) => n,
            MaxMismatches::Percentage(p) => {
                let allowed = (read_length as f64 * p / 100.0).floor();
                if allowed <= 0.0 {
                    0
                } else if allowed >= u32::MAX as f64 {
                    u32::MAX
                } else {
                    allowed as u32
                }
            }
        }
    }

    /// Parse `"N"` (absolute) or `"P%"` (percentage of read length).
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if let Some(percent) = s.strip_suffix('%') {
            let p = percent
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("Invalid mismatch percentage: {}", s))?;
            if !(0.0..=100.0).contains(&p) {
                return Err(format!("Mismatch percentage must be in [0, 100]: {}", s));
            }
            Ok(MaxMismatches::Percentage(p))
        } else {
            s.parse::<u32>()
                .map(MaxMismatches::Absolute)
                .map_err(|_| format!("Invalid mismatch count: {}", s))
        }
    }
}

impl Default for MaxMismatches {
    fn default() -> Self {
        MaxMismatches::Percentage(10.0)
    }
}

/// Emission options
#[derive(Debug, Clone)]
pub struct EmitOpt {
    pub substitution_penalty: i32, // Score of one mismatch
    pub max_mated_mismatches: MaxMismatches, // Per-mate limit for mated pairs
    pub max_unmated_mismatches: MaxMismatches, // Limit for single-end and unmated hits
    pub max_shift: i32,            // Largest start shift the aligner may apply
    pub max_read_length: usize,    // Longest read in the input

    // Stream layout
    pub legacy_md: bool,   // Write MD strings
    pub platform_cg: bool, // Write CG read, super-CIGAR and read delta

    pub ordering_policy: OrderingPolicy,
    pub max_hits_per_read: u32, // Per-arm output cap in unfiltered mode
    pub top_n: usize,           // Best hits kept per read by the top-hits tracker (0 = off)
}

impl Default for EmitOpt {
    fn default() -> Self {
        EmitOpt {
            substitution_penalty: 1,
            max_mated_mismatches: MaxMismatches::default(),
            max_unmated_mismatches: MaxMismatches::default(),
            max_shift: 7,
            max_read_length: 300,
            legacy_md: false,
            platform_cg: false,
            ordering_policy: OrderingPolicy::default(),
            max_hits_per_read: 5,
            top_n: 0,
        }
    }
}

impl EmitOpt {
    /// Reordering buffer distance: two read lengths plus the aligner shift
    pub fn buffer_distance(&self) -> i32 {
        let span = (2 * self.max_read_length as i64 + self.max_shift as i64).min(i32::MAX as i64);
        span as i32
    }

    /// Padding added on both sides when clipping a template to a region
    pub fn clip_padding(&self) -> i32 {
        let pad = (self.max_read_length as i64 + self.max_shift as i64).min(i32::MAX as i64);
        pad as i32
    }

    fn ceiling(&self, limit: MaxMismatches, read_length: usize) -> i32 {
        let score =
            limit.for_read_length(read_length) as i64 * self.substitution_penalty.max(0) as i64;
        score.min(i32::MAX as i64) as i32
    }

    /// Highest admissible score for one mate of a mated pair
    pub fn mated_ceiling(&self, read_length: usize) -> i32 {
        self.ceiling(self.max_mated_mismatches, read_length)
    }

    /// Highest admissible score for a single-end or unmated hit
    pub fn unmated_ceiling(&self, read_length: usize) -> i32 {
        self.ceiling(self.max_unmated_mismatches, read_length)
    }

    /// Layout of an output stream of this run
    pub fn stream_flags(&self, paired: bool, unfiltered: bool) -> StreamFlags {
        StreamFlags {
            paired,
            legacy_md: self.legacy_md,
            platform_cg: self.platform_cg,
            unfiltered,
        }
    }

    /// Check option consistency. Returns every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.substitution_penalty < 1 {
            errors.push(format!(
                "substitution_penalty must be >= 1, got {}",
                self.substitution_penalty
            ));
        }
        if self.max_shift < 0 {
            errors.push(format!("max_shift must be >= 0, got {}", self.max_shift));
        }
        if self.max_read_length < 1 {
            errors.push("max_read_length must be >= 1".to_string());
        }
        if self.max_hits_per_read < 1 {
            errors.push("max_hits_per_read must be >= 1".to_string());
        }
        for (name, limit) in [
            ("max_mated_mismatches", self.max_mated_mismatches),
            ("max_unmated_mismatches", self.max_unmated_mismatches),
        ] {
            if let MaxMismatches::Percentage(p) = limit {
                if !(0.0..=100.0).contains(&p) {
                    errors.push(format!("{} must be in [0, 100]%, got {}", name, p));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
