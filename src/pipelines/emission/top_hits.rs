//! Optional record of the best hits emitted per read.

use std::collections::HashMap;
use std::sync::Mutex;

use super::emit_opt::EmitOpt;

/// One emitted single-end hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopHit {
    pub template_id: u32,
    /// 1-based absolute start
    pub position: i32,
    pub reverse: bool,
    pub score: i32,
}

/// Keeps the `n` lowest-scoring hits per read, shared by all workers.
pub struct TopHitsTracker {
    n: usize,
    hits: Mutex<HashMap<u32, Vec<TopHit>>>,
}

impl TopHitsTracker {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Tracker of `opt.top_n` hits per read, or `None` when tracking is off
    pub fn from_opt(opt: &EmitOpt) -> Option<Self> {
        (opt.top_n > 0).then(|| Self::new(opt.top_n))
    }

    pub fn capacity_per_read(&self) -> usize {
        self.n
    }

    /// Offer an emitted hit. Returns true if it is among the best `n`.
    pub fn offer(&self, read_id: u32, hit: TopHit) -> bool {
        if self.n == 0 {
            return false;
        }
        let mut hits = match self.hits.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let best = hits.entry(read_id).or_default();
        // Keep ascending by score; equal scores stay in arrival order
        let at = best.partition_point(|h| h.score <= hit.score);
        if at >= self.n {
            return false;
        }
        best.insert(at, hit);
        best.truncate(self.n);
        true
    }

    /// Best hits of a read, lowest score first
    pub fn hits(&self, read_id: u32) -> Vec<TopHit> {
        let hits = match self.hits.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        hits.get(&read_id).cloned().unwrap_or_default()
    }

    /// Number of reads with at least one hit
    pub fn reads(&self) -> usize {
        match self.hits.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}
