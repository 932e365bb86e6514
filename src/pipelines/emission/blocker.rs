//! Per-read admission control shared by all emitter workers.
//!
//! A blocker is queried before a hit is emitted and incremented after the
//! hit was actually written. Both operations may be called concurrently from
//! any number of workers; every implementation here is lock-free, with one
//! atomic word per key updated by compare-and-swap.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use super::emit_opt::EmitOpt;

/// Admission-control collaborator keyed by read (or read arm) id.
///
/// Implementations must be safe for concurrent `is_blocked_at_or_below`
/// and `increment` calls on the same key.
pub trait Blocker: Send + Sync {
    /// True if a hit of `key` with `score` must not be emitted.
    fn is_blocked_at_or_below(&self, key: u32, score: i32) -> bool;

    /// Record an emitted hit. Returns the updated count for the key.
    fn increment(&self, key: u32, score: i32) -> u32;
}

#[inline]
fn pack(score: u32, count: u32) -> u64 {
    ((score as u64) << 32) | count as u64
}

#[inline]
fn unpack(word: u64) -> (u32, u32) {
    ((word >> 32) as u32, word as u32)
}

/// Tracks the best (lowest) score emitted per key and how many hits were
/// emitted at that score.
///
/// A key is blocked for `score` once `threshold` hits were emitted at a
/// best score no worse than `score`. A better score resets the count.
/// Keys at or beyond the capacity are never blocked and not tracked.
pub struct BestScoreBlocker {
    slots: Vec<AtomicU64>,
    threshold: u32,
}

impl BestScoreBlocker {
    pub fn new(capacity: usize, threshold: u32) -> Self {
        Self {
            slots: (0..capacity).map(|_| AtomicU64::new(0)).collect(),
            threshold: threshold.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// `(best score, hits at best score)`, or `None` if nothing was recorded
    pub fn best(&self, key: u32) -> Option<(i32, u32)> {
        let slot = self.slots.get(key as usize)?;
        let (score, count) = unpack(slot.load(Ordering::Acquire));
        (count > 0).then_some((score as i32, count))
    }
}

impl Blocker for BestScoreBlocker {
    fn is_blocked_at_or_below(&self, key: u32, score: i32) -> bool {
        match self.best(key) {
            Some((best, count)) => count >= self.threshold && score >= best,
            None => false,
        }
    }

    fn increment(&self, key: u32, score: i32) -> u32 {
        let Some(slot) = self.slots.get(key as usize) else {
            log::debug!("Blocker key {} beyond capacity {}", key, self.slots.len());
            return 0;
        };
        let score = score.max(0) as u32;
        let mut current = slot.load(Ordering::Acquire);
        loop {
            let (best, count) = unpack(current);
            let next = if count == 0 || score < best {
                pack(score, 1)
            } else if score == best {
                pack(best, count.saturating_add(1))
            } else {
                return count;
            };
            match slot.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return unpack(next).1,
                Err(actual) => current = actual,
            }
        }
    }
}

/// Caps the number of hits emitted per key, regardless of score.
///
/// [`try_acquire`](Self::try_acquire) is an atomic check-then-increment;
/// a slot taken for a hit that was then not written is returned with
/// [`release`](Self::release).
pub struct ReadFrequencyBlocker {
    counts: Vec<AtomicU32>,
    limit: u32,
}

impl ReadFrequencyBlocker {
    pub fn new(capacity: usize, limit: u32) -> Self {
        Self {
            counts: (0..capacity).map(|_| AtomicU32::new(0)).collect(),
            limit,
        }
    }

    /// Cap of `opt.max_hits_per_read` for `capacity` keys
    pub fn for_opt(capacity: usize, opt: &EmitOpt) -> Self {
        Self::new(capacity, opt.max_hits_per_read)
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn count(&self, key: u32) -> u32 {
        self.counts
            .get(key as usize)
            .map_or(0, |c| c.load(Ordering::Acquire))
    }

    /// Take one slot for `key`. Returns false if the cap is reached.
    pub fn try_acquire(&self, key: u32) -> bool {
        let Some(counter) = self.counts.get(key as usize) else {
            return true;
        };
        let limit = self.limit;
        counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| {
                (c < limit).then_some(c + 1)
            })
            .is_ok()
    }

    /// Return a slot taken by [`try_acquire`](Self::try_acquire).
    pub fn release(&self, key: u32) {
        if let Some(counter) = self.counts.get(key as usize) {
            let _ = counter.fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| {
                c.checked_sub(1)
            });
        }
    }
}

impl Blocker for ReadFrequencyBlocker {
    fn is_blocked_at_or_below(&self, key: u32, _score: i32) -> bool {
        self.count(key) >= self.limit
    }

    fn increment(&self, key: u32, _score: i32) -> u32 {
        self.counts
            .get(key as usize)
            .map_or(0, |c| c.fetch_add(1, Ordering::AcqRel).saturating_add(1))
    }
}
