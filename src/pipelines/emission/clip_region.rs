//! The part of the genome a worker reports results for.
//!
//! Workers split the templates into disjoint regions. Each worker loads its
//! templates clipped to its region plus padding, so alignments overlapping
//! the boundary can still be computed, but only hits whose final start lies
//! inside the region are emitted.

use std::collections::HashMap;

/// Half-open ranges `[start, end)` of 0-based template positions.
#[derive(Debug, Clone, Default)]
pub struct ClipRegion {
    ranges: Option<HashMap<u32, (i32, i32)>>,
}

impl ClipRegion {
    /// Every position of every template
    pub fn unrestricted() -> Self {
        Self { ranges: None }
    }

    /// No template at all; add ranges with [`with_range`](Self::with_range).
    pub fn empty() -> Self {
        Self {
            ranges: Some(HashMap::new()),
        }
    }

    /// Restrict `template_id` to `[start, end)`.
    pub fn with_range(mut self, template_id: u32, start: i32, end: i32) -> Self {
        self.ranges
            .get_or_insert_with(HashMap::new)
            .insert(template_id, (start, end.max(start)));
        self
    }

    pub fn is_unrestricted(&self) -> bool {
        self.ranges.is_none()
    }

    /// True if the template has any part in the region
    pub fn contains_template(&self, template_id: u32) -> bool {
        match &self.ranges {
            None => true,
            Some(ranges) => ranges.contains_key(&template_id),
        }
    }

    /// True if 0-based `position` of the template is inside the region
    pub fn is_in_range(&self, template_id: u32, position: i32) -> bool {
        match &self.ranges {
            None => true,
            Some(ranges) => ranges
                .get(&template_id)
                .is_some_and(|&(start, end)| position >= start && position < end),
        }
    }

    /// Region start on the template (`None` if the template is outside)
    pub fn start(&self, template_id: u32) -> Option<i32> {
        match &self.ranges {
            None => Some(0),
            Some(ranges) => ranges.get(&template_id).map(|&(start, _)| start),
        }
    }

    /// Region end on the template (`None` if the template is outside or the
    /// region runs to the template end)
    pub fn end(&self, template_id: u32) -> Option<i32> {
        self.ranges
            .as_ref()
            .and_then(|ranges| ranges.get(&template_id).map(|&(_, end)| end))
    }

    /// Bounds of the template slice to load: the region widened by `padding`
    /// on both sides, clamped to the template. `None` if the template is
    /// outside the region.
    pub fn padded_bounds(
        &self,
        template_id: u32,
        padding: i32,
        template_len: usize,
    ) -> Option<(usize, usize)> {
        let (start, end) = match &self.ranges {
            None => return Some((0, template_len)),
            Some(ranges) => *ranges.get(&template_id)?,
        };
        let lo = (start as i64 - padding as i64).clamp(0, template_len as i64) as usize;
        let hi = (end as i64 + padding as i64).clamp(lo as i64, template_len as i64) as usize;
        Some((lo, hi))
    }
}
