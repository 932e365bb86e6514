//! Per-template working state of an emitter.

use super::clip_region::ClipRegion;
use super::sequences::SequenceStore;
use crate::error::{EmitError, Result};

/// Terminal value for [`TemplateState::advance`]: no more templates.
pub const END_OF_TEMPLATES: u32 = u32::MAX;

/// The template currently being processed, clipped to the worker's region.
///
/// `bases[i]` is absolute template position `offset + i`.
#[derive(Debug, Default)]
pub struct TemplateState {
    id: Option<u32>,
    bases: Vec<u8>,
    offset: i32,
    in_region: bool,
    finished: bool,
}

impl TemplateState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to `template_id`, which must be greater than the current id.
    ///
    /// Loads the template bases widened by `padding` around the clip
    /// region. [`END_OF_TEMPLATES`] ends processing.
    pub fn advance(
        &mut self,
        template_id: u32,
        store: &dyn SequenceStore,
        clip: &ClipRegion,
        padding: i32,
    ) -> Result<()> {
        if self.finished {
            return Err(EmitError::Protocol(format!(
                "advance to template {template_id} after end of templates"
            )));
        }
        if let Some(current) = self.id {
            if template_id <= current {
                return Err(EmitError::Protocol(format!(
                    "template ids must increase: {template_id} after {current}"
                )));
            }
        }

        self.bases.clear();
        self.offset = 0;
        self.in_region = false;
        self.id = Some(template_id);
        if template_id == END_OF_TEMPLATES {
            self.finished = true;
            return Ok(());
        }

        let full = store.template(template_id).ok_or(EmitError::SequenceNotFound {
            kind: "Template",
            id: template_id as usize,
        })?;
        if let Some((lo, hi)) = clip.padded_bounds(template_id, padding, full.len()) {
            self.bases.extend_from_slice(&full[lo..hi]);
            self.offset = lo as i32;
            self.in_region = true;
        }
        log::debug!(
            "Template {}: loaded {} of {} bases at offset {}{}",
            template_id,
            self.bases.len(),
            full.len(),
            self.offset,
            if self.in_region { "" } else { " (outside region)" }
        );
        Ok(())
    }

    /// Current template id; a protocol error before the first advance or
    /// after the last.
    pub fn current(&self) -> Result<u32> {
        match self.id {
            Some(id) if !self.finished => Ok(id),
            Some(_) => Err(EmitError::Protocol(
                "no current template after end of templates".to_string(),
            )),
            None => Err(EmitError::Protocol(
                "no current template; call advance() first".to_string(),
            )),
        }
    }

    #[inline]
    pub fn bases(&self) -> &[u8] {
        &self.bases
    }

    /// Absolute position of `bases()[0]`
    #[inline]
    pub fn offset(&self) -> i32 {
        self.offset
    }

    /// False if the current template has no part in the worker's region
    #[inline]
    pub fn in_region(&self) -> bool {
        self.in_region
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
