//! Batched correspondence edits.

use tracing::info;

use crate::collab::{DataManager, DiffusionEditor, SceneModel};
use crate::error::EditError;
use crate::pipeline::{EditPipeline, inject};

impl<M, D, E> EditPipeline<M, D, E>
where
    M: SceneModel<Rays = D::Rays, Batch = D::Batch>,
    D: DataManager,
    E: DiffusionEditor,
{
    /// Render `fast_edit_count` slots, edit them jointly, and write them back together.
    ///
    /// Only valid once [`step`](Self::step) has recorded the starting step.
    pub fn edit_by_correspondence(&mut self) -> Result<(), EditError> {
        let start = self.scheduler.starting_step().get()?;
        let count = self.config.fast_edit_count;

        let mut slots = Vec::with_capacity(count);
        let mut rendered = Vec::with_capacity(count);
        let mut originals = Vec::with_capacity(count);
        for _ in 0..count {
            let slot = self.cursor.advance();
            originals.push(self.data.original_batch().image(slot)?.clone());
            rendered.push(self.render_slot(slot)?);
            slots.push(slot);
            self.model.release_cached_memory();
        }

        let edited = self.editor.edit_image_by_correspondence_batch(
            &self.embedding,
            &rendered,
            &originals,
            &self.config.fast_params(),
        )?;
        if edited.len() != slots.len() {
            return Err(EditError::EditCount {
                expected: slots.len(),
                actual: edited.len(),
            });
        }

        let targets: Vec<_> = rendered.iter().map(|r| r.resolution()).collect();
        drop(rendered);
        drop(originals);
        inject::inject_slots(self.data.training_batch_mut(), &slots, edited, &targets)?;

        self.stats.batched_edits += 1;
        self.stats.images_edited += slots.len() as u64;
        info!(
            ?slots,
            starting_step = start,
            updated = self.data.training_batch().updated_count(),
            "Edited batch by correspondence"
        );
        Ok(())
    }
}
