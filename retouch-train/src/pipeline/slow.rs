//! Single-image edits.

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
    /// Edit `slow_edit_count` slots one at a time, advancing the cursor per slot.
    pub fn edit_single_images(&mut self) -> Result<(), EditError> {
        let params = self.config.slow_params();
        for _ in 0..self.config.slow_edit_count {
            let slot = self.cursor.advance();
            {
                let original = self.data.original_batch().image(slot)?.clone();
                let rendered = self.render_slot(slot)?;
                let edited =
                    self.editor
                        .edit_image(&self.embedding, &rendered, &original, &params)?;
                inject::inject_slot(
                    self.data.training_batch_mut(),
                    slot,
                    edited,
                    rendered.resolution(),
                )?;
            }
            self.model.release_cached_memory();
            self.stats.images_edited += 1;
            info!(slot, "Edited image");
        }
        self.stats.single_edits += 1;
        Ok(())
    }
}
