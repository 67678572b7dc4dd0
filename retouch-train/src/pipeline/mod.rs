//! The edit pipeline driven once per training step.

pub mod controls;
pub mod fast;
pub mod inject;
pub mod slow;

pub use controls::OperatorControl;

use retouch_data::{DatasetCursor, ImageTensor};
use tracing::{debug, info};

use crate::collab::{DataManager, DiffusionEditor, LossDict, MetricsDict, SceneModel};
use crate::config::{ConfigError, EditConfig};
use crate::error::EditError;
use crate::schedule::{EditAction, EditRates, EditScheduler, StepDecision};

/// What one call to [`EditPipeline::step`] produced.
#[derive(Debug, Clone)]
pub struct StepOutput<O> {
    pub model_outputs: O,
    pub losses: LossDict,
    pub metrics: MetricsDict,
    pub decision: StepDecision,
}

/// Running totals of edit activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditStats {
    pub steps: u64,
    pub single_edits: u64,
    pub batched_edits: u64,
    pub images_edited: u64,
}

/// Interleaves diffusion edits with scene-model training.
pub struct EditPipeline<M, D, E>
where
    E: DiffusionEditor,
{
    config: EditConfig,
    model: M,
    data: D,
    editor: E,
    embedding: E::Embedding,
    cursor: DatasetCursor,
    scheduler: EditScheduler,
    stats: EditStats,
}

impl<M, D, E> EditPipeline<M, D, E>
where
    M: SceneModel<Rays = D::Rays, Batch = D::Batch>,
    D: DataManager,
    E: DiffusionEditor,
{
    /// Validate `config`, encode the prompt, and set up the dataset cursor.
    pub fn new(config: EditConfig, model: M, data: D, mut editor: E) -> Result<Self, EditError> {
        config.validate()?;
        let embedding = editor.encode_prompt(&config.prompt)?;
        let cursor = DatasetCursor::for_pool(data.dataset_len(), data.sample_pool_size())?;
        let slots = data.training_batch().len();
        if data.original_batch().len() != slots {
            return Err(ConfigError::SlotMismatch {
                training: slots,
                original: data.original_batch().len(),
            }
            .into());
        }
        if cursor.len() > slots {
            return Err(ConfigError::CursorRange {
                range: cursor.len(),
                slots,
            }
            .into());
        }
        let scheduler = EditScheduler::new(EditRates::from(&config));
        info!(
            prompt = %config.prompt,
            slots,
            cursor_range = cursor.len(),
            device = config.editor_device_override.as_deref().unwrap_or("shared"),
            precision = ?config.editor_precision_mode,
            "Edit pipeline ready"
        );
        Ok(Self {
            config,
            model,
            data,
            editor,
            embedding,
            cursor,
            scheduler,
            stats: EditStats::default(),
        })
    }

    /// Run one training step and any edit it triggers.
    ///
    /// Losses and metrics come from the batch sampled before the edit; edited
    /// pixels only affect later steps.
    pub fn step(&mut self, step: u64) -> Result<StepOutput<M::Outputs>, EditError> {
        let (rays, batch) = self.data.next_train(step)?;
        let model_outputs = self.model.forward(&rays)?;
        let metrics = self.model.metrics(&model_outputs, &batch)?;

        let decision = self
            .scheduler
            .on_step(step, self.data.training_batch().updated())?;
        self.data.set_only_sample_updated(decision.only_sample_updated);

        match decision.action {
            EditAction::Single => self.edit_single_images()?,
            EditAction::Batched => self.edit_by_correspondence()?,
            EditAction::None => {}
        }

        let losses = self.model.losses(&model_outputs, &batch, &metrics)?;
        self.stats.steps += 1;

        Ok(StepOutput {
            model_outputs,
            losses,
            metrics,
            decision,
        })
    }

    /// Render the current view of `slot`, applying the learned pose correction.
    ///
    /// The camera and correction are dropped before returning.
    fn render_slot(&mut self, slot: usize) -> Result<ImageTensor, EditError> {
        let image_idx = self.data.training_batch().image_idx(slot)?;
        let correction = self.model.camera_correction(image_idx)?;
        let camera = self.data.camera(image_idx)?.with_correction(&correction);
        let rendered = self.model.render_camera(&camera)?;
        debug!(slot, image_idx, resolution = ?rendered.resolution(), "Rendered view for edit");
        Ok(rendered)
    }

    pub fn config(&self) -> &EditConfig {
        &self.config
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn data(&self) -> &D {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut D {
        &mut self.data
    }

    pub fn editor(&self) -> &E {
        &self.editor
    }

    pub fn embedding(&self) -> &E::Embedding {
        &self.embedding
    }

    pub fn cursor(&self) -> &DatasetCursor {
        &self.cursor
    }

    pub fn scheduler(&self) -> &EditScheduler {
        &self.scheduler
    }

    pub fn stats(&self) -> EditStats {
        self.stats
    }

    pub fn into_parts(self) -> (M, D, E) {
        (self.model, self.data, self.editor)
    }
}
