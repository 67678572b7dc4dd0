//! Live-tunable edit settings.

use tracing::info;

use crate::collab::{DataManager, DiffusionEditor, SceneModel};
use crate::config::check_guidance;
use crate::error::EditError;
use crate::pipeline::EditPipeline;

/// An operator change applied between steps.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorControl {
    Prompt(String),
    GuidanceScale(f32),
    ImageGuidanceScale(f32),
}

impl<M, D, E> EditPipeline<M, D, E>
where
    M: SceneModel<Rays = D::Rays, Batch = D::Batch>,
    D: DataManager,
    E: DiffusionEditor,
{
    pub fn apply_control(&mut self, control: OperatorControl) -> Result<(), EditError> {
        match control {
            OperatorControl::Prompt(prompt) => self.set_prompt(prompt),
            OperatorControl::GuidanceScale(value) => self.set_guidance_scale(value),
            OperatorControl::ImageGuidanceScale(value) => self.set_image_guidance_scale(value),
        }
    }

    /// Change the prompt and re-encode the text embedding immediately.
    ///
    /// If encoding fails the previous prompt and embedding stay in place.
    pub fn set_prompt(&mut self, prompt: impl Into<String>) -> Result<(), EditError> {
        let prompt = prompt.into();
        self.embedding = self.editor.encode_prompt(&prompt)?;
        info!(prompt = %prompt, "Prompt updated");
        self.config.prompt = prompt;
        Ok(())
    }

    pub fn set_guidance_scale(&mut self, value: f32) -> Result<(), EditError> {
        check_guidance("guidance_scale", value)?;
        self.config.guidance_scale = value;
        info!(value, "Text guidance scale updated");
        Ok(())
    }

    pub fn set_image_guidance_scale(&mut self, value: f32) -> Result<(), EditError> {
        check_guidance("image_guidance_scale", value)?;
        self.config.image_guidance_scale = value;
        info!(value, "Image guidance scale updated");
        Ok(())
    }
}
