//! Diffusion editor interfaces.

use ndarray::Array4;
use retouch_data::ImageTensor;
use serde::{Deserialize, Serialize};

use crate::error::EditError;

/// Scalar parameters passed to every edit call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EditParams {
    pub guidance_scale: f32,
    pub image_guidance_scale: f32,
    pub diffusion_steps: usize,
    pub lower_bound: f32,
    pub upper_bound: f32,
}

/// A prompt-conditioned image editor.
pub trait DiffusionEditor {
    /// Cached text conditioning
    type Embedding;

    fn encode_prompt(&mut self, prompt: &str) -> Result<Self::Embedding, EditError>;

    /// Edit one rendered view, conditioned on its original image.
    fn edit_image(
        &mut self,
        embedding: &Self::Embedding,
        rendered: &ImageTensor,
        original: &ImageTensor,
        params: &EditParams,
    ) -> Result<ImageTensor, EditError>;

    /// Edit a batch of views jointly, keeping corresponding pixels consistent.
    ///
    /// Returns one image per input, in input order.
    fn edit_image_by_correspondence_batch(
        &mut self,
        embedding: &Self::Embedding,
        rendered: &[ImageTensor],
        original: &[ImageTensor],
        params: &EditParams,
    ) -> Result<Vec<ImageTensor>, EditError>;
}

/// A latent diffusion model that denoises caller-provided initial latents.
///
/// Wrapped by [`CorrespondenceEditor`](crate::correspondence::CorrespondenceEditor)
/// to provide the batched edit.
pub trait LatentDenoiser {
    type Embedding;

    fn encode_prompt(&mut self, prompt: &str) -> Result<Self::Embedding, EditError>;

    /// Channels of the latent space.
    fn latent_channels(&self) -> usize;

    fn edit_image(
        &mut self,
        embedding: &Self::Embedding,
        rendered: &ImageTensor,
        original: &ImageTensor,
        params: &EditParams,
    ) -> Result<ImageTensor, EditError>;

    /// Denoise `(t, c, h, w)` initial latents into one edited image per frame.
    fn denoise_batch(
        &mut self,
        embedding: &Self::Embedding,
        latents: Array4<f32>,
        rendered: &[ImageTensor],
        original: &[ImageTensor],
        params: &EditParams,
    ) -> Result<Vec<ImageTensor>, EditError>;
}
