//! Batched editing with correspondence-consistent initial latents.
//!
//! [`CorrespondenceEditor`] turns a [`LatentDenoiser`] into a
//! [`DiffusionEditor`]. For a batched edit it tracks a point grid through
//! the original frames at latent resolution, splits the frames into groups
//! that overlap by one frame, draws Gaussian latents that agree along every
//! trajectory, and lets the denoiser run from there.

use ndarray::{Array3, Array4, Array5, Axis, s};
use rand::SeedableRng;
use rand::rngs::StdRng;
use retouch_data::ImageTensor;
use retouch_match::{PointTracker, init_latents, match_trajectories};
use tracing::debug;

use crate::collab::{DiffusionEditor, EditParams, LatentDenoiser};
use crate::config::{ConfigError, CorrespondenceConfig};
use crate::error::EditError;

/// Split `frames` into groups of `group_size` that share their boundary frame.
///
/// The last group is padded by repeating the final frame so every group has
/// the same length. A `group_size` of 0 (or one covering the whole batch)
/// yields a single group.
pub fn group_frames(frames: usize, group_size: usize) -> Vec<Vec<usize>> {
    if frames == 0 {
        return Vec::new();
    }
    if group_size < 2 || group_size >= frames {
        return vec![(0..frames).collect()];
    }
    let mut groups = Vec::new();
    let mut start = 0;
    loop {
        groups.push(
            (start..start + group_size)
                .map(|f| f.min(frames - 1))
                .collect(),
        );
        if start + group_size >= frames {
            break;
        }
        start += group_size - 1;
    }
    groups
}

fn stack_sequence(
    images: &[ImageTensor],
    height: usize,
    width: usize,
) -> Result<Array5<f32>, EditError> {
    let channels = images.first().map_or(0, ImageTensor::channels);
    let mut stacked = Array5::<f32>::zeros((1, images.len(), channels, height, width));
    for (t, image) in images.iter().enumerate() {
        let chw = image.resized(height, width)?.to_chw();
        stacked.slice_mut(s![0, t, .., .., ..]).assign(&chw);
    }
    Ok(stacked)
}

/// Take each frame's latent from the first group that contains it.
fn assemble_frames(stack: &Array5<f32>, groups: &[Vec<usize>], frames: usize) -> Array4<f32> {
    let (_, _, c, h, w) = stack.dim();
    let mut latents = Array4::<f32>::zeros((frames, c, h, w));
    let mut filled = vec![false; frames];
    for (k, group) in groups.iter().enumerate() {
        for (j, &frame) in group.iter().enumerate() {
            if !filled[frame] {
                latents
                    .index_axis_mut(Axis(0), frame)
                    .assign(&stack.slice(s![k, j, .., .., ..]));
                filled[frame] = true;
            }
        }
    }
    latents
}

/// A batched diffusion editor built from a latent denoiser and a point tracker.
pub struct CorrespondenceEditor<D, T> {
    denoiser: D,
    tracker: T,
    config: CorrespondenceConfig,
    rng: StdRng,
}

impl<D, T> CorrespondenceEditor<D, T>
where
    D: LatentDenoiser,
    T: PointTracker,
{
    pub fn new(
        denoiser: D,
        tracker: T,
        config: CorrespondenceConfig,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            denoiser,
            tracker,
            config,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn denoiser(&self) -> &D {
        &self.denoiser
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    /// Correspondence-consistent `(t, c, h, w)` initial latents for `original`.
    pub fn initial_latents(&mut self, original: &[ImageTensor]) -> Result<Array4<f32>, EditError> {
        let Some(first) = original.first() else {
            return Ok(Array4::zeros((0, self.denoiser.latent_channels(), 0, 0)));
        };
        let (height, width) = first.resolution();
        let frames = stack_sequence(original, height, width)?;

        let scale = self.config.latent_downscale;
        let (lh, lw) = (height / scale, width / scale);
        let options = self.config.match_options(lh, lw);
        let matched = match_trajectories(&mut self.tracker, frames.view(), &options)?;

        let t = original.len();
        let groups = group_frames(t, self.config.group_size);
        let group_len = groups[0].len();
        let points = matched.flat_indices.len_of(Axis(2));
        let grouped = Array3::from_shape_fn((groups.len(), group_len, points), |(k, j, p)| {
            matched.flat_indices[[0, groups[k][j], p]]
        });

        let channels = self.denoiser.latent_channels();
        let stack = init_latents(
            [group_len, channels, lh, lw],
            grouped.view(),
            true,
            &mut self.rng,
        )?;
        debug!(
            frames = t,
            groups = groups.len(),
            latent = ?(channels, lh, lw),
            "Initialized correspondence latents"
        );
        Ok(assemble_frames(&stack, &groups, t))
    }
}

impl<D, T> DiffusionEditor for CorrespondenceEditor<D, T>
where
    D: LatentDenoiser,
    T: PointTracker,
{
    type Embedding = D::Embedding;

    fn encode_prompt(&mut self, prompt: &str) -> Result<Self::Embedding, EditError> {
        self.denoiser.encode_prompt(prompt)
    }

    fn edit_image(
        &mut self,
        embedding: &Self::Embedding,
        rendered: &ImageTensor,
        original: &ImageTensor,
        params: &EditParams,
    ) -> Result<ImageTensor, EditError> {
        self.denoiser.edit_image(embedding, rendered, original, params)
    }

    fn edit_image_by_correspondence_batch(
        &mut self,
        embedding: &Self::Embedding,
        rendered: &[ImageTensor],
        original: &[ImageTensor],
        params: &EditParams,
    ) -> Result<Vec<ImageTensor>, EditError> {
        if rendered.len() != original.len() {
            return Err(EditError::EditCount {
                expected: original.len(),
                actual: rendered.len(),
            });
        }
        if rendered.is_empty() {
            return Ok(Vec::new());
        }
        let latents = self.initial_latents(original)?;
        let edited = self
            .denoiser
            .denoise_batch(embedding, latents, rendered, original, params)?;
        if edited.len() != rendered.len() {
            return Err(EditError::EditCount {
                expected: rendered.len(),
                actual: edited.len(),
            });
        }
        Ok(edited)
    }
}
