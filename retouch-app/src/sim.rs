//! Synthetic collaborators for running the pipeline without trained models.
//!
//! The scene is a field of diagonal stripes that slides sideways as the
//! camera moves along x, so neighbouring views differ by a known shift and
//! a constant-velocity tracker is exact up to clamping.

use std::collections::BTreeMap;

use glam::{Affine3A, Quat, Vec2, Vec3};
use ndarray::{Array3, Array4, ArrayView3, ArrayView5};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use retouch_data::{Camera, DataError, ImageTensor, OriginalImageBatch, TrainingBatch};
use retouch_match::{MatchError, PointTracker};
use retouch_train::collab::{LossDict, MetricsDict};
use retouch_train::{DataManager, EditError, EditParams, LatentDenoiser, SceneModel};

/// Pattern shift in pixels per unit of camera x.
pub const PIXELS_PER_UNIT: f32 = 4.0;
/// Camera spacing along x between consecutive dataset images.
pub const CAMERA_SPACING: f32 = 0.5;

/// Diagonal RGB stripes shifted right by `shift` pixels.
pub fn stripes(height: usize, width: usize, shift: f32) -> ImageTensor {
    ImageTensor::new(Array3::from_shape_fn((height, width, 3), |(y, x, c)| {
        let phase = (x as f32 - shift + y as f32) * 0.15 + c as f32 * 2.1;
        0.5 + 0.4 * phase.sin()
    }))
}

fn mse(a: &ImageTensor, b: &ImageTensor) -> f32 {
    if a.shape() != b.shape() {
        return f32::INFINITY;
    }
    let diff = &a.view() - &b.view();
    diff.mapv(|d| d * d).mean().unwrap_or_default()
}

/// Renders the stripe field for any camera.
#[derive(Debug, Default)]
pub struct SimModel {
    pub renders: u64,
    pub releases: u64,
}

impl SceneModel for SimModel {
    type Rays = Camera;
    type Batch = ImageTensor;
    type Outputs = ImageTensor;

    fn forward(&mut self, rays: &Camera) -> Result<ImageTensor, EditError> {
        let (h, w) = rays.resolution();
        Ok(stripes(h, w, rays.position.x * PIXELS_PER_UNIT))
    }

    fn metrics(&self, outputs: &ImageTensor, batch: &ImageTensor) -> Result<MetricsDict, EditError> {
        let mse = mse(outputs, batch);
        let psnr = -10.0 * mse.max(1e-10).log10();
        Ok(BTreeMap::from([
            ("mse".to_string(), mse),
            ("psnr".to_string(), psnr),
        ]))
    }

    fn losses(
        &self,
        _outputs: &ImageTensor,
        _batch: &ImageTensor,
        metrics: &MetricsDict,
    ) -> Result<LossDict, EditError> {
        let mse = metrics
            .get("mse")
            .copied()
            .ok_or_else(|| EditError::Model("missing mse metric".into()))?;
        Ok(BTreeMap::from([("rgb_loss".to_string(), mse)]))
    }

    fn camera_correction(&self, image_idx: usize) -> Result<Affine3A, EditError> {
        let jitter = if image_idx % 2 == 0 { 0.0 } else { 0.02 };
        Ok(Affine3A::from_translation(Vec3::new(jitter, 0.0, 0.0)))
    }

    fn render_camera(&mut self, camera: &Camera) -> Result<ImageTensor, EditError> {
        self.renders += 1;
        let (h, w) = camera.resolution();
        Ok(stripes(h, w, camera.position.x * PIXELS_PER_UNIT))
    }

    fn release_cached_memory(&mut self) {
        self.releases += 1;
    }
}

/// Owns one stripe image per camera and samples slots at random.
pub struct SimData {
    batch: TrainingBatch,
    originals: OriginalImageBatch,
    cameras: Vec<Camera>,
    pool: Option<usize>,
    only_updated: bool,
    rng: StdRng,
}

impl SimData {
    pub fn new(slots: usize, resolution: usize, seed: u64) -> Result<Self, DataError> {
        let cameras: Vec<Camera> = (0..slots)
            .map(|i| {
                Camera::new(
                    Vec3::new(i as f32 * CAMERA_SPACING, 0.0, 0.0),
                    Quat::IDENTITY,
                    resolution as f32,
                    resolution as u32,
                    resolution as u32,
                )
            })
            .collect();
        let images = cameras
            .iter()
            .map(|c| stripes(resolution, resolution, c.position.x * PIXELS_PER_UNIT))
            .collect();
        let batch = TrainingBatch::new(images, (0..slots).collect())?;
        let originals = OriginalImageBatch::snapshot(&batch);
        Ok(Self {
            batch,
            originals,
            cameras,
            pool: None,
            only_updated: false,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn with_pool(mut self, pool: Option<usize>) -> Self {
        self.pool = pool;
        self
    }

    pub fn only_updated(&self) -> bool {
        self.only_updated
    }

    fn candidates(&self) -> Vec<usize> {
        let range = self.pool.unwrap_or(self.batch.len()).min(self.batch.len());
        if self.only_updated {
            let updated: Vec<usize> = self.batch.updated_slots().filter(|&s| s < range).collect();
            if !updated.is_empty() {
                return updated;
            }
        }
        (0..range).collect()
    }
}

impl DataManager for SimData {
    type Rays = Camera;
    type Batch = ImageTensor;

    fn next_train(&mut self, _step: u64) -> Result<(Camera, ImageTensor), EditError> {
        let candidates = self.candidates();
        let slot = candidates[self.rng.random_range(0..candidates.len())];
        let camera = self.camera(self.batch.image_idx(slot)?)?;
        Ok((camera, self.batch.image(slot)?.clone()))
    }

    fn training_batch(&self) -> &TrainingBatch {
        &self.batch
    }

    fn training_batch_mut(&mut self) -> &mut TrainingBatch {
        &mut self.batch
    }

    fn original_batch(&self) -> &OriginalImageBatch {
        &self.originals
    }

    fn camera(&self, image_idx: usize) -> Result<Camera, EditError> {
        self.cameras
            .get(image_idx)
            .copied()
            .ok_or_else(|| EditError::DataManager(format!("no camera for image {image_idx}")))
    }

    fn dataset_len(&self) -> usize {
        self.cameras.len()
    }

    fn sample_pool_size(&self) -> Option<usize> {
        self.pool
    }

    fn set_only_sample_updated(&mut self, only_updated: bool) {
        self.only_updated = only_updated;
    }
}

/// Tints images toward a color derived from the prompt.
///
/// Outputs are cropped to a multiple of eight like a latent diffusion
/// decoder, so the pipeline has to resample them back.
#[derive(Debug, Default)]
pub struct SimDenoiser;

impl SimDenoiser {
    fn strength(params: &EditParams) -> f32 {
        let text = params.guidance_scale.max(0.0);
        let image = params.image_guidance_scale.max(0.0);
        (text / (text + 5.0 * image + f32::EPSILON)).clamp(0.0, 1.0) * params.upper_bound
    }

    fn tinted(rendered: &ImageTensor, tint: Vec3, params: &EditParams) -> Result<ImageTensor, EditError> {
        let (h, w) = rendered.resolution();
        let mut out = rendered.resized((h / 8 * 8).max(8), (w / 8 * 8).max(8))?;
        let s = Self::strength(params);
        for ((_, _, c), v) in out.view_mut().indexed_iter_mut() {
            *v = *v * (1.0 - s) + tint[c.min(2)] * s;
        }
        Ok(out)
    }
}

impl LatentDenoiser for SimDenoiser {
    type Embedding = Vec3;

    fn encode_prompt(&mut self, prompt: &str) -> Result<Vec3, EditError> {
        if prompt.trim().is_empty() {
            return Err(EditError::Editor("prompt is empty".into()));
        }
        let h = prompt
            .bytes()
            .fold(0x811c_9dc5u32, |h, b| (h ^ b as u32).wrapping_mul(0x0100_0193));
        let channel = |shift: u32| ((h >> shift) & 0xff) as f32 / 255.0;
        Ok(Vec3::new(channel(0), channel(8), channel(16)))
    }

    fn latent_channels(&self) -> usize {
        4
    }

    fn edit_image(
        &mut self,
        embedding: &Vec3,
        rendered: &ImageTensor,
        _original: &ImageTensor,
        params: &EditParams,
    ) -> Result<ImageTensor, EditError> {
        Self::tinted(rendered, *embedding, params)
    }

    fn denoise_batch(
        &mut self,
        embedding: &Vec3,
        latents: Array4<f32>,
        rendered: &[ImageTensor],
        _original: &[ImageTensor],
        params: &EditParams,
    ) -> Result<Vec<ImageTensor>, EditError> {
        let (_, lc, lh, lw) = latents.dim();
        rendered
            .iter()
            .enumerate()
            .map(|(f, image)| {
                let mut out = Self::tinted(image, *embedding, params)?;
                let (h, w) = out.resolution();
                for ((y, x, c), v) in out.view_mut().indexed_iter_mut() {
                    let grain = latents[[f, c % lc, y * lh / h, x * lw / w]];
                    *v = (*v + 0.03 * grain).clamp(0.0, 1.0);
                }
                Ok(out)
            })
            .collect()
    }
}

/// Moves every query point by a constant velocity per frame.
#[derive(Debug, Clone, Copy)]
pub struct ShiftTracker {
    velocity: Vec2,
}

impl ShiftTracker {
    pub fn new(velocity: Vec2) -> Self {
        Self { velocity }
    }
}

impl PointTracker for ShiftTracker {
    fn track(
        &mut self,
        query_points: ArrayView3<'_, f32>,
        frames: ArrayView5<'_, f32>,
        iterations: usize,
    ) -> Result<Vec<Array4<f32>>, MatchError> {
        let (b, n, _) = query_points.dim();
        let (fb, t, _, h, w) = frames.dim();
        if fb != b {
            return Err(MatchError::Tracker(format!(
                "{b} query sets for {fb} sequences"
            )));
        }
        let max = Vec2::new(w as f32 - 1.0, h as f32 - 1.0);
        Ok((1..=iterations)
            .map(|i| {
                let progress = i as f32 / iterations as f32;
                Array4::from_shape_fn((b, t, n, 2), |(bi, ti, p, a)| {
                    let start = Vec2::new(query_points[[bi, p, 0]], query_points[[bi, p, 1]]);
                    let moved = (start + self.velocity * ti as f32 * progress).clamp(Vec2::ZERO, max);
                    moved[a]
                })
            })
            .collect())
    }
}
