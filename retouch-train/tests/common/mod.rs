#![allow(dead_code)]

use std::collections::BTreeMap;

use glam::{Affine3A, Quat, Vec3};
use ndarray::Array4;
use retouch_data::{Camera, ImageTensor, OriginalImageBatch, TrainingBatch};
use retouch_train::collab::{LossDict, MetricsDict};
use retouch_train::{DataManager, DiffusionEditor, EditError, EditParams, LatentDenoiser, SceneModel};

pub const ORIGINAL_VALUE: f32 = 0.25;
pub const EDITED_VALUE: f32 = 1.0;

/// Scene model that renders flat images and records which cameras it saw.
pub struct MockModel {
    pub render_res: usize,
    pub correction: Affine3A,
    pub rendered_positions: Vec<Vec3>,
    pub releases: usize,
    pub forward_steps: Vec<u64>,
}

impl MockModel {
    pub fn new(render_res: usize) -> Self {
        Self {
            render_res,
            correction: Affine3A::IDENTITY,
            rendered_positions: Vec::new(),
            releases: 0,
            forward_steps: Vec::new(),
        }
    }
}

impl SceneModel for MockModel {
    type Rays = u64;
    type Batch = u64;
    type Outputs = u64;

    fn forward(&mut self, rays: &u64) -> Result<u64, EditError> {
        self.forward_steps.push(*rays);
        Ok(*rays)
    }

    fn metrics(&self, outputs: &u64, _batch: &u64) -> Result<MetricsDict, EditError> {
        Ok(BTreeMap::from([("psnr".to_string(), 20.0 + *outputs as f32)]))
    }

    fn losses(
        &self,
        _outputs: &u64,
        _batch: &u64,
        metrics: &MetricsDict,
    ) -> Result<LossDict, EditError> {
        let psnr = metrics.get("psnr").copied().unwrap_or_default();
        Ok(BTreeMap::from([("rgb_loss".to_string(), 1.0 / psnr)]))
    }

    fn camera_correction(&self, _image_idx: usize) -> Result<Affine3A, EditError> {
        Ok(self.correction)
    }

    fn render_camera(&mut self, camera: &Camera) -> Result<ImageTensor, EditError> {
        self.rendered_positions.push(camera.position);
        Ok(ImageTensor::filled(self.render_res, self.render_res, 3, 0.5))
    }

    fn release_cached_memory(&mut self) {
        self.releases += 1;
    }
}

/// Data manager holding `slots` flat images, one per dataset index.
pub struct MockData {
    batch: TrainingBatch,
    originals: OriginalImageBatch,
    cameras: Vec<Camera>,
    pub pool: Option<usize>,
    pub sampling: Vec<bool>,
}

impl MockData {
    pub fn new(slots: usize, res: usize) -> Self {
        let images = (0..slots)
            .map(|_| ImageTensor::filled(res, res, 3, ORIGINAL_VALUE))
            .collect();
        let batch = TrainingBatch::new(images, (0..slots).collect()).unwrap();
        let originals = OriginalImageBatch::snapshot(&batch);
        let cameras = (0..slots)
            .map(|i| {
                Camera::new(
                    Vec3::new(i as f32, 0.0, 0.0),
                    Quat::IDENTITY,
                    res as f32,
                    res as u32,
                    res as u32,
                )
            })
            .collect();
        Self {
            batch,
            originals,
            cameras,
            pool: None,
            sampling: Vec::new(),
        }
    }

    pub fn with_pool(mut self, pool: usize) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Extra cameras beyond the slot count, as if the dataset were larger.
    pub fn with_extra_cameras(mut self, extra: usize) -> Self {
        let res = self.batch.image(0).map_or(1, |image| image.resolution().0);
        let first = self.cameras.len();
        self.cameras.extend((first..first + extra).map(|i| {
            Camera::new(
                Vec3::new(i as f32, 0.0, 0.0),
                Quat::IDENTITY,
                res as f32,
                res as u32,
                res as u32,
            )
        }));
        self
    }

    /// Replace the original snapshot with one of a different size.
    pub fn with_original_slots(mut self, slots: usize) -> Self {
        let other = MockData::new(slots, 8);
        self.originals = other.originals;
        self
    }
}

impl DataManager for MockData {
    type Rays = u64;
    type Batch = u64;

    fn next_train(&mut self, step: u64) -> Result<(u64, u64), EditError> {
        Ok((step, step))
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
            .ok_or_else(|| EditError::DataManager(format!("no camera {image_idx}")))
    }

    fn dataset_len(&self) -> usize {
        self.cameras.len()
    }

    fn sample_pool_size(&self) -> Option<usize> {
        self.pool
    }

    fn set_only_sample_updated(&mut self, only_updated: bool) {
        self.sampling.push(only_updated);
    }
}

/// Editor that returns flat images and records every call.
#[derive(Default)]
pub struct MockEditor {
    pub output_res: Option<usize>,
    pub prompts: Vec<String>,
    pub single_calls: usize,
    pub batch_sizes: Vec<usize>,
    pub guidance: Vec<f32>,
}

impl MockEditor {
    pub fn with_output_res(res: usize) -> Self {
        Self {
            output_res: Some(res),
            ..Default::default()
        }
    }

    fn edited_like(&self, rendered: &ImageTensor) -> ImageTensor {
        let (h, w) = self
            .output_res
            .map_or(rendered.resolution(), |r| (r, r));
        ImageTensor::filled(h, w, 3, EDITED_VALUE)
    }
}

impl DiffusionEditor for MockEditor {
    type Embedding = String;

    fn encode_prompt(&mut self, prompt: &str) -> Result<String, EditError> {
        if prompt.is_empty() {
            return Err(EditError::Editor("empty prompt".into()));
        }
        self.prompts.push(prompt.to_string());
        Ok(format!("<{prompt}>"))
    }

    fn edit_image(
        &mut self,
        _embedding: &String,
        rendered: &ImageTensor,
        _original: &ImageTensor,
        params: &EditParams,
    ) -> Result<ImageTensor, EditError> {
        self.single_calls += 1;
        self.guidance.push(params.guidance_scale);
        Ok(self.edited_like(rendered))
    }

    fn edit_image_by_correspondence_batch(
        &mut self,
        _embedding: &String,
        rendered: &[ImageTensor],
        _original: &[ImageTensor],
        params: &EditParams,
    ) -> Result<Vec<ImageTensor>, EditError> {
        self.batch_sizes.push(rendered.len());
        self.guidance.push(params.guidance_scale);
        Ok(rendered.iter().map(|r| self.edited_like(r)).collect())
    }
}

/// Latent denoiser that turns each frame's latent mean into a flat image.
#[derive(Default)]
pub struct MeanDenoiser {
    pub batches: usize,
}

impl LatentDenoiser for MeanDenoiser {
    type Embedding = String;

    fn encode_prompt(&mut self, prompt: &str) -> Result<String, EditError> {
        Ok(prompt.to_string())
    }

    fn latent_channels(&self) -> usize {
        4
    }

    fn edit_image(
        &mut self,
        _embedding: &String,
        rendered: &ImageTensor,
        _original: &ImageTensor,
        _params: &EditParams,
    ) -> Result<ImageTensor, EditError> {
        Ok(rendered.clone())
    }

    fn denoise_batch(
        &mut self,
        _embedding: &String,
        latents: Array4<f32>,
        rendered: &[ImageTensor],
        _original: &[ImageTensor],
        _params: &EditParams,
    ) -> Result<Vec<ImageTensor>, EditError> {
        self.batches += 1;
        Ok(latents
            .outer_iter()
            .zip(rendered)
            .map(|(frame, r)| {
                let (h, w) = r.resolution();
                let value = frame.mean().unwrap_or_default().abs().min(1.0);
                ImageTensor::filled(h, w, 3, value)
            })
            .collect())
    }
}
