//! Scene model interface.

use retouch_data::{Camera, ImageTensor};

use crate::collab::{LossDict, MetricsDict};
use crate::error::EditError;
use glam::Affine3A;

/// The scene reconstruction model being optimized.
pub trait SceneModel {
    /// Ray bundle sampled by the data manager
    type Rays;
    /// Ground-truth batch matching `Rays`
    type Batch;
    /// Per-step render outputs
    type Outputs;

    /// Render a training ray bundle.
    fn forward(&mut self, rays: &Self::Rays) -> Result<Self::Outputs, EditError>;

    fn metrics(
        &self,
        outputs: &Self::Outputs,
        batch: &Self::Batch,
    ) -> Result<MetricsDict, EditError>;

    fn losses(
        &self,
        outputs: &Self::Outputs,
        batch: &Self::Batch,
        metrics: &MetricsDict,
    ) -> Result<LossDict, EditError>;

    /// Learned pose correction for a dataset image.
    fn camera_correction(&self, image_idx: usize) -> Result<Affine3A, EditError>;

    /// Render a full `H x W x 3` view from `camera`.
    fn render_camera(&mut self, camera: &Camera) -> Result<ImageTensor, EditError>;

    /// Return cached accelerator memory after per-view scratch is dropped.
    fn release_cached_memory(&mut self) {}
}
