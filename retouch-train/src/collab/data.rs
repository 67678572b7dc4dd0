//! Data manager interface.

use retouch_data::{Camera, OriginalImageBatch, TrainingBatch};

use crate::error::EditError;

/// Owner of the training images, cameras and ray sampling.
pub trait DataManager {
    type Rays;
    type Batch;

    /// Sample the next training ray bundle.
    fn next_train(&mut self, step: u64) -> Result<(Self::Rays, Self::Batch), EditError>;

    fn training_batch(&self) -> &TrainingBatch;

    fn training_batch_mut(&mut self) -> &mut TrainingBatch;

    fn original_batch(&self) -> &OriginalImageBatch;

    /// Training camera for a dataset image.
    fn camera(&self, image_idx: usize) -> Result<Camera, EditError>;

    /// Number of images in the dataset.
    fn dataset_len(&self) -> usize;

    /// Size of the pool images are sampled from, if restricted.
    fn sample_pool_size(&self) -> Option<usize>;

    /// Restrict subsequent sampling to slots that hold edited images.
    fn set_only_sample_updated(&mut self, only_updated: bool);
}

/// Interpret a raw `num_images_to_sample_from` setting; `-1` means the full dataset.
pub fn sample_pool(raw: i64) -> Option<usize> {
    usize::try_from(raw).ok().filter(|&n| n > 0)
}
