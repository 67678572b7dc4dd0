//! The live training batch and its pristine snapshot.
//!
//! Slots are fixed at construction. Each slot carries an image, the stable
//! dataset index it was loaded from, and an `updated` flag that is true
//! exactly when the slot's pixels have been replaced by an edited image.

use tracing::debug;

use crate::error::DataError;
use crate::types::ImageTensor;

/// Mutable image batch sampled by the training loop.
#[derive(Debug, Clone)]
pub struct TrainingBatch {
    images: Vec<ImageTensor>,
    image_idx: Vec<usize>,
    updated: Vec<bool>,
}

impl TrainingBatch {
    /// Create a batch from images and their dataset indices.
    pub fn new(images: Vec<ImageTensor>, image_idx: Vec<usize>) -> Result<Self, DataError> {
        if images.is_empty() {
            return Err(DataError::Empty("training batch has no slots".into()));
        }
        if images.len() != image_idx.len() {
            return Err(DataError::ShapeMismatch {
                expected: vec![images.len()],
                actual: vec![image_idx.len()],
            });
        }
        let updated = vec![false; images.len()];
        Ok(Self {
            images,
            image_idx,
            updated,
        })
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    fn check_slot(&self, slot: usize) -> Result<(), DataError> {
        if slot >= self.len() {
            return Err(DataError::SlotOutOfRange {
                slot,
                len: self.len(),
            });
        }
        Ok(())
    }

    pub fn image(&self, slot: usize) -> Result<&ImageTensor, DataError> {
        self.check_slot(slot)?;
        Ok(&self.images[slot])
    }

    pub fn images(&self) -> &[ImageTensor] {
        &self.images
    }

    /// Dataset index held by `slot`.
    pub fn image_idx(&self, slot: usize) -> Result<usize, DataError> {
        self.check_slot(slot)?;
        Ok(self.image_idx[slot])
    }

    pub fn is_updated(&self, slot: usize) -> Result<bool, DataError> {
        self.check_slot(slot)?;
        Ok(self.updated[slot])
    }

    /// Per-slot `updated` flags.
    pub fn updated(&self) -> &[bool] {
        &self.updated
    }

    pub fn all_updated(&self) -> bool {
        self.updated.iter().all(|&u| u)
    }

    pub fn any_updated(&self) -> bool {
        self.updated.iter().any(|&u| u)
    }

    pub fn updated_count(&self) -> usize {
        self.updated.iter().filter(|&&u| u).count()
    }

    /// Slots that currently hold edited pixels.
    pub fn updated_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.updated
            .iter()
            .enumerate()
            .filter_map(|(slot, &u)| u.then_some(slot))
    }

    /// Replace the pixels of one slot and mark it updated.
    pub fn replace(&mut self, slot: usize, image: ImageTensor) -> Result<(), DataError> {
        self.check_slot(slot)?;
        self.images[slot] = image;
        self.updated[slot] = true;
        Ok(())
    }

    /// Replace several slots at once.
    ///
    /// All slots are validated before any pixel is written, so a failed call
    /// leaves the batch untouched.
    pub fn replace_many(
        &mut self,
        slots: &[usize],
        images: Vec<ImageTensor>,
    ) -> Result<(), DataError> {
        if slots.len() != images.len() {
            return Err(DataError::ShapeMismatch {
                expected: vec![slots.len()],
                actual: vec![images.len()],
            });
        }
        for &slot in slots {
            self.check_slot(slot)?;
        }
        for (&slot, image) in slots.iter().zip(images) {
            self.images[slot] = image;
            self.updated[slot] = true;
        }
        debug!(count = slots.len(), "Replaced slots in training batch");
        Ok(())
    }

    /// Clear every `updated` flag without touching pixels.
    pub fn reset_updated(&mut self) {
        self.updated.iter_mut().for_each(|u| *u = false);
    }
}

/// Read-only snapshot of the source images, indexed like [`TrainingBatch`].
#[derive(Debug, Clone)]
pub struct OriginalImageBatch {
    images: Vec<ImageTensor>,
}

impl OriginalImageBatch {
    pub fn new(images: Vec<ImageTensor>) -> Self {
        Self { images }
    }

    /// Snapshot the current pixels of a training batch.
    pub fn snapshot(batch: &TrainingBatch) -> Self {
        Self::new(batch.images().to_vec())
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn image(&self, slot: usize) -> Result<&ImageTensor, DataError> {
        self.images.get(slot).ok_or(DataError::SlotOutOfRange {
            slot,
            len: self.images.len(),
        })
    }
}
