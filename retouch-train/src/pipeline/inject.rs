//! Writes edited images back into the live training batch.

use retouch_data::{ImageTensor, TrainingBatch};
use tracing::debug;

use crate::error::EditError;

/// Resample `edited` to `target` `(height, width)` when the editor changed resolution.
pub fn fit_resolution(
    edited: ImageTensor,
    target: (usize, usize),
) -> Result<ImageTensor, EditError> {
    if edited.resolution() == target {
        return Ok(edited);
    }
    debug!(
        from = ?edited.resolution(),
        to = ?target,
        "Resampling edited image to rendered resolution"
    );
    Ok(edited.resized(target.0, target.1)?)
}

/// Write one edited image into `slot` and mark it updated.
pub fn inject_slot(
    batch: &mut TrainingBatch,
    slot: usize,
    edited: ImageTensor,
    target: (usize, usize),
) -> Result<(), EditError> {
    let fitted = fit_resolution(edited, target)?;
    batch.replace(slot, fitted)?;
    Ok(())
}

/// Write a batch of edited images into their slots in one operation.
///
/// Every image is resampled before the batch is touched, so an error leaves
/// pixels and flags as they were.
pub fn inject_slots(
    batch: &mut TrainingBatch,
    slots: &[usize],
    edited: Vec<ImageTensor>,
    targets: &[(usize, usize)],
) -> Result<(), EditError> {
    if edited.len() != slots.len() || targets.len() != slots.len() {
        return Err(EditError::EditCount {
            expected: slots.len(),
            actual: edited.len(),
        });
    }
    let fitted = edited
        .into_iter()
        .zip(targets)
        .map(|(image, &target)| fit_resolution(image, target))
        .collect::<Result<Vec<_>, _>>()?;
    batch.replace_many(slots, fitted)?;
    Ok(())
}
