//! Retouch Data Crate
//!
//! CPU-side data model for instruction-driven scene editing: image tensors,
//! the live training batch and its pristine snapshot, cameras, and the
//! cyclic dataset cursor used to pick the next slot to edit.
//!
//! This crate is model-agnostic. Rendering, diffusion and tracking live
//! behind traits in `retouch-train` and `retouch-match`.

pub mod batch;
pub mod cursor;
pub mod error;
pub mod resample;
pub mod types;

pub use batch::{OriginalImageBatch, TrainingBatch};
pub use cursor::DatasetCursor;
pub use error::DataError;
pub use resample::{resize_chw, resize_hwc, resize_plane};
pub use types::{Camera, ImageTensor};
