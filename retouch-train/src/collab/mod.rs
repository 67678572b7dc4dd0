//! Interfaces to the collaborators the edit pipeline drives.
//!
//! The scene model, the data manager and the diffusion editor are external
//! systems. The pipeline only schedules their calls and moves pixels
//! between them.

pub mod data;
pub mod editor;
pub mod model;

use std::collections::BTreeMap;

pub use data::{DataManager, sample_pool};
pub use editor::{DiffusionEditor, EditParams, LatentDenoiser};
pub use model::SceneModel;

/// Named scalar metrics reported by the scene model.
pub type MetricsDict = BTreeMap<String, f32>;

/// Named loss terms reported by the scene model.
pub type LossDict = BTreeMap<String, f32>;
