//! Retouch Training Crate
//!
//! Interleaves instruction-driven diffusion edits with the optimization of a
//! scene model. Each training step the pipeline decides whether to edit one
//! image at a time, edit a batch jointly through cross-frame
//! correspondence, or do nothing, and writes edited pixels back into the
//! live training batch.
//!
//! ## Modules
//!
//! - [`collab`]: traits for the scene model, data manager and diffusion editor
//! - [`schedule`]: the per-step edit decision
//! - [`pipeline`]: the edit loop, injection and operator controls
//! - [`correspondence`]: a batched editor built on a latent denoiser and a point tracker
//! - [`config`]: pipeline configuration

pub mod collab;
pub mod config;
pub mod correspondence;
pub mod error;
pub mod pipeline;
pub mod schedule;

pub use collab::{DataManager, DiffusionEditor, EditParams, LatentDenoiser, SceneModel};
pub use config::{ConfigError, CorrespondenceConfig, EditConfig, PrecisionMode};
pub use correspondence::CorrespondenceEditor;
pub use error::EditError;
pub use pipeline::{EditPipeline, EditStats, OperatorControl, StepOutput};
pub use schedule::{EditAction, EditPhase, EditScheduler, StepDecision};
