//! Retouch
//!
//! Instruction-driven editing of the images a scene model is trained on.
//! This crate re-exports the workspace members; the command-line driver
//! lives in `retouch-app`.

pub use retouch_data as data;
pub use retouch_match as matching;
pub use retouch_train as train;
