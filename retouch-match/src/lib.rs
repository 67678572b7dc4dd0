//! Retouch Match Crate
//!
//! Cross-frame correspondence for consistent multi-view editing.
//!
//! ## Modules
//!
//! - [`tracker`]: the point tracker seam
//! - [`matcher`]: tiled trajectory matching over a frame sequence
//! - [`aggregate`]: gather/scatter aggregation along trajectories and latent initialization
//! - [`visualize`]: trajectory overlays for inspection

pub mod aggregate;
pub mod error;
pub mod matcher;
pub mod tracker;
pub mod visualize;

pub use aggregate::{Combiner, aggregate, chain_groups, init_latents};
pub use error::MatchError;
pub use matcher::{GRID_BORDER, MatchOptions, TrajectoryMatch, flatten_trajectories, match_trajectories, query_grid};
pub use tracker::PointTracker;
pub use visualize::{Overlay, VisualizeOptions, visualize_match};
