//! Tiled trajectory matching over frame sequences.
//!
//! Frames are resampled to the target resolution, a uniform query grid is
//! seeded inside an 8px border, and the tracker is invoked over disjoint
//! `(batch, point)` chunks that fill a preallocated trajectory tensor.

use ndarray::{Array2, Array3, Array4, Array5, ArrayView4, ArrayView5, Axis, s};
use retouch_data::resize_plane;
use tracing::{debug, info};

use crate::error::MatchError;
use crate::tracker::PointTracker;

/// Distance in pixels between the query grid and every frame border.
pub const GRID_BORDER: f32 = 8.0;

/// Options for [`match_trajectories`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOptions {
    /// Height frames are resampled to before tracking
    pub target_height: usize,
    /// Width frames are resampled to before tracking
    pub target_width: usize,
    /// Query points per side; the grid holds `grid_size^2` points
    pub grid_size: usize,
    /// Query points per tracker call
    pub point_batch_size: usize,
    /// Batch elements per tracker call
    pub frame_batch_size: usize,
    /// Refinement iterations requested from the tracker
    pub iterations: usize,
}

impl MatchOptions {
    pub fn new(target_height: usize, target_width: usize) -> Self {
        Self {
            target_height,
            target_width,
            grid_size: 64,
            point_batch_size: 256,
            frame_batch_size: 8,
            iterations: 6,
        }
    }

    pub fn with_grid_size(mut self, grid_size: usize) -> Self {
        self.grid_size = grid_size;
        self
    }

    pub fn with_batch_sizes(mut self, point_batch_size: usize, frame_batch_size: usize) -> Self {
        self.point_batch_size = point_batch_size;
        self.frame_batch_size = frame_batch_size;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Number of query points per batch element.
    pub fn num_points(&self) -> usize {
        self.grid_size * self.grid_size
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        let min_dim = (2.0 * GRID_BORDER) as usize;
        if self.target_height <= min_dim || self.target_width <= min_dim {
            return Err(MatchError::InvalidOptions(format!(
                "target resolution {}x{} must exceed {min_dim}px on both sides",
                self.target_height, self.target_width
            )));
        }
        if self.grid_size < 2 {
            return Err(MatchError::InvalidOptions(
                "grid_size must be at least 2".into(),
            ));
        }
        if self.point_batch_size == 0 || self.frame_batch_size == 0 {
            return Err(MatchError::InvalidOptions(
                "chunk sizes must be positive".into(),
            ));
        }
        if self.iterations == 0 {
            return Err(MatchError::InvalidOptions(
                "tracker iterations must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Output of [`match_trajectories`].
#[derive(Debug, Clone)]
pub struct TrajectoryMatch {
    /// `(b, t, n, 2)` point positions `(x, y)` at the target resolution
    pub trajectories: Array4<f32>,
    /// `(b, t, n)` linear pixel index `round(y) * width + round(x)`
    pub flat_indices: Array3<usize>,
    /// `(b, t, c, target_h, target_w)` resampled input frames
    pub frames: Array5<f32>,
}

/// Uniform `grid_size x grid_size` query grid as `(n, 2)` `(x, y)` rows.
///
/// Points are inset by [`GRID_BORDER`] from each side, so every coordinate
/// lies in `[8, dim - 8]`.
pub fn query_grid(grid_size: usize, height: usize, width: usize) -> Array2<f32> {
    let denom = (grid_size.max(2) - 1) as f32;
    let span_y = height as f32 - 2.0 * GRID_BORDER;
    let span_x = width as f32 - 2.0 * GRID_BORDER;
    Array2::from_shape_fn((grid_size * grid_size, 2), |(i, axis)| {
        let (row, col) = (i / grid_size, i % grid_size);
        match axis {
            0 => GRID_BORDER + col as f32 / denom * span_x,
            _ => GRID_BORDER + row as f32 / denom * span_y,
        }
    })
}

/// Convert `(b, t, n, 2)` trajectories to `(b, t, n)` flat pixel indices.
///
/// Points that round outside the frame are rejected: they indicate a
/// tracker/resample inconsistency, and gather/scatter cannot use them.
pub fn flatten_trajectories(
    trajectories: ArrayView4<'_, f32>,
    height: usize,
    width: usize,
) -> Result<Array3<usize>, MatchError> {
    let (b, t, n, d) = trajectories.dim();
    if d != 2 {
        return Err(MatchError::ShapeMismatch {
            what: "trajectories",
            expected: vec![b, t, n, 2],
            actual: vec![b, t, n, d],
        });
    }
    let limit = height * width;
    let mut flat = Array3::<usize>::zeros((b, t, n));
    for ((bi, ti, pi), slot) in flat.indexed_iter_mut() {
        let x = trajectories[[bi, ti, pi, 0]];
        let y = trajectories[[bi, ti, pi, 1]];
        if !x.is_finite() || !y.is_finite() {
            return Err(MatchError::Tracker(format!(
                "non-finite position at frame {ti}, point {pi}"
            )));
        }
        let (rx, ry) = (x.round() as i64, y.round() as i64);
        let index = ry * width as i64 + rx;
        if rx < 0 || ry < 0 || rx >= width as i64 || ry >= height as i64 {
            return Err(MatchError::IndexOutOfRange {
                frame: ti,
                point: pi,
                index,
                limit,
            });
        }
        *slot = index as usize;
    }
    Ok(flat)
}

fn resample_sequence(
    frames: ArrayView5<'_, f32>,
    height: usize,
    width: usize,
) -> Result<Array5<f32>, MatchError> {
    let (b, t, c, _, _) = frames.dim();
    let mut out = Array5::<f32>::zeros((b, t, c, height, width));
    for bi in 0..b {
        for ti in 0..t {
            for ci in 0..c {
                let plane = frames.slice(s![bi, ti, ci, .., ..]);
                let resized = resize_plane(plane, height, width)?;
                out.slice_mut(s![bi, ti, ci, .., ..]).assign(&resized);
            }
        }
    }
    Ok(out)
}

/// Track a dense grid of points through `frames`.
///
/// `frames` is `(b, t, c, h, w)` with values in `[0, 1]`. The tracker is
/// invoked once per `(frame chunk, point chunk)` pair so peak memory is
/// bounded by the chunk sizes, not by the total point or batch count.
pub fn match_trajectories<T: PointTracker + ?Sized>(
    tracker: &mut T,
    frames: ArrayView5<'_, f32>,
    options: &MatchOptions,
) -> Result<TrajectoryMatch, MatchError> {
    options.validate()?;
    let (b, t, _, _, _) = frames.dim();
    let (height, width) = (options.target_height, options.target_width);

    let frames = resample_sequence(frames, height, width)?;
    let tracker_frames = frames.mapv(|v| v * 255.0);

    let grid = query_grid(options.grid_size, height, width);
    let n = grid.len_of(Axis(0));
    let mut trajectories = Array4::<f32>::zeros((b, t, n, 2));

    let mut calls = 0usize;
    for p0 in (0..n).step_by(options.point_batch_size) {
        let p1 = (p0 + options.point_batch_size).min(n);
        let chunk = grid.slice(s![p0..p1, ..]);
        for b0 in (0..b).step_by(options.frame_batch_size) {
            let b1 = (b0 + options.frame_batch_size).min(b);
            let queries = chunk
                .insert_axis(Axis(0))
                .broadcast((b1 - b0, p1 - p0, 2))
                .ok_or_else(|| MatchError::InvalidOptions("query broadcast failed".into()))?
                .to_owned();

            let mut estimates = tracker.track(
                queries.view(),
                tracker_frames.slice(s![b0..b1, .., .., .., ..]),
                options.iterations,
            )?;
            let last = estimates.pop().ok_or(MatchError::NoIterations)?;
            let expected = [b1 - b0, t, p1 - p0, 2];
            if last.shape() != &expected[..] {
                return Err(MatchError::ShapeMismatch {
                    what: "tracker output",
                    expected: expected.to_vec(),
                    actual: last.shape().to_vec(),
                });
            }
            trajectories
                .slice_mut(s![b0..b1, .., p0..p1, ..])
                .assign(&last);
            calls += 1;
        }
    }
    debug!(calls, points = n, batch = b, "Tracker chunks complete");

    let flat_indices = flatten_trajectories(trajectories.view(), height, width)?;
    info!(
        batch = b,
        frames = t,
        points = n,
        "Matched trajectories at {}x{}",
        height,
        width
    );

    Ok(TrajectoryMatch {
        trajectories,
        flat_indices,
        frames,
    })
}
