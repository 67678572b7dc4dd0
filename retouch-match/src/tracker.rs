//! Point tracker interface.

use ndarray::{Array4, ArrayView3, ArrayView5};

use crate::error::MatchError;

/// A dense point tracker that follows query points through a frame sequence.
///
/// Implementations wrap an external tracking network.
pub trait PointTracker {
    /// Track `query_points` through `frames`.
    ///
    /// - `query_points`: `(b, n, 2)` pixel coordinates `(x, y)` in the first frame
    /// - `frames`: `(b, t, c, h, w)` with values in `[0, 255]`
    ///
    /// Returns one `(b, t, n, 2)` estimate per refinement iteration, oldest
    /// first. Only the last one is used.
    fn track(
        &mut self,
        query_points: ArrayView3<'_, f32>,
        frames: ArrayView5<'_, f32>,
        iterations: usize,
    ) -> Result<Vec<Array4<f32>>, MatchError>;
}

impl<T: PointTracker + ?Sized> PointTracker for Box<T> {
    fn track(
        &mut self,
        query_points: ArrayView3<'_, f32>,
        frames: ArrayView5<'_, f32>,
        iterations: usize,
    ) -> Result<Vec<Array4<f32>>, MatchError> {
        (**self).track(query_points, frames, iterations)
    }
}
