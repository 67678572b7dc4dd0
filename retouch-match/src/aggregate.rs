//! Gather/scatter aggregation along point trajectories.
//!
//! Values at the flat index of every trajectory point are gathered across
//! frames, combined with the per-point representative, and scattered back.
//! Positions that no trajectory touches are never written.

use ndarray::{Array3, Array4, Array5, ArrayView2, ArrayView3, ArrayView4, Axis, s};
use ndarray_rand::RandomExt;
use ndarray_rand::rand_distr::StandardNormal;
use rand::Rng;
use tracing::debug;

use crate::error::MatchError;

/// How gathered per-point values are combined before scattering back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Combiner {
    /// Write the gathered values back unchanged
    #[default]
    Identity,
    /// Replace every frame's value with the cross-frame mean
    Mean,
    /// Replace every frame's value with the value at `frame`
    Anchor { frame: usize },
}

fn check_indices(
    flat_indices: ArrayView2<'_, usize>,
    frames: usize,
    limit: usize,
) -> Result<(), MatchError> {
    let (t, n) = flat_indices.dim();
    if t != frames {
        return Err(MatchError::ShapeMismatch {
            what: "flat indices",
            expected: vec![frames, n],
            actual: vec![t, n],
        });
    }
    if let Some(((frame, point), &index)) = flat_indices
        .indexed_iter()
        .find(|(_, index)| **index >= limit)
    {
        return Err(MatchError::IndexOutOfRange {
            frame,
            point,
            index: index as i64,
            limit,
        });
    }
    Ok(())
}

/// Aggregate `values` along trajectories.
///
/// - `values`: `(t, c, h, w)`
/// - `flat_indices`: `(t, n)` linear indices into `h * w`
///
/// Indices are validated before anything is gathered. When two points land
/// on the same pixel of a frame, the later point wins.
pub fn aggregate(
    values: ArrayView4<'_, f32>,
    flat_indices: ArrayView2<'_, usize>,
    combiner: Combiner,
) -> Result<Array4<f32>, MatchError> {
    let (t, c, h, w) = values.dim();
    check_indices(flat_indices, t, h * w)?;
    if let Combiner::Anchor { frame } = combiner {
        if frame >= t {
            return Err(MatchError::InvalidOptions(format!(
                "anchor frame {frame} outside sequence of {t} frames"
            )));
        }
    }

    let mut out = values.to_owned();
    let n = flat_indices.len_of(Axis(1));
    if t == 0 || n == 0 {
        return Ok(out);
    }

    // (c, t, n)
    let mut gathered = Array3::<f32>::zeros((c, t, n));
    for f in 0..t {
        for p in 0..n {
            let index = flat_indices[[f, p]];
            let (y, x) = (index / w, index % w);
            for ch in 0..c {
                gathered[[ch, f, p]] = values[[f, ch, y, x]];
            }
        }
    }

    let combined = combine(gathered.view(), combiner);

    for f in 0..t {
        for p in 0..n {
            let index = flat_indices[[f, p]];
            let (y, x) = (index / w, index % w);
            for ch in 0..c {
                out[[f, ch, y, x]] = combined[[ch, f, p]];
            }
        }
    }
    Ok(out)
}

fn combine(gathered: ArrayView3<'_, f32>, combiner: Combiner) -> Array3<f32> {
    let (c, t, n) = gathered.dim();
    match combiner {
        Combiner::Identity => gathered.to_owned(),
        Combiner::Mean => {
            let mut centre = Array3::<f32>::zeros((c, 1, n));
            for f in 0..t {
                centre += &gathered.slice(s![.., f..f + 1, ..]);
            }
            centre /= t as f32;
            broadcast_frames(centre, t)
        }
        Combiner::Anchor { frame } => {
            let anchor = gathered.slice(s![.., frame..frame + 1, ..]).to_owned();
            broadcast_frames(anchor, t)
        }
    }
}

fn broadcast_frames(centre: Array3<f32>, t: usize) -> Array3<f32> {
    let (c, _, n) = centre.dim();
    let mut out = Array3::<f32>::zeros((c, t, n));
    for f in 0..t {
        out.slice_mut(s![.., f..f + 1, ..]).assign(&centre);
    }
    out
}

/// Force agreement along trajectories across a stack of frame groups.
///
/// - `latents`: `(n_group, t, c, h, w)`
/// - `flat_indices`: `(n_group, t, n)`
///
/// Group 0 is replaced by its cross-frame mean at trajectory positions.
/// Every later group is first seeded with the last frame of the previous
/// group and then propagates that seed frame along its own trajectories, so
/// the first frame of group `k` equals the last frame of group `k - 1`.
pub fn chain_groups(
    mut latents: Array5<f32>,
    flat_indices: ArrayView3<'_, usize>,
) -> Result<Array5<f32>, MatchError> {
    let (groups, t, _, _, _) = latents.dim();
    if flat_indices.len_of(Axis(0)) != groups {
        return Err(MatchError::ShapeMismatch {
            what: "grouped flat indices",
            expected: vec![groups],
            actual: vec![flat_indices.len_of(Axis(0))],
        });
    }
    if groups == 0 || t == 0 {
        return Ok(latents);
    }

    for k in 0..groups {
        let combiner = if k == 0 {
            Combiner::Mean
        } else {
            let seed = latents.slice(s![k - 1, t - 1, .., .., ..]).to_owned();
            latents.slice_mut(s![k, 0, .., .., ..]).assign(&seed);
            Combiner::Anchor { frame: 0 }
        };
        let group = aggregate(
            latents.index_axis(Axis(0), k),
            flat_indices.index_axis(Axis(0), k),
            combiner,
        )?;
        latents.index_axis_mut(Axis(0), k).assign(&group);
    }
    debug!(groups, frames = t, "Chained latent groups");
    Ok(latents)
}

/// Sample a `(n_group, t, c, h, w)` stack of Gaussian latents.
///
/// With `matched` set, the stack is made consistent along trajectories via
/// [`chain_groups`]; otherwise the raw noise is returned.
pub fn init_latents<R: Rng + ?Sized>(
    latent_shape: [usize; 4],
    flat_indices: ArrayView3<'_, usize>,
    matched: bool,
    rng: &mut R,
) -> Result<Array5<f32>, MatchError> {
    let groups = flat_indices.len_of(Axis(0));
    let [t, c, h, w] = latent_shape;
    let latents = Array5::<f32>::random_using((groups, t, c, h, w), StandardNormal, rng);
    if !matched {
        return Ok(latents);
    }
    chain_groups(latents, flat_indices)
}
