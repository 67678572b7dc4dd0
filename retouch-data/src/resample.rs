//! Bilinear resampling for image planes.
//!
//! Sampling uses half-pixel centers without corner alignment, so a
//! downsample followed by the inverse upsample lands on the same grid the
//! diffusion editor and the point tracker expect.

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};

use crate::error::DataError;

/// Source taps and blend weight for one output coordinate.
#[derive(Debug, Clone, Copy)]
struct Tap {
    lo: usize,
    hi: usize,
    frac: f32,
}

fn axis_taps(input: usize, output: usize) -> Vec<Tap> {
    let scale = input as f32 / output as f32;
    (0..output)
        .map(|dst| {
            let src = ((dst as f32 + 0.5) * scale - 0.5).max(0.0);
            let lo = (src.floor() as usize).min(input - 1);
            let hi = if lo < input - 1 { lo + 1 } else { lo };
            Tap {
                lo,
                hi,
                frac: src - lo as f32,
            }
        })
        .collect()
}

fn check_target(height: usize, width: usize) -> Result<(), DataError> {
    if height == 0 || width == 0 {
        return Err(DataError::InvalidResize { height, width });
    }
    Ok(())
}

/// Resample a single `(h, w)` plane to `(height, width)`.
pub fn resize_plane(
    plane: ArrayView2<'_, f32>,
    height: usize,
    width: usize,
) -> Result<Array2<f32>, DataError> {
    check_target(height, width)?;
    let (in_h, in_w) = plane.dim();
    if in_h == 0 || in_w == 0 {
        return Err(DataError::Empty("cannot resample an empty plane".into()));
    }
    if (in_h, in_w) == (height, width) {
        return Ok(plane.to_owned());
    }

    let rows = axis_taps(in_h, height);
    let cols = axis_taps(in_w, width);
    let mut out = Array2::<f32>::zeros((height, width));
    for (y, ry) in rows.iter().enumerate() {
        for (x, cx) in cols.iter().enumerate() {
            let top = plane[[ry.lo, cx.lo]] * (1.0 - cx.frac) + plane[[ry.lo, cx.hi]] * cx.frac;
            let bottom = plane[[ry.hi, cx.lo]] * (1.0 - cx.frac) + plane[[ry.hi, cx.hi]] * cx.frac;
            out[[y, x]] = top * (1.0 - ry.frac) + bottom * ry.frac;
        }
    }
    Ok(out)
}

/// Resample a channels-first `(c, h, w)` tensor.
pub fn resize_chw(
    tensor: ArrayView3<'_, f32>,
    height: usize,
    width: usize,
) -> Result<Array3<f32>, DataError> {
    check_target(height, width)?;
    let channels = tensor.len_of(Axis(0));
    let mut out = Array3::<f32>::zeros((channels, height, width));
    for (c, plane) in tensor.axis_iter(Axis(0)).enumerate() {
        let resized = resize_plane(plane, height, width)?;
        out.index_axis_mut(Axis(0), c).assign(&resized);
    }
    Ok(out)
}

/// Resample a channels-last `(h, w, c)` tensor.
pub fn resize_hwc(
    tensor: ArrayView3<'_, f32>,
    height: usize,
    width: usize,
) -> Result<Array3<f32>, DataError> {
    let chw = tensor.permuted_axes([2, 0, 1]);
    let resized = resize_chw(chw, height, width)?;
    Ok(resized
        .permuted_axes([1, 2, 0])
        .as_standard_layout()
        .to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_resize_identity_returns_copy() {
        let plane = array![[0.0, 1.0], [2.0, 3.0]];
        let out = resize_plane(plane.view(), 2, 2).unwrap();
        assert_eq!(out, plane);
    }

    #[test]
    fn test_resize_constant_plane_stays_constant() {
        let plane = Array2::<f32>::from_elem((7, 5), 0.25);
        let out = resize_plane(plane.view(), 13, 9).unwrap();
        assert_eq!(out.dim(), (13, 9));
        assert!(out.iter().all(|v| (v - 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_upsample_two_by_two() {
        let plane = array![[0.0, 1.0], [0.0, 1.0]];
        let out = resize_plane(plane.view(), 2, 4).unwrap();
        // Half-pixel centers: x = -0.25 clamps to 0, 0.25, 0.75, 1.25 clamps to the edge.
        let expected = [0.0, 0.25, 0.75, 1.0];
        for (got, want) in out.row(0).iter().zip(expected) {
            assert!((got - want).abs() < 1e-6);
        }
    }

    #[test]
    fn test_downsample_averages_pairs() {
        let plane = array![[0.0, 2.0, 4.0, 6.0]];
        let out = resize_plane(plane.view(), 1, 2).unwrap();
        assert!((out[[0, 0]] - 1.0).abs() < 1e-6);
        assert!((out[[0, 1]] - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_resize_hwc_keeps_channel_order() {
        let mut tensor = Array3::<f32>::zeros((60, 60, 3));
        tensor.index_axis_mut(Axis(2), 1).fill(0.5);
        tensor.index_axis_mut(Axis(2), 2).fill(1.0);
        let out = resize_hwc(tensor.view(), 64, 64).unwrap();
        assert_eq!(out.dim(), (64, 64, 3));
        assert!((out[[10, 10, 0]]).abs() < 1e-6);
        assert!((out[[10, 10, 1]] - 0.5).abs() < 1e-6);
        assert!((out[[63, 0, 2]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_resize_rejects_zero_target() {
        let plane = Array2::<f32>::zeros((4, 4));
        assert!(matches!(
            resize_plane(plane.view(), 0, 4),
            Err(DataError::InvalidResize { .. })
        ));
    }
}
