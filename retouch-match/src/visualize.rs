//! Trajectory overlays for inspecting matcher output.
//!
//! Debug tooling only; nothing in the edit path depends on it.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use glam::Vec2;
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, DynamicImage, Frame, Rgb, RgbImage};
use ndarray::{ArrayView4, ArrayView5, Axis, s};
use retouch_data::ImageTensor;
use tracing::info;

use crate::error::MatchError;

/// Frames per second of the written animations.
const ANIMATION_FPS: u32 = 8;

/// Drawing options for trajectory overlays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualizeOptions {
    /// Draw a dot at every intermediate trajectory position
    pub show_dots: bool,
    /// Stroke width in pixels
    pub linewidth: u32,
    /// Color by displacement from the start, saturating at this distance
    pub max_distance: Option<f32>,
}

impl Default for VisualizeOptions {
    fn default() -> Self {
        Self {
            show_dots: true,
            linewidth: 1,
            max_distance: None,
        }
    }
}

/// Cool-warm diverging colormap, `value` in `[0, 1]`.
pub fn coolwarm(value: f32) -> Rgb<u8> {
    const COOL: [f32; 3] = [59.0, 76.0, 192.0];
    const MID: [f32; 3] = [221.0, 221.0, 221.0];
    const WARM: [f32; 3] = [180.0, 4.0, 38.0];
    let v = if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 };
    let (from, to, t) = if v < 0.5 {
        (COOL, MID, v * 2.0)
    } else {
        (MID, WARM, (v - 0.5) * 2.0)
    };
    Rgb(std::array::from_fn(|i| {
        (from[i] + (to[i] - from[i]) * t).round() as u8
    }))
}

fn stamp(image: &mut RgbImage, x: i64, y: i64, radius: i64, color: Rgb<u8>) {
    let (w, h) = (image.width() as i64, image.height() as i64);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy > radius * radius {
                continue;
            }
            let (px, py) = (x + dx, y + dy);
            if px >= 0 && py >= 0 && px < w && py < h {
                image.put_pixel(px as u32, py as u32, color);
            }
        }
    }
}

fn draw_segment(image: &mut RgbImage, from: Vec2, to: Vec2, linewidth: u32, color: Rgb<u8>) {
    let radius = (linewidth as i64 - 1) / 2;
    let (mut x0, mut y0) = (from.x as i64, from.y as i64);
    let (x1, y1) = (to.x as i64, to.y as i64);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        stamp(image, x0, y0, radius, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Draw one trajectory prefix onto `image`.
///
/// `total_steps` is the full sequence length, so colors stay stable as the
/// prefix grows from frame to frame.
pub fn draw_trajectory(
    image: &mut RgbImage,
    trajectory: &[Vec2],
    total_steps: usize,
    options: &VisualizeOptions,
) {
    let Some((&start, _)) = trajectory.split_first() else {
        return;
    };
    let color_at = |s: usize| match options.max_distance {
        Some(max) if max > 0.0 => coolwarm(trajectory[s].distance(start) / max),
        _ => coolwarm(s as f32 / (total_steps.saturating_sub(2).max(1)) as f32),
    };

    for (s, pair) in trajectory.windows(2).enumerate() {
        let color = color_at(s);
        draw_segment(image, pair[0], pair[1], options.linewidth, color);
        if options.show_dots {
            stamp(image, pair[0].x as i64, pair[0].y as i64, options.linewidth as i64, color);
        }
    }

    let last = trajectory.len() - 1;
    let end = trajectory[last];
    stamp(
        image,
        end.x as i64,
        end.y as i64,
        options.linewidth as i64 * 2,
        color_at(last),
    );
}

/// Rendered overlay frames for one sequence.
#[derive(Debug, Clone)]
pub struct Overlay {
    /// Frames with trajectories drawn up to each time step
    pub drawn: Vec<RgbImage>,
    /// The untouched frames
    pub original: Vec<RgbImage>,
}

impl Overlay {
    /// Write per-frame PNGs and looping GIF animations under `dir`.
    ///
    /// Layout: `image_buffer/{t:02}.png`, `image_buffer/ori_{t:02}.png`,
    /// `traj.gif`, `ori_traj.gif`.
    pub fn save(&self, dir: &Path) -> Result<(), MatchError> {
        let buffer = dir.join("image_buffer");
        fs::create_dir_all(&buffer)?;
        for (t, (drawn, original)) in self.drawn.iter().zip(&self.original).enumerate() {
            drawn.save(buffer.join(format!("{t:02}.png")))?;
            original.save(buffer.join(format!("ori_{t:02}.png")))?;
        }
        write_animation(&dir.join("traj.gif"), &self.drawn)?;
        write_animation(&dir.join("ori_traj.gif"), &self.original)?;
        info!(frames = self.drawn.len(), "Wrote trajectory overlay to {:?}", dir);
        Ok(())
    }
}

fn write_animation(path: &Path, frames: &[RgbImage]) -> Result<(), MatchError> {
    let file = BufWriter::new(File::create(path)?);
    let mut encoder = GifEncoder::new(file);
    encoder.set_repeat(Repeat::Infinite)?;
    let delay = Delay::from_numer_denom_ms(1000, ANIMATION_FPS);
    encoder.encode_frames(frames.iter().map(|frame| {
        let rgba = DynamicImage::ImageRgb8(frame.clone()).to_rgba8();
        Frame::from_parts(rgba, 0, 0, delay)
    }))?;
    Ok(())
}

/// Draw the first batch element's trajectories over its frames.
///
/// - `trajectories`: `(b, t, n, 2)`
/// - `frames`: `(b, t, c, h, w)` with values in `[0, 1]`
pub fn visualize_match(
    trajectories: ArrayView4<'_, f32>,
    frames: ArrayView5<'_, f32>,
    options: &VisualizeOptions,
) -> Result<Overlay, MatchError> {
    let (b, t, n, _) = trajectories.dim();
    let (fb, ft, _, _, _) = frames.dim();
    if b == 0 || fb == 0 || t != ft {
        return Err(MatchError::ShapeMismatch {
            what: "overlay frames",
            expected: vec![b, t],
            actual: vec![fb, ft],
        });
    }

    let mut original = Vec::with_capacity(t);
    for frame in frames.index_axis(Axis(0), 0).axis_iter(Axis(0)) {
        let image = ImageTensor::from_chw(frame.to_owned());
        original.push(image.to_rgb()?);
    }
    let mut drawn = original.clone();

    for p in 0..n {
        let path: Vec<Vec2> = trajectories
            .slice(s![0, .., p, ..])
            .outer_iter()
            .map(|xy| Vec2::new(xy[0usize], xy[1usize]))
            .collect();
        for (step, canvas) in drawn.iter_mut().enumerate() {
            draw_trajectory(canvas, &path[..=step], t, options);
        }
    }

    Ok(Overlay { drawn, original })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array4, Array5};

    #[test]
    fn test_coolwarm_endpoints() {
        assert_eq!(coolwarm(0.0), Rgb([59, 76, 192]));
        assert_eq!(coolwarm(0.5), Rgb([221, 221, 221]));
        assert_eq!(coolwarm(1.0), Rgb([180, 4, 38]));
        assert_eq!(coolwarm(f32::NAN), coolwarm(0.0));
    }

    #[test]
    fn test_draw_trajectory_marks_path_and_endpoint() {
        let mut image = RgbImage::new(20, 20);
        let path = [Vec2::new(2.0, 2.0), Vec2::new(10.0, 2.0)];
        draw_trajectory(&mut image, &path, 2, &VisualizeOptions::default());
        assert_ne!(image.get_pixel(6, 2), &Rgb([0, 0, 0]));
        assert_ne!(image.get_pixel(10, 4), &Rgb([0, 0, 0]));
        assert_eq!(image.get_pixel(2, 10), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_draw_clips_at_border() {
        let mut image = RgbImage::new(4, 4);
        let path = [Vec2::new(-5.0, 1.0), Vec2::new(10.0, 1.0)];
        draw_trajectory(&mut image, &path, 2, &VisualizeOptions::default());
        assert_ne!(image.get_pixel(0, 1), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_visualize_match_frame_counts() {
        let frames = Array5::<f32>::from_elem((1, 3, 3, 16, 16), 0.5);
        let traj = Array4::from_shape_fn((1, 3, 2, 2), |(_, t, p, _)| 4.0 + t as f32 + p as f32 * 6.0);
        let overlay = visualize_match(traj.view(), frames.view(), &VisualizeOptions::default()).unwrap();
        assert_eq!(overlay.drawn.len(), 3);
        assert_eq!(overlay.original.len(), 3);
        assert_eq!(overlay.original[0].get_pixel(0, 0), &Rgb([128, 128, 128]));
        assert_ne!(overlay.drawn[2].get_pixel(6, 6), &Rgb([128, 128, 128]));
    }

    #[test]
    fn test_visualize_match_rejects_length_mismatch() {
        let frames = Array5::<f32>::zeros((1, 2, 3, 8, 8));
        let traj = Array4::<f32>::zeros((1, 3, 1, 2));
        assert!(visualize_match(traj.view(), frames.view(), &VisualizeOptions::default()).is_err());
    }
}
