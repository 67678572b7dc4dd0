//! Correspondence latent example
//!
//! Tracks a grid of points through a short sequence of sliding frames and
//! draws initial latents that agree along every trajectory, then reports how
//! well the latents match across frames at the tracked positions.
//!
//! Usage:
//!   cargo run --example correspondence_latents

use std::error::Error;
use ndarray::{Array4, Array5, ArrayView3, ArrayView5, Axis, s};
use rand::SeedableRng;
use rand::rngs::StdRng;
use retouch_match::{MatchError, MatchOptions, PointTracker, init_latents, match_trajectories};
use tracing::info;

const FRAMES: usize = 6;
const SIZE: usize = 48;
const SPEED: f32 = 1.0;

/// Follows a pattern that slides right by `SPEED` pixels per frame.
struct SlideTracker;

impl PointTracker for SlideTracker {
    fn track(
        &mut self,
        query_points: ArrayView3<'_, f32>,
        frames: ArrayView5<'_, f32>,
        _iterations: usize,
    ) -> Result<Vec<Array4<f32>>, MatchError> {
        let (b, n, _) = query_points.dim();
        let (_, t, _, _, w) = frames.dim();
        let max_x = w as f32 - 1.0;
        Ok(vec![Array4::from_shape_fn((b, t, n, 2), |(bi, ti, p, a)| {
            let q = query_points[[bi, p, a]];
            if a == 0 { (q + SPEED * ti as f32).min(max_x) } else { q }
        })])
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let frames = Array5::from_shape_fn((1, FRAMES, 3, SIZE, SIZE), |(_, t, c, y, x)| {
        let phase = (x as f32 - SPEED * t as f32 + y as f32) * 0.2 + c as f32;
        0.5 + 0.4 * phase.sin()
    });

    let options = MatchOptions::new(SIZE, SIZE).with_grid_size(6);
    let mut tracker = SlideTracker;
    let matched = match_trajectories(&mut tracker, frames.view(), &options)?;
    info!(
        "Tracked {} points through {} frames",
        matched.flat_indices.len_of(Axis(2)),
        FRAMES
    );

    let flat = matched.flat_indices.view();
    let mut rng = StdRng::seed_from_u64(7);
    let latents = init_latents([FRAMES, 4, SIZE, SIZE], flat, true, &mut rng)?;

    let mut worst = 0.0f32;
    for p in 0..flat.len_of(Axis(2)) {
        let index = flat[[0, 0, p]];
        let reference = latents
            .slice(s![0, 0, .., .., ..])
            .into_shape_with_order((4, SIZE * SIZE))?
            .column(index)
            .to_owned();
        for t in 1..FRAMES {
            let other = flat[[0, t, p]];
            let values = latents
                .slice(s![0, t, .., .., ..])
                .into_shape_with_order((4, SIZE * SIZE))?
                .column(other)
                .to_owned();
            let diff = (&values - &reference).mapv(f32::abs).fold(0.0f32, |a, &b| a.max(b));
            worst = worst.max(diff);
        }
    }
    info!("Largest latent disagreement along trajectories: {:e}", worst);

    let unmatched = init_latents([FRAMES, 4, SIZE, SIZE], flat, false, &mut rng)?;
    info!(
        "Unmatched latents: mean {:.3}, matched latents: mean {:.3}",
        unmatched.mean().unwrap_or_default(),
        latents.mean().unwrap_or_default()
    );

    info!("Correspondence latent example completed successfully!");
    Ok(())
}
