//! Edit schedule example
//!
//! This example walks the edit scheduler over the first training steps with
//! the default configuration and logs every edit it would trigger, marking
//! slots as updated the way the pipeline does.
//!
//! Usage:
//!   cargo run --example edit_schedule -- [steps] [slots]

use std::error::Error;
use retouch_data::DatasetCursor;
use retouch_train::schedule::EditRates;
use retouch_train::{EditAction, EditConfig, EditPhase, EditScheduler};
use tracing::info;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let steps: u64 = args.next().map(|s| s.parse()).transpose()?.unwrap_or(1200);
    let slots: usize = args.next().map(|s| s.parse()).transpose()?.unwrap_or(10);

    let config = EditConfig::default();
    let mut scheduler = EditScheduler::new(EditRates::from(&config));
    let mut cursor = DatasetCursor::new(slots)?;
    let mut updated = vec![false; slots];

    info!(
        "Scheduling {} steps over {} slots (slow rate {}, fast rate {}, fast window {})",
        steps, slots, config.slow_edit_rate, config.fast_edit_rate, config.fast_mode_duration_steps
    );

    let mut phase_changes = 0;
    let mut last_phase = None;
    for step in 0..steps {
        let decision = scheduler.on_step(step, &updated)?;
        if last_phase != Some(decision.phase) {
            info!("Step {}: entering {:?}", step, decision.phase);
            phase_changes += 1;
            last_phase = Some(decision.phase);
        }

        let count = match decision.action {
            EditAction::Single => config.slow_edit_count,
            EditAction::Batched => config.fast_edit_count,
            EditAction::None => continue,
        };
        let edited: Vec<usize> = (0..count).map(|_| cursor.advance()).collect();
        for &slot in &edited {
            updated[slot] = true;
        }
        if decision.phase != EditPhase::SlowPhase || step % 100 == 0 {
            info!(
                "Step {}: {:?} edit of slots {:?} ({}/{} updated)",
                step,
                decision.action,
                edited,
                updated.iter().filter(|&&u| u).count(),
                slots
            );
        }
    }

    info!("Edit schedule example completed with {} phase changes", phase_changes);
    Ok(())
}
