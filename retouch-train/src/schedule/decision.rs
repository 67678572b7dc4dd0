//! The per-step decision table.
//!
//! | phase     | guard                                  | action  |
//! |-----------|----------------------------------------|---------|
//! | Bootstrap | no slot updated                        | Batched |
//! | FastPhase | `step % fast_edit_rate == 0`           | Batched |
//! | SlowPhase | `step % slow_edit_rate == 0`           | Single  |
//! | any       | otherwise                              | None    |
//!
//! FastPhase holds while `step < starting_step + fast_mode_duration_steps`,
//! unless every slot is already updated, which forces SlowPhase and lifts
//! the updated-only sampling restriction.

use serde::{Deserialize, Serialize};

use crate::config::EditConfig;
use crate::error::EditError;
use crate::schedule::phase::StartingStep;

/// Edit rates and the length of the batched-edit window.
///
/// Rates are validated as non-zero by [`EditConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditRates {
    pub slow_edit_rate: u64,
    pub fast_edit_rate: u64,
    pub fast_mode_duration_steps: u64,
}

impl EditRates {
    pub fn new(slow_edit_rate: u64, fast_edit_rate: u64, fast_mode_duration_steps: u64) -> Self {
        Self {
            slow_edit_rate,
            fast_edit_rate,
            fast_mode_duration_steps,
        }
    }
}

impl From<&EditConfig> for EditRates {
    fn from(config: &EditConfig) -> Self {
        Self::new(
            config.slow_edit_rate,
            config.fast_edit_rate,
            config.fast_mode_duration_steps,
        )
    }
}

/// Aggregate view of the slot `updated` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSummary {
    pub any_updated: bool,
    pub all_updated: bool,
}

impl SlotSummary {
    pub fn from_flags(updated: &[bool]) -> Self {
        Self {
            any_updated: updated.iter().any(|&u| u),
            all_updated: !updated.is_empty() && updated.iter().all(|&u| u),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditPhase {
    /// Nothing has been edited yet
    Bootstrap,
    /// Batched correspondence edits at the fast rate
    FastPhase,
    /// Single-image edits at the slow rate
    SlowPhase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditAction {
    None,
    Single,
    Batched,
}

/// Everything the pipeline needs to act on one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDecision {
    pub phase: EditPhase,
    pub action: EditAction,
    /// Instruction for the data manager's next sampling call
    pub only_sample_updated: bool,
    /// `step < starting_step + fast_mode_duration_steps`, before any override
    pub fast_window: bool,
    /// Every slot was updated, so fast mode and restricted sampling were lifted
    pub starvation_fallback: bool,
}

/// Evaluate the decision table for `step`.
///
/// Fails with [`EditError::StaleState`] until `starting` is initialized.
pub fn decide(
    step: u64,
    starting: &StartingStep,
    rates: &EditRates,
    slots: SlotSummary,
) -> Result<StepDecision, EditError> {
    let fast_window = starting.in_fast_window(step, rates.fast_mode_duration_steps)?;

    // `(step + 1) % rate == 0` without overflowing at `u64::MAX`.
    let rate = if fast_window {
        rates.fast_edit_rate
    } else {
        rates.slow_edit_rate
    };
    let fresh_edit_due = step % rate == rate - 1;
    let mut only_sample_updated = !fresh_edit_due;
    let mut use_fast_mode = fast_window;

    let starvation_fallback = slots.all_updated;
    if starvation_fallback {
        use_fast_mode = false;
        only_sample_updated = false;
    }

    let phase = if !slots.any_updated {
        EditPhase::Bootstrap
    } else if use_fast_mode {
        EditPhase::FastPhase
    } else {
        EditPhase::SlowPhase
    };

    let action = match phase {
        EditPhase::Bootstrap => EditAction::Batched,
        EditPhase::FastPhase if step % rates.fast_edit_rate == 0 => EditAction::Batched,
        EditPhase::SlowPhase if step % rates.slow_edit_rate == 0 => EditAction::Single,
        _ => EditAction::None,
    };

    Ok(StepDecision {
        phase,
        action,
        only_sample_updated,
        fast_window,
        starvation_fallback,
    })
}
