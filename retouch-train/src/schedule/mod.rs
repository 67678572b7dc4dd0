//! Edit scheduling.
//!
//! The per-step choice between single-image edits, batched correspondence
//! edits and no edit is a pure function of the step, the recorded starting
//! step, the configured rates and the slot `updated` flags. It is kept free
//! of any model so the mutual-exclusion and starvation rules can be tested
//! on their own.

pub mod decision;
pub mod phase;

pub use decision::{EditAction, EditPhase, EditRates, SlotSummary, StepDecision, decide};
pub use phase::StartingStep;

use tracing::{debug, info};

use crate::error::EditError;

/// Stateful wrapper around [`decide`] that owns the starting step.
#[derive(Debug, Clone)]
pub struct EditScheduler {
    rates: EditRates,
    starting: StartingStep,
    fallback_reported: bool,
}

impl EditScheduler {
    pub fn new(rates: EditRates) -> Self {
        Self {
            rates,
            starting: StartingStep::Uninitialized,
            fallback_reported: false,
        }
    }

    pub fn rates(&self) -> &EditRates {
        &self.rates
    }

    pub fn starting_step(&self) -> &StartingStep {
        &self.starting
    }

    /// Decide what to do at `step`, recording the starting step on first use.
    pub fn on_step(&mut self, step: u64, updated: &[bool]) -> Result<StepDecision, EditError> {
        self.starting.initialize(step);
        let decision = decide(step, &self.starting, &self.rates, SlotSummary::from_flags(updated))?;

        if decision.starvation_fallback && !self.fallback_reported {
            info!(step, "Every slot edited; falling back to per-image edits");
            self.fallback_reported = true;
        }
        debug!(
            step,
            phase = ?decision.phase,
            action = ?decision.action,
            only_sample_updated = decision.only_sample_updated,
            "Edit decision"
        );
        Ok(decision)
    }
}
