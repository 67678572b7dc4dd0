//! Starting-step bookkeeping.

use crate::error::EditError;

/// The step at which editing started, captured on the first scheduler call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartingStep {
    #[default]
    Uninitialized,
    Initialized(u64),
}

impl StartingStep {
    /// Record `step` if nothing is recorded yet and return the starting step.
    pub fn initialize(&mut self, step: u64) -> u64 {
        match *self {
            StartingStep::Initialized(start) => start,
            StartingStep::Uninitialized => {
                *self = StartingStep::Initialized(step);
                step
            }
        }
    }

    pub fn get(&self) -> Result<u64, EditError> {
        match *self {
            StartingStep::Initialized(start) => Ok(start),
            StartingStep::Uninitialized => Err(EditError::StaleState(
                "starting step is not established; call step() first",
            )),
        }
    }

    /// Whether `step` falls inside the batched-edit window.
    pub fn in_fast_window(&self, step: u64, duration: u64) -> Result<bool, EditError> {
        Ok(step < self.get()?.saturating_add(duration))
    }
}
