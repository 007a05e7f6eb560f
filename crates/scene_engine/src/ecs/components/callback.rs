//! Timed callbacks
//!
//! A small finite-state timer used for short-lived per-entity sequences
//! (fades, turn delays). The [`CallbackSystem`](crate::ecs::systems::CallbackSystem)
//! advances it and posts a `CallbackFired` message each time it elapses.

use crate::ecs::Component;

/// Timer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallbackState {
    /// Waiting for `start`
    #[default]
    Idle,
    /// Counting down
    Running,
    /// Elapsed and not repeating
    Finished,
}

/// Timed callback component
#[derive(Debug, Clone, PartialEq)]
pub struct TimedCallbackComponent {
    /// Identifier carried by the fired message
    pub id: u32,
    /// Seconds per cycle
    pub duration: f32,
    /// Restart after firing instead of finishing
    pub repeat: bool,
    /// Destroy the owning entity once finished
    pub destroy_on_finish: bool,
    pub(crate) state: CallbackState,
    pub(crate) elapsed: f32,
    pub(crate) fired: u32,
}

impl Component for TimedCallbackComponent {}

impl TimedCallbackComponent {
    /// Idle one-shot timer
    pub fn new(id: u32, duration: f32) -> Self {
        Self {
            id,
            duration,
            repeat: false,
            destroy_on_finish: false,
            state: CallbackState::Idle,
            elapsed: 0.0,
            fired: 0,
        }
    }

    /// Builder: fire every `duration` seconds until cancelled
    #[must_use]
    pub fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }

    /// Builder: destroy the entity when the timer finishes
    #[must_use]
    pub fn destroy_when_finished(mut self) -> Self {
        self.destroy_on_finish = true;
        self
    }

    /// Builder: start immediately
    #[must_use]
    pub fn started(mut self) -> Self {
        self.start();
        self
    }

    /// (Re)start from zero
    pub fn start(&mut self) {
        self.state = CallbackState::Running;
        self.elapsed = 0.0;
    }

    /// Stop without firing
    pub fn cancel(&mut self) {
        self.state = CallbackState::Idle;
        self.elapsed = 0.0;
    }

    /// Current state
    pub fn state(&self) -> CallbackState {
        self.state
    }

    /// Fraction of the current cycle elapsed, in [0, 1]
    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            return if self.state == CallbackState::Idle { 0.0 } else { 1.0 };
        }
        (self.elapsed / self.duration).clamp(0.0, 1.0)
    }

    /// Times the timer has fired
    pub fn fired_count(&self) -> u32 {
        self.fired
    }
}
