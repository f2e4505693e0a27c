//! Pre-game countdown state machine.
//! The room actor owns the 1 Hz timer; this type only tracks the
//! Idle -> Running -> (finished | cancelled) transitions so reentrant
//! starts and post-cancellation ticks are structurally impossible.

use super::COUNTDOWN_SECONDS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Running { remaining: u32 },
}

/// Per-room countdown. Both terminal outcomes return to `Idle`, so a
/// later join-to-full runs a fresh countdown.
#[derive(Debug, Clone, Copy)]
pub struct Countdown {
    state: State,
}

impl Countdown {
    pub fn new() -> Self {
        Self { state: State::Idle }
    }

    /// Enter `Running`. Returns the initial seconds value to broadcast,
    /// or None when a countdown is already active (reentrant start).
    pub fn start(&mut self) -> Option<u32> {
        match self.state {
            State::Idle => {
                self.state = State::Running {
                    remaining: COUNTDOWN_SECONDS,
                };
                Some(COUNTDOWN_SECONDS)
            }
            State::Running { .. } => None,
        }
    }

    /// Consume one second. Returns the new remaining value to broadcast;
    /// 0 means the countdown finished and the game should start. None
    /// when no countdown is running.
    pub fn tick(&mut self) -> Option<u32> {
        match self.state {
            State::Running { remaining } => {
                let remaining = remaining.saturating_sub(1);
                self.state = if remaining == 0 {
                    State::Idle
                } else {
                    State::Running { remaining }
                };
                Some(remaining)
            }
            State::Idle => None,
        }
    }

    /// Stop a running countdown. Returns true if one was active.
    pub fn cancel(&mut self) -> bool {
        match self.state {
            State::Running { .. } => {
                self.state = State::Idle;
                true
            }
            State::Idle => false,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running { .. })
    }
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new()
    }
}
