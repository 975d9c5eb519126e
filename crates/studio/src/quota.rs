//! Per-session render cap.
//!
//! The cap is [`MAX_RENDERS`] and has no reset path. A snapshot's
//! `render_count` is part of the undoable history, but the passes a session
//! has used are tracked by [`RenderBudget`], which undo never touches. Once
//! the budget is spent the session rejects further renders.

use chrono::{DateTime, Utc};

use crate::error::RenderError;
use crate::session::{RenderRecord, SessionState, MAX_RENDERS};

pub fn can_render(state: &SessionState) -> bool {
    state.render_count < MAX_RENDERS
}

pub fn remaining(state: &SessionState) -> u32 {
    MAX_RENDERS.saturating_sub(state.render_count)
}

/// Reject with [`RenderError::QuotaExceeded`] once the cap is reached.
pub fn check(state: &SessionState) -> Result<(), RenderError> {
    if can_render(state) {
        Ok(())
    } else {
        Err(exceeded(state.render_count))
    }
}

/// Next state with one more render logged. Apply it through the session store
/// so the count change is undoable.
pub fn record_render(state: &SessionState, now: DateTime<Utc>) -> Result<SessionState, RenderError> {
    check(state)?;
    Ok(log_pass(state, state.render_count + 1, now))
}

/// Render passes used over a session's life.
///
/// Undoing a render restores the snapshot's `render_count` but does not give
/// the pass back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderBudget {
    consumed: u32,
}

impl RenderBudget {
    /// Resume from a saved session: the highest of the stored pass count, the
    /// snapshot's `render_count`, and the last logged pass.
    pub fn resume(state: &SessionState, render_passes: u32) -> Self {
        let logged = state.render_history.iter().map(|r| r.pass).max().unwrap_or(0);
        Self {
            consumed: render_passes.max(state.render_count).max(logged),
        }
    }

    pub fn consumed(&self) -> u32 {
        self.consumed
    }

    /// Pass number the next render will get.
    pub fn next_pass(&self) -> u32 {
        self.consumed + 1
    }

    pub fn can_render(&self) -> bool {
        self.consumed < MAX_RENDERS
    }

    pub fn remaining(&self) -> u32 {
        MAX_RENDERS.saturating_sub(self.consumed)
    }

    pub fn check(&self) -> Result<(), RenderError> {
        if self.can_render() {
            Ok(())
        } else {
            Err(exceeded(self.consumed))
        }
    }

    /// Spend one pass and return `state` with it logged.
    pub fn record(&mut self, state: &SessionState, now: DateTime<Utc>) -> Result<SessionState, RenderError> {
        self.check()?;
        self.consumed += 1;
        Ok(log_pass(state, self.consumed, now))
    }
}

fn exceeded(render_count: u32) -> RenderError {
    RenderError::QuotaExceeded {
        render_count,
        max_renders: MAX_RENDERS,
    }
}

fn log_pass(state: &SessionState, pass: u32, now: DateTime<Utc>) -> SessionState {
    let mut next = state.clone();
    next.render_count = pass;
    next.last_render_time = Some(now);
    next.render_history.push(RenderRecord { pass, timestamp: now });
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_session_can_render() {
        let state = SessionState::default();
        assert!(can_render(&state));
        assert_eq!(remaining(&state), 3);
    }

    #[test]
    fn test_record_render_logs_pass() {
        let now = Utc::now();
        let state = record_render(&SessionState::default(), now).unwrap();

        assert_eq!(state.render_count, 1);
        assert_eq!(state.last_render_time, Some(now));
        assert_eq!(state.render_history, vec![RenderRecord { pass: 1, timestamp: now }]);
        assert_eq!(remaining(&state), 2);
    }

    #[test]
    fn test_cap_is_terminal() {
        let mut state = SessionState::default();
        for _ in 0..3 {
            state = record_render(&state, Utc::now()).unwrap();
        }
        assert!(!can_render(&state));
        assert_eq!(remaining(&state), 0);

        let err = record_render(&state, Utc::now()).unwrap_err();
        assert_eq!(
            err,
            RenderError::QuotaExceeded {
                render_count: 3,
                max_renders: 3
            }
        );
        assert_eq!(state.render_count, 3);
    }

    #[test]
    fn test_cap_ignores_stored_max_renders() {
        let mut state = SessionState::default();
        state.render_count = 3;
        state.max_renders = 100;

        assert!(!can_render(&state));
        assert_eq!(remaining(&state), 0);
        assert!(matches!(
            check(&state),
            Err(RenderError::QuotaExceeded { max_renders: 3, .. })
        ));
    }

    #[test]
    fn test_budget_survives_rewound_snapshot() {
        let mut budget = RenderBudget::default();
        let base = SessionState::default();

        let mut state = base.clone();
        for pass in 1..=3 {
            state = budget.record(&state, Utc::now()).unwrap();
            assert_eq!(state.render_count, pass);
        }

        // The snapshot from before any render still has its passes spent
        let err = budget.record(&base, Utc::now()).unwrap_err();
        assert_eq!(
            err,
            RenderError::QuotaExceeded {
                render_count: 3,
                max_renders: 3
            }
        );
        assert_eq!(budget.consumed(), 3);
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn test_pass_numbers_continue_after_rewind() {
        let mut budget = RenderBudget::default();
        let base = SessionState::default();

        budget.record(&base, Utc::now()).unwrap();
        let second = budget.record(&base, Utc::now()).unwrap();

        assert_eq!(second.render_count, 2);
        assert_eq!(second.render_history[0].pass, 2);
        assert_eq!(budget.next_pass(), 3);
    }

    #[test]
    fn test_resume_takes_highest_record() {
        let mut state = SessionState::default();
        state.render_count = 1;
        state.render_history.push(RenderRecord {
            pass: 2,
            timestamp: Utc::now(),
        });

        assert_eq!(RenderBudget::resume(&state, 0).consumed(), 2);
        assert_eq!(RenderBudget::resume(&state, 3).consumed(), 3);
        assert!(!RenderBudget::resume(&state, 3).can_render());
    }
}
