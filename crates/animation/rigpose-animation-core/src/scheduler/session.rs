//! Shared tick-loop registration and evaluator session ownership.
//!
//! There is one loop and one evaluator session for all rigs. Only
//! `SchedulerState` starts or stops them, and it releases them only when no
//! rig requires them any more, never per rig.

use log::debug;

use crate::host::{ClipEvaluator, SceneGraph};

#[derive(Debug, Default)]
pub struct SchedulerState {
    tick_registered: bool,
    /// Host timestamp of the previous tick; `None` until the first tick after
    /// (re)registration.
    last_tick: Option<f64>,
}

impl SchedulerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_tick_registered(&self) -> bool {
        self.tick_registered
    }

    /// Open the evaluator session and register the tick loop if needed.
    pub fn ensure_running<S, E>(&mut self, scene: &mut S, evaluator: &mut E)
    where
        S: SceneGraph,
        E: ClipEvaluator<S>,
    {
        if !evaluator.is_session_active() {
            evaluator.start_session(scene);
        }
        if !self.tick_registered {
            self.tick_registered = true;
            self.last_tick = None;
            debug!("tick loop registered");
        }
    }

    /// Release the loop and session unless something still requires them.
    /// Returns true when a release happened.
    pub fn release_if_idle<S, E>(
        &mut self,
        still_required: bool,
        scene: &mut S,
        evaluator: &mut E,
    ) -> bool
    where
        S: SceneGraph,
        E: ClipEvaluator<S>,
    {
        if still_required || (!self.tick_registered && !evaluator.is_session_active()) {
            return false;
        }
        self.shutdown(scene, evaluator);
        true
    }

    /// Unregister the loop and close the session. Safe to repeat.
    pub fn shutdown<S, E>(&mut self, scene: &mut S, evaluator: &mut E)
    where
        S: SceneGraph,
        E: ClipEvaluator<S>,
    {
        if self.tick_registered {
            debug!("tick loop unregistered");
        }
        self.tick_registered = false;
        self.last_tick = None;
        if evaluator.is_session_active() {
            evaluator.stop_session(scene);
        }
    }

    /// Seconds elapsed since the previous tick. The first tick after
    /// registration advances by zero; a clock going backwards advances by zero.
    pub fn advance_clock(&mut self, now_seconds: f64) -> f32 {
        let dt = match self.last_tick {
            Some(prev) if now_seconds.is_finite() => (now_seconds - prev).max(0.0),
            _ => 0.0,
        };
        if now_seconds.is_finite() {
            self.last_tick = Some(now_seconds);
        }
        dt as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_after_registration_is_zero() {
        let mut s = SchedulerState::new();
        assert_eq!(s.advance_clock(10.0), 0.0);
        assert_eq!(s.advance_clock(10.5), 0.5);
        assert_eq!(s.advance_clock(10.25), 0.0);
        assert_eq!(s.advance_clock(f64::NAN), 0.0);
        assert_eq!(s.advance_clock(11.25), 1.0);
    }
}
