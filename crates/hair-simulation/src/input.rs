//! Polled input state
//!
//! The window layer folds its events into an [`InputState`] and hands one
//! [`InputSnapshot`] per frame to the loop. Discrete actions such as the pause
//! toggle compare against the previous snapshot, so holding a key fires once.

use bitflags::bitflags;
use glam::Vec2;

bitflags! {
    /// Logical keys, independent of the windowing library
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Keys: u32 {
        const FORWARD = 1 << 0;
        const BACK = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
        /// Left mouse button; the camera only looks around while held
        const LOOK = 1 << 4;
        const PAUSE = 1 << 5;
        const RESET = 1 << 6;
        const ROOT_FORWARD = 1 << 7;
        const ROOT_BACK = 1 << 8;
        const ROOT_LEFT = 1 << 9;
        const ROOT_RIGHT = 1 << 10;
        const ROOT_YAW_LEFT = 1 << 11;
        const ROOT_YAW_RIGHT = 1 << 12;
        const EXIT = 1 << 13;
    }
}

/// Input as polled once per frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InputSnapshot {
    pub keys: Keys,
    /// Mouse motion since the previous snapshot, in pixels
    pub mouse_delta: Vec2,
}

impl InputSnapshot {
    pub fn held(&self, keys: Keys) -> bool {
        self.keys.contains(keys)
    }

    /// Down now, up in `previous`
    pub fn pressed(&self, previous: &InputSnapshot, keys: Keys) -> bool {
        self.held(keys) && !previous.held(keys)
    }

    /// -1, 0 or 1 from a pair of opposing keys
    pub fn axis(&self, negative: Keys, positive: Keys) -> f32 {
        self.held(positive) as i32 as f32 - self.held(negative) as i32 as f32
    }
}

/// Accumulates events between polls
#[derive(Debug, Default)]
pub struct InputState {
    keys: Keys,
    mouse_delta: Vec2,
}

impl InputState {
    pub fn set(&mut self, keys: Keys, down: bool) {
        self.keys.set(keys, down);
    }

    pub fn add_mouse_motion(&mut self, delta: Vec2) {
        self.mouse_delta += delta;
    }

    /// Current state; mouse motion is consumed
    pub fn poll(&mut self) -> InputSnapshot {
        InputSnapshot {
            keys: self.keys,
            mouse_delta: std::mem::take(&mut self.mouse_delta),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_is_an_edge() {
        let mut state = InputState::default();
        let idle = state.poll();

        state.set(Keys::PAUSE, true);
        let down = state.poll();
        let held = state.poll();

        assert!(down.pressed(&idle, Keys::PAUSE));
        assert!(!held.pressed(&down, Keys::PAUSE));
        assert!(held.held(Keys::PAUSE));
    }

    #[test]
    fn mouse_motion_is_consumed_by_poll() {
        let mut state = InputState::default();
        state.add_mouse_motion(Vec2::new(3.0, -1.0));
        state.add_mouse_motion(Vec2::new(1.0, 1.0));
        assert_eq!(state.poll().mouse_delta, Vec2::new(4.0, 0.0));
        assert_eq!(state.poll().mouse_delta, Vec2::ZERO);
    }

    #[test]
    fn opposing_keys_cancel() {
        let snapshot = InputSnapshot {
            keys: Keys::LEFT | Keys::RIGHT | Keys::FORWARD,
            ..Default::default()
        };
        assert_eq!(snapshot.axis(Keys::LEFT, Keys::RIGHT), 0.0);
        assert_eq!(snapshot.axis(Keys::BACK, Keys::FORWARD), 1.0);
    }
}
