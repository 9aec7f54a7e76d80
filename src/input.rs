use std::collections::HashSet;

use glam::Vec2;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Identifier for a keyboard key the viewer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
}

/// Friendly names for the non-printable keys the viewer uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Escape,
    Space,
    LeftShift,
}

/// Interior-mutable snapshot of the user's input.
///
/// Held keys persist until released; mouse and scroll deltas accumulate
/// between frames and are drained once per frame by the camera update.
#[derive(Debug, Default)]
pub struct InputState {
    keys: RwLock<HashSet<KeyCode>>,
    mouse_delta: RwLock<Vec2>,
    scroll_delta: RwLock<f32>,
    cursor_position: RwLock<Vec2>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key_down(&self, key: KeyCode) {
        self.keys.write().insert(key);
    }

    pub fn set_key_up(&self, key: KeyCode) {
        self.keys.write().remove(&key);
    }

    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys.read().contains(&key)
    }

    pub fn is_character_down(&self, ch: char) -> bool {
        self.is_key_down(KeyCode::Character(ch.to_ascii_uppercase()))
    }

    pub fn add_mouse_delta(&self, delta: Vec2) {
        *self.mouse_delta.write() += delta;
    }

    /// Returns the mouse motion accumulated since the last call and resets
    /// the accumulator.
    pub fn take_mouse_delta(&self) -> Vec2 {
        std::mem::take(&mut *self.mouse_delta.write())
    }

    pub fn add_scroll(&self, delta: f32) {
        *self.scroll_delta.write() += delta;
    }

    pub fn take_scroll(&self) -> f32 {
        std::mem::take(&mut *self.scroll_delta.write())
    }

    pub fn set_cursor_position(&self, position: Vec2) {
        *self.cursor_position.write() = position;
    }

    pub fn cursor_position(&self) -> Vec2 {
        *self.cursor_position.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_held_keys() {
        let state = InputState::new();
        state.set_key_down(KeyCode::Character('W'));
        assert!(state.is_character_down('w'));
        state.set_key_up(KeyCode::Character('W'));
        assert!(!state.is_character_down('w'));
    }

    #[test]
    fn named_keys_are_distinct_from_characters() {
        let state = InputState::new();
        state.set_key_down(KeyCode::Named(NamedKey::Escape));
        assert!(state.is_key_down(KeyCode::Named(NamedKey::Escape)));
        assert!(!state.is_character_down('e'));
    }

    #[test]
    fn mouse_delta_accumulates_and_drains() {
        let state = InputState::new();
        state.add_mouse_delta(Vec2::new(2.0, -1.0));
        state.add_mouse_delta(Vec2::new(1.0, 1.0));
        assert_eq!(state.take_mouse_delta(), Vec2::new(3.0, 0.0));
        assert_eq!(state.take_mouse_delta(), Vec2::ZERO);
    }

    #[test]
    fn scroll_drains_to_zero() {
        let state = InputState::new();
        state.add_scroll(1.5);
        assert_eq!(state.take_scroll(), 1.5);
        assert_eq!(state.take_scroll(), 0.0);
    }
}
