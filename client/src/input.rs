//! Keyboard events to [`Intent`] conversion

use macroquad::prelude::{is_key_pressed, is_key_released, KeyCode};
use shared::Intent;

/// Keys the client reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Left,
    Right,
    Up,
    Down,
    Fire,
    ToggleConsole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Down(Key),
    Up(Key),
}

const BINDINGS: [(KeyCode, Key); 6] = [
    (KeyCode::Left, Key::Left),
    (KeyCode::Right, Key::Right),
    (KeyCode::Up, Key::Up),
    (KeyCode::Down, Key::Down),
    (KeyCode::Space, Key::Fire),
    (KeyCode::C, Key::ToggleConsole),
];

/// Collects the key transitions macroquad saw since the last frame.
pub fn poll_key_events() -> Vec<KeyEvent> {
    let mut events = Vec::new();

    for (code, key) in BINDINGS {
        if is_key_pressed(code) {
            events.push(KeyEvent::Down(key));
        }
        if is_key_released(code) {
            events.push(KeyEvent::Up(key));
        }
    }

    events
}

/// Held-key state that the local [`Intent`] is derived from
#[derive(Debug, Default, Clone)]
pub struct IntentTracker {
    left: bool,
    right: bool,
    up: bool,
    down: bool,
    fire: bool,
    console_visible: bool,
}

impl IntentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one event. Returns true when it changed the intent.
    pub fn apply(&mut self, event: KeyEvent) -> bool {
        let before = self.intent();

        match event {
            KeyEvent::Down(Key::ToggleConsole) => self.console_visible = !self.console_visible,
            KeyEvent::Up(Key::ToggleConsole) => {}
            KeyEvent::Down(key) => self.set(key, true),
            KeyEvent::Up(key) => self.set(key, false),
        }

        self.intent() != before
    }

    fn set(&mut self, key: Key, held: bool) {
        match key {
            Key::Left => self.left = held,
            Key::Right => self.right = held,
            Key::Up => self.up = held,
            Key::Down => self.down = held,
            Key::Fire => self.fire = held,
            Key::ToggleConsole => {}
        }
    }

    /// Left wins over right and up wins over down when both are held.
    pub fn intent(&self) -> Intent {
        let move_x = if self.left {
            -1
        } else if self.right {
            1
        } else {
            0
        };
        let move_y = if self.up {
            -1
        } else if self.down {
            1
        } else {
            0
        };

        Intent::new(move_x, move_y, self.fire)
    }

    pub fn console_visible(&self) -> bool {
        self.console_visible
    }
}
