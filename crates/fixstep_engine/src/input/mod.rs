//! Input state queries
//!
//! The core never talks to input devices. An external input layer implements
//! [`InputSource`]; the update scheduler polls it exactly once per simulation
//! tick and hands the resulting read-only [`InputSnapshot`] to every
//! updatable component through its update context.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::foundation::math::Vec2;

/// Read-only capture of input device state at one simulation tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSnapshot {
    keys_down: HashSet<KeyCode>,
    buttons_down: HashSet<MouseButton>,
    mouse_position: Vec2,
}

impl InputSnapshot {
    /// Snapshot with nothing pressed
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builder: mark a key as held
    pub fn with_key(mut self, key: KeyCode) -> Self {
        self.keys_down.insert(key);
        self
    }

    /// Builder: mark a mouse button as held
    pub fn with_button(mut self, button: MouseButton) -> Self {
        self.buttons_down.insert(button);
        self
    }

    /// Builder: set the cursor position
    pub fn with_mouse_position(mut self, position: Vec2) -> Self {
        self.mouse_position = position;
        self
    }

    /// Whether a key is held
    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys_down.contains(&key)
    }

    /// Whether a mouse button is held
    pub fn is_button_down(&self, button: MouseButton) -> bool {
        self.buttons_down.contains(&button)
    }

    /// Cursor position in surface coordinates
    pub fn mouse_position(&self) -> Vec2 {
        self.mouse_position
    }
}

/// Provider of input snapshots, polled once per simulation tick
pub trait InputSource: Send {
    /// Capture the current input state
    fn poll(&mut self) -> InputSnapshot;
}

/// Input source that never reports anything (headless runs)
#[derive(Debug, Default, Clone, Copy)]
pub struct NullInput;

impl InputSource for NullInput {
    fn poll(&mut self) -> InputSnapshot {
        InputSnapshot::empty()
    }
}

/// Input state shared with a windowing/event layer
///
/// The event layer records key and button transitions through one clone;
/// the game loop polls another.
#[derive(Debug, Clone, Default)]
pub struct SharedInput {
    state: Arc<Mutex<InputSnapshot>>,
}

impl SharedInput {
    /// Create an empty shared input state
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle key input
    pub fn handle_key_input(&self, key: KeyCode, pressed: bool) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if pressed {
            state.keys_down.insert(key);
        } else {
            state.keys_down.remove(&key);
        }
    }

    /// Handle mouse button input
    pub fn handle_mouse_button(&self, button: MouseButton, pressed: bool) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if pressed {
            state.buttons_down.insert(button);
        } else {
            state.buttons_down.remove(&button);
        }
    }

    /// Handle mouse movement
    pub fn handle_mouse_move(&self, x: f32, y: f32) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.mouse_position = Vec2::new(x, y);
    }
}

impl InputSource for SharedInput {
    fn poll(&mut self) -> InputSnapshot {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Key codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A key
    A,
    /// B key
    B,
    /// C key
    C,
    /// D key
    D,
    /// E key
    E,
    /// F key
    F,
    /// G key
    G,
    /// H key
    H,
    /// I key
    I,
    /// J key
    J,
    /// K key
    K,
    /// L key
    L,
    /// M key
    M,
    /// N key
    N,
    /// O key
    O,
    /// P key
    P,
    /// Q key
    Q,
    /// R key
    R,
    /// S key
    S,
    /// T key
    T,
    /// U key
    U,
    /// V key
    V,
    /// W key
    W,
    /// X key
    X,
    /// Y key
    Y,
    /// Z key
    Z,
    /// Space key
    Space,
    /// Enter key
    Enter,
    /// Escape key
    Escape,
    /// Up arrow
    Up,
    /// Down arrow
    Down,
    /// Left arrow
    Left,
    /// Right arrow
    Right,
}

/// Mouse buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// Left mouse button
    Left,
    /// Right mouse button
    Right,
    /// Middle mouse button
    Middle,
}
