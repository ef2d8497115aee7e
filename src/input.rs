//! Window input for the desktop host.
//!
//! [`Input`] turns raw winit events into the few things the renderer cares
//! about: pointer and touch positions, which feed the tilt adapter, and
//! keyboard shortcuts.
//!
//! | Key     | Action                         |
//! |---------|--------------------------------|
//! | `G`     | orientation (gyroscope) input  |
//! | `P`     | pointer input                  |
//! | `L`     | lock / unlock the tilt target  |
//! | `Space` | color surge                    |
//! | `Esc`   | quit                           |

use std::collections::HashSet;

use glam::Vec2;
use winit::event::{ElementState, TouchPhase, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// A keyboard action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shortcut {
    OrientationMode,
    PointerMode,
    ToggleLock,
    Surge,
    Quit,
}

impl Shortcut {
    pub fn from_key(key: KeyCode) -> Option<Self> {
        match key {
            KeyCode::KeyG => Some(Shortcut::OrientationMode),
            KeyCode::KeyP => Some(Shortcut::PointerMode),
            KeyCode::KeyL => Some(Shortcut::ToggleLock),
            KeyCode::Space => Some(Shortcut::Surge),
            KeyCode::Escape => Some(Shortcut::Quit),
            _ => None,
        }
    }
}

/// Something the renderer should react to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Pointer or touch position in physical pixels.
    Pointer(Vec2),
    Shortcut(Shortcut),
}

/// Tracks held keys so shortcuts fire once per press, not on key repeat.
#[derive(Debug, Default)]
pub struct Input {
    keys_held: HashSet<KeyCode>,
    pointer: Option<Vec2>,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last known pointer position, if the pointer has entered the window.
    pub fn pointer(&self) -> Option<Vec2> {
        self.pointer
    }

    pub fn key_held(&self, key: KeyCode) -> bool {
        self.keys_held.contains(&key)
    }

    /// Process a winit window event.
    pub fn handle_event(&mut self, event: &WindowEvent) -> Option<InputEvent> {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(key) = event.physical_key else {
                    return None;
                };
                match event.state {
                    ElementState::Pressed => self.key_down(key).map(InputEvent::Shortcut),
                    ElementState::Released => {
                        self.key_up(key);
                        None
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                Some(self.move_pointer(Vec2::new(position.x as f32, position.y as f32)))
            }
            WindowEvent::CursorLeft { .. } => {
                self.pointer = None;
                None
            }
            WindowEvent::Touch(touch) => match touch.phase {
                TouchPhase::Started | TouchPhase::Moved => Some(self.move_pointer(Vec2::new(
                    touch.location.x as f32,
                    touch.location.y as f32,
                ))),
                TouchPhase::Ended | TouchPhase::Cancelled => None,
            },
            WindowEvent::Focused(false) => {
                self.keys_held.clear();
                None
            }
            _ => None,
        }
    }

    fn move_pointer(&mut self, position: Vec2) -> InputEvent {
        self.pointer = Some(position);
        InputEvent::Pointer(position)
    }

    fn key_down(&mut self, key: KeyCode) -> Option<Shortcut> {
        if !self.keys_held.insert(key) {
            return None;
        }
        Shortcut::from_key(key)
    }

    fn key_up(&mut self, key: KeyCode) {
        self.keys_held.remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortcut_keys() {
        assert_eq!(Shortcut::from_key(KeyCode::KeyG), Some(Shortcut::OrientationMode));
        assert_eq!(Shortcut::from_key(KeyCode::KeyP), Some(Shortcut::PointerMode));
        assert_eq!(Shortcut::from_key(KeyCode::KeyL), Some(Shortcut::ToggleLock));
        assert_eq!(Shortcut::from_key(KeyCode::Space), Some(Shortcut::Surge));
        assert_eq!(Shortcut::from_key(KeyCode::Escape), Some(Shortcut::Quit));
        assert_eq!(Shortcut::from_key(KeyCode::KeyQ), None);
    }

    #[test]
    fn test_key_repeat_fires_once() {
        let mut input = Input::new();
        assert_eq!(input.key_down(KeyCode::KeyL), Some(Shortcut::ToggleLock));
        assert!(input.key_held(KeyCode::KeyL));
        assert_eq!(input.key_down(KeyCode::KeyL), None);

        input.key_up(KeyCode::KeyL);
        assert!(!input.key_held(KeyCode::KeyL));
        assert_eq!(input.key_down(KeyCode::KeyL), Some(Shortcut::ToggleLock));
    }

    #[test]
    fn test_pointer_tracking() {
        let mut input = Input::new();
        assert_eq!(input.pointer(), None);
        let event = input.move_pointer(Vec2::new(400.0, 300.0));
        assert_eq!(event, InputEvent::Pointer(Vec2::new(400.0, 300.0)));
        assert_eq!(input.pointer(), Some(Vec2::new(400.0, 300.0)));
    }
}
