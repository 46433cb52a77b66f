use std::collections::HashSet;

use glam::Vec2;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Keyboard and mouse state for one frame.
///
/// The runner feeds window events in and hands `&Input` to the app's
/// `update`. Edge state (`pressed`/`released`, deltas, clicks) is cleared by
/// [`begin_frame`](Self::begin_frame).
#[derive(Debug, Default)]
pub struct Input {
    keys_down: HashSet<KeyCode>,
    keys_pressed: HashSet<KeyCode>,
    keys_released: HashSet<KeyCode>,
    mouse_buttons_down: HashSet<MouseButton>,
    mouse_buttons_pressed: HashSet<MouseButton>,
    mouse_buttons_released: HashSet<MouseButton>,
    mouse_position: Vec2,
    mouse_delta: Vec2,
    scroll_delta: Vec2,
    primary_click: Option<Vec2>,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call at the start of each frame to reset per-frame state.
    pub fn begin_frame(&mut self) {
        self.keys_pressed.clear();
        self.keys_released.clear();
        self.mouse_buttons_pressed.clear();
        self.mouse_buttons_released.clear();
        self.mouse_delta = Vec2::ZERO;
        self.scroll_delta = Vec2::ZERO;
        self.primary_click = None;
    }

    /// Process a window event and update input state.
    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    self.record_key(key, event.state == ElementState::Pressed);
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.record_mouse_button(*button, *state == ElementState::Pressed);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.record_cursor(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let d = match delta {
                    MouseScrollDelta::LineDelta(x, y) => Vec2::new(*x, *y),
                    MouseScrollDelta::PixelDelta(pos) => {
                        Vec2::new(pos.x as f32, pos.y as f32) / 120.0
                    }
                };
                self.record_scroll(d);
            }
            _ => {}
        }
    }

    pub fn record_key(&mut self, key: KeyCode, pressed: bool) {
        if pressed {
            // Key repeat arrives as further presses; only the first counts.
            if self.keys_down.insert(key) {
                self.keys_pressed.insert(key);
            }
        } else {
            self.keys_down.remove(&key);
            self.keys_released.insert(key);
        }
    }

    pub fn record_mouse_button(&mut self, button: MouseButton, pressed: bool) {
        if pressed {
            if self.mouse_buttons_down.insert(button) {
                self.mouse_buttons_pressed.insert(button);
                if button == MouseButton::Left {
                    self.primary_click = Some(self.mouse_position);
                }
            }
        } else {
            self.mouse_buttons_down.remove(&button);
            self.mouse_buttons_released.insert(button);
        }
    }

    /// Cursor position in window pixels, top-left origin.
    pub fn record_cursor(&mut self, position: Vec2) {
        self.mouse_delta += position - self.mouse_position;
        self.mouse_position = position;
    }

    pub fn record_scroll(&mut self, delta: Vec2) {
        self.scroll_delta += delta;
    }

    /// Returns true if the key is currently held down.
    pub fn key_down(&self, key: KeyCode) -> bool {
        self.keys_down.contains(&key)
    }

    /// Returns true if the key was pressed this frame.
    pub fn key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    /// Returns true if the key was released this frame.
    pub fn key_released(&self, key: KeyCode) -> bool {
        self.keys_released.contains(&key)
    }

    /// Returns true if the mouse button is currently held down.
    pub fn mouse_down(&self, button: MouseButton) -> bool {
        self.mouse_buttons_down.contains(&button)
    }

    /// Returns true if the mouse button was pressed this frame.
    pub fn mouse_pressed(&self, button: MouseButton) -> bool {
        self.mouse_buttons_pressed.contains(&button)
    }

    /// Returns true if the mouse button was released this frame.
    pub fn mouse_released(&self, button: MouseButton) -> bool {
        self.mouse_buttons_released.contains(&button)
    }

    /// Current mouse position in window coordinates.
    pub fn mouse_position(&self) -> Vec2 {
        self.mouse_position
    }

    /// Mouse movement delta this frame.
    pub fn mouse_delta(&self) -> Vec2 {
        self.mouse_delta
    }

    /// Scroll wheel delta this frame (in "lines").
    pub fn scroll_delta(&self) -> Vec2 {
        self.scroll_delta
    }

    /// Cursor position of a primary (left) button press that happened this
    /// frame, in window pixels with a top-left origin.
    pub fn primary_click(&self) -> Option<Vec2> {
        self.primary_click
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_click_is_edge_triggered() {
        let mut input = Input::new();
        input.record_cursor(Vec2::new(10.0, 20.0));
        input.record_mouse_button(MouseButton::Left, true);
        assert_eq!(input.primary_click(), Some(Vec2::new(10.0, 20.0)));

        // Holding the button across frames does not click again.
        input.begin_frame();
        input.record_cursor(Vec2::new(30.0, 20.0));
        assert_eq!(input.primary_click(), None);
        assert!(input.mouse_down(MouseButton::Left));
    }

    #[test]
    fn other_buttons_do_not_click() {
        let mut input = Input::new();
        input.record_mouse_button(MouseButton::Right, true);
        input.record_mouse_button(MouseButton::Middle, true);
        assert_eq!(input.primary_click(), None);
        assert!(input.mouse_pressed(MouseButton::Right));
    }

    #[test]
    fn key_repeat_is_not_a_new_press() {
        let mut input = Input::new();
        input.record_key(KeyCode::Space, true);
        assert!(input.key_pressed(KeyCode::Space));

        input.begin_frame();
        input.record_key(KeyCode::Space, true);
        assert!(!input.key_pressed(KeyCode::Space));
        assert!(input.key_down(KeyCode::Space));

        input.record_key(KeyCode::Space, false);
        assert!(input.key_released(KeyCode::Space));
        assert!(!input.key_down(KeyCode::Space));
    }

    #[test]
    fn deltas_accumulate_within_a_frame() {
        let mut input = Input::new();
        input.record_cursor(Vec2::new(1.0, 1.0));
        input.record_cursor(Vec2::new(4.0, 5.0));
        input.record_scroll(Vec2::new(0.0, 1.0));
        input.record_scroll(Vec2::new(0.0, 2.0));
        assert_eq!(input.mouse_delta(), Vec2::new(4.0, 5.0));
        assert_eq!(input.scroll_delta(), Vec2::new(0.0, 3.0));

        input.begin_frame();
        assert_eq!(input.mouse_delta(), Vec2::ZERO);
        assert_eq!(input.scroll_delta(), Vec2::ZERO);
        assert_eq!(input.mouse_position(), Vec2::new(4.0, 5.0));
    }
}
