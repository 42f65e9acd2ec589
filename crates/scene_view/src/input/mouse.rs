//! Mouse state tracking for navigation and picking

use super::MouseButton;

/// Distance in pixels a held button must travel before it counts as a drag
pub const DRAG_THRESHOLD: f64 = 5.0;

/// Mouse state between events
#[derive(Debug, Clone, PartialEq)]
pub struct MouseState {
    /// Current screen-space X position (pixels)
    pub screen_x: f64,
    /// Current screen-space Y position (pixels)
    pub screen_y: f64,
    /// Window width in pixels
    pub window_width: u32,
    /// Window height in pixels
    pub window_height: u32,
    /// Held button and where it went down
    pub drag_start: Option<(MouseButton, f64, f64)>,
    /// Ctrl held
    pub ctrl: bool,
    /// Shift held
    pub shift: bool,
    dragging: bool,
}

impl MouseState {
    /// Create a mouse state for a window of the given size
    pub fn new(window_width: u32, window_height: u32) -> Self {
        Self {
            screen_x: 0.0,
            screen_y: 0.0,
            window_width,
            window_height,
            drag_start: None,
            ctrl: false,
            shift: false,
            dragging: false,
        }
    }

    /// Update window size
    pub fn update_window_size(&mut self, width: u32, height: u32) {
        self.window_width = width;
        self.window_height = height;
    }

    /// Move the pointer; returns the delta since the previous position
    pub fn update_position(&mut self, x: f64, y: f64) -> (f64, f64) {
        let delta = (x - self.screen_x, y - self.screen_y);
        self.screen_x = x;
        self.screen_y = y;
        if let Some((_, sx, sy)) = self.drag_start {
            let (dx, dy) = (x - sx, y - sy);
            if (dx * dx + dy * dy).sqrt() >= DRAG_THRESHOLD {
                self.dragging = true;
            }
        }
        delta
    }

    /// Start tracking a held button at the current position
    pub fn press(&mut self, button: MouseButton) {
        self.drag_start = Some((button, self.screen_x, self.screen_y));
        self.dragging = false;
    }

    /// Stop tracking; returns the button if this was a click rather than a drag
    pub fn release(&mut self, button: MouseButton) -> Option<MouseButton> {
        let was_click = matches!(self.drag_start, Some((held, _, _)) if held == button) && !self.dragging;
        self.drag_start = None;
        self.dragging = false;
        was_click.then_some(button)
    }

    /// Button currently held
    pub fn held_button(&self) -> Option<MouseButton> {
        self.drag_start.map(|(button, _, _)| button)
    }

    /// True once a held button moved past the drag threshold
    pub fn is_dragging(&self) -> bool {
        self.dragging && self.drag_start.is_some()
    }

    /// Top-left pointer coordinates to a bottom-left pixel in a window `height` tall
    ///
    /// Saturates for pointers far outside the window.
    pub fn to_window(x: f64, y: f64, height: u32) -> (i32, i32) {
        let top = i32::try_from(height).unwrap_or(i32::MAX).saturating_sub(1);
        (x.floor() as i32, top.saturating_sub(y.floor() as i32))
    }
}

impl Default for MouseState {
    fn default() -> Self {
        Self::new(1024, 768)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_click_below_threshold() {
        let mut mouse = MouseState::new(100, 100);
        mouse.update_position(10.0, 10.0);
        mouse.press(MouseButton::Left);
        mouse.update_position(12.0, 13.0);
        assert!(!mouse.is_dragging());
        assert_eq!(mouse.release(MouseButton::Left), Some(MouseButton::Left));
    }

    #[test]
    fn test_drag_past_threshold_is_not_a_click() {
        let mut mouse = MouseState::new(100, 100);
        mouse.press(MouseButton::Right);
        let delta = mouse.update_position(6.0, 0.0);
        assert_eq!(delta, (6.0, 0.0));
        assert!(mouse.is_dragging());
        assert_eq!(mouse.release(MouseButton::Right), None);
        assert!(!mouse.is_dragging());
    }

    #[test]
    fn test_to_window_flips_y() {
        assert_eq!(MouseState::to_window(20.5, 0.2, 100), (20, 99));
        assert_eq!(MouseState::to_window(0.0, 99.9, 100), (0, 0));
    }

    #[test]
    fn test_to_window_saturates_far_outside() {
        assert_eq!(MouseState::to_window(10.0, -3.0e9, 100), (10, i32::MAX));
        assert_eq!(MouseState::to_window(-1.0e12, 5.0e9, 100), (i32::MIN, 99 - i32::MAX));
        assert_eq!(MouseState::to_window(f64::NAN, 0.0, 0), (0, -1));
    }
}
