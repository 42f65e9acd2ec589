//! Input events delivered by the host window
//!
//! The core never talks to a windowing toolkit. Hosts translate their own
//! events into [`InputEvent`]s; mouse coordinates are pixels measured from
//! the top-left corner of the view.

pub mod mouse;
pub mod navigation;

pub use mouse::MouseState;
pub use navigation::CameraController;

/// Key codes the viewer reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A key
    A,
    /// D key
    D,
    /// R key
    R,
    /// S key
    S,
    /// T key
    T,
    /// W key
    W,
    /// Tab key
    Tab,
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
    /// Any key the viewer ignores
    Other,
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

/// One event from the host
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Pointer moved
    MouseMove {
        /// Pixels from the left edge
        x: f64,
        /// Pixels from the top edge
        y: f64,
    },
    /// Button went down
    MousePress {
        /// Button
        button: MouseButton,
        /// Pixels from the left edge
        x: f64,
        /// Pixels from the top edge
        y: f64,
    },
    /// Button went up
    MouseRelease {
        /// Button
        button: MouseButton,
        /// Pixels from the left edge
        x: f64,
        /// Pixels from the top edge
        y: f64,
    },
    /// Wheel turned; positive is away from the user
    Scroll {
        /// Notches
        delta: f32,
    },
    /// Key went down
    KeyPress(KeyCode),
    /// Key went up
    KeyRelease(KeyCode),
    /// View resized
    Resize {
        /// New width in pixels
        width: u32,
        /// New height in pixels
        height: u32,
    },
    /// Modifier keys changed
    ModifiersChanged {
        /// Ctrl held
        ctrl: bool,
        /// Shift held
        shift: bool,
    },
}

/// What mouse input is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuiMode {
    /// Drags move the camera, clicks pick
    #[default]
    Navigate,
    /// Drags are ignored, clicks pick
    Select,
}

impl GuiMode {
    /// The other mode
    pub fn toggled(self) -> Self {
        match self {
            GuiMode::Navigate => GuiMode::Select,
            GuiMode::Select => GuiMode::Navigate,
        }
    }
}
