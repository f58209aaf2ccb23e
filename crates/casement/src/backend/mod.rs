//! The native windowing library as seen by the window loop.
//!
//! A [`Backend`] is created on the loop thread and never leaves it, so
//! implementations are free to hold thread-affine handles.

use geometry::{Extent, Point, ScreenPx};
use surface::Color;

use crate::error::BackendError;

mod headless;
#[cfg(feature = "winit")]
mod winit_backend;

pub use headless::{HeadlessBackend, HeadlessController, NativeCall};
#[cfg(feature = "winit")]
pub use winit_backend::WinitBackend;

/// Identifies a window within a backend. Assigned by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeWindowId(pub u32);

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct WindowFlags: u32 {
        const RESIZABLE = 0x1;
        const VISIBLE = 0x2;
    }
}

impl Default for WindowFlags {
    fn default() -> Self {
        WindowFlags::RESIZABLE
    }
}

/// A description of a native window to be created.
#[derive(Clone, Debug)]
pub struct WindowDesc<'a> {
    pub title: &'a str,
    pub extent: Extent<u32, ScreenPx>,
    pub flags: WindowFlags,
}

/// An event as reported by the native library.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NativeEvent {
    KeyDown {
        window: NativeWindowId,
        scancode: u32,
    },
    KeyUp {
        window: NativeWindowId,
        scancode: u32,
    },
    /// `button` is a 0-based index: left, middle, right, back, forward.
    MouseButtonDown {
        window: NativeWindowId,
        button: u8,
        at: Point<i32, ScreenPx>,
    },
    MouseButtonUp {
        window: NativeWindowId,
        button: u8,
        at: Point<i32, ScreenPx>,
    },
    MouseMotion {
        window: NativeWindowId,
        at: Point<i32, ScreenPx>,
    },
    MouseWheel {
        window: NativeWindowId,
        dx: i32,
        dy: i32,
    },
    /// The application as a whole was asked to quit.
    Quit,
    Window {
        window: NativeWindowId,
        event: NativeWindowEvent,
    },
    /// An event kind with no representation here, tagged with the native
    /// type code.
    Unknown(u32),
}

impl NativeEvent {
    /// The window the event is addressed to, if any.
    #[must_use]
    pub fn window(&self) -> Option<NativeWindowId> {
        match self {
            Self::KeyDown { window, .. }
            | Self::KeyUp { window, .. }
            | Self::MouseButtonDown { window, .. }
            | Self::MouseButtonUp { window, .. }
            | Self::MouseMotion { window, .. }
            | Self::MouseWheel { window, .. }
            | Self::Window { window, .. } => Some(*window),
            Self::Quit | Self::Unknown(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NativeWindowEvent {
    Shown,
    Hidden,
    Exposed,
    Moved { x: i32, y: i32 },
    Resized { width: u32, height: u32 },
    Minimized,
    Maximized,
    Restored,
    /// The pointer entered the window.
    Enter,
    /// The pointer left the window.
    Leave,
    FocusGained,
    FocusLost,
    /// The user asked to close this window.
    Close,
    Other(u8),
}

/// The capability surface of the native windowing library.
///
/// Per-call drawing failures are not reported; drawing is best effort.
pub trait Backend {
    /// Creates a window together with whatever renderer presents its pixels.
    fn create_window(&mut self, desc: &WindowDesc) -> Result<NativeWindowId, BackendError>;

    fn set_title(&mut self, window: NativeWindowId, title: &str);

    fn set_size(&mut self, window: NativeWindowId, extent: Extent<u32, ScreenPx>);

    fn show(&mut self, window: NativeWindowId);

    fn set_draw_color(&mut self, window: NativeWindowId, color: Color);

    /// Draws a single point in the current draw color.
    fn draw_point(&mut self, window: NativeWindowId, at: Point<u32, ScreenPx>);

    /// Makes everything drawn since the last present visible.
    fn present(&mut self, window: NativeWindowId);

    /// Destroys the window. The id is not used again afterwards.
    fn destroy(&mut self, window: NativeWindowId);

    /// Returns the next pending event without blocking.
    fn poll_event(&mut self) -> Option<NativeEvent>;
}
