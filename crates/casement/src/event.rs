use geometry::{Extent, Point, ScreenPx};

bitflags::bitflags! {
    /// Mouse buttons as a bitmask, so that several buttons can be tested with
    /// a single `&`.
    ///
    /// Native button index `i` becomes bit `1 << i`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct MouseButtons: u32 {
        const LEFT = 1 << 0;
        const MIDDLE = 1 << 1;
        const RIGHT = 1 << 2;
        const BACK = 1 << 3;
        const FORWARD = 1 << 4;
    }
}

impl MouseButtons {
    /// Converts a 0-based native button index into its bitmask. Indices that
    /// do not fit in the mask yield an empty set.
    #[must_use]
    pub fn from_index(index: u8) -> Self {
        Self::from_bits_retain(1u32.checked_shl(u32::from(index)).unwrap_or(0))
    }
}

/// An application-level event, independent of the native library.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    KeyDown {
        key: &'static str,
    },
    KeyUp {
        key: &'static str,
    },
    /// The set of held keys changed. Sent after every `KeyDown` and `KeyUp`.
    KeyTyped {
        chord: String,
    },
    MouseButton {
        which: MouseButtons,
        at: Point<i32, ScreenPx>,
    },
    MouseEntered,
    MouseExited,
    Resize {
        extent: Extent<u32, ScreenPx>,
    },
    Close,
}
