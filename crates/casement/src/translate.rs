use geometry::Extent;
use smallvec::{smallvec, SmallVec};

use crate::{
    backend::{NativeEvent, NativeWindowEvent},
    chord::KeyChord,
    event::{Event, MouseButtons},
    scancode::symbol_for,
};

/// The events produced by translating a single native event. Never more than
/// two.
pub type Translated = SmallVec<[Event; 2]>;

/// Converts native events into portable events for one window, tracking the
/// key chord along the way.
#[derive(Debug, Default)]
pub struct EventTranslator {
    chord: KeyChord,
}

impl EventTranslator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn translate(&mut self, event: &NativeEvent) -> Translated {
        match event {
            NativeEvent::KeyDown { scancode, .. } => {
                let key = symbol_for(*scancode);
                self.chord.press(key);
                smallvec![
                    Event::KeyDown { key },
                    Event::KeyTyped {
                        chord: self.chord.current_chord(),
                    },
                ]
            }
            NativeEvent::KeyUp { scancode, .. } => {
                let key = symbol_for(*scancode);
                self.chord.release(key);
                smallvec![
                    Event::KeyUp { key },
                    Event::KeyTyped {
                        chord: self.chord.current_chord(),
                    },
                ]
            }
            NativeEvent::MouseButtonDown { button, at, .. }
            | NativeEvent::MouseButtonUp { button, at, .. } => {
                log::trace!("mouse button {button} at {at:?}");
                smallvec![Event::MouseButton {
                    which: MouseButtons::from_index(*button),
                    at: *at,
                }]
            }
            NativeEvent::MouseMotion { .. } | NativeEvent::MouseWheel { .. } => SmallVec::new(),
            NativeEvent::Quit => smallvec![Event::Close],
            NativeEvent::Window { window, event } => match *event {
                NativeWindowEvent::Resized { width, height } => {
                    log::debug!("{window:?} resized to {width}x{height}");
                    smallvec![Event::Resize {
                        extent: Extent::new(width, height),
                    }]
                }
                NativeWindowEvent::Enter => smallvec![Event::MouseEntered],
                NativeWindowEvent::Leave => smallvec![Event::MouseExited],
                NativeWindowEvent::Close => smallvec![Event::Close],
                other => {
                    log::debug!("{window:?}: {other:?}");
                    SmallVec::new()
                }
            },
            NativeEvent::Unknown(kind) => {
                log::trace!("ignoring native event kind {kind:#x}");
                SmallVec::new()
            }
        }
    }
}
