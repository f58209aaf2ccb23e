//! A [`Backend`] over `winit`, presenting pixels through `softbuffer`.
//!
//! The event loop is built on whichever thread calls [`WinitBackend::new`],
//! which must be the driver's loop thread. macOS only allows this on the
//! process's main thread.

use std::{
    collections::{HashMap, VecDeque},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};

use geometry::{Extent, Point, ScreenPx};
use softbuffer::{Context, Surface};
use surface::Color;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop, OwnedDisplayHandle},
    keyboard::{KeyCode, PhysicalKey},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Window as WinitWindow, WindowAttributes, WindowId as WinitWindowId},
};

use super::{Backend, NativeEvent, NativeWindowEvent, NativeWindowId, WindowDesc, WindowFlags};
use crate::error::BackendError;

/// softbuffer pixels are `0RGB`; the top byte must stay clear.
const RGB_MASK: u32 = 0x00ff_ffff;

struct NativeWindow {
    surface: Surface<OwnedDisplayHandle, Arc<WinitWindow>>,
    window: Arc<WinitWindow>,
    extent: Extent<u32, ScreenPx>,
    staging: Vec<u32>,
    draw_color: u32,
    cursor: Point<i32, ScreenPx>,
}

impl NativeWindow {
    fn resize_staging(&mut self, extent: Extent<u32, ScreenPx>) {
        if extent == self.extent {
            return;
        }

        let mut staging = vec![0; pixel_count(extent)];
        let rows = self.extent.height.min(extent.height) as usize;
        let columns = self.extent.width.min(extent.width) as usize;
        for y in 0..rows {
            let from = y * self.extent.width as usize;
            let to = y * extent.width as usize;
            staging[to..to + columns].copy_from_slice(&self.staging[from..from + columns]);
        }

        self.staging = staging;
        self.extent = extent;
    }
}

pub struct WinitBackend {
    event_loop: EventLoop<()>,
    context: Context<OwnedDisplayHandle>,
    windows: HashMap<NativeWindowId, NativeWindow>,
    by_winit: HashMap<WinitWindowId, NativeWindowId>,
    queue: VecDeque<NativeEvent>,
    next_id: u32,
    exited: bool,
}

impl WinitBackend {
    pub fn new() -> Result<Self, BackendError> {
        #[allow(unused_mut)]
        let mut builder = EventLoop::builder();

        #[cfg(all(
            unix,
            not(any(target_os = "macos", target_os = "ios", target_os = "android"))
        ))]
        winit::platform::x11::EventLoopBuilderExtX11::with_any_thread(&mut builder, true);
        #[cfg(target_os = "windows")]
        winit::platform::windows::EventLoopBuilderExtWindows::with_any_thread(&mut builder, true);

        let event_loop = builder
            .build()
            .map_err(|e| BackendError::new(format!("event loop: {e}")))?;

        let context = Context::new(event_loop.owned_display_handle())
            .map_err(|e| BackendError::new(format!("softbuffer context: {e}")))?;

        log::debug!("winit event loop ready");

        Ok(Self {
            event_loop,
            context,
            windows: HashMap::new(),
            by_winit: HashMap::new(),
            queue: VecDeque::new(),
            next_id: 1,
            exited: false,
        })
    }

    fn pump(&mut self) {
        if self.exited {
            return;
        }

        let mut collector = Collector {
            windows: &mut self.windows,
            by_winit: &self.by_winit,
            queue: &mut self.queue,
        };

        if let PumpStatus::Exit(code) = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut collector)
        {
            log::info!("winit event loop exited with code {code}");
            self.exited = true;
            self.queue.push_back(NativeEvent::Quit);
        }
    }
}

impl Backend for WinitBackend {
    fn create_window(&mut self, desc: &WindowDesc) -> Result<NativeWindowId, BackendError> {
        let attributes = WindowAttributes::default()
            .with_title(desc.title)
            .with_inner_size(PhysicalSize::new(desc.extent.width, desc.extent.height))
            .with_resizable(desc.flags.contains(WindowFlags::RESIZABLE))
            .with_visible(desc.flags.contains(WindowFlags::VISIBLE));

        // Windows are created on demand rather than from inside `resumed`.
        #[allow(deprecated)]
        let window = self
            .event_loop
            .create_window(attributes)
            .map_err(|e| BackendError::new(format!("window: {e}")))?;
        let window = Arc::new(window);

        let surface = Surface::new(&self.context, window.clone())
            .map_err(|e| BackendError::new(format!("softbuffer surface: {e}")))?;

        let id = NativeWindowId(self.next_id);
        self.next_id += 1;

        self.by_winit.insert(window.id(), id);
        self.windows.insert(
            id,
            NativeWindow {
                surface,
                window,
                extent: desc.extent,
                staging: vec![0; pixel_count(desc.extent)],
                draw_color: 0,
                cursor: Point::zero(),
            },
        );

        Ok(id)
    }

    fn set_title(&mut self, window: NativeWindowId, title: &str) {
        if let Some(native) = self.windows.get(&window) {
            native.window.set_title(title);
        }
    }

    fn set_size(&mut self, window: NativeWindowId, extent: Extent<u32, ScreenPx>) {
        if let Some(native) = self.windows.get_mut(&window) {
            // The platform may apply the new size later; a Resized event
            // follows either way.
            let _ = native
                .window
                .request_inner_size(PhysicalSize::new(extent.width, extent.height));
            native.resize_staging(extent);
        }
    }

    fn show(&mut self, window: NativeWindowId) {
        if let Some(native) = self.windows.get(&window) {
            native.window.set_visible(true);
        }
    }

    fn set_draw_color(&mut self, window: NativeWindowId, color: Color) {
        if let Some(native) = self.windows.get_mut(&window) {
            native.draw_color = color.to_argb() & RGB_MASK;
        }
    }

    fn draw_point(&mut self, window: NativeWindowId, at: Point<u32, ScreenPx>) {
        let Some(native) = self.windows.get_mut(&window) else {
            return;
        };

        if at.x < native.extent.width && at.y < native.extent.height {
            let index = at.y as usize * native.extent.width as usize + at.x as usize;
            native.staging[index] = native.draw_color;
        }
    }

    fn present(&mut self, window: NativeWindowId) {
        let Some(native) = self.windows.get_mut(&window) else {
            return;
        };

        let (Some(width), Some(height)) = (
            NonZeroU32::new(native.extent.width),
            NonZeroU32::new(native.extent.height),
        ) else {
            return;
        };

        if let Err(e) = native.surface.resize(width, height) {
            log::warn!("{window:?}: surface resize failed: {e}");
            return;
        }

        let mut buffer = match native.surface.buffer_mut() {
            Ok(buffer) => buffer,
            Err(e) => {
                log::warn!("{window:?}: no buffer to present into: {e}");
                return;
            }
        };

        if buffer.len() != native.staging.len() {
            return;
        }
        buffer.copy_from_slice(&native.staging);

        native.window.pre_present_notify();
        if let Err(e) = buffer.present() {
            log::warn!("{window:?}: present failed: {e}");
        }
    }

    fn destroy(&mut self, window: NativeWindowId) {
        if let Some(native) = self.windows.remove(&window) {
            self.by_winit.remove(&native.window.id());
        }
    }

    fn poll_event(&mut self) -> Option<NativeEvent> {
        if self.queue.is_empty() {
            self.pump();
        }
        self.queue.pop_front()
    }
}

/// Receives winit callbacks during a pump and queues them as native events.
struct Collector<'a> {
    windows: &'a mut HashMap<NativeWindowId, NativeWindow>,
    by_winit: &'a HashMap<WinitWindowId, NativeWindowId>,
    queue: &'a mut VecDeque<NativeEvent>,
}

impl Collector<'_> {
    fn window(&mut self, window: NativeWindowId, event: NativeWindowEvent) {
        self.queue.push_back(NativeEvent::Window { window, event });
    }
}

impl ApplicationHandler for Collector<'_> {
    fn resumed(&mut self, _: &ActiveEventLoop) {}

    fn window_event(&mut self, _: &ActiveEventLoop, winit_id: WinitWindowId, event: WindowEvent) {
        let Some(&window) = self.by_winit.get(&winit_id) else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => self.window(window, NativeWindowEvent::Close),
            WindowEvent::Resized(size) => {
                if let Some(native) = self.windows.get_mut(&window) {
                    native.resize_staging(Extent::new(size.width, size.height));
                }
                self.window(
                    window,
                    NativeWindowEvent::Resized {
                        width: size.width,
                        height: size.height,
                    },
                );
            }
            WindowEvent::Moved(position) => self.window(
                window,
                NativeWindowEvent::Moved {
                    x: position.x,
                    y: position.y,
                },
            ),
            WindowEvent::Focused(true) => self.window(window, NativeWindowEvent::FocusGained),
            WindowEvent::Focused(false) => self.window(window, NativeWindowEvent::FocusLost),
            WindowEvent::Occluded(true) => self.window(window, NativeWindowEvent::Hidden),
            WindowEvent::Occluded(false) => self.window(window, NativeWindowEvent::Shown),
            WindowEvent::RedrawRequested => self.window(window, NativeWindowEvent::Exposed),
            WindowEvent::CursorEntered { .. } => self.window(window, NativeWindowEvent::Enter),
            WindowEvent::CursorLeft { .. } => self.window(window, NativeWindowEvent::Leave),
            WindowEvent::KeyboardInput { event, .. } => {
                let scancode = match event.physical_key {
                    PhysicalKey::Code(code) => hid_usage(code),
                    PhysicalKey::Unidentified(_) => 0,
                };
                self.queue.push_back(match event.state {
                    ElementState::Pressed => NativeEvent::KeyDown { window, scancode },
                    ElementState::Released => NativeEvent::KeyUp { window, scancode },
                });
            }
            WindowEvent::CursorMoved { position, .. } => {
                #[allow(clippy::cast_possible_truncation)]
                let at = Point::new(position.x as i32, position.y as i32);
                if let Some(native) = self.windows.get_mut(&window) {
                    native.cursor = at;
                }
                self.queue.push_back(NativeEvent::MouseMotion { window, at });
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let at = self
                    .windows
                    .get(&window)
                    .map_or(Point::zero(), |native| native.cursor);
                let button = button_index(button);
                self.queue.push_back(match state {
                    ElementState::Pressed => NativeEvent::MouseButtonDown { window, button, at },
                    ElementState::Released => NativeEvent::MouseButtonUp { window, button, at },
                });
            }
            WindowEvent::MouseWheel { delta, .. } => {
                #[allow(clippy::cast_possible_truncation)]
                let (dx, dy) = match delta {
                    MouseScrollDelta::LineDelta(x, y) => (x as i32, y as i32),
                    MouseScrollDelta::PixelDelta(p) => (p.x as i32, p.y as i32),
                };
                self.queue.push_back(NativeEvent::MouseWheel { window, dx, dy });
            }
            other => log::trace!("{window:?}: unhandled winit event {other:?}"),
        }
    }
}

fn pixel_count(extent: Extent<u32, ScreenPx>) -> usize {
    extent.width as usize * extent.height as usize
}

fn button_index(button: MouseButton) -> u8 {
    match button {
        MouseButton::Left => 0,
        MouseButton::Middle => 1,
        MouseButton::Right => 2,
        MouseButton::Back => 3,
        MouseButton::Forward => 4,
        MouseButton::Other(n) => u8::try_from(n).unwrap_or(u8::MAX),
    }
}

/// Maps a physical key to its USB-HID keyboard usage id, or 0 if it has none
/// in the scancode table.
#[rustfmt::skip]
fn hid_usage(code: KeyCode) -> u32 {
    match code {
        KeyCode::KeyA => 4, KeyCode::KeyB => 5, KeyCode::KeyC => 6, KeyCode::KeyD => 7,
        KeyCode::KeyE => 8, KeyCode::KeyF => 9, KeyCode::KeyG => 10, KeyCode::KeyH => 11,
        KeyCode::KeyI => 12, KeyCode::KeyJ => 13, KeyCode::KeyK => 14, KeyCode::KeyL => 15,
        KeyCode::KeyM => 16, KeyCode::KeyN => 17, KeyCode::KeyO => 18, KeyCode::KeyP => 19,
        KeyCode::KeyQ => 20, KeyCode::KeyR => 21, KeyCode::KeyS => 22, KeyCode::KeyT => 23,
        KeyCode::KeyU => 24, KeyCode::KeyV => 25, KeyCode::KeyW => 26, KeyCode::KeyX => 27,
        KeyCode::KeyY => 28, KeyCode::KeyZ => 29,

        KeyCode::Digit1 => 30, KeyCode::Digit2 => 31, KeyCode::Digit3 => 32,
        KeyCode::Digit4 => 33, KeyCode::Digit5 => 34, KeyCode::Digit6 => 35,
        KeyCode::Digit7 => 36, KeyCode::Digit8 => 37, KeyCode::Digit9 => 38,
        KeyCode::Digit0 => 39,

        KeyCode::Enter => 40, KeyCode::Escape => 41, KeyCode::Backspace => 42,
        KeyCode::Tab => 43, KeyCode::Space => 44, KeyCode::Minus => 45,
        KeyCode::Equal => 46, KeyCode::BracketLeft => 47, KeyCode::BracketRight => 48,
        KeyCode::Backslash => 49, KeyCode::Semicolon => 51, KeyCode::Quote => 52,
        KeyCode::Backquote => 53, KeyCode::Comma => 54, KeyCode::Period => 55,
        KeyCode::Slash => 56, KeyCode::CapsLock => 57,

        KeyCode::F1 => 58, KeyCode::F2 => 59, KeyCode::F3 => 60, KeyCode::F4 => 61,
        KeyCode::F5 => 62, KeyCode::F6 => 63, KeyCode::F7 => 64, KeyCode::F8 => 65,
        KeyCode::F9 => 66, KeyCode::F10 => 67, KeyCode::F11 => 68, KeyCode::F12 => 69,

        KeyCode::PrintScreen => 70, KeyCode::ScrollLock => 71, KeyCode::Pause => 72,
        KeyCode::Insert => 73, KeyCode::Home => 74, KeyCode::PageUp => 75,
        KeyCode::Delete => 76, KeyCode::End => 77, KeyCode::PageDown => 78,
        KeyCode::ArrowRight => 79, KeyCode::ArrowLeft => 80, KeyCode::ArrowDown => 81,
        KeyCode::ArrowUp => 82, KeyCode::NumLock => 83,

        KeyCode::ControlLeft => 224, KeyCode::ShiftLeft => 225, KeyCode::AltLeft => 226,
        KeyCode::SuperLeft => 227, KeyCode::ControlRight => 228, KeyCode::ShiftRight => 229,
        KeyCode::AltRight => 230, KeyCode::SuperRight => 231,

        _ => 0,
    }
}
