//! An in-memory stand-in for a native windowing library.

use std::{collections::VecDeque, sync::Arc, thread::ThreadId};

use geometry::{Extent, Point, Rect, ScreenPx};
use parking_lot::Mutex;
use surface::{Color, PixelSurface};

use super::{Backend, NativeEvent, NativeWindowId, WindowDesc, WindowFlags};
use crate::error::BackendError;

/// A native call as observed by a [`HeadlessBackend`]. Per-pixel drawing calls
/// are counted rather than recorded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NativeCall {
    CreateWindow {
        window: NativeWindowId,
        title: String,
        extent: Extent<u32, ScreenPx>,
    },
    SetTitle {
        window: NativeWindowId,
        title: String,
    },
    SetSize {
        window: NativeWindowId,
        extent: Extent<u32, ScreenPx>,
    },
    Show {
        window: NativeWindowId,
    },
    Present {
        window: NativeWindowId,
    },
    Destroy {
        window: NativeWindowId,
    },
}

struct HeadlessWindow {
    id: NativeWindowId,
    title: String,
    extent: Extent<u32, ScreenPx>,
    visible: bool,
    destroyed: bool,
    draw_color: Color,
    staging: PixelSurface,
    frame: PixelSurface,
    presents: usize,
}

impl HeadlessWindow {
    fn resize(&mut self, extent: Extent<u32, ScreenPx>) {
        let mut staging = PixelSurface::new(extent);
        staging.copy_region(&self.staging, Rect::from_extent(extent));
        self.staging = staging;
        self.extent = extent;
    }
}

#[derive(Default)]
struct State {
    next_id: u32,
    windows: Vec<HeadlessWindow>,
    events: VecDeque<NativeEvent>,
    fail_next_create: Option<BackendError>,
    calls: Vec<NativeCall>,
    points_drawn: u64,
    threads: Vec<ThreadId>,
}

impl State {
    fn touch(&mut self) {
        let current = std::thread::current().id();
        if !self.threads.contains(&current) {
            self.threads.push(current);
        }
    }

    fn window(&self, id: NativeWindowId) -> Option<&HeadlessWindow> {
        self.windows.iter().find(|window| window.id == id)
    }

    /// Looks up a live window. Calls against destroyed windows are ignored,
    /// matching how native libraries treat dead handles.
    fn live_window(&mut self, id: NativeWindowId) -> Option<&mut HeadlessWindow> {
        let window = self
            .windows
            .iter_mut()
            .find(|window| window.id == id && !window.destroyed);
        if window.is_none() {
            log::trace!("headless: call on dead window {id:?}");
        }
        window
    }
}

/// A [`Backend`] that keeps everything in memory. The paired
/// [`HeadlessController`] inspects and drives it from other threads.
pub struct HeadlessBackend {
    state: Arc<Mutex<State>>,
}

impl HeadlessBackend {
    #[must_use]
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (Self, HeadlessController) {
        let state = Arc::new(Mutex::new(State {
            next_id: 1,
            ..State::default()
        }));
        (
            Self {
                state: state.clone(),
            },
            HeadlessController { state },
        )
    }
}

impl Backend for HeadlessBackend {
    fn create_window(&mut self, desc: &WindowDesc) -> Result<NativeWindowId, BackendError> {
        let mut state = self.state.lock();
        state.touch();

        if let Some(error) = state.fail_next_create.take() {
            return Err(error);
        }

        let id = NativeWindowId(state.next_id);
        state.next_id += 1;

        state.windows.push(HeadlessWindow {
            id,
            title: desc.title.to_string(),
            extent: desc.extent,
            visible: desc.flags.contains(WindowFlags::VISIBLE),
            destroyed: false,
            draw_color: Color::TRANSPARENT,
            staging: PixelSurface::new(desc.extent),
            frame: PixelSurface::new(desc.extent),
            presents: 0,
        });
        state.calls.push(NativeCall::CreateWindow {
            window: id,
            title: desc.title.to_string(),
            extent: desc.extent,
        });

        Ok(id)
    }

    fn set_title(&mut self, window: NativeWindowId, title: &str) {
        let mut state = self.state.lock();
        state.touch();
        if let Some(target) = state.live_window(window) {
            target.title = title.to_string();
            state.calls.push(NativeCall::SetTitle {
                window,
                title: title.to_string(),
            });
        }
    }

    fn set_size(&mut self, window: NativeWindowId, extent: Extent<u32, ScreenPx>) {
        let mut state = self.state.lock();
        state.touch();
        if let Some(target) = state.live_window(window) {
            target.resize(extent);
            state.calls.push(NativeCall::SetSize { window, extent });
        }
    }

    fn show(&mut self, window: NativeWindowId) {
        let mut state = self.state.lock();
        state.touch();
        if let Some(target) = state.live_window(window) {
            target.visible = true;
            state.calls.push(NativeCall::Show { window });
        }
    }

    fn set_draw_color(&mut self, window: NativeWindowId, color: Color) {
        let mut state = self.state.lock();
        state.touch();
        if let Some(target) = state.live_window(window) {
            target.draw_color = color;
        }
    }

    fn draw_point(&mut self, window: NativeWindowId, at: Point<u32, ScreenPx>) {
        let mut state = self.state.lock();
        state.touch();
        if let Some(target) = state.live_window(window) {
            let color = target.draw_color;
            target.staging.set_pixel(at, color);
            state.points_drawn += 1;
        }
    }

    fn present(&mut self, window: NativeWindowId) {
        let mut state = self.state.lock();
        state.touch();
        if let Some(target) = state.live_window(window) {
            target.frame = target.staging.clone();
            target.presents += 1;
            state.calls.push(NativeCall::Present { window });
        }
    }

    fn destroy(&mut self, window: NativeWindowId) {
        let mut state = self.state.lock();
        state.touch();
        // Recorded even for dead windows so that double destroys show up.
        if let Some(target) = state.windows.iter_mut().find(|w| w.id == window) {
            target.destroyed = true;
            target.visible = false;
        }
        state.calls.push(NativeCall::Destroy { window });
    }

    fn poll_event(&mut self) -> Option<NativeEvent> {
        let mut state = self.state.lock();
        state.touch();
        state.events.pop_front()
    }
}

/// Inspects and drives a [`HeadlessBackend`]. Cheap to clone and usable from
/// any thread.
#[derive(Clone)]
pub struct HeadlessController {
    state: Arc<Mutex<State>>,
}

impl HeadlessController {
    /// Queues a native event for the loop's next poll.
    pub fn push_event(&self, event: NativeEvent) {
        self.state.lock().events.push_back(event);
    }

    /// Makes the next `create_window` call fail with `error`.
    pub fn fail_next_create(&self, error: impl Into<String>) {
        self.state.lock().fail_next_create = Some(BackendError::new(error));
    }

    /// Every window ever created, in creation order.
    #[must_use]
    pub fn windows(&self) -> Vec<NativeWindowId> {
        self.state.lock().windows.iter().map(|w| w.id).collect()
    }

    /// The pixels shown by the most recent present.
    #[must_use]
    pub fn frame(&self, window: NativeWindowId) -> Option<PixelSurface> {
        self.state.lock().window(window).map(|w| w.frame.clone())
    }

    #[must_use]
    pub fn title(&self, window: NativeWindowId) -> Option<String> {
        self.state.lock().window(window).map(|w| w.title.clone())
    }

    #[must_use]
    pub fn extent(&self, window: NativeWindowId) -> Option<Extent<u32, ScreenPx>> {
        self.state.lock().window(window).map(|w| w.extent)
    }

    #[must_use]
    pub fn is_visible(&self, window: NativeWindowId) -> bool {
        self.state.lock().window(window).is_some_and(|w| w.visible)
    }

    #[must_use]
    pub fn is_destroyed(&self, window: NativeWindowId) -> bool {
        self.state.lock().window(window).is_some_and(|w| w.destroyed)
    }

    #[must_use]
    pub fn present_count(&self, window: NativeWindowId) -> usize {
        self.state.lock().window(window).map_or(0, |w| w.presents)
    }

    #[must_use]
    pub fn points_drawn(&self) -> u64 {
        self.state.lock().points_drawn
    }

    #[must_use]
    pub fn calls(&self) -> Vec<NativeCall> {
        self.state.lock().calls.clone()
    }

    /// How many times `destroy` was called for `window`.
    #[must_use]
    pub fn destroy_count(&self, window: NativeWindowId) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, NativeCall::Destroy { window: w } if *w == window))
            .count()
    }

    /// Every thread that has made a call into the backend.
    #[must_use]
    pub fn call_threads(&self) -> Vec<ThreadId> {
        self.state.lock().threads.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(extent: Extent<u32, ScreenPx>) -> WindowDesc<'static> {
        WindowDesc {
            title: "test",
            extent,
            flags: WindowFlags::RESIZABLE | WindowFlags::VISIBLE,
        }
    }

    #[test]
    fn present_publishes_staged_points() {
        let (mut backend, controller) = HeadlessBackend::new();
        let window = backend.create_window(&desc(Extent::new(4, 4))).unwrap();

        backend.set_draw_color(window, Color::RED);
        backend.draw_point(window, Point::new(1, 2));
        assert_eq!(
            controller.frame(window).unwrap().pixel(Point::new(1, 2)),
            Some(Color::TRANSPARENT)
        );

        backend.present(window);
        let frame = controller.frame(window).unwrap();
        assert_eq!(frame.pixel(Point::new(1, 2)), Some(Color::RED));
        assert_eq!(frame.pixel(Point::new(0, 0)), Some(Color::TRANSPARENT));
        assert_eq!(controller.points_drawn(), 1);
        assert_eq!(controller.present_count(window), 1);
    }

    #[test]
    fn failed_create_is_one_shot() {
        let (mut backend, controller) = HeadlessBackend::new();

        controller.fail_next_create("no renderer");
        assert_eq!(
            backend.create_window(&desc(Extent::new(1, 1))),
            Err(BackendError::new("no renderer"))
        );
        assert!(backend.create_window(&desc(Extent::new(1, 1))).is_ok());
        assert_eq!(controller.windows().len(), 1);
    }

    #[test]
    fn events_are_fifo() {
        let (mut backend, controller) = HeadlessBackend::new();

        controller.push_event(NativeEvent::Quit);
        controller.push_event(NativeEvent::Unknown(7));

        assert_eq!(backend.poll_event(), Some(NativeEvent::Quit));
        assert_eq!(backend.poll_event(), Some(NativeEvent::Unknown(7)));
        assert_eq!(backend.poll_event(), None);
    }

    #[test]
    fn destroyed_window_ignores_calls() {
        let (mut backend, controller) = HeadlessBackend::new();
        let window = backend.create_window(&desc(Extent::new(2, 2))).unwrap();

        backend.destroy(window);
        backend.set_title(window, "late");
        backend.destroy(window);

        assert!(controller.is_destroyed(window));
        assert_eq!(controller.title(window).as_deref(), Some("test"));
        assert_eq!(controller.destroy_count(window), 2);
    }

    #[test]
    fn resize_keeps_staged_pixels() {
        let (mut backend, controller) = HeadlessBackend::new();
        let window = backend.create_window(&desc(Extent::new(2, 2))).unwrap();

        backend.set_draw_color(window, Color::BLUE);
        backend.draw_point(window, Point::new(1, 1));
        backend.set_size(window, Extent::new(3, 3));
        backend.present(window);

        let frame = controller.frame(window).unwrap();
        assert_eq!(frame.extent(), Extent::new(3, 3));
        assert_eq!(frame.pixel(Point::new(1, 1)), Some(Color::BLUE));
        assert_eq!(controller.extent(window), Some(Extent::new(3, 3)));
    }
}
