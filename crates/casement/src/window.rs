use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use crossbeam::channel::{Receiver, RecvTimeoutError, TryRecvError};
use geometry::{Extent, Rect, ScreenPx};
use parking_lot::{Mutex, MutexGuard};
use structures::Handle;
use surface::PixelSurface;

use crate::{
    command::{Command, LoopLink, Opened},
    error::{Error, Result},
    event::Event,
    event_loop::WindowState,
};

/// A unique identifier assigned to a window by its driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub(crate) Handle<WindowState>);

/// State visible to both the window handle and the loop.
pub(crate) struct WindowShared {
    closed: AtomicBool,
    size_locked: AtomicBool,
    /// Maintained by the loop. Callers never ask the native window.
    extent: Mutex<Extent<u32, ScreenPx>>,
    surface: Mutex<PixelSurface>,
}

impl WindowShared {
    pub fn new(extent: Extent<u32, ScreenPx>) -> Self {
        Self {
            closed: AtomicBool::new(false),
            size_locked: AtomicBool::new(false),
            extent: Mutex::new(extent),
            surface: Mutex::new(PixelSurface::new(extent)),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Marks the window closed, returning whether it already was.
    pub fn mark_closed(&self) -> bool {
        self.closed.swap(true, Ordering::AcqRel)
    }

    pub fn is_size_locked(&self) -> bool {
        self.size_locked.load(Ordering::Acquire)
    }

    pub fn extent(&self) -> Extent<u32, ScreenPx> {
        *self.extent.lock()
    }

    pub fn set_extent(&self, extent: Extent<u32, ScreenPx>) {
        *self.extent.lock() = extent;
    }

    pub fn surface(&self) -> &Mutex<PixelSurface> {
        &self.surface
    }
}

/// An on-screen window.
///
/// Every method is safe to call from any thread. Operations that touch the
/// native window are forwarded to the window loop and wait for it to finish.
/// Once the window is closed every operation returns `Ok(())` immediately
/// without contacting the loop.
///
/// Dropping a `Window` does not close it; call [`Window::close`].
pub struct Window {
    id: WindowId,
    shared: Arc<WindowShared>,
    events: Receiver<Event>,
    link: LoopLink,
}

impl Window {
    pub(crate) fn new(opened: Opened, link: LoopLink) -> Self {
        Self {
            id: opened.id,
            shared: opened.shared,
            events: opened.events,
            link,
        }
    }

    #[must_use]
    pub fn id(&self) -> WindowId {
        self.id
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    pub fn set_title(&self, title: &str) -> Result<()> {
        self.round_trip(Command::SetTitle(title.to_string()))
    }

    /// Asks for a new window size. The loop ignores the request while the
    /// size is locked.
    pub fn set_size(&self, extent: Extent<u32, ScreenPx>) -> Result<()> {
        self.round_trip(Command::SetSize(extent))
    }

    /// The window size as last applied or reported by the loop.
    #[must_use]
    pub fn size(&self) -> Extent<u32, ScreenPx> {
        self.shared.extent()
    }

    /// Locks or unlocks the window size against [`Window::set_size`]. Takes
    /// effect immediately.
    pub fn lock_size(&self, lock: bool) {
        self.shared.size_locked.store(lock, Ordering::Release);
    }

    #[must_use]
    pub fn is_size_locked(&self) -> bool {
        self.shared.is_size_locked()
    }

    pub fn show(&self) -> Result<()> {
        self.round_trip(Command::Show)
    }

    /// Presents the window surface and clears it.
    ///
    /// `dirty` is accepted for interface compatibility; the whole surface is
    /// always presented.
    pub fn flush(&self, dirty: &[Rect<u32, ScreenPx>]) -> Result<()> {
        if !dirty.is_empty() {
            log::trace!("{:?}: flushing full surface ({} dirty regions)", self.id, dirty.len());
        }
        self.round_trip(Command::Flush)
    }

    /// Locks the window surface for drawing.
    ///
    /// The guard must be dropped before calling [`Window::flush`], otherwise
    /// the flush is skipped once the loop gives up waiting for it.
    pub fn screen(&self) -> MutexGuard<'_, PixelSurface> {
        self.shared.surface().lock()
    }

    /// Destroys the native window. Calling `close` again does nothing.
    ///
    /// The event stream ends once the events already queued for this window
    /// have been read.
    pub fn close(&self) -> Result<()> {
        if self.shared.mark_closed() {
            return Ok(());
        }
        log::debug!("{:?}: closing", self.id);
        self.finish(self.link.send_command(self.id, Command::Close))
    }

    /// The stream of events for this window, in the order the native library
    /// reported them.
    #[must_use]
    pub fn events(&self) -> &Receiver<Event> {
        &self.events
    }

    /// Blocks until the next event arrives. Returns `None` once the window is
    /// closed and its remaining events have been read.
    #[must_use]
    pub fn next_event(&self) -> Option<Event> {
        self.events.recv().ok()
    }

    #[must_use]
    pub fn next_event_timeout(&self, timeout: Duration) -> Option<Event> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    #[must_use]
    pub fn try_next_event(&self) -> Option<Event> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    fn round_trip(&self, command: Command) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        self.finish(self.link.send_command(self.id, command))
    }

    /// A window closed while the request was in flight, whether by `close`
    /// on another thread or by driver shutdown, has nothing left to report.
    fn finish(&self, result: Result<()>) -> Result<()> {
        match result {
            Err(Error::Disconnected) if self.is_closed() => Ok(()),
            other => other,
        }
    }
}

impl std::fmt::Debug for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Window")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
impl WindowId {
    /// An id that no driver will ever hand out.
    pub(crate) fn dangling() -> Self {
        let mut pool = structures::GenerationalPool::new();
        let handle = pool.insert(WindowState::detached());
        pool.remove(handle);
        Self(handle)
    }
}
