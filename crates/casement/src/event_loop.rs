//! The loop that owns the backend and serializes every native call onto one
//! thread.

use std::{collections::HashMap, sync::Arc, time::Instant};

use crossbeam::channel::{self, Receiver, Sender};
use geometry::{Extent, Point, ScreenPx};
use structures::GenerationalPool;
use surface::PixelSurface;

use crate::{
    backend::{Backend, NativeEvent, NativeWindowId, WindowDesc, WindowFlags},
    command::{Command, Envelope, Opened, Request},
    config::Config,
    error::BackendError,
    event::Event,
    translate::EventTranslator,
    window::{WindowId, WindowShared},
};

/// Per-window state that only the loop thread touches.
pub(crate) struct WindowState {
    native: NativeWindowId,
    shared: Arc<WindowShared>,
    /// Swapped with the caller-visible surface on flush.
    back_buffer: PixelSurface,
    translator: EventTranslator,
    events: Sender<Event>,
}

impl WindowState {
    fn new(
        native: NativeWindowId,
        extent: Extent<u32, ScreenPx>,
    ) -> (Self, Arc<WindowShared>, Receiver<Event>) {
        let shared = Arc::new(WindowShared::new(extent));
        let (events, receiver) = channel::unbounded();
        let state = Self {
            native,
            shared: shared.clone(),
            back_buffer: PixelSurface::new(extent),
            translator: EventTranslator::new(),
            events,
        };
        (state, shared, receiver)
    }

    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self::new(NativeWindowId(0), Extent::new(1, 1)).0
    }

    fn deliver(&mut self, id: WindowId, event: &NativeEvent) {
        for portable in self.translator.translate(event) {
            if let Event::Resize { extent } = &portable {
                self.shared.set_extent(*extent);
            }
            if self.events.send(portable).is_err() {
                log::trace!("{id:?}: event stream has no reader");
            }
        }
    }
}

pub(crate) struct WindowLoop<B: Backend> {
    backend: B,
    config: Config,
    windows: GenerationalPool<WindowState>,
    by_native: HashMap<NativeWindowId, WindowId>,
    last_pump: Instant,
}

impl<B: Backend> WindowLoop<B> {
    pub fn new(backend: B, config: Config) -> Self {
        Self {
            backend,
            config,
            windows: GenerationalPool::new(),
            by_native: HashMap::new(),
            last_pump: Instant::now(),
        }
    }

    /// Serves requests and commands until asked to shut down, then tears
    /// down every remaining window.
    pub fn run(mut self, requests: &Receiver<Request>, commands: &Receiver<Envelope>) {
        log::info!("window loop started");
        let poll_interval = self.config.poll_interval();

        loop {
            let keep_running = channel::select! {
                recv(requests) -> request => match request {
                    Ok(Request::Open { extent, reply }) => {
                        self.open(extent, &reply);
                        true
                    }
                    Ok(Request::Shutdown) | Err(_) => false,
                },
                recv(commands) -> envelope => match envelope {
                    Ok(envelope) => {
                        self.execute(envelope);
                        true
                    }
                    Err(_) => false,
                },
                default(poll_interval) => true,
            };

            if !keep_running {
                break;
            }

            // Keeps input flowing while commands arrive faster than the poll
            // interval.
            if self.last_pump.elapsed() >= poll_interval {
                self.pump();
            }
        }

        self.shutdown(commands);
        log::info!("window loop stopped");
    }

    fn open(&mut self, extent: Extent<u32, ScreenPx>, reply: &Sender<Result<Opened, BackendError>>) {
        let mut flags = WindowFlags::RESIZABLE;
        if self.config.show_on_open {
            flags |= WindowFlags::VISIBLE;
        }

        let desc = WindowDesc {
            title: &self.config.default_title,
            extent,
            flags,
        };

        let native = match self.backend.create_window(&desc) {
            Ok(native) => native,
            Err(error) => {
                log::warn!("failed to open {}x{} window: {error}", extent.width, extent.height);
                if reply.send(Err(error)).is_err() {
                    log::trace!("open failure had no one waiting");
                }
                return;
            }
        };

        let (state, shared, events) = WindowState::new(native, extent);
        let id = WindowId(self.windows.insert(state));
        self.by_native.insert(native, id);
        log::info!("{id:?}: opened {}x{} as {native:?}", extent.width, extent.height);

        if reply.send(Ok(Opened { id, shared, events })).is_err() {
            log::warn!("{id:?}: opener stopped waiting, closing window");
            self.close_window(id);
        }
    }

    fn execute(&mut self, envelope: Envelope) {
        let Envelope {
            window: id,
            command,
            ack,
        } = envelope;

        match self.windows.get(id.0).map(|state| state.native) {
            Some(native) => {
                log::debug!("{id:?}: {command:?}");
                match command {
                    Command::SetTitle(title) => self.backend.set_title(native, &title),
                    Command::SetSize(extent) => self.set_size(id, native, extent),
                    Command::Show => self.backend.show(native),
                    Command::Flush => self.flush(id),
                    Command::Close => self.close_window(id),
                }
            }
            None => log::debug!("{id:?}: ignoring {command:?} for closed window"),
        }

        if ack.send(()).is_err() {
            log::warn!("{id:?}: caller stopped waiting for acknowledgement");
        }
    }

    fn set_size(&mut self, id: WindowId, native: NativeWindowId, extent: Extent<u32, ScreenPx>) {
        let Some(state) = self.windows.get(id.0) else {
            return;
        };

        if state.shared.is_size_locked() {
            log::debug!("{id:?}: size is locked, ignoring resize");
            return;
        }

        self.backend.set_size(native, extent);
        state.shared.set_extent(extent);
    }

    /// Swaps in the caller's surface, draws every pixel, presents it, and
    /// leaves a cleared surface for the caller.
    fn flush(&mut self, id: WindowId) {
        let Some(state) = self.windows.get_mut(id.0) else {
            return;
        };

        let timeout = self.config.surface_lock_timeout();
        {
            let Some(mut front) = state.shared.surface().try_lock_for(timeout) else {
                log::warn!("{id:?}: surface still locked after {timeout:?}, skipping flush");
                return;
            };

            std::mem::swap(&mut *front, &mut state.back_buffer);

            // The caller replaced the surface with one of another size. Both
            // buffers follow the new size from here on.
            if front.extent() != state.back_buffer.extent() {
                *front = PixelSurface::new(state.back_buffer.extent());
            }
        }

        let native = state.native;
        for (y, row) in (0u32..).zip(state.back_buffer.rows()) {
            for (x, color) in (0u32..).zip(row) {
                self.backend.set_draw_color(native, *color);
                self.backend.draw_point(native, Point::new(x, y));
            }
        }
        self.backend.present(native);

        state.back_buffer.clear();
    }

    /// Drains every pending native event.
    fn pump(&mut self) {
        self.last_pump = Instant::now();
        while let Some(event) = self.backend.poll_event() {
            self.dispatch(&event);
        }
    }

    fn dispatch(&mut self, event: &NativeEvent) {
        match event.window() {
            Some(native) => {
                let Some(&id) = self.by_native.get(&native) else {
                    log::trace!("dropping event for unknown window {native:?}: {event:?}");
                    return;
                };
                if let Some(state) = self.windows.get_mut(id.0) {
                    state.deliver(id, event);
                }
            }
            None => {
                // Application-wide events go to every window.
                for (handle, state) in self.windows.iter_mut() {
                    state.deliver(WindowId(handle), event);
                }
            }
        }
    }

    /// Destroys the native window and ends its event stream.
    fn close_window(&mut self, id: WindowId) {
        let Some(state) = self.windows.remove(id.0) else {
            return;
        };

        state.shared.mark_closed();
        self.by_native.remove(&state.native);
        self.backend.destroy(state.native);
        log::info!("{id:?}: closed");
    }

    fn shutdown(&mut self, commands: &Receiver<Envelope>) {
        let open: Vec<_> = self.windows.handles().collect();
        if !open.is_empty() {
            log::info!("closing {} window(s) on shutdown", open.len());
        }

        // Mark everything closed first so callers stop sending.
        for state in self.windows.iter().map(|(_, state)| state) {
            state.shared.mark_closed();
        }
        for handle in open {
            self.close_window(WindowId(handle));
        }

        for envelope in commands.try_iter() {
            log::debug!("{:?}: acknowledging {:?} after shutdown", envelope.window, envelope.command);
            if envelope.ack.send(()).is_err() {
                log::trace!("{:?}: caller stopped waiting before shutdown", envelope.window);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use surface::Color;

    use super::*;
    use crate::{
        backend::{HeadlessBackend, HeadlessController, NativeCall, NativeWindowEvent},
        command::LoopLink,
        error::Error,
        event::MouseButtons,
        Driver, Window,
    };

    const SCANCODE_A: u32 = 4;
    const SCANCODE_LEFT_CONTROL: u32 = 224;

    fn driver() -> (Driver, HeadlessController) {
        let config = Config {
            poll_interval_ms: 1,
            command_timeout_ms: 2000,
            ..Config::default()
        };
        Driver::headless(config).unwrap()
    }

    fn open(driver: &Driver, controller: &HeadlessController) -> (Window, NativeWindowId) {
        let window = driver.open_window(Extent::new(800, 600)).unwrap();
        let native = *controller.windows().last().unwrap();
        (window, native)
    }

    fn next(window: &Window) -> Event {
        window
            .next_event_timeout(Duration::from_secs(2))
            .expect("event was not delivered")
    }

    #[test]
    fn open_applies_config() {
        let (driver, controller) = driver();
        let (window, native) = open(&driver, &controller);

        assert_eq!(window.size(), Extent::new(800, 600));
        assert_eq!(controller.title(native).as_deref(), Some("casement"));
        assert!(controller.is_visible(native));
        assert_eq!(
            controller.calls()[0],
            NativeCall::CreateWindow {
                window: native,
                title: "casement".to_string(),
                extent: Extent::new(800, 600),
            }
        );
    }

    #[test]
    fn hidden_until_shown() {
        let config = Config {
            show_on_open: false,
            ..Config::default()
        };
        let (driver, controller) = Driver::headless(config).unwrap();
        let (window, native) = open(&driver, &controller);

        assert!(!controller.is_visible(native));
        window.show().unwrap();
        assert!(controller.is_visible(native));
    }

    #[test]
    fn set_title_reaches_native_window() {
        let (driver, controller) = driver();
        let (window, native) = open(&driver, &controller);

        window.set_title("hello").unwrap();
        assert_eq!(controller.title(native).as_deref(), Some("hello"));
    }

    #[test]
    fn set_size_updates_cached_size() {
        let (driver, controller) = driver();
        let (window, native) = open(&driver, &controller);

        window.set_size(Extent::new(1024, 768)).unwrap();
        assert_eq!(window.size(), Extent::new(1024, 768));
        assert_eq!(controller.extent(native), Some(Extent::new(1024, 768)));
    }

    #[test]
    fn locked_size_ignores_set_size() {
        let (driver, controller) = driver();
        let (window, native) = open(&driver, &controller);

        window.lock_size(true);
        window.set_size(Extent::new(1024, 768)).unwrap();
        assert_eq!(window.size(), Extent::new(800, 600));
        assert_eq!(controller.extent(native), Some(Extent::new(800, 600)));

        window.lock_size(false);
        window.set_size(Extent::new(1024, 768)).unwrap();
        assert_eq!(window.size(), Extent::new(1024, 768));
    }

    #[test]
    fn flush_presents_and_clears() {
        let (driver, controller) = driver();
        let window = driver.open_window(Extent::new(4, 3)).unwrap();
        let native = controller.windows()[0];

        {
            let mut screen = window.screen();
            screen.set_pixel(Point::new(0, 0), Color::RED);
            screen.set_pixel(Point::new(3, 2), Color::GREEN);
        }
        window.flush(&[]).unwrap();

        let frame = controller.frame(native).unwrap();
        assert_eq!(frame.pixel(Point::new(0, 0)), Some(Color::RED));
        assert_eq!(frame.pixel(Point::new(3, 2)), Some(Color::GREEN));
        assert_eq!(frame.pixel(Point::new(1, 1)), Some(Color::TRANSPARENT));
        assert_eq!(controller.points_drawn(), 12);
        assert_eq!(controller.present_count(native), 1);

        assert!(window
            .screen()
            .pixels()
            .iter()
            .all(|pixel| *pixel == Color::TRANSPARENT));

        // A second flush presents the cleared surface.
        window.flush(&[]).unwrap();
        let frame = controller.frame(native).unwrap();
        assert_eq!(frame.pixel(Point::new(0, 0)), Some(Color::TRANSPARENT));
    }

    #[test]
    fn flush_follows_replaced_surface() {
        let (driver, controller) = driver();
        let window = driver.open_window(Extent::new(2, 2)).unwrap();
        let native = controller.windows()[0];

        *window.screen() = PixelSurface::filled(Extent::new(3, 1), Color::BLUE);
        window.flush(&[]).unwrap();

        assert_eq!(window.screen().extent(), Extent::new(3, 1));
        let frame = controller.frame(native).unwrap();
        assert_eq!(frame.pixel(Point::new(1, 0)), Some(Color::BLUE));
    }

    #[test]
    fn held_surface_skips_flush() {
        let config = Config {
            surface_lock_timeout_ms: 10,
            ..Config::default()
        };
        let (driver, controller) = Driver::headless(config).unwrap();
        let (window, native) = open(&driver, &controller);

        let guard = window.screen();
        window.flush(&[]).unwrap();
        drop(guard);

        assert_eq!(controller.present_count(native), 0);
    }

    #[test]
    fn key_events_carry_chords() {
        let (driver, controller) = driver();
        let (window, native) = open(&driver, &controller);

        controller.push_event(NativeEvent::KeyDown {
            window: native,
            scancode: SCANCODE_LEFT_CONTROL,
        });
        controller.push_event(NativeEvent::KeyDown {
            window: native,
            scancode: SCANCODE_A,
        });
        controller.push_event(NativeEvent::KeyUp {
            window: native,
            scancode: SCANCODE_LEFT_CONTROL,
        });

        let expected = [
            Event::KeyDown { key: "left_control" },
            Event::KeyTyped {
                chord: "left_control".to_string(),
            },
            Event::KeyDown { key: "a" },
            Event::KeyTyped {
                chord: "left_control+a".to_string(),
            },
            Event::KeyUp { key: "left_control" },
            Event::KeyTyped {
                chord: "a".to_string(),
            },
        ];
        for event in expected {
            assert_eq!(next(&window), event);
        }
    }

    #[test]
    fn events_go_to_their_window() {
        let (driver, controller) = driver();
        let (first, first_native) = open(&driver, &controller);
        let (second, second_native) = open(&driver, &controller);

        controller.push_event(NativeEvent::MouseButtonDown {
            window: second_native,
            button: 2,
            at: Point::new(5, 6),
        });
        controller.push_event(NativeEvent::Window {
            window: first_native,
            event: NativeWindowEvent::Enter,
        });

        assert_eq!(
            next(&second),
            Event::MouseButton {
                which: MouseButtons::RIGHT,
                at: Point::new(5, 6),
            }
        );
        assert_eq!(next(&first), Event::MouseEntered);
        assert_eq!(first.try_next_event(), None);
        assert_eq!(second.try_next_event(), None);
    }

    #[test]
    fn quit_reaches_every_window() {
        let (driver, controller) = driver();
        let (first, _) = open(&driver, &controller);
        let (second, _) = open(&driver, &controller);

        controller.push_event(NativeEvent::Quit);

        assert_eq!(next(&first), Event::Close);
        assert_eq!(next(&second), Event::Close);
    }

    #[test]
    fn native_resize_updates_size_even_when_locked() {
        let (driver, controller) = driver();
        let (window, native) = open(&driver, &controller);
        window.lock_size(true);

        controller.push_event(NativeEvent::Window {
            window: native,
            event: NativeWindowEvent::Resized {
                width: 640,
                height: 480,
            },
        });

        assert_eq!(
            next(&window),
            Event::Resize {
                extent: Extent::new(640, 480)
            }
        );
        assert_eq!(window.size(), Extent::new(640, 480));
    }

    #[test]
    fn failed_open_leaves_loop_running() {
        let (driver, controller) = driver();
        let (window, native) = open(&driver, &controller);

        controller.fail_next_create("renderer unavailable");
        match driver.open_window(Extent::new(10, 10)) {
            Err(Error::Init(error)) => assert_eq!(error.0, "renderer unavailable"),
            other => panic!("expected init failure, got {other:?}"),
        }

        window.set_title("still here").unwrap();
        assert_eq!(controller.title(native).as_deref(), Some("still here"));
        assert!(driver.open_window(Extent::new(10, 10)).is_ok());
    }

    #[test]
    fn close_destroys_once_and_ends_events() {
        let (driver, controller) = driver();
        let (window, native) = open(&driver, &controller);

        controller.push_event(NativeEvent::Window {
            window: native,
            event: NativeWindowEvent::Close,
        });
        assert_eq!(next(&window), Event::Close);

        window.close().unwrap();
        window.close().unwrap();
        window.set_title("ignored").unwrap();
        window.flush(&[]).unwrap();

        assert!(window.is_closed());
        assert!(controller.is_destroyed(native));
        assert_eq!(controller.destroy_count(native), 1);
        assert_eq!(controller.title(native).as_deref(), Some("casement"));
        assert_eq!(window.next_event(), None);

        controller.push_event(NativeEvent::KeyDown {
            window: native,
            scancode: SCANCODE_A,
        });
        assert_eq!(window.next_event_timeout(Duration::from_millis(50)), None);
    }

    #[test]
    fn native_calls_stay_on_loop_thread() {
        let (driver, controller) = driver();
        let (window, native) = open(&driver, &controller);

        std::thread::scope(|scope| {
            for i in 0..4 {
                let window = &window;
                scope.spawn(move || {
                    for j in 0..10 {
                        window.set_title(&format!("{i}-{j}")).unwrap();
                        window.flush(&[]).unwrap();
                    }
                });
            }
        });
        controller.push_event(NativeEvent::Quit);
        assert_eq!(next(&window), Event::Close);

        let threads = controller.call_threads();
        assert_eq!(threads.len(), 1);
        assert_ne!(threads[0], std::thread::current().id());
        assert_eq!(controller.present_count(native), 40);
    }

    #[test]
    fn commands_from_one_thread_apply_in_order() {
        let (driver, controller) = driver();
        let (window, native) = open(&driver, &controller);

        for i in 0..20 {
            window.set_title(&i.to_string()).unwrap();
        }

        let titles: Vec<_> = controller
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                NativeCall::SetTitle { window, title } if window == native => Some(title),
                _ => None,
            })
            .collect();
        let expected: Vec<_> = (0..20).map(|i: i32| i.to_string()).collect();
        assert_eq!(titles, expected);
    }

    #[test]
    fn shutdown_closes_everything() {
        let (driver, controller) = driver();
        let (first, first_native) = open(&driver, &controller);
        let (second, second_native) = open(&driver, &controller);
        second.close().unwrap();

        driver.shutdown().unwrap();

        assert!(first.is_closed());
        assert_eq!(controller.destroy_count(first_native), 1);
        assert_eq!(controller.destroy_count(second_native), 1);
        assert_eq!(first.next_event(), None);

        first.set_title("after shutdown").unwrap();
        first.close().unwrap();
    }

    #[test]
    fn dropping_driver_shuts_down() {
        let (driver, controller) = driver();
        let (window, native) = open(&driver, &controller);

        drop(driver);

        assert!(window.is_closed());
        assert!(controller.is_destroyed(native));
        window.show().unwrap();
    }

    #[test]
    fn abandoned_open_is_closed() {
        let (backend, controller) = HeadlessBackend::new();
        let (requests_tx, requests) = channel::unbounded();
        let (_commands_tx, commands) = channel::unbounded();

        // The opener gave up before the loop got to its request.
        let (reply, opened) = channel::bounded(1);
        drop(opened);
        requests_tx
            .send(Request::Open {
                extent: Extent::new(8, 8),
                reply,
            })
            .unwrap();
        requests_tx.send(Request::Shutdown).unwrap();

        WindowLoop::new(backend, Config::default()).run(&requests, &commands);

        let native = controller.windows()[0];
        assert!(controller.is_destroyed(native));
        assert_eq!(controller.destroy_count(native), 1);
    }

    #[test]
    fn timed_out_open_is_closed_by_loop() {
        let config = Config {
            surface_lock_timeout_ms: 300,
            ..Config::default()
        };
        let (driver, controller) = Driver::headless(config).unwrap();
        let (window, first) = open(&driver, &controller);

        let guard = window.screen();
        std::thread::scope(|scope| {
            // Keeps the loop busy until the surface lock times out.
            scope.spawn(|| window.flush(&[]).unwrap());
            std::thread::sleep(Duration::from_millis(50));

            let link = LoopLink {
                timeout: Duration::from_millis(20),
                ..driver.link.clone()
            };
            let (reply, pending) = channel::bounded(1);
            link.requests
                .send(Request::Open {
                    extent: Extent::new(8, 8),
                    reply,
                })
                .unwrap();
            assert!(matches!(link.wait(&pending), Err(Error::Timeout(_))));
        });
        drop(guard);

        // Opens are served in order, so this one runs after the abandoned one.
        let (_third, _) = open(&driver, &controller);

        let abandoned = controller.windows()[1];
        assert_eq!(controller.destroy_count(abandoned), 1);
        assert!(!controller.is_destroyed(first));
    }

    #[test]
    fn shutdown_acknowledges_queued_commands() {
        let (backend, controller) = HeadlessBackend::new();
        let mut window_loop = WindowLoop::new(backend, Config::default());

        let (reply, opened) = channel::bounded(1);
        window_loop.open(Extent::new(4, 4), &reply);
        let opened = opened.try_recv().unwrap().unwrap();

        let (commands_tx, commands) = channel::unbounded();
        let (ack, done) = channel::bounded(1);
        commands_tx
            .send(Envelope {
                window: opened.id,
                command: Command::SetTitle("late".to_string()),
                ack,
            })
            .unwrap();

        window_loop.shutdown(&commands);

        let (requests, _) = channel::unbounded();
        let (_alive_tx, alive) = channel::bounded(0);
        let link = LoopLink {
            requests,
            commands: commands_tx,
            alive,
            timeout: Duration::from_secs(1),
        };
        assert!(link.wait(&done).is_ok());

        let native = controller.windows()[0];
        assert!(opened.shared.is_closed());
        assert_eq!(controller.destroy_count(native), 1);
        assert_eq!(controller.title(native).as_deref(), Some("casement"));
        assert_eq!(opened.events.recv().ok(), None);
    }
}
