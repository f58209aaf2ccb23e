//! A window driver that keeps every native windowing call on one thread.
//!
//! A [`Driver`] owns a loop thread that creates the [`Backend`] and serves all
//! of its windows. [`Window`] handles forward their operations to that thread
//! and wait for an acknowledgement, so they can be used from anywhere. Native
//! events are translated into portable [`Event`]s and delivered on a per-window
//! stream.
//!
//! ```no_run
//! use casement::{Config, Driver, Event};
//! use geometry::Extent;
//!
//! let (driver, _controller) = Driver::headless(Config::default())?;
//! let window = driver.open_window(Extent::new(640, 480))?;
//! window.set_title("hello")?;
//!
//! while let Some(event) = window.next_event() {
//!     if event == Event::Close {
//!         window.close()?;
//!     }
//! }
//! # Ok::<(), casement::Error>(())
//! ```

pub mod backend;
pub mod chord;
mod command;
mod config;
mod error;
mod event;
mod event_loop;
pub mod scancode;
pub mod translate;
mod window;

use std::thread::{self, JoinHandle};

use crossbeam::channel;
use geometry::{Extent, ScreenPx};

pub use backend::{Backend, HeadlessBackend, HeadlessController};
pub use config::Config;
pub use error::{BackendError, Error, Result};
pub use event::{Event, MouseButtons};
pub use window::{Window, WindowId};

use command::{LoopLink, Request};
use event_loop::WindowLoop;

/// Installs `env_logger` as the global logger, using `config.log_filter`
/// unless `RUST_LOG` is set. Does nothing if a logger is already installed.
pub fn init_logging(config: &Config) {
    let env = env_logger::Env::default().default_filter_or(config.log_filter.as_str());
    if env_logger::Builder::from_env(env).try_init().is_err() {
        log::debug!("logger already installed");
    }
}

/// Owns the window loop thread.
///
/// Dropping the driver shuts the loop down and closes every window it still
/// owns.
pub struct Driver {
    link: LoopLink,
    thread: Option<JoinHandle<()>>,
}

impl Driver {
    /// Starts the window loop. `factory` runs on the loop thread and the
    /// backend it returns never leaves that thread.
    ///
    /// Returns once the backend is ready.
    pub fn new<B, F>(config: Config, factory: F) -> Result<Self>
    where
        B: Backend + 'static,
        F: FnOnce() -> Result<B, BackendError> + Send + 'static,
    {
        let (requests_tx, requests) = channel::unbounded();
        let (commands_tx, commands) = channel::unbounded();
        let (alive_tx, alive) = channel::bounded::<()>(0);
        let (ready_tx, ready) = channel::bounded(1);

        let timeout = config.command_timeout();
        let name = config.thread_name.clone();

        let thread = thread::Builder::new()
            .name(name)
            .spawn(move || {
                // Disconnects waiting callers when the thread exits, however
                // it exits.
                let _alive = alive_tx;

                let backend = match factory() {
                    Ok(backend) => backend,
                    Err(error) => {
                        let _ = ready_tx.send(Err(error));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                WindowLoop::new(backend, config).run(&requests, &commands);
            })
            .map_err(Error::Spawn)?;

        match ready.recv() {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                let _ = thread.join();
                return Err(Error::Backend(error));
            }
            Err(_) => {
                let _ = thread.join();
                return Err(Error::Disconnected);
            }
        }

        Ok(Self {
            link: LoopLink {
                requests: requests_tx,
                commands: commands_tx,
                alive,
                timeout,
            },
            thread: Some(thread),
        })
    }

    /// Starts a driver over an in-memory backend, along with the controller
    /// that inspects it.
    pub fn headless(config: Config) -> Result<(Self, HeadlessController)> {
        let (backend, controller) = HeadlessBackend::new();
        let driver = Self::new(config, move || Ok(backend))?;
        Ok((driver, controller))
    }

    /// Starts a driver over `winit`, presenting through `softbuffer`.
    #[cfg(feature = "winit")]
    pub fn winit(config: Config) -> Result<Self> {
        Self::new(config, backend::WinitBackend::new)
    }

    /// Opens a new window and waits for the loop to create it.
    pub fn open_window(&self, extent: Extent<u32, ScreenPx>) -> Result<Window> {
        let (reply, opened) = channel::bounded(1);
        self.link
            .requests
            .send(Request::Open { extent, reply })
            .map_err(|_| Error::Disconnected)?;

        let opened = self.link.wait(&opened)?.map_err(Error::Init)?;
        Ok(Window::new(opened, self.link.clone()))
    }

    /// Closes every window and stops the loop thread.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };

        log::debug!("stopping window loop");
        // Fails only if the loop is already gone.
        let _ = self.link.requests.send(Request::Shutdown);

        thread.join().map_err(|_| {
            log::error!("window loop panicked");
            Error::Disconnected
        })
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("running", &self.thread.is_some())
            .finish_non_exhaustive()
    }
}
