//! Messages exchanged between caller threads and the window loop.

use std::{sync::Arc, time::Duration};

use crossbeam::channel::{self, Receiver, Sender};
use geometry::{Extent, ScreenPx};

use crate::{
    error::{BackendError, Error, Result},
    event::Event,
    window::{WindowId, WindowShared},
};

/// Loop-wide requests that are not addressed to an existing window.
pub(crate) enum Request {
    Open {
        extent: Extent<u32, ScreenPx>,
        reply: Sender<Result<Opened, BackendError>>,
    },
    Shutdown,
}

/// Everything a caller needs to build a `Window` for a freshly opened native
/// window.
pub(crate) struct Opened {
    pub id: WindowId,
    pub shared: Arc<WindowShared>,
    pub events: Receiver<Event>,
}

#[derive(Debug)]
pub(crate) enum Command {
    SetTitle(String),
    SetSize(Extent<u32, ScreenPx>),
    Show,
    Flush,
    Close,
}

/// A command for one window together with the channel that acknowledges it.
pub(crate) struct Envelope {
    pub window: WindowId,
    pub command: Command,
    pub ack: Sender<()>,
}

/// The sending half of a round trip, shared by the driver and every window.
#[derive(Clone)]
pub(crate) struct LoopLink {
    pub requests: Sender<Request>,
    pub commands: Sender<Envelope>,
    /// Never carries a message. It disconnects when the loop thread exits,
    /// which wakes anyone still waiting on a reply.
    pub alive: Receiver<()>,
    pub timeout: Duration,
}

impl LoopLink {
    /// Sends `command` to `window` and waits for the loop to acknowledge it.
    pub fn send_command(&self, window: WindowId, command: Command) -> Result<()> {
        let (ack, done) = channel::bounded(1);
        self.commands
            .send(Envelope {
                window,
                command,
                ack,
            })
            .map_err(|_| Error::Disconnected)?;
        self.wait(&done)
    }

    /// Waits for a reply, giving up when the deadline passes or the loop
    /// goes away.
    pub fn wait<T>(&self, reply: &Receiver<T>) -> Result<T> {
        channel::select! {
            recv(reply) -> value => value.map_err(|_| Error::Disconnected),
            recv(self.alive) -> _ => {
                // The reply may have been sent just before the loop exited.
                reply.try_recv().map_err(|_| Error::Disconnected)
            },
            default(self.timeout) => Err(Error::Timeout(self.timeout)),
        }
    }
}
