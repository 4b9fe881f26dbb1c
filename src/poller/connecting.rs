use std::io;
use std::time::Duration;

use super::RawPoller;
use crate::epoll::Ready;
use crate::socket::Socket;

/// Observes `writable | error | hangup` on sockets with an in-progress
/// non-blocking connect (§4.A).
#[derive(Debug)]
pub struct ConnectingEvent {
    pub id: usize,
    pub maybe_connected: bool,
}

#[derive(Debug)]
pub struct ConnectingPoller {
    raw: RawPoller,
}

impl ConnectingPoller {
    pub fn new() -> io::Result<ConnectingPoller> {
        Ok(ConnectingPoller { raw: RawPoller::new()? })
    }

    fn interest() -> Ready {
        Ready::writable() | Ready::error() | Ready::hup()
    }

    pub fn add(&mut self, id: usize, socket: &Socket) -> io::Result<()> {
        self.raw.add(id, socket, Self::interest())
    }

    pub fn remove(&mut self, socket: &Socket) -> io::Result<()> {
        self.raw.remove(socket)
    }

    pub fn empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// `maybe_connected` is a hint only: the caller must still consult
    /// [`Socket::connect_outcome`] (`SO_ERROR`) to classify `Connected` vs
    /// `Failed(reason)`, since a writable-with-error event looks identical
    /// at the epoll level (§4.A rationale).
    pub fn poll(&mut self, timeout: Option<Duration>) -> io::Result<Vec<ConnectingEvent>> {
        let result = self.raw.poll(timeout)?;
        Ok(result
            .iter()
            .map(|ev| ConnectingEvent {
                id: ev.token().0,
                maybe_connected: !ev.readiness().is_error() && !ev.readiness().is_hup(),
            })
            .collect())
    }
}
