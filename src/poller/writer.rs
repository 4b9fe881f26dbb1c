use std::io;
use std::time::Duration;

use super::RawPoller;
use crate::epoll::Ready;
use crate::socket::Socket;

#[derive(Debug)]
pub struct WriterEvent {
    pub id: usize,
    pub disconnected: bool,
    pub failed: bool,
}

/// Observes `writable | error` on sockets with a non-empty writer queue (§4.A).
#[derive(Debug)]
pub struct WriterPoller {
    raw: RawPoller,
}

impl WriterPoller {
    pub fn new() -> io::Result<WriterPoller> {
        Ok(WriterPoller { raw: RawPoller::new()? })
    }

    fn interest() -> Ready {
        Ready::writable() | Ready::error()
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

    pub fn poll(&mut self, timeout: Option<Duration>) -> io::Result<Vec<WriterEvent>> {
        let result = self.raw.poll(timeout)?;
        Ok(result
            .iter()
            .map(|ev| WriterEvent {
                id: ev.token().0,
                disconnected: false,
                failed: ev.readiness().is_error(),
            })
            .collect())
    }
}
