use std::io;
use std::time::Duration;

use super::RawPoller;
use crate::epoll::Ready;
use crate::listener::Listener;

#[derive(Debug)]
pub struct ListenerEvent {
    pub id: usize,
    pub failed: bool,
}

/// Observes `readable | error` on bound listeners (§4.A).
#[derive(Debug)]
pub struct ListenerPoller {
    raw: RawPoller,
}

impl ListenerPoller {
    pub fn new() -> io::Result<ListenerPoller> {
        Ok(ListenerPoller { raw: RawPoller::new()? })
    }

    fn interest() -> Ready {
        Ready::readable() | Ready::error()
    }

    pub fn add(&mut self, id: usize, listener: &Listener) -> io::Result<()> {
        self.raw.add(id, listener, Self::interest())
    }

    pub fn remove(&mut self, listener: &Listener) -> io::Result<()> {
        self.raw.remove(listener)
    }

    pub fn empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn poll(&mut self, timeout: Option<Duration>) -> io::Result<Vec<ListenerEvent>> {
        let result = self.raw.poll(timeout)?;
        Ok(result
            .iter()
            .map(|ev| ListenerEvent {
                id: ev.token().0,
                failed: ev.readiness().is_error(),
            })
            .collect())
    }
}
