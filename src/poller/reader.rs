use std::io;
use std::time::Duration;

use super::RawPoller;
use crate::epoll::Ready;
use crate::socket::Socket;
use crate::waker::Waker;

/// Reserved token for the self-pipe waker, outside the range of slab indices
/// a channel could ever occupy.
const WAKE_TOKEN: usize = usize::MAX;

#[derive(Debug)]
pub struct ReaderEvent {
    pub id: usize,
    pub disconnected: bool,
    pub failed: bool,
}

/// Observes `readable | error | hangup` on established sockets (§4.A).
/// Also carries the self-pipe [`Waker`] a blocked `step()` is woken through
/// when another thread calls `interrupt()`.
#[derive(Debug)]
pub struct ReaderPoller {
    raw: RawPoller,
    waker: Waker,
}

impl ReaderPoller {
    pub fn new() -> io::Result<ReaderPoller> {
        let mut raw = RawPoller::new()?;
        let waker = Waker::new()?;
        raw.add(WAKE_TOKEN, &waker, Ready::readable())?;
        // The waker is always registered; it isn't a caller-tracked socket,
        // so it must not count toward `empty()`.
        raw.registered = 0;
        Ok(ReaderPoller { raw, waker })
    }

    fn interest() -> Ready {
        Ready::readable() | Ready::error() | Ready::hup()
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

    pub fn waker(&self) -> Waker {
        self.waker.clone()
    }

    pub fn poll(&mut self, timeout: Option<Duration>) -> io::Result<Vec<ReaderEvent>> {
        let result = self.raw.poll(timeout)?;
        let mut woke = false;
        let events = result
            .iter()
            .filter_map(|ev| {
                if ev.token().0 == WAKE_TOKEN {
                    woke = true;
                    return None;
                }
                Some(ReaderEvent {
                    id: ev.token().0,
                    disconnected: ev.readiness().is_hup(),
                    failed: ev.readiness().is_error(),
                })
            })
            .collect();
        if woke {
            self.waker.finish()?;
        }
        Ok(events)
    }
}
