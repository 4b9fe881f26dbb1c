use std::io;
use std::time::Duration;

use slab::Slab;

use crate::addr::SocketAddress4;
use crate::listener::{AcceptOutcome, Listener};
use crate::poller::ListenerPoller;
use crate::socket::Socket;

/// A socket accepted on behalf of `local_index` (the node that owns the
/// listener it arrived on).
#[derive(Debug)]
pub struct AcceptedSocket {
    pub local_index: usize,
    pub peer_addr: SocketAddress4,
    pub socket: Socket,
}

/// Owns every bound listener and accepts on each until "would block" (§4.D).
#[derive(Debug)]
pub struct ListenerPool {
    poller: ListenerPoller,
    listeners: Slab<(Listener, usize)>,
}

impl ListenerPool {
    pub fn new() -> io::Result<ListenerPool> {
        Ok(ListenerPool { poller: ListenerPoller::new()?, listeners: Slab::new() })
    }

    pub fn bind(&mut self, local_index: usize, addr: SocketAddress4, backlog: i32) -> io::Result<usize> {
        let listener = Listener::bind(addr, backlog)?;
        let entry = self.listeners.insert((listener, local_index));
        self.poller.add(entry, &self.listeners[entry].0)?;
        Ok(entry)
    }

    pub fn empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn step(&mut self, timeout: Option<Duration>) -> io::Result<Vec<AcceptedSocket>> {
        let events = self.poller.poll(timeout)?;
        let mut accepted = Vec::new();

        for ev in events {
            let Some((listener, local_index)) = self.listeners.get(ev.id) else { continue };
            loop {
                match listener.accept_nonblocking() {
                    AcceptOutcome::Accepted(socket) => {
                        accepted.push(AcceptedSocket {
                            local_index: *local_index,
                            peer_addr: socket.peer_addr().unwrap_or(listener.local_addr()),
                            socket,
                        });
                    }
                    AcceptOutcome::WouldBlock => break,
                    AcceptOutcome::Failure(e) => {
                        log::warn!("accept failed on listener {}: {e}", ev.id);
                        break;
                    }
                }
            }
        }

        Ok(accepted)
    }
}
