use std::io;
use std::time::Duration;

use slab::Slab;

use crate::channel::Channel;
use crate::config::PRIORITY_COUNT;
use crate::error::ConnectFailure;
use crate::poller::ConnectingPoller;
use crate::socket::ConnectOutcome;

/// Outcome of one in-progress connect, resolved against `SO_ERROR` (§4.A).
#[derive(Debug)]
pub enum ConnectingOutcome {
    Connected(usize),
    Refused(usize, ConnectFailure),
}

/// Owns the `ConnectingPoller` view; the sockets themselves live in the
/// node's channel slab, indexed by the same id used to register them here.
#[derive(Debug)]
pub struct ConnectingPool {
    poller: ConnectingPoller,
}

impl ConnectingPool {
    pub fn new() -> io::Result<ConnectingPool> {
        Ok(ConnectingPool { poller: ConnectingPoller::new()? })
    }

    pub fn track(&mut self, id: usize, channel: &Channel<PRIORITY_COUNT>) -> io::Result<()> {
        self.poller.add(id, &channel.socket)
    }

    pub fn untrack(&mut self, channel: &Channel<PRIORITY_COUNT>) -> io::Result<()> {
        self.poller.remove(&channel.socket)
    }

    pub fn empty(&self) -> bool {
        self.poller.empty()
    }

    pub fn step(
        &mut self,
        timeout: Option<Duration>,
        channels: &Slab<Channel<PRIORITY_COUNT>>,
    ) -> io::Result<Vec<ConnectingOutcome>> {
        let events = self.poller.poll(timeout)?;
        let mut outcomes = Vec::new();

        for ev in events {
            let Some(channel) = channels.get(ev.id) else { continue };
            match channel.socket.connect_outcome() {
                ConnectOutcome::Connected => outcomes.push(ConnectingOutcome::Connected(ev.id)),
                ConnectOutcome::Failed(reason) => outcomes.push(ConnectingOutcome::Refused(ev.id, reason)),
                ConnectOutcome::InProgress => {}
            }
        }

        Ok(outcomes)
    }
}
