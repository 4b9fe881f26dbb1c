use std::io;
use std::time::Duration;

use slab::Slab;

use crate::channel::Channel;
use crate::config::PRIORITY_COUNT;
use crate::poller::WriterPoller;
use crate::socket::SendOutcome;

#[derive(Debug)]
pub enum WriterOutcome {
    /// The queue drained fully; caller should stop tracking this id in the
    /// `WriterPoller` until the next `enqueue` (§4.D).
    Idle(usize),
    Failed(usize, io::Error),
}

enum DrainResult {
    Idle,
    Pending,
    Failed(io::Error),
}

fn drain(channel: &mut Channel<PRIORITY_COUNT>, frame_mtu: usize) -> DrainResult {
    loop {
        let Some(frame) = channel.writer_queue.acquire_frame(frame_mtu) else {
            return DrainResult::Idle;
        };
        let frame_len = frame.len();

        match channel.socket.send(frame) {
            SendOutcome::Good(n) => {
                channel.writer_queue.shift(n);
                if n < frame_len {
                    return DrainResult::Pending;
                }
            }
            SendOutcome::Again => return DrainResult::Pending,
            SendOutcome::Failure(e) => return DrainResult::Failed(e),
        }
    }
}

/// On `can_write`, drains as much of the writer queue as the socket accepts,
/// respecting frame boundaries (§4.C, §4.D).
#[derive(Debug)]
pub struct WriterPool {
    poller: WriterPoller,
}

impl WriterPool {
    pub fn new() -> io::Result<WriterPool> {
        Ok(WriterPool { poller: WriterPoller::new()? })
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
        channels: &mut Slab<Channel<PRIORITY_COUNT>>,
        frame_mtu: usize,
    ) -> io::Result<Vec<WriterOutcome>> {
        let events = self.poller.poll(timeout)?;
        let mut outcomes = Vec::new();

        for ev in events {
            let Some(channel) = channels.get_mut(ev.id) else { continue };
            if ev.failed {
                outcomes.push(WriterOutcome::Failed(
                    ev.id,
                    io::Error::new(io::ErrorKind::Other, "poller reported error"),
                ));
                continue;
            }

            match drain(channel, frame_mtu) {
                DrainResult::Idle => outcomes.push(WriterOutcome::Idle(ev.id)),
                DrainResult::Pending => {}
                DrainResult::Failed(e) => outcomes.push(WriterOutcome::Failed(ev.id, e)),
            }
        }

        Ok(outcomes)
    }
}
