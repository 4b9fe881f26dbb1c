use std::io;
use std::time::Duration;

use slab::Slab;

use crate::channel::Channel;
use crate::config::PRIORITY_COUNT;
use crate::error::ProtocolError;
use crate::packet::Packet;
use crate::poller::ReaderPoller;
use crate::socket::RecvOutcome;

const READ_CHUNK: usize = 64 * 1024;

#[derive(Debug)]
pub enum ReaderOutcome {
    Packets(usize, Vec<(u8, Packet)>),
    Disconnected(usize),
    Protocol(usize, ProtocolError),
    Failed(usize, io::Error),
}

/// Reads each ready socket until "would block" or EOF, feeding bytes through
/// the channel's frame/packet assembly (§4.D).
#[derive(Debug)]
pub struct ReaderPool {
    poller: ReaderPoller,
}

impl ReaderPool {
    pub fn new() -> io::Result<ReaderPool> {
        Ok(ReaderPool { poller: ReaderPoller::new()? })
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

    pub fn waker(&self) -> crate::waker::Waker {
        self.poller.waker()
    }

    pub fn step(
        &mut self,
        timeout: Option<Duration>,
        channels: &mut Slab<Channel<PRIORITY_COUNT>>,
    ) -> io::Result<Vec<ReaderOutcome>> {
        let events = self.poller.poll(timeout)?;
        let mut outcomes = Vec::new();

        for ev in events {
            let Some(channel) = channels.get_mut(ev.id) else { continue };
            if ev.failed {
                outcomes.push(ReaderOutcome::Failed(ev.id, io::Error::new(io::ErrorKind::Other, "poller reported error")));
                continue;
            }

            let mut buf = [0u8; READ_CHUNK];
            let mut collected = Vec::new();
            loop {
                match channel.socket.recv(&mut buf) {
                    RecvOutcome::Data(n) => match channel.ingest(&buf[..n]) {
                        Ok(mut packets) => collected.append(&mut packets),
                        Err(e) => {
                            outcomes.push(ReaderOutcome::Protocol(ev.id, e));
                            break;
                        }
                    },
                    RecvOutcome::Eof => {
                        outcomes.push(ReaderOutcome::Disconnected(ev.id));
                        break;
                    }
                    RecvOutcome::WouldBlock => break,
                    RecvOutcome::Failure(e) => {
                        outcomes.push(ReaderOutcome::Failed(ev.id, e));
                        break;
                    }
                }
            }

            if !collected.is_empty() {
                outcomes.push(ReaderOutcome::Packets(ev.id, collected));
            }
        }

        Ok(outcomes)
    }
}
