//! Four specialised views over one `epoll` instance (§4.A).
//!
//! Each view differs only in the interest mask it registers and in how its
//! owning pool interprets the readiness it reports; the OS primitive and the
//! wait loop are shared.

use std::io;
use std::time::Duration;

use crate::epoll::{Epoll, EpollOpt, Event, Events, Ready, Source, Token};

pub mod connecting;
pub mod listener;
pub mod reader;
pub mod writer;

pub use connecting::ConnectingPoller;
pub use listener::ListenerPoller;
pub use reader::ReaderPoller;
pub use writer::WriterPoller;

/// Shared epoll wait loop. `interest` is fixed per concrete poller type and
/// passed to `add`; `poll` never blocks longer than `timeout` and absorbs
/// `EINTR` as zero events (delegated to [`crate::sys::epoll::Epoll::wait`]).
#[derive(Debug)]
pub(crate) struct RawPoller {
    epoll: Epoll,
    events: Events,
    registered: usize,
}

impl RawPoller {
    const DEFAULT_CAPACITY: usize = 256;

    fn new() -> io::Result<RawPoller> {
        Ok(RawPoller {
            epoll: Epoll::new()?,
            events: Events::with_capacity(Self::DEFAULT_CAPACITY),
            registered: 0,
        })
    }

    fn add<S: Source>(&mut self, id: usize, source: &S, interest: Ready) -> io::Result<()> {
        self.epoll.add(source, Token(id), interest, EpollOpt::level())?;
        self.registered += 1;
        Ok(())
    }

    fn remove<S: Source>(&mut self, source: &S) -> io::Result<()> {
        self.epoll.delete(source)?;
        self.registered = self.registered.saturating_sub(1);
        Ok(())
    }

    fn poll(&mut self, timeout: Option<Duration>) -> io::Result<PollResult<'_>> {
        self.epoll.wait(&mut self.events, timeout)?;
        Ok(PollResult { events: &self.events })
    }

    fn is_empty(&self) -> bool {
        self.registered == 0
    }
}

pub(crate) struct PollResult<'a> {
    events: &'a Events,
}

impl<'a> PollResult<'a> {
    pub(crate) fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.events.iter()
    }
}
