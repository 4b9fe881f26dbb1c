use crate::epoll::{Ready, Token};
use crate::sys;

#[derive(Copy, Clone, Debug)]
pub struct Event {
    readiness: Ready,
    token: Token,
}

impl Event {
    pub(crate) fn new(readiness: Ready, token: Token) -> Event {
        Event { readiness, token }
    }

    #[inline]
    pub fn readiness(&self) -> Ready {
        self.readiness
    }

    #[inline]
    pub fn token(&self) -> Token {
        self.token
    }
}

/// Buffer of events filled in by a single call to [`crate::epoll::Epoll::wait`].
pub struct Events {
    pub(crate) inner: sys::epoll::Events,
}

impl Events {
    pub fn with_capacity(capacity: usize) -> Events {
        Events {
            inner: sys::epoll::Events::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[inline]
    pub fn get(&self, idx: usize) -> Option<Event> {
        self.inner.get(idx)
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter { events: self, pos: 0 }
    }
}

pub struct Iter<'a> {
    events: &'a Events,
    pos: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        let ev = self.events.get(self.pos);
        if ev.is_some() {
            self.pos += 1;
        }
        ev
    }
}

impl<'a> IntoIterator for &'a Events {
    type Item = Event;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

pub struct IntoIter {
    events: Events,
    pos: usize,
}

impl Iterator for IntoIter {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        let ev = self.events.get(self.pos);
        if ev.is_some() {
            self.pos += 1;
        }
        ev
    }
}

impl IntoIterator for Events {
    type Item = Event;
    type IntoIter = IntoIter;

    fn into_iter(self) -> IntoIter {
        IntoIter { events: self, pos: 0 }
    }
}
