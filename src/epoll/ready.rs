use std::ops::{BitOr, BitOrAssign, BitAnd};

const READABLE: usize = 0b0001;
const WRITABLE: usize = 0b0010;
const ERROR: usize = 0b0100;
const HUP: usize = 0b1000;

/// A bitset of the readiness states an `Epoll` registration can be interested in
/// or an event can report.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct Ready(usize);

impl Ready {
    #[inline]
    pub fn empty() -> Ready {
        Ready(0)
    }

    #[inline]
    pub fn readable() -> Ready {
        Ready(READABLE)
    }

    #[inline]
    pub fn writable() -> Ready {
        Ready(WRITABLE)
    }

    #[inline]
    pub fn error() -> Ready {
        Ready(ERROR)
    }

    #[inline]
    pub fn hup() -> Ready {
        Ready(HUP)
    }

    #[inline]
    pub fn all() -> Ready {
        Ready(READABLE | WRITABLE | ERROR | HUP)
    }

    #[inline]
    pub fn is_readable(&self) -> bool {
        self.0 & READABLE != 0
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        self.0 & WRITABLE != 0
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.0 & ERROR != 0
    }

    #[inline]
    pub fn is_hup(&self) -> bool {
        self.0 & HUP != 0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn contains(&self, other: Ready) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Ready {
    type Output = Ready;

    #[inline]
    fn bitor(self, other: Ready) -> Ready {
        Ready(self.0 | other.0)
    }
}

impl BitOrAssign for Ready {
    #[inline]
    fn bitor_assign(&mut self, other: Ready) {
        self.0 |= other.0;
    }
}

impl BitAnd for Ready {
    type Output = Ready;

    #[inline]
    fn bitand(self, other: Ready) -> Ready {
        Ready(self.0 & other.0)
    }
}
