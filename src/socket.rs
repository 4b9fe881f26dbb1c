//! Non-blocking TCP stream socket (§4.B).

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::os::unix::io::{AsRawFd, RawFd};

use crate::addr::SocketAddress4;
use crate::epoll::{Epoll, EpollOpt, Ready, Source, Token};
use crate::error::ConnectFailure;

/// Outcome of a non-blocking `connect` attempt.
#[derive(Debug)]
pub enum ConnectOutcome {
    Connected,
    InProgress,
    Failed(ConnectFailure),
}

/// Outcome of a non-blocking `send`.
#[derive(Debug)]
pub enum SendOutcome {
    /// `n` bytes were accepted by the kernel send buffer.
    Good(usize),
    /// The send buffer is full; retry once writable.
    Again,
    Failure(io::Error),
}

/// Outcome of a non-blocking `recv`.
#[derive(Debug)]
pub enum RecvOutcome {
    /// `n` bytes were read into the caller's buffer.
    Data(usize),
    /// The peer closed the connection gracefully.
    Eof,
    /// Nothing available right now; not an error.
    WouldBlock,
    Failure(io::Error),
}

/// A non-blocking TCP stream, wrapping [`std::net::TcpStream`].
///
/// Owns its `fd` for as long as the socket is alive; dropping it shuts down
/// and closes the handle exactly once via `TcpStream`'s own `Drop`.
#[derive(Debug)]
pub struct Socket {
    stream: TcpStream,
    peer: Option<SocketAddress4>,
}

impl Socket {
    /// Begin a non-blocking connect to `saddr`. The `ConnectingPoller` later
    /// completes it (§4.A): this always returns `InProgress` unless the
    /// kernel rejects the attempt synchronously.
    pub fn connect(saddr: SocketAddress4) -> io::Result<(Socket, ConnectOutcome)> {
        let target: SocketAddr = saddr.into();
        let (stream, immediate) = Self::connect_nonblocking(target)?;
        stream.set_nodelay(true).ok();
        let outcome = if immediate {
            ConnectOutcome::Connected
        } else {
            ConnectOutcome::InProgress
        };
        Ok((Socket { stream, peer: Some(saddr) }, outcome))
    }

    fn connect_nonblocking(target: SocketAddr) -> io::Result<(TcpStream, bool)> {
        let domain = if target.is_ipv4() {
            libc::AF_INET
        } else {
            libc::AF_INET6
        };
        let fd = unsafe { libc::socket(domain, libc::SOCK_STREAM, 0) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        let stream = unsafe { <TcpStream as std::os::unix::io::FromRawFd>::from_raw_fd(fd) };
        stream.set_nonblocking(true)?;

        let (raw_addr, len) = sockaddr_from(target);
        let ret = unsafe { libc::connect(fd, &raw_addr as *const _ as *const libc::sockaddr, len) };
        if ret == 0 {
            return Ok((stream, true));
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EINPROGRESS) => Ok((stream, false)),
            _ => Err(err),
        }
    }

    /// Poll the completion state of an in-progress connect using `SO_ERROR`.
    pub fn connect_outcome(&self) -> ConnectOutcome {
        match self.stream.take_error() {
            Ok(None) => ConnectOutcome::Connected,
            Ok(Some(e)) => ConnectOutcome::Failed(classify_connect_error(&e)),
            Err(e) => ConnectOutcome::Failed(classify_connect_error(&e)),
        }
    }

    pub fn from_accepted(stream: TcpStream, peer: SocketAddress4) -> io::Result<Socket> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true).ok();
        Ok(Socket { stream, peer: Some(peer) })
    }

    pub fn peer_addr(&self) -> Option<SocketAddress4> {
        self.peer
    }

    pub fn send(&mut self, bytes: &[u8]) -> SendOutcome {
        match self.stream.write(bytes) {
            Ok(n) => SendOutcome::Good(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => SendOutcome::Again,
            Err(e) => SendOutcome::Failure(e),
        }
    }

    pub fn recv(&mut self, buf: &mut [u8]) -> RecvOutcome {
        match self.stream.read(buf) {
            Ok(0) => RecvOutcome::Eof,
            Ok(n) => RecvOutcome::Data(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => RecvOutcome::WouldBlock,
            Err(e) => RecvOutcome::Failure(e),
        }
    }
}

fn classify_connect_error(e: &io::Error) -> ConnectFailure {
    match e.raw_os_error() {
        Some(libc::ECONNREFUSED) => ConnectFailure::Refused,
        Some(libc::ECONNRESET) => ConnectFailure::Reset,
        Some(libc::ETIMEDOUT) => ConnectFailure::Timeout,
        Some(libc::ENETUNREACH) | Some(libc::EHOSTUNREACH) => ConnectFailure::Unreachable,
        _ => ConnectFailure::Other,
    }
}

pub(crate) fn sockaddr_from(addr: SocketAddr) -> (libc::sockaddr_in, libc::socklen_t) {
    match addr {
        SocketAddr::V4(v4) => {
            let mut sa: libc::sockaddr_in = unsafe { std::mem::zeroed() };
            sa.sin_family = libc::AF_INET as libc::sa_family_t;
            sa.sin_port = v4.port().to_be();
            sa.sin_addr.s_addr = u32::from_ne_bytes(v4.ip().octets());
            (sa, std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t)
        }
        SocketAddr::V6(_) => unreachable!("mesh core is IPv4-only (§3 SocketAddress4)"),
    }
}

impl AsRawFd for Socket {
    fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}

impl Source for Socket {
    fn add(&self, epoll: &Epoll, token: Token, interest: Ready, opts: EpollOpt) -> io::Result<()> {
        self.as_raw_fd().add(epoll, token, interest, opts)
    }

    fn modify(&self, epoll: &Epoll, token: Token, interest: Ready, opts: EpollOpt) -> io::Result<()> {
        self.as_raw_fd().modify(epoll, token, interest, opts)
    }

    fn delete(&self, epoll: &Epoll) -> io::Result<()> {
        self.as_raw_fd().delete(epoll)
    }
}
