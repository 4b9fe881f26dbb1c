//! Non-blocking TCP listener (§4.B).

use std::io;
use std::net::{SocketAddr, TcpListener};
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};

use crate::addr::SocketAddress4;
use crate::epoll::{Epoll, EpollOpt, Ready, Source, Token};
use crate::socket::Socket;

/// Result of one non-blocking `accept`.
#[derive(Debug)]
pub enum AcceptOutcome {
    Accepted(Socket),
    WouldBlock,
    Failure(io::Error),
}

/// A bound, listening TCP acceptor.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    local: SocketAddress4,
}

impl Listener {
    /// Bind and start listening with the given backlog.
    ///
    /// Goes straight to `socket(2)`/`bind(2)`/`listen(2)` so the caller's
    /// `backlog` actually reaches the kernel, instead of the OS-chosen
    /// default `std::net::TcpListener::bind` would pick.
    pub fn bind(local: SocketAddress4, backlog: i32) -> io::Result<Listener> {
        let addr: SocketAddr = local.into();
        let inner = Self::bind_nonblocking(addr, backlog)?;
        let local = SocketAddress4::try_from(inner.local_addr()?)
            .unwrap_or(local);
        Ok(Listener { inner, local })
    }

    fn bind_nonblocking(addr: SocketAddr, backlog: i32) -> io::Result<TcpListener> {
        let domain = if addr.is_ipv4() { libc::AF_INET } else { libc::AF_INET6 };
        let fd = unsafe { libc::socket(domain, libc::SOCK_STREAM, 0) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        let reuseaddr: libc::c_int = 1;
        unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_REUSEADDR,
                &reuseaddr as *const _ as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            );
        }

        let (raw_addr, len) = crate::socket::sockaddr_from(addr);
        let ret = unsafe { libc::bind(fd, &raw_addr as *const _ as *const libc::sockaddr, len) };
        if ret != 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        let ret = unsafe { libc::listen(fd, backlog) };
        if ret != 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        let inner = unsafe { TcpListener::from_raw_fd(fd) };
        inner.set_nonblocking(true)?;
        Ok(inner)
    }

    pub fn local_addr(&self) -> SocketAddress4 {
        self.local
    }

    /// Accept one pending connection, never blocking.
    pub fn accept_nonblocking(&self) -> AcceptOutcome {
        match self.inner.accept() {
            Ok((stream, peer)) => {
                let peer4 = match SocketAddress4::try_from(peer) {
                    Ok(p) => p,
                    Err(()) => {
                        return AcceptOutcome::Failure(io::Error::new(
                            io::ErrorKind::InvalidInput,
                            "accepted connection is not IPv4",
                        ))
                    }
                };
                match Socket::from_accepted(stream, peer4) {
                    Ok(s) => AcceptOutcome::Accepted(s),
                    Err(e) => AcceptOutcome::Failure(e),
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => AcceptOutcome::WouldBlock,
            Err(e) => AcceptOutcome::Failure(e),
        }
    }
}

impl AsRawFd for Listener {
    fn as_raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }
}

impl Source for Listener {
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
