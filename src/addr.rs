use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// `{addr: u32 host-order, port: u16}` (§3). Kept distinct from
/// [`std::net::SocketAddrV4`] so wire encoding (big-endian, host-order
/// address word) is unambiguous regardless of the platform's `std::net`
/// representation.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct SocketAddress4 {
    pub addr: u32,
    pub port: u16,
}

impl SocketAddress4 {
    pub const fn new(addr: u32, port: u16) -> SocketAddress4 {
        SocketAddress4 { addr, port }
    }

    pub fn to_bytes(self) -> [u8; 6] {
        let mut out = [0u8; 6];
        out[..4].copy_from_slice(&self.addr.to_be_bytes());
        out[4..].copy_from_slice(&self.port.to_be_bytes());
        out
    }

    pub fn from_bytes(bytes: [u8; 6]) -> SocketAddress4 {
        let addr = u32::from_be_bytes(bytes[..4].try_into().unwrap());
        let port = u16::from_be_bytes(bytes[4..].try_into().unwrap());
        SocketAddress4 { addr, port }
    }
}

impl From<SocketAddrV4> for SocketAddress4 {
    fn from(a: SocketAddrV4) -> SocketAddress4 {
        SocketAddress4 {
            addr: u32::from_be_bytes(a.ip().octets()),
            port: a.port(),
        }
    }
}

impl From<SocketAddress4> for SocketAddrV4 {
    fn from(a: SocketAddress4) -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::from(a.addr.to_be_bytes()), a.port)
    }
}

impl From<SocketAddress4> for SocketAddr {
    fn from(a: SocketAddress4) -> SocketAddr {
        SocketAddr::V4(a.into())
    }
}

impl TryFrom<SocketAddr> for SocketAddress4 {
    type Error = ();

    fn try_from(a: SocketAddr) -> Result<SocketAddress4, ()> {
        match a {
            SocketAddr::V4(v4) => Ok(v4.into()),
            SocketAddr::V6(_) => Err(()),
        }
    }
}

impl fmt::Debug for SocketAddress4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", SocketAddrV4::from(*self))
    }
}

impl fmt::Display for SocketAddress4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", SocketAddrV4::from(*self))
    }
}
