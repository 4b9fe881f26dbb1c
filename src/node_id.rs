use std::fmt;

/// Opaque 128-bit node identifier (§3).
///
/// Totally ordered, equality-comparable, hashable, and serialisable as 16
/// big-endian bytes. The bit pattern has no structure the core relies on; it
/// is treated as an opaque UUID-like value throughout.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u128);

impl NodeId {
    pub const fn from_u128(value: u128) -> NodeId {
        NodeId(value)
    }

    pub fn to_bytes(self) -> [u8; 16] {
        self.0.to_be_bytes()
    }

    pub fn from_bytes(bytes: [u8; 16]) -> NodeId {
        NodeId(u128::from_be_bytes(bytes))
    }

    pub fn as_u128(self) -> u128 {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({:032x})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl From<u128> for NodeId {
    fn from(value: u128) -> NodeId {
        NodeId(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_bytes() {
        let id = NodeId::from_u128(0x0102_0304_0506_0708_090a_0b0c_0d0e_0f10);
        let bytes = id.to_bytes();
        assert_eq!(NodeId::from_bytes(bytes), id);
    }

    #[test]
    fn orders_numerically() {
        assert!(NodeId::from_u128(1) < NodeId::from_u128(2));
    }
}
