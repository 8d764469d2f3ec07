use std::{fmt, num::NonZeroU8};

use serde::Deserialize;

use crate::errors::{Result, TransportError};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

pub const DEFAULT_PACKET_SIZE: u8 = 64;

// -----------------------------------------------------------------------------
// ----- PacketSize ------------------------------------------------------------

/// Size in bytes of every packet on a connection, length byte included.
///
/// Both ends must be built with the same value; it is never negotiated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "u16")]
pub struct PacketSize(NonZeroU8);

impl PacketSize {
    pub const DEFAULT: PacketSize = match NonZeroU8::new(DEFAULT_PACKET_SIZE) {
        Some(v) => PacketSize(v),
        None => unreachable!(),
    };

    pub fn new(size: u8) -> Result<Self> {
        NonZeroU8::new(size)
            .map(PacketSize)
            .ok_or(TransportError::InvalidPacketSize(size.into()))
    }
}

// -----------------------------------------------------------------------------
// ----- PacketSize: Public ----------------------------------------------------

impl PacketSize {
    #[inline]
    pub fn get(self) -> usize {
        self.0.get() as usize
    }

    /// Largest payload one packet can carry.
    #[inline]
    pub fn max_payload(self) -> usize {
        self.get() - 1
    }

    /// A size of 1 leaves no room for payload at all.
    #[inline]
    pub fn is_degenerate(self) -> bool {
        self.max_payload() == 0
    }
}

// -----------------------------------------------------------------------------
// ----- PacketSize: Traits ----------------------------------------------------

impl Default for PacketSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u16> for PacketSize {
    type Error = TransportError;

    fn try_from(value: u16) -> Result<Self> {
        let size = u8::try_from(value).map_err(|_| TransportError::InvalidPacketSize(value))?;
        Self::new(size)
    }
}

impl TryFrom<u8> for PacketSize {
    type Error = TransportError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<PacketSize> for u8 {
    fn from(size: PacketSize) -> u8 {
        size.0.get()
    }
}

impl fmt::Display for PacketSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
