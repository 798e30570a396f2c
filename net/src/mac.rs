// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Mac address type and logic.

use arrayvec::ArrayVec;
use std::fmt::Display;
use std::str::FromStr;

/// A [MAC Address] type.
///
/// `Mac` is a transparent wrapper around `[u8; 6]`. It orders like the 48-bit integer it
/// encodes, which is the order in which learned hosts are kept in a MAC address table.
///
/// [MAC Address]: https://en.wikipedia.org/wiki/MAC_address
#[repr(transparent)]
#[cfg_attr(any(test, feature = "bolero"), derive(bolero::TypeGenerator))]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Mac(pub [u8; 6]);

impl From<[u8; 6]> for Mac {
    fn from(value: [u8; 6]) -> Self {
        Mac(value)
    }
}

impl From<Mac> for [u8; 6] {
    fn from(value: Mac) -> Self {
        value.0
    }
}

impl AsRef<[u8; 6]> for Mac {
    fn as_ref(&self) -> &[u8; 6] {
        &self.0
    }
}

/// Errors which can occur while converting a string to a [`Mac`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MacFromStringError {
    /// Invalid string representation of mac address
    #[error("invalid string representation of mac address: {0}")]
    Invalid(String),
}

impl TryFrom<&str> for Mac {
    type Error = MacFromStringError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        const MAX_OCTETS: usize = 6;
        let invalid = || MacFromStringError::Invalid(value.to_string());
        let octets = value
            .split(':')
            .try_fold(ArrayVec::<u8, MAX_OCTETS>::new(), |mut acc, octet| {
                if octet.len() != 2 || !octet.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(invalid());
                }
                let parsed = u8::from_str_radix(octet, 16).map_err(|_| invalid())?;
                acc.try_push(parsed).map_err(|_| invalid())?;
                Ok(acc)
            })?;
        let octets = octets.into_inner().map_err(|_| invalid())?;
        Ok(Mac(octets))
    }
}

impl FromStr for Mac {
    type Err = MacFromStringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mac::try_from(s)
    }
}

impl TryFrom<String> for Mac {
    type Error = MacFromStringError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Mac::try_from(value.as_str())
    }
}

impl From<Mac> for String {
    fn from(value: Mac) -> Self {
        value.to_string()
    }
}

/// Reasons why a [`Mac`] can't identify a host in a MAC address table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HostMacError {
    /// Zero is never a host address
    #[error("zero mac address is not a host address")]
    Zero,
    /// Group addresses are never learned as hosts
    #[error("multicast mac address {0} is not a host address")]
    Multicast(Mac),
}

impl Mac {
    /// The broadcast `Mac`
    pub const BROADCAST: Mac = Mac([u8::MAX; 6]);
    /// The zero `Mac`.
    ///
    /// In a MAC mapping allow list, `ZERO` stands for "any host".
    pub const ZERO: Mac = Mac([0; 6]);

    /// Returns true iff the binary representation of the [`Mac`] is exclusively ones.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self == &Mac::BROADCAST
    }

    /// Returns true iff the least significant bit of the first octet of the `[Mac]` is one.
    #[must_use]
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 == 0x01
    }

    /// Returns true iff the least significant bit of the first octet of the `[Mac]` is zero.
    #[must_use]
    pub fn is_unicast(&self) -> bool {
        !self.is_multicast()
    }

    /// Returns true iff the binary representation of the [`Mac`] is exclusively zeros.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self == &Mac::ZERO
    }

    /// Check that the [`Mac`] may be learned as (or mapped to) a host.
    ///
    /// # Errors
    ///
    /// Zero and multicast addresses are rejected.
    pub fn valid_host(&self) -> Result<(), HostMacError> {
        if self.is_zero() {
            Err(HostMacError::Zero)
        } else if self.is_multicast() {
            Err(HostMacError::Multicast(*self))
        } else {
            Ok(())
        }
    }

    /// The 48-bit integer value of the address.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
            .iter()
            .fold(0u64, |acc, octet| (acc << 8) | u64::from(*octet))
    }
}

impl Display for Mac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}
