// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! VLAN identifiers as seen by the virtual network.

use std::fmt::Display;
use std::str::FromStr;

/// A VLAN Identifier.
///
/// Unlike an 802.1Q header field, a [`VlanId`] may be zero: zero designates untagged
/// traffic, which the virtual network maps like any other VLAN.
#[repr(transparent)]
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "u16", into = "u16")]
pub struct VlanId(u16);

/// Errors which can occur when converting a `u16` (or a string) to a [`VlanId`]
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidVlanId {
    /// The value does not fit in 12 bits.
    #[error("{0} is too large to be a legal VLAN id ({MAX} is max legal value)", MAX = VlanId::MAX)]
    TooLarge(u16),
    /// The string is not a decimal number.
    #[error("invalid VLAN id: '{0}'")]
    Syntax(String),
}

impl VlanId {
    /// Untagged traffic.
    pub const UNTAGGED: VlanId = VlanId(0);
    /// The largest VLAN id.
    pub const MAX: VlanId = VlanId(4095);

    /// Create a new [`VlanId`].
    ///
    /// # Errors
    ///
    /// Returns an error if `vid` does not fit in 12 bits.
    pub const fn new(vid: u16) -> Result<Self, InvalidVlanId> {
        if vid > Self::MAX.0 {
            Err(InvalidVlanId::TooLarge(vid))
        } else {
            Ok(VlanId(vid))
        }
    }

    /// Get the value of the [`VlanId`] as a `u16`.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns true iff frames on this VLAN carry no 802.1Q tag.
    #[must_use]
    pub const fn is_untagged(self) -> bool {
        self.0 == 0
    }
}

impl From<VlanId> for u16 {
    fn from(vid: VlanId) -> u16 {
        vid.as_u16()
    }
}

impl TryFrom<u16> for VlanId {
    type Error = InvalidVlanId;

    fn try_from(vid: u16) -> Result<VlanId, Self::Error> {
        VlanId::new(vid)
    }
}

impl FromStr for VlanId {
    type Err = InvalidVlanId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s
            .parse::<u16>()
            .map_err(|_| InvalidVlanId::Syntax(s.to_string()))?;
        VlanId::new(raw)
    }
}

impl Display for VlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(any(test, feature = "bolero"))]
mod contract {
    use super::VlanId;
    use bolero::{Driver, TypeGenerator};
    use std::ops::Bound;

    impl TypeGenerator for VlanId {
        fn generate<D: Driver>(u: &mut D) -> Option<Self> {
            let raw = u.gen_u16(Bound::Included(&0), Bound::Included(&VlanId::MAX.as_u16()))?;
            Some(VlanId(raw))
        }
    }
}

#[cfg(test)]
mod test {
    use super::{InvalidVlanId, VlanId};

    #[test]
    fn vlan_bounds() {
        assert_eq!(VlanId::new(0), Ok(VlanId::UNTAGGED));
        assert!(VlanId::new(0).unwrap().is_untagged());
        assert_eq!(VlanId::new(4095), Ok(VlanId::MAX));
        assert_eq!(VlanId::new(4096), Err(InvalidVlanId::TooLarge(4096)));
    }

    #[test]
    fn vlan_from_str() {
        bolero::check!().with_type().for_each(|vid: &VlanId| {
            assert_eq!(vid.to_string().parse::<VlanId>(), Ok(*vid));
        });
        assert!("x".parse::<VlanId>().is_err());
        assert!("-1".parse::<VlanId>().is_err());
    }
}
