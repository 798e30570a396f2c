// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! ARP request frames used to probe learned hosts.

use crate::mac::Mac;
use crate::vlan::VlanId;
use bytes::{BufMut, Bytes, BytesMut};
use etherparse::{EtherType, Ethernet2Header, SingleVlanHeader, VlanPcp};
use std::net::Ipv4Addr;

/// Minimum size of an ethernet frame, excluding the FCS.
pub const MIN_FRAME_LEN: usize = 60;

const ARP_HTYPE_ETHERNET: u16 = 1;
const ARP_OPER_REQUEST: u16 = 1;
const ARP_LEN: usize = 28;

/// Errors produced when building an ARP probe
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ArpProbeError {
    /// The probe would be sent from a group address
    #[error("invalid probe source {0}")]
    InvalidSource(Mac),
    /// The probed host address is not unicast
    #[error("invalid probe target {0}")]
    InvalidTarget(Mac),
    /// The VLAN id does not fit an 802.1Q tag
    #[error("VLAN {0} can't be tagged")]
    InvalidVlan(VlanId),
}

/// A unicast ARP request asking `target_ip` to answer `source`.
///
/// The sender protocol address is left unspecified (`0.0.0.0`), so probed hosts
/// don't update their ARP caches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArpProbe {
    /// Sender hardware address
    pub source: Mac,
    /// Probed host hardware address
    pub target: Mac,
    /// Probed host protocol address
    pub target_ip: Ipv4Addr,
    /// VLAN the host lives on
    pub vlan: VlanId,
}

impl ArpProbe {
    /// Build the ethernet frame for this probe, 802.1Q-tagged unless the VLAN is untagged.
    ///
    /// # Errors
    ///
    /// Fails if either hardware address is not a valid unicast address, or if the
    /// VLAN id can't be carried in a tag.
    pub fn to_frame(&self) -> Result<Bytes, ArpProbeError> {
        self.source
            .valid_host()
            .map_err(|_| ArpProbeError::InvalidSource(self.source))?;
        self.target
            .valid_host()
            .map_err(|_| ArpProbeError::InvalidTarget(self.target))?;

        let mut frame = BytesMut::with_capacity(MIN_FRAME_LEN);
        let mut eth = Ethernet2Header {
            source: self.source.0,
            destination: self.target.0,
            ether_type: EtherType::ARP,
        };
        if self.vlan.is_untagged() {
            frame.put_slice(&eth.to_bytes());
        } else {
            let vlan_id = etherparse::VlanId::try_new(self.vlan.as_u16())
                .map_err(|_| ArpProbeError::InvalidVlan(self.vlan))?;
            eth.ether_type = EtherType::VLAN_TAGGED_FRAME;
            frame.put_slice(&eth.to_bytes());
            let tag = SingleVlanHeader {
                pcp: VlanPcp::ZERO,
                drop_eligible_indicator: false,
                vlan_id,
                ether_type: EtherType::ARP,
            };
            frame.put_slice(&tag.to_bytes());
        }

        let body_start = frame.len();
        frame.put_u16(ARP_HTYPE_ETHERNET);
        frame.put_u16(EtherType::IPV4.0);
        frame.put_u8(6);
        frame.put_u8(4);
        frame.put_u16(ARP_OPER_REQUEST);
        frame.put_slice(&self.source.0);
        frame.put_slice(&Ipv4Addr::UNSPECIFIED.octets());
        frame.put_slice(&self.target.0);
        frame.put_slice(&self.target_ip.octets());
        debug_assert_eq!(frame.len() - body_start, ARP_LEN);

        if frame.len() < MIN_FRAME_LEN {
            frame.put_bytes(0, MIN_FRAME_LEN - frame.len());
        }
        Ok(frame.freeze())
    }
}

#[cfg(test)]
mod test {
    use super::{ArpProbe, ArpProbeError, MIN_FRAME_LEN};
    use crate::{Mac, VlanId};
    use pretty_assertions::assert_eq;
    use std::net::Ipv4Addr;

    const CONTROLLER: Mac = Mac([0x00, 0x00, 0x00, 0xff, 0xff, 0xfd]);
    const HOST: Mac = Mac([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);

    fn probe(vlan: u16) -> ArpProbe {
        ArpProbe {
            source: CONTROLLER,
            target: HOST,
            target_ip: Ipv4Addr::new(10, 0, 0, 1),
            vlan: VlanId::new(vlan).unwrap(),
        }
    }

    #[test]
    fn untagged_probe() {
        let frame = probe(0).to_frame().unwrap();
        assert_eq!(frame.len(), MIN_FRAME_LEN);
        assert_eq!(&frame[0..6], &HOST.0);
        assert_eq!(&frame[6..12], &CONTROLLER.0);
        assert_eq!(&frame[12..14], &[0x08, 0x06]);
        // htype, ptype, hlen, plen, oper
        assert_eq!(&frame[14..22], &[0, 1, 0x08, 0x00, 6, 4, 0, 1]);
        assert_eq!(&frame[38..42], &[10, 0, 0, 1]);
    }

    #[test]
    fn tagged_probe() {
        let frame = probe(100).to_frame().unwrap();
        assert_eq!(&frame[12..14], &[0x81, 0x00]);
        assert_eq!(&frame[14..16], &100u16.to_be_bytes());
        assert_eq!(&frame[16..18], &[0x08, 0x06]);
        assert_eq!(&frame[42..46], &[10, 0, 0, 1]);
    }

    #[test]
    fn highest_vlan_is_tagged() {
        let frame = probe(4095).to_frame().unwrap();
        assert_eq!(frame.len(), MIN_FRAME_LEN);
        assert_eq!(&frame[12..14], &[0x81, 0x00]);
        assert_eq!(&frame[14..16], &[0x0f, 0xff]);
    }

    #[test]
    fn probe_needs_unicast_addresses() {
        let mut bad = probe(0);
        bad.target = Mac::BROADCAST;
        assert_eq!(bad.to_frame(), Err(ArpProbeError::InvalidTarget(Mac::BROADCAST)));
        bad.target = HOST;
        bad.source = Mac::ZERO;
        assert_eq!(bad.to_frame(), Err(ArpProbeError::InvalidSource(Mac::ZERO)));
    }
}
