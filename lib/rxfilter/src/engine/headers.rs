// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Header fields of a packet's first beat.
//!
//! The first beat of every packet is assumed to carry the complete
//! Ethernet + IP + transport port header. There are no IP options, no
//! extension headers, and no VLAN tags: each field lives at a fixed
//! offset determined solely by the EtherType. Nothing here validates
//! anything; bytes past the end of a short frame read as whatever the
//! beat carries there (zero, for beats built by
//! [`super::packet::beats_from_frame`]).

use super::ether::ETHER_DST_OFF;
use super::ether::ETHER_HDR_SZ;
use super::ether::ETHER_SRC_OFF;
use super::ether::ETHER_TYPE_OFF;
use super::ether::EtherAddr;
use super::ether::EtherType;
use super::stream::BEAT_BYTES;
use core::fmt;
use core::net::Ipv4Addr;
use core::net::Ipv6Addr;

// IPv4, relative to the start of the frame.
pub const IPV4_HDR_SZ: usize = 20;
pub const IPV4_PROTO_OFF: usize = ETHER_HDR_SZ + 9;
pub const IPV4_DST_OFF: usize = ETHER_HDR_SZ + 16;
pub const IPV4_L4_OFF: usize = ETHER_HDR_SZ + IPV4_HDR_SZ;

// IPv6, relative to the start of the frame.
pub const IPV6_HDR_SZ: usize = 40;
pub const IPV6_NEXT_HDR_OFF: usize = ETHER_HDR_SZ + 6;
pub const IPV6_DST_OFF: usize = ETHER_HDR_SZ + 24;
pub const IPV6_L4_OFF: usize = ETHER_HDR_SZ + IPV6_HDR_SZ;

// Both TCP and UDP carry the destination port at the same place.
pub const L4_DST_PORT_OFF: usize = 2;

/// The network protocol of a packet, as decided by its EtherType.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum L3Proto {
    Ipv4,
    Ipv6,
}

/// The header fields the filter cares about, decoded from a beat.
///
/// Fields belonging to the protocol that is not present are still
/// decoded at their fixed offsets; they simply carry whatever bytes
/// happen to be there. Use [`Self::l3`] to know which are meaningful.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct HeaderView {
    pub dst_mac: EtherAddr,
    pub src_mac: EtherAddr,
    pub ether_type: EtherType,
    pub ipv4_proto: u8,
    pub dst_ipv4: u32,
    pub ipv6_next_hdr: u8,
    pub dst_ipv6: u128,
    pub dst_port: u16,
}

fn be_u16(data: &[u8; BEAT_BYTES], off: usize) -> u16 {
    u16::from_be_bytes([data[off], data[off + 1]])
}

fn be_u32(data: &[u8; BEAT_BYTES], off: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[off..off + 4]);
    u32::from_be_bytes(bytes)
}

fn be_u128(data: &[u8; BEAT_BYTES], off: usize) -> u128 {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&data[off..off + 16]);
    u128::from_be_bytes(bytes)
}

fn mac(data: &[u8; BEAT_BYTES], off: usize) -> EtherAddr {
    let mut bytes = [0u8; 6];
    bytes.copy_from_slice(&data[off..off + 6]);
    EtherAddr::from(bytes)
}

impl HeaderView {
    /// Decode the fixed-offset fields of a beat.
    pub fn decode(data: &[u8; BEAT_BYTES]) -> Self {
        let ether_type = EtherType::from(be_u16(data, ETHER_TYPE_OFF));
        let l4_off = match ether_type {
            EtherType::Ipv6 => IPV6_L4_OFF,
            _ => IPV4_L4_OFF,
        };

        Self {
            dst_mac: mac(data, ETHER_DST_OFF),
            src_mac: mac(data, ETHER_SRC_OFF),
            ether_type,
            ipv4_proto: data[IPV4_PROTO_OFF],
            dst_ipv4: be_u32(data, IPV4_DST_OFF),
            ipv6_next_hdr: data[IPV6_NEXT_HDR_OFF],
            dst_ipv6: be_u128(data, IPV6_DST_OFF),
            dst_port: be_u16(data, l4_off + L4_DST_PORT_OFF),
        }
    }

    /// The network protocol, or `None` for anything that is neither
    /// IPv4 nor IPv6 (including all VLAN-tagged frames).
    pub fn l3(&self) -> Option<L3Proto> {
        match self.ether_type {
            EtherType::Ipv4 => Some(L3Proto::Ipv4),
            EtherType::Ipv6 => Some(L3Proto::Ipv6),
            _ => None,
        }
    }

    /// The transport protocol number of whichever IP header is present.
    pub fn l4_proto(&self) -> Option<u8> {
        match self.l3()? {
            L3Proto::Ipv4 => Some(self.ipv4_proto),
            L3Proto::Ipv6 => Some(self.ipv6_next_hdr),
        }
    }
}

impl fmt::Debug for HeaderView {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.l3() {
            Some(L3Proto::Ipv4) => write!(
                f,
                "IPv4 -> {}:{} proto {}",
                Ipv4Addr::from(self.dst_ipv4),
                self.dst_port,
                self.ipv4_proto,
            ),
            Some(L3Proto::Ipv6) => write!(
                f,
                "IPv6 -> [{}]:{} next {}",
                Ipv6Addr::from(self.dst_ipv6),
                self.dst_port,
                self.ipv6_next_hdr,
            ),
            None => write!(f, "{} {} -> {}", self.ether_type, self.src_mac, self.dst_mac),
        }
    }
}
