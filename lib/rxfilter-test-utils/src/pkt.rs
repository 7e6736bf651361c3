// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Routines for generating test frames.

use smoltcp::phy::ChecksumCapabilities as CsumCapab;
use smoltcp::wire::EthernetAddress;
use smoltcp::wire::EthernetFrame;
use smoltcp::wire::EthernetProtocol;
use smoltcp::wire::EthernetRepr;
use smoltcp::wire::IpProtocol;
use smoltcp::wire::Ipv4Address;
use smoltcp::wire::Ipv4Packet;
use smoltcp::wire::Ipv4Repr;
use smoltcp::wire::Ipv6Address;
use smoltcp::wire::Ipv6Packet;
use smoltcp::wire::Ipv6Repr;
use smoltcp::wire::TcpPacket;
use smoltcp::wire::UdpPacket;
use std::net::Ipv4Addr;
use std::net::Ipv6Addr;

pub const GUEST_MAC: [u8; 6] = [0xA8, 0x40, 0x25, 0xF7, 0x00, 0x01];
pub const GW_MAC: [u8; 6] = [0xA8, 0x40, 0x25, 0xFF, 0x77, 0x77];

pub const CLIENT_IP4: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 99);
pub const CLIENT_IP6: Ipv6Addr =
    Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 0x99);
pub const CLIENT_PORT: u16 = 44490;

/// The smallest frame we generate: the first beat always carries a
/// complete set of headers.
pub const MIN_FRAME_SZ: usize = 64;

const ETHER_HDR_SZ: usize = 14;
const VLAN_TAG_SZ: usize = 4;
const UDP_HDR_SZ: usize = 8;
const TCP_HDR_SZ: usize = 20;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum L3 {
    Ipv4 { src: Ipv4Addr, dst: Ipv4Addr },
    Ipv6 { src: Ipv6Addr, dst: Ipv6Addr },
    /// Some non-IP EtherType; no L3/L4 headers are emitted.
    Other(u16),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum L4 {
    Udp,
    Tcp,
}

impl L4 {
    fn proto(self) -> IpProtocol {
        match self {
            Self::Udp => IpProtocol::Udp,
            Self::Tcp => IpProtocol::Tcp,
        }
    }

    fn hdr_len(self) -> usize {
        match self {
            Self::Udp => UDP_HDR_SZ,
            Self::Tcp => TCP_HDR_SZ,
        }
    }
}

/// A description of a frame to build.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FrameSpec {
    pub src_mac: [u8; 6],
    pub dst_mac: [u8; 6],
    /// An 802.1Q tag control field. When set the frame is tagged
    /// with EtherType 0x8100.
    pub vlan: Option<u16>,
    pub l3: L3,
    pub l4: L4,
    pub src_port: u16,
    pub dst_port: u16,
    pub payload_len: usize,
}

impl FrameSpec {
    pub fn new(l3: L3, l4: L4, dst_port: u16) -> Self {
        Self {
            src_mac: GUEST_MAC,
            dst_mac: GW_MAC,
            vlan: None,
            l3,
            l4,
            src_port: CLIENT_PORT,
            dst_port,
            payload_len: 0,
        }
    }

    pub fn payload_len(mut self, len: usize) -> Self {
        self.payload_len = len;
        self
    }

    pub fn vlan(mut self, tci: u16) -> Self {
        self.vlan = Some(tci);
        self
    }

    /// The length of the frame [`build_frame()`] produces.
    pub fn frame_len(&self) -> usize {
        let vlan = if self.vlan.is_some() { VLAN_TAG_SZ } else { 0 };
        let l3 = match self.l3 {
            L3::Ipv4 { .. } => 20,
            L3::Ipv6 { .. } => 40,
            L3::Other(_) => 0,
        };
        let l4 = if l3 == 0 { 0 } else { self.l4.hdr_len() };
        (ETHER_HDR_SZ + vlan + l3 + l4 + self.payload_len).max(MIN_FRAME_SZ)
    }
}

/// Build a frame. Payload bytes carry a counting pattern so that any
/// corruption in transit is detectable.
pub fn build_frame(spec: &FrameSpec) -> Vec<u8> {
    let len = spec.frame_len();
    let mut buf: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();

    let (l3_type, l3_len) = match spec.l3 {
        L3::Ipv4 { .. } => (EthernetProtocol::Ipv4, 20),
        L3::Ipv6 { .. } => (EthernetProtocol::Ipv6, 40),
        L3::Other(etype) => (EthernetProtocol::from(etype), 0),
    };

    let outer_type = match spec.vlan {
        Some(_) => EthernetProtocol::from(0x8100),
        None => l3_type,
    };

    let eth = EthernetRepr {
        src_addr: EthernetAddress(spec.src_mac),
        dst_addr: EthernetAddress(spec.dst_mac),
        ethertype: outer_type,
    };
    eth.emit(&mut EthernetFrame::new_unchecked(&mut buf[..]));

    let mut l3_off = ETHER_HDR_SZ;
    if let Some(tci) = spec.vlan {
        buf[l3_off..l3_off + 2].copy_from_slice(&tci.to_be_bytes());
        buf[l3_off + 2..l3_off + 4]
            .copy_from_slice(&u16::from(l3_type).to_be_bytes());
        l3_off += VLAN_TAG_SZ;
    }

    let l4_len = spec.l4.hdr_len() + spec.payload_len;
    match spec.l3 {
        L3::Ipv4 { src, dst } => {
            let ip = Ipv4Repr {
                src_addr: Ipv4Address::from_bytes(&src.octets()),
                dst_addr: Ipv4Address::from_bytes(&dst.octets()),
                next_header: spec.l4.proto(),
                payload_len: l4_len,
                hop_limit: 64,
            };
            let mut pkt = Ipv4Packet::new_unchecked(&mut buf[l3_off..]);
            ip.emit(&mut pkt, &CsumCapab::default());
        }

        L3::Ipv6 { src, dst } => {
            let ip = Ipv6Repr {
                src_addr: Ipv6Address::from_bytes(&src.octets()),
                dst_addr: Ipv6Address::from_bytes(&dst.octets()),
                next_header: spec.l4.proto(),
                payload_len: l4_len,
                hop_limit: 64,
            };
            let mut pkt = Ipv6Packet::new_unchecked(&mut buf[l3_off..]);
            ip.emit(&mut pkt);
        }

        L3::Other(_) => return buf,
    }

    let l4_off = l3_off + l3_len;
    match spec.l4 {
        L4::Udp => {
            let mut udp = UdpPacket::new_unchecked(&mut buf[l4_off..]);
            udp.set_src_port(spec.src_port);
            udp.set_dst_port(spec.dst_port);
            udp.set_len(l4_len as u16);
            udp.set_checksum(0);
        }

        L4::Tcp => {
            buf[l4_off..l4_off + TCP_HDR_SZ].fill(0);
            let mut tcp = TcpPacket::new_unchecked(&mut buf[l4_off..]);
            tcp.set_src_port(spec.src_port);
            tcp.set_dst_port(spec.dst_port);
            tcp.set_header_len(TCP_HDR_SZ as u8);
        }
    }

    buf
}

pub fn udp4(dst: Ipv4Addr, dst_port: u16, payload_len: usize) -> Vec<u8> {
    let l3 = L3::Ipv4 { src: CLIENT_IP4, dst };
    build_frame(&FrameSpec::new(l3, L4::Udp, dst_port).payload_len(payload_len))
}

pub fn tcp4(dst: Ipv4Addr, dst_port: u16, payload_len: usize) -> Vec<u8> {
    let l3 = L3::Ipv4 { src: CLIENT_IP4, dst };
    build_frame(&FrameSpec::new(l3, L4::Tcp, dst_port).payload_len(payload_len))
}

pub fn udp6(dst: Ipv6Addr, dst_port: u16, payload_len: usize) -> Vec<u8> {
    let l3 = L3::Ipv6 { src: CLIENT_IP6, dst };
    build_frame(&FrameSpec::new(l3, L4::Udp, dst_port).payload_len(payload_len))
}

pub fn tcp6(dst: Ipv6Addr, dst_port: u16, payload_len: usize) -> Vec<u8> {
    let l3 = L3::Ipv6 { src: CLIENT_IP6, dst };
    build_frame(&FrameSpec::new(l3, L4::Tcp, dst_port).payload_len(payload_len))
}

/// A frame of the given EtherType and length with no IP headers.
pub fn raw_ether(ethertype: u16, len: usize) -> Vec<u8> {
    let spec = FrameSpec::new(L3::Other(ethertype), L4::Udp, 0)
        .payload_len(len.saturating_sub(ETHER_HDR_SZ));
    let mut frame = build_frame(&spec);
    frame.truncate(len);
    frame
}

/// An 802.1Q-tagged IPv4/UDP frame.
pub fn vlan_udp4(tci: u16, dst: Ipv4Addr, dst_port: u16) -> Vec<u8> {
    let l3 = L3::Ipv4 { src: CLIENT_IP4, dst };
    build_frame(&FrameSpec::new(l3, L4::Udp, dst_port).vlan(tci))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ipv4_fields_at_fixed_offsets() {
        let frame = udp4(Ipv4Addr::new(192, 168, 1, 1), 80, 10);
        assert_eq!(frame.len(), MIN_FRAME_SZ);
        assert_eq!(&frame[12..14], &[0x08, 0x00]);
        assert_eq!(frame[23], 17);
        assert_eq!(&frame[30..34], &[192, 168, 1, 1]);
        assert_eq!(&frame[36..38], &80u16.to_be_bytes());
    }

    #[test]
    fn ipv6_fields_at_fixed_offsets() {
        let dst: Ipv6Addr = "2001:db8::1".parse().unwrap();
        let frame = tcp6(dst, 443, 100);
        assert_eq!(frame.len(), 14 + 40 + 20 + 100);
        assert_eq!(&frame[12..14], &[0x86, 0xDD]);
        assert_eq!(frame[20], 6);
        assert_eq!(&frame[38..54], &dst.octets());
        assert_eq!(&frame[56..58], &443u16.to_be_bytes());
    }

    #[test]
    fn vlan_tag_shifts_headers() {
        let frame = vlan_udp4(100, Ipv4Addr::new(192, 168, 1, 1), 80);
        assert_eq!(&frame[12..14], &[0x81, 0x00]);
        assert_eq!(&frame[16..18], &[0x08, 0x00]);
        assert_eq!(&frame[34..38], &[192, 168, 1, 1]);
    }

    #[test]
    fn raw_ether_length() {
        let frame = raw_ether(0x0806, 60);
        assert_eq!(frame.len(), 60);
        assert_eq!(&frame[12..14], &[0x08, 0x06]);
    }
}
