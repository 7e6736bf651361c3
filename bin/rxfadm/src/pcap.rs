// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Reading and writing legacy (little-endian) Ethernet pcap files.

use crate::Error;
use pcap_parser::Linktype;
use pcap_parser::PcapHeader;
use pcap_parser::ToVec;
use pcap_parser::pcap;
use pcap_parser::pcap::LegacyPcapBlock;
use std::io::Write;

const SNAPLEN: u32 = 65535;

const MAGIC_LE_USEC: [u8; 4] = [0xd4, 0xc3, 0xb2, 0xa1];
const MAGIC_LE_NSEC: [u8; 4] = [0x4d, 0x3c, 0xb2, 0xa1];

/// A captured frame and its timestamp.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Frame {
    pub ts_sec: u32,
    pub ts_usec: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(data: Vec<u8>) -> Self {
        Self { ts_sec: 0, ts_usec: 0, data }
    }
}

/// Parse every frame of a capture. Nanosecond timestamps are
/// truncated to microseconds, the resolution [`PcapWriter`] writes.
pub fn read(bytes: &[u8]) -> Result<Vec<Frame>, Error> {
    let nsec = match bytes.get(..4) {
        Some(m) if m == MAGIC_LE_USEC => false,
        Some(m) if m == MAGIC_LE_NSEC => true,
        Some(m) => {
            return Err(Error::Pcap(format!("unsupported magic {m:02x?}")));
        }
        None => return Err(Error::Pcap("file too short".to_string())),
    };

    let (mut rest, hdr) = pcap::parse_pcap_header(bytes)
        .map_err(|e| Error::Pcap(format!("bad header: {e:?}")))?;

    if hdr.network != Linktype::ETHERNET {
        let msg = format!("unsupported link type {}", hdr.network.0);
        return Err(Error::Pcap(msg));
    }

    let mut frames = vec![];
    while !rest.is_empty() {
        let (next, block) = pcap::parse_pcap_frame(rest).map_err(|e| {
            Error::Pcap(format!("bad frame {}: {e:?}", frames.len()))
        })?;

        let ts_usec = if nsec { block.ts_usec / 1000 } else { block.ts_usec };
        frames.push(Frame {
            ts_sec: block.ts_sec,
            ts_usec,
            data: block.data.to_vec(),
        });
        rest = next;
    }

    Ok(frames)
}

pub fn read_file(path: &std::path::Path) -> Result<Vec<Frame>, Error> {
    read(&std::fs::read(path)?)
}

/// Write frames to a capture as they come.
pub struct PcapWriter<W: Write> {
    out: W,
}

impl<W: Write> PcapWriter<W> {
    pub fn new(mut out: W) -> Result<Self, Error> {
        let mut hdr = PcapHeader {
            magic_number: 0xa1b2c3d4,
            version_major: 2,
            version_minor: 4,
            thiszone: 0,
            sigfigs: 0,
            snaplen: SNAPLEN,
            network: Linktype::ETHERNET,
        };

        let bytes = hdr
            .to_vec()
            .map_err(|e| Error::Pcap(format!("serialize header: {e:?}")))?;
        out.write_all(&bytes)?;
        Ok(Self { out })
    }

    pub fn add_frame(&mut self, frame: &Frame) -> Result<(), Error> {
        let len = frame.data.len() as u32;
        let mut block = LegacyPcapBlock {
            ts_sec: frame.ts_sec,
            ts_usec: frame.ts_usec,
            caplen: len,
            origlen: len,
            data: &frame.data,
        };

        let bytes = block
            .to_vec()
            .map_err(|e| Error::Pcap(format!("serialize frame: {e:?}")))?;
        self.out.write_all(&bytes)?;
        Ok(())
    }

    pub fn into_inner(mut self) -> Result<W, Error> {
        self.out.flush()?;
        Ok(self.out)
    }
}
