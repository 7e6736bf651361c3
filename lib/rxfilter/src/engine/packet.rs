// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Conversion between whole frames and stream beats.
//!
//! Byte `i` of a frame travels in byte `i % 64` of beat `i / 64`. The
//! final beat is zero padded and its keep mask covers only the bytes
//! actually present.

use super::stream::BEAT_BYTES;
use super::stream::Beat;
use crate::low_mask_u64;
use alloc::vec::Vec;

/// The number of beats needed to carry `len` bytes.
pub fn beat_count(len: usize) -> usize {
    len.div_ceil(BEAT_BYTES)
}

/// Split a frame into beats, attaching `user` to every beat.
///
/// An empty frame yields no beats: there is no way to express a
/// zero-length packet on the stream.
pub fn beats_from_frame(frame: &[u8], user: u64) -> Vec<Beat> {
    let nbeats = beat_count(frame.len());

    frame
        .chunks(BEAT_BYTES)
        .enumerate()
        .map(|(i, chunk)| {
            let mut data = [0u8; BEAT_BYTES];
            data[..chunk.len()].copy_from_slice(chunk);
            let keep = low_mask_u64(chunk.len() as u32);
            Beat::new(data, keep, i + 1 == nbeats, user)
        })
        .collect()
}

/// Reassemble a frame from its beats, taking only the bytes flagged
/// in each keep mask.
pub fn frame_from_beats<'a>(beats: impl IntoIterator<Item = &'a Beat>) -> Vec<u8> {
    let mut frame = Vec::new();
    for beat in beats {
        frame.extend(beat.valid_bytes());
    }
    frame
}

/// Groups a flat stream of beats into packets by their `last` flag.
#[derive(Debug, Default)]
pub struct Reassembler {
    partial: Vec<Beat>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept the next beat. Returns the packet's beats when `beat`
    /// ends it.
    pub fn push(&mut self, beat: Beat) -> Option<Vec<Beat>> {
        self.partial.push(beat);
        if beat.is_last() {
            Some(core::mem::take(&mut self.partial))
        } else {
            None
        }
    }

    /// True when a packet has been started but not finished.
    pub fn in_packet(&self) -> bool {
        !self.partial.is_empty()
    }
}
