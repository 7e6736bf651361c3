// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The valid/ready beat stream.
//!
//! A beat moves across a stream boundary on a tick only when the
//! producer presents it (valid) and the consumer accepts it (ready)
//! on that same tick. Between stages the engine uses [`PipeReg`], a
//! one-deep register whose upstream readiness is "empty, or the held
//! beat is leaving this tick". Chaining two of these gives a standard
//! skid chain: nothing is ever dropped for lack of space, and one beat
//! per tick flows while the far end stays ready.

use crate::low_mask_u64;
use core::fmt;
use serde::Deserialize;
use serde::Serialize;

/// Width of the data bus in bytes (512 bits).
pub const BEAT_BYTES: usize = 64;

/// Width of the opaque side channel in bits.
pub const USER_BITS: u32 = 48;
pub const USER_MASK: u64 = low_mask_u64(USER_BITS);

/// A keep mask with every byte of the beat valid.
pub const KEEP_ALL: u64 = u64::MAX;

/// One transfer unit of the stream.
#[derive(Clone, Copy, Deserialize, Eq, PartialEq, Serialize)]
pub struct Beat {
    #[serde(with = "beat_data")]
    data: [u8; BEAT_BYTES],
    keep: u64,
    last: bool,
    user: u64,
}

impl Beat {
    /// Build a beat. The side channel is truncated to its
    /// [`USER_BITS`] bus width.
    pub fn new(data: [u8; BEAT_BYTES], keep: u64, last: bool, user: u64) -> Self {
        Self { data, keep, last, user: user & USER_MASK }
    }

    pub fn data(&self) -> &[u8; BEAT_BYTES] {
        &self.data
    }

    /// The byte-valid mask, bit `i` covering `data[i]`.
    pub fn keep(&self) -> u64 {
        self.keep
    }

    /// True if this beat ends its packet.
    pub fn is_last(&self) -> bool {
        self.last
    }

    pub fn user(&self) -> u64 {
        self.user
    }

    /// The number of valid bytes, assuming a contiguous keep mask
    /// starting at byte 0.
    pub fn valid_len(&self) -> usize {
        self.keep.trailing_ones() as usize
    }

    /// Iterate over the bytes flagged valid by the keep mask.
    pub fn valid_bytes(&self) -> impl Iterator<Item = u8> + '_ {
        self.data
            .iter()
            .enumerate()
            .filter(|(i, _)| self.keep & (1u64 << i) != 0)
            .map(|(_, b)| *b)
    }
}

impl Default for Beat {
    fn default() -> Self {
        Self { data: [0u8; BEAT_BYTES], keep: 0, last: false, user: 0 }
    }
}

impl fmt::Debug for Beat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Beat {{ keep: {:#018x}, last: {}, user: {:#014x}, data: {:02x?} }}",
            self.keep,
            self.last,
            self.user,
            &self.data[..self.valid_len().min(16)],
        )
    }
}

// serde only derives arrays up to 32 elements.
mod beat_data {
    use super::BEAT_BYTES;
    use alloc::vec::Vec;
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;
    use serde::de::Error;

    pub fn serialize<S: Serializer>(
        data: &[u8; BEAT_BYTES],
        s: S,
    ) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(data)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<[u8; BEAT_BYTES], D::Error> {
        let bytes = Vec::<u8>::deserialize(d)?;
        let len = bytes.len();
        bytes.try_into().map_err(|_| {
            D::Error::custom(format!("expected {BEAT_BYTES} bytes, got {len}"))
        })
    }
}

/// A transfer happens iff valid and ready are both asserted.
#[inline]
pub fn fire(valid: bool, ready: bool) -> bool {
    valid && ready
}

/// A single-slot pipeline register.
#[derive(Clone, Debug)]
pub struct PipeReg<T> {
    slot: Option<T>,
}

impl<T> Default for PipeReg<T> {
    fn default() -> Self {
        Self { slot: None }
    }
}

impl<T> PipeReg<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The register's valid output.
    pub fn is_valid(&self) -> bool {
        self.slot.is_some()
    }

    pub fn peek(&self) -> Option<&T> {
        self.slot.as_ref()
    }

    /// The register's ready output toward its producer, given the
    /// consumer's ready input on this same tick.
    pub fn ready(&self, downstream_ready: bool) -> bool {
        self.slot.is_none() || downstream_ready
    }

    /// Advance one clock edge.
    ///
    /// The held value leaves if the consumer is ready and is returned.
    /// `load` is then captured; the caller may only load when
    /// [`Self::ready`] was true for this same `downstream_ready`.
    pub fn clock(&mut self, downstream_ready: bool, load: Option<T>) -> Option<T> {
        let out = if fire(self.is_valid(), downstream_ready) {
            self.slot.take()
        } else {
            None
        };

        if let Some(val) = load {
            debug_assert!(self.slot.is_none(), "load into occupied register");
            self.slot = Some(val);
        }

        out
    }

    /// Drop whatever is held. Used only by reset.
    pub fn clear(&mut self) {
        self.slot = None;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn user_is_truncated_to_bus_width() {
        let beat = Beat::new([0; BEAT_BYTES], KEEP_ALL, true, u64::MAX);
        assert_eq!(beat.user(), 0x0000_FFFF_FFFF_FFFF);
    }

    #[test]
    fn valid_len_follows_keep() {
        let beat = Beat::new([0; BEAT_BYTES], 0x0F, true, 0);
        assert_eq!(beat.valid_len(), 4);
        assert_eq!(beat.valid_bytes().count(), 4);

        let full = Beat::new([0; BEAT_BYTES], KEEP_ALL, false, 0);
        assert_eq!(full.valid_len(), BEAT_BYTES);
    }

    #[test]
    fn empty_reg_is_ready_even_when_downstream_is_not() {
        let reg: PipeReg<u8> = PipeReg::new();
        assert!(reg.ready(false));
        assert!(reg.ready(true));
    }

    #[test]
    fn full_reg_holds_until_downstream_ready() {
        let mut reg = PipeReg::new();
        assert_eq!(reg.clock(false, Some(1u8)), None);
        assert!(!reg.ready(false));

        // Stalled: nothing leaves, nothing may be loaded.
        assert_eq!(reg.clock(false, None), None);
        assert_eq!(reg.peek(), Some(&1));

        // Pass-through in the same tick.
        assert!(reg.ready(true));
        assert_eq!(reg.clock(true, Some(2)), Some(1));
        assert_eq!(reg.peek(), Some(&2));

        assert_eq!(reg.clock(true, None), Some(2));
        assert!(!reg.is_valid());
    }

    #[test]
    fn clear_empties_register() {
        let mut reg = PipeReg::new();
        reg.clock(false, Some(7u8));
        reg.clear();
        assert!(!reg.is_valid());
    }
}
