// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! Packet number spaces, packet number compression and decompression.
//!
//! Grounded on RFC 9000 §12.3 and §17.1 (Appendix A: Sample Packet Number
//! Decoding Algorithm).

use crate::varint::VarInt;
use core::fmt;

/// The independent sequence spaces that QUIC maintains per RFC 9000 §12.3.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PacketNumberSpace {
    #[default]
    Initial,
    Handshake,
    ApplicationData,
}

impl PacketNumberSpace {
    pub const ALL: [Self; 3] = [Self::Initial, Self::Handshake, Self::ApplicationData];

    pub fn is_initial(self) -> bool {
        matches!(self, Self::Initial)
    }

    pub fn is_handshake(self) -> bool {
        matches!(self, Self::Handshake)
    }

    pub fn is_application_data(self) -> bool {
        matches!(self, Self::ApplicationData)
    }

    pub const fn new_packet_number(self, value: VarInt) -> PacketNumber {
        PacketNumber {
            space: self,
            value,
        }
    }
}

impl fmt::Display for PacketNumberSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial => write!(f, "Initial"),
            Self::Handshake => write!(f, "Handshake"),
            Self::ApplicationData => write!(f, "ApplicationData"),
        }
    }
}

/// A fully-decoded 62-bit packet number tagged with the space it lives in,
/// so packet numbers from different spaces are never accidentally compared.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct PacketNumber {
    space: PacketNumberSpace,
    value: VarInt,
}

impl fmt::Debug for PacketNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("PacketNumber")
            .field(&self.space)
            .field(&self.as_u64())
            .finish()
    }
}

impl fmt::Display for PacketNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.as_u64().fmt(f)
    }
}

impl PartialOrd for PacketNumber {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PacketNumber {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        debug_assert_eq!(
            self.space, other.space,
            "packet numbers cannot be compared across packet number spaces"
        );
        self.value.cmp(&other.value)
    }
}

impl PacketNumber {
    pub fn space(self) -> PacketNumberSpace {
        self.space
    }

    pub fn as_varint(self) -> VarInt {
        self.value
    }

    pub fn as_u64(self) -> u64 {
        self.value.as_u64()
    }

    pub fn next(self) -> Option<Self> {
        Some(Self {
            space: self.space,
            value: self.value.checked_add(VarInt::from_u8(1))?,
        })
    }

    pub fn prev(self) -> Option<Self> {
        Some(Self {
            space: self.space,
            value: self.value.checked_sub(VarInt::from_u8(1))?,
        })
    }

    /// The number of bytes necessary to encode the packet number's
    /// compressed form, relative to the largest acknowledged packet number
    /// in the space, per RFC 9000 §17.1.
    pub fn truncate(self, largest_acked: Option<Self>) -> PacketNumberLen {
        let num_unacked = match largest_acked {
            Some(largest_acked) => {
                debug_assert_eq!(self.space, largest_acked.space);
                self.as_u64().saturating_sub(largest_acked.as_u64()) + 1
            }
            None => self.as_u64() + 1,
        };

        // bits needed = ceil(log2(num_unacked)) + 1, clamped to {1,2,3,4} bytes
        let bits = 64 - num_unacked.leading_zeros();
        let len = match bits {
            0..=7 => 1,
            8..=15 => 2,
            16..=23 => 3,
            _ => 4,
        };
        PacketNumberLen(len)
    }

    pub fn checked_distance(self, rhs: Self) -> Option<u64> {
        debug_assert_eq!(self.space, rhs.space);
        self.as_u64().checked_sub(rhs.as_u64())
    }

    /// Reconstructs a full 62-bit packet number from `truncated` bytes observed
    /// on the wire and the `expected` next packet number, per RFC 9000 Appendix A.
    ///
    /// The candidate whose absolute distance from `expected` is smallest wins;
    /// ties (the candidate is exactly half the window away in both directions)
    /// resolve to the larger candidate.
    pub fn decode(expected: Self, len: PacketNumberLen, truncated: u64) -> Self {
        let space = expected.space;
        let expected = expected.as_u64();
        let win = len.window();
        let half_win = win / 2;
        let mask = win - 1;

        let candidate = (expected & !mask) | truncated;

        let candidate = if candidate + half_win <= expected && candidate + win <= VarInt::MAX.as_u64()
        {
            // strictly closer above: only jump up when doing so is still nearer
            // than the low-side candidate (ties resolve to the upper candidate)
            candidate + win
        } else if candidate > expected + half_win && candidate >= win {
            candidate - win
        } else {
            candidate
        };

        Self {
            space,
            value: VarInt::new(candidate.min(VarInt::MAX.as_u64())).unwrap(),
        }
    }
}

/// Length, in bytes, of a packet number's on-the-wire compressed form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketNumberLen(u8);

impl PacketNumberLen {
    pub const MIN: Self = Self(1);
    pub const MAX: Self = Self(4);

    pub fn bytes(self) -> usize {
        self.0 as usize
    }

    /// 2-bit tag written into the first byte of a long/short header.
    pub fn tag(self) -> u8 {
        self.0 - 1
    }

    pub fn from_tag(tag: u8) -> Self {
        Self((tag & 0b11) + 1)
    }

    fn window(self) -> u64 {
        1u64 << (8 * self.0)
    }

    /// The low `self.bytes()` bytes of `pn`, as written on the wire.
    pub fn truncate_value(self, pn: VarInt) -> u64 {
        pn.as_u64() & (self.window() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pn(space: PacketNumberSpace, value: u64) -> PacketNumber {
        space.new_packet_number(VarInt::new(value).unwrap())
    }

    #[test]
    fn round_trip_test() {
        let spaces = PacketNumberSpace::ALL;
        let values: &[u64] = &[0, 1, 2, 127, 128, u16::MAX as u64 / 2, u16::MAX as u64, 1 << 20, 1 << 30];

        for space in spaces {
            for &value in values {
                let p = pn(space, value);
                assert_eq!(p.as_u64(), value);
                assert_eq!(p.space(), space);
            }
        }
    }

    // RFC 9000 Appendix A worked example: expected=0xa82f30ea, truncated (2
    // bytes) =0x9b32, decodes to 0xa82f9b32
    #[test]
    fn rfc_appendix_a_example() {
        let expected = pn(PacketNumberSpace::ApplicationData, 0xa82f30ea);
        let decoded = PacketNumber::decode(expected, PacketNumberLen(2), 0x9b32);
        assert_eq!(decoded.as_u64(), 0xa82f9b32);
    }

    #[test]
    fn decode_near_expected_picks_closest_candidate() {
        let expected = pn(PacketNumberSpace::ApplicationData, 1000);
        // 1-byte truncated value congruent to 1000 mod 256 is 1000 % 256 = 232
        let len = PacketNumberLen::MIN;
        let truncated = len.truncate_value(VarInt::new(1000).unwrap());
        let decoded = PacketNumber::decode(expected, len, truncated);
        assert_eq!(decoded.as_u64(), 1000);
    }

    #[test]
    fn decode_recovers_across_wraparound() {
        // expected sits just above a window boundary; truncated value refers
        // to a packet number just below the boundary
        let len = PacketNumberLen(1); // window = 256
        let expected = pn(PacketNumberSpace::ApplicationData, 260);
        let truncated = 255; // closest real pn congruent to 255 mod 256 near 260 is 255
        let decoded = PacketNumber::decode(expected, len, truncated);
        assert_eq!(decoded.as_u64(), 255);
    }

    #[test]
    fn truncate_chooses_minimal_length() {
        let largest_acked = pn(PacketNumberSpace::ApplicationData, 0);
        let next = pn(PacketNumberSpace::ApplicationData, 1);
        assert_eq!(next.truncate(Some(largest_acked)).bytes(), 1);

        let largest_acked = pn(PacketNumberSpace::ApplicationData, 1000);
        let next = pn(PacketNumberSpace::ApplicationData, 1256);
        assert_eq!(next.truncate(Some(largest_acked)).bytes(), 2);
    }
}
