// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! ACK, RFC 9000 §19.3. Carries the largest acknowledged packet number and a
//! sequence of alternating gap/range lengths working backward from it,
//! optionally followed by ECN counts (tag 0x03).

use crate::varint::VarInt;
use netq_codec::{DecoderBufferMut, DecoderBufferMutResult, Encoder, EncoderValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcnCounts {
    pub ect0: VarInt,
    pub ect1: VarInt,
    pub ce: VarInt,
}

/// One `(gap, ack_range_len)` pair, RFC 9000 §19.3.1. `gap` is the number of
/// unacknowledged packets between this range and the previous (higher) one;
/// `ack_range_len` is one less than the number of contiguous packets
/// acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckRange {
    pub gap: VarInt,
    pub ack_range_len: VarInt,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Ack<'a> {
    pub largest_acknowledged: VarInt,
    pub ack_delay: VarInt,
    pub first_ack_range: VarInt,
    /// the remaining `(gap, len)` pairs, still varint-encoded; iterate with
    /// [`Ack::iter_ranges`] rather than decoding them all eagerly.
    pub ack_ranges: &'a [u8],
    pub ecn_counts: Option<EcnCounts>,
}

impl<'a> Ack<'a> {
    pub fn decode(buffer: DecoderBufferMut<'a>) -> DecoderBufferMutResult<'a, Self> {
        let (tag, buffer) = buffer.decode::<u8>()?;
        let (largest_acknowledged, buffer) = buffer.decode::<VarInt>()?;
        let (ack_delay, buffer) = buffer.decode::<VarInt>()?;
        let (range_count, buffer) = buffer.decode::<VarInt>()?;
        let (first_ack_range, buffer) = buffer.decode::<VarInt>()?;

        // the range list has no outer length prefix; walk it once to find
        // where it ends before splitting it off as an opaque slice.
        let mut cursor = buffer.peek();
        let mut remaining_ranges: u64 = range_count.as_u64();
        while remaining_ranges > 0 {
            let (_gap, next) = cursor.decode::<VarInt>()?;
            let (_len, next) = next.decode::<VarInt>()?;
            cursor = next;
            remaining_ranges -= 1;
        }
        let consumed = buffer.len() - cursor.len();
        let (ranges, buffer) = buffer.decode_slice(consumed)?;

        let (ecn_counts, buffer) = if tag == 0x03 {
            let (ect0, buffer) = buffer.decode::<VarInt>()?;
            let (ect1, buffer) = buffer.decode::<VarInt>()?;
            let (ce, buffer) = buffer.decode::<VarInt>()?;
            (Some(EcnCounts { ect0, ect1, ce }), buffer)
        } else {
            (None, buffer)
        };

        Ok((
            Self {
                largest_acknowledged,
                ack_delay,
                first_ack_range,
                ack_ranges: ranges.into_less_safe_slice(),
                ecn_counts,
            },
            buffer,
        ))
    }

    /// Decodes and yields each `(gap, ack_range_len)` pair in wire order
    /// (descending packet number).
    pub fn iter_ranges(&self) -> impl Iterator<Item = AckRange> + 'a {
        let mut buffer = netq_codec::DecoderBuffer::new(self.ack_ranges);
        core::iter::from_fn(move || {
            if buffer.is_empty() {
                return None;
            }
            let (gap, next) = buffer.decode::<VarInt>().ok()?;
            let (ack_range_len, next) = next.decode::<VarInt>().ok()?;
            buffer = next;
            Some(AckRange { gap, ack_range_len })
        })
    }
}

/// Builds the wire bytes for an ACK frame from a set of descending
/// `(gap, ack_range_len)` pairs; used by the sender, which holds ranges in a
/// structured form and only needs the wire encoding at transmit time.
pub fn encode_ack<E: Encoder>(
    buffer: &mut E,
    largest_acknowledged: VarInt,
    ack_delay: VarInt,
    first_ack_range: VarInt,
    ranges: &[AckRange],
    ecn_counts: Option<EcnCounts>,
) {
    buffer.encode(&(if ecn_counts.is_some() { 0x03u8 } else { 0x02u8 }));
    buffer.encode(&largest_acknowledged);
    buffer.encode(&ack_delay);
    buffer.encode(&VarInt::new(ranges.len() as u64).expect("ack range count within varint range"));
    buffer.encode(&first_ack_range);
    for range in ranges {
        buffer.encode(&range.gap);
        buffer.encode(&range.ack_range_len);
    }
    if let Some(ecn) = ecn_counts {
        buffer.encode(&ecn.ect0);
        buffer.encode(&ecn.ect1);
        buffer.encode(&ecn.ce);
    }
}

impl<'a> EncoderValue for Ack<'a> {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&(if self.ecn_counts.is_some() { 0x03u8 } else { 0x02u8 }));
        buffer.encode(&self.largest_acknowledged);
        buffer.encode(&self.ack_delay);
        let range_count = self.iter_ranges().count();
        buffer.encode(&VarInt::new(range_count as u64).expect("ack range count within varint range"));
        buffer.encode(&self.first_ack_range);
        buffer.write_slice(self.ack_ranges);
        if let Some(ecn) = self.ecn_counts {
            buffer.encode(&ecn.ect0);
            buffer.encode(&ecn.ect1);
            buffer.encode(&ecn.ce);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netq_codec::{DecoderBufferMut, EncoderBuffer};

    #[test]
    fn round_trips_without_ecn() {
        let ranges = [
            AckRange {
                gap: VarInt::from_u32(0),
                ack_range_len: VarInt::from_u32(2),
            },
            AckRange {
                gap: VarInt::from_u32(1),
                ack_range_len: VarInt::from_u32(0),
            },
        ];
        let mut buf = [0u8; 64];
        let mut encoder = EncoderBuffer::new(&mut buf);
        encode_ack(
            &mut encoder,
            VarInt::from_u32(100),
            VarInt::from_u32(5),
            VarInt::from_u32(3),
            &ranges,
            None,
        );
        let len = encoder.len();

        let (ack, remaining) = Ack::decode(DecoderBufferMut::new(&mut buf[..len])).unwrap();
        assert_eq!(ack.largest_acknowledged.as_u64(), 100);
        assert_eq!(ack.first_ack_range.as_u64(), 3);
        assert!(ack.ecn_counts.is_none());
        let decoded_ranges: alloc::vec::Vec<_> = ack.iter_ranges().collect();
        assert_eq!(decoded_ranges, ranges);
        assert!(remaining.is_empty());
    }

    #[test]
    fn round_trips_with_ecn() {
        let ecn = EcnCounts {
            ect0: VarInt::from_u32(1),
            ect1: VarInt::from_u32(0),
            ce: VarInt::from_u32(2),
        };
        let mut buf = [0u8; 64];
        let mut encoder = EncoderBuffer::new(&mut buf);
        encode_ack(
            &mut encoder,
            VarInt::from_u32(10),
            VarInt::from_u32(0),
            VarInt::from_u32(0),
            &[],
            Some(ecn),
        );
        let len = encoder.len();
        let (ack, _) = Ack::decode(DecoderBufferMut::new(&mut buf[..len])).unwrap();
        assert_eq!(ack.ecn_counts, Some(ecn));
    }
}
