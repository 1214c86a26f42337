// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! Packet loss detection, RFC 9002 §6: a sent packet is lost once it is
//! either far enough in the past (time threshold) or enough later packets
//! have been acknowledged (packet threshold).

use crate::{packet::number::PacketNumber, time::Timestamp};

//= https://www.rfc-editor.org/rfc/rfc9002#section-6.1.1
//# The RECOMMENDED initial value for the packet reordering threshold
//# (kPacketThreshold) is 3.
const K_PACKET_THRESHOLD: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// not yet lost; it will be if still unacknowledged by `lost_time`.
    NotLost { lost_time: Timestamp },
    Lost,
}

//= https://www.rfc-editor.org/rfc/rfc9002#section-6.1
//# A packet is declared lost if it meets all of the following
//# conditions:
//#
//#     *  The packet is unacknowledged, in flight, and was sent prior to
//#        an acknowledged packet.
//#
//#     *  The packet was sent kPacketThreshold packets before an
//#        acknowledged packet, or it was sent long enough in the past.
pub fn check(
    time_threshold: core::time::Duration,
    time_sent: Timestamp,
    packet_number: PacketNumber,
    largest_acked_packet_number: PacketNumber,
    now: Timestamp,
) -> Outcome {
    let lost_time = time_sent.checked_add(time_threshold).unwrap_or(now);
    let time_threshold_exceeded = now >= lost_time;

    let packet_number_threshold_exceeded = largest_acked_packet_number
        .checked_distance(packet_number)
        .map(|distance| distance >= K_PACKET_THRESHOLD)
        .unwrap_or(false);

    if time_threshold_exceeded || packet_number_threshold_exceeded {
        Outcome::Lost
    } else {
        Outcome::NotLost { lost_time }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{packet::number::PacketNumberSpace, varint::VarInt};
    use core::time::Duration;

    fn pn(n: u32) -> PacketNumber {
        PacketNumberSpace::ApplicationData.new_packet_number(VarInt::from_u32(n))
    }

    fn ts(secs: u64) -> Timestamp {
        Timestamp::from_duration(Duration::from_secs(secs))
    }

    #[test]
    fn not_lost_before_time_or_packet_threshold() {
        let outcome = check(Duration::from_secs(10), ts(0), pn(5), pn(6), ts(1));
        assert!(matches!(outcome, Outcome::NotLost { .. }));
    }

    #[test]
    fn lost_once_time_threshold_elapses() {
        let outcome = check(Duration::from_secs(1), ts(0), pn(5), pn(6), ts(2));
        assert_eq!(outcome, Outcome::Lost);
    }

    #[test]
    fn lost_once_packet_threshold_exceeded() {
        let outcome = check(Duration::from_secs(100), ts(0), pn(1), pn(4), ts(1));
        assert_eq!(outcome, Outcome::Lost);
    }
}
