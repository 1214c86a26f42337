// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-packet-number-space ACK bookkeeping: duplicate detection, the set of
//! packet numbers owed an ACK frame, the delayed-ack/immediate-ack triggers,
//! and ECN accounting.
//!
//! Grounded on `msquic`'s `src/core/ack_tracker.c`, which this crate's
//! retrieval pack carries as the original source this layer distills from.

use core::time::Duration;
use netq_core::{
    frame::ack::{AckRange as WireAckRange, EcnCounts as WireEcnCounts},
    range_set::RangeSet,
    time::Timestamp,
    varint::VarInt,
};

/// The default received-packet-tolerance the immediate-ack trigger compares
/// `ack_eliciting_packets_queued` against. Mirrors msquic's default of 1,
/// meaning "ack every ack-eliciting packet immediately" out of the box;
/// callers raise it via `Settings` to enable real coalescing.
pub const DEFAULT_PACKET_TOLERANCE: u16 = 1;

/// Default reordering threshold (RFC 9000's recommended starting value of
/// "disabled"); 0 disables the trigger entirely per spec.
pub const DEFAULT_REORDERING_THRESHOLD: u8 = 0;

/// Bounds the number of disjoint sub-ranges the tracker keeps for duplicate
/// detection and to-ack bookkeeping, so a pathological reordering pattern
/// can't grow either set unboundedly. Mirrors `QUIC_MAX_RANGE_*` in
/// `range.c`.
const MAX_RECEIVED_RANGES: usize = 32;
const MAX_TO_ACK_RANGES: usize = 32;

/// ECN marking observed on a received packet, RFC 9000 §13.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcnMarking {
    NotEct,
    Ect0,
    Ect1,
    Ce,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct EcnCounts {
    ect0: u64,
    ect1: u64,
    ce: u64,
}

/// What the caller should do in response to `on_ack_eliciting_packet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckDecision {
    /// Send an ACK frame now.
    SendImmediately,
    /// Make sure the delayed-ack timer is running; no frame needed yet.
    StartDelayedTimer,
    /// Nothing to do — an ACK is already queued or pending.
    NoAction,
}

/// Tracks received packet numbers and builds ACK frames for one packet
/// number space.
#[derive(Debug)]
pub struct AckTracker {
    received: RangeSet<u64>,
    to_ack: RangeSet<u64>,
    ack_eliciting_packets_queued: u16,
    largest_acknowledged_sent: Option<u64>,
    largest_received_time: Option<Timestamp>,
    ack_frame_already_written: bool,
    ecn_counts: EcnCounts,
    non_zero_ecn: bool,
}

impl Default for AckTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl AckTracker {
    pub fn new() -> Self {
        Self {
            received: RangeSet::with_max_ranges(MAX_RECEIVED_RANGES),
            to_ack: RangeSet::with_max_ranges(MAX_TO_ACK_RANGES),
            ack_eliciting_packets_queued: 0,
            largest_acknowledged_sent: None,
            largest_received_time: None,
            ack_frame_already_written: false,
            ecn_counts: EcnCounts::default(),
            non_zero_ecn: false,
        }
    }

    /// Records `pn` as received, for duplicate suppression. Returns `true`
    /// if `pn` had already been recorded (the packet must be dropped by the
    /// caller without further processing).
    pub fn add_packet_number(&mut self, pn: u64) -> bool {
        let was_seen = self.received.contains(pn);
        self.received.insert(pn);
        was_seen
    }

    /// Processes a non-duplicate received packet: updates the to-ack set and
    /// ECN counters, and decides whether an ACK must be sent immediately,
    /// whether the delayed-ack timer should start, or whether nothing
    /// further is needed (e.g. a non-ack-eliciting packet).
    #[allow(clippy::too_many_arguments)]
    pub fn on_packet_received(
        &mut self,
        pn: u64,
        recv_time: Timestamp,
        ecn: EcnMarking,
        ack_eliciting: bool,
        carries_immediate_ack: bool,
        max_ack_delay: Duration,
        packet_tolerance: u16,
        reordering_threshold: u8,
        ack_already_queued: bool,
    ) -> AckDecision {
        self.to_ack.insert(pn);

        let new_largest = self.to_ack.max_value() == Some(pn);
        if new_largest {
            self.largest_received_time = Some(recv_time);
        }

        match ecn {
            EcnMarking::Ect0 => {
                self.non_zero_ecn = true;
                self.ecn_counts.ect0 += 1;
            }
            EcnMarking::Ect1 => {
                self.non_zero_ecn = true;
                self.ecn_counts.ect1 += 1;
            }
            EcnMarking::Ce => {
                self.non_zero_ecn = true;
                self.ecn_counts.ce += 1;
            }
            EcnMarking::NotEct => {}
        }

        self.ack_frame_already_written = false;

        if !ack_eliciting {
            return AckDecision::NoAction;
        }

        self.ack_eliciting_packets_queued += 1;

        if ack_already_queued {
            return AckDecision::NoAction;
        }

        let hit_reordering_threshold =
            new_largest && self.did_hit_reordering_threshold(reordering_threshold);

        if carries_immediate_ack
            || max_ack_delay.is_zero()
            || self.ack_eliciting_packets_queued >= packet_tolerance
            || hit_reordering_threshold
        {
            AckDecision::SendImmediately
        } else if self.ack_eliciting_packets_queued == 1 {
            AckDecision::StartDelayedTimer
        } else {
            AckDecision::NoAction
        }
    }

    /// RFC 9000's reordering-threshold ACK trigger, mirrored exactly from
    /// `QuicAckTrackerDidHitReorderingThreshold`: walks the to-ack ranges
    /// from highest to lowest looking for a gap whose distance from the
    /// largest unacknowledged packet number meets or exceeds `threshold`.
    fn did_hit_reordering_threshold(&self, threshold: u8) -> bool {
        if threshold == 0 || self.to_ack.len() < 2 {
            return false;
        }
        let threshold = threshold as u64;

        let largest_unacked = self.to_ack.max_value().expect("len >= 2");
        let smallest_tracked = self.to_ack.min_value().expect("len >= 2");

        let largest_reported = match self.largest_acknowledged_sent {
            Some(largest_acked) if largest_acked >= smallest_tracked + threshold => {
                largest_acked - threshold + 1
            }
            _ => smallest_tracked,
        };

        let ranges: alloc::vec::Vec<_> = self.to_ack.iter().cloned().collect();
        for idx in (1..ranges.len()).rev() {
            let range_start = *ranges[idx].start();
            if largest_reported >= range_start {
                return false;
            }

            let mut previous_smallest_missing = *ranges[idx - 1].end() + 1;
            if largest_reported > previous_smallest_missing {
                previous_smallest_missing = largest_reported;
            }

            if largest_unacked - previous_smallest_missing >= threshold {
                return true;
            }
        }

        false
    }

    /// Builds the `(largest_acknowledged, ack_delay, first_ack_range,
    /// ranges, ecn_counts)` fields for an outgoing ACK frame covering every
    /// currently tracked packet number, descending from the largest.
    /// Returns `None` if there is nothing to acknowledge.
    pub fn build_ack_frame(
        &mut self,
        now: Timestamp,
        ack_delay_exponent: u8,
    ) -> Option<AckFrameFields> {
        let largest = self.to_ack.max_value()?;
        let received_time = self.largest_received_time.unwrap_or(now);
        let raw_delay_micros = now
            .saturating_duration_since(received_time)
            .as_micros()
            .min(u64::MAX as u128) as u64;
        let ack_delay = VarInt::new((raw_delay_micros >> ack_delay_exponent).min(VarInt::MAX.as_u64()))
            .unwrap_or(VarInt::from_u8(0));

        let ranges: alloc::vec::Vec<_> = self.to_ack.iter().cloned().collect();
        let mut descending = ranges.iter().rev();
        let first = descending.next().expect("checked non-empty above");
        let first_ack_range = VarInt::new(*first.end() - *first.start())
            .expect("range span fits in a varint");

        let mut wire_ranges = alloc::vec::Vec::new();
        let mut prev_low = *first.start();
        for range in descending {
            let gap = VarInt::new(prev_low - *range.end() - 2).unwrap_or(VarInt::from_u8(0));
            let ack_range_len =
                VarInt::new(*range.end() - *range.start()).expect("range span fits in a varint");
            wire_ranges.push(WireAckRange {
                gap,
                ack_range_len,
            });
            prev_low = *range.start();
        }

        let ecn_counts = self.non_zero_ecn.then(|| WireEcnCounts {
            ect0: VarInt::new(self.ecn_counts.ect0).unwrap_or(VarInt::from_u8(0)),
            ect1: VarInt::new(self.ecn_counts.ect1).unwrap_or(VarInt::from_u8(0)),
            ce: VarInt::new(self.ecn_counts.ce).unwrap_or(VarInt::from_u8(0)),
        });

        self.largest_acknowledged_sent = Some(largest);
        self.ack_frame_already_written = true;

        Some(AckFrameFields {
            largest_acknowledged: VarInt::new(largest).expect("packet number fits in a varint"),
            ack_delay,
            first_ack_range,
            ranges: wire_ranges,
            ecn_counts,
        })
    }

    pub fn has_pending_ack_eliciting(&self) -> bool {
        self.ack_eliciting_packets_queued > 0
    }

    pub fn ack_frame_already_written(&self) -> bool {
        self.ack_frame_already_written
    }

    /// The peer has acknowledged one of our ACK frames whose largest
    /// acknowledged packet number was `largest_in_acked_frame`. Everything
    /// at or below it is assumed either lost or already covered by a more
    /// recent ACK, so it is pruned from the to-ack set.
    pub fn on_ack_of_ack_frame(&mut self, largest_in_acked_frame: u64) {
        self.to_ack.remove_below(largest_in_acked_frame + 1);
        if self.to_ack.is_empty() && self.ack_eliciting_packets_queued != 0 {
            self.ack_eliciting_packets_queued = 0;
        }
    }
}

/// The pieces needed to encode an outgoing ACK frame, decoupled from the
/// wire-format lifetime-borrowed `Ack<'a>` type so the builder can hold this
/// across a send-scheduler pass before encoding.
#[derive(Debug, Clone)]
pub struct AckFrameFields {
    pub largest_acknowledged: VarInt,
    pub ack_delay: VarInt,
    pub first_ack_range: VarInt,
    pub ranges: alloc::vec::Vec<WireAckRange>,
    pub ecn_counts: Option<WireEcnCounts>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration as StdDuration;

    fn ts(micros: u64) -> Timestamp {
        Timestamp::from_duration(StdDuration::from_micros(micros.max(1)))
    }

    #[test]
    fn duplicate_packet_numbers_are_detected() {
        let mut tracker = AckTracker::new();
        assert!(!tracker.add_packet_number(5));
        assert!(tracker.add_packet_number(5));
    }

    #[test]
    fn first_ack_eliciting_packet_starts_the_delayed_timer() {
        let mut tracker = AckTracker::new();
        let decision = tracker.on_packet_received(
            1,
            ts(1000),
            EcnMarking::NotEct,
            true,
            false,
            Duration::from_millis(25),
            10,
            DEFAULT_REORDERING_THRESHOLD,
            false,
        );
        assert_eq!(decision, AckDecision::StartDelayedTimer);
    }

    #[test]
    fn packet_tolerance_triggers_an_immediate_ack() {
        let mut tracker = AckTracker::new();
        tracker.on_packet_received(
            1,
            ts(1000),
            EcnMarking::NotEct,
            true,
            false,
            Duration::from_millis(25),
            2,
            DEFAULT_REORDERING_THRESHOLD,
            false,
        );
        let decision = tracker.on_packet_received(
            2,
            ts(1100),
            EcnMarking::NotEct,
            true,
            false,
            Duration::from_millis(25),
            2,
            DEFAULT_REORDERING_THRESHOLD,
            false,
        );
        assert_eq!(decision, AckDecision::SendImmediately);
    }

    #[test]
    fn zero_max_ack_delay_always_acks_immediately() {
        let mut tracker = AckTracker::new();
        let decision = tracker.on_packet_received(
            1,
            ts(1000),
            EcnMarking::NotEct,
            true,
            false,
            Duration::ZERO,
            10,
            DEFAULT_REORDERING_THRESHOLD,
            false,
        );
        assert_eq!(decision, AckDecision::SendImmediately);
    }

    #[test]
    fn immediate_ack_signal_forces_a_send() {
        let mut tracker = AckTracker::new();
        let decision = tracker.on_packet_received(
            1,
            ts(1000),
            EcnMarking::NotEct,
            true,
            true,
            Duration::from_millis(25),
            10,
            DEFAULT_REORDERING_THRESHOLD,
            false,
        );
        assert_eq!(decision, AckDecision::SendImmediately);
    }

    #[test]
    fn reordering_threshold_fires_on_a_wide_enough_gap() {
        let mut tracker = AckTracker::new();
        // establish a smallest tracked range
        tracker.on_packet_received(
            0,
            ts(1000),
            EcnMarking::NotEct,
            true,
            false,
            Duration::from_millis(25),
            100,
            3,
            false,
        );
        // PN 1..=3 missing entirely: receiving PN 4 after PN 0 leaves a gap
        // of size 3 (PNs 1,2,3), which meets a threshold of 3.
        let decision = tracker.on_packet_received(
            4,
            ts(1100),
            EcnMarking::NotEct,
            true,
            false,
            Duration::from_millis(25),
            100,
            3,
            false,
        );
        assert_eq!(decision, AckDecision::SendImmediately);
    }

    #[test]
    fn reordering_threshold_zero_disables_the_trigger() {
        let mut tracker = AckTracker::new();
        tracker.on_packet_received(
            0,
            ts(1000),
            EcnMarking::NotEct,
            true,
            false,
            Duration::from_millis(25),
            100,
            0,
            false,
        );
        let decision = tracker.on_packet_received(
            10,
            ts(1100),
            EcnMarking::NotEct,
            true,
            false,
            Duration::from_millis(25),
            100,
            0,
            false,
        );
        assert_ne!(decision, AckDecision::SendImmediately);
    }

    #[test]
    fn build_ack_frame_covers_descending_ranges_and_clears_on_ack_of_ack() {
        let mut tracker = AckTracker::new();
        for pn in [0u64, 1, 5, 6, 7] {
            tracker.on_packet_received(
                pn,
                ts(1000 + pn),
                EcnMarking::NotEct,
                true,
                false,
                Duration::from_millis(25),
                100,
                DEFAULT_REORDERING_THRESHOLD,
                false,
            );
        }

        let fields = tracker.build_ack_frame(ts(2000), 3).expect("non-empty to-ack set");
        assert_eq!(fields.largest_acknowledged.as_u64(), 7);
        assert_eq!(fields.first_ack_range.as_u64(), 2); // covers 5..=7
        assert_eq!(fields.ranges.len(), 1);
        assert_eq!(fields.ranges[0].ack_range_len.as_u64(), 1); // covers 0..=1

        tracker.on_ack_of_ack_frame(7);
        assert!(tracker.to_ack.is_empty());
        assert_eq!(tracker.ack_eliciting_packets_queued, 0);
    }

    #[test]
    fn ecn_counts_are_only_included_once_a_marked_packet_arrives() {
        let mut tracker = AckTracker::new();
        tracker.on_packet_received(
            1,
            ts(1000),
            EcnMarking::Ect0,
            true,
            false,
            Duration::from_millis(25),
            100,
            DEFAULT_REORDERING_THRESHOLD,
            false,
        );
        let fields = tracker.build_ack_frame(ts(2000), 3).unwrap();
        let ecn = fields.ecn_counts.expect("ect0 packet seen");
        assert_eq!(ecn.ect0.as_u64(), 1);
    }
}
