// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-packet-number-space state: the next outgoing packet number, the
//! sent-packet metadata store loss detection rebuilds retransmittable state
//! from, and this space's [`AckTracker`]. Spec.md §3.4/§4.6.

use alloc::{collections::BTreeMap, vec::Vec};
use core::time::Duration;
use netq_core::{
    packet::number::{PacketNumber, PacketNumberSpace},
    recovery::{loss, RttEstimator},
    stream::{StreamId, StreamType},
    time::Timestamp,
};

use crate::ack_tracker::AckTracker;

/// A retransmittable description of a frame that was written into a sent
/// packet, sufficient for loss detection to hand the data back to its
/// owner. Spec.md §3.6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameDescriptor {
    StreamData { id: StreamId, offset: u64, len: u64 },
    ResetStream { id: StreamId },
    StopSending { id: StreamId },
    MaxData,
    MaxStreamData { id: StreamId },
    MaxStreams(StreamKind),
    Crypto { offset: u64, len: u64 },
    /// an ACK frame was lost; the caller should flag a fresh ACK.
    Ack { largest_acknowledged: u64 },
    HandshakeDone,
    NewConnectionId,
    RetireConnectionId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Bidirectional,
    Unidirectional,
}

impl From<StreamType> for StreamKind {
    fn from(t: StreamType) -> Self {
        match t {
            StreamType::Bidirectional => StreamKind::Bidirectional,
            StreamType::Unidirectional => StreamKind::Unidirectional,
        }
    }
}

#[derive(Debug)]
struct SentPacketInfo {
    time_sent: Timestamp,
    sent_bytes: u16,
    ack_eliciting: bool,
    in_flight: bool,
    is_pmtu_probe: bool,
    frames: Vec<FrameDescriptor>,
}

/// What an acknowledgment newly covered: the frame descriptors of newly
/// acknowledged packets (for stream/flow-control bookkeeping) and whether a
/// fresh RTT sample should be fed to the estimator.
#[derive(Debug, Default)]
pub struct AckOutcome {
    pub newly_acked_frames: Vec<FrameDescriptor>,
    pub newly_acked_bytes: u32,
    pub rtt_sample: Option<Duration>,
}

#[derive(Debug, Default)]
pub struct LossOutcome {
    pub lost_frames: Vec<FrameDescriptor>,
    pub lost_bytes: u32,
    pub persistent_congestion: bool,
}

/// Per-space sent-packet store, loss-detection timer state, and ack
/// tracking. One instance exists per [`PacketNumberSpace`] that is still
/// active for the connection.
#[derive(Debug)]
pub struct PacketSpace {
    space: PacketNumberSpace,
    next_pn: u64,
    largest_acked: Option<u64>,
    sent_packets: BTreeMap<u64, SentPacketInfo>,
    pub ack_tracker: AckTracker,
    loss_time: Option<Timestamp>,
    pto_count: u32,
    time_of_last_ack_eliciting_send: Option<Timestamp>,
}

impl PacketSpace {
    pub fn new(space: PacketNumberSpace) -> Self {
        Self {
            space,
            next_pn: 0,
            largest_acked: None,
            sent_packets: BTreeMap::new(),
            ack_tracker: AckTracker::new(),
            loss_time: None,
            pto_count: 0,
            time_of_last_ack_eliciting_send: None,
        }
    }

    pub fn space(&self) -> PacketNumberSpace {
        self.space
    }

    pub fn bytes_in_flight(&self) -> u32 {
        self.sent_packets
            .values()
            .filter(|p| p.in_flight)
            .map(|p| p.sent_bytes as u32)
            .sum()
    }

    /// Allocates and records metadata for a packet about to be sent.
    #[allow(clippy::too_many_arguments)]
    pub fn on_packet_sent(
        &mut self,
        now: Timestamp,
        sent_bytes: u16,
        ack_eliciting: bool,
        in_flight: bool,
        is_pmtu_probe: bool,
        frames: Vec<FrameDescriptor>,
    ) -> PacketNumber {
        let raw = self.next_pn;
        self.next_pn += 1;
        let pn = self.space.new_packet_number(
            netq_core::varint::VarInt::new(raw).expect("packet number space exhausted"),
        );

        if ack_eliciting {
            self.time_of_last_ack_eliciting_send = Some(now);
        }

        self.sent_packets.insert(
            raw,
            SentPacketInfo {
                time_sent: now,
                sent_bytes,
                ack_eliciting,
                in_flight,
                is_pmtu_probe,
                frames,
            },
        );
        pn
    }

    pub fn pto_probes_outstanding(&self) -> bool {
        self.pto_count > 0
    }

    pub fn on_pto_expired(&mut self) {
        self.pto_count += 1;
    }

    /// Processes an incoming ACK frame's ranges (descending, as decoded
    /// from the wire) against this space's sent-packet store. `ranges`
    /// yields inclusive `(low, high)` packet number pairs, highest first.
    pub fn on_ack_frame(
        &mut self,
        largest_acknowledged: u64,
        ranges: impl Iterator<Item = (u64, u64)>,
        ack_delay: Duration,
        now: Timestamp,
        rtt: &mut RttEstimator,
        is_handshake_confirmed: bool,
    ) -> AckOutcome {
        let mut outcome = AckOutcome::default();
        let mut newest_acked_ack_eliciting: Option<(u64, Timestamp)> = None;

        for (low, high) in ranges {
            let acked_pns: Vec<u64> = self
                .sent_packets
                .range(low..=high)
                .map(|(pn, _)| *pn)
                .collect();
            for pn in acked_pns {
                if let Some(info) = self.sent_packets.remove(&pn) {
                    outcome.newly_acked_bytes += info.sent_bytes as u32;
                    outcome.newly_acked_frames.extend(info.frames);
                    if info.ack_eliciting {
                        let is_newer = newest_acked_ack_eliciting
                            .map(|(newest_pn, _)| pn > newest_pn)
                            .unwrap_or(true);
                        if is_newer {
                            newest_acked_ack_eliciting = Some((pn, info.time_sent));
                        }
                    }
                }
            }
        }

        self.largest_acked = Some(self.largest_acked.map_or(largest_acknowledged, |l| l.max(largest_acknowledged)));

        if let Some((newest_pn, time_sent)) = newest_acked_ack_eliciting {
            if newest_pn == largest_acknowledged {
                let sample = now.saturating_duration_since(time_sent);
                rtt.update_rtt(ack_delay, sample, now, is_handshake_confirmed, self.space);
                outcome.rtt_sample = Some(sample);
            }
        }

        outcome
    }

    /// Walks unacknowledged packets sent before the largest acknowledged
    /// one and declares any that meet the time or packet threshold lost,
    /// per RFC 9002 §6. Returns the reclaimed frames and whether this batch
    /// of losses constitutes persistent congestion (RFC 9002 §7.6): every
    /// ack-eliciting packet sent in the span between the oldest and newest
    /// loss in this pass was lost, and that span exceeds
    /// `rtt.persistent_congestion_threshold()`.
    pub fn detect_losses(&mut self, now: Timestamp, rtt: &RttEstimator) -> LossOutcome {
        let mut outcome = LossOutcome::default();
        self.loss_time = None;

        let Some(largest_acked_raw) = self.largest_acked else {
            return outcome;
        };
        let largest_acked = self
            .space
            .new_packet_number(netq_core::varint::VarInt::new(largest_acked_raw).unwrap());
        let time_threshold = rtt.loss_time_threshold();

        let candidates: Vec<u64> = self
            .sent_packets
            .range(..largest_acked_raw)
            .map(|(pn, _)| *pn)
            .collect();

        let mut lost_span: Option<(Timestamp, Timestamp)> = None;
        let mut any_survived_in_span = false;

        for raw in candidates {
            let info = &self.sent_packets[&raw];
            let pn = self.space.new_packet_number(netq_core::varint::VarInt::new(raw).unwrap());
            match loss::check(time_threshold, info.time_sent, pn, largest_acked, now) {
                loss::Outcome::Lost => {
                    let info = self.sent_packets.remove(&raw).expect("just looked up");
                    if info.ack_eliciting && !info.is_pmtu_probe {
                        lost_span = Some(match lost_span {
                            Some((start, end)) => (start.min(info.time_sent), end.max(info.time_sent)),
                            None => (info.time_sent, info.time_sent),
                        });
                    }
                    outcome.lost_bytes += info.sent_bytes as u32;
                    outcome.lost_frames.extend(info.frames);
                }
                loss::Outcome::NotLost { lost_time } => {
                    any_survived_in_span = true;
                    self.loss_time = Some(self.loss_time.map_or(lost_time, |t| t.min(lost_time)));
                }
            }
        }

        if let Some((start, end)) = lost_span {
            let span = end.saturating_duration_since(start);
            outcome.persistent_congestion = !any_survived_in_span && span >= rtt.persistent_congestion_threshold();
        }

        #[cfg(feature = "tracing")]
        if outcome.lost_bytes > 0 {
            tracing::debug!(
                lost_bytes = outcome.lost_bytes,
                lost_frames = outcome.lost_frames.len(),
                persistent_congestion = outcome.persistent_congestion,
                "packet loss detected"
            );
        }

        outcome
    }

    pub fn next_loss_time(&self) -> Option<Timestamp> {
        self.loss_time
    }

    pub fn time_of_last_ack_eliciting_send(&self) -> Option<Timestamp> {
        self.time_of_last_ack_eliciting_send
    }

    pub fn on_reset_pto_count(&mut self) {
        self.pto_count = 0;
    }

    /// Discards all state for this space, e.g. when Initial or Handshake
    /// keys are dropped never to return (spec.md §3.4's invariant). Returns
    /// the bytes that were in flight, for the congestion controller's
    /// `on_packet_discarded`.
    pub fn discard(&mut self) -> u32 {
        let bytes = self.bytes_in_flight();
        self.sent_packets.clear();
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration as StdDuration;

    fn ts(millis: u64) -> Timestamp {
        Timestamp::from_duration(StdDuration::from_millis(millis.max(1)))
    }

    fn space() -> PacketSpace {
        PacketSpace::new(PacketNumberSpace::ApplicationData)
    }

    #[test]
    fn packet_numbers_increase_strictly() {
        let mut s = space();
        let a = s.on_packet_sent(ts(1), 100, true, true, false, Vec::new());
        let b = s.on_packet_sent(ts(2), 100, true, true, false, Vec::new());
        assert!(b.as_u64() > a.as_u64());
    }

    #[test]
    fn ack_removes_acked_packets_and_feeds_an_rtt_sample() {
        let mut s = space();
        s.on_packet_sent(
            ts(0),
            100,
            true,
            true,
            false,
            alloc::vec![FrameDescriptor::Crypto { offset: 0, len: 10 }],
        );
        let mut rtt = RttEstimator::new(StdDuration::from_millis(100));
        let outcome = s.on_ack_frame(0, core::iter::once((0, 0)), StdDuration::ZERO, ts(50), &mut rtt, true);
        assert_eq!(outcome.newly_acked_bytes, 100);
        assert_eq!(outcome.rtt_sample, Some(StdDuration::from_millis(49)));
        assert_eq!(s.bytes_in_flight(), 0);
    }

    #[test]
    fn packet_threshold_loss_reclaims_frames() {
        let mut s = space();
        s.on_packet_sent(ts(0), 100, true, true, false, alloc::vec![FrameDescriptor::MaxData]);
        for _ in 0..3 {
            s.on_packet_sent(ts(1), 100, true, true, false, Vec::new());
        }
        let mut rtt = RttEstimator::new(StdDuration::from_millis(100));
        // ack everything from pn 1..=3, leaving pn 0 three packets behind
        s.on_ack_frame(3, core::iter::once((1, 3)), StdDuration::ZERO, ts(2), &mut rtt, true);
        let outcome = s.detect_losses(ts(2), &rtt);
        assert_eq!(outcome.lost_frames, alloc::vec![FrameDescriptor::MaxData]);
        assert_eq!(outcome.lost_bytes, 100);
    }

    #[test]
    fn discard_reports_in_flight_bytes_and_clears_state() {
        let mut s = space();
        s.on_packet_sent(ts(0), 100, true, true, false, Vec::new());
        s.on_packet_sent(ts(1), 200, true, true, false, Vec::new());
        assert_eq!(s.discard(), 300);
        assert_eq!(s.bytes_in_flight(), 0);
    }
}
