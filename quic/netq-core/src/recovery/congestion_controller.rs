// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! The congestion controller seam, RFC 9002 §7: how much a connection is
//! allowed to have in flight, and how that limit reacts to acknowledgments,
//! losses, and path MTU changes.

use crate::{recovery::RttEstimator, time::Timestamp};
use core::fmt::Debug;

pub trait CongestionController: Debug {
    /// The size of the current congestion window, in bytes.
    fn congestion_window(&self) -> u32;

    /// The sum of all sent, unacknowledged, un-lost bytes.
    fn bytes_in_flight(&self) -> u32;

    /// True if there isn't room in the window for another full datagram.
    fn is_congestion_limited(&self) -> bool;

    /// Invoked when a congestion-controlled packet is sent. `bytes_sent` is
    /// zero for packets that contain only ACK frames, which are not
    /// congestion controlled.
    fn on_packet_sent(&mut self, time_sent: Timestamp, bytes_sent: u32);

    /// Invoked when an acknowledgment newly acknowledges `bytes_acked`
    /// bytes, with `time_sent` the send time of the newest packet the ACK
    /// covered.
    fn on_packet_ack(&mut self, time_sent: Timestamp, bytes_acked: u32, rtt: &RttEstimator, now: Timestamp);

    /// Invoked when a packet is declared lost. `persistent_congestion`
    /// indicates the loss period exceeded the persistent congestion
    /// threshold (RFC 9002 §7.6).
    fn on_packet_lost(
        &mut self,
        lost_bytes: u32,
        time_sent: Timestamp,
        persistent_congestion: bool,
        now: Timestamp,
    );

    /// Invoked when the path MTU is confirmed or changes.
    fn on_mtu_update(&mut self, max_datagram_size: u16);

    /// Invoked when bytes previously counted in flight are discarded
    /// without being acknowledged or declared lost, e.g. a packet number
    /// space being dropped.
    fn on_packet_discarded(&mut self, bytes_sent: u32);
}
