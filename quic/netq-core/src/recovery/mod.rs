// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! Loss recovery and congestion control, RFC 9002: RTT estimation, packet
//! loss detection, and a CUBIC (RFC 8312) congestion controller.

pub mod congestion_controller;
pub mod cubic;
pub mod loss;
mod rtt_estimator;

pub use congestion_controller::CongestionController;
pub use cubic::Cubic;
pub use rtt_estimator::{RttEstimator, DEFAULT_INITIAL_RTT, K_GRANULARITY, MIN_RTT};

//= https://www.rfc-editor.org/rfc/rfc9002#section-7.2
//# Endpoints SHOULD use an initial congestion window of ten times the
//# maximum datagram size, while limiting the window to the larger of
//# 14,720 bytes or twice the maximum datagram size.
pub const INITIAL_WINDOW_LIMIT: u32 = 14720;

//= https://www.rfc-editor.org/rfc/rfc9002#section-7.6.1
//# The RECOMMENDED value for kPersistentCongestionThreshold is 3.
pub const PERSISTENT_CONGESTION_THRESHOLD: u32 = 3;

pub fn initial_window(max_datagram_size: u16) -> u32 {
    let ten_datagrams = 10u32.saturating_mul(max_datagram_size as u32);
    let floor = INITIAL_WINDOW_LIMIT.max(2 * max_datagram_size as u32);
    ten_datagrams.min(floor)
}
