// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! CUBIC congestion control, RFC 8312, profiled for QUIC by RFC 9002 §B.

use crate::{
    recovery::{congestion_controller::CongestionController, initial_window, RttEstimator},
    time::Timestamp,
};
use core::time::Duration;

#[cfg(not(feature = "std"))]
use num_traits::Float as _;

//= https://www.rfc-editor.org/rfc/rfc8312#section-5.1
//# C SHOULD be set to 0.4.
const C: f32 = 0.4;

//= https://www.rfc-editor.org/rfc/rfc8312#section-4.5
//# Parameter beta_cubic SHOULD be set to 0.7.
const BETA_CUBIC: f32 = 0.7;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    SlowStart,
    /// armed with the time the recovery period began, so a loss already
    /// accounted for in this round doesn't trigger a second reduction.
    Recovery(Timestamp),
    CongestionAvoidance { epoch_start: Timestamp },
}

/// A CUBIC congestion controller for a single path.
#[derive(Clone, Debug)]
pub struct Cubic {
    state: State,
    max_datagram_size: u16,
    congestion_window: f32,
    slow_start_threshold: f32,
    bytes_in_flight: u32,
    /// window size just before the last reduction, RFC 8312 §4.1.
    w_max: f32,
    w_last_max: f32,
    /// time from the start of congestion avoidance until w_cubic(t) reaches w_max.
    k: Duration,
}

impl Cubic {
    pub fn new(max_datagram_size: u16) -> Self {
        let initial = initial_window(max_datagram_size) as f32;
        Self {
            state: State::SlowStart,
            max_datagram_size,
            congestion_window: initial,
            slow_start_threshold: f32::INFINITY,
            bytes_in_flight: 0,
            w_max: 0.0,
            w_last_max: 0.0,
            k: Duration::ZERO,
        }
    }

    fn available_window(&self) -> u32 {
        (self.congestion_window as u32).saturating_sub(self.bytes_in_flight)
    }

    //= https://www.rfc-editor.org/rfc/rfc8312#section-4.1
    //# W_cubic(t) = C*(t-K)^3 + W_max
    fn w_cubic(&self, t: Duration) -> f32 {
        C * (t.as_secs_f32() - self.k.as_secs_f32()).powi(3) + self.w_max
    }

    //= https://www.rfc-editor.org/rfc/rfc8312#section-4.2
    //# K = cubic_root(W_max*(1-beta_cubic)/C)
    fn update_k(&mut self) {
        let k_cubed = self.w_max * (1.0 - BETA_CUBIC) / C;
        self.k = Duration::from_secs_f32(k_cubed.max(0.0).cbrt());
    }

    fn on_congestion_event(&mut self, now: Timestamp) {
        if matches!(self.state, State::Recovery(_)) {
            return;
        }

        //= https://www.rfc-editor.org/rfc/rfc8312#section-4.6
        //# With fast convergence, when a congestion event occurs, before the
        //# window reduction, a flow remembers the last value of W_max.
        if self.congestion_window < self.w_last_max {
            self.w_last_max = self.congestion_window;
            self.w_max = self.congestion_window * (1.0 + BETA_CUBIC) / 2.0;
        } else {
            self.w_last_max = self.congestion_window;
            self.w_max = self.congestion_window;
        }

        self.slow_start_threshold =
            (self.congestion_window * BETA_CUBIC).max(2.0 * self.max_datagram_size as f32);
        self.congestion_window = self.slow_start_threshold;
        self.update_k();
        self.state = State::Recovery(now);
    }
}

impl CongestionController for Cubic {
    fn congestion_window(&self) -> u32 {
        self.congestion_window as u32
    }

    fn bytes_in_flight(&self) -> u32 {
        self.bytes_in_flight
    }

    fn is_congestion_limited(&self) -> bool {
        self.available_window() < self.max_datagram_size as u32
    }

    fn on_packet_sent(&mut self, _time_sent: Timestamp, bytes_sent: u32) {
        self.bytes_in_flight = self.bytes_in_flight.saturating_add(bytes_sent);
    }

    fn on_packet_ack(&mut self, time_sent: Timestamp, bytes_acked: u32, _rtt: &RttEstimator, now: Timestamp) {
        self.bytes_in_flight = self.bytes_in_flight.saturating_sub(bytes_acked);

        if let State::Recovery(recovery_start) = self.state {
            if time_sent >= recovery_start {
                self.state = State::CongestionAvoidance { epoch_start: now };
            }
            return;
        }

        match self.state {
            State::SlowStart => {
                //= https://www.rfc-editor.org/rfc/rfc9002#section-7.3.1
                //# while a sender is in slow start, the congestion window
                //# increases by the number of bytes acknowledged.
                self.congestion_window += bytes_acked as f32;
                if self.congestion_window >= self.slow_start_threshold {
                    self.state = State::CongestionAvoidance { epoch_start: now };
                }
            }
            State::CongestionAvoidance { epoch_start } => {
                let t = now.saturating_duration_since(epoch_start);
                let target_packets = self.w_cubic(t) / self.max_datagram_size as f32;
                let target = target_packets * self.max_datagram_size as f32;
                if target > self.congestion_window {
                    // converge toward the cubic growth curve over the round,
                    // rather than jumping straight to it.
                    self.congestion_window += (target - self.congestion_window)
                        / self.congestion_window
                        * self.max_datagram_size as f32;
                } else {
                    self.congestion_window += self.max_datagram_size as f32 / self.congestion_window;
                }
            }
            State::Recovery(_) => unreachable!("handled above"),
        }
    }

    fn on_packet_lost(
        &mut self,
        lost_bytes: u32,
        time_sent: Timestamp,
        persistent_congestion: bool,
        now: Timestamp,
    ) {
        self.bytes_in_flight = self.bytes_in_flight.saturating_sub(lost_bytes);
        self.on_congestion_event(now);

        //= https://www.rfc-editor.org/rfc/rfc9002#section-7.6.2
        //# When persistent congestion is declared, the sender's congestion
        //# window MUST be reset to the minimum congestion window.
        if persistent_congestion {
            self.congestion_window = 2.0 * self.max_datagram_size as f32;
            self.w_max = 0.0;
            self.w_last_max = 0.0;
            self.state = State::Recovery(time_sent);
        }
    }

    fn on_mtu_update(&mut self, max_datagram_size: u16) {
        self.max_datagram_size = max_datagram_size;
        self.congestion_window = self.congestion_window.max(initial_window(max_datagram_size) as f32);
    }

    fn on_packet_discarded(&mut self, bytes_sent: u32) {
        self.bytes_in_flight = self.bytes_in_flight.saturating_sub(bytes_sent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MSS: u16 = 1200;

    fn ts(secs: u64) -> Timestamp {
        Timestamp::from_duration(Duration::from_secs(secs))
    }

    #[test]
    fn starts_in_slow_start_with_ten_datagram_window() {
        let cubic = Cubic::new(MSS);
        assert_eq!(cubic.congestion_window(), initial_window(MSS));
    }

    #[test]
    fn slow_start_grows_by_bytes_acknowledged() {
        let mut cubic = Cubic::new(MSS);
        let rtt = RttEstimator::default();
        let before = cubic.congestion_window();
        cubic.on_packet_sent(ts(0), MSS as u32);
        cubic.on_packet_ack(ts(0), MSS as u32, &rtt, ts(1));
        assert_eq!(cubic.congestion_window(), before + MSS as u32);
    }

    #[test]
    fn loss_shrinks_window_and_enters_recovery() {
        let mut cubic = Cubic::new(MSS);
        cubic.on_packet_sent(ts(0), MSS as u32);
        let before = cubic.congestion_window();
        cubic.on_packet_lost(MSS as u32, ts(0), false, ts(1));
        assert!(cubic.congestion_window() < before);
        assert!(matches!(cubic.state, State::Recovery(_)));
    }

    #[test]
    fn a_second_loss_in_the_same_recovery_period_is_not_double_counted() {
        let mut cubic = Cubic::new(MSS);
        cubic.on_packet_sent(ts(0), MSS as u32);
        cubic.on_packet_lost(MSS as u32, ts(0), false, ts(1));
        let after_first = cubic.congestion_window();
        cubic.on_packet_lost(MSS as u32, ts(0), false, ts(1));
        assert_eq!(cubic.congestion_window(), after_first);
    }

    #[test]
    fn persistent_congestion_resets_to_minimum_window() {
        let mut cubic = Cubic::new(MSS);
        cubic.on_packet_sent(ts(0), MSS as u32);
        cubic.on_packet_lost(MSS as u32, ts(0), true, ts(1));
        assert_eq!(cubic.congestion_window(), 2 * MSS as u32);
    }
}
