// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! RTT estimation, RFC 9002 §5: a smoothed RTT and its variance, derived
//! from each ACK that newly acknowledges the largest packet number seen.

use crate::{packet::number::PacketNumberSpace, time::Timestamp};
use core::{
    cmp::{max, min},
    time::Duration,
};

//= https://www.rfc-editor.org/rfc/rfc9002#section-6.2.2
//# When no previous RTT is available, the initial RTT SHOULD be set to
//# 333 milliseconds.
pub const DEFAULT_INITIAL_RTT: Duration = Duration::from_millis(333);

/// The lowest RTT value the estimator will report.
pub const MIN_RTT: Duration = Duration::from_micros(1);

//= https://www.rfc-editor.org/rfc/rfc9002#section-6.1.2
//# The RECOMMENDED value of the timer granularity (kGranularity) is 1
//# millisecond.
pub const K_GRANULARITY: Duration = Duration::from_millis(1);

//= https://www.rfc-editor.org/rfc/rfc9002#section-7.6.1
//# The RECOMMENDED value for kPersistentCongestionThreshold is 3.
const K_PERSISTENT_CONGESTION_THRESHOLD: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RttEstimator {
    latest_rtt: Duration,
    min_rtt: Duration,
    smoothed_rtt: Duration,
    rttvar: Duration,
    /// the peer's advertised `max_ack_delay` transport parameter; zero
    /// until the handshake completes and the value is known.
    max_ack_delay: Duration,
    first_rtt_sample: Option<Timestamp>,
}

impl Default for RttEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_RTT)
    }
}

impl RttEstimator {
    pub fn new(initial_rtt: Duration) -> Self {
        Self::with_max_ack_delay(Duration::ZERO, initial_rtt)
    }

    pub fn with_max_ack_delay(max_ack_delay: Duration, initial_rtt: Duration) -> Self {
        let initial_rtt = initial_rtt.max(MIN_RTT);
        //= https://www.rfc-editor.org/rfc/rfc9002#section-5.3
        //# smoothed_rtt and rttvar are initialized as follows, where
        //# kInitialRtt contains the initial RTT value:
        //# smoothed_rtt = kInitialRtt
        //# rttvar = kInitialRtt / 2
        Self {
            latest_rtt: initial_rtt,
            min_rtt: initial_rtt,
            smoothed_rtt: initial_rtt,
            rttvar: initial_rtt / 2,
            max_ack_delay,
            first_rtt_sample: None,
        }
    }

    pub fn for_new_path(&self, initial_rtt: Duration) -> Self {
        Self::with_max_ack_delay(self.max_ack_delay, initial_rtt)
    }

    pub fn latest_rtt(&self) -> Duration {
        self.latest_rtt
    }

    pub fn smoothed_rtt(&self) -> Duration {
        self.smoothed_rtt
    }

    pub fn min_rtt(&self) -> Duration {
        self.min_rtt
    }

    pub fn rttvar(&self) -> Duration {
        self.rttvar
    }

    pub fn first_rtt_sample(&self) -> Option<Timestamp> {
        self.first_rtt_sample
    }

    pub fn max_ack_delay(&self) -> Duration {
        self.max_ack_delay
    }

    pub fn on_max_ack_delay(&mut self, max_ack_delay: Duration) {
        self.max_ack_delay = max_ack_delay;
    }

    fn rttvar_4x(&self) -> Duration {
        self.rttvar.saturating_mul(4)
    }

    //= https://www.rfc-editor.org/rfc/rfc9002#section-6.2.1
    //# PTO = smoothed_rtt + max(4*rttvar, kGranularity) + max_ack_delay
    pub fn pto_period(&self, pto_backoff: u32, space: PacketNumberSpace) -> Duration {
        let mut pto_period = self.smoothed_rtt.as_micros() as u64;
        pto_period += max(self.rttvar_4x().as_micros() as u64, K_GRANULARITY.as_micros() as u64);

        //= https://www.rfc-editor.org/rfc/rfc9002#section-6.2.1
        //# When the PTO is armed for Initial or Handshake packet number
        //# spaces, the max_ack_delay in the PTO period computation is set
        //# to 0, since the peer is expected to not delay these packets
        //# intentionally.
        if space.is_application_data() {
            pto_period += self.max_ack_delay.as_micros() as u64;
        }

        pto_period *= pto_backoff as u64;
        Duration::from_micros(pto_period)
    }

    /// Updates the estimate with a new RTT sample, RFC 9002 §5.3.
    pub fn update_rtt(
        &mut self,
        mut ack_delay: Duration,
        rtt_sample: Duration,
        timestamp: Timestamp,
        is_handshake_confirmed: bool,
        space: PacketNumberSpace,
    ) {
        self.latest_rtt = rtt_sample.max(MIN_RTT);

        if self.first_rtt_sample.is_none() {
            self.first_rtt_sample = Some(timestamp);
            self.min_rtt = self.latest_rtt;
            self.smoothed_rtt = self.latest_rtt;
            self.rttvar = self.latest_rtt / 2;
            return;
        }

        self.min_rtt = min(self.min_rtt, self.latest_rtt);

        //= https://www.rfc-editor.org/rfc/rfc9002#section-5.3
        //# an endpoint MAY ignore the acknowledgment delay for Initial
        //# packets, since these acknowledgments are not delayed by the peer.
        if space.is_initial() {
            ack_delay = Duration::ZERO;
        }
        if is_handshake_confirmed {
            ack_delay = min(ack_delay, self.max_ack_delay);
        }

        let mut adjusted_rtt = self.latest_rtt;
        if self.min_rtt + ack_delay < self.latest_rtt {
            adjusted_rtt -= ack_delay;
        } else if !is_handshake_confirmed {
            // prior to handshake confirmation an endpoint MAY ignore samples
            // that would otherwise go below min_rtt once adjusted.
            return;
        }

        let rttvar_sample = abs_difference(self.smoothed_rtt, adjusted_rtt);
        self.rttvar = weighted_average(self.rttvar, rttvar_sample, 4);
        self.smoothed_rtt = weighted_average(self.smoothed_rtt, adjusted_rtt, 8);
    }

    //= https://www.rfc-editor.org/rfc/rfc9002#section-7.6.1
    //# (smoothed_rtt + max(4*rttvar, kGranularity) + max_ack_delay) *
    //#     kPersistentCongestionThreshold
    pub fn persistent_congestion_threshold(&self) -> Duration {
        (self.smoothed_rtt
            + max(self.rttvar_4x(), K_GRANULARITY)
            + self.max_ack_delay)
            * K_PERSISTENT_CONGESTION_THRESHOLD
    }

    //= https://www.rfc-editor.org/rfc/rfc9002#section-6.1.2
    //# max(kTimeThreshold * max(smoothed_rtt, latest_rtt), kGranularity)
    pub fn loss_time_threshold(&self) -> Duration {
        let base = max(self.smoothed_rtt, self.latest_rtt);
        // kTimeThreshold is 9/8.
        let scaled = base + base / 8;
        max(scaled, K_GRANULARITY)
    }
}

fn abs_difference(a: Duration, b: Duration) -> Duration {
    if a > b {
        a - b
    } else {
        b - a
    }
}

fn weighted_average(existing: Duration, sample: Duration, divisor: u32) -> Duration {
    // `(divisor - 1)/divisor * existing + 1/divisor * sample` without risking
    // an intermediate overflow from multiplying by the divisor first.
    existing - existing / divisor + sample / divisor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_initializes_all_fields() {
        let mut rtt = RttEstimator::new(DEFAULT_INITIAL_RTT);
        let sample = Duration::from_millis(100);
        rtt.update_rtt(
            Duration::ZERO,
            sample,
            Timestamp::from_duration(Duration::from_secs(1)),
            false,
            PacketNumberSpace::Initial,
        );
        assert_eq!(rtt.latest_rtt(), sample);
        assert_eq!(rtt.min_rtt(), sample);
        assert_eq!(rtt.smoothed_rtt(), sample);
    }

    #[test]
    fn subsequent_sample_smooths_toward_new_value() {
        let mut rtt = RttEstimator::new(Duration::from_millis(100));
        rtt.update_rtt(
            Duration::ZERO,
            Duration::from_millis(100),
            Timestamp::from_duration(Duration::from_secs(1)),
            true,
            PacketNumberSpace::ApplicationData,
        );
        let before = rtt.smoothed_rtt();
        rtt.update_rtt(
            Duration::ZERO,
            Duration::from_millis(200),
            Timestamp::from_duration(Duration::from_secs(2)),
            true,
            PacketNumberSpace::ApplicationData,
        );
        assert!(rtt.smoothed_rtt() > before);
        assert!(rtt.smoothed_rtt() < Duration::from_millis(200));
    }

    #[test]
    fn min_rtt_tracks_the_lowest_sample_seen() {
        let mut rtt = RttEstimator::new(Duration::from_millis(100));
        for millis in [100, 50, 75] {
            rtt.update_rtt(
                Duration::ZERO,
                Duration::from_millis(millis),
                Timestamp::from_duration(Duration::from_secs(millis)),
                true,
                PacketNumberSpace::ApplicationData,
            );
        }
        assert_eq!(rtt.min_rtt(), Duration::from_millis(50));
    }

    #[test]
    fn initial_space_ignores_ack_delay() {
        let mut rtt = RttEstimator::new(Duration::from_millis(100));
        rtt.update_rtt(
            Duration::from_millis(500),
            Duration::from_millis(100),
            Timestamp::from_duration(Duration::from_secs(1)),
            false,
            PacketNumberSpace::Initial,
        );
        assert_eq!(rtt.latest_rtt(), Duration::from_millis(100));
    }
}
