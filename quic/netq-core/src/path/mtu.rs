// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! Datagram Packetization Layer PMTU Discovery, RFC 8899, as profiled for
//! QUIC by RFC 9000 §14.3: binary-search probing for the largest datagram
//! size a path will carry, with black-hole detection if a previously
//! confirmed size stops getting through.

use super::{IPV4_MIN_HEADER_LEN, IPV6_MIN_HEADER_LEN, MINIMUM_MTU, UDP_HEADER_LEN};
use crate::{packet::number::PacketNumber, time::Timestamp};
use core::time::Duration;

//= https://www.rfc-editor.org/rfc/rfc8899#section-5.1.2
//# a default BASE_PLPMTU of 1200 bytes is RECOMMENDED.
const BASE_PLPMTU: u16 = MINIMUM_MTU;

//= https://www.rfc-editor.org/rfc/rfc8899#section-5.1.2
//# The default value of MAX_PROBES is 3.
const MAX_PROBES: u8 = 3;

/// Maximum length of an IP datagram sent over Ethernet, RFC 894.
const ETHERNET_MTU: u16 = 1500;

/// A probe within this many bytes of the current PLPMTU is not worth
/// sending; the search is considered complete.
const PROBE_THRESHOLD: u16 = 20;

/// Consecutive large-packet losses before a black hole is assumed.
const BLACK_HOLE_THRESHOLD: u8 = 3;

/// Cool-off period after a black hole is detected before probing resumes.
const BLACK_HOLE_COOL_OFF_DURATION: Duration = Duration::from_secs(60);

//= https://www.rfc-editor.org/rfc/rfc8899#section-5.1.1
//# This timer has a period of 600 seconds, as recommended by PLPMTUD.
const PMTU_RAISE_TIMER_DURATION: Duration = Duration::from_secs(600);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Disabled,
    SearchRequested,
    Searching(PacketNumber, Timestamp),
    SearchComplete,
}

/// The outcome of feeding an acknowledgment or loss into the controller,
/// for the caller to act on (update the congestion controller's MTU,
/// re-arm a connection timer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// the probed size has been confirmed as the new PLPMTU.
    Confirmed(u16),
    /// a black hole was detected; the PLPMTU has been reset to the base.
    BlackHole,
    None,
}

#[derive(Clone, Debug)]
pub struct Controller {
    state: State,
    /// the largest confirmed usable datagram payload size.
    plpmtu: u16,
    max_mtu: u16,
    max_udp_payload: u16,
    probed_size: u16,
    max_probe_size: u16,
    probe_count: u8,
    black_hole_counter: u8,
    largest_acked_mtu_sized_packet: Option<PacketNumber>,
    pmtu_raise_deadline: Option<Timestamp>,
}

impl Controller {
    /// `max_mtu` is the largest datagram the caller will ever consider (its
    /// own send buffer ceiling, or a configured jumbo-frame limit).
    /// `is_ipv4` selects the minimum IP header length to subtract when
    /// sizing the UDP payload budget.
    pub fn new(max_mtu: u16, is_ipv4: bool) -> Self {
        let min_ip_header_len = if is_ipv4 { IPV4_MIN_HEADER_LEN } else { IPV6_MIN_HEADER_LEN };
        let max_udp_payload =
            max_mtu.saturating_sub(UDP_HEADER_LEN).saturating_sub(min_ip_header_len).max(BASE_PLPMTU);

        // The most likely path MTU is standard Ethernet, so start probing
        // there rather than wasting a round trip probing at the base size.
        let initial_probed_size = (ETHERNET_MTU.saturating_sub(UDP_HEADER_LEN).saturating_sub(min_ip_header_len))
            .min(max_udp_payload);

        Self {
            state: State::Disabled,
            plpmtu: BASE_PLPMTU,
            max_mtu,
            max_udp_payload,
            probed_size: initial_probed_size,
            max_probe_size: max_udp_payload,
            probe_count: 0,
            black_hole_counter: 0,
            largest_acked_mtu_sized_packet: None,
            pmtu_raise_deadline: None,
        }
    }

    /// The current, confirmed path MTU (UDP payload size, not counting IP
    /// or UDP headers).
    pub fn mtu(&self) -> u16 {
        self.plpmtu
    }

    pub fn max_mtu(&self) -> u16 {
        self.max_mtu
    }

    /// The size a probe packet should be sent at, if one is due.
    pub fn probed_size(&self) -> u16 {
        self.probed_size
    }

    pub fn is_search_requested(&self) -> bool {
        self.state == State::SearchRequested
    }

    /// Begin probing for a larger MTU than the base.
    pub fn enable(&mut self) {
        if self.state == State::Disabled {
            self.request_new_search(None);
        }
    }

    /// Called when the caller has transmitted the requested probe.
    pub fn on_probe_sent(&mut self, packet_number: PacketNumber, now: Timestamp) {
        if self.state == State::SearchRequested {
            self.state = State::Searching(packet_number, now);
            self.probe_count += 1;
        }
    }

    /// Called when the PMTU raise timer deadline (if armed) has passed.
    pub fn on_timeout(&mut self, now: Timestamp) {
        let Some(deadline) = self.pmtu_raise_deadline else {
            return;
        };
        if now >= deadline {
            self.pmtu_raise_deadline = None;
            self.request_new_search(None);
        }
    }

    /// Feed in an acknowledged packet. `sent_bytes` is the UDP payload size
    /// the packet was sent at.
    pub fn on_packet_ack(&mut self, packet_number: PacketNumber, sent_bytes: u16) -> Event {
        if self.state == State::Disabled || !packet_number.space().is_application_data() {
            return Event::None;
        }

        if sent_bytes >= self.plpmtu
            && self.largest_acked_mtu_sized_packet.map_or(true, |pn| packet_number > pn)
        {
            self.black_hole_counter = 0;
            self.largest_acked_mtu_sized_packet = Some(packet_number);
        }

        if let State::Searching(probe_pn, transmit_time) = self.state {
            if packet_number == probe_pn {
                self.plpmtu = self.probed_size;
                self.update_probed_size();
                self.request_new_search(Some(transmit_time));
                return Event::Confirmed(self.plpmtu);
            }
        }
        Event::None
    }

    /// Feed in a lost packet. `new_loss_burst` indicates this loss starts a
    /// new burst of consecutive losses, per the caller's loss detector.
    pub fn on_packet_loss(
        &mut self,
        packet_number: PacketNumber,
        lost_bytes: u16,
        new_loss_burst: bool,
        now: Timestamp,
    ) -> Event {
        if !packet_number.space().is_application_data() {
            return Event::None;
        }

        match self.state {
            State::Disabled => Event::None,
            State::Searching(probe_pn, _) if probe_pn == packet_number => {
                if self.probe_count >= MAX_PROBES {
                    self.max_probe_size = self.probed_size;
                    self.update_probed_size();
                    self.request_new_search(None);
                } else {
                    self.state = State::SearchRequested;
                }
                Event::None
            }
            State::Searching(..) | State::SearchComplete | State::SearchRequested => {
                if (BASE_PLPMTU + 1..=self.plpmtu).contains(&lost_bytes)
                    && self.largest_acked_mtu_sized_packet.map_or(true, |pn| packet_number > pn)
                    && new_loss_burst
                {
                    self.black_hole_counter = self.black_hole_counter.saturating_add(1);
                }

                if self.black_hole_counter > BLACK_HOLE_THRESHOLD {
                    self.on_black_hole_detected(now);
                    Event::BlackHole
                } else {
                    Event::None
                }
            }
        }
    }

    /// Sets `probed_size` to the next size to try, bisecting the gap
    /// between the confirmed PLPMTU and the current probe ceiling.
    fn update_probed_size(&mut self) {
        self.probed_size = self.plpmtu + ((self.max_probe_size - self.plpmtu) / 2);
    }

    fn request_new_search(&mut self, last_probe_time: Option<Timestamp>) {
        if self.probed_size - self.plpmtu >= PROBE_THRESHOLD {
            self.probe_count = 0;
            self.state = State::SearchRequested;
        } else {
            self.state = State::SearchComplete;
            if let Some(last_probe_time) = last_probe_time {
                self.arm_pmtu_raise_timer(last_probe_time + PMTU_RAISE_TIMER_DURATION);
            }
        }
    }

    fn on_black_hole_detected(&mut self, now: Timestamp) {
        self.black_hole_counter = 0;
        self.largest_acked_mtu_sized_packet = None;
        self.plpmtu = BASE_PLPMTU;
        self.state = State::SearchComplete;
        self.arm_pmtu_raise_timer(now + BLACK_HOLE_COOL_OFF_DURATION);
    }

    fn arm_pmtu_raise_timer(&mut self, deadline: Timestamp) {
        self.max_probe_size = self.max_udp_payload;
        self.update_probed_size();
        if self.probed_size - self.plpmtu >= PROBE_THRESHOLD {
            self.pmtu_raise_deadline = Some(deadline);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::number::PacketNumberSpace;

    fn ts(secs: u64) -> Timestamp {
        Timestamp::from_duration(Duration::from_secs(secs))
    }

    fn app_pn(n: u64) -> PacketNumber {
        PacketNumberSpace::ApplicationData.new_packet_number(crate::varint::VarInt::from_u32(n as u32))
    }

    #[test]
    fn new_controller_starts_disabled_at_base_mtu() {
        let controller = Controller::new(1500, true);
        assert_eq!(controller.mtu(), BASE_PLPMTU);
        assert!(!controller.is_search_requested());
    }

    #[test]
    fn enable_requests_a_search_when_room_to_probe() {
        let mut controller = Controller::new(1500, true);
        controller.enable();
        assert!(controller.is_search_requested());
        assert!(controller.probed_size() > controller.mtu());
    }

    #[test]
    fn confirmed_probe_raises_the_plpmtu() {
        let mut controller = Controller::new(1500, true);
        controller.enable();
        let probed = controller.probed_size();
        let pn = app_pn(1);
        controller.on_probe_sent(pn, ts(0));
        let event = controller.on_packet_ack(pn, probed);
        assert_eq!(event, Event::Confirmed(probed));
        assert_eq!(controller.mtu(), probed);
    }

    #[test]
    fn repeated_probe_loss_gives_up_and_shrinks_ceiling() {
        let mut controller = Controller::new(1500, true);
        controller.enable();
        for i in 0..MAX_PROBES {
            let pn = app_pn(i as u64);
            controller.on_probe_sent(pn, ts(0));
            controller.on_packet_loss(pn, controller.probed_size(), false, ts(0));
        }
        // after MAX_PROBES straight losses the controller narrows the probe
        // window rather than retrying the same size forever.
        assert!(controller.max_mtu() >= controller.mtu());
    }

    #[test]
    fn sustained_large_packet_loss_triggers_black_hole_reset() {
        let mut controller = Controller::new(1500, true);
        controller.enable();
        let probe_pn = app_pn(0);
        controller.on_probe_sent(probe_pn, ts(0));
        controller.on_packet_ack(probe_pn, controller.probed_size());
        let confirmed = controller.mtu();
        assert!(confirmed > BASE_PLPMTU);

        for i in 1..=(BLACK_HOLE_THRESHOLD as u64 + 1) {
            let event = controller.on_packet_loss(app_pn(i), confirmed, true, ts(1));
            if event == Event::BlackHole {
                break;
            }
        }
        assert_eq!(controller.mtu(), BASE_PLPMTU);
    }
}
