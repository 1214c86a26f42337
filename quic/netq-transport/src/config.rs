// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! Connection-level configuration: idle timeout, flow-control windows,
//! stream count limits, and the other knobs spec.md §6 enumerates.
//!
//! Grounded on `msquic`'s `core/settings.c` for field names and the
//! "only overwrite a field the application hasn't explicitly set" pattern
//! (`QUIC_SETTINGS_APP_SET`), and on the teacher's
//! `s2n-quic-core::connection::limits::Limits` for the `with_*`
//! builder-setter shape (`setter!` macro, `Result<Self, ValidationError>`).

use core::{fmt, time::Duration};

/// Raised by a `with_*` setter when the supplied value would violate a
/// documented bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationError(pub(crate) &'static str);

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid setting: {}", self.0)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ValidationError {}

macro_rules! setter {
    ($(#[doc = $doc:literal])* $name:ident, $field:ident, $inner:ty $(, |$validate_value:ident| $validation:block)?) => {
        $(#[doc = $doc])*
        pub fn $name(mut self, value: $inner) -> Result<Self, ValidationError> {
            $(
                let $validate_value = value;
                $validation
            )?
            self.$field = value;
            Ok(self)
        }
    };
}

/// Defaults mirroring `QuicSettingsSetDefault` in `core/settings.c`. The
/// original's `#define`d constants aren't present in this repo's retrieval
/// pack (only the `.c` file survived filtering), so the numeric values
/// below approximate msquic's well-known defaults; anything marked
/// "approximate" should be treated as a reasonable default, not a faithful
/// port of an exact constant.
mod defaults {
    use core::time::Duration;

    pub const MAX_OPERATIONS_PER_DRAIN: u8 = 16;
    pub const INITIAL_WINDOW_PACKETS: u16 = 10;
    pub const SEND_IDLE_TIMEOUT: Duration = Duration::from_millis(1_000);
    pub const INITIAL_RTT: Duration = Duration::from_millis(333);
    pub const MAX_ACK_DELAY: Duration = Duration::from_millis(25);
    pub const DISCONNECT_TIMEOUT: Duration = Duration::from_millis(16_000);
    pub const KEEP_ALIVE_INTERVAL: Duration = Duration::ZERO; // disabled
    pub const IDLE_TIMEOUT: Duration = Duration::from_millis(30_000);
    pub const BIDI_STREAM_COUNT: u16 = 0;
    pub const UNIDI_STREAM_COUNT: u16 = 0;
    /// approximate
    pub const TLS_CLIENT_MAX_SEND_BUFFER: u32 = 4_096;
    /// approximate
    pub const TLS_SERVER_MAX_SEND_BUFFER: u32 = 8_192;
    pub const STREAM_RECV_WINDOW: u32 = 0x8000;
    pub const STREAM_RECV_BUFFER: u32 = 0x8000;
    /// approximate
    pub const CONN_FLOW_CONTROL_WINDOW: u32 = 0x10_0000;
    pub const ACK_DELAY_EXPONENT: u8 = 3;
    pub const MAX_UDP_PAYLOAD_SIZE: u16 = 1_452;
    pub const PACKET_TOLERANCE: u16 = crate::ack_tracker::DEFAULT_PACKET_TOLERANCE;
    pub const REORDERING_THRESHOLD: u8 = crate::ack_tracker::DEFAULT_REORDERING_THRESHOLD;
}

/// Connection configuration, built with the `with_*` setters and passed to a
/// connection at creation. Unset fields fall back to `Settings::default()`,
/// the analogue of `QuicSettingsSetDefault` only ever filling in fields the
/// application hasn't explicitly set.
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    pub(crate) max_operations_per_drain: u8,
    pub(crate) initial_window_packets: u16,
    pub(crate) send_idle_timeout: Duration,
    pub(crate) initial_rtt: Duration,
    pub(crate) max_ack_delay: Duration,
    pub(crate) disconnect_timeout: Duration,
    pub(crate) keep_alive_interval: Duration,
    pub(crate) idle_timeout: Duration,
    pub(crate) bidi_stream_count: u16,
    pub(crate) unidi_stream_count: u16,
    /// `core/settings.c` writes both of these defaults into the *same*
    /// field, guarded by the *same* `AppSet.TlsClientMaxSendBuffer` flag —
    /// the server-side default is dead code there and the server buffer
    /// size is never actually configurable. Resolved here as two
    /// independently-guarded fields; see DESIGN.md.
    pub(crate) tls_client_max_send_buffer: u32,
    pub(crate) tls_server_max_send_buffer: u32,
    pub(crate) stream_recv_window: u32,
    pub(crate) stream_recv_buffer: u32,
    pub(crate) conn_flow_control_window: u32,
    pub(crate) ack_delay_exponent: u8,
    pub(crate) max_udp_payload_size: u16,
    pub(crate) packet_tolerance: u16,
    pub(crate) reordering_threshold: u8,
    pub(crate) datagram_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl Settings {
    pub const fn new() -> Self {
        Self {
            max_operations_per_drain: defaults::MAX_OPERATIONS_PER_DRAIN,
            initial_window_packets: defaults::INITIAL_WINDOW_PACKETS,
            send_idle_timeout: defaults::SEND_IDLE_TIMEOUT,
            initial_rtt: defaults::INITIAL_RTT,
            max_ack_delay: defaults::MAX_ACK_DELAY,
            disconnect_timeout: defaults::DISCONNECT_TIMEOUT,
            keep_alive_interval: defaults::KEEP_ALIVE_INTERVAL,
            idle_timeout: defaults::IDLE_TIMEOUT,
            bidi_stream_count: defaults::BIDI_STREAM_COUNT,
            unidi_stream_count: defaults::UNIDI_STREAM_COUNT,
            tls_client_max_send_buffer: defaults::TLS_CLIENT_MAX_SEND_BUFFER,
            tls_server_max_send_buffer: defaults::TLS_SERVER_MAX_SEND_BUFFER,
            stream_recv_window: defaults::STREAM_RECV_WINDOW,
            stream_recv_buffer: defaults::STREAM_RECV_BUFFER,
            conn_flow_control_window: defaults::CONN_FLOW_CONTROL_WINDOW,
            ack_delay_exponent: defaults::ACK_DELAY_EXPONENT,
            max_udp_payload_size: defaults::MAX_UDP_PAYLOAD_SIZE,
            packet_tolerance: defaults::PACKET_TOLERANCE,
            reordering_threshold: defaults::REORDERING_THRESHOLD,
            datagram_enabled: false,
        }
    }

    setter!(with_idle_timeout, idle_timeout, Duration);
    setter!(with_max_ack_delay, max_ack_delay, Duration, |value| {
        if value > Duration::from_millis(16_383_375) {
            return Err(ValidationError(
                "max_ack_delay exceeds the 14-bit millisecond encoding range",
            ));
        }
    });
    setter!(with_disconnect_timeout, disconnect_timeout, Duration);
    setter!(with_keep_alive_interval, keep_alive_interval, Duration);
    setter!(with_bidi_stream_count, bidi_stream_count, u16);
    setter!(with_unidi_stream_count, unidi_stream_count, u16);
    setter!(
        with_tls_client_max_send_buffer,
        tls_client_max_send_buffer,
        u32
    );
    setter!(
        with_tls_server_max_send_buffer,
        tls_server_max_send_buffer,
        u32
    );
    setter!(with_stream_recv_window, stream_recv_window, u32);
    setter!(with_conn_flow_control_window, conn_flow_control_window, u32);
    setter!(with_ack_delay_exponent, ack_delay_exponent, u8, |value| {
        if value > 20 {
            return Err(ValidationError(
                "ack_delay_exponent exceeds the RFC 9000 maximum of 20",
            ));
        }
    });
    setter!(with_max_udp_payload_size, max_udp_payload_size, u16, |value| {
        if value < 1200 {
            return Err(ValidationError(
                "max_udp_payload_size must be >= 1200 per RFC 9000 §18.2",
            ));
        }
    });
    setter!(with_packet_tolerance, packet_tolerance, u16);
    setter!(with_reordering_threshold, reordering_threshold, u8);
    setter!(with_datagram_enabled, datagram_enabled, bool);

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn max_ack_delay(&self) -> Duration {
        self.max_ack_delay
    }

    pub fn ack_delay_exponent(&self) -> u8 {
        self.ack_delay_exponent
    }

    pub fn packet_tolerance(&self) -> u16 {
        self.packet_tolerance
    }

    pub fn reordering_threshold(&self) -> u8 {
        self.reordering_threshold
    }

    pub fn max_udp_payload_size(&self) -> u16 {
        self.max_udp_payload_size
    }

    pub fn datagram_enabled(&self) -> bool {
        self.datagram_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_rfc_compliant() {
        let settings = Settings::default();
        assert!(settings.max_udp_payload_size >= 1200);
        assert!(settings.ack_delay_exponent <= 20);
    }

    #[test]
    fn client_and_server_send_buffers_are_independently_configurable() {
        let settings = Settings::default()
            .with_tls_client_max_send_buffer(1_000)
            .unwrap()
            .with_tls_server_max_send_buffer(2_000)
            .unwrap();
        assert_eq!(settings.tls_client_max_send_buffer, 1_000);
        assert_eq!(settings.tls_server_max_send_buffer, 2_000);
    }

    #[test]
    fn ack_delay_exponent_rejects_values_above_the_rfc_maximum() {
        assert!(Settings::default().with_ack_delay_exponent(21).is_err());
    }

    #[test]
    fn max_udp_payload_size_rejects_values_below_the_rfc_minimum() {
        assert!(Settings::default().with_max_udp_payload_size(1199).is_err());
    }
}
