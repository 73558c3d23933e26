// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serial transport with timing based RTU framing.
//!
//! Received bytes are pushed into an [`RxHandle`], either by a reader
//! thread (see [`spawn_reader`]) or by any other byte source. The
//! [`Framer`] behind the handle splits the byte stream into frames by
//! silence on the line. A [`Link`] transmits frames and waits for received
//! ones. A [`Client`] drives one [`Master`](crate::master::Master)
//! transaction at a time over a link.

mod client;
mod framer;
mod link;

pub use self::{client::*, framer::*, link::*};

use std::{fmt, io, time::Duration};

/// Bits per character: start, 8 data, parity or 2nd stop bit, stop.
const CHAR_BITS: u64 = 11;

/// Inter-character and inter-frame timeouts of a serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Transmission time of a single character.
    pub char_time: Duration,
    /// 1.5 characters.
    pub char_timeout: Duration,
    /// 3.5 characters of silence complete a frame.
    pub frame_timeout: Duration,
}

impl Timing {
    #[must_use]
    pub fn from_baud_rate(baud_rate: u32) -> Self {
        let char_nanos = CHAR_BITS * 1_000_000_000 / u64::from(baud_rate.max(1));
        Self {
            char_time: Duration::from_nanos(char_nanos),
            char_timeout: Duration::from_nanos(char_nanos * 3 / 2),
            frame_timeout: Duration::from_nanos(char_nanos * 7 / 2),
        }
    }
}

/// Serial line settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    pub baud_rate: u32,
    /// Maximum time to wait for a complete frame.
    pub response_timeout: Duration,
    /// Drop the local echo of transmitted frames (RS-485 half-duplex).
    pub discard_echo: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new(9600)
    }
}

impl SerialConfig {
    #[must_use]
    pub const fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            response_timeout: Duration::from_secs(3),
            discard_echo: false,
        }
    }

    #[must_use]
    pub const fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    #[must_use]
    pub const fn with_response_timeout(mut self, response_timeout: Duration) -> Self {
        self.response_timeout = response_timeout;
        self
    }

    #[must_use]
    pub const fn with_discard_echo(mut self, discard_echo: bool) -> Self {
        self.discard_echo = discard_echo;
        self
    }

    #[must_use]
    pub fn timing(&self) -> Timing {
        Timing::from_baud_rate(self.baud_rate)
    }
}

/// Transport error
#[derive(Debug)]
pub enum Error {
    /// No complete frame was received in time
    Timeout,
    /// A received frame exceeded the maximum frame length
    Overflow,
    Io(io::Error),
    Modbus(crate::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Error::*;

        match self {
            Timeout => write!(f, "Response timeout"),
            Overflow => write!(f, "Receive buffer overflow"),
            Io(err) => write!(f, "I/O error: {err}"),
            Modbus(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Modbus(err) => Some(err),
            Self::Timeout | Self::Overflow => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<crate::Error> for Error {
    fn from(err: crate::Error) -> Self {
        Self::Modbus(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_at_9600_baud() {
        let timing = Timing::from_baud_rate(9600);
        assert_eq!(timing.char_time, Duration::from_nanos(1_145_833));
        assert_eq!(timing.char_timeout, Duration::from_nanos(1_718_749));
        assert_eq!(timing.frame_timeout, Duration::from_nanos(4_010_415));
    }

    #[test]
    fn timing_scales_with_baud_rate() {
        let slow = Timing::from_baud_rate(1200);
        let fast = Timing::from_baud_rate(19200);
        assert!(slow.frame_timeout > fast.frame_timeout);
        assert!(slow.char_timeout < slow.frame_timeout);
        assert_eq!(Timing::from_baud_rate(0), Timing::from_baud_rate(1));
    }

    #[test]
    fn config_builder() {
        let config = SerialConfig::default()
            .with_baud_rate(19200)
            .with_response_timeout(Duration::from_millis(500))
            .with_discard_echo(true);
        assert_eq!(config.baud_rate, 19200);
        assert_eq!(config.response_timeout, Duration::from_millis(500));
        assert!(config.discard_echo);
        assert_eq!(SerialConfig::default().response_timeout, Duration::from_secs(3));
    }

    #[test]
    fn error_source() {
        use std::{error::Error as _, string::ToString};

        let err = Error::from(io::Error::other("closed"));
        assert!(err.source().is_some());
        let err = Error::from(crate::Error::Parse(crate::FrameError::Crc));
        assert_eq!(err.to_string(), "Parse error: invalid CRC");
        assert!(Error::Timeout.source().is_none());
    }
}
