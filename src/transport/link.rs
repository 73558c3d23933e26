// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{
    io,
    sync::Arc,
    thread,
    time::Instant,
    vec::Vec,
};

use super::{Error, RxHandle, SerialConfig, Timing, framer::Shared};
use crate::{
    buffer::Storage,
    slave::{Processed, Slave},
};

/// Control of a half-duplex transceiver.
pub trait Direction {
    /// Switch the line driver to transmit (`true`) or receive (`false`).
    fn set_transmit(&mut self, transmit: bool);
}

/// Full-duplex line without direction control.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDirection;

impl Direction for NoDirection {
    fn set_transmit(&mut self, _transmit: bool) {}
}

impl<F: FnMut(bool)> Direction for F {
    fn set_transmit(&mut self, transmit: bool) {
        self(transmit);
    }
}

/// A serial line carrying RTU frames.
#[derive(Debug)]
pub struct Link<W, D = NoDirection> {
    port: W,
    direction: D,
    config: SerialConfig,
    timing: Timing,
    shared: Arc<Shared>,
}

impl<W: io::Write, D: Direction> Link<W, D> {
    /// Create a link transmitting to `port`.
    ///
    /// Received bytes must be pushed into the returned [`RxHandle`].
    pub fn new(port: W, direction: D, config: SerialConfig) -> (Self, RxHandle) {
        let timing = config.timing();
        let shared = Shared::new(timing);
        let rx = RxHandle::new(Arc::clone(&shared));
        let link = Self {
            port,
            direction,
            config,
            timing,
            shared,
        };
        (link, rx)
    }

    #[must_use]
    pub const fn port(&self) -> &W {
        &self.port
    }

    pub const fn port_mut(&mut self) -> &mut W {
        &mut self.port
    }

    #[must_use]
    pub const fn config(&self) -> &SerialConfig {
        &self.config
    }

    #[must_use]
    pub const fn timing(&self) -> Timing {
        self.timing
    }

    /// Transmit a frame.
    ///
    /// Stale received bytes are discarded first.
    pub fn send(&mut self, frame: &[u8]) -> Result<(), Error> {
        {
            let mut framer = self.shared.framer.lock();
            framer.clear();
            if self.config.discard_echo {
                framer.skip(frame.len());
            }
        }
        log::trace!("TX: {frame:02X?}");
        self.direction.set_transmit(true);
        let result = self.write_frame(frame);
        self.direction.set_transmit(false);
        result.map_err(Error::Io)
    }

    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        for (i, byte) in frame.iter().enumerate() {
            if i > 0 {
                thread::sleep(self.timing.char_timeout);
            }
            self.port.write_all(core::slice::from_ref(byte))?;
        }
        self.port.flush()
    }

    /// Wait for a complete frame.
    ///
    /// Fails with [`Error::Timeout`] if no frame was completed within the
    /// response timeout.
    pub fn receive(&mut self) -> Result<Vec<u8>, Error> {
        let deadline = Instant::now() + self.config.response_timeout;
        let frame = self.shared.wait_frame(deadline).inspect_err(|err| {
            log::warn!("Failed to receive frame: {err}");
        })?;
        log::trace!("RX: {frame:02X?}");
        Ok(frame)
    }

    /// Transmit `request` and wait for the response frame.
    pub fn transact(&mut self, request: &[u8]) -> Result<Vec<u8>, Error> {
        self.send(request)?;
        self.receive()
    }

    /// Wait for one request and answer it with `slave`.
    pub fn serve<S: Storage>(&mut self, slave: &mut Slave<'_, S>) -> Result<Processed, Error> {
        let frame = self.receive()?;
        let processed = slave.process(&frame)?;
        if !slave.response().is_empty() {
            self.send(slave.response())?;
        }
        Ok(processed)
    }
}

/// Pump bytes from `reader` into `rx` on a new thread.
///
/// The thread ends when the reader reaches end of file or fails.
/// Read timeouts are ignored.
pub fn spawn_reader<R>(mut reader: R, rx: RxHandle) -> thread::JoinHandle<io::Result<()>>
where
    R: io::Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = [0; 64];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(n) => rx.push_bytes(&buf[..n]),
                Err(err)
                    if matches!(
                        err.kind(),
                        io::ErrorKind::Interrupted | io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
                    ) => {}
                Err(err) => {
                    log::warn!("Serial reader stopped: {err}");
                    return Err(err);
                }
            }
        }
    })
}
