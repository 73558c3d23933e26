// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{io, vec::Vec};

use super::{Direction, Error, Link, NoDirection};
use crate::{
    buffer::{Dynamic, Storage},
    frame::{Address, Quantity, SlaveId, Word},
    master::{Decoded, Master, Values},
};

/// A master driving transactions over a [`Link`].
#[derive(Debug)]
pub struct Client<W, D = NoDirection, S: Storage = Dynamic> {
    link: Link<W, D>,
    master: Master<S>,
}

impl<W: io::Write, D: Direction, S: Storage> Client<W, D, S> {
    pub const fn new(link: Link<W, D>, master: Master<S>) -> Self {
        Self { link, master }
    }

    #[must_use]
    pub const fn master(&self) -> &Master<S> {
        &self.master
    }

    pub const fn link_mut(&mut self) -> &mut Link<W, D> {
        &mut self.link
    }

    /// Run one transaction.
    ///
    /// `build` prepares the request, e.g.
    /// `|m| m.read_coils(0x01, 0x0000, 8)`. Broadcasts are transmitted
    /// without waiting for a response and yield `None`.
    pub fn execute<F>(&mut self, build: F) -> Result<Option<Decoded<'_>>, Error>
    where
        F: FnOnce(&mut Master<S>) -> Result<&[u8], crate::Error>,
    {
        let request = build(&mut self.master)?;
        self.link.send(request)?;
        if self.master.expected_response_len().is_none() {
            return Ok(None);
        }
        let response = self.link.receive()?;
        let decoded = self.master.parse_response(&response)?;
        Ok(Some(decoded))
    }

    /// Read `count` holding registers of `unit` starting at `start`.
    pub fn read(&mut self, unit: SlaveId, start: Address, count: Quantity) -> Result<Vec<Word>, Error> {
        let decoded = self.execute(|m| m.read_holding_registers(unit, start, count))?;
        match decoded.map(|decoded| decoded.values) {
            Some(Values::Registers(words)) => Ok(words.to_vec()),
            _ => Err(Error::Modbus(crate::Error::Other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread, time::Duration};

    use super::*;
    use crate::{FrameError, buffer::Static, transport::SerialConfig};

    fn client() -> (Client<Vec<u8>, NoDirection, Static<256>>, crate::transport::RxHandle) {
        let config = SerialConfig::new(9600).with_response_timeout(Duration::from_millis(500));
        let (link, rx) = Link::new(Vec::new(), NoDirection, config);
        (Client::new(link, Master::new()), rx)
    }

    #[test]
    fn broadcast_does_not_wait() {
        let (mut client, _rx) = client();
        let decoded = client.execute(|m| m.write_single_register(0x00, 0x0001, 0xABCD)).unwrap();
        assert!(decoded.is_none());
        assert_eq!(client.link_mut().port().len(), 8);
    }

    #[test]
    fn read_registers() {
        let (mut client, rx) = client();
        let rx = Arc::new(rx);
        let responder = {
            let rx = Arc::clone(&rx);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(100));
                rx.push_bytes(&[
                    0x20, // slave address
                    0x03, // function code
                    0x04, // byte count
                    0xDE, 0xAD, // register 0
                    0xFA, 0xCE, // register 1
                    0xA3, 0xCC, // crc
                ]);
            })
        };
        let words = client.read(0x20, 0x0000, 2);
        responder.join().unwrap();
        assert_eq!(words.unwrap(), [0xDEAD, 0xFACE]);
    }

    #[test]
    fn timeout_is_reported() {
        let (mut client, _rx) = client();
        assert!(matches!(client.read(0x20, 0x0000, 2), Err(Error::Timeout)));
    }

    #[test]
    fn build_errors_are_reported() {
        let (mut client, _rx) = client();
        assert!(matches!(
            client.read(0x00, 0x0000, 2),
            Err(Error::Modbus(crate::Error::Build(FrameError::Broadcast)))
        ));
        assert!(matches!(
            client.read(0x20, 0x0000, 126),
            Err(Error::Modbus(crate::Error::Build(FrameError::Count)))
        ));
    }
}
