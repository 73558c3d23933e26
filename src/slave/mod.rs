// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slave (server) request processor.
//!
//! A [`Slave`] answers requests addressed to it from the data of its
//! [`DeviceProfile`]. Malformed or unserviceable requests are answered with
//! an exception frame and never stop the processor.

pub mod handlers;
mod profile;

pub use self::profile::*;

use core::fmt;

use crate::{
    buffer::{Buffer, Storage},
    error::{Error, FrameError},
    frame::*,
    registry::{Lookup, Registry},
    rtu::{self, DecodedFrame, Header, ResponseAdu, server},
};

/// Handler of a request addressed to the slave or broadcast.
pub type RequestHandler<'a, S> = fn(&mut Slave<'a, S>, DecodedFrame<'_>) -> Result<Processed, Error>;

/// Outcome of a successfully processed frame.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Processed {
    /// A response frame is ready, see [`Slave::response`].
    Response,
    /// An exception frame is ready, see [`Slave::response`].
    Exception {
        exception: Exception,
        reason: FrameError,
    },
    /// A broadcast was applied, nothing must be sent.
    Broadcast,
    /// The frame was addressed to another slave.
    Ignored,
}

fn builtin<'a, S: Storage>(code: FunctionCode) -> Option<RequestHandler<'a, S>> {
    use FunctionCode as f;

    let handler = match code {
        f::ReadCoils | f::ReadDiscreteInputs => handlers::read_bits as RequestHandler<'a, S>,
        f::ReadHoldingRegisters | f::ReadInputRegisters => handlers::read_registers as RequestHandler<'a, S>,
        f::WriteSingleCoil => handlers::write_single_coil as RequestHandler<'a, S>,
        f::WriteSingleRegister => handlers::write_single_register as RequestHandler<'a, S>,
        f::WriteMultipleCoils => handlers::write_multiple_coils as RequestHandler<'a, S>,
        f::WriteMultipleRegisters => handlers::write_multiple_registers as RequestHandler<'a, S>,
        f::MaskWriteRegister => handlers::mask_write_register as RequestHandler<'a, S>,
        f::Custom(_) => return None,
    };
    Some(handler)
}

pub struct Slave<'a, S: Storage> {
    address: SlaveId,
    profile: DeviceProfile<'a>,
    response: S::Bytes,
    handlers: Registry<RequestHandler<'a, S>>,
    last_exception: Option<Exception>,
    last_reason: Option<FrameError>,
}

impl<S: Storage> fmt::Debug for Slave<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slave")
            .field("address", &self.address)
            .field("profile", &self.profile)
            .field("response", &self.response)
            .field("overrides", &self.handlers)
            .field("last_exception", &self.last_exception)
            .field("last_reason", &self.last_reason)
            .finish()
    }
}

impl<'a, S: Storage> Slave<'a, S> {
    /// Create a slave answering to `address`.
    ///
    /// The broadcast address `0` is rejected with [`Error::Other`].
    pub fn new(address: SlaveId, profile: DeviceProfile<'a>) -> Result<Self, Error> {
        if address == BROADCAST {
            return Err(Error::Other);
        }
        Ok(Self {
            address,
            profile,
            response: S::Bytes::default(),
            handlers: Registry::new(builtin::<S>),
            last_exception: None,
            last_reason: None,
        })
    }

    #[must_use]
    pub const fn address(&self) -> SlaveId {
        self.address
    }

    #[must_use]
    pub const fn profile(&self) -> &DeviceProfile<'a> {
        &self.profile
    }

    pub const fn profile_mut(&mut self) -> &mut DeviceProfile<'a> {
        &mut self.profile
    }

    /// Override the request handler of `code`.
    ///
    /// `None` disables the function code, requests are answered with
    /// [`Exception::IllegalFunction`].
    pub fn set_handler(&mut self, code: u8, handler: Option<RequestHandler<'a, S>>) -> Result<(), Error> {
        self.handlers.set(code, handler)
    }

    /// Restore the built-in behavior of `code`.
    pub fn remove_handler(&mut self, code: u8) {
        self.handlers.remove(code);
    }

    /// The frame to send back, empty if there is none.
    #[must_use]
    pub fn response(&self) -> &[u8] {
        self.response.as_slice()
    }

    /// The exception of the last processed request.
    #[must_use]
    pub const fn last_exception(&self) -> Option<Exception> {
        self.last_exception
    }

    /// The specific reason of the last exception or parse error.
    #[must_use]
    pub const fn last_reason(&self) -> Option<FrameError> {
        self.last_reason
    }

    /// Process a complete request frame.
    pub fn process(&mut self, frame: &[u8]) -> Result<Processed, Error> {
        self.response.clear();
        self.last_exception = None;
        self.last_reason = None;
        log::trace!("RX frame: {frame:02X?}");

        let result = self.dispatch(frame);
        match &result {
            Ok(Processed::Ignored) => {}
            Ok(processed) => log::debug!("Processed request: {processed:?}"),
            Err(err) => {
                log::debug!("Failed to process request: {err}");
                self.last_reason = err.reason();
            }
        }
        result
    }

    fn dispatch(&mut self, frame: &[u8]) -> Result<Processed, Error> {
        let request = rtu::decode_frame(frame)?;
        if request.slave != self.address && !request.is_broadcast() {
            return Ok(Processed::Ignored);
        }
        match self.handlers.lookup(request.fn_code()) {
            Lookup::Handler(handler) => handler(self, request),
            Lookup::Disabled => self.throw(
                request,
                Exception::IllegalFunction,
                FrameError::DisabledFunction,
            ),
            Lookup::Unsupported => {
                self.throw(request, Exception::IllegalFunction, FrameError::NoFunction)
            }
        }
    }

    /// Answer `request` with an exception.
    ///
    /// Broadcasts are never answered, they fail with [`Error::Parse`].
    pub fn throw(
        &mut self,
        request: DecodedFrame<'_>,
        exception: Exception,
        reason: FrameError,
    ) -> Result<Processed, Error> {
        self.last_reason = Some(reason);
        if request.is_broadcast() {
            return Err(Error::Parse(reason));
        }
        self.last_exception = Some(exception);
        let pdu = ResponsePdu(Err(ExceptionResponse {
            address: self.address,
            function: FunctionCode::new(request.fn_code() & 0x7F),
            exception,
        }));
        self.encode(pdu)?;
        Ok(Processed::Exception { exception, reason })
    }

    /// Answer `request` with `response`.
    pub fn respond(&mut self, request: DecodedFrame<'_>, response: Response<'_>) -> Result<Processed, Error> {
        if request.is_broadcast() {
            return Ok(Processed::Broadcast);
        }
        self.encode(ResponsePdu(Ok(response)))?;
        Ok(Processed::Response)
    }

    fn encode(&mut self, pdu: ResponsePdu<'_>) -> Result<(), Error> {
        let adu = ResponseAdu {
            hdr: Header { slave: self.address },
            pdu,
        };
        let buf = self.response.alloc(server::response_len(&adu))?;
        server::encode_response(adu, buf)?;
        log::trace!("TX frame: {:02X?}", self.response.as_slice());
        Ok(())
    }
}
