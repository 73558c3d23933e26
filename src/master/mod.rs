// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Master (client) transaction engine.
//!
//! A [`Master`] builds one request frame at a time. Once the frame has been
//! transmitted and a response was received, [`Master::parse_response`]
//! verifies the response against the stored request.

mod response;

pub use self::response::*;

use core::fmt;

use crate::{
    buffer::{Buffer, Storage},
    error::{Error, FrameError},
    frame::*,
    registry::{Lookup, Registry},
    rtu::{self, DecodedFrame, Header, RequestAdu, client},
};

/// Handler that fills [`ResponseData`] from a verified transaction.
pub type ResponseHandler<S> = fn(&mut ResponseData<S>, &Transaction<'_>) -> Result<(), Error>;

/// Transaction state.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    #[default]
    Idle,
    /// A request frame is ready to be sent.
    Built,
    Ok,
    Exception,
    ParseError,
}

fn builtin<S: Storage>(code: FunctionCode) -> Option<ResponseHandler<S>> {
    code.target().map(|_| correlate::<S> as ResponseHandler<S>)
}

pub struct Master<S: Storage> {
    request: S::Bytes,
    expected_len: Option<usize>,
    data: ResponseData<S>,
    exception: Option<ExceptionResponse>,
    state: State,
    last_error: Option<Error>,
    handlers: Registry<ResponseHandler<S>>,
}

impl<S: Storage> fmt::Debug for Master<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Master")
            .field("request", &self.request)
            .field("state", &self.state)
            .field("data", &self.data)
            .field("exception", &self.exception)
            .field("last_error", &self.last_error)
            .field("overrides", &self.handlers)
            .finish()
    }
}

impl<S: Storage> Default for Master<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Storage> Master<S> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            request: S::Bytes::default(),
            expected_len: None,
            data: ResponseData::default(),
            exception: None,
            state: State::Idle,
            last_error: None,
            handlers: Registry::new(builtin::<S>),
        }
    }

    /// Override the response handler of `code`.
    ///
    /// `None` disables the function code.
    pub fn set_handler(&mut self, code: u8, handler: Option<ResponseHandler<S>>) -> Result<(), Error> {
        self.handlers.set(code, handler)
    }

    /// Restore the built-in behavior of `code`.
    pub fn remove_handler(&mut self, code: u8) {
        self.handlers.remove(code);
    }

    #[must_use]
    pub const fn state(&self) -> State {
        self.state
    }

    /// The current request frame, empty if none was built.
    #[must_use]
    pub fn request(&self) -> &[u8] {
        self.request.as_slice()
    }

    /// Length of the response frame the current request asks for.
    ///
    /// Returns `None` if no request is built or if no response is expected.
    #[must_use]
    pub const fn expected_response_len(&self) -> Option<usize> {
        self.expected_len
    }

    /// The exception of the last parsed response.
    #[must_use]
    pub const fn exception(&self) -> Option<ExceptionResponse> {
        self.exception
    }

    /// The error of the last build or parse operation.
    #[must_use]
    pub const fn last_error(&self) -> Option<Error> {
        self.last_error
    }

    /// Values of the last successfully parsed response.
    #[must_use]
    pub fn decoded(&self) -> Option<Decoded<'_>> {
        (self.state == State::Ok).then(|| self.data.decoded())
    }

    pub fn read_coils(&mut self, slave: SlaveId, index: Address, count: Quantity) -> Result<&[u8], Error> {
        self.build(slave, Request::ReadCoils(index, count))
    }

    pub fn read_discrete_inputs(
        &mut self,
        slave: SlaveId,
        index: Address,
        count: Quantity,
    ) -> Result<&[u8], Error> {
        self.build(slave, Request::ReadDiscreteInputs(index, count))
    }

    pub fn read_holding_registers(
        &mut self,
        slave: SlaveId,
        index: Address,
        count: Quantity,
    ) -> Result<&[u8], Error> {
        self.build(slave, Request::ReadHoldingRegisters(index, count))
    }

    pub fn read_input_registers(
        &mut self,
        slave: SlaveId,
        index: Address,
        count: Quantity,
    ) -> Result<&[u8], Error> {
        self.build(slave, Request::ReadInputRegisters(index, count))
    }

    pub fn write_single_coil(&mut self, slave: SlaveId, index: Address, value: Coil) -> Result<&[u8], Error> {
        self.build(slave, Request::WriteSingleCoil(index, value))
    }

    pub fn write_single_register(&mut self, slave: SlaveId, index: Address, value: Word) -> Result<&[u8], Error> {
        self.build(slave, Request::WriteSingleRegister(index, value))
    }

    pub fn write_multiple_coils(&mut self, slave: SlaveId, index: Address, values: &[Coil]) -> Result<&[u8], Error> {
        if values.is_empty() || values.len() > MAX_WRITE_BITS {
            return Err(self.build_failed(Error::Build(FrameError::Count)));
        }
        let mut packed = [0u8; MAX_BYTE_COUNT];
        let coils = match Coils::from_bools(values, &mut packed) {
            Ok(coils) => coils,
            Err(err) => return Err(self.build_failed(err)),
        };
        self.build(slave, Request::WriteMultipleCoils(index, coils))
    }

    pub fn write_multiple_registers(
        &mut self,
        slave: SlaveId,
        index: Address,
        values: &[Word],
    ) -> Result<&[u8], Error> {
        if values.is_empty() || values.len() > MAX_WRITE_REGISTERS {
            return Err(self.build_failed(Error::Build(FrameError::Count)));
        }
        let mut encoded = [0u8; MAX_BYTE_COUNT];
        let words = match Data::from_words(values, &mut encoded) {
            Ok(words) => words,
            Err(err) => return Err(self.build_failed(err)),
        };
        self.build(slave, Request::WriteMultipleRegisters(index, words))
    }

    /// Build a mask write request.
    ///
    /// The slave stores `(value & and_mask) | (or_mask & !and_mask)`.
    pub fn mask_write_register(
        &mut self,
        slave: SlaveId,
        index: Address,
        and_mask: Word,
        or_mask: Word,
    ) -> Result<&[u8], Error> {
        self.build(slave, Request::MaskWriteRegister(index, and_mask, or_mask))
    }

    fn build(&mut self, slave: SlaveId, request: Request<'_>) -> Result<&[u8], Error> {
        self.discard();
        let adu = RequestAdu {
            hdr: Header { slave },
            pdu: RequestPdu(request),
        };
        if let Err(err) = encode_into(&mut self.request, adu) {
            return Err(self.build_failed(err));
        }
        self.expected_len = if adu.hdr.is_broadcast() {
            None
        } else {
            request.response_pdu_len().map(|len| len + rtu::ADU_OVERHEAD)
        };
        self.state = State::Built;
        log::trace!("TX frame built: {:02X?}", self.request.as_slice());
        Ok(self.request.as_slice())
    }

    fn discard(&mut self) {
        self.request.clear();
        self.expected_len = None;
        self.data.reset();
        self.exception = None;
        self.last_error = None;
        self.state = State::Idle;
    }

    fn build_failed(&mut self, err: Error) -> Error {
        self.discard();
        log::debug!("Failed to build request: {err}");
        self.last_error = Some(err);
        err
    }

    /// Verify `response` against the stored request.
    ///
    /// The request frame is kept so that it can be sent again.
    pub fn parse_response(&mut self, response: &[u8]) -> Result<Decoded<'_>, Error> {
        self.data.reset();
        self.exception = None;
        self.last_error = None;
        log::trace!("RX frame: {response:02X?}");
        match self.parse(response) {
            Ok(()) => {
                self.state = State::Ok;
                let decoded = self.data.decoded();
                log::debug!(
                    "Response from slave {}: function {}, index {}, count {}",
                    decoded.address,
                    decoded.function,
                    decoded.index,
                    decoded.count
                );
                Ok(decoded)
            }
            Err(err) => {
                self.state = if matches!(err, Error::Exception(_)) {
                    State::Exception
                } else {
                    State::ParseError
                };
                log::debug!("Failed to parse response: {err}");
                self.last_error = Some(err);
                Err(err)
            }
        }
    }

    fn parse(&mut self, response: &[u8]) -> Result<(), Error> {
        let request = self.request.as_slice();
        if request.is_empty() {
            return Err(Error::NullArgument);
        }
        if request.len() < rtu::MIN_FRAME_LEN || response.len() < rtu::MIN_FRAME_LEN {
            return Err(Error::Parse(FrameError::Length));
        }
        let tx = Transaction {
            request: rtu::decode_frame(request)?,
            response: rtu::decode_frame(response)?,
        };
        let code = tx.response.fn_code();
        let lookup = self.handlers.lookup(code);
        if code & 0x80 != 0 && matches!(lookup, Lookup::Unsupported) {
            let ex = decode_exception(&tx)?;
            self.exception = Some(ex);
            return Err(Error::Exception(ex));
        }
        match lookup {
            Lookup::Handler(handler) => handler(&mut self.data, &tx),
            Lookup::Disabled => Err(Error::Parse(FrameError::DisabledFunction)),
            Lookup::Unsupported => Err(Error::Parse(FrameError::NoFunction)),
        }
    }
}

fn encode_into<B: Buffer<u8>>(buf: &mut B, adu: RequestAdu<'_>) -> Result<usize, Error> {
    client::validate_request(&adu)?;
    let frame = buf.alloc(client::request_len(&adu))?;
    client::encode_request(adu, frame)
}

fn decode_exception(tx: &Transaction<'_>) -> Result<ExceptionResponse, Error> {
    let DecodedFrame { slave, pdu } = tx.response;
    if pdu.len() != 2 {
        return Err(Error::Parse(FrameError::Length));
    }
    let ex = ExceptionResponse::decode(slave, pdu)?;
    if slave == BROADCAST {
        return Err(Error::Parse(FrameError::Broadcast));
    }
    if slave != tx.request.slave {
        return Err(Error::Parse(FrameError::MismatchAddress));
    }
    if ex.function.value() != tx.request.fn_code() {
        return Err(Error::Parse(FrameError::MismatchFunction));
    }
    Ok(ex)
}
