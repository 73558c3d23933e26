// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{error::*, frame::*, util::*};
use byteorder::{BigEndian, ByteOrder};
use core::convert::TryFrom;

pub mod rtu;

type Result<T> = core::result::Result<T, Error>;

const fn parse_err<T>(reason: FrameError) -> Result<T> {
    Err(Error::Parse(reason))
}

const fn expect_len(bytes: &[u8], len: usize) -> Result<()> {
    if bytes.len() != len {
        return parse_err(FrameError::Length);
    }
    Ok(())
}

const fn check_quantity(quantity: usize, max: usize) -> core::result::Result<(), FrameError> {
    if quantity == 0 || quantity > max {
        return Err(FrameError::Count);
    }
    Ok(())
}

impl TryFrom<u8> for Exception {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        use crate::frame::Exception::*;
        let ex = match code {
            0x01 => IllegalFunction,
            0x02 => IllegalDataAddress,
            0x03 => IllegalDataValue,
            0x04 => SlaveDeviceFailure,
            0x05 => Acknowledge,
            0x06 => SlaveDeviceBusy,
            0x07 => NegativeAcknowledge,
            0x08 => MemoryParityError,
            0x0A => GatewayPathUnavailable,
            0x0B => GatewayTargetDevice,
            _ => {
                return parse_err(FrameError::Value);
            }
        };
        Ok(ex)
    }
}

impl From<ExceptionResponse> for [u8; 2] {
    fn from(ex: ExceptionResponse) -> [u8; 2] {
        let fn_code: u8 = ex.function.value();
        debug_assert!(fn_code < 0x80);
        [fn_code | 0x80, ex.exception as u8]
    }
}

impl ExceptionResponse {
    /// Decode an exception PDU received from `address`.
    pub fn decode(address: SlaveId, bytes: &[u8]) -> Result<Self> {
        expect_len(bytes, 2)?;
        let fn_err_code = bytes[0];
        if fn_err_code < 0x80 {
            return parse_err(FrameError::BadFunction);
        }
        let function = FunctionCode::new(fn_err_code & 0x7F);
        let exception = Exception::try_from(bytes[1])?;
        Ok(ExceptionResponse {
            address,
            function,
            exception,
        })
    }
}

impl Request<'_> {
    /// Check the per-function quantity limits.
    pub fn validate(&self) -> core::result::Result<(), FrameError> {
        use crate::frame::Request::*;

        match *self {
            ReadCoils(_, cnt) | ReadDiscreteInputs(_, cnt) => {
                check_quantity(cnt as usize, MAX_READ_BITS)
            }
            ReadInputRegisters(_, cnt) | ReadHoldingRegisters(_, cnt) => {
                check_quantity(cnt as usize, MAX_READ_REGISTERS)
            }
            WriteMultipleCoils(_, coils) => check_quantity(coils.len(), MAX_WRITE_BITS),
            WriteMultipleRegisters(_, words) => check_quantity(words.len(), MAX_WRITE_REGISTERS),
            WriteSingleCoil(_, _) | WriteSingleRegister(_, _) | MaskWriteRegister(_, _, _) => {
                Ok(())
            }
            Custom(code, _) if code.value() >= 0x80 => Err(FrameError::BadFunction),
            Custom(_, _) => Ok(()),
        }
    }

    /// Encode the PDU into `buf`.
    ///
    /// Returns the number of bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        use crate::frame::Request::*;

        self.validate().map_err(Error::Build)?;
        let len = self.pdu_len();
        if buf.len() < len {
            return Err(Error::Alloc);
        }
        buf[0] = FunctionCode::from(*self).value();
        match *self {
            ReadCoils(address, payload)
            | ReadDiscreteInputs(address, payload)
            | ReadInputRegisters(address, payload)
            | ReadHoldingRegisters(address, payload)
            | WriteSingleRegister(address, payload) => {
                BigEndian::write_u16(&mut buf[1..], address);
                BigEndian::write_u16(&mut buf[3..], payload);
            }
            WriteSingleCoil(address, state) => {
                BigEndian::write_u16(&mut buf[1..], address);
                BigEndian::write_u16(&mut buf[3..], bool_to_u16_coil(state));
            }
            WriteMultipleCoils(address, coils) => {
                BigEndian::write_u16(&mut buf[1..], address);
                BigEndian::write_u16(&mut buf[3..], coils.len() as u16);
                let packed = coils.packed();
                buf[5] = packed.len() as u8;
                buf[6..6 + packed.len()].copy_from_slice(packed);
            }
            WriteMultipleRegisters(address, words) => {
                BigEndian::write_u16(&mut buf[1..], address);
                BigEndian::write_u16(&mut buf[3..], words.len() as u16);
                buf[5] = (words.len() * 2) as u8;
                words.copy_to(&mut buf[6..]);
            }
            MaskWriteRegister(address, and_mask, or_mask) => {
                BigEndian::write_u16(&mut buf[1..], address);
                BigEndian::write_u16(&mut buf[3..], and_mask);
                BigEndian::write_u16(&mut buf[5..], or_mask);
            }
            Custom(_, data) => {
                buf[1..len].copy_from_slice(data);
            }
        }
        Ok(len)
    }
}

impl Response<'_> {
    /// Encode the PDU into `buf`.
    ///
    /// Returns the number of bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        use crate::frame::Response::*;

        match *self {
            ReadCoils(coils) | ReadDiscreteInputs(coils) if coils.packed_len() > MAX_BYTE_COUNT => {
                return Err(Error::Build(FrameError::Count));
            }
            ReadInputRegisters(words) | ReadHoldingRegisters(words)
                if words.len() * 2 > MAX_BYTE_COUNT =>
            {
                return Err(Error::Build(FrameError::Count));
            }
            _ => {}
        }
        let len = self.pdu_len();
        if buf.len() < len {
            return Err(Error::Alloc);
        }
        buf[0] = FunctionCode::from(*self).value();
        match *self {
            ReadCoils(coils) | ReadDiscreteInputs(coils) => {
                let packed = coils.packed();
                buf[1] = packed.len() as u8;
                buf[2..len].copy_from_slice(packed);
            }
            ReadInputRegisters(words) | ReadHoldingRegisters(words) => {
                buf[1] = (words.len() * 2) as u8;
                words.copy_to(&mut buf[2..]);
            }
            WriteSingleCoil(address, state) => {
                BigEndian::write_u16(&mut buf[1..], address);
                BigEndian::write_u16(&mut buf[3..], bool_to_u16_coil(state));
            }
            WriteMultipleCoils(address, payload)
            | WriteSingleRegister(address, payload)
            | WriteMultipleRegisters(address, payload) => {
                BigEndian::write_u16(&mut buf[1..], address);
                BigEndian::write_u16(&mut buf[3..], payload);
            }
            MaskWriteRegister(address, and_mask, or_mask) => {
                BigEndian::write_u16(&mut buf[1..], address);
                BigEndian::write_u16(&mut buf[3..], and_mask);
                BigEndian::write_u16(&mut buf[5..], or_mask);
            }
            Custom(_, data) => {
                buf[1..len].copy_from_slice(data);
            }
        }
        Ok(len)
    }
}

impl ResponsePdu<'_> {
    /// Encode the PDU into `buf`.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        match self.0 {
            Ok(rsp) => rsp.encode(buf),
            Err(ex) => {
                if buf.len() < 2 {
                    return Err(Error::Alloc);
                }
                let bytes: [u8; 2] = ex.into();
                buf[..2].copy_from_slice(&bytes);
                Ok(2)
            }
        }
    }

    /// Number of bytes required for a serialized PDU frame.
    #[must_use]
    pub const fn pdu_len(&self) -> usize {
        match &self.0 {
            Ok(rsp) => rsp.pdu_len(),
            Err(_) => 2,
        }
    }
}

impl<'r> TryFrom<&'r [u8]> for Request<'r> {
    type Error = Error;

    fn try_from(bytes: &'r [u8]) -> Result<Self> {
        use crate::frame::Request::*;
        use FunctionCode as f;

        let Some(&fn_code) = bytes.first() else {
            return parse_err(FrameError::Length);
        };

        let req = match FunctionCode::new(fn_code) {
            f::ReadCoils
            | f::ReadDiscreteInputs
            | f::ReadInputRegisters
            | f::ReadHoldingRegisters
            | f::WriteSingleRegister => {
                expect_len(bytes, 5)?;
                let addr = BigEndian::read_u16(&bytes[1..3]);
                let quantity = BigEndian::read_u16(&bytes[3..5]);

                let req = match FunctionCode::new(fn_code) {
                    f::ReadCoils => ReadCoils(addr, quantity),
                    f::ReadDiscreteInputs => ReadDiscreteInputs(addr, quantity),
                    f::ReadInputRegisters => ReadInputRegisters(addr, quantity),
                    f::ReadHoldingRegisters => ReadHoldingRegisters(addr, quantity),
                    _ => WriteSingleRegister(addr, quantity),
                };
                req.validate().map_err(Error::Parse)?;
                req
            }
            f::WriteSingleCoil => {
                expect_len(bytes, 5)?;
                WriteSingleCoil(
                    BigEndian::read_u16(&bytes[1..3]),
                    u16_coil_to_bool(BigEndian::read_u16(&bytes[3..5]))?,
                )
            }
            f::WriteMultipleCoils => {
                if bytes.len() < 6 {
                    return parse_err(FrameError::Length);
                }
                let address = BigEndian::read_u16(&bytes[1..3]);
                let quantity = BigEndian::read_u16(&bytes[3..5]) as usize;
                let byte_count = bytes[5] as usize;
                expect_len(bytes, 6 + byte_count)?;
                if byte_count == 0 || packed_coils_len(quantity) != byte_count {
                    return parse_err(FrameError::Count);
                }
                check_quantity(quantity, MAX_WRITE_BITS).map_err(Error::Parse)?;
                let coils = Coils {
                    quantity,
                    data: &bytes[6..],
                };
                WriteMultipleCoils(address, coils)
            }
            f::WriteMultipleRegisters => {
                if bytes.len() < 6 {
                    return parse_err(FrameError::Length);
                }
                let address = BigEndian::read_u16(&bytes[1..3]);
                let quantity = BigEndian::read_u16(&bytes[3..5]) as usize;
                let byte_count = bytes[5] as usize;
                expect_len(bytes, 6 + byte_count)?;
                if byte_count == 0 || quantity * 2 != byte_count {
                    return parse_err(FrameError::Count);
                }
                check_quantity(quantity, MAX_WRITE_REGISTERS).map_err(Error::Parse)?;
                let data = Data {
                    quantity,
                    data: &bytes[6..],
                };
                WriteMultipleRegisters(address, data)
            }
            f::MaskWriteRegister => {
                expect_len(bytes, 7)?;
                MaskWriteRegister(
                    BigEndian::read_u16(&bytes[1..3]),
                    BigEndian::read_u16(&bytes[3..5]),
                    BigEndian::read_u16(&bytes[5..7]),
                )
            }
            f::Custom(code) if code < 0x80 => Custom(FunctionCode::Custom(code), &bytes[1..]),
            f::Custom(_) => return parse_err(FrameError::NoFunction),
        };
        Ok(req)
    }
}

impl<'r> TryFrom<&'r [u8]> for Response<'r> {
    type Error = Error;

    fn try_from(bytes: &'r [u8]) -> Result<Self> {
        use crate::frame::Response::*;
        use FunctionCode as f;

        let Some(&fn_code) = bytes.first() else {
            return parse_err(FrameError::Length);
        };
        let rsp = match FunctionCode::new(fn_code) {
            f::ReadCoils | f::ReadDiscreteInputs => {
                let data = read_payload(bytes)?;
                // Here we have not information about the exact requested quantity
                // therefore we just assume that the whole byte is meant.
                let coils = Coils {
                    quantity: data.len() * 8,
                    data,
                };
                if fn_code == f::ReadCoils.value() {
                    ReadCoils(coils)
                } else {
                    ReadDiscreteInputs(coils)
                }
            }
            f::ReadInputRegisters | f::ReadHoldingRegisters => {
                let data = read_payload(bytes)?;
                if data.len() % 2 != 0 {
                    return parse_err(FrameError::Length);
                }
                let data = Data {
                    quantity: data.len() / 2,
                    data,
                };
                if fn_code == f::ReadHoldingRegisters.value() {
                    ReadHoldingRegisters(data)
                } else {
                    ReadInputRegisters(data)
                }
            }
            f::WriteSingleCoil => {
                expect_len(bytes, 5)?;
                WriteSingleCoil(
                    BigEndian::read_u16(&bytes[1..]),
                    u16_coil_to_bool(BigEndian::read_u16(&bytes[3..]))?,
                )
            }
            f::WriteMultipleCoils | f::WriteSingleRegister | f::WriteMultipleRegisters => {
                expect_len(bytes, 5)?;
                let addr = BigEndian::read_u16(&bytes[1..]);
                let payload = BigEndian::read_u16(&bytes[3..]);
                match FunctionCode::new(fn_code) {
                    f::WriteMultipleCoils => WriteMultipleCoils(addr, payload),
                    f::WriteSingleRegister => WriteSingleRegister(addr, payload),
                    _ => WriteMultipleRegisters(addr, payload),
                }
            }
            f::MaskWriteRegister => {
                expect_len(bytes, 7)?;
                MaskWriteRegister(
                    BigEndian::read_u16(&bytes[1..]),
                    BigEndian::read_u16(&bytes[3..]),
                    BigEndian::read_u16(&bytes[5..]),
                )
            }
            f::Custom(code) if code < 0x80 => Custom(FunctionCode::Custom(code), &bytes[1..]),
            f::Custom(_) => return parse_err(FrameError::NoFunction),
        };
        Ok(rsp)
    }
}

/// The data bytes of a read response: `[fn][byte count][data]`.
fn read_payload(bytes: &[u8]) -> Result<&[u8]> {
    if bytes.len() < 2 {
        return parse_err(FrameError::Length);
    }
    let byte_count = bytes[1] as usize;
    if byte_count == 0 || byte_count > MAX_BYTE_COUNT {
        return parse_err(FrameError::Length);
    }
    expect_len(bytes, 2 + byte_count)?;
    Ok(&bytes[2..])
}
