// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in request handlers.
//!
//! Every handler validates the request in the same order: frame content,
//! data source, address range and finally access rights. Writes are only
//! applied once the whole request is valid.

use super::{DeviceProfile, Processed, Slave};
use crate::{
    buffer::Storage,
    error::{Error, FrameError},
    frame::*,
    rtu::DecodedFrame,
    util::{packed_coils_len, set_bit},
};

/// An exception together with its specific reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rejection {
    exception: Exception,
    reason: FrameError,
}

impl Rejection {
    const fn new(exception: Exception, reason: FrameError) -> Self {
        Self { exception, reason }
    }

    /// A request that could not be decoded.
    fn invalid(err: Error) -> Self {
        let reason = err.reason().unwrap_or(FrameError::Value);
        Self::new(Exception::IllegalDataValue, reason)
    }

    const fn bad_function() -> Self {
        Self::new(Exception::IllegalFunction, FrameError::BadFunction)
    }
}

fn decode(pdu: &[u8]) -> Result<Request<'_>, Rejection> {
    Request::try_from(pdu).map_err(Rejection::invalid)
}

fn validate(
    profile: &mut DeviceProfile<'_>,
    data_type: DataType,
    access: Access,
    index: Address,
    count: usize,
) -> Result<(), Rejection> {
    profile
        .check_range(data_type, index, count)
        .map_err(|reason| Rejection::new(Exception::IllegalDataAddress, reason))?;
    profile
        .check_access(data_type, access, index, count)
        .map_err(|reason| Rejection::new(Exception::SlaveDeviceFailure, reason))
}

fn reply<S: Storage>(
    slave: &mut Slave<'_, S>,
    request: DecodedFrame<'_>,
    result: Result<Response<'_>, Rejection>,
) -> Result<Processed, Error> {
    match result {
        Ok(response) => slave.respond(request, response),
        Err(Rejection { exception, reason }) => slave.throw(request, exception, reason),
    }
}

/// Read coils (`0x01`) or discrete inputs (`0x02`).
pub fn read_bits<S: Storage>(slave: &mut Slave<'_, S>, request: DecodedFrame<'_>) -> Result<Processed, Error> {
    if request.is_broadcast() {
        return Err(Error::Parse(FrameError::Broadcast));
    }
    let mut packed = [0u8; MAX_BYTE_COUNT];
    let result = read_bits_into(&mut slave.profile, request.pdu, &mut packed);
    reply(slave, request, result)
}

fn read_bits_into<'b>(
    profile: &mut DeviceProfile<'_>,
    pdu: &[u8],
    packed: &'b mut [u8],
) -> Result<Response<'b>, Rejection> {
    let (data_type, index, count) = match decode(pdu)? {
        Request::ReadCoils(index, count) => (DataType::Coil, index, count),
        Request::ReadDiscreteInputs(index, count) => (DataType::DiscreteInput, index, count),
        _ => return Err(Rejection::bad_function()),
    };
    validate(profile, data_type, Access::Read, index, count as usize)?;

    let len = packed_coils_len(count as usize);
    packed[..len].fill(0);
    for offset in 0..count {
        let value = profile.read(data_type, index + offset).map_err(slave_failure)?;
        set_bit(packed, offset as usize, value != 0).map_err(|_| slave_failure(FrameError::Count))?;
    }
    let coils = Coils::new(&packed[..len], count as usize).map_err(|_| slave_failure(FrameError::Count))?;
    Ok(match data_type {
        DataType::Coil => Response::ReadCoils(coils),
        _ => Response::ReadDiscreteInputs(coils),
    })
}

/// Read holding registers (`0x03`) or input registers (`0x04`).
pub fn read_registers<S: Storage>(
    slave: &mut Slave<'_, S>,
    request: DecodedFrame<'_>,
) -> Result<Processed, Error> {
    if request.is_broadcast() {
        return Err(Error::Parse(FrameError::Broadcast));
    }
    let mut encoded = [0u8; MAX_BYTE_COUNT];
    let result = read_registers_into(&mut slave.profile, request.pdu, &mut encoded);
    reply(slave, request, result)
}

fn read_registers_into<'b>(
    profile: &mut DeviceProfile<'_>,
    pdu: &[u8],
    encoded: &'b mut [u8],
) -> Result<Response<'b>, Rejection> {
    let (data_type, index, count) = match decode(pdu)? {
        Request::ReadHoldingRegisters(index, count) => (DataType::HoldingRegister, index, count),
        Request::ReadInputRegisters(index, count) => (DataType::InputRegister, index, count),
        _ => return Err(Rejection::bad_function()),
    };
    validate(profile, data_type, Access::Read, index, count as usize)?;

    let mut words = [0u16; MAX_READ_REGISTERS];
    let words = &mut words[..count as usize];
    for (offset, word) in (0..count).zip(words.iter_mut()) {
        *word = profile.read(data_type, index + offset).map_err(slave_failure)?;
    }
    let data = Data::from_words(words, encoded).map_err(|_| slave_failure(FrameError::Count))?;
    Ok(match data_type {
        DataType::HoldingRegister => Response::ReadHoldingRegisters(data),
        _ => Response::ReadInputRegisters(data),
    })
}

/// Write single coil (`0x05`).
pub fn write_single_coil<S: Storage>(
    slave: &mut Slave<'_, S>,
    request: DecodedFrame<'_>,
) -> Result<Processed, Error> {
    let result = apply_single_coil(&mut slave.profile, request.pdu);
    reply(slave, request, result)
}

fn apply_single_coil(profile: &mut DeviceProfile<'_>, pdu: &[u8]) -> Result<Response<'static>, Rejection> {
    let Request::WriteSingleCoil(index, value) = decode(pdu)? else {
        return Err(Rejection::bad_function());
    };
    validate(profile, DataType::Coil, Access::Write, index, 1)?;
    profile
        .write(DataType::Coil, index, Word::from(value))
        .map_err(slave_failure)?;
    Ok(Response::WriteSingleCoil(index, value))
}

/// Write single register (`0x06`).
pub fn write_single_register<S: Storage>(
    slave: &mut Slave<'_, S>,
    request: DecodedFrame<'_>,
) -> Result<Processed, Error> {
    let result = apply_single_register(&mut slave.profile, request.pdu);
    reply(slave, request, result)
}

fn apply_single_register(profile: &mut DeviceProfile<'_>, pdu: &[u8]) -> Result<Response<'static>, Rejection> {
    let Request::WriteSingleRegister(index, value) = decode(pdu)? else {
        return Err(Rejection::bad_function());
    };
    validate(profile, DataType::HoldingRegister, Access::Write, index, 1)?;
    profile
        .write(DataType::HoldingRegister, index, value)
        .map_err(slave_failure)?;
    Ok(Response::WriteSingleRegister(index, value))
}

/// Write multiple coils (`0x0F`).
pub fn write_multiple_coils<S: Storage>(
    slave: &mut Slave<'_, S>,
    request: DecodedFrame<'_>,
) -> Result<Processed, Error> {
    let result = apply_multiple_coils(&mut slave.profile, request.pdu);
    reply(slave, request, result)
}

fn apply_multiple_coils(profile: &mut DeviceProfile<'_>, pdu: &[u8]) -> Result<Response<'static>, Rejection> {
    let Request::WriteMultipleCoils(index, coils) = decode(pdu)? else {
        return Err(Rejection::bad_function());
    };
    validate(profile, DataType::Coil, Access::Write, index, coils.len())?;
    for (offset, value) in coils.into_iter().enumerate() {
        profile
            .write(DataType::Coil, index + offset as Address, Word::from(value))
            .map_err(slave_failure)?;
    }
    Ok(Response::WriteMultipleCoils(index, coils.len() as Quantity))
}

/// Write multiple registers (`0x10`).
pub fn write_multiple_registers<S: Storage>(
    slave: &mut Slave<'_, S>,
    request: DecodedFrame<'_>,
) -> Result<Processed, Error> {
    let result = apply_multiple_registers(&mut slave.profile, request.pdu);
    reply(slave, request, result)
}

fn apply_multiple_registers(
    profile: &mut DeviceProfile<'_>,
    pdu: &[u8],
) -> Result<Response<'static>, Rejection> {
    let Request::WriteMultipleRegisters(index, words) = decode(pdu)? else {
        return Err(Rejection::bad_function());
    };
    validate(profile, DataType::HoldingRegister, Access::Write, index, words.len())?;
    for (offset, value) in words.into_iter().enumerate() {
        profile
            .write(DataType::HoldingRegister, index + offset as Address, value)
            .map_err(slave_failure)?;
    }
    Ok(Response::WriteMultipleRegisters(index, words.len() as Quantity))
}

/// Mask write register (`0x16`).
///
/// Stores `(value & and_mask) | (or_mask & !and_mask)`.
pub fn mask_write_register<S: Storage>(
    slave: &mut Slave<'_, S>,
    request: DecodedFrame<'_>,
) -> Result<Processed, Error> {
    let result = apply_mask_write(&mut slave.profile, request.pdu);
    reply(slave, request, result)
}

fn apply_mask_write(profile: &mut DeviceProfile<'_>, pdu: &[u8]) -> Result<Response<'static>, Rejection> {
    let Request::MaskWriteRegister(index, and_mask, or_mask) = decode(pdu)? else {
        return Err(Rejection::bad_function());
    };
    validate(profile, DataType::HoldingRegister, Access::Read, index, 1)?;
    validate(profile, DataType::HoldingRegister, Access::Write, index, 1)?;
    let value = profile
        .read(DataType::HoldingRegister, index)
        .map_err(slave_failure)?;
    let value = (value & and_mask) | (or_mask & !and_mask);
    profile
        .write(DataType::HoldingRegister, index, value)
        .map_err(slave_failure)?;
    Ok(Response::MaskWriteRegister(index, and_mask, or_mask))
}

const fn slave_failure(reason: FrameError) -> Rejection {
    Rejection::new(Exception::SlaveDeviceFailure, reason)
}
