// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inspect frames without a master or slave context.
//!
//! Only the CRC is verified. The result describes what a frame contains,
//! e.g. for logging bus traffic.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::{
    error::{Error, FrameError},
    frame::*,
    rtu,
};

/// Whether a frame is sent by the master or by a slave.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Request,
    Response,
}

/// The contents of a frame.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo<'a> {
    pub direction: Direction,
    pub address: SlaveId,
    /// The raw function code including the exception flag.
    pub function: u8,
    pub data_type: DataType,
    pub access: Access,
    /// The raw exception code of an exception response.
    pub exception_code: Option<u8>,
    /// The exception code if it is a known one.
    pub exception: Option<Exception>,
    pub index: Option<Address>,
    pub count: Option<Quantity>,
    pub and_mask: Option<Word>,
    pub or_mask: Option<Word>,
    /// Values in wire order.
    pub data: &'a [u8],
    pub crc: u16,
}

fn word(payload: &[u8], at: usize) -> Result<Word, Error> {
    payload
        .get(at..at + 2)
        .map(BigEndian::read_u16)
        .ok_or(Error::Parse(FrameError::Length))
}

/// The bytes following a byte count at `at`.
fn counted(payload: &[u8], at: usize) -> Result<&[u8], Error> {
    let len = *payload.get(at).ok_or(Error::Parse(FrameError::Length))? as usize;
    payload
        .get(at + 1..at + 1 + len)
        .ok_or(Error::Parse(FrameError::Length))
}

/// Examine a complete RTU frame.
pub fn examine(direction: Direction, frame: &[u8]) -> Result<FrameInfo<'_>, Error> {
    rtu::check_crc(frame)?;
    let crc = LittleEndian::read_u16(&frame[frame.len() - 2..]);
    let function = frame[1];
    let (data_type, access) = FunctionCode::new(function & 0x7F)
        .target()
        .ok_or(Error::Other)?;

    let mut info = FrameInfo {
        direction,
        address: frame[0],
        function,
        data_type,
        access,
        exception_code: None,
        exception: None,
        index: None,
        count: None,
        and_mask: None,
        or_mask: None,
        data: &[],
        crc,
    };

    if function & 0x80 != 0 && frame.len() == 5 {
        info.exception_code = Some(frame[2]);
        info.exception = Exception::try_from(frame[2]).ok();
        return Ok(info);
    }

    let payload = &frame[2..frame.len() - 2];
    match (direction, function) {
        (Direction::Request, 0x01..=0x04) => {
            info.index = Some(word(payload, 0)?);
            info.count = Some(word(payload, 2)?);
        }
        (_, 0x05 | 0x06) => {
            info.index = Some(word(payload, 0)?);
            info.count = Some(1);
            info.data = payload.get(2..4).ok_or(Error::Parse(FrameError::Length))?;
        }
        (Direction::Request, 0x0F | 0x10) => {
            info.index = Some(word(payload, 0)?);
            info.count = Some(word(payload, 2)?);
            info.data = counted(payload, 4)?;
        }
        (Direction::Response, 0x01..=0x04) => {
            info.data = counted(payload, 0)?;
        }
        (Direction::Response, 0x0F | 0x10) => {
            info.index = Some(word(payload, 0)?);
            info.count = Some(word(payload, 2)?);
        }
        (_, 0x16) => {
            info.index = Some(word(payload, 0)?);
            info.count = Some(1);
            info.and_mask = Some(word(payload, 2)?);
            info.or_mask = Some(word(payload, 4)?);
        }
        _ => return Err(Error::Other),
    }
    Ok(info)
}
