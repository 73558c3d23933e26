// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus RTU

use super::*;
use byteorder::LittleEndian;

pub mod client;
pub mod server;
pub use crate::frame::rtu::*;

// [MODBUS over Serial Line Specification and Implementation Guide V1.02](http://modbus.org/docs/Modbus_over_serial_line_V1_02.pdf), page 13
// "The maximum size of a MODBUS RTU frame is 256 bytes."
pub const MAX_FRAME_LEN: usize = 256;

/// Smallest possible frame: address, function code and CRC.
pub const MIN_FRAME_LEN: usize = 4;

/// Bytes an RTU frame adds around the PDU (address and CRC).
pub const ADU_OVERHEAD: usize = 3;

/// An extracted RTU PDU frame.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame<'a> {
    pub slave: SlaveId,
    pub pdu: &'a [u8],
}

impl DecodedFrame<'_> {
    /// The raw function code byte.
    #[must_use]
    pub fn fn_code(&self) -> u8 {
        self.pdu.first().copied().unwrap_or_default()
    }

    /// Returns `true` if the frame is addressed to all slaves.
    #[must_use]
    pub const fn is_broadcast(&self) -> bool {
        self.slave == BROADCAST
    }
}

/// Calculate the CRC (Cyclic Redundancy Check) sum.
///
/// The value is transmitted in little-endian byte order.
#[must_use]
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0xFFFF;
    for x in data {
        crc ^= u16::from(*x);
        for _ in 0..8 {
            // if we followed clippy's suggestion to move out the crc >>= 1, the condition may not be met any more
            // the recommended action therefore makes no sense and it is better to allow this lint
            #[allow(clippy::branches_sharing_code)]
            if (crc & 0x0001) != 0 {
                crc >>= 1;
                crc ^= 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Verify the trailing CRC of a complete frame.
pub fn check_crc(frame: &[u8]) -> Result<()> {
    if frame.len() < MIN_FRAME_LEN {
        return Err(Error::Parse(FrameError::Length));
    }
    let (adu, crc_buf) = frame.split_at(frame.len() - 2);
    let expected_crc = LittleEndian::read_u16(crc_buf);
    let actual_crc = crc16(adu);
    if expected_crc != actual_crc {
        log::warn!("Invalid CRC: expected = 0x{expected_crc:0>4X}, actual = 0x{actual_crc:0>4X}");
        return Err(Error::Parse(FrameError::Crc));
    }
    Ok(())
}

/// Write the CRC of `buf[..len]` to `buf[len..len + 2]`.
///
/// Returns the total frame length.
pub fn seal(buf: &mut [u8], len: usize) -> Result<usize> {
    if buf.len() < len + 2 {
        return Err(Error::Alloc);
    }
    let crc = crc16(&buf[..len]);
    LittleEndian::write_u16(&mut buf[len..], crc);
    Ok(len + 2)
}

/// Verify the CRC of a complete frame and split it into address and PDU.
pub fn decode_frame(frame: &[u8]) -> Result<DecodedFrame<'_>> {
    check_crc(frame)?;
    let (slave_id, pdu) = frame[..frame.len() - 2].split_at(1);
    Ok(DecodedFrame {
        slave: slave_id[0],
        pdu,
    })
}
