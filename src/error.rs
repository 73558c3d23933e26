// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use core::fmt;

use crate::frame::ExceptionResponse;

/// The specific reason of a failed build or parse operation.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Invalid CRC
    Crc,
    /// Invalid frame length
    Length,
    /// Invalid item or byte count
    Count,
    /// Invalid value
    Value,
    /// Address range exceeds the data source
    Range,
    /// No data source for the requested data type
    NoSource,
    /// No read access to at least one of the requested units
    NoRead,
    /// No write access to at least one of the requested units
    NoWrite,
    /// Unsupported function code
    NoFunction,
    /// Handler invoked for a function code it does not implement
    BadFunction,
    /// Function code explicitly disabled
    DisabledFunction,
    /// Response function code does not match the request
    MismatchFunction,
    /// Response address does not match the request
    MismatchAddress,
    /// Response index does not match the request
    MismatchIndex,
    /// Response count does not match the request
    MismatchCount,
    /// Response value does not match the request
    MismatchValue,
    /// Response masks do not match the request
    MismatchMask,
    /// Broadcast where none is allowed
    Broadcast,
}

impl FrameError {
    const fn get_name(self) -> &'static str {
        match self {
            Self::Crc => "invalid CRC",
            Self::Length => "invalid frame length",
            Self::Count => "invalid count",
            Self::Value => "invalid value",
            Self::Range => "address range exceeded",
            Self::NoSource => "no data source",
            Self::NoRead => "no read access",
            Self::NoWrite => "no write access",
            Self::NoFunction => "unsupported function",
            Self::BadFunction => "wrong handler for function",
            Self::DisabledFunction => "function disabled",
            Self::MismatchFunction => "function code mismatch",
            Self::MismatchAddress => "slave address mismatch",
            Self::MismatchIndex => "index mismatch",
            Self::MismatchCount => "count mismatch",
            Self::MismatchValue => "value mismatch",
            Self::MismatchMask => "mask mismatch",
            Self::Broadcast => "broadcast not allowed",
        }
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.get_name())
    }
}

/// modbus-rtu-engine Error
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The slave answered with an exception
    Exception(ExceptionResponse),
    /// Buffer too small or allocation failed
    Alloc,
    /// Other error
    Other,
    /// A required input is missing
    NullArgument,
    /// A frame could not be parsed
    Parse(FrameError),
    /// A frame could not be built
    Build(FrameError),
}

impl Error {
    /// The specific reason of a parse or build failure.
    #[must_use]
    pub const fn reason(&self) -> Option<FrameError> {
        match *self {
            Self::Parse(reason) | Self::Build(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Error::*;

        match self {
            Exception(ex) => write!(
                f,
                "Exception from slave {}: function 0x{:0>2X}: {}",
                ex.address,
                ex.function.value(),
                ex.exception
            ),
            Alloc => write!(f, "Buffer allocation failed"),
            Other => write!(f, "Other error"),
            NullArgument => write!(f, "Missing argument"),
            Parse(reason) => write!(f, "Parse error: {reason}"),
            Build(reason) => write!(f, "Build error: {reason}"),
        }
    }
}

impl core::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_of_parse_and_build_errors() {
        assert_eq!(Error::Parse(FrameError::Crc).reason(), Some(FrameError::Crc));
        assert_eq!(
            Error::Build(FrameError::Broadcast).reason(),
            Some(FrameError::Broadcast)
        );
        assert_eq!(Error::Alloc.reason(), None);
    }

    #[test]
    fn display_parse_error() {
        use std::string::ToString;

        assert_eq!(
            Error::Parse(FrameError::MismatchIndex).to_string(),
            "Parse error: index mismatch"
        );
    }
}
