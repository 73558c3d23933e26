// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Correlation of responses with their requests.

use core::fmt;

use crate::{
    buffer::{Buffer, Storage},
    error::{Error, FrameError},
    frame::*,
    rtu::DecodedFrame,
    util::packed_coils_len,
};

/// A stored request frame paired with the delivered response frame.
///
/// Both frames have a valid CRC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction<'a> {
    pub request: DecodedFrame<'a>,
    pub response: DecodedFrame<'a>,
}

/// Kind of values held by [`ResponseData`].
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueKind {
    #[default]
    None,
    Coils,
    Registers,
}

/// The result fields filled in by a response handler.
pub struct ResponseData<S: Storage> {
    pub address: SlaveId,
    pub function: FunctionCode,
    pub data_type: Option<DataType>,
    pub index: Address,
    pub count: Quantity,
    /// Number of data bytes.
    pub length: usize,
    kind: ValueKind,
    coils: S::Bytes,
    registers: S::Words,
}

impl<S: Storage> Default for ResponseData<S> {
    fn default() -> Self {
        Self {
            address: 0,
            function: FunctionCode::Custom(0),
            data_type: None,
            index: 0,
            count: 0,
            length: 0,
            kind: ValueKind::None,
            coils: S::Bytes::default(),
            registers: S::Words::default(),
        }
    }
}

impl<S: Storage> fmt::Debug for ResponseData<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseData")
            .field("address", &self.address)
            .field("function", &self.function)
            .field("data_type", &self.data_type)
            .field("index", &self.index)
            .field("count", &self.count)
            .field("values", &self.values())
            .finish()
    }
}

impl<S: Storage> ResponseData<S> {
    pub(crate) fn reset(&mut self) {
        self.address = 0;
        self.function = FunctionCode::Custom(0);
        self.data_type = None;
        self.index = 0;
        self.count = 0;
        self.length = 0;
        self.kind = ValueKind::None;
        self.coils.clear();
        self.registers.clear();
    }

    /// Store `count` bit-packed coils.
    pub fn store_coils(&mut self, packed: &[u8], count: Quantity) -> Result<(), Error> {
        let len = packed_coils_len(count as usize);
        if packed.len() < len {
            return Err(Error::Alloc);
        }
        self.coils.alloc(len)?.copy_from_slice(&packed[..len]);
        self.kind = ValueKind::Coils;
        self.count = count;
        self.length = len;
        Ok(())
    }

    /// Store register values.
    pub fn store_registers(&mut self, words: impl ExactSizeIterator<Item = Word>) -> Result<(), Error> {
        let len = words.len();
        let count = Quantity::try_from(len).map_err(|_| Error::Alloc)?;
        let buf = self.registers.alloc(len)?;
        for (slot, word) in buf.iter_mut().zip(words) {
            *slot = word;
        }
        self.kind = ValueKind::Registers;
        self.count = count;
        self.length = len * 2;
        Ok(())
    }

    /// The stored values.
    #[must_use]
    pub fn values(&self) -> Values<'_> {
        match self.kind {
            ValueKind::None => Values::None,
            ValueKind::Coils => Coils::new(self.coils.as_slice(), self.count as usize)
                .map_or(Values::None, Values::Coils),
            ValueKind::Registers => Values::Registers(self.registers.as_slice()),
        }
    }

    pub(crate) fn decoded(&self) -> Decoded<'_> {
        Decoded {
            address: self.address,
            function: self.function,
            data_type: self.data_type,
            index: self.index,
            count: self.count,
            length: self.length,
            values: self.values(),
        }
    }
}

/// Values of a successfully parsed response.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Values<'a> {
    /// Multiple writes and mask writes carry no values.
    None,
    Coils(Coils<'a>),
    Registers(&'a [Word]),
}

/// A parsed and verified response.
///
/// `index` and `count` are taken from the request.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded<'a> {
    pub address: SlaveId,
    pub function: FunctionCode,
    pub data_type: Option<DataType>,
    pub index: Address,
    pub count: Quantity,
    pub length: usize,
    pub values: Values<'a>,
}

const fn mismatch(reason: FrameError) -> Error {
    Error::Parse(reason)
}

/// Built-in response handler for all standard function codes.
///
/// Verifies that the response answers the request and stores its values.
pub fn correlate<S: Storage>(data: &mut ResponseData<S>, tx: &Transaction<'_>) -> Result<(), Error> {
    use FrameError::*;

    let request = Request::try_from(tx.request.pdu)?;
    if tx.response.is_broadcast() {
        return Err(mismatch(Broadcast));
    }
    if tx.response.slave != tx.request.slave {
        return Err(mismatch(MismatchAddress));
    }
    if tx.response.fn_code() != tx.request.fn_code() {
        return Err(mismatch(MismatchFunction));
    }
    // A single coil echo with an invalid value cannot be the echo of a valid request.
    let response = Response::try_from(tx.response.pdu).map_err(|err| match err {
        Error::Parse(Value) => mismatch(MismatchValue),
        err => err,
    })?;

    data.address = tx.response.slave;
    data.function = FunctionCode::from(request);
    data.data_type = data.function.target().map(|(data_type, _)| data_type);

    match (request, response) {
        (Request::ReadCoils(index, count), Response::ReadCoils(coils))
        | (Request::ReadDiscreteInputs(index, count), Response::ReadDiscreteInputs(coils)) => {
            if coils.packed_len() != packed_coils_len(count as usize) {
                return Err(Error::Parse(Length));
            }
            data.index = index;
            data.store_coils(coils.packed(), count)?;
        }
        (Request::ReadHoldingRegisters(index, count), Response::ReadHoldingRegisters(words))
        | (Request::ReadInputRegisters(index, count), Response::ReadInputRegisters(words)) => {
            if words.len() != count as usize {
                return Err(Error::Parse(Length));
            }
            data.index = index;
            data.store_registers(words.into_iter().take(count as usize))?;
        }
        (Request::WriteSingleCoil(index, value), Response::WriteSingleCoil(rsp_index, rsp_value)) => {
            if rsp_index != index {
                return Err(mismatch(MismatchIndex));
            }
            if rsp_value != value {
                return Err(mismatch(MismatchValue));
            }
            data.index = index;
            data.store_coils(&[u8::from(value)], 1)?;
        }
        (
            Request::WriteSingleRegister(index, value),
            Response::WriteSingleRegister(rsp_index, rsp_value),
        ) => {
            if rsp_index != index {
                return Err(mismatch(MismatchIndex));
            }
            if rsp_value != value {
                return Err(mismatch(MismatchValue));
            }
            data.index = index;
            data.store_registers(core::iter::once(value))?;
        }
        (Request::WriteMultipleCoils(index, coils), Response::WriteMultipleCoils(rsp_index, rsp_count)) => {
            check_multiple_write(index, coils.len(), rsp_index, rsp_count)?;
            data.index = index;
            data.count = rsp_count;
        }
        (
            Request::WriteMultipleRegisters(index, words),
            Response::WriteMultipleRegisters(rsp_index, rsp_count),
        ) => {
            check_multiple_write(index, words.len(), rsp_index, rsp_count)?;
            data.index = index;
            data.count = rsp_count;
        }
        (
            Request::MaskWriteRegister(index, and_mask, or_mask),
            Response::MaskWriteRegister(rsp_index, rsp_and, rsp_or),
        ) => {
            if rsp_index != index {
                return Err(mismatch(MismatchIndex));
            }
            if rsp_and != and_mask || rsp_or != or_mask {
                return Err(mismatch(MismatchMask));
            }
            data.index = index;
            data.count = 1;
        }
        _ => return Err(Error::Parse(NoFunction)),
    }
    Ok(())
}

fn check_multiple_write(
    index: Address,
    count: usize,
    rsp_index: Address,
    rsp_count: Quantity,
) -> Result<(), Error> {
    if rsp_index != index {
        return Err(mismatch(FrameError::MismatchIndex));
    }
    if rsp_count as usize != count {
        return Err(mismatch(FrameError::MismatchCount));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{buffer::Static, rtu::decode_frame};

    fn transaction<'a>(request: &'a [u8], response: &'a [u8]) -> Transaction<'a> {
        Transaction {
            request: decode_frame(request).unwrap(),
            response: decode_frame(response).unwrap(),
        }
    }

    fn sealed<const N: usize>(mut frame: [u8; N]) -> [u8; N] {
        crate::rtu::seal(&mut frame, N - 2).unwrap();
        frame
    }

    #[test]
    fn read_holding_registers() {
        let request = sealed([0x20, 0x03, 0x01, 0x00, 0x00, 0x02, 0, 0]);
        let response = sealed([
            0x20, // slave address
            0x03, // function code
            0x04, // byte count
            0xDE, 0xAD, // register 0x0100
            0xFA, 0xCE, // register 0x0101
            0, 0, // crc
        ]);
        let mut data = ResponseData::<Static<16>>::default();
        correlate(&mut data, &transaction(&request, &response)).unwrap();
        let decoded = data.decoded();
        assert_eq!(decoded.address, 0x20);
        assert_eq!(decoded.function, FunctionCode::ReadHoldingRegisters);
        assert_eq!(decoded.data_type, Some(DataType::HoldingRegister));
        assert_eq!(decoded.index, 0x0100);
        assert_eq!(decoded.count, 2);
        assert_eq!(decoded.length, 4);
        assert_eq!(decoded.values, Values::Registers(&[0xDEAD, 0xFACE]));
    }

    #[test]
    fn read_coils_with_wrong_byte_count() {
        let request = sealed([0x01, 0x01, 0x00, 0x00, 0x00, 0x09, 0, 0]);
        let response = sealed([0x01, 0x01, 0x01, 0xFF, 0, 0]);
        let mut data = ResponseData::<Static<16>>::default();
        assert_eq!(
            correlate(&mut data, &transaction(&request, &response)),
            Err(Error::Parse(FrameError::Length))
        );
    }

    #[test]
    fn read_coils() {
        let request = sealed([0x01, 0x02, 0x00, 0x10, 0x00, 0x0A, 0, 0]);
        let response = sealed([0x01, 0x02, 0x02, 0b1010_0101, 0b11, 0, 0]);
        let mut data = ResponseData::<Static<16>>::default();
        correlate(&mut data, &transaction(&request, &response)).unwrap();
        let Values::Coils(coils) = data.values() else {
            panic!("no coils");
        };
        assert_eq!(coils.len(), 10);
        assert_eq!(coils.get(0), Some(true));
        assert_eq!(coils.get(1), Some(false));
        assert_eq!(coils.get(9), Some(true));
        assert_eq!(data.data_type, Some(DataType::DiscreteInput));
        assert_eq!(data.length, 2);
    }

    #[test]
    fn mismatching_slave_address() {
        let request = sealed([0x01, 0x06, 0x00, 0x01, 0x00, 0x03, 0, 0]);
        let response = sealed([0x02, 0x06, 0x00, 0x01, 0x00, 0x03, 0, 0]);
        let mut data = ResponseData::<Static<16>>::default();
        assert_eq!(
            correlate(&mut data, &transaction(&request, &response)),
            Err(Error::Parse(FrameError::MismatchAddress))
        );
    }

    #[test]
    fn response_from_broadcast_address() {
        let request = sealed([0x01, 0x06, 0x00, 0x01, 0x00, 0x03, 0, 0]);
        let response = sealed([0x00, 0x06, 0x00, 0x01, 0x00, 0x03, 0, 0]);
        let mut data = ResponseData::<Static<16>>::default();
        assert_eq!(
            correlate(&mut data, &transaction(&request, &response)),
            Err(Error::Parse(FrameError::Broadcast))
        );
    }

    #[test]
    fn mismatching_function() {
        let request = sealed([0x01, 0x06, 0x00, 0x01, 0x00, 0x03, 0, 0]);
        let response = sealed([0x01, 0x05, 0x00, 0x01, 0xFF, 0x00, 0, 0]);
        let mut data = ResponseData::<Static<16>>::default();
        assert_eq!(
            correlate(&mut data, &transaction(&request, &response)),
            Err(Error::Parse(FrameError::MismatchFunction))
        );
    }

    #[test]
    fn mismatching_single_write_echo() {
        let request = sealed([0x01, 0x06, 0x00, 0x01, 0x00, 0x03, 0, 0]);
        let mut data = ResponseData::<Static<16>>::default();

        let response = sealed([0x01, 0x06, 0x00, 0x02, 0x00, 0x03, 0, 0]);
        assert_eq!(
            correlate(&mut data, &transaction(&request, &response)),
            Err(Error::Parse(FrameError::MismatchIndex))
        );
        let response = sealed([0x01, 0x06, 0x00, 0x01, 0x00, 0x04, 0, 0]);
        assert_eq!(
            correlate(&mut data, &transaction(&request, &response)),
            Err(Error::Parse(FrameError::MismatchValue))
        );

        let request = sealed([0x01, 0x05, 0x00, 0x01, 0xFF, 0x00, 0, 0]);
        let response = sealed([0x01, 0x05, 0x00, 0x01, 0x12, 0x34, 0, 0]);
        assert_eq!(
            correlate(&mut data, &transaction(&request, &response)),
            Err(Error::Parse(FrameError::MismatchValue))
        );
    }

    #[test]
    fn write_single_coil_echo() {
        let request = sealed([0x01, 0x05, 0x00, 0x07, 0xFF, 0x00, 0, 0]);
        let mut data = ResponseData::<Static<16>>::default();
        correlate(&mut data, &transaction(&request, &request)).unwrap();
        assert_eq!(data.index, 7);
        assert_eq!(data.count, 1);
        assert_eq!(data.length, 1);
        let Values::Coils(coils) = data.values() else {
            panic!("no coils");
        };
        assert_eq!(coils.get(0), Some(true));
    }

    #[test]
    fn mismatching_multiple_write_count() {
        let request = sealed([
            0x01, // slave address
            0x10, // function code
            0x00, 0x06, // index
            0x00, 0x02, // count
            0x04, // byte count
            0xAB, 0xCD, 0xEF, 0x12, // values
            0, 0, // crc
        ]);
        let response = sealed([0x01, 0x10, 0x00, 0x06, 0x00, 0x01, 0, 0]);
        let mut data = ResponseData::<Static<16>>::default();
        assert_eq!(
            correlate(&mut data, &transaction(&request, &response)),
            Err(Error::Parse(FrameError::MismatchCount))
        );

        let response = sealed([0x01, 0x10, 0x00, 0x06, 0x00, 0x02, 0, 0]);
        correlate(&mut data, &transaction(&request, &response)).unwrap();
        assert_eq!(data.count, 2);
        assert_eq!(data.values(), Values::None);
    }

    #[test]
    fn mismatching_masks() {
        let request = sealed([0x01, 0x16, 0x00, 0x04, 0x00, 0xF2, 0x00, 0x25, 0, 0]);
        let response = sealed([0x01, 0x16, 0x00, 0x04, 0x00, 0xF2, 0x00, 0x26, 0, 0]);
        let mut data = ResponseData::<Static<16>>::default();
        assert_eq!(
            correlate(&mut data, &transaction(&request, &response)),
            Err(Error::Parse(FrameError::MismatchMask))
        );
    }
}
