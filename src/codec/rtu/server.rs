// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus RTU server (slave) specific functions.
use super::*;

/// Decode an RTU request.
pub fn decode_request(buf: &[u8]) -> Result<RequestAdu<'_>> {
    let DecodedFrame { slave, pdu } = decode_frame(buf)?;
    let hdr = Header { slave };
    Request::try_from(pdu)
        .map(RequestPdu)
        .map(|pdu| RequestAdu { hdr, pdu })
        .inspect_err(|err| {
            log::warn!("Failed to decode request PDU: {err}");
        })
}

/// Number of bytes of the encoded response frame.
#[must_use]
pub const fn response_len(adu: &ResponseAdu<'_>) -> usize {
    adu.pdu.pdu_len() + ADU_OVERHEAD
}

/// Encode an RTU response.
pub fn encode_response(adu: ResponseAdu<'_>, buf: &mut [u8]) -> Result<usize> {
    let ResponseAdu { hdr, pdu } = adu;
    if buf.len() < response_len(&adu) {
        return Err(Error::Alloc);
    }
    let len = pdu.encode(&mut buf[1..])?;
    buf[0] = hdr.slave;
    seal(buf, len + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_empty_request() {
        assert_eq!(decode_request(&[]), Err(Error::Parse(FrameError::Length)));
    }

    #[test]
    fn decode_partly_received_request() {
        let buf = &[
            0x12, // slave address
            0x16, // function code
        ];
        assert_eq!(decode_request(buf), Err(Error::Parse(FrameError::Length)));
    }

    #[test]
    fn decode_write_single_register_request() {
        let buf = &[
            0x12, // slave address
            0x06, // function code
            0x22, // addr
            0x22, // addr
            0xAB, // value
            0xCD, // value
            0x9F, // crc
            0xBE, // crc
        ];
        let adu = decode_request(buf).unwrap();
        let RequestAdu { hdr, pdu } = adu;
        let RequestPdu(pdu) = pdu;
        assert_eq!(hdr.slave, 0x12);
        assert_eq!(FunctionCode::from(pdu).value(), 0x06);
        assert_eq!(pdu, Request::WriteSingleRegister(0x2222, 0xABCD));
    }

    #[test]
    fn decode_request_with_invalid_coil_value() {
        let buf = &mut [0x12, 0x05, 0x00, 0x01, 0x12, 0x34, 0, 0];
        seal(buf, 6).unwrap();
        assert_eq!(decode_request(buf), Err(Error::Parse(FrameError::Value)));
    }

    #[test]
    fn encode_write_single_register_response() {
        let adu = ResponseAdu {
            hdr: Header { slave: 0x12 },
            pdu: ResponsePdu(Ok(Response::WriteSingleRegister(0x2222, 0xABCD))),
        };
        let buf = &mut [0; 100];
        let len = encode_response(adu, buf).unwrap();
        assert_eq!(len, 8);
        assert_eq!(buf[0], 0x12);
        assert_eq!(buf[1], 0x06);
        assert_eq!(buf[2], 0x22);
        assert_eq!(buf[3], 0x22);
        assert_eq!(buf[4], 0xAB);
        assert_eq!(buf[5], 0xCD);
        assert_eq!(buf[6], 0x9F);
        assert_eq!(buf[7], 0xBE);
    }

    #[test]
    fn encode_exception_response() {
        let adu = ResponseAdu {
            hdr: Header { slave: 0x20 },
            pdu: ResponsePdu(Err(ExceptionResponse {
                address: 0x20,
                function: FunctionCode::WriteSingleCoil,
                exception: Exception::SlaveDeviceFailure,
            })),
        };
        let buf = &mut [0; 5];
        assert_eq!(encode_response(adu, buf), Ok(5));
        assert_eq!(&buf[..3], &[0x20, 0x85, 0x04]);
        assert!(check_crc(buf).is_ok());
    }

    #[test]
    fn encode_into_short_buffer() {
        let adu = ResponseAdu {
            hdr: Header { slave: 0x12 },
            pdu: ResponsePdu(Ok(Response::WriteSingleRegister(0x2222, 0xABCD))),
        };
        let buf = &mut [0; 7];
        assert_eq!(encode_response(adu, buf), Err(Error::Alloc));
    }
}
