// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus RTU client (master) specific functions.
use super::*;

/// Check a request before anything is written.
///
/// Broadcast reads are rejected because no slave answers them.
pub fn validate_request(adu: &RequestAdu<'_>) -> Result<()> {
    let RequestAdu { hdr, pdu } = adu;
    if hdr.is_broadcast() && pdu.0.is_read() {
        return Err(Error::Build(FrameError::Broadcast));
    }
    pdu.0.validate().map_err(Error::Build)
}

/// Number of bytes of the encoded request frame.
#[must_use]
pub const fn request_len(adu: &RequestAdu<'_>) -> usize {
    adu.pdu.0.pdu_len() + ADU_OVERHEAD
}

/// Encode and RTU request.
pub fn encode_request(adu: RequestAdu, buf: &mut [u8]) -> Result<usize> {
    validate_request(&adu)?;
    let RequestAdu { hdr, pdu } = adu;
    if buf.len() < request_len(&adu) {
        return Err(Error::Alloc);
    }
    let len = pdu.0.encode(&mut buf[1..])?;
    buf[0] = hdr.slave;
    seal(buf, len + 1)
}

/// Decode an RTU response.
pub fn decode_response(buf: &[u8]) -> Result<ResponseAdu<'_>> {
    let DecodedFrame { slave, pdu } = decode_frame(buf)?;
    let hdr = Header { slave };
    let response = if pdu.first().is_some_and(|code| code & 0x80 != 0) {
        ExceptionResponse::decode(slave, pdu).map(|er| ResponsePdu(Err(er)))
    } else {
        Response::try_from(pdu).map(|r| ResponsePdu(Ok(r)))
    }
    .map(|pdu| ResponseAdu { hdr, pdu });
    if let Err(err) = &response {
        log::warn!("Failed to decode response PDU: {err}");
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_empty_response() {
        assert_eq!(decode_response(&[]), Err(Error::Parse(FrameError::Length)));
    }

    #[test]
    fn decode_partly_received_response() {
        let buf = &[
            0x12, // slave address
            0x16, // function code
        ];
        assert_eq!(decode_response(buf), Err(Error::Parse(FrameError::Length)));
    }

    #[test]
    fn encode_write_single_register_request() {
        let mut buf = [0u8; 255];
        let sz = encode_request(
            RequestAdu {
                hdr: Header { slave: 0x12 },
                pdu: RequestPdu(Request::WriteSingleRegister(0x2222, 0xABCD)),
            },
            &mut buf,
        )
        .expect("Error encoding request");

        let req = &buf[..sz];
        assert_eq!(
            req,
            &[
                0x12, // slave address
                0x06, // function code
                0x22, // addr
                0x22, // addr
                0xAB, // value
                0xCD, // value
                0x9F, // crc
                0xBE, // crc
            ]
        );
    }

    #[test]
    fn encode_read_holding_registers_request() {
        let mut buf = [0u8; 8];
        let sz = encode_request(
            RequestAdu {
                hdr: Header { slave: 0x11 },
                pdu: RequestPdu(Request::ReadHoldingRegisters(0x006B, 3)),
            },
            &mut buf,
        )
        .unwrap();
        assert_eq!(
            &buf[..sz],
            &[
                0x11, // slave address
                0x03, // function code
                0x00, // addr
                0x6B, // addr
                0x00, // quantity
                0x03, // quantity
                0x76, // crc
                0x87, // crc
            ]
        );
    }

    #[test]
    fn encode_broadcast_read_request() {
        let mut buf = [0u8; 8];
        let adu = RequestAdu {
            hdr: Header { slave: 0 },
            pdu: RequestPdu(Request::ReadCoils(0, 8)),
        };
        assert_eq!(
            encode_request(adu, &mut buf),
            Err(Error::Build(FrameError::Broadcast))
        );
        assert_eq!(buf, [0; 8]);
    }

    #[test]
    fn encode_broadcast_write_request() {
        let mut buf = [0u8; 8];
        let adu = RequestAdu {
            hdr: Header { slave: 0 },
            pdu: RequestPdu(Request::WriteSingleCoil(7, true)),
        };
        assert_eq!(encode_request(adu, &mut buf), Ok(8));
        assert_eq!(&buf[..6], &[0x00, 0x05, 0x00, 0x07, 0xFF, 0x00]);
    }

    #[test]
    fn encode_into_short_buffer() {
        let mut buf = [0u8; 7];
        let adu = RequestAdu {
            hdr: Header { slave: 1 },
            pdu: RequestPdu(Request::ReadCoils(0, 8)),
        };
        assert_eq!(encode_request(adu, &mut buf), Err(Error::Alloc));
    }

    #[test]
    fn decode_write_single_register_response() {
        use crate::frame::Response;
        let rsp = &[0x12, 0x06, 0x22, 0x22, 0xAB, 0xCD, 0x9F, 0xBE];

        assert!(matches!(
            decode_response(rsp),
            Ok(ResponseAdu {
                hdr: Header { slave: 0x12 },
                pdu: ResponsePdu(Ok(Response::WriteSingleRegister(0x2222, 0xABCD)))
            })
        ));
    }

    #[test]
    fn decode_exception_response() {
        let buf = &mut [0x12, 0x83, 0x02, 0, 0];
        seal(buf, 3).unwrap();
        let adu = decode_response(buf).unwrap();
        assert_eq!(
            adu.pdu,
            ResponsePdu(Err(ExceptionResponse {
                address: 0x12,
                function: FunctionCode::ReadHoldingRegisters,
                exception: Exception::IllegalDataAddress,
            }))
        );
    }

    #[test]
    fn decode_truncated_write_single_register_response() {
        // Value lacks its low byte, the CRC covers the five bytes sent.
        let rsp = &[0x12, 0x06, 0x22, 0x22, 0xAB, 0x65, 0x9E];
        assert_eq!(decode_response(rsp), Err(Error::Parse(FrameError::Length)));
    }

    #[test]
    fn decode_bad_crc_write_single_register_response() {
        let rsp = &[0x12, 0x06, 0x22, 0x22, 0xAB, 0xCD, 0x5F, 0xBE];
        assert_eq!(decode_response(rsp), Err(Error::Parse(FrameError::Crc)));
    }
}
