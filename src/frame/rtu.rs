// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{ModbusPdu, PduContext};
use crate::{
    buffer::{ByteOrder, ReadBuffer, WriteBuffer},
    error::{ParseError, SerializationError},
    message::Message,
};

pub type ServerAddress = u8;

/// Bytes around the PDU: server address and CRC.
pub const FRAME_OVERHEAD: usize = 1 + 2;

const CRC_TABLE: [u16; 256] = crc_table();

const fn crc_table() -> [u16; 256] {
    let mut table = [0; 256];
    let mut i = 0;
    while i < 256 {
        #[allow(clippy::cast_possible_truncation)]
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x0001 != 0 {
                (crc >> 1) ^ 0xA001
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// CRC-16 of the serial line specification (PI_MBUS_300).
///
/// The low byte of the result is transmitted first.
#[must_use]
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(0xFFFF, |crc, byte| {
        (crc >> 8) ^ CRC_TABLE[usize::from((crc ^ u16::from(*byte)) & 0x00FF)]
    })
}

/// A Modbus RTU ADU: server address, PDU and CRC.
#[derive(Debug, Clone, PartialEq)]
pub struct ModbusRtuAdu {
    pub address: ServerAddress,
    pub pdu: ModbusPdu,
}

impl ModbusRtuAdu {
    fn crc(&self) -> Result<u16, SerializationError> {
        let mut wb = WriteBuffer::new(1 + self.pdu.length_in_bytes(), ByteOrder::BigEndian);
        wb.write_unsigned_byte(self.address, 8)?;
        self.pdu.serialize(&mut wb)?;
        Ok(crc16(wb.as_slice()))
    }

    /// Parses a frame that fills the rest of the buffer and verifies its CRC.
    pub fn parse(
        rb: &mut ReadBuffer<'_>,
        response: bool,
        umas_request_function_key: u8,
    ) -> Result<Self, ParseError> {
        rb.push_context(Self::NAME);
        let byte_length = rb
            .remaining_bytes()
            .checked_sub(FRAME_OVERHEAD)
            .and_then(|len| u16::try_from(len).ok())
            .ok_or_else(|| ParseError::InvalidData("RTU frame is too short".into()))?;
        let address = rb.read_unsigned_byte(8)?;
        let ctx = PduContext {
            response,
            umas_request_function_key,
            byte_length,
        };
        let pdu = ModbusPdu::parse(rb, &ctx)?;
        let actual = rb.with_byte_order(ByteOrder::LittleEndian, |rb| rb.read_unsigned_short(16))?;
        rb.pop_context(Self::NAME)?;
        let adu = Self { address, pdu };
        let expected = adu
            .crc()
            .map_err(|err| ParseError::InvalidData(err.to_string().into()))?;
        if expected != actual {
            return Err(ParseError::ChecksumMismatch { expected, actual });
        }
        Ok(adu)
    }
}

impl Message for ModbusRtuAdu {
    const NAME: &'static str = "ModbusRtuADU";

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), SerializationError> {
        let crc = self.crc()?;
        wb.push_context(Self::NAME);
        wb.write_unsigned_byte(self.address, 8)?;
        self.pdu.serialize(wb)?;
        wb.with_byte_order(ByteOrder::LittleEndian, |wb| wb.write_unsigned_short(crc, 16))?;
        wb.pop_context(Self::NAME)
    }

    fn length_in_bits(&self) -> usize {
        FRAME_OVERHEAD * 8 + self.pdu.length_in_bits()
    }
}

/// Length of the frame whose first bytes are in `buf`, checksum included.
///
/// `None` means more bytes are needed to decide.
pub fn frame_len(buf: &[u8], response: bool) -> Result<Option<usize>, ParseError> {
    let payload_len = if response {
        response_payload_len(buf)?
    } else {
        request_payload_len(buf)?
    };
    Ok(payload_len.map(|len| FRAME_OVERHEAD + 1 + len))
}

fn request_payload_len(buf: &[u8]) -> Result<Option<usize>, ParseError> {
    if buf.len() < 2 {
        return Ok(None);
    }
    let len = match buf[1] {
        0x01..=0x06 | 0x08 => Some(4),
        0x07 | 0x0B | 0x0C | 0x11 => Some(0),
        0x0F | 0x10 => buf.get(6).map(|byte_count| 5 + usize::from(*byte_count)),
        0x14 | 0x15 => buf.get(2).map(|byte_count| 1 + usize::from(*byte_count)),
        0x16 => Some(6),
        0x18 => Some(2),
        0x17 => buf.get(10).map(|byte_count| 9 + usize::from(*byte_count)),
        0x2B => Some(3),
        function => return Err(unknown_length(function)),
    };
    Ok(len)
}

fn response_payload_len(buf: &[u8]) -> Result<Option<usize>, ParseError> {
    if buf.len() < 2 {
        return Ok(None);
    }
    let len = match buf[1] {
        0x01..=0x04 | 0x0C | 0x11 | 0x14 | 0x15 | 0x17 => {
            buf.get(2).map(|byte_count| 1 + usize::from(*byte_count))
        }
        0x05 | 0x06 | 0x08 | 0x0B | 0x0F | 0x10 => Some(4),
        0x07 => Some(1),
        0x16 => Some(6),
        0x18 => buf
            .get(2..4)
            .map(|byte_count| 2 + usize::from(u16::from_be_bytes([byte_count[0], byte_count[1]]))),
        0x81..=0xFF => Some(1),
        function => return Err(unknown_length(function)),
    };
    Ok(len)
}

fn unknown_length(function: u8) -> ParseError {
    ParseError::InvalidData(format!("cannot determine the frame length of function 0x{function:02X}").into())
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn parse(bytes: &[u8], response: bool) -> Result<ModbusRtuAdu, ParseError> {
        let mut rb = ReadBuffer::new(bytes, ByteOrder::BigEndian);
        ModbusRtuAdu::parse(&mut rb, response, 0)
    }

    #[test]
    fn test_calc_crc() {
        let msg = [0x01, 0x03, 0x08, 0x2B, 0x00, 0x02];
        assert_eq!(crc16(&msg), 0x63B6);

        let msg = [0x01, 0x03, 0x04, 0x00, 0x20, 0x00, 0x00];
        assert_eq!(crc16(&msg), 0xF9FB);
    }

    #[test]
    fn encode_read_request() {
        let adu = ModbusRtuAdu {
            address: 0x01,
            pdu: ModbusPdu::ReadHoldingRegistersRequest {
                starting_address: 0x082B,
                quantity: 2,
            },
        };
        let bytes = adu.to_bytes().unwrap();
        assert_eq!(&bytes[..], &[0x01, 0x03, 0x08, 0x2B, 0x00, 0x02, 0xB6, 0x63]);
        assert_eq!(parse(&bytes, false).unwrap(), adu);
    }

    #[test]
    fn decode_response() {
        let adu = parse(&[0x01, 0x03, 0x04, 0x89, 0x02, 0x42, 0xC7, 0x00, 0x9D], true).unwrap();
        assert_eq!(adu.address, 0x01);
        assert_eq!(
            adu.pdu,
            ModbusPdu::ReadHoldingRegistersResponse {
                value: Bytes::from_static(&[0x89, 0x02, 0x42, 0xC7]),
            }
        );
    }

    #[test]
    fn decode_exception_message() {
        let bytes = [0x66, 0x82, 0x03, 0xB1, 0x7E];
        assert_eq!(crc16(&bytes[..3]).to_le_bytes(), [0xB1, 0x7E]);
        let adu = parse(&bytes, true).unwrap();
        assert_eq!(
            adu.pdu.exception().unwrap().to_string(),
            "Modbus function 2: Illegal data value"
        );
    }

    #[test]
    fn decode_with_invalid_crc() {
        let err = parse(&[0x01, 0x03, 0x04, 0x89, 0x02, 0x42, 0xC7, 0x00, 0x9E], true).unwrap_err();
        assert!(matches!(
            err,
            ParseError::ChecksumMismatch {
                expected: 0x9D00,
                actual: 0x9E00,
            }
        ));
    }

    mod frame_length {
        use super::*;

        #[test]
        fn partly_received_frames_need_more_bytes() {
            assert_eq!(frame_len(&[0x01], true).unwrap(), None);
            assert_eq!(frame_len(&[0x01, 0x03], true).unwrap(), None);
            assert_eq!(frame_len(&[0x01, 0x10, 0x00, 0x00, 0x00, 0x01], false).unwrap(), None);
        }

        #[test]
        fn responses() {
            assert_eq!(frame_len(&[0x01, 0x03, 0x04], true).unwrap(), Some(9));
            assert_eq!(frame_len(&[0x01, 0x06], true).unwrap(), Some(8));
            assert_eq!(frame_len(&[0x66, 0x82], true).unwrap(), Some(5));
            assert_eq!(frame_len(&[0x01, 0x18, 0x00, 0x06], true).unwrap(), Some(12));
        }

        #[test]
        fn requests() {
            assert_eq!(frame_len(&[0x01, 0x03], false).unwrap(), Some(8));
            assert_eq!(
                frame_len(&[0x01, 0x10, 0x00, 0x00, 0x00, 0x01, 0x02], false).unwrap(),
                Some(11)
            );
        }

        #[test]
        fn unknown_functions() {
            assert!(frame_len(&[0x01, 0x5A], true).is_err());
        }
    }
}
