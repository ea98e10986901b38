// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Write as _;

use super::{ModbusPdu, PduContext};
use crate::{
    buffer::{ByteOrder, ReadBuffer, WriteBuffer},
    error::{ParseError, SerializationError},
    message::Message,
};

pub type ServerAddress = u8;

/// Start of an ASCII frame.
pub const FRAME_START: u8 = b':';

/// End of an ASCII frame.
pub const FRAME_END: &[u8; 2] = b"\r\n";

/// Bytes around the PDU: server address and LRC.
pub const FRAME_OVERHEAD: usize = 1 + 1;

/// Two's complement of the byte sum.
#[must_use]
pub fn lrc(data: &[u8]) -> u8 {
    data.iter()
        .fold(0u8, |sum, byte| sum.wrapping_add(*byte))
        .wrapping_neg()
}

/// Wraps binary frame bytes into `:`, upper case hex digits and CRLF.
#[must_use]
pub fn encode_ascii_frame(binary: &[u8]) -> String {
    let mut frame = String::with_capacity(binary.len() * 2 + 3);
    frame.push(char::from(FRAME_START));
    for byte in binary {
        // Writing into a String cannot fail.
        let _ = write!(frame, "{byte:02X}");
    }
    frame.push_str("\r\n");
    frame
}

/// Strips the framing characters and decodes the hex digits.
pub fn decode_ascii_frame(frame: &[u8]) -> Result<Vec<u8>, ParseError> {
    let digits = frame
        .strip_prefix(&[FRAME_START])
        .and_then(|rest| rest.strip_suffix(FRAME_END))
        .ok_or_else(|| ParseError::InvalidData("ASCII frame is not delimited by ':' and CRLF".into()))?;
    if digits.len() % 2 != 0 {
        return Err(ParseError::InvalidData(
            "ASCII frame has an odd number of hex digits".into(),
        ));
    }
    digits
        .chunks_exact(2)
        .map(|pair| Ok(hex_digit(pair[0])? << 4 | hex_digit(pair[1])?))
        .collect()
}

fn hex_digit(digit: u8) -> Result<u8, ParseError> {
    char::from(digit)
        .to_digit(16)
        .and_then(|value| u8::try_from(value).ok())
        .ok_or_else(|| ParseError::InvalidData(format!("invalid hex digit {:?}", char::from(digit)).into()))
}

/// A Modbus ASCII ADU in its binary form: server address, PDU and LRC.
///
/// Use [`ModbusAsciiAdu::to_ascii_frame`] and
/// [`ModbusAsciiAdu::from_ascii_frame`] for the text form on the line.
#[derive(Debug, Clone, PartialEq)]
pub struct ModbusAsciiAdu {
    pub address: ServerAddress,
    pub pdu: ModbusPdu,
}

impl ModbusAsciiAdu {
    fn lrc(&self) -> Result<u8, SerializationError> {
        let mut wb = WriteBuffer::new(1 + self.pdu.length_in_bytes(), ByteOrder::BigEndian);
        wb.write_unsigned_byte(self.address, 8)?;
        self.pdu.serialize(&mut wb)?;
        Ok(lrc(wb.as_slice()))
    }

    /// Parses binary frame bytes filling the rest of the buffer and verifies the LRC.
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
            .ok_or_else(|| ParseError::InvalidData("ASCII frame is too short".into()))?;
        let address = rb.read_unsigned_byte(8)?;
        let ctx = PduContext {
            response,
            umas_request_function_key,
            byte_length,
        };
        let pdu = ModbusPdu::parse(rb, &ctx)?;
        let actual = rb.read_unsigned_byte(8)?;
        rb.pop_context(Self::NAME)?;
        let adu = Self { address, pdu };
        let expected = adu
            .lrc()
            .map_err(|err| ParseError::InvalidData(err.to_string().into()))?;
        if expected != actual {
            return Err(ParseError::ChecksumMismatch {
                expected: expected.into(),
                actual: actual.into(),
            });
        }
        Ok(adu)
    }

    pub fn to_ascii_frame(&self) -> Result<String, SerializationError> {
        Ok(encode_ascii_frame(&self.to_bytes()?))
    }

    pub fn from_ascii_frame(
        frame: &[u8],
        response: bool,
        umas_request_function_key: u8,
    ) -> Result<Self, ParseError> {
        let binary = decode_ascii_frame(frame)?;
        let mut rb = ReadBuffer::new(&binary, ByteOrder::BigEndian);
        Self::parse(&mut rb, response, umas_request_function_key)
    }
}

impl Message for ModbusAsciiAdu {
    const NAME: &'static str = "ModbusAsciiADU";

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), SerializationError> {
        let lrc = self.lrc()?;
        wb.push_context(Self::NAME);
        wb.write_unsigned_byte(self.address, 8)?;
        self.pdu.serialize(wb)?;
        wb.write_unsigned_byte(lrc, 8)?;
        wb.pop_context(Self::NAME)
    }

    fn length_in_bits(&self) -> usize {
        FRAME_OVERHEAD * 8 + self.pdu.length_in_bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longitudinal_redundancy_check() {
        assert_eq!(lrc(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x0A]), 0xF2);
        assert_eq!(lrc(&[0x11, 0x03, 0x00, 0x6B, 0x00, 0x03]), 0x7E);
        assert_eq!(lrc(&[]), 0x00);
    }

    #[test]
    fn encode_read_request() {
        let adu = ModbusAsciiAdu {
            address: 0x11,
            pdu: ModbusPdu::ReadHoldingRegistersRequest {
                starting_address: 0x006B,
                quantity: 3,
            },
        };
        assert_eq!(
            &adu.to_bytes().unwrap()[..],
            &[0x11, 0x03, 0x00, 0x6B, 0x00, 0x03, 0x7E]
        );
        let frame = adu.to_ascii_frame().unwrap();
        assert_eq!(frame, ":1103006B00037E\r\n");
        assert_eq!(
            ModbusAsciiAdu::from_ascii_frame(frame.as_bytes(), false, 0).unwrap(),
            adu
        );
    }

    #[test]
    fn lowercase_hex_digits_are_accepted() {
        let adu = ModbusAsciiAdu::from_ascii_frame(b":1103006b00037e\r\n", false, 0).unwrap();
        assert_eq!(adu.address, 0x11);
    }

    #[test]
    fn decode_with_invalid_lrc() {
        let err = ModbusAsciiAdu::from_ascii_frame(b":1103006B00037F\r\n", false, 0).unwrap_err();
        assert!(matches!(
            err,
            ParseError::ChecksumMismatch {
                expected: 0x7E,
                actual: 0x7F,
            }
        ));
    }

    #[test]
    fn malformed_frames() {
        assert!(decode_ascii_frame(b"1103\r\n").is_err());
        assert!(decode_ascii_frame(b":1103").is_err());
        assert!(decode_ascii_frame(b":110\r\n").is_err());
        assert!(decode_ascii_frame(b":11G3\r\n").is_err());
    }
}
