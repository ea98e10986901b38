// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io::{Error, ErrorKind, Result};

use bytes::{Buf as _, BufMut as _, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::{invalid_data, RawFrame, MAX_PDU_SIZE};
use crate::frame::ascii::{
    decode_ascii_frame, lrc, ModbusAsciiAdu, FRAME_END, FRAME_OVERHEAD, FRAME_START,
};

/// Longest text frame: start, two hex digits per byte and CRLF.
const MAX_FRAME_LEN: usize = 1 + (MAX_PDU_SIZE + FRAME_OVERHEAD) * 2 + 2;

/// Delimits Modbus ASCII frames by `:` and CRLF.
///
/// Decoded frames are handed out in their binary form.
#[derive(Debug, Default)]
pub struct AsciiCodec;

impl Decoder for AsciiCodec {
    type Item = RawFrame;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<RawFrame>> {
        // Characters before the start of a frame are noise.
        let Some(start) = buf.iter().position(|byte| *byte == FRAME_START) else {
            buf.clear();
            return Ok(None);
        };
        buf.advance(start);

        let Some(end) = buf.windows(2).position(|window| window == FRAME_END) else {
            if buf.len() > MAX_FRAME_LEN {
                buf.clear();
                return Err(Error::new(ErrorKind::InvalidData, "ASCII frame is too long"));
            }
            return Ok(None);
        };

        let text = buf.split_to(end + FRAME_END.len());
        let binary = decode_ascii_frame(&text).map_err(invalid_data)?;
        let Some((&actual, adu)) = binary.split_last().filter(|(_, adu)| !adu.is_empty()) else {
            return Err(Error::new(ErrorKind::InvalidData, "ASCII frame is empty"));
        };
        let expected = lrc(adu);
        if expected != actual {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("LRC is not correct: {actual:#04X} instead of {expected:#04X}"),
            ));
        }

        Ok(Some(RawFrame {
            key: adu[0].into(),
            bytes: binary.into(),
        }))
    }
}

impl Encoder<ModbusAsciiAdu> for AsciiCodec {
    type Error = Error;

    fn encode(&mut self, adu: ModbusAsciiAdu, buf: &mut BytesMut) -> Result<()> {
        let frame = adu.to_ascii_frame().map_err(invalid_data)?;
        buf.reserve(frame.len());
        buf.put_slice(frame.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ModbusPdu;

    #[test]
    fn decode_skips_noise_before_the_frame() {
        let mut codec = AsciiCodec;
        let mut buf = BytesMut::from(&b"\x00\x00:1103006B00037E\r\n:11"[..]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.key, 0x11);
        assert_eq!(&frame.bytes[..], &[0x11, 0x03, 0x00, 0x6B, 0x00, 0x03, 0x7E]);
        assert_eq!(&buf[..], b":11");
    }

    #[test]
    fn decode_partly_received_message() {
        let mut codec = AsciiCodec;
        let mut buf = BytesMut::from(&b":1103006B"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 9);
    }

    #[test]
    fn decode_with_invalid_lrc() {
        let mut codec = AsciiCodec;
        let mut buf = BytesMut::from(&b":1103006B000300\r\n"[..]);
        let err = codec.decode(&mut buf).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert!(buf.is_empty());
    }

    #[test]
    fn encode_read_request() {
        let mut codec = AsciiCodec;
        let mut buf = BytesMut::new();
        let adu = ModbusAsciiAdu {
            address: 0x11,
            pdu: ModbusPdu::ReadHoldingRegistersRequest {
                starting_address: 0x006B,
                quantity: 3,
            },
        };
        codec.encode(adu, &mut buf).unwrap();
        assert_eq!(&buf[..], b":1103006B00037E\r\n");
    }
}
