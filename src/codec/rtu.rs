// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io::{Error, ErrorKind, Result};

use bytes::{Buf as _, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::{encode_message, invalid_data, RawFrame};
use crate::frame::rtu::{crc16, frame_len, ModbusRtuAdu};

const MIN_ADU_LEN: usize = 1 + 1 + 2; // addr + function + crc

/// Delimits Modbus RTU frames by the length implied by their function code.
#[derive(Debug, PartialEq, Eq)]
pub struct RtuCodec {
    response: bool,
}

impl RtuCodec {
    /// Decodes responses, as a client receives them.
    #[must_use]
    pub fn client() -> Self {
        Self { response: true }
    }

    /// Decodes requests, as a server receives them.
    #[must_use]
    pub fn server() -> Self {
        Self { response: false }
    }
}

impl Decoder for RtuCodec {
    type Item = RawFrame;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<RawFrame>> {
        let Some(len) = frame_len(buf, self.response)
            .map_err(invalid_data)?
            .filter(|len| buf.len() >= (*len).max(MIN_ADU_LEN))
        else {
            // incomplete frame
            return Ok(None);
        };

        let (adu, crc) = buf[..len].split_at(len - 2);
        let expected_crc = crc16(adu);
        let crc = u16::from_le_bytes([crc[0], crc[1]]);
        if expected_crc != crc {
            // skip the corrupt frame
            buf.advance(len);
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("CRC is not correct: {crc:#06X} instead of {expected_crc:#06X}"),
            ));
        }

        let bytes = buf.split_to(len).freeze();
        Ok(Some(RawFrame {
            key: bytes[0].into(),
            bytes,
        }))
    }
}

impl Encoder<ModbusRtuAdu> for RtuCodec {
    type Error = Error;

    fn encode(&mut self, adu: ModbusRtuAdu, buf: &mut BytesMut) -> Result<()> {
        encode_message(&adu, buf)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::{
        buffer::{ByteOrder, ReadBuffer},
        frame::ModbusPdu,
    };

    #[test]
    fn decode_partly_received_client_message() {
        let mut codec = RtuCodec::client();
        let mut buf = BytesMut::from(
            &[
                0x12, // server address
                0x02, // function code
                0x03, // byte count
                0x00, // data
                0x00, // data
                0x00, // data
                0x00, // CRC first byte
                      // missing crc second byte
            ][..],
        );
        let res = codec.decode(&mut buf).unwrap();
        assert!(res.is_none());
        assert_eq!(buf.len(), 7);
    }

    #[test]
    fn decode_partly_received_server_message_0x10() {
        let mut codec = RtuCodec::server();
        let mut buf = BytesMut::from(
            &[
                0x12, // server address
                0x10, // function code
                0x00, // irrelevant
                0x00, // irrelevant
            ][..],
        );
        assert_eq!(buf.len(), MIN_ADU_LEN);

        let res = codec.decode(&mut buf).unwrap();

        assert!(res.is_none());
        assert_eq!(buf.len(), MIN_ADU_LEN);
    }

    #[test]
    fn decode_rtu_message() {
        let mut codec = RtuCodec::client();
        let mut buf = BytesMut::from(
            &[
                0x01, // device address
                0x03, // function code
                0x04, // byte count
                0x89, //
                0x02, //
                0x42, //
                0xC7, //
                0x00, // crc
                0x9D, // crc
                0x00,
            ][..],
        );
        let RawFrame { key, bytes } = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(buf.len(), 1);
        assert_eq!(key, 0x01);

        let mut rb = ReadBuffer::new(&bytes, ByteOrder::BigEndian);
        let adu = ModbusRtuAdu::parse(&mut rb, true, 0).unwrap();
        assert_eq!(
            adu.pdu,
            ModbusPdu::ReadHoldingRegistersResponse {
                value: Bytes::from_static(&[0x89, 0x02, 0x42, 0xC7]),
            }
        );
    }

    #[test]
    fn decode_exception_message() {
        let mut codec = RtuCodec::client();
        let mut buf = BytesMut::from(
            &[
                0x66, //
                0x82, // exception = 0x80 + 0x02
                0x03, //
                0xB1, // crc
                0x7E, // crc
            ][..],
        );

        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.bytes.len(), 5);
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn decode_with_invalid_crc_drops_the_frame() {
        let mut codec = RtuCodec::client();
        let mut buf = BytesMut::from(&[0x66, 0x82, 0x03, 0xB1, 0x7F, 0x01][..]);
        let err = codec.decode(&mut buf).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn encode_read_request() {
        let mut codec = RtuCodec::client();
        let mut buf = BytesMut::new();
        let adu = ModbusRtuAdu {
            address: 0x01,
            pdu: ModbusPdu::ReadHoldingRegistersRequest {
                starting_address: 0x082B,
                quantity: 2,
            },
        };
        codec.encode(adu, &mut buf).unwrap();

        assert_eq!(
            buf,
            Bytes::from_static(&[0x01, 0x03, 0x08, 0x2B, 0x00, 0x02, 0xB6, 0x63])
        );
    }
}
