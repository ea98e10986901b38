// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io::{Error, ErrorKind, Result};

use byteorder::{BigEndian, ByteOrder as _};
use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use super::{encode_message, RawFrame, MAX_PDU_SIZE};
use crate::frame::tcp::{ModbusTcpAdu, HEADER_LEN, PROTOCOL_ID};

/// Delimits Modbus TCP ADUs by their MBAP length field.
///
/// Used for both directions and for UMAS, which travels inside Modbus
/// TCP ADUs.
#[derive(Debug, Default)]
pub struct TcpCodec;

impl Decoder for TcpCodec {
    type Item = RawFrame;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<RawFrame>> {
        if buf.len() < HEADER_LEN {
            return Ok(None);
        }

        let protocol_id = BigEndian::read_u16(&buf[2..4]);
        if protocol_id != PROTOCOL_ID {
            return Err(Error::new(ErrorKind::InvalidData, "Invalid protocol ID"));
        }

        // len = bytes of PDU + one byte (unit ID)
        let len = usize::from(BigEndian::read_u16(&buf[4..6]));
        if len == 0 || len > MAX_PDU_SIZE + 1 {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("Invalid MBAP length {len}"),
            ));
        }

        if buf.len() < HEADER_LEN + len - 1 {
            return Ok(None);
        }

        let bytes = buf.split_to(HEADER_LEN + len - 1).freeze();
        let key = BigEndian::read_u16(&bytes[0..2]);
        Ok(Some(RawFrame { key, bytes }))
    }
}

impl Encoder<ModbusTcpAdu> for TcpCodec {
    type Error = Error;

    fn encode(&mut self, adu: ModbusTcpAdu, buf: &mut BytesMut) -> Result<()> {
        encode_message(&adu, buf)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::frame::ModbusPdu;

    #[test]
    fn decode_header_fragment() {
        let mut codec = TcpCodec;
        let mut buf = BytesMut::from(&[0x00, 0x11, 0x00, 0x00, 0x00, 0x00][..]);
        let res = codec.decode(&mut buf).unwrap();
        assert!(res.is_none());
        assert_eq!(buf.len(), 6);
    }

    #[test]
    fn decode_partly_received_message() {
        let mut codec = TcpCodec;
        let mut buf = BytesMut::from(
            &[
                0x00, // transaction id HI
                0x11, // transaction id LO
                0x00, // protocol id HI
                0x00, // protocol id LO
                0x00, // length HI
                0x03, // length LO
                0x66, // unit id
                0x02, // function code
            ][..],
        );
        let res = codec.decode(&mut buf).unwrap();
        assert!(res.is_none());
        assert_eq!(buf.len(), 8);
    }

    #[test]
    fn decode_complete_message_and_keep_the_rest() {
        let mut codec = TcpCodec;
        let mut buf = BytesMut::from(
            &[
                0x00, 0x01, 0x00, 0x00, 0x00, 0x05, 0x01, 0x03, 0x02, 0x03, 0x6A, 0x00,
            ][..],
        );
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.key, 1);
        assert_eq!(frame.bytes.len(), 11);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn decode_with_invalid_protocol_id() {
        let mut codec = TcpCodec;
        let mut buf = BytesMut::from(
            &[
                0x00, 0x00, 0x33, // protocol id HI
                0x12, // protocol id LO
                0x00, 0x03, 0x66, 0x82, 0x03,
            ][..],
        );
        let err = codec.decode(&mut buf).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert_eq!(format!("{err}"), "Invalid protocol ID");
    }

    #[test]
    fn decode_with_oversized_length() {
        let mut codec = TcpCodec;
        let mut buf = BytesMut::from(&[0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x66][..]);
        let err = codec.decode(&mut buf).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn encode_read_request() {
        let mut codec = TcpCodec;
        let mut buf = BytesMut::new();
        let adu = ModbusTcpAdu {
            transaction_identifier: 0,
            unit_identifier: 0,
            pdu: ModbusPdu::ReadInputRegistersRequest {
                starting_address: 0x23,
                quantity: 5,
            },
        };
        codec.encode(adu, &mut buf).unwrap();
        assert_eq!(
            buf.freeze(),
            Bytes::from_static(&[
                0x00, 0x00, 0x00, 0x00, 0x00, 0x06, 0x00, 0x04, 0x00, 0x23, 0x00, 0x05
            ])
        );
    }
}
