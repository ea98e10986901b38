// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use bytes::Bytes;

use super::{
    VariableReadRequestReference, VariableWriteRequestReference, UMAS_ERROR_KEY,
    UMAS_RESPONSE_KEY,
};
use crate::{
    buffer::{ByteOrder, ReadBuffer, WriteBuffer},
    error::{ParseError, SerializationError},
    message::{u16_len, u8_len, Message},
};

/// Size of the pairing key and function key in bytes.
const HEADER_LEN: u16 = 2;

fn remainder(byte_length: u16, consumed: u16) -> Result<usize, ParseError> {
    byte_length
        .checked_sub(consumed)
        .map(usize::from)
        .ok_or_else(|| {
            ParseError::InvalidData(
                format!("UMAS item of {byte_length} bytes is shorter than its {consumed} byte header")
                    .into(),
            )
        })
}

/// Memory bank descriptor of a PLC ident response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlcMemoryBlockIdent {
    pub block_type: u8,
    pub folio: u8,
    pub status: u16,
    pub memory_length: u32,
}

impl PlcMemoryBlockIdent {
    pub fn parse(rb: &mut ReadBuffer<'_>) -> Result<Self, ParseError> {
        rb.push_context(Self::NAME);
        let ident = Self {
            block_type: rb.read_unsigned_byte(8)?,
            folio: rb.read_unsigned_byte(8)?,
            status: rb.read_unsigned_short(16)?,
            memory_length: rb.read_unsigned_int(32)?,
        };
        rb.pop_context(Self::NAME)?;
        Ok(ident)
    }
}

impl Message for PlcMemoryBlockIdent {
    const NAME: &'static str = "PlcMemoryBlockIdent";
    const BYTE_ORDER: ByteOrder = ByteOrder::LittleEndian;

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), SerializationError> {
        wb.push_context(Self::NAME);
        wb.write_unsigned_byte(self.block_type, 8)?;
        wb.write_unsigned_byte(self.folio, 8)?;
        wb.write_unsigned_short(self.status, 16)?;
        wb.write_unsigned_int(self.memory_length, 32)?;
        wb.pop_context(Self::NAME)
    }

    fn length_in_bits(&self) -> usize {
        8 + 8 + 16 + 32
    }
}

/// The kind of a [`UmasPduPayload`] without its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UmasPduKind {
    InitCommsRequest,
    PlcIdentRequest,
    ProjectInfoRequest,
    PlcStatusRequest,
    ReadMemoryBlockRequest,
    ReadVariableRequest,
    WriteVariableRequest,
    ReadUnlocatedVariableNamesRequest,
    InitCommsResponse,
    PlcIdentResponse,
    ProjectInfoResponse,
    PlcStatusResponse,
    ReadMemoryBlockResponse,
    ReadVariableResponse,
    WriteVariableResponse,
    ReadUnlocatedVariableNamesResponse,
    ErrorResponse,
}

impl UmasPduKind {
    /// Dispatch table, searched in order.
    pub const ALL: [Self; 17] = [
        Self::InitCommsRequest,
        Self::PlcIdentRequest,
        Self::ProjectInfoRequest,
        Self::PlcStatusRequest,
        Self::ReadMemoryBlockRequest,
        Self::ReadVariableRequest,
        Self::WriteVariableRequest,
        Self::ReadUnlocatedVariableNamesRequest,
        Self::InitCommsResponse,
        Self::PlcIdentResponse,
        Self::ProjectInfoResponse,
        Self::PlcStatusResponse,
        Self::ReadMemoryBlockResponse,
        Self::ReadVariableResponse,
        Self::WriteVariableResponse,
        Self::ReadUnlocatedVariableNamesResponse,
        Self::ErrorResponse,
    ];

    /// `(umas_function_key, umas_request_function_key)`; `None` matches any
    /// request function key.
    #[must_use]
    pub const fn discriminators(self) -> (u8, Option<u8>) {
        use UmasPduKind::*;
        match self {
            InitCommsRequest => (0x01, None),
            PlcIdentRequest => (0x02, None),
            ProjectInfoRequest => (0x03, None),
            PlcStatusRequest => (0x04, None),
            ReadMemoryBlockRequest => (0x20, None),
            ReadVariableRequest => (0x22, None),
            WriteVariableRequest => (0x23, None),
            ReadUnlocatedVariableNamesRequest => (0x26, None),
            InitCommsResponse => (UMAS_RESPONSE_KEY, Some(0x01)),
            PlcIdentResponse => (UMAS_RESPONSE_KEY, Some(0x02)),
            ProjectInfoResponse => (UMAS_RESPONSE_KEY, Some(0x03)),
            PlcStatusResponse => (UMAS_RESPONSE_KEY, Some(0x04)),
            ReadMemoryBlockResponse => (UMAS_RESPONSE_KEY, Some(0x20)),
            ReadVariableResponse => (UMAS_RESPONSE_KEY, Some(0x22)),
            WriteVariableResponse => (UMAS_RESPONSE_KEY, Some(0x23)),
            ReadUnlocatedVariableNamesResponse => (UMAS_RESPONSE_KEY, Some(0x26)),
            ErrorResponse => (UMAS_ERROR_KEY, None),
        }
    }

    #[must_use]
    pub const fn function_key(self) -> u8 {
        self.discriminators().0
    }

    /// Function key of the request this kind answers, if it is a response.
    #[must_use]
    pub const fn request_function_key(self) -> Option<u8> {
        self.discriminators().1
    }

    pub fn lookup(umas_function_key: u8, umas_request_function_key: u8) -> Result<Self, ParseError> {
        Self::ALL
            .into_iter()
            .find(|kind| {
                let (function_key, request_key) = kind.discriminators();
                function_key == umas_function_key
                    && request_key.map_or(true, |key| key == umas_request_function_key)
            })
            .ok_or_else(|| ParseError::UnsupportedCase {
                type_name: UmasPduItem::NAME,
                discriminators: format!(
                    "umasFunctionKey=0x{umas_function_key:02X}, umasRequestFunctionKey=0x{umas_request_function_key:02X}"
                ),
            })
    }
}

/// Fields of a UMAS item following its function key.
#[derive(Debug, Clone, PartialEq)]
pub enum UmasPduPayload {
    InitCommsRequest {
        unknown_object: u8,
    },
    PlcIdentRequest,
    ProjectInfoRequest {
        subcode: u8,
    },
    PlcStatusRequest,
    ReadMemoryBlockRequest {
        range: u8,
        block_number: u16,
        offset: u16,
        unknown_object1: u16,
        number_of_bytes: u16,
    },
    ReadVariableRequest {
        /// Project CRC learned from the project info response.
        crc: u32,
        variables: Vec<VariableReadRequestReference>,
    },
    WriteVariableRequest {
        crc: u32,
        variables: Vec<VariableWriteRequestReference>,
    },
    ReadUnlocatedVariableNamesRequest {
        /// Record format of the requested symbol table page.
        record_type: u16,
        index: u8,
        hardware_id: u32,
        block_no: u16,
        offset: u16,
        blank: u16,
    },
    InitCommsResponse {
        max_frame_size: u16,
        firmware_version: u16,
        not_sure: u32,
        internal_code: u32,
        hostname: String,
    },
    PlcIdentResponse {
        range: u16,
        ident: u32,
        model: u16,
        com_version: u16,
        com_patch_version: u16,
        int_version: u16,
        hardware_version: u16,
        crash_code: u32,
        hostname: String,
        memory_idents: Vec<PlcMemoryBlockIdent>,
    },
    ProjectInfoResponse {
        crc: u32,
        data: Bytes,
    },
    PlcStatusResponse {
        not_used1: u8,
        not_used2: u16,
        blocks: Vec<u32>,
    },
    ReadMemoryBlockResponse {
        range: u8,
        /// Raw block, see [`UmasMemoryBlock`](super::UmasMemoryBlock).
        block: Bytes,
    },
    ReadVariableResponse {
        block: Bytes,
    },
    WriteVariableResponse,
    ReadUnlocatedVariableNamesResponse {
        /// Raw symbol table page, see [`UmasVariableBlock`](super::UmasVariableBlock).
        block: Bytes,
    },
    ErrorResponse {
        block: Bytes,
    },
}

impl UmasPduPayload {
    #[must_use]
    pub fn kind(&self) -> UmasPduKind {
        use UmasPduKind as K;
        use UmasPduPayload as P;
        match self {
            P::InitCommsRequest { .. } => K::InitCommsRequest,
            P::PlcIdentRequest => K::PlcIdentRequest,
            P::ProjectInfoRequest { .. } => K::ProjectInfoRequest,
            P::PlcStatusRequest => K::PlcStatusRequest,
            P::ReadMemoryBlockRequest { .. } => K::ReadMemoryBlockRequest,
            P::ReadVariableRequest { .. } => K::ReadVariableRequest,
            P::WriteVariableRequest { .. } => K::WriteVariableRequest,
            P::ReadUnlocatedVariableNamesRequest { .. } => K::ReadUnlocatedVariableNamesRequest,
            P::InitCommsResponse { .. } => K::InitCommsResponse,
            P::PlcIdentResponse { .. } => K::PlcIdentResponse,
            P::ProjectInfoResponse { .. } => K::ProjectInfoResponse,
            P::PlcStatusResponse { .. } => K::PlcStatusResponse,
            P::ReadMemoryBlockResponse { .. } => K::ReadMemoryBlockResponse,
            P::ReadVariableResponse { .. } => K::ReadVariableResponse,
            P::WriteVariableResponse => K::WriteVariableResponse,
            P::ReadUnlocatedVariableNamesResponse { .. } => K::ReadUnlocatedVariableNamesResponse,
            P::ErrorResponse { .. } => K::ErrorResponse,
        }
    }

    #[allow(clippy::too_many_lines)]
    fn parse(
        rb: &mut ReadBuffer<'_>,
        kind: UmasPduKind,
        byte_length: u16,
    ) -> Result<Self, ParseError> {
        use UmasPduKind as K;
        let payload = match kind {
            K::InitCommsRequest => Self::InitCommsRequest {
                unknown_object: rb.read_unsigned_byte(8)?,
            },
            K::PlcIdentRequest => Self::PlcIdentRequest,
            K::ProjectInfoRequest => Self::ProjectInfoRequest {
                subcode: rb.read_unsigned_byte(8)?,
            },
            K::PlcStatusRequest => Self::PlcStatusRequest,
            K::ReadMemoryBlockRequest => Self::ReadMemoryBlockRequest {
                range: rb.read_unsigned_byte(8)?,
                block_number: rb.read_unsigned_short(16)?,
                offset: rb.read_unsigned_short(16)?,
                unknown_object1: rb.read_unsigned_short(16)?,
                number_of_bytes: rb.read_unsigned_short(16)?,
            },
            K::ReadVariableRequest => {
                let crc = rb.read_unsigned_int(32)?;
                let count = rb.read_unsigned_byte(8)?;
                let variables = (0..count)
                    .map(|_| VariableReadRequestReference::parse(rb))
                    .collect::<Result<_, _>>()?;
                Self::ReadVariableRequest { crc, variables }
            }
            K::WriteVariableRequest => {
                let crc = rb.read_unsigned_int(32)?;
                let count = rb.read_unsigned_byte(8)?;
                let variables = (0..count)
                    .map(|_| VariableWriteRequestReference::parse(rb))
                    .collect::<Result<_, _>>()?;
                Self::WriteVariableRequest { crc, variables }
            }
            K::ReadUnlocatedVariableNamesRequest => Self::ReadUnlocatedVariableNamesRequest {
                record_type: rb.read_unsigned_short(16)?,
                index: rb.read_unsigned_byte(8)?,
                hardware_id: rb.read_unsigned_int(32)?,
                block_no: rb.read_unsigned_short(16)?,
                offset: rb.read_unsigned_short(16)?,
                blank: rb.read_unsigned_short(16)?,
            },
            K::InitCommsResponse => {
                let max_frame_size = rb.read_unsigned_short(16)?;
                let firmware_version = rb.read_unsigned_short(16)?;
                let not_sure = rb.read_unsigned_int(32)?;
                let internal_code = rb.read_unsigned_int(32)?;
                let hostname_length = rb.read_unsigned_byte(8)?;
                let hostname = rb.read_bytes(hostname_length.into())?;
                Self::InitCommsResponse {
                    max_frame_size,
                    firmware_version,
                    not_sure,
                    internal_code,
                    hostname: String::from_utf8_lossy(&hostname).into_owned(),
                }
            }
            K::PlcIdentResponse => {
                let range = rb.read_unsigned_short(16)?;
                let ident = rb.read_unsigned_int(32)?;
                let model = rb.read_unsigned_short(16)?;
                let com_version = rb.read_unsigned_short(16)?;
                let com_patch_version = rb.read_unsigned_short(16)?;
                let int_version = rb.read_unsigned_short(16)?;
                let hardware_version = rb.read_unsigned_short(16)?;
                let crash_code = rb.read_unsigned_int(32)?;
                let hostname_length = rb.read_unsigned_byte(8)?;
                let hostname = rb.read_bytes(hostname_length.into())?;
                let number_of_memory_banks = rb.read_unsigned_byte(8)?;
                let memory_idents = (0..number_of_memory_banks)
                    .map(|_| PlcMemoryBlockIdent::parse(rb))
                    .collect::<Result<_, _>>()?;
                Self::PlcIdentResponse {
                    range,
                    ident,
                    model,
                    com_version,
                    com_patch_version,
                    int_version,
                    hardware_version,
                    crash_code,
                    hostname: String::from_utf8_lossy(&hostname).into_owned(),
                    memory_idents,
                }
            }
            K::ProjectInfoResponse => {
                let crc = rb.read_unsigned_int(32)?;
                let data = rb.read_bytes(remainder(byte_length, HEADER_LEN + 4)?)?;
                Self::ProjectInfoResponse {
                    crc,
                    data: data.into(),
                }
            }
            K::PlcStatusResponse => {
                let not_used1 = rb.read_unsigned_byte(8)?;
                let not_used2 = rb.read_unsigned_short(16)?;
                let number_of_blocks = rb.read_unsigned_byte(8)?;
                let blocks = (0..number_of_blocks)
                    .map(|_| rb.read_unsigned_int(32))
                    .collect::<Result<_, _>>()?;
                Self::PlcStatusResponse {
                    not_used1,
                    not_used2,
                    blocks,
                }
            }
            K::ReadMemoryBlockResponse => {
                let range = rb.read_unsigned_byte(8)?;
                let number_of_bytes = rb.read_unsigned_short(16)?;
                let block = rb.read_bytes(number_of_bytes.into())?;
                Self::ReadMemoryBlockResponse {
                    range,
                    block: block.into(),
                }
            }
            K::ReadVariableResponse => Self::ReadVariableResponse {
                block: rb.read_bytes(remainder(byte_length, HEADER_LEN)?)?.into(),
            },
            K::WriteVariableResponse => Self::WriteVariableResponse,
            K::ReadUnlocatedVariableNamesResponse => Self::ReadUnlocatedVariableNamesResponse {
                block: rb.read_bytes(remainder(byte_length, HEADER_LEN)?)?.into(),
            },
            K::ErrorResponse => Self::ErrorResponse {
                block: rb.read_bytes(remainder(byte_length, HEADER_LEN)?)?.into(),
            },
        };
        Ok(payload)
    }

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), SerializationError> {
        match self {
            Self::InitCommsRequest { unknown_object } => wb.write_unsigned_byte(*unknown_object, 8),
            Self::PlcIdentRequest
            | Self::PlcStatusRequest
            | Self::WriteVariableResponse => Ok(()),
            Self::ProjectInfoRequest { subcode } => wb.write_unsigned_byte(*subcode, 8),
            Self::ReadMemoryBlockRequest {
                range,
                block_number,
                offset,
                unknown_object1,
                number_of_bytes,
            } => {
                wb.write_unsigned_byte(*range, 8)?;
                wb.write_unsigned_short(*block_number, 16)?;
                wb.write_unsigned_short(*offset, 16)?;
                wb.write_unsigned_short(*unknown_object1, 16)?;
                wb.write_unsigned_short(*number_of_bytes, 16)
            }
            Self::ReadVariableRequest { crc, variables } => {
                wb.write_unsigned_int(*crc, 32)?;
                wb.write_unsigned_byte(u8_len(variables.len())?, 8)?;
                variables.iter().try_for_each(|variable| variable.serialize(wb))
            }
            Self::WriteVariableRequest { crc, variables } => {
                wb.write_unsigned_int(*crc, 32)?;
                wb.write_unsigned_byte(u8_len(variables.len())?, 8)?;
                variables.iter().try_for_each(|variable| variable.serialize(wb))
            }
            Self::ReadUnlocatedVariableNamesRequest {
                record_type,
                index,
                hardware_id,
                block_no,
                offset,
                blank,
            } => {
                wb.write_unsigned_short(*record_type, 16)?;
                wb.write_unsigned_byte(*index, 8)?;
                wb.write_unsigned_int(*hardware_id, 32)?;
                wb.write_unsigned_short(*block_no, 16)?;
                wb.write_unsigned_short(*offset, 16)?;
                wb.write_unsigned_short(*blank, 16)
            }
            Self::InitCommsResponse {
                max_frame_size,
                firmware_version,
                not_sure,
                internal_code,
                hostname,
            } => {
                wb.write_unsigned_short(*max_frame_size, 16)?;
                wb.write_unsigned_short(*firmware_version, 16)?;
                wb.write_unsigned_int(*not_sure, 32)?;
                wb.write_unsigned_int(*internal_code, 32)?;
                wb.write_unsigned_byte(u8_len(hostname.len())?, 8)?;
                wb.write_bytes(hostname.as_bytes())
            }
            Self::PlcIdentResponse {
                range,
                ident,
                model,
                com_version,
                com_patch_version,
                int_version,
                hardware_version,
                crash_code,
                hostname,
                memory_idents,
            } => {
                wb.write_unsigned_short(*range, 16)?;
                wb.write_unsigned_int(*ident, 32)?;
                wb.write_unsigned_short(*model, 16)?;
                wb.write_unsigned_short(*com_version, 16)?;
                wb.write_unsigned_short(*com_patch_version, 16)?;
                wb.write_unsigned_short(*int_version, 16)?;
                wb.write_unsigned_short(*hardware_version, 16)?;
                wb.write_unsigned_int(*crash_code, 32)?;
                wb.write_unsigned_byte(u8_len(hostname.len())?, 8)?;
                wb.write_bytes(hostname.as_bytes())?;
                wb.write_unsigned_byte(u8_len(memory_idents.len())?, 8)?;
                memory_idents.iter().try_for_each(|ident| ident.serialize(wb))
            }
            Self::ProjectInfoResponse { crc, data } => {
                wb.write_unsigned_int(*crc, 32)?;
                wb.write_bytes(data)
            }
            Self::PlcStatusResponse {
                not_used1,
                not_used2,
                blocks,
            } => {
                wb.write_unsigned_byte(*not_used1, 8)?;
                wb.write_unsigned_short(*not_used2, 16)?;
                wb.write_unsigned_byte(u8_len(blocks.len())?, 8)?;
                blocks
                    .iter()
                    .try_for_each(|block| wb.write_unsigned_int(*block, 32))
            }
            Self::ReadMemoryBlockResponse { range, block } => {
                wb.write_unsigned_byte(*range, 8)?;
                wb.write_unsigned_short(u16_len(block.len())?, 16)?;
                wb.write_bytes(block)
            }
            Self::ReadVariableResponse { block }
            | Self::ReadUnlocatedVariableNamesResponse { block }
            | Self::ErrorResponse { block } => wb.write_bytes(block),
        }
    }

    fn length_in_bits(&self) -> usize {
        match self {
            Self::PlcIdentRequest | Self::PlcStatusRequest | Self::WriteVariableResponse => 0,
            Self::InitCommsRequest { .. } | Self::ProjectInfoRequest { .. } => 8,
            Self::ReadMemoryBlockRequest { .. } => 8 + 4 * 16,
            Self::ReadVariableRequest { variables, .. } => {
                32 + 8 + variables.iter().map(Message::length_in_bits).sum::<usize>()
            }
            Self::WriteVariableRequest { variables, .. } => {
                32 + 8 + variables.iter().map(Message::length_in_bits).sum::<usize>()
            }
            Self::ReadUnlocatedVariableNamesRequest { .. } => 16 + 8 + 32 + 3 * 16,
            Self::InitCommsResponse { hostname, .. } => 16 + 16 + 32 + 32 + 8 + hostname.len() * 8,
            Self::PlcIdentResponse {
                hostname,
                memory_idents,
                ..
            } => {
                16 + 32
                    + 5 * 16
                    + 32
                    + 8
                    + hostname.len() * 8
                    + 8
                    + memory_idents.iter().map(Message::length_in_bits).sum::<usize>()
            }
            Self::ProjectInfoResponse { data, .. } => 32 + data.len() * 8,
            Self::PlcStatusResponse { blocks, .. } => 8 + 16 + 8 + blocks.len() * 32,
            Self::ReadMemoryBlockResponse { block, .. } => 8 + 16 + block.len() * 8,
            Self::ReadVariableResponse { block }
            | Self::ReadUnlocatedVariableNamesResponse { block }
            | Self::ErrorResponse { block } => block.len() * 8,
        }
    }
}

/// A UMAS item carried by Modbus function `0x5A`.
///
/// All multi-byte fields are little-endian.
#[derive(Debug, Clone, PartialEq)]
pub struct UmasPduItem {
    /// Correlates a response with its request.
    pub pairing_key: u8,
    pub payload: UmasPduPayload,
}

impl UmasPduItem {
    #[must_use]
    pub fn new(pairing_key: u8, payload: UmasPduPayload) -> Self {
        Self {
            pairing_key,
            payload,
        }
    }

    #[must_use]
    pub fn kind(&self) -> UmasPduKind {
        self.payload.kind()
    }

    /// Parses an item of `byte_length` bytes, header included.
    ///
    /// `umas_request_function_key` is the function key of the request a
    /// response answers and is ignored for requests.
    pub fn parse(
        rb: &mut ReadBuffer<'_>,
        byte_length: u16,
        umas_request_function_key: u8,
    ) -> Result<Self, ParseError> {
        rb.with_byte_order(ByteOrder::LittleEndian, |rb| {
            rb.push_context(Self::NAME);
            let pairing_key = rb.read_unsigned_byte(8)?;
            let umas_function_key = rb.read_unsigned_byte(8)?;
            let kind = UmasPduKind::lookup(umas_function_key, umas_request_function_key)?;
            let payload = UmasPduPayload::parse(rb, kind, byte_length)?;
            rb.pop_context(Self::NAME)?;
            Ok(Self {
                pairing_key,
                payload,
            })
        })
    }
}

impl Message for UmasPduItem {
    const NAME: &'static str = "UmasPDUItem";
    const BYTE_ORDER: ByteOrder = ByteOrder::LittleEndian;

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), SerializationError> {
        wb.with_byte_order(ByteOrder::LittleEndian, |wb| {
            wb.push_context(Self::NAME);
            wb.write_unsigned_byte(self.pairing_key, 8)?;
            wb.write_unsigned_byte(self.kind().function_key(), 8)?;
            self.payload.serialize(wb)?;
            wb.pop_context(Self::NAME)
        })
    }

    fn length_in_bits(&self) -> usize {
        usize::from(HEADER_LEN) * 8 + self.payload.length_in_bits()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn parse(bytes: &[u8], request_key: u8) -> Result<UmasPduItem, ParseError> {
        let byte_length = u16::try_from(bytes.len()).unwrap();
        let mut rb = ReadBuffer::new(bytes, ByteOrder::BigEndian);
        let item = UmasPduItem::parse(&mut rb, byte_length, request_key)?;
        assert_eq!(rb.pos(), item.length_in_bits(), "{:?}", item.kind());
        assert_eq!(rb.byte_order(), ByteOrder::BigEndian);
        Ok(item)
    }

    fn assert_wire(item: &UmasPduItem, bytes: &[u8], request_key: u8) {
        assert_eq!(&item.to_bytes().unwrap()[..], bytes, "{:?}", item.kind());
        assert_eq!(&parse(bytes, request_key).unwrap(), item);
    }

    mod dispatch {
        use super::*;

        #[test]
        fn table_is_unique() {
            let keys: HashSet<_> = UmasPduKind::ALL
                .iter()
                .map(|kind| kind.discriminators())
                .collect();
            assert_eq!(keys.len(), UmasPduKind::ALL.len());
        }

        #[test]
        fn every_kind_is_found_by_its_own_discriminators() {
            for kind in UmasPduKind::ALL {
                let (function_key, request_key) = kind.discriminators();
                assert_eq!(
                    UmasPduKind::lookup(function_key, request_key.unwrap_or(0)).unwrap(),
                    kind
                );
            }
        }

        #[test]
        fn responses_are_keyed_by_the_request() {
            // Given
            let bytes = [
                0x00, 0xFE, 0x00, 0x04, 0x02, 0x01, 0x78, 0x56, 0x34, 0x12, 0x04, 0x03, 0x02,
                0x01, 0x03, b'P', b'L', b'C',
            ];

            // When
            let item = parse(&bytes, 0x01).unwrap();

            // Then
            assert_eq!(item.kind(), UmasPduKind::InitCommsResponse);
            assert_eq!(
                item.payload,
                UmasPduPayload::InitCommsResponse {
                    max_frame_size: 0x0400,
                    firmware_version: 0x0102,
                    not_sure: 0x1234_5678,
                    internal_code: 0x0102_0304,
                    hostname: "PLC".into(),
                }
            );
            assert_eq!(&item.to_bytes().unwrap()[..], &bytes);
        }

        #[test]
        fn unknown_keys_are_unsupported() {
            let err = parse(&[0x00, 0x7F], 0x00).unwrap_err();
            assert!(matches!(err, ParseError::UnsupportedCase { .. }));
            let err = parse(&[0x00, 0xFE], 0x42).unwrap_err();
            assert!(err.to_string().contains("umasRequestFunctionKey=0x42"));
        }

        #[test]
        fn error_response_keeps_the_remainder() {
            let item = parse(&[0x00, 0xFD, 0x81, 0x02], 0x22).unwrap();
            assert_eq!(
                item.payload,
                UmasPduPayload::ErrorResponse {
                    block: Bytes::from_static(&[0x81, 0x02])
                }
            );
        }
    }

    mod requests {
        use super::*;

        #[test]
        fn init_comms() {
            let item = UmasPduItem::new(0x00, UmasPduPayload::InitCommsRequest { unknown_object: 0 });
            assert_wire(&item, &[0x00, 0x01, 0x00], 0);
        }

        #[test]
        fn read_memory_block() {
            let item = UmasPduItem::new(
                0x00,
                UmasPduPayload::ReadMemoryBlockRequest {
                    range: 0,
                    block_number: 0x30,
                    offset: 0,
                    unknown_object1: 0,
                    number_of_bytes: 0x21,
                },
            );
            assert_wire(
                &item,
                &[0x00, 0x20, 0x00, 0x30, 0x00, 0x00, 0x00, 0x00, 0x00, 0x21, 0x00],
                0,
            );
        }

        #[test]
        fn read_variable() {
            let item = UmasPduItem::new(
                0x01,
                UmasPduPayload::ReadVariableRequest {
                    crc: 0xAABB_CCDD,
                    variables: vec![VariableReadRequestReference {
                        data_size_index: 2,
                        block: 3,
                        base_offset: 1,
                        offset: 0x10,
                        array_length: None,
                    }],
                },
            );
            assert_wire(
                &item,
                &[
                    0x01, 0x22, 0xDD, 0xCC, 0xBB, 0xAA, 0x01, 0x02, 0x03, 0x00, 0x01, 0x10, 0x00,
                ],
                0,
            );
        }

        #[test]
        fn read_unlocated_variable_names() {
            let item = UmasPduItem::new(
                0x00,
                UmasPduPayload::ReadUnlocatedVariableNamesRequest {
                    record_type: 0xDD02,
                    index: 1,
                    hardware_id: 0x0102_0304,
                    block_no: 0x0200,
                    offset: 0,
                    blank: 0,
                },
            );
            let bytes = item.to_bytes().unwrap();
            assert_eq!(&bytes[..5], &[0x00, 0x26, 0x02, 0xDD, 0x01]);
            assert_eq!(parse(&bytes, 0).unwrap(), item);
        }
    }

    mod responses {
        use super::*;

        #[test]
        fn plc_ident() {
            let item = UmasPduItem::new(
                0x00,
                UmasPduPayload::PlcIdentResponse {
                    range: 1,
                    ident: 0x0102_0304,
                    model: 0x0123,
                    com_version: 2,
                    com_patch_version: 3,
                    int_version: 4,
                    hardware_version: 5,
                    crash_code: 0,
                    hostname: "M580".into(),
                    memory_idents: vec![PlcMemoryBlockIdent {
                        block_type: 1,
                        folio: 0,
                        status: 0,
                        memory_length: 0x0001_0000,
                    }],
                },
            );
            let bytes = item.to_bytes().unwrap();
            assert_eq!(bytes.len(), 2 + 20 + 1 + 4 + 1 + 8);
            assert_eq!(parse(&bytes, 0x02).unwrap(), item);
        }

        #[test]
        fn project_info_takes_the_remaining_bytes() {
            let item = parse(&[0x00, 0xFE, 0x78, 0x56, 0x34, 0x12, 0xAA, 0xBB], 0x03).unwrap();
            assert_eq!(
                item.payload,
                UmasPduPayload::ProjectInfoResponse {
                    crc: 0x1234_5678,
                    data: Bytes::from_static(&[0xAA, 0xBB]),
                }
            );
        }

        #[test]
        fn plc_status() {
            let item = UmasPduItem::new(
                0x00,
                UmasPduPayload::PlcStatusResponse {
                    not_used1: 0,
                    not_used2: 0,
                    blocks: vec![1, 2],
                },
            );
            assert_wire(
                &item,
                &[
                    0x00, 0xFE, 0x00, 0x00, 0x00, 0x02, 0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00,
                    0x00,
                ],
                0x04,
            );
        }

        #[test]
        fn read_memory_block() {
            let item = UmasPduItem::new(
                0x00,
                UmasPduPayload::ReadMemoryBlockResponse {
                    range: 0,
                    block: Bytes::from_static(&[0xDE, 0xAD]),
                },
            );
            assert_wire(&item, &[0x00, 0xFE, 0x00, 0x02, 0x00, 0xDE, 0xAD], 0x20);
        }

        #[test]
        fn write_variable_is_empty() {
            let item = UmasPduItem::new(0x00, UmasPduPayload::WriteVariableResponse);
            assert_wire(&item, &[0x00, 0xFE], 0x23);
        }

        #[test]
        fn short_length_is_invalid() {
            let mut rb = ReadBuffer::new(&[0x00, 0xFE, 0x00], ByteOrder::LittleEndian);
            assert!(matches!(
                UmasPduItem::parse(&mut rb, 1, 0x22),
                Err(ParseError::InvalidData(_))
            ));
        }
    }
}
