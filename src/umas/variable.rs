// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Variable references of read/write requests and the symbol table blocks.

use bytes::Bytes;

use crate::{
    buffer::{ByteOrder, ReadBuffer, WriteBuffer},
    data_item::umas::data_size_bytes,
    error::{ParseError, SerializationError},
    message::{u16_len, u8_len, Message},
};

fn read_array_flag(rb: &mut ReadBuffer<'_>) -> Result<bool, ParseError> {
    match rb.read_unsigned_byte(4)? {
        0 => Ok(false),
        1 => Ok(true),
        flag => Err(ParseError::InvalidData(
            format!("invalid array flag {flag}").into(),
        )),
    }
}

/// Address of one variable in a read variable request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableReadRequestReference {
    /// Element size index, see [`data_size_bytes`].
    pub data_size_index: u8,
    pub block: u16,
    pub base_offset: u8,
    pub offset: u16,
    /// Number of elements, present for arrays only.
    pub array_length: Option<u16>,
}

impl VariableReadRequestReference {
    pub fn parse(rb: &mut ReadBuffer<'_>) -> Result<Self, ParseError> {
        rb.push_context(Self::NAME);
        let is_array = read_array_flag(rb)?;
        let data_size_index = rb.read_unsigned_byte(4)?;
        let block = rb.read_unsigned_short(16)?;
        let base_offset = rb.read_unsigned_byte(8)?;
        let offset = rb.read_unsigned_short(16)?;
        let array_length = if is_array {
            Some(rb.read_unsigned_short(16)?)
        } else {
            None
        };
        rb.pop_context(Self::NAME)?;
        Ok(Self {
            data_size_index,
            block,
            base_offset,
            offset,
            array_length,
        })
    }
}

impl Message for VariableReadRequestReference {
    const NAME: &'static str = "VariableReadRequestReference";
    const BYTE_ORDER: ByteOrder = ByteOrder::LittleEndian;

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), SerializationError> {
        wb.push_context(Self::NAME);
        wb.write_unsigned_byte(self.array_length.is_some().into(), 4)?;
        wb.write_unsigned_byte(self.data_size_index, 4)?;
        wb.write_unsigned_short(self.block, 16)?;
        wb.write_unsigned_byte(self.base_offset, 8)?;
        wb.write_unsigned_short(self.offset, 16)?;
        if let Some(array_length) = self.array_length {
            wb.write_unsigned_short(array_length, 16)?;
        }
        wb.pop_context(Self::NAME)
    }

    fn length_in_bits(&self) -> usize {
        8 + 16 + 8 + 16 + self.array_length.map_or(0, |_| 16)
    }
}

/// Address and new contents of one variable in a write variable request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableWriteRequestReference {
    pub data_size_index: u8,
    pub block: u16,
    pub base_offset: u8,
    pub offset: u16,
    pub array_length: Option<u16>,
    /// Little-endian encoded value, `data_size_bytes * array_length` bytes.
    pub record_data: Bytes,
}

impl VariableWriteRequestReference {
    /// Bytes of `record_data` implied by the size index and array length.
    #[must_use]
    pub fn record_data_len(data_size_index: u8, array_length: Option<u16>) -> usize {
        data_size_bytes(data_size_index) * usize::from(array_length.unwrap_or(1))
    }

    pub fn parse(rb: &mut ReadBuffer<'_>) -> Result<Self, ParseError> {
        rb.push_context(Self::NAME);
        let is_array = read_array_flag(rb)?;
        let data_size_index = rb.read_unsigned_byte(4)?;
        let block = rb.read_unsigned_short(16)?;
        let base_offset = rb.read_unsigned_byte(8)?;
        let offset = rb.read_unsigned_short(16)?;
        let array_length = if is_array {
            Some(rb.read_unsigned_short(16)?)
        } else {
            None
        };
        let record_data = rb
            .read_bytes(Self::record_data_len(data_size_index, array_length))?
            .into();
        rb.pop_context(Self::NAME)?;
        Ok(Self {
            data_size_index,
            block,
            base_offset,
            offset,
            array_length,
            record_data,
        })
    }
}

impl Message for VariableWriteRequestReference {
    const NAME: &'static str = "VariableWriteRequestReference";
    const BYTE_ORDER: ByteOrder = ByteOrder::LittleEndian;

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), SerializationError> {
        let expected = Self::record_data_len(self.data_size_index, self.array_length);
        if self.record_data.len() != expected {
            return Err(SerializationError::InvalidData(
                format!(
                    "record data of {} bytes where {expected} are expected",
                    self.record_data.len()
                )
                .into(),
            ));
        }
        wb.push_context(Self::NAME);
        wb.write_unsigned_byte(self.array_length.is_some().into(), 4)?;
        wb.write_unsigned_byte(self.data_size_index, 4)?;
        wb.write_unsigned_short(self.block, 16)?;
        wb.write_unsigned_byte(self.base_offset, 8)?;
        wb.write_unsigned_short(self.offset, 16)?;
        if let Some(array_length) = self.array_length {
            wb.write_unsigned_short(array_length, 16)?;
        }
        wb.write_bytes(&self.record_data)?;
        wb.pop_context(Self::NAME)
    }

    fn length_in_bits(&self) -> usize {
        8 + 16 + 8 + 16 + self.array_length.map_or(0, |_| 16) + self.record_data.len() * 8
    }
}

/// An entry of the unlocated variable symbol table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UmasUnlocatedVariableReference {
    /// A [`UmasDataType`](crate::data_item::umas::UmasDataType) code or
    /// the index of a user defined type.
    pub data_type: u16,
    pub block: u16,
    pub offset: u16,
    pub base_offset: u16,
    pub unknown4: u16,
    pub value: String,
}

impl UmasUnlocatedVariableReference {
    pub fn parse(rb: &mut ReadBuffer<'_>) -> Result<Self, ParseError> {
        rb.push_context(Self::NAME);
        let data_type = rb.read_unsigned_short(16)?;
        let block = rb.read_unsigned_short(16)?;
        let offset = rb.read_unsigned_short(16)?;
        let base_offset = rb.read_unsigned_short(16)?;
        let unknown4 = rb.read_unsigned_short(16)?;
        let string_length = rb.read_unsigned_short(16)?;
        let value = rb.read_terminated_str(string_length.into())?;
        rb.pop_context(Self::NAME)?;
        Ok(Self {
            data_type,
            block,
            offset,
            base_offset,
            unknown4,
            value,
        })
    }
}

impl Message for UmasUnlocatedVariableReference {
    const NAME: &'static str = "UmasUnlocatedVariableReference";
    const BYTE_ORDER: ByteOrder = ByteOrder::LittleEndian;

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), SerializationError> {
        let string_length = self.value.len() + 1;
        wb.push_context(Self::NAME);
        wb.write_unsigned_short(self.data_type, 16)?;
        wb.write_unsigned_short(self.block, 16)?;
        wb.write_unsigned_short(self.offset, 16)?;
        wb.write_unsigned_short(self.base_offset, 16)?;
        wb.write_unsigned_short(self.unknown4, 16)?;
        wb.write_unsigned_short(u16_len(string_length)?, 16)?;
        wb.write_terminated_str(&self.value, string_length)?;
        wb.pop_context(Self::NAME)
    }

    fn length_in_bits(&self) -> usize {
        6 * 16 + (self.value.len() + 1) * 8
    }
}

/// An entry of the data type symbol table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UmasDatatypeReference {
    pub data_size: u16,
    pub unknown1: u16,
    pub class_identifier: u8,
    pub data_type: u8,
    pub value: String,
}

impl UmasDatatypeReference {
    pub fn parse(rb: &mut ReadBuffer<'_>) -> Result<Self, ParseError> {
        rb.push_context(Self::NAME);
        let data_size = rb.read_unsigned_short(16)?;
        let unknown1 = rb.read_unsigned_short(16)?;
        let class_identifier = rb.read_unsigned_byte(8)?;
        let data_type = rb.read_unsigned_byte(8)?;
        let string_length = rb.read_unsigned_byte(8)?;
        let value = rb.read_terminated_str(string_length.into())?;
        rb.pop_context(Self::NAME)?;
        Ok(Self {
            data_size,
            unknown1,
            class_identifier,
            data_type,
            value,
        })
    }
}

impl Message for UmasDatatypeReference {
    const NAME: &'static str = "UmasDatatypeReference";
    const BYTE_ORDER: ByteOrder = ByteOrder::LittleEndian;

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), SerializationError> {
        let string_length = self.value.len() + 1;
        wb.push_context(Self::NAME);
        wb.write_unsigned_short(self.data_size, 16)?;
        wb.write_unsigned_short(self.unknown1, 16)?;
        wb.write_unsigned_byte(self.class_identifier, 8)?;
        wb.write_unsigned_byte(self.data_type, 8)?;
        wb.write_unsigned_byte(u8_len(string_length)?, 8)?;
        wb.write_terminated_str(&self.value, string_length)?;
        wb.pop_context(Self::NAME)
    }

    fn length_in_bits(&self) -> usize {
        16 + 16 + 8 + 8 + 8 + (self.value.len() + 1) * 8
    }
}

/// A page of a symbol table, selected by the record format of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UmasVariableBlock {
    /// Record format `0xDD02`.
    UnlocatedVariableNames {
        range: u8,
        /// Offset of the next page, `0` on the last one.
        next_address: u16,
        unknown1: u16,
        records: Vec<UmasUnlocatedVariableReference>,
    },
    /// Record format `0xDD03`.
    DatatypeNames {
        range: u8,
        next_address: u16,
        unknown1: u8,
        records: Vec<UmasDatatypeReference>,
    },
}

impl UmasVariableBlock {
    pub const UNLOCATED_VARIABLE_NAMES: u16 = 0xDD02;
    pub const DATATYPE_NAMES: u16 = 0xDD03;

    #[must_use]
    pub fn record_format(&self) -> u16 {
        match self {
            Self::UnlocatedVariableNames { .. } => Self::UNLOCATED_VARIABLE_NAMES,
            Self::DatatypeNames { .. } => Self::DATATYPE_NAMES,
        }
    }

    #[must_use]
    pub fn next_address(&self) -> u16 {
        match self {
            Self::UnlocatedVariableNames { next_address, .. }
            | Self::DatatypeNames { next_address, .. } => *next_address,
        }
    }

    pub fn parse(rb: &mut ReadBuffer<'_>, record_format: u16) -> Result<Self, ParseError> {
        rb.with_byte_order(ByteOrder::LittleEndian, |rb| {
            rb.push_context(Self::NAME);
            let block = match record_format {
                Self::UNLOCATED_VARIABLE_NAMES => {
                    let range = rb.read_unsigned_byte(8)?;
                    let next_address = rb.read_unsigned_short(16)?;
                    let unknown1 = rb.read_unsigned_short(16)?;
                    let no_of_records = rb.read_unsigned_short(16)?;
                    let records = (0..no_of_records)
                        .map(|_| UmasUnlocatedVariableReference::parse(rb))
                        .collect::<Result<_, _>>()?;
                    Self::UnlocatedVariableNames {
                        range,
                        next_address,
                        unknown1,
                        records,
                    }
                }
                Self::DATATYPE_NAMES => {
                    let range = rb.read_unsigned_byte(8)?;
                    let next_address = rb.read_unsigned_short(16)?;
                    let unknown1 = rb.read_unsigned_byte(8)?;
                    let no_of_records = rb.read_unsigned_short(16)?;
                    let records = (0..no_of_records)
                        .map(|_| UmasDatatypeReference::parse(rb))
                        .collect::<Result<_, _>>()?;
                    Self::DatatypeNames {
                        range,
                        next_address,
                        unknown1,
                        records,
                    }
                }
                _ => {
                    return Err(ParseError::UnsupportedCase {
                        type_name: Self::NAME,
                        discriminators: format!("recordFormat=0x{record_format:04X}"),
                    })
                }
            };
            rb.pop_context(Self::NAME)?;
            Ok(block)
        })
    }
}

impl Message for UmasVariableBlock {
    const NAME: &'static str = "UmasVariableBlock";
    const BYTE_ORDER: ByteOrder = ByteOrder::LittleEndian;

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), SerializationError> {
        wb.with_byte_order(ByteOrder::LittleEndian, |wb| {
            wb.push_context(Self::NAME);
            match self {
                Self::UnlocatedVariableNames {
                    range,
                    next_address,
                    unknown1,
                    records,
                } => {
                    wb.write_unsigned_byte(*range, 8)?;
                    wb.write_unsigned_short(*next_address, 16)?;
                    wb.write_unsigned_short(*unknown1, 16)?;
                    wb.write_unsigned_short(u16_len(records.len())?, 16)?;
                    records.iter().try_for_each(|record| record.serialize(wb))?;
                }
                Self::DatatypeNames {
                    range,
                    next_address,
                    unknown1,
                    records,
                } => {
                    wb.write_unsigned_byte(*range, 8)?;
                    wb.write_unsigned_short(*next_address, 16)?;
                    wb.write_unsigned_byte(*unknown1, 8)?;
                    wb.write_unsigned_short(u16_len(records.len())?, 16)?;
                    records.iter().try_for_each(|record| record.serialize(wb))?;
                }
            }
            wb.pop_context(Self::NAME)
        })
    }

    fn length_in_bits(&self) -> usize {
        match self {
            Self::UnlocatedVariableNames { records, .. } => {
                8 + 16 + 16 + 16 + records.iter().map(Message::length_in_bits).sum::<usize>()
            }
            Self::DatatypeNames { records, .. } => {
                8 + 16 + 8 + 16 + records.iter().map(Message::length_in_bits).sum::<usize>()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_reference_with_and_without_array_length() {
        let scalar = VariableReadRequestReference {
            data_size_index: 2,
            block: 0x0001,
            base_offset: 0x01,
            offset: 0x0010,
            array_length: None,
        };
        let bytes = scalar.to_bytes().unwrap();
        assert_eq!(&bytes[..], &[0x02, 0x01, 0x00, 0x01, 0x10, 0x00]);

        let array = VariableReadRequestReference {
            array_length: Some(4),
            ..scalar
        };
        let bytes = array.to_bytes().unwrap();
        assert_eq!(&bytes[..], &[0x12, 0x01, 0x00, 0x01, 0x10, 0x00, 0x04, 0x00]);
        let mut rb = ReadBuffer::new(&bytes, ByteOrder::LittleEndian);
        assert_eq!(VariableReadRequestReference::parse(&mut rb).unwrap(), array);
    }

    #[test]
    fn write_reference_data_follows_the_size_index() {
        let reference = VariableWriteRequestReference {
            data_size_index: 3,
            block: 2,
            base_offset: 0,
            offset: 8,
            array_length: Some(2),
            record_data: Bytes::from_static(&[1, 0, 0, 0, 2, 0, 0, 0]),
        };
        let bytes = reference.to_bytes().unwrap();
        assert_eq!(bytes.len(), 16);
        let mut rb = ReadBuffer::new(&bytes, ByteOrder::LittleEndian);
        assert_eq!(VariableWriteRequestReference::parse(&mut rb).unwrap(), reference);

        let short = VariableWriteRequestReference {
            record_data: Bytes::from_static(&[1, 0, 0, 0]),
            ..reference
        };
        assert!(short.to_bytes().is_err());
    }

    #[test]
    fn unlocated_variable_names_page() {
        let block = UmasVariableBlock::UnlocatedVariableNames {
            range: 0,
            next_address: 0,
            unknown1: 0,
            records: vec![UmasUnlocatedVariableReference {
                data_type: 4,
                block: 0x0002,
                offset: 0x0010,
                base_offset: 0,
                unknown4: 0,
                value: "MOTOR_SPEED".into(),
            }],
        };
        let bytes = block.to_bytes().unwrap();
        assert_eq!(bytes.len(), 7 + 12 + 12);
        assert_eq!(bytes.len() * 8, block.length_in_bits());
        // Header: range, next address, unknown, number of records.
        assert_eq!(&bytes[5..7], &[0x01, 0x00]);
        // Record: data type, block, offset, base offset, unknown, string length.
        assert_eq!(&bytes[7..9], &[0x04, 0x00]);
        assert_eq!(&bytes[17..19], &[12, 0]);
        assert_eq!(&bytes[19..30], b"MOTOR_SPEED");
        assert_eq!(bytes[bytes.len() - 1], 0);

        let mut rb = ReadBuffer::new(&bytes, ByteOrder::LittleEndian);
        assert_eq!(UmasVariableBlock::parse(&mut rb, 0xDD02).unwrap(), block);
    }

    #[test]
    fn datatype_names_page() {
        let block = UmasVariableBlock::DatatypeNames {
            range: 0,
            next_address: 0x0042,
            unknown1: 0,
            records: vec![UmasDatatypeReference {
                data_size: 4,
                unknown1: 0,
                class_identifier: 2,
                data_type: 0,
                value: "T_PUMP".into(),
            }],
        };
        let bytes = block.to_bytes().unwrap();
        let mut rb = ReadBuffer::new(&bytes, ByteOrder::LittleEndian);
        let parsed = UmasVariableBlock::parse(&mut rb, 0xDD03).unwrap();
        assert_eq!(parsed.next_address(), 0x42);
        assert_eq!(parsed, block);
    }

    #[test]
    fn unknown_record_formats_are_unsupported() {
        let mut rb = ReadBuffer::new(&[0; 8], ByteOrder::LittleEndian);
        assert!(matches!(
            UmasVariableBlock::parse(&mut rb, 0xDD04),
            Err(ParseError::UnsupportedCase { .. })
        ));
    }
}
