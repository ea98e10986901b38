// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    buffer::{ByteOrder, ReadBuffer, WriteBuffer},
    error::{ParseError, SerializationError},
    message::Message,
};

/// Contents of a memory block read with a read memory block request.
///
/// The layout is selected by the block number and offset of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UmasMemoryBlock {
    /// Block `0x30`, offset `0x00`.
    BasicInfo {
        range: u16,
        not_sure: u32,
        index: u8,
        hardware_id: u32,
    },
}

impl UmasMemoryBlock {
    pub const BASIC_INFO: (u16, u16) = (0x30, 0x00);

    pub fn parse(rb: &mut ReadBuffer<'_>, block_number: u16, offset: u16) -> Result<Self, ParseError> {
        rb.with_byte_order(ByteOrder::LittleEndian, |rb| {
            rb.push_context(Self::NAME);
            let block = match (block_number, offset) {
                Self::BASIC_INFO => Self::BasicInfo {
                    range: rb.read_unsigned_short(16)?,
                    not_sure: rb.read_unsigned_int(32)?,
                    index: rb.read_unsigned_byte(8)?,
                    hardware_id: rb.read_unsigned_int(32)?,
                },
                _ => {
                    return Err(ParseError::UnsupportedCase {
                        type_name: Self::NAME,
                        discriminators: format!(
                            "blockNumber=0x{block_number:02X}, offset=0x{offset:02X}"
                        ),
                    })
                }
            };
            rb.pop_context(Self::NAME)?;
            Ok(block)
        })
    }
}

impl Message for UmasMemoryBlock {
    const NAME: &'static str = "UmasMemoryBlock";
    const BYTE_ORDER: ByteOrder = ByteOrder::LittleEndian;

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), SerializationError> {
        wb.with_byte_order(ByteOrder::LittleEndian, |wb| {
            wb.push_context(Self::NAME);
            match self {
                Self::BasicInfo {
                    range,
                    not_sure,
                    index,
                    hardware_id,
                } => {
                    wb.write_unsigned_short(*range, 16)?;
                    wb.write_unsigned_int(*not_sure, 32)?;
                    wb.write_unsigned_byte(*index, 8)?;
                    wb.write_unsigned_int(*hardware_id, 32)?;
                }
            }
            wb.pop_context(Self::NAME)
        })
    }

    fn length_in_bits(&self) -> usize {
        match self {
            Self::BasicInfo { .. } => 16 + 32 + 8 + 32,
        }
    }
}
