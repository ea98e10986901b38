// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Behaviour shared by every wire type.

use bytes::Bytes;

use crate::{
    buffer::{ByteOrder, WriteBuffer},
    error::SerializationError,
};

/// A self-describing, self-serializing wire structure.
///
/// Parsing takes type specific discriminator arguments and is therefore
/// an inherent `parse` function on each implementor.
pub trait Message {
    /// Name used in diagnostics and cursor contexts.
    const NAME: &'static str;

    /// Byte order of multi-byte fields of this structure.
    const BYTE_ORDER: ByteOrder = ByteOrder::BigEndian;

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), SerializationError>;

    fn length_in_bits(&self) -> usize;

    fn length_in_bytes(&self) -> usize {
        (self.length_in_bits() + 7) / 8
    }

    /// Serializes into a buffer of exactly [`Message::length_in_bytes`].
    fn to_bytes(&self) -> Result<Bytes, SerializationError> {
        let expected = self.length_in_bits();
        let mut wb = WriteBuffer::new(self.length_in_bytes(), Self::BYTE_ORDER);
        self.serialize(&mut wb)?;
        if wb.pos() != expected {
            return Err(SerializationError::LengthMismatch {
                type_name: Self::NAME,
                expected,
                actual: wb.pos(),
            });
        }
        Ok(wb.into_bytes())
    }
}

/// Converts a collection length into a wire length field.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn u8_len(len: usize) -> Result<u8, SerializationError> {
    u8::try_from(len).map_err(|_| SerializationError::ValueOutOfRange {
        value: len as i128,
        bits: 8,
    })
}

/// Converts a collection length into a wire length field.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn u16_len(len: usize) -> Result<u16, SerializationError> {
    u16::try_from(len).map_err(|_| SerializationError::ValueOutOfRange {
        value: len as i128,
        bits: 16,
    })
}
