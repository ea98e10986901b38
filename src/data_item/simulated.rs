// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Value codec of the simulated device: flat values without padding.

use super::{Layout, Scalar};
use crate::{
    buffer::{ReadBuffer, StringEncoding, WriteBuffer},
    error::{ParseError, SerializationError},
    value::PlcValue,
};

/// Bits of the fixed width STRING and WSTRING fields, whatever their content.
///
/// UTF-8 text fills 31 bytes and UTF-16 text 15 code units of the field,
/// the remaining bits are padding.
pub const STRING_BITS: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimulatedDataType {
    Bool,
    Byte,
    Word,
    Dword,
    Lword,
    Sint,
    Int,
    Dint,
    Lint,
    Usint,
    Uint,
    Udint,
    Ulint,
    Real,
    Lreal,
    Char,
    Wchar,
    String,
    Wstring,
}

impl SimulatedDataType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "BOOL",
            Self::Byte => "BYTE",
            Self::Word => "WORD",
            Self::Dword => "DWORD",
            Self::Lword => "LWORD",
            Self::Sint => "SINT",
            Self::Int => "INT",
            Self::Dint => "DINT",
            Self::Lint => "LINT",
            Self::Usint => "USINT",
            Self::Uint => "UINT",
            Self::Udint => "UDINT",
            Self::Ulint => "ULINT",
            Self::Real => "REAL",
            Self::Lreal => "LREAL",
            Self::Char => "CHAR",
            Self::Wchar => "WCHAR",
            Self::String => "STRING",
            Self::Wstring => "WSTRING",
        }
    }
}

fn layout(data_type: SimulatedDataType, count: usize) -> Option<Layout> {
    use SimulatedDataType as T;

    let scalar = match data_type {
        T::String => {
            return Some(Layout::FixedString {
                bits: STRING_BITS,
                encoding: StringEncoding::Utf8,
            })
        }
        T::Wstring => {
            return Some(Layout::FixedString {
                bits: STRING_BITS,
                encoding: StringEncoding::Utf16,
            })
        }
        _ if count == 0 => return None,
        T::Bool => Scalar::Bool,
        T::Byte => Scalar::Byte,
        T::Word => Scalar::Word,
        T::Dword => Scalar::Dword,
        T::Lword => Scalar::Lword,
        T::Sint => Scalar::Sint,
        T::Int => Scalar::Int,
        T::Dint => Scalar::Dint,
        T::Lint => Scalar::Lint,
        T::Usint => Scalar::Usint,
        T::Uint => Scalar::Uint,
        T::Udint => Scalar::Udint,
        T::Ulint => Scalar::Ulint,
        T::Real => Scalar::Real,
        T::Lreal => Scalar::Lreal,
        T::Char if count == 1 => Scalar::Char,
        T::Char => Scalar::CharString,
        T::Wchar if count == 1 => Scalar::Wchar,
        T::Wchar => Scalar::WcharString,
    };
    Some(if count == 1 {
        Layout::single(scalar)
    } else {
        Layout::List { scalar, count }
    })
}

pub fn parse(
    rb: &mut ReadBuffer<'_>,
    data_type: SimulatedDataType,
    count: u16,
) -> Result<PlcValue, ParseError> {
    layout(data_type, count.into())
        .ok_or(ParseError::UnsupportedDataType {
            data_type: data_type.as_str(),
            count: count.into(),
        })?
        .parse(rb)
}

pub fn serialize(
    wb: &mut WriteBuffer,
    value: &PlcValue,
    data_type: SimulatedDataType,
    count: u16,
) -> Result<(), SerializationError> {
    layout(data_type, count.into())
        .ok_or(SerializationError::UnsupportedDataType {
            data_type: data_type.as_str(),
            count: count.into(),
        })?
        .serialize(wb, value)
}

#[must_use]
pub fn length_in_bits(value: &PlcValue, data_type: SimulatedDataType, count: u16) -> usize {
    layout(data_type, count.into()).map_or(0, |layout| layout.length_in_bits(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ByteOrder;

    #[test]
    fn bool_is_a_single_bit() {
        let mut rb = ReadBuffer::new(&[0x80], ByteOrder::BigEndian);
        let value = parse(&mut rb, SimulatedDataType::Bool, 1).unwrap();
        assert_eq!(value, PlcValue::Bool(true));
        assert_eq!(rb.pos(), 1);
    }

    #[test]
    fn strings_have_a_fixed_width() {
        let value = PlcValue::String("simulated".into());
        let bits = length_in_bits(&value, SimulatedDataType::String, 1);
        assert_eq!(bits, 255);
        assert_eq!(length_in_bits(&PlcValue::String(String::new()), SimulatedDataType::String, 1), bits);
        assert_eq!(length_in_bits(&value, SimulatedDataType::Wstring, 1), 255);

        let mut wb = WriteBuffer::new(32, ByteOrder::BigEndian);
        serialize(&mut wb, &value, SimulatedDataType::String, 1).unwrap();
        assert_eq!(wb.pos(), bits);
        let bytes = wb.into_bytes();
        let mut rb = ReadBuffer::new(&bytes, ByteOrder::BigEndian);
        assert_eq!(parse(&mut rb, SimulatedDataType::String, 1).unwrap(), value);
        assert_eq!(rb.pos(), bits);
    }

    #[test]
    fn strings_longer_than_the_field_are_rejected() {
        let value = PlcValue::String("x".repeat(32));
        let mut wb = WriteBuffer::new(32, ByteOrder::BigEndian);
        assert!(serialize(&mut wb, &value, SimulatedDataType::String, 1).is_err());
    }

    #[test]
    fn wide_strings_use_utf16() {
        let value = PlcValue::String("Grüße".into());
        let bits = length_in_bits(&value, SimulatedDataType::Wstring, 1);
        let mut wb = WriteBuffer::new(32, ByteOrder::BigEndian);
        serialize(&mut wb, &value, SimulatedDataType::Wstring, 1).unwrap();
        assert_eq!(wb.pos(), bits);
        let bytes = wb.into_bytes();
        assert_eq!(&bytes[..4], &[0x00, b'G', 0x00, b'r']);
        let mut rb = ReadBuffer::new(&bytes, ByteOrder::BigEndian);
        assert_eq!(parse(&mut rb, SimulatedDataType::Wstring, 1).unwrap(), value);
        assert_eq!(rb.pos(), bits);
    }

    #[test]
    fn lists_are_flat() {
        let mut rb = ReadBuffer::new(&[0x00, 0x01, 0x00, 0x02], ByteOrder::BigEndian);
        assert_eq!(
            parse(&mut rb, SimulatedDataType::Word, 2).unwrap(),
            PlcValue::List(vec![PlcValue::Word(1), PlcValue::Word(2)])
        );
    }
}
