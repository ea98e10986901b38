// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Value codec for Modbus registers and bit areas.
//!
//! Single BOOL, BYTE, SINT and USINT values occupy a whole 16 bit
//! register. Which half holds the value depends on whether the cursor
//! uses a big-endian family byte order.

use std::{fmt, str::FromStr};

use super::{Layout, Scalar};
use crate::{
    buffer::{ReadBuffer, WriteBuffer},
    error::{ParseError, SerializationError, TagError},
    value::PlcValue,
};

/// Data types addressable in Modbus tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModbusDataType {
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
}

impl ModbusDataType {
    pub const ALL: [Self; 17] = [
        Self::Bool,
        Self::Byte,
        Self::Word,
        Self::Dword,
        Self::Lword,
        Self::Sint,
        Self::Int,
        Self::Dint,
        Self::Lint,
        Self::Usint,
        Self::Uint,
        Self::Udint,
        Self::Ulint,
        Self::Real,
        Self::Lreal,
        Self::Char,
        Self::Wchar,
    ];

    /// Numeric code of the data type.
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::Bool => 1,
            Self::Byte => 2,
            Self::Word => 3,
            Self::Dword => 4,
            Self::Lword => 5,
            Self::Sint => 6,
            Self::Int => 7,
            Self::Dint => 8,
            Self::Lint => 9,
            Self::Usint => 10,
            Self::Uint => 11,
            Self::Udint => 12,
            Self::Ulint => 13,
            Self::Real => 14,
            Self::Lreal => 15,
            Self::Char => 24,
            Self::Wchar => 25,
        }
    }

    /// Bytes one value occupies in a register area.
    #[must_use]
    pub const fn data_type_size(self) -> u16 {
        match self {
            Self::Char => 1,
            Self::Bool
            | Self::Byte
            | Self::Word
            | Self::Sint
            | Self::Int
            | Self::Usint
            | Self::Uint
            | Self::Wchar => 2,
            Self::Dword | Self::Dint | Self::Udint | Self::Real => 4,
            Self::Lword | Self::Lint | Self::Ulint | Self::Lreal => 8,
        }
    }

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
        }
    }
}

impl fmt::Display for ModbusDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModbusDataType {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|data_type| data_type.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| TagError::UnknownDataType(s.to_owned()))
    }
}

fn layout(data_type: ModbusDataType, count: usize, big_endian: bool) -> Option<Layout> {
    use ModbusDataType as T;

    let padded_byte = |scalar| {
        if big_endian {
            Layout::Padded {
                leading: 8,
                scalar,
                trailing: 0,
            }
        } else {
            Layout::Padded {
                leading: 0,
                scalar,
                trailing: 8,
            }
        }
    };
    let flat = |scalar| {
        if count == 1 {
            Layout::single(scalar)
        } else {
            Layout::List { scalar, count }
        }
    };

    let layout = match (data_type, count) {
        (_, 0) => return None,
        (T::Bool, 1) if big_endian => Layout::Padded {
            leading: 15,
            scalar: Scalar::Bool,
            trailing: 0,
        },
        (T::Bool, 1) => Layout::Padded {
            leading: 7,
            scalar: Scalar::Bool,
            trailing: 8,
        },
        (T::Bool, count) => Layout::List {
            scalar: Scalar::Bool,
            count,
        },
        (T::Byte, 1) => padded_byte(Scalar::Byte),
        // Every BYTE of an array is surfaced as its 8 bits.
        (T::Byte, count) => Layout::List {
            scalar: Scalar::Bool,
            count: count * 8,
        },
        (T::Sint, 1) => padded_byte(Scalar::Sint),
        (T::Usint, 1) => padded_byte(Scalar::Usint),
        (T::Sint, _) => flat(Scalar::Sint),
        (T::Usint, _) => flat(Scalar::Usint),
        (T::Word, _) => flat(Scalar::Word),
        (T::Dword, _) => flat(Scalar::Dword),
        (T::Lword, _) => flat(Scalar::Lword),
        (T::Int, _) => flat(Scalar::Int),
        (T::Dint, _) => flat(Scalar::Dint),
        (T::Lint, _) => flat(Scalar::Lint),
        (T::Uint, _) => flat(Scalar::Uint),
        (T::Udint, _) => flat(Scalar::Udint),
        (T::Ulint, _) => flat(Scalar::Ulint),
        (T::Real, _) => flat(Scalar::Real),
        (T::Lreal, _) => flat(Scalar::Lreal),
        (T::Char, 1) => Layout::single(Scalar::Char),
        (T::Char, count) => Layout::List {
            scalar: Scalar::CharString,
            count,
        },
        (T::Wchar, 1) => Layout::single(Scalar::Wchar),
        (T::Wchar, count) => Layout::List {
            scalar: Scalar::WcharString,
            count,
        },
    };
    Some(layout)
}

fn resolve(data_type: ModbusDataType, count: u16, big_endian: bool) -> Option<Layout> {
    layout(data_type, count.into(), big_endian)
}

/// Parses `count` values of `data_type`.
pub fn parse(
    rb: &mut ReadBuffer<'_>,
    data_type: ModbusDataType,
    count: u16,
) -> Result<PlcValue, ParseError> {
    resolve(data_type, count, rb.byte_order().is_big_endian())
        .ok_or(ParseError::UnsupportedDataType {
            data_type: data_type.as_str(),
            count: count.into(),
        })?
        .parse(rb)
}

/// Serializes `value` as `count` values of `data_type`.
pub fn serialize(
    wb: &mut WriteBuffer,
    value: &PlcValue,
    data_type: ModbusDataType,
    count: u16,
) -> Result<(), SerializationError> {
    resolve(data_type, count, wb.byte_order().is_big_endian())
        .ok_or(SerializationError::UnsupportedDataType {
            data_type: data_type.as_str(),
            count: count.into(),
        })?
        .serialize(wb, value)
}

/// Bits [`serialize`] produces for `value`, `0` for unsupported combinations.
#[must_use]
pub fn length_in_bits(value: &PlcValue, data_type: ModbusDataType, count: u16, big_endian: bool) -> usize {
    resolve(data_type, count, big_endian).map_or(0, |layout| layout.length_in_bits(value))
}

#[must_use]
pub fn length_in_bytes(value: &PlcValue, data_type: ModbusDataType, count: u16, big_endian: bool) -> usize {
    (length_in_bits(value, data_type, count, big_endian) + 7) / 8
}
