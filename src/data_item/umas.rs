// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Value codec for UMAS variables.
//!
//! UMAS transmits multi-byte values little-endian; cursors passed to
//! these functions are expected to be configured accordingly.

use std::fmt;

use super::{Layout, Scalar};
use crate::{
    buffer::{ReadBuffer, WriteBuffer},
    error::{ParseError, SerializationError},
    value::PlcValue,
};

/// Data type codes of the UMAS symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UmasDataType {
    Bool,
    Int,
    Uint,
    Dint,
    Udint,
    Real,
    String,
    Time,
    Date,
    Tod,
    Dt,
    Byte,
    Word,
    Dword,
    Ebool,
}

impl UmasDataType {
    #[must_use]
    pub const fn new(value: u16) -> Option<Self> {
        Some(match value {
            1 => Self::Bool,
            4 => Self::Int,
            5 => Self::Uint,
            6 => Self::Dint,
            7 => Self::Udint,
            8 => Self::Real,
            9 => Self::String,
            10 => Self::Time,
            12 => Self::Date,
            13 => Self::Tod,
            14 => Self::Dt,
            17 => Self::Byte,
            18 => Self::Word,
            19 => Self::Dword,
            21 => Self::Ebool,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn value(self) -> u16 {
        match self {
            Self::Bool => 1,
            Self::Int => 4,
            Self::Uint => 5,
            Self::Dint => 6,
            Self::Udint => 7,
            Self::Real => 8,
            Self::String => 9,
            Self::Time => 10,
            Self::Date => 12,
            Self::Tod => 13,
            Self::Dt => 14,
            Self::Byte => 17,
            Self::Word => 18,
            Self::Dword => 19,
            Self::Ebool => 21,
        }
    }

    /// Bytes of one element in PLC memory.
    #[must_use]
    pub const fn data_type_size(self) -> u8 {
        match self {
            Self::Bool | Self::Ebool | Self::Byte | Self::String => 1,
            Self::Int | Self::Uint | Self::Word => 2,
            Self::Dint
            | Self::Udint
            | Self::Real
            | Self::Time
            | Self::Date
            | Self::Tod
            | Self::Dword => 4,
            Self::Dt => 8,
        }
    }

    /// The element size index used by variable read/write requests.
    #[must_use]
    pub const fn request_size(self) -> u8 {
        match self.data_type_size() {
            1 => 1,
            2 => 2,
            4 => 3,
            _ => 4,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "BOOL",
            Self::Int => "INT",
            Self::Uint => "UINT",
            Self::Dint => "DINT",
            Self::Udint => "UDINT",
            Self::Real => "REAL",
            Self::String => "STRING",
            Self::Time => "TIME",
            Self::Date => "DATE",
            Self::Tod => "TOD",
            Self::Dt => "DT",
            Self::Byte => "BYTE",
            Self::Word => "WORD",
            Self::Dword => "DWORD",
            Self::Ebool => "EBOOL",
        }
    }

    /// Looks a data type up by name, as used in tag addresses.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        (1..=21)
            .filter_map(Self::new)
            .find(|data_type| data_type.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for UmasDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bytes per element for a request size index.
#[must_use]
pub const fn data_size_bytes(request_size: u8) -> usize {
    match request_size {
        1 => 1,
        2 => 2,
        3 => 4,
        _ => 8,
    }
}

fn layout(data_type: UmasDataType, count: usize) -> Option<Layout> {
    use UmasDataType as T;

    let flat = |scalar| {
        if count == 1 {
            Layout::single(scalar)
        } else {
            Layout::List { scalar, count }
        }
    };

    let layout = match (data_type, count) {
        (_, 0) => return None,
        (T::Bool | T::Ebool, 1) => Layout::Padded {
            leading: 7,
            scalar: Scalar::Bool,
            trailing: 0,
        },
        (T::Bool | T::Ebool, count) => Layout::List {
            scalar: Scalar::Bool,
            count,
        },
        (T::Byte, _) => flat(Scalar::Byte),
        (T::Word, _) => flat(Scalar::Word),
        (T::Dword, _) => flat(Scalar::Dword),
        (T::Int, _) => flat(Scalar::Int),
        (T::Dint, _) => flat(Scalar::Dint),
        (T::Uint, _) => flat(Scalar::Uint),
        (T::Udint, _) => flat(Scalar::Udint),
        (T::Real, _) => flat(Scalar::Real),
        (T::Time, _) => flat(Scalar::Time),
        (T::Tod, _) => flat(Scalar::TimeOfDay),
        // The count of a STRING is its size in bytes.
        (T::String, len) => Layout::TerminatedString { len },
        (T::Date, 1) => Layout::BcdDate,
        (T::Dt, 1) => Layout::BcdDateAndTime,
        (T::Date | T::Dt, _) => return None,
    };
    Some(layout)
}

fn resolve(data_type: UmasDataType, count: u16) -> Option<Layout> {
    layout(data_type, count.into())
}

pub fn parse(
    rb: &mut ReadBuffer<'_>,
    data_type: UmasDataType,
    count: u16,
) -> Result<PlcValue, ParseError> {
    resolve(data_type, count)
        .ok_or(ParseError::UnsupportedDataType {
            data_type: data_type.as_str(),
            count: count.into(),
        })?
        .parse(rb)
}

pub fn serialize(
    wb: &mut WriteBuffer,
    value: &PlcValue,
    data_type: UmasDataType,
    count: u16,
) -> Result<(), SerializationError> {
    resolve(data_type, count)
        .ok_or(SerializationError::UnsupportedDataType {
            data_type: data_type.as_str(),
            count: count.into(),
        })?
        .serialize(wb, value)
}

#[must_use]
pub fn length_in_bits(value: &PlcValue, data_type: UmasDataType, count: u16) -> usize {
    resolve(data_type, count).map_or(0, |layout| layout.length_in_bits(value))
}

#[must_use]
pub fn length_in_bytes(value: &PlcValue, data_type: UmasDataType, count: u16) -> usize {
    (length_in_bits(value, data_type, count) + 7) / 8
}
