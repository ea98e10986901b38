// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vendor neutral PLC values.

use std::{
    fmt::{self, Display},
    time::Duration,
};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::ValueError;

/// A value read from or written to a PLC.
///
/// Arrays are always a [`PlcValue::List`] of scalars; there is no
/// dedicated array variant.
#[derive(Debug, Clone, PartialEq)]
pub enum PlcValue {
    Bool(bool),
    Byte(u8),
    Word(u16),
    Dword(u32),
    Lword(u64),
    Sint(i8),
    Usint(u8),
    Int(i16),
    Uint(u16),
    Dint(i32),
    Udint(u32),
    Lint(i64),
    Ulint(u64),
    Real(f32),
    Lreal(f64),
    Char(char),
    Wchar(char),
    String(String),
    Time(Duration),
    Date(NaiveDate),
    TimeOfDay(NaiveTime),
    DateAndTime(NaiveDateTime),
    List(Vec<PlcValue>),
}

impl PlcValue {
    /// IEC 61131-3 name of the variant.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "BOOL",
            Self::Byte(_) => "BYTE",
            Self::Word(_) => "WORD",
            Self::Dword(_) => "DWORD",
            Self::Lword(_) => "LWORD",
            Self::Sint(_) => "SINT",
            Self::Usint(_) => "USINT",
            Self::Int(_) => "INT",
            Self::Uint(_) => "UINT",
            Self::Dint(_) => "DINT",
            Self::Udint(_) => "UDINT",
            Self::Lint(_) => "LINT",
            Self::Ulint(_) => "ULINT",
            Self::Real(_) => "REAL",
            Self::Lreal(_) => "LREAL",
            Self::Char(_) => "CHAR",
            Self::Wchar(_) => "WCHAR",
            Self::String(_) => "STRING",
            Self::Time(_) => "TIME",
            Self::Date(_) => "DATE",
            Self::TimeOfDay(_) => "TIME_OF_DAY",
            Self::DateAndTime(_) => "DATE_AND_TIME",
            Self::List(_) => "LIST",
        }
    }

    fn mismatch(&self, expected: &'static str) -> ValueError {
        ValueError::TypeMismatch {
            expected,
            found: self.type_name(),
        }
    }

    #[must_use]
    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    pub fn get_bool(&self) -> Result<bool, ValueError> {
        match self {
            Self::Bool(v) => Ok(*v),
            _ => Err(self.mismatch("BOOL")),
        }
    }

    /// Any integer value that fits into an `i64`.
    pub fn get_int(&self) -> Result<i64, ValueError> {
        match *self {
            Self::Byte(v) | Self::Usint(v) => Ok(v.into()),
            Self::Word(v) | Self::Uint(v) => Ok(v.into()),
            Self::Dword(v) | Self::Udint(v) => Ok(v.into()),
            Self::Sint(v) => Ok(v.into()),
            Self::Int(v) => Ok(v.into()),
            Self::Dint(v) => Ok(v.into()),
            Self::Lint(v) => Ok(v),
            Self::Lword(v) | Self::Ulint(v) => i64::try_from(v).map_err(|_| ValueError::OutOfRange {
                value: v.to_string(),
                target: "i64",
            }),
            _ => Err(self.mismatch("integer")),
        }
    }

    /// Any non-negative integer value.
    pub fn get_uint(&self) -> Result<u64, ValueError> {
        match *self {
            Self::Lword(v) | Self::Ulint(v) => Ok(v),
            _ => {
                let v = self.get_int()?;
                u64::try_from(v).map_err(|_| ValueError::OutOfRange {
                    value: v.to_string(),
                    target: "u64",
                })
            }
        }
    }

    /// Floating point and integer values.
    pub fn get_float(&self) -> Result<f64, ValueError> {
        match *self {
            Self::Real(v) => Ok(v.into()),
            Self::Lreal(v) => Ok(v),
            Self::Lword(v) | Self::Ulint(v) => Ok(v as f64),
            _ => self
                .get_int()
                .map(|v| v as f64)
                .map_err(|_| self.mismatch("REAL")),
        }
    }

    pub fn get_char(&self) -> Result<char, ValueError> {
        match self {
            Self::Char(c) | Self::Wchar(c) => Ok(*c),
            _ => Err(self.mismatch("CHAR")),
        }
    }

    pub fn get_str(&self) -> Result<&str, ValueError> {
        match self {
            Self::String(s) => Ok(s),
            _ => Err(self.mismatch("STRING")),
        }
    }

    pub fn get_duration(&self) -> Result<Duration, ValueError> {
        match self {
            Self::Time(d) => Ok(*d),
            _ => Err(self.mismatch("TIME")),
        }
    }

    pub fn get_date(&self) -> Result<NaiveDate, ValueError> {
        match self {
            Self::Date(d) => Ok(*d),
            Self::DateAndTime(dt) => Ok(dt.date()),
            _ => Err(self.mismatch("DATE")),
        }
    }

    pub fn get_time(&self) -> Result<NaiveTime, ValueError> {
        match self {
            Self::TimeOfDay(t) => Ok(*t),
            Self::DateAndTime(dt) => Ok(dt.time()),
            _ => Err(self.mismatch("TIME_OF_DAY")),
        }
    }

    pub fn get_date_time(&self) -> Result<NaiveDateTime, ValueError> {
        match self {
            Self::DateAndTime(dt) => Ok(*dt),
            _ => Err(self.mismatch("DATE_AND_TIME")),
        }
    }

    pub fn get_list(&self) -> Result<&[PlcValue], ValueError> {
        match self {
            Self::List(values) => Ok(values),
            _ => Err(self.mismatch("LIST")),
        }
    }

    /// Number of scalars carried: the list length or `1`.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::List(values) => values.len(),
            _ => 1,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for PlcValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => v.fmt(f),
            Self::Byte(v) | Self::Usint(v) => v.fmt(f),
            Self::Word(v) | Self::Uint(v) => v.fmt(f),
            Self::Dword(v) | Self::Udint(v) => v.fmt(f),
            Self::Lword(v) | Self::Ulint(v) => v.fmt(f),
            Self::Sint(v) => v.fmt(f),
            Self::Int(v) => v.fmt(f),
            Self::Dint(v) => v.fmt(f),
            Self::Lint(v) => v.fmt(f),
            Self::Real(v) => v.fmt(f),
            Self::Lreal(v) => v.fmt(f),
            Self::Char(v) | Self::Wchar(v) => v.fmt(f),
            Self::String(v) => v.fmt(f),
            Self::Time(v) => write!(f, "{}ms", v.as_millis()),
            Self::Date(v) => v.fmt(f),
            Self::TimeOfDay(v) => v.fmt(f),
            Self::DateAndTime(v) => v.fmt(f),
            Self::List(values) => {
                f.write_str("[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    value.fmt(f)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for PlcValue {
    fn from(from: bool) -> Self {
        Self::Bool(from)
    }
}

impl From<i16> for PlcValue {
    fn from(from: i16) -> Self {
        Self::Int(from)
    }
}

impl From<i32> for PlcValue {
    fn from(from: i32) -> Self {
        Self::Dint(from)
    }
}

impl From<f32> for PlcValue {
    fn from(from: f32) -> Self {
        Self::Real(from)
    }
}

impl From<String> for PlcValue {
    fn from(from: String) -> Self {
        Self::String(from)
    }
}

impl From<Vec<PlcValue>> for PlcValue {
    fn from(from: Vec<PlcValue>) -> Self {
        Self::List(from)
    }
}
