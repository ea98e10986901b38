// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per data type mapping between wire fields and [`PlcValue`]s.
//!
//! Every dialect resolves a `(data type, count)` pair into a [`Layout`]
//! which then drives parsing, serialization and sizing, so the three
//! operations cannot disagree on the bit layout.

use std::time::Duration;

use chrono::{Datelike as _, NaiveDate, NaiveTime, Timelike as _};

use crate::{
    buffer::{ReadBuffer, StringEncoding, WriteBuffer},
    error::{ParseError, SerializationError},
    value::PlcValue,
};

pub mod modbus;
pub mod simulated;
pub mod umas;

/// A single wire primitive and the value variant it maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scalar {
    Bool,
    Byte,
    Word,
    Dword,
    Lword,
    Sint,
    Usint,
    Int,
    Uint,
    Dint,
    Udint,
    Lint,
    Ulint,
    Real,
    Lreal,
    Char,
    Wchar,
    /// An 8 bit character surfaced as a one character STRING.
    CharString,
    /// A 16 bit character surfaced as a one character STRING.
    WcharString,
    /// Milliseconds as an unsigned 32 bit value.
    Time,
    /// Milliseconds since midnight as an unsigned 32 bit value.
    TimeOfDay,
}

impl Scalar {
    pub(crate) const fn bits(self) -> usize {
        match self {
            Self::Bool => 1,
            Self::Byte | Self::Sint | Self::Usint | Self::Char | Self::CharString => 8,
            Self::Word | Self::Int | Self::Uint | Self::Wchar | Self::WcharString => 16,
            Self::Dword | Self::Dint | Self::Udint | Self::Real | Self::Time | Self::TimeOfDay => 32,
            Self::Lword | Self::Lint | Self::Ulint | Self::Lreal => 64,
        }
    }

    fn read(self, rb: &mut ReadBuffer<'_>) -> Result<PlcValue, ParseError> {
        Ok(match self {
            Self::Bool => PlcValue::Bool(rb.read_bit()?),
            Self::Byte => PlcValue::Byte(rb.read_unsigned_byte(8)?),
            Self::Word => PlcValue::Word(rb.read_unsigned_short(16)?),
            Self::Dword => PlcValue::Dword(rb.read_unsigned_int(32)?),
            Self::Lword => PlcValue::Lword(rb.read_unsigned_long(64)?),
            Self::Sint => PlcValue::Sint(rb.read_signed_byte(8)?),
            Self::Usint => PlcValue::Usint(rb.read_unsigned_byte(8)?),
            Self::Int => PlcValue::Int(rb.read_short(16)?),
            Self::Uint => PlcValue::Uint(rb.read_unsigned_short(16)?),
            Self::Dint => PlcValue::Dint(rb.read_int(32)?),
            Self::Udint => PlcValue::Udint(rb.read_unsigned_int(32)?),
            Self::Lint => PlcValue::Lint(rb.read_long(64)?),
            Self::Ulint => PlcValue::Ulint(rb.read_unsigned_long(64)?),
            Self::Real => PlcValue::Real(rb.read_float(32)?),
            Self::Lreal => PlcValue::Lreal(rb.read_double(64)?),
            Self::Char => PlcValue::Char(char::from(rb.read_unsigned_byte(8)?)),
            Self::Wchar => PlcValue::Wchar(read_wchar(rb)?),
            Self::CharString => {
                PlcValue::String(char::from(rb.read_unsigned_byte(8)?).to_string())
            }
            Self::WcharString => PlcValue::String(read_wchar(rb)?.to_string()),
            Self::Time => PlcValue::Time(Duration::from_millis(rb.read_unsigned_int(32)?.into())),
            Self::TimeOfDay => {
                let millis = rb.read_unsigned_int(32)?;
                let time = NaiveTime::from_num_seconds_from_midnight_opt(
                    millis / 1000,
                    (millis % 1000) * 1_000_000,
                )
                .ok_or_else(|| {
                    ParseError::InvalidData(format!("{millis}ms is not a time of day").into())
                })?;
                PlcValue::TimeOfDay(time)
            }
        })
    }

    fn write(self, wb: &mut WriteBuffer, value: &PlcValue) -> Result<(), SerializationError> {
        match self {
            Self::Bool => wb.write_bit(value.get_bool()?),
            Self::Byte | Self::Usint => wb.write_unsigned_byte(int(value, 8)?, 8),
            Self::Word | Self::Uint => wb.write_unsigned_short(int(value, 16)?, 16),
            Self::Dword | Self::Udint => wb.write_unsigned_int(int(value, 32)?, 32),
            Self::Lword | Self::Ulint => wb.write_unsigned_long(value.get_uint()?, 64),
            Self::Sint => wb.write_signed_byte(int(value, 8)?, 8),
            Self::Int => wb.write_short(int(value, 16)?, 16),
            Self::Dint => wb.write_int(int(value, 32)?, 32),
            Self::Lint => wb.write_long(value.get_int()?, 64),
            #[allow(clippy::cast_possible_truncation)]
            Self::Real => wb.write_float(value.get_float()? as f32, 32),
            Self::Lreal => wb.write_double(value.get_float()?, 64),
            Self::Char => write_char(wb, value.get_char()?, 8),
            Self::Wchar => write_char(wb, value.get_char()?, 16),
            Self::CharString => write_char(wb, single_char(value)?, 8),
            Self::WcharString => write_char(wb, single_char(value)?, 16),
            Self::Time => {
                let millis = value.get_duration()?.as_millis();
                let millis = u32::try_from(millis).map_err(|_| {
                    SerializationError::ValueOutOfRange {
                        value: millis as i128,
                        bits: 32,
                    }
                })?;
                wb.write_unsigned_int(millis, 32)
            }
            Self::TimeOfDay => {
                let time = value.get_time()?;
                let millis =
                    time.num_seconds_from_midnight() * 1000 + time.nanosecond() / 1_000_000;
                wb.write_unsigned_int(millis, 32)
            }
        }
    }
}

/// Bit layout of one `(data type, count)` combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Layout {
    /// One scalar surrounded by reserved bits.
    Padded {
        leading: u8,
        scalar: Scalar,
        trailing: u8,
    },
    /// `count` scalars without any padding, parsed into a LIST.
    List { scalar: Scalar, count: usize },
    /// NUL padded text in a field of `len` bytes.
    TerminatedString { len: usize },
    /// Fixed width text.
    FixedString {
        bits: usize,
        encoding: StringEncoding,
    },
    /// BCD day, month and year.
    BcdDate,
    /// One unused byte, BCD second, minute, hour, day, month and year.
    BcdDateAndTime,
}

impl Layout {
    pub(crate) const fn single(scalar: Scalar) -> Self {
        Self::Padded {
            leading: 0,
            scalar,
            trailing: 0,
        }
    }

    pub(crate) fn parse(self, rb: &mut ReadBuffer<'_>) -> Result<PlcValue, ParseError> {
        match self {
            Self::Padded {
                leading,
                scalar,
                trailing,
            } => {
                read_reserved(rb, leading)?;
                let value = scalar.read(rb)?;
                read_reserved(rb, trailing)?;
                Ok(value)
            }
            Self::List { scalar, count } => (0..count)
                .map(|_| scalar.read(rb))
                .collect::<Result<Vec<_>, _>>()
                .map(PlcValue::List),
            Self::TerminatedString { len } => Ok(PlcValue::String(rb.read_terminated_str(len)?)),
            Self::FixedString { bits, encoding } => {
                let text = rb.read_str(bits, encoding)?;
                Ok(PlcValue::String(text.trim_end_matches('\0').to_owned()))
            }
            Self::BcdDate => {
                let day = rb.read_bcd(8)?;
                let month = rb.read_bcd(8)?;
                let year = rb.read_bcd(16)?;
                Ok(PlcValue::Date(date(year, month, day)?))
            }
            Self::BcdDateAndTime => {
                let _unused = rb.read_unsigned_byte(8)?;
                let second = rb.read_bcd(8)?;
                let minute = rb.read_bcd(8)?;
                let hour = rb.read_bcd(8)?;
                let day = rb.read_bcd(8)?;
                let month = rb.read_bcd(8)?;
                let year = rb.read_bcd(16)?;
                #[allow(clippy::cast_possible_truncation)]
                let date_time = date(year, month, day)?
                    .and_hms_opt(hour as u32, minute as u32, second as u32)
                    .ok_or_else(|| {
                        ParseError::InvalidData(
                            format!("{hour:02}:{minute:02}:{second:02} is not a time").into(),
                        )
                    })?;
                Ok(PlcValue::DateAndTime(date_time))
            }
        }
    }

    pub(crate) fn serialize(
        self,
        wb: &mut WriteBuffer,
        value: &PlcValue,
    ) -> Result<(), SerializationError> {
        match self {
            Self::Padded {
                leading,
                scalar,
                trailing,
            } => {
                write_reserved(wb, leading)?;
                scalar.write(wb, value)?;
                write_reserved(wb, trailing)
            }
            Self::List { scalar, count } => {
                let values = value.get_list()?;
                if values.len() != count {
                    return Err(SerializationError::InvalidData(
                        format!("expected {count} values, got {}", values.len()).into(),
                    ));
                }
                values.iter().try_for_each(|value| scalar.write(wb, value))
            }
            Self::TerminatedString { len } => wb.write_terminated_str(value.get_str()?, len),
            Self::FixedString { bits, encoding } => wb.write_str(value.get_str()?, bits, encoding),
            Self::BcdDate => {
                let date = value.get_date()?;
                wb.write_bcd(date.day().into(), 8)?;
                wb.write_bcd(date.month().into(), 8)?;
                wb.write_bcd(year(date)?, 16)
            }
            Self::BcdDateAndTime => {
                let date_time = value.get_date_time()?;
                wb.write_unsigned_byte(0, 8)?;
                wb.write_bcd(date_time.second().into(), 8)?;
                wb.write_bcd(date_time.minute().into(), 8)?;
                wb.write_bcd(date_time.hour().into(), 8)?;
                wb.write_bcd(date_time.day().into(), 8)?;
                wb.write_bcd(date_time.month().into(), 8)?;
                wb.write_bcd(year(date_time.date())?, 16)
            }
        }
    }

    /// Bits produced by [`Layout::serialize`] for `value`.
    pub(crate) fn length_in_bits(self, value: &PlcValue) -> usize {
        match self {
            Self::Padded {
                leading,
                scalar,
                trailing,
            } => usize::from(leading) + scalar.bits() + usize::from(trailing),
            Self::List { scalar, .. } => value.len() * scalar.bits(),
            Self::TerminatedString { len } => len * 8,
            Self::FixedString { bits, .. } => bits,
            Self::BcdDate => 32,
            Self::BcdDateAndTime => 64,
        }
    }
}

fn date(year: u64, month: u64, day: u64) -> Result<NaiveDate, ParseError> {
    i32::try_from(year)
        .ok()
        .zip(u32::try_from(month).ok())
        .zip(u32::try_from(day).ok())
        .and_then(|((y, m), d)| NaiveDate::from_ymd_opt(y, m, d))
        .ok_or_else(|| ParseError::InvalidData(format!("{year}-{month}-{day} is not a date").into()))
}

fn year(date: NaiveDate) -> Result<u64, SerializationError> {
    u64::try_from(date.year()).map_err(|_| SerializationError::ValueOutOfRange {
        value: date.year().into(),
        bits: 16,
    })
}

fn read_reserved(rb: &mut ReadBuffer<'_>, bits: u8) -> Result<(), ParseError> {
    if bits == 0 {
        return Ok(());
    }
    let reserved = rb.read_unsigned_long(bits)?;
    if reserved != 0 {
        log::warn!("Expected constant value 0 but got {reserved} for reserved field");
    }
    Ok(())
}

fn write_reserved(wb: &mut WriteBuffer, bits: u8) -> Result<(), SerializationError> {
    if bits == 0 {
        return Ok(());
    }
    wb.write_unsigned_long(0, bits)
}

fn read_wchar(rb: &mut ReadBuffer<'_>) -> Result<char, ParseError> {
    let unit = rb.read_unsigned_short(16)?;
    char::from_u32(unit.into())
        .ok_or_else(|| ParseError::InvalidData(format!("0x{unit:04X} is not a character").into()))
}

fn write_char(wb: &mut WriteBuffer, c: char, bits: u8) -> Result<(), SerializationError> {
    let code = u32::from(c);
    if code >> bits != 0 {
        return Err(SerializationError::ValueOutOfRange {
            value: code.into(),
            bits,
        });
    }
    let code = u16::try_from(code).unwrap_or_default();
    match u8::try_from(code) {
        Ok(byte) if bits == 8 => wb.write_unsigned_byte(byte, 8),
        _ => wb.write_unsigned_short(code, 16),
    }
}

fn single_char(value: &PlcValue) -> Result<char, SerializationError> {
    let text = value.get_str()?;
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        (None, _) => Ok('\0'),
        _ => Err(SerializationError::InvalidData(
            format!("{text:?} is more than one character").into(),
        )),
    }
}

fn int<T: TryFrom<i64>>(value: &PlcValue, bits: u8) -> Result<T, SerializationError> {
    let v = value.get_int()?;
    T::try_from(v).map_err(|_| SerializationError::ValueOutOfRange {
        value: v.into(),
        bits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ByteOrder;

    fn round_trip(layout: Layout, value: &PlcValue, order: ByteOrder) -> Vec<u8> {
        let bits = layout.length_in_bits(value);
        let mut wb = WriteBuffer::new((bits + 7) / 8, order);
        layout.serialize(&mut wb, value).unwrap();
        assert_eq!(wb.pos(), bits);
        let bytes = wb.into_bytes().to_vec();
        let mut rb = ReadBuffer::new(&bytes, order);
        assert_eq!(&layout.parse(&mut rb).unwrap(), value);
        assert_eq!(rb.pos(), bits);
        bytes
    }

    #[test]
    fn padded_scalar() {
        let layout = Layout::Padded {
            leading: 7,
            scalar: Scalar::Bool,
            trailing: 8,
        };
        let bytes = round_trip(layout, &PlcValue::Bool(true), ByteOrder::LittleEndian);
        assert_eq!(bytes, [0x01, 0x00]);
    }

    #[test]
    fn list_length_follows_the_value() {
        let layout = Layout::List {
            scalar: Scalar::Int,
            count: 3,
        };
        let value = PlcValue::List(vec![
            PlcValue::Int(1),
            PlcValue::Int(-1),
            PlcValue::Int(874),
        ]);
        assert_eq!(layout.length_in_bits(&value), 48);
        let bytes = round_trip(layout, &value, ByteOrder::BigEndian);
        assert_eq!(bytes, [0x00, 0x01, 0xFF, 0xFF, 0x03, 0x6A]);
    }

    #[test]
    fn list_count_mismatch_is_rejected() {
        let layout = Layout::List {
            scalar: Scalar::Bool,
            count: 2,
        };
        let mut wb = WriteBuffer::new(1, ByteOrder::BigEndian);
        let value = PlcValue::List(vec![PlcValue::Bool(true)]);
        assert!(matches!(
            layout.serialize(&mut wb, &value),
            Err(SerializationError::InvalidData(_))
        ));
    }

    #[test]
    fn out_of_range_integers_are_rejected() {
        let mut wb = WriteBuffer::new(2, ByteOrder::BigEndian);
        assert!(matches!(
            Layout::single(Scalar::Int).serialize(&mut wb, &PlcValue::Dint(40_000)),
            Err(SerializationError::ValueOutOfRange { value: 40_000, bits: 16 })
        ));
        assert!(matches!(
            Layout::single(Scalar::Int).serialize(&mut wb, &PlcValue::Real(1.0)),
            Err(SerializationError::Value(_))
        ));
    }

    #[test]
    fn bcd_date_and_time() {
        let value = PlcValue::DateAndTime(
            NaiveDate::from_ymd_opt(2024, 2, 29)
                .unwrap()
                .and_hms_opt(13, 45, 7)
                .unwrap(),
        );
        let bytes = round_trip(Layout::BcdDateAndTime, &value, ByteOrder::LittleEndian);
        assert_eq!(bytes, [0x00, 0x07, 0x45, 0x13, 0x29, 0x02, 0x24, 0x20]);
    }

    #[test]
    fn invalid_dates_are_parse_errors() {
        let mut rb = ReadBuffer::new(&[0x31, 0x02, 0x24, 0x20], ByteOrder::LittleEndian);
        assert!(matches!(
            Layout::BcdDate.parse(&mut rb),
            Err(ParseError::InvalidData(_))
        ));
    }

    #[test]
    fn time_of_day_in_milliseconds() {
        let value = PlcValue::TimeOfDay(NaiveTime::from_hms_milli_opt(1, 0, 0, 250).unwrap());
        let bytes = round_trip(Layout::single(Scalar::TimeOfDay), &value, ByteOrder::BigEndian);
        assert_eq!(bytes, 3_600_250u32.to_be_bytes());
    }
}
