// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use bytes::{Bytes, BytesMut};
use smallvec::SmallVec;

use super::{bcd_digits, ByteOrder, StringEncoding};
use crate::error::{RangeViolation, SerializationError};

type Result<T> = std::result::Result<T, SerializationError>;

/// Writing cursor over a zero initialized, fixed size byte buffer.
#[derive(Debug)]
pub struct WriteBuffer {
    data: BytesMut,
    pos: usize,
    byte_order: ByteOrder,
    contexts: SmallVec<[&'static str; 8]>,
}

impl WriteBuffer {
    #[must_use]
    pub fn new(size_in_bytes: usize, byte_order: ByteOrder) -> Self {
        Self {
            data: BytesMut::zeroed(size_in_bytes),
            pos: 0,
            byte_order,
            contexts: SmallVec::new(),
        }
    }

    /// Current position in bits.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.pos
    }

    #[must_use]
    pub fn remaining_bits(&self) -> usize {
        self.data.len() * 8 - self.pos
    }

    #[must_use]
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn set_byte_order(&mut self, byte_order: ByteOrder) {
        self.byte_order = byte_order;
    }

    /// Runs `f` with a different byte order and restores the previous one.
    pub fn with_byte_order<T>(
        &mut self,
        byte_order: ByteOrder,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let previous = std::mem::replace(&mut self.byte_order, byte_order);
        let result = f(self);
        self.byte_order = previous;
        result
    }

    pub fn push_context(&mut self, name: &'static str) {
        self.contexts.push(name);
    }

    pub fn pop_context(&mut self, name: &'static str) -> Result<()> {
        match self.contexts.last() {
            Some(open) if *open == name => {
                self.contexts.pop();
                Ok(())
            }
            open => Err(SerializationError::ContextMismatch {
                popped: name,
                open: open.copied(),
            }),
        }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.data.freeze()
    }

    fn ensure(&self, bits: usize) -> Result<()> {
        if self.remaining_bits() < bits {
            return Err(SerializationError::OutOfBounds {
                position: self.pos,
                requested: bits,
                remaining: self.remaining_bits(),
            });
        }
        Ok(())
    }

    fn put_bits(&mut self, value: u64, bits: usize) -> Result<()> {
        debug_assert!(bits <= 64);
        self.ensure(bits)?;
        let mut left = bits;
        while left > 0 {
            let offset = self.pos % 8;
            let available = 8 - offset;
            let take = available.min(left);
            let mask = ((1u16 << take) - 1) as u8;
            let chunk = ((value >> (left - take)) as u8) & mask;
            let shift = available - take;
            let byte = &mut self.data[self.pos / 8];
            *byte = (*byte & !(mask << shift)) | (chunk << shift);
            self.pos += take;
            left -= take;
        }
        Ok(())
    }

    fn write_raw(&mut self, value: u64, bits: u8) -> Result<()> {
        if bits % 8 != 0 || bits < 16 {
            return self.put_bits(value, bits.into());
        }
        let len = usize::from(bits / 8);
        self.ensure(usize::from(bits))?;
        let mut bytes = value.to_be_bytes();
        let bytes = &mut bytes[8 - len..];
        self.byte_order.arrange(bytes);
        for byte in bytes.iter() {
            self.put_bits(u64::from(*byte), 8)?;
        }
        Ok(())
    }

    fn write_unsigned(&mut self, value: u64, bits: u8) -> Result<()> {
        if bits < 64 && value >> bits != 0 {
            return Err(SerializationError::ValueOutOfRange {
                value: value.into(),
                bits,
            });
        }
        self.write_raw(value, bits)
    }

    fn write_signed(&mut self, value: i64, bits: u8) -> Result<()> {
        if bits < 64 {
            let min = -(1i64 << (bits - 1));
            let max = (1i64 << (bits - 1)) - 1;
            if value < min || value > max {
                return Err(SerializationError::ValueOutOfRange {
                    value: value.into(),
                    bits,
                });
            }
        }
        let mask = if bits == 64 {
            u64::MAX
        } else {
            (1u64 << bits) - 1
        };
        self.write_raw(value as u64 & mask, bits)
    }

    pub fn write_bit(&mut self, value: bool) -> Result<()> {
        self.put_bits(value.into(), 1)
    }

    pub fn write_unsigned_byte(&mut self, value: u8, bits: u8) -> Result<()> {
        RangeViolation::check("unsigned byte", bits, 8)?;
        self.write_unsigned(value.into(), bits)
    }

    pub fn write_unsigned_short(&mut self, value: u16, bits: u8) -> Result<()> {
        RangeViolation::check("unsigned short", bits, 16)?;
        self.write_unsigned(value.into(), bits)
    }

    pub fn write_unsigned_int(&mut self, value: u32, bits: u8) -> Result<()> {
        RangeViolation::check("unsigned int", bits, 32)?;
        self.write_unsigned(value.into(), bits)
    }

    pub fn write_unsigned_long(&mut self, value: u64, bits: u8) -> Result<()> {
        RangeViolation::check("unsigned long", bits, 64)?;
        self.write_unsigned(value, bits)
    }

    pub fn write_signed_byte(&mut self, value: i8, bits: u8) -> Result<()> {
        RangeViolation::check("signed byte", bits, 8)?;
        self.write_signed(value.into(), bits)
    }

    pub fn write_short(&mut self, value: i16, bits: u8) -> Result<()> {
        RangeViolation::check("short", bits, 16)?;
        self.write_signed(value.into(), bits)
    }

    pub fn write_int(&mut self, value: i32, bits: u8) -> Result<()> {
        RangeViolation::check("int", bits, 32)?;
        self.write_signed(value.into(), bits)
    }

    pub fn write_long(&mut self, value: i64, bits: u8) -> Result<()> {
        RangeViolation::check("long", bits, 64)?;
        self.write_signed(value, bits)
    }

    pub fn write_float(&mut self, value: f32, bits: u8) -> Result<()> {
        RangeViolation::exact("float", bits, 32)?;
        self.write_raw(value.to_bits().into(), 32)
    }

    pub fn write_double(&mut self, value: f64, bits: u8) -> Result<()> {
        RangeViolation::exact("double", bits, 64)?;
        self.write_raw(value.to_bits(), 64)
    }

    /// Writes `value` as a binary coded decimal of `bits / 4` digits.
    pub fn write_bcd(&mut self, value: u64, bits: u8) -> Result<()> {
        RangeViolation::check("bcd", bits, 64)?;
        if bits % 4 != 0 {
            return Err(RangeViolation {
                kind: "bcd",
                bits,
                max: 64,
            }
            .into());
        }
        let mut raw = 0u64;
        let mut rest = value;
        for digit in 0..bcd_digits(bits) {
            raw |= (rest % 10) << (digit * 4);
            rest /= 10;
        }
        if rest != 0 {
            return Err(SerializationError::ValueOutOfRange {
                value: value.into(),
                bits,
            });
        }
        self.write_raw(raw, bits)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure(bytes.len() * 8)?;
        if self.pos % 8 == 0 {
            let start = self.pos / 8;
            self.data[start..start + bytes.len()].copy_from_slice(bytes);
            self.pos += bytes.len() * 8;
            return Ok(());
        }
        for byte in bytes {
            self.put_bits(u64::from(*byte), 8)?;
        }
        Ok(())
    }

    /// Writes `value` into a fixed-width field of `bits` bits, NUL padded.
    ///
    /// Bits behind the last whole code unit are written as zeros.
    pub fn write_str(&mut self, value: &str, bits: usize, encoding: StringEncoding) -> Result<()> {
        let unit = encoding.unit_bits();
        if bits < unit {
            return Err(SerializationError::InvalidData(
                format!("string width of {bits} bits is below one {unit} bit unit").into(),
            ));
        }
        match encoding {
            StringEncoding::Utf8 => {
                let bytes = value.as_bytes();
                if bytes.len() * 8 > bits {
                    return Err(string_too_long(value, bits));
                }
                self.ensure(bits)?;
                self.write_bytes(bytes)?;
                self.write_bytes(&vec![0; bits / 8 - bytes.len()])?;
            }
            StringEncoding::Utf16 => {
                let units: Vec<u16> = value.encode_utf16().collect();
                if units.len() * 16 > bits {
                    return Err(string_too_long(value, bits));
                }
                self.ensure(bits)?;
                for unit in units.iter().copied().chain(std::iter::repeat(0)).take(bits / 16) {
                    self.write_unsigned_short(unit, 16)?;
                }
            }
        }
        let padding = bits % unit;
        if padding > 0 {
            self.write_unsigned_short(0, padding as u8)?;
        }
        Ok(())
    }

    /// Writes `value` into a field of `len` bytes, padded with NUL bytes.
    pub fn write_terminated_str(&mut self, value: &str, len: usize) -> Result<()> {
        self.write_str(value, len * 8, StringEncoding::Utf8)
    }
}

fn string_too_long(value: &str, bits: usize) -> SerializationError {
    SerializationError::InvalidData(format!("{value:?} does not fit into {bits} bits").into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_fields_are_msb_first() {
        let mut wb = WriteBuffer::new(1, ByteOrder::LittleEndian);
        wb.write_bit(true).unwrap();
        wb.write_unsigned_byte(0x03, 7).unwrap();
        assert_eq!(wb.into_bytes().as_ref(), &[0x83]);
    }

    #[test]
    fn writes_respect_byte_order() {
        let write = |order| {
            let mut wb = WriteBuffer::new(4, order);
            wb.write_unsigned_int(0x1234_5678, 32).unwrap();
            wb.into_bytes()
        };
        assert_eq!(write(ByteOrder::BigEndian).as_ref(), &[0x12, 0x34, 0x56, 0x78]);
        assert_eq!(write(ByteOrder::LittleEndian).as_ref(), &[0x78, 0x56, 0x34, 0x12]);
        assert_eq!(write(ByteOrder::BigEndianByteSwap).as_ref(), &[0x56, 0x78, 0x12, 0x34]);
        assert_eq!(write(ByteOrder::LittleEndianByteSwap).as_ref(), &[0x34, 0x12, 0x78, 0x56]);
    }

    #[test]
    fn overrun_fails() {
        let mut wb = WriteBuffer::new(1, ByteOrder::BigEndian);
        assert!(matches!(
            wb.write_unsigned_short(1, 16),
            Err(SerializationError::OutOfBounds { requested: 16, .. })
        ));
        assert_eq!(wb.pos(), 0);
    }

    #[test]
    fn values_must_fit_the_width() {
        let mut wb = WriteBuffer::new(4, ByteOrder::BigEndian);
        assert!(matches!(
            wb.write_unsigned_byte(0x10, 4),
            Err(SerializationError::ValueOutOfRange { value: 16, bits: 4 })
        ));
        assert!(matches!(
            wb.write_short(-129, 8),
            Err(SerializationError::ValueOutOfRange { bits: 8, .. })
        ));
        assert!(matches!(
            wb.write_unsigned_short(1, 17),
            Err(SerializationError::Range(_))
        ));
        wb.write_short(-2, 16).unwrap();
        wb.write_signed_byte(-1, 4).unwrap();
        assert_eq!(&wb.as_slice()[..3], &[0xFF, 0xFE, 0xF0]);
    }

    #[test]
    fn bcd() {
        let mut wb = WriteBuffer::new(4, ByteOrder::LittleEndian);
        wb.write_bcd(31, 8).unwrap();
        wb.write_bcd(12, 8).unwrap();
        wb.write_bcd(2024, 16).unwrap();
        assert!(wb.write_bcd(100, 8).is_err());
        assert_eq!(wb.into_bytes().as_ref(), &[0x31, 0x12, 0x24, 0x20]);
    }

    #[test]
    fn strings_are_nul_padded() {
        let mut wb = WriteBuffer::new(6, ByteOrder::BigEndian);
        wb.write_terminated_str("PLC", 4).unwrap();
        assert!(wb.write_terminated_str("TOO LONG", 2).is_err());
        wb.write_str("A", 16, StringEncoding::Utf16).unwrap();
        assert_eq!(wb.into_bytes().as_ref(), b"PLC\0\0A");
    }

    #[test]
    fn string_padding_bits_are_zero() {
        let mut wb = WriteBuffer::new(3, ByteOrder::BigEndian);
        wb.write_str("A", 15, StringEncoding::Utf8).unwrap();
        assert_eq!(wb.pos(), 15);
        wb.write_bit(true).unwrap();
        assert!(wb.write_str("AB", 15, StringEncoding::Utf8).is_err());
        assert_eq!(&wb.as_slice()[..2], &[b'A', 0x01]);
    }

    #[test]
    fn context_stack_discipline() {
        let mut wb = WriteBuffer::new(0, ByteOrder::BigEndian);
        wb.push_context("UmasPduItem");
        assert!(wb.pop_context("ModbusPdu").is_err());
        wb.pop_context("UmasPduItem").unwrap();
    }
}
