// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::borrow::Cow;

use smallvec::SmallVec;

use super::{bcd_digits, BitOrder, ByteOrder, StringEncoding};
use crate::error::{ParseError, RangeViolation};

type Result<T> = std::result::Result<T, ParseError>;

/// Reading cursor over a byte buffer.
#[derive(Debug, Clone)]
pub struct ReadBuffer<'a> {
    data: Cow<'a, [u8]>,
    pos: usize,
    byte_order: ByteOrder,
    contexts: SmallVec<[&'static str; 8]>,
}

impl<'a> ReadBuffer<'a> {
    #[must_use]
    pub fn new(data: &'a [u8], byte_order: ByteOrder) -> Self {
        Self {
            data: Cow::Borrowed(data),
            pos: 0,
            byte_order,
            contexts: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn with_bit_order(data: &'a [u8], byte_order: ByteOrder, bit_order: BitOrder) -> Self {
        let data = match bit_order {
            BitOrder::Msb0 => Cow::Borrowed(data),
            BitOrder::Lsb0 => Cow::Owned(data.iter().map(|b| b.reverse_bits()).collect()),
        };
        Self {
            data,
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
    pub fn remaining_bytes(&self) -> usize {
        self.remaining_bits() / 8
    }

    #[must_use]
    pub fn has_more(&self, bits: usize) -> bool {
        self.remaining_bits() >= bits
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
            open => Err(ParseError::ContextMismatch {
                popped: name,
                open: open.copied(),
            }),
        }
    }

    fn ensure(&self, bits: usize) -> Result<()> {
        if !self.has_more(bits) {
            return Err(ParseError::OutOfBounds {
                position: self.pos,
                requested: bits,
                remaining: self.remaining_bits(),
            });
        }
        Ok(())
    }

    /// Takes up to 64 bits MSB first.
    fn take_bits(&mut self, bits: usize) -> Result<u64> {
        debug_assert!(bits <= 64);
        self.ensure(bits)?;
        let mut value = 0u64;
        let mut left = bits;
        while left > 0 {
            let byte = self.data[self.pos / 8];
            let offset = self.pos % 8;
            let available = 8 - offset;
            let take = available.min(left);
            let chunk = (byte >> (available - take)) & ((1u16 << take) - 1) as u8;
            value = (value << take) | u64::from(chunk);
            self.pos += take;
            left -= take;
        }
        Ok(value)
    }

    fn read_raw(&mut self, bits: u8, byte_order: ByteOrder) -> Result<u64> {
        if bits % 8 != 0 || bits < 16 {
            return self.take_bits(bits.into());
        }
        let len = usize::from(bits / 8);
        self.ensure(usize::from(bits))?;
        let mut bytes = [0u8; 8];
        for byte in &mut bytes[..len] {
            *byte = self.take_bits(8)? as u8;
        }
        byte_order.arrange(&mut bytes[..len]);
        Ok(bytes[..len]
            .iter()
            .fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }

    fn read_signed(&mut self, bits: u8) -> Result<i64> {
        let raw = self.read_raw(bits, self.byte_order)?;
        let shift = 64 - u32::from(bits);
        Ok(((raw << shift) as i64) >> shift)
    }

    pub fn read_bit(&mut self) -> Result<bool> {
        Ok(self.take_bits(1)? == 1)
    }

    pub fn read_unsigned_byte(&mut self, bits: u8) -> Result<u8> {
        RangeViolation::check("unsigned byte", bits, 8)?;
        Ok(self.take_bits(bits.into())? as u8)
    }

    pub fn read_unsigned_short(&mut self, bits: u8) -> Result<u16> {
        RangeViolation::check("unsigned short", bits, 16)?;
        Ok(self.read_raw(bits, self.byte_order)? as u16)
    }

    pub fn read_unsigned_int(&mut self, bits: u8) -> Result<u32> {
        RangeViolation::check("unsigned int", bits, 32)?;
        Ok(self.read_raw(bits, self.byte_order)? as u32)
    }

    pub fn read_unsigned_long(&mut self, bits: u8) -> Result<u64> {
        RangeViolation::check("unsigned long", bits, 64)?;
        self.read_raw(bits, self.byte_order)
    }

    pub fn read_signed_byte(&mut self, bits: u8) -> Result<i8> {
        RangeViolation::check("signed byte", bits, 8)?;
        Ok(self.read_signed(bits)? as i8)
    }

    pub fn read_short(&mut self, bits: u8) -> Result<i16> {
        RangeViolation::check("short", bits, 16)?;
        Ok(self.read_signed(bits)? as i16)
    }

    pub fn read_int(&mut self, bits: u8) -> Result<i32> {
        RangeViolation::check("int", bits, 32)?;
        Ok(self.read_signed(bits)? as i32)
    }

    pub fn read_long(&mut self, bits: u8) -> Result<i64> {
        RangeViolation::check("long", bits, 64)?;
        self.read_signed(bits)
    }

    pub fn read_float(&mut self, bits: u8) -> Result<f32> {
        RangeViolation::exact("float", bits, 32)?;
        Ok(f32::from_bits(self.read_raw(32, self.byte_order)? as u32))
    }

    pub fn read_double(&mut self, bits: u8) -> Result<f64> {
        RangeViolation::exact("double", bits, 64)?;
        Ok(f64::from_bits(self.read_raw(64, self.byte_order)?))
    }

    /// Reads a binary coded decimal of `bits / 4` digits.
    pub fn read_bcd(&mut self, bits: u8) -> Result<u64> {
        RangeViolation::check("bcd", bits, 64)?;
        if bits % 4 != 0 {
            return Err(RangeViolation {
                kind: "bcd",
                bits,
                max: 64,
            }
            .into());
        }
        let raw = self.read_raw(bits, self.byte_order)?;
        let mut value = 0u64;
        for digit in (0..bcd_digits(bits)).rev() {
            let nibble = ((raw >> (digit * 4)) & 0xF) as u8;
            if nibble > 9 {
                return Err(ParseError::InvalidBcd(nibble));
            }
            value = value * 10 + u64::from(nibble);
        }
        Ok(value)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        self.ensure(len * 8)?;
        if self.pos % 8 == 0 {
            let start = self.pos / 8;
            self.pos += len * 8;
            return Ok(self.data[start..start + len].to_vec());
        }
        (0..len).map(|_| Ok(self.take_bits(8)? as u8)).collect()
    }

    /// Reads a fixed-width string of `bits` bits.
    ///
    /// Bits behind the last whole code unit are padding and skipped.
    pub fn read_str(&mut self, bits: usize, encoding: StringEncoding) -> Result<String> {
        let unit = encoding.unit_bits();
        if bits < unit {
            return Err(ParseError::InvalidData(
                format!("string width of {bits} bits is below one {unit} bit unit").into(),
            ));
        }
        let text = match encoding {
            StringEncoding::Utf8 => String::from_utf8(self.read_bytes(bits / 8)?)?,
            StringEncoding::Utf16 => {
                let units = (0..bits / 16)
                    .map(|_| self.read_unsigned_short(16))
                    .collect::<Result<Vec<_>>>()?;
                char::decode_utf16(units)
                    .collect::<std::result::Result<String, _>>()
                    .map_err(|err| ParseError::InvalidData(err.to_string().into()))?
            }
        };
        let padding = bits % unit;
        if padding > 0 {
            self.read_unsigned_short(padding as u8)?;
        }
        Ok(text)
    }

    /// Reads `len` bytes and returns the text up to the first NUL.
    pub fn read_terminated_str(&mut self, len: usize) -> Result<String> {
        let bytes = self.read_bytes(len)?;
        let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}
