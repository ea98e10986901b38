// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bit-addressable cursors over byte buffers.
//!
//! Sub-byte fields are always packed most significant bit first. The
//! configured [`ByteOrder`] only applies to primitives whose width is a
//! multiple of 8 and at least 16 bits.

use std::{fmt, str::FromStr};

mod read;
mod write;

pub use self::{read::ReadBuffer, write::WriteBuffer};

/// Byte order of multi-byte primitives.
///
/// The word swapped variants exist for PLC firmware that transmits the
/// 16 bit registers of a 32/64 bit value out of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    /// `AB CD`
    #[default]
    BigEndian,
    /// `DC BA`
    LittleEndian,
    /// `CD AB`: big-endian words, swapped pairwise.
    BigEndianByteSwap,
    /// `BA DC`: bytes swapped within each big-endian word.
    LittleEndianByteSwap,
}

impl ByteOrder {
    /// The register layout puts the most significant byte first.
    #[must_use]
    pub const fn is_big_endian(self) -> bool {
        matches!(self, Self::BigEndian | Self::BigEndianByteSwap)
    }

    /// Converts between the canonical big-endian representation and
    /// this byte order. Every variant is its own inverse.
    ///
    /// The swapped orders only apply to values made of whole 32-bit groups
    /// (word swap) or whole 16-bit words (byte swap). Any other width, e.g.
    /// 48 bits, stays in big-endian order.
    pub(crate) fn arrange(self, bytes: &mut [u8]) {
        match self {
            Self::BigEndian => {}
            Self::LittleEndian => bytes.reverse(),
            Self::BigEndianByteSwap if bytes.len() % 4 == 0 => {
                for dword in bytes.chunks_exact_mut(4) {
                    dword.rotate_left(2);
                }
            }
            Self::LittleEndianByteSwap if bytes.len() % 2 == 0 => {
                for word in bytes.chunks_exact_mut(2) {
                    word.swap(0, 1);
                }
            }
            Self::BigEndianByteSwap | Self::LittleEndianByteSwap => {}
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BigEndian => "BIG_ENDIAN",
            Self::LittleEndian => "LITTLE_ENDIAN",
            Self::BigEndianByteSwap => "BIG_ENDIAN_BYTE_SWAP",
            Self::LittleEndianByteSwap => "LITTLE_ENDIAN_BYTE_SWAP",
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ByteOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BIG_ENDIAN" => Ok(Self::BigEndian),
            "LITTLE_ENDIAN" => Ok(Self::LittleEndian),
            "BIG_ENDIAN_BYTE_SWAP" => Ok(Self::BigEndianByteSwap),
            "LITTLE_ENDIAN_BYTE_SWAP" => Ok(Self::LittleEndianByteSwap),
            other => Err(format!("unknown byte order {other:?}")),
        }
    }
}

/// Order of the bits inside each byte of a [`ReadBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitOrder {
    #[default]
    Msb0,
    /// Packed coil bytes: the first bit lives in the least significant position.
    Lsb0,
}

/// Character encoding of string fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringEncoding {
    #[default]
    Utf8,
    /// UTF-16 code units in the byte order of the cursor.
    Utf16,
}

impl StringEncoding {
    pub(crate) const fn unit_bits(self) -> usize {
        match self {
            Self::Utf8 => 8,
            Self::Utf16 => 16,
        }
    }
}

fn bcd_digits(bits: u8) -> u32 {
    u32::from(bits / 4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrange_32_bit_values() {
        let canonical = [0xA, 0xB, 0xC, 0xD];
        let cases = [
            (ByteOrder::BigEndian, [0xA, 0xB, 0xC, 0xD]),
            (ByteOrder::LittleEndian, [0xD, 0xC, 0xB, 0xA]),
            (ByteOrder::BigEndianByteSwap, [0xC, 0xD, 0xA, 0xB]),
            (ByteOrder::LittleEndianByteSwap, [0xB, 0xA, 0xD, 0xC]),
        ];
        for (order, expected) in cases {
            let mut bytes = canonical;
            order.arrange(&mut bytes);
            assert_eq!(bytes, expected, "{order}");
            order.arrange(&mut bytes);
            assert_eq!(bytes, canonical, "{order} is not an involution");
        }
    }

    #[test]
    fn word_swap_of_64_bit_values_swaps_pairwise() {
        let mut bytes = [1, 2, 3, 4, 5, 6, 7, 8];
        ByteOrder::BigEndianByteSwap.arrange(&mut bytes);
        assert_eq!(bytes, [3, 4, 1, 2, 7, 8, 5, 6]);
    }

    #[test]
    fn swapped_orders_leave_partial_groups_big_endian() {
        let canonical = [1, 2, 3, 4, 5, 6];
        for order in [ByteOrder::BigEndianByteSwap, ByteOrder::LittleEndianByteSwap] {
            let mut odd = [1, 2, 3];
            order.arrange(&mut odd);
            assert_eq!(odd, [1, 2, 3], "{order}");
        }
        let mut bytes = canonical;
        ByteOrder::BigEndianByteSwap.arrange(&mut bytes);
        assert_eq!(bytes, canonical);
        ByteOrder::LittleEndianByteSwap.arrange(&mut bytes);
        assert_eq!(bytes, [2, 1, 4, 3, 6, 5]);
    }

    #[test]
    fn word_swapped_48_bit_values_round_trip() {
        let mut wb = WriteBuffer::new(6, ByteOrder::BigEndianByteSwap);
        wb.write_unsigned_long(0x0102_0304_0506, 48).unwrap();
        let bytes = wb.into_bytes();
        assert_eq!(bytes.as_ref(), &[1, 2, 3, 4, 5, 6]);
        let mut rb = ReadBuffer::new(&bytes, ByteOrder::BigEndianByteSwap);
        assert_eq!(rb.read_unsigned_long(48).unwrap(), 0x0102_0304_0506);
    }

    #[test]
    fn byte_order_names() {
        for order in [
            ByteOrder::BigEndian,
            ByteOrder::LittleEndian,
            ByteOrder::BigEndianByteSwap,
            ByteOrder::LittleEndianByteSwap,
        ] {
            assert_eq!(order.as_str().parse::<ByteOrder>(), Ok(order));
        }
        assert!("MIDDLE_ENDIAN".parse::<ByteOrder>().is_err());
    }
}
