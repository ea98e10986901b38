// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{fmt, str::FromStr, sync::OnceLock};

use regex::Regex;

use super::quantity;
use crate::{data_item::modbus::ModbusDataType, error::TagError};

/// Registers per file of the extended register area.
pub(crate) const FILE_RECORD_LENGTH: u32 = 10_000;

/// Highest 0-based address of the 16 bit areas.
const MAX_ADDRESS: u32 = 0xFFFF;

/// Highest 0-based address of the extended register area.
const MAX_EXTENDED_ADDRESS: u32 = 655_359;

const MAX_BIT_QUANTITY: u16 = 2000;
const MAX_REGISTER_QUANTITY: u16 = 120;

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(concat!(
            r"^(?:",
            r"(?P<area>coil|discrete-input|input-register|holding-register|extended-register):(?P<address>\d+)",
            r"|(?P<x_area>[01346])x(?P<x_address>\d+)",
            r"|(?P<digit_area>[01346])(?P<digit_address>\d{5,6})",
            r")",
            r"(?::(?P<data_type>[A-Za-z]+))?",
            r"(?:\[(?P<quantity>\d+)\])?$",
        ))
        .expect("valid Modbus tag pattern")
    })
}

/// The memory areas of a Modbus server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModbusArea {
    /// `0x`, read/write bits.
    Coil,
    /// `1x`, read-only bits.
    DiscreteInput,
    /// `3x`, read-only registers.
    InputRegister,
    /// `4x`, read/write registers.
    HoldingRegister,
    /// `6x`, registers accessed as file records.
    ExtendedRegister,
}

impl ModbusArea {
    fn from_prefix(prefix: &str) -> Option<Self> {
        let area = match prefix {
            "0" | "coil" => Self::Coil,
            "1" | "discrete-input" => Self::DiscreteInput,
            "3" | "input-register" => Self::InputRegister,
            "4" | "holding-register" => Self::HoldingRegister,
            "6" | "extended-register" => Self::ExtendedRegister,
            _ => return None,
        };
        Some(area)
    }

    #[must_use]
    pub const fn is_bit_area(self) -> bool {
        matches!(self, Self::Coil | Self::DiscreteInput)
    }

    #[must_use]
    pub const fn is_writable(self) -> bool {
        matches!(
            self,
            Self::Coil | Self::HoldingRegister | Self::ExtendedRegister
        )
    }

    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Coil => "0x",
            Self::DiscreteInput => "1x",
            Self::InputRegister => "3x",
            Self::HoldingRegister => "4x",
            Self::ExtendedRegister => "6x",
        }
    }

    const fn max_quantity(self) -> u16 {
        if self.is_bit_area() {
            MAX_BIT_QUANTITY
        } else {
            MAX_REGISTER_QUANTITY
        }
    }

    const fn max_address(self) -> u32 {
        match self {
            Self::ExtendedRegister => MAX_EXTENDED_ADDRESS,
            _ => MAX_ADDRESS,
        }
    }

    const fn default_data_type(self) -> ModbusDataType {
        if self.is_bit_area() {
            ModbusDataType::Bool
        } else {
            ModbusDataType::Int
        }
    }
}

/// A parsed Modbus tag address.
///
/// Tag addresses are 1-based register numbers with an area prefix, e.g.
/// `400001` or `4x00001` for the first holding register, optionally
/// followed by a data type and an element count: `4x00010:REAL[2]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModbusTag {
    pub area: ModbusArea,
    /// 0-based protocol address.
    pub address: u32,
    pub quantity: u16,
    pub data_type: ModbusDataType,
}

impl ModbusTag {
    /// Number of bits or registers the tag spans on the device.
    #[must_use]
    pub fn length(&self) -> u16 {
        if self.area.is_bit_area() {
            return self.quantity;
        }
        let bytes = u32::from(self.data_type.data_type_size()) * u32::from(self.quantity);
        // Bounded by the quantity limit of register areas.
        u16::try_from((bytes + 1) / 2).unwrap_or(u16::MAX)
    }

    /// The 16 bit protocol address of bit and register areas.
    #[must_use]
    pub fn protocol_address(&self) -> u16 {
        u16::try_from(self.address).unwrap_or(u16::MAX)
    }

    /// `(file number, record number, record length)` of the file record
    /// groups of an extended register tag.
    ///
    /// A tag crossing a file boundary spans two groups.
    #[must_use]
    pub fn file_record_groups(&self) -> Vec<(u16, u16, u16)> {
        let length = u32::from(self.length());
        let file_number = self.address / FILE_RECORD_LENGTH + 1;
        let record_number = self.address % FILE_RECORD_LENGTH;
        let to_u16 = |value: u32| u16::try_from(value).unwrap_or(u16::MAX);
        if record_number + length <= FILE_RECORD_LENGTH {
            vec![(to_u16(file_number), to_u16(record_number), to_u16(length))]
        } else {
            let first = FILE_RECORD_LENGTH - record_number;
            vec![
                (to_u16(file_number), to_u16(record_number), to_u16(first)),
                (to_u16(file_number + 1), 0, to_u16(length - first)),
            ]
        }
    }
}

impl FromStr for ModbusTag {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || TagError::Malformed(s.to_owned());
        let captures = pattern().captures(s).ok_or_else(malformed)?;

        let (area, address) = [
            ("area", "address"),
            ("x_area", "x_address"),
            ("digit_area", "digit_address"),
        ]
        .into_iter()
        .find_map(|(area, address)| Some((captures.name(area)?, captures.name(address)?)))
        .ok_or_else(malformed)?;
        let area = ModbusArea::from_prefix(area.as_str()).ok_or_else(malformed)?;
        let address: u32 = address.as_str().parse().map_err(|_| malformed())?;
        // Tag addresses count from 1.
        let address = address.checked_sub(1).ok_or_else(malformed)?;

        let data_type = captures
            .name("data_type")
            .map(|data_type| data_type.as_str().parse())
            .transpose()?
            .unwrap_or_else(|| area.default_data_type());
        let quantity = quantity(&captures, area.max_quantity())?;

        let tag = Self {
            area,
            address,
            quantity,
            data_type,
        };
        if address + u32::from(tag.length()) - 1 > area.max_address() {
            return Err(TagError::AddressOutOfRange {
                address: address + 1,
                quantity: quantity.into(),
            });
        }
        Ok(tag)
    }
}

impl fmt::Display for ModbusTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:05}:{}",
            self.area.prefix(),
            self.address + 1,
            self.data_type
        )?;
        if self.quantity != 1 {
            write!(f, "[{}]", self.quantity)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> ModbusTag {
        s.parse().unwrap()
    }

    #[test]
    fn prefixes() {
        for (tag, area) in [
            ("000001", ModbusArea::Coil),
            ("0x00001", ModbusArea::Coil),
            ("coil:1", ModbusArea::Coil),
            ("100001", ModbusArea::DiscreteInput),
            ("1x00001", ModbusArea::DiscreteInput),
            ("discrete-input:1", ModbusArea::DiscreteInput),
            ("300001", ModbusArea::InputRegister),
            ("3x00001", ModbusArea::InputRegister),
            ("input-register:1", ModbusArea::InputRegister),
            ("400001", ModbusArea::HoldingRegister),
            ("4x00001", ModbusArea::HoldingRegister),
            ("holding-register:1", ModbusArea::HoldingRegister),
            ("600001", ModbusArea::ExtendedRegister),
            ("6x00001", ModbusArea::ExtendedRegister),
            ("extended-register:1", ModbusArea::ExtendedRegister),
        ] {
            let tag = parse(tag);
            assert_eq!(tag.area, area);
            assert_eq!(tag.address, 0);
            assert_eq!(tag.quantity, 1);
        }
    }

    #[test]
    fn default_data_types() {
        assert_eq!(parse("0x00001").data_type, ModbusDataType::Bool);
        assert_eq!(parse("1x00001").data_type, ModbusDataType::Bool);
        assert_eq!(parse("3x00001").data_type, ModbusDataType::Int);
        assert_eq!(parse("4x00001").data_type, ModbusDataType::Int);
    }

    #[test]
    fn data_type_and_quantity() {
        let tag = parse("4x00010:REAL[2]");
        assert_eq!(tag.address, 9);
        assert_eq!(tag.data_type, ModbusDataType::Real);
        assert_eq!(tag.quantity, 2);
        assert_eq!(tag.length(), 4);
        assert_eq!(tag.to_string(), "4x00010:REAL[2]");

        let tag = parse("holding-register:5:real");
        assert_eq!(tag.address, 4);
        assert_eq!(tag.data_type, ModbusDataType::Real);
    }

    #[test]
    fn register_count_rounds_up() {
        assert_eq!(parse("4x00001:CHAR[3]").length(), 2);
        assert_eq!(parse("4x00001:LREAL").length(), 4);
        assert_eq!(parse("0x00001[13]").length(), 13);
    }

    #[test]
    fn malformed_tags() {
        for tag in ["", "5x00001", "4x", "400001:REAL[0]", "4x00000", "4x1[", "41"] {
            assert!(
                matches!(tag.parse::<ModbusTag>(), Err(TagError::Malformed(_))),
                "{tag}"
            );
        }
        assert!(matches!(
            "4x00001:FOO".parse::<ModbusTag>(),
            Err(TagError::UnknownDataType(_))
        ));
    }

    #[test]
    fn quantity_limits() {
        assert!("0x00001[2000]".parse::<ModbusTag>().is_ok());
        assert!(matches!(
            "0x00001[2001]".parse::<ModbusTag>(),
            Err(TagError::QuantityTooLarge {
                quantity: 2001,
                max: 2000
            })
        ));
        assert!("4x00001[120]".parse::<ModbusTag>().is_ok());
        assert!(matches!(
            "4x00001[121]".parse::<ModbusTag>(),
            Err(TagError::QuantityTooLarge { max: 120, .. })
        ));
    }

    #[test]
    fn address_limits() {
        assert_eq!(parse("4x65536").address, 0xFFFF);
        assert!(matches!(
            "4x65536[2]".parse::<ModbusTag>(),
            Err(TagError::AddressOutOfRange {
                address: 65536,
                quantity: 2
            })
        ));
        assert!(matches!(
            "4x65536:DINT".parse::<ModbusTag>(),
            Err(TagError::AddressOutOfRange { .. })
        ));
        assert!("6x100000".parse::<ModbusTag>().is_ok());
    }

    #[test]
    fn extended_registers_split_at_file_boundaries() {
        let tag = parse("6x00001[4]");
        assert_eq!(tag.file_record_groups(), [(1, 0, 4)]);

        let tag = parse("6x19999:DINT[3]");
        assert_eq!(tag.address, 19_998);
        assert_eq!(tag.file_record_groups(), [(2, 9998, 2), (3, 0, 4)]);
    }
}
