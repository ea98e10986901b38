// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{DriverType, ModbusAsciiAdu, ModbusPdu, ModbusRtuAdu, ModbusTcpAdu};
use crate::{
    buffer::{ReadBuffer, WriteBuffer},
    error::{ParseError, SerializationError},
    message::Message,
};

/// A Modbus ADU of any transport framing.
#[derive(Debug, Clone, PartialEq)]
pub enum ModbusAdu {
    Tcp(ModbusTcpAdu),
    Rtu(ModbusRtuAdu),
    Ascii(ModbusAsciiAdu),
}

impl ModbusAdu {
    #[must_use]
    pub fn driver_type(&self) -> DriverType {
        match self {
            Self::Tcp(_) => DriverType::ModbusTcp,
            Self::Rtu(_) => DriverType::ModbusRtu,
            Self::Ascii(_) => DriverType::ModbusAscii,
        }
    }

    #[must_use]
    pub fn pdu(&self) -> &ModbusPdu {
        match self {
            Self::Tcp(adu) => &adu.pdu,
            Self::Rtu(adu) => &adu.pdu,
            Self::Ascii(adu) => &adu.pdu,
        }
    }

    #[must_use]
    pub fn into_pdu(self) -> ModbusPdu {
        match self {
            Self::Tcp(adu) => adu.pdu,
            Self::Rtu(adu) => adu.pdu,
            Self::Ascii(adu) => adu.pdu,
        }
    }

    /// Parses the framing selected by `driver_type`.
    ///
    /// ASCII frames are expected in their binary form.
    pub fn parse(
        rb: &mut ReadBuffer<'_>,
        driver_type: DriverType,
        response: bool,
        umas_request_function_key: u8,
    ) -> Result<Self, ParseError> {
        let adu = match driver_type {
            DriverType::ModbusTcp => {
                Self::Tcp(ModbusTcpAdu::parse(rb, response, umas_request_function_key)?)
            }
            DriverType::ModbusRtu => {
                Self::Rtu(ModbusRtuAdu::parse(rb, response, umas_request_function_key)?)
            }
            DriverType::ModbusAscii => {
                Self::Ascii(ModbusAsciiAdu::parse(rb, response, umas_request_function_key)?)
            }
        };
        Ok(adu)
    }
}

impl Message for ModbusAdu {
    const NAME: &'static str = "ModbusADU";

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), SerializationError> {
        match self {
            Self::Tcp(adu) => adu.serialize(wb),
            Self::Rtu(adu) => adu.serialize(wb),
            Self::Ascii(adu) => adu.serialize(wb),
        }
    }

    fn length_in_bits(&self) -> usize {
        match self {
            Self::Tcp(adu) => adu.length_in_bits(),
            Self::Rtu(adu) => adu.length_in_bits(),
            Self::Ascii(adu) => adu.length_in_bits(),
        }
    }
}

impl From<ModbusTcpAdu> for ModbusAdu {
    fn from(from: ModbusTcpAdu) -> Self {
        Self::Tcp(from)
    }
}

impl From<ModbusRtuAdu> for ModbusAdu {
    fn from(from: ModbusRtuAdu) -> Self {
        Self::Rtu(from)
    }
}

impl From<ModbusAsciiAdu> for ModbusAdu {
    fn from(from: ModbusAsciiAdu) -> Self {
        Self::Ascii(from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ByteOrder;

    fn request() -> ModbusPdu {
        ModbusPdu::ReadCoilsRequest {
            starting_address: 0x0013,
            quantity: 0x0025,
        }
    }

    #[test]
    fn same_pdu_in_every_framing() {
        let adus: [ModbusAdu; 3] = [
            ModbusTcpAdu {
                transaction_identifier: 1,
                unit_identifier: 0x11,
                pdu: request(),
            }
            .into(),
            ModbusRtuAdu {
                address: 0x11,
                pdu: request(),
            }
            .into(),
            ModbusAsciiAdu {
                address: 0x11,
                pdu: request(),
            }
            .into(),
        ];
        let expected_lengths = [12, 8, 7];
        for (adu, expected_len) in adus.iter().zip(expected_lengths) {
            let bytes = adu.to_bytes().unwrap();
            assert_eq!(bytes.len(), expected_len, "{:?}", adu.driver_type());
            let mut rb = ReadBuffer::new(&bytes, ByteOrder::BigEndian);
            let parsed = ModbusAdu::parse(&mut rb, adu.driver_type(), false, 0).unwrap();
            assert_eq!(&parsed, adu);
            assert_eq!(parsed.into_pdu(), request());
        }
    }
}
