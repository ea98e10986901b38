// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{ModbusPdu, PduContext};
use crate::{
    buffer::{ReadBuffer, WriteBuffer},
    error::{ParseError, SerializationError},
    message::{u16_len, Message},
};

pub type TransactionId = u16;
pub type UnitId = u8;

/// The protocol identifier of Modbus.
pub const PROTOCOL_ID: u16 = 0x0000;

/// Size of the MBAP header in bytes, unit identifier included.
pub const HEADER_LEN: usize = 7;

/// The part of the MBAP header that a response must echo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub transaction_id: TransactionId,
    pub unit_id: UnitId,
}

/// A Modbus TCP ADU: MBAP header followed by a PDU.
#[derive(Debug, Clone, PartialEq)]
pub struct ModbusTcpAdu {
    pub transaction_identifier: TransactionId,
    pub unit_identifier: UnitId,
    pub pdu: ModbusPdu,
}

impl ModbusTcpAdu {
    #[must_use]
    pub fn header(&self) -> Header {
        Header {
            transaction_id: self.transaction_identifier,
            unit_id: self.unit_identifier,
        }
    }

    /// Parses an ADU travelling in the direction given by `response`.
    ///
    /// `umas_request_function_key` selects the variant of UMAS responses.
    pub fn parse(
        rb: &mut ReadBuffer<'_>,
        response: bool,
        umas_request_function_key: u8,
    ) -> Result<Self, ParseError> {
        rb.push_context(Self::NAME);
        let transaction_identifier = rb.read_unsigned_short(16)?;
        let protocol_identifier = rb.read_unsigned_short(16)?;
        if protocol_identifier != PROTOCOL_ID {
            return Err(ParseError::ConstantMismatch {
                field: "protocolIdentifier",
                expected: PROTOCOL_ID.into(),
                actual: protocol_identifier.into(),
            });
        }
        // The length covers the unit identifier.
        let length = rb.read_unsigned_short(16)?;
        let unit_identifier = rb.read_unsigned_byte(8)?;
        let byte_length = length.checked_sub(1).ok_or_else(|| {
            ParseError::InvalidData("MBAP length does not cover the unit identifier".into())
        })?;
        let ctx = PduContext {
            response,
            umas_request_function_key,
            byte_length,
        };
        let pdu = ModbusPdu::parse(rb, &ctx)?;
        rb.pop_context(Self::NAME)?;
        Ok(Self {
            transaction_identifier,
            unit_identifier,
            pdu,
        })
    }
}

impl Message for ModbusTcpAdu {
    const NAME: &'static str = "ModbusTcpADU";

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), SerializationError> {
        wb.push_context(Self::NAME);
        wb.write_unsigned_short(self.transaction_identifier, 16)?;
        wb.write_unsigned_short(PROTOCOL_ID, 16)?;
        wb.write_unsigned_short(u16_len(self.pdu.length_in_bytes() + 1)?, 16)?;
        wb.write_unsigned_byte(self.unit_identifier, 8)?;
        self.pdu.serialize(wb)?;
        wb.pop_context(Self::NAME)
    }

    fn length_in_bits(&self) -> usize {
        HEADER_LEN * 8 + self.pdu.length_in_bits()
    }
}
