// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! UMAS items tunnelled through Modbus function `0x5A`.

mod memory;
mod pdu;
mod variable;

pub use self::{
    memory::UmasMemoryBlock,
    pdu::{PlcMemoryBlockIdent, UmasPduItem, UmasPduKind, UmasPduPayload},
    variable::{
        UmasDatatypeReference, UmasUnlocatedVariableReference, UmasVariableBlock,
        VariableReadRequestReference, VariableWriteRequestReference,
    },
};

/// Function key shared by every successful response.
pub const UMAS_RESPONSE_KEY: u8 = 0xFE;

/// Function key of error responses.
pub const UMAS_ERROR_KEY: u8 = 0xFD;
