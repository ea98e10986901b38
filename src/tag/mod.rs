// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tag addresses of the supported dialects.
//!
//! A tag names what to access on the device: an address, a number of
//! elements and the data type of each element.

mod modbus;
mod umas;

pub use self::{
    modbus::{ModbusArea, ModbusTag},
    umas::UmasTag,
};

use regex::Captures;

use crate::error::TagError;

/// Element count of a tag without an explicit quantity.
const DEFAULT_QUANTITY: u16 = 1;

/// Reads the optional `quantity` group, rejecting `0` and values above `max`.
fn quantity(captures: &Captures<'_>, max: u16) -> Result<u16, TagError> {
    let Some(quantity) = captures.name("quantity") else {
        return Ok(DEFAULT_QUANTITY);
    };
    let quantity: u32 = quantity
        .as_str()
        .parse()
        .map_err(|_| TagError::Malformed(captures[0].to_owned()))?;
    if quantity == 0 {
        return Err(TagError::Malformed(captures[0].to_owned()));
    }
    u16::try_from(quantity)
        .ok()
        .filter(|quantity| *quantity <= max)
        .ok_or(TagError::QuantityTooLarge {
            quantity,
            max: max.into(),
        })
}
