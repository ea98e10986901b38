// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Framers that cut complete ADUs out of a byte stream.
//!
//! Decoders only delimit frames and check what the framing itself
//! guarantees. The PDU is parsed later by the party that knows the
//! request it answers.

use std::io;

use bytes::{BufMut as _, Bytes, BytesMut};

use crate::message::Message;

pub mod ascii;
pub mod rtu;
pub mod tcp;

/// Maximum request/response PDU size.
///
/// As defined by the Modbus application protocol for both RTU and TCP.
pub const MAX_PDU_SIZE: usize = 253;

/// A delimited frame that has not been parsed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Correlation key: the transaction identifier for TCP, the server
    /// address on serial lines.
    pub key: u16,

    /// The binary ADU, header and checksum included.
    pub bytes: Bytes,
}

fn invalid_data(err: impl ToString) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err.to_string())
}

fn encode_message(message: &impl Message, buf: &mut BytesMut) -> io::Result<()> {
    let bytes = message.to_bytes().map_err(invalid_data)?;
    buf.reserve(bytes.len());
    buf.put_slice(&bytes);
    Ok(())
}
