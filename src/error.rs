// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types.

use std::{borrow::Cow, io, time::Duration};

use thiserror::Error;

use crate::frame::ExceptionResponse;

/// A primitive was requested with a bit width it cannot hold.
///
/// Raised before the buffer is touched, so the cursor position is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{kind} supports between 1 and {max} bits, but {bits} were requested")]
pub struct RangeViolation {
    pub kind: &'static str,
    pub bits: u8,
    pub max: u8,
}

impl RangeViolation {
    pub(crate) fn check(
        kind: &'static str,
        bits: u8,
        max: u8,
    ) -> std::result::Result<(), Self> {
        if bits == 0 || bits > max {
            return Err(Self { kind, bits, max });
        }
        Ok(())
    }

    pub(crate) fn exact(
        kind: &'static str,
        bits: u8,
        expected: u8,
    ) -> std::result::Result<(), Self> {
        if bits != expected {
            return Err(Self {
                kind,
                bits,
                max: expected,
            });
        }
        Ok(())
    }
}

/// Misuse of a [`PlcValue`](crate::value::PlcValue) accessor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("{value} does not fit into {target}")]
    OutOfRange { value: String, target: &'static str },
}

/// Malformed or truncated wire data.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("buffer overrun: {requested} bits requested at bit {position}, {remaining} remaining")]
    OutOfBounds {
        position: usize,
        requested: usize,
        remaining: usize,
    },

    #[error(transparent)]
    Range(#[from] RangeViolation),

    #[error("invalid BCD digit 0x{0:X}")]
    InvalidBcd(u8),

    /// No variant of a discriminated type matches the observed header values.
    #[error("unsupported case for discriminated type {type_name} [{discriminators}]")]
    UnsupportedCase {
        type_name: &'static str,
        discriminators: String,
    },

    #[error("checksum mismatch: expected 0x{expected:04X}, received 0x{actual:04X}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    #[error("field {field}: expected constant 0x{expected:X}, got 0x{actual:X}")]
    ConstantMismatch {
        field: &'static str,
        expected: u64,
        actual: u64,
    },

    #[error("invalid data: {0}")]
    InvalidData(Cow<'static, str>),

    #[error("invalid string encoding: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("context {popped} closed while {open:?} was open")]
    ContextMismatch {
        popped: &'static str,
        open: Option<&'static str>,
    },

    #[error("unsupported data type {data_type} with {count} value(s)")]
    UnsupportedDataType {
        data_type: &'static str,
        count: usize,
    },
}

/// A value cannot be encoded the way it was requested.
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("buffer overrun: {requested} bits requested at bit {position}, {remaining} remaining")]
    OutOfBounds {
        position: usize,
        requested: usize,
        remaining: usize,
    },

    #[error(transparent)]
    Range(#[from] RangeViolation),

    #[error("value {value} does not fit into {bits} bits")]
    ValueOutOfRange { value: i128, bits: u8 },

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error("invalid data: {0}")]
    InvalidData(Cow<'static, str>),

    #[error("{type_name} announced {expected} bits but wrote {actual}")]
    LengthMismatch {
        type_name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("context {popped} closed while {open:?} was open")]
    ContextMismatch {
        popped: &'static str,
        open: Option<&'static str>,
    },

    #[error("unsupported data type {data_type} with {count} value(s)")]
    UnsupportedDataType {
        data_type: &'static str,
        count: usize,
    },
}

/// A tag address expression could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    #[error("malformed tag address {0:?}")]
    Malformed(String),

    #[error("address {address} with quantity {quantity} exceeds the register space")]
    AddressOutOfRange { address: u32, quantity: u32 },

    #[error("quantity {quantity} exceeds the maximum of {max}")]
    QuantityTooLarge { quantity: u32, max: u32 },

    #[error("unknown data type {0:?}")]
    UnknownDataType(String),

    #[error("tag {0} is read-only")]
    ReadOnly(String),

    #[error("no variable named {0:?}")]
    UnknownTag(String),
}

/// A connection string could not be turned into a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("malformed connection string {0:?}")]
    Malformed(String),

    #[error("unknown protocol code {0:?}")]
    UnknownProtocol(String),

    #[error("unknown option {0:?}")]
    UnknownOption(String),

    #[error("invalid value {value:?} for option {key}")]
    InvalidValue { key: String, value: String },
}

/// Top-level error of connection operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] io::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error("no response for transaction {transaction_id} within {timeout:?}")]
    Timeout {
        transaction_id: u16,
        timeout: Duration,
    },

    #[error("transaction {0} is already in flight")]
    DuplicateTransaction(u16),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("handshake failed during {step}: {source}")]
    Handshake {
        step: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error("exception: {0}")]
    Exception(#[from] ExceptionResponse),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The PLC answered a UMAS request with an error response.
    #[error("UMAS request 0x{function:02X} refused with code 0x{code:02X}")]
    Refused { function: u8, code: u8 },

    #[error(transparent)]
    Tag(#[from] TagError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    pub(crate) fn handshake(step: &'static str, source: Error) -> Self {
        Error::Handshake {
            step,
            source: Box::new(source),
        }
    }

    /// The link to the device is gone.
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        match self {
            Error::ConnectionClosed => true,
            Error::Transport(err) => matches!(
                err.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::UnexpectedEof
            ),
            Error::Handshake { source, .. } => source.is_disconnect(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_violation_rejects_zero_and_oversized_widths() {
        assert!(RangeViolation::check("unsigned byte", 0, 8).is_err());
        assert!(RangeViolation::check("unsigned byte", 8, 8).is_ok());
        let err = RangeViolation::check("unsigned byte", 9, 8).unwrap_err();
        assert_eq!(err.bits, 9);
        assert_eq!(
            err.to_string(),
            "unsigned byte supports between 1 and 8 bits, but 9 were requested"
        );
    }

    #[test]
    fn handshake_errors_keep_the_disconnect_classification() {
        let err = Error::handshake("init-comms", Error::ConnectionClosed);
        assert!(err.is_disconnect());
        let err = Error::handshake(
            "init-comms",
            Error::UnexpectedResponse("wrong pairing key".into()),
        );
        assert!(!err.is_disconnect());
    }
}
