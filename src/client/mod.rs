// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! PLC connections

use std::{collections::BTreeMap, fmt};

use async_trait::async_trait;

pub use crate::service::ConnectionState;
use crate::{
    error::{ParseError, SerializationError, TagError, ValueError},
    frame::{ExceptionCode, ExceptionResponse},
    value::PlcValue,
    Error, Result,
};

pub mod modbus;
pub mod umas;

pub use self::{modbus::ModbusTcpConnection, umas::UmasConnection};

/// Protocol independent asynchronous connection to a PLC.
#[async_trait]
pub trait Connection: Send + Sync + fmt::Debug {
    /// Executes a request.
    ///
    /// Protocol level failures are reported through the response codes.
    async fn execute(&self, request: PlcRequest) -> PlcResponse;

    /// Closes the connection.
    ///
    /// Requests still waiting for their response fail with
    /// [`ResponseCode::NotConnected`].
    async fn close(&self) -> Result<()>;

    fn state(&self) -> ConnectionState;

    fn is_connected(&self) -> bool {
        self.state().is_connected()
    }
}

/// A request in terms of tags and values.
///
/// Tags are given as `(name, address)`; the name keys the response items.
#[derive(Debug, Clone, PartialEq)]
pub enum PlcRequest {
    Read {
        tags: Vec<(String, String)>,
    },
    Write {
        items: Vec<(String, String, PlcValue)>,
    },
    /// Lists the tags known to the device.
    Browse,
}

impl PlcRequest {
    /// A request reading a single tag.
    #[must_use]
    pub fn read(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self::Read {
            tags: vec![(name.into(), address.into())],
        }
    }

    /// A request writing a single tag.
    #[must_use]
    pub fn write(name: impl Into<String>, address: impl Into<String>, value: PlcValue) -> Self {
        Self::Write {
            items: vec![(name.into(), address.into(), value)],
        }
    }
}

/// Outcome of a request or of a single tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    Ok,
    NotConnected,
    InternalError,
    /// The device refused the request.
    AccessDenied,
    InvalidAddress,
    InvalidDatatype,
    /// The device failed to process the request.
    RemoteError,
    Unsupported,
}

impl ResponseCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::NotConnected => "NOT_CONNECTED",
            Self::InternalError => "INTERNAL_ERROR",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::InvalidAddress => "INVALID_ADDRESS",
            Self::InvalidDatatype => "INVALID_DATATYPE",
            Self::RemoteError => "REMOTE_ERROR",
            Self::Unsupported => "UNSUPPORTED",
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ExceptionCode> for ResponseCode {
    fn from(from: ExceptionCode) -> Self {
        use ExceptionCode::*;
        match from {
            IllegalFunction => Self::Unsupported,
            IllegalDataAddress => Self::InvalidAddress,
            IllegalDataValue => Self::AccessDenied,
            MemoryParityError | GatewayPathUnavailable => Self::InternalError,
            ServerDeviceFailure
            | Acknowledge
            | ServerDeviceBusy
            | GatewayTargetDevice
            | Custom(_) => Self::RemoteError,
        }
    }
}

impl From<&Error> for ResponseCode {
    fn from(from: &Error) -> Self {
        if from.is_disconnect() {
            return Self::NotConnected;
        }
        match from {
            Error::Exception(ExceptionResponse { exception, .. }) => (*exception).into(),
            Error::Handshake { .. } => Self::NotConnected,
            Error::Refused { .. } => Self::AccessDenied,
            Error::Tag(TagError::ReadOnly(_)) => Self::AccessDenied,
            Error::Tag(TagError::UnknownDataType(_))
            | Error::Parse(ParseError::UnsupportedDataType { .. })
            | Error::Serialization(
                SerializationError::UnsupportedDataType { .. }
                | SerializationError::Value(ValueError::TypeMismatch { .. }),
            ) => Self::InvalidDatatype,
            Error::Tag(_) => Self::InvalidAddress,
            _ => Self::InternalError,
        }
    }
}

/// Result of a single tag.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseItem {
    pub code: ResponseCode,
    pub value: Option<PlcValue>,
}

impl ResponseItem {
    #[must_use]
    pub fn ok(value: Option<PlcValue>) -> Self {
        Self {
            code: ResponseCode::Ok,
            value,
        }
    }

    #[must_use]
    pub fn failed(code: ResponseCode) -> Self {
        Self { code, value: None }
    }
}

/// Result of a [`PlcRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct PlcResponse {
    pub code: ResponseCode,
    pub items: BTreeMap<String, ResponseItem>,
}

impl PlcResponse {
    /// A response without any items.
    #[must_use]
    pub fn failed(code: ResponseCode) -> Self {
        Self {
            code,
            items: BTreeMap::new(),
        }
    }

    /// A response carrying the outcome of the single tag `name`.
    ///
    /// The top-level code is the code of the tag.
    #[must_use]
    pub fn single(name: String, item: ResponseItem) -> Self {
        Self {
            code: item.code,
            items: BTreeMap::from([(name, item)]),
        }
    }

    /// Converts the result of a single tag operation.
    pub(crate) fn from_result(name: String, result: Result<Option<PlcValue>>) -> Self {
        let item = match result {
            Ok(value) => ResponseItem::ok(value),
            Err(err) => {
                log::warn!("Request for {name} failed: {err}");
                ResponseItem::failed((&err).into())
            }
        };
        Self::single(name, item)
    }

    #[must_use]
    pub fn value(&self, name: &str) -> Option<&PlcValue> {
        self.items.get(name)?.value.as_ref()
    }
}

/// Multi tag requests are not supported by the dialects.
fn unsupported(count: usize) -> PlcResponse {
    log::debug!("Rejecting request with {count} tags");
    PlcResponse::failed(ResponseCode::Unsupported)
}

/// Splits a request into its single tag and value, if it has exactly one.
pub(crate) fn single_read(tags: Vec<(String, String)>) -> std::result::Result<(String, String), PlcResponse> {
    let count = tags.len();
    let mut tags = tags.into_iter();
    match (tags.next(), tags.next()) {
        (Some(tag), None) => Ok(tag),
        _ => Err(unsupported(count)),
    }
}

pub(crate) fn single_write(
    items: Vec<(String, String, PlcValue)>,
) -> std::result::Result<(String, String, PlcValue), PlcResponse> {
    let count = items.len();
    let mut items = items.into_iter();
    match (items.next(), items.next()) {
        (Some(item), None) => Ok(item),
        _ => Err(unsupported(count)),
    }
}

#[cfg(test)]
mod tests {
    use std::{io, time::Duration};

    use super::*;
    use crate::frame::FunctionCode;

    #[test]
    fn exception_codes() {
        let code = |exception| {
            ResponseCode::from(&Error::Exception(ExceptionResponse {
                function: FunctionCode::ReadHoldingRegisters,
                exception,
            }))
        };
        assert_eq!(code(ExceptionCode::IllegalDataAddress), ResponseCode::InvalidAddress);
        assert_eq!(code(ExceptionCode::IllegalFunction), ResponseCode::Unsupported);
        assert_eq!(code(ExceptionCode::IllegalDataValue), ResponseCode::AccessDenied);
        assert_eq!(code(ExceptionCode::ServerDeviceBusy), ResponseCode::RemoteError);
    }

    #[test]
    fn error_codes() {
        let code = |err: Error| ResponseCode::from(&err);
        assert_eq!(code(Error::ConnectionClosed), ResponseCode::NotConnected);
        assert_eq!(
            code(io::Error::from(io::ErrorKind::BrokenPipe).into()),
            ResponseCode::NotConnected
        );
        assert_eq!(
            code(Error::Timeout {
                transaction_id: 1,
                timeout: Duration::from_secs(5)
            }),
            ResponseCode::InternalError
        );
        assert_eq!(
            code(ParseError::InvalidData("short".into()).into()),
            ResponseCode::InternalError
        );
        assert_eq!(
            code(TagError::Malformed("x".into()).into()),
            ResponseCode::InvalidAddress
        );
        assert_eq!(
            code(Error::Refused {
                function: 0x23,
                code: 0x81
            }),
            ResponseCode::AccessDenied
        );
        assert_eq!(
            code(TagError::UnknownTag("x".into()).into()),
            ResponseCode::InvalidAddress
        );
        assert_eq!(
            code(TagError::UnknownDataType("x".into()).into()),
            ResponseCode::InvalidDatatype
        );
        assert_eq!(
            code(
                SerializationError::UnsupportedDataType {
                    data_type: "DATE",
                    count: 2
                }
                .into()
            ),
            ResponseCode::InvalidDatatype
        );
    }

    #[test]
    fn single_tag_requests() {
        let PlcRequest::Read { tags } = PlcRequest::read("a", "4x00001") else {
            unreachable!()
        };
        assert_eq!(single_read(tags).unwrap(), ("a".to_owned(), "4x00001".to_owned()));

        let response = single_read(vec![]).unwrap_err();
        assert_eq!(response.code, ResponseCode::Unsupported);

        let response = single_write(vec![
            ("a".into(), "4x00001".into(), PlcValue::Int(1)),
            ("b".into(), "4x00002".into(), PlcValue::Int(2)),
        ])
        .unwrap_err();
        assert_eq!(response.code, ResponseCode::Unsupported);
        assert!(response.items.is_empty());
    }

    #[test]
    fn response_of_a_failed_tag() {
        let response = PlcResponse::from_result("a".into(), Err(Error::ConnectionClosed));
        assert_eq!(response.code, ResponseCode::NotConnected);
        assert_eq!(response.items["a"], ResponseItem::failed(ResponseCode::NotConnected));
        assert_eq!(response.value("a"), None);
    }
}
