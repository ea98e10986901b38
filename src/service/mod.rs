// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The connection runtime below the PLC clients.

use std::fmt;

use tokio::io::{AsyncRead, AsyncWrite};

pub mod tcp;

pub use self::tcp::TcpService;

/// A byte stream to a device.
///
/// Implemented for every suitable stream, e.g. a [`tokio::net::TcpStream`]
/// or one end of a [`tokio::io::duplex`] pipe.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Life cycle of a connection.
///
/// ```text
/// Disconnected -> Connecting -> Connected <-> AwaitingResponse
///                                  |
///                               Closing -> Disconnected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// At least one request is in flight.
    AwaitingResponse,
    Closing,
}

impl ConnectionState {
    /// Whether requests may be issued.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected | Self::AwaitingResponse)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "DISCONNECTED",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::AwaitingResponse => "AWAITING_RESPONSE",
            Self::Closing => "CLOSING",
        };
        f.write_str(s)
    }
}
