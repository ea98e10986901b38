// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection strings.
//!
//! `<protocol>://<host>[:<port>][?<key>=<value>[&...]]`, for example
//! `modbus-tcp://10.0.0.7:502?unit-identifier=3&byte-order=LITTLE_ENDIAN`.

use std::{fmt, str::FromStr, sync::OnceLock, time::Duration};

use regex::Regex;

use crate::{buffer::ByteOrder, error::ConfigError};

/// Modbus TCP protocol code.
pub const MODBUS_TCP: &str = "modbus-tcp";

/// UMAS protocol code.
pub const UMAS: &str = "umas";

pub const DEFAULT_PORT: u16 = 502;
pub const DEFAULT_UNIT_IDENTIFIER: u8 = 1;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(5_000);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(10_000);
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(10_000);
pub const DEFAULT_BROWSE_TIMEOUT: Duration = Duration::from_millis(60_000);

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(concat!(
            r"^(?P<protocol>[a-z][a-z0-9-]*)://",
            r"(?P<host>\[[0-9A-Fa-f:.]+\]|[^:/?\[\]]+)",
            r"(?::(?P<port>\d+))?/?",
            r"(?:\?(?P<options>.*))?$",
        ))
        .expect("valid connection string pattern")
    })
}

/// Typed form of a connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// The driver code, e.g. [`MODBUS_TCP`] or [`UMAS`].
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub unit_identifier: u8,
    /// Modbus TCP request timeout.
    pub request_timeout: Duration,
    /// Register layout of multi-register values.
    pub byte_order: ByteOrder,
    /// UMAS variable read/write timeout.
    pub read_timeout: Duration,
    /// Timeout of each UMAS handshake step.
    pub handshake_timeout: Duration,
    /// Timeout of each symbol table request of the UMAS handshake.
    pub browse_timeout: Duration,
}

impl ConnectionConfig {
    #[must_use]
    pub fn new(protocol: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            host: host.into(),
            port: DEFAULT_PORT,
            unit_identifier: DEFAULT_UNIT_IDENTIFIER,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            byte_order: ByteOrder::BigEndian,
            read_timeout: DEFAULT_READ_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            browse_timeout: DEFAULT_BROWSE_TIMEOUT,
        }
    }

    /// `host:port`, suitable for resolving.
    #[must_use]
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.bracketed_host(), self.port)
    }

    fn bracketed_host(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        }
    }

    fn set_option(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_owned(),
            value: value.to_owned(),
        };
        let millis = |value: &str| {
            value
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| invalid())
        };
        match key {
            "unit-identifier" => {
                self.unit_identifier = parse_u8(value).ok_or_else(invalid)?;
            }
            "request-timeout" => self.request_timeout = millis(value)?,
            "byte-order" => self.byte_order = value.parse().map_err(|_| invalid())?,
            "read-timeout" => self.read_timeout = millis(value)?,
            "handshake-timeout" => self.handshake_timeout = millis(value)?,
            "browse-timeout" => self.browse_timeout = millis(value)?,
            _ => return Err(ConfigError::UnknownOption(key.to_owned())),
        }
        Ok(())
    }
}

/// Decimal or `0x` prefixed hexadecimal.
fn parse_u8(value: &str) -> Option<u8> {
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

impl FromStr for ConnectionConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = pattern()
            .captures(s)
            .ok_or_else(|| ConfigError::Malformed(s.to_owned()))?;
        let host = captures["host"].trim_start_matches('[').trim_end_matches(']');
        let mut config = Self::new(&captures["protocol"], host);
        if let Some(port) = captures.name("port") {
            config.port = port.as_str().parse().map_err(|_| ConfigError::InvalidValue {
                key: "port".to_owned(),
                value: port.as_str().to_owned(),
            })?;
        }
        let options = captures.name("options").map_or("", |options| options.as_str());
        for option in options.split('&').filter(|option| !option.is_empty()) {
            let (key, value) = option
                .split_once('=')
                .ok_or_else(|| ConfigError::Malformed(s.to_owned()))?;
            config.set_option(key, value)?;
        }
        Ok(config)
    }
}

impl fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}:{}?unit-identifier={}&request-timeout={}&byte-order={}&read-timeout={}&handshake-timeout={}&browse-timeout={}",
            self.protocol,
            self.bracketed_host(),
            self.port,
            self.unit_identifier,
            self.request_timeout.as_millis(),
            self.byte_order,
            self.read_timeout.as_millis(),
            self.handshake_timeout.as_millis(),
            self.browse_timeout.as_millis(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config: ConnectionConfig = "modbus-tcp://127.0.0.1".parse().unwrap();
        assert_eq!(config.protocol, MODBUS_TCP);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 502);
        assert_eq!(config.unit_identifier, 1);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.byte_order, ByteOrder::BigEndian);
        assert_eq!(config.read_timeout, Duration::from_secs(10));
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));
        assert_eq!(config.browse_timeout, Duration::from_secs(60));
    }

    #[test]
    fn options() {
        let config: ConnectionConfig =
            "umas://plc.local:5020?unit-identifier=0xFF&byte-order=BIG_ENDIAN_BYTE_SWAP&read-timeout=250"
                .parse()
                .unwrap();
        assert_eq!(config.protocol, UMAS);
        assert_eq!(config.host, "plc.local");
        assert_eq!(config.port, 5020);
        assert_eq!(config.unit_identifier, 0xFF);
        assert_eq!(config.byte_order, ByteOrder::BigEndianByteSwap);
        assert_eq!(config.read_timeout, Duration::from_millis(250));
        assert_eq!(config.socket_address(), "plc.local:5020");
    }

    #[test]
    fn ipv6_host() {
        let config: ConnectionConfig = "modbus-tcp://[::1]:1502".parse().unwrap();
        assert_eq!(config.host, "::1");
        assert_eq!(config.port, 1502);
        assert_eq!(config.socket_address(), "[::1]:1502");
    }

    #[test]
    fn display_round_trips() {
        let config: ConnectionConfig = "modbus-tcp://[::1]:1502?unit-identifier=7&request-timeout=100"
            .parse()
            .unwrap();
        assert_eq!(config.to_string().parse::<ConnectionConfig>().unwrap(), config);
    }

    #[test]
    fn invalid_connection_strings() {
        assert!(matches!(
            "127.0.0.1:502".parse::<ConnectionConfig>(),
            Err(ConfigError::Malformed(_))
        ));
        assert!(matches!(
            "modbus-tcp://127.0.0.1?unit-identifier".parse::<ConnectionConfig>(),
            Err(ConfigError::Malformed(_))
        ));
        assert!(matches!(
            "modbus-tcp://127.0.0.1?speed=fast".parse::<ConnectionConfig>(),
            Err(ConfigError::UnknownOption(key)) if key == "speed"
        ));
        assert!(matches!(
            "modbus-tcp://127.0.0.1?unit-identifier=256".parse::<ConnectionConfig>(),
            Err(ConfigError::InvalidValue { key, .. }) if key == "unit-identifier"
        ));
        assert!(matches!(
            "modbus-tcp://127.0.0.1?byte-order=MIDDLE".parse::<ConnectionConfig>(),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            "modbus-tcp://127.0.0.1:70000".parse::<ConnectionConfig>(),
            Err(ConfigError::InvalidValue { key, .. }) if key == "port"
        ));
    }
}
