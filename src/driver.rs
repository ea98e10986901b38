// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Protocol drivers
//!
//! A [`DriverManager`] turns connection strings into connections:
//!
//! ```no_run
//! # async fn run() -> tokio_plc::Result<()> {
//! use tokio_plc::prelude::*;
//!
//! let drivers = DriverManager::default();
//! let connection = drivers.connect("modbus-tcp://10.0.0.7?unit-identifier=3").await?;
//! let response = connection.execute(PlcRequest::read("speed", "4x00001:REAL")).await;
//! println!("{:?}", response.value("speed"));
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::{
    client::{Connection, ModbusTcpConnection, UmasConnection},
    config::{self, ConnectionConfig},
    error::ConfigError,
    service::Transport,
    Result,
};

/// Creates connections of one protocol.
#[async_trait]
pub trait Driver: Send + Sync {
    /// The protocol part of connection strings handled by this driver.
    fn protocol_code(&self) -> &'static str;

    fn protocol_name(&self) -> &'static str;

    /// Opens a connection over an established `transport`.
    async fn open(
        &self,
        transport: Box<dyn Transport>,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn Connection>>;

    /// Connects to the device named by `config`.
    #[cfg(feature = "tcp")]
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Connection>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ModbusTcpDriver;

#[async_trait]
impl Driver for ModbusTcpDriver {
    fn protocol_code(&self) -> &'static str {
        config::MODBUS_TCP
    }

    fn protocol_name(&self) -> &'static str {
        "Modbus TCP"
    }

    async fn open(
        &self,
        transport: Box<dyn Transport>,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn Connection>> {
        Ok(Box::new(ModbusTcpConnection::new(transport, config)))
    }

    #[cfg(feature = "tcp")]
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Connection>> {
        Ok(Box::new(ModbusTcpConnection::connect(config).await?))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UmasDriver;

#[async_trait]
impl Driver for UmasDriver {
    fn protocol_code(&self) -> &'static str {
        config::UMAS
    }

    fn protocol_name(&self) -> &'static str {
        "Schneider UMAS"
    }

    async fn open(
        &self,
        transport: Box<dyn Transport>,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn Connection>> {
        Ok(Box::new(UmasConnection::new(transport, config).await?))
    }

    #[cfg(feature = "tcp")]
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Connection>> {
        Ok(Box::new(UmasConnection::connect(config).await?))
    }
}

/// Registry of drivers by protocol code.
pub struct DriverManager {
    drivers: BTreeMap<&'static str, Box<dyn Driver>>,
}

impl std::fmt::Debug for DriverManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.drivers.keys()).finish()
    }
}

impl Default for DriverManager {
    /// A registry of the Modbus TCP and UMAS drivers.
    fn default() -> Self {
        let mut manager = Self::empty();
        manager.register(ModbusTcpDriver);
        manager.register(UmasDriver);
        manager
    }
}

impl DriverManager {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            drivers: BTreeMap::new(),
        }
    }

    /// Adds `driver`, replacing any driver of the same protocol code.
    pub fn register(&mut self, driver: impl Driver + 'static) {
        log::debug!(
            "Registering driver {} for {}",
            driver.protocol_name(),
            driver.protocol_code()
        );
        self.drivers.insert(driver.protocol_code(), Box::new(driver));
    }

    pub fn protocol_codes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.drivers.keys().copied()
    }

    pub fn driver(&self, protocol_code: &str) -> std::result::Result<&dyn Driver, ConfigError> {
        self.drivers
            .get(protocol_code)
            .map(|driver| &**driver)
            .ok_or_else(|| ConfigError::UnknownProtocol(protocol_code.to_owned()))
    }

    /// Opens a connection over `transport` with the driver selected by the
    /// connection string `url`.
    pub async fn open<T>(&self, url: &str, transport: T) -> Result<Box<dyn Connection>>
    where
        T: Transport,
    {
        let config: ConnectionConfig = url.parse()?;
        self.driver(&config.protocol)?
            .open(Box::new(transport), &config)
            .await
    }

    /// Connects to the device named by the connection string `url`.
    #[cfg(feature = "tcp")]
    pub async fn connect(&self, url: &str) -> Result<Box<dyn Connection>> {
        let config: ConnectionConfig = url.parse()?;
        self.driver(&config.protocol)?.connect(&config).await
    }
}
