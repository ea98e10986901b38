// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types and traits

///////////////////////////////////////////////////////////////////
/// Types
///////////////////////////////////////////////////////////////////
pub use crate::{
    buffer::ByteOrder,
    client::{
        ConnectionState, ModbusTcpConnection, PlcRequest, PlcResponse, ResponseCode,
        ResponseItem, UmasConnection,
    },
    config::ConnectionConfig,
    driver::DriverManager,
    tag::{ModbusTag, UmasTag},
    value::PlcValue,
    Error, Result,
};

///////////////////////////////////////////////////////////////////
/// Traits
///////////////////////////////////////////////////////////////////
pub use crate::{client::Connection, driver::Driver, message::Message};
