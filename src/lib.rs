// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Asynchronous access to PLCs over
//! [Modbus](https://en.wikipedia.org/wiki/Modbus) TCP and Schneider's UMAS,
//! based on [tokio](https://tokio.rs).
//!
//! Tags are addressed by strings like `4x00010:REAL[2]` (Modbus) or
//! `MOTOR.SPEED:INT` (UMAS) and read or written as [`PlcValue`]s.
//!
//! The wire layer is usable on its own: [`buffer`] provides bit precise
//! cursors, [`frame`] and [`umas`] the self-describing messages and
//! [`data_item`] the value codecs of each dialect.
//!
//! ## Installation
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! tokio-plc = "*"
//! ```

pub mod buffer;
pub mod client;
pub mod codec;
pub mod config;
pub mod data_item;
pub mod driver;
pub mod error;
pub mod frame;
pub mod message;
pub mod prelude;
pub mod service;
pub mod tag;
pub mod transaction;
pub mod umas;
pub mod value;

pub use self::{
    error::{Error, Result},
    value::PlcValue,
};
