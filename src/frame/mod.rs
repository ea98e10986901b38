// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus PDUs, ADUs and the codes they carry.

mod adu;
pub mod ascii;
mod pdu;
mod records;
pub mod rtu;
pub mod tcp;

use std::{
    error,
    fmt::{self, Display},
};

pub use self::{
    adu::ModbusAdu,
    ascii::ModbusAsciiAdu,
    pdu::{ModbusPdu, ModbusPduKind},
    records::{
        DeviceInformationConformityLevel, DeviceInformationLevel, DeviceInformationMoreFollows,
        DeviceInformationObject, ReadFileRecordRequestItem, ReadFileRecordResponseItem,
        WriteFileRecordRequestItem, WriteFileRecordResponseItem,
    },
    rtu::ModbusRtuAdu,
    tcp::ModbusTcpAdu,
};

/// A Modbus protocol address is represented by 16 bit from `0` to `65535`.
///
/// This *protocol address* uses 0-based indexing, while tag addresses use
/// 1-based register numbers.
pub type Address = u16;

/// Number of items to process.
pub type Quantity = u16;

/// The transport framing of a Modbus ADU.
///
/// Not a wire field: it is fixed by the transport the ADU travels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverType {
    ModbusTcp,
    ModbusRtu,
    ModbusAscii,
}

/// Parse arguments of PDUs that cannot be derived from the PDU itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PduContext {
    /// Whether the bytes travel from the server to the client.
    pub response: bool,

    /// Function key of the UMAS request a UMAS response answers.
    pub umas_request_function_key: u8,

    /// Length of the PDU in bytes, function code included.
    pub byte_length: u16,
}

impl PduContext {
    #[must_use]
    pub const fn request(byte_length: u16) -> Self {
        Self {
            response: false,
            umas_request_function_key: 0,
            byte_length,
        }
    }

    #[must_use]
    pub const fn response(byte_length: u16) -> Self {
        Self {
            response: true,
            umas_request_function_key: 0,
            byte_length,
        }
    }

    #[must_use]
    pub const fn with_umas_request_function_key(mut self, key: u8) -> Self {
        self.umas_request_function_key = key;
        self
    }
}

/// A Modbus function code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionCode {
    /// 0x01
    ReadCoils,
    /// 0x02
    ReadDiscreteInputs,
    /// 0x03
    ReadHoldingRegisters,
    /// 0x04
    ReadInputRegisters,
    /// 0x05
    WriteSingleCoil,
    /// 0x06
    WriteSingleRegister,
    /// 0x07, serial line only
    ReadExceptionStatus,
    /// 0x08, serial line only
    Diagnostics,
    /// 0x0B, serial line only
    GetCommEventCounter,
    /// 0x0C, serial line only
    GetCommEventLog,
    /// 0x0F
    WriteMultipleCoils,
    /// 0x10
    WriteMultipleRegisters,
    /// 0x11, serial line only
    ReportServerId,
    /// 0x14
    ReadFileRecord,
    /// 0x15
    WriteFileRecord,
    /// 0x16
    MaskWriteRegister,
    /// 0x17
    ReadWriteMultipleRegisters,
    /// 0x18
    ReadFifoQueue,
    /// 0x2B
    ReadDeviceIdentification,
    /// 0x5A, carrier of UMAS items
    Umas,
    Custom(u8),
}

impl FunctionCode {
    #[must_use]
    pub const fn new(value: u8) -> Self {
        match value {
            0x01 => Self::ReadCoils,
            0x02 => Self::ReadDiscreteInputs,
            0x03 => Self::ReadHoldingRegisters,
            0x04 => Self::ReadInputRegisters,
            0x05 => Self::WriteSingleCoil,
            0x06 => Self::WriteSingleRegister,
            0x07 => Self::ReadExceptionStatus,
            0x08 => Self::Diagnostics,
            0x0B => Self::GetCommEventCounter,
            0x0C => Self::GetCommEventLog,
            0x0F => Self::WriteMultipleCoils,
            0x10 => Self::WriteMultipleRegisters,
            0x11 => Self::ReportServerId,
            0x14 => Self::ReadFileRecord,
            0x15 => Self::WriteFileRecord,
            0x16 => Self::MaskWriteRegister,
            0x17 => Self::ReadWriteMultipleRegisters,
            0x18 => Self::ReadFifoQueue,
            0x2B => Self::ReadDeviceIdentification,
            0x5A => Self::Umas,
            code => Self::Custom(code),
        }
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::ReadCoils => 0x01,
            Self::ReadDiscreteInputs => 0x02,
            Self::ReadHoldingRegisters => 0x03,
            Self::ReadInputRegisters => 0x04,
            Self::WriteSingleCoil => 0x05,
            Self::WriteSingleRegister => 0x06,
            Self::ReadExceptionStatus => 0x07,
            Self::Diagnostics => 0x08,
            Self::GetCommEventCounter => 0x0B,
            Self::GetCommEventLog => 0x0C,
            Self::WriteMultipleCoils => 0x0F,
            Self::WriteMultipleRegisters => 0x10,
            Self::ReportServerId => 0x11,
            Self::ReadFileRecord => 0x14,
            Self::WriteFileRecord => 0x15,
            Self::MaskWriteRegister => 0x16,
            Self::ReadWriteMultipleRegisters => 0x17,
            Self::ReadFifoQueue => 0x18,
            Self::ReadDeviceIdentification => 0x2B,
            Self::Umas => 0x5A,
            Self::Custom(code) => code,
        }
    }
}

impl Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value().fmt(f)
    }
}

/// A server exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCode {
    /// 0x01
    IllegalFunction,
    /// 0x02
    IllegalDataAddress,
    /// 0x03
    IllegalDataValue,
    /// 0x04
    ServerDeviceFailure,
    /// 0x05
    Acknowledge,
    /// 0x06
    ServerDeviceBusy,
    /// 0x08
    MemoryParityError,
    /// 0x0A
    GatewayPathUnavailable,
    /// 0x0B
    GatewayTargetDevice,
    /// None of the above.
    Custom(u8),
}

impl From<ExceptionCode> for u8 {
    fn from(from: ExceptionCode) -> Self {
        use ExceptionCode::*;
        match from {
            IllegalFunction => 0x01,
            IllegalDataAddress => 0x02,
            IllegalDataValue => 0x03,
            ServerDeviceFailure => 0x04,
            Acknowledge => 0x05,
            ServerDeviceBusy => 0x06,
            MemoryParityError => 0x08,
            GatewayPathUnavailable => 0x0A,
            GatewayTargetDevice => 0x0B,
            Custom(code) => code,
        }
    }
}

impl ExceptionCode {
    #[must_use]
    pub const fn new(value: u8) -> Self {
        use ExceptionCode::*;
        match value {
            0x01 => IllegalFunction,
            0x02 => IllegalDataAddress,
            0x03 => IllegalDataValue,
            0x04 => ServerDeviceFailure,
            0x05 => Acknowledge,
            0x06 => ServerDeviceBusy,
            0x08 => MemoryParityError,
            0x0A => GatewayPathUnavailable,
            0x0B => GatewayTargetDevice,
            other => Custom(other),
        }
    }

    fn description(self) -> &'static str {
        use ExceptionCode::*;
        match self {
            IllegalFunction => "Illegal function",
            IllegalDataAddress => "Illegal data address",
            IllegalDataValue => "Illegal data value",
            ServerDeviceFailure => "Server device failure",
            Acknowledge => "Acknowledge",
            ServerDeviceBusy => "Server device busy",
            MemoryParityError => "Memory parity error",
            GatewayPathUnavailable => "Gateway path unavailable",
            GatewayTargetDevice => "Gateway target device failed to respond",
            Custom(_) => "Custom",
        }
    }
}

impl Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl error::Error for ExceptionCode {}

/// A server exception response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionResponse {
    pub function: FunctionCode,
    pub exception: ExceptionCode,
}

impl Display for ExceptionResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Modbus function {}: {}", self.function, self.exception)
    }
}

impl error::Error for ExceptionResponse {}

/// Check that `req_hdr` is the same header as `rsp_hdr`.
///
/// # Errors
///
/// If the 2 headers are different, an error message with the details will be returned.
pub(crate) fn verify_response_header<H: Eq + fmt::Debug>(
    req_hdr: &H,
    rsp_hdr: &H,
) -> Result<(), String> {
    if req_hdr != rsp_hdr {
        return Err(format!(
            "expected/request = {req_hdr:?}, actual/response = {rsp_hdr:?}"
        ));
    }
    Ok(())
}
