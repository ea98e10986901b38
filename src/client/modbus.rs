// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP connection

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use super::{single_read, single_write, Connection, ConnectionState, PlcRequest, PlcResponse, ResponseCode};
use crate::{
    buffer::{BitOrder, ByteOrder, ReadBuffer, WriteBuffer},
    config::ConnectionConfig,
    data_item::modbus as data_item,
    error::{SerializationError, TagError},
    frame::{
        ModbusPdu, ModbusPduKind, ReadFileRecordRequestItem, WriteFileRecordRequestItem,
    },
    service::{TcpService, Transport},
    tag::{ModbusArea, ModbusTag},
    value::PlcValue,
    Error, Result,
};

/// File record reference type of extended registers.
const REFERENCE_TYPE: u8 = 6;

const COIL_ON: u16 = 0xFF00;
const COIL_OFF: u16 = 0x0000;

/// A connection to a Modbus TCP server.
#[derive(Debug)]
pub struct ModbusTcpConnection {
    service: TcpService,
    byte_order: ByteOrder,
    request_timeout: Duration,
}

impl ModbusTcpConnection {
    /// Serves requests over an established `transport`.
    pub fn new<T>(transport: T, config: &ConnectionConfig) -> Self
    where
        T: Transport,
    {
        Self {
            service: TcpService::new(transport, config.unit_identifier),
            byte_order: config.byte_order,
            request_timeout: config.request_timeout,
        }
    }

    /// Connects to the server named by `config`.
    #[cfg(feature = "tcp")]
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        log::debug!("Connecting to {}", config.socket_address());
        let service =
            crate::service::tcp::connect(config.socket_address(), config.unit_identifier).await?;
        Ok(Self {
            service,
            byte_order: config.byte_order,
            request_timeout: config.request_timeout,
        })
    }

    async fn call(&self, request: ModbusPdu) -> Result<ModbusPdu> {
        let expected = response_kind(&request);
        let response = self.service.call(request, self.request_timeout).await?;
        if let Some(exception) = response.exception() {
            return Err(exception.into());
        }
        if response.kind() != expected {
            return Err(Error::UnexpectedResponse(format!(
                "expected {expected:?}, got {:?}",
                response.kind()
            )));
        }
        Ok(response)
    }

    /// Reads the value of `tag`.
    pub async fn read(&self, tag: &ModbusTag) -> Result<PlcValue> {
        let response = self.call(read_request(tag)).await?;
        decode_read_response(tag, response, self.byte_order)
    }

    /// Writes `value` to `tag`.
    pub async fn write(&self, tag: &ModbusTag, value: &PlcValue) -> Result<()> {
        let request = write_request(tag, value, self.byte_order)?;
        self.call(request).await.map(drop)
    }

    async fn read_address(&self, address: &str) -> Result<PlcValue> {
        self.read(&address.parse()?).await
    }

    async fn write_address(&self, address: &str, value: &PlcValue) -> Result<()> {
        self.write(&address.parse()?, value).await
    }
}

#[async_trait]
impl Connection for ModbusTcpConnection {
    async fn execute(&self, request: PlcRequest) -> PlcResponse {
        if !self.is_connected() {
            return PlcResponse::failed(ResponseCode::NotConnected);
        }
        match request {
            PlcRequest::Read { tags } => match single_read(tags) {
                Ok((name, address)) => {
                    let result = self.read_address(&address).await.map(Some);
                    PlcResponse::from_result(name, result)
                }
                Err(response) => response,
            },
            PlcRequest::Write { items } => match single_write(items) {
                Ok((name, address, value)) => {
                    let result = self.write_address(&address, &value).await.map(|()| None);
                    PlcResponse::from_result(name, result)
                }
                Err(response) => response,
            },
            PlcRequest::Browse => PlcResponse::failed(ResponseCode::Unsupported),
        }
    }

    async fn close(&self) -> Result<()> {
        self.service.close().await
    }

    fn state(&self) -> ConnectionState {
        self.service.state()
    }
}

fn response_kind(request: &ModbusPdu) -> ModbusPduKind {
    use ModbusPduKind as K;
    match request.kind() {
        K::ReadCoilsRequest => K::ReadCoilsResponse,
        K::ReadDiscreteInputsRequest => K::ReadDiscreteInputsResponse,
        K::ReadInputRegistersRequest => K::ReadInputRegistersResponse,
        K::ReadHoldingRegistersRequest => K::ReadHoldingRegistersResponse,
        K::ReadFileRecordRequest => K::ReadFileRecordResponse,
        K::WriteSingleCoilRequest => K::WriteSingleCoilResponse,
        K::WriteMultipleCoilsRequest => K::WriteMultipleCoilsResponse,
        K::WriteSingleRegisterRequest => K::WriteSingleRegisterResponse,
        K::WriteMultipleRegistersRequest => K::WriteMultipleRegistersResponse,
        K::WriteFileRecordRequest => K::WriteFileRecordResponse,
        other => other,
    }
}

/// The PDU reading `tag`.
#[must_use]
pub fn read_request(tag: &ModbusTag) -> ModbusPdu {
    let starting_address = tag.protocol_address();
    let quantity = tag.length();
    match tag.area {
        ModbusArea::Coil => ModbusPdu::ReadCoilsRequest {
            starting_address,
            quantity,
        },
        ModbusArea::DiscreteInput => ModbusPdu::ReadDiscreteInputsRequest {
            starting_address,
            quantity,
        },
        ModbusArea::InputRegister => ModbusPdu::ReadInputRegistersRequest {
            starting_address,
            quantity,
        },
        ModbusArea::HoldingRegister => ModbusPdu::ReadHoldingRegistersRequest {
            starting_address,
            quantity,
        },
        ModbusArea::ExtendedRegister => ModbusPdu::ReadFileRecordRequest {
            items: tag
                .file_record_groups()
                .into_iter()
                .map(
                    |(file_number, record_number, record_length)| ReadFileRecordRequestItem {
                        reference_type: REFERENCE_TYPE,
                        file_number,
                        record_number,
                        record_length,
                    },
                )
                .collect(),
        },
    }
}

/// Decodes the value of `tag` from the response to [`read_request`].
pub fn decode_read_response(
    tag: &ModbusTag,
    response: ModbusPdu,
    byte_order: ByteOrder,
) -> Result<PlcValue> {
    let registers = match response {
        ModbusPdu::ReadCoilsResponse { value } | ModbusPdu::ReadDiscreteInputsResponse { value } => {
            return decode_bits(&value, tag.quantity);
        }
        ModbusPdu::ReadInputRegistersResponse { value }
        | ModbusPdu::ReadHoldingRegistersResponse { value } => value.to_vec(),
        ModbusPdu::ReadFileRecordResponse { items } => items
            .iter()
            .flat_map(|item| item.data.iter().copied())
            .collect(),
        other => {
            return Err(Error::UnexpectedResponse(format!(
                "{:?} does not carry values",
                other.kind()
            )))
        }
    };
    let mut rb = ReadBuffer::new(&registers, byte_order);
    Ok(data_item::parse(&mut rb, tag.data_type, tag.quantity)?)
}

/// Coil bytes carry the first coil in their least significant bit.
fn decode_bits(value: &[u8], quantity: u16) -> Result<PlcValue> {
    let mut rb = ReadBuffer::with_bit_order(value, ByteOrder::BigEndian, BitOrder::Lsb0);
    let mut bits = (0..quantity)
        .map(|_| rb.read_bit().map(PlcValue::Bool))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if quantity == 1 {
        if let Some(bit) = bits.pop() {
            return Ok(bit);
        }
    }
    Ok(PlcValue::List(bits))
}

fn encode_bits(values: &[bool]) -> Bytes {
    let mut bytes = vec![0u8; (values.len() + 7) / 8];
    for (i, _) in values.iter().enumerate().filter(|(_, on)| **on) {
        bytes[i / 8] |= 1 << (i % 8);
    }
    bytes.into()
}

fn coils(value: &PlcValue, quantity: u16) -> Result<Vec<bool>> {
    let coils = match value {
        PlcValue::List(values) => values
            .iter()
            .map(PlcValue::get_bool)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(SerializationError::from)?,
        value => vec![value.get_bool().map_err(SerializationError::from)?],
    };
    if coils.len() != usize::from(quantity) {
        return Err(SerializationError::InvalidData(
            format!("{} values for {quantity} coils", coils.len()).into(),
        )
        .into());
    }
    Ok(coils)
}

/// Encodes `value` into the registers spanned by `tag`.
fn registers(tag: &ModbusTag, value: &PlcValue, byte_order: ByteOrder) -> Result<Bytes> {
    let mut wb = WriteBuffer::new(usize::from(tag.length()) * 2, byte_order);
    data_item::serialize(&mut wb, value, tag.data_type, tag.quantity)?;
    Ok(wb.into_bytes())
}

/// The PDU writing `value` to `tag`.
pub fn write_request(tag: &ModbusTag, value: &PlcValue, byte_order: ByteOrder) -> Result<ModbusPdu> {
    let address = tag.protocol_address();
    let request = match tag.area {
        ModbusArea::DiscreteInput | ModbusArea::InputRegister => {
            return Err(TagError::ReadOnly(tag.to_string()).into());
        }
        ModbusArea::Coil => match coils(value, tag.quantity)?.as_slice() {
            [on] => ModbusPdu::WriteSingleCoilRequest {
                address,
                value: if *on { COIL_ON } else { COIL_OFF },
            },
            coils => ModbusPdu::WriteMultipleCoilsRequest {
                starting_address: address,
                quantity: tag.quantity,
                value: encode_bits(coils),
            },
        },
        ModbusArea::HoldingRegister => {
            let value = registers(tag, value, byte_order)?;
            if tag.length() == 1 {
                ModbusPdu::WriteSingleRegisterRequest {
                    address,
                    value: u16::from_be_bytes([value[0], value[1]]),
                }
            } else {
                ModbusPdu::WriteMultipleRegistersRequest {
                    starting_address: address,
                    quantity: tag.length(),
                    value,
                }
            }
        }
        ModbusArea::ExtendedRegister => {
            let mut value = registers(tag, value, byte_order)?;
            let items = tag
                .file_record_groups()
                .into_iter()
                .map(|(file_number, record_number, record_length)| {
                    WriteFileRecordRequestItem {
                        reference_type: REFERENCE_TYPE,
                        file_number,
                        record_number,
                        record_data: value.split_to(usize::from(record_length) * 2),
                    }
                })
                .collect();
            ModbusPdu::WriteFileRecordRequest { items }
        }
    };
    Ok(request)
}
