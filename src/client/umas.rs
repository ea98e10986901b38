// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! UMAS connection
//!
//! A connection identifies the PLC and downloads its symbol table before
//! it accepts any request. Variables are then read and written by name.

use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicU8, Ordering},
    time::Duration,
};

use async_trait::async_trait;

use super::{
    single_read, single_write, Connection, ConnectionState, PlcRequest, PlcResponse,
    ResponseCode, ResponseItem,
};
use crate::{
    buffer::{ByteOrder, ReadBuffer, WriteBuffer},
    config::ConnectionConfig,
    data_item::umas::{self as data_item, UmasDataType},
    error::{SerializationError, TagError},
    frame::ModbusPdu,
    service::{TcpService, Transport},
    tag::UmasTag,
    umas::{
        PlcMemoryBlockIdent, UmasDatatypeReference, UmasMemoryBlock, UmasPduItem,
        UmasPduPayload, UmasUnlocatedVariableReference, UmasVariableBlock,
        VariableReadRequestReference, VariableWriteRequestReference,
    },
    value::PlcValue,
    Error, Result,
};

/// Sub code of the project info request.
const PROJECT_INFO_SUBCODE: u8 = 0x01;

/// Symbol table requests address every block.
const ALL_BLOCKS: u16 = 0xFFFF;

/// What the handshake learned about the PLC.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlcInfo {
    pub hostname: String,
    /// Largest frame the PLC accepts.
    pub max_frame_size: u16,
    /// Project CRC, sent along with every variable request.
    pub crc: u32,
    pub index: u8,
    pub hardware_id: u32,
    pub memory_blocks: Vec<PlcMemoryBlockIdent>,
}

/// A connection to a Schneider PLC speaking UMAS over Modbus TCP.
#[derive(Debug)]
pub struct UmasConnection {
    service: TcpService,
    pairing_key: AtomicU8,
    read_timeout: Duration,
    plc: PlcInfo,
    symbols: BTreeMap<String, UmasUnlocatedVariableReference>,
    datatypes: Vec<UmasDatatypeReference>,
}

impl UmasConnection {
    /// Runs the handshake over an established `transport`.
    ///
    /// Fails with [`Error::Handshake`] naming the first step that failed.
    pub async fn new<T>(transport: T, config: &ConnectionConfig) -> Result<Self>
    where
        T: Transport,
    {
        Self::establish(TcpService::new(transport, config.unit_identifier), config).await
    }

    /// Connects to the PLC named by `config` and runs the handshake.
    #[cfg(feature = "tcp")]
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        log::debug!("Connecting to {}", config.socket_address());
        let service =
            crate::service::tcp::connect(config.socket_address(), config.unit_identifier).await?;
        Self::establish(service, config).await
    }

    async fn establish(service: TcpService, config: &ConnectionConfig) -> Result<Self> {
        let mut connection = Self {
            service,
            pairing_key: AtomicU8::new(0),
            read_timeout: config.read_timeout,
            plc: PlcInfo::default(),
            symbols: BTreeMap::new(),
            datatypes: Vec::new(),
        };
        log::debug!("State {}", ConnectionState::Connecting);
        if let Err(err) = connection.handshake(config).await {
            log::warn!("UMAS handshake failed: {err}");
            if let Err(close_err) = connection.service.close().await {
                log::warn!("Closing after the failed handshake: {close_err}");
            }
            return Err(err);
        }
        log::info!(
            "Connected to {} with {} variables",
            connection.plc.hostname,
            connection.symbols.len()
        );
        Ok(connection)
    }

    async fn handshake(&mut self, config: &ConnectionConfig) -> Result<()> {
        let timeout = config.handshake_timeout;

        let step = "plc-ident";
        let response = self.step(step, UmasPduPayload::PlcIdentRequest, timeout).await?;
        match response {
            UmasPduPayload::PlcIdentResponse {
                hostname,
                memory_idents,
                ..
            } => {
                self.plc.hostname = hostname;
                self.plc.memory_blocks = memory_idents;
            }
            other => return Err(Error::handshake(step, unexpected(&other))),
        }

        let step = "init-comms";
        let request = UmasPduPayload::InitCommsRequest { unknown_object: 0 };
        let response = self.step(step, request, timeout).await?;
        match response {
            UmasPduPayload::InitCommsResponse { max_frame_size, .. } => {
                self.plc.max_frame_size = max_frame_size;
            }
            other => return Err(Error::handshake(step, unexpected(&other))),
        }

        let step = "project-info";
        let request = UmasPduPayload::ProjectInfoRequest {
            subcode: PROJECT_INFO_SUBCODE,
        };
        let response = self.step(step, request, timeout).await?;
        match response {
            UmasPduPayload::ProjectInfoResponse { crc, .. } => self.plc.crc = crc,
            other => return Err(Error::handshake(step, unexpected(&other))),
        }

        let step = "read-memory-block";
        let (block_number, offset) = UmasMemoryBlock::BASIC_INFO;
        let request = UmasPduPayload::ReadMemoryBlockRequest {
            range: 0,
            block_number,
            offset,
            unknown_object1: 0,
            number_of_bytes: BASIC_INFO_LENGTH,
        };
        let response = self.step(step, request, timeout).await?;
        match response {
            UmasPduPayload::ReadMemoryBlockResponse { block, .. } => {
                let mut rb = ReadBuffer::new(&block, ByteOrder::LittleEndian);
                let UmasMemoryBlock::BasicInfo {
                    index, hardware_id, ..
                } = UmasMemoryBlock::parse(&mut rb, block_number, offset)
                    .map_err(|err| Error::handshake(step, err.into()))?;
                self.plc.index = index;
                self.plc.hardware_id = hardware_id;
            }
            other => return Err(Error::handshake(step, unexpected(&other))),
        }

        let timeout = config.browse_timeout;
        let step = "unlocated-variable-names";
        let blocks = self
            .symbol_table(UmasVariableBlock::UNLOCATED_VARIABLE_NAMES, timeout)
            .await
            .map_err(|err| Error::handshake(step, err))?;
        for block in blocks {
            if let UmasVariableBlock::UnlocatedVariableNames { records, .. } = block {
                self.symbols
                    .extend(records.into_iter().map(|record| (record.value.clone(), record)));
            }
        }

        let step = "datatype-names";
        let blocks = self
            .symbol_table(UmasVariableBlock::DATATYPE_NAMES, timeout)
            .await
            .map_err(|err| Error::handshake(step, err))?;
        for block in blocks {
            if let UmasVariableBlock::DatatypeNames { records, .. } = block {
                self.datatypes.extend(records);
            }
        }
        Ok(())
    }

    async fn step(
        &self,
        step: &'static str,
        request: UmasPduPayload,
        timeout: Duration,
    ) -> Result<UmasPduPayload> {
        log::debug!("Handshake step {step}");
        self.call(request, timeout)
            .await
            .map_err(|err| Error::handshake(step, err))
    }

    /// Downloads all pages of a symbol table.
    async fn symbol_table(
        &self,
        record_format: u16,
        timeout: Duration,
    ) -> Result<Vec<UmasVariableBlock>> {
        let mut blocks = Vec::new();
        let mut offset = 0;
        loop {
            let request = UmasPduPayload::ReadUnlocatedVariableNamesRequest {
                record_type: record_format,
                index: self.plc.index,
                hardware_id: self.plc.hardware_id,
                block_no: ALL_BLOCKS,
                offset,
                blank: 0,
            };
            let block = match self.call(request, timeout).await? {
                UmasPduPayload::ReadUnlocatedVariableNamesResponse { block } => {
                    let mut rb = ReadBuffer::new(&block, ByteOrder::LittleEndian);
                    UmasVariableBlock::parse(&mut rb, record_format)?
                }
                other => return Err(unexpected(&other)),
            };
            let next_address = block.next_address();
            log::trace!("Symbol table 0x{record_format:04X} page at {offset}, next at {next_address}");
            blocks.push(block);
            if next_address == 0 {
                return Ok(blocks);
            }
            if next_address <= offset {
                return Err(Error::UnexpectedResponse(format!(
                    "symbol table page at {offset} points back to {next_address}"
                )));
            }
            offset = next_address;
        }
    }

    fn next_pairing_key(&self) -> u8 {
        self.pairing_key.fetch_add(1, Ordering::Relaxed)
    }

    /// Sends a UMAS item and returns the payload of the answer.
    async fn call(&self, payload: UmasPduPayload, timeout: Duration) -> Result<UmasPduPayload> {
        let item = UmasPduItem::new(self.next_pairing_key(), payload);
        let pairing_key = item.pairing_key;
        let function = item.kind().function_key();
        let response = self
            .service
            .call(ModbusPdu::UmasRequest { item }, timeout)
            .await?;
        let item = match response {
            ModbusPdu::UmasResponse { item } => item,
            other => {
                return Err(match other.exception() {
                    Some(exception) => exception.into(),
                    None => Error::UnexpectedResponse(format!("{:?}", other.kind())),
                })
            }
        };
        if item.pairing_key != pairing_key {
            return Err(Error::UnexpectedResponse(format!(
                "pairing key {} where {pairing_key} was sent",
                item.pairing_key
            )));
        }
        match item.payload {
            UmasPduPayload::ErrorResponse { block } => Err(Error::Refused {
                function,
                code: block.first().copied().unwrap_or_default(),
            }),
            payload => Ok(payload),
        }
    }

    #[must_use]
    pub fn plc_info(&self) -> &PlcInfo {
        &self.plc
    }

    /// The unlocated variables by name.
    #[must_use]
    pub fn symbols(&self) -> &BTreeMap<String, UmasUnlocatedVariableReference> {
        &self.symbols
    }

    #[must_use]
    pub fn datatypes(&self) -> &[UmasDatatypeReference] {
        &self.datatypes
    }

    fn resolve(&self, tag: &UmasTag) -> Result<(&UmasUnlocatedVariableReference, UmasDataType)> {
        let symbol = self
            .symbols
            .get(&tag.name)
            .ok_or_else(|| TagError::UnknownTag(tag.name.clone()))?;
        let data_type = match tag.data_type {
            Some(data_type) => data_type,
            None => UmasDataType::new(symbol.data_type)
                .ok_or_else(|| TagError::UnknownDataType(format!("0x{:04X}", symbol.data_type)))?,
        };
        Ok((symbol, data_type))
    }

    /// Reads the variable named by `tag`.
    pub async fn read(&self, tag: &UmasTag) -> Result<PlcValue> {
        let (symbol, data_type) = self.resolve(tag)?;
        let request = UmasPduPayload::ReadVariableRequest {
            crc: self.plc.crc,
            variables: vec![read_reference(symbol, data_type, tag.quantity)?],
        };
        match self.call(request, self.read_timeout).await? {
            UmasPduPayload::ReadVariableResponse { block } => {
                decode_variable(&block, data_type, tag.quantity)
            }
            other => Err(unexpected(&other)),
        }
    }

    /// Writes `value` to the variable named by `tag`.
    pub async fn write(&self, tag: &UmasTag, value: &PlcValue) -> Result<()> {
        let (symbol, data_type) = self.resolve(tag)?;
        let request = UmasPduPayload::WriteVariableRequest {
            crc: self.plc.crc,
            variables: vec![write_reference(symbol, data_type, tag.quantity, value)?],
        };
        match self.call(request, self.read_timeout).await? {
            UmasPduPayload::WriteVariableResponse => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    async fn read_address(&self, address: &str) -> Result<PlcValue> {
        self.read(&address.parse()?).await
    }

    async fn write_address(&self, address: &str, value: &PlcValue) -> Result<()> {
        self.write(&address.parse()?, value).await
    }

    fn browse(&self) -> PlcResponse {
        let items = self
            .symbols
            .iter()
            .map(|(name, symbol)| {
                let data_type = UmasDataType::new(symbol.data_type).map_or_else(
                    || format!("0x{:04X}", symbol.data_type),
                    |data_type| data_type.as_str().to_owned(),
                );
                (name.clone(), ResponseItem::ok(Some(PlcValue::String(data_type))))
            })
            .collect();
        PlcResponse {
            code: ResponseCode::Ok,
            items,
        }
    }
}

#[async_trait]
impl Connection for UmasConnection {
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
            PlcRequest::Browse => self.browse(),
        }
    }

    async fn close(&self) -> Result<()> {
        self.service.close().await
    }

    fn state(&self) -> ConnectionState {
        self.service.state()
    }
}

/// Bytes of the basic info memory block.
const BASIC_INFO_LENGTH: u16 = 11;

fn unexpected(payload: &UmasPduPayload) -> Error {
    Error::UnexpectedResponse(format!("{:?}", payload.kind()))
}

fn base_offset(symbol: &UmasUnlocatedVariableReference) -> Result<u8> {
    u8::try_from(symbol.base_offset).map_err(|_| {
        SerializationError::ValueOutOfRange {
            value: symbol.base_offset.into(),
            bits: 8,
        }
        .into()
    })
}

fn array_length(quantity: u16) -> Option<u16> {
    (quantity > 1).then_some(quantity)
}

/// The reference reading `quantity` elements of `symbol`.
pub fn read_reference(
    symbol: &UmasUnlocatedVariableReference,
    data_type: UmasDataType,
    quantity: u16,
) -> Result<VariableReadRequestReference> {
    Ok(VariableReadRequestReference {
        data_size_index: data_type.request_size(),
        block: symbol.block,
        base_offset: base_offset(symbol)?,
        offset: symbol.offset,
        array_length: array_length(quantity),
    })
}

/// The reference writing `value` as `quantity` elements of `symbol`.
pub fn write_reference(
    symbol: &UmasUnlocatedVariableReference,
    data_type: UmasDataType,
    quantity: u16,
    value: &PlcValue,
) -> Result<VariableWriteRequestReference> {
    let data_size_index = data_type.request_size();
    let array_length = array_length(quantity);
    let mut wb = WriteBuffer::new(
        VariableWriteRequestReference::record_data_len(data_size_index, array_length),
        ByteOrder::LittleEndian,
    );
    data_item::serialize(&mut wb, value, data_type, quantity)?;
    Ok(VariableWriteRequestReference {
        data_size_index,
        block: symbol.block,
        base_offset: base_offset(symbol)?,
        offset: symbol.offset,
        array_length,
        record_data: wb.into_bytes(),
    })
}

/// Decodes the block of a read variable response.
pub fn decode_variable(block: &[u8], data_type: UmasDataType, quantity: u16) -> Result<PlcValue> {
    let mut rb = ReadBuffer::new(block, ByteOrder::LittleEndian);
    data_item::parse(&mut rb, data_type, quantity).map_err(Into::into)
}
