// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use bytes::Bytes;

use super::{
    DeviceInformationConformityLevel, DeviceInformationLevel, DeviceInformationMoreFollows,
    DeviceInformationObject, ExceptionCode, ExceptionResponse, FunctionCode, PduContext,
    ReadFileRecordRequestItem, ReadFileRecordResponseItem, WriteFileRecordRequestItem,
    WriteFileRecordResponseItem,
};
use crate::{
    buffer::{ReadBuffer, WriteBuffer},
    error::{ParseError, SerializationError},
    message::{u16_len, u8_len, Message},
    umas::UmasPduItem,
};

/// MEI type of the read device identification function.
const MEI_TYPE_READ_DEVICE_IDENTIFICATION: u8 = 0x0E;

/// The concrete type of a [`ModbusPdu`] without its payload.
///
/// The discriminator constants of [`ModbusPduKind::discriminators`] are
/// written on serialization and matched on parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModbusPduKind {
    Error,
    ReadCoilsRequest,
    ReadCoilsResponse,
    ReadDiscreteInputsRequest,
    ReadDiscreteInputsResponse,
    ReadHoldingRegistersRequest,
    ReadHoldingRegistersResponse,
    ReadInputRegistersRequest,
    ReadInputRegistersResponse,
    WriteSingleCoilRequest,
    WriteSingleCoilResponse,
    WriteSingleRegisterRequest,
    WriteSingleRegisterResponse,
    ReadExceptionStatusRequest,
    ReadExceptionStatusResponse,
    DiagnosticsRequest,
    DiagnosticsResponse,
    GetCommEventCounterRequest,
    GetCommEventCounterResponse,
    GetCommEventLogRequest,
    GetCommEventLogResponse,
    WriteMultipleCoilsRequest,
    WriteMultipleCoilsResponse,
    WriteMultipleRegistersRequest,
    WriteMultipleRegistersResponse,
    ReportServerIdRequest,
    ReportServerIdResponse,
    ReadFileRecordRequest,
    ReadFileRecordResponse,
    WriteFileRecordRequest,
    WriteFileRecordResponse,
    MaskWriteRegisterRequest,
    MaskWriteRegisterResponse,
    ReadWriteMultipleRegistersRequest,
    ReadWriteMultipleRegistersResponse,
    ReadFifoQueueRequest,
    ReadFifoQueueResponse,
    ReadDeviceIdentificationRequest,
    ReadDeviceIdentificationResponse,
    UmasRequest,
    UmasResponse,
}

impl ModbusPduKind {
    /// Every kind in dispatch order.
    pub const ALL: [Self; 41] = [
        Self::Error,
        Self::ReadCoilsRequest,
        Self::ReadCoilsResponse,
        Self::ReadDiscreteInputsRequest,
        Self::ReadDiscreteInputsResponse,
        Self::ReadHoldingRegistersRequest,
        Self::ReadHoldingRegistersResponse,
        Self::ReadInputRegistersRequest,
        Self::ReadInputRegistersResponse,
        Self::WriteSingleCoilRequest,
        Self::WriteSingleCoilResponse,
        Self::WriteSingleRegisterRequest,
        Self::WriteSingleRegisterResponse,
        Self::ReadExceptionStatusRequest,
        Self::ReadExceptionStatusResponse,
        Self::DiagnosticsRequest,
        Self::DiagnosticsResponse,
        Self::GetCommEventCounterRequest,
        Self::GetCommEventCounterResponse,
        Self::GetCommEventLogRequest,
        Self::GetCommEventLogResponse,
        Self::WriteMultipleCoilsRequest,
        Self::WriteMultipleCoilsResponse,
        Self::WriteMultipleRegistersRequest,
        Self::WriteMultipleRegistersResponse,
        Self::ReportServerIdRequest,
        Self::ReportServerIdResponse,
        Self::ReadFileRecordRequest,
        Self::ReadFileRecordResponse,
        Self::WriteFileRecordRequest,
        Self::WriteFileRecordResponse,
        Self::MaskWriteRegisterRequest,
        Self::MaskWriteRegisterResponse,
        Self::ReadWriteMultipleRegistersRequest,
        Self::ReadWriteMultipleRegistersResponse,
        Self::ReadFifoQueueRequest,
        Self::ReadFifoQueueResponse,
        Self::ReadDeviceIdentificationRequest,
        Self::ReadDeviceIdentificationResponse,
        Self::UmasRequest,
        Self::UmasResponse,
    ];

    /// `(error_flag, function_flag, response)`, `None` matching any value.
    #[must_use]
    pub const fn discriminators(self) -> (bool, Option<u8>, Option<bool>) {
        use ModbusPduKind::*;

        let (function, response) = match self {
            Error => return (true, None, None),
            ReadCoilsRequest => (0x01, false),
            ReadCoilsResponse => (0x01, true),
            ReadDiscreteInputsRequest => (0x02, false),
            ReadDiscreteInputsResponse => (0x02, true),
            ReadHoldingRegistersRequest => (0x03, false),
            ReadHoldingRegistersResponse => (0x03, true),
            ReadInputRegistersRequest => (0x04, false),
            ReadInputRegistersResponse => (0x04, true),
            WriteSingleCoilRequest => (0x05, false),
            WriteSingleCoilResponse => (0x05, true),
            WriteSingleRegisterRequest => (0x06, false),
            WriteSingleRegisterResponse => (0x06, true),
            ReadExceptionStatusRequest => (0x07, false),
            ReadExceptionStatusResponse => (0x07, true),
            DiagnosticsRequest => (0x08, false),
            DiagnosticsResponse => (0x08, true),
            GetCommEventCounterRequest => (0x0B, false),
            GetCommEventCounterResponse => (0x0B, true),
            GetCommEventLogRequest => (0x0C, false),
            GetCommEventLogResponse => (0x0C, true),
            WriteMultipleCoilsRequest => (0x0F, false),
            WriteMultipleCoilsResponse => (0x0F, true),
            WriteMultipleRegistersRequest => (0x10, false),
            WriteMultipleRegistersResponse => (0x10, true),
            ReportServerIdRequest => (0x11, false),
            ReportServerIdResponse => (0x11, true),
            ReadFileRecordRequest => (0x14, false),
            ReadFileRecordResponse => (0x14, true),
            WriteFileRecordRequest => (0x15, false),
            WriteFileRecordResponse => (0x15, true),
            MaskWriteRegisterRequest => (0x16, false),
            MaskWriteRegisterResponse => (0x16, true),
            ReadWriteMultipleRegistersRequest => (0x17, false),
            ReadWriteMultipleRegistersResponse => (0x17, true),
            ReadFifoQueueRequest => (0x18, false),
            ReadFifoQueueResponse => (0x18, true),
            ReadDeviceIdentificationRequest => (0x2B, false),
            ReadDeviceIdentificationResponse => (0x2B, true),
            UmasRequest => (0x5A, false),
            UmasResponse => (0x5A, true),
        };
        (false, Some(function), Some(response))
    }

    /// First kind of [`ModbusPduKind::ALL`] matching the observed header.
    #[must_use]
    pub fn lookup(error_flag: bool, function_flag: u8, response: bool) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| {
            let (error, function, is_response) = kind.discriminators();
            error == error_flag
                && function.map_or(true, |function| function == function_flag)
                && is_response.map_or(true, |is_response| is_response == response)
        })
    }
}

/// A Modbus PDU, the function code driven part of every ADU.
#[derive(Debug, Clone, PartialEq)]
pub enum ModbusPdu {
    /// An exception answer to any function.
    Error {
        function_flag: u8,
        exception_code: ExceptionCode,
    },
    ReadCoilsRequest {
        starting_address: u16,
        quantity: u16,
    },
    /// Coil states packed LSB first.
    ReadCoilsResponse {
        value: Bytes,
    },
    ReadDiscreteInputsRequest {
        starting_address: u16,
        quantity: u16,
    },
    ReadDiscreteInputsResponse {
        value: Bytes,
    },
    ReadHoldingRegistersRequest {
        starting_address: u16,
        quantity: u16,
    },
    ReadHoldingRegistersResponse {
        value: Bytes,
    },
    ReadInputRegistersRequest {
        starting_address: u16,
        quantity: u16,
    },
    ReadInputRegistersResponse {
        value: Bytes,
    },
    /// `value` is `0xFF00` for ON and `0x0000` for OFF.
    WriteSingleCoilRequest {
        address: u16,
        value: u16,
    },
    WriteSingleCoilResponse {
        address: u16,
        value: u16,
    },
    WriteSingleRegisterRequest {
        address: u16,
        value: u16,
    },
    WriteSingleRegisterResponse {
        address: u16,
        value: u16,
    },
    ReadExceptionStatusRequest,
    ReadExceptionStatusResponse {
        value: u8,
    },
    DiagnosticsRequest {
        sub_function: u16,
        data: u16,
    },
    DiagnosticsResponse {
        sub_function: u16,
        data: u16,
    },
    GetCommEventCounterRequest,
    GetCommEventCounterResponse {
        status: u16,
        event_count: u16,
    },
    GetCommEventLogRequest,
    GetCommEventLogResponse {
        status: u16,
        event_count: u16,
        message_count: u16,
        events: Bytes,
    },
    WriteMultipleCoilsRequest {
        starting_address: u16,
        quantity: u16,
        value: Bytes,
    },
    WriteMultipleCoilsResponse {
        starting_address: u16,
        quantity: u16,
    },
    WriteMultipleRegistersRequest {
        starting_address: u16,
        quantity: u16,
        value: Bytes,
    },
    WriteMultipleRegistersResponse {
        starting_address: u16,
        quantity: u16,
    },
    ReportServerIdRequest,
    ReportServerIdResponse {
        value: Bytes,
    },
    ReadFileRecordRequest {
        items: Vec<ReadFileRecordRequestItem>,
    },
    ReadFileRecordResponse {
        items: Vec<ReadFileRecordResponseItem>,
    },
    WriteFileRecordRequest {
        items: Vec<WriteFileRecordRequestItem>,
    },
    WriteFileRecordResponse {
        items: Vec<WriteFileRecordResponseItem>,
    },
    MaskWriteRegisterRequest {
        reference_address: u16,
        and_mask: u16,
        or_mask: u16,
    },
    MaskWriteRegisterResponse {
        reference_address: u16,
        and_mask: u16,
        or_mask: u16,
    },
    ReadWriteMultipleRegistersRequest {
        read_starting_address: u16,
        read_quantity: u16,
        write_starting_address: u16,
        write_quantity: u16,
        value: Bytes,
    },
    ReadWriteMultipleRegistersResponse {
        value: Bytes,
    },
    ReadFifoQueueRequest {
        fifo_pointer_address: u16,
    },
    ReadFifoQueueResponse {
        fifo_value: Vec<u16>,
    },
    ReadDeviceIdentificationRequest {
        level: DeviceInformationLevel,
        object_id: u8,
    },
    ReadDeviceIdentificationResponse {
        level: DeviceInformationLevel,
        individual_access: bool,
        conformity_level: DeviceInformationConformityLevel,
        more_follows: DeviceInformationMoreFollows,
        next_object_id: u8,
        objects: Vec<DeviceInformationObject>,
    },
    UmasRequest {
        item: UmasPduItem,
    },
    UmasResponse {
        item: UmasPduItem,
    },
}

fn parse_items<'a, T>(
    rb: &mut ReadBuffer<'a>,
    byte_count: usize,
    mut parse: impl FnMut(&mut ReadBuffer<'a>) -> Result<T, ParseError>,
) -> Result<Vec<T>, ParseError> {
    let end = rb.pos() + byte_count * 8;
    let mut items = Vec::new();
    while rb.pos() < end {
        items.push(parse(rb)?);
    }
    if rb.pos() != end {
        return Err(ParseError::InvalidData(
            format!("items overrun their byte count of {byte_count}").into(),
        ));
    }
    Ok(items)
}

fn bytes(rb: &mut ReadBuffer<'_>, len: usize) -> Result<Bytes, ParseError> {
    rb.read_bytes(len).map(Bytes::from)
}

fn byte_counted(rb: &mut ReadBuffer<'_>) -> Result<Bytes, ParseError> {
    let byte_count = rb.read_unsigned_byte(8)?;
    bytes(rb, byte_count.into())
}

fn items_length<T: Message>(items: &[T]) -> usize {
    items.iter().map(Message::length_in_bits).sum()
}

impl ModbusPdu {
    #[must_use]
    pub fn kind(&self) -> ModbusPduKind {
        use ModbusPdu as P;
        use ModbusPduKind as K;

        match self {
            P::Error { .. } => K::Error,
            P::ReadCoilsRequest { .. } => K::ReadCoilsRequest,
            P::ReadCoilsResponse { .. } => K::ReadCoilsResponse,
            P::ReadDiscreteInputsRequest { .. } => K::ReadDiscreteInputsRequest,
            P::ReadDiscreteInputsResponse { .. } => K::ReadDiscreteInputsResponse,
            P::ReadHoldingRegistersRequest { .. } => K::ReadHoldingRegistersRequest,
            P::ReadHoldingRegistersResponse { .. } => K::ReadHoldingRegistersResponse,
            P::ReadInputRegistersRequest { .. } => K::ReadInputRegistersRequest,
            P::ReadInputRegistersResponse { .. } => K::ReadInputRegistersResponse,
            P::WriteSingleCoilRequest { .. } => K::WriteSingleCoilRequest,
            P::WriteSingleCoilResponse { .. } => K::WriteSingleCoilResponse,
            P::WriteSingleRegisterRequest { .. } => K::WriteSingleRegisterRequest,
            P::WriteSingleRegisterResponse { .. } => K::WriteSingleRegisterResponse,
            P::ReadExceptionStatusRequest => K::ReadExceptionStatusRequest,
            P::ReadExceptionStatusResponse { .. } => K::ReadExceptionStatusResponse,
            P::DiagnosticsRequest { .. } => K::DiagnosticsRequest,
            P::DiagnosticsResponse { .. } => K::DiagnosticsResponse,
            P::GetCommEventCounterRequest => K::GetCommEventCounterRequest,
            P::GetCommEventCounterResponse { .. } => K::GetCommEventCounterResponse,
            P::GetCommEventLogRequest => K::GetCommEventLogRequest,
            P::GetCommEventLogResponse { .. } => K::GetCommEventLogResponse,
            P::WriteMultipleCoilsRequest { .. } => K::WriteMultipleCoilsRequest,
            P::WriteMultipleCoilsResponse { .. } => K::WriteMultipleCoilsResponse,
            P::WriteMultipleRegistersRequest { .. } => K::WriteMultipleRegistersRequest,
            P::WriteMultipleRegistersResponse { .. } => K::WriteMultipleRegistersResponse,
            P::ReportServerIdRequest => K::ReportServerIdRequest,
            P::ReportServerIdResponse { .. } => K::ReportServerIdResponse,
            P::ReadFileRecordRequest { .. } => K::ReadFileRecordRequest,
            P::ReadFileRecordResponse { .. } => K::ReadFileRecordResponse,
            P::WriteFileRecordRequest { .. } => K::WriteFileRecordRequest,
            P::WriteFileRecordResponse { .. } => K::WriteFileRecordResponse,
            P::MaskWriteRegisterRequest { .. } => K::MaskWriteRegisterRequest,
            P::MaskWriteRegisterResponse { .. } => K::MaskWriteRegisterResponse,
            P::ReadWriteMultipleRegistersRequest { .. } => K::ReadWriteMultipleRegistersRequest,
            P::ReadWriteMultipleRegistersResponse { .. } => K::ReadWriteMultipleRegistersResponse,
            P::ReadFifoQueueRequest { .. } => K::ReadFifoQueueRequest,
            P::ReadFifoQueueResponse { .. } => K::ReadFifoQueueResponse,
            P::ReadDeviceIdentificationRequest { .. } => K::ReadDeviceIdentificationRequest,
            P::ReadDeviceIdentificationResponse { .. } => K::ReadDeviceIdentificationResponse,
            P::UmasRequest { .. } => K::UmasRequest,
            P::UmasResponse { .. } => K::UmasResponse,
        }
    }

    /// The 7 bit function code on the wire.
    #[must_use]
    pub fn function_flag(&self) -> u8 {
        match self {
            Self::Error { function_flag, .. } => *function_flag,
            pdu => pdu.kind().discriminators().1.unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn function_code(&self) -> FunctionCode {
        FunctionCode::new(self.function_flag())
    }

    /// The exception carried by an error PDU.
    #[must_use]
    pub fn exception(&self) -> Option<ExceptionResponse> {
        match self {
            Self::Error {
                function_flag,
                exception_code,
            } => Some(ExceptionResponse {
                function: FunctionCode::new(*function_flag),
                exception: *exception_code,
            }),
            _ => None,
        }
    }

    /// Reads the error flag and function code, then the body of the first
    /// matching [`ModbusPduKind`].
    pub fn parse(rb: &mut ReadBuffer<'_>, ctx: &PduContext) -> Result<Self, ParseError> {
        rb.push_context(Self::NAME);
        let error_flag = rb.read_bit()?;
        let function_flag = rb.read_unsigned_byte(7)?;
        let kind = ModbusPduKind::lookup(error_flag, function_flag, ctx.response).ok_or_else(
            || ParseError::UnsupportedCase {
                type_name: Self::NAME,
                discriminators: format!(
                    "errorFlag={error_flag}, functionFlag=0x{function_flag:02X}, response={}",
                    ctx.response
                ),
            },
        )?;
        let pdu = Self::parse_body(rb, kind, function_flag, ctx)?;
        rb.pop_context(Self::NAME)?;
        Ok(pdu)
    }

    #[allow(clippy::too_many_lines)]
    fn parse_body(
        rb: &mut ReadBuffer<'_>,
        kind: ModbusPduKind,
        function_flag: u8,
        ctx: &PduContext,
    ) -> Result<Self, ParseError> {
        use ModbusPduKind as K;

        let pdu = match kind {
            K::Error => Self::Error {
                function_flag,
                exception_code: ExceptionCode::new(rb.read_unsigned_byte(8)?),
            },
            K::ReadCoilsRequest => Self::ReadCoilsRequest {
                starting_address: rb.read_unsigned_short(16)?,
                quantity: rb.read_unsigned_short(16)?,
            },
            K::ReadCoilsResponse => Self::ReadCoilsResponse {
                value: byte_counted(rb)?,
            },
            K::ReadDiscreteInputsRequest => Self::ReadDiscreteInputsRequest {
                starting_address: rb.read_unsigned_short(16)?,
                quantity: rb.read_unsigned_short(16)?,
            },
            K::ReadDiscreteInputsResponse => Self::ReadDiscreteInputsResponse {
                value: byte_counted(rb)?,
            },
            K::ReadHoldingRegistersRequest => Self::ReadHoldingRegistersRequest {
                starting_address: rb.read_unsigned_short(16)?,
                quantity: rb.read_unsigned_short(16)?,
            },
            K::ReadHoldingRegistersResponse => Self::ReadHoldingRegistersResponse {
                value: byte_counted(rb)?,
            },
            K::ReadInputRegistersRequest => Self::ReadInputRegistersRequest {
                starting_address: rb.read_unsigned_short(16)?,
                quantity: rb.read_unsigned_short(16)?,
            },
            K::ReadInputRegistersResponse => Self::ReadInputRegistersResponse {
                value: byte_counted(rb)?,
            },
            K::WriteSingleCoilRequest => Self::WriteSingleCoilRequest {
                address: rb.read_unsigned_short(16)?,
                value: rb.read_unsigned_short(16)?,
            },
            K::WriteSingleCoilResponse => Self::WriteSingleCoilResponse {
                address: rb.read_unsigned_short(16)?,
                value: rb.read_unsigned_short(16)?,
            },
            K::WriteSingleRegisterRequest => Self::WriteSingleRegisterRequest {
                address: rb.read_unsigned_short(16)?,
                value: rb.read_unsigned_short(16)?,
            },
            K::WriteSingleRegisterResponse => Self::WriteSingleRegisterResponse {
                address: rb.read_unsigned_short(16)?,
                value: rb.read_unsigned_short(16)?,
            },
            K::ReadExceptionStatusRequest => Self::ReadExceptionStatusRequest,
            K::ReadExceptionStatusResponse => Self::ReadExceptionStatusResponse {
                value: rb.read_unsigned_byte(8)?,
            },
            K::DiagnosticsRequest => Self::DiagnosticsRequest {
                sub_function: rb.read_unsigned_short(16)?,
                data: rb.read_unsigned_short(16)?,
            },
            K::DiagnosticsResponse => Self::DiagnosticsResponse {
                sub_function: rb.read_unsigned_short(16)?,
                data: rb.read_unsigned_short(16)?,
            },
            K::GetCommEventCounterRequest => Self::GetCommEventCounterRequest,
            K::GetCommEventCounterResponse => Self::GetCommEventCounterResponse {
                status: rb.read_unsigned_short(16)?,
                event_count: rb.read_unsigned_short(16)?,
            },
            K::GetCommEventLogRequest => Self::GetCommEventLogRequest,
            K::GetCommEventLogResponse => {
                let byte_count = rb.read_unsigned_byte(8)?;
                let events_len = usize::from(byte_count).checked_sub(6).ok_or_else(|| {
                    ParseError::InvalidData(
                        format!("event log byte count {byte_count} is below 6").into(),
                    )
                })?;
                Self::GetCommEventLogResponse {
                    status: rb.read_unsigned_short(16)?,
                    event_count: rb.read_unsigned_short(16)?,
                    message_count: rb.read_unsigned_short(16)?,
                    events: bytes(rb, events_len)?,
                }
            }
            K::WriteMultipleCoilsRequest => Self::WriteMultipleCoilsRequest {
                starting_address: rb.read_unsigned_short(16)?,
                quantity: rb.read_unsigned_short(16)?,
                value: byte_counted(rb)?,
            },
            K::WriteMultipleCoilsResponse => Self::WriteMultipleCoilsResponse {
                starting_address: rb.read_unsigned_short(16)?,
                quantity: rb.read_unsigned_short(16)?,
            },
            K::WriteMultipleRegistersRequest => Self::WriteMultipleRegistersRequest {
                starting_address: rb.read_unsigned_short(16)?,
                quantity: rb.read_unsigned_short(16)?,
                value: byte_counted(rb)?,
            },
            K::WriteMultipleRegistersResponse => Self::WriteMultipleRegistersResponse {
                starting_address: rb.read_unsigned_short(16)?,
                quantity: rb.read_unsigned_short(16)?,
            },
            K::ReportServerIdRequest => Self::ReportServerIdRequest,
            K::ReportServerIdResponse => Self::ReportServerIdResponse {
                value: byte_counted(rb)?,
            },
            K::ReadFileRecordRequest => {
                let byte_count = rb.read_unsigned_byte(8)?;
                Self::ReadFileRecordRequest {
                    items: parse_items(rb, byte_count.into(), ReadFileRecordRequestItem::parse)?,
                }
            }
            K::ReadFileRecordResponse => {
                let byte_count = rb.read_unsigned_byte(8)?;
                Self::ReadFileRecordResponse {
                    items: parse_items(rb, byte_count.into(), ReadFileRecordResponseItem::parse)?,
                }
            }
            K::WriteFileRecordRequest => {
                let byte_count = rb.read_unsigned_byte(8)?;
                Self::WriteFileRecordRequest {
                    items: parse_items(rb, byte_count.into(), WriteFileRecordRequestItem::parse)?,
                }
            }
            K::WriteFileRecordResponse => {
                let byte_count = rb.read_unsigned_byte(8)?;
                Self::WriteFileRecordResponse {
                    items: parse_items(rb, byte_count.into(), WriteFileRecordResponseItem::parse)?,
                }
            }
            K::MaskWriteRegisterRequest => Self::MaskWriteRegisterRequest {
                reference_address: rb.read_unsigned_short(16)?,
                and_mask: rb.read_unsigned_short(16)?,
                or_mask: rb.read_unsigned_short(16)?,
            },
            K::MaskWriteRegisterResponse => Self::MaskWriteRegisterResponse {
                reference_address: rb.read_unsigned_short(16)?,
                and_mask: rb.read_unsigned_short(16)?,
                or_mask: rb.read_unsigned_short(16)?,
            },
            K::ReadWriteMultipleRegistersRequest => Self::ReadWriteMultipleRegistersRequest {
                read_starting_address: rb.read_unsigned_short(16)?,
                read_quantity: rb.read_unsigned_short(16)?,
                write_starting_address: rb.read_unsigned_short(16)?,
                write_quantity: rb.read_unsigned_short(16)?,
                value: byte_counted(rb)?,
            },
            K::ReadWriteMultipleRegistersResponse => Self::ReadWriteMultipleRegistersResponse {
                value: byte_counted(rb)?,
            },
            K::ReadFifoQueueRequest => Self::ReadFifoQueueRequest {
                fifo_pointer_address: rb.read_unsigned_short(16)?,
            },
            K::ReadFifoQueueResponse => {
                let byte_count = rb.read_unsigned_short(16)?;
                let fifo_count = rb.read_unsigned_short(16)?;
                if u32::from(byte_count) != u32::from(fifo_count) * 2 + 2 {
                    return Err(ParseError::InvalidData(
                        format!("FIFO byte count {byte_count} does not match {fifo_count} values")
                            .into(),
                    ));
                }
                Self::ReadFifoQueueResponse {
                    fifo_value: (0..fifo_count)
                        .map(|_| rb.read_unsigned_short(16))
                        .collect::<Result<_, _>>()?,
                }
            }
            K::ReadDeviceIdentificationRequest => {
                read_mei_type(rb)?;
                Self::ReadDeviceIdentificationRequest {
                    level: DeviceInformationLevel::parse(rb)?,
                    object_id: rb.read_unsigned_byte(8)?,
                }
            }
            K::ReadDeviceIdentificationResponse => {
                read_mei_type(rb)?;
                let level = DeviceInformationLevel::parse(rb)?;
                let individual_access = rb.read_bit()?;
                let conformity_level = DeviceInformationConformityLevel::parse(rb)?;
                let more_follows = DeviceInformationMoreFollows::parse(rb)?;
                let next_object_id = rb.read_unsigned_byte(8)?;
                let number_of_objects = rb.read_unsigned_byte(8)?;
                let objects = (0..number_of_objects)
                    .map(|_| DeviceInformationObject::parse(rb))
                    .collect::<Result<_, _>>()?;
                Self::ReadDeviceIdentificationResponse {
                    level,
                    individual_access,
                    conformity_level,
                    more_follows,
                    next_object_id,
                    objects,
                }
            }
            K::UmasRequest => Self::UmasRequest {
                item: UmasPduItem::parse(rb, ctx.byte_length.saturating_sub(1), 0)?,
            },
            K::UmasResponse => Self::UmasResponse {
                item: UmasPduItem::parse(
                    rb,
                    ctx.byte_length.saturating_sub(1),
                    ctx.umas_request_function_key,
                )?,
            },
        };
        Ok(pdu)
    }

    #[allow(clippy::too_many_lines)]
    fn serialize_body(&self, wb: &mut WriteBuffer) -> Result<(), SerializationError> {
        match self {
            Self::Error { exception_code, .. } => {
                wb.write_unsigned_byte((*exception_code).into(), 8)
            }
            Self::ReadCoilsRequest {
                starting_address,
                quantity,
            }
            | Self::ReadDiscreteInputsRequest {
                starting_address,
                quantity,
            }
            | Self::ReadHoldingRegistersRequest {
                starting_address,
                quantity,
            }
            | Self::ReadInputRegistersRequest {
                starting_address,
                quantity,
            }
            | Self::WriteMultipleCoilsResponse {
                starting_address,
                quantity,
            }
            | Self::WriteMultipleRegistersResponse {
                starting_address,
                quantity,
            } => {
                wb.write_unsigned_short(*starting_address, 16)?;
                wb.write_unsigned_short(*quantity, 16)
            }
            Self::ReadCoilsResponse { value }
            | Self::ReadDiscreteInputsResponse { value }
            | Self::ReadHoldingRegistersResponse { value }
            | Self::ReadInputRegistersResponse { value }
            | Self::ReportServerIdResponse { value }
            | Self::ReadWriteMultipleRegistersResponse { value } => {
                wb.write_unsigned_byte(u8_len(value.len())?, 8)?;
                wb.write_bytes(value)
            }
            Self::WriteSingleCoilRequest { address, value }
            | Self::WriteSingleCoilResponse { address, value }
            | Self::WriteSingleRegisterRequest { address, value }
            | Self::WriteSingleRegisterResponse { address, value } => {
                wb.write_unsigned_short(*address, 16)?;
                wb.write_unsigned_short(*value, 16)
            }
            Self::ReadExceptionStatusRequest
            | Self::GetCommEventCounterRequest
            | Self::GetCommEventLogRequest
            | Self::ReportServerIdRequest => Ok(()),
            Self::ReadExceptionStatusResponse { value } => wb.write_unsigned_byte(*value, 8),
            Self::DiagnosticsRequest { sub_function, data }
            | Self::DiagnosticsResponse { sub_function, data } => {
                wb.write_unsigned_short(*sub_function, 16)?;
                wb.write_unsigned_short(*data, 16)
            }
            Self::GetCommEventCounterResponse {
                status,
                event_count,
            } => {
                wb.write_unsigned_short(*status, 16)?;
                wb.write_unsigned_short(*event_count, 16)
            }
            Self::GetCommEventLogResponse {
                status,
                event_count,
                message_count,
                events,
            } => {
                wb.write_unsigned_byte(u8_len(events.len() + 6)?, 8)?;
                wb.write_unsigned_short(*status, 16)?;
                wb.write_unsigned_short(*event_count, 16)?;
                wb.write_unsigned_short(*message_count, 16)?;
                wb.write_bytes(events)
            }
            Self::WriteMultipleCoilsRequest {
                starting_address,
                quantity,
                value,
            }
            | Self::WriteMultipleRegistersRequest {
                starting_address,
                quantity,
                value,
            } => {
                wb.write_unsigned_short(*starting_address, 16)?;
                wb.write_unsigned_short(*quantity, 16)?;
                wb.write_unsigned_byte(u8_len(value.len())?, 8)?;
                wb.write_bytes(value)
            }
            Self::ReadFileRecordRequest { items } => {
                wb.write_unsigned_byte(u8_len(items_length(items) / 8)?, 8)?;
                items.iter().try_for_each(|item| item.serialize(wb))
            }
            Self::ReadFileRecordResponse { items } => {
                wb.write_unsigned_byte(u8_len(items_length(items) / 8)?, 8)?;
                items.iter().try_for_each(|item| item.serialize(wb))
            }
            Self::WriteFileRecordRequest { items } => {
                wb.write_unsigned_byte(u8_len(items_length(items) / 8)?, 8)?;
                items.iter().try_for_each(|item| item.serialize(wb))
            }
            Self::WriteFileRecordResponse { items } => {
                wb.write_unsigned_byte(u8_len(items_length(items) / 8)?, 8)?;
                items.iter().try_for_each(|item| item.serialize(wb))
            }
            Self::MaskWriteRegisterRequest {
                reference_address,
                and_mask,
                or_mask,
            }
            | Self::MaskWriteRegisterResponse {
                reference_address,
                and_mask,
                or_mask,
            } => {
                wb.write_unsigned_short(*reference_address, 16)?;
                wb.write_unsigned_short(*and_mask, 16)?;
                wb.write_unsigned_short(*or_mask, 16)
            }
            Self::ReadWriteMultipleRegistersRequest {
                read_starting_address,
                read_quantity,
                write_starting_address,
                write_quantity,
                value,
            } => {
                wb.write_unsigned_short(*read_starting_address, 16)?;
                wb.write_unsigned_short(*read_quantity, 16)?;
                wb.write_unsigned_short(*write_starting_address, 16)?;
                wb.write_unsigned_short(*write_quantity, 16)?;
                wb.write_unsigned_byte(u8_len(value.len())?, 8)?;
                wb.write_bytes(value)
            }
            Self::ReadFifoQueueRequest {
                fifo_pointer_address,
            } => wb.write_unsigned_short(*fifo_pointer_address, 16),
            Self::ReadFifoQueueResponse { fifo_value } => {
                wb.write_unsigned_short(u16_len(fifo_value.len() * 2 + 2)?, 16)?;
                wb.write_unsigned_short(u16_len(fifo_value.len())?, 16)?;
                fifo_value
                    .iter()
                    .try_for_each(|value| wb.write_unsigned_short(*value, 16))
            }
            Self::ReadDeviceIdentificationRequest { level, object_id } => {
                wb.write_unsigned_byte(MEI_TYPE_READ_DEVICE_IDENTIFICATION, 8)?;
                wb.write_unsigned_byte(level.value(), 8)?;
                wb.write_unsigned_byte(*object_id, 8)
            }
            Self::ReadDeviceIdentificationResponse {
                level,
                individual_access,
                conformity_level,
                more_follows,
                next_object_id,
                objects,
            } => {
                wb.write_unsigned_byte(MEI_TYPE_READ_DEVICE_IDENTIFICATION, 8)?;
                wb.write_unsigned_byte(level.value(), 8)?;
                wb.write_bit(*individual_access)?;
                wb.write_unsigned_byte(conformity_level.value(), 7)?;
                wb.write_unsigned_byte(more_follows.value(), 8)?;
                wb.write_unsigned_byte(*next_object_id, 8)?;
                wb.write_unsigned_byte(u8_len(objects.len())?, 8)?;
                objects.iter().try_for_each(|object| object.serialize(wb))
            }
            Self::UmasRequest { item } | Self::UmasResponse { item } => item.serialize(wb),
        }
    }

    fn body_length_in_bits(&self) -> usize {
        match self {
            Self::ReadExceptionStatusRequest
            | Self::GetCommEventCounterRequest
            | Self::GetCommEventLogRequest
            | Self::ReportServerIdRequest => 0,
            Self::Error { .. } | Self::ReadExceptionStatusResponse { .. } => 8,
            Self::ReadFifoQueueRequest { .. } => 16,
            Self::ReadDeviceIdentificationRequest { .. } => 24,
            Self::ReadCoilsRequest { .. }
            | Self::ReadDiscreteInputsRequest { .. }
            | Self::ReadHoldingRegistersRequest { .. }
            | Self::ReadInputRegistersRequest { .. }
            | Self::WriteMultipleCoilsResponse { .. }
            | Self::WriteMultipleRegistersResponse { .. }
            | Self::WriteSingleCoilRequest { .. }
            | Self::WriteSingleCoilResponse { .. }
            | Self::WriteSingleRegisterRequest { .. }
            | Self::WriteSingleRegisterResponse { .. }
            | Self::DiagnosticsRequest { .. }
            | Self::DiagnosticsResponse { .. }
            | Self::GetCommEventCounterResponse { .. } => 32,
            Self::MaskWriteRegisterRequest { .. } | Self::MaskWriteRegisterResponse { .. } => 48,
            Self::ReadCoilsResponse { value }
            | Self::ReadDiscreteInputsResponse { value }
            | Self::ReadHoldingRegistersResponse { value }
            | Self::ReadInputRegistersResponse { value }
            | Self::ReportServerIdResponse { value }
            | Self::ReadWriteMultipleRegistersResponse { value } => 8 + value.len() * 8,
            Self::GetCommEventLogResponse { events, .. } => 8 + 48 + events.len() * 8,
            Self::WriteMultipleCoilsRequest { value, .. }
            | Self::WriteMultipleRegistersRequest { value, .. } => 40 + value.len() * 8,
            Self::ReadFileRecordRequest { items } => 8 + items_length(items),
            Self::ReadFileRecordResponse { items } => 8 + items_length(items),
            Self::WriteFileRecordRequest { items } => 8 + items_length(items),
            Self::WriteFileRecordResponse { items } => 8 + items_length(items),
            Self::ReadWriteMultipleRegistersRequest { value, .. } => 72 + value.len() * 8,
            Self::ReadFifoQueueResponse { fifo_value } => 32 + fifo_value.len() * 16,
            Self::ReadDeviceIdentificationResponse { objects, .. } => {
                48 + items_length(objects)
            }
            Self::UmasRequest { item } | Self::UmasResponse { item } => item.length_in_bits(),
        }
    }
}

fn read_mei_type(rb: &mut ReadBuffer<'_>) -> Result<(), ParseError> {
    let mei_type = rb.read_unsigned_byte(8)?;
    if mei_type != MEI_TYPE_READ_DEVICE_IDENTIFICATION {
        return Err(ParseError::ConstantMismatch {
            field: "meiType",
            expected: MEI_TYPE_READ_DEVICE_IDENTIFICATION.into(),
            actual: mei_type.into(),
        });
    }
    Ok(())
}

impl Message for ModbusPdu {
    const NAME: &'static str = "ModbusPDU";

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), SerializationError> {
        wb.push_context(Self::NAME);
        let (error_flag, _, _) = self.kind().discriminators();
        wb.write_bit(error_flag)?;
        wb.write_unsigned_byte(self.function_flag(), 7)?;
        self.serialize_body(wb)?;
        wb.pop_context(Self::NAME)
    }

    fn length_in_bits(&self) -> usize {
        8 + self.body_length_in_bits()
    }
}
