// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sub-records of file record and device identification PDUs.

use bytes::Bytes;

use crate::{
    buffer::{ReadBuffer, WriteBuffer},
    error::{ParseError, SerializationError},
    message::{u16_len, u8_len, Message},
};

/// One sub-request of a read file record request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadFileRecordRequestItem {
    pub reference_type: u8,
    pub file_number: u16,
    pub record_number: u16,
    /// Number of registers to read.
    pub record_length: u16,
}

impl ReadFileRecordRequestItem {
    pub fn parse(rb: &mut ReadBuffer<'_>) -> Result<Self, ParseError> {
        rb.push_context(Self::NAME);
        let item = Self {
            reference_type: rb.read_unsigned_byte(8)?,
            file_number: rb.read_unsigned_short(16)?,
            record_number: rb.read_unsigned_short(16)?,
            record_length: rb.read_unsigned_short(16)?,
        };
        rb.pop_context(Self::NAME)?;
        Ok(item)
    }
}

impl Message for ReadFileRecordRequestItem {
    const NAME: &'static str = "ModbusPDUReadFileRecordRequestItem";

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), SerializationError> {
        wb.push_context(Self::NAME);
        wb.write_unsigned_byte(self.reference_type, 8)?;
        wb.write_unsigned_short(self.file_number, 16)?;
        wb.write_unsigned_short(self.record_number, 16)?;
        wb.write_unsigned_short(self.record_length, 16)?;
        wb.pop_context(Self::NAME)
    }

    fn length_in_bits(&self) -> usize {
        8 + 16 + 16 + 16
    }
}

/// One sub-response of a read file record response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadFileRecordResponseItem {
    pub reference_type: u8,
    pub data: Bytes,
}

impl ReadFileRecordResponseItem {
    pub fn parse(rb: &mut ReadBuffer<'_>) -> Result<Self, ParseError> {
        rb.push_context(Self::NAME);
        // The length covers the reference type.
        let data_length = rb.read_unsigned_byte(8)?;
        if data_length == 0 {
            return Err(ParseError::InvalidData(
                "file record response without reference type".into(),
            ));
        }
        let reference_type = rb.read_unsigned_byte(8)?;
        let data = rb.read_bytes(usize::from(data_length) - 1)?.into();
        rb.pop_context(Self::NAME)?;
        Ok(Self {
            reference_type,
            data,
        })
    }
}

impl Message for ReadFileRecordResponseItem {
    const NAME: &'static str = "ModbusPDUReadFileRecordResponseItem";

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), SerializationError> {
        wb.push_context(Self::NAME);
        wb.write_unsigned_byte(u8_len(self.data.len() + 1)?, 8)?;
        wb.write_unsigned_byte(self.reference_type, 8)?;
        wb.write_bytes(&self.data)?;
        wb.pop_context(Self::NAME)
    }

    fn length_in_bits(&self) -> usize {
        8 + 8 + self.data.len() * 8
    }
}

fn parse_write_record(rb: &mut ReadBuffer<'_>) -> Result<(u8, u16, u16, Bytes), ParseError> {
    let reference_type = rb.read_unsigned_byte(8)?;
    let file_number = rb.read_unsigned_short(16)?;
    let record_number = rb.read_unsigned_short(16)?;
    let record_length = rb.read_unsigned_short(16)?;
    let record_data = rb.read_bytes(usize::from(record_length) * 2)?.into();
    Ok((reference_type, file_number, record_number, record_data))
}

fn serialize_write_record(
    wb: &mut WriteBuffer,
    reference_type: u8,
    file_number: u16,
    record_number: u16,
    record_data: &[u8],
) -> Result<(), SerializationError> {
    if record_data.len() % 2 != 0 {
        return Err(SerializationError::InvalidData(
            format!("record data of {} bytes is not a whole number of registers", record_data.len()).into(),
        ));
    }
    wb.write_unsigned_byte(reference_type, 8)?;
    wb.write_unsigned_short(file_number, 16)?;
    wb.write_unsigned_short(record_number, 16)?;
    wb.write_unsigned_short(u16_len(record_data.len() / 2)?, 16)?;
    wb.write_bytes(record_data)
}

/// One sub-request of a write file record request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFileRecordRequestItem {
    pub reference_type: u8,
    pub file_number: u16,
    pub record_number: u16,
    /// Register contents, two bytes per register.
    pub record_data: Bytes,
}

impl WriteFileRecordRequestItem {
    pub fn parse(rb: &mut ReadBuffer<'_>) -> Result<Self, ParseError> {
        rb.push_context(Self::NAME);
        let (reference_type, file_number, record_number, record_data) = parse_write_record(rb)?;
        rb.pop_context(Self::NAME)?;
        Ok(Self {
            reference_type,
            file_number,
            record_number,
            record_data,
        })
    }
}

impl Message for WriteFileRecordRequestItem {
    const NAME: &'static str = "ModbusPDUWriteFileRecordRequestItem";

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), SerializationError> {
        wb.push_context(Self::NAME);
        serialize_write_record(
            wb,
            self.reference_type,
            self.file_number,
            self.record_number,
            &self.record_data,
        )?;
        wb.pop_context(Self::NAME)
    }

    fn length_in_bits(&self) -> usize {
        8 + 16 + 16 + 16 + self.record_data.len() * 8
    }
}

/// One sub-response of a write file record response, echoing the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFileRecordResponseItem {
    pub reference_type: u8,
    pub file_number: u16,
    pub record_number: u16,
    pub record_data: Bytes,
}

impl WriteFileRecordResponseItem {
    pub fn parse(rb: &mut ReadBuffer<'_>) -> Result<Self, ParseError> {
        rb.push_context(Self::NAME);
        let (reference_type, file_number, record_number, record_data) = parse_write_record(rb)?;
        rb.pop_context(Self::NAME)?;
        Ok(Self {
            reference_type,
            file_number,
            record_number,
            record_data,
        })
    }
}

impl Message for WriteFileRecordResponseItem {
    const NAME: &'static str = "ModbusPDUWriteFileRecordResponseItem";

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), SerializationError> {
        wb.push_context(Self::NAME);
        serialize_write_record(
            wb,
            self.reference_type,
            self.file_number,
            self.record_number,
            &self.record_data,
        )?;
        wb.pop_context(Self::NAME)
    }

    fn length_in_bits(&self) -> usize {
        8 + 16 + 16 + 16 + self.record_data.len() * 8
    }
}

/// Read device identification code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceInformationLevel {
    /// Basic identification, stream access.
    Basic,
    /// Regular identification, stream access.
    Regular,
    /// Extended identification, stream access.
    Extended,
    /// One specific object, individual access.
    Individual,
}

impl DeviceInformationLevel {
    #[must_use]
    pub const fn new(value: u8) -> Option<Self> {
        Some(match value {
            0x01 => Self::Basic,
            0x02 => Self::Regular,
            0x03 => Self::Extended,
            0x04 => Self::Individual,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::Basic => 0x01,
            Self::Regular => 0x02,
            Self::Extended => 0x03,
            Self::Individual => 0x04,
        }
    }

    pub(crate) fn parse(rb: &mut ReadBuffer<'_>) -> Result<Self, ParseError> {
        let value = rb.read_unsigned_byte(8)?;
        Self::new(value).ok_or_else(|| {
            ParseError::InvalidData(format!("unknown device information level 0x{value:02X}").into())
        })
    }
}

/// Identification objects a device supports, without the individual access flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceInformationConformityLevel {
    BasicStreamOnly,
    RegularStreamOnly,
    ExtendedStreamOnly,
}

impl DeviceInformationConformityLevel {
    #[must_use]
    pub const fn new(value: u8) -> Option<Self> {
        Some(match value {
            0x01 => Self::BasicStreamOnly,
            0x02 => Self::RegularStreamOnly,
            0x03 => Self::ExtendedStreamOnly,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::BasicStreamOnly => 0x01,
            Self::RegularStreamOnly => 0x02,
            Self::ExtendedStreamOnly => 0x03,
        }
    }

    /// Reads the 7 bit level following the individual access flag.
    pub(crate) fn parse(rb: &mut ReadBuffer<'_>) -> Result<Self, ParseError> {
        let value = rb.read_unsigned_byte(7)?;
        Self::new(value).ok_or_else(|| {
            ParseError::InvalidData(format!("unknown conformity level 0x{value:02X}").into())
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceInformationMoreFollows {
    NoMoreObjectsAvailable,
    MoreObjectsAvailable,
}

impl DeviceInformationMoreFollows {
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::NoMoreObjectsAvailable => 0x00,
            Self::MoreObjectsAvailable => 0xFF,
        }
    }

    pub(crate) fn parse(rb: &mut ReadBuffer<'_>) -> Result<Self, ParseError> {
        match rb.read_unsigned_byte(8)? {
            0x00 => Ok(Self::NoMoreObjectsAvailable),
            0xFF => Ok(Self::MoreObjectsAvailable),
            value => Err(ParseError::InvalidData(
                format!("invalid more-follows marker 0x{value:02X}").into(),
            )),
        }
    }
}

/// A single identification object such as the vendor name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInformationObject {
    pub object_id: u8,
    pub data: Bytes,
}

impl DeviceInformationObject {
    /// The object value if it is valid UTF-8.
    #[must_use]
    pub fn data_as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    pub fn parse(rb: &mut ReadBuffer<'_>) -> Result<Self, ParseError> {
        rb.push_context(Self::NAME);
        let object_id = rb.read_unsigned_byte(8)?;
        let object_length = rb.read_unsigned_byte(8)?;
        let data = rb.read_bytes(object_length.into())?.into();
        rb.pop_context(Self::NAME)?;
        Ok(Self { object_id, data })
    }
}

impl Message for DeviceInformationObject {
    const NAME: &'static str = "ModbusDeviceInformationObject";

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), SerializationError> {
        wb.push_context(Self::NAME);
        wb.write_unsigned_byte(self.object_id, 8)?;
        wb.write_unsigned_byte(u8_len(self.data.len())?, 8)?;
        wb.write_bytes(&self.data)?;
        wb.pop_context(Self::NAME)
    }

    fn length_in_bits(&self) -> usize {
        8 + 8 + self.data.len() * 8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ByteOrder;

    #[test]
    fn read_file_record_response_item_counts_the_reference_type() {
        let item = ReadFileRecordResponseItem {
            reference_type: 6,
            data: Bytes::from_static(&[0x0D, 0xFE, 0x00, 0x20]),
        };
        let bytes = item.to_bytes().unwrap();
        assert_eq!(&bytes[..], &[0x05, 0x06, 0x0D, 0xFE, 0x00, 0x20]);

        let mut rb = ReadBuffer::new(&bytes, ByteOrder::BigEndian);
        assert_eq!(ReadFileRecordResponseItem::parse(&mut rb).unwrap(), item);
    }

    #[test]
    fn write_file_record_length_is_in_registers() {
        let item = WriteFileRecordRequestItem {
            reference_type: 6,
            file_number: 4,
            record_number: 7,
            record_data: Bytes::from_static(&[0x06, 0xAF, 0x04, 0xBE, 0x10, 0x0D]),
        };
        let bytes = item.to_bytes().unwrap();
        assert_eq!(
            &bytes[..],
            &[0x06, 0x00, 0x04, 0x00, 0x07, 0x00, 0x03, 0x06, 0xAF, 0x04, 0xBE, 0x10, 0x0D]
        );
        let mut rb = ReadBuffer::new(&bytes, ByteOrder::BigEndian);
        assert_eq!(WriteFileRecordRequestItem::parse(&mut rb).unwrap(), item);
    }

    #[test]
    fn odd_record_data_is_rejected() {
        let item = WriteFileRecordResponseItem {
            reference_type: 6,
            file_number: 1,
            record_number: 0,
            record_data: Bytes::from_static(&[0x01]),
        };
        assert!(matches!(
            item.to_bytes(),
            Err(SerializationError::InvalidData(_))
        ));
    }

    #[test]
    fn device_information_object() {
        let object = DeviceInformationObject {
            object_id: 0x00,
            data: Bytes::from_static(b"slowtec"),
        };
        let bytes = object.to_bytes().unwrap();
        assert_eq!(bytes[1], 7);
        let mut rb = ReadBuffer::new(&bytes, ByteOrder::BigEndian);
        let parsed = DeviceInformationObject::parse(&mut rb).unwrap();
        assert_eq!(parsed.data_as_str(), Some("slowtec"));
    }

    #[test]
    fn more_follows_marker() {
        let mut rb = ReadBuffer::new(&[0xFF, 0x01], ByteOrder::BigEndian);
        assert_eq!(
            DeviceInformationMoreFollows::parse(&mut rb).unwrap(),
            DeviceInformationMoreFollows::MoreObjectsAvailable
        );
        assert!(DeviceInformationMoreFollows::parse(&mut rb).is_err());
    }
}
