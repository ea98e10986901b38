// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

mod fake_plc;

use bytes::Bytes;
use tokio_plc::{
    frame::ModbusPdu,
    message::Message as _,
    prelude::*,
    umas::{
        PlcMemoryBlockIdent, UmasMemoryBlock, UmasPduItem, UmasPduPayload,
        UmasUnlocatedVariableReference, UmasVariableBlock, VariableReadRequestReference,
    },
};

const CRC: u32 = 0xDEAD_BEEF;

fn config(options: &str) -> ConnectionConfig {
    format!("umas://127.0.0.1?{options}").parse().unwrap()
}

fn variable(name: &str, data_type: u16, offset: u16) -> UmasUnlocatedVariableReference {
    UmasUnlocatedVariableReference {
        data_type,
        block: 2,
        offset,
        base_offset: 0,
        unknown4: 0,
        value: name.to_owned(),
    }
}

/// Answers the handshake with a symbol table of two pages.
fn handshake(payload: &UmasPduPayload) -> Option<UmasPduPayload> {
    let response = match payload {
        UmasPduPayload::PlcIdentRequest => UmasPduPayload::PlcIdentResponse {
            range: 0,
            ident: 0x0602_0000,
            model: 0x0A01,
            com_version: 1,
            com_patch_version: 0,
            int_version: 2,
            hardware_version: 1,
            crash_code: 0,
            hostname: "BMEP58".to_owned(),
            memory_idents: vec![PlcMemoryBlockIdent {
                block_type: 0x10,
                folio: 0,
                status: 0,
                memory_length: 0x0010_0000,
            }],
        },
        UmasPduPayload::InitCommsRequest { .. } => UmasPduPayload::InitCommsResponse {
            max_frame_size: 1010,
            firmware_version: 0x0210,
            not_sure: 0,
            internal_code: 0,
            hostname: "BMEP58".to_owned(),
        },
        UmasPduPayload::ProjectInfoRequest { .. } => UmasPduPayload::ProjectInfoResponse {
            crc: CRC,
            data: Bytes::new(),
        },
        UmasPduPayload::ReadMemoryBlockRequest {
            block_number: 0x30,
            offset: 0,
            ..
        } => UmasPduPayload::ReadMemoryBlockResponse {
            range: 0,
            block: UmasMemoryBlock::BasicInfo {
                range: 0,
                not_sure: 0,
                index: 3,
                hardware_id: 0x0102_0304,
            }
            .to_bytes()
            .unwrap(),
        },
        UmasPduPayload::ReadUnlocatedVariableNamesRequest {
            record_type,
            index,
            hardware_id,
            offset,
            ..
        } => {
            assert_eq!((*index, *hardware_id), (3, 0x0102_0304));
            let block = match (*record_type, *offset) {
                (UmasVariableBlock::UNLOCATED_VARIABLE_NAMES, 0) => {
                    UmasVariableBlock::UnlocatedVariableNames {
                        range: 0,
                        next_address: 0x20,
                        unknown1: 0,
                        records: vec![variable("LEVEL", 4, 0x10)],
                    }
                }
                (UmasVariableBlock::UNLOCATED_VARIABLE_NAMES, 0x20) => {
                    UmasVariableBlock::UnlocatedVariableNames {
                        range: 0,
                        next_address: 0,
                        unknown1: 0,
                        records: vec![variable("RECIPE.SPEED", 8, 0x20), variable("MOTOR", 0x1234, 0x30)],
                    }
                }
                (UmasVariableBlock::DATATYPE_NAMES, 0) => UmasVariableBlock::DatatypeNames {
                    range: 0,
                    next_address: 0,
                    unknown1: 0,
                    records: vec![],
                },
                other => panic!("unexpected symbol table page {other:?}"),
            };
            UmasPduPayload::ReadUnlocatedVariableNamesResponse {
                block: block.to_bytes().unwrap(),
            }
        }
        _ => return None,
    };
    Some(response)
}

/// A PLC answering the handshake and then `handler`.
fn plc<F>(mut handler: F) -> tokio::io::DuplexStream
where
    F: FnMut(UmasPduPayload) -> Option<UmasPduPayload> + Send + 'static,
{
    fake_plc::spawn(move |request| {
        let ModbusPdu::UmasRequest { item } = request else {
            panic!("unexpected request {request:?}");
        };
        let payload = match handshake(&item.payload) {
            Some(payload) => payload,
            None => handler(item.payload)?,
        };
        Some(ModbusPdu::UmasResponse {
            item: UmasPduItem::new(item.pairing_key, payload),
        })
    })
}

#[tokio::test]
async fn handshake_learns_the_symbol_table() -> anyhow::Result<()> {
    // Given
    let transport = plc(|payload| panic!("unexpected request {payload:?}"));

    // When
    let connection = UmasConnection::new(transport, &config("")).await?;

    // Then
    assert_eq!(connection.state(), ConnectionState::Connected);
    let info = connection.plc_info();
    assert_eq!(info.hostname, "BMEP58");
    assert_eq!(info.max_frame_size, 1010);
    assert_eq!(info.crc, CRC);
    assert_eq!(info.index, 3);
    assert_eq!(info.hardware_id, 0x0102_0304);
    assert_eq!(info.memory_blocks.len(), 1);
    assert_eq!(
        connection.symbols().keys().collect::<Vec<_>>(),
        ["LEVEL", "MOTOR", "RECIPE.SPEED"]
    );
    Ok(())
}

#[tokio::test]
async fn read_variables() -> anyhow::Result<()> {
    // Given
    let transport = plc(|payload| match payload {
        UmasPduPayload::ReadVariableRequest { crc, variables } => {
            assert_eq!(crc, CRC);
            let block: &'static [u8] = match variables.as_slice() {
                [VariableReadRequestReference {
                    data_size_index: 2,
                    block: 2,
                    offset: 0x10,
                    array_length: None,
                    ..
                }] => &[0x6A, 0x03],
                [VariableReadRequestReference {
                    data_size_index: 3,
                    offset: 0x20,
                    array_length: Some(2),
                    ..
                }] => &[0x00, 0x00, 0x80, 0x3F, 0x00, 0x00, 0x00, 0xC0],
                other => panic!("unexpected variables {other:?}"),
            };
            Some(UmasPduPayload::ReadVariableResponse {
                block: Bytes::from_static(block),
            })
        }
        other => panic!("unexpected request {other:?}"),
    });
    let connection = UmasConnection::new(transport, &config("")).await?;

    // When
    let level = connection.execute(PlcRequest::read("level", "LEVEL")).await;
    let speed = connection
        .execute(PlcRequest::read("speed", "RECIPE.SPEED:REAL[2]"))
        .await;

    // Then
    assert_eq!(level.code, ResponseCode::Ok);
    assert_eq!(level.value("level"), Some(&PlcValue::Int(874)));
    assert_eq!(
        speed.value("speed"),
        Some(&PlcValue::List(vec![PlcValue::Real(1.0), PlcValue::Real(-2.0)]))
    );
    Ok(())
}

#[tokio::test]
async fn write_variable() -> anyhow::Result<()> {
    let transport = plc(|payload| match payload {
        UmasPduPayload::WriteVariableRequest { crc, variables } => {
            assert_eq!(crc, CRC);
            assert_eq!(variables.len(), 1);
            assert_eq!(&variables[0].record_data[..], &[0xFE, 0xFF]);
            Some(UmasPduPayload::WriteVariableResponse)
        }
        other => panic!("unexpected request {other:?}"),
    });
    let connection = UmasConnection::new(transport, &config("")).await?;

    let response = connection
        .execute(PlcRequest::write("level", "LEVEL", PlcValue::Int(-2)))
        .await;

    assert_eq!(response.code, ResponseCode::Ok);
    Ok(())
}

#[tokio::test]
async fn refused_write() -> anyhow::Result<()> {
    let transport = plc(|_| {
        Some(UmasPduPayload::ErrorResponse {
            block: Bytes::from_static(&[0x81]),
        })
    });
    let connection = UmasConnection::new(transport, &config("")).await?;

    let response = connection
        .execute(PlcRequest::write("level", "LEVEL", PlcValue::Int(1)))
        .await;

    assert_eq!(response.code, ResponseCode::AccessDenied);
    Ok(())
}

#[tokio::test]
async fn unknown_variables_and_types() -> anyhow::Result<()> {
    let transport = plc(|payload| panic!("unexpected request {payload:?}"));
    let connection = UmasConnection::new(transport, &config("")).await?;

    let unknown = connection.execute(PlcRequest::read("a", "NOPE")).await;
    let user_type = connection.execute(PlcRequest::read("b", "MOTOR")).await;
    let malformed = connection.execute(PlcRequest::read("c", "1ABC")).await;

    assert_eq!(unknown.code, ResponseCode::InvalidAddress);
    assert_eq!(user_type.code, ResponseCode::InvalidDatatype);
    assert_eq!(malformed.code, ResponseCode::InvalidAddress);
    Ok(())
}

#[tokio::test]
async fn browse() -> anyhow::Result<()> {
    let transport = plc(|payload| panic!("unexpected request {payload:?}"));
    let connection = UmasConnection::new(transport, &config("")).await?;

    let response = connection.execute(PlcRequest::Browse).await;

    assert_eq!(response.code, ResponseCode::Ok);
    assert_eq!(response.items.len(), 3);
    assert_eq!(
        response.value("LEVEL"),
        Some(&PlcValue::String("INT".to_owned()))
    );
    assert_eq!(
        response.value("RECIPE.SPEED"),
        Some(&PlcValue::String("REAL".to_owned()))
    );
    assert_eq!(
        response.value("MOTOR"),
        Some(&PlcValue::String("0x1234".to_owned()))
    );
    Ok(())
}

#[tokio::test]
async fn handshake_fails_at_the_refused_step() {
    let transport = fake_plc::spawn(|request| {
        let ModbusPdu::UmasRequest { item } = request else {
            panic!("unexpected request {request:?}");
        };
        let payload = match item.payload {
            UmasPduPayload::ProjectInfoRequest { .. } => UmasPduPayload::ErrorResponse {
                block: Bytes::from_static(&[0x81]),
            },
            ref payload => handshake(payload)?,
        };
        Some(ModbusPdu::UmasResponse {
            item: UmasPduItem::new(item.pairing_key, payload),
        })
    });

    let err = UmasConnection::new(transport, &config("")).await.unwrap_err();

    assert!(matches!(
        &err,
        Error::Handshake { step: "project-info", source }
            if matches!(**source, Error::Refused { function: 0x03, code: 0x81 })
    ));
    assert_eq!(ResponseCode::from(&err), ResponseCode::NotConnected);
}

#[tokio::test]
async fn plc_hanging_up_during_the_handshake() {
    // Given
    let transport = fake_plc::spawn(|request| panic!("hanging up on {request:?}"));

    // When
    let err = UmasConnection::new(transport, &config("")).await.unwrap_err();

    // Then
    assert!(matches!(&err, Error::Handshake { step: "plc-ident", .. }));
    assert!(err.is_disconnect());
    assert_eq!(ResponseCode::from(&err), ResponseCode::NotConnected);
}

#[tokio::test]
async fn silent_plc_times_out_the_handshake() {
    let transport = fake_plc::spawn(|_| None);

    let err = UmasConnection::new(transport, &config("handshake-timeout=50"))
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        Error::Handshake { step: "plc-ident", source } if matches!(**source, Error::Timeout { .. })
    ));
}

#[tokio::test]
async fn close() -> anyhow::Result<()> {
    let transport = plc(|payload| panic!("unexpected request {payload:?}"));
    let connection = UmasConnection::new(transport, &config("")).await?;

    connection.close().await?;

    assert_eq!(connection.state(), ConnectionState::Disconnected);
    let response = connection.execute(PlcRequest::read("level", "LEVEL")).await;
    assert_eq!(response.code, ResponseCode::NotConnected);
    Ok(())
}

#[tokio::test]
async fn drivers_open_umas_connections() -> anyhow::Result<()> {
    let transport = plc(|payload| panic!("unexpected request {payload:?}"));

    let connection = DriverManager::default()
        .open("umas://127.0.0.1:502?unit-identifier=0xFF", transport)
        .await?;

    assert!(connection.is_connected());
    Ok(())
}
