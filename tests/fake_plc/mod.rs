// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A scripted PLC at the far end of an in-memory pipe.

use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _, DuplexStream};
use tokio_plc::{
    buffer::{ByteOrder, ReadBuffer},
    frame::{tcp::ModbusTcpAdu, ModbusPdu},
    message::Message as _,
};

pub type Handler = Box<dyn FnMut(ModbusPdu) -> Option<ModbusPdu> + Send>;

/// Serves every request with `handler`.
///
/// Requests the handler answers with `None` stay unanswered. The PLC
/// hangs up when the client end is dropped or the handler panics.
pub fn spawn<F>(mut handler: F) -> DuplexStream
where
    F: FnMut(ModbusPdu) -> Option<ModbusPdu> + Send + 'static,
{
    let _ = env_logger::builder().is_test(true).try_init();
    let (client, mut server) = tokio::io::duplex(4096);
    tokio::spawn(async move {
        loop {
            let mut frame = vec![0; 7];
            if server.read_exact(&mut frame).await.is_err() {
                break;
            }
            // The length counts the unit identifier.
            let length = u16::from_be_bytes([frame[4], frame[5]]);
            frame.resize(6 + usize::from(length), 0);
            if server.read_exact(&mut frame[7..]).await.is_err() {
                break;
            }
            let mut rb = ReadBuffer::new(&frame, ByteOrder::BigEndian);
            let request = ModbusTcpAdu::parse(&mut rb, false, 0).unwrap();
            let Some(pdu) = handler(request.pdu) else {
                continue;
            };
            let response = ModbusTcpAdu {
                transaction_identifier: request.transaction_identifier,
                unit_identifier: request.unit_identifier,
                pdu,
            };
            if server
                .write_all(&response.to_bytes().unwrap())
                .await
                .is_err()
            {
                break;
            }
        }
    });
    client
}
