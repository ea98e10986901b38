// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use futures_util::{SinkExt as _, StreamExt as _};
use tokio::{
    io::{ReadHalf, WriteHalf},
    sync::Mutex,
    task::JoinHandle,
};
use tokio_util::codec::{FramedRead, FramedWrite};

use super::{ConnectionState, Transport};
use crate::{
    buffer::{ByteOrder, ReadBuffer},
    codec::{tcp::TcpCodec, RawFrame},
    frame::{tcp::*, verify_response_header, ModbusPdu},
    transaction::TransactionManager,
    Error, Result,
};

type Writer = FramedWrite<WriteHalf<Box<dyn Transport>>, TcpCodec>;

/// Modbus TCP request/response service.
///
/// Requests may be issued concurrently through a shared reference. Each
/// response is routed to its request by the transaction identifier, not
/// by arrival order.
pub struct TcpService {
    writer: Mutex<Writer>,
    transactions: Arc<TransactionManager<TransactionId>>,
    reader: JoinHandle<()>,
    unit_id: UnitId,
    closing: AtomicBool,
}

impl fmt::Debug for TcpService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpService")
            .field("unit_id", &self.unit_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl TcpService {
    /// Starts serving requests over `transport`.
    ///
    /// Must be called within a tokio runtime.
    pub fn new<T>(transport: T, unit_id: UnitId) -> Self
    where
        T: Transport,
    {
        let transport: Box<dyn Transport> = Box::new(transport);
        let (read_half, write_half) = tokio::io::split(transport);
        let transactions = Arc::new(TransactionManager::new());
        let reader = tokio::spawn(read_frames(
            FramedRead::new(read_half, TcpCodec),
            Arc::clone(&transactions),
        ));
        Self {
            writer: Mutex::new(FramedWrite::new(write_half, TcpCodec)),
            transactions,
            reader,
            unit_id,
            closing: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn unit_id(&self) -> UnitId {
        self.unit_id
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        if self.transactions.is_closed() {
            ConnectionState::Disconnected
        } else if self.closing.load(Ordering::Acquire) {
            ConnectionState::Closing
        } else if self.transactions.in_flight() > 0 {
            ConnectionState::AwaitingResponse
        } else {
            ConnectionState::Connected
        }
    }

    /// Sends `pdu` and waits at most `timeout` for the matching response.
    ///
    /// UMAS responses are parsed as answers to the UMAS function of the
    /// request.
    pub async fn call(&self, pdu: ModbusPdu, timeout: Duration) -> Result<ModbusPdu> {
        log::debug!("Call {:?}", pdu);
        let umas_request_function_key = match &pdu {
            ModbusPdu::UmasRequest { item } => item.kind().function_key(),
            _ => 0,
        };
        let transaction_id = self.transactions.next_transaction_id();
        let waiter = self.transactions.register(transaction_id)?;

        let req_adu = ModbusTcpAdu {
            transaction_identifier: transaction_id,
            unit_identifier: self.unit_id,
            pdu,
        };
        let req_hdr = req_adu.header();

        // The waiter is armed before the request leaves and frees its slot
        // when dropped.
        self.writer.lock().await.send(req_adu).await?;

        let bytes = waiter.wait(timeout).await?;
        log::trace!("Response {transaction_id}: {bytes:02X?}");
        let mut rb = ReadBuffer::new(&bytes, ByteOrder::BigEndian);
        let rsp_adu = ModbusTcpAdu::parse(&mut rb, true, umas_request_function_key)?;
        verify_response_header(&req_hdr, &rsp_adu.header()).map_err(Error::UnexpectedResponse)?;
        Ok(rsp_adu.pdu)
    }

    /// Closes the transport and fails every pending request.
    pub async fn close(&self) -> Result<()> {
        if self.closing.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let res = self.writer.lock().await.close().await;
        self.transactions.fail_all();
        self.reader.abort();
        res.map_err(Into::into)
    }
}

impl Drop for TcpService {
    fn drop(&mut self) {
        self.transactions.fail_all();
        self.reader.abort();
    }
}

async fn read_frames(
    mut frames: FramedRead<ReadHalf<Box<dyn Transport>>, TcpCodec>,
    transactions: Arc<TransactionManager<TransactionId>>,
) {
    while let Some(frame) = frames.next().await {
        match frame {
            Ok(RawFrame { key, bytes }) => {
                if !transactions.resolve(key, bytes) {
                    log::warn!("Dropping response of unknown transaction {key}");
                }
            }
            Err(err) => {
                log::error!("Reading responses failed: {err}");
                break;
            }
        }
    }
    log::debug!("Connection closed by peer");
    transactions.fail_all();
}

/// Connects to the Modbus TCP server at `addr`.
#[cfg(feature = "tcp")]
pub async fn connect(
    addr: impl tokio::net::ToSocketAddrs,
    unit_id: UnitId,
) -> Result<TcpService> {
    let stream = tokio::net::TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(TcpService::new(stream, unit_id))
}
