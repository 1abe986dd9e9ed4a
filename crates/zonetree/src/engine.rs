// Copyright 2015-2024 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A [`QueryEngine`] that talks to real name servers over UDP and TCP

use std::{
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    time::Duration,
};

use async_trait::async_trait;
use hickory_proto::{
    op::{Edns, Message, MessageType, OpCode, Query},
    rr::{Name, Record, RecordType},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpStream, UdpSocket},
    time::{timeout, timeout_at, Instant},
};
use tracing::{debug, trace, warn};

use crate::{
    query::{DigQuery, DigRecord, DigResponse, QueryEngine, Transport},
    Error,
};

/// EDNS payload size advertised on every query
const UDP_PAYLOAD: u16 = 1232;

/// Sends each query as a single UDP datagram, retrying over TCP when the answer
/// is truncated.
///
/// Connecting, sending and receiving are each bounded by the timeout. Datagrams
/// that do not answer the query are dropped while waiting. A failed query is
/// never retried against the same server.
#[derive(Clone, Copy, Debug)]
pub struct NetworkEngine {
    timeout: Duration,
}

impl NetworkEngine {
    /// Construct an engine with the per operation timeout
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn build_message(query: &DigQuery) -> Result<Message, Error> {
        let name = Name::from_ascii(&query.qname)?;

        let mut edns = Edns::new();
        edns.set_max_payload(UDP_PAYLOAD);
        edns.set_dnssec_ok(query.dnssec_ok);

        let mut message = Message::new();
        message
            .set_id(rand::random::<u16>())
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(query.recursion_desired)
            .add_query(Query::query(name, query.qtype));
        message.set_edns(edns);

        Ok(message)
    }

    async fn exchange_udp(&self, server: SocketAddr, request: &Message) -> Result<Message, Error> {
        let bind_addr = match server {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
        };

        let socket = UdpSocket::bind(bind_addr).await?;
        timeout(self.timeout, socket.connect(server)).await??;
        timeout(self.timeout, socket.send(&request.to_vec()?)).await??;

        let deadline = Instant::now() + self.timeout;
        let mut buf = vec![0; u16::MAX as usize];
        loop {
            let len = timeout_at(deadline, socket.recv(&mut buf)).await??;
            let response = match Message::from_vec(&buf[..len]) {
                Ok(response) => response,
                Err(e) => {
                    warn!(
                        "dropped malformed message from {server} waiting for id: {} err: {e}",
                        request.id()
                    );
                    continue;
                }
            };

            match check_response(request, &response) {
                Ok(()) => return Ok(response),
                Err(e) => warn!("dropped message from {server}: {e}"),
            }
        }
    }

    async fn exchange_tcp(&self, server: SocketAddr, request: &Message) -> Result<Message, Error> {
        let request_bytes = request.to_vec()?;
        let len = u16::try_from(request_bytes.len())
            .map_err(|_| Error::from("query does not fit in a TCP frame"))?;

        let mut stream = timeout(self.timeout, TcpStream::connect(server)).await??;

        let mut framed = Vec::with_capacity(request_bytes.len() + 2);
        framed.extend_from_slice(&len.to_be_bytes());
        framed.extend_from_slice(&request_bytes);
        timeout(self.timeout, stream.write_all(&framed)).await??;

        let mut len = [0; 2];
        timeout(self.timeout, stream.read_exact(&mut len)).await??;
        let mut buf = vec![0; u16::from_be_bytes(len) as usize];
        timeout(self.timeout, stream.read_exact(&mut buf)).await??;

        let response = Message::from_vec(&buf)?;
        check_response(request, &response)?;
        Ok(response)
    }
}

/// The response must carry the id and the question of the request
fn check_response(request: &Message, response: &Message) -> Result<(), Error> {
    if response.id() != request.id() {
        return Err(Error::IdMismatch {
            expected: request.id(),
            received: response.id(),
        });
    }

    if response.queries() != request.queries() {
        return Err(Error::Msg(format!(
            "response {} does not answer the question of the query",
            response.id()
        )));
    }

    Ok(())
}

impl Default for NetworkEngine {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl QueryEngine for NetworkEngine {
    async fn send(&self, query: &DigQuery) -> Result<DigResponse, Error> {
        let request = Self::build_message(query)?;
        let server = SocketAddr::new(query.server, query.port);
        trace!("sending {query} with id {}", request.id());

        let mut response = match query.transport {
            Transport::Udp => self.exchange_udp(server, &request).await?,
            Transport::Tcp => self.exchange_tcp(server, &request).await?,
        };

        if response.truncated() && query.transport == Transport::Udp {
            debug!("{query} truncated, retrying over TCP");
            response = self.exchange_tcp(server, &request).await?;
        }

        Ok(normalize(&response))
    }
}

fn normalize(message: &Message) -> DigResponse {
    DigResponse {
        rcode: message.response_code(),
        authoritative: message.authoritative(),
        truncated: message.truncated(),
        recursion_available: message.recursion_available(),
        authentic_data: message.authentic_data(),
        answer: section(message.answers()),
        authority: section(message.name_servers()),
        additional: section(message.additionals()),
    }
}

fn section(records: &[Record]) -> Vec<DigRecord> {
    records
        .iter()
        .filter(|record| record.record_type() != RecordType::OPT)
        .map(|record| DigRecord {
            name: record.name().to_lowercase().to_ascii(),
            rtype: record.record_type(),
            ttl: record.ttl(),
            rdata: record
                .data()
                .map(|rdata| {
                    rdata
                        .to_string()
                        .split_whitespace()
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        })
        .collect()
}
