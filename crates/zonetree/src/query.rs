// Copyright 2015-2024 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The contract between the resolver and whatever sends DNS queries
//!
//! The resolver never looks at wire data. It hands a [`DigQuery`] to a
//! [`QueryEngine`] and gets back a [`DigResponse`] where every record has been
//! flattened to its owner, type, TTL and presentation format fields.

use std::{fmt, net::IpAddr, sync::Arc};

use async_trait::async_trait;
use hickory_proto::{op::ResponseCode, rr::RecordType};

use crate::{name::to_fqdn, Error};

/// Transport protocol for a query
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Transport {
    /// UDP, retried over TCP when the answer is truncated
    #[default]
    Udp,
    /// TCP only
    Tcp,
}

/// One query to one server
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DigQuery {
    /// Name to query, fully qualified
    pub qname: String,
    /// Type to query
    pub qtype: RecordType,
    /// Server to send the query to
    pub server: IpAddr,
    /// Port on the server
    pub port: u16,
    /// Transport to use
    pub transport: Transport,
    /// Set the DNSSEC OK bit
    pub dnssec_ok: bool,
    /// Set the recursion desired bit
    pub recursion_desired: bool,
}

impl DigQuery {
    /// A non-recursive query for the name and type, sent to the server on port 53
    pub fn new(qname: &str, qtype: RecordType, server: IpAddr) -> Self {
        Self {
            qname: to_fqdn(qname),
            qtype,
            server,
            port: 53,
            transport: Transport::default(),
            dnssec_ok: false,
            recursion_desired: false,
        }
    }

    /// Set the port the server listens on
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the DNSSEC OK bit
    pub fn with_dnssec_ok(mut self, dnssec_ok: bool) -> Self {
        self.dnssec_ok = dnssec_ok;
        self
    }

    /// Set the recursion desired bit
    pub fn with_recursion_desired(mut self, recursion_desired: bool) -> Self {
        self.recursion_desired = recursion_desired;
        self
    }

    /// Set the transport
    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    /// Returns true if the server is reached over IPv6
    pub fn is_ipv6(&self) -> bool {
        self.server.is_ipv6()
    }
}

impl fmt::Display for DigQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} @{} port {}",
            self.qname, self.qtype, self.server, self.port
        )
    }
}

/// A record in presentation form
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DigRecord {
    /// Owner name, fully qualified and lower case
    pub name: String,
    /// Record type
    pub rtype: RecordType,
    /// Time to live
    pub ttl: u32,
    /// The fields of the record data, in presentation format
    pub rdata: Vec<String>,
}

impl DigRecord {
    /// Build a record, splitting the presentation format data on whitespace
    pub fn new(name: &str, rtype: RecordType, ttl: u32, rdata: &str) -> Self {
        Self {
            name: to_fqdn(name),
            rtype,
            ttl,
            rdata: rdata.split_whitespace().map(str::to_string).collect(),
        }
    }

    /// The record data as one space separated string
    pub fn rdata_text(&self) -> String {
        self.rdata.join(" ")
    }

    /// The first field of the record data, i.e. the target of an NS record
    pub fn first_field(&self) -> Option<&str> {
        self.rdata.first().map(String::as_str)
    }

    /// The address of an A or AAAA record
    pub fn ip_addr(&self) -> Option<IpAddr> {
        match self.rtype {
            RecordType::A | RecordType::AAAA => self.first_field()?.parse().ok(),
            _ => None,
        }
    }

    /// The name server host of an NS record, normalized
    pub fn ns_name(&self) -> Option<String> {
        match self.rtype {
            RecordType::NS => self.first_field().map(to_fqdn),
            _ => None,
        }
    }
}

impl fmt::Display for DigRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.name,
            self.ttl,
            self.rtype,
            self.rdata_text()
        )
    }
}

/// A response, with every section normalized
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DigResponse {
    /// Response code
    pub rcode: ResponseCode,
    /// Authoritative answer
    pub authoritative: bool,
    /// Truncated
    pub truncated: bool,
    /// Recursion available
    pub recursion_available: bool,
    /// Authentic data
    pub authentic_data: bool,
    /// Answer section
    pub answer: Vec<DigRecord>,
    /// Authority section
    pub authority: Vec<DigRecord>,
    /// Additional section, without the OPT pseudo record
    pub additional: Vec<DigRecord>,
}

impl DigResponse {
    /// An empty response with the response code
    pub fn new(rcode: ResponseCode) -> Self {
        Self {
            rcode,
            authoritative: false,
            truncated: false,
            recursion_available: false,
            authentic_data: false,
            answer: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// Records of the type in the answer section
    pub fn answers_of(&self, rtype: RecordType) -> impl Iterator<Item = &DigRecord> {
        self.answer.iter().filter(move |rr| rr.rtype == rtype)
    }

    /// Records of the type in the authority section
    pub fn authority_of(&self, rtype: RecordType) -> impl Iterator<Item = &DigRecord> {
        self.authority.iter().filter(move |rr| rr.rtype == rtype)
    }

    /// A and AAAA records in the additional section
    pub fn glue(&self) -> impl Iterator<Item = (&str, IpAddr)> {
        self.additional
            .iter()
            .filter_map(|rr| rr.ip_addr().map(|ip| (rr.name.as_str(), ip)))
    }
}

/// Sends one query and returns the normalized response.
///
/// Transport failures are errors. Negative answers such as NXDOMAIN or REFUSED
/// are not, they come back as responses with the matching code.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Send the query to the server it names
    async fn send(&self, query: &DigQuery) -> Result<DigResponse, Error>;
}

#[async_trait]
impl<E: QueryEngine + ?Sized> QueryEngine for Arc<E> {
    async fn send(&self, query: &DigQuery) -> Result<DigResponse, Error> {
        (**self).send(query).await
    }
}
