use std::{
    collections::{HashMap, HashSet},
    net::IpAddr,
    sync::Once,
};

use async_trait::async_trait;
use hickory_proto::{op::ResponseCode, rr::RecordType};
use parking_lot::Mutex;
use tracing::{error, info};
use zonetree::{name::to_fqdn, DigQuery, DigRecord, DigResponse, Error, QueryEngine};

/// Registers a global default tracing subscriber when called for the first time. This is intended
/// for use in tests.
pub fn subscribe() {
    static INSTALL_TRACING_SUBSCRIBER: Once = Once::new();
    INSTALL_TRACING_SUBSCRIBER.call_once(|| {
        let subscriber = tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .finish();
        tracing::subscriber::set_global_default(subscriber).unwrap();
    });
}

/// A mock response to be returned by the [`MockEngine`].
#[derive(Clone)]
pub struct MockRecord {
    /// The name server IP.  This is matched by the [`MockEngine`] against the destination address
    /// when deciding which response to return to the client.
    ns: IpAddr,
    /// The query name to match against
    query_name: String,
    /// Query type
    query_type: RecordType,
    /// record-level TTL
    ttl: u32,
    /// record name
    record_name: String,
    /// record type
    record_type: RecordType,
    /// record data, in presentation format
    record_data: String,
    /// The response section to place the record in
    section: MockResponseSection,
}

/// The section to place the record
#[derive(Clone, Copy)]
pub enum MockResponseSection {
    Answer,
    Additional,
    Authority,
}

/// Convenience functions for [`MockRecord`].  These should create records of the
/// specified type with a sensible TTL and section defaults.
impl MockRecord {
    fn new(server: IpAddr, rr_name: &str, record_type: RecordType, record_data: String) -> Self {
        let rr_name = to_fqdn(rr_name);
        Self {
            ns: server,
            ttl: 3600,
            query_name: rr_name.clone(),
            query_type: record_type,
            record_name: rr_name,
            record_type,
            record_data,
            section: MockResponseSection::Answer,
        }
    }

    pub fn a(server: IpAddr, rr_name: &str, record_data: IpAddr) -> Self {
        assert!(record_data.is_ipv4(), "a record does not support v6 address");
        Self::new(server, rr_name, RecordType::A, record_data.to_string())
    }

    pub fn aaaa(server: IpAddr, rr_name: &str, record_data: IpAddr) -> Self {
        assert!(record_data.is_ipv6(), "aaaa record does not support v4 address");
        Self::new(server, rr_name, RecordType::AAAA, record_data.to_string())
    }

    pub fn ns(server: IpAddr, rr_name: &str, ns_name: &str) -> Self {
        Self::new(server, rr_name, RecordType::NS, to_fqdn(ns_name))
            .with_section(MockResponseSection::Authority)
    }

    pub fn soa(server: IpAddr, rr_name: &str, mname: &str, rname: &str) -> Self {
        Self::new(
            server,
            rr_name,
            RecordType::SOA,
            format!("{} {} 1 1 1 1 1", to_fqdn(mname), to_fqdn(rname)),
        )
        .with_section(MockResponseSection::Authority)
        .with_ttl(0)
    }

    pub fn ds(server: IpAddr, rr_name: &str, digest: &str) -> Self {
        Self::new(server, rr_name, RecordType::DS, digest.to_string())
            .with_section(MockResponseSection::Authority)
    }

    pub fn dnskey(server: IpAddr, rr_name: &str, key: &str) -> Self {
        Self::new(server, rr_name, RecordType::DNSKEY, key.to_string())
    }

    pub fn with_query_name(mut self, query_name: &str) -> Self {
        self.query_name = to_fqdn(query_name);
        self
    }

    pub fn with_query_type(mut self, query_type: RecordType) -> Self {
        self.query_type = query_type;
        self
    }

    pub fn with_section(mut self, section: MockResponseSection) -> Self {
        self.section = section;
        self
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Type alias for a closure that can modify the engine on a per-test basis.
pub type MockMutator = Box<dyn Fn(IpAddr, &DigQuery, &mut DigResponse) + Send + Sync + 'static>;

type Key = (String, RecordType);

/// Engine that stands in for multiple authoritative name servers, with specific canned responses.
pub struct MockEngine {
    responses: HashMap<IpAddr, HashMap<Key, DigResponse>>,
    unreachable: HashSet<IpAddr>,
    mutate: MockMutator,
    queries: Mutex<Vec<DigQuery>>,
}

impl MockEngine {
    /// Return a [`MockEngine`] that will respond to queries with [`MockRecord`] answers
    /// from responses.
    pub fn new(responses: Vec<MockRecord>) -> Self {
        let mut hashed_responses = HashMap::<IpAddr, HashMap<Key, DigResponse>>::new();
        for response in responses {
            let message = hashed_responses
                .entry(response.ns)
                .or_default()
                .entry((response.query_name.clone(), response.query_type))
                .or_insert_with(|| authoritative(ResponseCode::NoError));

            let record = DigRecord::new(
                &response.record_name,
                response.record_type,
                response.ttl,
                &response.record_data,
            );

            match response.section {
                MockResponseSection::Additional => message.additional.push(record),
                MockResponseSection::Answer => message.answer.push(record),
                MockResponseSection::Authority => message.authority.push(record),
            };
        }

        Self {
            responses: hashed_responses,
            unreachable: HashSet::new(),
            mutate: Box::new(|_destination: IpAddr, _query: &DigQuery, _response: &mut DigResponse| {}),
            queries: Mutex::new(vec![]),
        }
    }

    /// Answer the query with a bare response code.
    pub fn with_response_code(
        mut self,
        server: IpAddr,
        query_name: &str,
        query_type: RecordType,
        rcode: ResponseCode,
    ) -> Self {
        self.responses
            .entry(server)
            .or_default()
            .entry((to_fqdn(query_name), query_type))
            .or_insert_with(|| authoritative(rcode))
            .rcode = rcode;
        self
    }

    /// Every query to the server fails as if it timed out.
    pub fn with_unreachable(mut self, server: IpAddr) -> Self {
        self.unreachable.insert(server);
        self
    }

    pub fn with_mutation(mut self, mutate: MockMutator) -> Self {
        self.mutate = mutate;
        self
    }

    /// Every query sent so far, in order.
    pub fn queries(&self) -> Vec<DigQuery> {
        self.queries.lock().clone()
    }

    pub fn count_queries(&self, ip: IpAddr, query_name: &str, query_type: RecordType) -> usize {
        let query_name = to_fqdn(query_name);
        self.queries()
            .iter()
            .filter(|query| {
                query.server == ip && query.qname == query_name && query.qtype == query_type
            })
            .count()
    }
}

#[async_trait]
impl QueryEngine for MockEngine {
    async fn send(&self, query: &DigQuery) -> Result<DigResponse, Error> {
        self.queries.lock().push(query.clone());

        let destination = query.server;
        if self.unreachable.contains(&destination) {
            info!(%destination, %query, "dropping request");
            return Err(Error::Timeout);
        }

        let Some(server_responses) = self.responses.get(&destination) else {
            error!(%destination, "unexpected destination IP address");
            return Err(Error::Timeout);
        };
        info!(%destination, %query, "handling request");

        let mut response = match server_responses.get(&(query.qname.clone(), query.qtype)) {
            Some(response) => response.clone(),
            None => {
                error!(%query, "unexpected query");
                authoritative(ResponseCode::ServFail)
            }
        };

        (self.mutate)(destination, query, &mut response);
        Ok(response)
    }
}

fn authoritative(rcode: ResponseCode) -> DigResponse {
    let mut response = DigResponse::new(rcode);
    response.authoritative = true;
    response
}
