// Copyright 2015-2024 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::net::IpAddr;

use hickory_proto::{op::ResponseCode, rr::RecordType};
use tracing::{debug, trace, warn};

use crate::{
    cache::Map,
    name::in_bailiwick,
    query::{DigQuery, QueryEngine},
    zone::Server,
    zone_tree::ZoneTree,
};

/// Where addresses for a name server without glue are looked for first
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum GlueOrder {
    /// Server cache, then the zone's servers. Used with the parent's delegation.
    CacheFirst,
    /// The zone's servers, then the server cache. Used once the zone answered itself.
    BailiwickFirst,
}

impl<E: QueryEngine> ZoneTree<E> {
    /// Find addresses for a name server that came without glue.
    ///
    /// A name inside the zone is looked up on the zone's own servers, in the order
    /// given, either before or after consulting the server cache. Anything still
    /// unresolved goes to one of the external resolvers. Looked up addresses are
    /// merged into the server cache and returned.
    pub(crate) async fn complete_glue(
        &self,
        ns_name: &str,
        zone_name: &str,
        bailiwick_servers: &[IpAddr],
        order: GlueOrder,
    ) -> Vec<IpAddr> {
        let mut addresses = Vec::new();
        if order == GlueOrder::BailiwickFirst {
            addresses = self
                .lookup_in_bailiwick(ns_name, zone_name, bailiwick_servers)
                .await;
        }

        if addresses.is_empty() {
            if let Some(server) = self.servers.get(ns_name) {
                if !server.ip.is_empty() {
                    trace!("{ns_name} found in the server cache");
                    return server.ip;
                }
            }
        }

        if addresses.is_empty() && order == GlueOrder::CacheFirst {
            addresses = self
                .lookup_in_bailiwick(ns_name, zone_name, bailiwick_servers)
                .await;
        }

        if addresses.is_empty() {
            let resolver = self.options.pick_resolver();
            addresses = self.lookup_addresses(ns_name, resolver, true).await;
            if !addresses.is_empty() {
                debug!("{ns_name} resolved through {resolver}");
            }
        }

        if addresses.is_empty() {
            return addresses;
        }

        self.servers.upsert(
            ns_name,
            Server {
                ip: addresses.clone(),
            },
            |existing, mut new| {
                if let Some(existing) = existing {
                    for ip in &existing.ip {
                        if !new.ip.contains(ip) {
                            new.ip.push(*ip);
                        }
                    }
                }
                new
            },
        );
        addresses
    }

    async fn lookup_in_bailiwick(
        &self,
        ns_name: &str,
        zone_name: &str,
        servers: &[IpAddr],
    ) -> Vec<IpAddr> {
        if !in_bailiwick(ns_name, zone_name) {
            return Vec::new();
        }

        for server in servers {
            let addresses = self.lookup_addresses(ns_name, *server, false).await;
            if !addresses.is_empty() {
                debug!("{ns_name} resolved in bailiwick at {server}");
                return addresses;
            }
        }

        Vec::new()
    }

    /// A and AAAA records for the name from one server
    async fn lookup_addresses(
        &self,
        name: &str,
        server: IpAddr,
        recursion_desired: bool,
    ) -> Vec<IpAddr> {
        let mut addresses = Vec::new();

        for qtype in [RecordType::A, RecordType::AAAA] {
            let query = DigQuery::new(name, qtype, server)
                .with_port(self.options.port)
                .with_recursion_desired(recursion_desired);

            match self.engine.send(&query).await {
                Ok(response) if response.rcode == ResponseCode::NoError => {
                    addresses.extend(
                        response
                            .answers_of(qtype)
                            .filter_map(|rr| rr.ip_addr())
                            .filter(|ip| !addresses.contains(ip))
                            .collect::<Vec<_>>(),
                    );
                }
                Ok(response) => debug!("{query} answered {}", response.rcode),
                Err(e) => warn!("{query} failed: {e}"),
            }
        }

        addresses
    }
}
