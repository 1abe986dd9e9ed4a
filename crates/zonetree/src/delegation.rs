// Copyright 2015-2024 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Resolving one zone from its parent's servers and then from its own

use std::{
    collections::{BTreeMap, HashSet},
    net::IpAddr,
};

use hickory_proto::{op::ResponseCode, rr::RecordType};
use tracing::{debug, info, trace, warn};

use crate::{
    glue::GlueOrder,
    name,
    query::{DigQuery, DigRecord, DigResponse, QueryEngine},
    status::{calc_zone_status, ZoneStatus},
    zone::{normalize_indices, ParentNs, Zone, ZoneNs},
    zone_tree::{Walk, ZoneTree},
    Error,
};

/// How many recorded zone cuts are followed looking for the servers of a parent
const MAX_ZONE_CUT_HOPS: usize = 8;

impl<E: QueryEngine> ZoneTree<E> {
    /// Resolve a single name, whose parent must already be cached.
    ///
    /// A cached zone with status OK is returned as is, anything else is resolved
    /// again from scratch. The result is not stored, see
    /// [`ZoneTree::build_zone_cache`].
    pub async fn prep_zone(&self, name: &str) -> Result<Zone, Error> {
        let name = name::parse(name)?;
        self.prep_zone_in(&name.to_ascii(), &Walk::new()).await
    }

    /// Resolve a canonical name, finding the parent in the cache or in the walk
    pub(crate) async fn prep_zone_in(&self, name: &str, walk: &Walk) -> Result<Zone, Error> {
        let mut zone = Zone::placeholder(name);

        if let Some(cached) = self.lookup(&zone.name, walk) {
            if cached.status == ZoneStatus::Ok {
                debug!("{} already resolved", cached.name);
                return Ok(cached);
            }
            debug!("{} cached as {}, resolving again", cached.name, cached.status);
        }

        let (enclosing, servers) = self.parent_servers(&zone.parent_name, walk)?;
        if servers.is_empty() {
            warn!("no usable servers for {enclosing} to ask about {}", zone.name);
        }

        for (ip, server_name) in &servers {
            let child_status = self
                .query_parent_for_delegation(&mut zone, *ip, server_name)
                .await;
            if child_status == Some(ZoneStatus::Ok) && self.options.first_path {
                debug!("found a delegation for {} at {ip}, stopping", zone.name);
                break;
            }
        }

        zone.status = calc_zone_status(zone.parent_ns.iter().map(|pns| pns.child_status));
        if zone.status == ZoneStatus::NoConsensus {
            // the parent servers told us nothing usable, assume the parent's view
            if let Some(parent) = self.lookup(&zone.parent_name, walk) {
                debug!(
                    "no consensus on {}, inheriting {} from {}",
                    zone.name, parent.status, parent.name
                );
                zone.status = parent.status;
            }
        }

        if !zone.status.is_not_a_zone() {
            let answered = self.query_self_for_ns(&mut zone).await;
            if !answered && zone.status == ZoneStatus::Ok {
                debug!("no server of {} answered authoritatively", zone.name);
                zone.status = ZoneStatus::Incomplete;
            }
        }

        if !zone.status.is_not_a_zone() {
            zone.zone_cut = None;
        } else if zone.zone_cut.is_none() {
            zone.zone_cut = Some(enclosing);
        }

        info!("{} is {}", zone.name, zone.status);
        Ok(zone)
    }

    /// The servers to ask about children of `parent`.
    ///
    /// A parent that turned out not to be a zone has no servers of its own, its
    /// recorded zone cut points at the zone that answers for it instead. Returns
    /// the name of the zone the servers belong to along with the servers.
    fn parent_servers(
        &self,
        parent: &str,
        walk: &Walk,
    ) -> Result<(String, BTreeMap<IpAddr, String>), Error> {
        let mut zone = self
            .lookup(parent, walk)
            .ok_or_else(|| Error::ParentNotCached(parent.to_string()))?;

        for _ in 0..MAX_ZONE_CUT_HOPS {
            if !zone.status.is_not_a_zone() {
                let servers = zone.authoritative_servers(self.options.ip_family);
                return Ok((zone.name, servers));
            }

            let cut = match zone.zone_cut {
                Some(cut) if cut != zone.name => cut,
                _ => break,
            };

            trace!("{} is {}, following zone cut to {cut}", zone.name, zone.status);
            zone = self
                .lookup(&cut, walk)
                .ok_or_else(|| Error::ParentNotCached(cut.clone()))?;
        }

        Err(Error::ZoneCutLoop(parent.to_string()))
    }

    /// Ask one parent server for the delegation of the zone.
    ///
    /// Returns what the server said about the child, or `None` if it could not
    /// be reached. Unreachable servers leave no trace in the zone.
    async fn query_parent_for_delegation(
        &self,
        zone: &mut Zone,
        ip: IpAddr,
        server_name: &str,
    ) -> Option<ZoneStatus> {
        let query = DigQuery::new(&zone.name, RecordType::SOA, ip)
            .with_port(self.options.port)
            .with_dnssec_ok(true);

        let response = match self.engine.send(&query).await {
            Ok(response) => response,
            Err(e) => {
                warn!("delegation query {query} failed: {e}");
                return None;
            }
        };

        let pid = match zone.parent_ns.iter().position(|pns| pns.ip == Some(ip)) {
            Some(pid) => pid,
            None => {
                zone.parent_ns.push(ParentNs {
                    name: server_name.to_string(),
                    ip: Some(ip),
                    ..ParentNs::default()
                });
                zone.parent_ns.len() - 1
            }
        };

        let child_status = match response.rcode {
            ResponseCode::NoError => self.record_delegation(zone, pid, &response).await,
            ResponseCode::NXDomain => ZoneStatus::NonExistent,
            ResponseCode::Refused => ZoneStatus::Refused,
            rcode => {
                debug!("{query} answered {rcode}");
                ZoneStatus::Broken
            }
        };

        trace!("{server_name} ({ip}) says {} is {child_status}", zone.name);
        zone.parent_ns[pid].child_status = child_status;
        Some(child_status)
    }

    async fn record_delegation(
        &self,
        zone: &mut Zone,
        pid: usize,
        response: &DigResponse,
    ) -> ZoneStatus {
        let ip = zone.parent_ns[pid].ip;
        let name = zone.name.clone();

        for rr in response.authority.iter().filter(|rr| rr.name == name) {
            match rr.rtype {
                RecordType::DS => zone.parent_ns[pid].ds.push(rr.rdata_text()),
                RecordType::RRSIG => zone.parent_ns[pid].rrsig.push(rr.rdata_text()),
                _ => {}
            }
        }

        let mut ns_names = ns_set(response.authority_of(RecordType::NS), &zone.name);
        if ns_names.is_empty() {
            if response
                .answers_of(RecordType::SOA)
                .any(|rr| rr.name == zone.name)
            {
                // the parent server serves the child too, ask it for the NS set directly
                ns_names = self.fetch_ns_names(&zone.name, ip).await;
            } else if let Some(soa) = response.authority_of(RecordType::SOA).next() {
                debug!("{} is not a zone, the zone cut is at {}", zone.name, soa.name);
                zone.zone_cut = Some(soa.name.clone());
                return ZoneStatus::NotAZone;
            }
        }

        if ns_names.is_empty() {
            debug!("no delegation for {} in the answer", zone.name);
            return ZoneStatus::NoConsensus;
        }

        let mut indices = Vec::with_capacity(ns_names.len());
        for ns_name in &ns_names {
            let bailiwick = zone.known_ips(self.options.ip_family);
            indices.extend(
                self.intern_ns(zone, ns_name, response, &bailiwick, GlueOrder::CacheFirst)
                    .await,
            );
        }

        normalize_indices(&mut indices);
        zone.parent_ns[pid].ns = indices;
        ZoneStatus::Ok
    }

    async fn fetch_ns_names(&self, zone_name: &str, ip: Option<IpAddr>) -> Vec<String> {
        let Some(ip) = ip else {
            return Vec::new();
        };

        let query = DigQuery::new(zone_name, RecordType::NS, ip).with_port(self.options.port);
        match self.engine.send(&query).await {
            Ok(response) if response.rcode == ResponseCode::NoError => {
                ns_set(response.answers_of(RecordType::NS), zone_name)
            }
            Ok(response) => {
                debug!("{query} answered {}", response.rcode);
                Vec::new()
            }
            Err(e) => {
                warn!("{query} failed: {e}");
                Vec::new()
            }
        }
    }

    /// Ask the zone's own servers for its NS set.
    ///
    /// Walks the name server arena in order, including entries appended while
    /// walking it. Each entry gets the status its server reported. Returns true
    /// once any server answered authoritatively.
    pub(crate) async fn query_self_for_ns(&self, zone: &mut Zone) -> bool {
        let mut answered = false;
        let mut asked = HashSet::new();
        let mut idx = 0;

        while idx < zone.nsip.len() {
            let current = idx;
            idx += 1;

            let ip = zone.nsip[current].ip;
            if !self.options.ip_family.allows(ip) {
                trace!("skipping {ip}, address family not enabled");
                continue;
            }
            if !asked.insert(ip) {
                // same host under another name, it would answer the same
                let seen = zone.nsip[..current]
                    .iter()
                    .find(|nsip| nsip.ip == ip)
                    .map(|nsip| nsip.zone_status);
                if let Some(status) = seen {
                    zone.nsip[current].zone_status = status;
                }
                continue;
            }

            let query = DigQuery::new(&zone.name, RecordType::NS, ip)
                .with_port(self.options.port)
                .with_dnssec_ok(true);

            let response = match self.engine.send(&query).await {
                Ok(response) => response,
                Err(e) => {
                    warn!("{query} failed: {e}");
                    zone.nsip[current].zone_status = ZoneStatus::Unreachable;
                    continue;
                }
            };

            let status = match response.rcode {
                ResponseCode::NoError => ZoneStatus::Ok,
                ResponseCode::NXDomain => ZoneStatus::NonExistent,
                ResponseCode::Refused => ZoneStatus::Refused,
                rcode => {
                    debug!("{query} answered {rcode}");
                    ZoneStatus::Broken
                }
            };
            zone.nsip[current].zone_status = status;

            if status != ZoneStatus::Ok {
                continue;
            }
            if !response.authoritative {
                debug!("{query} answered without the authoritative flag");
                continue;
            }

            self.record_self_answer(zone, current, &response).await;
            if !answered {
                answered = true;
                zone.status = ZoneStatus::Ok;
            }

            if self.options.first_path {
                debug!("{} answered for {}, stopping", zone.nsip[current].name, zone.name);
                break;
            }
        }

        answered
    }

    async fn record_self_answer(&self, zone: &mut Zone, self_idx: usize, response: &DigResponse) {
        let mut zns = ZoneNs {
            self_idx,
            ..ZoneNs::default()
        };

        let owned = response
            .answer
            .iter()
            .chain(&response.authority)
            .chain(&response.additional)
            .filter(|rr| rr.name == zone.name);
        for rr in owned {
            match rr.rtype {
                RecordType::SOA if zns.soa.is_none() => zns.soa = Some(rr.rdata_text()),
                RecordType::DNSKEY => zns.dnskey.push(rr.rdata_text()),
                RecordType::RRSIG => zns.rrsig.push(rr.rdata_text()),
                _ => {}
            }
        }

        // the answering server first, it is known to serve the zone
        let server_ip = zone.nsip[self_idx].ip;
        let mut bailiwick = vec![server_ip];
        bailiwick.extend(
            zone.known_ips(self.options.ip_family)
                .into_iter()
                .filter(|ip| *ip != server_ip),
        );

        // the zone's own servers outrank whatever the server cache picked up elsewhere
        for ns_name in ns_set(response.answers_of(RecordType::NS), &zone.name) {
            let indices = self
                .intern_ns(zone, &ns_name, response, &bailiwick, GlueOrder::BailiwickFirst)
                .await;
            zns.ns.extend(indices);
        }

        normalize_indices(&mut zns.ns);
        zone.zone_ns.push(zns);
    }

    /// Arena positions for every known address of the name server.
    ///
    /// Glue from the response is used first, then addresses already in the
    /// arena, and only then the glue completion chain in the given order.
    async fn intern_ns(
        &self,
        zone: &mut Zone,
        ns_name: &str,
        response: &DigResponse,
        bailiwick: &[IpAddr],
        order: GlueOrder,
    ) -> Vec<usize> {
        let glue = response
            .glue()
            .filter(|(owner, _)| *owner == ns_name)
            .map(|(_, ip)| ip)
            .collect::<Vec<_>>();
        if !glue.is_empty() {
            return glue
                .into_iter()
                .map(|ip| zone.intern_nsip(ns_name, ip))
                .collect();
        }

        let known = zone.nsip_indices_for(ns_name);
        if !known.is_empty() {
            return known;
        }

        let addresses = self
            .complete_glue(ns_name, &zone.name, bailiwick, order)
            .await;
        if addresses.is_empty() {
            warn!("no address found for {ns_name}, a name server of {}", zone.name);
        }

        addresses
            .into_iter()
            .map(|ip| zone.intern_nsip(ns_name, ip))
            .collect()
    }
}

/// Unique name server host names from NS records owned by the zone, in order
fn ns_set<'a>(records: impl Iterator<Item = &'a DigRecord>, zone: &str) -> Vec<String> {
    let mut names = Vec::new();
    for name in records
        .filter(|rr| rr.name == zone)
        .filter_map(|rr| rr.ns_name())
    {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}
