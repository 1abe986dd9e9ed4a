// Copyright 2015-2024 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The zone record and its name server arena

use std::{collections::BTreeMap, fs, net::IpAddr, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    config::IpFamily,
    name::{self, to_fqdn},
    status::ZoneStatus,
    Error,
};

/// Everything learned about one domain name.
///
/// `nsip` is an append-only arena of unique name server name and address pairs.
/// The `zone_ns` and `parent_ns` entries refer to name servers by their position
/// in that arena, and positions never change once assigned.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Zone {
    /// Fully qualified name of the zone, also its cache key
    #[serde(rename = "Name")]
    pub name: String,
    /// The name with its leftmost label removed
    #[serde(rename = "ParentName")]
    pub parent_name: String,
    /// One entry per server that answered authoritatively for the zone
    #[serde(rename = "NS")]
    pub zone_ns: Vec<ZoneNs>,
    /// One entry per parent server that answered the delegation query
    #[serde(rename = "ParentNS")]
    pub parent_ns: Vec<ParentNs>,
    /// All name server name and address pairs seen for this zone
    #[serde(rename = "NSIP")]
    pub nsip: Vec<NsIp>,
    /// The nearest enclosing zone, if this name is not a zone of its own
    #[serde(rename = "ZoneCut", skip_serializing_if = "Option::is_none")]
    pub zone_cut: Option<String>,
    /// Overall classification of the zone
    #[serde(rename = "Status")]
    pub status: ZoneStatus,
}

/// The view of the zone from one of its own servers
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneNs {
    /// Index of the answering server in the zone's `nsip`
    #[serde(rename = "Self")]
    pub self_idx: usize,
    /// Sorted indices of the NS set the server reported
    #[serde(rename = "NS")]
    pub ns: Vec<usize>,
    /// SOA record text, if one was seen
    #[serde(rename = "SOA", skip_serializing_if = "Option::is_none")]
    pub soa: Option<String>,
    /// DNSKEY record text
    #[serde(rename = "DNSKEY")]
    pub dnskey: Vec<String>,
    /// RRSIG record text
    #[serde(rename = "RRSIG")]
    pub rrsig: Vec<String>,
}

/// The view of the zone from one of the parent's servers
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParentNs {
    /// Name of the parent server
    #[serde(rename = "Name")]
    pub name: String,
    /// Address the parent server was queried on
    #[serde(rename = "IP")]
    pub ip: Option<IpAddr>,
    /// Sorted indices of the delegated NS set
    #[serde(rename = "NS")]
    pub ns: Vec<usize>,
    /// DS record text
    #[serde(rename = "DS")]
    pub ds: Vec<String>,
    /// RRSIG record text
    #[serde(rename = "RRSIG")]
    pub rrsig: Vec<String>,
    /// What this parent server said about the child
    #[serde(rename = "ChildStatus")]
    pub child_status: ZoneStatus,
}

/// A name server name and one of its addresses
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NsIp {
    /// Host name of the server
    #[serde(rename = "Name")]
    pub name: String,
    /// One address of the server
    #[serde(rename = "IP")]
    pub ip: IpAddr,
    /// Status observed when querying the server for the zone
    #[serde(rename = "ZoneStatus", default)]
    pub zone_status: ZoneStatus,
}

/// Known addresses of a name server host, shared by every zone it serves
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Server {
    /// Addresses of the server
    #[serde(rename = "IP")]
    pub ip: Vec<IpAddr>,
}

impl Zone {
    /// A new placeholder for the name, not resolved yet
    pub fn placeholder(name: &str) -> Self {
        let name = to_fqdn(name);
        Self {
            parent_name: name::parent_of(&name),
            name,
            status: ZoneStatus::Placeholder,
            ..Self::default()
        }
    }

    /// A zone that could not be resolved at all
    pub fn broken(name: &str) -> Self {
        Self {
            status: ZoneStatus::Broken,
            ..Self::placeholder(name)
        }
    }

    /// Parse a zone document
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a zone document from a file
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Render the zone as a single line of JSON
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    /// Render the zone as indented JSON
    pub fn to_pretty_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Position of the name server pair in the arena, if known
    pub fn nsip_index(&self, name: &str, ip: IpAddr) -> Option<usize> {
        self.nsip
            .iter()
            .position(|nsip| nsip.name == name && nsip.ip == ip)
    }

    /// Position of the name server pair in the arena, appending it if it is new
    pub fn intern_nsip(&mut self, name: &str, ip: IpAddr) -> usize {
        let name = to_fqdn(name);
        if let Some(idx) = self.nsip_index(&name, ip) {
            return idx;
        }

        self.nsip.push(NsIp {
            name,
            ip,
            zone_status: ZoneStatus::Placeholder,
        });
        self.nsip.len() - 1
    }

    /// Positions of every arena entry for the name server host
    pub fn nsip_indices_for(&self, name: &str) -> Vec<usize> {
        self.nsip
            .iter()
            .enumerate()
            .filter(|(_, nsip)| nsip.name == name)
            .map(|(idx, _)| idx)
            .collect()
    }

    /// All addresses in the arena that match the address family
    pub fn known_ips(&self, family: IpFamily) -> Vec<IpAddr> {
        let mut ips = Vec::new();
        for nsip in &self.nsip {
            if family.allows(nsip.ip) && !ips.contains(&nsip.ip) {
                ips.push(nsip.ip);
            }
        }
        ips
    }

    /// The servers that answered authoritatively for the zone, keyed by address.
    ///
    /// These are the servers children of the zone get their delegation from.
    pub fn authoritative_servers(&self, family: IpFamily) -> BTreeMap<IpAddr, String> {
        self.zone_ns
            .iter()
            .filter_map(|zns| self.nsip.get(zns.self_idx))
            .filter(|nsip| family.allows(nsip.ip))
            .map(|nsip| (nsip.ip, nsip.name.clone()))
            .collect()
    }

    /// Returns true if every stored index points into the arena
    pub fn indices_valid(&self) -> bool {
        let len = self.nsip.len();
        self.zone_ns
            .iter()
            .all(|zns| zns.self_idx < len && zns.ns.iter().all(|idx| *idx < len))
            && self
                .parent_ns
                .iter()
                .all(|pns| pns.ns.iter().all(|idx| *idx < len))
    }
}

/// Sort and de-duplicate a set of arena indices
pub(crate) fn normalize_indices(indices: &mut Vec<usize>) {
    indices.sort_unstable();
    indices.dedup();
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use super::*;

    const V4: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1));
    const V6: IpAddr = IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1));

    #[test]
    fn test_placeholder() {
        let zone = Zone::placeholder("WWW.Example.com");
        assert_eq!(zone.name, "www.example.com.");
        assert_eq!(zone.parent_name, "example.com.");
        assert_eq!(zone.status, ZoneStatus::Placeholder);
        assert_eq!(Zone::broken("com").status, ZoneStatus::Broken);
    }

    #[test]
    fn test_intern_nsip_is_unique() {
        let mut zone = Zone::placeholder("example.com.");
        let first = zone.intern_nsip("ns1.example.com.", V4);
        let second = zone.intern_nsip("ns1.example.com.", V6);
        assert_eq!(zone.intern_nsip("NS1.example.com", V4), first);
        assert_eq!(zone.intern_nsip("ns1.example.com.", V6), second);
        assert_eq!(zone.nsip.len(), 2);
        assert_eq!(zone.nsip_indices_for("ns1.example.com."), vec![0, 1]);
    }

    #[test]
    fn test_authoritative_servers_filter() {
        let mut zone = Zone::placeholder("example.com.");
        let v4 = zone.intern_nsip("ns1.example.com.", V4);
        let v6 = zone.intern_nsip("ns1.example.com.", V6);
        zone.intern_nsip("ns2.example.com.", IpAddr::V4(Ipv4Addr::new(192, 0, 2, 2)));
        zone.zone_ns.push(ZoneNs {
            self_idx: v4,
            ..ZoneNs::default()
        });
        zone.zone_ns.push(ZoneNs {
            self_idx: v6,
            ..ZoneNs::default()
        });

        assert_eq!(zone.authoritative_servers(IpFamily::Both).len(), 2);
        assert_eq!(
            zone.authoritative_servers(IpFamily::V4).into_iter().collect::<Vec<_>>(),
            vec![(V4, "ns1.example.com.".to_string())]
        );
        assert_eq!(zone.authoritative_servers(IpFamily::V6).len(), 1);
        assert_eq!(zone.known_ips(IpFamily::V4).len(), 2);
    }

    #[test]
    fn test_json_document() {
        let json = r#"{
            "Name": ".",
            "NS": [{"Self": 0, "NS": [0]}],
            "NSIP": [{"Name": "a.root-servers.net.", "IP": "198.41.0.4"}],
            "Status": 200
        }"#;

        let zone = Zone::from_json(json).unwrap();
        assert_eq!(zone.status, ZoneStatus::Ok);
        assert_eq!(zone.nsip[0].zone_status, ZoneStatus::Placeholder);
        assert!(zone.indices_valid());

        let rendered = zone.to_json().unwrap();
        assert!(rendered.contains(r#""Status":200"#));
        assert!(!rendered.contains("ZoneCut"));
        assert_eq!(Zone::from_json(&rendered).unwrap(), zone);
        assert!(Zone::from_json("{ not json").is_err());
    }

    #[test]
    fn test_indices_valid() {
        let mut zone = Zone::placeholder("example.com.");
        zone.intern_nsip("ns1.example.com.", V4);
        zone.parent_ns.push(ParentNs {
            ns: vec![0, 1],
            ..ParentNs::default()
        });
        assert!(!zone.indices_valid());
    }
}
