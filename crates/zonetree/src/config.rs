// Copyright 2015-2024 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Configuration consumed by the delegation resolver

use std::{
    net::{IpAddr, Ipv4Addr},
    time::Duration,
};

use rand::seq::SliceRandom;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Which address families may be used to reach name servers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpFamily {
    /// Only query IPv4 addresses
    #[default]
    V4,
    /// Only query IPv6 addresses
    V6,
    /// Query both
    Both,
}

impl IpFamily {
    /// Returns true if the address may be queried under this policy
    pub fn allows(self, ip: IpAddr) -> bool {
        match self {
            Self::V4 => ip.is_ipv4(),
            Self::V6 => ip.is_ipv6(),
            Self::Both => true,
        }
    }
}

/// Backend used for the zone and server caches
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Sharded concurrent map
    #[default]
    Concurrent,
    /// A single map behind a lock
    Simple,
    /// Stores nothing, every lookup misses
    Noop,
}

/// Options for the resolver, read-only once the `ZoneTree` is built.
///
/// The query minimization options mirror how the name server under test is
/// expected to be walked. Only `first_path` changes how many servers get asked,
/// the label sequence, strict and subtract flags are carried for consumers that
/// report the running configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverOptions {
    /// Address families to query
    pub ip_family: IpFamily,
    /// Recursive resolvers used to find addresses for out of bailiwick name servers
    pub resolvers: Vec<IpAddr>,
    /// Number of labels to add at each step of a minimized walk
    pub qmin_label_sequence: Vec<u8>,
    /// Count down the label sequence on cache hits
    pub qmin_subtract_cache: bool,
    /// Abort on failure rather than falling back to the full name
    pub qmin_strict: bool,
    /// Stop asking further servers once one usable answer was found
    pub first_path: bool,
    /// Port name servers are queried on
    pub port: u16,
    /// Connect, read and write timeout for each query
    #[serde(
        serialize_with = "serialize_timeout",
        deserialize_with = "deserialize_timeout"
    )]
    pub timeout: Duration,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            ip_family: IpFamily::V4,
            resolvers: default_resolvers(),
            qmin_label_sequence: vec![1],
            qmin_subtract_cache: true,
            qmin_strict: false,
            first_path: false,
            port: 53,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ResolverOptions {
    /// Pick one of the configured external resolvers at random
    pub fn pick_resolver(&self) -> IpAddr {
        self.resolvers
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(FALLBACK_RESOLVER)
    }
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
const FALLBACK_RESOLVER: IpAddr = IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1));

fn default_resolvers() -> Vec<IpAddr> {
    vec![
        FALLBACK_RESOLVER,
        IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)),
        IpAddr::V4(Ipv4Addr::new(8, 8, 4, 4)),
        IpAddr::V4(Ipv4Addr::new(9, 9, 9, 9)),
    ]
}

fn deserialize_timeout<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    Ok(Duration::from_secs(u64::deserialize(deserializer)?))
}

fn serialize_timeout<S: Serializer>(timeout: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(timeout.as_secs())
}
