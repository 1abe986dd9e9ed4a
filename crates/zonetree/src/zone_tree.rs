// Copyright 2015-2024 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::{collections::HashMap, net::IpAddr, path::Path, sync::Arc};

use hickory_proto::rr::Name;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    cache::{CacheMap, Map},
    config::{CacheBackend, ResolverOptions},
    name::{self, ROOT},
    query::QueryEngine,
    status::ZoneStatus,
    zone::{Server, Zone},
    Error,
};

/// Build a [`ZoneTree`]
#[derive(Clone, Debug, Default)]
pub struct ZoneTreeBuilder {
    zone_cache: CacheBackend,
    server_cache: CacheBackend,
    options: ResolverOptions,
    root: Option<Zone>,
}

impl ZoneTreeBuilder {
    /// Backend for the zone cache
    pub fn zone_cache(mut self, backend: CacheBackend) -> Self {
        self.zone_cache = backend;
        self
    }

    /// Backend for the server address cache
    pub fn server_cache(mut self, backend: CacheBackend) -> Self {
        self.server_cache = backend;
        self
    }

    /// Resolver options
    pub fn options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    /// The root zone every walk starts from
    pub fn root(mut self, root: Zone) -> Self {
        self.root = Some(root);
        self
    }

    /// Read the root zone from a JSON document.
    ///
    /// A missing or malformed document is logged and leaves the root empty.
    /// Nothing below the root can be resolved until it is fixed.
    pub fn root_hints(self, path: &Path) -> Self {
        match Zone::from_file(path) {
            Ok(root) => {
                info!(
                    "loaded {} root server addresses from {}",
                    root.nsip.len(),
                    path.display()
                );
                self.root(root)
            }
            Err(e) => {
                warn!("failed to load root hints from {}: {e}", path.display());
                self
            }
        }
    }

    /// Construct the tree around the root zone
    pub fn build<E: QueryEngine>(self, engine: E) -> ZoneTree<E> {
        ZoneTree {
            root: seed_root(self.root.unwrap_or_default()),
            zones: CacheMap::new(self.zone_cache),
            servers: CacheMap::new(self.server_cache),
            options: self.options,
            engine,
            locks: Mutex::new(HashMap::new()),
        }
    }
}

fn seed_root(mut root: Zone) -> Zone {
    root.name = ROOT.to_string();
    root.parent_name = ROOT.to_string();
    root.zone_cut = None;
    root.status = ZoneStatus::Ok;

    if root.nsip.is_empty() {
        warn!("root zone has no name servers, nothing can be resolved");
    }
    if !root.indices_valid() {
        warn!("root zone refers to name servers it does not list");
    }

    root
}

/// Zones resolved earlier in the same walk, by name.
///
/// With a zone cache that stores nothing, this is where a node finds its parent.
pub(crate) type Walk = HashMap<String, Zone>;

/// The zone and server caches plus everything needed to extend them.
///
/// One `ZoneTree` is shared by every task resolving names. Each zone is written
/// by a single resolution at a time, concurrent requests for the same name wait
/// for the first one and then find it in the cache. The root zone lives beside the
/// cache and is never evicted, whatever backend the cache uses.
pub struct ZoneTree<E> {
    root: Zone,
    pub(crate) zones: CacheMap<Zone>,
    pub(crate) servers: CacheMap<Server>,
    pub(crate) options: ResolverOptions,
    pub(crate) engine: E,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ZoneTree<()> {
    /// Construct a new builder
    pub fn builder() -> ZoneTreeBuilder {
        ZoneTreeBuilder::default()
    }
}

impl<E: QueryEngine> ZoneTree<E> {
    /// Make sure every zone on the path to the name is in the cache.
    ///
    /// Names are resolved from the top level domain down, each one only after its
    /// parent is stored. A name whose resolution fails outright is stored as
    /// broken so the names below it still get a parent to hang off of.
    ///
    /// Only a name that does not parse is an error, nothing is resolved for it.
    pub async fn build_zone_cache(&self, name: &str) -> Result<(), Error> {
        let name = name::parse(name)?;
        if name.is_root() {
            debug!("root zone is loaded at startup, nothing to build");
            return Ok(());
        }

        let mut walk = Walk::new();
        for node in name::path(&name) {
            let zone = self.build_node(&node, &walk).await;
            walk.insert(zone.name.clone(), zone);
        }

        Ok(())
    }

    async fn build_node(&self, node: &Name, walk: &Walk) -> Zone {
        let node = node.to_ascii();
        let lock = self.lock_for(&node);
        let guard = lock.lock().await;

        let zone = match self.prep_zone_in(&node, walk).await {
            Ok(zone) => zone,
            Err(e) => {
                error!("failed to resolve {node}: {e}");
                Zone::broken(&node)
            }
        };
        self.zones.set(&node, zone.clone());

        drop(guard);
        self.release_lock(&node, lock);
        zone
    }

    /// A name server set supplied by the caller, for zones that are not delegated yet.
    ///
    /// No parent is consulted. The servers are asked for the zone's NS set the same
    /// way a delegated zone's servers are. The result is not cached.
    pub async fn prep_undelegated_zone(
        &self,
        name: &str,
        nsip: &[(String, IpAddr)],
    ) -> Result<Zone, Error> {
        let mut zone = Zone::placeholder(&name::parse(name)?.to_ascii());
        for (server, ip) in nsip {
            zone.intern_nsip(&name::parse(server)?.to_ascii(), *ip);
        }

        zone.status = if self.query_self_for_ns(&mut zone).await {
            ZoneStatus::Ok
        } else {
            ZoneStatus::Incomplete
        };

        info!("undelegated zone {} is {}", zone.name, zone.status);
        Ok(zone)
    }

    /// A copy of the cached zone, `None` for names that do not parse
    pub fn zone(&self, name: &str) -> Option<Zone> {
        let name = name::parse(name).ok()?;
        self.cached(&name.to_ascii())
    }

    pub(crate) fn cached(&self, name: &str) -> Option<Zone> {
        if name == ROOT {
            return Some(self.root.clone());
        }
        self.zones.get(name)
    }

    /// The zone from the cache, or from earlier in the walk
    pub(crate) fn lookup(&self, name: &str, walk: &Walk) -> Option<Zone> {
        self.cached(name).or_else(|| walk.get(name).cloned())
    }

    /// Every cached zone, shortest names first
    pub fn zones(&self) -> Vec<Zone> {
        let mut zones = self
            .zones
            .iter()
            .into_iter()
            .map(|(_, zone)| zone)
            .chain([self.root.clone()])
            .collect::<Vec<_>>();
        zones.sort_by(|a, b| {
            name::label_count(&a.name)
                .cmp(&name::label_count(&b.name))
                .then_with(|| a.name.cmp(&b.name))
        });
        zones
    }

    /// Known addresses of a name server host
    pub fn server(&self, name: &str) -> Option<Server> {
        let name = name::parse(name).ok()?;
        self.servers.get(&name.to_ascii())
    }

    /// Drop a zone from the cache, the root zone is never removed
    pub fn remove_zone(&self, name: &str) -> Result<Option<Zone>, Error> {
        let name = name::parse(name)?;
        if name.is_root() {
            return Err(Error::from("the root zone can not be removed"));
        }

        Ok(self.zones.remove(&name.to_ascii()))
    }

    /// Drop every zone but the root and forget all server addresses.
    ///
    /// Returns the names that were removed.
    pub fn reset(&self) -> Vec<String> {
        let removed = self.zones.keys();
        for name in &removed {
            self.zones.remove(name);
        }
        self.servers.clear();
        self.locks.lock().retain(|_, lock| Arc::strong_count(lock) > 1);

        debug!("reset zone cache, dropped {} zones", removed.len());
        removed
    }

    /// Options the tree was built with
    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// The engine used for queries
    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn lock_for(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    /// Forget the lock for a name once nobody holds or waits on it
    fn release_lock(&self, name: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock();
        drop(lock);
        if locks
            .get(name)
            .map_or(false, |lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(name);
        }
    }
}
