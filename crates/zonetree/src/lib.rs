// Copyright 2015-2024 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Walks the DNS delegation chain from the root to a name and records every zone
//! along the way.
//!
//! For each name on the path the parent's servers are asked for the delegation
//! and then the delegated servers are asked about the zone themselves. The
//! answers are folded into a [`Zone`] with a status summarizing how consistent
//! the servers were. Zones are kept in a cache owned by a [`ZoneTree`] so a later
//! walk only queries the parts of the tree it has not seen.
//!
//! ```no_run
//! use zonetree::{engine::NetworkEngine, ZoneTree};
//!
//! # async fn walk() -> Result<(), zonetree::Error> {
//! let tree = ZoneTree::builder()
//!     .root_hints("root-hints.json".as_ref())
//!     .build(NetworkEngine::default());
//!
//! tree.build_zone_cache("www.example.com.").await?;
//! if let Some(zone) = tree.zone("example.com.") {
//!     println!("{} is {}", zone.name, zone.status);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(
    clippy::default_trait_access,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::unimplemented,
    missing_copy_implementations,
    missing_docs,
    non_snake_case,
    non_upper_case_globals,
    rust_2018_idioms,
    unreachable_pub
)]
#![recursion_limit = "2048"]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod cache;
pub mod config;
mod delegation;
pub mod engine;
pub mod error;
mod glue;
pub mod name;
pub mod query;
pub mod status;
pub mod zone;
mod zone_tree;

pub use error::Error;
pub use hickory_proto as proto;
pub use query::{DigQuery, DigRecord, DigResponse, QueryEngine, Transport};
pub use status::{calc_zone_status, ZoneStatus};
pub use zone::{NsIp, ParentNs, Server, Zone, ZoneNs};
pub use zone_tree::{ZoneTree, ZoneTreeBuilder};
