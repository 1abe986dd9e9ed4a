// Copyright 2015-2024 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Domain names, and the text form they take as cache keys
//!
//! Names given by callers are parsed into a [`Name`] and rejected when they are
//! not valid. Once parsed, a name is lower case and fully qualified, and its
//! ASCII rendering is the key used in the zone and server caches.

use hickory_proto::rr::Name;

use crate::Error;

/// The root zone
pub const ROOT: &str = ".";

/// Parse a name into its canonical form, lower case and fully qualified.
///
/// Surrounding whitespace is ignored and empty input is the root.
///
/// ```
/// use zonetree::name::parse;
///
/// assert_eq!(parse("WWW.Example.com").unwrap().to_ascii(), "www.example.com.");
/// assert!(parse("www..example.com").is_err());
/// ```
pub fn parse(name: &str) -> Result<Name, Error> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Ok(Name::root());
    }

    let mut parsed = Name::from_ascii(trimmed)
        .map_err(|source| Error::InvalidName {
            name: trimmed.to_string(),
            source,
        })?
        .to_lowercase();
    parsed.set_fqdn(true);
    Ok(parsed)
}

/// The cache key of a name.
///
/// Text that does not parse as a name is kept as it is, lower cased, with a
/// trailing dot. It never collides with the key of a valid name.
pub fn to_fqdn(name: &str) -> String {
    match parse(name) {
        Ok(name) => name.to_ascii(),
        Err(_) => {
            let lower = name.trim().to_ascii_lowercase();
            if lower.ends_with('.') {
                lower
            } else {
                format!("{lower}.")
            }
        }
    }
}

/// Returns true if the name is the root zone
pub fn is_root(name: &str) -> bool {
    parse(name).map_or(false, |name| name.is_root())
}

/// Number of labels in the name, the root has none
pub fn label_count(name: &str) -> usize {
    parse(name).map_or(0, |name| name.iter().count())
}

/// Remove the leftmost label of a name.
///
/// The root is its own parent, and the parent of a top level domain is the root.
pub fn parent_of(name: &str) -> String {
    parse(name).map_or_else(|_| ROOT.to_string(), |name| name.base_name().to_ascii())
}

/// Returns the lookup path from the top level domain down to the name.
///
/// ```
/// use zonetree::name::{parse, path};
///
/// let path = path(&parse("www.Example.com").unwrap());
/// let keys = path.iter().map(|name| name.to_ascii()).collect::<Vec<_>>();
/// assert_eq!(keys, vec!["com.", "example.com.", "www.example.com."]);
/// assert!(zonetree::name::path(&parse(".").unwrap()).is_empty());
/// ```
pub fn path(name: &Name) -> Vec<Name> {
    (1..=name.iter().count())
        .map(|num_labels| name.trim_to(num_labels))
        .collect()
}

/// Returns true if the name server's name is at or below the zone.
///
/// A server in bailiwick can be asked for its own addresses directly, every
/// other server has to be looked up through an external resolver.
pub fn in_bailiwick(server: &str, zone: &str) -> bool {
    match (parse(server), parse(zone)) {
        (Ok(server), Ok(zone)) => zone.zone_of(&server),
        _ => false,
    }
}
