// Copyright 2015-2024 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Zone status values and the consensus classifier

use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of a zone, or of a single server's view of one.
///
/// Statuses are stored as HTTP flavoured codes, which is also how they appear in
/// zone documents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum ZoneStatus {
    /// Fully resolved zone
    Ok,
    /// Created, not resolved yet
    #[default]
    Placeholder,
    /// A host name or an empty non-terminal, see the zone cut
    NotAZone,
    /// Delegated, but no server answered authoritatively for the zone
    Incomplete,
    /// The server refused to answer
    Refused,
    /// NXDOMAIN
    NonExistent,
    /// No server offered a usable opinion
    NoConsensus,
    /// Resolution failed outright
    Broken,
    /// The server could not be reached
    Unreachable,
}

impl ZoneStatus {
    /// The numeric code of the status
    pub fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::Placeholder => 201,
            Self::NotAZone => 204,
            Self::Incomplete => 206,
            Self::Refused => 403,
            Self::NonExistent => 404,
            Self::NoConsensus => 420,
            Self::Broken => 500,
            Self::Unreachable => 504,
        }
    }

    /// Human readable form of the status
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Placeholder => "placeholder",
            Self::NotAZone => "not a zone",
            Self::Incomplete => "incomplete",
            Self::Refused => "refused",
            Self::NonExistent => "non-existent",
            Self::NoConsensus => "no consensus",
            Self::Broken => "broken",
            Self::Unreachable => "unreachable",
        }
    }

    /// Returns true if the status describes something that is not a zone of its own.
    ///
    /// Names in this state are skipped by the self query phase, and their children
    /// are resolved through the zone cut instead.
    pub fn is_not_a_zone(self) -> bool {
        matches!(self, Self::NotAZone | Self::Refused | Self::NonExistent)
    }
}

impl fmt::Display for ZoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ZoneStatus> for u16 {
    fn from(status: ZoneStatus) -> Self {
        status.code()
    }
}

impl TryFrom<u16> for ZoneStatus {
    type Error = String;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        Ok(match code {
            200 => Self::Ok,
            201 => Self::Placeholder,
            204 => Self::NotAZone,
            206 => Self::Incomplete,
            403 => Self::Refused,
            404 => Self::NonExistent,
            420 => Self::NoConsensus,
            500 => Self::Broken,
            504 => Self::Unreachable,
            _ => return Err(format!("unknown zone status code {code}")),
        })
    }
}

/// Compute the consensus status from the views reported by the parent servers.
///
/// A single server reporting the zone is enough to call it OK, no matter what
/// the others say. Refusals rank last since they carry no opinion about the name.
pub fn calc_zone_status<I>(views: I) -> ZoneStatus
where
    I: IntoIterator<Item = ZoneStatus>,
{
    const PRIORITY: [ZoneStatus; 4] = [
        ZoneStatus::Ok,
        ZoneStatus::NotAZone,
        ZoneStatus::NonExistent,
        ZoneStatus::Refused,
    ];

    let seen = views
        .into_iter()
        .filter_map(|view| PRIORITY.iter().position(|status| *status == view))
        .min();

    seen.map_or(ZoneStatus::NoConsensus, |rank| PRIORITY[rank])
}
