// Copyright 2015-2024 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Error types for the crate

#![deny(missing_docs)]

use std::io;

use hickory_proto::error::ProtoError;
use thiserror::Error;

/// The error type for errors that get returned in the crate
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An error with an arbitrary message, referenced as &'static str
    #[error("{0}")]
    Message(&'static str),

    /// An error with an arbitrary message, stored as String
    #[error("{0}")]
    Msg(String),

    /// The text is not a valid domain name
    #[error("invalid domain name {name:?}: {source}")]
    InvalidName {
        /// The text as given
        name: String,
        /// Why it was rejected
        source: ProtoError,
    },

    /// The zone a name hangs off of has not been resolved yet
    #[error("no cached zone for {0}, resolve the path from the top down")]
    ParentNotCached(String),

    /// Following recorded zone cuts did not reach a real zone
    #[error("zone cut redirects for {0} did not reach a zone")]
    ZoneCutLoop(String),

    /// The response did not carry the id of the query
    #[error("response id {received} does not match query id {expected}")]
    IdMismatch {
        /// Id of the query that was sent
        expected: u16,
        /// Id found in the response
        received: u16,
    },

    /// An error got returned from IO
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// An error got returned by the hickory-proto crate
    #[error("proto error: {0}")]
    Proto(#[from] ProtoError),

    /// A zone document could not be read or written
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A request timed out
    #[error("request timed out")]
    Timeout,
}

impl Error {
    /// Returns true if a query timed out
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout => true,
            Self::Io(io) => io.kind() == io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Self::Msg(msg)
    }
}

impl From<&'static str> for Error {
    fn from(msg: &'static str) -> Self {
        Self::Message(msg)
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::Timeout
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Timeout => Self::new(io::ErrorKind::TimedOut, e),
            _ => Self::new(io::ErrorKind::Other, e),
        }
    }
}

impl From<Error> for String {
    fn from(e: Error) -> Self {
        e.to_string()
    }
}
