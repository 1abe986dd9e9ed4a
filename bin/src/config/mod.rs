// Copyright 2015-2024 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Configuration module for the `zonetree` binary.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;

use zonetree::config::{CacheBackend, ResolverOptions};

#[cfg(test)]
mod tests;

/// Tool configuration
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    /// Root zone document, relative to `directory` unless absolute
    #[serde(default = "default_hints")]
    pub(crate) hints: PathBuf,
    /// Base configuration directory
    #[serde(default = "default_directory")]
    pub(crate) directory: PathBuf,
    /// Backend for the zone and server caches
    #[serde(default)]
    pub(crate) cache: CacheBackend,
    /// Options handed to the resolver
    #[serde(default)]
    pub(crate) options: ResolverOptions,
}

impl Config {
    /// Read a [`Config`] from the given TOML file.
    pub(crate) fn read_config(path: &Path) -> Result<Self, ConfigError> {
        Self::from_toml(&fs::read_to_string(path)?)
    }

    /// Read a [`Config`] from the given TOML string.
    fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml)?)
    }

    /// Full path to the root zone document
    pub(crate) fn hints_path(&self) -> PathBuf {
        self.directory.join(&self.hints)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hints: default_hints(),
            directory: default_directory(),
            cache: CacheBackend::default(),
            options: ResolverOptions::default(),
        }
    }
}

/// The error kind for errors that get returned in the crate
#[derive(Debug, Error)]
#[non_exhaustive]
pub(crate) enum ConfigError {
    // foreign
    /// An error got returned from IO
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// An error occurred while decoding toml data
    #[error("toml decode error: {0}")]
    TomlDecode(#[from] toml::de::Error),
}

fn default_hints() -> PathBuf {
    PathBuf::from("default/root-hints.json")
}

fn default_directory() -> PathBuf {
    PathBuf::from("/etc/zonetree")
}
