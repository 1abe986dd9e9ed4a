// Copyright 2015-2024 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The `zonetree` binary for walking the delegation chain to a domain
//!
//! ```text
//! Usage: zonetree [options] [DOMAIN]
//!
//! Options:
//!    -q, --quiet             Disable INFO messages, WARN and ERROR will remain
//!    -d, --debug             Turn on DEBUG messages (default is only INFO)
//!    -c FILE, --config=FILE  Path to configuration file, default is /etc/zonetree/zonetree.toml
//!    --hints FILE            Root zone document, overrides the config file
//!    --dump                  Print every cached zone rather than only DOMAIN
//!    --first-path            Stop asking servers once one answered
//!    --ipv6                  Only query name servers over IPv6
//!    --both                  Query name servers over IPv4 and IPv6
//! ```

// BINARY WARNINGS
#![warn(
    clippy::dbg_macro,
    clippy::unimplemented,
    missing_copy_implementations,
    missing_docs,
    non_snake_case,
    non_upper_case_globals,
    rust_2018_idioms,
    unreachable_pub
)]
#![recursion_limit = "128"]

use std::path::PathBuf;

use clap::Parser;
use tokio::runtime;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use zonetree::{config::IpFamily, engine::NetworkEngine, name::ROOT, ZoneTree};

mod config;

use config::Config;

/// Cli struct for all options managed with clap derive api.
#[derive(Debug, Parser)]
#[clap(name = "zonetree", version, about)]
struct Cli {
    /// Domain to walk to, `ROOT` or `.` for the root zone
    #[clap(default_value = ROOT)]
    pub(crate) domain: String,

    /// Disable INFO messages, WARN and ERROR will remain
    #[clap(short = 'q', long = "quiet", conflicts_with = "debug")]
    pub(crate) quiet: bool,

    /// Turn on `DEBUG` messages (default is only `INFO`)
    #[clap(short = 'd', long = "debug", conflicts_with = "quiet")]
    pub(crate) debug: bool,

    /// Path to configuration file
    #[clap(
        short = 'c',
        long = "config",
        default_value = "/etc/zonetree/zonetree.toml",
        value_name = "FILE",
        value_hint=clap::ValueHint::FilePath,
    )]
    pub(crate) config: PathBuf,

    /// Root zone document,
    /// overrides any value in config file
    #[clap(long = "hints", value_name = "FILE", value_hint=clap::ValueHint::FilePath)]
    pub(crate) hints: Option<PathBuf>,

    /// Print every cached zone rather than only the one for the domain
    #[clap(long = "dump")]
    pub(crate) dump: bool,

    /// Stop asking further servers once one answered,
    /// overrides any value in config file
    #[clap(long = "first-path")]
    pub(crate) first_path: bool,

    /// Only query name servers over IPv6,
    /// overrides any value in config file
    #[clap(long = "ipv6", conflicts_with = "both")]
    pub(crate) ipv6: bool,

    /// Query name servers over both IPv4 and IPv6,
    /// overrides any value in config file
    #[clap(long = "both", conflicts_with = "ipv6")]
    pub(crate) both: bool,
}

impl Cli {
    fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

/// Main method for running the tool.
fn main() -> Result<(), String> {
    // this is essential for custom formatting the returned error message.
    // the displayed message of termination impl trait is not pretty.
    // https://doc.rust-lang.org/stable/src/std/process.rs.html#2439
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), String> {
    let args = Cli::parse();
    logger(args.log_level())?;

    info!("zonetree {} starting...", env!("CARGO_PKG_VERSION"));

    info!("loading configuration from: {:?}", args.config);
    let config = Config::read_config(&args.config).unwrap_or_else(|err| {
        warn!(
            "failed to read config file from {:?}: {err}, using defaults",
            args.config
        );
        Config::default()
    });

    let mut options = config.options.clone();
    if args.first_path {
        options.first_path = true;
    }
    if args.ipv6 {
        options.ip_family = IpFamily::V6;
    } else if args.both {
        options.ip_family = IpFamily::Both;
    }

    let hints = args.hints.clone().unwrap_or_else(|| config.hints_path());
    let engine = NetworkEngine::new(options.timeout);
    let tree = ZoneTree::builder()
        .zone_cache(config.cache)
        .server_cache(config.cache)
        .options(options)
        .root_hints(&hints)
        .build(engine);

    let domain = if args.domain.eq_ignore_ascii_case("root") {
        ROOT
    } else {
        args.domain.as_str()
    };

    let runtime = runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("zonetree-runtime")
        .build()
        .map_err(|err| format!("failed to initialize Tokio runtime: {err}"))?;

    runtime
        .block_on(tree.build_zone_cache(domain))
        .map_err(|err| format!("can not walk to {domain}: {err}"))?;

    if args.dump {
        let zones = tree.zones();
        info!("dumping {} zones", zones.len());
        print_json(&zones)
    } else {
        let zone = tree
            .zone(domain)
            .ok_or_else(|| format!("no zone was recorded for {domain}"))?;
        print_json(&zone)
    }
}

#[allow(clippy::print_stdout)]
fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|err| format!("failed to render zones as JSON: {err}"))?;
    println!("{json}");
    Ok(())
}

/// Log to stderr, zonetree at the given level and everything else as RUST_LOG says
fn logger(level: tracing::Level) -> Result<(), String> {
    let filter = log_filter(level, &std::env::var("RUST_LOG").unwrap_or_default())?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_line_number(true),
        )
        .with(filter)
        .init();

    Ok(())
}

fn log_filter(level: tracing::Level, env: &str) -> Result<EnvFilter, String> {
    let directives = format!(
        "zonetree={level},{env}",
        level = level.to_string().to_lowercase()
    );
    EnvFilter::builder()
        .with_default_directive(tracing::Level::WARN.into())
        .parse(directives)
        .map_err(|err| format!("failed to configure tracing/logging: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_flags() {
        let level = |args: &[&str]| Cli::try_parse_from(args).unwrap().log_level();

        assert_eq!(level(&["zonetree"]), tracing::Level::INFO);
        assert_eq!(level(&["zonetree", "-q", "example.com"]), tracing::Level::ERROR);
        assert_eq!(level(&["zonetree", "--debug"]), tracing::Level::DEBUG);
        assert!(Cli::try_parse_from(["zonetree", "-q", "-d"]).is_err());
    }

    #[test]
    fn test_log_filter() {
        let filter = log_filter(tracing::Level::DEBUG, "").unwrap().to_string();
        assert!(filter.contains("zonetree=debug"), "{filter}");

        let filter = log_filter(tracing::Level::ERROR, "hickory_proto=trace")
            .unwrap()
            .to_string();
        assert!(filter.contains("zonetree=error"), "{filter}");
        assert!(filter.contains("hickory_proto=trace"), "{filter}");

        assert!(log_filter(tracing::Level::INFO, "zonetree=loud").is_err());
    }
}
