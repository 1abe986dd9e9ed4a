use std::{
    net::{IpAddr, Ipv4Addr},
    time::Duration,
};

use zonetree::config::IpFamily;

use super::*;

#[test]
fn example_config() {
    let config = Config::from_toml(include_str!(
        "../../../tests/test-data/test_configs/zonetree.toml"
    ))
    .unwrap();

    assert_eq!(config.cache, CacheBackend::Concurrent);
    assert_eq!(
        config.hints_path(),
        PathBuf::from("/etc/zonetree/default/root-hints.json")
    );
    assert_eq!(config.options.ip_family, IpFamily::V4);
    assert_eq!(config.options.resolvers.len(), 4);
    assert_eq!(config.options.timeout, Duration::from_secs(2));
}

#[test]
fn minimal_config() {
    let config = Config::from_toml(
        r#"cache = "noop"
           [options]
           ip_family = "both"
           resolvers = ["9.9.9.9"]"#,
    )
    .unwrap();

    assert_eq!(config.cache, CacheBackend::Noop);
    assert_eq!(config.directory, PathBuf::from("/etc/zonetree"));
    assert_eq!(config.options.ip_family, IpFamily::Both);
    assert_eq!(
        config.options.resolvers,
        vec![IpAddr::V4(Ipv4Addr::new(9, 9, 9, 9))]
    );
    assert_eq!(config.options.port, 53);
}

#[test]
fn absolute_hints_path() {
    let config = Config::from_toml(r#"hints = "/tmp/hints.json""#).unwrap();
    assert_eq!(config.hints_path(), PathBuf::from("/tmp/hints.json"));
}

#[test]
fn unknown_option_error_message() {
    match Config::from_toml(
        r#"[options]
           ipv4only = true"#,
    ) {
        Ok(val) => panic!("expected error value; got ok: {val:?}"),
        Err(e) => assert!(e.to_string().contains("unknown field `ipv4only`")),
    }
}

#[test]
fn missing_config_file() {
    assert!(matches!(
        Config::read_config(Path::new("/nonexistent/zonetree.toml")),
        Err(ConfigError::Io(_))
    ));
}
