#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::time::Duration;

use statscope_core::Buckets;
use statscope_runtime::{config, Scope};

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
scope:
  prefix: svc
  sanitize:
    name_charactrs: { ranges: [] } # typo should fail
"#;
    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.kind().as_str(), "BAD_CONFIG");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.scope.separator, ".");
    assert_eq!(cfg.scope.reporting_interval(), Duration::from_secs(1));
    assert!(cfg.scope.default_buckets.is_none());
}

#[test]
fn rejects_unsupported_version() {
    let err = config::load_from_str("version: 2\n").expect_err("must fail");
    assert_eq!(err.kind().as_str(), "UNSUPPORTED_VERSION");
}

#[test]
fn rejects_out_of_range_interval() {
    let bad = "version: 1\nscope:\n  reporting_interval_ms: 5\n";
    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.kind().as_str(), "BAD_CONFIG");

    let off = "version: 1\nscope:\n  reporting_interval_ms: 0\n";
    let cfg = config::load_from_str(off).unwrap();
    assert!(cfg.scope.reporting_interval().is_zero());
}

#[test]
fn buckets_need_exactly_one_generator() {
    let bad = r#"
version: 1
scope:
  default_buckets:
    kind: values
    bounds: [1, 2]
    linear: { start: 0, width: 1, count: 3 }
"#;
    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.kind().as_str(), "BAD_CONFIG");
}

#[test]
fn unsorted_bounds_are_invalid() {
    let bad = r#"
version: 1
scope:
  default_buckets:
    kind: values
    bounds: [3, 1]
"#;
    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.kind().as_str(), "INVALID_BUCKETS");
}

#[test]
fn duration_buckets_are_milliseconds() {
    let ok = r#"
version: 1
scope:
  default_buckets:
    kind: durations
    bounds: [5, 10]
"#;
    let cfg = config::load_from_str(ok).unwrap();
    let b = cfg.scope.default_buckets.as_ref().unwrap().to_buckets().unwrap();
    assert_eq!(
        b,
        Buckets::Durations(vec![Duration::from_millis(5), Duration::from_millis(10)])
    );
}

#[test]
fn config_builds_a_scope() {
    let ok = r#"
version: 1
scope:
  prefix: "my svc"
  separator: "_"
  tags: { env: prod }
  reporting_interval_ms: 0
  sanitize:
    name_characters:
      ranges: [{ low: "a", high: "z" }]
      characters: ["_"]
"#;
    let cfg = config::load_from_str(ok).unwrap();
    let s = Scope::new_root(cfg.scope.to_options().unwrap(), cfg.scope.reporting_interval())
        .unwrap();
    assert_eq!(s.prefix(), "my_svc");
    assert_eq!(s.sub_scope("db").prefix(), "my_svc_db");
    assert_eq!(s.tags().get("env").map(String::as_str), Some("prod"));
}
