//! Layered config hashing is deterministic and order-insensitive within a
//! document, and later layers override earlier ones.

use scm_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
sheets:
  order_url: "https://docs.google.com/spreadsheets/d/abc/edit#gid=1"
  supplier_url: "https://docs.google.com/spreadsheets/d/abc/edit#gid=2"
refresh:
  interval_secs: 60
  enabled: true
sla:
  Production: 20
"#;

const BASE_YAML_REORDERED: &str = r#"
sla:
  Production: 20
refresh:
  enabled: true
  interval_secs: 60
sheets:
  supplier_url: "https://docs.google.com/spreadsheets/d/abc/edit#gid=2"
  order_url: "https://docs.google.com/spreadsheets/d/abc/edit#gid=1"
"#;

const OVERLAY_YAML: &str = r#"
refresh:
  interval_secs: 15
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let original = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let reordered = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(
        original.config_hash, reordered.config_hash,
        "key order in the source must not change the hash"
    );
}

#[test]
fn overlay_wins_and_changes_hash() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let merged = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(base.config_hash, merged.config_hash);

    let cfg = merged.dashboard().unwrap();
    assert_eq!(cfg.refresh.interval_secs, 15);
    assert!(cfg.refresh.enabled, "sibling keys survive the overlay");
}

#[test]
fn empty_layers_are_skipped() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&["", BASE_YAML, ""]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
}

#[test]
fn hash_is_64_hex_chars() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(loaded.config_hash.len(), 64);
    assert!(loaded.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}
