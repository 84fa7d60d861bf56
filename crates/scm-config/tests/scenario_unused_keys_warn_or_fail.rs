use scm_config::{
    load_layered_yaml_from_strings, report_unused_keys, ConfigConsumer, UnusedKeyPolicy,
};

const YAML: &str = r#"
sheets:
  order_url: "https://docs.google.com/spreadsheets/d/abc/edit#gid=1"
refresh:
  interval_secs: 30
sla:
  Production: 12
  Fresh Order: 3
daemon:
  addr: "127.0.0.1:9000"
refesh:
  enabled: false
"#;

#[test]
fn daemon_warn_lists_typo_only() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let report =
        report_unused_keys(ConfigConsumer::Daemon, &loaded.config_json, UnusedKeyPolicy::Warn)
            .unwrap();
    assert_eq!(report.consumer, "DAEMON");
    assert_eq!(report.unused_leaf_pointers, vec!["/refesh/enabled".to_string()]);
    assert!(!report.is_clean());
}

#[test]
fn cli_does_not_consume_daemon_sections() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let report =
        report_unused_keys(ConfigConsumer::Cli, &loaded.config_json, UnusedKeyPolicy::Warn)
            .unwrap();
    assert_eq!(
        report.unused_leaf_pointers,
        vec![
            "/daemon/addr".to_string(),
            "/refesh/enabled".to_string(),
            "/refresh/interval_secs".to_string(),
        ]
    );
}

#[test]
fn fail_policy_errors_with_stable_prefix() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let err = report_unused_keys(ConfigConsumer::Daemon, &loaded.config_json, UnusedKeyPolicy::Fail)
        .unwrap_err()
        .to_string();
    assert!(err.starts_with("CONFIG_UNUSED_KEYS (consumer=DAEMON)"), "{err}");
    assert!(err.contains("/refesh/enabled"), "{err}");
}

#[test]
fn clean_config_passes_fail_policy() {
    let loaded = load_layered_yaml_from_strings(&["sla:\n  Production: 5\n"]).unwrap();
    let report =
        report_unused_keys(ConfigConsumer::Cli, &loaded.config_json, UnusedKeyPolicy::Fail)
            .unwrap();
    assert!(report.is_clean());
}
