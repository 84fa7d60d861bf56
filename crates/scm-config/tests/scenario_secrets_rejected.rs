use scm_config::load_layered_yaml_from_strings;

#[test]
fn api_key_literal_is_rejected_and_redacted() {
    let yaml = r#"
sheets:
  order_url: "AIzaSyD-not-a-real-key-0000000000"
"#;
    let err = load_layered_yaml_from_strings(&[yaml]).unwrap_err().to_string();
    assert!(err.contains("CONFIG_SECRET_DETECTED"), "{err}");
    assert!(err.contains("/sheets/order_url"), "{err}");
    assert!(!err.contains("AIzaSy"), "secret value must not be echoed: {err}");
}

#[test]
fn secret_in_later_layer_is_rejected() {
    let base = "refresh:\n  interval_secs: 60\n";
    let overlay = "mock:\n  token: \"ghp_abcdefghijklmnop\"\n";
    assert!(load_layered_yaml_from_strings(&[base]).is_ok());
    assert!(load_layered_yaml_from_strings(&[base, overlay]).is_err());
}

#[test]
fn public_sheet_urls_are_fine() {
    let yaml = r#"
sheets:
  order_url: "https://docs.google.com/spreadsheets/d/1BYy/edit#gid=624509827"
  supplier_url: "https://docs.google.com/spreadsheets/d/1BYy/edit#gid=1281142439"
"#;
    assert!(load_layered_yaml_from_strings(&[yaml]).is_ok());
}
