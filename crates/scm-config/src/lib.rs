//! Layered YAML configuration for the dashboard.
//!
//! Documents are merged in order (later layers win), checked for literal
//! secrets, canonicalized and hashed, then typed into [`DashboardConfig`].
//! Consumers decide whether keys nobody reads are warnings or errors via
//! [`report_unused_keys`].

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;

mod dashboard;

pub use dashboard::{
    DaemonSection, DashboardConfig, DefaultsSection, MockSection, RefreshSection, SheetsSection,
    DEFAULT_ORDER_SHEET_URL, DEFAULT_SUPPLIER_SHEET_URL,
};

/// Credential shapes that must never sit in a config file. A string leaf
/// starting with one of these fails the load with CONFIG_SECRET_DETECTED.
const CREDENTIAL_PREFIXES: &[&str] = &[
    "AIza",        // Google API key
    "ya29.",       // Google OAuth access token
    "GOCSPX-",     // Google OAuth client secret
    "-----BEGIN",  // service-account private key
    "ghp_",
    "github_pat_",
    "xoxb-",
    "sk-",
];

// ---------------------------------------------------------------------------
// Consumption map / unused-key guard
// ---------------------------------------------------------------------------

/// Which binary is reading the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigConsumer {
    Daemon,
    Cli,
}

impl ConfigConsumer {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigConsumer::Daemon => "DAEMON",
            ConfigConsumer::Cli => "CLI",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    pub consumer: String,
    /// Consumed JSON-pointer prefixes used for this analysis (sorted, unique)
    pub consumed_prefixes: Vec<String>,
    /// Unused leaf pointers (sorted)
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// JSON-pointer prefixes each consumer actually reads.
///
/// A leaf under a consumed prefix is consumed. Keep this in step with the
/// fields of [`DashboardConfig`] each binary touches.
pub fn consumed_pointers_for(consumer: ConfigConsumer) -> &'static [&'static str] {
    match consumer {
        ConfigConsumer::Daemon => &[
            "/sheets/order_url",
            "/sheets/supplier_url",
            "/refresh/interval_secs",
            "/refresh/enabled",
            "/sla",
            "/defaults/client_country",
            "/defaults/supplier_country",
            "/mock/order_count",
            "/mock/supplier_count",
            "/mock/seed",
            "/daemon/addr",
            "/daemon/state_file",
        ],
        // The CLI never binds a socket and never auto-refreshes.
        ConfigConsumer::Cli => &[
            "/sheets/order_url",
            "/sheets/supplier_url",
            "/sla",
            "/defaults/client_country",
            "/defaults/supplier_country",
            "/mock/order_count",
            "/mock/supplier_count",
            "/mock/seed",
        ],
    }
}

/// Produce an unused-key report for `consumer`.
/// `Fail` turns a non-clean report into an error; `Warn` always returns it.
pub fn report_unused_keys(
    consumer: ConfigConsumer,
    config_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    let consumed_prefixes: Vec<String> = consumed_pointers_for(consumer)
        .iter()
        .map(|p| pointer::normalize(p))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let unused: Vec<String> = pointer::leaves(config_json)
        .into_iter()
        .map(|(ptr, _)| ptr)
        .filter(|leaf| !consumed_prefixes.iter().any(|p| pointer::covers(p, leaf)))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let report = UnusedKeyReport {
        consumer: consumer.as_str().to_string(),
        consumed_prefixes,
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS (consumer={}): {} unused config leaf key(s) detected. \
            Remove them or fix the key name. First few: {:?}",
            report.consumer,
            report.unused_leaf_pointers.len(),
            report.unused_leaf_pointers.iter().take(12).collect::<Vec<_>>()
        );
    }

    Ok(report)
}

/// RFC 6901 pointers over a `serde_json::Value`.
mod pointer {
    use serde_json::Value;

    /// `"sla/"` becomes `"/sla"`; blank becomes the root `"/"`.
    pub fn normalize(raw: &str) -> String {
        let trimmed = raw.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        }
    }

    /// Whether `prefix` names `leaf` or one of its ancestors, segment-wise.
    pub fn covers(prefix: &str, leaf: &str) -> bool {
        prefix == "/"
            || leaf
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    /// Every scalar with its pointer, in key order. Empty containers have no
    /// leaves.
    pub fn leaves(root: &Value) -> Vec<(String, &Value)> {
        let mut out = Vec::new();
        let mut stack = vec![(String::new(), root)];
        while let Some((path, v)) = stack.pop() {
            let children: Vec<(String, &Value)> = match v {
                Value::Object(map) => map
                    .iter()
                    .map(|(k, child)| (format!("{path}/{}", escape(k)), child))
                    .collect(),
                Value::Array(items) => items
                    .iter()
                    .enumerate()
                    .map(|(i, child)| (format!("{path}/{i}"), child))
                    .collect(),
                _ => {
                    let ptr = if path.is_empty() { "/".to_string() } else { path };
                    out.push((ptr, v));
                    continue;
                }
            };
            stack.extend(children.into_iter().rev());
        }
        out
    }

    fn escape(token: &str) -> String {
        token.replace('~', "~0").replace('/', "~1")
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Typed view; every missing field takes its default.
    pub fn dashboard(&self) -> Result<DashboardConfig> {
        serde_json::from_value(self.config_json.clone()).context("config does not match schema")
    }
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let docs = paths
        .iter()
        .map(|p| fs::read_to_string(p).with_context(|| format!("failed to read config layer {p}")))
        .collect::<Result<Vec<_>>>()?;
    let doc_refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Default::default());
    for (idx, raw) in yaml_docs.iter().enumerate() {
        let layer: serde_yaml::Value =
            serde_yaml::from_str(raw).with_context(|| format!("config layer {idx} is not valid yaml"))?;
        // An empty document is YAML null and contributes nothing.
        if layer.is_null() {
            continue;
        }
        let layer = serde_json::to_value(layer)
            .with_context(|| format!("config layer {idx} has non-json values"))?;
        merge_into(&mut merged, layer);
    }

    reject_credentials(&merged)?;

    // serde_json maps are key-sorted, so compact output is canonical.
    let canonical_json = serde_json::to_string(&merged).context("config serialize failed")?;
    let config_hash = hex::encode(Sha256::digest(canonical_json.as_bytes()));
    tracing::debug!(config_hash = %config_hash, layers = yaml_docs.len(), "config loaded");
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Load `paths` (or nothing, yielding all defaults) and type the result.
pub fn load_dashboard_config(paths: &[&str]) -> Result<(LoadedConfig, DashboardConfig)> {
    let loaded = load_layered_yaml(paths)?;
    let cfg = loaded.dashboard()?;
    cfg.validate()?;
    Ok((loaded, cfg))
}

/// Objects merge key by key; any other value in `layer` replaces `base`.
fn merge_into(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base_map), Value::Object(layer_map)) => {
            for (key, value) in layer_map {
                merge_into(base_map.entry(key).or_insert(Value::Null), value);
            }
        }
        (slot, value) => *slot = value,
    }
}

fn reject_credentials(config: &Value) -> Result<()> {
    let hit = pointer::leaves(config).into_iter().find(|(_, v)| {
        v.as_str().map(str::trim).is_some_and(|s| {
            s.len() >= 8 && CREDENTIAL_PREFIXES.iter().any(|p| s.starts_with(p))
        })
    });
    if let Some((ptr, _)) = hit {
        bail!("CONFIG_SECRET_DETECTED leaf={ptr} value=REDACTED");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_stops_at_segment_boundaries() {
        assert!(pointer::covers("/sla", "/sla/Production"));
        assert!(pointer::covers("/sheets/order_url", "/sheets/order_url"));
        assert!(!pointer::covers("/sheets/order", "/sheets/order_url"));
        assert!(pointer::covers("/", "/anything"));
    }

    #[test]
    fn normalize_forms() {
        assert_eq!(pointer::normalize("sla/"), "/sla");
        assert_eq!(pointer::normalize("/mock/seed"), "/mock/seed");
        assert_eq!(pointer::normalize(""), "/");
    }

    #[test]
    fn leaves_escape_tokens_and_keep_key_order() {
        let v = serde_json::json!({"a/b": {"c~d": 1}, "z": [true, {}]});
        let ptrs: Vec<String> = pointer::leaves(&v).into_iter().map(|(p, _)| p).collect();
        assert_eq!(ptrs, vec!["/a~1b/c~0d", "/z/0"]);
    }

    #[test]
    fn merge_later_wins_and_keeps_siblings() {
        let mut m = serde_json::json!({"refresh": {"interval_secs": 60, "enabled": true}});
        merge_into(&mut m, serde_json::json!({"refresh": {"interval_secs": 5}, "mock": {"seed": 3}}));
        assert_eq!(m["refresh"]["interval_secs"], 5);
        assert_eq!(m["refresh"]["enabled"], true);
        assert_eq!(m["mock"]["seed"], 3);
    }

    #[test]
    fn short_strings_are_not_credentials() {
        assert!(reject_credentials(&serde_json::json!({"x": "sk-1"})).is_ok());
        assert!(reject_credentials(&serde_json::json!({"x": ["ya29.a0AfH6SM"]})).is_err());
    }
}
