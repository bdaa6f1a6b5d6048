// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::{apply_env_overrides, Config};

/// Ordered list of config file locations searched from lowest to highest
/// priority. Later files override earlier ones.
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("/etc/voxline/config.yaml"));
    paths.push(PathBuf::from("/etc/voxline/config.yml"));

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/voxline/config.yaml"));
        paths.push(home.join(".config/voxline/config.yml"));
    }
    if let Some(cfg) = dirs::config_dir() {
        paths.push(cfg.join("voxline/config.yaml"));
        paths.push(cfg.join("voxline/config.yml"));
    }

    paths.push(PathBuf::from(".voxline/config.yaml"));
    paths.push(PathBuf::from(".voxline/config.yml"));
    paths.push(PathBuf::from("voxline.yaml"));
    paths.push(PathBuf::from("voxline.yml"));

    paths
}

/// Load configuration by merging all discovered YAML files (lowest to
/// highest priority), an optional explicit `--config` path, and finally
/// environment-variable overrides for any still-unset provider credential.
pub fn load(extra: Option<&Path>) -> anyhow::Result<Config> {
    let mut merged = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());

    for path in config_search_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "loading config layer");
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let layer: serde_yaml::Value = serde_yaml::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            merge_yaml(&mut merged, layer);
        }
    }

    if let Some(p) = extra {
        debug!(path = %p.display(), "loading explicit config");
        let text =
            std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
        let layer: serde_yaml::Value =
            serde_yaml::from_str(&text).with_context(|| format!("parsing {}", p.display()))?;
        merge_yaml(&mut merged, layer);
    }

    let mut config: Config = if matches!(merged, serde_yaml::Value::Mapping(ref m) if m.is_empty())
    {
        Config::default()
    } else {
        serde_yaml::from_value(merged).unwrap_or_default()
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

/// Deep-merge `src` into `dst`; `src` wins on scalar conflicts.
fn merge_yaml(dst: &mut serde_yaml::Value, src: serde_yaml::Value) {
    match (dst, src) {
        (serde_yaml::Value::Mapping(d), serde_yaml::Value::Mapping(s)) => {
            for (k, v) in s {
                match d.get_mut(&k) {
                    Some(existing) => merge_yaml(existing, v),
                    None => {
                        d.insert(k, v);
                    }
                }
            }
        }
        (dst_slot, src_val) => {
            *dst_slot = src_val;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_with_no_files_returns_defaults() {
        // Isolate from any real config on the host running tests.
        let dir = tempfile::tempdir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        let config = load(None).unwrap();
        assert_eq!(config.rag.top_k, 5);
    }

    #[test]
    fn explicit_config_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "rag:\n  top_k: 8\nllm:\n  default_model: claude-3-5-sonnet").unwrap();
        let config = load(Some(&path)).unwrap();
        assert_eq!(config.rag.top_k, 8);
        assert_eq!(config.llm.default_model, "claude-3-5-sonnet");
    }

    #[test]
    fn merge_yaml_deep_merges_nested_maps() {
        let mut dst: serde_yaml::Value = serde_yaml::from_str("a:\n  x: 1\n  y: 2").unwrap();
        let src: serde_yaml::Value = serde_yaml::from_str("a:\n  y: 3\n  z: 4").unwrap();
        merge_yaml(&mut dst, src);
        assert_eq!(dst["a"]["x"], serde_yaml::Value::from(1));
        assert_eq!(dst["a"]["y"], serde_yaml::Value::from(3));
        assert_eq!(dst["a"]["z"], serde_yaml::Value::from(4));
    }
}
