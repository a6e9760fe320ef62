use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::diagnostics::LabelContext;

/// Defaults for the dataset commands, read from `ower.json`. Command-line
/// flags take precedence over anything set here.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub class_count: Option<usize>,
    #[serde(default)]
    pub sent_count: Option<usize>,
    #[serde(default)]
    pub vectors: Option<PathBuf>,
    #[serde(default)]
    pub labels: LabelContext,
}

pub const DEFAULT_CONFIG_FILE: &str = "ower.json";

pub fn load_file_config(path: &Path) -> FileConfig {
    match std::fs::read_to_string(path) {
        Ok(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
            tracing::warn!("ignoring unparsable config {}: {e}", path.display());
            FileConfig::default()
        }),
        Err(_) => FileConfig::default(),
    }
}

pub fn save_file_config(
    path: &Path,
    config: &FileConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_file_config(&dir.path().join("ower.json"));
        assert!(cfg.class_count.is_none());
        assert_eq!(cfg.labels.batch_size, 0);
    }

    #[test]
    fn garbage_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ower.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_file_config(&path).sent_count.is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg").join("ower.json");
        let mut cfg = FileConfig::default();
        cfg.class_count = Some(4);
        cfg.sent_count = Some(3);
        cfg.labels.sent_len = 64;
        save_file_config(&path, &cfg).unwrap();

        let loaded = load_file_config(&path);
        assert_eq!(loaded.class_count, Some(4));
        assert_eq!(loaded.sent_count, Some(3));
        assert_eq!(loaded.labels.sent_len, 64);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ower.json");
        std::fs::write(&path, r#"{"class_count": 100, "labels": {"emb_size": 8}}"#).unwrap();

        let cfg = load_file_config(&path);
        assert_eq!(cfg.class_count, Some(100));
        assert_eq!(cfg.labels.emb_size, 8);
        assert!(cfg.vectors.is_none());
    }
}
