// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::{info, warn};

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();
}

/// Parses a TOML config file.
///
/// A missing file is not an error and yields `Ok(None)`.
pub fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
    };
    let cfg = toml::from_str(&text).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(cfg))
}

/// Loads a config file, falling back to `T::default()` when it is missing or broken.
pub fn load_toml_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match read_toml(path) {
        Ok(Some(cfg)) => {
            info!("loaded config from {}", path.display());
            cfg
        }
        Ok(None) => {
            info!("no config at {}, using defaults", path.display());
            T::default()
        }
        Err(e) => {
            warn!("{e:#}; using defaults");
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(default)]
    struct Cfg {
        width: u32,
        title: String,
    }

    impl Default for Cfg {
        fn default() -> Self {
            Cfg { width: 640, title: "ember".into() }
        }
    }

    fn scratch(name: &str, body: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("ember-core-{}-{name}.toml", std::process::id()));
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn missing_file_is_none() {
        let path = std::env::temp_dir().join("ember-core-definitely-missing.toml");
        let cfg: Option<Cfg> = read_toml(&path).unwrap();
        assert!(cfg.is_none());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let path = scratch("partial", "width = 800\n");
        let cfg: Cfg = load_toml_or_default(&path);
        assert_eq!(cfg, Cfg { width: 800, title: "ember".into() });
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn malformed_file_falls_back() {
        let path = scratch("broken", "width = \"wide\"\n");
        assert!(read_toml::<Cfg>(&path).is_err());
        let cfg: Cfg = load_toml_or_default(&path);
        assert_eq!(cfg, Cfg::default());
        std::fs::remove_file(path).ok();
    }
}
