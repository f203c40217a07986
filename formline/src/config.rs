//! The `formline.config.ron` file.

use std::path::{Path, PathBuf};

use formline_common::FormId;
use formline_http::HttpConfig;
use formline_smtp::TesterConfig;
use formline_store::StoreConfig;
use serde::Deserialize;

pub const CONFIG_ENV: &str = "FORMLINE_CONFIG";

/// Complete service configuration.
///
/// ```ron
/// (
///     http: (listen_address: "[::]:8080", enforce_test_gate: true),
///     store: Sqlite(path: "/var/lib/formline/formline.db"),
///     tester: (
///         helo_domain: "forms.example.com",
///         tls: (policy: required),
///     ),
///     forms: ["contact", "newsletter"],
/// )
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FormlineConfig {
    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub tester: TesterConfig,

    /// Form ids registered at start-up.
    #[serde(default, alias = "form")]
    pub forms: Vec<FormId>,
}

impl FormlineConfig {
    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config from {}: {}", path.display(), e)
        })?;

        ron::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))
    }
}

/// Find the configuration file using the following precedence:
/// 1. the `--config` argument
/// 2. `FORMLINE_CONFIG` environment variable
/// 3. ./formline.config.ron (current working directory)
/// 4. /etc/formline/formline.config.ron (system-wide config)
pub fn find_config_file(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        anyhow::bail!("--config points to non-existent file: {}", path.display());
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!("{CONFIG_ENV} points to non-existent file: {}", path.display());
    }

    let default_paths = [
        PathBuf::from("./formline.config.ron"),
        PathBuf::from("/etc/formline/formline.config.ron"),
    ];

    for path in &default_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let paths_tried = default_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    anyhow::bail!(
        "No configuration file found. Tried:\n  - --config argument\n  - {CONFIG_ENV} environment variable\n{paths_tried}"
    )
}
