//! Settings loaded from TOML, the singleton configuration record of SPEC_FULL.md §3.

use std::path::Path;

use anyhow::{Context, Result};

use crate::models::Settings;

impl Settings {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let settings: Self =
            toml::from_str(&content).with_context(|| "failed to parse TOML config")?;
        Ok(settings)
    }

    /// Load from a file if it exists, otherwise return defaults (§2a — an absent config file
    /// still produces usable defaults: empty source list, unset destination roots, autoOrganize
    /// off).
    pub fn load_or_default(path: Option<&Path>) -> Self {
        match path {
            Some(p) if p.exists() => Self::load(p).unwrap_or_default(),
            _ => Self::default(),
        }
    }

    /// Default location: `~/.mediatrove/config.toml`.
    pub fn default_path() -> Option<std::path::PathBuf> {
        dirs::home_dir().map(|home| home.join(".mediatrove").join("config.toml"))
    }
}

/// Default allow-list for the configuration UI's directory browser (§6). Any path outside these
/// prefixes is rejected without touching disk.
pub const DEFAULT_ALLOWED_ROOTS: &[&str] = &[
    "/", "/mnt", "/media", "/home", "/data", "/opt", "/srv", "/storage", "/nas", "/volume1",
    "/shares",
];

/// Whether `path` lies under one of `roots` (or equals one exactly). Does not touch the
/// filesystem — pure path-prefix comparison.
pub fn is_path_allowed(path: &Path, roots: &[&str]) -> bool {
    roots.iter().any(|root| path.starts_with(root))
}
