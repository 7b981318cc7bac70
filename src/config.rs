use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const LOCAL_CONFIG: &str = ".revdiff.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevdiffConfig {
    #[serde(default)]
    pub diff: DiffConfig,
    /// Per-repository settings; never written to the global file
    #[serde(default, skip_serializing)]
    pub repo: RepoConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// [diff] section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffConfig {
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,
    #[serde(default)]
    pub exclude_deletes: bool,
    /// Extension list, e.g. "rs, toml" or "**/*.proto"
    #[serde(default)]
    pub extensions: String,
    /// 0 disables the size limit
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: usize,
    /// 0 disables the time budget
    #[serde(default = "default_diff_timeout_ms")]
    pub diff_timeout_ms: u64,
    /// Concurrent content lookups, 0 = number of CPUs
    #[serde(default)]
    pub jobs: usize,
}

/// [repo] section, read from `.revdiff.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Base revision; empty means auto-detect
    #[serde(default)]
    pub base: String,
}

/// [output] section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Patch,
    Markdown,
    Json,
}

fn default_context_lines() -> usize {
    3
}

fn default_max_file_bytes() -> usize {
    1024 * 1024
}

fn default_diff_timeout_ms() -> u64 {
    2000
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            context_lines: default_context_lines(),
            exclude_deletes: false,
            extensions: String::new(),
            max_file_bytes: default_max_file_bytes(),
            diff_timeout_ms: default_diff_timeout_ms(),
            jobs: 0,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Patch,
        }
    }
}

fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("revdiff").join("config.toml"))
}

/// Load config by merging global defaults with per-repo overrides.
/// Priority: per-repo `.revdiff.toml` > global `~/.config/revdiff/config.toml` > built-in defaults.
pub fn load_config(repo_root: &str) -> RevdiffConfig {
    let local = Path::new(repo_root).join(LOCAL_CONFIG);
    load_config_from(global_config_path().as_deref(), &local)
}

/// Merging is deep: individual keys within a section override independently.
/// Files that cannot be read are ignored; files that cannot be parsed are
/// ignored with a warning.
pub fn load_config_from(global: Option<&Path>, local: &Path) -> RevdiffConfig {
    let global_table = global.and_then(read_table);
    let local_table = read_table(local);

    let merged = match (global_table, local_table) {
        (Some(mut global), Some(local)) => {
            deep_merge(&mut global, local);
            global
        }
        (Some(table), None) | (None, Some(table)) => table,
        (None, None) => return RevdiffConfig::default(),
    };

    match toml::Value::Table(merged).try_into() {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Invalid revdiff config, using defaults: {}", e);
            RevdiffConfig::default()
        }
    }
}

fn read_table(path: &Path) -> Option<toml::Table> {
    let content = std::fs::read_to_string(path).ok()?;
    match content.parse::<toml::Table>() {
        Ok(table) => Some(table),
        Err(e) => {
            log::warn!("Failed to parse {}: {}", path.display(), e);
            None
        }
    }
}

/// Recursively merge `overlay` into `base`. Overlay values win; nested tables are merged recursively.
fn deep_merge(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(base_table)), toml::Value::Table(overlay_table)) => {
                deep_merge(base_table, overlay_table);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Save config to the global config dir (~/.config/revdiff/config.toml).
pub fn save_config(config: &RevdiffConfig) -> Result<PathBuf> {
    let path = global_config_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    save_config_to(config, &path)?;
    Ok(path)
}

fn save_config_to(config: &RevdiffConfig, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
