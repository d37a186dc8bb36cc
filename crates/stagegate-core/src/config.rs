use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Directory holding per-workspace state.
pub const WORKSPACE_DIR: &str = ".stagegate";
/// Project config file name inside [`WORKSPACE_DIR`].
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub process: ProcessConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

impl StoreBackend {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" | "mem" => Ok(Self::Memory),
            other => bail!("unknown store backend '{other}' (expected sqlite or memory)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Top-level key of the shared document tree.
    #[serde(default = "default_root")]
    pub root: String,
    #[serde(default)]
    pub backend: StoreBackend,
    /// Store file, relative to the workspace root unless absolute.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            backend: StoreBackend::default(),
            path: default_store_path(),
        }
    }
}

impl StoreConfig {
    /// Store file location for a workspace.
    #[must_use]
    pub fn resolved_path(&self, workspace_root: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            workspace_root.join(&self.path)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Persist implicit legacy stage ordinals on first load.
    #[serde(default = "default_true")]
    pub backfill_ordinals: bool,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            backfill_ordinals: default_true(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    /// Member reference recorded on checks.
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
    pub resolved_actor: Option<String>,
}

#[must_use]
pub fn project_config_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(WORKSPACE_DIR).join(CONFIG_FILE)
}

/// Load `.stagegate/config.toml`, or defaults when it does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(workspace_root: &Path) -> Result<ProjectConfig> {
    let path = project_config_path(workspace_root);
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Write `.stagegate/config.toml`, creating the directory if needed.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn save_project_config(workspace_root: &Path, config: &ProjectConfig) -> Result<PathBuf> {
    let path = project_config_path(workspace_root);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let content = toml::to_string_pretty(config).context("Failed to encode project config")?;
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Load the per-user config from the platform config directory.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("stagegate/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Merge project config, user config, environment and CLI flags.
///
/// # Errors
///
/// Returns an error if either config file is unreadable.
pub fn resolve_config(
    workspace_root: &Path,
    cli_json: bool,
    cli_actor: Option<&str>,
) -> Result<EffectiveConfig> {
    let project = load_project_config(workspace_root)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(cli_json, user.output.clone(), env_format);

    let env_actor = env::var("STAGEGATE_ACTOR").ok();
    let resolved_actor = resolve_actor(cli_actor, env_actor, user.actor.clone());

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
        resolved_actor,
    })
}

fn resolve_output(
    cli_json: bool,
    user_output: Option<String>,
    env_format: Option<String>,
) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "table" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

fn resolve_actor(
    cli_actor: Option<&str>,
    env_actor: Option<String>,
    user_actor: Option<String>,
) -> Option<String> {
    cli_actor
        .map(str::to_string)
        .into_iter()
        .chain(env_actor)
        .chain(user_actor)
        .map(|actor| actor.trim().to_string())
        .find(|actor| !actor.is_empty())
}

const fn default_true() -> bool {
    true
}

fn default_root() -> String {
    "xoxo".to_string()
}

fn default_store_path() -> PathBuf {
    PathBuf::from(WORKSPACE_DIR).join("store.sqlite3")
}
