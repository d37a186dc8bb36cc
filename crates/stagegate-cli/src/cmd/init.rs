//! `sg init`: create `.stagegate/` with a config file and an empty store.

use crate::output::{OutputMode, pretty_kv, render_mode};
use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;
use stagegate_core::config::{self, ProjectConfig, StoreBackend, WORKSPACE_DIR};
use stagegate_core::store::{DocPath, SqliteStore};
use std::io::Write;
use std::path::Path;
use tracing::info;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing `.stagegate/config.toml`.
    #[arg(long)]
    pub force: bool,

    /// Store backend: `sqlite` (default) or `memory`.
    #[arg(long, value_name = "BACKEND")]
    pub backend: Option<StoreBackend>,

    /// Top-level key of the document tree.
    #[arg(long, value_name = "KEY")]
    pub root: Option<String>,

    /// Do not write implicit legacy stage ordinals back on first load.
    #[arg(long)]
    pub no_backfill: bool,
}

#[derive(Debug, Serialize)]
struct InitOutput {
    ok: bool,
    config: String,
    backend: StoreBackend,
    root: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    store: Option<String>,
}

/// Execute `sg init`.
///
/// ```text
/// .stagegate/
///   config.toml
///   store.sqlite3   (sqlite backend only)
/// ```
///
/// # Errors
///
/// Returns an error if the workspace exists and `--force` is not set, if the
/// root key is not a valid path key, or if any file cannot be written.
pub fn run_init(args: &InitArgs, project_root: &Path, output: OutputMode) -> Result<()> {
    let config_path = config::project_config_path(project_root);
    if config_path.exists() && !args.force {
        anyhow::bail!("{WORKSPACE_DIR}/ already exists. Use `sg init --force` to reinitialize.");
    }

    let mut project = ProjectConfig::default();
    if let Some(backend) = args.backend {
        project.store.backend = backend;
    }
    if let Some(root) = &args.root {
        DocPath::parse(root)?;
        project.store.root.clone_from(root);
    }
    project.process.backfill_ordinals = !args.no_backfill;

    let written = config::save_project_config(project_root, &project)?;

    let store = match project.store.backend {
        StoreBackend::Sqlite => {
            let path = project.store.resolved_path(project_root);
            SqliteStore::open(&path)
                .with_context(|| format!("Failed to create store at {}", path.display()))?;
            Some(path.display().to_string())
        }
        StoreBackend::Memory => None,
    };

    info!(
        backend = %project.store.backend,
        root = %project.store.root,
        "workspace initialized"
    );

    let result = InitOutput {
        ok: true,
        config: written.display().to_string(),
        backend: project.store.backend,
        root: project.store.root,
        store,
    };
    render_mode(
        output,
        &result,
        |r, w| writeln!(w, "initialized\t{}\t{}", r.backend, r.root),
        |r, w| {
            writeln!(w, "✓ Initialized {WORKSPACE_DIR}/")?;
            writeln!(w)?;
            pretty_kv(w, "Config", &r.config)?;
            pretty_kv(w, "Backend", r.backend.as_str())?;
            pretty_kv(w, "Root", &r.root)?;
            if let Some(store) = &r.store {
                pretty_kv(w, "Store", store)?;
            }
            writeln!(w)?;
            writeln!(w, "Next steps:")?;
            writeln!(w, "  Load records:   sg import {} records.json", r.root)?;
            writeln!(w, "  Set your actor: export STAGEGATE_ACTOR=mem_01")
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagegate_core::config::load_project_config;

    fn args() -> InitArgs {
        InitArgs {
            force: false,
            backend: None,
            root: None,
            no_backfill: false,
        }
    }

    #[test]
    fn fresh_init_writes_config_and_store() {
        let dir = tempfile::tempdir().expect("temp dir");
        run_init(&args(), dir.path(), OutputMode::Json).expect("init");

        let cfg = load_project_config(dir.path()).expect("config");
        assert_eq!(cfg, ProjectConfig::default());
        assert!(dir.path().join(".stagegate/store.sqlite3").exists());
    }

    #[test]
    fn second_init_requires_force() {
        let dir = tempfile::tempdir().expect("temp dir");
        run_init(&args(), dir.path(), OutputMode::Json).expect("init");
        let err = run_init(&args(), dir.path(), OutputMode::Json).expect_err("must refuse");
        assert!(err.to_string().contains("--force"));

        let forced = InitArgs {
            force: true,
            backend: Some(StoreBackend::Memory),
            root: Some("atelier".to_string()),
            no_backfill: true,
        };
        run_init(&forced, dir.path(), OutputMode::Json).expect("forced init");
        let cfg = load_project_config(dir.path()).expect("config");
        assert_eq!(cfg.store.backend, StoreBackend::Memory);
        assert_eq!(cfg.store.root, "atelier");
        assert!(!cfg.process.backfill_ordinals);
    }

    #[test]
    fn invalid_root_key_is_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let bad = InitArgs {
            root: Some("xo.xo".to_string()),
            ..args()
        };
        assert!(run_init(&bad, dir.path(), OutputMode::Json).is_err());
        assert!(!config::project_config_path(dir.path()).exists());
    }
}
