//! `sg import`: load a JSON document into the store at a path.

use super::Context;
use crate::output::render;
use anyhow::{Context as _, Result, bail};
use clap::Args;
use serde::Serialize;
use serde_json::Value;
use stagegate_core::store::{DocPath, DocumentStore, Patch};
use std::io::{Read as _, Write};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Store path to write, e.g. `xoxo/orders/DH001`. Empty for the tree root.
    pub path: String,

    /// JSON file to load; `-` reads stdin.
    pub file: PathBuf,
}

#[derive(Debug, Serialize)]
struct ImportOutput {
    ok: bool,
    path: String,
    /// Top-level keys written (1 for a non-root path).
    keys: usize,
}

fn read_document(file: &Path) -> Result<Value> {
    let raw = if file.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?
    };
    serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", file.display()))
}

/// Replace the subtree at `path` with the file contents.
///
/// At the root each top-level key of the document replaces the stored key
/// of the same name; other stored keys are kept.
///
/// # Errors
///
/// Returns an error if the file is unreadable, the path is invalid, or the
/// store rejects the write.
pub fn run_import(args: &ImportArgs, ctx: &Context<'_>) -> Result<()> {
    let path = DocPath::parse(&args.path)?;
    let document = read_document(&args.file)?;
    let store = ctx.open_store()?;

    let keys = if path.is_empty() {
        let Value::Object(map) = document else {
            bail!("a document imported at the root must be a JSON object");
        };
        let keys = map.len();
        let patch: Patch = map;
        store.update(&path, &patch)?;
        keys
    } else {
        store.set(&path, document)?;
        1
    };

    info!(path = %path, keys, "document imported");

    let result = ImportOutput {
        ok: true,
        path: path.to_string(),
        keys,
    };
    render(ctx.output, &result, |r, w| {
        let shown = if r.path.is_empty() { "/" } else { &r.path };
        writeln!(w, "imported\t{shown}\t{}", r.keys)
    })
}
