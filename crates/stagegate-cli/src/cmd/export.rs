//! `sg export`: print the subtree at a store path as JSON.

use super::Context;
use crate::output::OutputMode;
use anyhow::Result;
use clap::Args;
use serde_json::Value;
use stagegate_core::store::{DocPath, DocumentStore};
use std::io::{self, Write};

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Store path to read. Empty for the whole tree.
    #[arg(default_value = "")]
    pub path: String,
}

/// Absent paths print `null`. Text mode prints one compact line; the other
/// modes pretty-print.
///
/// # Errors
///
/// Returns an error if the path is invalid or the store cannot be read.
pub fn run_export(args: &ExportArgs, ctx: &Context<'_>) -> Result<()> {
    let path = DocPath::parse(&args.path)?;
    let value = ctx.open_store()?.read(&path)?.unwrap_or(Value::Null);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match ctx.output {
        OutputMode::Text => serde_json::to_writer(&mut out, &value)?,
        OutputMode::Pretty | OutputMode::Json => serde_json::to_writer_pretty(&mut out, &value)?,
    }
    writeln!(out)?;
    Ok(())
}
