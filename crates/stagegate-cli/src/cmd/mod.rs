pub mod assign;
pub mod defect;
pub mod export;
pub mod import;
pub mod init;
pub mod products;
pub mod show;
pub mod toggle;

use crate::output::{OutputMode, pretty_kv, render_mode};
use anyhow::Result;
use clap::Args;
use stagegate_core::config::{EffectiveConfig, StoreBackend, WORKSPACE_DIR};
use stagegate_core::model::{MemberRef, OwnerRef};
use stagegate_core::mutate::MutationOutcome;
use stagegate_core::store::{DocumentStore, MemoryStore, SqliteStore};
use stagegate_core::{ErrorCode, Tracker};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Tracker over whichever backend the workspace config selects.
pub type CliTracker = Tracker<Box<dyn DocumentStore>>;

/// Failures owned by the CLI rather than the engine.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("no stagegate workspace at {}", .0.display())]
    NotInitialized(PathBuf),

    #[error("no actor identity for this mutation")]
    MissingActor,
}

impl WorkspaceError {
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized(_) => ErrorCode::NotInitialized,
            Self::MissingActor => ErrorCode::MissingActor,
        }
    }
}

/// Per-invocation state shared by every command.
pub struct Context<'a> {
    pub root: &'a Path,
    pub config: &'a EffectiveConfig,
    pub output: OutputMode,
}

impl Context<'_> {
    /// Open the configured store. The workspace must have been initialized.
    pub fn open_store(&self) -> Result<Box<dyn DocumentStore>> {
        if !self.root.join(WORKSPACE_DIR).is_dir() {
            return Err(WorkspaceError::NotInitialized(self.root.to_path_buf()).into());
        }
        let store_config = &self.config.project.store;
        match store_config.backend {
            StoreBackend::Sqlite => {
                let path = store_config.resolved_path(self.root);
                debug!(path = %path.display(), "opening sqlite store");
                Ok(Box::new(SqliteStore::open(&path)?))
            }
            StoreBackend::Memory => {
                warn!("memory backend selected; nothing persists past this command");
                Ok(Box::new(MemoryStore::new()))
            }
        }
    }

    pub fn open_tracker(&self) -> Result<CliTracker> {
        Ok(Tracker::from_config(self.open_store()?, &self.config.project)?)
    }

    pub fn actor(&self) -> Result<MemberRef> {
        self.config
            .resolved_actor
            .as_deref()
            .map(MemberRef::new)
            .ok_or_else(|| WorkspaceError::MissingActor.into())
    }
}

/// Addresses one product under an order or warranty claim.
#[derive(Args, Debug, Clone)]
pub struct ProductArgs {
    /// Order code (or warranty claim code with `--warranty`).
    pub owner: String,

    /// Product id under the owner record.
    pub product: String,

    /// Treat OWNER as a warranty claim code.
    #[arg(long)]
    pub warranty: bool,
}

impl ProductArgs {
    pub fn owner_ref(&self) -> OwnerRef {
        owner_ref(&self.owner, self.warranty)
    }
}

pub fn owner_ref(code: &str, warranty: bool) -> OwnerRef {
    if warranty {
        OwnerRef::warranty_claim(code)
    } else {
        OwnerRef::order(code)
    }
}

/// Shared rendering for every mutation command.
pub fn render_outcome(
    output: OutputMode,
    verb: &str,
    outcome: &MutationOutcome,
) -> Result<()> {
    render_mode(
        output,
        outcome,
        |o, w| {
            writeln!(
                w,
                "{}\t{}\t{}\t{}",
                if o.written { verb } else { "unchanged" },
                o.stage_id,
                o.stage_status,
                o.progress
            )
        },
        |o, w| {
            if o.written {
                writeln!(w, "✓ {verb}: stage {} is now {}", o.stage_id, o.stage_status)?;
            } else {
                writeln!(w, "· nothing to do: stage {} already in that state", o.stage_id)?;
            }
            pretty_kv(w, "Progress", o.progress.to_string())?;
            if o.next_unlocked {
                writeln!(w, "  next stage unlocked")?;
            }
            Ok(())
        },
    )
}
