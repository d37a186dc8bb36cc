//! stagegate-core library.
//!
//! Tracks products through an ordered sequence of processing stages stored
//! in a shared document tree. Reads normalize either stored shape into one
//! [`model::ProcessGraph`]; gating and progress are derived from it on every
//! read; mutations re-read, check the gate and write a minimal patch.
//!
//! Layers, leaves first:
//!
//! - [`directory`]: member and department display names
//! - [`normalize`]: stored record to canonical graph
//! - [`gate`]: per-stage unlock state and derived status
//! - [`mutate`]: validated mutations planned as store patches
//! - [`progress`]: completion percent and current stage
//! - [`tracker`]: the above over a [`store::DocumentStore`]
//!
//! # Conventions
//!
//! - **Errors**: `thiserror` enums per layer, [`error::TrackError`] at the
//!   facade; `anyhow::Result` only for config loading.
//! - **Logging**: `tracing` macros with `owner`, `product`, `stage` and `task`
//!   fields.

pub mod config;
pub mod directory;
pub mod error;
pub mod gate;
pub mod model;
pub mod mutate;
pub mod normalize;
pub mod progress;
pub mod record;
pub mod store;
pub mod tracker;
pub mod view;

pub use error::{ErrorCode, NotFoundKind, TrackError};
pub use tracker::Tracker;
