//! `sg show`: the tracking view of one product.
//!
//! A malformed product record is shown with an empty process (the warning
//! goes to the log); only an unknown product or a store fault fails.

use super::{Context, ProductArgs};
use crate::output::{pretty_kv, pretty_rule, render_mode};
use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use clap::Args;
use stagegate_core::model::StageStatus;
use stagegate_core::view::{StageView, TrackingView};
use std::io::{self, Write};

#[derive(Args, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    pub product: ProductArgs,
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

const fn status_marker(status: StageStatus, unlockable: bool) -> &'static str {
    match status {
        StageStatus::Finish => "✓",
        StageStatus::Error => "!",
        StageStatus::Process => "▶",
        StageStatus::Wait if unlockable => "·",
        StageStatus::Wait => "🔒",
    }
}

/// # Errors
///
/// Returns an error if the product does not exist or the store fails.
pub fn run_show(args: &ShowArgs, ctx: &Context<'_>) -> Result<()> {
    let tracker = ctx.open_tracker()?;
    let view = tracker.tracking_view(&args.product.owner_ref(), &args.product.product)?;
    render_mode(ctx.output, &view, render_show_text, render_show_human)
}

/// One tab-separated row per task; stages without tasks get a row with
/// empty task columns.
fn render_show_text(view: &TrackingView, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "{}\t{}\t{}\t{}",
        view.owner, view.product_id, view.shape, view.progress
    )?;
    for stage in &view.stages {
        if stage.tasks.is_empty() {
            writeln!(w, "{}\t{}\t{}\t\t\t", stage.id, stage.status, stage.unlockable)?;
        }
        for task in &stage.tasks {
            writeln!(
                w,
                "{}\t{}\t{}\t{}\t{}\t{}",
                stage.id,
                stage.status,
                stage.unlockable,
                task.id,
                if task.checked { "x" } else { "-" },
                task.name
            )?;
        }
    }
    Ok(())
}

fn render_stage_human(stage: &StageView, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "{} {}  [{}]  {}/{}",
        status_marker(stage.status, stage.unlockable),
        stage.name,
        stage.status,
        stage.checked,
        stage.total
    )?;
    if let Some(department) = &stage.department {
        writeln!(w, "    department: {department}")?;
    }
    if !stage.assignees.is_empty() {
        writeln!(w, "    assigned:   {}", stage.assignees.join(", "))?;
    }
    if let Some(defect) = &stage.defect {
        let note = defect.note.as_deref().unwrap_or("no note");
        writeln!(
            w,
            "    defect:     {note} ({}, {})",
            defect.reported_by,
            local_time(defect.reported_at)
        )?;
    }
    for task in &stage.tasks {
        let mark = if task.checked { "[x]" } else { "[ ]" };
        write!(w, "    {mark} {}", task.name)?;
        if let (Some(by), Some(at)) = (&task.checked_by, task.checked_at) {
            write!(w, "  ({by}, {})", local_time(at))?;
        }
        writeln!(w)?;
        if let Some(notes) = &task.notes {
            writeln!(w, "        {notes}")?;
        }
    }
    Ok(())
}

fn render_show_human(view: &TrackingView, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{} · product {}", view.owner, view.product_id)?;
    pretty_rule(w)?;
    pretty_kv(w, "Shape", view.shape.as_str())?;
    pretty_kv(w, "Progress", view.progress.to_string())?;
    let current = match (&view.progress.current_stage, view.progress.complete) {
        (Some(cursor), _) => format!("{} [{}]", cursor.name, cursor.status),
        (None, true) => "complete".to_string(),
        (None, false) => "none".to_string(),
    };
    pretty_kv(w, "Current", current)?;

    if view.stages.is_empty() {
        writeln!(w)?;
        writeln!(w, "No process registered for this product.")?;
        return Ok(());
    }

    writeln!(w)?;
    for stage in &view.stages {
        render_stage_human(stage, w)?;
    }
    Ok(())
}
