use anyhow::Result;
use clap::Args;
use std::io::{self, Write};

use weave_core::db::StatusChange;
use weave_core::model::TaskStatus;

use super::Context;
use crate::output::{self, OutputMode};

#[derive(Args, Debug)]
pub struct TaskRef {
    /// Workflow id.
    pub project_id: String,

    /// Task id.
    pub task_id: String,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub task: TaskRef,

    /// New status: pending, in_progress, done or blocked.
    pub status: TaskStatus,
}

pub fn run_status(args: &StatusArgs, output: OutputMode, ctx: &Context) -> Result<()> {
    let change = ctx.service()?.set_task_status(
        &args.task.project_id,
        &args.task.task_id,
        args.status,
    )?;
    output::render(output, &change, render_change)
}

/// `wv block` / `wv unblock`.
pub fn run_block(task: &TaskRef, blocked: bool, output: OutputMode, ctx: &Context) -> Result<()> {
    let change = ctx
        .service()?
        .set_task_blocked(&task.project_id, &task.task_id, blocked)?;
    output::render(output, &change, render_change)
}

fn render_change(change: &StatusChange, w: &mut dyn Write) -> io::Result<()> {
    if change.changed() {
        writeln!(w, "{}: {} -> {}", change.task_id, change.from, change.to)
    } else {
        writeln!(w, "{}: already {}", change.task_id, change.to)
    }
}
