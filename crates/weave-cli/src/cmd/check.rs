use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::io::Write;

use super::Context;
use crate::output::{self, OutputMode};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Workflow id.
    pub project_id: String,

    /// Task whose dependencies are checked.
    pub task_id: String,
}

#[derive(Args, Debug)]
pub struct TaskIdArgs {
    /// Task id, looked up across all workflows.
    pub task_id: String,
}

pub fn run_check(args: &CheckArgs, output: OutputMode, ctx: &Context) -> Result<()> {
    let check = ctx
        .service()?
        .check_task_dependencies(&args.project_id, &args.task_id)?;
    output::render_mode(
        output,
        &check,
        |c, w| {
            writeln!(w, "{}", if c.all_dependencies_met { "met" } else { "unmet" })?;
            for id in &c.unmet {
                writeln!(w, "{id}")?;
            }
            Ok(())
        },
        |c, w| {
            if c.all_dependencies_met {
                writeln!(w, "✓ All dependencies of {} are met", args.task_id)
            } else {
                writeln!(w, "✗ {} is waiting on: {}", args.task_id, c.unmet.join(", "))
            }
        },
    )
}

#[derive(Debug, Serialize)]
struct Flag<'a> {
    task_id: &'a str,
    #[serde(flatten)]
    value: FlagValue,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum FlagValue {
    Blocked(bool),
    Exists(bool),
}

impl FlagValue {
    const fn get(&self) -> bool {
        match self {
            Self::Blocked(v) | Self::Exists(v) => *v,
        }
    }
}

fn render_flag(flag: &Flag<'_>, output: OutputMode) -> Result<()> {
    output::render(output, flag, |f, w| writeln!(w, "{}", f.value.get()))
}

pub fn run_blocked(args: &TaskIdArgs, output: OutputMode, ctx: &Context) -> Result<()> {
    let blocked = ctx.service()?.is_task_blocked(&args.task_id)?;
    render_flag(
        &Flag {
            task_id: &args.task_id,
            value: FlagValue::Blocked(blocked),
        },
        output,
    )
}

pub fn run_exists(args: &TaskIdArgs, output: OutputMode, ctx: &Context) -> Result<()> {
    let exists = ctx.service()?.task_exists(&args.task_id)?;
    render_flag(
        &Flag {
            task_id: &args.task_id,
            value: FlagValue::Exists(exists),
        },
        output,
    )
}
