use anyhow::Result;
use clap::Args;
use std::io::{self, Write};

use super::Context;
use crate::output::{self, OutputMode};

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Workflow id.
    pub project_id: String,
}

fn render_ids(ids: &[String], w: &mut dyn Write) -> io::Result<()> {
    for id in ids {
        writeln!(w, "{id}")?;
    }
    Ok(())
}

pub fn run_ready(args: &PlanArgs, output: OutputMode, ctx: &Context) -> Result<()> {
    let ready = ctx.service()?.ready_tasks(&args.project_id)?;
    output::render_mode(
        output,
        &ready,
        |ids, w| render_ids(ids, w),
        |ids, w| {
            output::pretty_section(w, &format!("Ready in {} ({})", args.project_id, ids.len()))?;
            render_ids(ids, w)
        },
    )
}

pub fn run_order(args: &PlanArgs, output: OutputMode, ctx: &Context) -> Result<()> {
    let order = ctx.service()?.execution_order(&args.project_id)?;
    output::render_mode(
        output,
        &order,
        |ids, w| render_ids(ids, w),
        |ids, w| {
            output::pretty_section(w, &format!("Execution order for {}", args.project_id))?;
            for (step, id) in ids.iter().enumerate() {
                writeln!(w, "{:>3}. {id}", step + 1)?;
            }
            Ok(())
        },
    )
}
