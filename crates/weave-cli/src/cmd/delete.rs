use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::io::Write;

use super::Context;
use crate::output::{self, OutputMode};

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Workflow id.
    pub project_id: String,
}

#[derive(Debug, Serialize)]
struct Deleted<'a> {
    project_id: &'a str,
    tasks: usize,
    edges: usize,
    foreign_edges: usize,
}

pub fn run_delete(args: &DeleteArgs, output: OutputMode, ctx: &Context) -> Result<()> {
    let stats = ctx.service()?.delete_workflow(&args.project_id)?;
    let deleted = Deleted {
        project_id: &args.project_id,
        tasks: stats.tasks,
        edges: stats.edges,
        foreign_edges: stats.foreign_edges,
    };
    output::render(output, &deleted, |d, w| {
        writeln!(
            w,
            "Deleted workflow {} ({} tasks, {} dependencies)",
            d.project_id, d.tasks, d.edges
        )?;
        if d.foreign_edges > 0 {
            writeln!(
                w,
                "  {} dependencies held by other workflows were removed",
                d.foreign_edges
            )?;
        }
        Ok(())
    })
}
