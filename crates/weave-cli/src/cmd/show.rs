use anyhow::Result;
use clap::Args;
use std::io::{self, Write};

use weave_core::model::{Workflow, WorkflowSummary};

use super::Context;
use crate::output::{self, OutputMode};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Workflow id.
    pub project_id: String,
}

pub fn run_show(args: &ShowArgs, output: OutputMode, ctx: &Context) -> Result<()> {
    let workflow = ctx.service()?.get_workflow(&args.project_id)?;
    output::render_mode(output, &workflow, render_workflow_text, render_workflow_pretty)
}

/// One row per task: `id  status  deps(comma-separated)  name`.
fn render_workflow_text(workflow: &Workflow, w: &mut dyn Write) -> io::Result<()> {
    for task in &workflow.tasks {
        writeln!(
            w,
            "{}\t{}\t{}\t{}",
            task.id,
            task.status,
            task.dependencies.join(","),
            task.name
        )?;
    }
    Ok(())
}

fn render_workflow_pretty(workflow: &Workflow, w: &mut dyn Write) -> io::Result<()> {
    output::pretty_section(
        w,
        &format!("{} ({})", workflow.project_name, workflow.project_id),
    )?;
    if workflow.tasks.is_empty() {
        return writeln!(w, "(no tasks)");
    }
    for task in &workflow.tasks {
        writeln!(w, "{:<12} {:<12} {}", task.id, task.status, task.name)?;
        if !task.description.is_empty() {
            writeln!(w, "{:<25} {}", "", task.description)?;
        }
        if !task.dependencies.is_empty() {
            writeln!(w, "{:<25} depends on: {}", "", task.dependencies.join(", "))?;
        }
    }
    Ok(())
}

pub fn run_list(output: OutputMode, ctx: &Context) -> Result<()> {
    let workflows = ctx.service()?.list_workflows()?;
    output::render_mode(
        output,
        &workflows,
        |rows, w| {
            for row in rows {
                writeln!(w, "{}\t{}\t{}", row.project_id, row.task_count, row.project_name)?;
            }
            Ok(())
        },
        |rows, w| render_list_pretty(rows, w),
    )
}

fn render_list_pretty(rows: &[WorkflowSummary], w: &mut dyn Write) -> io::Result<()> {
    output::pretty_section(w, &format!("Workflows ({})", rows.len()))?;
    for row in rows {
        writeln!(
            w,
            "{:<16} {:>5} tasks  {}",
            row.project_id, row.task_count, row.project_name
        )?;
    }
    Ok(())
}
