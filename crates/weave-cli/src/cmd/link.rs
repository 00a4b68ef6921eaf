use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::io::Write;

use super::Context;
use crate::output::{self, OutputMode};

#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Workflow id.
    pub project_id: String,

    /// Dependent task.
    pub task_id: String,

    /// Task it depends on.
    pub depends_on: String,
}

#[derive(Debug, Serialize)]
struct Linked<'a> {
    task_id: &'a str,
    depends_on: &'a str,
    added: bool,
}

pub fn run_link(args: &LinkArgs, output: OutputMode, ctx: &Context) -> Result<()> {
    let added = ctx
        .service()?
        .add_dependency(&args.project_id, &args.task_id, &args.depends_on)?;
    let linked = Linked {
        task_id: &args.task_id,
        depends_on: &args.depends_on,
        added,
    };
    output::render(output, &linked, |l, w| {
        if l.added {
            writeln!(w, "{} now depends on {}", l.task_id, l.depends_on)
        } else {
            writeln!(w, "{} already depends on {}", l.task_id, l.depends_on)
        }
    })
}
