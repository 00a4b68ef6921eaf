use anyhow::Result;
use clap::Args;
use std::io::Write;

use weave_core::model::NewTask;

use super::Context;
use crate::output::{self, OutputMode};

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Workflow id.
    pub project_id: String,

    /// Task id, unique across the store.
    pub task_id: String,

    /// Task name.
    #[arg(long)]
    pub name: String,

    /// Free-form description.
    #[arg(long, default_value = "")]
    pub description: String,

    /// Existing task this one depends on (repeatable).
    #[arg(long = "dep", value_name = "TASK")]
    pub deps: Vec<String>,

    /// Create the task in the blocked state.
    #[arg(long)]
    pub blocked: bool,
}

impl AddArgs {
    fn to_new_task(&self) -> NewTask {
        NewTask::new(&self.task_id, &self.name)
            .with_description(&self.description)
            .depends_on(&self.deps)
            .blocked(self.blocked)
    }
}

pub fn run_add(args: &AddArgs, output: OutputMode, ctx: &Context) -> Result<()> {
    let service = ctx.service()?;
    let task = service.add_task(&args.project_id, &args.to_new_task())?;

    output::render_mode(
        output,
        &task,
        |t, w| writeln!(w, "{}\t{}\t{}", t.id, t.status, t.name),
        |t, w| {
            writeln!(w, "✓ Added {} to {}", t.id, t.project_id)?;
            output::pretty_kv(w, "Name", &t.name)?;
            output::pretty_kv(w, "Status", t.status.as_str())?;
            if !args.deps.is_empty() {
                output::pretty_kv(w, "Depends on", args.deps.join(", "))?;
            }
            Ok(())
        },
    )
}
