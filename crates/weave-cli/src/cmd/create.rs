use anyhow::Result;
use chrono::DateTime;
use clap::Args;
use std::io::Write;

use super::Context;
use crate::output::{self, OutputMode};

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Workflow id, unique in the store.
    pub project_id: String,

    /// Human-readable name.
    pub name: String,
}

pub fn run_create(args: &CreateArgs, output: OutputMode, ctx: &Context) -> Result<()> {
    let service = ctx.service()?;
    let project = service.create_workflow(&args.project_id, &args.name)?;

    output::render_mode(
        output,
        &project,
        |p, w| writeln!(w, "{}\t{}", p.id, p.name),
        |p, w| {
            writeln!(w, "✓ Created workflow {}", p.id)?;
            output::pretty_kv(w, "Name", &p.name)?;
            if let Some(at) = DateTime::from_timestamp_micros(p.created_at_us) {
                output::pretty_kv(w, "Created", at.format("%Y-%m-%d %H:%M:%S UTC").to_string())?;
            }
            Ok(())
        },
    )
}
