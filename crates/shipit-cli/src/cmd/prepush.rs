use crate::output::{mark, print_json};
use crate::session::{Globals, Session};
use anyhow::Context;
use shipit_core::prepush::{run_prepush, PrepushOptions};

pub fn run(globals: &Globals) -> anyhow::Result<()> {
    let session = Session::open(globals)?;
    let report =
        run_prepush(&session.ctx(), PrepushOptions::default()).context("prepush checks errored")?;

    if globals.json {
        print_json(&report)?;
    } else {
        for check in &report.checks {
            println!("{} {:<12} {}", mark(check.ok), check.kind.as_str(), check.detail);
        }
    }

    if !report.ok {
        anyhow::bail!("{}", report.describe());
    }
    Ok(())
}
