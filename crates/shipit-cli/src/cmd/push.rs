use crate::output::{print_json, print_list};
use crate::session::{Globals, Session};
use anyhow::Context;
use console::style;
use shipit_core::answers::{self, PushOptions};
use shipit_core::commit_message::LayeredProvider;
use shipit_core::push_flow::run_push;
use std::path::Path;

/// Flag values; each one overrides the answers file.
pub struct Flags {
    pub prefix: Option<String>,
    pub branch: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
}

pub fn run(globals: &Globals, answers_file: Option<&Path>, flags: Flags) -> anyhow::Result<()> {
    let from_file = match answers_file {
        Some(path) => answers::load(path)?,
        None => PushOptions::default(),
    };
    let options = from_file.overlay(PushOptions {
        branch_prefix: flags.prefix,
        branch_name: flags.branch,
        commit_first_line: flags.subject,
        commit_body: flags.body,
    });
    tracing::debug!(?options, "push options");

    let session = Session::open(globals)?;
    let report = run_push(&session.ctx(), &options, &LayeredProvider::from_env())
        .context("push aborted")?;

    if globals.json {
        return print_json(&report);
    }
    if report.pushed {
        println!();
        print_list("Commands", &report.commands);
        println!();
        println!(
            "{} pushed {}",
            style("✓").green(),
            style(&report.branch).bold()
        );
    } else {
        println!("{} on {}", report.note, style(&report.branch).bold());
    }
    Ok(())
}
