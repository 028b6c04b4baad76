pub mod chat;
pub mod diagnose;
pub mod fix;
pub mod prepush;
pub mod push;

use crate::output::{mark, print_list};
use shipit_core::recorder::summarize_commands;
use shipit_core::remediation::RemediationOutcome;

/// Shared text rendering of an engine run for `fix` and `diagnose`.
fn print_outcome(outcome: &RemediationOutcome) {
    println!();
    print_list("Steps", &outcome.steps);
    if outcome.ok {
        print_list("Commands", &summarize_commands(&outcome.commands));
    }
    println!();
    println!("{} {}", mark(outcome.ok), outcome.summary);
}

/// Turn a failed outcome into the process error.
fn outcome_result(outcome: &RemediationOutcome) -> anyhow::Result<()> {
    if let Some(message) = &outcome.blocked_message {
        anyhow::bail!("{message}");
    }
    if !outcome.ok {
        anyhow::bail!("build is still failing after {} attempt(s)", outcome.attempts);
    }
    Ok(())
}
