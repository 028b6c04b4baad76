use crate::output::print_json;
use crate::session::{Globals, Session};
use anyhow::Context;
use shipit_core::remediation::{smart_build_fix, FixOptions};
use shipit_core::ui::Ui;

pub fn run(globals: &Globals, no_consult: bool) -> anyhow::Result<()> {
    let session = Session::open(globals)?;
    let ctx = session.ctx();
    let opts = FixOptions {
        skip_consult: no_consult,
        interactive: ctx.ui.interactive(),
        label: Some("fix".to_string()),
    };

    let outcome = smart_build_fix(&ctx, &opts).context("build remediation failed")?;

    if globals.json {
        print_json(&outcome)?;
    } else {
        super::print_outcome(&outcome);
    }
    super::outcome_result(&outcome)
}
