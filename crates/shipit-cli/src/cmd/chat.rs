use crate::session::{Globals, Session};
use shipit_assistant::{ChatSession, Escalation};
use shipit_core::ui::Ui;

pub fn run(globals: &Globals) -> anyhow::Result<()> {
    let session = Session::open(globals)?;
    if !session.config.assistant.enabled {
        anyhow::bail!("the assistant is disabled in configuration (assistant.enabled: false)");
    }
    if !session.ui.interactive() {
        anyhow::bail!("chat needs an interactive terminal");
    }

    let escalation = Escalation::from_config(&session.config.assistant);
    ChatSession::new(&escalation).run(&session.ui, &session.exec);
    Ok(())
}
