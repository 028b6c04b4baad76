use crate::output::{mark, print_json};
use crate::session::{Globals, Session};
use anyhow::Context;
use console::style;
use serde::Serialize;
use shipit_core::exec::ExecOptions;
use shipit_core::git::BranchStatus;
use shipit_core::registry::alias;
use shipit_core::remediation::{smart_build_fix, FixOptions, RemediationOutcome};
use shipit_core::workspace::Workspace;

#[derive(Serialize)]
struct Environment {
    root: String,
    package_manager: String,
    git: bool,
    docker: bool,
    docker_daemon: bool,
    branch: Option<BranchStatus>,
    workspaces: Vec<String>,
    changed_workspaces: Vec<String>,
}

#[derive(Serialize)]
struct Diagnosis<'a> {
    environment: &'a Environment,
    outcome: &'a RemediationOutcome,
}

pub fn run(globals: &Globals) -> anyhow::Result<()> {
    let session = Session::open(globals)?;
    let ctx = session.ctx();

    let git = which::which("git").is_ok();
    let docker = which::which("docker").is_ok();
    let docker_daemon = docker
        && ctx
            .run_with(
                alias::DOCKER_INFO,
                &[("format", "{{.ServerVersion}}")],
                "docker info",
                &ExecOptions::silent(),
            )?
            .ok;

    let branch = match ctx.branch_status() {
        Ok(status) => Some(status),
        Err(e) => {
            tracing::warn!(error = %e, "branch status unavailable");
            None
        }
    };

    let workspaces = session.inventory.list().context("failed to read workspaces")?;
    let changed = session
        .inventory
        .changed_files(ctx.exec, ctx.registry)
        .and_then(|files| session.inventory.changed_workspaces(&files))
        .context("failed to find changed workspaces")?;

    let env = Environment {
        root: session.root.display().to_string(),
        package_manager: session.registry.package_manager().to_string(),
        git,
        docker,
        docker_daemon,
        branch,
        workspaces: workspaces.iter().map(Workspace::display_location).collect(),
        changed_workspaces: changed.iter().map(Workspace::display_location).collect(),
    };
    if !globals.json {
        print_environment(&env);
    }

    let opts = FixOptions {
        skip_consult: true,
        interactive: false,
        label: Some("diagnose".to_string()),
    };
    let outcome = smart_build_fix(&ctx, &opts).context("build remediation failed")?;

    if globals.json {
        print_json(&Diagnosis {
            environment: &env,
            outcome: &outcome,
        })?;
    } else {
        super::print_outcome(&outcome);
    }
    super::outcome_result(&outcome)
}

fn print_environment(env: &Environment) {
    println!("{}", style("Environment").bold());
    println!("  root             {}", env.root);
    println!("  package manager  {}", env.package_manager);
    println!("  git              {}", mark(env.git));
    println!(
        "  docker           {} (daemon {})",
        mark(env.docker),
        mark(env.docker_daemon)
    );
    match &env.branch {
        Some(b) => {
            let upstream = b.upstream.as_deref().unwrap_or("no upstream");
            println!(
                "  branch           {} [{upstream}] ahead {} behind {}",
                b.name, b.ahead, b.behind
            );
        }
        None => println!("  branch           unavailable"),
    }
    println!("  workspaces       {}", env.workspaces.join(", "));
    println!("  changed          {}", env.changed_workspaces.join(", "));
}
