mod cmd;
mod output;
mod session;
mod ui;

use clap::{Parser, Subcommand};
use session::Globals;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "shipit",
    about = "Get dirty local changes onto origin: rebase, repair the build, check, commit, push",
    version,
    propagate_version = true
)]
struct Cli {
    /// Repository root (default: walk up to the nearest .git)
    #[arg(long, global = true, env = "SHIPIT_ROOT")]
    root: Option<PathBuf>,

    /// Stream every command's output and enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, short = 'j', global = true)]
    json: bool,

    /// Never prompt; every question takes its default
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the environment, then try to get the build passing without prompts
    Diagnose,

    /// Repair the build, escalating step by step
    Fix {
        /// Do not consult the assistant when every repair fails
        #[arg(long)]
        no_consult: bool,
    },

    /// Run lint --fix, type-check, scoped tests and the index guard
    Prepush,

    /// Stash, rebase, fix, check, commit and push the current work
    Push {
        /// JSON/YAML file with branchPrefix/branchName/commitFirstLine/commitBody
        #[arg(long)]
        answers: Option<PathBuf>,

        /// Branch prefix (feat, fix, chore, ...)
        #[arg(long)]
        prefix: Option<String>,

        /// Branch name slug
        #[arg(long)]
        branch: Option<String>,

        /// Commit subject line
        #[arg(long)]
        subject: Option<String>,

        /// Commit body
        #[arg(long)]
        body: Option<String>,
    },

    /// Talk to the assistant about the repository
    Chat,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let globals = Globals::resolve(cli.root.as_deref(), cli.verbose, cli.json, cli.non_interactive);

    let result = match cli.command {
        Commands::Diagnose => cmd::diagnose::run(&globals),
        Commands::Fix { no_consult } => cmd::fix::run(&globals, no_consult),
        Commands::Prepush => cmd::prepush::run(&globals),
        Commands::Push {
            answers,
            prefix,
            branch,
            subject,
            body,
        } => cmd::push::run(
            &globals,
            answers.as_deref(),
            cmd::push::Flags {
                prefix,
                branch,
                subject,
                body,
            },
        ),
        Commands::Chat => cmd::chat::run(&globals),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
