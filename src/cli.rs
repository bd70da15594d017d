use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::commands::{self, CommandReport};

#[derive(Debug, Parser)]
#[command(
    name = "essence",
    version,
    about = "Keep an __essence__ conversation tree and its meta.toml index in sync"
)]
pub struct Cli {
    /// Print the report as JSON instead of text lines.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the essence layout and a default meta.toml.
    Init,
    /// Add a new conversation entry with the next free number.
    Create { title: String },
    /// Print the indexed conversations in numeric order.
    List,
    /// Rebuild meta.toml from the conversation directories.
    UpdateIndex,
    /// Check directory names, metadata files, numbering and the index.
    Verify {
        /// Exit non-zero when any issue is found.
        #[arg(long)]
        strict: bool,
    },
    /// Remove invalid entries, close numbering gaps and rebuild the index.
    Cleanup {
        #[arg(long)]
        dry_run: bool,
    },
    /// Rebuild the index whenever a conversation file changes.
    Watch,
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        let rendered =
            serde_json::to_string_pretty(report).context("failed to render report as json")?;
        println!("{rendered}");
        return Ok(());
    }

    for line in &report.details {
        println!("{line}");
    }
    for issue in &report.issues {
        println!("issue: {issue}");
    }
    if !report.ok {
        eprintln!("{}: {} issue(s) found", report.command, report.issues.len());
    }
    Ok(())
}

/// Runs the parsed command; `Ok(false)` means the report carries issues that
/// should fail the process.
pub fn run() -> Result<bool> {
    let cli = Cli::parse();

    // Plain verify reports problems without failing; --strict enforces them.
    let (report, enforce) = match cli.command {
        Command::Init => (commands::init::run()?, true),
        Command::Create { title } => (
            commands::create::run(&commands::create::CreateOptions { title })?,
            true,
        ),
        Command::List => (commands::list::run()?, true),
        Command::UpdateIndex => (commands::update_index::run()?, true),
        Command::Verify { strict } => (
            commands::verify::run(&commands::verify::VerifyOptions { strict })?,
            strict,
        ),
        Command::Cleanup { dry_run } => (
            commands::cleanup::run(&commands::cleanup::CleanupOptions { dry_run })?,
            true,
        ),
        Command::Watch => (commands::watch::run()?, true),
    };

    print_report(&report, cli.json)?;
    Ok(report.ok || !enforce)
}
