//! Admin maintenance commands: retry-failed, cleanup, token management.

use std::io::{self, Write};

use console::style;

use crate::config::Settings;
use crate::repository::{AdminRepository, QueueRepository};

pub async fn retry_failed(settings: &Settings, queue: &str) -> anyhow::Result<()> {
    let repo = QueueRepository::new(&settings.database_path())?;
    let reset = repo.retry_failed(queue)?;

    if reset == 0 {
        println!("{} No failed items on '{}'", style("!").yellow(), queue);
    } else {
        println!(
            "{} Reset {} failed items on '{}' to pending",
            style("✓").green(),
            reset,
            queue
        );
    }
    Ok(())
}

pub async fn cleanup(settings: &Settings, days: u32, confirm: bool) -> anyhow::Result<()> {
    if !confirm {
        println!(
            "{} This will permanently delete completed/failed/skipped items older than {} days.",
            style("!").yellow(),
            days
        );
        print!("Proceed? [y/N] ");
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("{} Cancelled", style("!").yellow());
            return Ok(());
        }
    }

    let repo = QueueRepository::new(&settings.database_path())?;
    let removed = repo.cleanup_terminal(days)?;
    println!(
        "{} Removed {} terminal items older than {} days",
        style("✓").green(),
        removed,
        days
    );
    Ok(())
}

pub async fn token_create(settings: &Settings, label: &str, admin: bool) -> anyhow::Result<()> {
    let repo = AdminRepository::new(&settings.database_path())?;
    let token = repo.create_token(label, admin)?;

    println!("{} Created token '{}'", style("✓").green(), label);
    println!("  {} {}", style("Token:").bold(), token);
    println!(
        "  {} This is shown once - store it somewhere safe",
        style("!").yellow()
    );
    if !admin {
        println!(
            "  {} Token has no admin role and cannot call /api/admin endpoints",
            style("→").dim()
        );
    }
    Ok(())
}

pub async fn token_list(settings: &Settings) -> anyhow::Result<()> {
    let repo = AdminRepository::new(&settings.database_path())?;
    let tokens = repo.list_tokens()?;

    if tokens.is_empty() {
        println!("{} No tokens created yet", style("!").yellow());
        return Ok(());
    }

    println!("\n{}", style("Admin Tokens").bold());
    println!("{}", "-".repeat(40));
    for (label, is_admin) in tokens {
        let role = if is_admin {
            style("admin").green().to_string()
        } else {
            style("none").dim().to_string()
        };
        println!("{:<30} {}", label, role);
    }
    Ok(())
}
