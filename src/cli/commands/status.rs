//! `wax status` - queue counts and recent failures.

use console::style;

use crate::config::Settings;
use crate::models::known_queues;
use crate::repository::QueueRepository;

pub async fn run(settings: &Settings, queue: Option<&str>) -> anyhow::Result<()> {
    let repo = match QueueRepository::new(&settings.database_path()) {
        Ok(r) => r,
        Err(_) => {
            println!(
                "{} System not initialized. Run 'wax init' first.",
                style("!").yellow()
            );
            return Ok(());
        }
    };

    let queues: Vec<String> = match queue {
        Some(q) => vec![q.to_string()],
        None => known_queues().iter().map(|q| q.to_string()).collect(),
    };

    println!("\n{}", style("Waxworks Queue Status").bold());
    println!("{}", "-".repeat(66));
    println!(
        "{:<10} {:>8} {:>10} {:>10} {:>8} {:>8} {:>8}",
        "Queue", "Pending", "Processing", "Completed", "Failed", "Skipped", "Total"
    );
    println!("{}", "-".repeat(66));

    for queue in &queues {
        let stats = repo.queue_stats(queue)?;
        println!(
            "{:<10} {:>8} {:>10} {:>10} {:>8} {:>8} {:>8}",
            queue,
            stats.pending,
            stats.processing,
            stats.completed,
            stats.failed,
            stats.skipped,
            stats.total()
        );
    }

    for queue in &queues {
        let failures = repo.recent_failures(queue, 5)?;
        if failures.is_empty() {
            continue;
        }
        println!("\n{}", style(format!("Recent failures: {}", queue)).bold());
        for item in failures {
            println!(
                "  {} {} (attempts {}) {}",
                style("✗").red(),
                item.dedup_key,
                item.attempts,
                item.error_message.as_deref().unwrap_or("")
            );
        }
    }

    Ok(())
}
