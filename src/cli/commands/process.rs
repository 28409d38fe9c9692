//! `wax process` - run dispatcher batches from the command line.

use std::sync::Arc;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::{Config, Settings};
use crate::queue::{BatchOptions, BatchSummary, Dispatcher};
use crate::repository::{ContentRepository, QueueRepository};
use crate::services;

pub async fn run(
    settings: &Settings,
    queue: &str,
    batch_size: Option<usize>,
    watch: bool,
    interval: u64,
) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let config = Config::load(settings).await;

    let db_path = settings.database_path();
    let queue_repo = Arc::new(QueueRepository::new(&db_path)?);
    let content_repo = Arc::new(ContentRepository::new(&db_path)?);
    let registry = services::build_registry(&config, queue_repo.clone(), content_repo.clone());
    let dispatcher = Dispatcher::new(queue_repo, content_repo, registry, config.engine.clone());

    let queues: Vec<String> = if queue == "all" {
        dispatcher
            .registry()
            .queues()
            .iter()
            .map(|q| q.to_string())
            .collect()
    } else {
        vec![queue.to_string()]
    };

    let opts = BatchOptions { batch_size };

    loop {
        for queue in &queues {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} {msg}")
                    .unwrap(),
            );
            pb.set_message(format!("Processing {}...", queue));

            let result = dispatcher.run_batch(queue, &opts).await;
            pb.finish_and_clear();

            match result {
                Ok(summary) => print_summary(queue, &summary),
                Err(e) => println!("{} {}: {}", style("✗").red(), queue, e),
            }
        }

        if !watch {
            break;
        }
        tokio::time::sleep(Duration::from_secs(interval.max(1))).await;
    }

    Ok(())
}

fn print_summary(queue: &str, summary: &BatchSummary) {
    if summary.processed == 0 && summary.skipped == 0 {
        println!("{} {}: nothing to do", style("→").dim(), queue);
        return;
    }

    println!(
        "{} {}: {} processed, {} successful, {} skipped ({}ms)",
        style("✓").green(),
        queue,
        summary.processed,
        summary.successful,
        summary.skipped,
        summary.execution_time_ms
    );

    for result in &summary.results {
        if !result.success {
            println!(
                "  {} {} [{}] {}",
                style("✗").red(),
                result.dedup_key,
                result.status,
                result.error.as_deref().unwrap_or("")
            );
        }
    }
}
