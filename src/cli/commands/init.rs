//! `wax init` - create the data directory and database schema.

use console::style;

use crate::config::{Config, Settings, CONFIG_FILE};
use crate::repository::{AdminRepository, ContentRepository, QueueRepository};

pub async fn run(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    // Initialize repositories (schema is created on construction)
    let db_path = settings.database_path();
    let _queue_repo = QueueRepository::new(&db_path)?;
    let _content_repo = ContentRepository::new(&db_path)?;
    let _admin_repo = AdminRepository::new(&db_path)?;

    let config = Config::load(settings).await;
    println!(
        "  {} Engine: ceiling {}, batch {} (max {})",
        style("→").dim(),
        config.engine.max_attempts,
        config.engine.default_batch_size,
        config.engine.max_batch_size
    );

    if !std::path::Path::new(CONFIG_FILE).exists() {
        println!(
            "{} No {} found - running on defaults",
            style("!").yellow(),
            CONFIG_FILE
        );
        println!("  Create one to point the adapters at real endpoints");
    }

    println!(
        "{} Initialized Waxworks in {}",
        style("✓").green(),
        settings.data_dir.display()
    );

    Ok(())
}
