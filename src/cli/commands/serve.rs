//! `wax serve` - start the batch API server.

use console::style;

use crate::config::{Config, Settings};
use crate::server;

pub async fn run(settings: &Settings, bind: Option<&str>) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let config = Config::load(settings).await;

    let bind = bind.unwrap_or(&settings.bind).to_string();

    println!(
        "{} Serving batch API at http://{}",
        style("→").cyan(),
        bind
    );
    server::serve(settings, &config, &bind).await
}
