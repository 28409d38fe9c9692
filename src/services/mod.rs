//! Domain processors - the pipelines behind each queue.

mod albums;
mod social;
mod stories;

pub use albums::AlbumProcessor;
pub use social::SocialProcessor;
pub use stories::StoryProcessor;

use std::sync::Arc;

use crate::adapters::{
    GenerationClient, ImageStoreClient, MarketplaceClient, SocialClient, Throttle,
};
use crate::config::Config;
use crate::queue::ProcessorRegistry;
use crate::repository::{ContentRepository, QueueRepository};

/// Wire every domain processor against the shared adapters and repos.
pub fn build_registry(
    config: &Config,
    queue_repo: Arc<QueueRepository>,
    content_repo: Arc<ContentRepository>,
) -> ProcessorRegistry {
    let throttle = Throttle::from_millis(
        config.engine.step_delay_ms,
        config.engine.rate_limit_cooldown_secs,
    );

    let generation = Arc::new(GenerationClient::new(config.generation.clone()));
    let images = Arc::new(ImageStoreClient::new(
        config.images.clone(),
        throttle.clone(),
    ));
    let marketplace = Arc::new(MarketplaceClient::new(
        config.marketplace.clone(),
        throttle.clone(),
    ));
    let social = Arc::new(SocialClient::new(config.social.clone(), throttle));

    let mut registry = ProcessorRegistry::new();
    registry.register(Arc::new(AlbumProcessor::new(
        marketplace.clone(),
        content_repo.clone(),
    )));
    registry.register(Arc::new(StoryProcessor::new(
        generation,
        images,
        content_repo.clone(),
        queue_repo.clone(),
    )));
    registry.register(Arc::new(SocialProcessor::new(
        social,
        queue_repo,
        content_repo,
    )));
    registry
}
