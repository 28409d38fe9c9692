//! Domain models shared across the repository, engine and server layers.

mod payload;
mod queue_item;
mod step;

pub use payload::{
    dedup_key, known_queues, validate_payload, AlbumPayload, PayloadError, SocialPayload,
    StoryPayload, QUEUE_ALBUMS, QUEUE_SOCIAL, QUEUE_STORIES,
};
pub use queue_item::{QueueItem, QueueStatus};
pub use step::{StepRecord, StepStatus};
