//! Album enrichment pipeline.
//!
//! Waits until the artwork pipeline has filled in `artwork_url`, then
//! resolves the release on the marketplace and creates a shop listing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::adapters::{MarketplaceClient, MarketplaceMatch};
use crate::models::{AlbumPayload, QueueItem, QUEUE_ALBUMS};
use crate::queue::{ItemProcessor, ProcessError};
use crate::repository::{ContentRepository, Listing};

/// Fallback price when the marketplace has no price history.
const DEFAULT_PRICE_CENTS: i64 = 2999;

pub struct AlbumProcessor {
    marketplace: Arc<MarketplaceClient>,
    content: Arc<ContentRepository>,
}

impl AlbumProcessor {
    pub fn new(marketplace: Arc<MarketplaceClient>, content: Arc<ContentRepository>) -> Self {
        Self {
            marketplace,
            content,
        }
    }

    fn payload(item: &QueueItem) -> Result<AlbumPayload, ProcessError> {
        serde_json::from_value(item.payload.clone())
            .map_err(|e| ProcessError::Permanent(format!("malformed payload: {}", e)))
    }
}

#[async_trait]
impl ItemProcessor for AlbumProcessor {
    fn queue(&self) -> &'static str {
        QUEUE_ALBUMS
    }

    fn steps(&self) -> &[&'static str] {
        &["marketplace_lookup", "create_listing"]
    }

    /// Readiness predicate: enrichment needs artwork first.
    fn ready(&self, item: &QueueItem) -> bool {
        item.payload
            .get("artwork_url")
            .and_then(|v| v.as_str())
            .map(|s| !s.is_empty())
            .unwrap_or(false)
    }

    async fn run_step(
        &self,
        step: &str,
        item: &QueueItem,
        completed: &HashMap<String, serde_json::Value>,
    ) -> Result<serde_json::Value, ProcessError> {
        let payload = Self::payload(item)?;

        match step {
            "marketplace_lookup" => {
                let matches = self
                    .marketplace
                    .search(&payload.artist, &payload.title)
                    .await?;

                let best = pick_release(&matches, payload.discogs_id.as_deref()).ok_or_else(
                    || {
                        ProcessError::Permanent(format!(
                            "no marketplace match for {} - {}",
                            payload.artist, payload.title
                        ))
                    },
                )?;

                Ok(json!({
                    "release_id": best.id.clone(),
                    "year": best.year,
                    "price_cents": listing_price(best),
                }))
            }
            "create_listing" => {
                let lookup = completed.get("marketplace_lookup").ok_or_else(|| {
                    ProcessError::Transient("missing marketplace_lookup result".to_string())
                })?;
                let release_id = lookup
                    .get("release_id")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| {
                        ProcessError::Permanent("lookup result missing release_id".to_string())
                    })?;
                let price_cents = lookup
                    .get("price_cents")
                    .and_then(|v| v.as_i64())
                    .unwrap_or(DEFAULT_PRICE_CENTS);

                let description = format!(
                    "{} - {} (from the Waxworks collection)",
                    payload.artist, payload.title
                );
                let marketplace_ref = self
                    .marketplace
                    .create_listing(release_id, &description, price_cents)
                    .await?;

                let mut listing =
                    Listing::new(&item.dedup_key, &payload.artist, &payload.title);
                listing.marketplace_ref = Some(marketplace_ref.clone());
                listing.price_cents = Some(price_cents);
                self.content
                    .save_listing(&listing)
                    .map_err(|e| ProcessError::Transient(e.to_string()))?;

                info!(
                    "Listed {} - {} as {}",
                    payload.artist, payload.title, marketplace_ref
                );
                Ok(json!({
                    "listing_id": listing.id,
                    "marketplace_ref": marketplace_ref,
                }))
            }
            other => Err(ProcessError::Permanent(format!("unknown step '{}'", other))),
        }
    }
}

/// Prefer an exact catalog-id match, then the oldest priced release.
fn pick_release<'a>(
    matches: &'a [MarketplaceMatch],
    discogs_id: Option<&str>,
) -> Option<&'a MarketplaceMatch> {
    if let Some(id) = discogs_id {
        if let Some(exact) = matches.iter().find(|m| m.id == id) {
            return Some(exact);
        }
    }
    matches
        .iter()
        .filter(|m| m.lowest_price_cents.is_some())
        .min_by_key(|m| m.year.unwrap_or(u32::MAX))
        .or_else(|| matches.first())
}

fn listing_price(release: &MarketplaceMatch) -> i64 {
    release.lowest_price_cents.unwrap_or(DEFAULT_PRICE_CENTS)
}
