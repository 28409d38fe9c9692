//! Content repository - the downstream tables the queues write into.
//!
//! Stories and shop listings are the side-effect targets of the story
//! and album pipelines, and the dedup pre-check consults them so work
//! that already produced content is never enqueued again.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{parse_datetime, to_option, Result};

/// A generated collector story.
#[derive(Debug, Clone)]
pub struct Story {
    pub id: String,
    pub dedup_key: String,
    pub slug: String,
    pub artist: String,
    pub title: String,
    pub body: String,
    pub hero_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Story {
    pub fn new(dedup_key: &str, artist: &str, title: &str, body: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            dedup_key: dedup_key.to_string(),
            slug: slugify(&format!("{} {}", artist, title)),
            artist: artist.to_string(),
            title: title.to_string(),
            body,
            hero_image_url: None,
            created_at: Utc::now(),
        }
    }
}

/// A shop listing, optionally tied to a story.
#[derive(Debug, Clone)]
pub struct Listing {
    pub id: String,
    pub dedup_key: String,
    pub slug: String,
    pub artist: String,
    pub title: String,
    pub story_id: Option<String>,
    pub marketplace_ref: Option<String>,
    pub price_cents: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Listing {
    pub fn new(dedup_key: &str, artist: &str, title: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            dedup_key: dedup_key.to_string(),
            slug: slugify(&format!("{} {}", artist, title)),
            artist: artist.to_string(),
            title: title.to_string(),
            story_id: None,
            marketplace_ref: None,
            price_cents: None,
            created_at: Utc::now(),
        }
    }
}

/// SQLite-backed repository for generated content.
pub struct ContentRepository {
    db_path: PathBuf,
}

impl ContentRepository {
    /// Create a new content repository.
    pub fn new(db_path: &Path) -> Result<Self> {
        let repo = Self {
            db_path: db_path.to_path_buf(),
        };
        repo.init_schema()?;
        Ok(repo)
    }

    fn connect(&self) -> Result<Connection> {
        super::connect(&self.db_path)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS stories (
                id TEXT PRIMARY KEY,
                dedup_key TEXT NOT NULL UNIQUE,
                slug TEXT NOT NULL UNIQUE,
                artist TEXT NOT NULL,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                hero_image_url TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS listings (
                id TEXT PRIMARY KEY,
                dedup_key TEXT NOT NULL UNIQUE,
                slug TEXT NOT NULL UNIQUE,
                artist TEXT NOT NULL,
                title TEXT NOT NULL,
                story_id TEXT,
                marketplace_ref TEXT,
                price_cents INTEGER,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_stories_artist ON stories(artist);
            CREATE INDEX IF NOT EXISTS idx_listings_artist ON listings(artist);
        "#,
        )?;
        Ok(())
    }

    /// Whether any content table already holds this dedup key.
    pub fn has_key(&self, dedup_key: &str) -> Result<bool> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            r#"
            SELECT (SELECT COUNT(*) FROM stories WHERE dedup_key = ?1)
                 + (SELECT COUNT(*) FROM listings WHERE dedup_key = ?1)
            "#,
            params![dedup_key],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Save a story, deduplicating the slug on collision.
    pub fn save_story(&self, story: &Story) -> Result<()> {
        let conn = self.connect()?;
        let slug = self.unique_slug(&conn, "stories", &story.slug, &story.id)?;
        conn.execute(
            r#"
            INSERT INTO stories
                (id, dedup_key, slug, artist, title, body, hero_image_url, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                story.id,
                story.dedup_key,
                slug,
                story.artist,
                story.title,
                story.body,
                story.hero_image_url,
                story.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Update a story's hero image once generated.
    pub fn set_story_hero_image(&self, story_id: &str, url: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE stories SET hero_image_url = ? WHERE id = ?",
            params![url, story_id],
        )?;
        Ok(())
    }

    /// Save a listing, deduplicating the slug on collision.
    pub fn save_listing(&self, listing: &Listing) -> Result<()> {
        let conn = self.connect()?;
        let slug = self.unique_slug(&conn, "listings", &listing.slug, &listing.id)?;
        conn.execute(
            r#"
            INSERT INTO listings
                (id, dedup_key, slug, artist, title, story_id, marketplace_ref,
                 price_cents, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                listing.id,
                listing.dedup_key,
                slug,
                listing.artist,
                listing.title,
                listing.story_id,
                listing.marketplace_ref,
                listing.price_cents,
                listing.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get a story by dedup key.
    pub fn get_story_by_key(&self, dedup_key: &str) -> Result<Option<Story>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM stories WHERE dedup_key = ?")?;
        to_option(stmt.query_row(params![dedup_key], |row| {
            Ok(Story {
                id: row.get("id")?,
                dedup_key: row.get("dedup_key")?,
                slug: row.get("slug")?,
                artist: row.get("artist")?,
                title: row.get("title")?,
                body: row.get("body")?,
                hero_image_url: row.get("hero_image_url")?,
                created_at: parse_datetime(&row.get::<_, String>("created_at")?),
            })
        }))
    }

    /// Get a listing by dedup key.
    pub fn get_listing_by_key(&self, dedup_key: &str) -> Result<Option<Listing>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM listings WHERE dedup_key = ?")?;
        to_option(stmt.query_row(params![dedup_key], |row| {
            Ok(Listing {
                id: row.get("id")?,
                dedup_key: row.get("dedup_key")?,
                slug: row.get("slug")?,
                artist: row.get("artist")?,
                title: row.get("title")?,
                story_id: row.get("story_id")?,
                marketplace_ref: row.get("marketplace_ref")?,
                price_cents: row.get("price_cents")?,
                created_at: parse_datetime(&row.get::<_, String>("created_at")?),
            })
        }))
    }

    fn unique_slug(
        &self,
        conn: &Connection,
        table: &str,
        slug: &str,
        id: &str,
    ) -> Result<String> {
        let query = format!("SELECT COUNT(*) FROM {} WHERE slug = ?", table);
        let taken: i64 = conn.query_row(&query, params![slug], |row| row.get(0))?;
        if taken == 0 {
            return Ok(slug.to_string());
        }
        // Suffix with the first id chunk to break the tie
        let suffix: String = id.chars().take(8).collect();
        Ok(format!("{}-{}", slug, suffix))
    }
}

/// Build a URL slug: lowercase, non-alphanumeric runs collapsed to `-`.
pub fn slugify(s: &str) -> String {
    let mut slug = String::with_capacity(s.len());
    let mut last_dash = true;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
