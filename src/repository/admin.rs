//! Admin token repository.
//!
//! Destructive endpoints require a bearer token whose sha256 hash is on
//! file with the admin role set. Tokens are stored hashed only.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};

use super::Result;

/// SQLite-backed repository for admin tokens.
pub struct AdminRepository {
    db_path: PathBuf,
}

impl AdminRepository {
    /// Create a new admin repository.
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
            CREATE TABLE IF NOT EXISTS admin_tokens (
                token_hash TEXT PRIMARY KEY,
                label TEXT NOT NULL,
                is_admin INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
        "#,
        )?;
        Ok(())
    }

    /// Generate and store a new token; returns the plaintext once.
    pub fn create_token(&self, label: &str, is_admin: bool) -> Result<String> {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO admin_tokens (token_hash, label, is_admin, created_at) VALUES (?, ?, ?, ?)",
            params![
                hash_token(&token),
                label,
                is_admin as i32,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(token)
    }

    /// Check a presented bearer token against the admin role.
    pub fn verify_admin(&self, token: &str) -> Result<bool> {
        let conn = self.connect()?;
        let is_admin: Option<i64> = super::to_option(conn.query_row(
            "SELECT is_admin FROM admin_tokens WHERE token_hash = ?",
            params![hash_token(token)],
            |row| row.get(0),
        ))?;
        Ok(is_admin == Some(1))
    }

    /// List token labels (never the tokens themselves).
    pub fn list_tokens(&self) -> Result<Vec<(String, bool)>> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT label, is_admin FROM admin_tokens ORDER BY created_at ASC")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? != 0))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_and_verify() {
        let dir = tempdir().unwrap();
        let repo = AdminRepository::new(&dir.path().join("test.db")).unwrap();

        let token = repo.create_token("scheduler", true).unwrap();
        assert!(repo.verify_admin(&token).unwrap());
        assert!(!repo.verify_admin("wrong-token").unwrap());
    }

    #[test]
    fn test_non_admin_token_rejected() {
        let dir = tempdir().unwrap();
        let repo = AdminRepository::new(&dir.path().join("test.db")).unwrap();

        let token = repo.create_token("read-only", false).unwrap();
        assert!(!repo.verify_admin(&token).unwrap());
    }

    #[test]
    fn test_list_hides_tokens() {
        let dir = tempdir().unwrap();
        let repo = AdminRepository::new(&dir.path().join("test.db")).unwrap();
        let token = repo.create_token("ops", true).unwrap();

        let listed = repo.list_tokens().unwrap();
        assert_eq!(listed, vec![("ops".to_string(), true)]);
        assert!(!listed.iter().any(|(label, _)| label.contains(&token)));
    }
}
