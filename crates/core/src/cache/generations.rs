//! Generation handles and generation-level store operations.
//!
//! A generation is one complete set of cached entries, scoped by a version
//! tag. Exactly one generation serves at a time; the rest are garbage the
//! next activation collects.

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::params;

/// Handle onto one cache generation.
///
/// Cheap to clone; all operations go through the shared [`CacheDb`]
/// connection.
#[derive(Debug, Clone)]
pub struct Generation {
    pub(crate) db: CacheDb,
    pub(crate) tag: String,
}

impl Generation {
    /// Open a generation, creating it if absent. Idempotent.
    pub async fn open(db: &CacheDb, tag: &str) -> Result<Self, Error> {
        let owned_tag = tag.to_string();
        db.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO generations (tag, created_at) VALUES (?1, ?2)",
                    params![owned_tag, chrono::Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(Self { db: db.clone(), tag: tag.to_string() })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl CacheDb {
    /// All known generation tags, oldest first.
    pub async fn list_generations(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT tag FROM generations ORDER BY created_at, tag")?;
                let tags = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(tags)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a generation and every entry it owns.
    ///
    /// Deleting a tag that does not exist is a silent no-op.
    pub async fn delete_generation(&self, tag: &str) -> Result<(), Error> {
        let tag = tag.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("DELETE FROM generations WHERE tag = ?1", params![tag])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}
